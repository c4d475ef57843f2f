//! Error-provenance rewrite engine for Go sources.
//!
//! The pipeline for one compile unit is: classify error-returning functions,
//! trace each return site back to a reason and cause, synthesize one wrapper
//! type per function, then rewrite the return values and prune imports that
//! became unused. [`RunContext`] carries the per-module state (wrapper specs,
//! sentinel tables) across the whole run and flushes it once at the end.
pub mod args;
pub mod classify;
pub mod context;
pub mod imports;
pub mod pattern;
pub mod provenance;
pub mod rewrite;
pub mod sentinel;
pub mod skip;
pub mod wrapper;

pub use args::{ArgCategory, ArgInfo, capture_args};
pub use classify::{ErrorFunction, error_functions, return_sites};
pub use context::{GeneratedFile, LiteralPolicy, ModuleKey, RunContext, RunOptions, UnitReport};
pub use imports::{ImportTable, name_from_path, remove_unused};
pub use provenance::{ProvenanceResult, SkipReason, Trace, Tracer};
pub use rewrite::{CauseExpr, rewrite_site};
pub use sentinel::{SentinelCollector, SentinelTable};
pub use skip::{NoSkip, SkipRules};
pub use wrapper::{ErrorWrapperSpec, GENERATED_HEADER, render_wrappers};
