//! errgen command-line interface.
//!
pub mod config;
pub mod discovery;
pub mod pipeline;
pub mod skip;

use std::path::PathBuf;

use anyhow::Result;

pub use config::Config;
pub use pipeline::RunSummary;
pub use skip::Skipper;

/// Options for running errgen.
#[derive(Debug, Clone)]
pub struct ErrgenOptions {
    /// Root directory to walk.
    pub dir: PathBuf,
    /// Explicit config file; `errgen.toml` under `dir` is used otherwise.
    pub config: Option<PathBuf>,
    /// Report changes as a diff instead of writing them.
    pub check: bool,
}

/// Main entry point
pub fn run_main(opts: &ErrgenOptions) -> Result<RunSummary> {
    let config = Config::load(opts.config.as_deref(), &opts.dir)?;
    pipeline::run(opts, &config)
}
