//! # errgen-error
//!
//! Unified error handling for errgen.
//!
//! - **ErrorKind**: what went wrong (e.g. SyntaxError, IoFailed)
//! - **Error Context**: where it went wrong, as key/value pairs such as the
//!   offending path and position
//! - **Error Source**: the underlying error, wrapped without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use errgen_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::SyntaxError, "unexpected token")
//!         .with_operation("go::parse")
//!         .with_context("path", "user.go")
//!         .with_context("line", "42"))
//! }
//! ```
//!
//! ## Principles
//!
//! - Library functions return `Result<T, errgen_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context

mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

/// Result type alias using errgen Error
pub type Result<T> = std::result::Result<T, Error>;
