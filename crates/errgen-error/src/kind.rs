//! Error kinds for errgen operations

use strum_macros::{Display, IntoStaticStr};

/// The kind of error that occurred.
///
/// Callers match on the kind to tell a broken input program from a
/// filesystem failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse source code
    ParseFailed,

    /// Invalid syntax in source file
    SyntaxError,

    /// Encoding error (invalid UTF-8, etc.)
    EncodingError,

    /// Tree-sitter grammar error
    GrammarError,

    // =========================================================================
    // File/IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    // =========================================================================
    // Validation errors
    // =========================================================================
    /// Previously generated output could not be read back
    InvalidFormat,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}
