//! Source file handling.
use std::fs;
use std::path::{Path, PathBuf};

use errgen_error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Default)]
pub struct File {
    pub path: PathBuf,
    content: String,
}

impl File {
    /// Read a Go source file. Go source must be UTF-8, anything else is
    /// rejected rather than rewritten lossily.
    pub fn new_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            Error::from(e)
                .with_operation("file::read")
                .with_path(path)
        })?;
        let content = String::from_utf8(bytes).map_err(|e| {
            Error::new(ErrorKind::EncodingError, "source is not valid UTF-8")
                .with_operation("file::read")
                .with_path(path)
                .set_source(e)
        })?;
        Ok(File {
            path: path.to_path_buf(),
            content,
        })
    }

    pub fn new_source(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        File {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn get_text(&self, start_byte: usize, end_byte: usize) -> Option<&str> {
        if start_byte > end_byte {
            return None;
        }
        self.content.get(start_byte..end_byte)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}
