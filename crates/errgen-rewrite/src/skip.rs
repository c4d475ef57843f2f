//! Skip-rule interface consumed by the engine.
use std::path::Path;

/// Decides which arguments and files the engine leaves alone.
pub trait SkipRules {
    /// Whether an argument whose type mentions `type_name`, declared in the
    /// package at `module_path`, must not be captured.
    fn skip_argument(&self, type_name: &str, module_path: &str) -> bool;

    /// Whether a file is excluded from rewriting.
    fn skip_file(&self, path: &Path) -> bool;

    /// Import path of the package in `dir`, used to check locally declared
    /// argument types against the rules.
    fn module_path(&self, dir: &Path) -> String {
        dir.display().to_string()
    }
}

/// Skips nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSkip;

impl SkipRules for NoSkip {
    fn skip_argument(&self, _type_name: &str, _module_path: &str) -> bool {
        false
    }

    fn skip_file(&self, _path: &Path) -> bool {
        false
    }
}
