//! Config-driven skip rules.
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use errgen_rewrite::SkipRules;

use crate::config::{Config, FileRule, RuleKind, SkipTypes};

/// Module path declared by `go.mod` in `root`, if any.
pub fn read_module_path(root: &Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("go.mod")).ok()?;
    text.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.split("//").next().unwrap_or(rest).trim().trim_matches('"');
        (!path.is_empty()).then(|| path.to_string())
    })
}

pub struct Skipper {
    root: PathBuf,
    module: Option<String>,
    types: BTreeMap<String, SkipTypes>,
    rules: Vec<FileRule>,
    /// Names of the files errgen itself writes.
    generated: Vec<String>,
}

impl Skipper {
    pub fn new(root: &Path, config: &Config) -> Self {
        let module = read_module_path(root);
        match &module {
            Some(module) => tracing::debug!(module = %module, "read module path from go.mod"),
            None => tracing::debug!(root = %root.display(), "no go.mod, using relative paths"),
        }
        Self {
            root: root.to_path_buf(),
            module,
            types: config.effective_skip_types(),
            rules: config.effective_rules(),
            generated: vec![
                format!("{}.go", config.wrapper_filename),
                format!("{}.go", config.sentinel_filename),
            ],
        }
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    fn rule_matches(&self, rule: &FileRule, path: &Path) -> bool {
        let relative = self.relative(path);
        let file_name = relative.file_name().and_then(|name| name.to_str()).unwrap_or_default();
        match rule.kind {
            RuleKind::Prefix => file_name.starts_with(&rule.value),
            RuleKind::Suffix => file_name.ends_with(&rule.value),
            RuleKind::Dir => relative
                .parent()
                .is_some_and(|dir| dir.components().any(|c| c.as_os_str() == rule.value.as_str())),
            RuleKind::Contains => relative.to_string_lossy().contains(&rule.value),
        }
    }
}

impl SkipRules for Skipper {
    fn skip_argument(&self, type_name: &str, module_path: &str) -> bool {
        self.types
            .get(module_path)
            .is_some_and(|skip| skip.matches(type_name))
    }

    fn skip_file(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
        if self.generated.iter().any(|generated| generated == name) {
            return true;
        }
        self.rules.iter().any(|rule| self.rule_matches(rule, path))
    }

    /// `<module>/<relative dir>` when go.mod names the module, the relative
    /// directory otherwise.
    fn module_path(&self, dir: &Path) -> String {
        let parts: Vec<String> = self
            .relative(dir)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str().map(str::to_string),
                _ => None,
            })
            .collect();
        match (&self.module, parts.is_empty()) {
            (Some(module), true) => module.clone(),
            (Some(module), false) => format!("{module}/{}", parts.join("/")),
            (None, _) => parts.join("/"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skipper(root: &Path, config: &str) -> Skipper {
        Skipper::new(root, &Config::parse(config).unwrap())
    }

    #[test]
    fn test_read_module_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_module_path(dir.path()), None);
        std::fs::write(
            dir.path().join("go.mod"),
            "// comment\nmodule example.com/shop // main module\n\ngo 1.22\n",
        )
        .unwrap();
        assert_eq!(read_module_path(dir.path()).as_deref(), Some("example.com/shop"));
    }

    #[test]
    fn test_default_file_rules() {
        let root = Path::new("/work");
        let skip = skipper(root, "");
        assert!(skip.skip_file(Path::new("/work/user_test.go")));
        assert!(skip.skip_file(Path::new("/work/api/api.pb.go")));
        assert!(skip.skip_file(Path::new("/work/vendor/x/y.go")));
        assert!(skip.skip_file(Path::new("/work/internal/mocks/store.go")));
        assert!(skip.skip_file(Path::new("/work/errgen_wrappers.go")));
        assert!(!skip.skip_file(Path::new("/work/internal/store.go")));
        // Only directories count for dir rules.
        assert!(!skip.skip_file(Path::new("/work/mock.go")));
    }

    #[test]
    fn test_custom_rules() {
        let root = Path::new("/work");
        let skip = skipper(
            root,
            "with_default = false\n[[rules]]\ntype = \"contains\"\nvalue = \"legacy/\"\n[[rules]]\ntype = \"prefix\"\nvalue = \"zz_\"\n",
        );
        assert!(skip.skip_file(Path::new("/work/legacy/a.go")));
        assert!(skip.skip_file(Path::new("/work/zz_gen.go")));
        assert!(!skip.skip_file(Path::new("/work/user_test.go")));
    }

    #[test]
    fn test_skip_argument_and_module_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/shop\n").unwrap();
        let skip = skipper(
            dir.path(),
            "[skip_types.\"example.com/shop/store\"]\nnames = [\"Pool\"]\n",
        );
        assert!(skip.skip_argument("Mutex", "sync"));
        assert!(skip.skip_argument("Tx", "database/sql"));
        assert!(!skip.skip_argument("Rows", "database/sql"));

        let store = dir.path().join("store");
        assert_eq!(skip.module_path(&store), "example.com/shop/store");
        assert_eq!(skip.module_path(dir.path()), "example.com/shop");
        assert!(skip.skip_argument("Pool", &skip.module_path(&store)));
    }
}
