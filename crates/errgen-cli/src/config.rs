//! `errgen.toml` configuration.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use errgen_rewrite::{LiteralPolicy, RunOptions};

/// Config file looked up in the walked directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "errgen.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Merge the built-in skip types and file rules with the ones below.
    pub with_default: bool,
    pub wrapper_filename: String,
    pub sentinel_filename: String,
    /// `nil` or `sentinel`.
    pub literal_errors: LiteralPolicy,
    /// Import path to the types from it that are never captured.
    pub skip_types: BTreeMap<String, SkipTypes>,
    pub rules: Vec<FileRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkipTypes {
    /// Skip every type of the package.
    pub all: bool,
    pub names: Vec<String>,
}

impl SkipTypes {
    fn all() -> Self {
        Self {
            all: true,
            names: Vec::new(),
        }
    }

    fn names(names: &[&str]) -> Self {
        Self {
            all: false,
            names: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn matches(&self, type_name: &str) -> bool {
        self.all || self.names.iter().any(|name| name == type_name)
    }

    fn merge(&mut self, other: &SkipTypes) {
        self.all |= other.all;
        for name in &other.names {
            if !self.names.contains(name) {
                self.names.push(name.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// File name starts with the value.
    Prefix,
    /// File name ends with the value.
    Suffix,
    /// A directory on the path is named the value.
    #[serde(alias = "directory")]
    Dir,
    /// The relative path contains the value.
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub value: String,
}

impl FileRule {
    fn new(kind: RuleKind, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            with_default: true,
            wrapper_filename: "errgen_wrappers".to_string(),
            sentinel_filename: "errgen_sentinels".to_string(),
            literal_errors: LiteralPolicy::Nil,
            skip_types: BTreeMap::new(),
            rules: Vec::new(),
        }
    }
}

impl Config {
    /// Load `explicit` if given; otherwise `errgen.toml` under `dir` if it
    /// exists, falling back to the defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        let path: PathBuf = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = dir.join(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    tracing::debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        for (label, stem) in [
            ("wrapper_filename", &config.wrapper_filename),
            ("sentinel_filename", &config.sentinel_filename),
        ] {
            if stem.is_empty() || stem.contains('/') || stem.ends_with(".go") {
                return Err(anyhow!("{label} must be a bare file stem, got {stem:?}"));
            }
        }
        if config.wrapper_filename == config.sentinel_filename {
            return Err(anyhow!("wrapper_filename and sentinel_filename must differ"));
        }
        Ok(config)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            literal_policy: self.literal_errors,
            wrapper_filename: self.wrapper_filename.clone(),
            sentinel_filename: self.sentinel_filename.clone(),
        }
    }

    /// Skip types in effect: the defaults (when enabled) merged with the
    /// configured ones.
    pub fn effective_skip_types(&self) -> BTreeMap<String, SkipTypes> {
        let mut types = if self.with_default {
            default_skip_types()
        } else {
            BTreeMap::new()
        };
        for (path, skip) in &self.skip_types {
            types.entry(path.clone()).or_default().merge(skip);
        }
        types
    }

    pub fn effective_rules(&self) -> Vec<FileRule> {
        let mut rules = if self.with_default {
            default_rules()
        } else {
            Vec::new()
        };
        rules.extend(self.rules.iter().cloned());
        rules
    }
}

fn default_skip_types() -> BTreeMap<String, SkipTypes> {
    BTreeMap::from([
        ("sync".to_string(), SkipTypes::all()),
        ("context".to_string(), SkipTypes::all()),
        ("database/sql".to_string(), SkipTypes::names(&["DB", "Conn", "Tx"])),
    ])
}

fn default_rules() -> Vec<FileRule> {
    let mut rules: Vec<FileRule> = ["_test.go", "_mock.go", ".pb.go", ".pg.go"]
        .iter()
        .map(|suffix| FileRule::new(RuleKind::Suffix, suffix))
        .collect();
    rules.extend(
        ["vendor", "mock", "mocks", "testdata"]
            .iter()
            .map(|dir| FileRule::new(RuleKind::Dir, dir)),
    );
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        let types = config.effective_skip_types();
        assert!(types["sync"].matches("Mutex"));
        assert!(types["database/sql"].matches("Tx"));
        assert!(!types["database/sql"].matches("Rows"));
        assert_eq!(config.effective_rules().len(), 8);
        assert_eq!(config.run_options(), RunOptions::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            with_default = true
            wrapper_filename = "wrap"
            sentinel_filename = "sent"
            literal_errors = "sentinel"

            [skip_types."database/sql"]
            names = ["Rows"]

            [skip_types."github.com/jackc/pgx/v5"]
            all = true

            [[rules]]
            type = "directory"
            value = "gen"

            [[rules]]
            type = "prefix"
            value = "zz_"
            "#,
        )
        .unwrap();
        let options = config.run_options();
        assert_eq!(options.literal_policy, LiteralPolicy::Sentinel);
        assert_eq!(options.wrapper_filename, "wrap");

        let types = config.effective_skip_types();
        assert!(types["database/sql"].matches("Rows"));
        assert!(types["database/sql"].matches("DB"));
        assert!(types["github.com/jackc/pgx/v5"].matches("Conn"));

        let rules = config.effective_rules();
        assert_eq!(rules[8], FileRule::new(RuleKind::Dir, "gen"));
        assert_eq!(rules[9].kind, RuleKind::Prefix);
    }

    #[test]
    fn test_without_defaults() {
        let config = Config::parse("with_default = false\n").unwrap();
        assert!(config.effective_skip_types().is_empty());
        assert!(config.effective_rules().is_empty());
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::parse("literal_errors = \"panic\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown variant `panic`"), "{err:#}");
        assert!(Config::parse("literal_errors = \"Sentinel\"\n").is_err());
        assert!(Config::parse("wrapper_filename = \"x.go\"\n").is_err());
        assert!(Config::parse("unknown_key = 1\n").is_err());
        assert!(Config::parse("[[rules]]\ntype = \"glob\"\nvalue = \"*\"\n").is_err());
    }

    #[test]
    fn test_load_from_dir_and_explicit() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(None, dir.path()).unwrap(), Config::default());

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "literal_errors = \"sentinel\"\n").unwrap();
        let config = Config::load(None, dir.path()).unwrap();
        assert_eq!(config.literal_errors, LiteralPolicy::Sentinel);

        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing), dir.path()).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
