//! Sentinel collector: one package-level error variable per distinct literal
//! message, with names that survive regeneration.
use std::collections::BTreeMap;
use std::path::PathBuf;

use errgen_core::{CompileUnit, Expr, File, NodeId, NodeKind, go_quote};
use errgen_error::{Error, ErrorKind, Result};

use crate::context::{ModuleKey, upper_first};
use crate::imports::ImportTable;
use crate::pattern::{PlainConstructor, plain_constructor, string_literal};
use crate::wrapper::GENERATED_HEADER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelEntry {
    pub name: String,
    pub message: String,
    /// Numeric suffix of the name, 0 when it does not follow the scheme.
    pub ordinal: usize,
}

/// Message-to-identifier table of one module.
#[derive(Debug, Clone, Default)]
pub struct SentinelTable {
    prefix: String,
    entries: Vec<SentinelEntry>,
    by_message: BTreeMap<String, usize>,
}

impl SentinelTable {
    pub fn new(package: &str) -> Self {
        Self {
            prefix: format!("Err{}", upper_first(package)),
            ..Self::default()
        }
    }

    /// Identifier for `message`, minting `Err<Package><N>` for a new one.
    pub fn resolve(&mut self, message: &str) -> &str {
        let index = match self.by_message.get(message) {
            Some(index) => *index,
            None => {
                let mut ordinal = self.entries.len() + 1;
                while self.is_taken(&format!("{}{}", self.prefix, ordinal)) {
                    ordinal += 1;
                }
                let name = format!("{}{}", self.prefix, ordinal);
                tracing::debug!(sentinel = %name, message, "minted sentinel");
                self.insert(name, message.to_string())
            }
        };
        &self.entries[index].name
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries sorted by ordinal, then name.
    pub fn entries(&self) -> Vec<&SentinelEntry> {
        let mut entries: Vec<&SentinelEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));
        entries
    }

    /// Load the declarations of a previously generated sentinel file.
    pub fn preload(&mut self, unit: &CompileUnit) {
        let imports = ImportTable::from_unit(unit);
        for id in unit.descendants(unit.root()) {
            let NodeKind::ValueSpec(spec) = unit.kind(id) else {
                continue;
            };
            if spec.names.len() != spec.values.len() {
                continue;
            }
            for (name, value) in spec.names.iter().zip(&spec.values) {
                if plain_constructor(unit, &imports, *value) != Some(PlainConstructor::New) {
                    continue;
                }
                let Some(message) = first_arg(unit, *value)
                    .and_then(|arg| string_literal(unit, arg))
                else {
                    continue;
                };
                if self.by_message.contains_key(&message) || self.is_taken(name) {
                    tracing::warn!(sentinel = %name, "duplicate sentinel declaration ignored");
                    continue;
                }
                self.insert(name.clone(), message);
            }
        }
    }

    fn is_taken(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    fn insert(&mut self, name: String, message: String) -> usize {
        let ordinal = name
            .strip_prefix(&self.prefix)
            .and_then(|rest| rest.parse().ok())
            .unwrap_or(0);
        let index = self.entries.len();
        self.by_message.insert(message.clone(), index);
        self.entries.push(SentinelEntry {
            name,
            message,
            ordinal,
        });
        index
    }

    /// Go source of the sentinel file.
    pub fn render(&self, package: &str) -> String {
        let entries = self.entries();
        let width = entries.iter().map(|entry| entry.name.len()).max().unwrap_or(0);
        let mut out = format!("{GENERATED_HEADER}\n\npackage {package}\n\nimport \"errors\"\n\nvar (\n");
        for entry in entries {
            out.push_str(&format!(
                "\t{:<width$} = errors.New({})\n",
                entry.name,
                go_quote(&entry.message),
            ));
        }
        out.push_str(")\n");
        out
    }
}

fn first_arg(unit: &CompileUnit, id: NodeId) -> Option<NodeId> {
    match unit.expr(id)? {
        Expr::Call { args, .. } => args.first().copied(),
        _ => None,
    }
}

/// `my_pkg` -> `MyPkg`.
/// Sentinel tables of every module touched in a run. A module's table is
/// loaded from its existing sentinel file the first time it is needed.
#[derive(Debug, Clone)]
pub struct SentinelCollector {
    filename: String,
    tables: BTreeMap<ModuleKey, SentinelTable>,
}

impl SentinelCollector {
    /// `filename` is the file stem, without `.go`.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            tables: BTreeMap::new(),
        }
    }

    pub fn path_for(&self, key: &ModuleKey) -> PathBuf {
        key.dir.join(format!("{}.go", self.filename))
    }

    pub fn resolve(&mut self, key: &ModuleKey, message: &str) -> Result<String> {
        Ok(self.ensure_loaded(key)?.resolve(message).to_string())
    }

    pub fn ensure_loaded(&mut self, key: &ModuleKey) -> Result<&mut SentinelTable> {
        if !self.tables.contains_key(key) {
            let table = self.load(key)?;
            self.tables.insert(key.clone(), table);
        }
        self.tables
            .get_mut(key)
            .ok_or_else(|| errgen_error::Error::unexpected("sentinel table vanished after load"))
    }

    fn load(&self, key: &ModuleKey) -> Result<SentinelTable> {
        let mut table = SentinelTable::new(&key.package);
        let path = self.path_for(key);
        let file = match File::new_file(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::FileNotFound => return Ok(table),
            Err(e) => return Err(e),
        };
        let unit = CompileUnit::parse(file).map_err(|e| {
            Error::invalid_format("previous sentinel file does not parse")
                .with_operation("sentinel::load")
                .with_path(&path)
                .set_source(e)
        })?;
        table.preload(&unit);
        tracing::debug!(path = %path.display(), entries = table.len(), "loaded sentinels");
        Ok(table)
    }

    pub fn table(&self, key: &ModuleKey) -> Option<&SentinelTable> {
        self.tables.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(dir: &std::path::Path) -> ModuleKey {
        ModuleKey {
            dir: dir.to_path_buf(),
            package: "module".to_string(),
        }
    }

    #[test]
    fn test_resolve_reuses_identifier_per_message() {
        let mut table = SentinelTable::new("module");
        assert_eq!(table.resolve("boom"), "ErrModule1");
        assert_eq!(table.resolve("bang"), "ErrModule2");
        assert_eq!(table.resolve("boom"), "ErrModule1");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_prefix_capitalizes_package() {
        assert_eq!(SentinelTable::new("store").prefix, "ErrStore");
        let mut table = SentinelTable::new("my_pkg");
        assert_eq!(table.resolve("boom"), "ErrMy_pkg1");
    }

    #[test]
    fn test_render_aligns_and_sorts() {
        let mut table = SentinelTable::new("p");
        for i in 1..=10 {
            table.resolve(&format!("m{i}"));
        }
        let out = table.render("p");
        assert!(out.starts_with("// Code generated by errgen. DO NOT EDIT.\n\npackage p\n"));
        assert!(out.contains("\tErrP1  = errors.New(\"m1\")\n"));
        assert!(out.contains("\tErrP10 = errors.New(\"m10\")\n"));
        assert!(out.find("ErrP2 ").unwrap() < out.find("ErrP10").unwrap());
    }

    #[test]
    fn test_preload_keeps_names_and_skips_taken_ordinals() {
        let dir = tempfile::tempdir().unwrap();
        let existing = "// Code generated by errgen. DO NOT EDIT.\n\npackage module\n\nimport \"errors\"\n\nvar (\n\tErrModule2 = errors.New(\"second\")\n)\n";
        std::fs::write(dir.path().join("errgen_sentinels.go"), existing).unwrap();

        let mut collector = SentinelCollector::new("errgen_sentinels");
        let key = key(dir.path());
        assert_eq!(collector.resolve(&key, "second").unwrap(), "ErrModule2");
        // Ordinal 2 is taken by the preloaded entry.
        assert_eq!(collector.resolve(&key, "fresh").unwrap(), "ErrModule3");

        let rendered = collector.table(&key).unwrap().render("module");
        assert!(rendered.contains("\tErrModule2 = errors.New(\"second\")\n\tErrModule3 = errors.New(\"fresh\")\n"));
    }

    #[test]
    fn test_missing_file_is_empty_and_broken_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = SentinelCollector::new("errgen_sentinels");
        assert!(collector.ensure_loaded(&key(dir.path())).unwrap().is_empty());

        let broken = tempfile::tempdir().unwrap();
        std::fs::write(broken.path().join("errgen_sentinels.go"), "package module\n\nvar (\n").unwrap();
        let err = collector.resolve(&key(broken.path()), "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert_eq!(err.operation(), "sentinel::load");
        assert!(err.context_value("path").is_some_and(|p| p.ends_with("errgen_sentinels.go")));
        assert!(std::error::Error::source(&err).is_some());
    }
}
