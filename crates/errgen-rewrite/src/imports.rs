//! Import tables and unused-import pruning.
use std::sync::LazyLock;

use errgen_core::{CompileUnit, NodeKind};
use regex::Regex;

static VERSION_SUFFIX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[/.]v\d+$").ok());
static GO_AFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^go-(?P<pre>[\w-]+)$|^(?P<suf>[\w-]+)-go$").ok());

/// Package name implied by an import path: the last element, with a major
/// version suffix (`/v2`, `.v3`) and a `go-` prefix or `-go` suffix removed.
pub fn name_from_path(path: &str) -> String {
    let mut path = path;
    if let Some(re) = VERSION_SUFFIX.as_ref() {
        if let Some(found) = re.find(path) {
            path = &path[..found.start()];
        }
    }
    let base = path.rsplit('/').next().unwrap_or(path);
    strip_go_affix(base)
}

fn strip_go_affix(name: &str) -> String {
    let Some(caps) = GO_AFFIX.as_ref().and_then(|re| re.captures(name)) else {
        return name.to_string();
    };
    caps.name("pre")
        .or_else(|| caps.name("suf"))
        .map_or_else(|| name.to_string(), |m| m.as_str().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// Name the file refers to the package by.
    pub local: String,
    pub path: String,
    pub alias: Option<String>,
}

/// Local-name to import-path table for one file. Blank and dot imports are
/// not addressable by name and are left out.
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    entries: Vec<ImportEntry>,
    dot_imports: bool,
}

impl ImportTable {
    pub fn from_unit(unit: &CompileUnit) -> Self {
        let dot_imports = unit
            .import_specs()
            .into_iter()
            .any(|(_, spec)| spec.alias.as_deref() == Some("."));
        let entries = unit
            .import_specs()
            .into_iter()
            .filter_map(|(_, spec)| {
                let local = match spec.alias.as_deref() {
                    Some("_") | Some(".") => return None,
                    Some(alias) => alias.to_string(),
                    None => name_from_path(&spec.path),
                };
                Some(ImportEntry {
                    local,
                    path: spec.path.clone(),
                    alias: spec.alias.clone(),
                })
            })
            .collect();
        Self {
            entries,
            dot_imports,
        }
    }

    pub fn entry(&self, local: &str) -> Option<&ImportEntry> {
        self.entries.iter().find(|entry| entry.local == local)
    }

    pub fn resolve(&self, local: &str) -> Option<&str> {
        self.entry(local).map(|entry| entry.path.as_str())
    }

    pub fn entries(&self) -> &[ImportEntry] {
        &self.entries
    }

    /// Whether the file has an `import . "path"`, whose names appear
    /// unqualified.
    pub fn has_dot_imports(&self) -> bool {
        self.dot_imports
    }
}

/// Drop import specs referenced before the rewrite (`used_before`) but no
/// longer referenced now, then drop import declarations left empty.
/// Returns the removed import paths.
pub fn remove_unused(unit: &mut CompileUnit, used_before: &[String]) -> Vec<String> {
    let used_after = unit.used_qualifiers();
    let mut doomed = Vec::new();
    for (id, spec) in unit.import_specs() {
        let local = match spec.alias.as_deref() {
            Some("_") | Some(".") => continue,
            Some(alias) => alias.to_string(),
            None => name_from_path(&spec.path),
        };
        if spec.path == "C" {
            continue;
        }
        let was_used = used_before.iter().any(|name| *name == local);
        let still_used = used_after.iter().any(|name| *name == local);
        if was_used && !still_used {
            doomed.push((id, spec.path.clone()));
        }
    }

    let mut removed = Vec::new();
    for (id, path) in doomed {
        if unit.detach(id) {
            tracing::debug!(path = %unit.path().display(), import = %path, "removed unused import");
            removed.push(path);
        }
    }

    if !removed.is_empty() {
        for decl in unit.import_decls() {
            let empty = matches!(unit.kind(decl), NodeKind::ImportDecl { specs } if specs.is_empty());
            if empty {
                unit.detach(decl);
            }
        }
    }
    removed
}
