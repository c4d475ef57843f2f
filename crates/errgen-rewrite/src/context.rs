//! Run-scoped state shared by every compile unit of one run.
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use errgen_core::{CompileUnit, File};
use errgen_error::{ErrorKind, Result};
use serde::Deserialize;
use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::args::{ArgInfo, capture_args};
use crate::classify::{error_functions, return_sites};
use crate::imports::{ImportTable, name_from_path, remove_unused};
use crate::provenance::{SkipReason, Trace, Tracer};
use crate::rewrite::{CauseExpr, rewrite_site};
use crate::sentinel::SentinelCollector;
use crate::skip::SkipRules;
use crate::wrapper::{ErrorWrapperSpec, GENERATED_HEADER, WRAPPER_IMPORTS, render_wrappers};

/// What a static literal message turns into once it becomes the reason.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, IntoStaticStr, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LiteralPolicy {
    /// The cause is `nil`.
    #[default]
    Nil,
    /// The cause is a per-module sentinel variable.
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub literal_policy: LiteralPolicy,
    /// File stem of the generated wrapper file.
    pub wrapper_filename: String,
    /// File stem of the generated sentinel file.
    pub sentinel_filename: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            literal_policy: LiteralPolicy::Nil,
            wrapper_filename: "errgen_wrappers".to_string(),
            sentinel_filename: "errgen_sentinels".to_string(),
        }
    }
}

/// A Go package: the directory it lives in and its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleKey {
    pub dir: PathBuf,
    pub package: String,
}

impl ModuleKey {
    pub fn of(unit: &CompileUnit) -> Self {
        Self {
            dir: unit.path().parent().map(Path::to_path_buf).unwrap_or_default(),
            package: unit.package_name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitReport {
    pub rewritten: usize,
    pub skipped: usize,
    pub already_wrapped: usize,
    pub removed_imports: Vec<String>,
}

/// A file produced by [`RunContext::flush`]. `contents` is `None` when a
/// previously generated file is no longer needed and should be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: Option<String>,
}

#[derive(Debug, Default)]
struct ModuleState {
    specs: Vec<ErrorWrapperSpec>,
    /// (receiver, function) to assigned type name.
    names: BTreeMap<(Option<String>, String), String>,
    taken: BTreeSet<String>,
    /// Import path to the name the wrapper file refers to it by.
    import_names: BTreeMap<String, String>,
    /// Reverse of `import_names`.
    claimed: BTreeMap<String, String>,
}

impl ModuleState {
    /// `<Function>Error`, or `<Receiver><Function>Error` when another
    /// function already holds that name.
    fn type_name(&mut self, receiver: Option<&str>, function: &str) -> String {
        let key = (receiver.map(str::to_string), function.to_string());
        if let Some(name) = self.names.get(&key) {
            return name.clone();
        }
        let base = format!("{}Error", upper_first(function));
        let mut candidates = vec![base.clone()];
        if let Some(receiver) = receiver {
            candidates.push(format!("{}{}Error", upper_first(receiver), upper_first(function)));
        }
        let name = candidates
            .into_iter()
            .find(|name| !self.taken.contains(name))
            .unwrap_or_else(|| {
                let mut n = 2;
                while self.taken.contains(&format!("{base}{n}")) {
                    n += 1;
                }
                format!("{base}{n}")
            });
        self.taken.insert(name.clone());
        self.names.insert(key, name.clone());
        name
    }

    /// Requalify argument types so every package has one name in the
    /// wrapper file. A package whose name is already held by another path is
    /// aliased; arguments that would need a rename inside opaque type text
    /// are dropped. Returns the arguments and the imports they need.
    fn localize(
        &mut self,
        args: Vec<ArgInfo>,
        imports: &ImportTable,
    ) -> (Vec<ArgInfo>, BTreeMap<String, Option<String>>) {
        let mut needed = BTreeMap::new();
        let mut out = Vec::new();
        for mut arg in args {
            let renames: BTreeMap<String, (String, String)> = arg
                .ty
                .packages()
                .into_iter()
                .filter_map(|package| {
                    let path = imports.resolve(package)?;
                    let local = self.local_name(package, path);
                    Some((package.to_string(), (local, path.to_string())))
                })
                .collect();
            let renamed = renames.iter().any(|(from, (to, _))| from != to);
            if renamed && arg.ty.has_opaque() {
                tracing::trace!(arg = %arg.name, "argument type cannot be requalified");
                continue;
            }
            if renamed {
                arg.ty.rename_packages(&|package: &str| renames.get(package).map(|(to, _)| to.clone()));
            }
            for (local, path) in renames.into_values() {
                let alias = (local != name_from_path(&path)).then_some(local);
                needed.insert(path, alias);
            }
            out.push(arg);
        }
        (out, needed)
    }

    fn local_name(&mut self, preferred: &str, path: &str) -> String {
        if WRAPPER_IMPORTS.contains(&path) {
            return path.to_string();
        }
        if let Some(local) = self.import_names.get(path) {
            return local.clone();
        }
        let is_free = |name: &str| !self.claimed.contains_key(name) && !WRAPPER_IMPORTS.contains(&name);
        let mut local = preferred.to_string();
        let mut n = 2;
        while !is_free(&local) {
            local = format!("{preferred}{n}");
            n += 1;
        }
        if local != preferred {
            tracing::warn!(import = path, alias = %local, "import name already used in wrapper file, aliasing");
        }
        self.claimed.insert(local.clone(), path.to_string());
        self.import_names.insert(path.to_string(), local.clone());
        local
    }

    fn register(&mut self, spec: ErrorWrapperSpec) {
        match self.specs.iter().find(|known| known.type_name == spec.type_name) {
            Some(known) if known.args != spec.args => {
                tracing::warn!(
                    wrapper = %spec.type_name,
                    "function declared twice with different arguments, keeping the first"
                );
            }
            Some(_) => {}
            None => self.specs.push(spec),
        }
    }
}

pub(crate) fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Explicit run context: per-module wrapper registries and sentinel tables,
/// filled unit by unit and written out once by [`RunContext::flush`].
pub struct RunContext<'a> {
    root: PathBuf,
    options: RunOptions,
    skip: &'a dyn SkipRules,
    sentinels: SentinelCollector,
    modules: BTreeMap<ModuleKey, ModuleState>,
}

impl<'a> RunContext<'a> {
    pub fn new(root: impl Into<PathBuf>, options: RunOptions, skip: &'a dyn SkipRules) -> Self {
        let sentinels = SentinelCollector::new(options.sentinel_filename.clone());
        Self {
            root: root.into(),
            options,
            skip,
            sentinels,
            modules: BTreeMap::new(),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Names of the files this run generates, so they are never rewritten.
    pub fn generated_file_names(&self) -> [String; 2] {
        [
            format!("{}.go", self.options.wrapper_filename),
            format!("{}.go", self.options.sentinel_filename),
        ]
    }

    /// Rewrite every error return site of `unit` in place.
    pub fn process_unit(&mut self, unit: &mut CompileUnit) -> Result<UnitReport> {
        let imports = ImportTable::from_unit(unit);
        let used_before = unit.used_qualifiers();
        let key = ModuleKey::of(unit);
        let module_path = self.skip.module_path(&key.dir);
        let qualifier_base = self.qualifier_base(&key);
        self.modules.entry(key.clone()).or_default();

        let mut report = UnitReport::default();
        for func in error_functions(unit) {
            let Some(decl) = unit.node(func.id).as_func().cloned() else {
                continue;
            };
            let receiver = decl.receiver.as_ref().map(|r| r.type_name.clone());
            let captured = capture_args(&decl, self.skip, &imports, &module_path);
            let (args, arg_imports) = self.module(&key).localize(captured, &imports);
            let type_name = self
                .module(&key)
                .type_name(receiver.as_deref(), &decl.name);
            let spec = ErrorWrapperSpec {
                qualifier: match &receiver {
                    Some(receiver) => format!("{qualifier_base}.{receiver}"),
                    None => qualifier_base.clone(),
                },
                imports: arg_imports,
                type_name,
                function: decl.name.clone(),
                receiver,
                args,
            };
            let constructor = spec.constructor();
            let call_args = spec.call_args();

            let traces: Vec<Trace> = {
                let tracer = Tracer::new(unit, &imports, func.id, func.slot, &constructor, spec.arity());
                return_sites(unit, func.id)
                    .into_iter()
                    .map(|ret| tracer.trace(ret))
                    .collect()
            };

            let mut touched = 0;
            for trace in traces {
                match trace {
                    Trace::Skip(SkipReason::AlreadyWrapped) => {
                        report.already_wrapped += 1;
                        touched += 1;
                    }
                    Trace::Skip(reason) => {
                        tracing::trace!(func = %decl.name, %reason, "return site left alone");
                        report.skipped += 1;
                    }
                    Trace::Rewrite { value, result } => {
                        let cause = match result.cause {
                            Some(id) => CauseExpr::Existing(id),
                            None if result.suppress_capture
                                && self.options.literal_policy == LiteralPolicy::Sentinel =>
                            {
                                CauseExpr::Sentinel(self.sentinels.resolve(&key, &result.reason)?)
                            }
                            None => CauseExpr::Nil,
                        };
                        let rewritten =
                            rewrite_site(unit, value, &constructor, &call_args, &result.reason, cause);
                        if rewritten.is_some() {
                            tracing::debug!(func = %decl.name, reason = %result.reason, "rewrote return site");
                            report.rewritten += 1;
                            touched += 1;
                        }
                    }
                }
            }

            if touched > 0 {
                self.module(&key).register(spec);
            }
        }

        if report.rewritten > 0 {
            report.removed_imports = remove_unused(unit, &used_before);
        }
        Ok(report)
    }

    fn module(&mut self, key: &ModuleKey) -> &mut ModuleState {
        self.modules.entry(key.clone()).or_default()
    }

    /// Directory relative to the root, with the package name appended when
    /// it differs from the last element: `internal/store/pg`, `pkg` at the root.
    fn qualifier_base(&self, key: &ModuleKey) -> String {
        let relative = key.dir.strip_prefix(&self.root).unwrap_or(&key.dir);
        let mut parts: Vec<String> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .filter(|c| *c != ".")
            .map(str::to_string)
            .collect();
        if parts.last() != Some(&key.package) {
            parts.push(key.package.clone());
        }
        parts.join("/")
    }

    /// Wrapper and sentinel files of every module seen this run.
    pub fn flush(&mut self) -> Result<Vec<GeneratedFile>> {
        let mut files = Vec::new();
        let keys: Vec<ModuleKey> = self.modules.keys().cloned().collect();
        for key in keys {
            let wrapper_path = key.dir.join(format!("{}.go", self.options.wrapper_filename));
            let specs = self.modules.get(&key).map(|m| m.specs.as_slice()).unwrap_or_default();
            if !specs.is_empty() {
                files.push(GeneratedFile {
                    path: wrapper_path,
                    contents: Some(render_wrappers(&key.package, specs)),
                });
            } else if is_generated(&wrapper_path)? {
                files.push(GeneratedFile {
                    path: wrapper_path,
                    contents: None,
                });
            }

            let sentinel_path = self.sentinels.path_for(&key);
            let table = self.sentinels.ensure_loaded(&key)?;
            if !table.is_empty() {
                files.push(GeneratedFile {
                    path: sentinel_path,
                    contents: Some(table.render(&key.package)),
                });
            } else if is_generated(&sentinel_path)? {
                files.push(GeneratedFile {
                    path: sentinel_path,
                    contents: None,
                });
            }
        }
        for file in &files {
            tracing::info!(path = %file.path.display(), delete = file.contents.is_none(), "generated file");
        }
        Ok(files)
    }
}

/// Import path and alias of every package the captured argument types use.
/// Whether `path` exists and carries the generated-file header.
fn is_generated(path: &Path) -> Result<bool> {
    match File::new_file(path) {
        Ok(file) => Ok(file.content().starts_with(GENERATED_HEADER)),
        Err(e) if e.kind() == ErrorKind::FileNotFound => Ok(false),
        Err(e) => Err(e),
    }
}
