//! Core pipeline: discover → parse → rewrite → write → flush generated files.
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use similar::TextDiff;
use tracing::info;

use errgen_core::{CompileUnit, File, render_unit};
use errgen_rewrite::RunContext;

use crate::ErrgenOptions;
use crate::config::Config;
use crate::discovery::{discover_files, is_generated_source};
use crate::skip::Skipper;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Return sites rewritten across all files.
    pub sites: usize,
    /// Source files rewritten (or that would be, in check mode).
    pub files: usize,
    /// Generated files written or deleted.
    pub generated: usize,
    /// Every path whose contents changed.
    pub changed: Vec<PathBuf>,
}

impl RunSummary {
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn describe(&self, check: bool) -> String {
        let verb = if check { "would rewrite" } else { "rewrote" };
        format!(
            "{verb} {} sites in {} files, generated {} files",
            self.sites, self.files, self.generated
        )
    }
}

/// Run the rewrite over `opts.dir`.
///
/// Source files are written as soon as they are processed; a failure on a
/// later file does not roll back earlier ones. Wrapper and sentinel files are
/// written once every file has been processed. In check mode nothing is
/// written and a unified diff of each change goes to stdout.
pub fn run(opts: &ErrgenOptions, config: &Config) -> Result<RunSummary> {
    let start = Instant::now();
    let root = opts.dir.as_path();
    let skipper = Skipper::new(root, config);
    let mut ctx = RunContext::new(root, config.run_options(), &skipper);
    let files = discover_files(root, &skipper)?;
    info!(files = files.len(), dir = %root.display(), "processing files");

    let mut summary = RunSummary::default();
    for path in &files {
        let file = File::new_file(path)?;
        if is_generated_source(file.content()) {
            tracing::debug!(path = %path.display(), "skipping generated file");
            continue;
        }
        let mut unit = CompileUnit::parse(file)?;
        let report = ctx
            .process_unit(&mut unit)
            .with_context(|| format!("failed to rewrite {}", path.display()))?;
        if !unit.is_modified() {
            continue;
        }
        info!(
            path = %path.display(),
            sites = report.rewritten,
            removed_imports = report.removed_imports.len(),
            "rewrote file"
        );
        let rendered = render_unit(&unit);
        if rendered == unit.source() {
            continue;
        }
        apply(opts.check, path, Some(unit.source()), Some(&rendered))?;
        summary.sites += report.rewritten;
        summary.files += 1;
        summary.changed.push(path.clone());
    }

    for generated in ctx.flush()? {
        let existing = match std::fs::read_to_string(&generated.path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", generated.path.display()));
            }
        };
        if existing == generated.contents {
            continue;
        }
        apply(
            opts.check,
            &generated.path,
            existing.as_deref(),
            generated.contents.as_deref(),
        )?;
        summary.generated += 1;
        summary.changed.push(generated.path);
    }

    info!(secs = start.elapsed().as_secs_f64(), "run complete");
    Ok(summary)
}

/// Write, delete, or (in check mode) diff one file.
fn apply(check: bool, path: &Path, old: Option<&str>, new: Option<&str>) -> Result<()> {
    if check {
        print!("{}", unified_diff(path, old.unwrap_or_default(), new.unwrap_or_default()));
        return Ok(());
    }
    match new {
        Some(contents) => std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            std::fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
            info!(path = %path.display(), "removed stale generated file");
        }
    }
    Ok(())
}

pub fn unified_diff(path: &Path, old: &str, new: &str) -> String {
    let name = path.display().to_string();
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}
