//! Go file discovery.
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

use anyhow::{Context, Result};
use errgen_core::LangGo;
use errgen_rewrite::SkipRules;
use ignore::WalkBuilder;
use regex::Regex;
use tracing::info;

/// Go's convention for machine-generated files.
static GENERATED_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^// Code generated .* DO NOT EDIT\.$").ok());

/// Whether the source carries a "Code generated ... DO NOT EDIT." line
/// before its package clause.
pub fn is_generated_source(source: &str) -> bool {
    let Some(re) = GENERATED_MARKER.as_ref() else {
        return false;
    };
    source
        .lines()
        .take_while(|line| !line.starts_with("package"))
        .any(|line| re.is_match(line.trim_end()))
}

/// Walk `root` and collect the Go files not excluded by `skip`, sorted so
/// that runs visit files in the same order.
pub fn discover_files(root: &Path, skip: &dyn SkipRules) -> Result<Vec<PathBuf>> {
    let start = Instant::now();
    let mut files = Vec::new();
    let mut skipped = 0usize;

    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .follow_links(false)
        .build();
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk directory {}", root.display()))?;
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !LangGo::supported_extensions().contains(&ext) {
            continue;
        }
        if skip.skip_file(path) {
            skipped += 1;
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();

    if skipped > 0 {
        info!(skipped, "skipped files matching skip rules");
    }
    info!(
        files = files.len(),
        secs = start.elapsed().as_secs_f64(),
        "file discovery complete"
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use errgen_rewrite::NoSkip;

    #[test]
    fn test_generated_marker() {
        assert!(is_generated_source(
            "// Code generated by errgen. DO NOT EDIT.\n\npackage p\n"
        ));
        assert!(is_generated_source(
            "// Copyright\n\n// Code generated by protoc-gen-go. DO NOT EDIT.\n\npackage p\n"
        ));
        assert!(!is_generated_source("package p\n\n// Code generated by x. DO NOT EDIT.\n"));
        assert!(!is_generated_source("// Code generated by hand\npackage p\n"));
        assert!(!is_generated_source(
            "package p\n\nfunc F() {\n\t// Code generated by x. DO NOT EDIT.\n}\n"
        ));
        assert!(is_generated_source(
            "// Code generated by stringer. DO NOT EDIT.\r\n\r\npackage p\r\n"
        ));
    }

    #[test]
    fn test_discover_sorted_go_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b/z.go"), "package b\n").unwrap();
        std::fs::write(dir.path().join("a.go"), "package a\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi\n").unwrap();

        let files = discover_files(dir.path(), &NoSkip).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("a.go"), PathBuf::from("b/z.go")]);
    }
}
