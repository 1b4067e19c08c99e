//! Rename pass: rewrite downloaded filenames from extracted titles.
//!
//! Walks the artifact tree, extracts the `{ordinal}_{title}` pair from
//! each document's content, and renames the file **within its folder** —
//! files are never moved across the hierarchy. Files whose title cannot
//! be extracted keep their original name.

use crate::errors::Result;
use crate::extract::{self, Strictness};
use crate::naming;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Document extensions the rename pass considers.
const DOC_EXTENSIONS: [&str; 2] = ["doc", "docx"];

/// Tally of a rename pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenameReport {
    pub visited: usize,
    pub renamed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Recursively rename every matching document under `root`.
///
/// Extraction failures (unreadable file, converter error, no pattern
/// match) skip that file and continue; the walk always terminates.
pub fn rename_tree(root: &Path, strictness: Strictness) -> Result<RenameReport> {
    let mut report = RenameReport::default();
    walk(root, strictness, &mut report)?;
    info!(
        visited = report.visited,
        renamed = report.renamed,
        skipped = report.skipped,
        "rename pass complete"
    );
    Ok(report)
}

fn walk(dir: &Path, strictness: Strictness, report: &mut RenameReport) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, strictness, report)?;
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !DOC_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        report.visited += 1;
        match rename_one(&path, &ext, strictness) {
            Ok(Some(new_path)) => {
                info!(from = %path.display(), to = %new_path.display(), "renamed");
                report.renamed += 1;
            }
            Ok(None) => {
                debug!(path = %path.display(), "name already canonical");
                report.unchanged += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping rename");
                report.skipped += 1;
            }
        }
    }
    Ok(())
}

/// Rename a single file from its extracted title. Returns the new path,
/// or `None` when the file already carries its canonical name.
fn rename_one(path: &Path, ext: &str, strictness: Strictness) -> Result<Option<PathBuf>> {
    let record = extract::extract(path, strictness)?;
    let wanted = naming::title_filename(&record, &format!(".{ext}"));

    if path.file_name().and_then(|n| n.to_str()) == Some(wanted.as_str()) {
        return Ok(None);
    }

    let folder = path.parent().unwrap_or_else(|| Path::new("."));
    let target = disambiguate(folder, &wanted);
    std::fs::rename(path, &target)?;
    Ok(Some(target))
}

/// First non-colliding path for `wanted` in `folder`: the name itself,
/// then `name(2)`, `name(3)`, … The suffix must stay space-free to
/// preserve the sanitized-filename invariant.
///
/// Identical extracted titles are common enough across section batches
/// that overwriting (or failing the pass) is not an option.
fn disambiguate(folder: &Path, wanted: &str) -> PathBuf {
    let candidate = folder.join(wanted);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match wanted.rsplit_once('.') {
        Some((s, e)) => (s.to_string(), format!(".{e}")),
        None => (wanted.to_string(), String::new()),
    };
    for n in 2.. {
        let candidate = folder.join(format!("{stem}({n}){ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_util::write_fixture_docx;

    #[test]
    fn test_rename_tree_rewrites_titles() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("11-A").join("11-A1");
        std::fs::create_dir_all(&folder).unwrap();
        write_fixture_docx(&folder.join("Section_One.docx"), &["205\t| Permitted Uses"]);
        write_fixture_docx(&folder.join("Section_Two.docx"), &["", "101 | Purpose"]);

        let report = rename_tree(root.path(), Strictness::Strict).unwrap();
        assert_eq!(report.visited, 2);
        assert_eq!(report.renamed, 2);
        assert!(folder.join("205_Permitted_Uses.docx").exists());
        assert!(folder.join("101_Purpose.docx").exists());
        assert!(!folder.join("Section_One.docx").exists());
    }

    #[test]
    fn test_unparseable_file_left_in_place() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_docx(
            &root.path().join("NoOrdinal.docx"),
            &["Purpose and Intent"],
        );

        let report = rename_tree(root.path(), Strictness::Strict).unwrap();
        assert_eq!(report.visited, 1);
        assert_eq!(report.skipped, 1);
        assert!(root.path().join("NoOrdinal.docx").exists());
    }

    #[test]
    fn test_loose_mode_uses_sentinel_ordinal() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_docx(
            &root.path().join("NoOrdinal.docx"),
            &["Purpose and Intent"],
        );

        let report = rename_tree(root.path(), Strictness::Loose).unwrap();
        assert_eq!(report.renamed, 1);
        assert!(root.path().join("NoNumber_Purpose_and_Intent.docx").exists());
    }

    #[test]
    fn test_collision_gets_numeric_suffix() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_docx(&root.path().join("a.docx"), &["101 | Purpose"]);
        write_fixture_docx(&root.path().join("b.docx"), &["101 | Purpose"]);
        write_fixture_docx(&root.path().join("c.docx"), &["101 | Purpose"]);

        let report = rename_tree(root.path(), Strictness::Strict).unwrap();
        assert_eq!(report.renamed, 3);
        assert!(root.path().join("101_Purpose.docx").exists());
        assert!(root.path().join("101_Purpose(2).docx").exists());
        assert!(root.path().join("101_Purpose(3).docx").exists());
    }

    #[test]
    fn test_collision_suffix_keeps_names_sanitized() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_docx(&root.path().join("a.docx"), &["101 | Purpose"]);
        write_fixture_docx(&root.path().join("b.docx"), &["101 | Purpose"]);

        rename_tree(root.path(), Strictness::Strict).unwrap();

        // Disambiguated names obey the same invariant as every other
        // produced filename: no spaces, no slashes.
        for entry in std::fs::read_dir(root.path()).unwrap() {
            let name = entry.unwrap().file_name();
            let name = name.to_string_lossy();
            assert!(!name.contains(' '), "filename contains a space: {name}");
            assert!(!name.contains('/'), "filename contains a slash: {name}");
        }
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_docx(&root.path().join("a.docx"), &["101 | Purpose"]);

        rename_tree(root.path(), Strictness::Strict).unwrap();
        let report = rename_tree(root.path(), Strictness::Strict).unwrap();
        assert_eq!(report.renamed, 0);
        assert_eq!(report.unchanged, 1);
        assert!(root.path().join("101_Purpose.docx").exists());
    }

    #[test]
    fn test_non_document_files_ignored() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("notes.txt"), "205 | Permitted Uses").unwrap();

        let report = rename_tree(root.path(), Strictness::Loose).unwrap();
        assert_eq!(report.visited, 0);
    }
}
