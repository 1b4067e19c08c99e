//! `dcmr rename` — normalize downloaded filenames from document titles.

use crate::cli::output::{self, Styled};
use crate::extract::Strictness;
use crate::rename::rename_tree;
use anyhow::{ensure, Context, Result};
use std::path::Path;

/// Run the rename command.
pub async fn run(root: &Path, strictness: Strictness) -> Result<()> {
    let s = Styled::new();
    ensure!(root.is_dir(), "not a directory: {}", root.display());

    let report = rename_tree(root, strictness)
        .with_context(|| format!("rename pass failed under {}", root.display()))?;

    if output::is_json() {
        output::print_json(&serde_json::to_value(&report)?);
    } else if !output::is_quiet() {
        eprintln!(
            "  {} Renamed {} of {} documents ({} already canonical)",
            s.ok_sym(),
            report.renamed,
            report.visited,
            report.unchanged,
        );
        if report.skipped > 0 {
            eprintln!(
                "  {} {} documents skipped (no extractable title)",
                s.warn_sym(),
                report.skipped,
            );
        }
    }
    Ok(())
}
