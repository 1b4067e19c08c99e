//! `dcmr crawl` — harvest the document tree from the live site.

use crate::browser::chromium::ChromiumSession;
use crate::cli::output::{self, Styled};
use crate::config::HarvestConfig;
use crate::crawl::HierarchyCrawler;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Run the crawl command.
pub async fn run(
    config_path: Option<&Path>,
    root: Option<PathBuf>,
    subtitles: &[String],
    settle_ms: Option<u64>,
) -> Result<()> {
    let s = Styled::new();

    let mut config = match config_path {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    if let Some(root) = root {
        config.download_root = root;
    }
    if let Some(ms) = settle_ms {
        config.settle_ms = ms;
    }
    config.retain_subtitles(subtitles);

    info!(
        root = %config.download_root.display(),
        subtitles = config.subtitles.len(),
        "starting crawl"
    );

    // One shared cancel flag: ctrl_c sets it, the crawler checks it
    // between iterations and winds down at the next unit boundary.
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal, finishing current unit");
        cancel_signal.store(true, Ordering::Relaxed);
    });

    let session = ChromiumSession::launch()
        .await
        .context("failed to start browser session")?;
    let page = session.new_page().await;
    let result = match page {
        Ok(mut page) => HierarchyCrawler::new(&mut page, &config, cancel).run().await,
        Err(e) => Err(e),
    };
    // The session closes on every exit path, including crawl failure.
    let _ = session.close().await;

    let report = result.context("crawl run failed")?;

    if output::is_json() {
        output::print_json(&serde_json::to_value(&report)?);
    } else if !output::is_quiet() {
        eprintln!(
            "  {} Download complete: {} sections saved{}",
            s.ok_sym(),
            report.sections_downloaded,
            if report.cancelled { " (cancelled)" } else { "" },
        );
        let skipped =
            report.sections_skipped + report.chapters_skipped + report.subtitles_skipped;
        if skipped > 0 {
            eprintln!(
                "  {} Skipped {} sections, {} chapters, {} subtitles (see log for details)",
                s.warn_sym(),
                report.sections_skipped,
                report.chapters_skipped,
                report.subtitles_skipped,
            );
        }
    }
    Ok(())
}
