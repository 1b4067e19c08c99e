//! Hierarchy crawler: Subtitle → Chapter → Section.
//!
//! Three nested loops over link lists that are **re-resolved after every
//! navigation** — a link index is only meaningful against the DOM as it
//! exists right now. Failure isolation is per level: a failed section
//! skips to the next section, a failed chapter to the next chapter, a
//! failed subtitle to the next subtitle. The run always reaches a
//! terminal report; nothing short of a session crash aborts it.

use crate::browser::{LinkQuery, PageDriver};
use crate::config::HarvestConfig;
use crate::errors::{HarvestError, Result};
use crate::{naming, sink};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Link text marking a downloadable section entry.
const VIEW_TEXT: &str = "View text";

/// Tally of a crawl run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub subtitles_done: usize,
    pub subtitles_skipped: usize,
    pub chapters_done: usize,
    pub chapters_skipped: usize,
    pub sections_downloaded: usize,
    pub sections_skipped: usize,
    pub cancelled: bool,
}

/// Depth-first crawler over a single exclusively-owned page.
pub struct HierarchyCrawler<'a> {
    driver: &'a mut dyn PageDriver,
    config: &'a HarvestConfig,
    cancel: Arc<AtomicBool>,
    report: CrawlReport,
}

impl<'a> HierarchyCrawler<'a> {
    pub fn new(
        driver: &'a mut dyn PageDriver,
        config: &'a HarvestConfig,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            driver,
            config,
            cancel,
            report: CrawlReport::default(),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Crawl every configured subtitle, best-effort.
    pub async fn run(mut self) -> Result<CrawlReport> {
        std::fs::create_dir_all(&self.config.download_root)?;

        let subtitles = self.config.subtitles.clone();
        for subtitle in &subtitles {
            if self.cancelled() {
                self.report.cancelled = true;
                break;
            }
            match self.crawl_subtitle(subtitle).await {
                Ok(()) => self.report.subtitles_done += 1,
                Err(e) => {
                    warn!(subtitle, error = %e, "skipping subtitle");
                    self.report.subtitles_skipped += 1;
                }
            }
        }

        info!(
            downloaded = self.report.sections_downloaded,
            skipped = self.report.sections_skipped,
            "crawl complete"
        );
        Ok(self.report)
    }

    /// Enter a subtitle's chapter list and walk its chapters.
    ///
    /// Entry strategy B (direct chapter-list URL) wins when configured;
    /// otherwise strategy A clicks through from the catalog page.
    async fn crawl_subtitle(&mut self, subtitle: &str) -> Result<()> {
        let chapter_query = if let Some(url) = self.config.direct_urls.get(subtitle) {
            info!(subtitle, url, "entering via direct URL");
            self.driver.goto(url, self.config.nav_timeout_ms).await?;
            LinkQuery::table_cells()
        } else {
            info!(subtitle, "entering via catalog page");
            self.driver
                .goto(&self.config.catalog_url, self.config.nav_timeout_ms)
                .await?;
            self.driver
                .click_link(&LinkQuery::containing(subtitle), 0)
                .await?;
            self.driver.settle(self.config.settle_ms).await;
            // Chapter labels on this listing are prefixed with the
            // subtitle identifier; that prefix is the chapter predicate.
            LinkQuery::starting_with(subtitle)
        };

        let subtitle_folder = self.config.download_root.join(naming::sanitize(subtitle));
        std::fs::create_dir_all(&subtitle_folder)?;

        let chapter_count = self.driver.find_links(&chapter_query).await?.len();
        for idx in 0..chapter_count {
            if self.cancelled() {
                self.report.cancelled = true;
                break;
            }
            match self.crawl_chapter(&subtitle_folder, &chapter_query, idx).await {
                Ok(()) => self.report.chapters_done += 1,
                Err(e) => {
                    warn!(subtitle, chapter = idx, error = %e, "skipping chapter");
                    self.report.chapters_skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Click into the `idx`-th chapter, download its sections, navigate
    /// back to the chapter list.
    async fn crawl_chapter(
        &mut self,
        subtitle_folder: &Path,
        chapter_query: &LinkQuery,
        idx: usize,
    ) -> Result<()> {
        // Re-resolve: a label list fetched before any prior click is
        // stale, and the list can shrink between visits.
        let labels = self.driver.find_links(chapter_query).await?;
        let label = labels
            .get(idx)
            .cloned()
            .ok_or_else(|| HarvestError::ElementNotFound(format!("chapter {idx} vanished")))?;

        info!(chapter = %label, "accessing chapter");
        self.driver.click_link(chapter_query, idx).await?;
        self.driver.settle(self.config.settle_ms).await;

        // Past the click the driver sits on the section page. The chapter
        // list must be restored before returning, success or not, or the
        // next iteration resolves its links against the wrong page.
        let outcome = self.harvest_sections(subtitle_folder, &label).await;
        let back = self.driver.go_back().await;
        self.driver.settle(self.config.settle_ms).await;
        outcome?;
        back
    }

    /// Download every "view text" entry on the current section page.
    async fn harvest_sections(&mut self, subtitle_folder: &Path, label: &str) -> Result<()> {
        let chapter_folder = subtitle_folder.join(naming::sanitize(label));
        std::fs::create_dir_all(&chapter_folder)?;

        let view_query = LinkQuery::table_cells_containing(VIEW_TEXT);
        self.driver
            .wait_for_links(&view_query, self.config.nav_timeout_ms)
            .await?;

        let section_count = self.driver.find_links(&view_query).await?.len();
        for i in 0..section_count {
            if self.cancelled() {
                self.report.cancelled = true;
                break;
            }
            match self.download_section(&chapter_folder, label, &view_query, i).await {
                Ok(path) => {
                    info!(path = %path.display(), "saved");
                    self.report.sections_downloaded += 1;
                }
                Err(e) => {
                    warn!(chapter = %label, entry = i + 1, error = %e, "skipping section entry");
                    self.report.sections_skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Download the `i`-th "view text" entry of the current chapter page.
    async fn download_section(
        &mut self,
        chapter_folder: &Path,
        chapter_label: &str,
        view_query: &LinkQuery,
        i: usize,
    ) -> Result<PathBuf> {
        // The table re-renders per row; confirm the entries are still
        // there before addressing row `i`.
        self.driver
            .wait_for_links(view_query, self.config.nav_timeout_ms)
            .await?;

        // Section heading lives in the second column; empty headings fall
        // back to the chapter label so the filename is never empty.
        let heading = self.driver.cell_text(2, i).await?;
        let filename = naming::artifact_filename(&heading, chapter_label, ".doc");
        let dest = chapter_folder.join(filename);

        let staged = self
            .driver
            .expect_download(view_query, i, self.config.download_timeout_ms)
            .await?;
        sink::save(&staged, &dest)?;
        Ok(dest)
    }
}
