//! Error taxonomy for the harvester.
//!
//! Failures are typed by where they occur (navigation, download, document
//! handling) so that the crawl and rename loops can log and skip the
//! affected unit without aborting the run.

/// Errors produced by the crawl, download, and rename subsystems.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// A page load or in-page transition did not complete.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// An expected link, row, or cell was missing from the current page.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// A triggered download did not materialize within the bounded wait.
    #[error("download timed out after {0}ms")]
    DownloadTimeout(u64),

    /// Filesystem failure (missing destination folder, failed write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external document converter errored or produced no output.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// No non-empty paragraph matched the title pattern.
    #[error("no title pattern matched")]
    ExtractionNotFound,

    /// HTTP failure from the geo-attribute collaborator.
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HarvestError>;
