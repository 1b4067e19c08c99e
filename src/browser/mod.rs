//! Browser navigation abstraction.
//!
//! Defines the [`PageDriver`] trait the crawler drives, abstracting over
//! the browser engine (currently Chromium via chromiumoxide).
//!
//! The central design rule: element handles are never retained across a
//! navigation. A link is addressed as a **position in a freshly queried
//! ordered sequence** ([`LinkQuery`] + index), and every operation
//! re-queries the live DOM before acting. The target site invalidates
//! element references on any page mutation, and stale handles were the
//! single largest source of crawl failures.

pub mod chromium;

use crate::errors::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Where to look for links on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkScope {
    /// Any anchor on the page.
    AnyAnchor,
    /// Anchors nested in table cells (`table tr td a`).
    TableCell,
}

/// Visible-text filter applied to links in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Contains(String),
    StartsWith(String),
    Equals(String),
}

impl TextMatch {
    /// Whether a link's trimmed visible text satisfies this filter.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Contains(s) => text.contains(s.as_str()),
            TextMatch::StartsWith(s) => text.starts_with(s.as_str()),
            TextMatch::Equals(s) => text == s,
        }
    }
}

/// A link collection query: scope plus optional text filter.
///
/// Queries are cheap and re-evaluated against the current DOM on every
/// call; the result order is document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkQuery {
    pub scope: LinkScope,
    pub text: Option<TextMatch>,
}

impl LinkQuery {
    /// All anchors.
    pub fn any() -> Self {
        Self { scope: LinkScope::AnyAnchor, text: None }
    }

    /// Anchors whose text contains `s`.
    pub fn containing(s: impl Into<String>) -> Self {
        Self {
            scope: LinkScope::AnyAnchor,
            text: Some(TextMatch::Contains(s.into())),
        }
    }

    /// Anchors whose text starts with `s`.
    pub fn starting_with(s: impl Into<String>) -> Self {
        Self {
            scope: LinkScope::AnyAnchor,
            text: Some(TextMatch::StartsWith(s.into())),
        }
    }

    /// Table-cell anchors.
    pub fn table_cells() -> Self {
        Self { scope: LinkScope::TableCell, text: None }
    }

    /// Table-cell anchors whose text contains `s`.
    pub fn table_cells_containing(s: impl Into<String>) -> Self {
        Self {
            scope: LinkScope::TableCell,
            text: Some(TextMatch::Contains(s.into())),
        }
    }
}

/// A single exclusively-owned browser page.
///
/// Implementations do not retry; the crawler owns the skip/continue
/// policy because only it knows whether a branch is skippable.
#[async_trait]
pub trait PageDriver: Send {
    /// Load a URL and wait (bounded) for content to appear.
    async fn goto(&mut self, url: &str, timeout_ms: u64) -> Result<()>;

    /// Visible texts of the links matching `query`, in document order.
    /// Re-queries the current DOM on every call.
    async fn find_links(&mut self, query: &LinkQuery) -> Result<Vec<String>>;

    /// Re-resolve `query` against the current DOM and click the `index`-th
    /// match.
    async fn click_link(&mut self, query: &LinkQuery, index: usize) -> Result<()>;

    /// Poll (bounded) until at least one link matches `query`.
    async fn wait_for_links(&mut self, query: &LinkQuery, timeout_ms: u64) -> Result<()>;

    /// Trimmed text of the `row`-th cell in the given 1-based table column.
    /// Empty when the cell is missing or blank; the caller supplies the
    /// fallback label.
    async fn cell_text(&mut self, column: usize, row: usize) -> Result<String>;

    /// Fixed settle delay after a transition. Content renders
    /// asynchronously with no reliable completion signal, so this stays a
    /// bounded fixed wait.
    async fn settle(&mut self, ms: u64);

    /// Navigate back to the previous page.
    async fn go_back(&mut self) -> Result<()>;

    /// Arm one-shot download interception, click the `index`-th match of
    /// `query`, and wait (bounded) for the payload to land. Returns the
    /// staged file path; the caller persists it.
    async fn expect_download(
        &mut self,
        query: &LinkQuery,
        index: usize,
        timeout_ms: u64,
    ) -> Result<PathBuf>;
}
