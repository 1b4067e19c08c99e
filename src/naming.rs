//! Filename derivation for downloaded and renamed artifacts.
//!
//! Every file the harvester writes goes through [`sanitize`], so the
//! on-disk tree never contains spaces or path separators smuggled in from
//! page headings or document titles.

use crate::extract::TitleRecord;

/// Make a string safe for use as a filename: spaces become `_`, `/`
/// becomes `-`. Idempotent.
pub fn sanitize(s: &str) -> String {
    s.replace(' ', "_").replace('/', "-")
}

/// Filename for a freshly downloaded section document.
///
/// Uses the section heading when present, otherwise falls back to the
/// chapter label so the name is never empty.
pub fn artifact_filename(heading: &str, fallback: &str, extension: &str) -> String {
    let stem = if heading.trim().is_empty() {
        fallback.trim()
    } else {
        heading.trim()
    };
    format!("{}{extension}", sanitize(stem))
}

/// Filename for a document whose title was extracted from its content:
/// `{ordinal}_{title}` sanitized, keeping the original extension.
pub fn title_filename(record: &TitleRecord, extension: &str) -> String {
    format!(
        "{}{extension}",
        sanitize(&format!("{}_{}", record.ordinal, record.title))
    )
}
