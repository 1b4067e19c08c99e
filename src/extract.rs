//! Title extraction from downloaded section documents.
//!
//! The corpus is a mix of modern `.docx` files and legacy `.doc` binaries.
//! `.docx` is read directly (zip container, `word/document.xml`); legacy
//! `.doc` is first converted with a headless LibreOffice subprocess, and
//! the intermediate file is deleted after reading.
//!
//! The title lives in the first non-empty paragraph, formatted with heavy
//! variance across document batches: `"205\t| Permitted Uses"`,
//! `"101 | Purpose"`, `"Purpose and Intent"` with no ordinal at all.
//! [`Strictness`] selects which of the two observed formats is required.

use crate::errors::{HarvestError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// Ordinal sentinel for documents whose first paragraph carries no number.
pub const NO_NUMBER: &str = "NoNumber";

/// A normalized "number + title" pair extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRecord {
    /// Leading numeric ordinal, or [`NO_NUMBER`].
    pub ordinal: String,
    /// The remaining heading text.
    pub title: String,
}

/// Title-pattern strictness.
///
/// Two formats coexist in the corpus; which one a folder uses is not
/// detectable up front, so the caller chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Require a 3+-digit ordinal; fail extraction if absent.
    Strict,
    /// Accept any leading ordinal, or none (ordinal becomes `NoNumber`).
    #[default]
    Loose,
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "loose" => Ok(Self::Loose),
            other => Err(format!("unknown strictness '{other}' (use strict|loose)")),
        }
    }
}

fn strict_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Separator is any run of whitespace and/or pipe characters.
    RE.get_or_init(|| Regex::new(r"^(\d{3,})[\s|]+(\S.*)$").unwrap())
}

fn loose_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)[\s|]+(\S.*)$").unwrap())
}

/// Parse a single heading line into a [`TitleRecord`].
///
/// Returns `None` when the line does not match under the selected
/// strictness. In loose mode a line with no leading ordinal still parses,
/// with the whole line as the title.
pub fn parse_title_line(line: &str, strictness: Strictness) -> Option<TitleRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match strictness {
        Strictness::Strict => strict_re().captures(line).map(|c| TitleRecord {
            ordinal: c[1].to_string(),
            title: c[2].trim().to_string(),
        }),
        Strictness::Loose => match loose_re().captures(line) {
            Some(c) => Some(TitleRecord {
                ordinal: c[1].to_string(),
                title: c[2].trim().to_string(),
            }),
            None => Some(TitleRecord {
                ordinal: NO_NUMBER.to_string(),
                title: line.to_string(),
            }),
        },
    }
}

/// Extract the title record from a `.doc` or `.docx` file.
///
/// Legacy `.doc` input is converted to `.docx` first; the converted file
/// lives in a temporary directory and is removed after reading.
pub fn extract(path: &Path, strictness: Strictness) -> Result<TitleRecord> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let paragraphs = match ext.as_str() {
        "docx" => docx_paragraphs(path)?,
        "doc" => {
            let staging = tempfile::tempdir()?;
            let converted = convert_to_docx(path, staging.path())?;
            let paragraphs = docx_paragraphs(&converted)?;
            // staging drop removes the intermediate .docx
            paragraphs
        }
        other => {
            return Err(HarvestError::Conversion(format!(
                "unsupported document extension '{other}'"
            )))
        }
    };

    let first = paragraphs
        .iter()
        .map(|p| p.trim())
        .find(|p| !p.is_empty())
        .ok_or(HarvestError::ExtractionNotFound)?;

    debug!(line = first, "first non-empty paragraph");
    parse_title_line(first, strictness).ok_or(HarvestError::ExtractionNotFound)
}

/// Read the paragraphs of a `.docx` file in document order.
///
/// Walks `word/document.xml` with a streaming XML reader, collecting the
/// text runs (`w:t`) of each `w:p` and rendering `w:tab` as a tab so the
/// heading separator survives.
pub fn docx_paragraphs(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| HarvestError::Conversion(format!("{}: not a docx container: {e}", path.display())))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| HarvestError::Conversion(format!("{}: missing document.xml: {e}", path.display())))?
        .read_to_string(&mut xml)?;

    let mut reader = quick_xml::Reader::from_str(&xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| HarvestError::Conversion(format!("malformed document.xml: {e}")))?
        {
            quick_xml::events::Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            quick_xml::events::Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            quick_xml::events::Event::Empty(e) if e.name().as_ref() == b"w:tab" => {
                current.push('\t');
            }
            quick_xml::events::Event::Text(t) if in_text => {
                current.push_str(
                    &t.unescape()
                        .map_err(|e| HarvestError::Conversion(format!("bad text run: {e}")))?,
                );
            }
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// Locate the LibreOffice binary.
fn find_converter() -> Result<PathBuf> {
    which::which("soffice")
        .or_else(|_| which::which("libreoffice"))
        .map_err(|_| {
            HarvestError::Conversion("LibreOffice (soffice) not found on PATH".to_string())
        })
}

/// Convert a legacy `.doc` to `.docx` in `out_dir` via headless LibreOffice.
///
/// The converter writes a sibling file named after the input stem; its
/// absence after a zero exit status is still treated as a failure.
pub fn convert_to_docx(path: &Path, out_dir: &Path) -> Result<PathBuf> {
    let converter = find_converter()?;
    convert_with(&converter, path, out_dir)
}

fn convert_with(converter: &Path, path: &Path, out_dir: &Path) -> Result<PathBuf> {
    let output = std::process::Command::new(converter)
        .arg("--headless")
        .arg("--convert-to")
        .arg("docx")
        .arg("--outdir")
        .arg(out_dir)
        .arg(path)
        .output()?;

    if !output.status.success() {
        return Err(HarvestError::Conversion(format!(
            "{} exited with {}: {}",
            converter.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stem = path
        .file_stem()
        .ok_or_else(|| HarvestError::Conversion(format!("{}: no file stem", path.display())))?;
    let converted = out_dir.join(stem).with_extension("docx");
    if !converted.exists() {
        return Err(HarvestError::Conversion(format!(
            "converter produced no output for {}",
            path.display()
        )));
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::test_util::write_fixture_docx;
    use super::*;

    #[test]
    fn test_strict_pipe_separated() {
        let rec = parse_title_line("101 | Purpose", Strictness::Strict).unwrap();
        assert_eq!(rec.ordinal, "101");
        assert_eq!(rec.title, "Purpose");
    }

    #[test]
    fn test_strict_tab_and_pipe() {
        let rec = parse_title_line("205\t| Permitted Uses", Strictness::Strict).unwrap();
        assert_eq!(rec.ordinal, "205");
        assert_eq!(rec.title, "Permitted Uses");
    }

    #[test]
    fn test_strict_rejects_missing_ordinal() {
        assert!(parse_title_line("Purpose and Intent", Strictness::Strict).is_none());
    }

    #[test]
    fn test_strict_rejects_short_ordinal() {
        assert!(parse_title_line("11 Zones", Strictness::Strict).is_none());
    }

    #[test]
    fn test_loose_accepts_short_ordinal() {
        let rec = parse_title_line("11 Zones", Strictness::Loose).unwrap();
        assert_eq!(rec.ordinal, "11");
        assert_eq!(rec.title, "Zones");
    }

    #[test]
    fn test_loose_missing_ordinal_is_sentinel() {
        let rec = parse_title_line("Purpose and Intent", Strictness::Loose).unwrap();
        assert_eq!(rec.ordinal, NO_NUMBER);
        assert_eq!(rec.title, "Purpose and Intent");
    }

    #[test]
    fn test_blank_line_never_parses() {
        assert!(parse_title_line("   ", Strictness::Loose).is_none());
        assert!(parse_title_line("", Strictness::Strict).is_none());
    }

    #[test]
    fn test_strictness_from_str() {
        assert_eq!(Strictness::from_str("strict").unwrap(), Strictness::Strict);
        assert_eq!(Strictness::from_str("LOOSE").unwrap(), Strictness::Loose);
        assert!(Strictness::from_str("fuzzy").is_err());
    }

    #[test]
    fn test_docx_paragraphs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.docx");
        write_fixture_docx(&path, &["", "205\t| Permitted Uses", "Body text."]);

        let paragraphs = docx_paragraphs(&path).unwrap();
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[1], "205\t| Permitted Uses");
    }

    #[test]
    fn test_extract_skips_empty_leading_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.docx");
        write_fixture_docx(&path, &["", "  ", "101 | Purpose"]);

        let rec = extract(&path, Strictness::Strict).unwrap();
        assert_eq!(rec.ordinal, "101");
        assert_eq!(rec.title, "Purpose");
    }

    #[test]
    fn test_extract_not_found_on_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.docx");
        write_fixture_docx(&path, &["", "   "]);

        assert!(matches!(
            extract(&path, Strictness::Loose),
            Err(HarvestError::ExtractionNotFound)
        ));
    }

    #[test]
    fn test_extract_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "205 | Permitted Uses").unwrap();

        assert!(matches!(
            extract(&path, Strictness::Loose),
            Err(HarvestError::Conversion(_))
        ));
    }

    /// Write an executable shell script standing in for the converter.
    #[cfg(unix)]
    fn write_stub_converter(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_surfaces_converter_failure() {
        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("soffice-stub");
        write_stub_converter(&stub, "echo 'no filter found' >&2; exit 3");
        let input = dir.path().join("legacy.doc");
        std::fs::write(&input, b"\xd0\xcf\x11\xe0").unwrap();

        let err = convert_with(&stub, &input, dir.path()).unwrap_err();
        assert!(matches!(err, HarvestError::Conversion(_)));
        assert!(err.to_string().contains("no filter found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_requires_output_file() {
        // A zero exit status with no sibling .docx is still a failure.
        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("soffice-stub");
        write_stub_converter(&stub, "exit 0");
        let input = dir.path().join("legacy.doc");
        std::fs::write(&input, b"\xd0\xcf\x11\xe0").unwrap();

        let err = convert_with(&stub, &input, dir.path()).unwrap_err();
        assert!(err.to_string().contains("produced no output"));
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_returns_sibling_docx() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        write_fixture_docx(&dir.path().join("payload.docx"), &["205\t| Permitted Uses"]);

        // The stub mimics soffice's contract: argv is
        // `--headless --convert-to docx --outdir <dir> <input>` and the
        // output is named after the input stem.
        let stub = dir.path().join("soffice-stub");
        write_stub_converter(
            &stub,
            r#"cp "$(dirname "$6")/payload.docx" "$5/$(basename "$6" .doc).docx""#,
        );
        let input = dir.path().join("legacy.doc");
        std::fs::write(&input, b"\xd0\xcf\x11\xe0").unwrap();

        let converted = convert_with(&stub, &input, &out).unwrap();
        assert_eq!(converted, out.join("legacy.docx"));
        let paragraphs = docx_paragraphs(&converted).unwrap();
        assert_eq!(paragraphs[0], "205\t| Permitted Uses");
    }

    /// Needs LibreOffice installed; run with `cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn test_doc_extraction_roundtrip_with_soffice() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.docx");
        write_fixture_docx(&seed, &["205\t| Permitted Uses"]);

        // Produce a genuine legacy .doc to feed back through extract.
        let converter = find_converter().unwrap();
        let status = std::process::Command::new(&converter)
            .arg("--headless")
            .arg("--convert-to")
            .arg("doc")
            .arg("--outdir")
            .arg(dir.path())
            .arg(&seed)
            .status()
            .unwrap();
        assert!(status.success());

        let rec = extract(&dir.path().join("seed.doc"), Strictness::Strict).unwrap();
        assert_eq!(rec.ordinal, "205");
    }
}
