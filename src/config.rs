//! Harvest configuration.
//!
//! Defaults target the DC zoning code (DCMR Title 11). Every field can be
//! overridden from a JSON config file; the CLI layers its own flag
//! overrides on top.

use crate::extract::Strictness;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Catalog page listing all subtitles of the target title.
pub const DEFAULT_CATALOG_URL: &str =
    "https://www.dcregs.dc.gov/Common/DCMR/SubTitleList.aspx?TitleId=32";

/// Configuration for a harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Catalog URL for subtitle entry strategy A (click from the list page).
    pub catalog_url: String,
    /// Subtitle identifiers to crawl, in order.
    pub subtitles: Vec<String>,
    /// Subtitle entry strategy B: direct chapter-list URLs for subtitles
    /// whose catalog listing is unreliable. Takes precedence over the
    /// catalog when a subtitle has an entry here.
    pub direct_urls: BTreeMap<String, String>,
    /// Root folder for the downloaded tree.
    pub download_root: PathBuf,
    /// Fixed post-click settle interval. The site renders asynchronously
    /// with no completion signal, so this stays a bounded delay.
    pub settle_ms: u64,
    /// Timeout for page loads and bounded element waits.
    pub nav_timeout_ms: u64,
    /// Timeout for an armed download to materialize.
    pub download_timeout_ms: u64,
    /// Title-extraction strictness for the rename pass.
    pub strictness: Strictness,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let subtitles = [
            "11-A", "11-B", "11-C", "11-D", "11-E", "11-F", "11-G", "11-H", "11-I", "11-J",
            "11-K", "11-U", "11-V", "11-W", "11-X", "11-Y", "11-Z",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        // These subtitles do not resolve reliably from the catalog page.
        let direct_urls = [
            ("11-U", 68),
            ("11-W", 69),
            ("11-X", 70),
            ("11-Y", 71),
            ("11-Z", 72),
        ]
        .into_iter()
        .map(|(id, subtitle_id)| {
            (
                id.to_string(),
                format!(
                    "https://www.dcregs.dc.gov/Common/DCMR/ChapterList.aspx?subtitleId={subtitle_id}"
                ),
            )
        })
        .collect();

        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            subtitles,
            direct_urls,
            download_root: PathBuf::from("dc_zoning_documents"),
            settle_ms: 3000,
            nav_timeout_ms: 15_000,
            download_timeout_ms: 30_000,
            strictness: Strictness::Loose,
        }
    }
}

impl HarvestConfig {
    /// Load a config from a JSON file. Missing fields fall back to the
    /// defaults; every configured URL must parse.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))?;

        url::Url::parse(&config.catalog_url)
            .with_context(|| format!("invalid catalog_url: {}", config.catalog_url))?;
        for (subtitle, direct) in &config.direct_urls {
            url::Url::parse(direct)
                .with_context(|| format!("invalid direct URL for {subtitle}: {direct}"))?;
        }
        Ok(config)
    }

    /// Restrict the run to the given subtitle identifiers, preserving the
    /// configured order. Unknown identifiers are kept verbatim so a run can
    /// target a subtitle absent from the default list.
    pub fn retain_subtitles(&mut self, only: &[String]) {
        if only.is_empty() {
            return;
        }
        let mut picked: Vec<String> = self
            .subtitles
            .iter()
            .filter(|s| only.contains(s))
            .cloned()
            .collect();
        for id in only {
            if !picked.contains(id) {
                picked.push(id.clone());
            }
        }
        self.subtitles = picked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_target_site() {
        let cfg = HarvestConfig::default();
        assert_eq!(cfg.subtitles.len(), 17);
        assert!(cfg.subtitles.contains(&"11-A".to_string()));
        assert!(cfg.direct_urls.contains_key("11-U"));
        assert!(cfg.direct_urls["11-Z"].contains("subtitleId=72"));
        assert_eq!(cfg.settle_ms, 3000);
    }

    #[test]
    fn test_load_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "download_root": "/tmp/corpus", "strictness": "strict" }"#,
        )
        .unwrap();

        let cfg = HarvestConfig::load(&path).unwrap();
        assert_eq!(cfg.download_root, PathBuf::from("/tmp/corpus"));
        assert_eq!(cfg.strictness, crate::extract::Strictness::Strict);
        assert_eq!(cfg.catalog_url, DEFAULT_CATALOG_URL);
    }

    #[test]
    fn test_load_rejects_unparseable_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "catalog_url": "not a url" }"#).unwrap();

        assert!(HarvestConfig::load(&path).is_err());
    }

    #[test]
    fn test_retain_subtitles_preserves_order_and_accepts_unknown() {
        let mut cfg = HarvestConfig::default();
        cfg.retain_subtitles(&["11-C".to_string(), "11-A".to_string(), "12-Q".to_string()]);
        assert_eq!(cfg.subtitles, vec!["11-A", "11-C", "12-Q"]);
    }
}
