//! Download persistence.
//!
//! A download is staged by the page driver in a scratch directory; the
//! sink moves it to its final place in the artifact tree. The destination
//! folder must already exist (the crawler creates it per hierarchy level).
//! Same-named files are overwritten silently; re-runs re-download.

use crate::errors::{HarvestError, Result};
use std::path::Path;

/// Persist a staged download payload at `dest`.
pub fn save(staged: &Path, dest: &Path) -> Result<()> {
    match dest.parent() {
        Some(folder) if folder.exists() => {}
        _ => {
            return Err(HarvestError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("destination folder missing for {}", dest.display()),
            )))
        }
    }

    // Staging lives on a tmpfs in some environments; fall back to
    // copy+remove when a plain rename crosses filesystems.
    if std::fs::rename(staged, dest).is_err() {
        std::fs::copy(staged, dest)?;
        std::fs::remove_file(staged)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_moves_payload() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged.doc");
        std::fs::write(&staged, b"payload").unwrap();
        let dest = dir.path().join("final.doc");

        save(&staged, &dest).unwrap();
        assert!(!staged.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_save_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged.doc");
        std::fs::write(&staged, b"new").unwrap();
        let dest = dir.path().join("final.doc");
        std::fs::write(&dest, b"old").unwrap();

        save(&staged, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_save_requires_existing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("staged.doc");
        std::fs::write(&staged, b"payload").unwrap();
        let dest = dir.path().join("missing").join("final.doc");

        assert!(matches!(
            save(&staged, &dest),
            Err(HarvestError::Io(_))
        ));
        assert!(staged.exists());
    }
}
