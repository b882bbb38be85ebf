use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::OfferRecord;

pub const DEFAULT_RESULTS_PATH: &str = "data/results.json";
pub const DEFAULT_FALLBACK_PATH: &str = "data/fallback.json";

/// A JSON array of offers on disk. Whole-file rewrites, single writer only.
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offers currently in the file. A missing or unreadable file is empty.
    pub fn load(&self) -> Vec<OfferRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(offers) => offers,
            Err(e) => {
                warn!("Ignoring corrupt {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn append(&self, offer: &OfferRecord) -> Result<()> {
        let mut offers = self.load();
        offers.push(offer.clone());
        self.save(&offers)
    }

    /// Replaces the file with `offers`.
    pub fn save(&self, offers: &[OfferRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(offers).context("Failed to serialize offers")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(title: &str) -> OfferRecord {
        OfferRecord::new(title, "hellowork")
    }

    #[test]
    fn test_append_creates_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("data").join("fallback.json"));

        store.append(&offer("QA")).unwrap();
        store.append(&offer("Testeur")).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "QA");
        assert_eq!(loaded[1].title, "Testeur");
    }

    #[test]
    fn test_append_to_corrupt_file_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, "{not json").unwrap();

        let store = LocalStore::new(&path);
        store.append(&offer("QA")).unwrap();
        assert_eq!(store.load(), vec![offer("QA")]);
    }

    #[test]
    fn test_save_overwrites_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("results.json"));

        store.save(&[offer("A"), offer("B")]).unwrap();
        store.save(&[offer("C")]).unwrap();
        assert_eq!(store.load(), vec![offer("C")]);
    }

    #[test]
    fn test_saved_json_keeps_non_ascii() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("results.json"));
        store.save(&[offer("Ingénieur qualité")]).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("Ingénieur qualité"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("nope.json"));
        assert!(store.load().is_empty());
    }
}
