//! Local cache store
//!
//! One file per namespace under the cache directory keeps the last-known
//! good snapshot so reads survive server outages and process restarts.
//! Files are written whole to a temp file and renamed into place; a torn
//! write can never corrupt the previous snapshot.
//!
//! File format:
//! ```text
//! #releaseKey=20241015123456-abc123de
//! #notificationId=6
//! k1=v1
//! k2=v2
//! ```
//! with key-sorted, properties-escaped lines.

use std::io::Write;
use std::path::{Path, PathBuf};

use pomelo_common::{Items, NsKey, properties};

use crate::error::{ClientError, Result};

const RELEASE_KEY_HEADER: &str = "#releaseKey=";
const NOTIFICATION_ID_HEADER: &str = "#notificationId=";

/// Snapshot recovered from a cache file.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub release_key: Option<String>,
    pub notification_id: i64,
    pub items: Items,
}

pub struct LocalCacheStore {
    dir: PathBuf,
}

impl LocalCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &NsKey) -> PathBuf {
        self.dir.join(key.cache_file_name())
    }

    /// Persist a snapshot with an atomic replace.
    pub fn save(
        &self,
        key: &NsKey,
        release_key: Option<&str>,
        notification_id: i64,
        items: &Items,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let mut sorted: Vec<(&String, &String)> = items.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let sorted_items: Items = sorted
            .into_iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut body = String::new();
        body.push_str(RELEASE_KEY_HEADER);
        body.push_str(release_key.unwrap_or(""));
        body.push('\n');
        body.push_str(NOTIFICATION_ID_HEADER);
        body.push_str(&notification_id.to_string());
        body.push('\n');
        body.push_str(&properties::serialize(&sorted_items));

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.persist(self.path_for(key))
            .map_err(|e| ClientError::Io(e.error))?;
        Ok(())
    }

    /// Load the cached snapshot for a namespace, if one exists.
    pub fn load(&self, key: &NsKey) -> Result<Option<CachedSnapshot>> {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut release_key = None;
        let mut notification_id = -1;
        for line in content.lines() {
            if let Some(value) = line.strip_prefix(RELEASE_KEY_HEADER) {
                if !value.is_empty() {
                    release_key = Some(value.to_string());
                }
            } else if let Some(value) = line.strip_prefix(NOTIFICATION_ID_HEADER) {
                notification_id = value.trim().parse().unwrap_or(-1);
            }
        }

        Ok(Some(CachedSnapshot {
            release_key,
            notification_id,
            // Header lines are comments to the codec
            items: properties::parse(&content),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(pairs: &[(&str, &str)]) -> Items {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path());
        let key = NsKey::new("app1", "default", "application");

        let snapshot = items(&[("k1", "v1-new"), ("k3", "v3")]);
        store.save(&key, Some("r2"), 6, &snapshot).unwrap();

        let loaded = store.load(&key).unwrap().unwrap();
        assert_eq!(loaded.release_key.as_deref(), Some("r2"));
        assert_eq!(loaded.notification_id, 6);
        assert_eq!(loaded.items, snapshot);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path());
        let key = NsKey::new("app1", "default", "application");
        assert!(store.load(&key).unwrap().is_none());
    }

    #[test]
    fn test_file_is_key_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path());
        let key = NsKey::new("app1", "default", "application");

        store
            .save(&key, Some("r1"), 1, &items(&[("zebra", "1"), ("alpha", "2")]))
            .unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("app1+default+application.properties"))
                .unwrap();
        let alpha = content.find("alpha=").unwrap();
        let zebra = content.find("zebra=").unwrap();
        assert!(alpha < zebra);
        assert!(content.starts_with("#releaseKey=r1\n#notificationId=1\n"));
    }

    #[test]
    fn test_values_survive_escaping() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path());
        let key = NsKey::new("app1", "default", "application");

        let snapshot = items(&[
            ("multi", "line1\nline2"),
            ("url", "jdbc:mysql://host/db?x=1"),
            ("lead", "  spaced"),
            ("empty", ""),
        ]);
        store.save(&key, None, 2, &snapshot).unwrap();

        let loaded = store.load(&key).unwrap().unwrap();
        assert_eq!(loaded.release_key, None);
        assert_eq!(loaded.items, snapshot);
    }

    #[test]
    fn test_overwrite_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path());
        let key = NsKey::new("app1", "default", "application");

        store.save(&key, Some("r1"), 1, &items(&[("k", "old")])).unwrap();
        store.save(&key, Some("r2"), 2, &items(&[("k", "new")])).unwrap();

        let loaded = store.load(&key).unwrap().unwrap();
        assert_eq!(loaded.release_key.as_deref(), Some("r2"));
        assert_eq!(loaded.items.get("k"), Some(&"new".to_string()));
    }

    #[test]
    fn test_unsafe_namespace_names_get_encoded_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path());
        let key = NsKey::new("my app", "default", "ns/1");

        store.save(&key, Some("r1"), 1, &items(&[("k", "v")])).unwrap();
        assert!(dir.path().join("my%20app+default+ns%2F1.properties").exists());
        assert!(store.load(&key).unwrap().is_some());
    }
}
