//! Seed-directory bootstrap
//!
//! The binary can preload releases from a directory of
//! `{appId}+{cluster}+{namespace}.properties` files, the same naming the
//! client cache uses. Files that do not match the naming are skipped.

use std::path::Path;

use pomelo_common::{parse_cache_file_name, properties};

use crate::store::ReleaseStore;

/// Publish one release per recognizable file. Returns how many loaded.
pub async fn load_seed_dir(store: &dyn ReleaseStore, dir: &Path) -> anyhow::Result<usize> {
    let mut loaded = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(key) = parse_cache_file_name(name) else {
            tracing::warn!(file = name, "skipping seed file with unrecognized name");
            continue;
        };

        let content = std::fs::read_to_string(&path)?;
        let items = properties::parse(&content);
        let release = store.publish(&key, items).await;
        tracing::info!(
            namespace = %key,
            release_key = %release.release_key,
            "seeded release"
        );
        loaded += 1;
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryReleaseStore;
    use pomelo_common::NsKey;

    #[tokio::test]
    async fn test_load_seed_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app1+default+application.properties"),
            "k1=v1\nk2=v2\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a seed").unwrap();

        let store = MemoryReleaseStore::new();
        let loaded = load_seed_dir(&store, dir.path()).await.unwrap();
        assert_eq!(loaded, 1);

        let key = NsKey::new("app1", "default", "application");
        let release = store.get_current(&key).await.unwrap();
        assert_eq!(release.items.get("k1"), Some(&"v1".to_string()));
        assert_eq!(release.notification_id, 1);
    }

    #[tokio::test]
    async fn test_load_seed_dir_decodes_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("my%20app+default+config.json.properties"),
            "content={}\n",
        )
        .unwrap();

        let store = MemoryReleaseStore::new();
        let loaded = load_seed_dir(&store, dir.path()).await.unwrap();
        assert_eq!(loaded, 1);

        let key = NsKey::new("my app", "default", "config.json");
        assert!(store.get_current(&key).await.is_some());
    }
}
