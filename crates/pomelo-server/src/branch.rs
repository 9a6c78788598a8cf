//! Branch resolution seam
//!
//! Gray releases make the effective release depend on who is asking. Rule
//! evaluation lives behind [`BranchResolver`]; the default resolver always
//! answers with the main release.

use std::sync::Arc;

use async_trait::async_trait;

use pomelo_common::{NsKey, Release};

use crate::store::ReleaseStore;

/// Resolves the release a particular client should see.
#[async_trait]
pub trait BranchResolver: Send + Sync + 'static {
    async fn resolve(
        &self,
        key: &NsKey,
        client_ip: Option<&str>,
        label: Option<&str>,
    ) -> Option<Release>;
}

/// Resolver that ignores the client and serves the main release.
pub struct MainBranchResolver {
    store: Arc<dyn ReleaseStore>,
}

impl MainBranchResolver {
    pub fn new(store: Arc<dyn ReleaseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BranchResolver for MainBranchResolver {
    async fn resolve(
        &self,
        key: &NsKey,
        _client_ip: Option<&str>,
        _label: Option<&str>,
    ) -> Option<Release> {
        self.store.get_current(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryReleaseStore;
    use pomelo_common::Items;

    #[tokio::test]
    async fn test_main_resolver_serves_current_release() {
        let store = Arc::new(MemoryReleaseStore::new());
        let key = NsKey::new("app1", "default", "application");
        let mut items = Items::new();
        items.insert("k".to_string(), "v".to_string());
        let published = store.publish(&key, items).await;

        let resolver = MainBranchResolver::new(store);
        let resolved = resolver
            .resolve(&key, Some("10.0.0.1"), None)
            .await
            .unwrap();
        assert_eq!(resolved.release_key, published.release_key);

        let missing = NsKey::new("app1", "default", "missing");
        assert!(resolver.resolve(&missing, None, None).await.is_none());
    }
}
