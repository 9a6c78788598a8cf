//! Client facade
//!
//! A `ConfigClient` owns the namespace registry and the background workers:
//! one long-poll loop discovering changes and one worker doing initial
//! loads. Namespace configs are interned on first lookup and live as long
//! as the client.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::file_view::ConfigFile;
use crate::local::LocalCacheStore;
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::namespace::{NamespaceConfig, NamespaceRegistry};
use crate::poll::{LongPollClient, Refresher};
use crate::remote::RemoteRepository;

/// Grace period for workers to wind down on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct ConfigClient {
    config: Arc<ClientConfig>,
    registry: NamespaceRegistry,
    metrics: Arc<ClientMetrics>,
    cancel: CancellationToken,
    init_tx: mpsc::UnboundedSender<Arc<NamespaceConfig>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConfigClient {
    /// Create a client and spawn its workers.
    ///
    /// Must run inside a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.app_id.trim().is_empty() {
            return Err(ClientError::InvalidArgument("app_id is required".to_string()));
        }
        if config.config_services.is_empty() {
            return Err(ClientError::InvalidArgument(
                "at least one config service address is required".to_string(),
            ));
        }

        let config = Arc::new(config);
        let metrics = Arc::new(ClientMetrics::default());
        let remote = Arc::new(RemoteRepository::new(config.clone())?);
        let cache = Arc::new(LocalCacheStore::new(config.cache_dir.clone()));
        let refresher = Arc::new(Refresher {
            remote: remote.clone(),
            cache,
            metrics: metrics.clone(),
        });
        let registry: NamespaceRegistry = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();
        let (init_tx, init_rx) = mpsc::unbounded_channel();

        let poller = LongPollClient::new(
            config.clone(),
            remote,
            registry.clone(),
            refresher.clone(),
            metrics.clone(),
            cancel.child_token(),
        );
        let workers = vec![
            tokio::spawn(poller.run()),
            tokio::spawn(run_init_worker(refresher, init_rx, cancel.child_token())),
        ];

        Ok(Self {
            config,
            registry,
            metrics,
            cancel,
            init_tx,
            workers: Mutex::new(workers),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.config.app_id
    }

    /// The config for a namespace, interned on first lookup.
    ///
    /// Returns immediately; the initial load happens in the background, so
    /// a fresh namespace answers defaults until its first release arrives.
    pub fn config(&self, namespace: &str) -> Result<Arc<NamespaceConfig>> {
        if namespace.trim().is_empty() {
            return Err(ClientError::InvalidArgument(
                "namespace is required".to_string(),
            ));
        }
        if self.cancel.is_cancelled() {
            return Err(ClientError::Shutdown);
        }

        match self.registry.entry(namespace.to_string()) {
            Entry::Occupied(occupied) => Ok(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let ns = Arc::new(NamespaceConfig::new(
                    &self.config.app_id,
                    &self.config.cluster,
                    namespace,
                    self.metrics.clone(),
                ));
                vacant.insert(ns.clone());
                tracing::debug!(namespace, "registered namespace");
                // The worker may already be gone during shutdown
                let _ = self.init_tx.send(ns.clone());
                Ok(ns)
            }
        }
    }

    /// Whole-content view of a namespace.
    pub fn config_file(&self, namespace: &str) -> Result<ConfigFile> {
        Ok(ConfigFile::new(self.config(namespace)?))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop workers, abort in-flight HTTP, and wait out the grace period.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                tracing::warn!("worker did not stop within the shutdown grace period");
            }
        }
    }
}

impl Drop for ConfigClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_init_worker(
    refresher: Arc<Refresher>,
    mut init_rx: mpsc::UnboundedReceiver<Arc<NamespaceConfig>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = init_rx.recv() => match next {
                Some(ns) => refresher.initial_load(&ns).await,
                None => break,
            }
        }
    }
    tracing::debug!("init worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_app_id() {
        let err = ConfigClient::new(ClientConfig::new("", "http://localhost:8070")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_requires_config_service() {
        let err = ConfigClient::new(ClientConfig::new("app1", "")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_rejects_empty_namespace() {
        let client = ConfigClient::new(ClientConfig::new("app1", "http://127.0.0.1:1")).unwrap();
        let err = client.config("").unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_namespace_interning() {
        let client = ConfigClient::new(ClientConfig::new("app1", "http://127.0.0.1:1")).unwrap();
        let a = client.config("application").unwrap();
        let b = client.config("application").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_lookup_after_shutdown_fails() {
        let client = ConfigClient::new(ClientConfig::new("app1", "http://127.0.0.1:1")).unwrap();
        client.shutdown().await;
        let err = client.config("application").unwrap_err();
        assert!(matches!(err, ClientError::Shutdown));
    }
}
