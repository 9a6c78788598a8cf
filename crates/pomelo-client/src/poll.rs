//! Change discovery
//!
//! The long-poll loop batches every registered namespace into hanging GETs,
//! refreshes whatever the server reports as advanced, and backs off with
//! jitter on failure. A namespace's seen notification id is whatever its
//! snapshot carries, so a failed refresh is naturally retried on the next
//! cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use pomelo_common::{Items, NotificationRequest, PomeloConfig};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::local::LocalCacheStore;
use crate::metrics::ClientMetrics;
use crate::namespace::{NamespaceConfig, NamespaceRegistry, SourceType};
use crate::remote::RemoteRepository;

/// Idle delay while no namespace is registered yet
const EMPTY_REGISTRY_DELAY: Duration = Duration::from_millis(500);

/// Loads releases into namespace configs, with local-cache fallback.
pub(crate) struct Refresher {
    pub remote: Arc<RemoteRepository>,
    pub cache: Arc<LocalCacheStore>,
    pub metrics: Arc<ClientMetrics>,
}

impl Refresher {
    /// First load of a namespace: remote wins, the cache file is the
    /// fallback, and with neither the namespace stays empty.
    pub async fn initial_load(&self, ns: &NamespaceConfig) {
        match self
            .remote
            .fetch(ns.key(), ns.name(), ns.release_key().as_deref())
            .await
        {
            Ok(Some(config)) => self.adopt_remote(ns, config, None),
            Ok(None) => {
                ClientMetrics::incr(&self.metrics.fetch_not_modified);
            }
            Err(ClientError::NotFound(_)) => {
                // Unknown namespace reads as an empty release; a cache file
                // from a previous life still wins.
                self.fallback_to_cache(ns);
            }
            Err(e) => {
                ClientMetrics::incr(&self.metrics.fetch_failure);
                tracing::warn!(
                    namespace = %ns.key(),
                    error = %e,
                    "initial fetch failed, trying local cache"
                );
                self.fallback_to_cache(ns);
            }
        }
    }

    /// Refresh after the server reported `reported_id` for this namespace.
    ///
    /// Returns whether the notification was consumed; `false` leaves the
    /// snapshot id behind so the next poll retries.
    pub async fn refresh(&self, ns: &NamespaceConfig, reported_id: i64) -> bool {
        match self
            .remote
            .fetch(ns.key(), ns.name(), ns.release_key().as_deref())
            .await
        {
            Ok(Some(config)) => {
                self.adopt_remote(ns, config, Some(reported_id));
                true
            }
            Ok(None) => {
                // Content is already current; the id still advances
                ClientMetrics::incr(&self.metrics.fetch_not_modified);
                ns.confirm_current(reported_id);
                true
            }
            Err(ClientError::NotFound(_)) => {
                if ns.source_type() == SourceType::Local {
                    // Cache wins over a vanished namespace
                    return true;
                }
                ns.adopt(None, Some(reported_id), Items::new(), SourceType::None);
                true
            }
            Err(e) => {
                ClientMetrics::incr(&self.metrics.fetch_failure);
                tracing::warn!(namespace = %ns.key(), error = %e, "refresh fetch failed");
                false
            }
        }
    }

    fn adopt_remote(&self, ns: &NamespaceConfig, config: PomeloConfig, reported_id: Option<i64>) {
        ClientMetrics::incr(&self.metrics.fetch_success);
        ns.adopt(
            Some(config.release_key),
            reported_id,
            config.configurations,
            SourceType::Remote,
        );

        // Write-through so a restart under a dead server still has data
        match self.cache.save(
            ns.key(),
            ns.release_key().as_deref(),
            ns.notification_id(),
            &ns.items(),
        ) {
            Ok(()) => ClientMetrics::incr(&self.metrics.cache_writes),
            Err(e) => {
                ClientMetrics::incr(&self.metrics.cache_write_failures);
                tracing::warn!(namespace = %ns.key(), error = %e, "cache write failed");
            }
        }
    }

    fn fallback_to_cache(&self, ns: &NamespaceConfig) {
        if ns.source_type() != SourceType::None {
            return;
        }
        match self.cache.load(ns.key()) {
            Ok(Some(snapshot)) => {
                ClientMetrics::incr(&self.metrics.cache_fallbacks);
                tracing::info!(namespace = %ns.key(), "adopted local cache snapshot");
                ns.adopt(
                    snapshot.release_key,
                    Some(snapshot.notification_id),
                    snapshot.items,
                    SourceType::Local,
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(namespace = %ns.key(), error = %e, "cache read failed");
            }
        }
    }
}

/// The long-poll worker.
pub(crate) struct LongPollClient {
    config: Arc<ClientConfig>,
    remote: Arc<RemoteRepository>,
    registry: NamespaceRegistry,
    refresher: Arc<Refresher>,
    metrics: Arc<ClientMetrics>,
    cancel: CancellationToken,
}

impl LongPollClient {
    pub fn new(
        config: Arc<ClientConfig>,
        remote: Arc<RemoteRepository>,
        registry: NamespaceRegistry,
        refresher: Arc<Refresher>,
        metrics: Arc<ClientMetrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            remote,
            registry,
            refresher,
            metrics,
            cancel,
        }
    }

    pub async fn run(self) {
        let mut backoff = self.config.backoff_initial;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let namespaces: Vec<Arc<NamespaceConfig>> =
                self.registry.iter().map(|e| e.value().clone()).collect();
            if namespaces.is_empty() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(EMPTY_REGISTRY_DELAY) => {}
                }
                continue;
            }

            let cycle_ok = tokio::select! {
                _ = self.cancel.cancelled() => break,
                ok = self.poll_cycle(&namespaces) => ok,
            };

            if cycle_ok {
                // 200 and 304 cycles both reissue immediately
                backoff = self.config.backoff_initial;
            } else {
                let delay = jittered(backoff);
                tracing::warn!(
                    delay_ms = delay.as_millis() as u64,
                    "notification poll failed, backing off"
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                backoff = (backoff * 2).min(self.config.backoff_max);
            }
        }

        tracing::debug!("long poll worker exited");
    }

    /// One round of hanging GETs covering every registered namespace.
    /// Returns whether the whole cycle went through without poll errors.
    async fn poll_cycle(&self, namespaces: &[Arc<NamespaceConfig>]) -> bool {
        let by_name: HashMap<String, Arc<NamespaceConfig>> = namespaces
            .iter()
            .map(|ns| (ns.name().to_string(), ns.clone()))
            .collect();

        let batch_size = self.config.poll_batch_size.max(1);
        let mut polls = FuturesUnordered::new();
        for chunk in namespaces.chunks(batch_size) {
            let requests = build_requests(chunk);
            let remote = self.remote.clone();
            polls.push(async move { remote.poll_notifications(&requests).await });
        }

        let mut all_ok = true;
        while let Some(result) = polls.next().await {
            match result {
                Ok(Some(notifications)) => {
                    ClientMetrics::incr(&self.metrics.poll_success);
                    for notification in notifications {
                        let Some(ns) = by_name.get(&notification.namespace_name) else {
                            continue;
                        };
                        self.refresher
                            .refresh(ns, notification.notification_id)
                            .await;
                    }
                }
                Ok(None) => {
                    ClientMetrics::incr(&self.metrics.poll_not_modified);
                }
                Err(e) => {
                    ClientMetrics::incr(&self.metrics.poll_failure);
                    tracing::warn!(error = %e, "notification poll error");
                    all_ok = false;
                }
            }
        }

        if all_ok {
            // The server is reachable again; move namespaces still living
            // off cache (or nothing) back to remote snapshots.
            for ns in namespaces {
                if ns.source_type() != SourceType::Remote {
                    self.refresher.refresh(ns, ns.notification_id()).await;
                }
            }
        }

        all_ok
    }
}

fn build_requests(namespaces: &[Arc<NamespaceConfig>]) -> Vec<NotificationRequest> {
    namespaces
        .iter()
        .map(|ns| NotificationRequest {
            namespace_name: ns.name().to_string(),
            notification_id: ns.notification_id(),
        })
        .collect()
}

/// ±25% jitter around the base delay.
fn jittered(base: Duration) -> Duration {
    let factor: f64 = rand::rng().random_range(0.75..=1.25);
    base.mul_f64(factor)
}
