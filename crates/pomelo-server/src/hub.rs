//! Watch hub
//!
//! Matches publish events to long-poll waiters. A poll first checks the
//! store for namespaces that already advanced past the client's ids and
//! returns immediately if any did; otherwise it parks on the publish stream
//! until a watched namespace advances or the hold timeout elapses.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;

use pomelo_common::{ConfigNotification, NotificationMessages, NotificationRequest, NsKey};

use crate::store::ReleaseStore;

/// Default server-side hold time for a long poll
pub const DEFAULT_HOLD_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum namespaces in one poll batch
pub const MAX_POLL_BATCH: usize = 32;

/// Default bound on concurrent parked waiters
pub const DEFAULT_MAX_WAITERS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("too many namespaces in one poll: {0} (max {MAX_POLL_BATCH})")]
    BatchTooLarge(usize),

    #[error("waiter capacity exceeded")]
    CapacityExceeded,
}

pub struct WatchHub {
    store: Arc<dyn ReleaseStore>,
    hold_timeout: Duration,
    max_waiters: usize,
    waiters: AtomicUsize,
}

/// One watched namespace within a poll.
struct Watched {
    key: NsKey,
    watch_key: String,
    /// Namespace name exactly as the client sent it
    namespace_name: String,
    requested_id: i64,
}

impl WatchHub {
    pub fn new(store: Arc<dyn ReleaseStore>, hold_timeout: Duration, max_waiters: usize) -> Self {
        Self {
            store,
            hold_timeout,
            max_waiters,
            waiters: AtomicUsize::new(0),
        }
    }

    /// Number of currently parked waiters.
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }

    /// Long-poll for changes to any of the requested namespaces.
    ///
    /// Returns the (possibly partial) set of namespaces whose server-side
    /// notification id exceeds the requested id. An empty result means the
    /// hold timed out with no advance; the endpoint answers 304.
    pub async fn poll(
        &self,
        app_id: &str,
        cluster: &str,
        requests: Vec<NotificationRequest>,
    ) -> Result<Vec<ConfigNotification>, HubError> {
        if requests.len() > MAX_POLL_BATCH {
            return Err(HubError::BatchTooLarge(requests.len()));
        }

        let watched: Vec<Watched> = requests
            .into_iter()
            .map(|req| {
                let key = NsKey::new(app_id, cluster, &req.namespace_name);
                let watch_key = key.watch_key();
                Watched {
                    key,
                    watch_key,
                    namespace_name: req.namespace_name,
                    requested_id: req.notification_id,
                }
            })
            .collect();

        // Subscribe before the snapshot check so a publish landing between
        // the two is seen on the stream instead of being missed.
        let mut events = self.store.subscribe();

        let changed = self.collect_advanced(&watched).await;
        if !changed.is_empty() {
            return Ok(changed);
        }

        if self.waiters.fetch_add(1, Ordering::SeqCst) >= self.max_waiters {
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            return Err(HubError::CapacityExceeded);
        }
        // Decrements on wake, timeout, and client disconnect alike
        let _guard = WaiterGuard(&self.waiters);

        let held = timeout(self.hold_timeout, async {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let relevant = watched.iter().any(|w| {
                            w.key == event.key && event.notification_id > w.requested_id
                        });
                        if !relevant {
                            continue;
                        }
                        // Wake with every advanced namespace, not just the
                        // one whose event arrived.
                        let changed = self.collect_advanced(&watched).await;
                        if !changed.is_empty() {
                            return changed;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "publish stream lagged, re-checking watched set");
                        let changed = self.collect_advanced(&watched).await;
                        if !changed.is_empty() {
                            return changed;
                        }
                    }
                    Err(RecvError::Closed) => return Vec::new(),
                }
            }
        })
        .await;

        Ok(held.unwrap_or_default())
    }

    /// Namespaces whose current id exceeds what the client asked with.
    async fn collect_advanced(&self, watched: &[Watched]) -> Vec<ConfigNotification> {
        let mut changed = Vec::new();
        for w in watched {
            let Some(release) = self.store.get_current(&w.key).await else {
                // Unknown namespaces never advance; existence is not leaked
                continue;
            };
            if release.notification_id > w.requested_id {
                let mut messages = NotificationMessages::new();
                messages.add(w.watch_key.clone(), release.notification_id);
                changed.push(ConfigNotification::with_messages(
                    w.namespace_name.clone(),
                    release.notification_id,
                    messages,
                ));
            }
        }
        changed
    }
}

struct WaiterGuard<'a>(&'a AtomicUsize);

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryReleaseStore;
    use pomelo_common::Items;

    fn request(namespace: &str, id: i64) -> NotificationRequest {
        NotificationRequest {
            namespace_name: namespace.to_string(),
            notification_id: id,
        }
    }

    fn items(pairs: &[(&str, &str)]) -> Items {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn hub_with_store(hold: Duration) -> (Arc<MemoryReleaseStore>, WatchHub) {
        let store = Arc::new(MemoryReleaseStore::new());
        let hub = WatchHub::new(store.clone(), hold, DEFAULT_MAX_WAITERS);
        (store, hub)
    }

    #[tokio::test]
    async fn test_immediate_return_when_already_advanced() {
        let (store, hub) = hub_with_store(Duration::from_secs(30));
        let key = NsKey::new("app1", "default", "application");
        store.publish(&key, items(&[("k", "v")])).await;

        let result = hub
            .poll("app1", "default", vec![request("application", -1)])
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].namespace_name, "application");
        assert_eq!(result[0].notification_id, 1);
        let messages = result[0].messages.as_ref().unwrap();
        assert_eq!(messages.details["app1+default+application"], 1);
    }

    #[tokio::test]
    async fn test_timeout_returns_empty() {
        let (_store, hub) = hub_with_store(Duration::from_millis(50));

        let result = hub
            .poll("app1", "default", vec![request("application", 3)])
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_wakes_on_publish() {
        let (store, hub) = hub_with_store(Duration::from_secs(10));
        let store2 = store.clone();

        let publisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let key = NsKey::new("app1", "default", "application");
            store2.publish(&key, items(&[("k", "v")])).await;
        });

        let result = hub
            .poll("app1", "default", vec![request("application", -1)])
            .await
            .unwrap();
        publisher.await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].notification_id, 1);
    }

    #[tokio::test]
    async fn test_wake_reports_all_advanced_namespaces() {
        let (store, hub) = hub_with_store(Duration::from_secs(10));
        let store2 = store.clone();

        let publisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let a = NsKey::new("app1", "default", "ns-a");
            let b = NsKey::new("app1", "default", "ns-b");
            store2.publish(&a, items(&[("k", "v")])).await;
            store2.publish(&b, items(&[("k", "v")])).await;
        });

        let result = hub
            .poll(
                "app1",
                "default",
                vec![request("ns-a", -1), request("ns-b", -1)],
            )
            .await
            .unwrap();
        publisher.await.unwrap();

        // The second publish may or may not have landed when the first
        // event wakes the waiter; ns-a is always present.
        assert!(result.iter().any(|n| n.namespace_name == "ns-a"));
    }

    #[tokio::test]
    async fn test_irrelevant_publish_does_not_wake() {
        let (store, hub) = hub_with_store(Duration::from_millis(100));
        let store2 = store.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let other = NsKey::new("other-app", "default", "application");
            store2.publish(&other, items(&[("k", "v")])).await;
        });

        let result = hub
            .poll("app1", "default", vec![request("application", -1)])
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_stale_request_id_returns_current() {
        let (store, hub) = hub_with_store(Duration::from_secs(10));
        let key = NsKey::new("app1", "default", "application");
        store.publish(&key, items(&[("k", "v1")])).await;
        store.publish(&key, items(&[("k", "v2")])).await;

        let result = hub
            .poll("app1", "default", vec![request("application", 1)])
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].notification_id, 2);
    }

    #[tokio::test]
    async fn test_batch_too_large_rejected() {
        let (_store, hub) = hub_with_store(Duration::from_secs(1));
        let requests: Vec<NotificationRequest> = (0..MAX_POLL_BATCH + 1)
            .map(|i| request(&format!("ns-{}", i), -1))
            .collect();

        let err = hub.poll("app1", "default", requests).await.unwrap_err();
        assert!(matches!(err, HubError::BatchTooLarge(n) if n == MAX_POLL_BATCH + 1));
    }

    #[tokio::test]
    async fn test_waiter_cap_rejected_with_capacity_error() {
        let store = Arc::new(MemoryReleaseStore::new());
        let hub = Arc::new(WatchHub::new(store.clone(), Duration::from_secs(5), 1));

        let hub2 = hub.clone();
        let parked = tokio::spawn(async move {
            hub2.poll("app1", "default", vec![request("application", -1)])
                .await
        });

        // Let the first waiter park
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hub.waiter_count(), 1);

        let err = hub
            .poll("app1", "default", vec![request("application", -1)])
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::CapacityExceeded));

        // Unpark the first waiter so the test ends promptly
        store
            .publish(
                &NsKey::new("app1", "default", "application"),
                items(&[("k", "v")]),
            )
            .await;
        let woken = parked.await.unwrap().unwrap();
        assert_eq!(woken.len(), 1);
        assert_eq!(hub.waiter_count(), 0);
    }
}
