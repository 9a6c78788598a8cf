//! Release storage
//!
//! The service only ever reads "the current release" of a namespace and
//! learns about publishes through a subscription; everything else about
//! persistence is behind [`ReleaseStore`]. The bundled in-memory
//! implementation is the unit of deployment for tests and single-node use.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

use pomelo_common::{Items, NsKey, Release, content_fingerprint, generate_release_key};

/// Capacity of the publish fan-out channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Publish event delivered to subscribers.
///
/// Delivery is at-least-once; consumers must tolerate duplicates and wake
/// only when the id exceeds what they have already seen.
#[derive(Debug, Clone)]
pub struct ReleaseEvent {
    pub key: NsKey,
    pub notification_id: i64,
}

/// Read interface the service consumes.
#[async_trait]
pub trait ReleaseStore: Send + Sync + 'static {
    /// Current release of a namespace, if any has been published.
    async fn get_current(&self, key: &NsKey) -> Option<Release>;

    /// Publish a new snapshot. The notification id always advances, even
    /// when the content (and therefore the release key) is unchanged.
    async fn publish(&self, key: &NsKey, items: Items) -> Release;

    /// Subscribe to publish events.
    fn subscribe(&self) -> broadcast::Receiver<ReleaseEvent>;
}

/// In-memory [`ReleaseStore`].
pub struct MemoryReleaseStore {
    releases: DashMap<String, Release>,
    /// Namespace counter survives release replacement so ids never regress
    notification_ids: DashMap<String, Arc<AtomicI64>>,
    events: broadcast::Sender<ReleaseEvent>,
}

impl MemoryReleaseStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            releases: DashMap::new(),
            notification_ids: DashMap::new(),
            events,
        }
    }

    fn next_notification_id(&self, watch_key: &str) -> i64 {
        let counter = self
            .notification_ids
            .entry(watch_key.to_string())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .clone();
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for MemoryReleaseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseStore for MemoryReleaseStore {
    async fn get_current(&self, key: &NsKey) -> Option<Release> {
        self.releases.get(&key.watch_key()).map(|r| r.clone())
    }

    async fn publish(&self, key: &NsKey, items: Items) -> Release {
        let watch_key = key.watch_key();
        let fingerprint = content_fingerprint(&items);
        let notification_id = self.next_notification_id(&watch_key);

        let release = match self.releases.entry(watch_key) {
            Entry::Occupied(mut occupied) => {
                // Re-publishing identical content keeps the release key
                // stable so clients on that key keep seeing 304s.
                let (release_key, current_id) = {
                    let current = occupied.get();
                    let key = if !current.release_key.is_empty()
                        && content_fingerprint(&current.items) == fingerprint
                    {
                        current.release_key.clone()
                    } else {
                        generate_release_key(&fingerprint)
                    };
                    (key, current.notification_id)
                };
                let release = Release::new(release_key, notification_id, items);
                // A concurrent publish may have landed with a higher id;
                // the current release never regresses.
                if current_id < notification_id {
                    occupied.insert(release.clone());
                }
                release
            }
            Entry::Vacant(vacant) => {
                let release =
                    Release::new(generate_release_key(&fingerprint), notification_id, items);
                vacant.insert(release.clone());
                release
            }
        };

        tracing::debug!(
            namespace = %key,
            notification_id,
            release_key = %release.release_key,
            "published release"
        );

        // No receivers is fine; waiters subscribe on demand
        let _ = self.events.send(ReleaseEvent {
            key: key.clone(),
            notification_id,
        });

        release
    }

    fn subscribe(&self) -> broadcast::Receiver<ReleaseEvent> {
        self.events.subscribe()
    }
}
