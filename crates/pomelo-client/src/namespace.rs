//! Per-namespace configuration cache
//!
//! A `NamespaceConfig` holds the current release behind an atomic reference:
//! accessors read the snapshot without locking, the refresh path swaps it
//! wholesale. Adoption is serialized so listeners observe releases in order,
//! and the snapshot is swapped before dispatch so listeners read post-change
//! state.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use pomelo_common::{ConfigFormat, Items, NsKey};

use crate::changes::{ChangeEvent, diff};
use crate::listener::{ConfigChangeListener, ListenerHandle, Registration, deliver};
use crate::metrics::ClientMetrics;

/// Process-wide interning of namespace configs, keyed by registered name.
pub(crate) type NamespaceRegistry = Arc<DashMap<String, Arc<NamespaceConfig>>>;

/// Where the current snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Remote,
    Local,
    None,
}

#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub release_key: Option<String>,
    pub notification_id: i64,
    pub items: Items,
    pub source: SourceType,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            release_key: None,
            notification_id: -1,
            items: Items::new(),
            source: SourceType::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TypeTag {
    Int,
    Long,
    Float,
    Double,
    Bool,
}

#[derive(Debug, Clone, Copy)]
enum TypedValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
}

#[derive(Debug)]
pub struct NamespaceConfig {
    /// Namespace exactly as registered, format suffix included
    name: String,
    key: NsKey,
    format: ConfigFormat,
    snapshot: ArcSwap<Snapshot>,
    typed_cache: DashMap<(String, TypeTag), TypedValue>,
    registrations: RwLock<Vec<Registration>>,
    next_handle: AtomicU64,
    /// Serializes adoption and dispatch so events reflect release order
    adopt_lock: Mutex<()>,
    metrics: Arc<ClientMetrics>,
}

impl NamespaceConfig {
    pub(crate) fn new(
        app_id: &str,
        cluster: &str,
        namespace: &str,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            name: namespace.to_string(),
            key: NsKey::new(app_id, cluster, namespace),
            format: ConfigFormat::from_namespace(namespace),
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            typed_cache: DashMap::new(),
            registrations: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            adopt_lock: Mutex::new(()),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn key(&self) -> &NsKey {
        &self.key
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    pub fn source_type(&self) -> SourceType {
        self.snapshot.load().source
    }

    pub(crate) fn release_key(&self) -> Option<String> {
        self.snapshot.load().release_key.clone()
    }

    pub(crate) fn notification_id(&self) -> i64 {
        self.snapshot.load().notification_id
    }

    pub(crate) fn items(&self) -> Items {
        self.snapshot.load().items.clone()
    }

    /// Current value for `key`, or `default` when absent. Reads memory only.
    pub fn get_property(&self, key: &str, default: &str) -> String {
        self.get_property_opt(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Current value for `key`, if present.
    pub fn get_property_opt(&self, key: &str) -> Option<String> {
        self.snapshot.load().items.get(key).cloned()
    }

    /// Snapshot of the keys in the current release, in item order.
    pub fn get_property_names(&self) -> Vec<String> {
        self.snapshot.load().items.keys().cloned().collect()
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        let cache_key = (key.to_string(), TypeTag::Int);
        if let Some(TypedValue::Int(v)) = self.typed_cache.get(&cache_key).map(|e| *e) {
            return v;
        }
        let Some(raw) = self.get_property_opt(key) else {
            return default;
        };
        match raw.trim().parse::<i32>() {
            Ok(v) => {
                self.typed_cache.insert(cache_key, TypedValue::Int(v));
                v
            }
            Err(_) => default,
        }
    }

    pub fn get_long(&self, key: &str, default: i64) -> i64 {
        let cache_key = (key.to_string(), TypeTag::Long);
        if let Some(TypedValue::Long(v)) = self.typed_cache.get(&cache_key).map(|e| *e) {
            return v;
        }
        let Some(raw) = self.get_property_opt(key) else {
            return default;
        };
        match raw.trim().parse::<i64>() {
            Ok(v) => {
                self.typed_cache.insert(cache_key, TypedValue::Long(v));
                v
            }
            Err(_) => default,
        }
    }

    pub fn get_float(&self, key: &str, default: f32) -> f32 {
        let cache_key = (key.to_string(), TypeTag::Float);
        if let Some(TypedValue::Float(v)) = self.typed_cache.get(&cache_key).map(|e| *e) {
            return v;
        }
        let Some(raw) = self.get_property_opt(key) else {
            return default;
        };
        match raw.trim().parse::<f32>() {
            Ok(v) => {
                self.typed_cache.insert(cache_key, TypedValue::Float(v));
                v
            }
            Err(_) => default,
        }
    }

    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        let cache_key = (key.to_string(), TypeTag::Double);
        if let Some(TypedValue::Double(v)) = self.typed_cache.get(&cache_key).map(|e| *e) {
            return v;
        }
        let Some(raw) = self.get_property_opt(key) else {
            return default;
        };
        match raw.trim().parse::<f64>() {
            Ok(v) => {
                self.typed_cache.insert(cache_key, TypedValue::Double(v));
                v
            }
            Err(_) => default,
        }
    }

    /// Booleans accept `true`/`false` case-insensitively; anything else is
    /// the default.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let cache_key = (key.to_string(), TypeTag::Bool);
        if let Some(TypedValue::Bool(v)) = self.typed_cache.get(&cache_key).map(|e| *e) {
            return v;
        }
        let Some(raw) = self.get_property_opt(key) else {
            return default;
        };
        let parsed = match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        };
        match parsed {
            Some(v) => {
                self.typed_cache.insert(cache_key, TypedValue::Bool(v));
                v
            }
            None => default,
        }
    }

    /// Split the value on `separator`; an empty separator yields the whole
    /// value as a single element.
    pub fn get_array(&self, key: &str, separator: &str) -> Option<Vec<String>> {
        let raw = self.get_property_opt(key)?;
        if separator.is_empty() {
            return Some(vec![raw]);
        }
        Some(raw.split(separator).map(|s| s.to_string()).collect())
    }

    /// Register a listener for all changes.
    pub fn add_change_listener(&self, listener: Arc<dyn ConfigChangeListener>) -> ListenerHandle {
        self.add_change_listener_with_filter(listener, None, None)
    }

    /// Register a listener with interest filters. A change is delivered when
    /// either filter accepts its key; without filters everything matches.
    pub fn add_change_listener_with_filter(
        &self,
        listener: Arc<dyn ConfigChangeListener>,
        interested_keys: Option<HashSet<String>>,
        interested_prefixes: Option<HashSet<String>>,
    ) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.registrations.write().push(Registration {
            handle,
            listener,
            interested_keys,
            interested_prefixes,
        });
        handle
    }

    /// Remove a registration; returns whether anything was removed.
    pub fn remove_change_listener(&self, handle: ListenerHandle) -> bool {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.handle != handle);
        registrations.len() != before
    }

    /// Adopt a release, firing listeners on real changes.
    ///
    /// `reported_id` is the notification id that triggered the refresh;
    /// `None` keeps the current id (initial fetch). A report older than the
    /// current snapshot is discarded.
    pub(crate) fn adopt(
        &self,
        release_key: Option<String>,
        reported_id: Option<i64>,
        items: Items,
        source: SourceType,
    ) -> Option<ChangeEvent> {
        let _guard = self.adopt_lock.lock();

        let current = self.snapshot.load_full();
        if let Some(id) = reported_id {
            if id < current.notification_id {
                tracing::debug!(
                    namespace = %self.key,
                    reported_id = id,
                    current_id = current.notification_id,
                    "discarding out-of-order release"
                );
                return None;
            }
        }

        let event = diff(&self.name, &current.items, &items);
        let next = Snapshot {
            release_key,
            notification_id: reported_id.unwrap_or(current.notification_id),
            items,
            source,
        };
        self.snapshot.store(Arc::new(next));
        self.typed_cache.clear();

        if event.is_empty() {
            return None;
        }

        // Dispatch iterates a snapshot of the registrations, so a listener
        // mutating them takes effect on the next event.
        let registrations: Vec<Registration> = self.registrations.read().clone();
        for registration in &registrations {
            if !deliver(registration, &event) {
                ClientMetrics::incr(&self.metrics.listener_failures);
            }
        }

        Some(event)
    }

    /// Record that the server confirmed the current content (a 304),
    /// advancing the notification id and marking the source remote.
    pub(crate) fn confirm_current(&self, reported_id: i64) {
        let _guard = self.adopt_lock.lock();
        let current = self.snapshot.load_full();
        if reported_id < current.notification_id {
            return;
        }
        self.snapshot.store(Arc::new(Snapshot {
            release_key: current.release_key.clone(),
            notification_id: reported_id,
            items: current.items.clone(),
            source: SourceType::Remote,
        }));
    }
}
