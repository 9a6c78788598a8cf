//! Change listeners and registrations

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::changes::ChangeEvent;

/// Trait for receiving config change events.
pub trait ConfigChangeListener: Send + Sync + 'static {
    /// Called after a release with at least one matching change is adopted.
    fn on_change(&self, event: &ChangeEvent);
}

/// A listener that invokes a closure.
pub struct FnChangeListener<F>
where
    F: Fn(&ChangeEvent) + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnChangeListener<F>
where
    F: Fn(&ChangeEvent) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ConfigChangeListener for FnChangeListener<F>
where
    F: Fn(&ChangeEvent) + Send + Sync + 'static,
{
    fn on_change(&self, event: &ChangeEvent) {
        (self.f)(event);
    }
}

/// Identity of one registration, used for removal. Registering the same
/// listener twice yields two handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub(crate) u64);

/// One registered listener with its interest filters.
#[derive(Clone)]
pub(crate) struct Registration {
    pub handle: ListenerHandle,
    pub listener: Arc<dyn ConfigChangeListener>,
    pub interested_keys: Option<HashSet<String>>,
    pub interested_prefixes: Option<HashSet<String>>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("handle", &self.handle)
            .field("interested_keys", &self.interested_keys)
            .field("interested_prefixes", &self.interested_prefixes)
            .finish()
    }
}

impl Registration {
    /// A change matches when either filter accepts it; no filters accept all.
    pub fn matches(&self, key: &str) -> bool {
        match (&self.interested_keys, &self.interested_prefixes) {
            (None, None) => true,
            (keys, prefixes) => {
                keys.as_ref().is_some_and(|set| set.contains(key))
                    || prefixes
                        .as_ref()
                        .is_some_and(|set| set.iter().any(|p| key.starts_with(p.as_str())))
            }
        }
    }
}

/// Deliver an event to one registration, restricted to its matching keys.
///
/// Returns `false` when the listener panicked; the panic is contained so
/// later listeners still run.
pub(crate) fn deliver(registration: &Registration, event: &ChangeEvent) -> bool {
    let restricted = event.restricted_to(|key| registration.matches(key));
    if restricted.is_empty() {
        return true;
    }
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        registration.listener.on_change(&restricted);
    }));
    if outcome.is_err() {
        tracing::error!(
            namespace = restricted.namespace(),
            "change listener panicked"
        );
        return false;
    }
    true
}
