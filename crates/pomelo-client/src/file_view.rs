//! Whole-content view of a namespace
//!
//! A `ConfigFile` exposes a namespace as one rendered body instead of
//! per-key items: properties namespaces render through the codec, other
//! formats surface the raw body the server stored under the content item.

use std::sync::Arc;

use parking_lot::Mutex;

use pomelo_common::ConfigFormat;

use crate::changes::ChangeKind;
use crate::listener::{FnChangeListener, ListenerHandle};
use crate::namespace::{NamespaceConfig, SourceType};

/// Content-level change delivered to file listeners.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    pub namespace: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub kind: ChangeKind,
}

pub struct ConfigFile {
    namespace: Arc<NamespaceConfig>,
}

impl ConfigFile {
    pub(crate) fn new(namespace: Arc<NamespaceConfig>) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &str {
        self.namespace.name()
    }

    pub fn format(&self) -> ConfigFormat {
        self.namespace.format()
    }

    pub fn source_type(&self) -> SourceType {
        self.namespace.source_type()
    }

    /// The rendered body, or `None` while the namespace has no items.
    pub fn content(&self) -> Option<String> {
        render(&self.namespace)
    }

    pub fn has_content(&self) -> bool {
        self.content().is_some_and(|c| !c.is_empty())
    }

    /// Register a content-level listener.
    ///
    /// The listener fires with the full old and new body: `Added` on first
    /// content, `Modified` on change, `Deleted` when the content vanishes.
    pub fn add_change_listener(
        &self,
        listener: impl Fn(FileChangeEvent) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let ns = self.namespace.clone();
        let last = Mutex::new(render(&self.namespace));

        self.namespace
            .add_change_listener(Arc::new(FnChangeListener::new(move |_event| {
                let new_value = render(&ns);
                let mut last = last.lock();
                if *last == new_value {
                    return;
                }
                let old_value = last.clone();
                *last = new_value.clone();

                let kind = match (&old_value, &new_value) {
                    (None, Some(_)) => ChangeKind::Added,
                    (Some(_), None) => ChangeKind::Deleted,
                    _ => ChangeKind::Modified,
                };
                listener(FileChangeEvent {
                    namespace: ns.name().to_string(),
                    old_value,
                    new_value,
                    kind,
                });
            })))
    }

    pub fn remove_change_listener(&self, handle: ListenerHandle) -> bool {
        self.namespace.remove_change_listener(handle)
    }
}

fn render(ns: &NamespaceConfig) -> Option<String> {
    let items = ns.items();
    if items.is_empty() {
        return None;
    }
    Some(ns.format().render(&items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ClientMetrics;
    use pomelo_common::{CONTENT_KEY, Items};
    use std::sync::Mutex as StdMutex;

    fn namespace(name: &str) -> Arc<NamespaceConfig> {
        Arc::new(NamespaceConfig::new(
            "app1",
            "default",
            name,
            Arc::new(ClientMetrics::default()),
        ))
    }

    fn items(pairs: &[(&str, &str)]) -> Items {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_properties_content_renders_items() {
        let ns = namespace("application");
        ns.adopt(None, Some(1), items(&[("a", "1"), ("b", "2")]), SourceType::Remote);

        let file = ConfigFile::new(ns);
        assert_eq!(file.content().as_deref(), Some("a=1\nb=2\n"));
        assert!(file.has_content());
        assert_eq!(file.format(), ConfigFormat::Properties);
    }

    #[test]
    fn test_raw_format_exposes_content_item() {
        let ns = namespace("rules.json");
        ns.adopt(
            None,
            Some(1),
            items(&[(CONTENT_KEY, "{\"on\":true}")]),
            SourceType::Remote,
        );

        let file = ConfigFile::new(ns);
        assert_eq!(file.format(), ConfigFormat::Json);
        assert_eq!(file.content().as_deref(), Some("{\"on\":true}"));
    }

    #[test]
    fn test_empty_namespace_has_no_content() {
        let file = ConfigFile::new(namespace("application"));
        assert_eq!(file.content(), None);
        assert!(!file.has_content());
        assert_eq!(file.source_type(), SourceType::None);
    }

    #[test]
    fn test_content_listener_lifecycle() {
        let ns = namespace("application");
        let file = ConfigFile::new(ns.clone());

        let events: Arc<StdMutex<Vec<FileChangeEvent>>> = Arc::new(StdMutex::new(Vec::new()));
        let e2 = events.clone();
        file.add_change_listener(move |event| e2.lock().unwrap().push(event));

        ns.adopt(None, Some(1), items(&[("k", "v1")]), SourceType::Remote);
        ns.adopt(None, Some(2), items(&[("k", "v2")]), SourceType::Remote);
        ns.adopt(None, Some(3), items(&[]), SourceType::Remote);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].kind, ChangeKind::Added);
        assert_eq!(events[0].old_value, None);
        assert_eq!(events[0].new_value.as_deref(), Some("k=v1\n"));

        assert_eq!(events[1].kind, ChangeKind::Modified);
        assert_eq!(events[1].old_value.as_deref(), Some("k=v1\n"));
        assert_eq!(events[1].new_value.as_deref(), Some("k=v2\n"));

        assert_eq!(events[2].kind, ChangeKind::Deleted);
        assert_eq!(events[2].new_value, None);
    }

    #[test]
    fn test_remove_content_listener() {
        let ns = namespace("application");
        let file = ConfigFile::new(ns.clone());
        let count = Arc::new(StdMutex::new(0));
        let c2 = count.clone();
        let handle = file.add_change_listener(move |_| *c2.lock().unwrap() += 1);

        ns.adopt(None, Some(1), items(&[("k", "v1")]), SourceType::Remote);
        assert!(file.remove_change_listener(handle));
        ns.adopt(None, Some(2), items(&[("k", "v2")]), SourceType::Remote);

        assert_eq!(*count.lock().unwrap(), 1);
    }
}
