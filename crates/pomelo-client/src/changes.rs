//! Change classification and diffing

use indexmap::IndexMap;

use pomelo_common::Items;

/// How a key changed between two releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// A single key's transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub kind: ChangeKind,
}

impl Change {
    fn added(key: &str, new_value: &str) -> Self {
        Self {
            key: key.to_string(),
            old_value: None,
            new_value: Some(new_value.to_string()),
            kind: ChangeKind::Added,
        }
    }

    fn modified(key: &str, old_value: &str, new_value: &str) -> Self {
        Self {
            key: key.to_string(),
            old_value: Some(old_value.to_string()),
            new_value: Some(new_value.to_string()),
            kind: ChangeKind::Modified,
        }
    }

    fn deleted(key: &str, old_value: &str) -> Self {
        Self {
            key: key.to_string(),
            old_value: Some(old_value.to_string()),
            new_value: None,
            kind: ChangeKind::Deleted,
        }
    }
}

/// Changes of one release adoption, delivered to listeners.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    namespace: String,
    changes: IndexMap<String, Change>,
}

impl ChangeEvent {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn changed_keys(&self) -> Vec<&str> {
        self.changes.keys().map(|k| k.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&Change> {
        self.changes.get(key)
    }

    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.values()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The event restricted to keys accepted by `filter`.
    pub(crate) fn restricted_to(&self, filter: impl Fn(&str) -> bool) -> ChangeEvent {
        ChangeEvent {
            namespace: self.namespace.clone(),
            changes: self
                .changes
                .iter()
                .filter(|(k, _)| filter(k))
                .map(|(k, c)| (k.clone(), c.clone()))
                .collect(),
        }
    }
}

/// Classify every key of `old ∪ new`; identical values are not changes.
pub fn diff(namespace: &str, old: &Items, new: &Items) -> ChangeEvent {
    let mut changes = IndexMap::new();

    for (key, new_value) in new {
        match old.get(key) {
            None => {
                changes.insert(key.clone(), Change::added(key, new_value));
            }
            Some(old_value) if old_value != new_value => {
                changes.insert(key.clone(), Change::modified(key, old_value, new_value));
            }
            Some(_) => {}
        }
    }

    for (key, old_value) in old {
        if !new.contains_key(key) {
            changes.insert(key.clone(), Change::deleted(key, old_value));
        }
    }

    ChangeEvent {
        namespace: namespace.to_string(),
        changes,
    }
}
