//! Release snapshots and the config wire body

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Ordered configuration items. Insertion order is the server's item order
/// and is preserved on the wire.
pub type Items = IndexMap<String, String>;

/// Immutable snapshot of a namespace's items at a publish point.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    /// Opaque ETag-like identifier, charset `[A-Za-z0-9_-]`
    pub release_key: String,

    /// Monotonically increasing change counter for the namespace
    pub notification_id: i64,

    /// Item map in publish order
    pub items: Items,

    /// Server-side publish time
    pub published_at: DateTime<Utc>,
}

impl Release {
    pub fn new(release_key: String, notification_id: i64, items: Items) -> Self {
        Self {
            release_key,
            notification_id,
            items,
            published_at: Utc::now(),
        }
    }
}

/// Response body of `GET /configs/{appId}/{cluster}/{namespace}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomeloConfig {
    pub app_id: String,

    pub cluster: String,

    pub namespace_name: String,

    /// Key-value pairs in the server's item order
    pub configurations: Items,

    /// Release key for version tracking
    pub release_key: String,
}

impl PomeloConfig {
    pub fn new(
        app_id: String,
        cluster: String,
        namespace_name: String,
        configurations: Items,
        release_key: String,
    ) -> Self {
        Self {
            app_id,
            cluster,
            namespace_name,
            configurations,
            release_key,
        }
    }

    pub fn empty(app_id: String, cluster: String, namespace_name: String) -> Self {
        Self {
            app_id,
            cluster,
            namespace_name,
            configurations: Items::new(),
            release_key: String::new(),
        }
    }
}

/// MD5 hex digest over the canonical `key=value` rendering of the items.
///
/// The canonical form is key-sorted so fingerprints are independent of
/// publish order.
pub fn content_fingerprint(items: &Items) -> String {
    let mut lines: Vec<String> = items.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    lines.sort();
    let mut hasher = Md5::new();
    hasher.update(lines.join("\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Release key: `{yyyymmddhhmmss}-{fingerprint prefix}`.
///
/// Identical content republished within the same second reuses the key,
/// which conditional GET tolerates; different content always differs.
pub fn generate_release_key(fingerprint: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let prefix = if fingerprint.len() >= 8 {
        &fingerprint[..8]
    } else {
        fingerprint
    };
    format!("{}-{}", timestamp, prefix)
}
