//! Namespace identity
//!
//! A configuration bundle is addressed by `(appId, cluster, namespace)`.
//! The same triple is used as the watch key on the notification path and,
//! percent-encoded, as the local cache file name.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Default cluster name
pub const DEFAULT_CLUSTER: &str = "default";

/// Default namespace name
pub const DEFAULT_NAMESPACE: &str = "application";

/// Separator used in watch keys and cache file names
pub const KEY_SEPARATOR: &str = "+";

/// Characters that survive unencoded in cache file names: `[A-Za-z0-9._-]`
const FILE_NAME_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'_')
    .remove(b'-');

/// Identity of a namespace within an app and cluster.
///
/// `namespace` may carry a format suffix (`config.json`); a bare name implies
/// the properties format. The `.properties` suffix is normalized away on
/// construction since it names the default format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NsKey {
    pub app_id: String,
    pub cluster: String,
    pub namespace: String,
}

impl NsKey {
    pub fn new(app_id: &str, cluster: &str, namespace: &str) -> Self {
        let cluster = if cluster.is_empty() {
            DEFAULT_CLUSTER
        } else {
            cluster
        };
        Self {
            app_id: app_id.to_string(),
            cluster: cluster.to_string(),
            namespace: normalize_namespace(namespace).to_string(),
        }
    }

    /// Watch-key string: `{appId}+{cluster}+{namespace}`
    pub fn watch_key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.app_id,
            self.cluster,
            self.namespace,
            sep = KEY_SEPARATOR
        )
    }

    /// Parse a watch-key string back into its parts.
    pub fn parse_watch_key(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('+').collect();
        if parts.len() == 3 {
            Some(Self {
                app_id: parts[0].to_string(),
                cluster: parts[1].to_string(),
                namespace: parts[2].to_string(),
            })
        } else {
            None
        }
    }

    /// Local cache file name: `{appId}+{cluster}+{namespace}.properties`,
    /// each component percent-encoded outside `[A-Za-z0-9._-]`.
    pub fn cache_file_name(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}.properties",
            encode_component(&self.app_id),
            encode_component(&self.cluster),
            encode_component(&self.namespace),
            sep = KEY_SEPARATOR
        )
    }
}

/// Parse a cache file name produced by [`NsKey::cache_file_name`].
pub fn parse_cache_file_name(name: &str) -> Option<NsKey> {
    let stem = name.strip_suffix(".properties")?;
    let parts: Vec<&str> = stem.split('+').collect();
    if parts.len() != 3 {
        return None;
    }
    let decode = |s: &str| {
        percent_encoding::percent_decode_str(s)
            .decode_utf8()
            .ok()
            .map(|c| c.to_string())
    };
    Some(NsKey {
        app_id: decode(parts[0])?,
        cluster: decode(parts[1])?,
        namespace: decode(parts[2])?,
    })
}

impl std::fmt::Display for NsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}+{}", self.app_id, self.cluster, self.namespace)
    }
}

/// Strip the `.properties` suffix; it names the default format.
pub fn normalize_namespace(namespace: &str) -> &str {
    namespace.strip_suffix(".properties").unwrap_or(namespace)
}

fn encode_component(component: &str) -> String {
    utf8_percent_encode(component, FILE_NAME_KEEP).to_string()
}
