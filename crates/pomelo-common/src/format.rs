//! Namespace format handling
//!
//! A namespace name may carry a format suffix (`config.json`, `logback.xml`);
//! absence implies properties. Non-properties namespaces keep their whole
//! body under the single [`CONTENT_KEY`] item, so rendering them is a lookup
//! while properties render through the codec.

use crate::properties;
use crate::release::Items;

/// Item key carrying the raw body of a non-properties namespace
pub const CONTENT_KEY: &str = "content";

/// Configuration formats recognized by namespace suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Properties,
    Json,
    Yaml,
    Yml,
    Xml,
    Txt,
}

/// One row per format: its namespace suffix and HTTP content type.
const FORMATS: &[(ConfigFormat, &str, &str)] = &[
    (ConfigFormat::Properties, "properties", "text/plain;charset=UTF-8"),
    (ConfigFormat::Json, "json", "application/json;charset=UTF-8"),
    (ConfigFormat::Yaml, "yaml", "text/yaml;charset=UTF-8"),
    (ConfigFormat::Yml, "yml", "text/yaml;charset=UTF-8"),
    (ConfigFormat::Xml, "xml", "application/xml;charset=UTF-8"),
    (ConfigFormat::Txt, "txt", "text/plain;charset=UTF-8"),
];

impl ConfigFormat {
    /// Detect format from a namespace name's suffix. Unrecognized suffixes
    /// are part of the name, not a format, and read as properties.
    pub fn from_namespace(namespace: &str) -> Self {
        let Some((_, suffix)) = namespace.rsplit_once('.') else {
            return ConfigFormat::Properties;
        };
        let suffix = suffix.to_lowercase();
        FORMATS
            .iter()
            .find(|(_, known, _)| *known == suffix)
            .map(|(format, _, _)| *format)
            .unwrap_or(ConfigFormat::Properties)
    }

    /// Content type for HTTP responses
    pub fn content_type(&self) -> &'static str {
        FORMATS
            .iter()
            .find(|(format, _, _)| format == self)
            .map(|(_, _, content_type)| *content_type)
            .unwrap_or("text/plain;charset=UTF-8")
    }

    pub fn is_properties(&self) -> bool {
        matches!(self, ConfigFormat::Properties)
    }

    /// Render the raw body for `/configfiles` and the ConfigFile view.
    pub fn render(&self, items: &Items) -> String {
        if self.is_properties() {
            properties::serialize(items)
        } else {
            items.get(CONTENT_KEY).cloned().unwrap_or_default()
        }
    }
}
