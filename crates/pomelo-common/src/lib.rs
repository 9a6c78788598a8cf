//! Shared models and codecs for Pomelo
//!
//! This crate holds everything both sides of the wire agree on: namespace
//! identity, release snapshots, notification payloads, the properties codec,
//! and format-suffix handling.

pub mod format;
pub mod key;
pub mod notification;
pub mod properties;
pub mod release;

pub use format::{CONTENT_KEY, ConfigFormat};
pub use key::{DEFAULT_CLUSTER, DEFAULT_NAMESPACE, NsKey, parse_cache_file_name};
pub use notification::{ConfigNotification, NotificationMessages, NotificationRequest};
pub use release::{Items, PomeloConfig, Release, content_fingerprint, generate_release_key};
