//! Pomelo client SDK
//!
//! Keeps per-namespace configuration warm in memory, discovers changes over
//! a long-poll notification loop, falls back to an on-disk cache when the
//! service is unreachable, and dispatches fine-grained change events to
//! registered listeners.
//!
//! ```no_run
//! use pomelo_client::{ClientConfig, ConfigClient};
//!
//! # async fn example() -> pomelo_client::Result<()> {
//! let client = ConfigClient::new(ClientConfig::new("my-app", "http://localhost:8070"))?;
//! let config = client.config("application")?;
//! let timeout = config.get_int("request.timeout", 30);
//! # let _ = timeout;
//! # Ok(())
//! # }
//! ```

pub mod changes;
pub mod client;
pub mod config;
pub mod error;
pub mod file_view;
pub mod listener;
pub mod local;
pub mod metrics;
pub mod namespace;
mod poll;
pub mod remote;
pub mod sign;

pub use changes::{Change, ChangeEvent, ChangeKind};
pub use client::ConfigClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use file_view::{ConfigFile, FileChangeEvent};
pub use listener::{ConfigChangeListener, FnChangeListener, ListenerHandle};
pub use local::{CachedSnapshot, LocalCacheStore};
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use namespace::{NamespaceConfig, SourceType};
pub use remote::RemoteRepository;
