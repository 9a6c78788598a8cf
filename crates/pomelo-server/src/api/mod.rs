//! HTTP endpoint handlers

pub mod configfiles;
pub mod configs;
pub mod notifications;
pub mod route;

pub use route::{config_routes, configure_routes};
