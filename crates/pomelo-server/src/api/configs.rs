//! Config endpoint handler
//!
//! GET `/configs/{appId}/{cluster}/{namespace}`

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use pomelo_common::{NsKey, PomeloConfig};

use crate::branch::BranchResolver;

/// Path parameters for the config endpoint
#[derive(Debug, Deserialize)]
pub struct ConfigPath {
    pub app_id: String,
    pub cluster: String,
    /// Namespace with optional format suffix (e.g., "application", "config.json")
    pub namespace: String,
}

/// Query parameters for the config endpoint
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigQueryParams {
    /// Client's current release key for change detection
    #[serde(default = "default_release_key")]
    pub release_key: String,

    /// Client IP address, used by branch resolution
    #[serde(default)]
    pub ip: Option<String>,

    /// Client label, used by branch resolution
    #[serde(default)]
    pub label: Option<String>,

    /// Serialized notification messages (JSON), accepted and ignored
    #[serde(default)]
    pub messages: Option<String>,
}

fn default_release_key() -> String {
    "-1".to_string()
}

/// Get the current configuration of a namespace.
///
/// ## Response
/// - 200 OK: configuration body with `releaseKey`
/// - 304 Not Modified: client's `releaseKey` matches the effective release
/// - 404 Not Found: namespace has no release
pub async fn get_config(
    resolver: web::Data<Arc<dyn BranchResolver>>,
    path: web::Path<ConfigPath>,
    query: web::Query<ConfigQueryParams>,
) -> HttpResponse {
    let key = NsKey::new(&path.app_id, &path.cluster, &path.namespace);

    let release = match resolver
        .resolve(&key, query.ip.as_deref(), query.label.as_deref())
        .await
    {
        Some(release) => release,
        None => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "status": 404,
                "message": format!("namespace {} not found", key),
            }));
        }
    };

    if query.release_key == release.release_key {
        return HttpResponse::NotModified().finish();
    }

    HttpResponse::Ok().json(PomeloConfig::new(
        key.app_id,
        key.cluster,
        key.namespace,
        release.items,
        release.release_key,
    ))
}
