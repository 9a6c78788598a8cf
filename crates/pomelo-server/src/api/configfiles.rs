//! Configfiles endpoint handlers
//!
//! GET `/configfiles/{appId}/{cluster}/{namespace}` - rendered text body
//! GET `/configfiles/json/{appId}/{cluster}/{namespace}` - items as JSON object

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use pomelo_common::{ConfigFormat, NsKey};

use crate::branch::BranchResolver;

#[derive(Debug, Deserialize)]
pub struct ConfigFilesPath {
    pub app_id: String,
    pub cluster: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFilesQuery {
    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub label: Option<String>,
}

/// Get the namespace body rendered in its declared format.
pub async fn get_configfiles(
    resolver: web::Data<Arc<dyn BranchResolver>>,
    path: web::Path<ConfigFilesPath>,
    query: web::Query<ConfigFilesQuery>,
) -> HttpResponse {
    let key = NsKey::new(&path.app_id, &path.cluster, &path.namespace);

    match resolver
        .resolve(&key, query.ip.as_deref(), query.label.as_deref())
        .await
    {
        Some(release) => {
            let format = ConfigFormat::from_namespace(&path.namespace);
            HttpResponse::Ok()
                .content_type(format.content_type())
                .body(format.render(&release.items))
        }
        None => HttpResponse::NotFound().body("config not found"),
    }
}

/// Get the namespace items as a JSON object.
pub async fn get_configfiles_json(
    resolver: web::Data<Arc<dyn BranchResolver>>,
    path: web::Path<ConfigFilesPath>,
    query: web::Query<ConfigFilesQuery>,
) -> HttpResponse {
    let key = NsKey::new(&path.app_id, &path.cluster, &path.namespace);

    match resolver
        .resolve(&key, query.ip.as_deref(), query.label.as_deref())
        .await
    {
        Some(release) => HttpResponse::Ok().json(release.items),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "status": 404,
            "message": format!("namespace {} not found", key),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configfiles_path_deserialize() {
        let json = r#"{"app_id":"app1","cluster":"default","namespace":"config.json"}"#;
        let path: ConfigFilesPath = serde_json::from_str(json).unwrap();
        assert_eq!(path.namespace, "config.json");
    }
}
