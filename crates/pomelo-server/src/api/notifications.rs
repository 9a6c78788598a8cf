//! Notification endpoint handler
//!
//! GET `/notifications/v2` - long polling for config updates

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use pomelo_common::NotificationRequest;

use crate::hub::{HubError, WatchHub};

/// Query parameters for the notifications endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQueryParams {
    pub app_id: String,

    pub cluster: String,

    /// URL-encoded JSON array of `{"namespaceName":...,"notificationId":...}`
    pub notifications: String,

    #[serde(default)]
    pub ip: Option<String>,
}

impl NotificationQueryParams {
    pub fn parse_notifications(&self) -> Result<Vec<NotificationRequest>, serde_json::Error> {
        serde_json::from_str(&self.notifications)
    }
}

/// Long-poll for notifications.
///
/// Holds the request until any watched namespace advances past the id the
/// client sent, then answers with the advanced subset.
///
/// ## Response
/// - 200 OK: array of notifications for advanced namespaces
/// - 304 Not Modified: hold timed out with no advance
/// - 400 Bad Request: malformed `notifications` array or oversized batch
/// - 503 Service Unavailable: waiter capacity exceeded
pub async fn get_notifications(
    hub: web::Data<Arc<WatchHub>>,
    query: web::Query<NotificationQueryParams>,
) -> HttpResponse {
    let requests = match query.parse_notifications() {
        Ok(requests) => requests,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse notifications parameter");
            return HttpResponse::BadRequest().json(serde_json::json!({
                "status": 400,
                "message": format!("invalid notifications format: {}", e),
            }));
        }
    };

    match hub.poll(&query.app_id, &query.cluster, requests).await {
        Ok(changed) if changed.is_empty() => HttpResponse::NotModified().finish(),
        Ok(changed) => HttpResponse::Ok().json(changed),
        Err(e @ HubError::BatchTooLarge(_)) => HttpResponse::BadRequest().json(
            serde_json::json!({ "status": 400, "message": e.to_string() }),
        ),
        Err(e @ HubError::CapacityExceeded) => HttpResponse::ServiceUnavailable().json(
            serde_json::json!({ "status": 503, "message": e.to_string() }),
        ),
    }
}
