//! Long-poll notification payloads

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One entry of the `/notifications/v2` response array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigNotification {
    pub namespace_name: String,

    /// Notification ID (monotonically increasing)
    pub notification_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<NotificationMessages>,
}

impl ConfigNotification {
    pub fn new(namespace_name: String, notification_id: i64) -> Self {
        Self {
            namespace_name,
            notification_id,
            messages: None,
        }
    }

    pub fn with_messages(
        namespace_name: String,
        notification_id: i64,
        messages: NotificationMessages,
    ) -> Self {
        Self {
            namespace_name,
            notification_id,
            messages: Some(messages),
        }
    }
}

/// Per-watch-key detail map attached to a notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessages {
    /// Map of watch keys to their notification IDs
    pub details: HashMap<String, i64>,
}

impl NotificationMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: String, notification_id: i64) {
        self.details.insert(key, notification_id);
    }

    /// Merge another detail map, keeping the highest id per key.
    pub fn merge(&mut self, other: NotificationMessages) {
        for (key, id) in other.details {
            self.details
                .entry(key)
                .and_modify(|e| {
                    if id > *e {
                        *e = id;
                    }
                })
                .or_insert(id);
        }
    }
}

/// One entry of the url-encoded `notifications` request array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub namespace_name: String,

    /// Client's current notification ID (-1 for a brand-new namespace)
    pub notification_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_serialization() {
        let notification = ConfigNotification::new("application".to_string(), 100);
        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("namespaceName"));
        assert!(json.contains("notificationId"));
        assert!(!json.contains("messages")); // None should be skipped
    }

    #[test]
    fn test_notification_with_messages() {
        let mut messages = NotificationMessages::new();
        messages.add("app1+default+application".to_string(), 100);

        let notification =
            ConfigNotification::with_messages("application".to_string(), 100, messages);

        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("messages"));
        assert!(json.contains("details"));
    }

    #[test]
    fn test_messages_merge_keeps_highest() {
        let mut a = NotificationMessages::new();
        a.add("k".to_string(), 3);
        let mut b = NotificationMessages::new();
        b.add("k".to_string(), 7);
        b.add("other".to_string(), 1);

        a.merge(b);
        assert_eq!(a.details["k"], 7);
        assert_eq!(a.details["other"], 1);

        let mut lower = NotificationMessages::new();
        lower.add("k".to_string(), 2);
        a.merge(lower);
        assert_eq!(a.details["k"], 7);
    }

    #[test]
    fn test_request_array_parse() {
        let json = r#"[{"namespaceName":"application","notificationId":-1}]"#;
        let requests: Vec<NotificationRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].namespace_name, "application");
        assert_eq!(requests[0].notification_id, -1);
    }
}
