//! Push notifications and the deduplication ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::mirror::json_id;

/// Notification body posted by the marketplace.
///
/// Ids arrive as numbers or strings depending on the topic, so both are
/// normalized to strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotification {
    #[serde(default, alias = "_id", deserialize_with = "optional_id")]
    pub id: Option<String>,
    pub resource: String,
    pub topic: String,
    #[serde(deserialize_with = "required_id")]
    pub user_id: String,
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub sent: Option<String>,
    #[serde(default)]
    pub received: Option<String>,
}

impl WebhookNotification {
    /// Natural deduplication key.
    ///
    /// The provider event id when present; otherwise the `{topic, resource,
    /// user_id}` tuple. `sent` changes on every delivery attempt, so it is
    /// not part of the key.
    #[must_use]
    pub fn event_id(&self) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}|{}|{}", self.topic.trim(), self.resource.trim(), self.user_id.trim()),
        }
    }

    /// Trailing path segment of the resource URL (`/orders/123` -> `123`).
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        resource_id_from_path(&self.resource)
    }
}

/// Extract the trailing, non-empty path segment of a resource path.
#[must_use]
pub fn resource_id_from_path(resource: &str) -> Option<&str> {
    let path = resource.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/').rsplit('/').next().filter(|segment| !segment.is_empty())
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(json_id(&value))
}

fn required_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    json_id(&value).ok_or_else(|| serde::de::Error::custom("expected a string or numeric id"))
}

/// Durable record of a received notification.
///
/// The unique constraint on `event_id` is what rejects redeliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookLedgerEntry {
    pub event_id: String,
    pub topic: String,
    pub resource: String,
    pub seller_id: String,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub payload: String,
    /// Times the recovery sweep re-enqueued this entry.
    #[serde(default)]
    pub requeue_count: u32,
}

impl WebhookLedgerEntry {
    /// Unprocessed entry for a freshly received notification.
    #[must_use]
    pub fn received(notification: &WebhookNotification, payload: String) -> Self {
        Self {
            event_id: notification.event_id(),
            topic: notification.topic.clone(),
            resource: notification.resource.clone(),
            seller_id: notification.user_id.clone(),
            received_at: Utc::now(),
            processed: false,
            processed_at: None,
            payload,
            requeue_count: 0,
        }
    }
}

/// Outcome of ingesting a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Accepted,
    Duplicate,
}

impl IngestOutcome {
    /// Status string returned to the marketplace.
    #[must_use]
    pub fn as_status(self) -> &'static str {
        match self {
            Self::Accepted => "ok",
            Self::Duplicate => "duplicate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_numeric_ids() {
        let notification: WebhookNotification = serde_json::from_str(
            r#"{"_id":"abc","resource":"/orders/2000","topic":"orders_v2","user_id":123456,"attempts":1}"#,
        )
        .unwrap();
        assert_eq!(notification.id.as_deref(), Some("abc"));
        assert_eq!(notification.user_id, "123456");
        assert_eq!(notification.resource_id(), Some("2000"));
        assert_eq!(notification.event_id(), "abc");
    }

    #[test]
    fn test_event_id_falls_back_to_tuple() {
        let notification: WebhookNotification = serde_json::from_str(
            r#"{"resource":"/items/MLA1","topic":"items","user_id":"7","sent":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(notification.event_id(), "items|/items/MLA1|7");
    }

    /// Validates that redeliveries of an id-less event share one key.
    #[test]
    fn test_fallback_key_ignores_delivery_timestamps() {
        let first: WebhookNotification = serde_json::from_str(
            r#"{"resource":"/orders/9","topic":"orders_v2","user_id":7,"attempts":1,"sent":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let redelivery: WebhookNotification = serde_json::from_str(
            r#"{"resource":"/orders/9","topic":"orders_v2","user_id":7,"attempts":2,"sent":"2024-01-01T00:05:00Z"}"#,
        )
        .unwrap();
        assert_eq!(first.event_id(), redelivery.event_id());
    }

    #[test]
    fn test_resource_id_extraction() {
        assert_eq!(resource_id_from_path("/questions/555"), Some("555"));
        assert_eq!(resource_id_from_path("/shipments/44/"), Some("44"));
        assert_eq!(resource_id_from_path("/items/MLA9?attributes=id"), Some("MLA9"));
        assert_eq!(resource_id_from_path("/"), None);
        assert_eq!(resource_id_from_path(""), None);
    }

    #[test]
    fn test_missing_user_id_is_rejected() {
        let result: Result<WebhookNotification, _> =
            serde_json::from_str(r#"{"resource":"/items/1","topic":"items"}"#);
        assert!(result.is_err());
    }
}
