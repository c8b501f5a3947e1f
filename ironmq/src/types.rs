//! Typed representations of IronMQ API payloads.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message on a queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// Message id, assigned by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Message body.
    pub body: String,
    /// How many times this message has been reserved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_count: Option<u32>,
    /// Reservation id, present on reserved messages; needed to delete,
    /// touch, or release the message while reserved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
}

impl Message {
    /// A message with just a body, ready to push.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }
}

/// Options applied to a message when pushing it onto a queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageOptions {
    /// Seconds to hold the message before it becomes available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    /// Extra headers delivered with the message on push queues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_headers: Option<HashMap<String, String>>,
}

/// Ids returned from a batch push.
#[derive(Debug, Clone, Deserialize)]
pub struct Ids {
    /// One id per pushed message, in order.
    pub ids: Vec<String>,
    /// Service acknowledgement message.
    #[serde(default)]
    pub msg: Option<String>,
}

/// Queue metadata and settings.
///
/// Every field is optional: the same shape serves list entries (name only),
/// full info responses, and sparse update payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueModel {
    /// Queue name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning project id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Current number of messages on the queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Total count of messages ever placed on the queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_messages: Option<u64>,
    /// Default reservation timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_timeout: Option<u64>,
    /// Seconds until an unconsumed message expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_expiration: Option<u64>,
    /// Queue type: `pull`, `multicast`, or `unicast`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub queue_type: Option<String>,
    /// Push settings; present on push queues only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushInfo>,
    /// Alerts configured on the queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<Alert>>,
}

/// Push-queue delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushInfo {
    /// Registered delivery targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<Vec<Subscriber>>,
    /// Delivery attempts per subscriber before giving up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Seconds between delivery attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries_delay: Option<u32>,
    /// Queue that receives messages no subscriber accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_queue: Option<String>,
}

/// A push-delivery target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscriber {
    /// Subscriber name, unique within the queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Delivery URL.
    pub url: String,
    /// Headers sent with each delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl Subscriber {
    /// A subscriber with just a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Delivery status of one subscriber for a pushed message.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberStatus {
    /// Subscriber name.
    #[serde(default)]
    pub name: Option<String>,
    /// Delivery URL.
    pub url: String,
    /// Last HTTP status returned by the target.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Delivery state, e.g. `deleted`, `reserved`, `retrying`.
    #[serde(default)]
    pub status: Option<String>,
    /// Remaining delivery attempts.
    #[serde(default)]
    pub retries_remaining: Option<u32>,
}

/// A size-threshold alert on a queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Alert {
    /// Alert id, assigned by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `fixed` or `progressive`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `asc` (size rising past the trigger) or `desc` (falling).
    pub direction: String,
    /// Queue size that fires the alert.
    pub trigger: u64,
    /// Seconds to suppress repeat alerts after firing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snooze: Option<u64>,
    /// Queue that receives the alert message.
    pub queue: String,
}

impl Alert {
    /// Fires every time size crosses the trigger.
    pub const TYPE_FIXED: &'static str = "fixed";
    /// Fires at trigger, trigger*2, trigger*4, ...
    pub const TYPE_PROGRESSIVE: &'static str = "progressive";
    /// Fires while the queue is growing.
    pub const DIRECTION_ASCENDING: &'static str = "asc";
    /// Fires while the queue is draining.
    pub const DIRECTION_DESCENDING: &'static str = "desc";
}

/// Envelope for endpoints that wrap a queue: `{"queue": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEnvelope {
    /// The wrapped queue.
    pub queue: QueueModel,
}

/// Envelope for the queue list: `{"queues": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueuesContainer {
    /// Queues, in lexicographic order.
    pub queues: Vec<QueueModel>,
}

/// Envelope for message lists: `{"messages": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesContainer {
    /// The wrapped messages.
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_message_parses() {
        let body = r#"{
            "id": "5924626476601696digest",
            "body": "hello",
            "reserved_count": 2,
            "reservation_id": "def456"
        }"#;
        let msg: Message = serde_json::from_str(body).unwrap();
        assert_eq!(msg.body, "hello");
        assert_eq!(msg.reservation_id.as_deref(), Some("def456"));
    }

    #[test]
    fn test_queue_info_parses() {
        let body = r#"{
            "queue": {
                "name": "jobs",
                "project_id": "abc",
                "size": 7,
                "total_messages": 12,
                "type": "multicast",
                "push": {
                    "subscribers": [{"name": "worker-1", "url": "http://example.com/hook"}],
                    "retries": 3,
                    "retries_delay": 60
                }
            }
        }"#;
        let envelope: QueueEnvelope = serde_json::from_str(body).unwrap();
        let queue = envelope.queue;
        assert_eq!(queue.size, Some(7));
        assert_eq!(queue.queue_type.as_deref(), Some("multicast"));
        let push = queue.push.unwrap();
        assert_eq!(push.subscribers.unwrap()[0].url, "http://example.com/hook");
    }

    #[test]
    fn test_alert_serializes_with_type_key() {
        let alert = Alert {
            kind: Alert::TYPE_FIXED.into(),
            direction: Alert::DIRECTION_ASCENDING.into(),
            trigger: 100,
            queue: "overflow".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "fixed");
        assert_eq!(json["direction"], "asc");
        assert!(json.get("snooze").is_none());
    }

    #[test]
    fn test_sparse_queue_update_omits_unset_fields() {
        let update = QueueModel {
            message_timeout: Some(120),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"message_timeout":120}"#);
    }
}
