//! Typed operations on a single queue.
//!
//! A [`Queue`] is a thin handle: a name plus a borrowed [`Client`]. Every
//! method is one API call; nothing is cached. Reserving or peeking on an
//! empty queue yields [`IronError::QueueEmpty`] rather than an HTTP error,
//! since an empty queue is a normal state consumers poll through.

use crate::client::Client;
use crate::error::{IronError, Result};
use crate::types::{
    Alert, Ids, Message, MessageOptions, MessagesContainer, QueueEnvelope, QueueModel, Subscriber,
    SubscriberStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reservation timeout applied when the caller does not pick one, in
/// seconds. Matches the service's own default.
pub const DEFAULT_RESERVE_TIMEOUT_SECS: u32 = 120;

/// A handle to one named queue.
pub struct Queue<'a> {
    client: &'a Client,
    name: String,
}

impl<'a> Queue<'a> {
    pub(crate) fn new(client: &'a Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn path(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("queues/{}", self.name)
        } else {
            format!("queues/{}/{}", self.name, suffix)
        }
    }

    // Messages

    /// Push one message body; returns its id.
    pub async fn push(&self, body: impl Into<String>) -> Result<String> {
        self.push_message(&Message::new(body), &MessageOptions::default())
            .await
    }

    /// Push one message with explicit options; returns its id.
    pub async fn push_message(&self, message: &Message, options: &MessageOptions) -> Result<String> {
        let ids = self.push_messages(std::slice::from_ref(message), options).await?;
        ids.ids
            .into_iter()
            .next()
            .ok_or_else(|| IronError::Message("service returned no id for the pushed message".into()))
    }

    /// Push a batch of messages in one request; ids come back in order.
    pub async fn push_messages(
        &self,
        messages: &[Message],
        options: &MessageOptions,
    ) -> Result<Ids> {
        let payload = PushPayload {
            messages: messages
                .iter()
                .map(|m| PushMessage {
                    body: &m.body,
                    delay: options.delay,
                    push_headers: options.push_headers.as_ref(),
                })
                .collect(),
        };
        let body = self.client.post(&self.path("messages"), &payload).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Reserve one message with the default timeout.
    pub async fn reserve(&self) -> Result<Message> {
        let mut messages = self
            .reserve_messages(1, DEFAULT_RESERVE_TIMEOUT_SECS, 0)
            .await?;
        if messages.is_empty() {
            return Err(IronError::QueueEmpty);
        }
        Ok(messages.remove(0))
    }

    /// Reserve up to `n` messages.
    ///
    /// `timeout` is how long the reservation holds, in seconds; `wait` is
    /// how long the service long-polls an empty queue before answering.
    /// An empty result is returned as-is: batch callers see `[]`, not an
    /// error.
    pub async fn reserve_messages(&self, n: u32, timeout: u32, wait: u32) -> Result<Vec<Message>> {
        let payload = ReservePayload { n, timeout, wait };
        let body = self
            .client
            .post(&self.path("reservations"), &payload)
            .await?;
        let container: MessagesContainer = serde_json::from_str(&body)?;
        Ok(container.messages)
    }

    /// Look at the next message without reserving it.
    pub async fn peek(&self) -> Result<Message> {
        let mut messages = self.peek_messages(1).await?;
        if messages.is_empty() {
            return Err(IronError::QueueEmpty);
        }
        Ok(messages.remove(0))
    }

    /// Look at up to `n` upcoming messages without reserving them.
    pub async fn peek_messages(&self, n: u32) -> Result<Vec<Message>> {
        let body = self
            .client
            .get(&self.path(&format!("messages?n={n}")))
            .await?;
        let container: MessagesContainer = serde_json::from_str(&body)?;
        Ok(container.messages)
    }

    /// Delete a reserved message. The reservation id proves the caller
    /// still holds the message.
    pub async fn delete_message(&self, message: &Message) -> Result<()> {
        let id = message
            .id
            .as_deref()
            .ok_or_else(|| IronError::Message("message has no id".into()))?;
        self.delete_message_by_id(id, message.reservation_id.as_deref())
            .await
    }

    /// Delete one message by id, with the reservation id when it is held.
    pub async fn delete_message_by_id(
        &self,
        id: &str,
        reservation_id: Option<&str>,
    ) -> Result<()> {
        let payload = ReservationRef { reservation_id };
        self.client
            .delete_with_body(&self.path(&format!("messages/{id}")), &payload)
            .await?;
        Ok(())
    }

    /// Delete a batch of messages in one request.
    pub async fn delete_messages(&self, messages: &[Message]) -> Result<()> {
        let payload = DeleteBatch {
            ids: messages
                .iter()
                .filter_map(|m| {
                    m.id.as_deref().map(|id| DeleteRef {
                        id,
                        reservation_id: m.reservation_id.as_deref(),
                    })
                })
                .collect(),
        };
        self.client
            .delete_with_body(&self.path("messages"), &payload)
            .await?;
        Ok(())
    }

    /// Extend a reservation by the queue's timeout; returns the new
    /// reservation id.
    pub async fn touch_message(&self, message: &mut Message) -> Result<()> {
        let id = message
            .id
            .as_deref()
            .ok_or_else(|| IronError::Message("message has no id".into()))?;
        let payload = ReservationRef {
            reservation_id: message.reservation_id.as_deref(),
        };
        let body = self
            .client
            .post(&self.path(&format!("messages/{id}/touch")), &payload)
            .await?;
        let response: TouchResponse = serde_json::from_str(&body)?;
        if let Some(fresh) = response.reservation_id {
            message.reservation_id = Some(fresh);
        }
        Ok(())
    }

    /// Put a reserved message back on the queue, optionally delayed.
    pub async fn release_message(&self, message: &Message, delay: u64) -> Result<()> {
        let id = message
            .id
            .as_deref()
            .ok_or_else(|| IronError::Message("message has no id".into()))?;
        let payload = ReleasePayload {
            reservation_id: message.reservation_id.as_deref(),
            delay,
        };
        self.client
            .post(&self.path(&format!("messages/{id}/release")), &payload)
            .await?;
        Ok(())
    }

    /// Acknowledge delivery of a pushed message on behalf of one
    /// subscriber, taking it out of that subscriber's retry loop.
    pub async fn delete_push_message(
        &self,
        message_id: &str,
        reservation_id: &str,
        subscriber_name: &str,
    ) -> Result<()> {
        let payload = PushAck {
            reservation_id,
            subscriber_name,
        };
        self.client
            .delete_with_body(&self.path(&format!("messages/{message_id}")), &payload)
            .await?;
        Ok(())
    }

    /// Delivery status of each subscriber for a pushed message.
    pub async fn push_statuses(&self, message_id: &str) -> Result<Vec<SubscriberStatus>> {
        let body = self
            .client
            .get(&self.path(&format!("messages/{message_id}/subscribers")))
            .await?;
        let container: StatusContainer = serde_json::from_str(&body)?;
        Ok(container.subscribers)
    }

    // Queue lifecycle

    /// Queue metadata and settings.
    pub async fn info(&self) -> Result<QueueModel> {
        let envelope: QueueEnvelope = self.client.get_json(&self.path("")).await?;
        Ok(envelope.queue)
    }

    /// Current message count.
    pub async fn size(&self) -> Result<u64> {
        Ok(self.info().await?.size.unwrap_or(0))
    }

    /// Create or update the queue; unset fields are left untouched
    /// server-side.
    pub async fn update(&self, model: &QueueModel) -> Result<QueueModel> {
        let payload = QueueEnvelope {
            queue: model.clone(),
        };
        let body = self.client.patch(&self.path(""), &payload).await?;
        let envelope: QueueEnvelope = serde_json::from_str(&body)?;
        Ok(envelope.queue)
    }

    /// Remove every message. The queue itself survives.
    pub async fn clear(&self) -> Result<()> {
        self.client
            .delete_with_body(&self.path("messages"), &Empty {})
            .await?;
        Ok(())
    }

    /// Delete the queue and everything on it.
    pub async fn destroy(&self) -> Result<()> {
        self.client.delete(&self.path("")).await?;
        Ok(())
    }

    // Push queue subscribers

    /// Add subscribers, keeping existing ones.
    pub async fn add_subscribers(&self, subscribers: &[Subscriber]) -> Result<()> {
        let payload = SubscriberList { subscribers };
        self.client
            .post(&self.path("subscribers"), &payload)
            .await?;
        Ok(())
    }

    /// Replace the whole subscriber set.
    pub async fn replace_subscribers(&self, subscribers: &[Subscriber]) -> Result<()> {
        let payload = SubscriberList { subscribers };
        self.client.put(&self.path("subscribers"), &payload).await?;
        Ok(())
    }

    /// Remove the named subscribers.
    pub async fn remove_subscribers(&self, subscribers: &[Subscriber]) -> Result<()> {
        let payload = SubscriberList { subscribers };
        self.client
            .delete_with_body(&self.path("subscribers"), &payload)
            .await?;
        Ok(())
    }

    // Alerts

    /// Add alerts, keeping existing ones.
    pub async fn add_alerts(&self, alerts: &[Alert]) -> Result<()> {
        let payload = AlertList { alerts };
        self.client.post(&self.path("alerts"), &payload).await?;
        Ok(())
    }

    /// Replace the whole alert set.
    pub async fn replace_alerts(&self, alerts: &[Alert]) -> Result<()> {
        let payload = AlertList { alerts };
        self.client.put(&self.path("alerts"), &payload).await?;
        Ok(())
    }

    /// Delete one alert by id.
    pub async fn delete_alert(&self, alert_id: &str) -> Result<()> {
        self.client
            .delete(&self.path(&format!("alerts/{alert_id}")))
            .await?;
        Ok(())
    }

    /// URL external producers can POST bodies to; carries the token as a
    /// query parameter, so treat it as a secret.
    pub async fn webhook_url(&self) -> Result<String> {
        let token = self.client.auth_token().await?;
        Ok(format!(
            "{}?oauth={}",
            self.client.url_for(&self.path("webhook")),
            token
        ))
    }
}

#[derive(Serialize)]
struct PushPayload<'a> {
    messages: Vec<PushMessage<'a>>,
}

#[derive(Serialize)]
struct PushMessage<'a> {
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    push_headers: Option<&'a HashMap<String, String>>,
}

#[derive(Serialize)]
struct ReservePayload {
    n: u32,
    timeout: u32,
    wait: u32,
}

#[derive(Serialize)]
struct ReservationRef<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reservation_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ReleasePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reservation_id: Option<&'a str>,
    delay: u64,
}

#[derive(Serialize)]
struct DeleteBatch<'a> {
    ids: Vec<DeleteRef<'a>>,
}

#[derive(Serialize)]
struct DeleteRef<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reservation_id: Option<&'a str>,
}

#[derive(Serialize)]
struct SubscriberList<'a> {
    subscribers: &'a [Subscriber],
}

#[derive(Serialize)]
struct AlertList<'a> {
    alerts: &'a [Alert],
}

#[derive(Serialize)]
struct PushAck<'a> {
    reservation_id: &'a str,
    subscriber_name: &'a str,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Deserialize)]
struct TouchResponse {
    #[serde(default)]
    reservation_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusContainer {
    subscribers: Vec<SubscriberStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_payload_shape() {
        let options = MessageOptions {
            delay: Some(30),
            push_headers: None,
        };
        let payload = PushPayload {
            messages: vec![PushMessage {
                body: "job-1",
                delay: options.delay,
                push_headers: options.push_headers.as_ref(),
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"messages": [{"body": "job-1", "delay": 30}]})
        );
    }

    #[test]
    fn test_reserve_payload_shape() {
        let payload = ReservePayload {
            n: 3,
            timeout: DEFAULT_RESERVE_TIMEOUT_SECS,
            wait: 0,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"n": 3, "timeout": 120, "wait": 0}));
    }

    #[test]
    fn test_delete_batch_skips_messages_without_ids() {
        let messages = vec![
            Message {
                id: Some("a".into()),
                reservation_id: Some("r1".into()),
                ..Message::new("x")
            },
            Message::new("never pushed"),
        ];
        let payload = DeleteBatch {
            ids: messages
                .iter()
                .filter_map(|m| {
                    m.id.as_deref().map(|id| DeleteRef {
                        id,
                        reservation_id: m.reservation_id.as_deref(),
                    })
                })
                .collect(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ids": [{"id": "a", "reservation_id": "r1"}]})
        );
    }
}
