/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Domain carriers for the outbox: producer input and leased rows.
//!
//! [`Message`] is what a producer enqueues inside its own transaction;
//! [`Envelope`] is the read-only snapshot of a row the relay has leased and
//! is about to hand to a sender. Neither type carries Diesel derives; the
//! store adapters convert at the database boundary.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// An application-level event queued inside a database transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Logical event or routing destination (e.g. `"order.created"`).
    pub topic: String,
    /// Optional partition/idempotency key for downstream consumers.
    pub key: Option<String>,
    /// User payload, encoded to JSON at construction.
    pub body: serde_json::Value,
}

impl Message {
    /// Builds a message, encoding the body as JSON.
    pub fn new(topic: impl Into<String>, body: &impl Serialize) -> Result<Self, MessageError> {
        Ok(Self {
            topic: topic.into(),
            key: None,
            body: serde_json::to_value(body)?,
        })
    }

    /// Sets the partition/idempotency key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Returns the JSON payload to store, after validating the message.
    pub fn payload(&self) -> Result<&serde_json::Value, MessageError> {
        self.validate()?;
        Ok(&self.body)
    }

    fn validate(&self) -> Result<(), MessageError> {
        if self.topic.is_empty() {
            return Err(MessageError::MissingTopic);
        }
        if self.body.is_null() {
            return Err(MessageError::MissingBody);
        }
        Ok(())
    }
}

/// A row leased by the relay for delivery.
///
/// The envelope is a snapshot taken at claim time; it carries no status
/// (the row is `sending` for as long as the lease holds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Primary key of the outbox row.
    pub id: i64,
    /// Topic copied from the original message, for routing and logging.
    pub topic: String,
    /// Optional key used by senders for partitioning/idempotency.
    pub key: Option<String>,
    /// The stored JSON payload.
    pub payload: serde_json::Value,
    /// Failed attempts recorded before this lease.
    pub retry_count: i32,
    /// When the row was inserted.
    pub created_at: DateTime<Utc>,
}

impl Envelope {
    /// Decodes the payload into the requested type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
    }

    #[test]
    fn payload_encodes_body() {
        let message = Message::new("order.created", &Order { id: 42 }).unwrap();
        let payload = message.payload().unwrap();
        assert_eq!(payload, &serde_json::json!({"id": 42}));
        assert_eq!(message.key, None);
    }

    #[test]
    fn with_key_sets_key() {
        let message = Message::new("order.created", &Order { id: 1 })
            .unwrap()
            .with_key("order-1");
        assert_eq!(message.key.as_deref(), Some("order-1"));
    }

    #[test]
    fn payload_rejects_missing_topic() {
        let message = Message::new("", &Order { id: 1 }).unwrap();
        assert!(matches!(
            message.payload(),
            Err(MessageError::MissingTopic)
        ));
    }

    #[test]
    fn payload_rejects_null_body() {
        let message = Message {
            topic: "order.created".into(),
            key: None,
            body: serde_json::Value::Null,
        };
        assert!(matches!(message.payload(), Err(MessageError::MissingBody)));
    }

    #[test]
    fn envelope_decode_round_trips() {
        let envelope = Envelope {
            id: 7,
            topic: "order.created".into(),
            key: Some("order-7".into()),
            payload: serde_json::json!({"id": 7}),
            retry_count: 0,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        let order: Order = envelope.decode().unwrap();
        assert_eq!(order, Order { id: 7 });
    }

    #[test]
    fn envelope_decode_rejects_mismatched_shape() {
        let envelope = Envelope {
            id: 8,
            topic: "order.created".into(),
            key: None,
            payload: serde_json::json!(["not", "an", "order"]),
            retry_count: 0,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        assert!(envelope.decode::<Order>().is_err());
    }
}
