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

//! Error types, one enum per concern.
//!
//! Producer-side validation and encoding failures surface as
//! [`MessageError`] and abort the caller's transaction. Storage and
//! transport failures observed by the relay are never fatal: the relay
//! logs them, emits hooks, and leaves the row for a later cycle. The only
//! way out of [`Relay::run`](crate::Relay::run) is cancellation.

use thiserror::Error;

/// Rejected or unencodable producer input.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The message has no topic.
    #[error("topic is required")]
    MissingTopic,

    /// The message has no body.
    #[error("body is required")]
    MissingBody,

    /// The body could not be encoded as JSON.
    #[error("failed to marshal payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure inside a store operation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A pooled connection could not be obtained or the blocking task died.
    #[error("connection pool error: {0}")]
    ConnectionPool(String),

    /// The database rejected a statement.
    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    /// `claim` was called with a zero batch size.
    #[error("batch size must be positive")]
    InvalidBatchSize,

    /// A stored row could not be decoded back into an envelope.
    #[error("corrupt outbox row: {0}")]
    Corrupt(String),

    /// `add` was handed an invalid message.
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Failure reported by a [`Sender`](crate::Sender).
///
/// Transport errors are policy input, not crashes: the relay converts each
/// one into a retry or a terminal failure.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub Box<dyn std::error::Error + Send + Sync>);

impl TransportError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(source.into())
    }
}

/// Termination signal from the relay loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The cancellation token fired.
    #[error("relay cancelled")]
    Cancelled,
}
