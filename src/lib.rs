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

//! Transactional outbox primitives: enqueue events inside a business
//! transaction, deliver them at-least-once with a background relay.
//!
//! Producers call [`SqlStore::add`] on a connection that is already inside
//! their own transaction, so the event row commits or rolls back together
//! with the business data. A [`Relay`] then periodically leases due rows
//! ([`Store::claim`]), hands each one to a [`Sender`], and records the
//! outcome (`sent`, `retry` with backoff, or terminal `failed`).
//!
//! Multiple relay instances may share one table: claiming is disjoint under
//! concurrency, and a crashed worker's lease expires on its own once wall
//! time passes the lease deadline. Delivery is at-least-once; consumers
//! that need deduplication key off [`Envelope::key`].
//!
//! # Example
//!
//! ```rust,ignore
//! use culvert::{Database, Message, Relay, RelayConfig, SqlStore};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let database = Database::new("postgres://localhost/app", 10);
//! let store = SqlStore::new(database.clone());
//!
//! // Producer side, inside an open transaction:
//! store.add_postgres(conn, &Message::new("order.created", &order)?)?;
//!
//! // Relay side:
//! let relay = Relay::new(
//!     Arc::new(store),
//!     Arc::new(my_sender),
//!     RelayConfig::new().batch_size(50),
//! );
//! relay.run(CancellationToken::new()).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub mod backoff;
pub mod database;
pub mod error;
pub mod hooks;
pub mod message;
pub mod relay;
pub mod store;

pub use backoff::{exponential, Backoff};
pub use database::connection::{AnyConnection, AnyPool, BackendType, Database};
pub use error::{MessageError, RelayError, StorageError, TransportError};
pub use hooks::{Hooks, NoopHooks, StatsHook, StatsSnapshot, StoreOp};
pub use message::{Envelope, Message};
pub use relay::{Relay, RelayConfig, Sender};
pub use store::{SqlStore, Store, DEFAULT_TABLE};

/// Time source used for lease and retry timestamps.
///
/// Both the store and the relay take a clock so tests can pin wall time and
/// assert exact `next_retry_at` values.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Returns the default wall clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}
