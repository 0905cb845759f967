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

//! Outbox storage: the relay-side contract and its SQL implementation.
//!
//! [`SqlStore`] works against one shared table and selects the dialect at
//! runtime from the [`Database`] backend. Producers insert through
//! [`SqlStore::add`] on their own connection; relays lease and settle rows
//! through the [`Store`] trait.
//!
//! # Row lifecycle
//!
//! Rows start `pending`, are leased into `sending` by `claim`, and end in
//! the terminal states `sent` or `failed`; transient transport failures
//! park them in `retry`. Eligibility for claiming is a single predicate:
//! `status IN ('pending','retry','sending') AND next_retry_at <= now`.
//! `claim` writes the lease deadline into `next_retry_at`, so a crashed
//! worker's rows become claimable again as soon as wall time passes the
//! deadline, with no reaper involved.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::connection::{BackendType, Database};
use crate::error::StorageError;
use crate::message::{Envelope, Message};
use crate::Clock;

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

/// Default outbox table name.
pub const DEFAULT_TABLE: &str = "txoutbox";

/// Relay-side storage capability: lease rows and record outcomes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomically leases up to `limit` eligible rows for `worker_id`.
    ///
    /// Leased rows move to `sending` with `claimed_by`/`claimed_at` set and
    /// `next_retry_at` pushed to `now + lease_ttl`. Envelopes come back in
    /// ascending id order. Concurrent claimers never receive the same row.
    async fn claim(
        &self,
        worker_id: &str,
        limit: usize,
        lease_ttl: Duration,
    ) -> Result<Vec<Envelope>, StorageError>;

    /// Marks a row successfully delivered (terminal).
    ///
    /// Idempotent: repeating the call on an already-sent row is a no-op
    /// update.
    async fn send(&self, id: i64, sent_at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Releases a row for another attempt at `next_retry_at`.
    async fn retry(
        &self,
        id: i64,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Marks a row permanently failed (terminal). The row is kept for
    /// operator inspection.
    async fn fail(&self, id: i64, retry_count: i32) -> Result<(), StorageError>;
}

/// SQL-backed [`Store`] with runtime backend selection.
#[derive(Clone)]
pub struct SqlStore {
    database: Database,
    table: String,
    now: Clock,
}

impl SqlStore {
    /// Creates a store over the given database, using the default table
    /// name.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            table: DEFAULT_TABLE.to_string(),
            now: crate::system_clock(),
        }
    }

    /// Overrides the outbox table name. Empty names are ignored.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !table.is_empty() {
            self.table = table;
        }
        self
    }

    /// Overrides the clock used for claim and lease timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.now = clock;
        self
    }

    /// Returns the configured table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the underlying database handle.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn backend(&self) -> BackendType {
        self.database.backend()
    }

    /// Inserts a message using the caller's connection.
    ///
    /// The connection is typically inside an open transaction, so the
    /// outbox row commits atomically with the caller's own writes. The
    /// store never opens a transaction here.
    pub fn add(
        &self,
        conn: &mut crate::database::connection::AnyConnection,
        message: &Message,
    ) -> Result<(), StorageError> {
        crate::connection_match!(
            conn,
            pg => { self.add_postgres(pg, message) },
            my => { self.add_mysql(my, message) },
            sq => { self.add_sqlite(sq, message) }
        )
    }

    /// Reference DDL for the configured table on the active backend.
    ///
    /// Offered for tests and bootstrap scripts; production schema
    /// management stays with the operator's migration tooling.
    pub fn schema_sql(&self) -> String {
        crate::dispatch_backend!(
            self.backend(),
            self.schema_postgres(),
            self.schema_mysql(),
            self.schema_sqlite()
        )
    }
}

#[async_trait]
impl Store for SqlStore {
    async fn claim(
        &self,
        worker_id: &str,
        limit: usize,
        lease_ttl: Duration,
    ) -> Result<Vec<Envelope>, StorageError> {
        if limit == 0 {
            return Err(StorageError::InvalidBatchSize);
        }
        let mut envelopes = crate::dispatch_backend!(
            self.backend(),
            self.claim_postgres(worker_id, limit, lease_ttl).await,
            self.claim_mysql(worker_id, limit, lease_ttl).await,
            self.claim_sqlite(worker_id, limit, lease_ttl).await
        )?;
        // RETURNING order is not guaranteed on any dialect.
        envelopes.sort_by_key(|envelope| envelope.id);
        Ok(envelopes)
    }

    async fn send(&self, id: i64, sent_at: DateTime<Utc>) -> Result<(), StorageError> {
        crate::dispatch_backend!(
            self.backend(),
            self.send_postgres(id, sent_at).await,
            self.send_mysql(id, sent_at).await,
            self.send_sqlite(id, sent_at).await
        )
    }

    async fn retry(
        &self,
        id: i64,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        crate::dispatch_backend!(
            self.backend(),
            self.retry_postgres(id, retry_count, next_retry_at).await,
            self.retry_mysql(id, retry_count, next_retry_at).await,
            self.retry_sqlite(id, retry_count, next_retry_at).await
        )
    }

    async fn fail(&self, id: i64, retry_count: i32) -> Result<(), StorageError> {
        crate::dispatch_backend!(
            self.backend(),
            self.fail_postgres(id, retry_count).await,
            self.fail_mysql(id, retry_count).await,
            self.fail_sqlite(id, retry_count).await
        )
    }
}

/// Quotes an identifier for interpolation into dialect SQL, doubling any
/// embedded quote characters.
pub(crate) fn quote_identifier(name: &str, quote: char) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(quote);
    for ch in name.chars() {
        quoted.push(ch);
        if ch == quote {
            quoted.push(quote);
        }
    }
    quoted.push(quote);
    quoted
}

/// Adds a duration to a timestamp, saturating instead of overflowing.
pub(crate) fn deadline_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    let delta = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
