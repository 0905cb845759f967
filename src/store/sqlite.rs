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

//! SQLite outbox operations.
//!
//! SQLite has no `FOR UPDATE SKIP LOCKED`, so a claim runs inside an
//! IMMEDIATE transaction: the write lock is taken up front and concurrent
//! claimers serialize, each seeing only rows the previous one left behind.
//! A busy timeout makes waiters queue instead of failing fast.
//!
//! Timestamps are stored as TEXT in RFC 3339 with fixed three-digit
//! millisecond precision and a `Z` suffix, so lexicographic comparison in
//! SQL equals chronological comparison. Payloads are BLOBs holding the
//! JSON bytes.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Binary, Integer, Nullable, Text};

use super::{deadline_after, quote_identifier, SqlStore};
use crate::error::{MessageError, StorageError};
use crate::message::{Envelope, Message};

#[derive(QueryableByName)]
struct SqliteEnvelopeRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    topic: String,
    #[diesel(sql_type = Nullable<Text>)]
    key: Option<String>,
    #[diesel(sql_type = Binary)]
    payload: Vec<u8>,
    #[diesel(sql_type = Integer)]
    retry_count: i32,
    #[diesel(sql_type = Text)]
    created_at: String,
}

impl TryFrom<SqliteEnvelopeRow> for Envelope {
    type Error = StorageError;

    fn try_from(row: SqliteEnvelopeRow) -> Result<Self, StorageError> {
        let payload = serde_json::from_slice(&row.payload)
            .map_err(|e| StorageError::Corrupt(format!("payload of row {}: {}", row.id, e)))?;
        Ok(Envelope {
            id: row.id,
            topic: row.topic,
            key: row.key,
            payload,
            retry_count: row.retry_count,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Formats a timestamp for TEXT storage.
///
/// Fixed-width milliseconds keep lexicographic order chronological.
pub(super) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a TEXT timestamp back to UTC.
pub(super) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    // Rows created through SQLite's bare CURRENT_TIMESTAMP default.
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| StorageError::Corrupt(format!("unparseable timestamp {value:?}")))
}

impl SqlStore {
    fn table_sqlite(&self) -> String {
        quote_identifier(self.table(), '"')
    }

    /// Inserts a message with the caller's SQLite connection, inside
    /// whatever transaction the caller has open.
    ///
    /// Timestamps are written explicitly so every writer produces the same
    /// text format.
    pub fn add_sqlite(
        &self,
        conn: &mut SqliteConnection,
        message: &Message,
    ) -> Result<(), StorageError> {
        let payload =
            serde_json::to_vec(message.payload()?).map_err(MessageError::Serialization)?;
        let now = format_timestamp((self.now)());
        let sql = format!(
            "INSERT INTO {} (topic, key, payload, next_retry_at, created_at) VALUES (?, ?, ?, ?, ?)",
            self.table_sqlite()
        );
        diesel::sql_query(sql)
            .bind::<Text, _>(message.topic.clone())
            .bind::<Nullable<Text>, _>(message.key.clone())
            .bind::<Binary, _>(payload)
            .bind::<Text, _>(now.clone())
            .bind::<Text, _>(now)
            .execute(conn)?;
        Ok(())
    }

    pub(super) async fn claim_sqlite(
        &self,
        worker_id: &str,
        limit: usize,
        lease_ttl: Duration,
    ) -> Result<Vec<Envelope>, StorageError> {
        let conn = self
            .database()
            .get_sqlite_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let now = (self.now)();
        let now_text = format_timestamp(now);
        let lease_text = format_timestamp(deadline_after(now, lease_ttl));
        let worker = worker_id.to_string();
        let table = self.table_sqlite();
        let limit = limit as i64;

        let rows: Vec<SqliteEnvelopeRow> = conn
            .interact(move |conn| {
                // Waiters queue behind the write lock instead of failing fast.
                conn.batch_execute("PRAGMA busy_timeout = 5000")?;
                conn.immediate_transaction(|conn| {
                    diesel::sql_query(format!(
                        r#"
UPDATE {table}
SET status = 'sending',
    claimed_by = ?,
    claimed_at = ?,
    next_retry_at = ?
WHERE id IN (
    SELECT id FROM {table}
    WHERE status IN ('pending','retry','sending')
      AND next_retry_at <= ?
    ORDER BY id
    LIMIT ?
)
RETURNING id, topic, key, payload, retry_count, created_at"#
                    ))
                    .bind::<Text, _>(worker)
                    .bind::<Text, _>(now_text.clone())
                    .bind::<Text, _>(lease_text)
                    .bind::<Text, _>(now_text)
                    .bind::<BigInt, _>(limit)
                    .load(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Envelope::try_from).collect()
    }

    pub(super) async fn send_sqlite(
        &self,
        id: i64,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_sqlite_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let sql = format!(
            "UPDATE {} SET status = 'sent', sent_at = ?, claimed_by = NULL, claimed_at = NULL WHERE id = ?",
            self.table_sqlite()
        );
        conn.interact(move |conn| {
            diesel::sql_query(sql)
                .bind::<Text, _>(format_timestamp(sent_at))
                .bind::<BigInt, _>(id)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    pub(super) async fn retry_sqlite(
        &self,
        id: i64,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_sqlite_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let sql = format!(
            r#"
UPDATE {}
SET status = 'retry',
    retry_count = ?,
    next_retry_at = ?,
    claimed_by = NULL,
    claimed_at = NULL
WHERE id = ?"#,
            self.table_sqlite()
        );
        conn.interact(move |conn| {
            diesel::sql_query(sql)
                .bind::<Integer, _>(retry_count)
                .bind::<Text, _>(format_timestamp(next_retry_at))
                .bind::<BigInt, _>(id)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    pub(super) async fn fail_sqlite(&self, id: i64, retry_count: i32) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_sqlite_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let sql = format!(
            r#"
UPDATE {}
SET status = 'failed',
    retry_count = ?,
    claimed_by = NULL,
    claimed_at = NULL
WHERE id = ?"#,
            self.table_sqlite()
        );
        conn.interact(move |conn| {
            diesel::sql_query(sql)
                .bind::<Integer, _>(retry_count)
                .bind::<BigInt, _>(id)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    pub(super) fn schema_sqlite(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    topic         TEXT    NOT NULL,
    key           TEXT,
    payload       BLOB    NOT NULL,
    status        TEXT    NOT NULL DEFAULT 'pending',
    retry_count   INTEGER NOT NULL DEFAULT 0,
    next_retry_at TEXT    NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ','now')),
    claimed_by    TEXT,
    claimed_at    TEXT,
    created_at    TEXT    NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ','now')),
    sent_at       TEXT
)"#,
            self.table_sqlite()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_round_trips() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap();
        let text = format_timestamp(ts);
        assert_eq!(text, "2023-11-14T22:13:20.123Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn text_order_matches_time_order() {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let instants = [
            base,
            base + chrono::Duration::milliseconds(5),
            base + chrono::Duration::milliseconds(50),
            base + chrono::Duration::seconds(1),
            base + chrono::Duration::days(30),
        ];
        for window in instants.windows(2) {
            assert!(
                format_timestamp(window[0]) < format_timestamp(window[1]),
                "{} !< {}",
                format_timestamp(window[0]),
                format_timestamp(window[1])
            );
        }
    }

    #[test]
    fn parses_current_timestamp_format() {
        let parsed = parse_timestamp("2023-11-14 22:13:20").unwrap();
        assert_eq!(parsed, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp("not a timestamp").is_err());
    }
}
