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

//! MySQL outbox operations.
//!
//! MySQL has `FOR UPDATE SKIP LOCKED` but no `UPDATE ... RETURNING`, so a
//! claim is one short transaction: lock candidate ids, mark them sending,
//! read the claimed rows back. Identifiers use backtick quoting and the
//! reserved column name `key` is always quoted. Timestamps are
//! `DATETIME(6)` holding UTC wall time.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Datetime, Integer, Json, Nullable, Text};

use super::{deadline_after, quote_identifier, SqlStore};
use crate::error::StorageError;
use crate::message::{Envelope, Message};

#[derive(QueryableByName)]
struct MysqlIdRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[derive(QueryableByName)]
struct MysqlEnvelopeRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    topic: String,
    #[diesel(sql_type = Nullable<Text>)]
    key: Option<String>,
    #[diesel(sql_type = Json)]
    payload: serde_json::Value,
    #[diesel(sql_type = Integer)]
    retry_count: i32,
    #[diesel(sql_type = Datetime)]
    created_at: NaiveDateTime,
}

impl From<MysqlEnvelopeRow> for Envelope {
    fn from(row: MysqlEnvelopeRow) -> Self {
        Envelope {
            id: row.id,
            topic: row.topic,
            key: row.key,
            payload: row.payload,
            retry_count: row.retry_count,
            created_at: Utc.from_utc_datetime(&row.created_at),
        }
    }
}

impl SqlStore {
    fn table_mysql(&self) -> String {
        quote_identifier(self.table(), '`')
    }

    /// Inserts a message with the caller's MySQL connection, inside
    /// whatever transaction the caller has open.
    pub fn add_mysql(
        &self,
        conn: &mut MysqlConnection,
        message: &Message,
    ) -> Result<(), StorageError> {
        let payload = message.payload()?.clone();
        let sql = format!(
            "INSERT INTO {} (topic, `key`, payload) VALUES (?, ?, ?)",
            self.table_mysql()
        );
        diesel::sql_query(sql)
            .bind::<Text, _>(message.topic.clone())
            .bind::<Nullable<Text>, _>(message.key.clone())
            .bind::<Json, _>(payload)
            .execute(conn)?;
        Ok(())
    }

    pub(super) async fn claim_mysql(
        &self,
        worker_id: &str,
        limit: usize,
        lease_ttl: Duration,
    ) -> Result<Vec<Envelope>, StorageError> {
        let conn = self
            .database()
            .get_mysql_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let now = (self.now)();
        let claimed_at = now.naive_utc();
        let lease_until = deadline_after(now, lease_ttl).naive_utc();
        let worker = worker_id.to_string();
        let table = self.table_mysql();

        let rows: Vec<MysqlEnvelopeRow> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let candidates: Vec<MysqlIdRow> = diesel::sql_query(format!(
                        r#"
SELECT id FROM {table}
WHERE status IN ('pending','retry','sending')
  AND next_retry_at <= ?
ORDER BY id
LIMIT {limit}
FOR UPDATE SKIP LOCKED"#
                    ))
                    .bind::<Datetime, _>(claimed_at)
                    .load(conn)?;

                    if candidates.is_empty() {
                        return Ok(Vec::new());
                    }

                    // The id list comes straight from the locked SELECT above.
                    let ids = candidates
                        .iter()
                        .map(|row| row.id.to_string())
                        .collect::<Vec<_>>()
                        .join(",");

                    diesel::sql_query(format!(
                        r#"
UPDATE {table}
SET status = 'sending',
    claimed_by = ?,
    claimed_at = ?,
    next_retry_at = ?
WHERE id IN ({ids})"#
                    ))
                    .bind::<Text, _>(worker)
                    .bind::<Datetime, _>(claimed_at)
                    .bind::<Datetime, _>(lease_until)
                    .execute(conn)?;

                    diesel::sql_query(format!(
                        "SELECT id, topic, `key`, payload, retry_count, created_at FROM {table} WHERE id IN ({ids})"
                    ))
                    .load(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(rows.into_iter().map(Envelope::from).collect())
    }

    pub(super) async fn send_mysql(
        &self,
        id: i64,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_mysql_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let sql = format!(
            "UPDATE {} SET status = 'sent', sent_at = ?, claimed_by = NULL, claimed_at = NULL WHERE id = ?",
            self.table_mysql()
        );
        conn.interact(move |conn| {
            diesel::sql_query(sql)
                .bind::<Datetime, _>(sent_at.naive_utc())
                .bind::<BigInt, _>(id)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    pub(super) async fn retry_mysql(
        &self,
        id: i64,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_mysql_connection()
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
            self.table_mysql()
        );
        conn.interact(move |conn| {
            diesel::sql_query(sql)
                .bind::<Integer, _>(retry_count)
                .bind::<Datetime, _>(next_retry_at.naive_utc())
                .bind::<BigInt, _>(id)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    pub(super) async fn fail_mysql(&self, id: i64, retry_count: i32) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_mysql_connection()
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
            self.table_mysql()
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

    pub(super) fn schema_mysql(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
    id            BIGINT AUTO_INCREMENT PRIMARY KEY,
    topic         VARCHAR(255) NOT NULL,
    `key`         VARCHAR(255),
    payload       JSON         NOT NULL,
    status        VARCHAR(16)  NOT NULL DEFAULT 'pending',
    retry_count   INT          NOT NULL DEFAULT 0,
    next_retry_at DATETIME(6)  NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
    claimed_by    VARCHAR(255),
    claimed_at    DATETIME(6),
    created_at    DATETIME(6)  NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
    sent_at       DATETIME(6)
)"#,
            self.table_mysql()
        )
    }
}
