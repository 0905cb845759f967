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

//! PostgreSQL outbox operations.
//!
//! Claiming is a single statement: candidate rows are selected with
//! `FOR UPDATE SKIP LOCKED` so competing workers pick disjoint batches
//! without blocking each other, then updated and returned in one round
//! trip. Timestamps are `TIMESTAMPTZ` and payloads `JSONB`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Jsonb, Nullable, Text, Timestamptz};

use super::{deadline_after, quote_identifier, SqlStore};
use crate::error::StorageError;
use crate::message::{Envelope, Message};

#[derive(QueryableByName)]
struct PgEnvelopeRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    topic: String,
    #[diesel(sql_type = Nullable<Text>)]
    key: Option<String>,
    #[diesel(sql_type = Jsonb)]
    payload: serde_json::Value,
    #[diesel(sql_type = Integer)]
    retry_count: i32,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
}

impl From<PgEnvelopeRow> for Envelope {
    fn from(row: PgEnvelopeRow) -> Self {
        Envelope {
            id: row.id,
            topic: row.topic,
            key: row.key,
            payload: row.payload,
            retry_count: row.retry_count,
            created_at: row.created_at,
        }
    }
}

impl SqlStore {
    fn table_postgres(&self) -> String {
        quote_identifier(self.table(), '"')
    }

    /// Inserts a message with the caller's PostgreSQL connection, inside
    /// whatever transaction the caller has open.
    pub fn add_postgres(
        &self,
        conn: &mut PgConnection,
        message: &Message,
    ) -> Result<(), StorageError> {
        let payload = message.payload()?.clone();
        let sql = format!(
            "INSERT INTO {} (topic, key, payload) VALUES ($1, $2, $3)",
            self.table_postgres()
        );
        diesel::sql_query(sql)
            .bind::<Text, _>(message.topic.clone())
            .bind::<Nullable<Text>, _>(message.key.clone())
            .bind::<Jsonb, _>(payload)
            .execute(conn)?;
        Ok(())
    }

    pub(super) async fn claim_postgres(
        &self,
        worker_id: &str,
        limit: usize,
        lease_ttl: Duration,
    ) -> Result<Vec<Envelope>, StorageError> {
        let conn = self
            .database()
            .get_postgres_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let now = (self.now)();
        let lease_until = deadline_after(now, lease_ttl);
        let worker = worker_id.to_string();
        let table = self.table_postgres();
        let sql = format!(
            r#"
WITH candidates AS (
    SELECT id FROM {table}
    WHERE status IN ('pending','retry','sending')
      AND next_retry_at <= $1
    ORDER BY id
    LIMIT $2
    FOR UPDATE SKIP LOCKED
)
UPDATE {table} AS o
SET status = 'sending',
    claimed_by = $3,
    claimed_at = $1,
    next_retry_at = $4
FROM candidates
WHERE o.id = candidates.id
RETURNING o.id, o.topic, o.key, o.payload, o.retry_count, o.created_at
"#
        );

        let rows: Vec<PgEnvelopeRow> = conn
            .interact(move |conn| {
                diesel::sql_query(sql)
                    .bind::<Timestamptz, _>(now)
                    .bind::<BigInt, _>(limit as i64)
                    .bind::<Text, _>(worker)
                    .bind::<Timestamptz, _>(lease_until)
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(rows.into_iter().map(Envelope::from).collect())
    }

    pub(super) async fn send_postgres(
        &self,
        id: i64,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_postgres_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let sql = format!(
            "UPDATE {} SET status = 'sent', sent_at = $2, claimed_by = NULL, claimed_at = NULL WHERE id = $1",
            self.table_postgres()
        );
        conn.interact(move |conn| {
            diesel::sql_query(sql)
                .bind::<BigInt, _>(id)
                .bind::<Timestamptz, _>(sent_at)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    pub(super) async fn retry_postgres(
        &self,
        id: i64,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_postgres_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let sql = format!(
            r#"
UPDATE {}
SET status = 'retry',
    retry_count = $2,
    next_retry_at = $3,
    claimed_by = NULL,
    claimed_at = NULL
WHERE id = $1"#,
            self.table_postgres()
        );
        conn.interact(move |conn| {
            diesel::sql_query(sql)
                .bind::<BigInt, _>(id)
                .bind::<Integer, _>(retry_count)
                .bind::<Timestamptz, _>(next_retry_at)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    pub(super) async fn fail_postgres(
        &self,
        id: i64,
        retry_count: i32,
    ) -> Result<(), StorageError> {
        let conn = self
            .database()
            .get_postgres_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let sql = format!(
            r#"
UPDATE {}
SET status = 'failed',
    retry_count = $2,
    claimed_by = NULL,
    claimed_at = NULL
WHERE id = $1"#,
            self.table_postgres()
        );
        conn.interact(move |conn| {
            diesel::sql_query(sql)
                .bind::<BigInt, _>(id)
                .bind::<Integer, _>(retry_count)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    pub(super) fn schema_postgres(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
    id            BIGSERIAL PRIMARY KEY,
    topic         TEXT        NOT NULL,
    key           TEXT,
    payload       JSONB       NOT NULL,
    status        TEXT        NOT NULL DEFAULT 'pending',
    retry_count   INT         NOT NULL DEFAULT 0,
    next_retry_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    claimed_by    TEXT,
    claimed_at    TIMESTAMPTZ,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    sent_at       TIMESTAMPTZ
)"#,
            self.table_postgres()
        )
    }
}
