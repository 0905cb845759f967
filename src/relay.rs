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

//! The relay: a single-task loop that drains the outbox to a transport.
//!
//! Each cycle claims a batch of due rows, dispatches them sequentially in
//! ascending id order, and records per-row outcomes. Transport failures
//! feed the retry policy; storage failures are logged and hooked but never
//! kill the loop. Parallelism comes from running several relay instances
//! (distinct worker ids) against the same table, not from concurrency
//! inside one cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::{exponential, Backoff};
use crate::error::{RelayError, StorageError, TransportError};
use crate::hooks::{Hooks, NoopHooks, StoreOp};
use crate::message::Envelope;
use crate::store::{deadline_after, Store};
use crate::Clock;

/// Dispatches an outbox envelope to the actual transport.
///
/// Senders are assumed not to be idempotent; the outbox provides
/// at-least-once delivery, with [`Envelope::key`] available for downstream
/// deduplication.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

/// Tuning knobs for a [`Relay`].
///
/// Build one from [`RelayConfig::new`] and override what you need:
///
/// ```rust,ignore
/// let config = RelayConfig::new()
///     .batch_size(50)
///     .max_attempts(5)
///     .poll_interval(Duration::from_secs(1));
/// ```
#[derive(Clone)]
pub struct RelayConfig {
    batch_size: usize,
    lease_ttl: Duration,
    max_attempts: i32,
    poll_interval: Duration,
    backoff: Backoff,
    worker_id: String,
    now: Clock,
    hooks: Arc<dyn Hooks>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            lease_ttl: Duration::from_secs(30),
            max_attempts: 10,
            poll_interval: Duration::from_millis(500),
            backoff: exponential(Duration::from_millis(500), 2.0, Duration::from_secs(30)),
            worker_id: random_worker_id(),
            now: crate::system_clock(),
            hooks: Arc::new(NoopHooks),
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum rows claimed per cycle. Zero is ignored.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        if batch_size > 0 {
            self.batch_size = batch_size;
        }
        self
    }

    /// How long a claimed row stays owned before its lease expires.
    pub fn lease_ttl(mut self, lease_ttl: Duration) -> Self {
        if !lease_ttl.is_zero() {
            self.lease_ttl = lease_ttl;
        }
        self
    }

    /// Total send tries (including the first) before a row is marked
    /// failed. Non-positive values are ignored.
    pub fn max_attempts(mut self, max_attempts: i32) -> Self {
        if max_attempts > 0 {
            self.max_attempts = max_attempts;
        }
        self
    }

    /// Sleep between claim cycles. Zero is ignored.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        if !poll_interval.is_zero() {
            self.poll_interval = poll_interval;
        }
        self
    }

    /// Retry delay policy.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Identity written to `claimed_by`. Empty ids are ignored.
    pub fn worker_id(mut self, worker_id: impl Into<String>) -> Self {
        let worker_id = worker_id.into();
        if !worker_id.is_empty() {
            self.worker_id = worker_id;
        }
        self
    }

    /// Time source, overridable for deterministic tests.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.now = clock;
        self
    }

    /// Observability callbacks.
    pub fn hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

/// Coordinates pulling envelopes from the store and delivering them via a
/// [`Sender`].
pub struct Relay {
    store: Arc<dyn Store>,
    sender: Arc<dyn Sender>,
    config: RelayConfig,
}

impl Relay {
    /// Wires a store and sender with the provided configuration.
    pub fn new(store: Arc<dyn Store>, sender: Arc<dyn Sender>, config: RelayConfig) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    /// Identity this relay writes to `claimed_by`.
    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Processes envelopes until the token is cancelled.
    ///
    /// The first cycle runs immediately, so a busy system does not wait
    /// one poll interval before making progress. Per-cycle errors are
    /// logged and the loop keeps going; cancellation is the only exit.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RelayError> {
        info!(worker_id = %self.config.worker_id, "starting outbox relay");

        let mut ticker = interval(self.config.poll_interval);
        // Ticks missed during a long cycle are dropped, not replayed.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(worker_id = %self.config.worker_id, "outbox relay cancelled");
                    return Err(RelayError::Cancelled);
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.process_once(&cancel).await {
                        error!(worker_id = %self.config.worker_id, error = %err, "claim cycle failed");
                    }
                }
            }
        }
    }

    /// Claims at most `batch_size` envelopes and attempts delivery.
    async fn process_once(&self, cancel: &CancellationToken) -> Result<(), StorageError> {
        let started = Instant::now();

        let envelopes = self
            .store
            .claim(
                &self.config.worker_id,
                self.config.batch_size,
                self.config.lease_ttl,
            )
            .await?;
        self.config
            .hooks
            .on_claim(self.config.batch_size, envelopes.len());

        if envelopes.is_empty() {
            debug!(worker_id = %self.config.worker_id, "no eligible rows");
            self.config.hooks.on_cycle(started.elapsed());
            return Ok(());
        }

        // One timestamp for every row marked sent in this cycle.
        let now = (self.config.now)();
        for envelope in &envelopes {
            let delivery = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = self.sender.send(envelope) => result,
            };
            match delivery {
                Err(err) => {
                    self.config.hooks.on_send_failure(envelope, &err);
                    self.handle_failure(envelope, err).await;
                }
                Ok(()) => {
                    // Not raced against cancellation: an unrecorded delivery
                    // is redelivered once the lease expires.
                    match self.store.send(envelope.id, now).await {
                        Err(err) => {
                            error!(id = envelope.id, error = %err, "mark sent failed");
                            self.config
                                .hooks
                                .on_store_error(StoreOp::Send, envelope.id, &err);
                        }
                        Ok(()) => self.config.hooks.on_send_success(envelope),
                    }
                }
            }
        }

        self.config.hooks.on_cycle(started.elapsed());
        Ok(())
    }

    /// Decides whether to retry or fail a message permanently.
    async fn handle_failure(&self, envelope: &Envelope, send_err: TransportError) {
        let attempt = envelope.retry_count + 1;

        if attempt >= self.config.max_attempts {
            match self.store.fail(envelope.id, attempt).await {
                Err(err) => {
                    error!(id = envelope.id, error = %err, send_error = %send_err, "mark failed failed");
                    self.config
                        .hooks
                        .on_store_error(StoreOp::Fail, envelope.id, &err);
                }
                Ok(()) => {
                    warn!(
                        id = envelope.id,
                        attempts = attempt,
                        error = %send_err,
                        "message failed permanently"
                    );
                    self.config.hooks.on_fail(envelope, attempt, &send_err);
                }
            }
            return;
        }

        let delay = (self.config.backoff)(attempt);
        let next_retry = deadline_after((self.config.now)(), delay);
        match self.store.retry(envelope.id, attempt, next_retry).await {
            Err(err) => {
                error!(id = envelope.id, error = %err, send_error = %send_err, "mark retry failed");
                self.config
                    .hooks
                    .on_store_error(StoreOp::Retry, envelope.id, &err);
            }
            Ok(()) => {
                warn!(
                    id = envelope.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %send_err,
                    "message scheduled for retry"
                );
                self.config.hooks.on_retry(envelope, attempt, delay);
            }
        }
    }
}

/// Generates a short identifier for logging and claiming rows.
///
/// Never blocks startup on entropy: if the OS RNG is unavailable the
/// literal fallback id is used instead.
fn random_worker_id() -> String {
    let mut buf = [0u8; 8];
    if OsRng.try_fill_bytes(&mut buf).is_err() {
        return "worker-unknown".to_string();
    }
    format!("worker-{}", hex::encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn fixed_instant() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn fixed_clock() -> Clock {
        let fixed = fixed_instant();
        Arc::new(move || fixed)
    }

    fn envelope(id: i64, retry_count: i32) -> Envelope {
        Envelope {
            id,
            topic: "topic".into(),
            key: None,
            payload: serde_json::json!({"id": id}),
            retry_count,
            created_at: fixed_instant(),
        }
    }

    #[derive(Default)]
    struct FakeStore {
        claims: Mutex<VecDeque<Vec<Envelope>>>,
        claim_calls: AtomicUsize,
        claim_err: bool,
        send_err: bool,
        retry_err: bool,
        send_calls: Mutex<Vec<(i64, DateTime<Utc>)>>,
        retry_calls: Mutex<Vec<(i64, i32, DateTime<Utc>)>>,
        fail_calls: Mutex<Vec<(i64, i32)>>,
    }

    impl FakeStore {
        fn with_claims(claims: Vec<Vec<Envelope>>) -> Self {
            Self {
                claims: Mutex::new(claims.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn claim(
            &self,
            _worker_id: &str,
            _limit: usize,
            _lease_ttl: Duration,
        ) -> Result<Vec<Envelope>, StorageError> {
            self.claim_calls.fetch_add(1, Ordering::SeqCst);
            if self.claim_err {
                return Err(StorageError::ConnectionPool("claim down".into()));
            }
            Ok(self.claims.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn send(&self, id: i64, sent_at: DateTime<Utc>) -> Result<(), StorageError> {
            if self.send_err {
                return Err(StorageError::ConnectionPool("db down".into()));
            }
            self.send_calls.lock().unwrap().push((id, sent_at));
            Ok(())
        }

        async fn retry(
            &self,
            id: i64,
            retry_count: i32,
            next_retry_at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            if self.retry_err {
                return Err(StorageError::ConnectionPool("db down".into()));
            }
            self.retry_calls
                .lock()
                .unwrap()
                .push((id, retry_count, next_retry_at));
            Ok(())
        }

        async fn fail(&self, id: i64, retry_count: i32) -> Result<(), StorageError> {
            self.fail_calls.lock().unwrap().push((id, retry_count));
            Ok(())
        }
    }

    struct FakeSender {
        err: Option<String>,
        calls: Mutex<Vec<Envelope>>,
    }

    impl FakeSender {
        fn ok() -> Self {
            Self {
                err: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                err: Some(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Sender for FakeSender {
        async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
            self.calls.lock().unwrap().push(envelope.clone());
            match &self.err {
                Some(message) => Err(TransportError::new(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct SpyHooks {
        claims: Mutex<Vec<(usize, usize)>>,
        send_success: AtomicUsize,
        send_failure: AtomicUsize,
        retries: Mutex<Vec<(i64, i32, Duration)>>,
        fails: Mutex<Vec<(i64, i32)>>,
        store_errors: Mutex<Vec<(&'static str, i64)>>,
        cycles: AtomicUsize,
    }

    impl Hooks for SpyHooks {
        fn on_claim(&self, batch_size: usize, claimed: usize) {
            self.claims.lock().unwrap().push((batch_size, claimed));
        }

        fn on_send_success(&self, _envelope: &Envelope) {
            self.send_success.fetch_add(1, Ordering::SeqCst);
        }

        fn on_send_failure(&self, _envelope: &Envelope, _err: &TransportError) {
            self.send_failure.fetch_add(1, Ordering::SeqCst);
        }

        fn on_retry(&self, envelope: &Envelope, next_attempt: i32, delay: Duration) {
            self.retries
                .lock()
                .unwrap()
                .push((envelope.id, next_attempt, delay));
        }

        fn on_fail(&self, envelope: &Envelope, attempts: i32, _err: &TransportError) {
            self.fails.lock().unwrap().push((envelope.id, attempts));
        }

        fn on_store_error(&self, op: StoreOp, id: i64, _err: &StorageError) {
            self.store_errors.lock().unwrap().push((op.as_str(), id));
        }

        fn on_cycle(&self, _duration: Duration) {
            self.cycles.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn delivers_and_marks_sent() {
        let store = Arc::new(FakeStore::with_claims(vec![vec![envelope(1, 0)]]));
        let sender = Arc::new(FakeSender::ok());
        let hooks = Arc::new(SpyHooks::default());
        let relay = Relay::new(
            store.clone(),
            sender.clone(),
            RelayConfig::new()
                .batch_size(1)
                .clock(fixed_clock())
                .hooks(hooks.clone()),
        );

        relay
            .process_once(&CancellationToken::new())
            .await
            .unwrap();

        let sender_calls = sender.calls.lock().unwrap();
        assert_eq!(sender_calls.len(), 1);
        assert_eq!(sender_calls[0].id, 1);
        assert_eq!(
            store.send_calls.lock().unwrap().as_slice(),
            &[(1, fixed_instant())]
        );
        assert_eq!(hooks.claims.lock().unwrap().as_slice(), &[(1, 1)]);
        assert_eq!(hooks.send_success.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.send_failure.load(Ordering::SeqCst), 0);
        assert!(hooks.retries.lock().unwrap().is_empty());
        assert!(hooks.fails.lock().unwrap().is_empty());
        assert_eq!(hooks.cycles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schedules_retry_with_computed_backoff() {
        let store = Arc::new(FakeStore::with_claims(vec![vec![envelope(10, 1)]]));
        let sender = Arc::new(FakeSender::failing("boom"));
        let hooks = Arc::new(SpyHooks::default());
        let backoff_attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = backoff_attempts.clone();
        let backoff: Backoff = Arc::new(move |attempt| {
            seen.lock().unwrap().push(attempt);
            Duration::from_secs(1)
        });
        let relay = Relay::new(
            store.clone(),
            sender,
            RelayConfig::new()
                .max_attempts(5)
                .backoff(backoff)
                .clock(fixed_clock())
                .hooks(hooks.clone()),
        );

        relay
            .process_once(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backoff_attempts.lock().unwrap().as_slice(), &[2]);
        assert_eq!(
            store.retry_calls.lock().unwrap().as_slice(),
            &[(10, 2, fixed_instant() + chrono::Duration::seconds(1))]
        );
        assert!(store.fail_calls.lock().unwrap().is_empty());
        assert_eq!(hooks.send_failure.load(Ordering::SeqCst), 1);
        assert_eq!(
            hooks.retries.lock().unwrap().as_slice(),
            &[(10, 2, Duration::from_secs(1))]
        );
        assert!(hooks.store_errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fails_after_max_attempts() {
        let store = Arc::new(FakeStore::with_claims(vec![vec![envelope(3, 1)]]));
        let sender = Arc::new(FakeSender::failing("boom"));
        let hooks = Arc::new(SpyHooks::default());
        let relay = Relay::new(
            store.clone(),
            sender,
            RelayConfig::new()
                .max_attempts(2)
                .clock(fixed_clock())
                .hooks(hooks.clone()),
        );

        relay
            .process_once(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.fail_calls.lock().unwrap().as_slice(), &[(3, 2)]);
        assert!(store.retry_calls.lock().unwrap().is_empty());
        assert_eq!(hooks.fails.lock().unwrap().as_slice(), &[(3, 2)]);
        assert!(hooks.retries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_error_is_swallowed_and_loop_continues() {
        let store = Arc::new(FakeStore {
            retry_err: true,
            ..FakeStore::with_claims(vec![vec![envelope(31, 0)], vec![envelope(31, 0)]])
        });
        let sender = Arc::new(FakeSender::failing("boom"));
        let hooks = Arc::new(SpyHooks::default());
        let relay = Relay::new(
            store.clone(),
            sender,
            RelayConfig::new()
                .max_attempts(3)
                .clock(fixed_clock())
                .hooks(hooks.clone()),
        );

        let cancel = CancellationToken::new();
        relay.process_once(&cancel).await.unwrap();
        relay.process_once(&cancel).await.unwrap();

        assert_eq!(store.claim_calls.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.send_failure.load(Ordering::SeqCst), 2);
        assert_eq!(
            hooks.store_errors.lock().unwrap().as_slice(),
            &[("retry", 31), ("retry", 31)]
        );
        assert!(hooks.retries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn claim_error_propagates_before_any_hook() {
        let store = Arc::new(FakeStore {
            claim_err: true,
            ..FakeStore::default()
        });
        let hooks = Arc::new(SpyHooks::default());
        let relay = Relay::new(
            store,
            Arc::new(FakeSender::ok()),
            RelayConfig::new().hooks(hooks.clone()),
        );

        let result = relay.process_once(&CancellationToken::new()).await;

        assert!(result.is_err());
        assert!(hooks.claims.lock().unwrap().is_empty());
        assert_eq!(hooks.cycles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_claim_still_reports_claim_and_cycle() {
        let store = Arc::new(FakeStore::default());
        let hooks = Arc::new(SpyHooks::default());
        let relay = Relay::new(
            store,
            Arc::new(FakeSender::ok()),
            RelayConfig::new().hooks(hooks.clone()),
        );

        relay
            .process_once(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(hooks.claims.lock().unwrap().as_slice(), &[(100, 0)]);
        assert_eq!(hooks.cycles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_claim_reports_requested_versus_actual() {
        let store = Arc::new(FakeStore::with_claims(vec![vec![envelope(11, 0)]]));
        let hooks = Arc::new(SpyHooks::default());
        let relay = Relay::new(
            store,
            Arc::new(FakeSender::ok()),
            RelayConfig::new()
                .batch_size(2)
                .clock(fixed_clock())
                .hooks(hooks.clone()),
        );

        relay
            .process_once(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(hooks.claims.lock().unwrap().as_slice(), &[(2, 1)]);
        assert_eq!(hooks.send_success.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.send_failure.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_send_error_suppresses_success_hook() {
        let store = Arc::new(FakeStore {
            send_err: true,
            ..FakeStore::with_claims(vec![vec![envelope(1, 0)]])
        });
        let hooks = Arc::new(SpyHooks::default());
        let relay = Relay::new(
            store,
            Arc::new(FakeSender::ok()),
            RelayConfig::new().clock(fixed_clock()).hooks(hooks.clone()),
        );

        relay
            .process_once(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(hooks.send_success.load(Ordering::SeqCst), 0);
        assert_eq!(
            hooks.store_errors.lock().unwrap().as_slice(),
            &[("send", 1)]
        );
    }

    #[tokio::test]
    async fn dispatches_in_claimed_order() {
        let store = Arc::new(FakeStore::with_claims(vec![vec![
            envelope(1, 0),
            envelope(2, 0),
            envelope(3, 0),
        ]]));
        let sender = Arc::new(FakeSender::ok());
        let relay = Relay::new(
            store,
            sender.clone(),
            RelayConfig::new().clock(fixed_clock()),
        );

        relay
            .process_once(&CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<i64> = sender.calls.lock().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn run_returns_cancelled() {
        let relay = Relay::new(
            Arc::new(FakeStore::default()),
            Arc::new(FakeSender::ok()),
            RelayConfig::new().poll_interval(Duration::from_millis(5)),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = tokio::spawn(async move { relay.run(cancel).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();

        assert_eq!(handle.await.unwrap(), Err(RelayError::Cancelled));
    }

    #[tokio::test]
    async fn run_survives_claim_errors() {
        let store = Arc::new(FakeStore {
            claim_err: true,
            ..FakeStore::default()
        });
        let relay_store = store.clone();
        let relay = Relay::new(
            relay_store,
            Arc::new(FakeSender::ok()),
            RelayConfig::new().poll_interval(Duration::from_millis(5)),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = tokio::spawn(async move { relay.run(cancel).await });

        tokio::time::sleep(Duration::from_millis(40)).await;
        trigger.cancel();
        handle.await.unwrap().unwrap_err();

        assert!(store.claim_calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn config_defaults() {
        let config = RelayConfig::new();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.lease_ttl, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!(config.worker_id.starts_with("worker-"));
    }

    #[test]
    fn config_ignores_degenerate_values() {
        let config = RelayConfig::new()
            .batch_size(0)
            .max_attempts(0)
            .poll_interval(Duration::ZERO)
            .lease_ttl(Duration::ZERO)
            .worker_id("");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.lease_ttl, Duration::from_secs(30));
        assert!(!config.worker_id.is_empty());
    }

    #[test]
    fn worker_ids_are_random_hex() {
        let id = random_worker_id();
        let suffix = id.strip_prefix("worker-").unwrap();
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(random_worker_id(), id);
    }
}
