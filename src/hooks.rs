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

//! Observability callbacks emitted by the relay.
//!
//! Every transition in a claim cycle fans out to a [`Hooks`]
//! implementation. The default bodies are no-ops, so implementors override
//! only the callbacks they care about. Callbacks run on the relay task and
//! must not block meaningfully; when several relay instances share one
//! hook value the callbacks run concurrently.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::error::{StorageError, TransportError};
use crate::message::Envelope;

/// Which store transition failed when [`Hooks::on_store_error`] fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Send,
    Retry,
    Fail,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::Send => "send",
            StoreOp::Retry => "retry",
            StoreOp::Fail => "fail",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback surface for relay activity.
pub trait Hooks: Send + Sync {
    /// After each claim, with the requested batch size and the rows
    /// actually leased.
    fn on_claim(&self, _batch_size: usize, _claimed: usize) {}

    /// After a delivery succeeded and the row reached `sent`.
    fn on_send_success(&self, _envelope: &Envelope) {}

    /// Immediately when the sender reports an error, before the
    /// retry-or-fail decision.
    fn on_send_failure(&self, _envelope: &Envelope, _err: &TransportError) {}

    /// After a retry was recorded, with the attempt it schedules and the
    /// computed delay.
    fn on_retry(&self, _envelope: &Envelope, _next_attempt: i32, _delay: Duration) {}

    /// After a row was marked permanently failed.
    fn on_fail(&self, _envelope: &Envelope, _attempts: i32, _err: &TransportError) {}

    /// Whenever recording an outcome failed; the row keeps its lease and
    /// becomes eligible again once it expires.
    fn on_store_error(&self, _op: StoreOp, _id: i64, _err: &StorageError) {}

    /// Once per claim cycle, including empty ones.
    fn on_cycle(&self, _duration: Duration) {}
}

/// Hook implementation that discards every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl Hooks for NoopHooks {}

/// Atomic counters over the full hook surface.
///
/// Cheap enough to share across relay instances; read it out with
/// [`StatsHook::snapshot`].
#[derive(Debug, Default)]
pub struct StatsHook {
    requested: AtomicU64,
    claimed: AtomicU64,
    send_success: AtomicU64,
    send_failure: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    store_errors: AtomicU64,
    cycles: AtomicU64,
    cycle_latency_ns: AtomicU64,
}

/// Point-in-time copy of [`StatsHook`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requested: u64,
    pub claimed: u64,
    pub send_success: u64,
    pub send_failure: u64,
    pub retries: u64,
    pub failures: u64,
    pub store_errors: u64,
    pub cycles: u64,
    pub cycle_latency_ns: u64,
}

impl StatsHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            claimed: self.claimed.load(Ordering::Relaxed),
            send_success: self.send_success.load(Ordering::Relaxed),
            send_failure: self.send_failure.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            cycle_latency_ns: self.cycle_latency_ns.load(Ordering::Relaxed),
        }
    }
}

impl Hooks for StatsHook {
    fn on_claim(&self, batch_size: usize, claimed: usize) {
        self.requested.fetch_add(batch_size as u64, Ordering::Relaxed);
        self.claimed.fetch_add(claimed as u64, Ordering::Relaxed);
    }

    fn on_send_success(&self, _envelope: &Envelope) {
        self.send_success.fetch_add(1, Ordering::Relaxed);
    }

    fn on_send_failure(&self, _envelope: &Envelope, _err: &TransportError) {
        self.send_failure.fetch_add(1, Ordering::Relaxed);
    }

    fn on_retry(&self, _envelope: &Envelope, _next_attempt: i32, _delay: Duration) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fail(&self, _envelope: &Envelope, _attempts: i32, _err: &TransportError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn on_store_error(&self, _op: StoreOp, _id: i64, _err: &StorageError) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn on_cycle(&self, duration: Duration) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.cycle_latency_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }
}
