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

//! Retry delay policies.

use std::sync::Arc;
use std::time::Duration;

/// Computes the wait duration before the given attempt.
///
/// Must be deterministic and side-effect-free; jitter belongs in an
/// explicit wrapper, not in the policy itself.
pub type Backoff = Arc<dyn Fn(i32) -> Duration + Send + Sync>;

/// Creates a capped exponential backoff function.
///
/// Attempt 1 (and anything below) waits `base`; each further attempt
/// multiplies the previous delay by `factor`. The result is clamped to
/// `[base, max]`.
pub fn exponential(base: Duration, factor: f64, max: Duration) -> Backoff {
    Arc::new(move |attempt: i32| {
        if attempt <= 0 {
            return base;
        }
        let base_secs = base.as_secs_f64();
        let max_secs = max.as_secs_f64();
        let mut delay = base_secs;
        for _ in 1..attempt {
            delay *= factor;
            if delay >= max_secs {
                return max;
            }
        }
        if delay <= base_secs {
            return base;
        }
        Duration::from_secs_f64(delay).min(max)
    })
}
