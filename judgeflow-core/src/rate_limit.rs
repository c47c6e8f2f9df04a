// Copyright 2025 Judgeflow Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Token-bucket rate limiting, keyed by provider, with WAIT/FAIL_FAST/SKIP
//! strategies layered on top of a lock-free CAS bucket.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::RateLimitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateLimitStrategy {
    /// Block the caller until a permit frees up, up to `timeout`.
    Wait,
    /// Return immediately if no permit is available.
    FailFast,
    /// Like FailFast, but the caller treats the denial as a synthetic
    /// per-model failure rather than an error worth retrying.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub rps: f64,
    pub strategy: RateLimitStrategy,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl RateLimitConfig {
    pub fn per_second(rps: f64, strategy: RateLimitStrategy) -> Self {
        Self {
            rps,
            strategy,
            timeout: Duration::from_secs(5),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Microtoken scale used internally so refill math can stay in integer
/// space while still supporting fractional `rps`.
const MICRO: f64 = 1_000_000.0;

/// A single provider's token bucket. Capacity equals `rps` (one second of
/// burst); refill is continuous based on elapsed wall-clock time.
struct TokenBucket {
    capacity_micro: u64,
    rps_micro: f64,
    tokens_micro: AtomicU64,
    last_refill: parking_lot::Mutex<Instant>,
    notify: tokio::sync::Notify,
}

impl TokenBucket {
    fn new(rps: f64) -> Self {
        let capacity_micro = (rps.max(0.0) * MICRO) as u64;
        Self {
            capacity_micro,
            rps_micro: rps.max(0.0) * MICRO,
            tokens_micro: AtomicU64::new(capacity_micro),
            last_refill: parking_lot::Mutex::new(Instant::now()),
            notify: tokio::sync::Notify::new(),
        }
    }

    fn refill(&self) {
        let mut last = self.last_refill.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(*last).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        *last = now;
        drop(last);

        let add = (elapsed * self.rps_micro) as u64;
        if add == 0 {
            return;
        }
        let mut current = self.tokens_micro.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(add).min(self.capacity_micro);
            match self.tokens_micro.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.notify.notify_waiters();
    }

    /// Non-blocking attempt to take one token's worth of capacity.
    fn try_acquire(&self) -> bool {
        self.refill();
        let mut current = self.tokens_micro.load(Ordering::Acquire);
        loop {
            if current < MICRO as u64 {
                return false;
            }
            let next = current - MICRO as u64;
            match self.tokens_micro.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    async fn acquire_waiting(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_acquire() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let wait = self.notify.notified();
            let _ = tokio::time::timeout(remaining.min(Duration::from_millis(50)), wait).await;
        }
    }
}

pub struct Permit;

/// Maps providers to independent token buckets. Unconfigured providers are
/// treated as unlimited.
#[derive(Default)]
pub struct RateLimiterRegistry {
    buckets: DashMap<String, Arc<TokenBucket>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_for(&self, provider: &str, rps: f64) -> Arc<TokenBucket> {
        self.buckets
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(rps)))
            .clone()
    }

    /// Acquire a permit for `provider` under `config`. `rps == f64::MAX`
    /// (the unconfigured-provider default) always succeeds immediately.
    pub async fn acquire(
        &self,
        provider: &str,
        config: &RateLimitConfig,
    ) -> std::result::Result<Permit, RateLimitError> {
        if config.rps.is_infinite() || config.rps <= 0.0 {
            return Ok(Permit);
        }
        let bucket = self.bucket_for(provider, config.rps);

        match config.strategy {
            RateLimitStrategy::Wait => {
                if bucket.acquire_waiting(config.timeout).await {
                    Ok(Permit)
                } else {
                    Err(RateLimitError::TimedOut {
                        timeout: config.timeout,
                    })
                }
            }
            RateLimitStrategy::FailFast => {
                if bucket.try_acquire() {
                    Ok(Permit)
                } else {
                    Err(RateLimitError::FailFast {
                        waited: Duration::ZERO,
                    })
                }
            }
            RateLimitStrategy::Skip => {
                if bucket.try_acquire() {
                    Ok(Permit)
                } else {
                    Err(RateLimitError::Skipped)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fail_fast_denies_when_bucket_empty() {
        let registry = RateLimiterRegistry::new();
        let config = RateLimitConfig::per_second(1.0, RateLimitStrategy::FailFast);
        assert!(registry.acquire("p", &config).await.is_ok());
        assert!(registry.acquire("p", &config).await.is_err());
    }

    #[tokio::test]
    async fn skip_denies_like_fail_fast() {
        let registry = RateLimiterRegistry::new();
        let config = RateLimitConfig::per_second(1.0, RateLimitStrategy::Skip);
        assert!(registry.acquire("p", &config).await.is_ok());
        let err = registry.acquire("p", &config).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Skipped));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_until_refill_then_succeeds() {
        let registry = RateLimiterRegistry::new();
        let config = RateLimitConfig {
            rps: 1.0,
            strategy: RateLimitStrategy::Wait,
            timeout: Duration::from_secs(2),
        };
        assert!(registry.acquire("p", &config).await.is_ok());

        let registry = Arc::new(registry);
        let r2 = registry.clone();
        let config2 = config.clone();
        let handle = tokio::spawn(async move { r2.acquire("p", &config2).await.is_ok() });

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn unconfigured_provider_is_unlimited() {
        let registry = RateLimiterRegistry::new();
        let config = RateLimitConfig {
            rps: f64::MAX,
            strategy: RateLimitStrategy::Wait,
            timeout: Duration::from_secs(1),
        };
        for _ in 0..1000 {
            assert!(registry.acquire("p", &config).await.is_ok());
        }
    }
}
