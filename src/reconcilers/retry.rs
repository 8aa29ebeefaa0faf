// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backoff and jitter for the operator's long-running loops.
//!
//! The cleaner retries a failed pass with plain exponential backoff (1s, 2s, 4s, ...).
//! The resource reconciler waits a jittered interval between ticks so that loops sharing
//! the same interval do not synchronize.

use crate::constants::CLEANER_BACKOFF_BASE;
use rand::Rng;
use std::time::Duration;

/// Upper bound for a single cleaner backoff step (1 hour)
const CLEANER_MAX_INTERVAL_SECS: u64 = 3600;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with optional randomization (jitter).
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Total jitter width as a fraction of the interval (0.3 means ±15%)
    pub jitter_ratio: f64,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
        jitter_ratio: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            multiplier,
            jitter_ratio,
        }
    }

    /// Get the next backoff interval and advance the schedule.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;

        // Calculate next interval (exponential growth)
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        jitter(interval, self.jitter_ratio)
    }
}

/// Backoff used between cleaner attempts: `2^attempt` seconds, no jitter.
///
/// # Retry Schedule
///
/// 1. 1s
/// 2. 2s
/// 3. 4s
/// 4. 8s
///
/// and so on, capped at one hour.
#[must_use]
pub fn cleaner_backoff() -> ExponentialBackoff {
    #[allow(clippy::cast_precision_loss)]
    let multiplier = CLEANER_BACKOFF_BASE as f64;
    ExponentialBackoff::new(
        Duration::from_secs(1),
        Duration::from_secs(CLEANER_MAX_INTERVAL_SECS),
        multiplier,
        0.0,
    )
}

/// Randomize `interval` uniformly within `±ratio/2` of its value.
///
/// A ratio of `0.3` yields durations in `[0.85 * interval, 1.15 * interval]`. A ratio of
/// zero or less returns `interval` unchanged.
#[must_use]
pub fn jitter(interval: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 {
        return interval;
    }

    let secs = interval.as_secs_f64();
    let delta = secs * ratio / 2.0;
    let min = secs - delta;
    let max = secs + delta;

    let mut rng = rand::rng();
    let jittered = rng.random_range(min..=max);

    Duration::from_secs_f64(jittered.max(0.0))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
