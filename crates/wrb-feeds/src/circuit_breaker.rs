//! Feed circuit breaker.
//!
//! A feed stops serving prices when its last accepted price is older than
//! the staleness threshold, or when the witnessing network returned
//! `max_consecutive_errors` error results in a row. A fresh price closes the
//! breaker again.

use crate::{FeedError, Result};

/// Default staleness threshold in seconds (1 hour).
pub const STALENESS_THRESHOLD: u64 = 3600;

/// Default number of consecutive error results that trips the breaker.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 3;

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    /// Timestamp of the last accepted price. `None` until the first one.
    last_update: Option<u64>,
    staleness_threshold: u64,
    consecutive_errors: u32,
    max_consecutive_errors: u32,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(STALENESS_THRESHOLD, MAX_CONSECUTIVE_ERRORS)
    }
}

impl CircuitBreaker {
    /// A closed breaker. `max_consecutive_errors` is raised to at least 1.
    pub fn new(staleness_threshold: u64, max_consecutive_errors: u32) -> Self {
        Self {
            last_update: None,
            staleness_threshold,
            consecutive_errors: 0,
            max_consecutive_errors: max_consecutive_errors.max(1),
        }
    }

    /// Record an accepted price resolved at `timestamp`.
    pub fn record_price(&mut self, timestamp: u64) {
        if self.is_tripped() {
            tracing::info!(timestamp, "feed breaker closed by fresh price");
        }
        self.last_update = Some(timestamp);
        self.consecutive_errors = 0;
    }

    /// Record an error result.
    pub fn record_error(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        if self.consecutive_errors == self.max_consecutive_errors {
            tracing::warn!(
                errors = self.consecutive_errors,
                "feed breaker tripped by consecutive error results"
            );
        }
    }

    /// Whether the error streak reached the limit.
    pub fn is_tripped(&self) -> bool {
        self.consecutive_errors >= self.max_consecutive_errors
    }

    /// Whether the last accepted price is older than the threshold at `now`.
    /// A feed that never received a price is stale.
    pub fn is_stale(&self, now: u64) -> bool {
        match self.last_update {
            Some(last) => now.saturating_sub(last) > self.staleness_threshold,
            None => true,
        }
    }

    /// # Errors
    ///
    /// - [`FeedError::Paused`] if the breaker tripped
    /// - [`FeedError::StaleData`] if the last price is too old
    pub fn check_operational(&self, now: u64) -> Result<()> {
        if self.is_tripped() {
            return Err(FeedError::Paused(self.consecutive_errors));
        }
        if self.is_stale(now) {
            return Err(FeedError::StaleData {
                last_update: self.last_update.unwrap_or_default(),
                now,
                threshold: self.staleness_threshold,
            });
        }
        Ok(())
    }

    /// Error results received since the last accepted price.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Timestamp of the last accepted price.
    pub fn last_update(&self) -> Option<u64> {
        self.last_update
    }
}
