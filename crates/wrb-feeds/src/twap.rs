//! Time-weighted average price.
//!
//! ```text
//! TWAP = sum(price_i * (t_{i+1} - t_i)) / (t_last - t_first)
//! ```
//!
//! Each observed price prevails until the next observation. The last
//! observation only closes the window.

use crate::feed::Observation;
use crate::{FeedError, Result};

/// Minimum number of observations for an average.
pub const MIN_OBSERVATIONS: usize = 2;

/// Maximum number of observations a feed retains.
pub const MAX_OBSERVATIONS: usize = 1440;

/// Average the observations made at or after `since`.
///
/// Observations must be ordered by timestamp.
///
/// # Errors
///
/// - [`FeedError::InsufficientObservations`] if fewer than
///   [`MIN_OBSERVATIONS`] fall inside the window
/// - [`FeedError::NonMonotonicTimestamp`] if timestamps do not increase
/// - [`FeedError::EmptyWindow`] if the window spans no time
pub fn twap_since<'a, I>(observations: I, since: u64) -> Result<u64>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let window: Vec<&Observation> = observations
        .into_iter()
        .filter(|observation| observation.timestamp >= since)
        .collect();
    if window.len() < MIN_OBSERVATIONS {
        return Err(FeedError::InsufficientObservations {
            required: MIN_OBSERVATIONS,
            available: window.len(),
        });
    }

    let mut weighted: u128 = 0;
    let mut elapsed: u128 = 0;
    for pair in window.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end.timestamp <= start.timestamp {
            return Err(FeedError::NonMonotonicTimestamp {
                new: end.timestamp,
                last: start.timestamp,
            });
        }
        let duration = u128::from(end.timestamp - start.timestamp);
        weighted = weighted.saturating_add(u128::from(start.price) * duration);
        elapsed += duration;
    }

    if elapsed == 0 {
        return Err(FeedError::EmptyWindow);
    }
    // Bounded by the largest observed price, so it fits in u64.
    Ok(u64::try_from(weighted / elapsed).unwrap_or(u64::MAX))
}
