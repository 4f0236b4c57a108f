//! Fixed retry budget for failed range fetches.
//!
//! Only transient range-fetch failures draw from the budget. Checksum
//! failures and entity-tag changes restart the state machine without
//! touching it, so a download can outlive any number of those.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use epf_core::download::{RetryBudget, RetryDecision};
//!
//! let mut budget = RetryBudget::new(2, Duration::from_secs(3));
//! assert!(matches!(budget.consume(), RetryDecision::Retry { .. }));
//! assert!(matches!(budget.consume(), RetryDecision::DoNotRetry { .. }));
//! ```

use std::time::Duration;

use tracing::debug;

use super::constants::{DEFAULT_RETRIES, DEFAULT_RETRY_WAIT};

/// Decision on whether to retry a failed range fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Number of failures so far, including this one.
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Remaining range-fetch attempts for one `download` call.
///
/// The counter is decremented before the check, so a budget of `n`
/// tolerates `n - 1` failed fetches.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    total: u32,
    remaining: u32,
    wait: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, DEFAULT_RETRY_WAIT)
    }
}

impl RetryBudget {
    /// Creates a budget of `retries` with a fixed `wait` between attempts.
    #[must_use]
    pub fn new(retries: u32, wait: Duration) -> Self {
        Self {
            total: retries,
            remaining: retries,
            wait,
        }
    }

    /// Returns the number of attempts still available.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Returns how many failures have been recorded.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.total - self.remaining
    }

    /// Records one failed fetch and decides whether another is allowed.
    pub fn consume(&mut self) -> RetryDecision {
        self.remaining = self.remaining.saturating_sub(1);
        let attempt = self.failures();
        if self.remaining == 0 {
            debug!(attempt, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retry budget of {} exhausted", self.total),
            };
        }
        debug!(
            attempt,
            remaining = self.remaining,
            delay_ms = self.wait.as_millis(),
            "will retry range fetch"
        );
        RetryDecision::Retry {
            delay: self.wait,
            attempt,
        }
    }
}
