// Reconnection / error governor
//
// A circuit breaker, not a backoff: consecutive stream errors are counted and once the
// count exceeds the threshold the stream is closed for good.

use crate::config::DEFAULT_ERROR_THRESHOLD;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GovernorVerdict {
    /// Keep the stream open
    Continue,
    /// Threshold just exceeded; close the stream and alert once
    Trip,
    /// Already tripped earlier
    Closed,
}

#[derive(Clone, Debug)]
pub struct ErrorGovernor {
    threshold: u32,
    consecutive: u32,
    tripped: bool,
}

impl Default for ErrorGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_THRESHOLD)
    }
}

impl ErrorGovernor {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: 0,
            tripped: false,
        }
    }

    pub fn record_success(&mut self) {
        if !self.tripped {
            self.consecutive = 0;
        }
    }

    pub fn record_error(&mut self) -> GovernorVerdict {
        if self.tripped {
            return GovernorVerdict::Closed;
        }
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive > self.threshold {
            self.tripped = true;
            GovernorVerdict::Trip
        } else {
            GovernorVerdict::Continue
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}
