//! Reconnection policy.
//!
//! Pure decision logic; the driver owns the timers.

use std::time::Duration;

use crate::config::ConnectionConfig;

use super::transport::ConnectionError;

/// What to do after a socket closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Try again after `delay`; `attempt` is the new consecutive count.
    Retry { attempt: u32, delay: Duration },
    /// Stop and surface `reason` as the status message.
    GiveUp { reason: String },
}

/// Fixed-delay, capped retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            delay: config.reconnect_delay(),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Decides the follow-up to a close caused by `cause`, given the number
    /// of consecutive reconnection attempts already made.
    #[must_use]
    pub fn decide(&self, attempts: u32, cause: &ConnectionError) -> ReconnectDecision {
        if cause.is_terminal() {
            return ReconnectDecision::GiveUp {
                reason: format!("Connection failed: {cause}"),
            };
        }
        if attempts >= self.max_attempts {
            return ReconnectDecision::GiveUp {
                reason: format!(
                    "Connection failed after {} reconnection attempts: {cause}",
                    self.max_attempts
                ),
            };
        }
        ReconnectDecision::Retry {
            attempt: attempts + 1,
            delay: self.delay,
        }
    }
}
