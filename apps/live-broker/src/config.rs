//! Broker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration or capacity field was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field name.
        field: &'static str,
    },
    /// A wire default was left empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Offending field name.
        field: &'static str,
    },
}

/// Configuration for the live broker and its reconciliation poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveBrokerConfig {
    /// Poll interval of the trade monitor, in seconds.
    pub poll_interval_secs: u64,
    /// Bounded wait when draining the hand-off queue per tick, in ms.
    pub dispatch_timeout_ms: u64,
    /// Capacity of the hand-off queue, in batches.
    pub queue_capacity: usize,
    /// Exchange used when the instrument carries no `EXCHANGE|` prefix.
    pub default_exchange: String,
    /// Broker product type submitted with every order.
    pub product_type: String,
    /// Order validity submitted with every order.
    pub retention: String,
}

impl Default for LiveBrokerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            dispatch_timeout_ms: 10,
            queue_capacity: 64,
            default_exchange: "NSE".to_string(),
            product_type: "I".to_string(),
            retention: "DAY".to_string(),
        }
    }
}

impl LiveBrokerConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Dispatch receive timeout as a [`Duration`].
    #[must_use]
    pub const fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Zero {
                field: "poll_interval_secs",
            });
        }
        if self.dispatch_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "dispatch_timeout_ms",
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "queue_capacity",
            });
        }
        if self.default_exchange.is_empty() {
            return Err(ConfigError::Empty {
                field: "default_exchange",
            });
        }
        if self.product_type.is_empty() {
            return Err(ConfigError::Empty {
                field: "product_type",
            });
        }
        if self.retention.is_empty() {
            return Err(ConfigError::Empty { field: "retention" });
        }
        Ok(())
    }
}
