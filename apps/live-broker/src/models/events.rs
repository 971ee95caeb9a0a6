//! Strategy-facing order lifecycle notifications.

use serde::{Deserialize, Serialize};

use super::{ExecutionInfo, Order};

/// Normalized lifecycle event delivered to the strategy.
///
/// Each variant carries a snapshot of the order taken at emission time; fill
/// variants also carry the execution that triggered them. Notifications are
/// delivered in the order the underlying remote events occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderNotification {
    /// The order is now tracked as live by the engine.
    Accepted {
        /// Snapshot of the order.
        order: Order,
    },
    /// Some quantity executed; the order keeps working.
    PartiallyFilled {
        /// Snapshot of the order.
        order: Order,
        /// The execution applied by this event.
        execution: ExecutionInfo,
    },
    /// The order is fully executed. Terminal.
    Filled {
        /// Snapshot of the order.
        order: Order,
        /// The execution that completed the order.
        execution: ExecutionInfo,
    },
    /// The order was canceled or rejected. Terminal.
    Canceled {
        /// Snapshot of the order.
        order: Order,
        /// Rejection reason, or the user-requested cancellation note.
        reason: Option<String>,
    },
}

impl OrderNotification {
    /// The order snapshot carried by this notification.
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Accepted { order }
            | Self::PartiallyFilled { order, .. }
            | Self::Filled { order, .. }
            | Self::Canceled { order, .. } => order,
        }
    }
}
