//! Error taxonomy for the live broker.
//!
//! Gateway errors describe remote-system behavior and are mostly transient;
//! the engine-facing [`LiveBrokerError`] adds the usage errors that indicate
//! a caller bug. Registry invariant violations are panics, not errors: they
//! cannot be produced by the remote system.

use thiserror::Error;

/// Errors surfaced by the remote brokerage gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network-level failure reaching the brokerage.
    #[error("broker connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// The brokerage answered with an explicit failure status.
    #[error("broker rejected the request: {message}")]
    Rejected {
        /// Failure message reported by the brokerage.
        message: String,
    },

    /// The referenced order is unknown to the brokerage.
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// The missing broker order id.
        order_id: String,
    },

    /// Any other broker-side failure.
    #[error("broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

/// Errors returned by the engine-facing broker API.
#[derive(Debug, Error)]
pub enum LiveBrokerError {
    /// Order placement failed; the order stays un-submitted and unregistered.
    #[error("order placement failed for {instrument}")]
    Placement {
        /// Instrument the placement was for.
        instrument: String,
        /// Underlying gateway failure.
        #[source]
        source: GatewayError,
    },

    /// A gateway call outside the placement path failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// `submit_order` was called for an order that already left `Initial`.
    #[error("order {order_id} was already submitted")]
    AlreadySubmitted {
        /// Local order id.
        order_id: String,
    },

    /// The order is not registered (never placed, already closed, or stale).
    #[error("order {order_id} is not active")]
    OrderNotActive {
        /// Order id the caller referenced.
        order_id: String,
    },

    /// The order was already fully filled and cannot be canceled.
    #[error("order {order_id} has already been filled")]
    AlreadyFilled {
        /// Order id the caller referenced.
        order_id: String,
    },
}
