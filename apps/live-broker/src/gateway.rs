//! Brokerage gateway port.
//!
//! [`BrokerGateway`] is the only path to the remote brokerage: order
//! placement, cancellation, and the order-book/history queries the
//! reconciliation poller consumes. Concrete adapters translate their wire
//! protocol into the value objects here; everything above this boundary is
//! broker-agnostic.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::models::{BrokerOrderId, OrderSide, OrderType};

/// Wire format of remote event timestamps: time of day, then day-month-year.
pub const EVENT_TIME_FORMAT: &str = "%H:%M:%S %d-%m-%Y";

/// Parse a remote event timestamp.
///
/// Returns `None` for missing or malformed input; events without a
/// resolvable timestamp are discarded by the poller.
#[must_use]
pub fn parse_event_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, EVENT_TIME_FORMAT).ok()
}

/// Price category as submitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop-limit order (limit armed at trigger).
    StopLimit,
    /// Stop order (market armed at trigger).
    StopMarket,
}

impl PriceType {
    /// Wire code used by the brokerage.
    #[must_use]
    pub const fn wire_code(self) -> &'static str {
        match self {
            Self::Market => "MKT",
            Self::Limit => "LMT",
            Self::StopLimit => "SL-LMT",
            Self::StopMarket => "SL-MKT",
        }
    }
}

impl From<OrderType> for PriceType {
    fn from(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Market => Self::Market,
            OrderType::Limit => Self::Limit,
            OrderType::StopLimit => Self::StopLimit,
            OrderType::Stop => Self::StopMarket,
        }
    }
}

/// Order status as reported by the brokerage.
///
/// `Unrecognized` keeps forward compatibility with statuses the brokerage
/// adds without notice; the engine logs and skips them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteStatus {
    /// Working at the exchange.
    Open,
    /// Accepted but not yet working.
    Pending,
    /// Executed (possibly partially; quantity fields tell).
    Complete,
    /// Canceled at the exchange.
    Canceled,
    /// Rejected by the brokerage or exchange.
    Rejected,
    /// A status this engine does not know about.
    Unrecognized(String),
}

impl RemoteStatus {
    /// Parse a wire status string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "OPEN" => Self::Open,
            "PENDING" => Self::Pending,
            "COMPLETE" => Self::Complete,
            "CANCELED" => Self::Canceled,
            "REJECTED" => Self::Rejected,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Whether no further remote transitions are expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Canceled | Self::Rejected)
    }

    /// Whether the order is still working remotely.
    #[must_use]
    pub const fn is_working(&self) -> bool {
        matches!(self, Self::Open | Self::Pending)
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Pending => write!(f, "PENDING"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Canceled => write!(f, "CANCELED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Unrecognized(raw) => write!(f, "{raw}"),
        }
    }
}

/// Request to place an order with the brokerage.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    /// Buy or sell.
    pub side: OrderSide,
    /// Broker product type (e.g. intraday vs delivery).
    pub product_type: String,
    /// Exchange segment.
    pub exchange: String,
    /// Trading symbol on that exchange.
    pub symbol: String,
    /// Quantity to trade.
    pub quantity: Decimal,
    /// Limit price; zero for market-priced categories.
    pub price: Decimal,
    /// Price category on the wire.
    pub price_type: PriceType,
    /// Trigger price for stop categories; zero otherwise.
    pub trigger_price: Decimal,
    /// Order validity (e.g. DAY).
    pub retention: String,
    /// Free-form note attached at order entry.
    pub remarks: Option<String>,
}

/// Acknowledgment returned by the brokerage on successful placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderAck {
    /// Broker-assigned order id.
    pub order_id: BrokerOrderId,
    /// Time the brokerage acknowledged the placement.
    pub placed_at: NaiveDateTime,
}

/// Account balance snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Cash available for trading.
    pub cash: Decimal,
}

/// One row of the remote order book.
#[derive(Debug, Clone)]
pub struct RemoteOrderSummary {
    /// Broker-assigned order id.
    pub order_id: BrokerOrderId,
    /// Current remote status.
    pub status: RemoteStatus,
    /// Rejection reason, when the order was rejected.
    pub reject_reason: Option<String>,
    /// Average trade price of the traded quantity.
    pub avg_fill_price: Decimal,
    /// Cumulative traded quantity.
    pub filled_quantity: Decimal,
    /// Remote event timestamp; `None` when unparseable upstream.
    pub event_time: Option<NaiveDateTime>,
    /// Transaction side reported by the brokerage.
    pub transaction_type: OrderSide,
    /// Price category reported by the brokerage.
    pub price_type: PriceType,
}

/// One entry of a single order's status history.
///
/// An order accumulates one entry per remote transition, so a partially
/// filled order shows multiple entries with increasing filled quantity.
#[derive(Debug, Clone)]
pub struct RemoteOrderHistoryEntry {
    /// Remote status at this point of the history.
    pub status: RemoteStatus,
    /// Rejection reason, when rejected.
    pub reject_reason: Option<String>,
    /// Average trade price of the traded quantity.
    pub avg_fill_price: Decimal,
    /// Cumulative traded quantity at this entry.
    pub filled_quantity: Decimal,
    /// Remote event timestamp; `None` when unparseable upstream.
    pub event_time: Option<NaiveDateTime>,
}

/// Port to the remote brokerage order API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Place an order. A protocol-level failure (explicit failure status)
    /// surfaces as [`GatewayError::Rejected`].
    async fn place_order(&self, request: PlaceOrderRequest)
    -> Result<PlaceOrderAck, GatewayError>;

    /// Cancel a previously placed order.
    async fn cancel_order(&self, order_id: &BrokerOrderId) -> Result<(), GatewayError>;

    /// Fetch the full remote order book. An empty vec means "no orders yet";
    /// callers treat errors here as "no new information".
    async fn order_book(&self) -> Result<Vec<RemoteOrderSummary>, GatewayError>;

    /// Fetch the detailed status history of one order.
    async fn order_history(
        &self,
        order_id: &BrokerOrderId,
    ) -> Result<Vec<RemoteOrderHistoryEntry>, GatewayError>;

    /// Fetch the current account balance.
    async fn account_balance(&self) -> Result<AccountBalance, GatewayError>;
}
