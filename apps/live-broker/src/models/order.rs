//! Order entity and lifecycle state machine.
//!
//! An [`Order`] captures one trading intent and its execution progress. The
//! lifecycle is `Initial -> Submitted -> Accepted -> {PartiallyFilled ->
//! Filled | Canceled}`; `Filled` and `Canceled` are terminal. Transitions are
//! validated and only driven from the dispatch side of the engine, never from
//! the polling thread.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BrokerOrderId, OrderId};

/// Decimal places used when comparing filled quantities.
///
/// The brokerage reports cumulative fill quantities that can pick up
/// floating-point drift upstream; quantizing both sides avoids a false
/// partial-vs-complete distinction.
pub const QUANTITY_SCALE: u32 = 2;

/// Round a quantity to the instrument quantization.
#[must_use]
pub fn round_quantity(quantity: Decimal) -> Decimal {
    quantity.round_dp(QUANTITY_SCALE)
}

/// Trading action requested by the strategy.
///
/// Short-covering actions are remapped onto plain buy/sell at the broker
/// boundary; the mapping is total over this closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    /// Open or add to a long position.
    Buy,
    /// Close a short position (maps to buy).
    BuyToCover,
    /// Close or reduce a long position.
    Sell,
    /// Open a short position (maps to sell).
    SellShort,
}

impl OrderAction {
    /// Remap the action to the side the brokerage understands.
    #[must_use]
    pub const fn side(self) -> OrderSide {
        match self {
            Self::Buy | Self::BuyToCover => OrderSide::Buy,
            Self::Sell | Self::SellShort => OrderSide::Sell,
        }
    }
}

/// Buy/sell side as submitted to the brokerage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    /// Buy side.
    Buy,
    /// Sell side.
    Sell,
}

/// Order pricing category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Execute at the prevailing market price.
    Market,
    /// Execute at the limit price or better.
    Limit,
    /// Market order armed at the trigger price.
    Stop,
    /// Limit order armed at the trigger price.
    StopLimit,
}

impl OrderType {
    /// Whether this order type carries a limit price.
    #[must_use]
    pub const fn has_limit_price(self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }

    /// Whether this order type carries a stop (trigger) price.
    #[must_use]
    pub const fn has_stop_price(self) -> bool {
        matches!(self, Self::Stop | Self::StopLimit)
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created by the strategy, not yet sent to the brokerage.
    Initial,
    /// Acknowledged by the brokerage, not yet tracked as live.
    Submitted,
    /// Tracked as live by the engine.
    Accepted,
    /// Some quantity executed, remainder still working.
    PartiallyFilled,
    /// Fully executed. Terminal.
    Filled,
    /// Canceled or rejected. Terminal.
    Canceled,
}

impl OrderStatus {
    /// Whether no further transitions are expected.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled)
    }

    /// Whether the order is still part of the active order set.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether fills may be applied in this state.
    #[must_use]
    pub const fn can_fill(self) -> bool {
        matches!(self, Self::Accepted | Self::PartiallyFilled)
    }
}

/// One execution applied to an order.
///
/// Reconciled fills carry the broker-reported average price and the
/// incremental quantity for this execution; fees are not reported on this
/// path and are always zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    /// Average fill price reported by the brokerage.
    pub avg_price: Decimal,
    /// Incremental quantity executed in this fill.
    pub quantity: Decimal,
    /// Commission charged for this execution.
    pub fee: Decimal,
    /// Remote event timestamp of the execution.
    pub executed_at: NaiveDateTime,
}

/// One trading intent and its execution progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    action: OrderAction,
    instrument: String,
    order_type: OrderType,
    quantity: Decimal,
    limit_price: Option<Decimal>,
    stop_price: Option<Decimal>,
    good_till_canceled: bool,
    all_or_none: bool,
    status: OrderStatus,
    filled: Decimal,
    avg_fill_price: Decimal,
    executions: Vec<ExecutionInfo>,
    broker_order_id: Option<BrokerOrderId>,
    submitted_at: Option<NaiveDateTime>,
}

impl Order {
    /// Create a new order in the `Initial` state.
    #[must_use]
    pub fn new(
        action: OrderAction,
        instrument: impl Into<String>,
        order_type: OrderType,
        quantity: Decimal,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            action,
            instrument: instrument.into(),
            order_type,
            quantity,
            limit_price,
            stop_price,
            good_till_canceled: false,
            all_or_none: false,
            status: OrderStatus::Initial,
            filled: Decimal::ZERO,
            avg_fill_price: Decimal::ZERO,
            executions: Vec::new(),
            broker_order_id: None,
            submitted_at: None,
        }
    }

    /// Local order id.
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    /// Requested action.
    #[must_use]
    pub const fn action(&self) -> OrderAction {
        self.action
    }

    /// Instrument being traded (optionally `EXCHANGE|SYMBOL`).
    #[must_use]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Order pricing category.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Requested quantity.
    #[must_use]
    pub const fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Cumulative filled quantity.
    #[must_use]
    pub const fn filled(&self) -> Decimal {
        self.filled
    }

    /// Quantity still working.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        round_quantity(self.quantity - self.filled)
    }

    /// Average fill price over all executions, zero before the first fill.
    #[must_use]
    pub const fn avg_fill_price(&self) -> Decimal {
        self.avg_fill_price
    }

    /// Limit price, when the order type carries one.
    #[must_use]
    pub const fn limit_price(&self) -> Option<Decimal> {
        self.limit_price
    }

    /// Stop (trigger) price, when the order type carries one.
    #[must_use]
    pub const fn stop_price(&self) -> Option<Decimal> {
        self.stop_price
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Broker-assigned id, present once placement is acknowledged.
    #[must_use]
    pub const fn broker_order_id(&self) -> Option<&BrokerOrderId> {
        self.broker_order_id.as_ref()
    }

    /// Placement acknowledgment timestamp.
    #[must_use]
    pub const fn submitted_at(&self) -> Option<NaiveDateTime> {
        self.submitted_at
    }

    /// Executions applied so far, oldest first.
    #[must_use]
    pub fn executions(&self) -> &[ExecutionInfo] {
        &self.executions
    }

    /// Whether the order survives the trading day until canceled.
    #[must_use]
    pub const fn good_till_canceled(&self) -> bool {
        self.good_till_canceled
    }

    /// Whether partial fills are disallowed.
    #[must_use]
    pub const fn all_or_none(&self) -> bool {
        self.all_or_none
    }

    /// Whether the order has not been submitted yet.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.status == OrderStatus::Initial
    }

    /// Whether the order is fully executed.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// Whether the order is still in the active state set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Override the good-till-canceled flag.
    pub fn set_good_till_canceled(&mut self, value: bool) {
        self.good_till_canceled = value;
    }

    /// Override the all-or-none flag.
    pub fn set_all_or_none(&mut self, value: bool) {
        self.all_or_none = value;
    }

    /// Stamp the broker id and acknowledgment time after placement.
    ///
    /// # Panics
    ///
    /// Panics if the broker id was already set; it is immutable once
    /// assigned.
    pub(crate) fn mark_submitted(&mut self, broker_order_id: BrokerOrderId, at: NaiveDateTime) {
        assert!(
            self.broker_order_id.is_none(),
            "broker order id is set at most once (order {})",
            self.id
        );
        self.broker_order_id = Some(broker_order_id);
        self.submitted_at = Some(at);
    }

    /// Switch the lifecycle state, validating the transition.
    ///
    /// # Panics
    ///
    /// Panics on an invalid transition; transitions are driven by the engine
    /// only, so a bad one is a programming error, not remote behavior.
    pub(crate) fn switch_to(&mut self, target: OrderStatus) {
        let valid = matches!(
            (self.status, target),
            (OrderStatus::Initial, OrderStatus::Submitted)
                | (
                    OrderStatus::Submitted,
                    OrderStatus::Accepted | OrderStatus::Canceled
                )
                | (
                    OrderStatus::Accepted | OrderStatus::PartiallyFilled,
                    OrderStatus::PartiallyFilled | OrderStatus::Filled | OrderStatus::Canceled
                )
        );
        assert!(
            valid,
            "invalid order state transition {:?} -> {:?} (order {})",
            self.status, target, self.id
        );
        self.status = target;
    }

    /// Apply one execution and advance the fill state.
    ///
    /// The cumulative filled quantity is quantized before comparison so that
    /// upstream float drift cannot turn a complete fill into a partial one.
    ///
    /// # Panics
    ///
    /// Panics if the execution would overfill the order.
    pub(crate) fn add_execution(&mut self, execution: ExecutionInfo) {
        let filled = round_quantity(self.filled + execution.quantity);
        assert!(
            filled <= self.quantity,
            "filled quantity {} exceeds requested quantity {} (order {})",
            filled,
            self.quantity,
            self.id
        );

        self.filled = filled;
        self.avg_fill_price = execution.avg_price;
        self.executions.push(execution);

        if self.filled == round_quantity(self.quantity) {
            self.switch_to(OrderStatus::Filled);
        } else {
            self.switch_to(OrderStatus::PartiallyFilled);
        }
    }
}
