//! Domain model: orders, identifiers, and lifecycle notifications.

mod events;
mod ids;
mod order;

pub use events::OrderNotification;
pub use ids::{BrokerOrderId, OrderId};
pub use order::{
    ExecutionInfo, Order, OrderAction, OrderSide, OrderStatus, OrderType, QUANTITY_SCALE,
    round_quantity,
};
