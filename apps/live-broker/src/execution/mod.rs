//! Execution engine: order registry, reconciliation poller, dispatch loop.

pub mod broker;
pub mod monitor;
pub mod registry;

pub use broker::LiveBroker;
pub use monitor::{TradeEvent, TradeMonitor};
pub use registry::OrderRegistry;
