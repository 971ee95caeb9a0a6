// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::default_trait_access
    )
)]

//! Live order-execution adapter.
//!
//! Bridges a strategy engine to a brokerage whose API offers no push
//! notifications for order fills. Orders are placed synchronously; fills,
//! cancellations, and rejections are discovered by a background poller that
//! reconciles the remote order book against the locally registered orders
//! and hands normalized trade events to the dispatch loop over a bounded
//! queue.
//!
//! # Architecture
//!
//! - [`models`]: order entity, lifecycle state machine, notifications
//! - [`gateway`]: the [`BrokerGateway`] port concrete brokerages implement
//! - [`execution`]: [`OrderRegistry`], [`TradeMonitor`], [`LiveBroker`]
//! - [`config`] / [`error`] / [`telemetry`]: ambient concerns
//!
//! # Threading model
//!
//! The engine task owns the [`LiveBroker`] and is the only order mutator.
//! The monitor runs as one spawned task, reads registry snapshots, and
//! publishes trade batches over the hand-off queue; a high-water mark over
//! remote event timestamps keeps delivery exactly-once per transition.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use live_broker::{LiveBroker, LiveBrokerConfig, OrderAction};
//! use rust_decimal_macros::dec;
//! # use live_broker::gateway::{AccountBalance, BrokerGateway, PlaceOrderAck,
//! #     PlaceOrderRequest, RemoteOrderHistoryEntry, RemoteOrderSummary};
//! # use live_broker::{BrokerOrderId, GatewayError};
//! # struct MyGateway;
//! # #[async_trait::async_trait]
//! # impl BrokerGateway for MyGateway {
//! #     async fn place_order(&self, _: PlaceOrderRequest) -> Result<PlaceOrderAck, GatewayError> { unimplemented!() }
//! #     async fn cancel_order(&self, _: &BrokerOrderId) -> Result<(), GatewayError> { unimplemented!() }
//! #     async fn order_book(&self) -> Result<Vec<RemoteOrderSummary>, GatewayError> { unimplemented!() }
//! #     async fn order_history(&self, _: &BrokerOrderId) -> Result<Vec<RemoteOrderHistoryEntry>, GatewayError> { unimplemented!() }
//! #     async fn account_balance(&self) -> Result<AccountBalance, GatewayError> { unimplemented!() }
//! # }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(MyGateway);
//! let (mut broker, mut notifications) = LiveBroker::new(gateway, LiveBrokerConfig::default())?;
//! broker.start().await?;
//!
//! let order = broker.create_limit_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(1500), dec!(10));
//! broker.submit_order(order).await?;
//!
//! loop {
//!     broker.dispatch().await;
//!     while let Ok(notification) = notifications.try_recv() {
//!         println!("{notification:?}");
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod models;
pub mod telemetry;

pub use config::{ConfigError, LiveBrokerConfig};
pub use error::{GatewayError, LiveBrokerError};
pub use execution::{LiveBroker, OrderRegistry, TradeEvent, TradeMonitor};
pub use gateway::BrokerGateway;
pub use models::{
    BrokerOrderId, ExecutionInfo, Order, OrderAction, OrderId, OrderNotification, OrderSide,
    OrderStatus, OrderType,
};
