//! Live broker: order entry, cancellation, and the dispatch loop.
//!
//! [`LiveBroker`] owns the dispatch side of the engine. It places orders
//! through the gateway, registers them for reconciliation, and turns the
//! trade batches published by the [`TradeMonitor`] into order state
//! transitions and strategy notifications. All order mutation happens here,
//! on the engine task; the monitor only ever reads the registry.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::monitor::{TradeEvent, TradeMonitor};
use super::registry::OrderRegistry;
use crate::config::{ConfigError, LiveBrokerConfig};
use crate::error::LiveBrokerError;
use crate::gateway::{BrokerGateway, PlaceOrderRequest, RemoteStatus};
use crate::models::{
    BrokerOrderId, ExecutionInfo, Order, OrderAction, OrderNotification, OrderStatus, OrderType,
    round_quantity,
};

/// Cancellation note attached when the user requests the cancel, as opposed
/// to an exchange-side cancel discovered by reconciliation.
const USER_CANCEL_REASON: &str = "user requested cancellation";

/// Order-entry and dispatch engine over one brokerage account.
pub struct LiveBroker<G> {
    gateway: Arc<G>,
    registry: Arc<OrderRegistry>,
    config: LiveBrokerConfig,
    cash: Decimal,
    notifications: mpsc::UnboundedSender<OrderNotification>,
    batches: mpsc::Receiver<Vec<TradeEvent>>,
    batches_tx: mpsc::Sender<Vec<TradeEvent>>,
    shutdown_tx: broadcast::Sender<()>,
    monitor_task: Option<JoinHandle<()>>,
}

impl<G> LiveBroker<G>
where
    G: BrokerGateway + 'static,
{
    /// Create a broker and the notification stream it feeds.
    ///
    /// # Errors
    ///
    /// Returns the first invalid configuration field.
    pub fn new(
        gateway: Arc<G>,
        config: LiveBrokerConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<OrderNotification>), ConfigError> {
        config.validate()?;

        let (notifications, notifications_rx) = mpsc::unbounded_channel();
        let (batches_tx, batches) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        let broker = Self {
            gateway,
            registry: Arc::new(OrderRegistry::new()),
            config,
            cash: Decimal::ZERO,
            notifications,
            batches,
            batches_tx,
            shutdown_tx,
            monitor_task: None,
        };
        Ok((broker, notifications_rx))
    }

    /// Fetch the opening balance and start the reconciliation poller.
    ///
    /// The poller first runs a catch-up pass so terminal trades that predate
    /// startup are never re-delivered.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure if the opening balance cannot be fetched.
    pub async fn start(&mut self) -> Result<(), LiveBrokerError> {
        self.refresh_account_balance().await?;

        let mut monitor = TradeMonitor::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.registry),
            self.batches_tx.clone(),
            self.config.poll_interval(),
        );
        monitor.prime().await;

        let shutdown_rx = self.shutdown_tx.subscribe();
        self.monitor_task = Some(tokio::spawn(monitor.run(shutdown_rx)));

        info!(cash = %self.cash, "live broker started");
        Ok(())
    }

    /// Signal the reconciliation poller to stop.
    ///
    /// The poller observes the signal at its next cycle boundary; use
    /// [`LiveBroker::join`] to wait for it.
    pub fn stop(&self) {
        // Send only fails when the monitor already exited.
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for the poller task to exit, at most one poll interval after
    /// [`LiveBroker::stop`].
    pub async fn join(&mut self) {
        let Some(task) = self.monitor_task.take() else {
            return;
        };
        if let Err(err) = task.await {
            error!(error = %err, "trade monitor task failed");
        }
        info!("live broker stopped");
    }

    /// Cash available for trading, as of the last balance refresh.
    #[must_use]
    pub const fn cash(&self) -> Decimal {
        self.cash
    }

    /// Atomic snapshot of all orders currently tracked as live.
    #[must_use]
    pub fn active_orders(&self) -> Vec<Order> {
        self.registry.snapshot()
    }

    /// Re-fetch the account balance from the brokerage.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the cached balance keeps its last value.
    pub async fn refresh_account_balance(&mut self) -> Result<(), LiveBrokerError> {
        let balance = self.gateway.account_balance().await?;
        self.cash = balance.cash;
        debug!(cash = %balance.cash, "account balance refreshed");
        Ok(())
    }

    /// Create a market order in the `Initial` state.
    #[must_use]
    pub fn create_market_order(
        &self,
        action: OrderAction,
        instrument: impl Into<String>,
        quantity: Decimal,
    ) -> Order {
        Order::new(action, instrument, OrderType::Market, quantity, None, None)
    }

    /// Create a limit order in the `Initial` state.
    #[must_use]
    pub fn create_limit_order(
        &self,
        action: OrderAction,
        instrument: impl Into<String>,
        limit_price: Decimal,
        quantity: Decimal,
    ) -> Order {
        Order::new(
            action,
            instrument,
            OrderType::Limit,
            quantity,
            Some(limit_price),
            None,
        )
    }

    /// Create a stop (stop-market) order in the `Initial` state.
    #[must_use]
    pub fn create_stop_order(
        &self,
        action: OrderAction,
        instrument: impl Into<String>,
        stop_price: Decimal,
        quantity: Decimal,
    ) -> Order {
        Order::new(
            action,
            instrument,
            OrderType::Stop,
            quantity,
            None,
            Some(stop_price),
        )
    }

    /// Create a stop-limit order in the `Initial` state.
    #[must_use]
    pub fn create_stop_limit_order(
        &self,
        action: OrderAction,
        instrument: impl Into<String>,
        stop_price: Decimal,
        limit_price: Decimal,
        quantity: Decimal,
    ) -> Order {
        Order::new(
            action,
            instrument,
            OrderType::StopLimit,
            quantity,
            Some(limit_price),
            Some(stop_price),
        )
    }

    /// Place an order with the brokerage and register it for reconciliation.
    ///
    /// On success the order is `Submitted` and owned by the registry; the
    /// caller follows its progress through the notification stream. On
    /// failure the order is dropped un-submitted and nothing is registered.
    ///
    /// # Errors
    ///
    /// Returns [`LiveBrokerError::AlreadySubmitted`] when the order already
    /// left `Initial`, or [`LiveBrokerError::Placement`] wrapping the gateway
    /// failure.
    pub async fn submit_order(&self, mut order: Order) -> Result<BrokerOrderId, LiveBrokerError> {
        if !order.is_initial() {
            return Err(LiveBrokerError::AlreadySubmitted {
                order_id: order.id().to_string(),
            });
        }

        // Brokerage constraints: orders are held until canceled, and partial
        // fills are never a distinct concept.
        order.set_good_till_canceled(true);
        order.set_all_or_none(false);

        let (exchange, symbol) = self.split_instrument(order.instrument());
        let order_type = order.order_type();
        let request = PlaceOrderRequest {
            side: order.action().side(),
            product_type: self.config.product_type.clone(),
            exchange,
            symbol,
            quantity: order.quantity(),
            price: if order_type.has_limit_price() {
                order.limit_price().unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ZERO
            },
            price_type: order_type.into(),
            trigger_price: if order_type.has_stop_price() {
                order.stop_price().unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ZERO
            },
            retention: self.config.retention.clone(),
            remarks: Some(format!("order-{}", order.id())),
        };

        let ack = self.gateway.place_order(request).await.map_err(|source| {
            error!(
                order_id = %order.id(),
                instrument = %order.instrument(),
                error = %source,
                "order placement failed"
            );
            LiveBrokerError::Placement {
                instrument: order.instrument().to_string(),
                source,
            }
        })?;

        info!(
            order_id = %order.id(),
            broker_order_id = %ack.order_id,
            instrument = %order.instrument(),
            quantity = %order.quantity(),
            "order placed"
        );

        order.mark_submitted(ack.order_id.clone(), ack.placed_at);
        order.switch_to(OrderStatus::Submitted);
        self.registry.register(order);
        Ok(ack.order_id)
    }

    /// Cancel a live order at the brokerage and close it out locally.
    ///
    /// Takes the caller's snapshot of the order; the registry copy is the
    /// one mutated. The order leaves the registry and a `Canceled`
    /// notification carrying the user-cancel note is emitted immediately;
    /// any later remote cancel event for the same order is discarded as no
    /// longer registered.
    ///
    /// # Errors
    ///
    /// Returns [`LiveBrokerError::AlreadyFilled`] for fully executed orders,
    /// [`LiveBrokerError::OrderNotActive`] for orders that were never placed
    /// or already left the registry, or the gateway failure. On a gateway
    /// failure the order stays registered and live.
    pub async fn cancel_order(&mut self, order: &Order) -> Result<(), LiveBrokerError> {
        if order.is_filled() {
            return Err(LiveBrokerError::AlreadyFilled {
                order_id: order.id().to_string(),
            });
        }
        let Some(broker_order_id) = order.broker_order_id().cloned() else {
            return Err(LiveBrokerError::OrderNotActive {
                order_id: order.id().to_string(),
            });
        };
        if !self.registry.contains(&broker_order_id) {
            return Err(LiveBrokerError::OrderNotActive {
                order_id: broker_order_id.to_string(),
            });
        }

        self.gateway.cancel_order(&broker_order_id).await?;

        let mut order = self.registry.unregister(&broker_order_id);
        order.switch_to(OrderStatus::Canceled);
        info!(
            broker_order_id = %broker_order_id,
            filled = %order.filled(),
            "order canceled on user request"
        );

        if let Err(err) = self.refresh_account_balance().await {
            warn!(error = %err, "account balance refresh failed after cancel");
        }
        self.notify(OrderNotification::Canceled {
            order,
            reason: Some(USER_CANCEL_REASON.to_string()),
        });
        Ok(())
    }

    /// One dispatch tick.
    ///
    /// Promotes freshly submitted orders to `Accepted`, then drains at most
    /// one trade batch from the hand-off queue, waiting no longer than the
    /// configured dispatch timeout so the caller's loop keeps its cadence.
    pub async fn dispatch(&mut self) {
        // Acceptance is an engine-side transition: placement acknowledgment
        // already proves the brokerage has the order.
        for snapshot in self.registry.snapshot() {
            if snapshot.status() != OrderStatus::Submitted {
                continue;
            }
            let Some(id) = snapshot.broker_order_id().cloned() else {
                continue;
            };
            let accepted = self.registry.modify(&id, |order| {
                order.switch_to(OrderStatus::Accepted);
                order.clone()
            });
            if let Some(order) = accepted {
                debug!(broker_order_id = %id, "order accepted");
                self.notify(OrderNotification::Accepted { order });
            }
        }

        match tokio::time::timeout(self.config.dispatch_timeout(), self.batches.recv()).await {
            Ok(Some(batch)) => {
                for event in batch {
                    self.on_trade(&event).await;
                }
            }
            // Monitor side closed; nothing left to drain.
            Ok(None) => {}
            // No trade batch this tick.
            Err(_) => {}
        }
    }

    /// Apply one reconciled trade event to its order.
    async fn on_trade(&mut self, event: &TradeEvent) {
        if !self.registry.contains(&event.order_id) {
            debug!(
                broker_order_id = %event.order_id,
                "trade event for unregistered order, skipping"
            );
            return;
        }

        match event.status {
            RemoteStatus::Complete => self.apply_fill(event).await,
            RemoteStatus::Canceled => self.close_order(event, event.reject_reason.clone()),
            RemoteStatus::Rejected => {
                error!(
                    broker_order_id = %event.order_id,
                    reason = event.reject_reason.as_deref().unwrap_or("unknown"),
                    "order rejected"
                );
                self.close_order(event, event.reject_reason.clone());
            }
            RemoteStatus::Unrecognized(ref raw) => {
                error!(
                    broker_order_id = %event.order_id,
                    status = %raw,
                    "unknown trade event status, order left untouched"
                );
            }
            // The monitor only publishes terminal statuses.
            RemoteStatus::Open | RemoteStatus::Pending => {
                debug!(
                    broker_order_id = %event.order_id,
                    status = %event.status,
                    "non-terminal trade event, skipping"
                );
            }
        }
    }

    /// Apply a `Complete` event: derive the incremental fill from the
    /// reported cumulative quantity and advance the order.
    async fn apply_fill(&mut self, event: &TradeEvent) {
        let applied = self
            .registry
            .modify(&event.order_id, |order| {
                let increment = round_quantity(event.filled_quantity - order.filled());
                if increment <= Decimal::ZERO {
                    // Re-reported cumulative quantity; nothing new to apply.
                    return None;
                }
                let execution = ExecutionInfo {
                    avg_price: event.avg_fill_price,
                    quantity: increment,
                    fee: Decimal::ZERO,
                    executed_at: event.event_time,
                };
                order.add_execution(execution.clone());
                Some((order.clone(), execution))
            })
            .flatten();

        let Some((order, execution)) = applied else {
            return;
        };

        if order.is_filled() {
            self.registry.unregister(&event.order_id);
            info!(
                broker_order_id = %event.order_id,
                quantity = %order.filled(),
                avg_fill_price = %order.avg_fill_price(),
                "order filled"
            );
            self.notify(OrderNotification::Filled { order, execution });
            if let Err(err) = self.refresh_account_balance().await {
                warn!(error = %err, "account balance refresh failed after fill");
            }
        } else {
            info!(
                broker_order_id = %event.order_id,
                filled = %order.filled(),
                remaining = %order.remaining(),
                "order partially filled"
            );
            self.notify(OrderNotification::PartiallyFilled { order, execution });
        }
    }

    /// Close out an order canceled or rejected remotely.
    fn close_order(&mut self, event: &TradeEvent, reason: Option<String>) {
        let mut order = self.registry.unregister(&event.order_id);
        order.switch_to(OrderStatus::Canceled);
        info!(
            broker_order_id = %event.order_id,
            status = %event.status,
            filled = %order.filled(),
            "order closed remotely"
        );
        self.notify(OrderNotification::Canceled { order, reason });
    }

    fn notify(&self, notification: OrderNotification) {
        if self.notifications.send(notification).is_err() {
            debug!("notification receiver dropped");
        }
    }

    /// Split an `EXCHANGE|SYMBOL` instrument, falling back to the configured
    /// default exchange for bare symbols.
    fn split_instrument(&self, instrument: &str) -> (String, String) {
        match instrument.split_once('|') {
            Some((exchange, symbol)) => (exchange.to_string(), symbol.to_string()),
            None => (
                self.config.default_exchange.clone(),
                instrument.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::{AccountBalance, MockBrokerGateway, PlaceOrderAck, parse_event_time};
    use rust_decimal_macros::dec;

    fn ack(broker_id: &str) -> PlaceOrderAck {
        PlaceOrderAck {
            order_id: BrokerOrderId::new(broker_id),
            placed_at: parse_event_time("09:30:00 20-05-2026").unwrap(),
        }
    }

    fn complete_event(broker_id: &str, filled: Decimal, price: Decimal, at: &str) -> TradeEvent {
        TradeEvent {
            order_id: BrokerOrderId::new(broker_id),
            status: RemoteStatus::Complete,
            reject_reason: None,
            avg_fill_price: price,
            filled_quantity: filled,
            event_time: parse_event_time(at).unwrap(),
        }
    }

    fn broker(
        gateway: MockBrokerGateway,
    ) -> (
        LiveBroker<MockBrokerGateway>,
        mpsc::UnboundedReceiver<OrderNotification>,
    ) {
        LiveBroker::new(Arc::new(gateway), LiveBrokerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn submit_places_and_registers() {
        let mut gateway = MockBrokerGateway::new();
        gateway
            .expect_place_order()
            .withf(|request| {
                request.exchange == "NFO"
                    && request.symbol == "NIFTY23MAY18000C"
                    && request.price == dec!(55.00)
                    && request.trigger_price == Decimal::ZERO
                    && request.price_type.wire_code() == "LMT"
            })
            .returning(|_| Ok(ack("b-1")));

        let (broker, _notifications) = broker(gateway);
        let order = broker.create_limit_order(
            OrderAction::Buy,
            "NFO|NIFTY23MAY18000C",
            dec!(55.00),
            dec!(100),
        );

        let broker_id = broker.submit_order(order).await.unwrap();
        assert_eq!(broker_id.as_str(), "b-1");

        let snapshot = broker.active_orders();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status(), OrderStatus::Submitted);
        assert!(snapshot[0].good_till_canceled());
        assert!(!snapshot[0].all_or_none());
    }

    #[tokio::test]
    async fn submit_uses_default_exchange_for_bare_symbols() {
        let mut gateway = MockBrokerGateway::new();
        gateway
            .expect_place_order()
            .withf(|request| request.exchange == "NSE" && request.symbol == "INFY-EQ")
            .returning(|_| Ok(ack("b-1")));

        let (broker, _notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "INFY-EQ", dec!(10));
        broker.submit_order(order).await.unwrap();
    }

    #[tokio::test]
    async fn submit_forwards_trigger_price_for_stop_orders() {
        let mut gateway = MockBrokerGateway::new();
        gateway
            .expect_place_order()
            .withf(|request| {
                request.trigger_price == dec!(44000)
                    && request.price == Decimal::ZERO
                    && request.price_type.wire_code() == "SL-MKT"
            })
            .returning(|_| Ok(ack("b-1")));

        let (broker, _notifications) = broker(gateway);
        let order = broker.create_stop_order(
            OrderAction::Sell,
            "NFO|BANKNIFTY23MAY44000C",
            dec!(44000),
            dec!(25),
        );
        broker.submit_order(order).await.unwrap();
    }

    #[tokio::test]
    async fn failed_placement_registers_nothing() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| {
            Err(GatewayError::Rejected {
                message: "invalid quantity".to_string(),
            })
        });

        let (broker, _notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(0));

        let err = broker.submit_order(order).await.unwrap_err();
        assert!(matches!(err, LiveBrokerError::Placement { .. }));
        assert!(broker.active_orders().is_empty());
    }

    #[tokio::test]
    async fn resubmitting_is_a_usage_error() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().never();

        let (broker, _notifications) = broker(gateway);
        let mut order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(10));
        order.mark_submitted(
            BrokerOrderId::new("b-1"),
            parse_event_time("09:30:00 20-05-2026").unwrap(),
        );
        order.switch_to(OrderStatus::Submitted);

        let err = broker.submit_order(order).await.unwrap_err();
        assert!(matches!(err, LiveBrokerError::AlreadySubmitted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_promotes_submitted_orders() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| Ok(ack("b-1")));

        let (mut broker, mut notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(10));
        broker.submit_order(order).await.unwrap();

        broker.dispatch().await;

        let notification = notifications.try_recv().unwrap();
        assert!(matches!(notification, OrderNotification::Accepted { .. }));
        assert_eq!(notification.order().status(), OrderStatus::Accepted);
        assert_eq!(broker.active_orders()[0].status(), OrderStatus::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_applies_partial_then_complete_fill() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| Ok(ack("b-1")));
        gateway
            .expect_account_balance()
            .returning(|| Ok(AccountBalance { cash: dec!(88000) }));

        let (mut broker, mut notifications) = broker(gateway);
        let order =
            broker.create_limit_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(1500), dec!(100));
        broker.submit_order(order).await.unwrap();
        broker.dispatch().await;
        let _accepted = notifications.try_recv().unwrap();

        broker
            .batches_tx
            .send(vec![complete_event(
                "b-1",
                dec!(40),
                dec!(1499.50),
                "10:00:00 20-05-2026",
            )])
            .await
            .unwrap();
        broker.dispatch().await;

        let partial = notifications.try_recv().unwrap();
        let OrderNotification::PartiallyFilled { order, execution } = partial else {
            panic!("expected a partial fill, got {partial:?}");
        };
        assert_eq!(order.filled(), dec!(40));
        assert_eq!(execution.quantity, dec!(40));

        broker
            .batches_tx
            .send(vec![complete_event(
                "b-1",
                dec!(100),
                dec!(1499.75),
                "10:00:05 20-05-2026",
            )])
            .await
            .unwrap();
        broker.dispatch().await;

        let filled = notifications.try_recv().unwrap();
        let OrderNotification::Filled { order, execution } = filled else {
            panic!("expected a complete fill, got {filled:?}");
        };
        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.filled(), dec!(100));
        // Incremental quantity, not the reported cumulative.
        assert_eq!(execution.quantity, dec!(60));
        assert!(broker.active_orders().is_empty());
        assert_eq!(broker.cash(), dec!(88000));
    }

    #[tokio::test(start_paused = true)]
    async fn redelivered_cumulative_fill_is_ignored() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| Ok(ack("b-1")));

        let (mut broker, mut notifications) = broker(gateway);
        let order =
            broker.create_limit_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(1500), dec!(100));
        broker.submit_order(order).await.unwrap();
        broker.dispatch().await;
        let _accepted = notifications.try_recv().unwrap();

        let event = complete_event("b-1", dec!(40), dec!(1499.50), "10:00:00 20-05-2026");
        broker
            .batches_tx
            .send(vec![event.clone(), event])
            .await
            .unwrap();
        broker.dispatch().await;

        let _partial = notifications.try_recv().unwrap();
        assert!(notifications.try_recv().is_err());
        assert_eq!(broker.active_orders()[0].filled(), dec!(40));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_event_closes_with_reason() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| Ok(ack("b-1")));

        let (mut broker, mut notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(10));
        broker.submit_order(order).await.unwrap();
        broker.dispatch().await;
        let _accepted = notifications.try_recv().unwrap();

        broker
            .batches_tx
            .send(vec![TradeEvent {
                order_id: BrokerOrderId::new("b-1"),
                status: RemoteStatus::Rejected,
                reject_reason: Some("insufficient margin".to_string()),
                avg_fill_price: Decimal::ZERO,
                filled_quantity: Decimal::ZERO,
                event_time: parse_event_time("10:00:00 20-05-2026").unwrap(),
            }])
            .await
            .unwrap();
        broker.dispatch().await;

        let notification = notifications.try_recv().unwrap();
        let OrderNotification::Canceled { order, reason } = notification else {
            panic!("expected a cancel, got {notification:?}");
        };
        assert_eq!(order.status(), OrderStatus::Canceled);
        assert_eq!(reason.as_deref(), Some("insufficient margin"));
        assert!(broker.active_orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_status_event_leaves_order_untouched() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| Ok(ack("b-1")));

        let (mut broker, mut notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(10));
        broker.submit_order(order).await.unwrap();
        broker.dispatch().await;
        let _accepted = notifications.try_recv().unwrap();

        broker
            .batches_tx
            .send(vec![TradeEvent {
                order_id: BrokerOrderId::new("b-1"),
                status: RemoteStatus::Unrecognized("TRIGGER_PENDING".to_string()),
                reject_reason: None,
                avg_fill_price: Decimal::ZERO,
                filled_quantity: Decimal::ZERO,
                event_time: parse_event_time("10:00:00 20-05-2026").unwrap(),
            }])
            .await
            .unwrap();
        broker.dispatch().await;

        assert!(notifications.try_recv().is_err());
        let snapshot = broker.active_orders();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status(), OrderStatus::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn events_for_unknown_orders_are_skipped() {
        let gateway = MockBrokerGateway::new();
        let (mut broker, mut notifications) = broker(gateway);

        broker
            .batches_tx
            .send(vec![complete_event(
                "b-404",
                dec!(10),
                dec!(100),
                "10:00:00 20-05-2026",
            )])
            .await
            .unwrap();
        broker.dispatch().await;

        assert!(notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_closes_order_and_notifies() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| Ok(ack("b-1")));
        gateway.expect_cancel_order().returning(|_| Ok(()));
        gateway
            .expect_account_balance()
            .returning(|| Ok(AccountBalance { cash: dec!(90000) }));

        let (mut broker, mut notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(10));
        broker.submit_order(order).await.unwrap();
        let snapshot = broker.active_orders().remove(0);

        broker.cancel_order(&snapshot).await.unwrap();

        let notification = notifications.try_recv().unwrap();
        let OrderNotification::Canceled { order, reason } = notification else {
            panic!("expected a cancel, got {notification:?}");
        };
        assert_eq!(order.status(), OrderStatus::Canceled);
        assert_eq!(reason.as_deref(), Some(USER_CANCEL_REASON));
        assert!(broker.active_orders().is_empty());
        assert_eq!(broker.cash(), dec!(90000));
    }

    #[tokio::test]
    async fn cancel_unplaced_order_never_reaches_gateway() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_cancel_order().never();

        let (mut broker, _notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(10));

        let err = broker.cancel_order(&order).await.unwrap_err();
        assert!(matches!(err, LiveBrokerError::OrderNotActive { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fill_is_a_usage_error() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| Ok(ack("b-1")));
        gateway
            .expect_account_balance()
            .returning(|| Ok(AccountBalance { cash: dec!(88000) }));
        gateway.expect_cancel_order().never();

        let (mut broker, mut notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(10));
        broker.submit_order(order).await.unwrap();
        broker.dispatch().await;
        let _accepted = notifications.try_recv().unwrap();

        broker
            .batches_tx
            .send(vec![complete_event(
                "b-1",
                dec!(10),
                dec!(1500),
                "10:00:00 20-05-2026",
            )])
            .await
            .unwrap();
        broker.dispatch().await;
        let filled = notifications.try_recv().unwrap();

        let err = broker.cancel_order(filled.order()).await.unwrap_err();
        assert!(matches!(err, LiveBrokerError::AlreadyFilled { .. }));
    }

    #[tokio::test]
    async fn cancel_failure_keeps_order_registered() {
        let mut gateway = MockBrokerGateway::new();
        gateway.expect_place_order().returning(|_| Ok(ack("b-1")));
        gateway.expect_cancel_order().returning(|_| {
            Err(GatewayError::Connection {
                message: "timeout".to_string(),
            })
        });

        let (mut broker, mut notifications) = broker(gateway);
        let order = broker.create_market_order(OrderAction::Buy, "NSE|INFY-EQ", dec!(10));
        broker.submit_order(order).await.unwrap();
        let snapshot = broker.active_orders().remove(0);

        let err = broker.cancel_order(&snapshot).await.unwrap_err();
        assert!(matches!(err, LiveBrokerError::Gateway(_)));
        assert_eq!(broker.active_orders().len(), 1);
        assert!(notifications.try_recv().is_err());
    }
}
