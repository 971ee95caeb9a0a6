//! Trade monitor: background reconciliation poller.
//!
//! Discovers orders whose remote status has become terminal and hands them
//! to the dispatch side, in remote-event order, exactly once per transition.
//!
//! Each cycle diffs the remote order book against the registry's active set,
//! pulls the per-order status history for the candidates, and publishes one
//! batch of normalized [`TradeEvent`]s. A high-water mark over remote event
//! timestamps prevents redelivery when consecutive cycles observe the same
//! terminal trade before dispatch has drained the previous batch. The wire
//! timestamps have one-second resolution, so events sharing the mark's
//! timestamp are deduplicated individually rather than dropped wholesale: a
//! fill that completes in the same second as the one that advanced the mark
//! must still go out.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::registry::OrderRegistry;
use crate::gateway::{BrokerGateway, RemoteStatus};
use crate::models::BrokerOrderId;

/// Normalized snapshot of one remote order's terminal transition.
///
/// Immutable once constructed; the timestamp is always resolvable because
/// entries without one are discarded before an event is built.
#[derive(Debug, Clone)]
pub struct TradeEvent {
    /// Broker-assigned order id.
    pub order_id: BrokerOrderId,
    /// Terminal remote status that produced this event.
    pub status: RemoteStatus,
    /// Rejection reason, when rejected.
    pub reject_reason: Option<String>,
    /// Average fill price reported by the brokerage.
    pub avg_fill_price: Decimal,
    /// Cumulative filled quantity reported by the brokerage.
    pub filled_quantity: Decimal,
    /// Remote event timestamp.
    pub event_time: NaiveDateTime,
}

/// Background poller that reconciles local orders against the remote
/// order book.
pub struct TradeMonitor<G> {
    gateway: Arc<G>,
    registry: Arc<OrderRegistry>,
    batches: mpsc::Sender<Vec<TradeEvent>>,
    poll_interval: Duration,
    /// Latest remote event timestamp already delivered downstream.
    last_event_at: Option<NaiveDateTime>,
    /// Events already delivered at exactly `last_event_at`. Timestamps have
    /// one-second resolution, so distinct events can share the mark's
    /// timestamp across cycles; this set tells them apart.
    delivered_at_mark: HashSet<(BrokerOrderId, RemoteStatus, Decimal)>,
}

impl<G: BrokerGateway> TradeMonitor<G> {
    /// Create a monitor publishing batches onto `batches`.
    pub(crate) fn new(
        gateway: Arc<G>,
        registry: Arc<OrderRegistry>,
        batches: mpsc::Sender<Vec<TradeEvent>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            registry,
            batches,
            poll_interval,
            last_event_at: None,
            delivered_at_mark: HashSet::new(),
        }
    }

    /// Latest remote event timestamp already delivered downstream.
    #[must_use]
    pub const fn last_event_at(&self) -> Option<NaiveDateTime> {
        self.last_event_at
    }

    /// Initial synchronous catch-up pass.
    ///
    /// Establishes the high-water mark from the latest terminal trade already
    /// visible remotely, without publishing anything, so the engine does not
    /// re-deliver trades that predate its own startup.
    pub(crate) async fn prime(&mut self) {
        let trades = self.collect_new_trades().await;
        if let Some(last) = trades.last() {
            info!(
                last_event_at = %last.event_time,
                order_id = %last.order_id,
                "catch-up poll done, resuming after last known trade"
            );
            self.advance_mark(&trades);
        } else {
            debug!("catch-up poll found no prior terminal trades");
        }
    }

    /// Long-lived polling loop.
    ///
    /// Cycle failures are logged and never terminate the loop; the shutdown
    /// signal is checked once per cycle, so stopping takes at most one poll
    /// interval.
    pub(crate) async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "trade monitor started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_cycle().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("trade monitor stopping");
                    break;
                }
            }
        }
    }

    /// One poll cycle: collect, advance the mark, publish the batch.
    async fn poll_cycle(&mut self) {
        let trades = self.collect_new_trades().await;
        if trades.is_empty() {
            return;
        }

        // The mark only advances on cycles that actually yield events.
        self.advance_mark(&trades);

        info!(count = trades.len(), "new terminal trade/s found");
        if self.batches.send(trades).await.is_err() {
            warn!("hand-off queue closed, dropping trade batch");
        }
    }

    /// Move the high-water mark to the newest event of `trades` and record
    /// which events sit exactly on it, so a later cycle re-observing the
    /// same second delivers only what is genuinely new.
    fn advance_mark(&mut self, trades: &[TradeEvent]) {
        let Some(last) = trades.last() else {
            return;
        };
        if self.last_event_at != Some(last.event_time) {
            self.last_event_at = Some(last.event_time);
            self.delivered_at_mark.clear();
        }
        for event in trades.iter().filter(|e| e.event_time == last.event_time) {
            self.delivered_at_mark.insert((
                event.order_id.clone(),
                event.status.clone(),
                event.filled_quantity,
            ));
        }
    }

    /// Collect terminal trades for registered orders, oldest first, with
    /// already-delivered events filtered out.
    async fn collect_new_trades(&self) -> Vec<TradeEvent> {
        let order_book = match self.gateway.order_book().await {
            Ok(book) if book.is_empty() => {
                debug!("no orders placed for the day yet");
                return Vec::new();
            }
            Ok(book) => book,
            Err(err) => {
                // Transient: treated as "no new information", retried next cycle.
                info!(error = %err, "order book unavailable this cycle");
                return Vec::new();
            }
        };

        let active = self.registry.active_ids();
        let mut events = Vec::new();

        for summary in order_book {
            if summary.event_time.is_none() {
                continue;
            }
            if !active.contains(&summary.order_id) {
                // Not ours to reconcile, or already closed out locally.
                continue;
            }

            debug!(
                order_id = %summary.order_id,
                side = ?summary.transaction_type,
                price_type = ?summary.price_type,
                status = %summary.status,
                "reconciling remote order"
            );

            let history = match self.gateway.order_history(&summary.order_id).await {
                Ok(history) => history,
                Err(err) => {
                    error!(
                        order_id = %summary.order_id,
                        error = %err,
                        "order history fetch failed, retrying next cycle"
                    );
                    continue;
                }
            };

            for entry in history {
                match entry.status {
                    RemoteStatus::Open | RemoteStatus::Pending => {
                        // Not yet actionable.
                    }
                    RemoteStatus::Complete | RemoteStatus::Canceled | RemoteStatus::Rejected => {
                        let Some(event_time) = entry.event_time else {
                            continue;
                        };
                        events.push(TradeEvent {
                            order_id: summary.order_id.clone(),
                            status: entry.status,
                            reject_reason: entry.reject_reason,
                            avg_fill_price: entry.avg_fill_price,
                            filled_quantity: entry.filled_quantity,
                            event_time,
                        });
                    }
                    RemoteStatus::Unrecognized(ref raw) => {
                        error!(
                            order_id = %summary.order_id,
                            status = %raw,
                            "unknown remote trade status"
                        );
                    }
                }
            }
        }

        // Oldest first; the sort is stable, so timestamp ties keep fetch order.
        events.sort_by_key(|event| event.event_time);

        // Drop events already delivered by an earlier cycle. Events sharing
        // the mark's one-second timestamp are compared individually: only
        // those recorded as delivered are dropped.
        if let Some(mark) = self.last_event_at {
            events.retain(|event| {
                if event.event_time != mark {
                    return event.event_time > mark;
                }
                !self.delivered_at_mark.contains(&(
                    event.order_id.clone(),
                    event.status.clone(),
                    event.filled_quantity,
                ))
            });
        }

        events
    }
}
