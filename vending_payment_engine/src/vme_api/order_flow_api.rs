use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        NewOrder,
        NewPaymentTransaction,
        Order,
        OrderCode,
        OrderStatusType,
        OrderStatusType::{Cancelled, Completed, Dispensing, Failed, Paid},
        PaymentSource,
    },
    events::{EventProducers, OrderFailedEvent, OrderUpdateEvent},
    traits::{PaymentGatewayError, StockAdjuster, VendingDatabase},
};

/// `OrderFlowApi` is the primary API for moving orders through their lifecycle in response to
/// gateway payment events and machine dispense callbacks.
///
/// Four triggers feed into it concurrently: the payment-status poll, the gateway webhook, manual
/// confirmation by staff, and the machine's dispense-complete callback. All of them funnel into
/// [`Self::transition`], which lets the ledger's guarded update decide which caller actually
/// traverses an edge. Side effects (stock decrement, event hooks) fire only for the caller that
/// won the edge, so duplicates and races collapse into no-ops.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: VendingDatabase + StockAdjuster
{
    /// Submit a new order to the ledger.
    ///
    /// Idempotent. If an order with the same order code already exists, the existing record is
    /// returned and the second element is `false`. A duplicate code with *different* details is
    /// logged loudly, since it means two sales tried to use one gateway reference.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let (stored, created) = self.db.insert_order(order.clone()).await?;
        if created {
            debug!("🔄️📦️ Order [{}] created for machine {}", stored.order_code, stored.machine_id);
        } else if order.is_equivalent(&stored) {
            debug!("🔄️📦️ Order [{}] already exists. Returning the stored record.", stored.order_code);
        } else {
            warn!(
                "🔄️📦️ Order [{}] already exists with different details. The stored record wins; the new submission \
                 is discarded.",
                stored.order_code
            );
        }
        Ok((stored, created))
    }

    pub async fn fetch_order(&self, code: &OrderCode) -> Result<Option<Order>, PaymentGatewayError> {
        self.db.fetch_order_by_code(code).await
    }

    /// Orders a machine should still act on: paid, but not yet dispensed.
    pub async fn fetch_paid_orders(&self, machine_id: i64) -> Result<Vec<Order>, PaymentGatewayError> {
        self.db.fetch_orders_in_status(machine_id, Paid).await
    }

    /// Moves the order onto `target`, returning the resulting order and whether *this call*
    /// traversed the edge.
    ///
    /// The edge-traversal flag is what gates every side effect downstream. Outcomes:
    /// * The order is already in `target`, or somewhere downstream of it: `Ok((order, false))`.
    ///   This is the benign-duplicate case.
    /// * The order is in a state from which `target` can be entered: the ledger performs the
    ///   guarded update. If it reports success, `Ok((order, true))`. If it reports a lost race,
    ///   the order is re-read and classified by the two rules above.
    /// * Anything else is a genuine conflict: `Err(InvalidStateChange)`.
    pub async fn transition(
        &self,
        code: &OrderCode,
        target: OrderStatusType,
    ) -> Result<(Order, bool), PaymentGatewayError> {
        let order = self.db.fetch_order_by_code(code).await?.ok_or(PaymentGatewayError::OrderNotFound(*code))?;
        let current = order.status;
        if current == target {
            trace!("🔄️🪜️ Order [{code}] is already {target}. Nothing to do.");
            return Ok((order, false));
        }
        if target.entered_from().is_empty() {
            // No edge leads into this state, so there is no duplicate trigger to be lenient about
            return Err(PaymentGatewayError::InvalidStateChange { order: *code, from: current, to: target });
        }
        if current.is_downstream_of(target) {
            trace!("🔄️🪜️ Order [{code}] is already past {target}. Nothing to do.");
            return Ok((order, false));
        }
        if !target.entered_from().contains(&current) {
            return Err(PaymentGatewayError::InvalidStateChange { order: *code, from: current, to: target });
        }
        match self.db.advance_order_status(code, target).await? {
            Some(updated) => {
                info!("🔄️🪜️ Order [{code}] moved from {current} to {target}");
                self.call_order_update_hook(&updated, current).await;
                Ok((updated, true))
            },
            None => {
                // Lost the race. Someone else moved the order while we were looking at it.
                let now = self.db.fetch_order_by_code(code).await?.ok_or(PaymentGatewayError::OrderNotFound(*code))?;
                if now.status == target || now.status.is_downstream_of(target) {
                    trace!("🔄️🪜️ Order [{code}] reached {target} via a concurrent trigger.");
                    Ok((now, false))
                } else {
                    Err(PaymentGatewayError::InvalidStateChange { order: *code, from: now.status, to: target })
                }
            },
        }
    }

    /// Marks the order as paid in response to a settled gateway payment or a manual confirmation.
    ///
    /// Safe to call any number of times from any trigger. The stock decrement happens exactly
    /// once per order, and only on the call that traversed the edge into `Paid`. A confirmation
    /// for an order that has been cancelled (or has failed) is logged and swallowed: the money
    /// has moved, and flagging an error at the gateway would achieve nothing.
    pub async fn confirm_payment(&self, code: &OrderCode, source: PaymentSource) -> Result<Order, PaymentGatewayError> {
        trace!("🔄️✅️ Payment for order [{code}] reported as settled via {source}");
        match self.transition(code, Paid).await {
            Ok((order, true)) => {
                debug!("🔄️✅️ Order [{code}] is paid ({source})");
                self.adjust_stock_once(&order).await?;
                Ok(order)
            },
            Ok((order, false)) => {
                debug!("🔄️✅️ Duplicate payment confirmation for order [{code}] via {source}. Ignoring.");
                Ok(order)
            },
            Err(PaymentGatewayError::InvalidStateChange { order, from, to }) => {
                warn!(
                    "🔄️✅️ Payment settled for order [{order}] via {source}, but the order is {from} and cannot move \
                     to {to}. The payment is recorded; the order is left untouched."
                );
                self.db.fetch_order_by_code(code).await?.ok_or(PaymentGatewayError::OrderNotFound(*code))
            },
            Err(e) => Err(e),
        }
    }

    /// Records the gateway's settlement against the order and then confirms the payment.
    ///
    /// The transaction record is deduplicated on order code, so a webhook retry produces one
    /// audit row, not two. Returns the order and whether a new transaction row was written.
    pub async fn settle_gateway_payment(
        &self,
        tx: NewPaymentTransaction,
        source: PaymentSource,
    ) -> Result<(Order, bool), PaymentGatewayError> {
        let code = tx.order_code;
        let recorded = self.db.record_gateway_transaction(tx).await?;
        if !recorded {
            debug!("🔄️💰️ A payment transaction for order [{code}] has already been recorded. Skipping.");
        }
        let order = self.confirm_payment(&code, source).await?;
        Ok((order, recorded))
    }

    /// Handles the machine's dispense-complete callback.
    ///
    /// On success the order is walked through `Dispensing` into `Completed`, one edge at a time,
    /// so that a callback arriving straight from `Paid` still traverses both edges. The stock
    /// decrement fires here if no earlier trigger claimed it. On failure the order moves to
    /// `Failed` and the failure hook is notified.
    ///
    /// Unlike payment confirmation, a conflicting callback is an error: a machine reporting a
    /// dispense for an order that was never paid, or that already failed, is something the
    /// operator needs to hear about.
    pub async fn dispense_completed(
        &self,
        code: &OrderCode,
        success: bool,
        reason: Option<String>,
    ) -> Result<Order, PaymentGatewayError> {
        if success {
            let (_, _) = self.transition(code, Dispensing).await?;
            let (order, _) = self.transition(code, Completed).await?;
            self.adjust_stock_once(&order).await?;
            info!("🔄️🥤️ Order [{code}] completed. Product dispensed.");
            Ok(order)
        } else {
            let (order, moved) = self.transition(code, Failed).await?;
            let why = reason.unwrap_or_else(|| "Machine reported dispense failure".to_string());
            if moved {
                error!("🔄️🥤️ Order [{code}] FAILED: {why}. The customer has paid and received nothing.");
                self.call_order_failed_hook(&order, &why).await;
            }
            Ok(order)
        }
    }

    /// Cancels a pending order. Paid orders cannot be cancelled through this path.
    pub async fn cancel_order(&self, code: &OrderCode) -> Result<Order, PaymentGatewayError> {
        let (order, moved) = self.transition(code, Cancelled).await?;
        if moved {
            info!("🔄️❌️ Order [{code}] cancelled");
        }
        Ok(order)
    }

    /// Performs the stock decrement for the order if, and only if, no trigger has performed it
    /// yet. The ledger flag is the arbiter; the first caller to claim it wins and every later
    /// caller finds the flag already set.
    async fn adjust_stock_once(&self, order: &Order) -> Result<(), PaymentGatewayError> {
        let code = &order.order_code;
        if !self.db.try_mark_stock_adjusted(code).await? {
            trace!("🔄️🧮️ Stock for order [{code}] has already been adjusted.");
            return Ok(());
        }
        match self.db.reduce_stock(order.machine_id, order.product_id).await? {
            Some(slot) => {
                debug!(
                    "🔄️🧮️ Stock decremented for order [{code}]: machine {}, slot {}, {} remaining",
                    order.machine_id, slot.slot_code, slot.stock
                );
            },
            None => {
                // The sale went through regardless; inventory was already out of sync.
                warn!(
                    "🔄️🧮️ No slot with remaining stock for product {} in machine {} while settling order [{code}]. \
                     Inventory is out of sync with the physical machine.",
                    order.product_id, order.machine_id
                );
            },
        }
        Ok(())
    }

    async fn call_order_update_hook(&self, order: &Order, previous: OrderStatusType) {
        for emitter in &self.producers.order_update_producer {
            trace!("🔄️📦️ Notifying order update subscribers");
            let event = OrderUpdateEvent::new(order.clone(), previous);
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_failed_hook(&self, order: &Order, reason: &str) {
        for emitter in &self.producers.order_failed_producer {
            let event = OrderFailedEvent::new(order.clone(), reason);
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
