//! OrdersManager - order creation, status transitions and shipper hand-off
//!
//! Every mutation follows the same shape:
//!
//! ```text
//! operation(...)
//!     ├─ 1. Validate input / resolve entities (no write txn held)
//!     ├─ 2. Await external collaborators (distance provider)
//!     ├─ 3. Begin write transaction
//!     ├─ 4. Fresh read of the order, re-validate against current state
//!     ├─ 5. Write order, details, queue and checkout rows
//!     ├─ 6. Commit
//!     └─ 7. Publish events and create notifications (best-effort)
//! ```
//!
//! redb admits a single writer, so step 4-6 is the per-order serialization
//! point. Nothing is published for a transaction that did not commit.

use super::builder::{OrderAggregateBuilder, compose_totals, validate_request};
use super::state_machine::{
    Actor, TransitionEffects, authorize, effects_of, status_message, validate_transition,
};
use super::{OrderError, OrderResult};
use crate::dispatch::{DispatchConfig, PendingAssignmentQueue};
use crate::geo::DistanceProvider;
use crate::message::EventBus;
use crate::notifications::NotificationService;
use crate::pricing::money::to_f64;
use crate::pricing::{FeeCalculator, FeeConfig, OrderAmounts, PromotionValidator};
use crate::storage::{
    AddressRepository, CatalogRepository, CheckoutRepository, NotificationRepository,
    OrderRepository, PromotionRepository, Storage, StorageError,
};
use crate::utils::SharedClock;
use crate::utils::validation::{MAX_NOTE_LEN, validate_optional_text, validate_required_text};
use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::message::{
    OrderBusEvent, OrderCreatedPayload, OrderStatusUpdatedPayload, RemovalReason,
    ShipperAssignedPayload, ShipperPoolOfferPayload, ShipperPoolRemovalPayload,
};
use shared::models::{
    CheckoutStatus, CreateOrderRequest, DeliveryType, NotificationType, Order, OrderStatus,
    OrderWithDetails, PendingShipperAssignment, ShippingDetail,
};
use std::sync::Arc;

/// A request to move an order to another status
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub order_id: i64,
    pub to: OrderStatus,
    pub actor: Actor,
    /// Recorded on the order when canceling
    pub reason: Option<String>,
}

impl TransitionRequest {
    pub fn new(order_id: i64, to: OrderStatus, actor: Actor) -> Self {
        Self {
            order_id,
            to,
            actor,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Result of a guarded transition
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Order),
    /// The guard declined under the fresh read; nothing was written
    Skipped(Order),
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Applied(order) | Self::Skipped(order) => order,
        }
    }
}

/// What a committed transition did, for post-commit publishing
struct AppliedTransition {
    order: Order,
    from: OrderStatus,
    effects: TransitionEffects,
    enqueued: Option<PendingShipperAssignment>,
    removed_from_pool: bool,
    reason: Option<String>,
}

#[derive(Clone)]
pub struct OrdersManager {
    storage: Storage,
    orders: OrderRepository,
    checkouts: CheckoutRepository,
    builder: OrderAggregateBuilder,
    promotions: PromotionValidator,
    queue: PendingAssignmentQueue,
    notifications: NotificationService,
    bus: EventBus,
    distance: Arc<dyn DistanceProvider>,
    fees: FeeCalculator,
    clock: SharedClock,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &self.storage)
            .field("distance", &"<dyn DistanceProvider>")
            .field("fees", &self.fees)
            .field("dispatch", self.queue.config())
            .finish_non_exhaustive()
    }
}

impl OrdersManager {
    pub fn new(
        storage: Storage,
        bus: EventBus,
        distance: Arc<dyn DistanceProvider>,
        fee_config: FeeConfig,
        dispatch: DispatchConfig,
        clock: SharedClock,
    ) -> Self {
        let catalog = CatalogRepository::new(storage.clone());
        let addresses = AddressRepository::new(storage.clone());
        Self {
            orders: OrderRepository::new(storage.clone()),
            checkouts: CheckoutRepository::new(storage.clone()),
            builder: OrderAggregateBuilder::new(catalog, addresses),
            promotions: PromotionValidator::new(
                PromotionRepository::new(storage.clone()),
                clock.clone(),
            ),
            queue: PendingAssignmentQueue::new(storage.clone(), clock.clone(), dispatch),
            notifications: NotificationService::new(
                NotificationRepository::new(storage.clone()),
                clock.clone(),
            ),
            storage,
            bus,
            distance,
            fees: FeeCalculator::new(fee_config),
            clock,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn orders(&self) -> &OrderRepository {
        &self.orders
    }

    pub fn checkouts(&self) -> &CheckoutRepository {
        &self.checkouts
    }

    pub fn queue(&self) -> &PendingAssignmentQueue {
        &self.queue
    }

    pub fn promotions(&self) -> &PromotionValidator {
        &self.promotions
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    // ========== Creation ==========

    /// Build, price and persist a new order
    ///
    /// COD orders start in `pending` and are announced to the restaurant
    /// right away; other payment methods start in `processing_payment` and
    /// are announced once payment is confirmed.
    pub async fn create_order(&self, req: CreateOrderRequest) -> OrderResult<OrderWithDetails> {
        validate_request(&req)?;
        let ctx = self.builder.load_context(&req)?;
        let cart = self.builder.price_items(req.restaurant_id, &req.items)?;

        let route = self
            .distance
            .route(ctx.restaurant_location, ctx.delivery_location)
            .await;
        let quote = self.fees.quote(route.distance_km)?;
        let now = self.clock.now_millis();
        let estimate = self.fees.estimate_delivery(
            &route,
            req.delivery_type,
            req.requested_delivery_time,
            now,
        )?;

        let promotion_code = req
            .promotion_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let amounts = OrderAmounts::new(
            to_f64(cart.subtotal),
            to_f64(quote.shipping_fee),
        );
        if let Some(code) = &promotion_code {
            let check = self.promotions.validate(code, amounts)?;
            if !check.valid {
                return Err(OrderError::PromotionInvalid {
                    code: code.clone(),
                    reason: check.reason.unwrap_or_default(),
                });
            }
        }

        let status = if req.payment_method.is_cod() {
            OrderStatus::Pending
        } else {
            OrderStatus::ProcessingPayment
        };

        let txn = self.storage.begin_write()?;
        let order_id = self.orders.next_id_txn(&txn)?;
        let (promotion, discount) = match &promotion_code {
            Some(code) => {
                let (promotion, discount) = self.promotions.use_code_txn(&txn, code, amounts)?;
                (Some(promotion), discount)
            }
            None => (None, Decimal::ZERO),
        };
        let totals = compose_totals(cart.subtotal, &quote, discount);
        let order = Order {
            id: order_id,
            user_id: ctx.user.id,
            restaurant_id: ctx.restaurant.id,
            status,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
            shipper_earnings: totals.shipper_earnings,
            platform_fee: totals.platform_fee,
            promotion_discount: totals.promotion_discount,
            total: totals.total,
            delivery_address: ctx.delivery_snapshot(),
            restaurant_location: ctx.restaurant_location,
            delivery_distance_km: to_f64(quote.distance_km),
            estimated_delivery_minutes: estimate.minutes,
            estimated_delivery_at: estimate.estimated_at,
            delivery_type: req.delivery_type,
            requested_delivery_time: match req.delivery_type {
                DeliveryType::Scheduled => req.requested_delivery_time,
                DeliveryType::Asap => None,
            },
            promotion_id: promotion.as_ref().map(|p| p.id),
            promotion_code: promotion.as_ref().map(|p| p.code.clone()),
            payment_method: req.payment_method,
            is_paid: false,
            payment_date: None,
            note: req.note.clone(),
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        let details = cart.into_details(order_id);
        self.orders.insert_txn(&txn, &order, &details)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            order_id,
            user_id = order.user_id,
            restaurant_id = order.restaurant_id,
            status = %order.status,
            total = order.total,
            distance_km = order.delivery_distance_km,
            route_source = ?route.source,
            "Order created"
        );

        if order.status == OrderStatus::Pending {
            self.announce_created(&order, details.len());
        } else {
            self.notifications.notify(
                order.user_id,
                status_message(order.id, order.status, None),
                NotificationType::OrderStatus,
                Some(order.id),
            );
        }

        Ok(OrderWithDetails {
            order,
            details,
            shipping: None,
        })
    }

    // ========== Transitions ==========

    /// Move an order to another status
    pub fn transition(&self, request: TransitionRequest) -> OrderResult<Order> {
        self.transition_with(request, |_, _| true, |_, _| Ok(()))
            .map(TransitionOutcome::into_order)
    }

    /// Move an order to another status if `guard` still holds under a
    /// fresh read, running `hook` inside the same transaction
    ///
    /// A declining guard is not an error: the outcome is `Skipped` and
    /// nothing is written.
    pub fn transition_with<G, H>(
        &self,
        request: TransitionRequest,
        guard: G,
        hook: H,
    ) -> OrderResult<TransitionOutcome>
    where
        G: FnOnce(&Order, Option<&ShippingDetail>) -> bool,
        H: FnOnce(&WriteTransaction, &Order) -> OrderResult<()>,
    {
        let TransitionRequest {
            order_id,
            to,
            actor,
            reason,
        } = request;
        validate_optional_text(&reason, "reason", MAX_NOTE_LEN)
            .map_err(|e| OrderError::Validation(e.message))?;

        let txn = self.storage.begin_write()?;
        let mut order = self
            .orders
            .get_txn(&txn, order_id)?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let shipping = self.orders.get_shipping_txn(&txn, order_id)?;

        if !guard(&order, shipping.as_ref()) {
            tracing::debug!(order_id, status = %order.status, target = %to, "Transition skipped by guard");
            return Ok(TransitionOutcome::Skipped(order));
        }
        validate_transition(order.status, to)?;
        authorize(&order, to, actor)?;

        let from = order.status;
        let effects = effects_of(from, to, shipping.is_some());
        let now = self.clock.now_millis();

        order.status = to;
        order.updated_at = now;
        if to == OrderStatus::Canceled {
            order.cancel_reason = reason.clone();
        }
        if effects.mark_paid {
            order.is_paid = true;
            order.payment_date = Some(now);
        }
        self.orders.update_txn(&txn, from, &order)?;

        let enqueued = if effects.enqueue_assignment {
            let priority = self.queue.config().default_priority;
            let (assignment, _) = self.queue.enqueue_txn(&txn, order_id, priority)?;
            Some(assignment)
        } else {
            None
        };
        let removed_from_pool = effects.remove_assignment && self.queue.remove_txn(&txn, order_id)?;
        if effects.cancel_checkouts {
            self.cancel_open_checkouts_txn(&txn, order_id, now)?;
        }
        hook(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id, from = %from, to = %to, actor = %actor, "Order status changed");

        let applied = AppliedTransition {
            order: order.clone(),
            from,
            effects,
            enqueued,
            removed_from_pool,
            reason,
        };
        self.after_transition(applied);
        Ok(TransitionOutcome::Applied(order))
    }

    fn cancel_open_checkouts_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
        now: i64,
    ) -> OrderResult<usize> {
        let mut canceled = 0;
        for mut checkout in self.checkouts.list_for_order_txn(txn, order_id)? {
            if checkout.status.is_terminal() {
                continue;
            }
            checkout.status = CheckoutStatus::Cancelled;
            checkout.updated_at = now;
            self.checkouts.put_txn(txn, &checkout)?;
            canceled += 1;
        }
        if canceled > 0 {
            tracing::info!(order_id, canceled, "Open checkouts cancelled");
        }
        Ok(canceled)
    }

    fn after_transition(&self, applied: AppliedTransition) {
        let AppliedTransition {
            order,
            from,
            effects,
            enqueued,
            removed_from_pool,
            reason,
        } = applied;

        self.bus
            .publish(OrderBusEvent::OrderStatusUpdated(OrderStatusUpdatedPayload {
                order_id: order.id,
                restaurant_id: order.restaurant_id,
                user_id: order.user_id,
                from,
                to: order.status,
                reason: reason.clone(),
            }));

        if effects.announce_created {
            let item_count = match self.orders.details(order.id) {
                Ok(details) => details.len(),
                Err(e) => {
                    tracing::warn!(order_id = order.id, error = %e, "Failed to count order lines");
                    0
                }
            };
            self.announce_created(&order, item_count);
        } else {
            let notification_type = if order.status == OrderStatus::Canceled {
                NotificationType::OrderCanceled
            } else {
                NotificationType::OrderStatus
            };
            self.notifications.notify(
                order.user_id,
                status_message(order.id, order.status, reason.as_deref()),
                notification_type,
                Some(order.id),
            );
        }

        if let Some(assignment) = enqueued {
            self.offer_to_pool(&order, &assignment);
        }
        if removed_from_pool {
            self.bus
                .publish(OrderBusEvent::OrderRemovedFromShipperPool(ShipperPoolRemovalPayload {
                    order_id: order.id,
                    reason: RemovalReason::StatusChanged,
                }));
        }
    }

    fn announce_created(&self, order: &Order, item_count: usize) {
        self.bus.publish(OrderBusEvent::OrderCreated(OrderCreatedPayload {
            order_id: order.id,
            restaurant_id: order.restaurant_id,
            user_id: order.user_id,
            total: order.total,
            item_count,
            created_at: order.created_at,
        }));
        self.notifications.notify(
            order.user_id,
            status_message(order.id, OrderStatus::Pending, None),
            NotificationType::OrderCreated,
            Some(order.id),
        );
    }

    fn offer_to_pool(&self, order: &Order, assignment: &PendingShipperAssignment) {
        self.bus
            .publish(OrderBusEvent::OrderConfirmedForShippers(ShipperPoolOfferPayload {
                order_id: order.id,
                restaurant_id: order.restaurant_id,
                restaurant_location: order.restaurant_location,
                delivery_location: order.delivery_address.location,
                radius_km: self.queue.config().pool_radius_km,
                delivery_distance_km: order.delivery_distance_km,
                shipper_earnings: order.shipper_earnings,
                priority: assignment.priority,
                attempt: assignment.attempt_count,
            }));
    }

    // ========== Shipper hand-off ==========

    /// A shipper takes a confirmed order
    ///
    /// The shipping detail is durable and unique per order; a second
    /// shipper gets `ShipperAlreadyAssigned`.
    pub fn accept_assignment(&self, order_id: i64, shipper_id: i64) -> OrderResult<ShippingDetail> {
        let txn = self.storage.begin_write()?;
        let order = self
            .orders
            .get_txn(&txn, order_id)?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        if self.orders.get_shipping_txn(&txn, order_id)?.is_some() {
            return Err(OrderError::ShipperAlreadyAssigned(order_id));
        }
        if order.status != OrderStatus::Confirmed {
            return Err(OrderError::Validation(format!(
                "order {} is {} and not awaiting a shipper",
                order_id, order.status
            )));
        }

        let shipping = ShippingDetail {
            order_id,
            shipper_id,
            shipper_earnings: order.shipper_earnings,
            assigned_at: self.clock.now_millis(),
        };
        self.orders.insert_shipping_txn(&txn, &shipping)?;
        let removed = self.queue.remove_txn(&txn, order_id)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id, shipper_id, "Shipper assigned");

        self.bus.publish(OrderBusEvent::ShipperAssigned(ShipperAssignedPayload {
            order_id,
            restaurant_id: order.restaurant_id,
            user_id: order.user_id,
            shipper_id,
            shipper_earnings: shipping.shipper_earnings,
        }));
        if removed {
            self.bus
                .publish(OrderBusEvent::OrderRemovedFromShipperPool(ShipperPoolRemovalPayload {
                    order_id,
                    reason: RemovalReason::ShipperAccepted,
                }));
        }
        self.notifications.notify(
            order.user_id,
            format!("A shipper has picked up order #{order_id}"),
            NotificationType::ShipperAssigned,
            Some(order_id),
        );
        Ok(shipping)
    }

    /// A shipper declined an offer; the next offer is pushed out
    pub fn record_rejection(
        &self,
        order_id: i64,
        shipper_id: i64,
        reason: &str,
    ) -> OrderResult<PendingShipperAssignment> {
        let reason = reason.trim();
        validate_required_text(reason, "reason", MAX_NOTE_LEN)
            .map_err(|e| OrderError::Validation(e.message))?;

        let txn = self.storage.begin_write()?;
        let note = format!("shipper {shipper_id} rejected: {reason}");
        let assignment = self
            .queue
            .record_attempt_txn(&txn, order_id, Some(note))?
            .ok_or(OrderError::AssignmentNotFound(order_id))?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            order_id,
            shipper_id,
            attempt_count = assignment.attempt_count,
            next_attempt_at = assignment.next_attempt_at,
            "Shipper rejected offer"
        );
        Ok(assignment)
    }

    /// Offer a queued order to the pool again
    ///
    /// Entries whose order is no longer confirmed-and-unassigned are
    /// discarded and `None` is returned.
    pub fn reoffer_assignment(&self, order_id: i64) -> OrderResult<Option<PendingShipperAssignment>> {
        let txn = self.storage.begin_write()?;
        let order = self.orders.get_txn(&txn, order_id)?;
        let has_shipper = self.orders.get_shipping_txn(&txn, order_id)?.is_some();

        let order = match order {
            Some(order) if order.status == OrderStatus::Confirmed && !has_shipper => order,
            _ => {
                let removed = self.queue.remove_txn(&txn, order_id)?;
                txn.commit().map_err(StorageError::from)?;
                if removed {
                    tracing::info!(order_id, "Discarded stale pending assignment");
                }
                return Ok(None);
            }
        };

        let Some(assignment) = self.queue.record_attempt_txn(&txn, order_id, None)? else {
            return Ok(None);
        };
        txn.commit().map_err(StorageError::from)?;

        tracing::debug!(order_id, attempt_count = assignment.attempt_count, "Order re-offered to shippers");
        self.offer_to_pool(&order, &assignment);
        Ok(Some(assignment))
    }

    // ========== Queries / admin ==========

    pub fn get_order(&self, order_id: i64) -> OrderResult<OrderWithDetails> {
        self.orders
            .get_with_details(order_id)?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Remove an order with everything hanging off it
    pub fn delete_order(&self, order_id: i64) -> OrderResult<()> {
        let txn = self.storage.begin_write()?;
        let order = self
            .orders
            .get_txn(&txn, order_id)?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let removed = self.queue.remove_txn(&txn, order_id)?;
        let checkouts = self.checkouts.delete_for_order_txn(&txn, order_id)?;
        self.orders.delete_txn(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id, checkouts, "Order deleted");
        if removed {
            self.bus
                .publish(OrderBusEvent::OrderRemovedFromShipperPool(ShipperPoolRemovalPayload {
                    order_id,
                    reason: RemovalReason::Deleted,
                }));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests;
