//! Payment gateway seam and checkout coordination
//!
//! A checkout is one gateway attempt for one order. Gateway calls happen
//! without a write transaction held; the result is written back in its own
//! transaction, and a successful payment moves the order
//! `processing_payment -> pending` atomically with the checkout update.

mod http;

pub use http::{HttpPaymentGateway, UnconfiguredGateway};

use crate::orders::{Actor, OrderError, OrderResult, OrdersManager, TransitionOutcome, TransitionRequest};
use crate::storage::StorageError;
use crate::utils::SharedClock;
use async_trait::async_trait;
use shared::models::{Checkout, CheckoutStatus, OrderStatus, PaymentMethod};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid payment gateway response: {0}")]
    InvalidResponse(String),

    #[error("Payment gateway is not configured")]
    NotConfigured,
}

/// Intent created by the gateway for one checkout
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub redirect_url: Option<String>,
    /// Raw gateway payload, kept opaque
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed(String),
}

/// External payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    async fn create_intent(
        &self,
        order_id: i64,
        amount: f64,
        method: PaymentMethod,
    ) -> Result<PaymentIntent, PaymentError>;

    async fn confirm(&self, intent_id: &str) -> Result<PaymentOutcome, PaymentError>;
}

#[derive(Debug, Clone)]
pub struct CheckoutService {
    manager: OrdersManager,
    gateway: Arc<dyn PaymentGateway>,
    clock: SharedClock,
}

impl CheckoutService {
    pub fn new(manager: OrdersManager, gateway: Arc<dyn PaymentGateway>) -> Self {
        let clock = manager.clock().clone();
        Self {
            manager,
            gateway,
            clock,
        }
    }

    /// Open a checkout for an order awaiting payment
    ///
    /// An already open checkout is returned as-is. A gateway failure is
    /// recorded as a FAILED checkout and the order stays in
    /// `processing_payment`.
    pub async fn start_checkout(&self, order_id: i64) -> OrderResult<Checkout> {
        let order = self.manager.get_order(order_id)?.order;
        if order.payment_method.is_cod() {
            return Err(OrderError::PaymentMethod(
                "cash-on-delivery orders are paid to the shipper".to_string(),
            ));
        }
        if order.status != OrderStatus::ProcessingPayment {
            return Err(OrderError::Validation(format!(
                "order {} is {} and not awaiting payment",
                order_id, order.status
            )));
        }
        let checkouts = self.manager.checkouts();
        if let Some(open) = checkouts
            .list_for_order(order_id)?
            .into_iter()
            .find(|c| c.status == CheckoutStatus::Pending)
        {
            return Ok(open);
        }

        let intent = self
            .gateway
            .create_intent(order_id, order.total, order.payment_method)
            .await;

        let now = self.clock.now_millis();
        let mut checkout = Checkout {
            id: 0,
            order_id,
            user_id: order.user_id,
            amount: order.total,
            payment_method: order.payment_method,
            status: CheckoutStatus::Pending,
            payment_intent_id: None,
            payment_url: None,
            payment_details: None,
            created_at: now,
            updated_at: now,
        };
        let gateway_error = match intent {
            Ok(intent) => {
                checkout.payment_intent_id = Some(intent.id);
                checkout.payment_url = intent.redirect_url;
                checkout.payment_details = intent.details;
                None
            }
            Err(e) => {
                tracing::warn!(order_id, error = %e, "Payment intent creation failed");
                checkout.status = CheckoutStatus::Failed;
                checkout.payment_details = Some(serde_json::json!({ "error": e.to_string() }));
                Some(e)
            }
        };

        let txn = self.manager.storage().begin_write()?;
        let current = self
            .manager
            .orders()
            .get_txn(&txn, order_id)?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        if current.status != OrderStatus::ProcessingPayment
            && checkout.status == CheckoutStatus::Pending
        {
            // Order left processing_payment while the gateway was busy
            checkout.status = CheckoutStatus::Cancelled;
        }
        checkout.id = checkouts.next_id_txn(&txn)?;
        checkouts.insert_txn(&txn, &checkout)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id, checkout_id = checkout.id, status = %checkout.status, "Checkout recorded");
        match gateway_error {
            Some(e) => Err(OrderError::Payment(e.to_string())),
            None => Ok(checkout),
        }
    }

    /// Settle a checkout with the gateway's verdict
    pub async fn confirm_payment(&self, checkout_id: i64) -> OrderResult<Checkout> {
        let checkouts = self.manager.checkouts();
        let checkout = checkouts
            .get(checkout_id)?
            .ok_or(OrderError::CheckoutNotFound(checkout_id))?;
        if checkout.status.is_terminal() {
            return Err(OrderError::CheckoutFinished(checkout_id));
        }
        let intent_id = checkout
            .payment_intent_id
            .clone()
            .ok_or_else(|| OrderError::Payment(format!("checkout {checkout_id} has no intent")))?;

        let outcome = self
            .gateway
            .confirm(&intent_id)
            .await
            .map_err(|e| OrderError::Payment(e.to_string()))?;

        match outcome {
            PaymentOutcome::Succeeded => self.complete(checkout),
            PaymentOutcome::Failed(reason) => self.fail(checkout, reason),
        }
    }

    fn complete(&self, checkout: Checkout) -> OrderResult<Checkout> {
        let checkouts = self.manager.checkouts();
        let now = self.clock.now_millis();
        let mut completed = None;

        let outcome = self.manager.transition_with(
            TransitionRequest::new(checkout.order_id, OrderStatus::Pending, Actor::PaymentGateway),
            |order, _| order.status == OrderStatus::ProcessingPayment,
            |txn, _| {
                let mut current = checkouts
                    .get_txn(txn, checkout.id)?
                    .ok_or(OrderError::CheckoutNotFound(checkout.id))?;
                if current.status.is_terminal() {
                    return Err(OrderError::CheckoutFinished(checkout.id));
                }
                current.status = CheckoutStatus::Completed;
                current.updated_at = now;
                checkouts.put_txn(txn, &current)?;
                completed = Some(current);
                Ok(())
            },
        )?;

        match (outcome, completed) {
            (TransitionOutcome::Applied(_), Some(checkout)) => {
                tracing::info!(order_id = checkout.order_id, checkout_id = checkout.id, "Payment completed");
                Ok(checkout)
            }
            (outcome, _) => {
                let order = outcome.into_order();
                tracing::warn!(
                    order_id = order.id,
                    checkout_id = checkout.id,
                    status = %order.status,
                    "Payment succeeded for an order no longer awaiting payment"
                );
                Err(OrderError::Validation(format!(
                    "order {} is {} and not awaiting payment",
                    order.id, order.status
                )))
            }
        }
    }

    fn fail(&self, checkout: Checkout, reason: String) -> OrderResult<Checkout> {
        let checkouts = self.manager.checkouts();
        let txn = self.manager.storage().begin_write()?;
        let mut current = checkouts
            .get_txn(&txn, checkout.id)?
            .ok_or(OrderError::CheckoutNotFound(checkout.id))?;
        if current.status.is_terminal() {
            return Err(OrderError::CheckoutFinished(checkout.id));
        }
        current.status = CheckoutStatus::Failed;
        current.updated_at = self.clock.now_millis();
        let mut details = current.payment_details.take().unwrap_or_else(|| serde_json::json!({}));
        if let Some(map) = details.as_object_mut() {
            map.insert("failure_reason".into(), serde_json::Value::String(reason.clone()));
        }
        current.payment_details = Some(details);
        checkouts.put_txn(&txn, &current)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id = current.order_id, checkout_id = current.id, reason = %reason, "Payment failed");
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::manager::tests::{
        TestEnv, USER, cod_request, create_card_order, test_env,
    };
    use shared::message::{OrderBusEvent, Topic};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct StubGateway {
        fail_intent: bool,
        outcome: Mutex<Option<PaymentOutcome>>,
        intents: Mutex<Vec<(i64, f64)>>,
    }

    impl StubGateway {
        fn settling(outcome: PaymentOutcome) -> Self {
            Self {
                outcome: Mutex::new(Some(outcome)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_intent(
            &self,
            order_id: i64,
            amount: f64,
            _method: PaymentMethod,
        ) -> Result<PaymentIntent, PaymentError> {
            if self.fail_intent {
                return Err(PaymentError::Rejected("gateway down".into()));
            }
            self.intents.lock().unwrap().push((order_id, amount));
            Ok(PaymentIntent {
                id: format!("pi_{order_id}"),
                redirect_url: Some(format!("https://pay.example/{order_id}")),
                details: None,
            })
        }

        async fn confirm(&self, _intent_id: &str) -> Result<PaymentOutcome, PaymentError> {
            self.outcome
                .lock()
                .unwrap()
                .clone()
                .ok_or(PaymentError::NotConfigured)
        }
    }

    fn service(env: &TestEnv, gateway: StubGateway) -> (CheckoutService, Arc<StubGateway>) {
        let gateway = Arc::new(gateway);
        (
            CheckoutService::new(env.manager.clone(), gateway.clone()),
            gateway,
        )
    }

    #[tokio::test]
    async fn test_start_checkout_opens_intent() {
        let env = test_env();
        let order = create_card_order(&env).await;
        let (service, gateway) = service(&env, StubGateway::default());

        let checkout = service.start_checkout(order.id).await.unwrap();
        assert_eq!(checkout.status, CheckoutStatus::Pending);
        assert_eq!(checkout.amount, order.total);
        assert_eq!(checkout.user_id, USER);
        assert_eq!(checkout.payment_intent_id.as_deref(), Some(format!("pi_{}", order.id).as_str()));
        assert!(checkout.payment_url.is_some());

        // Open checkout is reused
        let again = service.start_checkout(order.id).await.unwrap();
        assert_eq!(again.id, checkout.id);
        assert_eq!(gateway.intents.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_error_records_failed_checkout() {
        let env = test_env();
        let order = create_card_order(&env).await;
        let (service, _) = service(
            &env,
            StubGateway {
                fail_intent: true,
                ..Default::default()
            },
        );

        let err = service.start_checkout(order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::Payment(_)));

        let rows = env.manager.checkouts().list_for_order(order.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, CheckoutStatus::Failed);
        assert_eq!(env.status_of(order.id), OrderStatus::ProcessingPayment);
    }

    #[tokio::test]
    async fn test_cod_orders_have_no_checkout() {
        let env = test_env();
        let order = env.manager.create_order(cod_request()).await.unwrap().order;
        let (service, _) = service(&env, StubGateway::default());
        assert!(matches!(
            service.start_checkout(order.id).await,
            Err(OrderError::PaymentMethod(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_payment_releases_order() {
        let env = test_env();
        let order = create_card_order(&env).await;
        let (service, _) = service(&env, StubGateway::settling(PaymentOutcome::Succeeded));
        let checkout = service.start_checkout(order.id).await.unwrap();
        let mut feed = env.subscribe(Topic::RestaurantFeed);

        let settled = service.confirm_payment(checkout.id).await.unwrap();
        assert_eq!(settled.status, CheckoutStatus::Completed);
        assert_eq!(env.status_of(order.id), OrderStatus::Pending);
        assert!(
            feed.drain()
                .iter()
                .any(|e| matches!(e.event, OrderBusEvent::OrderCreated(_)))
        );

        // Terminal checkouts are immutable
        assert!(matches!(
            service.confirm_payment(checkout.id).await,
            Err(OrderError::CheckoutFinished(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_payment_keeps_order_waiting() {
        let env = test_env();
        let order = create_card_order(&env).await;
        let (service, _) = service(
            &env,
            StubGateway::settling(PaymentOutcome::Failed("card_declined".into())),
        );
        let checkout = service.start_checkout(order.id).await.unwrap();

        let settled = service.confirm_payment(checkout.id).await.unwrap();
        assert_eq!(settled.status, CheckoutStatus::Failed);
        assert_eq!(
            settled.payment_details.unwrap()["failure_reason"],
            "card_declined"
        );
        assert_eq!(env.status_of(order.id), OrderStatus::ProcessingPayment);

        // A fresh attempt is allowed after a failure
        let retry = service.start_checkout(order.id).await.unwrap();
        assert_ne!(retry.id, checkout.id);
    }

    #[tokio::test]
    async fn test_payment_after_cancel_is_refused() {
        let env = test_env();
        let order = create_card_order(&env).await;
        let (service, _) = service(&env, StubGateway::settling(PaymentOutcome::Succeeded));
        let checkout = service.start_checkout(order.id).await.unwrap();

        env.manager
            .transition(TransitionRequest::new(
                order.id,
                OrderStatus::Canceled,
                Actor::System,
            ))
            .unwrap();

        // Cancel closed the checkout
        assert!(matches!(
            service.confirm_payment(checkout.id).await,
            Err(OrderError::CheckoutFinished(_))
        ));
        assert_eq!(env.status_of(order.id), OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn test_unknown_checkout() {
        let env = test_env();
        let (service, _) = service(&env, StubGateway::default());
        assert!(matches!(
            service.confirm_payment(1).await,
            Err(OrderError::CheckoutNotFound(1))
        ));
    }
}
