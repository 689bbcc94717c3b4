//! Reconciliation jobs - periodic sweeps over orders, the assignment queue
//! and temporary addresses
//!
//! Each job is a plain function of "now" (from the injected clock) and the
//! repositories. Every item is re-checked under a fresh read inside its own
//! write transaction, so a concurrent mutation turns the item into a skip.
//! Per-item failures are logged and counted; the sweep carries on.

mod scheduler;

pub use scheduler::Scheduler;

use crate::orders::{Actor, OrderError, OrderResult, OrdersManager, TransitionOutcome, TransitionRequest};
use crate::storage::{AddressRepository, StorageError};
use shared::message::{AssignmentExpiredPayload, OrderBusEvent};
use shared::models::OrderStatus;
use std::time::Duration;

pub const PAYMENT_TIMEOUT_REASON: &str = "Payment timed out";
pub const NO_SHIPPER_REASON: &str = "No shipper available";

/// Time budgets and sweep intervals
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub payment_timeout_minutes: i64,
    pub assignment_timeout_minutes: i64,
    pub temp_address_ttl_hours: i64,
    pub stuck_payment_interval: Duration,
    pub unassigned_interval: Duration,
    pub address_gc_interval: Duration,
    pub assignment_retry_interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            payment_timeout_minutes: 15,
            assignment_timeout_minutes: 30,
            temp_address_ttl_hours: 24,
            stuck_payment_interval: Duration::from_secs(600),
            unassigned_interval: Duration::from_secs(600),
            address_gc_interval: Duration::from_secs(3600),
            assignment_retry_interval: Duration::from_secs(60),
        }
    }
}

/// Outcome counters for one sweep run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub job: &'static str,
    pub scanned: usize,
    pub acted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn new(job: &'static str) -> Self {
        Self {
            job,
            scanned: 0,
            acted: 0,
            skipped: 0,
            failed: 0,
        }
    }

    pub fn log(&self) {
        if self.acted > 0 || self.failed > 0 {
            tracing::info!(
                job = self.job,
                scanned = self.scanned,
                acted = self.acted,
                skipped = self.skipped,
                failed = self.failed,
                "Sweep finished"
            );
        } else {
            tracing::debug!(job = self.job, scanned = self.scanned, "Sweep finished, nothing to do");
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationJobs {
    manager: OrdersManager,
    addresses: AddressRepository,
    config: SweepConfig,
}

impl ReconciliationJobs {
    pub fn new(manager: OrdersManager, config: SweepConfig) -> Self {
        let addresses = AddressRepository::new(manager.storage().clone());
        Self {
            manager,
            addresses,
            config,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    fn now(&self) -> i64 {
        self.manager.clock().now_millis()
    }

    /// Cancel orders stuck in `processing_payment` past the payment timeout
    ///
    /// Cancellation also closes the order's open checkouts.
    pub fn sweep_stuck_payments(&self) -> OrderResult<SweepReport> {
        let mut report = SweepReport::new("stuck_payments");
        let cutoff = self.now() - self.config.payment_timeout_minutes * 60_000;
        let stuck = self
            .manager
            .orders()
            .find_by_status_created_before(OrderStatus::ProcessingPayment, cutoff)?;

        for order in stuck {
            report.scanned += 1;
            let request = TransitionRequest::new(order.id, OrderStatus::Canceled, Actor::System)
                .with_reason(PAYMENT_TIMEOUT_REASON);
            match self.manager.transition_with(
                request,
                |current, _| current.status == OrderStatus::ProcessingPayment,
                |_, _| Ok(()),
            ) {
                Ok(TransitionOutcome::Applied(_)) => {
                    tracing::info!(order_id = order.id, "Canceled order stuck in payment");
                    report.acted += 1;
                }
                Ok(TransitionOutcome::Skipped(_)) | Err(OrderError::OrderNotFound(_)) => {
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(order_id = order.id, error = %e, "Failed to cancel stuck payment");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Cancel confirmed orders nobody picked up within the assignment timeout
    ///
    /// The order is re-read before acting; an order that meanwhile got a
    /// shipper or changed status only loses its stale queue entry.
    pub fn sweep_unassigned_orders(&self) -> OrderResult<SweepReport> {
        let mut report = SweepReport::new("unassigned_orders");
        let now = self.now();
        let cutoff = now - self.config.assignment_timeout_minutes * 60_000;
        let expired = self.manager.queue().get_expired_assignments(cutoff)?;

        for assignment in expired {
            report.scanned += 1;
            let order_id = assignment.order_id;
            let request = TransitionRequest::new(order_id, OrderStatus::Canceled, Actor::System)
                .with_reason(NO_SHIPPER_REASON);
            let result = self.manager.transition_with(
                request,
                |current, shipping| current.status == OrderStatus::Confirmed && shipping.is_none(),
                |_, _| Ok(()),
            );

            match result {
                Ok(TransitionOutcome::Applied(order)) => {
                    tracing::info!(
                        order_id,
                        attempts = assignment.attempt_count,
                        "Canceled order with no shipper"
                    );
                    self.manager
                        .bus()
                        .publish(OrderBusEvent::AssignmentExpired(AssignmentExpiredPayload {
                            order_id,
                            restaurant_id: order.restaurant_id,
                            attempt_count: assignment.attempt_count,
                            age_minutes: assignment.age_minutes(now),
                        }));
                    report.acted += 1;
                }
                Ok(TransitionOutcome::Skipped(_)) | Err(OrderError::OrderNotFound(_)) => {
                    report.skipped += 1;
                    if let Err(e) = self.manager.queue().remove_pending_assignment(order_id) {
                        tracing::warn!(order_id, error = %e, "Failed to drop stale assignment");
                    }
                }
                Err(e) => {
                    tracing::warn!(order_id, error = %e, "Failed to expire assignment");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Re-offer due, unexpired queue entries to the shipper pool
    pub fn retry_assignments(&self) -> OrderResult<SweepReport> {
        let mut report = SweepReport::new("assignment_retry");
        let now = self.now();
        let due = self.manager.queue().list_pending(now)?;

        for assignment in due {
            if assignment.is_expired(now, self.config.assignment_timeout_minutes) {
                continue;
            }
            report.scanned += 1;
            match self.manager.reoffer_assignment(assignment.order_id) {
                Ok(Some(_)) => report.acted += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(order_id = assignment.order_id, error = %e, "Failed to re-offer order");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Delete temporary addresses older than their TTL
    ///
    /// Orders keep their own address snapshot, so this never breaks one.
    pub fn gc_temporary_addresses(&self) -> OrderResult<SweepReport> {
        let mut report = SweepReport::new("temporary_addresses");
        let before = self.now() - self.config.temp_address_ttl_hours * 3_600_000;
        let stale = self.addresses.find_temporary_created_before(before)?;

        for address in stale {
            report.scanned += 1;
            match self.delete_address(address.id, before) {
                Ok(true) => report.acted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(address_id = address.id, error = %e, "Failed to delete temporary address");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn delete_address(&self, address_id: i64, before: i64) -> Result<bool, StorageError> {
        let txn = self.manager.storage().begin_write()?;
        let removed = self.addresses.delete_temporary_txn(&txn, address_id, before)?;
        txn.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::manager::tests::{
        DELIVERY_ADDRESS, T0, TestEnv, USER, confirmed_order, create_card_order,
        create_cod_order, test_env,
    };
    use shared::message::Topic;
    use shared::models::{Address, CheckoutStatus, NotificationType};

    fn jobs(env: &TestEnv) -> ReconciliationJobs {
        ReconciliationJobs::new(env.manager.clone(), SweepConfig::default())
    }

    #[tokio::test]
    async fn test_scenario_d_stuck_payment_is_canceled() {
        let env = test_env();
        let order = create_card_order(&env).await;
        let open = env.add_checkout(order.id, CheckoutStatus::Pending);
        let jobs = jobs(&env);

        env.clock.advance_minutes(15);
        let report = jobs.sweep_stuck_payments().unwrap();
        assert_eq!(report.scanned, 0, "exactly 15 minutes is not stuck yet");

        env.clock.advance_minutes(1);
        let report = jobs.sweep_stuck_payments().unwrap();
        assert_eq!((report.scanned, report.acted), (1, 1));

        let canceled = env.manager.get_order(order.id).unwrap().order;
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert_eq!(canceled.cancel_reason.as_deref(), Some(PAYMENT_TIMEOUT_REASON));
        assert_eq!(
            env.manager.checkouts().get(open.id).unwrap().unwrap().status,
            CheckoutStatus::Cancelled
        );

        let again = jobs.sweep_stuck_payments().unwrap();
        assert_eq!((again.scanned, again.acted, again.failed), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_stuck_sweep_ignores_paid_orders() {
        let env = test_env();
        let order = create_cod_order(&env).await;
        env.clock.advance_minutes(60);

        let report = jobs(&env).sweep_stuck_payments().unwrap();
        assert_eq!(report.scanned, 0);
        assert_eq!(env.status_of(order.id), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_scenario_e_unassigned_order_is_canceled() {
        let env = test_env();
        let order = confirmed_order(&env).await;
        let jobs = jobs(&env);
        let mut pool = env.subscribe(Topic::ShipperPool);

        env.clock.advance_minutes(30);
        assert_eq!(jobs.sweep_unassigned_orders().unwrap().scanned, 0);

        env.clock.advance_minutes(1);
        let report = jobs.sweep_unassigned_orders().unwrap();
        assert_eq!((report.scanned, report.acted), (1, 1));

        let canceled = env.manager.get_order(order.id).unwrap().order;
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert_eq!(canceled.cancel_reason.as_deref(), Some(NO_SHIPPER_REASON));
        assert!(env.manager.queue().get(order.id).unwrap().is_none());

        let names: Vec<&str> = pool.drain().iter().map(|e| e.event.name()).collect();
        assert_eq!(names, vec!["order_removed_from_shipper_pool", "assignment_expired"]);

        let inbox = env.manager.notifications().list_for_user(USER);
        let last = inbox.last().unwrap();
        assert_eq!(last.notification_type, NotificationType::OrderCanceled);
        assert!(last.content.contains("No shipper available"));

        let again = jobs.sweep_unassigned_orders().unwrap();
        assert_eq!((again.scanned, again.acted, again.failed), (0, 0, 0));
        assert_eq!(env.status_of(order.id), OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn test_unassigned_sweep_loses_race_to_shipper() {
        let env = test_env();
        let order = confirmed_order(&env).await;
        env.manager.accept_assignment(order.id, 77).unwrap();

        // Stale entry left behind from before the acceptance
        env.clock.set(T0);
        env.manager.queue().add_pending_assignment(order.id, 1).unwrap();
        env.clock.advance_minutes(31);

        let report = jobs(&env).sweep_unassigned_orders().unwrap();
        assert_eq!((report.scanned, report.acted, report.skipped), (1, 0, 1));
        assert_eq!(env.status_of(order.id), OrderStatus::Confirmed);
        assert!(env.manager.queue().get(order.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retry_reoffers_due_entries_only() {
        let env = test_env();
        let order = confirmed_order(&env).await;
        let jobs = jobs(&env);
        let mut pool = env.subscribe(Topic::ShipperPool);

        let first = jobs.retry_assignments().unwrap();
        assert_eq!(first.acted, 1);
        assert_eq!(pool.drain().len(), 1);

        // Next offer is a minute out
        let second = jobs.retry_assignments().unwrap();
        assert_eq!(second.scanned, 0);

        env.clock.advance_minutes(1);
        assert_eq!(jobs.retry_assignments().unwrap().acted, 1);
        assert_eq!(
            env.manager.queue().get(order.id).unwrap().unwrap().attempt_count,
            2
        );

        // Expired entries belong to the unassigned-order sweep
        env.clock.advance_minutes(40);
        assert_eq!(jobs.retry_assignments().unwrap().scanned, 0);
    }

    #[tokio::test]
    async fn test_gc_temporary_addresses() {
        let env = test_env();
        let old = Address {
            id: 500,
            user_id: Some(USER),
            street: "Gate 2".into(),
            ward: "Ward 1".into(),
            district: "District 3".into(),
            city: "HCMC".into(),
            location: None,
            is_temporary: true,
            created_at: T0,
        };
        let fresh = Address {
            id: 501,
            created_at: T0 + 20 * 3_600_000,
            ..old.clone()
        };
        let permanent = Address {
            id: 502,
            is_temporary: false,
            ..old.clone()
        };
        for address in [&old, &fresh, &permanent] {
            env.addresses.upsert(address).unwrap();
        }

        env.clock.advance_millis(25 * 3_600_000);
        let report = jobs(&env).gc_temporary_addresses().unwrap();
        assert_eq!((report.scanned, report.acted), (1, 1));
        assert!(env.addresses.get(500).unwrap().is_none());
        assert!(env.addresses.get(501).unwrap().is_some());
        assert!(env.addresses.get(502).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_gc_keeps_order_snapshot() {
        let env = test_env();
        let mut one_off = env.addresses.get(DELIVERY_ADDRESS).unwrap().unwrap();
        one_off.is_temporary = true;
        env.addresses.upsert(&one_off).unwrap();
        let order = create_cod_order(&env).await;

        env.clock.advance_millis(48 * 3_600_000);
        let report = jobs(&env).gc_temporary_addresses().unwrap();
        assert_eq!(report.acted, 1);
        assert!(env.addresses.get(DELIVERY_ADDRESS).unwrap().is_none());

        let stored = env.manager.get_order(order.id).unwrap().order;
        assert_eq!(stored.delivery_address, order.delivery_address);
        assert_eq!(stored.delivery_address.address_id, DELIVERY_ADDRESS);
    }
}
