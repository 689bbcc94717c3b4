//! Pending-assignment queue
//!
//! Confirmed orders wait here for a shipper. Entries are keyed by order id
//! (at most one per order) and are consumed in priority-descending, then
//! creation-ascending order.

use crate::storage::{AssignmentRepository, Storage, StorageResult};
use crate::utils::SharedClock;
use redb::WriteTransaction;
use shared::models::PendingShipperAssignment;
use std::cmp::Ordering;

/// Rejection notes kept per assignment; older ones are dropped
pub const MAX_ASSIGNMENT_NOTES: usize = 10;

/// Shipper dispatch settings
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Radius around the restaurant an offer is broadcast to
    pub pool_radius_km: f64,
    /// Base delay between re-offers; doubles with each attempt
    pub retry_base_secs: u64,
    pub max_retry_delay_secs: u64,
    pub default_priority: i32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_radius_km: 5.0,
            retry_base_secs: 60,
            max_retry_delay_secs: 600,
            default_priority: 1,
        }
    }
}

impl DispatchConfig {
    /// Delay before the next offer after `attempt` attempts (1-based)
    pub fn backoff_millis(&self, attempt: u32) -> i64 {
        let exp = attempt.saturating_sub(1).min(20);
        let secs = self
            .retry_base_secs
            .saturating_mul(1u64 << exp)
            .min(self.max_retry_delay_secs);
        (secs as i64) * 1000
    }
}

/// Priority desc, created_at asc, order_id asc
pub fn queue_order(a: &PendingShipperAssignment, b: &PendingShipperAssignment) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.order_id.cmp(&b.order_id))
}

#[derive(Debug, Clone)]
pub struct PendingAssignmentQueue {
    storage: Storage,
    repo: AssignmentRepository,
    clock: SharedClock,
    config: DispatchConfig,
}

impl PendingAssignmentQueue {
    pub fn new(storage: Storage, clock: SharedClock, config: DispatchConfig) -> Self {
        Self {
            repo: AssignmentRepository::new(storage.clone()),
            storage,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Enqueue an order; returns the existing entry if there already is one
    pub fn add_pending_assignment(
        &self,
        order_id: i64,
        priority: i32,
    ) -> StorageResult<PendingShipperAssignment> {
        let txn = self.storage.begin_write()?;
        let (assignment, created) = self.enqueue_txn(&txn, order_id, priority)?;
        txn.commit()?;
        if created {
            tracing::info!(order_id, priority, "Order queued for shipper pickup");
        }
        Ok(assignment)
    }

    /// Lookup-before-insert inside the caller's transaction
    pub fn enqueue_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
        priority: i32,
    ) -> StorageResult<(PendingShipperAssignment, bool)> {
        if let Some(existing) = self.repo.get_txn(txn, order_id)? {
            return Ok((existing, false));
        }
        let now = self.clock.now_millis();
        let assignment = PendingShipperAssignment {
            id: shared::util::snowflake_id(),
            order_id,
            priority,
            attempt_count: 0,
            last_attempt_at: None,
            next_attempt_at: now,
            created_at: now,
            notes: Vec::new(),
        };
        self.repo.put_txn(txn, &assignment)?;
        Ok((assignment, true))
    }

    /// Remove the entry for an order; a missing entry is a no-op
    pub fn remove_pending_assignment(&self, order_id: i64) -> StorageResult<bool> {
        let txn = self.storage.begin_write()?;
        let removed = self.remove_txn(&txn, order_id)?;
        txn.commit()?;
        if removed {
            tracing::debug!(order_id, "Pending assignment removed");
        }
        Ok(removed)
    }

    pub fn remove_txn(&self, txn: &WriteTransaction, order_id: i64) -> StorageResult<bool> {
        self.repo.remove_txn(txn, order_id)
    }

    pub fn get(&self, order_id: i64) -> StorageResult<Option<PendingShipperAssignment>> {
        self.repo.get(order_id)
    }

    pub fn get_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Option<PendingShipperAssignment>> {
        self.repo.get_txn(txn, order_id)
    }

    /// Entries created strictly before `cutoff`, in queue order
    pub fn get_expired_assignments(&self, cutoff: i64) -> StorageResult<Vec<PendingShipperAssignment>> {
        self.sorted(|a| a.created_at < cutoff)
    }

    /// Entries due for an offer at `now`, in queue order
    pub fn list_pending(&self, now: i64) -> StorageResult<Vec<PendingShipperAssignment>> {
        self.sorted(|a| a.is_due(now))
    }

    /// Every live entry, in queue order
    pub fn list_all(&self) -> StorageResult<Vec<PendingShipperAssignment>> {
        self.sorted(|_| true)
    }

    fn sorted(
        &self,
        keep: impl Fn(&PendingShipperAssignment) -> bool,
    ) -> StorageResult<Vec<PendingShipperAssignment>> {
        let mut entries: Vec<_> = self.repo.all()?.into_iter().filter(|a| keep(a)).collect();
        entries.sort_by(queue_order);
        Ok(entries)
    }

    /// Record one offer attempt (and an optional note), pushing the next
    /// attempt out with exponential backoff
    pub fn record_attempt_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
        note: Option<String>,
    ) -> StorageResult<Option<PendingShipperAssignment>> {
        let Some(mut assignment) = self.repo.get_txn(txn, order_id)? else {
            return Ok(None);
        };
        let now = self.clock.now_millis();
        assignment.attempt_count = assignment.attempt_count.saturating_add(1);
        assignment.last_attempt_at = Some(now);
        assignment.next_attempt_at = now + self.config.backoff_millis(assignment.attempt_count);
        if let Some(note) = note {
            assignment.notes.push(note);
            let overflow = assignment.notes.len().saturating_sub(MAX_ASSIGNMENT_NOTES);
            assignment.notes.drain(..overflow);
        }
        self.repo.put_txn(txn, &assignment)?;
        Ok(Some(assignment))
    }
}
