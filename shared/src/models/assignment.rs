//! Pending shipper assignment (queue entry)

use serde::{Deserialize, Serialize};

/// Confirmed order awaiting shipper pickup
///
/// At most one live entry exists per order; the entry is removed when a
/// shipper accepts, when the order leaves `confirmed`, or when the
/// unassigned-order sweep gives up on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingShipperAssignment {
    pub id: i64,
    pub order_id: i64,
    /// Higher = more urgent
    pub priority: i32,
    pub attempt_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<i64>,
    /// Earliest time the entry is offered to shippers again
    pub next_attempt_at: i64,
    pub created_at: i64,
    /// Free-text notes such as rejection reasons
    #[serde(default)]
    pub notes: Vec<String>,
}

impl PendingShipperAssignment {
    /// Age in whole minutes at `now`
    pub fn age_minutes(&self, now: i64) -> i64 {
        (now - self.created_at) / 60_000
    }

    /// Strictly older than `timeout_minutes` at `now`
    pub fn is_expired(&self, now: i64, timeout_minutes: i64) -> bool {
        now - self.created_at > timeout_minutes * 60_000
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.next_attempt_at <= now
    }
}
