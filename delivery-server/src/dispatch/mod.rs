//! Shipper dispatch: the pending-assignment queue

pub mod queue;

pub use queue::{DispatchConfig, MAX_ASSIGNMENT_NOTES, PendingAssignmentQueue, queue_order};
