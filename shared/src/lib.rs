//! Shared types for the delivery backend
//!
//! Domain models, bus event payloads, the unified error type and small
//! utilities used by the server crate and by any client that consumes
//! its events.

pub mod error;
pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCode};
pub use message::{BusEvent, OrderBusEvent, Topic};
