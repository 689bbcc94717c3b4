//! Utility module - logging, clock and input validation helpers

pub mod clock;
pub mod logger;
pub mod validation;

// Re-export unified error types from shared
pub use shared::error::{AppError, AppResult, ErrorCategory, ErrorCode};

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
