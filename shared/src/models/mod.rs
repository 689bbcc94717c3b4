//! Data models
//!
//! Plain data structs persisted by the server's repositories and carried
//! in bus events. All IDs are `i64` (snowflake), all timestamps are Unix
//! milliseconds and all money amounts are `f64` rounded to 2 decimals.

pub mod address;
pub mod assignment;
pub mod catalog;
pub mod checkout;
pub mod notification;
pub mod order;
pub mod promotion;

// Re-exports
pub use address::*;
pub use assignment::*;
pub use catalog::*;
pub use checkout::*;
pub use notification::*;
pub use order::*;
pub use promotion::*;
