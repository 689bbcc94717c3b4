//! Event bus and subscriber filters

pub mod bus;
pub mod filter;

pub use bus::{EventBus, Subscription};
pub use filter::{EventPredicate, SubscriberFilter};
