//! Order lifecycle: aggregate builder, state machine and the manager that
//! drives both

pub mod builder;
mod error;
pub mod manager;
pub mod state_machine;

pub use builder::{OrderAggregateBuilder, OrderContext, OrderTotals, PricedCart};
pub use error::{OrderError, OrderResult};
pub use manager::{OrdersManager, TransitionOutcome, TransitionRequest};
pub use state_machine::Actor;
