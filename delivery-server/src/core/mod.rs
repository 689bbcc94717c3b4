//! Core module - configuration, server state and background tasks
//!
//! - [`Config`] - environment-driven configuration
//! - [`ServerState`] - shared service handles
//! - [`BackgroundTasks`] - task registry with graceful shutdown

pub mod config;
pub mod state;
pub mod tasks;

pub use config::{Config, IgnoredValue};
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
