//! Delivery Server - order lifecycle and shipper assignment
//!
//! # Overview
//!
//! - **Orders** (`orders`): aggregate builder, status state machine and the
//!   transactional `OrdersManager`
//! - **Dispatch** (`dispatch`): pending shipper-assignment queue
//! - **Pricing** (`pricing`): shipping fee, delivery estimates, promotions
//! - **Geo** (`geo`): route distance with great-circle fallback
//! - **Message** (`message`): topic-based order event bus
//! - **Payment** (`payment`): gateway seam and checkout coordination
//! - **Reconciliation** (`reconciliation`): periodic sweeps
//! - **Storage** (`storage`): embedded redb persistence
//!
//! ```text
//! delivery-server/src/
//! ├── core/            # config, state, background tasks
//! ├── orders/          # builder, state machine, manager
//! ├── dispatch/        # shipper queue
//! ├── pricing/         # fees, money, promotions
//! ├── geo/             # distance provider
//! ├── message/         # event bus
//! ├── notifications/   # user notifications
//! ├── payment/         # checkout + gateway
//! ├── reconciliation/  # sweeps + scheduler
//! ├── storage/         # redb repositories
//! └── utils/           # clock, logger, validation
//! ```

pub mod core;
pub mod dispatch;
pub mod geo;
pub mod message;
pub mod notifications;
pub mod orders;
pub mod payment;
pub mod pricing;
pub mod reconciliation;
pub mod storage;
pub mod utils;

pub use crate::core::{BackgroundTasks, Config, ServerState};
pub use message::EventBus;
pub use orders::{Actor, OrderError, OrdersManager, TransitionRequest};
pub use payment::CheckoutService;
pub use reconciliation::ReconciliationJobs;
pub use utils::{AppError, AppResult, ErrorCategory, ErrorCode};

pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// Load `.env`, read the configuration and start logging
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;

    let log_dir = config.log_dir();
    init_logger_with_file(
        &config.log_level,
        config.log_json,
        Some(&log_dir.to_string_lossy()),
    )?;
    config.log_ignored_values();

    match cleanup_old_logs(&log_dir, 14) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "Removed old log files"),
        Err(e) => tracing::warn!(error = %e, "Failed to clean old logs"),
    }
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    ____       ___
   / __ \___  / (_)   _____  _______  __
  / / / / _ \/ / / | / / _ \/ ___/ / / /
 / /_/ /  __/ / /| |/ /  __/ /  / /_/ /
/_____/\___/_/_/ |___/\___/_/   \__, /
                               /____/
    "#
    );
}
