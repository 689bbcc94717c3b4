//! Registers the reconciliation sweeps as periodic background tasks

use super::{ReconciliationJobs, SweepReport};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::orders::OrderResult;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs each sweep on its own interval until shutdown
///
/// Registered as `TaskKind::Periodic` from `ServerState::start_background_tasks()`.
#[derive(Debug, Clone)]
pub struct Scheduler {
    jobs: ReconciliationJobs,
}

impl Scheduler {
    pub fn new(jobs: ReconciliationJobs) -> Self {
        Self { jobs }
    }

    pub fn register(self, tasks: &mut BackgroundTasks) {
        let config = self.jobs.config().clone();

        let jobs = self.jobs.clone();
        spawn_periodic(tasks, "stuck_payment_sweep", config.stuck_payment_interval, move || {
            jobs.sweep_stuck_payments()
        });

        let jobs = self.jobs.clone();
        spawn_periodic(tasks, "unassigned_order_sweep", config.unassigned_interval, move || {
            jobs.sweep_unassigned_orders()
        });

        let jobs = self.jobs.clone();
        spawn_periodic(tasks, "assignment_retry", config.assignment_retry_interval, move || {
            jobs.retry_assignments()
        });

        let jobs = self.jobs;
        spawn_periodic(tasks, "temporary_address_gc", config.address_gc_interval, move || {
            jobs.gc_temporary_addresses()
        });
    }
}

fn spawn_periodic<F>(tasks: &mut BackgroundTasks, name: &'static str, period: Duration, job: F)
where
    F: Fn() -> OrderResult<SweepReport> + Send + 'static,
{
    let shutdown = tasks.shutdown_token();
    tasks.spawn(name, TaskKind::Periodic, run_every(name, period, shutdown, job));
}

async fn run_every<F>(name: &'static str, period: Duration, shutdown: CancellationToken, job: F)
where
    F: Fn() -> OrderResult<SweepReport>,
{
    tracing::info!(job = name, period_secs = period.as_secs(), "Sweep scheduled");
    // First tick completes immediately, so every sweep also runs at startup
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(job = name, "Sweep received shutdown signal");
                return;
            }
            _ = ticker.tick() => {
                match job() {
                    Ok(report) => report.log(),
                    Err(e) => tracing::error!(job = name, error = %e, "Sweep failed"),
                }
            }
        }
    }
}
