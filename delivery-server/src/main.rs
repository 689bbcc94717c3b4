use delivery_server::{BackgroundTasks, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. dotenv, configuration, logging
    let config = setup_environment()?;

    print_banner();
    tracing::info!(environment = %config.environment, "Delivery server starting...");

    // 2. Storage and services
    let state = ServerState::initialize(&config)?;

    // 3. Sweeps and listeners
    let mut tasks = BackgroundTasks::new();
    state.start_background_tasks(&mut tasks);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    tasks.shutdown().await;
    Ok(())
}
