use super::Config;
use super::tasks::{BackgroundTasks, TaskKind};
use crate::geo::{DistanceProvider, FallbackDistanceProvider, MapboxClient, RouteClient};
use crate::message::EventBus;
use crate::orders::OrdersManager;
use crate::payment::{CheckoutService, HttpPaymentGateway, PaymentGateway, UnconfiguredGateway};
use crate::reconciliation::{ReconciliationJobs, Scheduler};
use crate::storage::Storage;
use crate::utils::{SharedClock, SystemClock};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Server state - shared handles to every service
///
/// Cloning is cheap; every component is `Arc`-backed.
///
/// | Field | Meaning |
/// |-------|---------|
/// | config | immutable configuration |
/// | storage | embedded redb database |
/// | bus | order event bus |
/// | orders | order lifecycle and shipper hand-off |
/// | checkout | payment checkout coordination |
/// | jobs | reconciliation sweeps |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub storage: Storage,
    pub clock: SharedClock,
    pub bus: EventBus,
    pub orders: OrdersManager,
    pub checkout: CheckoutService,
    pub jobs: ReconciliationJobs,
}

impl ServerState {
    /// Wire services around an already opened store
    pub fn new(
        config: Config,
        storage: Storage,
        clock: SharedClock,
        distance: Arc<dyn DistanceProvider>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let bus = EventBus::new(clock.clone());
        let orders = OrdersManager::new(
            storage.clone(),
            bus.clone(),
            distance,
            config.fee_config(),
            config.dispatch_config(),
            clock.clone(),
        );
        let checkout = CheckoutService::new(orders.clone(), gateway);
        let jobs = ReconciliationJobs::new(orders.clone(), config.sweep_config());
        Self {
            config,
            storage,
            clock,
            bus,
            orders,
            checkout,
            jobs,
        }
    }

    /// Initialize server state
    ///
    /// In order:
    /// 1. Work directory
    /// 2. Database (work_dir/delivery.redb)
    /// 3. Distance provider (Mapbox when a token is configured)
    /// 4. Payment gateway (HTTP when a URL is configured)
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.database_path();
        let storage = Storage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Database opened");

        let route_client: Option<Arc<dyn RouteClient>> = match &config.mapbox_access_token {
            Some(token) => Some(Arc::new(MapboxClient::new(
                config.mapbox_base_url.clone(),
                token.clone(),
                config.distance_timeout(),
            )?)),
            None => {
                tracing::warn!("MAPBOX_ACCESS_TOKEN not set, using great-circle distances");
                None
            }
        };
        let distance = Arc::new(FallbackDistanceProvider::new(
            route_client,
            config.fallback_speed_kmh,
        ));

        let gateway: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
            Some(url) => Arc::new(HttpPaymentGateway::new(
                url.clone(),
                config.payment_gateway_secret.clone(),
                config.payment_timeout(),
            )?),
            None => {
                tracing::warn!("PAYMENT_GATEWAY_URL not set, online payments are disabled");
                Arc::new(UnconfiguredGateway)
            }
        };

        Ok(Self::new(
            config.clone(),
            storage,
            Arc::new(SystemClock),
            distance,
            gateway,
        ))
    }

    /// Register sweeps and the event log listener
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        Scheduler::new(self.jobs.clone()).register(tasks);

        let receiver = self.bus.subscribe_all();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("event_log", TaskKind::Listener, async move {
            log_events(receiver, shutdown).await;
        });

        tasks.log_summary();
    }
}

async fn log_events(
    mut receiver: broadcast::Receiver<shared::message::BusEvent>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            received = receiver.recv() => match received {
                Ok(event) => tracing::debug!(
                    topic = ?event.topic,
                    sequence = event.sequence,
                    event = event.event.name(),
                    order_id = event.event.order_id(),
                    "Bus event"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}
