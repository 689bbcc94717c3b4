use crate::dispatch::DispatchConfig;
use crate::pricing::FeeConfig;
use crate::reconciliation::SweepConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration
///
/// # Environment variables
///
/// Every field can be overridden from the environment (`.env` is loaded at
/// startup):
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./work_dir | database file and logs |
/// | ENVIRONMENT | development | development / production |
/// | LOG_LEVEL | info | tracing filter |
/// | LOG_JSON | false | JSON console logs |
/// | MAX_DELIVERY_DISTANCE_KM | 20 | creation-time distance cap (inclusive) |
/// | MAX_DELIVERY_MINUTES | 120 | cap for an ASAP estimate |
/// | MAX_SCHEDULE_AHEAD_MINUTES | 10080 | scheduled-order horizon |
/// | PREPARATION_MINUTES | 15 | kitchen time added to estimates |
/// | BASE_SHIPPING_FEE | 15000 | fee covering the base distance |
/// | BASE_DISTANCE_KM | 2 | distance covered by the base fee |
/// | PER_KM_FEE | 5000 | fee per started km beyond the base |
/// | SHIPPER_SHARE_PERCENT | 80 | shipper's share of the shipping fee |
/// | SHIPPER_POOL_RADIUS_KM | 5 | shipper-pool broadcast radius |
/// | ASSIGNMENT_TIMEOUT_MINUTES | 30 | unassigned-order budget |
/// | ASSIGNMENT_RETRY_SECS | 60 | base delay between re-offers |
/// | PAYMENT_TIMEOUT_MINUTES | 15 | stuck-payment budget |
/// | TEMP_ADDRESS_TTL_HOURS | 24 | temporary address lifetime |
/// | STUCK_PAYMENT_SWEEP_SECS | 600 | sweep interval |
/// | UNASSIGNED_SWEEP_SECS | 600 | sweep interval |
/// | ADDRESS_GC_SECS | 3600 | sweep interval |
/// | ASSIGNMENT_RETRY_SWEEP_SECS | 60 | sweep interval |
/// | MAPBOX_ACCESS_TOKEN | (unset) | enables the route provider |
/// | MAPBOX_BASE_URL | https://api.mapbox.com | route endpoint |
/// | DISTANCE_TIMEOUT_MS | 5000 | route request timeout |
/// | FALLBACK_SPEED_KMH | 25 | great-circle fallback speed |
/// | PAYMENT_GATEWAY_URL | (unset) | enables the payment gateway |
/// | PAYMENT_GATEWAY_SECRET | (empty) | gateway bearer secret |
/// | PAYMENT_TIMEOUT_MS | 10000 | gateway request timeout |
///
/// ```ignore
/// WORK_DIR=/data/delivery MAX_DELIVERY_DISTANCE_KM=15 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    /// development | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,

    // === Pricing ===
    pub max_delivery_distance_km: f64,
    pub max_delivery_minutes: i64,
    pub max_schedule_ahead_minutes: i64,
    pub preparation_minutes: i64,
    pub base_shipping_fee: f64,
    pub base_distance_km: f64,
    pub per_km_fee: f64,
    pub shipper_share_percent: f64,

    // === Dispatch ===
    pub shipper_pool_radius_km: f64,
    pub assignment_timeout_minutes: i64,
    pub assignment_retry_secs: u64,

    // === Sweeps ===
    pub payment_timeout_minutes: i64,
    pub temp_address_ttl_hours: i64,
    pub stuck_payment_sweep_secs: u64,
    pub unassigned_sweep_secs: u64,
    pub address_gc_secs: u64,
    pub assignment_retry_sweep_secs: u64,

    // === External services ===
    pub mapbox_access_token: Option<String>,
    pub mapbox_base_url: String,
    pub distance_timeout_ms: u64,
    pub fallback_speed_kmh: f64,
    pub payment_gateway_url: Option<String>,
    pub payment_gateway_secret: String,
    pub payment_timeout_ms: u64,

    /// Variables that were set but could not be parsed; defaults were used
    pub ignored_values: Vec<IgnoredValue>,
}

/// An environment value that failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredValue {
    pub key: String,
    pub value: String,
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut env = EnvReader {
            lookup,
            ignored: Vec::new(),
        };

        let mut config = Self {
            work_dir: env.string("WORK_DIR", "./work_dir"),
            environment: env.string("ENVIRONMENT", "development"),
            log_level: env.string("LOG_LEVEL", "info"),
            log_json: env.value("LOG_JSON", false),

            max_delivery_distance_km: env.value("MAX_DELIVERY_DISTANCE_KM", 20.0),
            max_delivery_minutes: env.value("MAX_DELIVERY_MINUTES", 120),
            max_schedule_ahead_minutes: env.value("MAX_SCHEDULE_AHEAD_MINUTES", 10_080),
            preparation_minutes: env.value("PREPARATION_MINUTES", 15),
            base_shipping_fee: env.value("BASE_SHIPPING_FEE", 15_000.0),
            base_distance_km: env.value("BASE_DISTANCE_KM", 2.0),
            per_km_fee: env.value("PER_KM_FEE", 5_000.0),
            shipper_share_percent: env.value("SHIPPER_SHARE_PERCENT", 80.0),

            shipper_pool_radius_km: env.value("SHIPPER_POOL_RADIUS_KM", 5.0),
            assignment_timeout_minutes: env.value("ASSIGNMENT_TIMEOUT_MINUTES", 30),
            assignment_retry_secs: env.value("ASSIGNMENT_RETRY_SECS", 60),

            payment_timeout_minutes: env.value("PAYMENT_TIMEOUT_MINUTES", 15),
            temp_address_ttl_hours: env.value("TEMP_ADDRESS_TTL_HOURS", 24),
            stuck_payment_sweep_secs: env.value("STUCK_PAYMENT_SWEEP_SECS", 600),
            unassigned_sweep_secs: env.value("UNASSIGNED_SWEEP_SECS", 600),
            address_gc_secs: env.value("ADDRESS_GC_SECS", 3600),
            assignment_retry_sweep_secs: env.value("ASSIGNMENT_RETRY_SWEEP_SECS", 60),

            mapbox_access_token: env.raw("MAPBOX_ACCESS_TOKEN"),
            mapbox_base_url: env.string("MAPBOX_BASE_URL", "https://api.mapbox.com"),
            distance_timeout_ms: env.value("DISTANCE_TIMEOUT_MS", 5000),
            fallback_speed_kmh: env.value("FALLBACK_SPEED_KMH", 25.0),
            payment_gateway_url: env.raw("PAYMENT_GATEWAY_URL"),
            payment_gateway_secret: env.string("PAYMENT_GATEWAY_SECRET", ""),
            payment_timeout_ms: env.value("PAYMENT_TIMEOUT_MS", 10_000),
            ignored_values: Vec::new(),
        };
        config.ignored_values = env.ignored;
        config
    }

    /// Report values that fell back to defaults
    ///
    /// Called once logging is up; parsing happens before the subscriber
    /// exists.
    pub fn log_ignored_values(&self) {
        for ignored in &self.ignored_values {
            tracing::warn!(
                key = %ignored.key,
                value = %ignored.value,
                "Ignoring unparsable config value, using default"
            );
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("delivery.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn fee_config(&self) -> FeeConfig {
        FeeConfig {
            base_fee: self.base_shipping_fee,
            base_distance_km: self.base_distance_km,
            per_km_fee: self.per_km_fee,
            shipper_share_percent: self.shipper_share_percent,
            max_distance_km: self.max_delivery_distance_km,
            max_delivery_minutes: self.max_delivery_minutes,
            max_schedule_ahead_minutes: self.max_schedule_ahead_minutes,
            preparation_minutes: self.preparation_minutes,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            pool_radius_km: self.shipper_pool_radius_km,
            retry_base_secs: self.assignment_retry_secs,
            ..DispatchConfig::default()
        }
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            payment_timeout_minutes: self.payment_timeout_minutes,
            assignment_timeout_minutes: self.assignment_timeout_minutes,
            temp_address_ttl_hours: self.temp_address_ttl_hours,
            stuck_payment_interval: Duration::from_secs(self.stuck_payment_sweep_secs.max(1)),
            unassigned_interval: Duration::from_secs(self.unassigned_sweep_secs.max(1)),
            address_gc_interval: Duration::from_secs(self.address_gc_secs.max(1)),
            assignment_retry_interval: Duration::from_secs(self.assignment_retry_sweep_secs.max(1)),
        }
    }

    pub fn distance_timeout(&self) -> Duration {
        Duration::from_millis(self.distance_timeout_ms)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Key lookup that remembers which values failed to parse
struct EnvReader<F> {
    lookup: F,
    ignored: Vec<IgnoredValue>,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    /// Set and non-blank
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.into())
    }

    /// Parsed value or the default; unparsable input is recorded
    fn value<T: FromStr>(&mut self, key: &str, default: T) -> T {
        let Some(raw) = self.raw(key) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                self.ignored.push(IgnoredValue {
                    key: key.to_string(),
                    value: raw,
                });
                default
            }
        }
    }
}
