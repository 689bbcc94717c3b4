//! Distance provider
//!
//! The route-based estimate (Mapbox Directions) is authoritative. The
//! great-circle estimate is only used when no route client is configured
//! or the route call fails; callers always get an answer.

mod mapbox;

pub use mapbox::MapboxClient;

use async_trait::async_trait;
use shared::models::GeoPoint;
use std::sync::Arc;
use thiserror::Error;

/// Mean Earth radius in km
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Where a route estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Route,
    GreatCircle,
}

/// Distance and travel time between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_seconds: f64,
    pub source: RouteSource,
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Route request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No route found: {0}")]
    NoRoute(String),

    #[error("Invalid route response: {0}")]
    InvalidResponse(String),
}

/// Remote routing service (may fail)
#[async_trait]
pub trait RouteClient: Send + Sync {
    async fn fetch_route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteEstimate, GeoError>;
}

/// Distance + duration between two coordinates; never fails
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> RouteEstimate;
}

/// Great-circle distance in km
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Straight-line estimate at a fixed average speed
#[derive(Debug, Clone, Copy)]
pub struct GreatCircleEstimator {
    speed_kmh: f64,
}

impl GreatCircleEstimator {
    pub fn new(speed_kmh: f64) -> Self {
        let speed_kmh = if speed_kmh.is_finite() && speed_kmh > 0.0 {
            speed_kmh
        } else {
            25.0
        };
        Self { speed_kmh }
    }

    pub fn estimate(&self, from: GeoPoint, to: GeoPoint) -> RouteEstimate {
        let distance_km = haversine_km(from, to);
        RouteEstimate {
            distance_km,
            duration_seconds: distance_km / self.speed_kmh * 3600.0,
            source: RouteSource::GreatCircle,
        }
    }
}

/// Route client with great-circle fallback
pub struct FallbackDistanceProvider {
    client: Option<Arc<dyn RouteClient>>,
    fallback: GreatCircleEstimator,
}

impl FallbackDistanceProvider {
    pub fn new(client: Option<Arc<dyn RouteClient>>, fallback_speed_kmh: f64) -> Self {
        Self {
            client,
            fallback: GreatCircleEstimator::new(fallback_speed_kmh),
        }
    }

    /// Great-circle only
    pub fn offline(fallback_speed_kmh: f64) -> Self {
        Self::new(None, fallback_speed_kmh)
    }
}

#[async_trait]
impl DistanceProvider for FallbackDistanceProvider {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> RouteEstimate {
        if let Some(client) = &self.client {
            match client.fetch_route(from, to).await {
                Ok(estimate) => return estimate,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        from_lat = from.lat,
                        from_lng = from.lng,
                        to_lat = to.lat,
                        to_lng = to.lng,
                        "Route provider failed, using great-circle estimate"
                    );
                }
            }
        }
        self.fallback.estimate(from, to)
    }
}
