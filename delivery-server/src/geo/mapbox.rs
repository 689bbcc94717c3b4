//! Mapbox Directions API client (REST, no SDK)

use super::{GeoError, RouteClient, RouteEstimate, RouteSource};
use async_trait::async_trait;
use serde::Deserialize;
use shared::models::GeoPoint;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    /// meters
    distance: f64,
    /// seconds
    duration: f64,
}

#[derive(Debug, Clone)]
pub struct MapboxClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MapboxClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeoError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn directions_url(&self, from: GeoPoint, to: GeoPoint) -> String {
        // Mapbox expects lng,lat pairs
        format!(
            "{}/directions/v5/mapbox/driving/{},{};{},{}",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        )
    }
}

/// Longest drive accepted from a directions answer
const MAX_ROUTE_DURATION_SECS: f64 = 24.0 * 60.0 * 60.0;

fn parse_directions(resp: DirectionsResponse) -> Result<RouteEstimate, GeoError> {
    if resp.code != "Ok" {
        return Err(GeoError::NoRoute(
            resp.message.unwrap_or_else(|| resp.code.clone()),
        ));
    }
    let route = resp
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| GeoError::NoRoute("empty route list".to_string()))?;
    if !route.distance.is_finite()
        || route.distance < 0.0
        || !(0.0..=MAX_ROUTE_DURATION_SECS).contains(&route.duration)
    {
        return Err(GeoError::InvalidResponse(format!(
            "distance={} duration={}",
            route.distance, route.duration
        )));
    }
    Ok(RouteEstimate {
        distance_km: route.distance / 1000.0,
        duration_seconds: route.duration,
        source: RouteSource::Route,
    })
}

#[async_trait]
impl RouteClient for MapboxClient {
    async fn fetch_route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteEstimate, GeoError> {
        let resp: DirectionsResponse = self
            .http
            .get(self.directions_url(from, to))
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("overview", "false"),
                ("alternatives", "false"),
            ])
            .send()
            .await?
            .json()
            .await?;
        parse_directions(resp)
    }
}
