//! Address Model

use serde::{Deserialize, Serialize};

/// WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude within [-90, 90], longitude within [-180, 180], both finite
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Address entity
///
/// Temporary addresses are created for one-off delivery locations and
/// garbage-collected once older than the configured TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    /// Owning user (None for restaurant addresses)
    pub user_id: Option<i64>,
    pub street: String,
    pub ward: String,
    pub district: String,
    pub city: String,
    /// Geocoded location; orders cannot be priced without it
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub is_temporary: bool,
    pub created_at: i64,
}

impl Address {
    /// Single-line human readable form
    pub fn full_text(&self) -> String {
        [&self.street, &self.ward, &self.district, &self.city]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
