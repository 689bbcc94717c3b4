//! Catalog Models (users, restaurants, foods, toppings)
//!
//! Read-only from the order subsystem's point of view.

use serde::{Deserialize, Serialize};

/// Customer / restaurant owner / shipper account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Restaurant entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    /// User account that operates the restaurant
    pub owner_id: i64,
    pub name: String,
    /// Pickup address reference
    pub address_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Food entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    /// List price per unit
    pub price: f64,
    /// Server-side discount percentage (0-100)
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// Priced add-on belonging to exactly one food
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topping {
    pub id: i64,
    pub food_id: i64,
    pub name: String,
    pub price: f64,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}
