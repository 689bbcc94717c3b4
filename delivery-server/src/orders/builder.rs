//! Order aggregate builder
//!
//! Validates a create-order request against the catalog and prices every
//! line from stored data. Client-supplied topping prices are only used to
//! detect tampering; what gets charged always comes from the catalog.

use super::OrderError;
use crate::pricing::ShippingQuote;
use crate::pricing::money::{
    discounted_unit_price, line_total, order_total, round_money, to_decimal, to_f64,
    validate_discount_percent, validate_price, validate_quantity, MONEY_TOLERANCE,
};
use crate::storage::{AddressRepository, CatalogRepository};
use crate::utils::validation::{MAX_CODE_LEN, MAX_ITEMS, MAX_NOTE_LEN, validate_optional_text};
use rust_decimal::Decimal;
use shared::models::{
    Address, CreateOrderRequest, DeliveryAddressSnapshot, DeliveryType, GeoPoint, OrderDetail,
    OrderItemInput, Restaurant, SelectedTopping, User,
};
use std::collections::HashSet;

/// Entities an order refers to, resolved and checked
#[derive(Debug, Clone)]
pub struct OrderContext {
    pub user: User,
    pub restaurant: Restaurant,
    pub restaurant_location: GeoPoint,
    pub delivery_address: Address,
    pub delivery_location: GeoPoint,
}

impl OrderContext {
    pub fn delivery_snapshot(&self) -> DeliveryAddressSnapshot {
        DeliveryAddressSnapshot {
            address_id: self.delivery_address.id,
            text: self.delivery_address.full_text(),
            location: self.delivery_location,
        }
    }
}

/// Priced line before it is attached to an order
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub food_id: i64,
    pub food_name: String,
    pub quantity: i32,
    pub original_price: f64,
    pub discount_percent: f64,
    pub unit_price: Decimal,
    pub toppings: Vec<SelectedTopping>,
    /// Per-unit topping sum
    pub topping_sum: Decimal,
    pub line_total: Decimal,
}

/// All priced lines plus their subtotal
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
}

impl PricedCart {
    /// Attach lines to an order, numbering them from 1
    pub fn into_details(self, order_id: i64) -> Vec<OrderDetail> {
        self.lines
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let quantity = Decimal::from(line.quantity);
                OrderDetail {
                    id: shared::util::snowflake_id(),
                    order_id,
                    line_no: idx as u32 + 1,
                    food_id: line.food_id,
                    food_name: line.food_name,
                    quantity: line.quantity,
                    original_price: line.original_price,
                    discount_percent: line.discount_percent,
                    price: to_f64(line.unit_price),
                    toppings: line.toppings,
                    topping_total: to_f64(line.topping_sum * quantity),
                    line_total: to_f64(line.line_total),
                }
            })
            .collect()
    }
}

/// Money fields of an order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub shipping_fee: f64,
    pub shipper_earnings: f64,
    pub platform_fee: f64,
    pub promotion_discount: f64,
    pub total: f64,
}

/// total = max(0, subtotal + shipping_fee - promotion_discount)
pub fn compose_totals(subtotal: Decimal, quote: &ShippingQuote, discount: Decimal) -> OrderTotals {
    let total = order_total(subtotal, quote.shipping_fee, discount);
    OrderTotals {
        subtotal: to_f64(subtotal),
        shipping_fee: to_f64(quote.shipping_fee),
        shipper_earnings: to_f64(quote.shipper_earnings),
        platform_fee: to_f64(quote.platform_fee),
        promotion_discount: to_f64(discount),
        total: to_f64(total),
    }
}

/// Shape checks that need no storage
pub fn validate_request(req: &CreateOrderRequest) -> Result<(), OrderError> {
    if req.items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }
    if req.items.len() > MAX_ITEMS {
        return Err(OrderError::Validation(format!(
            "too many items ({}, max {})",
            req.items.len(),
            MAX_ITEMS
        )));
    }
    validate_optional_text(&req.note, "note", MAX_NOTE_LEN)
        .and_then(|_| validate_optional_text(&req.promotion_code, "promotion_code", MAX_CODE_LEN))
        .map_err(|e| OrderError::Validation(e.message))?;

    for item in &req.items {
        validate_quantity(item.food_id, item.quantity)?;
        if let Some(d) = item.discount_percent {
            validate_discount_percent(d)?;
        }
        let mut seen = HashSet::new();
        for t in &item.selected_toppings {
            validate_price(t.price, "topping price")?;
            if !seen.insert(t.topping_id) {
                return Err(OrderError::Validation(format!(
                    "topping {} selected more than once for food {}",
                    t.topping_id, item.food_id
                )));
            }
        }
    }

    if req.delivery_type == DeliveryType::Scheduled && req.requested_delivery_time.is_none() {
        return Err(OrderError::Validation(
            "requested_delivery_time is required for scheduled delivery".to_string(),
        ));
    }
    Ok(())
}

fn require_location(location: Option<GeoPoint>, what: &str) -> Result<GeoPoint, OrderError> {
    let point = location
        .ok_or_else(|| OrderError::InvalidCoordinates(format!("{what} has no coordinates")))?;
    if !point.is_valid() {
        return Err(OrderError::InvalidCoordinates(format!(
            "{what} has out-of-range coordinates ({}, {})",
            point.lat, point.lng
        )));
    }
    Ok(point)
}

#[derive(Debug, Clone)]
pub struct OrderAggregateBuilder {
    catalog: CatalogRepository,
    addresses: AddressRepository,
}

impl OrderAggregateBuilder {
    pub fn new(catalog: CatalogRepository, addresses: AddressRepository) -> Self {
        Self { catalog, addresses }
    }

    /// Resolve user, restaurant and both locations
    ///
    /// Fails before any distance is computed if a coordinate is missing.
    pub fn load_context(&self, req: &CreateOrderRequest) -> Result<OrderContext, OrderError> {
        let user = self
            .catalog
            .get_user(req.user_id)?
            .ok_or(OrderError::UserNotFound(req.user_id))?;
        if !user.is_active {
            return Err(OrderError::Forbidden(format!("user {} is disabled", user.id)));
        }

        let restaurant = self
            .catalog
            .get_restaurant(req.restaurant_id)?
            .ok_or(OrderError::RestaurantNotFound(req.restaurant_id))?;
        if !restaurant.is_active {
            return Err(OrderError::Validation(format!(
                "restaurant {} is not accepting orders",
                restaurant.id
            )));
        }
        let restaurant_address_id = restaurant.address_id.ok_or_else(|| {
            OrderError::InvalidCoordinates(format!("restaurant {} has no address", restaurant.id))
        })?;
        let restaurant_address = self
            .addresses
            .get(restaurant_address_id)?
            .ok_or(OrderError::AddressNotFound(restaurant_address_id))?;
        let restaurant_location = require_location(restaurant_address.location, "restaurant address")?;

        let delivery_address = self
            .addresses
            .get(req.address_id)?
            .ok_or(OrderError::AddressNotFound(req.address_id))?;
        if let Some(owner) = delivery_address.user_id
            && owner != user.id
        {
            return Err(OrderError::Forbidden(format!(
                "address {} does not belong to user {}",
                delivery_address.id, user.id
            )));
        }
        let delivery_location = require_location(delivery_address.location, "delivery address")?;

        Ok(OrderContext {
            user,
            restaurant,
            restaurant_location,
            delivery_address,
            delivery_location,
        })
    }

    /// Price every line against the catalog
    pub fn price_items(
        &self,
        restaurant_id: i64,
        items: &[OrderItemInput],
    ) -> Result<PricedCart, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal = Decimal::ZERO;
        for item in items {
            let line = self.price_line(restaurant_id, item)?;
            subtotal += line.line_total;
            lines.push(line);
        }
        Ok(PricedCart {
            lines,
            subtotal: round_money(subtotal),
        })
    }

    fn price_line(&self, restaurant_id: i64, item: &OrderItemInput) -> Result<PricedLine, OrderError> {
        validate_quantity(item.food_id, item.quantity)?;
        let food = self
            .catalog
            .get_food(item.food_id)?
            .ok_or(OrderError::FoodNotFound(item.food_id))?;
        if food.restaurant_id != restaurant_id {
            return Err(OrderError::Validation(format!(
                "food {} does not belong to restaurant {}",
                food.id, restaurant_id
            )));
        }
        if !food.is_available {
            return Err(OrderError::FoodUnavailable(food.name));
        }
        validate_price(food.price, "food price")?;

        // Server-side discount wins; a client value only fills in when the
        // food carries none.
        let discount_percent = if food.discount_percent > 0.0 {
            food.discount_percent
        } else {
            item.discount_percent.unwrap_or(0.0)
        };
        validate_discount_percent(discount_percent)?;
        let unit_price = discounted_unit_price(food.price, discount_percent);

        let mut toppings = Vec::with_capacity(item.selected_toppings.len());
        let mut topping_sum = Decimal::ZERO;
        for selection in &item.selected_toppings {
            let topping = self
                .catalog
                .get_topping(selection.topping_id)?
                .filter(|t| t.food_id == food.id)
                .ok_or(OrderError::ToppingNotFound {
                    food_id: food.id,
                    topping_id: selection.topping_id,
                })?;
            if !topping.is_available {
                return Err(OrderError::ToppingUnavailable(topping.name));
            }
            let stored = to_decimal(topping.price);
            if (to_decimal(selection.price) - stored).abs() >= MONEY_TOLERANCE {
                return Err(OrderError::ToppingPriceMismatch {
                    topping_id: topping.id,
                    submitted: selection.price,
                    current: topping.price,
                });
            }
            topping_sum += stored;
            toppings.push(SelectedTopping {
                topping_id: topping.id,
                name: topping.name,
                price: topping.price,
            });
        }

        let total = line_total(unit_price, topping_sum, item.quantity);
        Ok(PricedLine {
            food_id: food.id,
            food_name: food.name,
            quantity: item.quantity,
            original_price: food.price,
            discount_percent,
            unit_price,
            toppings,
            topping_sum,
            line_total: total,
        })
    }
}
