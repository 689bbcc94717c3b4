use super::*;
use crate::geo::{RouteEstimate, RouteSource};
use crate::message::{SubscriberFilter, Subscription};
use crate::orders::builder::tests::{FOOD_A, FOOD_B, TOPPING_A, scenario_a_items, seed_menu};
use crate::utils::{Clock, ManualClock};
use async_trait::async_trait;
use shared::message::Topic;
use shared::models::{
    Address, Checkout, GeoPoint, OrderItemInput, PaymentMethod, Promotion, PromotionType,
    PromotionValue, Restaurant, User,
};
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) const T0: i64 = 1_700_000_000_000;
pub(crate) const USER: i64 = 1;
pub(crate) const RESTAURANT: i64 = 2;
pub(crate) const DELIVERY_ADDRESS: i64 = 3;
pub(crate) const RESTAURANT_ADDRESS: i64 = 30;
pub(crate) const RESTAURANT_LOCATION: GeoPoint = GeoPoint {
    lat: 10.7769,
    lng: 106.7009,
};

/// Distance provider returning a fixed route and counting calls
#[derive(Debug)]
pub(crate) struct FixedDistance {
    pub km: f64,
    pub seconds: f64,
    pub calls: AtomicUsize,
}

#[async_trait]
impl DistanceProvider for FixedDistance {
    async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> RouteEstimate {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RouteEstimate {
            distance_km: self.km,
            duration_seconds: self.seconds,
            source: RouteSource::Route,
        }
    }
}

pub(crate) struct TestEnv {
    pub manager: OrdersManager,
    pub clock: Arc<ManualClock>,
    pub distance: Arc<FixedDistance>,
    pub catalog: CatalogRepository,
    pub addresses: AddressRepository,
    pub promotions: PromotionRepository,
}

impl TestEnv {
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.manager.bus().subscribe(topic, SubscriberFilter::All)
    }

    pub fn status_of(&self, order_id: i64) -> OrderStatus {
        self.manager.get_order(order_id).unwrap().order.status
    }

    pub fn add_checkout(&self, order_id: i64, status: CheckoutStatus) -> Checkout {
        let order = self.manager.get_order(order_id).unwrap().order;
        let checkout = Checkout {
            id: shared::util::snowflake_id(),
            order_id,
            user_id: order.user_id,
            amount: order.total,
            payment_method: order.payment_method,
            status,
            payment_intent_id: Some("pi_test".into()),
            payment_url: None,
            payment_details: None,
            created_at: self.clock.now_millis(),
            updated_at: self.clock.now_millis(),
        };
        self.manager.checkouts().put(&checkout).unwrap();
        checkout
    }

    pub fn add_promotion(&self, code: &str, discount: PromotionValue, max: Option<f64>) {
        self.promotions
            .upsert(&Promotion {
                id: shared::util::snowflake_id(),
                code: code.to_string(),
                promotion_type: PromotionType::FoodDiscount,
                discount,
                min_order_value: 0.0,
                max_discount_amount: max,
                starts_at: T0 - 60_000,
                ends_at: T0 + 24 * 60 * 60_000,
                number_of_used: 0,
                max_usage: Some(100),
                is_active: true,
            })
            .unwrap();
    }
}

pub(crate) fn test_env_with_distance(km: f64) -> TestEnv {
    test_env_with_route(km, 600.0)
}

pub(crate) fn test_env_with_route(km: f64, seconds: f64) -> TestEnv {
    let storage = Storage::open_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let distance = Arc::new(FixedDistance {
        km,
        seconds,
        calls: AtomicUsize::new(0),
    });
    let bus = EventBus::new(clock.clone());
    let manager = OrdersManager::new(
        storage.clone(),
        bus,
        distance.clone(),
        FeeConfig::default(),
        DispatchConfig::default(),
        clock.clone(),
    );

    let catalog = CatalogRepository::new(storage.clone());
    let addresses = AddressRepository::new(storage.clone());
    catalog
        .upsert_user(&User {
            id: USER,
            name: "Lan".into(),
            phone: Some("0900000001".into()),
            is_active: true,
        })
        .unwrap();
    catalog
        .upsert_restaurant(&Restaurant {
            id: RESTAURANT,
            owner_id: 20,
            name: "Com Tam Ba Ghien".into(),
            address_id: Some(RESTAURANT_ADDRESS),
            is_active: true,
        })
        .unwrap();
    addresses
        .upsert(&Address {
            id: RESTAURANT_ADDRESS,
            user_id: None,
            street: "84 Dang Van Ngu".into(),
            ward: "Ward 10".into(),
            district: "Phu Nhuan".into(),
            city: "HCMC".into(),
            location: Some(RESTAURANT_LOCATION),
            is_temporary: false,
            created_at: T0,
        })
        .unwrap();
    addresses
        .upsert(&Address {
            id: DELIVERY_ADDRESS,
            user_id: Some(USER),
            street: "1 Nguyen Hue".into(),
            ward: "Ben Nghe".into(),
            district: "District 1".into(),
            city: "HCMC".into(),
            location: Some(GeoPoint::new(10.7740, 106.7040)),
            is_temporary: false,
            created_at: T0,
        })
        .unwrap();
    seed_menu(&catalog);

    TestEnv {
        manager,
        clock,
        distance,
        catalog,
        addresses,
        promotions: PromotionRepository::new(storage),
    }
}

pub(crate) fn test_env() -> TestEnv {
    test_env_with_distance(3.0)
}

pub(crate) fn cod_request() -> CreateOrderRequest {
    CreateOrderRequest {
        user_id: USER,
        restaurant_id: RESTAURANT,
        address_id: DELIVERY_ADDRESS,
        items: scenario_a_items(),
        promotion_code: None,
        payment_method: PaymentMethod::Cod,
        delivery_type: DeliveryType::Asap,
        requested_delivery_time: None,
        note: Some("no chili".into()),
    }
}

pub(crate) fn card_request() -> CreateOrderRequest {
    CreateOrderRequest {
        payment_method: PaymentMethod::Card,
        ..cod_request()
    }
}

pub(crate) async fn create_cod_order(env: &TestEnv) -> Order {
    env.manager.create_order(cod_request()).await.unwrap().order
}

pub(crate) async fn create_card_order(env: &TestEnv) -> Order {
    env.manager.create_order(card_request()).await.unwrap().order
}

pub(crate) fn restaurant_moves(env: &TestEnv, order_id: i64, to: OrderStatus) -> OrderResult<Order> {
    env.manager
        .transition(TransitionRequest::new(order_id, to, Actor::Restaurant(RESTAURANT)))
}

/// Pending COD order confirmed by its restaurant
pub(crate) async fn confirmed_order(env: &TestEnv) -> Order {
    let order = create_cod_order(env).await;
    restaurant_moves(env, order.id, OrderStatus::Confirmed).unwrap()
}

pub(crate) fn assert_total_invariant(order: &Order) {
    let expected = (order.subtotal + order.shipping_fee - order.promotion_discount).max(0.0);
    assert!(
        crate::pricing::money::money_eq(order.total, expected),
        "total {} != {} + {} - {}",
        order.total,
        order.subtotal,
        order.shipping_fee,
        order.promotion_discount
    );
    assert!(order.total >= 0.0);
}

mod test_transitions;
