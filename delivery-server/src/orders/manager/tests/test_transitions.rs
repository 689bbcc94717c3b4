use super::*;

#[tokio::test]
async fn test_scenario_c_confirm_then_deliver() {
    let env = test_env();
    let order = create_cod_order(&env).await;
    let mut pool = env.manager.bus().subscribe(
        Topic::ShipperPool,
        SubscriberFilter::ShipperNear {
            location: GeoPoint::new(10.7800, 106.7000),
            radius_km: 10.0,
        },
    );

    let confirmed = restaurant_moves(&env, order.id, OrderStatus::Confirmed).unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    let assignment = env.manager.queue().get(order.id).unwrap().expect("queued");
    assert_eq!(assignment.priority, 1);
    assert_eq!(assignment.attempt_count, 0);
    assert_eq!(assignment.created_at, T0);

    match pool.try_recv().expect("offer on shipper pool").event {
        OrderBusEvent::OrderConfirmedForShippers(offer) => {
            assert_eq!(offer.order_id, order.id);
            assert_eq!(offer.restaurant_location, RESTAURANT_LOCATION);
            assert_eq!(offer.radius_km, 5.0);
            assert_eq!(offer.shipper_earnings, order.shipper_earnings);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    restaurant_moves(&env, order.id, OrderStatus::Delivering).unwrap();
    assert!(env.manager.queue().get(order.id).unwrap().is_none());
    match pool.try_recv().expect("removal on shipper pool").event {
        OrderBusEvent::OrderRemovedFromShipperPool(removal) => {
            assert_eq!(removal.order_id, order.id);
            assert_eq!(removal.reason, RemovalReason::StatusChanged);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_illegal_transitions_leave_status_unchanged() {
    let env = test_env();
    let order = create_cod_order(&env).await;

    for to in [OrderStatus::Delivering, OrderStatus::Completed, OrderStatus::ProcessingPayment] {
        let err = env
            .manager
            .transition(TransitionRequest::new(order.id, to, Actor::System))
            .unwrap_err();
        assert!(
            matches!(err, OrderError::InvalidTransition { from: OrderStatus::Pending, to: t } if t == to),
            "{err}"
        );
        assert_eq!(env.status_of(order.id), OrderStatus::Pending);
    }

    restaurant_moves(&env, order.id, OrderStatus::Confirmed).unwrap();
    restaurant_moves(&env, order.id, OrderStatus::Delivering).unwrap();
    restaurant_moves(&env, order.id, OrderStatus::Completed).unwrap();

    for to in OrderStatus::ALL {
        assert!(env
            .manager
            .transition(TransitionRequest::new(order.id, to, Actor::System))
            .is_err());
    }
    assert_eq!(env.status_of(order.id), OrderStatus::Completed);
}

#[tokio::test]
async fn test_completed_marks_paid() {
    let env = test_env();
    let order = confirmed_order(&env).await;
    restaurant_moves(&env, order.id, OrderStatus::Delivering).unwrap();
    env.clock.advance_minutes(20);

    let completed = restaurant_moves(&env, order.id, OrderStatus::Completed).unwrap();
    assert!(completed.is_paid);
    assert_eq!(completed.payment_date, Some(T0 + 20 * 60_000));
    assert_eq!(completed.updated_at, T0 + 20 * 60_000);
    assert!(env.manager.get_order(order.id).unwrap().order.is_paid);
}

#[tokio::test]
async fn test_status_update_event_and_notification() {
    let env = test_env();
    let order = create_cod_order(&env).await;
    let mut customer = env
        .manager
        .bus()
        .subscribe(Topic::CustomerFeed, SubscriberFilter::Customer(USER));

    restaurant_moves(&env, order.id, OrderStatus::Confirmed).unwrap();

    match customer.try_recv().expect("status update").event {
        OrderBusEvent::OrderStatusUpdated(update) => {
            assert_eq!(update.from, OrderStatus::Pending);
            assert_eq!(update.to, OrderStatus::Confirmed);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let inbox = env.manager.notifications().list_for_user(USER);
    assert_eq!(inbox.len(), 2);
    let update = inbox
        .iter()
        .find(|n| n.notification_type == NotificationType::OrderStatus)
        .expect("status notification");
    assert_eq!(update.order_id, Some(order.id));
    assert!(update.content.contains("confirmed"));
}

#[tokio::test]
async fn test_customer_cancel_records_reason() {
    let env = test_env();
    let order = create_cod_order(&env).await;

    let canceled = env
        .manager
        .transition(
            TransitionRequest::new(order.id, OrderStatus::Canceled, Actor::Customer(USER))
                .with_reason("Changed my mind"),
        )
        .unwrap();
    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert_eq!(canceled.cancel_reason.as_deref(), Some("Changed my mind"));

    let inbox = env.manager.notifications().list_for_user(USER);
    let notice = inbox
        .iter()
        .find(|n| n.notification_type == NotificationType::OrderCanceled)
        .expect("cancel notification");
    assert!(notice.content.contains("Changed my mind"));
}

#[tokio::test]
async fn test_authorization_is_enforced() {
    let env = test_env();
    let order = create_cod_order(&env).await;

    let err = env
        .manager
        .transition(TransitionRequest::new(
            order.id,
            OrderStatus::Confirmed,
            Actor::Restaurant(99),
        ))
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));

    let err = env
        .manager
        .transition(TransitionRequest::new(
            order.id,
            OrderStatus::Confirmed,
            Actor::Customer(USER),
        ))
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));
    assert_eq!(env.status_of(order.id), OrderStatus::Pending);

    restaurant_moves(&env, order.id, OrderStatus::Confirmed).unwrap();
    let err = env
        .manager
        .transition(TransitionRequest::new(
            order.id,
            OrderStatus::Canceled,
            Actor::Customer(USER),
        ))
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));
    assert_eq!(env.status_of(order.id), OrderStatus::Confirmed);
    assert!(env.manager.queue().get(order.id).unwrap().is_some());
}

#[tokio::test]
async fn test_payment_confirmation_announces_order() {
    let env = test_env();
    let order = create_card_order(&env).await;
    let mut feed = env
        .manager
        .bus()
        .subscribe(Topic::RestaurantFeed, SubscriberFilter::Restaurant(RESTAURANT));

    env.manager
        .transition(TransitionRequest::new(
            order.id,
            OrderStatus::Pending,
            Actor::PaymentGateway,
        ))
        .unwrap();

    let names: Vec<&str> = feed.drain().iter().map(|e| e.event.name()).collect();
    assert_eq!(names, vec!["order_status_updated", "order_created"]);
}

#[tokio::test]
async fn test_cancel_cancels_open_checkouts_only() {
    let env = test_env();
    let order = create_card_order(&env).await;
    let failed = env.add_checkout(order.id, CheckoutStatus::Failed);
    let open = env.add_checkout(order.id, CheckoutStatus::Pending);

    env.manager
        .transition(
            TransitionRequest::new(order.id, OrderStatus::Canceled, Actor::System)
                .with_reason("Payment timeout"),
        )
        .unwrap();

    let checkouts = env.manager.checkouts();
    assert_eq!(
        checkouts.get(open.id).unwrap().unwrap().status,
        CheckoutStatus::Cancelled
    );
    assert_eq!(
        checkouts.get(failed.id).unwrap().unwrap().status,
        CheckoutStatus::Failed
    );
}

#[tokio::test]
async fn test_guard_declining_is_a_noop() {
    let env = test_env();
    let order = create_cod_order(&env).await;
    let mut feed = env.subscribe(Topic::RestaurantFeed);

    let outcome = env
        .manager
        .transition_with(
            TransitionRequest::new(order.id, OrderStatus::Canceled, Actor::System),
            |current, _| current.status == OrderStatus::ProcessingPayment,
            |_, _| Ok(()),
        )
        .unwrap();
    assert!(!outcome.is_applied());
    assert_eq!(outcome.into_order().status, OrderStatus::Pending);
    assert_eq!(env.status_of(order.id), OrderStatus::Pending);
    assert!(feed.try_recv().is_none());
}

#[tokio::test]
async fn test_failing_hook_rolls_back_transition() {
    let env = test_env();
    let order = create_cod_order(&env).await;

    let err = env
        .manager
        .transition_with(
            TransitionRequest::new(order.id, OrderStatus::Confirmed, Actor::System),
            |_, _| true,
            |_, _| Err(OrderError::Internal("hook failed".into())),
        )
        .unwrap_err();
    assert!(matches!(err, OrderError::Internal(_)));
    assert_eq!(env.status_of(order.id), OrderStatus::Pending);
    assert!(env.manager.queue().get(order.id).unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_order() {
    let env = test_env();
    assert!(matches!(
        env.manager
            .transition(TransitionRequest::new(404, OrderStatus::Confirmed, Actor::System)),
        Err(OrderError::OrderNotFound(404))
    ));
}

#[tokio::test]
async fn test_oversized_cancel_reason_is_rejected() {
    let env = test_env();
    let order = create_cod_order(&env).await;

    let err = env
        .manager
        .transition(
            TransitionRequest::new(order.id, OrderStatus::Canceled, Actor::Customer(USER))
                .with_reason("x".repeat(MAX_NOTE_LEN + 1)),
        )
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));
    assert_eq!(env.status_of(order.id), OrderStatus::Pending);
}

