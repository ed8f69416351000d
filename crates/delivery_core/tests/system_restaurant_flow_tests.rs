mod support;

use delivery_core::agents::{AssignmentCoordinator, CourierAgent, CustomerAgent, RestaurantAgent};
use delivery_core::availability::{DailyWindow, OpeningHours};
use delivery_core::clock::{ClockTime, EventKind, EventPayload, ONE_MIN_MS};
use delivery_core::distributions::TimeSampler;
use delivery_core::ecs::{
    AgentId, CourierId, CourierState, CustomerId, RestaurantId, RestaurantState,
};
use delivery_core::environment::{Environment, RunStatus};
use delivery_core::metrics::{MetricKind, MetricValue};
use delivery_core::model::{OrderId, OrderStatus, RejectionReason};
use delivery_core::test_helpers::{recorded, recorded_kinds, COURIER_POS, CUSTOMER_POS, RESTAURANT_POS};
use support::entities;
use support::world::{register_metrics, register_trio, TestEnvBuilder};

fn register_kitchen(env: &mut Environment, restaurant: RestaurantAgent, courier: CourierAgent) {
    env.register(restaurant).expect("restaurant");
    env.register(CustomerAgent::new(CustomerId(1), CUSTOMER_POS))
        .expect("customer");
    env.register(courier).expect("courier");
    env.register(AssignmentCoordinator).expect("coordinator");
    register_metrics(env, &MetricKind::ALL);
}

#[test]
fn closed_restaurant_rejects_and_nobody_is_dispatched() {
    let hours = OpeningHours::new(0).with_windows(
        AgentId::Restaurant(RestaurantId(1)),
        vec![DailyWindow::parse("11:00-14:00").expect("window")],
    );
    let (mut env, recorder) = TestEnvBuilder::new().opening_hours(hours).build();
    register_trio(&mut env, &MetricKind::ALL);
    env.add_session(CustomerId(1), RestaurantId(1), ClockTime::from_hm(18, 20).ms())
        .expect("session");
    env.run_to_completion().expect("run");

    assert_eq!(
        recorded_kinds(&env, recorder.expect("recorder")),
        vec![
            EventKind::SessionStart,
            EventKind::OrderPlaced,
            EventKind::OrderRejected
        ]
    );
    let order = env.sessions().order(OrderId(0)).expect("order");
    assert_eq!(order.status, OrderStatus::Rejected);
    assert_eq!(order.rejection, Some(RejectionReason::RestaurantClosed));
    assert!(env.sessions().session(order.session_id).expect("session").is_closed());

    let courier = entities::courier(&env, CourierId(1));
    assert!(courier.available);
    assert_eq!(courier.state, CourierState::Available);
    assert_eq!(courier.deliveries, 0);
    assert_eq!(entities::restaurant(&env, RestaurantId(1)).state(), RestaurantState::Idle);

    let results = env.get_results();
    let MetricValue::Tally { total, by_key } = results.get("NumberOfOrdersRejected").expect("metric")
    else {
        panic!("rejections are a tally");
    };
    assert_eq!(*total, 1);
    assert_eq!(by_key.get("restaurant_closed"), Some(&1));
    assert_eq!(results.get("DeliveryTime"), Some(&MetricValue::DurationMs(None)));
}

#[test]
fn open_restaurant_accepts_inside_its_window() {
    let hours = OpeningHours::new(0).with_windows(
        AgentId::Restaurant(RestaurantId(1)),
        vec![DailyWindow::parse("17:00-23:00").expect("window")],
    );
    let (mut env, _) = TestEnvBuilder::new().opening_hours(hours).build();
    register_trio(&mut env, &[MetricKind::NumberOfOrdersDelivered]);
    env.add_session(CustomerId(1), RestaurantId(1), ClockTime::from_hm(18, 20).ms())
        .expect("session");
    env.run_to_completion().expect("run");
    assert_eq!(env.get_results().count("NumberOfOrdersDelivered"), Some(1));
}

#[test]
fn full_kitchen_rejects_until_an_order_is_handed_over() {
    let (mut env, _) = TestEnvBuilder::new().build();
    register_kitchen(
        &mut env,
        RestaurantAgent::new(RestaurantId(1), RESTAURANT_POS)
            .with_capacity(1)
            .with_wait_time(TimeSampler::fixed_ms(10 * ONE_MIN_MS)),
        CourierAgent::new(CourierId(1), COURIER_POS),
    );
    for minute in [0, 1, 30] {
        env.add_session(CustomerId(1), RestaurantId(1), minute * ONE_MIN_MS)
            .expect("session");
    }

    env.step().expect("session 1 start");
    env.step().expect("order 1 placed");
    let kitchen = entities::restaurant(&env, RestaurantId(1));
    assert_eq!((kitchen.preparing, kitchen.has_capacity()), (1, false));

    env.run_to_completion().expect("run");
    let statuses: Vec<_> = env
        .sessions()
        .orders()
        .iter()
        .map(|order| (order.status, order.rejection))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (OrderStatus::Delivered, None),
            (OrderStatus::Rejected, Some(RejectionReason::RestaurantAtCapacity)),
            (OrderStatus::Delivered, None),
        ]
    );
    let kitchen = entities::restaurant(&env, RestaurantId(1));
    assert_eq!(kitchen.open_orders(), 0);
    assert_eq!(kitchen.handed_over, 2);
}

#[test]
fn kitchen_and_handover_waits_shape_the_timeline() {
    let (mut env, recorder) = TestEnvBuilder::new().build();
    register_kitchen(
        &mut env,
        RestaurantAgent::new(RestaurantId(1), RESTAURANT_POS)
            .with_wait_time(TimeSampler::fixed_ms(7 * ONE_MIN_MS))
            .with_handover_time(TimeSampler::fixed_ms(2 * ONE_MIN_MS)),
        CourierAgent::new(CourierId(1), COURIER_POS)
            .with_handover_time(TimeSampler::fixed_ms(ONE_MIN_MS)),
    );
    env.add_session(CustomerId(1), RestaurantId(1), 0)
        .expect("session");
    env.run_to_completion().expect("run");

    let timeline: Vec<(EventKind, u64)> = recorded(&env, recorder.expect("recorder"))
        .iter()
        .map(|event| (event.kind(), event.timestamp / ONE_MIN_MS))
        .collect();
    assert_eq!(
        timeline,
        vec![
            (EventKind::SessionStart, 0),
            (EventKind::OrderPlaced, 0),
            (EventKind::OrderReady, 7),
            (EventKind::OrderAssigned, 7),
            (EventKind::CourierArrived, 12),
            (EventKind::OrderHandedOver, 14),
            (EventKind::CourierArrivedAtCustomer, 19),
            (EventKind::OrderDelivered, 20),
        ]
    );

    let order = env.sessions().order(OrderId(0)).expect("order");
    assert_eq!(order.ready_at, Some(7 * ONE_MIN_MS));
    assert_eq!(order.picked_up_at, Some(14 * ONE_MIN_MS));
    assert_eq!(order.delivery_time_ms(), Some(20 * ONE_MIN_MS));

    let results = env.get_results();
    assert_eq!(
        results.get("DeliveryTime"),
        Some(&MetricValue::DurationMs(Some((20 * ONE_MIN_MS) as f64)))
    );
    assert_eq!(
        results.get("PickupWaitTime"),
        Some(&MetricValue::DurationMs(Some((7 * ONE_MIN_MS) as f64)))
    );
    assert_eq!(
        entities::restaurant(&env, RestaurantId(1)).state(),
        RestaurantState::HandedOver
    );
}

#[test]
fn handed_over_event_names_the_ordering_customer() {
    let (mut env, recorder) = TestEnvBuilder::new().build();
    register_trio(&mut env, &[]);
    env.add_session(CustomerId(1), RestaurantId(1), 0)
        .expect("session");
    env.run_to_completion().expect("run");
    let handover = recorded(&env, recorder.expect("recorder"))
        .into_iter()
        .find_map(|event| match event.payload {
            EventPayload::OrderHandedOver { customer, courier, .. } => Some((customer, courier)),
            _ => None,
        });
    assert_eq!(handover, Some((CustomerId(1), CourierId(1))));
}

fn run_without_couriers(coordinator_first: bool) -> Environment {
    let (mut env, _) = TestEnvBuilder::new().without_recorder().build();
    if coordinator_first {
        env.register(AssignmentCoordinator).expect("coordinator");
    }
    env.register(RestaurantAgent::new(RestaurantId(1), RESTAURANT_POS))
        .expect("restaurant");
    env.register(CustomerAgent::new(CustomerId(1), CUSTOMER_POS))
        .expect("customer");
    if !coordinator_first {
        env.register(AssignmentCoordinator).expect("coordinator");
    }
    register_metrics(&mut env, &[MetricKind::NumberOfOrdersRejected, MetricKind::PickupWaitTime]);
    env.add_session(CustomerId(1), RestaurantId(1), 0)
        .expect("session");
    env
}

#[test]
fn unassignable_order_settles_the_same_way_in_any_registration_order() {
    for coordinator_first in [true, false] {
        let mut env = run_without_couriers(coordinator_first);
        let summary = env.run_to_completion().expect("run");
        assert_eq!(summary.status, RunStatus::Completed, "coordinator_first={coordinator_first}");

        let order = env.sessions().order(OrderId(0)).expect("order");
        assert_eq!(order.status, OrderStatus::Rejected);
        assert_eq!(order.rejection, Some(RejectionReason::NoCourierAvailable));

        let kitchen = entities::restaurant(&env, RestaurantId(1));
        assert_eq!(kitchen.preparing, 0);
        assert_eq!(kitchen.awaiting_pickup, 0);
        assert_eq!(kitchen.state(), RestaurantState::Idle);

        let results = env.get_results();
        let MetricValue::Tally { by_key, .. } =
            results.get("NumberOfOrdersRejected").expect("metric")
        else {
            panic!("rejections are a tally");
        };
        assert_eq!(by_key.get("no_courier_available"), Some(&1));
        assert_eq!(results.get("PickupWaitTime"), Some(&MetricValue::DurationMs(None)));
    }
}
