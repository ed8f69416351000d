//! Shared fixtures for unit and integration tests.

use bevy_ecs::prelude::{Component, Entity, In, Query, Res};

use crate::agents::ConversionPolicy;
use crate::clock::{ClockTime, CurrentEvent, Event, EventKind, ONE_MIN_MS};
use crate::distributions::{SamplerParams, TimeUnit};
use crate::ecs::{AgentId, GeoPoint};
use crate::environment::{Agent, Environment, Subscriptions};
use crate::error::{HandlerError, HandlerResult};
use crate::scenario::{
    CourierParams, CustomerParams, RestaurantParams, ScenarioParams, SessionArrivalParams,
    SessionParams,
};
use crate::travel::TravelTimeParams;

/// Restaurant in central Berlin.
pub const RESTAURANT_POS: GeoPoint = GeoPoint {
    lat: 52.5200,
    lng: 13.4050,
};

/// Customer roughly 2 km east of [RESTAURANT_POS].
pub const CUSTOMER_POS: GeoPoint = GeoPoint {
    lat: 52.5200,
    lng: 13.4350,
};

/// Courier roughly 1 km north of [RESTAURANT_POS].
pub const COURIER_POS: GeoPoint = GeoPoint {
    lat: 52.5290,
    lng: 13.4050,
};

/// Every travel leg in scenarios built here takes this long.
pub const TEST_LEG_MS: u64 = 5 * ONE_MIN_MS;

/// One restaurant, one always-converting customer, one courier, one session at 18:20,
/// fixed travel legs and no kitchen or handover waits.
pub fn single_delivery_scenario() -> ScenarioParams {
    ScenarioParams::default()
        .with_seed(7)
        .with_travel(TravelTimeParams::Fixed { ms: TEST_LEG_MS })
        .with_restaurant(RestaurantParams::new(1, RESTAURANT_POS))
        .with_customer(CustomerParams::new(1, CUSTOMER_POS))
        .with_courier(CourierParams::new(1, COURIER_POS))
        .with_session(SessionParams::new(1, 1, ClockTime::from_hm(18, 20)))
}

/// Size of a generated city for load tests and benchmarks.
#[derive(Debug, Clone, Copy)]
pub struct CitySize {
    pub restaurants: u32,
    pub customers: u32,
    pub couriers: u32,
    pub sessions: u32,
}

/// Spreads `i` of `n` on a grid of about 6 x 6 km around [RESTAURANT_POS].
fn grid_point(i: u32, n: u32) -> GeoPoint {
    let side = (n as f64).sqrt().ceil().max(1.0);
    let (row, col) = ((i as f64 / side).floor(), i as f64 % side);
    GeoPoint::new(
        RESTAURANT_POS.lat - 0.027 + 0.054 * row / side,
        RESTAURANT_POS.lng - 0.045 + 0.090 * col / side,
    )
}

/// A whole evening (17:00-23:00) of generated sessions over a city of the given size.
pub fn city_scenario(seed: u64, size: CitySize) -> ScenarioParams {
    let mut params = ScenarioParams::default().with_seed(seed).with_arrivals(
        SessionArrivalParams::new(
            SamplerParams::new(
                "exponential",
                vec![6.0 * 3600.0 / size.sessions.max(1) as f64],
                TimeUnit::Seconds,
            ),
            ClockTime::from_hm(17, 0),
            ClockTime::from_hm(23, 0),
        )
        .with_max_sessions(size.sessions),
    );
    for id in 0..size.restaurants {
        params = params.with_restaurant(
            RestaurantParams::new(id + 1, grid_point(id, size.restaurants))
                .with_capacity(8)
                .with_wait_time(SamplerParams::new("gamma", vec![4.0, 3.0], TimeUnit::Minutes))
                .with_handover_time(SamplerParams::new(
                    "uniform",
                    vec![0.5, 2.0],
                    TimeUnit::Minutes,
                )),
        );
    }
    for id in 0..size.customers {
        params = params.with_customer(
            CustomerParams::new(id + 1, grid_point(id, size.customers))
                .with_conversion(ConversionPolicy::Probability(0.8)),
        );
    }
    for id in 0..size.couriers {
        params = params.with_courier(
            CourierParams::new(id + 1, grid_point(id, size.couriers)).with_handover_time(
                SamplerParams::new("uniform", vec![30.0, 90.0], TimeUnit::Seconds),
            ),
        );
    }
    params
}

/// Every event an [EventRecorder] saw, in dispatch order.
#[derive(Debug, Default, Component)]
pub struct RecordedEvents(pub Vec<Event>);

/// Observer that records every event kind. Register it first to see events
/// before any other handler reacts.
pub struct EventRecorder {
    pub name: String,
}

impl EventRecorder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Agent for EventRecorder {
    fn id(&self) -> AgentId {
        AgentId::Observer(format!("recorder-{}", self.name))
    }

    fn subscribe(self, bus: &mut Subscriptions<'_>) {
        bus.insert(RecordedEvents::default());
        for kind in EventKind::ALL {
            bus.on(kind, record_event_system);
        }
    }
}

fn record_event_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    mut logs: Query<&mut RecordedEvents>,
) -> HandlerResult {
    logs.get_mut(entity)
        .map_err(|_| HandlerError::MissingState(entity))?
        .0
        .push(event.0);
    Ok(())
}

/// Events recorded by the recorder on `entity`.
pub fn recorded(env: &Environment, entity: Entity) -> Vec<Event> {
    env.world()
        .get::<RecordedEvents>(entity)
        .map(|log| log.0.clone())
        .unwrap_or_default()
}

/// Kinds of the recorded events, for compact assertions.
pub fn recorded_kinds(env: &Environment, entity: Entity) -> Vec<EventKind> {
    recorded(env, entity).iter().map(Event::kind).collect()
}
