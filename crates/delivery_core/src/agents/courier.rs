use bevy_ecs::prelude::{Component, Entity, In, Query, Res, ResMut, Without};
use tracing::trace;

use crate::clock::{CurrentEvent, EventKind, EventPayload, SimulationClock};
use crate::distributions::{sample_or_zero, TimeSampler};
use crate::ecs::{AgentId, Courier, CourierId, CourierState, Directory, GeoPoint, Position};
use crate::environment::{Agent, Subscriptions};
use crate::error::{HandlerResult, ScheduleError};
use crate::model::SessionBook;
use crate::travel::TravelTimeResource;

use super::missing_state;

#[derive(Debug, Clone, Default, Component)]
pub struct CourierTiming {
    /// Arrival at the customer -> order delivered.
    pub handover_time: Option<TimeSampler>,
}

pub struct CourierAgent {
    pub id: CourierId,
    pub position: GeoPoint,
    pub timing: CourierTiming,
}

impl CourierAgent {
    pub fn new(id: CourierId, position: GeoPoint) -> Self {
        Self {
            id,
            position,
            timing: CourierTiming::default(),
        }
    }

    pub fn with_handover_time(mut self, sampler: TimeSampler) -> Self {
        self.timing.handover_time = Some(sampler);
        self
    }
}

impl Agent for CourierAgent {
    fn id(&self) -> AgentId {
        AgentId::Courier(self.id)
    }

    fn subscribe(self, bus: &mut Subscriptions<'_>) {
        bus.insert((Courier::new(self.id), Position(self.position), self.timing));
        bus.on(EventKind::OrderAssigned, courier_assigned_system)
            .on(EventKind::OrderHandedOver, courier_picked_up_system)
            .on(EventKind::CourierArrivedAtCustomer, courier_at_customer_system)
            .on(EventKind::OrderDelivered, courier_delivered_system);
    }
}

/// Heads to the restaurant. Availability was already flipped when the courier was claimed.
pub fn courier_assigned_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    directory: Res<Directory>,
    travel: Res<TravelTimeResource>,
    mut clock: ResMut<SimulationClock>,
    mut couriers: Query<(&mut Courier, &Position)>,
    places: Query<&Position, Without<Courier>>,
) -> HandlerResult {
    let EventPayload::OrderAssigned {
        order,
        courier,
        restaurant,
    } = event.0.payload
    else {
        return Ok(());
    };
    let (mut state, position) = couriers.get_mut(entity).map_err(missing_state(entity))?;
    if state.id != courier {
        return Ok(());
    }
    state.ensure_holds(order)?;

    let restaurant_entity = directory.restaurant(restaurant)?;
    let pickup = places
        .get(restaurant_entity)
        .map_err(missing_state(restaurant_entity))?;
    let travel_ms = travel.travel_time_ms(position.0, pickup.0);
    state.state = CourierState::EnRouteToRestaurant;
    trace!(%courier, %order, travel_ms, "heading to restaurant");
    clock.schedule_in(
        travel_ms,
        EventPayload::CourierArrived {
            order,
            courier,
            restaurant,
        },
    )?;
    Ok(())
}

/// Takes the order at the restaurant and heads to the customer.
pub fn courier_picked_up_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    directory: Res<Directory>,
    travel: Res<TravelTimeResource>,
    mut clock: ResMut<SimulationClock>,
    mut book: ResMut<SessionBook>,
    mut couriers: Query<(&mut Courier, &mut Position)>,
    places: Query<&Position, Without<Courier>>,
) -> HandlerResult {
    let EventPayload::OrderHandedOver {
        order,
        courier,
        restaurant,
        customer,
    } = event.0.payload
    else {
        return Ok(());
    };
    let (mut state, mut position) = couriers.get_mut(entity).map_err(missing_state(entity))?;
    if state.id != courier {
        return Ok(());
    }
    state.ensure_holds(order)?;
    book.pick_up(order, event.0.timestamp)?;

    let restaurant_entity = directory.restaurant(restaurant)?;
    position.0 = places
        .get(restaurant_entity)
        .map_err(missing_state(restaurant_entity))?
        .0;
    let customer_entity = directory.customer(customer)?;
    let dropoff = places
        .get(customer_entity)
        .map_err(missing_state(customer_entity))?;
    let travel_ms = travel.travel_time_ms(position.0, dropoff.0);
    state.state = CourierState::EnRouteToCustomer;
    trace!(%courier, %order, travel_ms, "heading to customer");
    clock.schedule_in(
        travel_ms,
        EventPayload::CourierArrivedAtCustomer {
            order,
            courier,
            customer,
        },
    )?;
    Ok(())
}

/// Schedules `OrderDelivered` after the optional customer handover wait.
pub fn courier_at_customer_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    directory: Res<Directory>,
    book: Res<SessionBook>,
    mut clock: ResMut<SimulationClock>,
    mut couriers: Query<(&Courier, &mut Position, &mut CourierTiming)>,
    places: Query<&Position, Without<Courier>>,
) -> HandlerResult {
    let EventPayload::CourierArrivedAtCustomer {
        order,
        courier,
        customer,
    } = event.0.payload
    else {
        return Ok(());
    };
    let (state, mut position, mut timing) =
        couriers.get_mut(entity).map_err(missing_state(entity))?;
    if state.id != courier {
        return Ok(());
    }
    state.ensure_holds(order)?;

    let customer_entity = directory.customer(customer)?;
    position.0 = places
        .get(customer_entity)
        .map_err(missing_state(customer_entity))?
        .0;

    let now = event.0.timestamp;
    let handover = sample_or_zero(timing.handover_time.as_mut())?;
    let delivered_at = now.checked_add(handover).ok_or(ScheduleError::Overflow {
        now,
        delay_ms: handover,
    })?;
    let created_at = book.order(order)?.created_at;
    clock.schedule_at(
        delivered_at,
        EventPayload::OrderDelivered {
            order,
            courier,
            customer,
            created_at,
            delivered_at,
        },
    )?;
    Ok(())
}

/// Completes the order and returns the courier to the pool.
pub fn courier_delivered_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    mut book: ResMut<SessionBook>,
    mut couriers: Query<&mut Courier>,
) -> HandlerResult {
    let EventPayload::OrderDelivered { order, courier, .. } = event.0.payload else {
        return Ok(());
    };
    let mut state = couriers.get_mut(entity).map_err(missing_state(entity))?;
    if state.id != courier {
        return Ok(());
    }
    book.deliver(order, event.0.timestamp)?;
    state.release(order)?;
    trace!(%courier, %order, "delivered");
    Ok(())
}
