use bevy_ecs::prelude::{Component, Entity, In, Query, Res, ResMut};
use tracing::{trace, warn};

use crate::availability::AvailabilityResource;
use crate::clock::{CurrentEvent, EventKind, EventPayload, SimulationClock};
use crate::distributions::{sample_or_zero, TimeSampler};
use crate::ecs::{AgentId, GeoPoint, Position, Restaurant, RestaurantId};
use crate::environment::{Agent, Subscriptions};
use crate::error::HandlerResult;
use crate::model::{RejectionReason, SessionBook};

use super::missing_state;

/// Kitchen delays. Absent samplers mean zero delay.
#[derive(Debug, Clone, Default, Component)]
pub struct KitchenTiming {
    /// Order placed -> ready for pickup.
    pub wait_time: Option<TimeSampler>,
    /// Courier arrival -> order handed over.
    pub handover_time: Option<TimeSampler>,
}

pub struct RestaurantAgent {
    pub id: RestaurantId,
    pub position: GeoPoint,
    pub capacity: Option<u32>,
    pub timing: KitchenTiming,
}

impl RestaurantAgent {
    pub fn new(id: RestaurantId, position: GeoPoint) -> Self {
        Self {
            id,
            position,
            capacity: None,
            timing: KitchenTiming::default(),
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_wait_time(mut self, sampler: TimeSampler) -> Self {
        self.timing.wait_time = Some(sampler);
        self
    }

    pub fn with_handover_time(mut self, sampler: TimeSampler) -> Self {
        self.timing.handover_time = Some(sampler);
        self
    }
}

impl Agent for RestaurantAgent {
    fn id(&self) -> AgentId {
        AgentId::Restaurant(self.id)
    }

    fn subscribe(self, bus: &mut Subscriptions<'_>) {
        bus.insert((
            Restaurant::new(self.id, self.capacity),
            Position(self.position),
            self.timing,
        ));
        bus.on(EventKind::OrderPlaced, restaurant_order_placed_system)
            .on(EventKind::OrderReady, restaurant_order_ready_system)
            .on(EventKind::CourierArrived, restaurant_courier_arrived_system)
            .on(EventKind::OrderHandedOver, restaurant_handed_over_system)
            .on(EventKind::OrderRejected, restaurant_order_rejected_system);
    }
}

/// Accepts the order (schedules `OrderReady` after the kitchen wait) or rejects it
/// when closed or full.
pub fn restaurant_order_placed_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    availability: Res<AvailabilityResource>,
    mut clock: ResMut<SimulationClock>,
    mut book: ResMut<SessionBook>,
    mut restaurants: Query<(&mut Restaurant, &mut KitchenTiming)>,
) -> HandlerResult {
    let EventPayload::OrderPlaced {
        order, restaurant, ..
    } = event.0.payload
    else {
        return Ok(());
    };
    let (mut kitchen, mut timing) = restaurants.get_mut(entity).map_err(missing_state(entity))?;
    if kitchen.id != restaurant {
        return Ok(());
    }

    let now = event.0.timestamp;
    let rejection = if !availability.is_open(&AgentId::Restaurant(restaurant), now) {
        Some(RejectionReason::RestaurantClosed)
    } else if !kitchen.has_capacity() {
        Some(RejectionReason::RestaurantAtCapacity)
    } else {
        None
    };

    if let Some(reason) = rejection {
        book.reject(order, reason, now)?;
        warn!(%restaurant, %order, ?reason, "order rejected");
        clock.schedule_in(
            0,
            EventPayload::OrderRejected {
                order,
                restaurant,
                reason,
            },
        )?;
        return Ok(());
    }

    let wait = sample_or_zero(timing.wait_time.as_mut())?;
    kitchen.preparing += 1;
    trace!(%restaurant, %order, wait_ms = wait, "preparing order");
    clock.schedule_in(wait, EventPayload::OrderReady { order, restaurant })?;
    Ok(())
}

pub fn restaurant_order_ready_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    mut book: ResMut<SessionBook>,
    mut restaurants: Query<&mut Restaurant>,
) -> HandlerResult {
    let EventPayload::OrderReady { order, restaurant } = event.0.payload else {
        return Ok(());
    };
    let mut kitchen = restaurants.get_mut(entity).map_err(missing_state(entity))?;
    if kitchen.id != restaurant {
        return Ok(());
    }
    kitchen.preparing = kitchen.preparing.saturating_sub(1);
    // The coordinator may already have settled the order in this same dispatch.
    if book.order(order)?.status.is_terminal() {
        trace!(%restaurant, %order, "ready order already closed");
        return Ok(());
    }
    book.mark_ready(order, event.0.timestamp)?;
    kitchen.awaiting_pickup += 1;
    Ok(())
}

/// Hands the order over after the optional handover wait.
pub fn restaurant_courier_arrived_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    book: Res<SessionBook>,
    mut clock: ResMut<SimulationClock>,
    mut restaurants: Query<(&Restaurant, &mut KitchenTiming)>,
) -> HandlerResult {
    let EventPayload::CourierArrived {
        order,
        courier,
        restaurant,
    } = event.0.payload
    else {
        return Ok(());
    };
    let (kitchen, mut timing) = restaurants.get_mut(entity).map_err(missing_state(entity))?;
    if kitchen.id != restaurant {
        return Ok(());
    }
    let customer = book.order(order)?.customer_id;
    let handover = sample_or_zero(timing.handover_time.as_mut())?;
    clock.schedule_in(
        handover,
        EventPayload::OrderHandedOver {
            order,
            courier,
            restaurant,
            customer,
        },
    )?;
    Ok(())
}

pub fn restaurant_handed_over_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    mut restaurants: Query<&mut Restaurant>,
) -> HandlerResult {
    let EventPayload::OrderHandedOver { restaurant, .. } = event.0.payload else {
        return Ok(());
    };
    let mut kitchen = restaurants.get_mut(entity).map_err(missing_state(entity))?;
    if kitchen.id != restaurant {
        return Ok(());
    }
    kitchen.awaiting_pickup = kitchen.awaiting_pickup.saturating_sub(1);
    kitchen.handed_over += 1;
    Ok(())
}

/// A ready order nobody could collect leaves the pickup shelf.
/// Only orders this kitchen put on the shelf (`ready_at` set) are removed.
pub fn restaurant_order_rejected_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    book: Res<SessionBook>,
    mut restaurants: Query<&mut Restaurant>,
) -> HandlerResult {
    let EventPayload::OrderRejected {
        order,
        restaurant,
        reason,
    } = event.0.payload
    else {
        return Ok(());
    };
    let mut kitchen = restaurants.get_mut(entity).map_err(missing_state(entity))?;
    if kitchen.id != restaurant || reason != RejectionReason::NoCourierAvailable {
        return Ok(());
    }
    if book.order(order)?.ready_at.is_none() {
        return Ok(());
    }
    kitchen.awaiting_pickup = kitchen.awaiting_pickup.saturating_sub(1);
    Ok(())
}
