use bevy_ecs::prelude::{Entity, In, Query, Res, ResMut, Without};
use tracing::{trace, warn};

use crate::assignment::{AssignerResource, AssignmentRetryPolicy, CourierCandidate, RetryDecision};
use crate::availability::AvailabilityResource;
use crate::clock::{CurrentEvent, EventKind, EventPayload, SimulationClock};
use crate::ecs::{AgentId, Courier, Directory, Position};
use crate::environment::{Agent, Subscriptions};
use crate::error::{HandlerError, HandlerResult};
use crate::model::{OrderStatus, RejectionReason, SessionBook};

use super::missing_state;

/// Matches ready orders to couriers.
///
/// The pick and the courier's availability flip happen in the same handler
/// invocation, so no later event can see the courier as free.
#[derive(Debug, Default)]
pub struct AssignmentCoordinator;

impl Agent for AssignmentCoordinator {
    fn id(&self) -> AgentId {
        AgentId::Coordinator
    }

    fn subscribe(self, bus: &mut Subscriptions<'_>) {
        bus.on(EventKind::OrderReady, assignment_system)
            .on(EventKind::AssignmentRetry, assignment_system);
    }
}

#[allow(clippy::too_many_arguments)]
pub fn assignment_system(
    In(_entity): In<Entity>,
    event: Res<CurrentEvent>,
    directory: Res<Directory>,
    availability: Res<AvailabilityResource>,
    policy: Res<AssignmentRetryPolicy>,
    mut assigner: ResMut<AssignerResource>,
    mut clock: ResMut<SimulationClock>,
    mut book: ResMut<SessionBook>,
    mut couriers: Query<(&mut Courier, &Position)>,
    places: Query<&Position, Without<Courier>>,
) -> HandlerResult {
    let (order_id, restaurant) = match event.0.payload {
        EventPayload::OrderReady { order, restaurant }
        | EventPayload::AssignmentRetry {
            order, restaurant, ..
        } => (order, restaurant),
        _ => return Ok(()),
    };
    let now = event.0.timestamp;

    let order = book.order(order_id)?;
    if order.status != OrderStatus::Created {
        return Ok(());
    }

    let restaurant_entity = directory.restaurant(restaurant)?;
    let pickup = places
        .get(restaurant_entity)
        .map_err(missing_state(restaurant_entity))?
        .0;

    let mut candidates: Vec<CourierCandidate> = couriers
        .iter()
        .filter(|(courier, _)| {
            courier.available && availability.is_open(&AgentId::Courier(courier.id), now)
        })
        .map(|(courier, position)| CourierCandidate {
            courier: courier.id,
            position: position.0,
        })
        .collect();
    candidates.sort_by_key(|candidate| candidate.courier);

    let Some(picked) = assigner.assign(order, pickup, &candidates) else {
        let failures = book.record_failed_assignment(order_id)?;
        return match policy.decide(failures) {
            RetryDecision::RetryIn(delay) => {
                trace!(order = %order_id, failures, delay_ms = delay, "no courier, retrying");
                clock.schedule_in(
                    delay,
                    EventPayload::AssignmentRetry {
                        order: order_id,
                        restaurant,
                        attempt: failures + 1,
                    },
                )?;
                Ok(())
            }
            RetryDecision::Reject => {
                let reason = RejectionReason::NoCourierAvailable;
                book.reject(order_id, reason, now)?;
                warn!(order = %order_id, failures, "no courier available, order rejected");
                clock.schedule_in(
                    0,
                    EventPayload::OrderRejected {
                        order: order_id,
                        restaurant,
                        reason,
                    },
                )?;
                Ok(())
            }
        };
    };

    if !candidates.iter().any(|candidate| candidate.courier == picked) {
        return Err(HandlerError::UnknownCandidate(picked));
    }
    let courier_entity = directory.courier(picked)?;
    let (mut courier, _) = couriers
        .get_mut(courier_entity)
        .map_err(missing_state(courier_entity))?;
    courier.claim(order_id)?;
    book.assign_order(order_id, picked, now)?;
    trace!(order = %order_id, courier = %picked, assigner = assigner.name(), "assigned");
    clock.schedule_in(
        0,
        EventPayload::OrderAssigned {
            order: order_id,
            courier: picked,
            restaurant,
        },
    )?;
    Ok(())
}
