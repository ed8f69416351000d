use bevy_ecs::prelude::{Component, Entity, In, Query, Res, ResMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::{CurrentEvent, EventKind, EventPayload, SimulationClock};
use crate::ecs::{AgentId, Customer, CustomerId, CustomerState, GeoPoint, Position};
use crate::environment::{Agent, Subscriptions};
use crate::error::HandlerResult;
use crate::model::SessionBook;

use super::missing_state;

/// Whether a session turns into an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "p", rename_all = "snake_case")]
pub enum ConversionPolicy {
    #[default]
    Always,
    Never,
    /// Converts with probability `p` (clamped to `[0, 1]`).
    Probability(f64),
}

#[derive(Debug, Clone, Component)]
pub struct ConversionModel {
    pub policy: ConversionPolicy,
    rng: StdRng,
}

impl ConversionModel {
    pub fn new(policy: ConversionPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn converts(&mut self) -> bool {
        match self.policy {
            ConversionPolicy::Always => true,
            ConversionPolicy::Never => false,
            ConversionPolicy::Probability(p) => self.rng.gen::<f64>() < p.clamp(0.0, 1.0),
        }
    }
}

pub struct CustomerAgent {
    pub id: CustomerId,
    pub position: GeoPoint,
    pub conversion: ConversionPolicy,
    pub seed: u64,
}

impl CustomerAgent {
    pub fn new(id: CustomerId, position: GeoPoint) -> Self {
        Self {
            id,
            position,
            conversion: ConversionPolicy::Always,
            seed: 0,
        }
    }

    pub fn with_conversion(mut self, conversion: ConversionPolicy) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Agent for CustomerAgent {
    fn id(&self) -> AgentId {
        AgentId::Customer(self.id)
    }

    fn subscribe(self, bus: &mut Subscriptions<'_>) {
        bus.insert((
            Customer::new(self.id),
            Position(self.position),
            ConversionModel::new(self.conversion, self.seed),
        ));
        bus.on(EventKind::SessionStart, customer_session_start_system);
    }
}

/// Enters the session and either places an order or ends the session unconverted.
pub fn customer_session_start_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut book: ResMut<SessionBook>,
    mut customers: Query<(&mut Customer, &mut ConversionModel)>,
) -> HandlerResult {
    let EventPayload::SessionStart {
        session,
        customer,
        restaurant,
    } = event.0.payload
    else {
        return Ok(());
    };
    let (mut state, mut model) = customers.get_mut(entity).map_err(missing_state(entity))?;
    if state.id != customer {
        return Ok(());
    }

    let now = event.0.timestamp;
    state.state = CustomerState::InSession;
    state.sessions_started += 1;

    if model.converts() {
        let order = book.place_order(session, now)?;
        state.state = CustomerState::Converted;
        trace!(%customer, %session, %order, "session converted");
        clock.schedule_in(
            0,
            EventPayload::OrderPlaced {
                order,
                session,
                customer,
                restaurant,
                created_at: now,
            },
        )?;
    } else {
        book.end_session(session, now)?;
        state.state = CustomerState::NotConverted;
        trace!(%customer, %session, "session ended without an order");
        clock.schedule_in(
            0,
            EventPayload::SessionEnded {
                session,
                customer,
                converted: false,
            },
        )?;
    }
    Ok(())
}
