//! Error taxonomy for the simulation kernel.
//!
//! Domain rejections (closed restaurant, no courier, no conversion) are not
//! errors: they travel through the queue as ordinary events. Everything here
//! is fatal to the call site or to the run.

use bevy_ecs::prelude::Entity;
use thiserror::Error;

use crate::clock::{Event, EventKind};
use crate::ecs::{AgentId, CourierId, CustomerId, RestaurantId};
use crate::environment::RunStatus;
use crate::model::{OrderId, OrderStatus, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("event at {timestamp} ms is earlier than the current time {now} ms")]
    InThePast { timestamp: u64, now: u64 },

    #[error("real time {real_ms} ms is before the simulation start {epoch_ms} ms")]
    BeforeStart { real_ms: i64, epoch_ms: i64 },

    #[error("timestamp overflow scheduling {delay_ms} ms after {now} ms")]
    Overflow { now: u64, delay_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplerError {
    #[error("unknown distribution family `{0}`")]
    UnknownFamily(String),

    #[error("{family} expects {expected} parameter(s), got {got}")]
    ParameterCount {
        family: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid {family} parameters: {reason}")]
    InvalidParameters {
        family: &'static str,
        reason: String,
    },

    #[error("{family} drew {value}, which is not a non-negative duration")]
    InvalidSample { family: &'static str, value: f64 },
}

/// Failure raised by an agent handler while it processes an event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("agent {0} is not registered")]
    UnknownAgent(AgentId),

    #[error("entity {0:?} is missing its agent state")]
    MissingState(Entity),

    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    #[error("session {0} already converted into an order")]
    AlreadyConverted(SessionId),

    #[error("order {order} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        order: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("courier {courier} already holds order {active}")]
    CourierBusy { courier: CourierId, active: OrderId },

    #[error("courier {courier} does not hold order {order}")]
    NotHoldingOrder { courier: CourierId, order: OrderId },

    #[error("assigner picked courier {0}, which was not offered")]
    UnknownCandidate(CourierId),
}

pub type HandlerResult = Result<(), HandlerError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("agent {0} is already registered")]
    DuplicateAgent(AgentId),

    #[error("agents can only be registered before the run starts (status {0:?})")]
    RegistrationClosed(RunStatus),

    #[error("the run is over (status {0:?}); nothing more can be published")]
    RunFinished(RunStatus),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("unknown customer {0}")]
    UnknownCustomer(CustomerId),

    #[error("unknown restaurant {0}")]
    UnknownRestaurant(RestaurantId),

    #[error(
        "handler of {agent} failed on {} at {} ms: {source}",
        .event.kind().name(),
        .event.timestamp
    )]
    HandlerFailed {
        event: Box<Event>,
        agent: AgentId,
        source: HandlerError,
    },

    #[error("handler of {agent} for {kind:?} is no longer registered")]
    HandlerMissing { agent: AgentId, kind: EventKind },
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("invalid scenario: {0}")]
    Invalid(String),

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
}
