//! Agents on the bus: customers, restaurants, couriers and the assignment coordinator.
//!
//! Each agent moves its state into components on its own entity and subscribes
//! handler systems. Dispatch is broadcast per event kind, so every handler
//! first checks that the payload names its agent and ignores the event otherwise.

pub mod coordinator;
pub mod courier;
pub mod customer;
pub mod restaurant;

use bevy_ecs::prelude::Entity;
use bevy_ecs::query::QueryEntityError;

use crate::error::HandlerError;

pub use coordinator::AssignmentCoordinator;
pub use courier::{CourierAgent, CourierTiming};
pub use customer::{ConversionModel, ConversionPolicy, CustomerAgent};
pub use restaurant::{KitchenTiming, RestaurantAgent};

pub(crate) fn missing_state(entity: Entity) -> impl FnOnce(QueryEntityError) -> HandlerError {
    move |_| HandlerError::MissingState(entity)
}
