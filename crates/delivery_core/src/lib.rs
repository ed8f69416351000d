//! Discrete-event simulation kernel for a food-delivery marketplace.
//!
//! Customers open sessions that may convert into orders, restaurants prepare
//! them, couriers are assigned to carry them and metrics observe the lifecycle.
//! Everything runs single-threaded inside one [environment::Environment], which
//! owns the event queue and dispatches events to subscribed handlers.

pub mod agents;
pub mod assignment;
pub mod availability;
pub mod clock;
pub mod distributions;
pub mod ecs;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod model;
pub mod scenario;
pub mod travel;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
