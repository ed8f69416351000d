//! Scenario setup: turns a declarative [ScenarioParams] (usually loaded from
//! JSON) into a populated [crate::environment::Environment].

mod arrivals;
mod build;
mod params;

pub use arrivals::{generate_sessions, GeneratedSession, MAX_GENERATED_SESSIONS};
pub use build::{build_environment, run_scenario};
pub use params::{
    CourierParams, CustomerParams, RestaurantParams, ScenarioParams, SessionArrivalParams,
    SessionParams,
};
