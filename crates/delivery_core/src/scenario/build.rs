use tracing::info;

use crate::agents::{AssignmentCoordinator, CourierAgent, CustomerAgent, RestaurantAgent};
use crate::assignment::AssignerResource;
use crate::availability::{AlwaysOpen, AvailabilityResource, OpeningHours};
use crate::ecs::AgentId;
use crate::environment::Environment;
use crate::error::ScenarioError;
use crate::metrics::{MetricsObserver, SimResults};
use crate::travel::TravelTimeResource;

use super::arrivals::generate_sessions;
use super::params::{derive_seed, ScenarioParams, SeedStream};

fn availability(params: &ScenarioParams) -> AvailabilityResource {
    let mut hours = OpeningHours::new(params.epoch_ms);
    for restaurant in params.restaurants.iter().filter(|r| !r.opening_hours.is_empty()) {
        hours.set(
            AgentId::Restaurant(restaurant.id),
            restaurant.opening_hours.clone(),
        );
    }
    for courier in params.couriers.iter().filter(|c| !c.shifts.is_empty()) {
        hours.set(AgentId::Courier(courier.id), courier.shifts.clone());
    }
    if hours.is_empty() {
        AvailabilityResource::new(Box::new(AlwaysOpen))
    } else {
        AvailabilityResource::new(Box::new(hours))
    }
}

/// Builds a ready-to-run environment: collaborators, agents in a fixed
/// registration order (restaurants, customers, couriers, coordinator, metrics)
/// and the initial sessions.
pub fn build_environment(params: &ScenarioParams) -> Result<Environment, ScenarioError> {
    params.validate()?;
    let seed = params.seed;
    let mut env = Environment::with_epoch(params.epoch_ms).with_limits(params.limits);

    env.insert_resource(TravelTimeResource::new(params.travel.build()));
    env.insert_resource(availability(params));
    env.insert_resource(AssignerResource::new(
        params
            .assigner
            .build(derive_seed(seed, SeedStream::Assigner, 0)),
    ));
    env.insert_resource(params.retry_policy);

    for (index, restaurant) in params.restaurants.iter().enumerate() {
        let index = index as u64;
        let mut agent = RestaurantAgent::new(restaurant.id, restaurant.position);
        if let Some(capacity) = restaurant.capacity {
            agent = agent.with_capacity(capacity);
        }
        if let Some(wait) = &restaurant.wait_time {
            agent = agent.with_wait_time(wait.build(derive_seed(seed, SeedStream::KitchenWait, index))?);
        }
        if let Some(handover) = &restaurant.handover_time {
            agent = agent.with_handover_time(
                handover.build(derive_seed(seed, SeedStream::KitchenHandover, index))?,
            );
        }
        env.register(agent)?;
    }

    for (index, customer) in params.customers.iter().enumerate() {
        env.register(
            CustomerAgent::new(customer.id, customer.position)
                .with_conversion(customer.conversion)
                .with_seed(derive_seed(seed, SeedStream::Conversion, index as u64)),
        )?;
    }

    for (index, courier) in params.couriers.iter().enumerate() {
        let mut agent = CourierAgent::new(courier.id, courier.position);
        if let Some(handover) = &courier.handover_time {
            agent = agent.with_handover_time(
                handover.build(derive_seed(seed, SeedStream::CourierHandover, index as u64))?,
            );
        }
        env.register(agent)?;
    }

    env.register(AssignmentCoordinator)?;
    for kind in &params.metrics {
        env.register(MetricsObserver::new(*kind))?;
    }

    for session in &params.sessions {
        env.add_session(session.customer, session.restaurant, session.at.ms())?;
    }
    if let Some(arrivals) = &params.arrivals {
        let customers: Vec<_> = params.customers.iter().map(|c| c.id).collect();
        let restaurants: Vec<_> = params.restaurants.iter().map(|r| r.id).collect();
        let generated = generate_sessions(
            arrivals,
            &customers,
            &restaurants,
            derive_seed(seed, SeedStream::Arrivals, 0),
        )?;
        for session in generated {
            env.add_session(session.customer, session.restaurant, session.at_ms)?;
        }
    }

    info!(
        seed,
        restaurants = params.restaurants.len(),
        customers = params.customers.len(),
        couriers = params.couriers.len(),
        sessions = env.sessions().sessions().len(),
        assigner = ?params.assigner,
        "scenario built"
    );
    Ok(env)
}

/// Builds and runs a scenario to the end and returns its results.
///
/// A handler failure surfaces as `ScenarioError::Sim(SimError::HandlerFailed { .. })`.
pub fn run_scenario(params: &ScenarioParams) -> Result<SimResults, ScenarioError> {
    let mut env = build_environment(params)?;
    env.run_to_completion()?;
    Ok(env.get_results())
}
