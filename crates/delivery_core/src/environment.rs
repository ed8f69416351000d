//! Environment: the publish/subscribe bus that owns the run.
//!
//! Agents are ECS entities. Registering an agent lets it attach components and
//! subscribe handlers (one-shot systems taking the agent's entity as input) to
//! event kinds. [Environment::step] pops the next event from [SimulationClock],
//! inserts it as [CurrentEvent] and runs every subscribed handler in
//! registration order. Handlers never dispatch inline: whatever they publish
//! goes through the clock, even with zero delay.

use std::collections::{HashMap, HashSet};

use bevy_ecs::prelude::{Bundle, Entity, IntoSystem, Resource, World};
use bevy_ecs::system::SystemId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assignment::{AssignerResource, AssignmentRetryPolicy, RandomAssigner};
use crate::availability::{AlwaysOpen, AvailabilityResource};
use crate::clock::{CurrentEvent, Event, EventId, EventKind, EventPayload, SimulationClock};
use crate::ecs::{AgentId, CustomerId, Directory, RestaurantId};
use crate::error::{HandlerResult, ScheduleError, SimError};
use crate::metrics::{MetricEntry, MetricSlot, SimResults};
use crate::model::{SessionBook, SessionId};
use crate::travel::{ConstantSpeedTravel, TravelTimeResource};

/// Handle of a registered handler system. The input is the subscribing agent's entity.
pub type HandlerId = SystemId<Entity, HandlerResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing dispatched yet; agents may still register.
    Pending,
    Running,
    /// The queue drained.
    Completed,
    /// A [RunLimits] bound stopped the run with events still queued.
    Truncated,
    /// A handler failed.
    Halted,
}

impl RunStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Truncated | RunStatus::Halted
        )
    }
}

/// Hard stops layered on top of queue exhaustion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Resource)]
pub struct RunLimits {
    /// Maximum number of events dispatched.
    #[serde(default)]
    pub max_events: Option<u64>,
    /// Events at or after this simulated time are not dispatched.
    #[serde(default)]
    pub end_time_ms: Option<u64>,
}

impl RunLimits {
    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = Some(max_events);
        self
    }

    pub fn with_end_time_ms(mut self, end_time_ms: u64) -> Self {
        self.end_time_ms = Some(end_time_ms);
        self
    }
}

#[derive(Debug, Clone)]
struct Subscription {
    agent: AgentId,
    entity: Entity,
    handler: HandlerId,
}

/// Something that lives on the bus.
pub trait Agent {
    fn id(&self) -> AgentId;

    /// Moves the agent's state into the world and declares its handlers.
    fn subscribe(self, bus: &mut Subscriptions<'_>);
}

/// Registration context handed to [Agent::subscribe].
pub struct Subscriptions<'a> {
    world: &'a mut World,
    handlers: &'a mut HashMap<EventKind, Vec<Subscription>>,
    agent: AgentId,
    entity: Entity,
}

impl<'a> Subscriptions<'a> {
    /// The agent's own entity.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    /// Attaches components to the agent's entity.
    pub fn insert(&mut self, bundle: impl Bundle) -> &mut Self {
        self.world.entity_mut(self.entity).insert(bundle);
        self
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }

    /// Subscribes `handler` to `kind`. Handlers of one kind run in subscription order.
    pub fn on<M, S>(&mut self, kind: EventKind, handler: S) -> &mut Self
    where
        S: IntoSystem<Entity, HandlerResult, M> + 'static,
    {
        let handler = self.world.register_system(handler);
        self.handlers.entry(kind).or_default().push(Subscription {
            agent: self.agent.clone(),
            entity: self.entity,
            handler,
        });
        self
    }
}

/// Outcome of [Environment::run_to_completion].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub events_dispatched: u64,
    pub simulated_time_ms: u64,
}

/// One isolated simulation run: world, handler table and agent registry.
pub struct Environment {
    world: World,
    handlers: HashMap<EventKind, Vec<Subscription>>,
    agents: Vec<(AgentId, Entity)>,
    agent_ids: HashSet<AgentId>,
    observers: Vec<Entity>,
    limits: RunLimits,
    status: RunStatus,
    dispatched: u64,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::with_epoch(0)
    }

    /// A fresh environment whose simulation time 0 corresponds to `epoch_ms` (Unix ms).
    ///
    /// Collaborators start at their defaults (constant-speed travel, always open,
    /// random assigner seeded with 0, retry policy default) and can be replaced
    /// with [Environment::insert_resource] before the run.
    pub fn with_epoch(epoch_ms: i64) -> Self {
        let mut world = World::new();
        world.insert_resource(SimulationClock::with_epoch(epoch_ms));
        world.insert_resource(SessionBook::default());
        world.insert_resource(Directory::default());
        world.insert_resource(TravelTimeResource::new(Box::new(
            ConstantSpeedTravel::default(),
        )));
        world.insert_resource(AvailabilityResource::new(Box::new(AlwaysOpen)));
        world.insert_resource(AssignerResource::new(Box::new(RandomAssigner::new(0))));
        world.insert_resource(AssignmentRetryPolicy::default());
        Self {
            world,
            handlers: HashMap::new(),
            agents: Vec::new(),
            agent_ids: HashSet::new(),
            observers: Vec::new(),
            limits: RunLimits::default(),
            status: RunStatus::Pending,
            dispatched: 0,
        }
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn set_limits(&mut self, limits: RunLimits) {
        self.limits = limits;
    }

    pub fn limits(&self) -> RunLimits {
        self.limits
    }

    pub fn insert_resource<R: Resource>(&mut self, resource: R) {
        self.world.insert_resource(resource);
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn now(&self) -> u64 {
        self.world.resource::<SimulationClock>().now()
    }

    pub fn events_dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn pending_events(&self) -> usize {
        self.world.resource::<SimulationClock>().len()
    }

    pub fn sessions(&self) -> &SessionBook {
        self.world.resource::<SessionBook>()
    }

    /// Registered agents in registration order.
    pub fn agents(&self) -> impl Iterator<Item = (&AgentId, Entity)> {
        self.agents.iter().map(|(id, entity)| (id, *entity))
    }

    pub fn entity_of(&self, agent: &AgentId) -> Option<Entity> {
        self.agents
            .iter()
            .find_map(|(id, entity)| (id == agent).then_some(*entity))
    }

    /// Registers an agent exactly once and lets it subscribe its handlers.
    pub fn register(&mut self, agent: impl Agent) -> Result<Entity, SimError> {
        if self.status != RunStatus::Pending {
            return Err(SimError::RegistrationClosed(self.status));
        }
        let id = agent.id();
        if self.agent_ids.contains(&id) {
            return Err(SimError::DuplicateAgent(id));
        }

        let entity = self.world.spawn_empty().id();
        self.world.resource_mut::<Directory>().insert(&id, entity);
        {
            let mut bus = Subscriptions {
                world: &mut self.world,
                handlers: &mut self.handlers,
                agent: id.clone(),
                entity,
            };
            agent.subscribe(&mut bus);
        }
        if self.world.get::<MetricSlot>(entity).is_some() {
            self.observers.push(entity);
        }
        debug!(agent = %id, ?entity, "agent registered");
        self.agent_ids.insert(id.clone());
        self.agents.push((id, entity));
        Ok(entity)
    }

    fn ensure_open(&self) -> Result<(), SimError> {
        if self.status.is_finished() {
            return Err(SimError::RunFinished(self.status));
        }
        Ok(())
    }

    /// Schedules `payload` at `now + delay_ms`. Zero delay still goes through the queue.
    pub fn publish(&mut self, payload: EventPayload, delay_ms: u64) -> Result<EventId, SimError> {
        self.ensure_open()?;
        let id = self
            .world
            .resource_mut::<SimulationClock>()
            .schedule_in(delay_ms, payload)?;
        Ok(id)
    }

    pub fn publish_at(&mut self, timestamp: u64, payload: EventPayload) -> Result<EventId, SimError> {
        self.ensure_open()?;
        let id = self
            .world
            .resource_mut::<SimulationClock>()
            .schedule_at(timestamp, payload)?;
        Ok(id)
    }

    /// Schedules at a real-world time (Unix ms). Times before the epoch are rejected.
    pub fn publish_at_real(
        &mut self,
        real_ms: i64,
        payload: EventPayload,
    ) -> Result<EventId, SimError> {
        self.ensure_open()?;
        let id = self
            .world
            .resource_mut::<SimulationClock>()
            .schedule_at_real(real_ms, payload)?;
        Ok(id)
    }

    /// Opens a session and schedules its `SessionStart` at `at_ms`.
    pub fn add_session(
        &mut self,
        customer: CustomerId,
        restaurant: RestaurantId,
        at_ms: u64,
    ) -> Result<SessionId, SimError> {
        self.ensure_open()?;
        let directory = self.world.resource::<Directory>();
        if !directory.has_customer(customer) {
            return Err(SimError::UnknownCustomer(customer));
        }
        if !directory.has_restaurant(restaurant) {
            return Err(SimError::UnknownRestaurant(restaurant));
        }
        let now = self.now();
        if at_ms < now {
            return Err(ScheduleError::InThePast {
                timestamp: at_ms,
                now,
            }
            .into());
        }

        let session = self
            .world
            .resource_mut::<SessionBook>()
            .open_session(customer, restaurant, at_ms);
        self.world.resource_mut::<SimulationClock>().schedule_at(
            at_ms,
            EventPayload::SessionStart {
                session,
                customer,
                restaurant,
            },
        )?;
        Ok(session)
    }

    fn limit_reached(&self) -> bool {
        if let Some(max) = self.limits.max_events {
            if self.dispatched >= max {
                return true;
            }
        }
        if let Some(end) = self.limits.end_time_ms {
            let next = self.world.resource::<SimulationClock>().next_event_time();
            if next.is_some_and(|ts| ts >= end) {
                return true;
            }
        }
        false
    }

    /// Dispatches the next event. `Ok(None)` once the run is over.
    pub fn step(&mut self) -> Result<Option<Event>, SimError> {
        if self.status.is_finished() {
            return Ok(None);
        }
        if self.world.resource::<SimulationClock>().is_empty() {
            self.status = RunStatus::Completed;
            info!(
                events = self.dispatched,
                sim_time_ms = self.now(),
                "simulation completed"
            );
            return Ok(None);
        }
        if self.limit_reached() {
            self.status = RunStatus::Truncated;
            warn!(
                events = self.dispatched,
                pending = self.pending_events(),
                sim_time_ms = self.now(),
                "simulation truncated by run limits"
            );
            return Ok(None);
        }

        self.status = RunStatus::Running;
        let Some(event) = self.world.resource_mut::<SimulationClock>().pop_next() else {
            return Ok(None);
        };
        self.world.insert_resource(CurrentEvent(event));
        self.dispatched += 1;
        debug!(
            id = event.id.0,
            at_ms = event.timestamp,
            kind = %event.kind(),
            "dispatch"
        );

        let subscribers = self
            .handlers
            .get(&event.kind())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for subscription in subscribers {
            let outcome = self
                .world
                .run_system_with_input(subscription.handler, subscription.entity);
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => SimError::HandlerFailed {
                    event: Box::new(event),
                    agent: subscription.agent.clone(),
                    source,
                },
                Err(_) => SimError::HandlerMissing {
                    agent: subscription.agent.clone(),
                    kind: event.kind(),
                },
            };
            self.status = RunStatus::Halted;
            warn!(error = %failure, "simulation halted");
            return Err(failure);
        }
        Ok(Some(event))
    }

    /// Lazy, finite, non-restartable sequence of dispatched events.
    pub fn run(&mut self) -> Dispatch<'_> {
        Dispatch { env: self }
    }

    /// Drains the queue (or stops at a limit) and reports how the run ended.
    pub fn run_to_completion(&mut self) -> Result<RunSummary, SimError> {
        for event in self.run() {
            event?;
        }
        Ok(RunSummary {
            status: self.status,
            events_dispatched: self.dispatched,
            simulated_time_ms: self.now(),
        })
    }

    /// Snapshot of every registered metric. Mid-run (or after a halt) the
    /// snapshot is marked incomplete.
    pub fn get_results(&self) -> SimResults {
        let metrics = self
            .observers
            .iter()
            .filter_map(|entity| self.world.get::<MetricSlot>(*entity))
            .map(|slot| MetricEntry {
                name: slot.name().to_string(),
                value: slot.value(),
            })
            .collect();
        SimResults {
            status: self.status,
            complete: self.status == RunStatus::Completed,
            simulated_time_ms: self.now(),
            events_dispatched: self.dispatched,
            metrics,
        }
    }
}

/// Iterator returned by [Environment::run].
pub struct Dispatch<'a> {
    env: &'a mut Environment,
}

impl Iterator for Dispatch<'_> {
    type Item = Result<Event, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.env.step().transpose()
    }
}
