use bevy_ecs::prelude::Entity;
use delivery_core::agents::{AssignmentCoordinator, CourierAgent, CustomerAgent, RestaurantAgent};
use delivery_core::assignment::{Assigner, AssignerResource, AssignmentRetryPolicy, FirstAvailableAssigner};
use delivery_core::availability::{AvailabilityResource, OpeningHours};
use delivery_core::ecs::{CourierId, CustomerId, RestaurantId};
use delivery_core::environment::{Environment, RunLimits};
use delivery_core::metrics::{MetricKind, MetricsObserver};
use delivery_core::test_helpers::{EventRecorder, COURIER_POS, CUSTOMER_POS, RESTAURANT_POS, TEST_LEG_MS};
use delivery_core::travel::{FixedTravelTime, TravelTimeModel, TravelTimeResource};

/// Builder for hand-assembled environments in system tests.
pub struct TestEnvBuilder {
    travel: Box<dyn TravelTimeModel>,
    assigner: Box<dyn Assigner>,
    retry: AssignmentRetryPolicy,
    hours: Option<OpeningHours>,
    limits: RunLimits,
    recorder: bool,
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self {
            travel: Box::new(FixedTravelTime { ms: TEST_LEG_MS }),
            assigner: Box::new(FirstAvailableAssigner),
            retry: AssignmentRetryPolicy::Reject,
            hours: None,
            limits: RunLimits::default(),
            recorder: true,
        }
    }
}

impl TestEnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn travel(mut self, travel: impl TravelTimeModel + 'static) -> Self {
        self.travel = Box::new(travel);
        self
    }

    pub fn assigner(mut self, assigner: impl Assigner + 'static) -> Self {
        self.assigner = Box::new(assigner);
        self
    }

    pub fn retry(mut self, retry: AssignmentRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn opening_hours(mut self, hours: OpeningHours) -> Self {
        self.hours = Some(hours);
        self
    }

    pub fn limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn without_recorder(mut self) -> Self {
        self.recorder = false;
        self
    }

    /// Environment with collaborators installed and, unless disabled, an event
    /// recorder registered first. Returns the recorder's entity.
    pub fn build(self) -> (Environment, Option<Entity>) {
        let mut env = Environment::new().with_limits(self.limits);
        env.insert_resource(TravelTimeResource::new(self.travel));
        env.insert_resource(AssignerResource::new(self.assigner));
        env.insert_resource(self.retry);
        if let Some(hours) = self.hours {
            env.insert_resource(AvailabilityResource::new(Box::new(hours)));
        }
        let recorder = self
            .recorder
            .then(|| env.register(EventRecorder::new("test")).expect("recorder"));
        (env, recorder)
    }
}

/// Registers the standard trio (restaurant 1, customer 1, courier 1) plus the coordinator
/// and the given metrics.
pub fn register_trio(env: &mut Environment, metrics: &[MetricKind]) {
    env.register(RestaurantAgent::new(RestaurantId(1), RESTAURANT_POS))
        .expect("restaurant");
    env.register(CustomerAgent::new(CustomerId(1), CUSTOMER_POS))
        .expect("customer");
    env.register(CourierAgent::new(CourierId(1), COURIER_POS))
        .expect("courier");
    env.register(AssignmentCoordinator).expect("coordinator");
    register_metrics(env, metrics);
}

pub fn register_metrics(env: &mut Environment, metrics: &[MetricKind]) {
    for kind in metrics {
        env.register(MetricsObserver::new(*kind)).expect("metric");
    }
}
