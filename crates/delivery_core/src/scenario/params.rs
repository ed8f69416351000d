use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agents::ConversionPolicy;
use crate::assignment::{AssignerKind, AssignmentRetryPolicy};
use crate::availability::DailyWindow;
use crate::clock::ClockTime;
use crate::distributions::SamplerParams;
use crate::ecs::{CourierId, CustomerId, GeoPoint, RestaurantId};
use crate::environment::RunLimits;
use crate::error::ScenarioError;
use crate::metrics::MetricKind;
use crate::travel::TravelTimeParams;

/// Independent random streams derived from the scenario seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeedStream {
    KitchenWait = 1,
    KitchenHandover = 2,
    CourierHandover = 3,
    Conversion = 4,
    Assigner = 5,
    Arrivals = 6,
}

/// SplitMix64 over `(seed, stream, index)` so neighbouring agents get unrelated streams.
pub(crate) fn derive_seed(seed: u64, stream: SeedStream, index: u64) -> u64 {
    let mut z = seed
        .wrapping_add((stream as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(index.wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantParams {
    pub id: RestaurantId,
    pub position: GeoPoint,
    /// Concurrent orders in the kitchen; unbounded when absent.
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub wait_time: Option<SamplerParams>,
    #[serde(default)]
    pub handover_time: Option<SamplerParams>,
    /// Daily opening windows; open around the clock when empty.
    #[serde(default)]
    pub opening_hours: Vec<DailyWindow>,
}

impl RestaurantParams {
    pub fn new(id: u32, position: GeoPoint) -> Self {
        Self {
            id: RestaurantId(id),
            position,
            capacity: None,
            wait_time: None,
            handover_time: None,
            opening_hours: Vec::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_wait_time(mut self, sampler: SamplerParams) -> Self {
        self.wait_time = Some(sampler);
        self
    }

    pub fn with_handover_time(mut self, sampler: SamplerParams) -> Self {
        self.handover_time = Some(sampler);
        self
    }

    pub fn with_opening_hours(mut self, window: DailyWindow) -> Self {
        self.opening_hours.push(window);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerParams {
    pub id: CustomerId,
    pub position: GeoPoint,
    #[serde(default)]
    pub conversion: ConversionPolicy,
}

impl CustomerParams {
    pub fn new(id: u32, position: GeoPoint) -> Self {
        Self {
            id: CustomerId(id),
            position,
            conversion: ConversionPolicy::default(),
        }
    }

    pub fn with_conversion(mut self, conversion: ConversionPolicy) -> Self {
        self.conversion = conversion;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierParams {
    pub id: CourierId,
    pub position: GeoPoint,
    #[serde(default)]
    pub handover_time: Option<SamplerParams>,
    /// Daily shift windows; on duty around the clock when empty.
    #[serde(default)]
    pub shifts: Vec<DailyWindow>,
}

impl CourierParams {
    pub fn new(id: u32, position: GeoPoint) -> Self {
        Self {
            id: CourierId(id),
            position,
            handover_time: None,
            shifts: Vec::new(),
        }
    }

    pub fn with_handover_time(mut self, sampler: SamplerParams) -> Self {
        self.handover_time = Some(sampler);
        self
    }

    pub fn with_shift(mut self, window: DailyWindow) -> Self {
        self.shifts.push(window);
        self
    }
}

/// One explicit session at a time of the simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub customer: CustomerId,
    pub restaurant: RestaurantId,
    pub at: ClockTime,
}

impl SessionParams {
    pub fn new(customer: u32, restaurant: u32, at: ClockTime) -> Self {
        Self {
            customer: CustomerId(customer),
            restaurant: RestaurantId(restaurant),
            at,
        }
    }
}

/// Generated sessions: random customer and restaurant, spaced by an inter-arrival sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionArrivalParams {
    pub inter_arrival: SamplerParams,
    pub start: ClockTime,
    pub end: ClockTime,
    #[serde(default)]
    pub max_sessions: Option<u32>,
}

impl SessionArrivalParams {
    pub fn new(inter_arrival: SamplerParams, start: ClockTime, end: ClockTime) -> Self {
        Self {
            inter_arrival,
            start,
            end,
            max_sessions: None,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: u32) -> Self {
        self.max_sessions = Some(max_sessions);
        self
    }
}

fn default_metrics() -> Vec<MetricKind> {
    MetricKind::ALL.to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    #[serde(default)]
    pub seed: u64,
    /// Unix ms of simulation time 0; session clock times count from here.
    #[serde(default)]
    pub epoch_ms: i64,
    #[serde(default)]
    pub restaurants: Vec<RestaurantParams>,
    #[serde(default)]
    pub customers: Vec<CustomerParams>,
    #[serde(default)]
    pub couriers: Vec<CourierParams>,
    #[serde(default)]
    pub sessions: Vec<SessionParams>,
    #[serde(default)]
    pub arrivals: Option<SessionArrivalParams>,
    #[serde(default)]
    pub assigner: AssignerKind,
    #[serde(default)]
    pub retry_policy: AssignmentRetryPolicy,
    #[serde(default)]
    pub travel: TravelTimeParams,
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricKind>,
    #[serde(default)]
    pub limits: RunLimits,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            seed: 0,
            epoch_ms: 0,
            restaurants: Vec::new(),
            customers: Vec::new(),
            couriers: Vec::new(),
            sessions: Vec::new(),
            arrivals: None,
            assigner: AssignerKind::default(),
            retry_policy: AssignmentRetryPolicy::default(),
            travel: TravelTimeParams::default(),
            metrics: default_metrics(),
            limits: RunLimits::default(),
        }
    }
}

impl ScenarioParams {
    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_epoch_ms(mut self, epoch_ms: i64) -> Self {
        self.epoch_ms = epoch_ms;
        self
    }

    pub fn with_restaurant(mut self, restaurant: RestaurantParams) -> Self {
        self.restaurants.push(restaurant);
        self
    }

    pub fn with_customer(mut self, customer: CustomerParams) -> Self {
        self.customers.push(customer);
        self
    }

    pub fn with_courier(mut self, courier: CourierParams) -> Self {
        self.couriers.push(courier);
        self
    }

    pub fn with_session(mut self, session: SessionParams) -> Self {
        self.sessions.push(session);
        self
    }

    pub fn with_arrivals(mut self, arrivals: SessionArrivalParams) -> Self {
        self.arrivals = Some(arrivals);
        self
    }

    pub fn with_assigner(mut self, assigner: AssignerKind) -> Self {
        self.assigner = assigner;
        self
    }

    pub fn with_retry_policy(mut self, policy: AssignmentRetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_travel(mut self, travel: TravelTimeParams) -> Self {
        self.travel = travel;
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<MetricKind>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Checks what the environment cannot check on its own.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.retry_policy.validate()?;
        if let Some(arrivals) = &self.arrivals {
            if self.customers.is_empty() || self.restaurants.is_empty() {
                return Err(ScenarioError::Invalid(
                    "session arrivals need at least one customer and one restaurant".into(),
                ));
            }
            if arrivals.end < arrivals.start {
                return Err(ScenarioError::Invalid(format!(
                    "arrival window ends ({}) before it starts ({})",
                    arrivals.end, arrivals.start
                )));
            }
        }
        let positions = self
            .restaurants
            .iter()
            .map(|r| r.position)
            .chain(self.customers.iter().map(|c| c.position))
            .chain(self.couriers.iter().map(|c| c.position));
        for position in positions {
            if !(-90.0..=90.0).contains(&position.lat) || !(-180.0..=180.0).contains(&position.lng) {
                return Err(ScenarioError::Invalid(format!(
                    "position ({}, {}) is not a valid coordinate",
                    position.lat, position.lng
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_fills_defaults() {
        let params = ScenarioParams::from_json(
            r#"{
                "restaurants": [{"id": 1, "position": {"lat": 52.52, "lng": 13.40}}],
                "customers": [{"id": 7, "position": {"lat": 52.53, "lng": 13.41}}],
                "sessions": [{"customer": 7, "restaurant": 1, "at": "18:20"}]
            }"#,
        )
        .expect("parse");
        assert_eq!(params.seed, 0);
        assert_eq!(params.metrics, MetricKind::ALL.to_vec());
        assert_eq!(params.assigner, AssignerKind::Random);
        assert_eq!(params.sessions[0].at, ClockTime::from_hm(18, 20));
        assert_eq!(params.customers[0].conversion, ConversionPolicy::Always);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn arrivals_without_population_are_invalid() {
        let params = ScenarioParams::default().with_arrivals(SessionArrivalParams::new(
            SamplerParams::fixed(5.0, crate::distributions::TimeUnit::Minutes),
            ClockTime::from_hm(18, 0),
            ClockTime::from_hm(19, 0),
        ));
        assert!(matches!(params.validate(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn zero_interval_retry_fails_validation() {
        let params = ScenarioParams::from_json(
            r#"{
                "restaurants": [{"id": 1, "position": {"lat": 52.52, "lng": 13.40}}],
                "customers": [{"id": 7, "position": {"lat": 52.53, "lng": 13.41}}],
                "sessions": [{"customer": 7, "restaurant": 1, "at": "18:20"}],
                "retry_policy": {"policy": "retry", "interval_ms": 0}
            }"#,
        )
        .expect("parse");
        assert!(matches!(params.validate(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn derived_seeds_differ_per_stream_and_index() {
        let a = derive_seed(42, SeedStream::KitchenWait, 0);
        assert_eq!(a, derive_seed(42, SeedStream::KitchenWait, 0));
        assert_ne!(a, derive_seed(42, SeedStream::KitchenWait, 1));
        assert_ne!(a, derive_seed(42, SeedStream::Conversion, 0));
        assert_ne!(a, derive_seed(43, SeedStream::KitchenWait, 0));
    }
}
