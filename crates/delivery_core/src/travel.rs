//! Travel-time collaborators: how long a courier needs between two points.
//!
//! The kernel only cares about elapsed time, so the model is a trait stored as a
//! `Box<dyn TravelTimeModel>` ECS resource, selected via [TravelTimeParams]
//! during scenario building.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::clock::ONE_HOUR_MS;
use crate::ecs::GeoPoint;

/// Trait for travel-time backends. Implementations must be `Send + Sync` so the
/// model can be stored as a shared ECS resource.
pub trait TravelTimeModel: Send + Sync {
    fn travel_time_ms(&self, from: GeoPoint, to: GeoPoint) -> u64;
}

/// Straight-line (haversine) distance at a constant speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSpeedTravel {
    pub speed_kmh: f64,
}

impl ConstantSpeedTravel {
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_kmh: speed_kmh.max(1.0),
        }
    }
}

impl Default for ConstantSpeedTravel {
    fn default() -> Self {
        Self::new(20.0)
    }
}

impl TravelTimeModel for ConstantSpeedTravel {
    fn travel_time_ms(&self, from: GeoPoint, to: GeoPoint) -> u64 {
        let hours = from.distance_km(to) / self.speed_kmh;
        (hours * ONE_HOUR_MS as f64).round() as u64
    }
}

/// Every leg takes the same time regardless of distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTravelTime {
    pub ms: u64,
}

impl TravelTimeModel for FixedTravelTime {
    fn travel_time_ms(&self, _from: GeoPoint, _to: GeoPoint) -> u64 {
        self.ms
    }
}

/// Which travel-time model to use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum TravelTimeParams {
    ConstantSpeed { speed_kmh: f64 },
    Fixed { ms: u64 },
}

impl Default for TravelTimeParams {
    fn default() -> Self {
        TravelTimeParams::ConstantSpeed { speed_kmh: 20.0 }
    }
}

impl TravelTimeParams {
    pub fn build(&self) -> Box<dyn TravelTimeModel> {
        match *self {
            TravelTimeParams::ConstantSpeed { speed_kmh } => {
                Box::new(ConstantSpeedTravel::new(speed_kmh))
            }
            TravelTimeParams::Fixed { ms } => Box::new(FixedTravelTime { ms }),
        }
    }
}

/// ECS resource wrapping a boxed travel-time model.
#[derive(Resource)]
pub struct TravelTimeResource(pub Box<dyn TravelTimeModel>);

impl TravelTimeResource {
    pub fn new(model: Box<dyn TravelTimeModel>) -> Self {
        Self(model)
    }
}

impl std::ops::Deref for TravelTimeResource {
    type Target = dyn TravelTimeModel;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
