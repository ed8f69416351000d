pub mod algorithm;
pub mod first_available;
pub mod nearest;
pub mod policy;
pub mod random;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

pub use algorithm::{Assigner, CourierCandidate};
pub use first_available::FirstAvailableAssigner;
pub use nearest::NearestCourierAssigner;
pub use policy::{AssignmentRetryPolicy, RetryDecision};
pub use random::RandomAssigner;

/// Resource wrapper for the assigner trait object.
#[derive(Resource)]
pub struct AssignerResource(pub Box<dyn Assigner>);

impl AssignerResource {
    pub fn new(assigner: Box<dyn Assigner>) -> Self {
        Self(assigner)
    }
}

impl std::ops::Deref for AssignerResource {
    type Target = dyn Assigner;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::ops::DerefMut for AssignerResource {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

/// Assigner selection in scenario files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignerKind {
    /// Uniformly random among available couriers.
    #[default]
    Random,
    FirstAvailable,
    Nearest,
}

impl AssignerKind {
    pub fn build(self, seed: u64) -> Box<dyn Assigner> {
        match self {
            AssignerKind::Random => Box::new(RandomAssigner::new(seed)),
            AssignerKind::FirstAvailable => Box::new(FirstAvailableAssigner),
            AssignerKind::Nearest => Box::new(NearestCourierAssigner),
        }
    }
}
