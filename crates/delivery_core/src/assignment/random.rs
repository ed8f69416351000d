use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::ecs::{CourierId, GeoPoint};
use crate::model::Order;

use super::algorithm::{Assigner, CourierCandidate};

/// Baseline: uniform choice among available couriers, from a seeded RNG.
#[derive(Debug, Clone)]
pub struct RandomAssigner {
    rng: StdRng,
}

impl RandomAssigner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Assigner for RandomAssigner {
    fn name(&self) -> &'static str {
        "random"
    }

    fn assign(
        &mut self,
        _order: &Order,
        _pickup: GeoPoint,
        candidates: &[CourierCandidate],
    ) -> Option<CourierId> {
        candidates
            .choose(&mut self.rng)
            .map(|candidate| candidate.courier)
    }
}
