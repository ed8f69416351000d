use crate::ecs::{CourierId, GeoPoint};
use crate::model::Order;

use super::algorithm::{Assigner, CourierCandidate};

/// Lowest courier id wins. Deterministic without a random source, handy for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailableAssigner;

impl Assigner for FirstAvailableAssigner {
    fn name(&self) -> &'static str {
        "first_available"
    }

    fn assign(
        &mut self,
        _order: &Order,
        _pickup: GeoPoint,
        candidates: &[CourierCandidate],
    ) -> Option<CourierId> {
        candidates.iter().map(|candidate| candidate.courier).min()
    }
}
