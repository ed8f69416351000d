use crate::ecs::{CourierId, GeoPoint};
use crate::model::Order;

use super::algorithm::{Assigner, CourierCandidate};

/// Closest courier to the pickup point by great-circle distance; ties go to the lower id.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestCourierAssigner;

impl Assigner for NearestCourierAssigner {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn assign(
        &mut self,
        _order: &Order,
        pickup: GeoPoint,
        candidates: &[CourierCandidate],
    ) -> Option<CourierId> {
        let mut best: Option<(CourierId, f64)> = None;
        for candidate in candidates {
            let distance = candidate.position.distance_km(pickup);
            let closer = match best {
                None => true,
                Some((best_id, best_distance)) => {
                    distance < best_distance
                        || (distance == best_distance && candidate.courier < best_id)
                }
            };
            if closer {
                best = Some((candidate.courier, distance));
            }
        }
        best.map(|(courier, _)| courier)
    }
}
