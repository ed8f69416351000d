use crate::ecs::{CourierId, GeoPoint};
use crate::model::Order;

/// An available, on-shift courier offered to an [Assigner].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourierCandidate {
    pub courier: CourierId,
    pub position: GeoPoint,
}

/// Strategy that picks a courier for a ready order.
///
/// Candidates arrive sorted by courier id, so an assigner that is deterministic
/// in its own random source is deterministic overall. Returning `None` means
/// no assignment this time; the caller applies the retry policy.
pub trait Assigner: Send + Sync {
    fn name(&self) -> &'static str;

    fn assign(
        &mut self,
        order: &Order,
        pickup: GeoPoint,
        candidates: &[CourierCandidate],
    ) -> Option<CourierId>;
}
