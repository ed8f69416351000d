//! Generated session arrivals: an inter-arrival process over a time-of-day window.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::ecs::{CustomerId, RestaurantId};
use crate::error::ScenarioError;

use super::params::SessionArrivalParams;

/// Upper bound on generated sessions when the arrival window sets no maximum.
pub const MAX_GENERATED_SESSIONS: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedSession {
    pub customer: CustomerId,
    pub restaurant: RestaurantId,
    pub at_ms: u64,
}

/// Draws sessions in `[start, end)`. The first session arrives one inter-arrival
/// draw after `start`.
pub fn generate_sessions(
    arrivals: &SessionArrivalParams,
    customers: &[CustomerId],
    restaurants: &[RestaurantId],
    seed: u64,
) -> Result<Vec<GeneratedSession>, ScenarioError> {
    let mut inter_arrival = arrivals.inter_arrival.build(seed)?;
    let mut rng = StdRng::seed_from_u64(seed.rotate_left(17));
    let cap = arrivals.max_sessions.unwrap_or(MAX_GENERATED_SESSIONS);
    let end = arrivals.end.ms();

    let mut sessions = Vec::new();
    let mut at_ms = arrivals.start.ms();
    while (sessions.len() as u32) < cap {
        at_ms = at_ms.saturating_add(inter_arrival.sample_ms()?);
        if at_ms >= end {
            break;
        }
        let (Some(customer), Some(restaurant)) =
            (customers.choose(&mut rng), restaurants.choose(&mut rng))
        else {
            break;
        };
        sessions.push(GeneratedSession {
            customer: *customer,
            restaurant: *restaurant,
            at_ms,
        });
    }
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockTime, ONE_MIN_MS};
    use crate::distributions::{SamplerParams, TimeUnit};

    fn window(inter_arrival: SamplerParams) -> SessionArrivalParams {
        SessionArrivalParams::new(
            inter_arrival,
            ClockTime::from_hm(18, 0),
            ClockTime::from_hm(19, 0),
        )
    }

    #[test]
    fn fixed_spacing_fills_the_window() {
        let sessions = generate_sessions(
            &window(SamplerParams::fixed(10.0, TimeUnit::Minutes)),
            &[CustomerId(1)],
            &[RestaurantId(1)],
            3,
        )
        .expect("sessions");
        let times: Vec<_> = sessions.iter().map(|s| s.at_ms).collect();
        let start = ClockTime::from_hm(18, 0).ms();
        assert_eq!(
            times,
            (1..6).map(|i| start + i * 10 * ONE_MIN_MS).collect::<Vec<_>>()
        );
    }

    #[test]
    fn zero_spacing_stops_at_the_cap() {
        let sessions = generate_sessions(
            &window(SamplerParams::fixed(0.0, TimeUnit::Seconds)).with_max_sessions(25),
            &[CustomerId(1), CustomerId(2)],
            &[RestaurantId(1)],
            3,
        )
        .expect("sessions");
        assert_eq!(sessions.len(), 25);
    }

    #[test]
    fn same_seed_same_sessions() {
        let params = window(SamplerParams::new("exponential", vec![4.0], TimeUnit::Minutes));
        let customers = [CustomerId(1), CustomerId(2), CustomerId(3)];
        let restaurants = [RestaurantId(1), RestaurantId(2)];
        let a = generate_sessions(&params, &customers, &restaurants, 11).expect("a");
        let b = generate_sessions(&params, &customers, &restaurants, 11).expect("b");
        assert_eq!(a, b);
        assert!(a.windows(2).all(|pair| pair[0].at_ms <= pair[1].at_ms));
    }
}
