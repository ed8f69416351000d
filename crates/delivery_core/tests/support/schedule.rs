use std::collections::HashMap;

use delivery_core::clock::{Event, EventPayload};
use delivery_core::ecs::CourierId;
use delivery_core::environment::Environment;
use delivery_core::model::OrderId;

/// Runs to the end, asserting that dispatch times never go backwards.
pub fn drain(env: &mut Environment) -> Vec<Event> {
    let events: Vec<Event> = env
        .run()
        .collect::<Result<_, _>>()
        .expect("run without handler failures");
    assert_monotonic(&events);
    events
}

pub fn assert_monotonic(events: &[Event]) {
    for pair in events.windows(2) {
        assert!(
            pair[0].timestamp <= pair[1].timestamp,
            "time went backwards: {:?} then {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// Replays assignment and delivery events and checks that no courier ever holds two
/// orders at once. Returns the number of assignments seen.
pub fn assert_exclusive_assignment(events: &[Event]) -> usize {
    let mut active: HashMap<CourierId, OrderId> = HashMap::new();
    let mut assignments = 0;
    for event in events {
        match event.payload {
            EventPayload::OrderAssigned { order, courier, .. } => {
                assignments += 1;
                if let Some(held) = active.insert(courier, order) {
                    panic!(
                        "{courier} assigned {order} at {} ms while holding {held}",
                        event.timestamp
                    );
                }
            }
            EventPayload::OrderDelivered { order, courier, .. } => {
                assert_eq!(active.remove(&courier), Some(order));
            }
            _ => {}
        }
    }
    assignments
}
