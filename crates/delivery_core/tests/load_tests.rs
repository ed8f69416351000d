//! Load tests for delivery_core: whole evenings over a generated city.

mod support;

use std::time::Instant;

use delivery_core::environment::RunStatus;
use delivery_core::scenario::build_environment;
use delivery_core::test_helpers::{city_scenario, recorded, CitySize, EventRecorder};
use support::schedule::{assert_exclusive_assignment, assert_monotonic};

#[test]
fn busy_evening_keeps_every_invariant() {
    let params = city_scenario(
        42,
        CitySize {
            restaurants: 10,
            customers: 200,
            couriers: 25,
            sessions: 400,
        },
    );
    let mut env = build_environment(&params).expect("build");
    let recorder = env.register(EventRecorder::new("load")).expect("recorder");
    let summary = env.run_to_completion().expect("run");
    assert_eq!(summary.status, RunStatus::Completed);

    let events = recorded(&env, recorder);
    assert_eq!(events.len() as u64, summary.events_dispatched);
    assert_monotonic(&events);
    let assignments = assert_exclusive_assignment(&events);

    let results = env.get_results();
    let delivered = results.count("NumberOfOrdersDelivered").expect("delivered");
    let rejected = results.count("NumberOfOrdersRejected").expect("rejected");
    let placed = results.count("NumberOfOrdersPlaced").expect("placed");
    assert_eq!(delivered as usize, assignments);
    assert_eq!(delivered + rejected, placed);
    assert_eq!(env.sessions().unresolved_orders().count(), 0);
    assert!(env
        .sessions()
        .sessions()
        .iter()
        .all(|session| session.is_closed()));
}

#[test]
#[ignore] // Only run explicitly: cargo test --package delivery_core --test load_tests -- --ignored
fn sustained_load_throughput() {
    let params = city_scenario(
        7,
        CitySize {
            restaurants: 100,
            customers: 5_000,
            couriers: 400,
            sessions: 20_000,
        },
    );
    let mut env = build_environment(&params).expect("build");

    let start = Instant::now();
    let summary = env.run_to_completion().expect("run");
    let duration = start.elapsed();

    let events_per_sec = summary.events_dispatched as f64 / duration.as_secs_f64();
    println!(
        "Sustained load: {} events in {:.2}s ({:.0} events/sec)",
        summary.events_dispatched,
        duration.as_secs_f64(),
        events_per_sec
    );
    assert!(
        events_per_sec > 10_000.0,
        "Should process >10000 events/sec, got {events_per_sec:.0}"
    );
}

#[test]
#[ignore]
fn courier_shortage_under_peak_demand() {
    let params = city_scenario(
        11,
        CitySize {
            restaurants: 50,
            customers: 2_000,
            couriers: 20,
            sessions: 5_000,
        },
    );
    let mut env = build_environment(&params).expect("build");
    let start = Instant::now();
    env.run_to_completion().expect("run");
    println!("Peak demand run took {:.2}s", start.elapsed().as_secs_f64());

    let results = env.get_results();
    assert!(results.complete);
    assert!(results.count("NumberOfOrdersRejected").expect("rejected") > 0);
}
