//! Seeded replications of one scenario, run in parallel with rayon.
//!
//! Every replication builds its own environment from a copy of the scenario
//! with a different seed; nothing is shared between runs.

use std::collections::BTreeMap;
use std::path::Path;

use delivery_core::error::ScenarioError;
use delivery_core::metrics::SimResults;
use delivery_core::scenario::{run_scenario, ScenarioParams};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct Replication {
    pub seed: u64,
    pub results: SimResults,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub replications: Vec<Replication>,
    /// Mean of every numeric metric over the replications that produced a value.
    pub means: BTreeMap<String, f64>,
    /// Replications that stopped at a run limit instead of draining the queue.
    pub incomplete: usize,
}

/// Reads a scenario file and applies command-line overrides.
pub fn load_scenario(
    path: &Path,
    seed: Option<u64>,
    max_events: Option<u64>,
) -> Result<ScenarioParams, ScenarioError> {
    let mut params = ScenarioParams::load(path)?;
    if let Some(seed) = seed {
        params.seed = seed;
    }
    if let Some(max_events) = max_events {
        params.limits = params.limits.with_max_events(max_events);
    }
    params.validate()?;
    Ok(params)
}

/// Runs `count` replications with seeds `base, base + 1, ...`. Results keep seed order.
pub fn run_replications(
    params: &ScenarioParams,
    count: usize,
) -> Result<BatchReport, ScenarioError> {
    let base = params.seed;
    let replications = (0..count as u64)
        .into_par_iter()
        .map(|offset| {
            let seed = base.wrapping_add(offset);
            let mut run = params.clone();
            run.seed = seed;
            let results = run_scenario(&run)?;
            debug!(seed, events = results.events_dispatched, "replication finished");
            Ok(Replication { seed, results })
        })
        .collect::<Result<Vec<_>, ScenarioError>>()?;

    let report = BatchReport {
        means: metric_means(&replications),
        incomplete: replications
            .iter()
            .filter(|replication| !replication.results.complete)
            .count(),
        replications,
    };
    info!(
        replications = report.replications.len(),
        incomplete = report.incomplete,
        "batch finished"
    );
    Ok(report)
}

fn metric_means(replications: &[Replication]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for replication in replications {
        for entry in &replication.results.metrics {
            if let Some(value) = entry.value.as_f64() {
                let (sum, n) = sums.entry(entry.name.clone()).or_default();
                *sum += value;
                *n += 1;
            }
        }
    }
    sums.into_iter()
        .map(|(name, (sum, n))| (name, sum / f64::from(n)))
        .collect()
}
