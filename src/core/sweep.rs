//! Parallel sweep over fit policies and thresholds
//!
//! Each configuration runs on its own scoped thread with its own pool built
//! from the same base seed. No pool is shared between threads.

use crate::allocator::FitPolicy;
use crate::config::SimulationConfig;
use crate::error::{PoolError, Result};
use crate::simulation::RunReport;
use std::path::Path;

/// Thresholds swept when none are given
pub const DEFAULT_THRESHOLDS: [f64; 3] = [0.25, 0.5, 0.75];

/// One finished configuration of a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRun {
    pub config: SimulationConfig,
    pub report: RunReport,
}

/// Log file name for a run, e.g. `best_fit-025.txt`
pub fn run_file_name(policy: FitPolicy, threshold: f64) -> String {
    format!("{}-{}.txt", policy, threshold.to_string().replace('.', ""))
}

/// Run every policy × threshold combination in parallel
///
/// With `output_dir` set, each run records to `output_dir/<run_file_name>`.
/// An unseeded base draws one seed here, shared by every run.
/// Results come back in policy-major order.
pub fn sweep(
    base: &SimulationConfig,
    policies: &[FitPolicy],
    thresholds: &[f64],
    output_dir: Option<&Path>,
) -> Result<Vec<SweepRun>> {
    let seed = base.seed.unwrap_or_else(rand::random::<u64>);
    tracing::info!(
        "Sweeping {} policies x {} thresholds, seed={}",
        policies.len(),
        thresholds.len(),
        seed
    );

    let configs: Vec<SimulationConfig> = policies
        .iter()
        .flat_map(|&policy| {
            thresholds.iter().map(move |&threshold| SimulationConfig {
                policy,
                threshold,
                seed: Some(seed),
                output: output_dir.map(|dir| dir.join(run_file_name(policy, threshold))),
                ..base.clone()
            })
        })
        .collect();

    for config in &configs {
        config.validate()?;
    }

    crossbeam::scope(|scope| {
        let handles: Vec<_> = configs
            .into_iter()
            .map(|config| {
                scope.spawn(move |_| -> Result<SweepRun> {
                    let report = config.build_simulator()?.run(config.steps)?;
                    Ok(SweepRun { config, report })
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| PoolError::WorkerPanicked)
                    .and_then(|run| run)
            })
            .collect::<Result<Vec<_>>>()
    })
    .map_err(|_| PoolError::WorkerPanicked)?
}
