//! Simulation configuration
//!
//! Loadable from TOML. Every key is optional:
//!
//! ```toml
//! pool_size = 250
//! seed = 42
//! policy = "best_fit"
//! threshold = 0.75
//! steps = 100000
//! measure = "blocks"
//! output = "output/best_fit-075.txt"
//! ```

use crate::allocator::{Allocator, FitPolicy};
use crate::defrag::ThresholdDefragmentor;
use crate::error::{PoolError, Result};
use crate::fragmentation::Measure;
use crate::pool::{BlockPool, DEFAULT_POOL_SIZE};
use crate::recording::Recorder;
use crate::requests::RequestStream;
use crate::simulation::Simulator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Parameters for one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of blocks in the pool
    pub pool_size: usize,

    /// Seed for page sizes and request traffic (random if absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    pub policy: FitPolicy,

    /// Defragmentation threshold, 0-1 inclusive
    pub threshold: f64,

    pub steps: usize,

    /// Fragmentation measure the defragmentor compares against the threshold
    pub measure: Measure,

    /// Fragmentation log path; no recording if absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            pool_size: DEFAULT_POOL_SIZE,
            seed: None,
            policy: FitPolicy::default(),
            threshold: ThresholdDefragmentor::DEFAULT_THRESHOLD,
            steps: 1000,
            measure: Measure::default(),
            output: None,
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(PoolError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PoolError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }

    /// Build a simulator with a fresh pool for this configuration
    ///
    /// Pool and request stream share the seed. With `output` set, the
    /// simulator records to that path.
    pub fn build_simulator(&self) -> Result<Simulator> {
        self.build_simulator_with(Allocator::new(self.policy))
    }

    /// Same as `build_simulator`, with a caller-supplied allocator
    ///
    /// The allocator's own policy is used in place of `policy`.
    pub fn build_simulator_with(&self, allocator: Allocator) -> Result<Simulator> {
        self.validate()?;

        let pool = BlockPool::new(self.pool_size, self.seed)?;
        let stream = RequestStream::new(self.seed);
        let defragmentor = ThresholdDefragmentor::with_measure(self.threshold, self.measure)?;

        let simulator = Simulator::new(pool, stream, allocator, defragmentor);
        match &self.output {
            Some(path) => Ok(simulator.with_recorder(Recorder::create(path)?)),
            None => Ok(simulator),
        }
    }
}
