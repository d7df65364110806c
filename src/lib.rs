//! # mempool-sim - Block Pool Fragmentation Simulator
//!
//! `mempool-sim` models a pool of a fixed number of variable-size memory blocks
//! and drives synthetic allocation traffic against it:
//!
//! - **Block pool** with per-block page counts and free/allocated flags
//! - **Fit policies**: first-fit and best-fit (ties go to the lowest index)
//! - **Fragmentation score** by block count or page sum, in `[0, 1)`
//! - **Threshold defragmentation**: stable compaction of free blocks to the front
//! - **Recording**: per-step score log with a JSON summary
//!
//! ## Quick Start
//!
//! ```rust
//! use mempool_sim::{Allocator, BlockPool, FitPolicy, Request, Result};
//!
//! # fn main() -> Result<()> {
//! let mut pool = BlockPool::from_pages(vec![5, 10, 5, 20])?;
//! let mut alloc = Allocator::new(FitPolicy::BestFit);
//!
//! let result = alloc.handle(&mut pool, &Request::Allocate { pages: 6 })?;
//! assert_eq!(result.block, Some(1));
//! assert_eq!(result.before, Some(40));
//! assert_eq!(result.after, Some((5, 25)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Running a Simulation
//!
//! ```rust
//! use mempool_sim::{FitPolicy, Result, SimulationBuilder};
//!
//! # fn main() -> Result<()> {
//! let mut sim = SimulationBuilder::new()
//!     .pool_size(250)
//!     .seed(42)
//!     .policy(FitPolicy::FirstFit)
//!     .threshold(0.5)
//!     .build()?;
//!
//! let report = sim.run(1_000)?;
//! assert_eq!(report.steps, 1_000);
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use self::core::{
    allocator, config, defrag, error, fragmentation, pool, recording, requests, simulation, sink,
    sweep,
};

// Re-export core types that users need
pub use crate::core::{
    allocator::{AllocationResult, Allocator, FitPolicy},
    config::SimulationConfig,
    defrag::{DefragOutcome, FragmentationState, ThresholdDefragmentor},
    error::{PoolError, Result},
    fragmentation::{ContiguousRegion, FragmentationReport, Measure},
    pool::{BlockPool, RegionSplit, DEFAULT_POOL_SIZE, MAX_PAGES, MIN_PAGES},
    recording::{Recorder, Summary},
    requests::{Request, RequestKind, RequestStream},
    simulation::{RunReport, Simulator, StepReport},
    sink::{Event, EventSink, TracingSink, WriterSink},
    sweep::{sweep, SweepRun, DEFAULT_THRESHOLDS},
};

use std::path::PathBuf;

/// Builder for a [`Simulator`]
///
/// Unset options fall back to [`SimulationConfig::default`].
///
/// # Examples
///
/// ```rust,no_run
/// use mempool_sim::{SimulationBuilder, TracingSink};
///
/// # fn main() -> mempool_sim::Result<()> {
/// let mut sim = SimulationBuilder::new()
///     .pool_size(100)
///     .threshold(0.25)
///     .output("output/first_fit-025.txt") // Optional: record scores
///     .with_sink(TracingSink)
///     .build()?;
/// sim.run(10_000)?;
/// # Ok(())
/// # }
/// ```
pub struct SimulationBuilder {
    config: SimulationConfig,
    sink: Option<Box<dyn EventSink + Send>>,
}

impl SimulationBuilder {
    /// Create a new SimulationBuilder with default settings
    pub fn new() -> Self {
        SimulationBuilder {
            config: SimulationConfig::default(),
            sink: None,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: SimulationConfig) -> Self {
        SimulationBuilder { config, sink: None }
    }

    /// Set the number of blocks in the pool
    pub fn pool_size(mut self, blocks: usize) -> Self {
        self.config.pool_size = blocks;
        self
    }

    /// Seed page sizes and request traffic
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn policy(mut self, policy: FitPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Set the defragmentation threshold (validated in `build`)
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn measure(mut self, measure: Measure) -> Self {
        self.config.measure = measure;
        self
    }

    /// Record one fragmentation score per step to this path
    pub fn output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.output = Some(path.into());
        self
    }

    /// Send request/result events to a sink
    pub fn with_sink(mut self, sink: impl EventSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Build the simulator
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an empty pool, `InvalidThreshold` for a threshold
    /// outside `[0, 1]`, I/O errors if the output file cannot be created.
    pub fn build(self) -> Result<Simulator> {
        let allocator = match self.sink {
            Some(sink) => Allocator::new(self.config.policy).with_sink(sink),
            None => Allocator::new(self.config.policy),
        };
        self.config.build_simulator_with(allocator)
    }
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
