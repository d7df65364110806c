//! Simulation driver
//!
//! One request per step: sample, handle, defragment if needed, record. The
//! simulator owns the pool for the whole run.

use crate::allocator::{AllocationResult, Allocator};
use crate::defrag::{DefragOutcome, ThresholdDefragmentor};
use crate::error::Result;
use crate::pool::BlockPool;
use crate::recording::Recorder;
use crate::requests::{Request, RequestKind, RequestStream};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything that happened in one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub request: Request,
    pub result: AllocationResult,
    pub defrag: DefragOutcome,
}

/// Totals over a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub steps: usize,
    /// Successful allocate and me-too requests
    pub allocations: usize,
    /// Allocate and me-too requests no block could satisfy
    pub failed_allocations: usize,
    pub frees: usize,
    pub defragmentations: usize,
    /// Fragmentation after the last step, in the defragmentor's measure
    pub final_fragmentation: f64,
    /// Summary file written by the recorder, if any
    pub summary: Option<PathBuf>,
}

impl RunReport {
    fn count(&mut self, step: &StepReport) {
        self.steps += 1;
        match (step.result.kind, step.result.success) {
            (RequestKind::Free, _) => self.frees += 1,
            (_, true) => self.allocations += 1,
            (_, false) => self.failed_allocations += 1,
        }
        if step.defrag.defragmented {
            self.defragmentations += 1;
        }
    }
}

/// Drives a request stream against a pool
#[derive(Debug)]
pub struct Simulator {
    pool: BlockPool,
    stream: RequestStream,
    allocator: Allocator,
    defragmentor: ThresholdDefragmentor,
    recorder: Option<Recorder>,
}

impl Simulator {
    pub fn new(
        pool: BlockPool,
        stream: RequestStream,
        allocator: Allocator,
        defragmentor: ThresholdDefragmentor,
    ) -> Self {
        Simulator {
            pool,
            stream,
            allocator,
            defragmentor,
            recorder: None,
        }
    }

    /// Record one fragmentation score per step and write a summary after `run`
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    pub fn into_pool(self) -> BlockPool {
        self.pool
    }

    /// Run a single step
    pub fn step(&mut self) -> Result<StepReport> {
        let request = self.stream.next_request(&self.pool);
        let result = self.allocator.handle(&mut self.pool, &request)?;
        let defrag = self.defragmentor.step(&mut self.pool);

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(&self.pool)?;
        }

        Ok(StepReport {
            request,
            result,
            defrag,
        })
    }

    /// Run `steps` steps and return the totals
    pub fn run(&mut self, steps: usize) -> Result<RunReport> {
        info!(
            "Running {} steps: {} blocks, policy={}, threshold={}",
            steps,
            self.pool.len(),
            self.allocator.policy(),
            self.defragmentor.threshold()
        );

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.start_timer();
        }

        let mut report = RunReport::default();
        for _ in 0..steps {
            let step = self.step()?;
            report.count(&step);
        }
        report.final_fragmentation = self.pool.fragmented(self.defragmentor.measure());

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop_timer();
            if steps > 0 {
                report.summary = Some(recorder.write_summary()?);
            }
        }

        debug!("Run report: {:?}", report);
        info!(
            "Finished: {} allocations, {} failed, {} frees, {} defragmentations",
            report.allocations, report.failed_allocations, report.frees, report.defragmentations
        );

        Ok(report)
    }
}
