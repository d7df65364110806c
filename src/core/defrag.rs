//! Threshold-triggered defragmentation
//!
//! The trigger is level-based: every step re-reads the score, so a pool that
//! stays above the threshold is compacted on every step.

use crate::error::{PoolError, Result};
use crate::fragmentation::Measure;
use crate::pool::BlockPool;

/// Where the pool's score sits relative to the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentationState {
    BelowThreshold,
    AboveThreshold,
}

/// What one defragmentation step observed and did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefragOutcome {
    /// Score before any compaction
    pub score: f64,
    pub state: FragmentationState,
    /// True if the pool was reordered
    pub defragmented: bool,
}

/// Compacts the pool when `fragmented(measure) >= threshold`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDefragmentor {
    threshold: f64,
    measure: Measure,
}

impl ThresholdDefragmentor {
    /// Default threshold
    pub const DEFAULT_THRESHOLD: f64 = 0.5;

    /// Create a defragmentor scoring by block count
    ///
    /// # Errors
    ///
    /// `InvalidThreshold` unless `0 <= threshold <= 1`.
    pub fn new(threshold: f64) -> Result<Self> {
        Self::with_measure(threshold, Measure::Blocks)
    }

    pub fn with_measure(threshold: f64, measure: Measure) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PoolError::InvalidThreshold(threshold));
        }
        Ok(ThresholdDefragmentor { threshold, measure })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn measure(&self) -> Measure {
        self.measure
    }

    /// Current state, recomputed from the pool
    pub fn state(&self, pool: &BlockPool) -> FragmentationState {
        self.classify(pool.fragmented(self.measure))
    }

    fn classify(&self, score: f64) -> FragmentationState {
        if score >= self.threshold {
            FragmentationState::AboveThreshold
        } else {
            FragmentationState::BelowThreshold
        }
    }

    /// Defragment if the pool is at or above the threshold
    pub fn step(&self, pool: &mut BlockPool) -> DefragOutcome {
        let score = pool.fragmented(self.measure);
        let state = self.classify(score);

        let defragmented = match state {
            FragmentationState::AboveThreshold => pool.defragment(),
            FragmentationState::BelowThreshold => false,
        };
        if defragmented {
            tracing::info!(
                "Defragmented pool (score {:.3} >= threshold {:.3})",
                score,
                self.threshold
            );
        }

        DefragOutcome {
            score,
            state,
            defragmented,
        }
    }
}

impl Default for ThresholdDefragmentor {
    fn default() -> Self {
        ThresholdDefragmentor {
            threshold: Self::DEFAULT_THRESHOLD,
            measure: Measure::Blocks,
        }
    }
}
