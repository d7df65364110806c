//! First-fit and best-fit block selection
//!
//! Both policies scan free blocks in ascending index order, so best-fit ties
//! resolve to the lowest index.

use crate::error::{PoolError, Result};
use crate::pool::BlockPool;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule for choosing a free block that satisfies a target size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Lowest-index free block that is large enough
    #[default]
    FirstFit,
    /// Smallest free block that is large enough
    BestFit,
}

impl FitPolicy {
    /// Every policy, in a fixed order
    pub const ALL: [FitPolicy; 2] = [FitPolicy::FirstFit, FitPolicy::BestFit];

    /// Select a free block with at least `target` pages
    ///
    /// Returns `Ok(None)` when no free block qualifies.
    ///
    /// # Errors
    ///
    /// `InvalidSize` if `target` is zero.
    pub fn select(&self, pool: &BlockPool, target: u32) -> Result<Option<usize>> {
        match self {
            FitPolicy::FirstFit => first_fit(pool, target),
            FitPolicy::BestFit => best_fit(pool, target),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FitPolicy::FirstFit => "first_fit",
            FitPolicy::BestFit => "best_fit",
        }
    }
}

impl fmt::Display for FitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first_fit" | "first-fit" | "firstfit" => Ok(FitPolicy::FirstFit),
            "best_fit" | "best-fit" | "bestfit" => Ok(FitPolicy::BestFit),
            _ => Err(format!(
                "Invalid fit policy '{}'. Valid options: first_fit, best_fit",
                s
            )),
        }
    }
}

fn check_target(target: u32) -> Result<()> {
    if target == 0 {
        return Err(PoolError::InvalidSize(target));
    }
    Ok(())
}

/// Lowest-index free block whose page count is at least `target`
pub fn first_fit(pool: &BlockPool, target: u32) -> Result<Option<usize>> {
    check_target(target)?;

    let (pages, available) = (pool.pages(), pool.available());
    Ok((0..pool.len()).find(|&b| available[b] && pages[b] >= target))
}

/// Free block with the smallest page count that is at least `target`
///
/// Ties go to the lowest index.
pub fn best_fit(pool: &BlockPool, target: u32) -> Result<Option<usize>> {
    check_target(target)?;

    // min_by_key keeps the first of equal minima
    let (pages, available) = (pool.pages(), pool.available());
    Ok((0..pool.len())
        .filter(|&b| available[b] && pages[b] >= target)
        .min_by_key(|&b| pages[b]))
}
