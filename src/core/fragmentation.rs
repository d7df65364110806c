//! Contiguous free regions and the fragmentation score
//!
//! Score = `(free - largest_region) / free`, measured either in blocks or in
//! pages. `0.0` means every free block sits in one run; the score approaches
//! `1.0` as free blocks scatter into singleton runs.

use crate::pool::BlockPool;
use serde::{Deserialize, Serialize};

/// Unit used to weigh free space when scoring fragmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Count blocks
    #[default]
    Blocks,
    /// Sum page counts
    Pages,
}

/// A maximal run of index-adjacent free blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContiguousRegion {
    /// Index of the first block
    pub start: usize,
    /// Block indices in the run, ascending
    pub blocks: Vec<usize>,
    /// Sum of the page counts of the run
    pub pages: u64,
}

impl ContiguousRegion {
    /// Number of blocks in the run
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// One past the last block index
    pub fn end(&self) -> usize {
        self.start + self.blocks.len()
    }

    pub fn contains(&self, block: usize) -> bool {
        block >= self.start && block < self.end()
    }

    fn size(&self, measure: Measure) -> u64 {
        match measure {
            Measure::Blocks => self.len() as u64,
            Measure::Pages => self.pages,
        }
    }
}

/// Partition the free blocks of a pool into maximal adjacent runs
pub fn contiguous_free_regions(pool: &BlockPool) -> Vec<ContiguousRegion> {
    let mut regions: Vec<ContiguousRegion> = Vec::new();

    for (block, pages) in pool.free_blocks_with_pages() {
        match regions.last_mut() {
            Some(region) if region.end() == block => {
                region.blocks.push(block);
                region.pages += u64::from(pages);
            }
            _ => regions.push(ContiguousRegion {
                start: block,
                blocks: vec![block],
                pages: u64::from(pages),
            }),
        }
    }

    regions
}

/// Fragmentation score in `[0, 1)`
pub fn score(pool: &BlockPool, measure: Measure) -> f64 {
    let regions = contiguous_free_regions(pool);
    score_regions(&regions, measure)
}

fn score_regions(regions: &[ContiguousRegion], measure: Measure) -> f64 {
    let free: u64 = regions.iter().map(|r| r.size(measure)).sum();
    if free == 0 {
        return 0.0;
    }

    let largest = regions.iter().map(|r| r.size(measure)).max().unwrap_or(0);
    (free - largest) as f64 / free as f64
}

/// Snapshot of the free space layout of a pool
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentationReport {
    pub free_blocks: usize,
    pub free_pages: u64,
    pub region_count: usize,
    pub largest_region_blocks: usize,
    pub largest_region_pages: u64,
    pub block_score: f64,
    pub page_score: f64,
}

/// Compute both scores and the region statistics in one pass over the pool
pub fn analyze(pool: &BlockPool) -> FragmentationReport {
    let regions = contiguous_free_regions(pool);

    FragmentationReport {
        free_blocks: regions.iter().map(ContiguousRegion::len).sum(),
        free_pages: regions.iter().map(|r| r.pages).sum(),
        region_count: regions.len(),
        largest_region_blocks: regions.iter().map(ContiguousRegion::len).max().unwrap_or(0),
        largest_region_pages: regions.iter().map(|r| r.pages).max().unwrap_or(0),
        block_score: score_regions(&regions, Measure::Blocks),
        page_score: score_regions(&regions, Measure::Pages),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternating_pool() -> BlockPool {
        BlockPool::from_parts(
            vec![3, 7, 2, 9, 4],
            vec![true, false, true, false, true],
        )
    }

    #[test]
    fn test_singleton_regions() {
        let pool = alternating_pool();
        let regions = contiguous_free_regions(&pool);

        let starts: Vec<usize> = regions.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 2, 4]);
        assert!(regions.iter().all(|r| r.len() == 1));
        assert_eq!(regions[1].pages, 2);
    }

    #[test]
    fn test_alternating_score() {
        let pool = alternating_pool();
        let score = score(&pool, Measure::Blocks);
        assert!((score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_page_weighted_score() {
        let pool = alternating_pool();
        // Free pages 3 + 2 + 4 = 9, largest run = 4
        let score = score(&pool, Measure::Pages);
        assert!((score - 5.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_region_is_zero() {
        let pool = BlockPool::from_parts(vec![1, 1, 1, 1], vec![false, true, true, false]);
        assert_eq!(contiguous_free_regions(&pool).len(), 1);
        assert_eq!(score(&pool, Measure::Blocks), 0.0);
        assert_eq!(score(&pool, Measure::Pages), 0.0);
    }

    #[test]
    fn test_fully_allocated_is_zero() {
        let pool = BlockPool::from_parts(vec![5, 5], vec![false, false]);
        assert!(contiguous_free_regions(&pool).is_empty());
        assert_eq!(score(&pool, Measure::Blocks), 0.0);
    }

    #[test]
    fn test_region_bounds() {
        let pool = BlockPool::from_parts(
            vec![1, 2, 3, 4, 5, 6],
            vec![false, true, true, true, false, true],
        );
        let regions = contiguous_free_regions(&pool);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].blocks, vec![1, 2, 3]);
        assert_eq!(regions[0].end(), 4);
        assert!(regions[0].contains(3));
        assert!(!regions[0].contains(4));
        assert_eq!(regions[0].pages, 9);
    }

    #[test]
    fn test_analyze_report() {
        let pool = BlockPool::from_parts(
            vec![1, 2, 3, 4, 5, 6],
            vec![false, true, true, true, false, true],
        );
        let report = analyze(&pool);

        assert_eq!(report.free_blocks, 4);
        assert_eq!(report.free_pages, 15);
        assert_eq!(report.region_count, 2);
        assert_eq!(report.largest_region_blocks, 3);
        assert_eq!(report.largest_region_pages, 9);
        assert!((report.block_score - 0.25).abs() < 1e-12);
        assert!((report.page_score - 6.0 / 15.0).abs() < 1e-12);
    }
}
