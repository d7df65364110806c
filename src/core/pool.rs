//! Block pool: a fixed number of variable-size blocks
//!
//! Each block carries a page count (sampled once at construction) and an
//! availability flag. Derived views such as contiguous free regions are
//! recomputed from the two arrays on every query, so every query is O(N).

use crate::error::{PoolError, Result};
use crate::fragmentation::{self, ContiguousRegion, Measure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Smallest page count a sampled block can have
pub const MIN_PAGES: u32 = 1;

/// Largest page count a sampled block can have
pub const MAX_PAGES: u32 = 20;

/// Default number of blocks in a pool
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Page sums of the free region a block belonged to, before and after allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSplit {
    /// Page sum of the whole free region containing the block
    pub before: u64,
    /// Page sums left and right of the block, `None` if the region was only the block
    pub after: Option<(u64, u64)>,
}

/// Pool of blocks with per-block page counts
///
/// `pages` and `available` always have the same length, and that length never
/// changes. Defragmentation permutes both arrays together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPool {
    /// Page count for each block
    pages: Vec<u32>,

    /// `true` = free, `false` = allocated
    available: Vec<bool>,
}

impl BlockPool {
    /// Create a pool of `blocks` blocks with page counts sampled from `1..=20`
    ///
    /// With a seed the page counts are reproducible.
    pub fn new(blocks: usize, seed: Option<u64>) -> Result<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(blocks, &mut rng)
    }

    /// Create a pool and sample page counts from the given RNG
    pub fn with_rng<R: Rng + ?Sized>(blocks: usize, rng: &mut R) -> Result<Self> {
        if blocks == 0 {
            return Err(PoolError::InvalidConfig(
                "pool must contain at least one block".to_string(),
            ));
        }

        let pages = (0..blocks)
            .map(|_| rng.gen_range(MIN_PAGES..=MAX_PAGES))
            .collect();

        Ok(BlockPool {
            pages,
            available: vec![true; blocks],
        })
    }

    /// Create an all-free pool with explicit page counts
    pub fn from_pages(pages: Vec<u32>) -> Result<Self> {
        if pages.is_empty() {
            return Err(PoolError::InvalidConfig(
                "pool must contain at least one block".to_string(),
            ));
        }
        if let Some(&zero) = pages.iter().find(|&&p| p == 0) {
            return Err(PoolError::InvalidSize(zero));
        }

        let available = vec![true; pages.len()];
        Ok(BlockPool { pages, available })
    }

    /// Number of blocks in the pool
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Always false: a pool holds at least one block
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page counts in pool order
    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    /// Availability flags in pool order (`true` = free)
    pub fn available(&self) -> &[bool] {
        &self.available
    }

    fn check_block(&self, block: usize) -> Result<()> {
        if block >= self.len() {
            return Err(PoolError::InvalidBlockId {
                block,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Page count of a block
    pub fn pages_of(&self, block: usize) -> Result<u32> {
        self.check_block(block)?;
        Ok(self.pages[block])
    }

    /// Check whether a block is free
    pub fn is_free(&self, block: usize) -> Result<bool> {
        self.check_block(block)?;
        Ok(self.available[block])
    }

    /// Allocate a free block
    ///
    /// Returns the page sum of the free region the block belonged to and, if
    /// that region spanned more than this block, the page sums on either side.
    ///
    /// # Errors
    ///
    /// `InvalidBlockId` if out of range, `BlockAlreadyAllocated` if the block
    /// is not free. The pool is left untouched on error.
    pub fn allocate(&mut self, block: usize) -> Result<RegionSplit> {
        self.check_block(block)?;
        if !self.available[block] {
            tracing::warn!("Allocation of already allocated block {}", block);
            return Err(PoolError::BlockAlreadyAllocated(block));
        }

        let (start, end) = self.free_run_around(block);
        let before = self.page_sum(start, end);
        let after = if end - start > 1 {
            Some((self.page_sum(start, block), self.page_sum(block + 1, end)))
        } else {
            None
        };

        self.available[block] = false;
        Ok(RegionSplit { before, after })
    }

    /// Free an allocated block
    ///
    /// # Errors
    ///
    /// `InvalidBlockId` if out of range, `BlockAlreadyFree` on double-free.
    pub fn free(&mut self, block: usize) -> Result<()> {
        self.check_block(block)?;
        if self.available[block] {
            tracing::warn!("Double-free detected for block {}", block);
            return Err(PoolError::BlockAlreadyFree(block));
        }

        self.available[block] = true;
        Ok(())
    }

    /// Half-open index range of the free run containing `block`
    fn free_run_around(&self, block: usize) -> (usize, usize) {
        let mut start = block;
        while start > 0 && self.available[start - 1] {
            start -= 1;
        }
        let mut end = block + 1;
        while end < self.len() && self.available[end] {
            end += 1;
        }
        (start, end)
    }

    fn page_sum(&self, start: usize, end: usize) -> u64 {
        self.pages[start..end].iter().map(|&p| u64::from(p)).sum()
    }

    /// Indices of free blocks, ascending
    pub fn free_blocks(&self) -> Vec<usize> {
        self.indices_where(true)
    }

    /// Indices of allocated blocks, ascending
    pub fn allocated_blocks(&self) -> Vec<usize> {
        self.indices_where(false)
    }

    /// Free block indices paired with their page counts
    pub fn free_blocks_with_pages(&self) -> Vec<(usize, u32)> {
        self.with_pages(self.free_blocks())
    }

    /// Allocated block indices paired with their page counts
    pub fn allocated_blocks_with_pages(&self) -> Vec<(usize, u32)> {
        self.with_pages(self.allocated_blocks())
    }

    fn indices_where(&self, free: bool) -> Vec<usize> {
        self.available
            .iter()
            .enumerate()
            .filter(|(_, &a)| a == free)
            .map(|(i, _)| i)
            .collect()
    }

    fn with_pages(&self, indices: Vec<usize>) -> Vec<(usize, u32)> {
        indices.into_iter().map(|i| (i, self.pages[i])).collect()
    }

    pub fn num_free(&self) -> usize {
        self.available.iter().filter(|&&a| a).count()
    }

    pub fn num_allocated(&self) -> usize {
        self.len() - self.num_free()
    }

    /// Total pages held by free blocks
    pub fn num_pages_free(&self) -> u64 {
        self.pages
            .iter()
            .zip(&self.available)
            .filter(|(_, &a)| a)
            .map(|(&p, _)| u64::from(p))
            .sum()
    }

    /// Total pages held by allocated blocks
    pub fn num_pages_allocated(&self) -> u64 {
        self.total_pages() - self.num_pages_free()
    }

    pub fn total_pages(&self) -> u64 {
        self.page_sum(0, self.len())
    }

    /// Maximal runs of adjacent free blocks, sorted by start index
    pub fn contiguous_free_regions(&self) -> Vec<ContiguousRegion> {
        fragmentation::contiguous_free_regions(self)
    }

    /// Fragmentation score in `[0, 1)`
    pub fn fragmented(&self, measure: Measure) -> f64 {
        fragmentation::score(self, measure)
    }

    /// Stable partition: free blocks first, allocated blocks after
    ///
    /// Block indices held before this call no longer refer to the same blocks.
    /// Returns `false` if the pool was already grouped and nothing moved.
    pub fn defragment(&mut self) -> bool {
        if self.is_grouped() {
            return false;
        }

        let (free, allocated): (Vec<usize>, Vec<usize>) =
            (0..self.len()).partition(|&i| self.available[i]);
        let order: Vec<usize> = free.into_iter().chain(allocated).collect();

        self.pages = order.iter().map(|&i| self.pages[i]).collect();
        self.available = order.iter().map(|&i| self.available[i]).collect();
        true
    }

    /// True if no free block follows an allocated one
    pub fn is_grouped(&self) -> bool {
        self.available.windows(2).all(|w| w[0] || !w[1])
    }

    /// Page offset of a block: sum of the page counts of all blocks before it
    pub fn page_address(&self, block: usize) -> Result<u64> {
        self.check_block(block)?;
        Ok(self.page_sum(0, block))
    }

    /// Mark every block free without resampling page counts
    pub fn reset(&mut self) {
        self.available.iter_mut().for_each(|a| *a = true);
    }

    /// Build a pool with explicit availability, used by tests
    #[cfg(test)]
    pub(crate) fn from_parts(pages: Vec<u32>, available: Vec<bool>) -> Self {
        assert_eq!(pages.len(), available.len());
        BlockPool { pages, available }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_pool() -> BlockPool {
        BlockPool::from_pages(vec![5, 10, 5, 20]).unwrap()
    }

    #[test]
    fn test_pool_creation() {
        let pool = BlockPool::new(100, Some(7)).unwrap();
        assert_eq!(pool.len(), 100);
        assert_eq!(pool.num_free(), 100);
        assert_eq!(pool.num_allocated(), 0);
        assert!(pool
            .pages()
            .iter()
            .all(|&p| (MIN_PAGES..=MAX_PAGES).contains(&p)));
    }

    #[test]
    fn test_seeded_pools_match() {
        let a = BlockPool::new(50, Some(42)).unwrap();
        let b = BlockPool::new(50, Some(42)).unwrap();
        assert_eq!(a.pages(), b.pages());
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(matches!(
            BlockPool::new(0, None),
            Err(PoolError::InvalidConfig(_))
        ));
        assert!(matches!(
            BlockPool::from_pages(vec![]),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_page_block_rejected() {
        let result = BlockPool::from_pages(vec![3, 0, 2]);
        assert!(matches!(result, Err(PoolError::InvalidSize(0))));
    }

    #[test]
    fn test_allocate_splits_region() {
        let mut pool = scenario_pool();

        let split = pool.allocate(1).unwrap();
        assert_eq!(split.before, 40);
        assert_eq!(split.after, Some((5, 25)));
        assert!(!pool.is_free(1).unwrap());
        assert_eq!(pool.num_free(), 3);
    }

    #[test]
    fn test_allocate_singleton_region() {
        let mut pool = scenario_pool();
        pool.allocate(0).unwrap();
        pool.allocate(2).unwrap();

        // Block 1 now sits alone between two allocated blocks
        let split = pool.allocate(1).unwrap();
        assert_eq!(split.before, 10);
        assert_eq!(split.after, None);
    }

    #[test]
    fn test_allocate_region_edge() {
        let mut pool = scenario_pool();

        let split = pool.allocate(0).unwrap();
        assert_eq!(split.before, 40);
        assert_eq!(split.after, Some((0, 35)));
    }

    #[test]
    fn test_allocate_already_allocated() {
        let mut pool = scenario_pool();
        pool.allocate(2).unwrap();

        let before = pool.clone();
        let result = pool.allocate(2);
        assert!(matches!(result, Err(PoolError::BlockAlreadyAllocated(2))));
        assert_eq!(pool, before);
    }

    #[test]
    fn test_double_free() {
        let mut pool = scenario_pool();

        let result = pool.free(3);
        assert!(matches!(result, Err(PoolError::BlockAlreadyFree(3))));
        assert!(result.unwrap_err().is_precondition_violation());
    }

    #[test]
    fn test_invalid_block_id() {
        let mut pool = scenario_pool();

        assert!(matches!(
            pool.allocate(4),
            Err(PoolError::InvalidBlockId { block: 4, len: 4 })
        ));
        assert!(matches!(
            pool.free(100),
            Err(PoolError::InvalidBlockId { .. })
        ));
    }

    #[test]
    fn test_free_and_allocated_listing() {
        let mut pool = scenario_pool();
        pool.allocate(1).unwrap();
        pool.allocate(3).unwrap();

        assert_eq!(pool.free_blocks(), vec![0, 2]);
        assert_eq!(pool.allocated_blocks(), vec![1, 3]);
        assert_eq!(pool.free_blocks_with_pages(), vec![(0, 5), (2, 5)]);
        assert_eq!(pool.allocated_blocks_with_pages(), vec![(1, 10), (3, 20)]);
        assert_eq!(pool.num_pages_free(), 10);
        assert_eq!(pool.num_pages_allocated(), 30);
        assert_eq!(pool.total_pages(), 40);
    }

    #[test]
    fn test_page_address() {
        let pool = scenario_pool();
        assert_eq!(pool.page_address(0).unwrap(), 0);
        assert_eq!(pool.page_address(1).unwrap(), 5);
        assert_eq!(pool.page_address(3).unwrap(), 20);
        assert!(pool.page_address(4).is_err());
    }

    #[test]
    fn test_defragment_groups_free_first() {
        let mut pool = BlockPool::from_parts(
            vec![1, 2, 3, 4, 5],
            vec![true, false, true, false, true],
        );

        assert!(pool.defragment());
        assert_eq!(pool.available(), &[true, true, true, false, false]);
        // Stable within each group
        assert_eq!(pool.pages(), &[1, 3, 5, 2, 4]);
        assert!(pool.is_grouped());
    }

    #[test]
    fn test_defragment_idempotent() {
        let mut pool = BlockPool::from_parts(
            vec![4, 8, 15, 16, 23, 42],
            vec![false, true, false, true, true, false],
        );

        pool.defragment();
        let once = pool.clone();
        assert!(!pool.defragment());
        assert_eq!(pool, once);
    }

    #[test]
    fn test_reset_keeps_pages() {
        let mut pool = BlockPool::new(20, Some(3)).unwrap();
        let pages = pool.pages().to_vec();
        for b in [0, 5, 7] {
            pool.allocate(b).unwrap();
        }

        pool.reset();
        assert_eq!(pool.num_free(), 20);
        assert_eq!(pool.pages(), pages.as_slice());
    }
}
