//! Request handling against a block pool
//!
//! The allocator is stateless apart from its fit policy and optional sink. It
//! borrows the pool for each request and never keeps block indices between
//! calls, since defragmentation renumbers blocks.

pub mod fit;

pub use fit::FitPolicy;

use crate::error::Result;
use crate::pool::BlockPool;
use crate::requests::{Request, RequestKind};
use crate::sink::{Event, EventSink};
use std::fmt;
use tracing::debug;

/// Outcome of one request
///
/// Region sizes are page sums. `before`/`after` are only set for successful
/// allocations; `after` is `None` when the block was alone in its free region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationResult {
    pub kind: RequestKind,
    pub success: bool,
    pub block: Option<usize>,
    pub pages: u32,
    pub start_offset: Option<u64>,
    pub before: Option<u64>,
    pub after: Option<(u64, u64)>,
}

impl AllocationResult {
    /// No free block could satisfy `pages`
    pub fn failure(kind: RequestKind, pages: u32) -> Self {
        AllocationResult {
            kind,
            success: false,
            block: None,
            pages,
            start_offset: None,
            before: None,
            after: None,
        }
    }
}

/// Fit-policy allocator with an optional event sink
pub struct Allocator {
    policy: FitPolicy,
    sink: Option<Box<dyn EventSink + Send>>,
}

impl Allocator {
    pub fn new(policy: FitPolicy) -> Self {
        Allocator { policy, sink: None }
    }

    /// Attach a sink that receives one request and one result event per call
    pub fn with_sink(mut self, sink: impl EventSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn policy(&self) -> FitPolicy {
        self.policy
    }

    /// Handle one request
    ///
    /// A request no free block can satisfy is not an error: it yields a
    /// result with `success == false` and leaves the pool unchanged.
    ///
    /// # Errors
    ///
    /// `InvalidSize` for a zero target, `InvalidBlockId` for an out-of-range
    /// block, and the pool's precondition errors for freeing a free block.
    pub fn handle(&mut self, pool: &mut BlockPool, request: &Request) -> Result<AllocationResult> {
        let pages = match *request {
            Request::Allocate { pages } => pages,
            Request::Free { block } => pool.pages_of(block)?,
            Request::MeToo {
                candidate,
                reference,
            } => {
                debug!(
                    "MeToo request for block {} (reference block {}, free={:?})",
                    candidate,
                    reference,
                    pool.is_free(reference).ok()
                );
                pool.pages_of(candidate)?
            }
        };
        self.emit(&Event::Request { request, pages });

        let outcome = match *request {
            Request::Free { block } => self.free(pool, block, pages),
            _ => self.allocate(pool, request.kind(), pages),
        };

        // Every emitted request is followed by exactly one result
        match outcome {
            Ok(result) => {
                self.emit(&Event::Result(&result));
                Ok(result)
            }
            Err(e) => {
                self.emit(&Event::Result(&AllocationResult::failure(
                    request.kind(),
                    pages,
                )));
                Err(e)
            }
        }
    }

    fn allocate(
        &self,
        pool: &mut BlockPool,
        kind: RequestKind,
        pages: u32,
    ) -> Result<AllocationResult> {
        let block = match self.policy.select(pool, pages)? {
            Some(block) => block,
            None => {
                debug!("No {} block for {} pages", self.policy, pages);
                return Ok(AllocationResult::failure(kind, pages));
            }
        };

        let start_offset = pool.page_address(block)?;
        let split = pool.allocate(block)?;
        debug!(
            "Allocated block {} ({} pages) at page {}",
            block,
            pool.pages()[block],
            start_offset
        );

        Ok(AllocationResult {
            kind,
            success: true,
            block: Some(block),
            pages: pool.pages()[block],
            start_offset: Some(start_offset),
            before: Some(split.before),
            after: split.after,
        })
    }

    fn free(&self, pool: &mut BlockPool, block: usize, pages: u32) -> Result<AllocationResult> {
        let start_offset = pool.page_address(block)?;
        pool.free(block)?;
        debug!("Freed block {} ({} pages)", block, pages);

        Ok(AllocationResult {
            kind: RequestKind::Free,
            success: true,
            block: Some(block),
            pages,
            start_offset: Some(start_offset),
            before: None,
            after: None,
        })
    }

    fn emit(&mut self, event: &Event<'_>) {
        if let Some(sink) = self.sink.as_mut() {
            sink.record(event);
        }
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("policy", &self.policy)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoolError;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<String>>>);

    impl EventSink for Capture {
        fn record(&mut self, event: &Event<'_>) {
            self.0.lock().unwrap().push(event.to_string());
        }
    }

    fn scenario_pool() -> BlockPool {
        BlockPool::from_pages(vec![5, 10, 5, 20]).unwrap()
    }

    #[test]
    fn test_allocate_reports_regions() {
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::FirstFit);

        let result = alloc
            .handle(&mut pool, &Request::Allocate { pages: 6 })
            .unwrap();

        assert!(result.success);
        assert_eq!(result.block, Some(1));
        assert_eq!(result.pages, 10);
        assert_eq!(result.start_offset, Some(5));
        assert_eq!(result.before, Some(40));
        assert_eq!(result.after, Some((5, 25)));
        assert_eq!(pool.num_allocated(), 1);
    }

    #[test]
    fn test_no_fit_is_not_an_error() {
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::BestFit);

        let before = pool.clone();
        let result = alloc
            .handle(&mut pool, &Request::Allocate { pages: 25 })
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.block, None);
        assert_eq!(pool, before);
    }

    #[test]
    fn test_best_fit_policy() {
        let mut pool = BlockPool::from_pages(vec![20, 12, 8, 15]).unwrap();
        let mut alloc = Allocator::new(FitPolicy::BestFit);

        let result = alloc
            .handle(&mut pool, &Request::Allocate { pages: 9 })
            .unwrap();
        assert_eq!(result.block, Some(1));
    }

    #[test]
    fn test_free_has_no_region_sizes() {
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::FirstFit);
        alloc
            .handle(&mut pool, &Request::Allocate { pages: 20 })
            .unwrap();

        let result = alloc.handle(&mut pool, &Request::Free { block: 3 }).unwrap();
        assert!(result.success);
        assert_eq!(result.kind, RequestKind::Free);
        assert_eq!(result.pages, 20);
        assert_eq!(result.before, None);
        assert_eq!(result.after, None);
        assert_eq!(pool.num_free(), 4);
    }

    #[test]
    fn test_double_free_surfaces_error() {
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::FirstFit);

        let result = alloc.handle(&mut pool, &Request::Free { block: 2 });
        assert!(matches!(result, Err(PoolError::BlockAlreadyFree(2))));
    }

    #[test]
    fn test_failed_request_still_emits_result() {
        let capture = Capture::default();
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::FirstFit).with_sink(capture.clone());

        let result = alloc.handle(&mut pool, &Request::Free { block: 0 });
        assert!(matches!(result, Err(PoolError::BlockAlreadyFree(0))));

        let lines = capture.0.lock().unwrap().clone();
        assert_eq!(
            lines,
            vec![
                "Request: Free(block=0, pages=5)".to_string(),
                "Result: Failure(pages=5)".to_string(),
            ]
        );
    }

    #[test]
    fn test_unresolvable_request_emits_nothing() {
        let capture = Capture::default();
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::FirstFit).with_sink(capture.clone());

        let result = alloc.handle(&mut pool, &Request::Free { block: 9 });
        assert!(matches!(result, Err(PoolError::InvalidBlockId { .. })));
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_me_too_uses_candidate_size() {
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::BestFit);
        pool.allocate(0).unwrap();

        // Candidate 3 has 20 pages, so only block 3 fits
        let result = alloc
            .handle(
                &mut pool,
                &Request::MeToo {
                    candidate: 3,
                    reference: 0,
                },
            )
            .unwrap();
        assert_eq!(result.kind, RequestKind::MeToo);
        assert_eq!(result.block, Some(3));
    }

    #[test]
    fn test_me_too_invalid_candidate() {
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::FirstFit);

        let result = alloc.handle(
            &mut pool,
            &Request::MeToo {
                candidate: 9,
                reference: 0,
            },
        );
        assert!(matches!(result, Err(PoolError::InvalidBlockId { .. })));
    }

    #[test]
    fn test_zero_size_allocate_rejected() {
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::FirstFit);

        let result = alloc.handle(&mut pool, &Request::Allocate { pages: 0 });
        assert!(matches!(result, Err(PoolError::InvalidSize(0))));
    }

    #[test]
    fn test_sink_receives_request_and_result() {
        let capture = Capture::default();
        let lines = Arc::clone(&capture.0);
        let mut pool = scenario_pool();
        let mut alloc = Allocator::new(FitPolicy::FirstFit).with_sink(capture);

        alloc
            .handle(&mut pool, &Request::Allocate { pages: 6 })
            .unwrap();
        alloc.handle(&mut pool, &Request::Free { block: 1 }).unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                "Request: Allocate(pages=6)".to_string(),
                "Result: Success(block=1, start=5, pages=10, before=40, after=(5,25))".to_string(),
                "Request: Free(block=1, pages=10)".to_string(),
                "Result: Success(block=1, start=5, pages=10)".to_string(),
            ]
        );
    }
}
