//! Allocation requests and the synthetic request stream
//!
//! Each step the stream looks at the pool and samples one request:
//! allocate-only while nothing is allocated, free-only while nothing is free,
//! otherwise a uniform choice among allocate, free and me-too.

use crate::pool::{BlockPool, MIN_PAGES};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt;

/// A single request against the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Allocate any free block of at least `pages` pages
    Allocate { pages: u32 },
    /// Free an allocated block
    Free { block: usize },
    /// Allocate a block the size of `candidate`, issued while `reference` is allocated
    MeToo { candidate: usize, reference: usize },
}

/// Request variant without its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Allocate,
    Free,
    MeToo,
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Allocate { .. } => RequestKind::Allocate,
            Request::Free { .. } => RequestKind::Free,
            Request::MeToo { .. } => RequestKind::MeToo,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Allocate => "Allocate",
            RequestKind::Free => "Free",
            RequestKind::MeToo => "MeToo",
        };
        f.write_str(name)
    }
}

/// Seeded generator of requests
///
/// Block references are sampled from the pool state at the time of the call
/// and are only valid until the pool is mutated or defragmented.
#[derive(Debug, Clone)]
pub struct RequestStream {
    rng: StdRng,
}

impl RequestStream {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RequestStream { rng }
    }

    /// Sample the next request for the current pool state
    pub fn next_request(&mut self, pool: &BlockPool) -> Request {
        debug_assert!(!pool.is_empty(), "request sampled from an empty pool");
        let free = pool.free_blocks();
        let allocated = pool.allocated_blocks();

        match (free.choose(&mut self.rng), allocated.choose(&mut self.rng)) {
            (Some(&block), None) => Self::allocate_like(pool, block),
            (None, Some(&block)) => Request::Free { block },
            (Some(&candidate), Some(&reference)) => match self.rng.gen_range(0..3) {
                0 => Self::allocate_like(pool, candidate),
                1 => Request::Free { block: reference },
                _ => Request::MeToo {
                    candidate,
                    reference,
                },
            },
            // Constructors reject empty pools
            (None, None) => Request::Allocate { pages: MIN_PAGES },
        }
    }

    fn allocate_like(pool: &BlockPool, block: usize) -> Request {
        Request::Allocate {
            pages: pool.pages()[block],
        }
    }
}
