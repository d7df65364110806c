//! Core block pool implementation

pub mod allocator;
pub mod config;
pub mod defrag;
pub mod error;
pub mod fragmentation;
pub mod pool;
pub mod recording;
pub mod requests;
pub mod simulation;
pub mod sink;
pub mod sweep;
