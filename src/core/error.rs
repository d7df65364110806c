use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid size: {0} (must be at least 1 page)")]
    InvalidSize(u32),

    #[error("Invalid threshold: {0} (must be 0-1, inclusive)")]
    InvalidThreshold(f64),

    #[error("Invalid block ID: {block} (pool has {len} blocks)")]
    InvalidBlockId { block: usize, len: usize },

    #[error("Block already allocated: {0}")]
    BlockAlreadyAllocated(usize),

    #[error("Block already free: {0}")]
    BlockAlreadyFree(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Recording is empty: no fragmentation scores to summarize")]
    EmptyRecording,

    #[error("Sweep worker panicked")]
    WorkerPanicked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl PoolError {
    /// True for errors caused by a caller breaking the allocate/free contract
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            PoolError::BlockAlreadyAllocated(_) | PoolError::BlockAlreadyFree(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
