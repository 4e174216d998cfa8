//! Error types for gridloop

use thiserror::Error;

/// Result type alias for gridloop operations
pub type Result<T> = std::result::Result<T, Error>;

/// gridloop error type
#[derive(Error, Debug)]
pub enum Error {
    // Frame buffer errors
    #[error("Invalid buffer capacity: must be greater than zero")]
    InvalidCapacity,

    #[error("Frame index {index} out of range (frame count {count})")]
    OutOfRange { index: usize, count: usize },

    // Capture slot errors
    #[error("Capture slot holds no buffer (already taken)")]
    NoBuffer,

    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    // Playback errors
    #[error("Playback exhausted: loop has no frames")]
    Exhausted,

    #[error("Playback index {index} out of bounds (total frames {total})")]
    OutOfBounds { index: usize, total: usize },

    // Junction / compositor errors
    #[error("Attach failed: {0}")]
    AttachFailed(String),

    #[error("Branch {0} not found")]
    BranchNotFound(u64),

    #[error("Producer {0} not found")]
    ProducerNotFound(u64),

    #[error("Cell {0} already has a producer attached")]
    CellOccupied(u32),

    #[error("Invalid key number: {0}")]
    InvalidKey(u32),

    #[error("Invalid cell number: {0}")]
    InvalidCell(u32),

    #[error("Unsupported frame format: {0}")]
    UnsupportedFormat(String),

    // Source errors
    #[error("Frame source error: {0}")]
    Source(String),

    #[error("Frame source ended")]
    SourceEnded,

    // General errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error only affects one key's transition
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::AttachFailed(_)
                | Error::CellOccupied(_)
                | Error::AllocationFailed(_)
                | Error::BranchNotFound(_)
                | Error::ProducerNotFound(_)
        )
    }

    /// Check if this error signals a broken internal invariant
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::OutOfBounds { .. } | Error::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_failures_are_recoverable() {
        assert!(Error::AttachFailed("tee exhausted".into()).is_recoverable());
        assert!(Error::CellOccupied(3).is_recoverable());
        assert!(!Error::InvalidCapacity.is_recoverable());
    }

    #[test]
    fn test_out_of_bounds_is_invariant_violation() {
        let err = Error::OutOfBounds { index: 4, total: 4 };
        assert!(err.is_invariant_violation());
        assert_eq!(
            err.to_string(),
            "Playback index 4 out of bounds (total frames 4)"
        );
    }
}
