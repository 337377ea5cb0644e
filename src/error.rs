//! Error types for blockmul operations.
//!
//! Scheduling never panics on resource exhaustion: failures are returned as
//! values so a trial can continue in a degraded state and report it.

use std::fmt;

use crate::partition::BlockCoordinate;

/// Errors that can occur while partitioning, scheduling or verifying a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockmulError {
    /// The execution substrate could not start a task for a block.
    TaskCreationFailure {
        /// The block whose partial product was skipped.
        coordinate: Option<BlockCoordinate>,
        /// Human-readable error message.
        message: String,
    },
    /// Operands are not square or not the same size.
    DimensionMismatch {
        /// The size every operand was expected to have.
        expected: usize,
        /// The offending size.
        found: usize,
        /// Human-readable error message.
        message: String,
    },
    /// Input validation error.
    ValidationError {
        /// Human-readable error message.
        message: String,
    },
}

impl fmt::Display for BlockmulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockmulError::TaskCreationFailure {
                coordinate: Some(coordinate),
                message,
            } => write!(
                f,
                "Task creation failed for block {}: {}",
                coordinate, message
            ),
            BlockmulError::TaskCreationFailure {
                coordinate: None,
                message,
            } => write!(f, "Task creation failed: {}", message),
            BlockmulError::DimensionMismatch {
                expected,
                found,
                message,
            } => write!(
                f,
                "Dimension mismatch: {} (expected {}, found {})",
                message, expected, found
            ),
            BlockmulError::ValidationError { message } => {
                write!(f, "Validation error: {}", message)
            }
        }
    }
}

impl std::error::Error for BlockmulError {}

/// Result type alias for blockmul operations.
pub type Result<T> = std::result::Result<T, BlockmulError>;

/// Creates a task creation failure for a single block.
pub fn task_creation_failure(
    coordinate: Option<BlockCoordinate>,
    message: impl Into<String>,
) -> BlockmulError {
    BlockmulError::TaskCreationFailure {
        coordinate,
        message: message.into(),
    }
}

/// Creates a dimension mismatch error.
pub fn dimension_mismatch(
    expected: usize,
    found: usize,
    message: impl Into<String>,
) -> BlockmulError {
    BlockmulError::DimensionMismatch {
        expected,
        found,
        message: message.into(),
    }
}

/// Creates a validation error.
pub fn validation_error(message: impl Into<String>) -> BlockmulError {
    BlockmulError::ValidationError {
        message: message.into(),
    }
}

impl BlockmulError {
    /// Returns `true` for errors that degrade a trial instead of aborting it.
    pub fn is_degrading(&self) -> bool {
        matches!(self, BlockmulError::TaskCreationFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation_failure_display() {
        let coordinate = BlockCoordinate::new(0, 1, 1, 2, 4);
        let error = task_creation_failure(Some(coordinate), "resource temporarily unavailable");
        let display = format!("{}", error);
        assert!(display.contains("Task creation failed"));
        assert!(display.contains("(0, 1, 1, 2; k=4)"));
        assert!(display.contains("resource temporarily unavailable"));
    }

    #[test]
    fn test_task_creation_failure_without_coordinate() {
        let error = task_creation_failure(None, "pool build failed");
        assert_eq!(format!("{}", error), "Task creation failed: pool build failed");
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let error = dimension_mismatch(32, 16, "operand B has the wrong size");
        let display = format!("{}", error);
        assert!(display.contains("Dimension mismatch"));
        assert!(display.contains("expected 32"));
        assert!(display.contains("found 16"));
        assert!(display.contains("operand B has the wrong size"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = validation_error("block size must be at least 1");
        let display = format!("{}", error);
        assert!(display.contains("Validation error"));
        assert!(display.contains("block size must be at least 1"));
    }

    #[test]
    fn test_only_task_creation_degrades() {
        assert!(task_creation_failure(None, "x").is_degrading());
        assert!(!dimension_mismatch(1, 2, "x").is_degrading());
        assert!(!validation_error("x").is_degrading());
    }

    #[test]
    fn test_error_trait_implementation() {
        let error = validation_error("test error");
        let _: &dyn std::error::Error = &error;
        assert!(std::error::Error::source(&error).is_none());
    }
}
