use thiserror::Error;

use crate::memory::{MemoryError, MAX_MEMORY_SIZE};

/// Fatal machine faults. Normal termination via `halt` is not an error;
/// `run` returns the halt status directly.
#[derive(Error, Debug)]
pub enum VmError {
    #[error("segmentation fault at {address}: {reason}")]
    Segfault { address: usize, reason: String },

    #[error("division by zero at {address}")]
    DivisionByZero { address: usize },

    #[error("program of {0} bytes exceeds the maximum of {MAX_MEMORY_SIZE}")]
    ProgramTooLarge(usize),

    #[error("memory of {0} bytes exceeds the maximum of {MAX_MEMORY_SIZE}")]
    MemoryTooLarge(usize),
}

impl From<MemoryError> for VmError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::OutOfRange { address, length, size } => VmError::Segfault {
                address,
                reason: format!("{} byte access outside {} bytes of memory", length, size),
            },
            MemoryError::TooLarge(size) => VmError::MemoryTooLarge(size),
        }
    }
}

/// Result type for machine operations.
pub type VmResult<T> = Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segfault_display() {
        let error = VmError::Segfault {
            address: 42,
            reason: "undefined opcode 0".to_string(),
        };
        assert_eq!(error.to_string(), "segmentation fault at 42: undefined opcode 0");
    }

    #[test]
    fn test_out_of_range_converts_to_segfault() {
        let memory_error = MemoryError::OutOfRange {
            address: 100,
            length: 4,
            size: 64,
        };
        match VmError::from(memory_error) {
            VmError::Segfault { address: 100, .. } => {}
            other => panic!("expected Segfault, got {:?}", other),
        }
    }

    #[test]
    fn test_too_large_converts_to_memory_too_large() {
        let memory_error = MemoryError::TooLarge(70_000);
        match VmError::from(memory_error) {
            VmError::MemoryTooLarge(70_000) => {}
            other => panic!("expected MemoryTooLarge, got {:?}", other),
        }
    }
}
