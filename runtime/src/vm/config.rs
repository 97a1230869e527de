//! Machine configuration options.

use crate::memory::MAX_MEMORY_SIZE;

/// Configuration for a [`crate::vm::Vm`] instance.
#[derive(Clone, Debug)]
pub struct VmConfig {
    /// Size of the stack/heap image in bytes, at most 2^16.
    pub memory_size: usize,
    /// Print one line per executed instruction.
    pub trace_enabled: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            memory_size: MAX_MEMORY_SIZE,
            trace_enabled: false,
        }
    }
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_size(mut self, memory_size: usize) -> Self {
        self.memory_size = memory_size;
        self
    }

    pub fn with_trace(mut self, trace_enabled: bool) -> Self {
        self.trace_enabled = trace_enabled;
        self
    }
}
