// Crumb - a byte-addressed stack machine runtime

pub mod isa;
pub mod memory;
pub mod number;
pub mod utils;
pub mod vm;

pub use isa::{InstructionSet, Op};
pub use memory::{Memory, MemoryError, MAX_MEMORY_SIZE};
pub use number::{Interpretation, Number, NumberType};
pub use vm::{StepRecorder, Vm, VmConfig, VmError, VmResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
