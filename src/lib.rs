//! XORVM library.
//!
//! A minimal register-based virtual machine with an integer and a floating
//! register bank, a flat `f64` code stream, and a byte-addressable rwmem.

pub mod utils;
pub mod virtual_machine;

pub use virtual_machine::errors::VMError;
pub use virtual_machine::memory::Memory;
pub use virtual_machine::program::ProgramBuilder;
pub use virtual_machine::vm::{Cpu, CpuOps, CpuState};
