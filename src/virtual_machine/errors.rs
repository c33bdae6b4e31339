use crate::virtual_machine::operand::{Register, Value, Word};
use thiserror::Error;

/// Faults raised while decoding or executing a program.
///
/// Every fault halts the run; the CPU never retries or skips an instruction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VMError {
    /// Opcode word that is not part of the instruction set.
    #[error("invalid instruction {opcode} at offset {offset}")]
    InvalidInstruction { opcode: Word, offset: usize },
    /// Register operand that is non-integral or outside `0..=15`.
    #[error("invalid register operand {word} at offset {offset}")]
    InvalidRegister { word: Word, offset: usize },
    /// Branch target that does not resolve to a code index.
    #[error("invalid branch target {word} at offset {offset}")]
    InvalidBranchTarget { word: Word, offset: usize },
    /// Integer-only instruction given a floating-bank register.
    #[error("{instruction} can only operate on integer registers, got {register}")]
    IllegalOperand {
        instruction: &'static str,
        register: Register,
    },
    /// Code stream read past its end.
    #[error("code index {index} out of bounds (code size {size})")]
    CodeOutOfBounds { index: usize, size: usize },
    /// rwmem access outside the configured region.
    #[error("rwmem address {address} out of bounds (rwmem size {size})")]
    MemoryOutOfBounds { address: Value, size: usize },
    /// Integer destination divided by zero.
    #[error("division by zero at offset {offset}")]
    DivisionByZero { offset: usize },
    /// Configured step limit reached before the program halted.
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },
}
