//! Program memory: the code stream and the byte-addressable `rwmem` region.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::{Value, Word};
use std::sync::Arc;

/// Storage handed to a [`Cpu`](super::vm::Cpu) for one run.
///
/// Memory layout:
/// - **code**: read-only word stream mixing opcodes and operands. Shared
///   through an [`Arc`], so several memories can run the same program.
/// - **rwmem**: mutable byte buffer, sized and filled by the caller.
///
/// Neither region is ever resized. Every access is bounds-checked.
#[derive(Clone, Debug)]
pub struct Memory {
    code: Arc<[Word]>,
    rwmem: Vec<u8>,
}

impl Memory {
    /// Creates memory from a code stream and a pre-populated `rwmem` buffer.
    pub fn new(code: impl Into<Arc<[Word]>>, rwmem: Vec<u8>) -> Self {
        Self {
            code: code.into(),
            rwmem,
        }
    }

    /// Creates memory with a zero-filled `rwmem` of `size` bytes.
    pub fn with_rwmem_size(code: impl Into<Arc<[Word]>>, size: usize) -> Self {
        Self::new(code, vec![0; size])
    }

    pub fn code(&self) -> &[Word] {
        &self.code
    }

    /// Returns a handle to the code stream for building another [`Memory`].
    pub fn shared_code(&self) -> Arc<[Word]> {
        Arc::clone(&self.code)
    }

    pub fn rwmem(&self) -> &[u8] {
        &self.rwmem
    }

    pub fn rwmem_mut(&mut self) -> &mut [u8] {
        &mut self.rwmem
    }

    /// Consumes the memory, returning the `rwmem` buffer.
    pub fn into_rwmem(self) -> Vec<u8> {
        self.rwmem
    }

    /// Reads the code word at `index`.
    pub fn word(&self, index: usize) -> Result<Word, VMError> {
        self.code
            .get(index)
            .copied()
            .ok_or(VMError::CodeOutOfBounds {
                index,
                size: self.code.len(),
            })
    }

    /// Reads `count` consecutive code words starting at `start`.
    pub fn words(&self, start: usize, count: usize) -> Result<&[Word], VMError> {
        let size = self.code.len();
        let end = start
            .checked_add(count)
            .ok_or(VMError::CodeOutOfBounds { index: start, size })?;
        self.code.get(start..end).ok_or(VMError::CodeOutOfBounds {
            index: start.max(size),
            size,
        })
    }

    /// Reads the byte at `address`.
    pub fn read_byte(&self, address: Value) -> Result<u8, VMError> {
        let index = self.resolve_address(address)?;
        Ok(self.rwmem[index])
    }

    /// Writes `byte` at `address`.
    pub fn write_byte(&mut self, address: Value, byte: u8) -> Result<(), VMError> {
        let index = self.resolve_address(address)?;
        self.rwmem[index] = byte;
        Ok(())
    }

    /// Maps a register value to an `rwmem` index. Floating addresses are
    /// truncated; negative, non-finite or too-large addresses fault.
    fn resolve_address(&self, address: Value) -> Result<usize, VMError> {
        let size = self.rwmem.len();
        let out_of_bounds = VMError::MemoryOutOfBounds { address, size };
        let index = match address {
            Value::Int(v) => v,
            Value::Float(v) if v.is_finite() => v.trunc() as i64,
            Value::Float(_) => return Err(out_of_bounds),
        };
        match usize::try_from(index) {
            Ok(i) if i < size => Ok(i),
            _ => Err(out_of_bounds),
        }
    }
}
