//! Register-based bytecode virtual machine.
//!
//! A [`vm::Cpu`] executes a flat stream of `f64` words against a
//! [`memory::Memory`] until it reaches `HLT` or faults.
//!
//! # Architecture
//!
//! - **Registers**: 8 integer registers `R0..R7` (`i64`) and 8 floating
//!   registers `D0..D7` (`f64`), addressed by a unified index `0..=15`
//! - **Flags**: `zero`, `negative` and `overflow`, rewritten by moves,
//!   arithmetic, loads, stores and compares
//! - **Instruction format**: one opcode word followed by a fixed number of
//!   operand words per opcode, defined once in [`isa`]
//! - **Memory**: read-only code words plus a caller-provided byte buffer
//!
//! # Modules
//!
//! - [`errors`]: Execution fault type
//! - [`isa`]: Instruction table, opcode mappings and disassembly
//! - [`memory`]: Code stream and rwmem storage
//! - [`operand`]: Register handles and operand values
//! - [`program`]: Typed program builder
//! - [`vm`]: CPU engine, register file, flags and options

pub mod errors;
pub mod isa;
pub mod memory;
pub mod operand;
pub mod program;
pub mod vm;
