//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction table and invokes a callback macro for code
//! generation, so the opcode numbering, mnemonics and operand layout live in
//! exactly one place.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - Opcode decoding from code words
//! - Per-instruction operand layout, which drives the program counter advance
//!
//! See [`program`](super::program) for the typed program builder generated
//! from the same table.
//!
//! # Bytecode Format
//!
//! A program is a flat sequence of `f64` words with no header:
//! - Opcode: 1 word, integral
//! - Register operand: 1 word, unified index `0..=15`
//! - Immediate: 1 word, any value
//! - Branch target: 1 word, absolute code index (see
//!   [`BranchTargets`](super::vm::BranchTargets))

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::{Register, Value, Word};

/// Largest operand count of any instruction.
pub const MAX_OPERANDS: usize = 2;

/// Invokes a callback macro with the complete instruction definition list.
///
/// Each entry is `Name = opcode, "MNEMONIC", builder_method => [operands]`.
/// Opcode numbers are part of the bytecode format and must not change.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Moves
            // =========================
            /// MOV dst, src ; dst = src (converted to dst's bank)
            Mov = 0, "MOV", mov => [dst: Reg, src: Reg],
            /// MOVI dst, imm ; dst = imm
            Movi = 1, "MOVI", movi => [dst: Reg, imm: Imm],
            // =========================
            // Arithmetic
            // =========================
            /// ADD dst, src ; dst += src
            Add = 2, "ADD", add => [dst: Reg, src: Reg],
            /// ADDI dst, imm ; dst += imm
            Addi = 3, "ADDI", addi => [dst: Reg, imm: Imm],
            /// SUB dst, src ; dst -= src
            Sub = 4, "SUB", sub => [dst: Reg, src: Reg],
            /// SUBI dst, imm ; dst -= imm
            Subi = 5, "SUBI", subi => [dst: Reg, imm: Imm],
            /// MUL dst, src ; dst *= src
            Mul = 6, "MUL", mul => [dst: Reg, src: Reg],
            /// MULI dst, imm ; dst *= imm
            Muli = 7, "MULI", muli => [dst: Reg, imm: Imm],
            /// DIV dst, src ; dst /= src (faults on integer division by zero)
            Div = 8, "DIV", div => [dst: Reg, src: Reg],
            /// DIVI dst, imm ; dst /= imm (faults on integer division by zero)
            Divi = 9, "DIVI", divi => [dst: Reg, imm: Imm],
            // =========================
            // Compare / branch
            // =========================
            /// CMP dst, src ; sets zero/overflow from the three-way comparison
            Cmp = 10, "CMP", cmp => [dst: Reg, src: Reg],
            /// JMP target ; PC = target
            Jmp = 11, "JMP", jmp => [target: Target],
            /// JE target ; if zero then PC = target
            Je = 12, "JE", je => [target: Target],
            /// JNE target ; if !zero then PC = target
            Jne = 13, "JNE", jne => [target: Target],
            /// JLT target ; if !zero && !overflow then PC = target
            Jlt = 14, "JLT", jlt => [target: Target],
            /// JGT target ; if !zero && overflow then PC = target
            Jgt = 15, "JGT", jgt => [target: Target],
            // =========================
            // Load / store
            // =========================
            /// LD dst, src ; dst = rwmem[src]
            Ld = 16, "LD", ld => [dst: Reg, src: Reg],
            /// STR dst, src ; rwmem[dst] = low byte of src
            Str = 17, "STR", str => [dst: Reg, src: Reg],
            // =========================
            // Bitwise / shift (integer bank only)
            // =========================
            /// XOR dst, src ; dst ^= src
            Xor = 18, "XOR", xor => [dst: Reg, src: Reg],
            /// XORI dst, imm ; dst ^= imm
            Xori = 19, "XORI", xori => [dst: Reg, imm: Imm],
            /// SHL dst, src ; dst <<= src
            Shl = 20, "SHL", shl => [dst: Reg, src: Reg],
            /// SHR dst, src ; dst >>= src (logical)
            Shr = 21, "SHR", shr => [dst: Reg, src: Reg],
            /// SHLI dst, imm ; dst <<= imm
            Shli = 22, "SHLI", shli => [dst: Reg, imm: Imm],
            /// SHRI dst, imm ; dst >>= imm (logical)
            Shri = 23, "SHRI", shri => [dst: Reg, imm: Imm],
            // =========================
            // Control
            // =========================
            /// HLT ; stops the CPU
            Hlt = 24, "HLT", hlt => [],
        }
    };
}

/// Kind of a single instruction operand.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperandKind {
    /// Unified register index.
    Reg,
    /// Literal value.
    Imm,
    /// Absolute branch target.
    Target,
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal, $method:ident => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        // =========================
        // VM instruction enum
        // =========================
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Instruction {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value as Word,
                        offset: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the operand layout following the opcode word.
            pub const fn operands(&self) -> &'static [OperandKind] {
                match self {
                    $( Instruction::$name => &[ $( OperandKind::$kind, )* ], )*
                }
            }
        }
    };
}

for_each_instruction!(define_instructions);

impl Instruction {
    /// Decodes the opcode word found at `offset` in the code stream.
    pub fn decode(word: Word, offset: usize) -> Result<Instruction, VMError> {
        let invalid = VMError::InvalidInstruction {
            opcode: word,
            offset,
        };
        if word.fract() != 0.0 || !(0.0..=u8::MAX as Word).contains(&word) {
            return Err(invalid);
        }
        Instruction::try_from(word as u8).map_err(|_| invalid)
    }

    /// Returns the opcode encoded as a code word.
    pub const fn opcode(&self) -> Word {
        *self as u8 as Word
    }

    /// Number of operand words following the opcode.
    pub const fn operand_count(&self) -> usize {
        self.operands().len()
    }

    /// Total instruction width in words, opcode included.
    pub const fn width(&self) -> usize {
        1 + self.operand_count()
    }

    /// Renders the instruction with its raw operand words. Malformed operands
    /// are printed as raw words rather than rejected.
    pub fn render(&self, operands: &[Word]) -> String {
        let rendered: Vec<String> = self
            .operands()
            .iter()
            .zip(operands)
            .map(|(kind, &word)| match kind {
                OperandKind::Reg => match Register::decode(word, 0) {
                    Ok(reg) => reg.to_string(),
                    Err(_) => format!("?{word}"),
                },
                OperandKind::Imm => Value::from_immediate(word).to_string(),
                OperandKind::Target => format!("@{word}"),
            })
            .collect();
        if rendered.is_empty() {
            self.mnemonic().to_string()
        } else {
            format!("{} {}", self.mnemonic(), rendered.join(", "))
        }
    }
}

/// Disassembles a whole code stream, one line per instruction.
///
/// Stops at the first undecodable opcode or truncated instruction.
pub fn disassemble(code: &[Word]) -> Result<Vec<String>, VMError> {
    let mut lines = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let instr = Instruction::decode(code[offset], offset)?;
        let end = offset + instr.width();
        let operands = code.get(offset + 1..end).ok_or(VMError::CodeOutOfBounds {
            index: end - 1,
            size: code.len(),
        })?;
        lines.push(format!("{:04}: {}", offset, instr.render(operands)));
        offset = end;
    }
    Ok(lines)
}
