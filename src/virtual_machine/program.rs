//! Typed construction of code streams.
//!
//! [`ProgramBuilder`] has one method per instruction, generated from the
//! instruction table in [`isa`](super::isa), so operand order and count
//! always match what the CPU decodes. It produces the plain word stream the
//! CPU executes; there is no textual or on-disk program format.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, OperandKind};
use crate::virtual_machine::operand::{Register, Word};
use crate::virtual_machine::vm::BranchTargets;

/// Incrementally emits instructions into a code stream.
///
/// Branch methods take the true index of the destination opcode and encode it
/// with the builder's [`BranchTargets`] convention.
#[derive(Clone, Debug, Default)]
pub struct ProgramBuilder {
    code: Vec<Word>,
    branch_targets: BranchTargets,
}

macro_rules! define_builder {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal, $method:ident => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        #[allow(clippy::should_implement_trait)]
        impl ProgramBuilder {
            $(
                $(#[$doc])*
                pub fn $method(&mut self, $( $field: define_builder!(@ty $kind) ),*) -> &mut Self {
                    self.code.push(Instruction::$name.opcode());
                    $( define_builder!(@emit self, $kind, $field); )*
                    self
                }
            )*
        }
    };

    // ---------- types ----------
    (@ty Reg)    => { Register };
    (@ty Imm)    => { Word };
    (@ty Target) => { usize };

    // ---------- encoding ----------
    (@emit $b:ident, Reg, $v:ident) => {
        $b.code.push($v.to_word())
    };

    (@emit $b:ident, Imm, $v:ident) => {
        $b.code.push($v)
    };

    (@emit $b:ident, Target, $v:ident) => {
        $b.code.push($b.branch_targets.encode($v))
    };
}

crate::for_each_instruction!(define_builder);

impl ProgramBuilder {
    /// Creates a builder using [`BranchTargets::Exact`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder that encodes branch targets with `branch_targets`.
    pub fn with_branch_targets(branch_targets: BranchTargets) -> Self {
        Self {
            code: Vec::new(),
            branch_targets,
        }
    }

    /// Index the next emitted instruction will occupy.
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Appends a raw word, bypassing the instruction table.
    pub fn raw(&mut self, word: Word) -> &mut Self {
        self.code.push(word);
        self
    }

    /// Rewrites the target of the branch whose opcode sits at `branch`, for
    /// jumps emitted before their destination was known.
    pub fn patch_branch(&mut self, branch: usize, destination: usize) -> Result<(), VMError> {
        let size = self.code.len();
        let opcode = *self
            .code
            .get(branch)
            .ok_or(VMError::CodeOutOfBounds { index: branch, size })?;
        let instr = Instruction::decode(opcode, branch)?;
        if !matches!(instr.operands(), [OperandKind::Target]) {
            return Err(VMError::InvalidInstruction {
                opcode,
                offset: branch,
            });
        }
        let slot = self
            .code
            .get_mut(branch + 1)
            .ok_or(VMError::CodeOutOfBounds {
                index: branch + 1,
                size,
            })?;
        *slot = self.branch_targets.encode(destination);
        Ok(())
    }

    /// Returns the emitted code stream.
    pub fn build(&self) -> Vec<Word> {
        self.code.clone()
    }
}
