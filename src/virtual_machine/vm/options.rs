use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::Word;
use std::env;
use std::str::FromStr;

/// How branch target words map to code indices.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BranchTargets {
    /// The target word is the index of the destination opcode.
    #[default]
    Exact,
    /// The target word is one less than the destination opcode index, as in
    /// legacy programs written for a fetch step that incremented the counter
    /// before reading.
    PreIncrement,
}

impl BranchTargets {
    /// Encodes a destination opcode index as a target word.
    pub fn encode(self, destination: usize) -> Word {
        match self {
            BranchTargets::Exact => destination as Word,
            BranchTargets::PreIncrement => destination as Word - 1.0,
        }
    }

    /// Resolves the target word found at `offset` to a destination index.
    pub fn decode(self, word: Word, offset: usize) -> Result<usize, VMError> {
        let index = match self {
            BranchTargets::Exact => word,
            BranchTargets::PreIncrement => word + 1.0,
        };
        if index.fract() != 0.0 || !(0.0..=usize::MAX as Word).contains(&index) {
            return Err(VMError::InvalidBranchTarget { word, offset });
        }
        Ok(index as usize)
    }
}

impl FromStr for BranchTargets {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(BranchTargets::Exact),
            "pre-increment" | "preincrement" | "legacy" => Ok(BranchTargets::PreIncrement),
            other => Err(format!("unknown branch target convention '{other}'")),
        }
    }
}

/// Configuration options for a [`Cpu`](super::Cpu).
#[derive(Clone, Debug, Default)]
pub struct CpuOps {
    /// Branch target encoding expected in the code stream.
    pub branch_targets: BranchTargets,
    /// If set, the run faults after executing this many instructions.
    pub step_limit: Option<u64>,
    /// Log every executed instruction at debug level.
    pub trace: bool,
}

impl CpuOps {
    pub const ENV_STEP_LIMIT: &'static str = "XORVM_STEP_LIMIT";
    pub const ENV_TRACE: &'static str = "XORVM_TRACE";
    pub const ENV_BRANCH_TARGETS: &'static str = "XORVM_BRANCH_TARGETS";

    /// Builds options from `XORVM_*` environment variables, falling back to
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut ops = CpuOps::default();
        if let Some(raw) = lookup(Self::ENV_STEP_LIMIT) {
            let limit = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("{}: {e}", Self::ENV_STEP_LIMIT))?;
            ops.step_limit = Some(limit);
        }
        if let Some(raw) = lookup(Self::ENV_TRACE) {
            ops.trace = matches!(raw.trim(), "1" | "true" | "yes" | "on");
        }
        if let Some(raw) = lookup(Self::ENV_BRANCH_TARGETS) {
            ops.branch_targets = raw.parse()?;
        }
        Ok(ops)
    }
}
