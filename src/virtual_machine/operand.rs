//! Operand types: code words, register handles, and resolved values.

use crate::virtual_machine::errors::VMError;
use std::cmp::Ordering;
use std::fmt;

/// A single code-stream word. Opcodes, register indices, immediates and
/// branch targets are all encoded as words.
pub type Word = f64;

/// Number of registers in each bank.
pub const BANK_SIZE: usize = 8;

/// Handle to one register of either bank.
///
/// On the wire a register is a single index in `0..=15`: `0..=7` select the
/// integer bank, `8..=15` select the floating bank at `index - 8`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Register {
    /// 64-bit signed integer register `R<n>`.
    Int(u8),
    /// Double-precision floating register `D<n>`.
    Float(u8),
}

pub const R0: Register = Register::Int(0);
pub const R1: Register = Register::Int(1);
pub const R2: Register = Register::Int(2);
pub const R3: Register = Register::Int(3);
pub const R4: Register = Register::Int(4);
pub const R5: Register = Register::Int(5);
pub const R6: Register = Register::Int(6);
pub const R7: Register = Register::Int(7);
pub const D0: Register = Register::Float(0);
pub const D1: Register = Register::Float(1);
pub const D2: Register = Register::Float(2);
pub const D3: Register = Register::Float(3);
pub const D4: Register = Register::Float(4);
pub const D5: Register = Register::Float(5);
pub const D6: Register = Register::Float(6);
pub const D7: Register = Register::Float(7);

impl Register {
    /// Resolves a unified register index.
    pub const fn from_index(index: u8) -> Option<Register> {
        match index {
            0..=7 => Some(Register::Int(index)),
            8..=15 => Some(Register::Float(index - 8)),
            _ => None,
        }
    }

    /// Returns the unified index of this register.
    pub const fn index(self) -> u8 {
        match self {
            Register::Int(n) => n,
            Register::Float(n) => n + BANK_SIZE as u8,
        }
    }

    /// Returns the slot within the register's own bank.
    pub const fn slot(self) -> usize {
        match self {
            Register::Int(n) | Register::Float(n) => n as usize,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Register::Float(_))
    }

    /// Decodes a register operand word found at `offset` in the code stream.
    pub(crate) fn decode(word: Word, offset: usize) -> Result<Register, VMError> {
        let invalid = VMError::InvalidRegister { word, offset };
        if word.fract() != 0.0 || !(0.0..16.0).contains(&word) {
            return Err(invalid);
        }
        Register::from_index(word as u8).ok_or(invalid)
    }

    /// Encodes the register as a code word.
    pub const fn to_word(self) -> Word {
        self.index() as Word
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Int(n) => write!(f, "R{n}"),
            Register::Float(n) => write!(f, "D{n}"),
        }
    }
}

/// Resolved content of a register or an immediate operand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    /// Decodes an immediate word. Integral words that fit in `i64` become
    /// [`Value::Int`], everything else stays floating. `-0.0` stays floating
    /// so its sign survives a load into the floating bank.
    pub fn from_immediate(word: Word) -> Value {
        // 2^63 is exactly representable; i64::MAX is not.
        const UPPER: f64 = 9_223_372_036_854_775_808.0;
        let negative_zero = word == 0.0 && word.is_sign_negative();
        if !negative_zero && word.fract() == 0.0 && word >= i64::MIN as f64 && word < UPPER {
            Value::Int(word as i64)
        } else {
            Value::Float(word)
        }
    }

    /// Widens to `f64`.
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    /// Narrows to `i64`, truncating toward zero. Out-of-range floats
    /// saturate and NaN becomes 0.
    pub fn as_i64(self) -> i64 {
        match self {
            Value::Int(v) => v,
            Value::Float(v) => v as i64,
        }
    }

    /// Converts into the representation held by `register`'s bank.
    pub fn coerce_to(self, register: Register) -> Value {
        match register {
            Register::Int(_) => Value::Int(self.as_i64()),
            Register::Float(_) => Value::Float(self.as_f64()),
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Value::Int(v) => v == 0,
            Value::Float(v) => v == 0.0,
        }
    }

    pub fn is_negative(self) -> bool {
        match self {
            Value::Int(v) => v < 0,
            Value::Float(v) => v < 0.0,
        }
    }

    /// Three-way comparison. Integers compare exactly; any floating operand
    /// compares both sides as `f64`. Returns `None` when unordered (NaN).
    pub fn compare(self, other: Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }

    /// Low byte of the truncated integer value.
    pub fn low_byte(self) -> u8 {
        self.as_i64() as u8
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}
