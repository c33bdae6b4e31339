use crate::virtual_machine::operand::{BANK_SIZE, Register, Value};
use std::fmt;

/// Register file with one integer bank and one floating bank.
///
/// Both banks are zero-initialized and fixed in size for the life of the CPU.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegisterFile {
    ints: [i64; BANK_SIZE],
    floats: [f64; BANK_SIZE],
}

impl RegisterFile {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value held by `reg`, tagged with its bank.
    pub fn get(&self, reg: Register) -> Value {
        match reg {
            Register::Int(_) => Value::Int(self.ints[reg.slot()]),
            Register::Float(_) => Value::Float(self.floats[reg.slot()]),
        }
    }

    /// Stores `value` into `reg`, converting it to the register's bank.
    ///
    /// Returns the value as actually stored, which is what flags are computed from.
    pub fn set(&mut self, reg: Register, value: Value) -> Value {
        let stored = value.coerce_to(reg);
        match stored {
            Value::Int(v) => self.ints[reg.slot()] = v,
            Value::Float(v) => self.floats[reg.slot()] = v,
        }
        stored
    }

    /// Integer register `R<n>`. Panics if `n >= 8`.
    pub fn int(&self, n: usize) -> i64 {
        self.ints[n]
    }

    /// Floating register `D<n>`. Panics if `n >= 8`.
    pub fn float(&self, n: usize) -> f64 {
        self.floats[n]
    }

    pub fn ints(&self) -> &[i64; BANK_SIZE] {
        &self.ints
    }

    pub fn floats(&self) -> &[f64; BANK_SIZE] {
        &self.floats
    }

    /// Zeroes both banks.
    pub fn clear(&mut self) {
        self.ints = [0; BANK_SIZE];
        self.floats = [0.0; BANK_SIZE];
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[REGISTERS]")?;
        for (i, v) in self.ints.iter().enumerate() {
            writeln!(f, "R{i}: {v}")?;
        }
        for (i, v) in self.floats.iter().enumerate() {
            writeln!(f, "D{i}: {v:.15}")?;
        }
        Ok(())
    }
}
