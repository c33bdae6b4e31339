use crate::virtual_machine::operand::Value;
use std::cmp::Ordering;
use std::fmt;

/// Condition flags. Only the most recent result is kept.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Flags {
    pub zero: bool,
    pub negative: bool,
    pub overflow: bool,
}

impl Flags {
    /// Mutation policy: `zero` and `negative` follow the written value,
    /// `overflow` is left as is.
    pub fn record_value(&mut self, value: Value) {
        self.zero = value.is_zero();
        self.negative = value.is_negative();
    }

    /// Comparison policy: clears all flags, then encodes the outcome in
    /// `zero` and `overflow`. Unordered operands read as less-than.
    pub fn record_comparison(&mut self, ordering: Option<Ordering>) {
        *self = Flags::default();
        match ordering {
            Some(Ordering::Equal) => self.zero = true,
            Some(Ordering::Greater) => self.overflow = true,
            Some(Ordering::Less) | None => {}
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[FLAGS]")?;
        writeln!(f, "ZERO        : {}", self.zero as u8)?;
        writeln!(f, "NEGATIVE    : {}", self.negative as u8)?;
        writeln!(f, "OVERFLOW    : {}", self.overflow as u8)
    }
}

/// Branch condition evaluated against the current flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Condition {
    Always,
    Equal,
    /// Covers both less-than and greater-than, so `overflow` is ignored.
    NotEqual,
    Less,
    Greater,
}

impl Condition {
    pub fn holds(self, flags: &Flags) -> bool {
        match self {
            Condition::Always => true,
            Condition::Equal => flags.zero,
            Condition::NotEqual => !flags.zero,
            Condition::Less => !flags.zero && !flags.overflow,
            Condition::Greater => !flags.zero && flags.overflow,
        }
    }
}
