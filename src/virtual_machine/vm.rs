//! CPU engine: fetch, decode, dispatch, and the instruction handlers.
//!
//! The CPU owns its program counter, register file and flags, and mutably
//! borrows a [`Memory`] for as long as it lives. Execution is synchronous: each
//! [`Cpu::step`] runs exactly one instruction, and [`Cpu::run`] steps until the
//! program halts or faults. The first fault halts the CPU and is returned.

mod flags;
mod options;
mod registers;


pub use flags::{Condition, Flags};
pub use options::{BranchTargets, CpuOps};
pub use registers::RegisterFile;

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, MAX_OPERANDS};
use crate::virtual_machine::memory::Memory;
use crate::virtual_machine::operand::{Register, Value, Word};
use crate::{debug, error};

macro_rules! exec_vm {
    // Entry point
    (
        cpu = $cpu:ident,
        instr = $instr:ident,
        operands = $ops:ident,
        { $( $variant:ident => $handler:ident $( [ $extra:expr ] )? ( $( $field:ident : $kind:ident ),* $(,)? ) ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => {
                    $( let $field = exec_vm!(@read $cpu, $ops, $kind)?; )*
                    $cpu.$handler($instr $(, $extra)? $(, $field)*)
                }
            ),*
        }
    }};

    // Decode a register operand
    (@read $cpu:ident, $ops:ident, Reg) => {{
        let (word, offset) = $ops.next()?;
        Register::decode(word, offset)
    }};

    // Decode an immediate operand
    (@read $cpu:ident, $ops:ident, Imm) => {{
        let (word, _) = $ops.next()?;
        Ok::<Value, VMError>(Value::from_immediate(word))
    }};

    // Decode a branch target using the configured convention
    (@read $cpu:ident, $ops:ident, Target) => {{
        let (word, offset) = $ops.next()?;
        $cpu.ops.branch_targets.decode(word, offset)
    }};
}

/// Run state of a [`Cpu`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CpuState {
    Running,
    Halted,
}

/// Operand words of the instruction being executed, copied out of the code
/// stream so handlers can borrow the CPU mutably.
struct Operands {
    words: [Word; MAX_OPERANDS],
    len: usize,
    /// Code index of the first operand word.
    base: usize,
    /// Length of the code stream, for fault reporting.
    code_size: usize,
    next: usize,
}

impl Operands {
    fn new(base: usize, words: &[Word], code_size: usize) -> Self {
        let mut buf = [0.0; MAX_OPERANDS];
        buf[..words.len()].copy_from_slice(words);
        Self {
            words: buf,
            len: words.len(),
            base,
            code_size,
            next: 0,
        }
    }

    fn as_slice(&self) -> &[Word] {
        &self.words[..self.len]
    }

    /// Returns the next operand word and its code index. Reading past the
    /// decoded operands faults instead of yielding padding.
    fn next(&mut self) -> Result<(Word, usize), VMError> {
        let i = self.next;
        if i >= self.len {
            return Err(VMError::CodeOutOfBounds {
                index: self.base + i,
                size: self.code_size,
            });
        }
        self.next += 1;
        Ok((self.words[i], self.base + i))
    }
}

/// Arithmetic family operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    /// Computes `lhs <op> rhs`. Integer pairs use wrapping `i64` arithmetic,
    /// anything involving a float is computed in `f64`.
    ///
    /// Returns `None` when an integer destination (`lhs` is `Int`) would be
    /// divided by zero.
    fn apply(self, lhs: Value, rhs: Value) -> Option<Value> {
        match (lhs, rhs) {
            (Value::Int(_), _) if self == ArithOp::Div && rhs.is_zero() => None,
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(match self {
                ArithOp::Add => a.wrapping_add(b),
                ArithOp::Sub => a.wrapping_sub(b),
                ArithOp::Mul => a.wrapping_mul(b),
                ArithOp::Div => a.wrapping_div(b),
            })),
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                Some(Value::Float(match self {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                }))
            }
        }
    }
}

/// Bitwise/shift family operator. Integer bank only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BitOp {
    Xor,
    Shl,
    Shr,
}

impl BitOp {
    /// Shifts are logical; counts outside `0..=63` shift every bit out.
    fn apply(self, lhs: i64, rhs: i64) -> i64 {
        let count = u32::try_from(rhs).ok().filter(|c| *c < 64);
        match (self, count) {
            (BitOp::Xor, _) => lhs ^ rhs,
            (BitOp::Shl, Some(c)) => ((lhs as u64) << c) as i64,
            (BitOp::Shr, Some(c)) => ((lhs as u64) >> c) as i64,
            (BitOp::Shl | BitOp::Shr, None) => 0,
        }
    }
}

/// Register-machine CPU bound to one [`Memory`].
pub struct Cpu<'m> {
    /// Code stream and rwmem, borrowed for the CPU's lifetime.
    memory: &'m mut Memory,
    /// Index of the next opcode to fetch.
    pc: usize,
    /// Index of the opcode currently (or most recently) executing.
    instr_offset: usize,
    registers: RegisterFile,
    flags: Flags,
    state: CpuState,
    /// Instructions executed since creation or the last reset.
    steps: u64,
    ops: CpuOps,
}

impl<'m> Cpu<'m> {
    /// Creates a CPU with default options.
    pub fn new(memory: &'m mut Memory) -> Self {
        Self::with_ops(memory, CpuOps::default())
    }

    /// Creates a CPU with the given options.
    pub fn with_ops(memory: &'m mut Memory, ops: CpuOps) -> Self {
        Self {
            memory,
            pc: 0,
            instr_offset: 0,
            registers: RegisterFile::new(),
            flags: Flags::default(),
            state: CpuState::Running,
            steps: 0,
            ops,
        }
    }

    /// Executes instructions until the program halts.
    ///
    /// Returns the first fault raised; the CPU is halted either way.
    pub fn run(&mut self) -> Result<(), VMError> {
        while self.step()? == CpuState::Running {}
        Ok(())
    }

    /// Executes a single instruction and returns the resulting state.
    ///
    /// Stepping a halted CPU does nothing.
    pub fn step(&mut self) -> Result<CpuState, VMError> {
        if self.state == CpuState::Halted {
            return Ok(CpuState::Halted);
        }
        match self.execute_next() {
            Ok(()) => Ok(self.state),
            Err(e) => {
                self.state = CpuState::Halted;
                error!("fault at offset {}: {}", self.instr_offset, e);
                Err(e)
            }
        }
    }

    /// Clears registers, flags and counters so the program can be run again.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.instr_offset = 0;
        self.registers.clear();
        self.flags = Flags::default();
        self.state = CpuState::Running;
        self.steps = 0;
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn memory(&self) -> &Memory {
        self.memory
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn ops(&self) -> &CpuOps {
        &self.ops
    }

    /// Human-readable register and flag dump.
    pub fn dump(&self) -> String {
        format!("{}\n{}", self.registers, self.flags)
    }

    /// Fetches and decodes the opcode at the program counter.
    fn fetch(&self) -> Result<Instruction, VMError> {
        let word = self.memory.word(self.pc)?;
        Instruction::decode(word, self.pc)
    }

    fn execute_next(&mut self) -> Result<(), VMError> {
        self.instr_offset = self.pc;
        if let Some(limit) = self.ops.step_limit.filter(|limit| self.steps >= *limit) {
            return Err(VMError::StepLimitExceeded { limit });
        }

        let instr = self.fetch()?;
        let words = self.memory.words(self.pc + 1, instr.operand_count())?;
        let mut operands = Operands::new(self.pc + 1, words, self.memory.code().len());
        if self.ops.trace {
            debug!("{:04}: {}", self.pc, instr.render(operands.as_slice()));
        }

        // Taken branches overwrite this.
        self.pc += instr.width();
        self.steps += 1;
        self.dispatch(instr, &mut operands)
    }

    /// Routes a decoded instruction to its handler.
    fn dispatch(&mut self, instr: Instruction, operands: &mut Operands) -> Result<(), VMError> {
        exec_vm! {
            cpu = self,
            instr = instr,
            operands = operands,
            {
                // Moves
                Mov => op_mov(dst: Reg, src: Reg),
                Movi => op_movi(dst: Reg, imm: Imm),
                // Arithmetic
                Add => op_arith[ArithOp::Add](dst: Reg, src: Reg),
                Addi => op_arith_imm[ArithOp::Add](dst: Reg, imm: Imm),
                Sub => op_arith[ArithOp::Sub](dst: Reg, src: Reg),
                Subi => op_arith_imm[ArithOp::Sub](dst: Reg, imm: Imm),
                Mul => op_arith[ArithOp::Mul](dst: Reg, src: Reg),
                Muli => op_arith_imm[ArithOp::Mul](dst: Reg, imm: Imm),
                Div => op_arith[ArithOp::Div](dst: Reg, src: Reg),
                Divi => op_arith_imm[ArithOp::Div](dst: Reg, imm: Imm),
                // Compare / branch
                Cmp => op_cmp(dst: Reg, src: Reg),
                Jmp => op_branch[Condition::Always](target: Target),
                Je => op_branch[Condition::Equal](target: Target),
                Jne => op_branch[Condition::NotEqual](target: Target),
                Jlt => op_branch[Condition::Less](target: Target),
                Jgt => op_branch[Condition::Greater](target: Target),
                // Load / store
                Ld => op_load(dst: Reg, src: Reg),
                Str => op_store(dst: Reg, src: Reg),
                // Bitwise / shift
                Xor => op_bitwise[BitOp::Xor](dst: Reg, src: Reg),
                Xori => op_bitwise_imm[BitOp::Xor](dst: Reg, imm: Imm),
                Shl => op_bitwise[BitOp::Shl](dst: Reg, src: Reg),
                Shr => op_bitwise[BitOp::Shr](dst: Reg, src: Reg),
                Shli => op_bitwise_imm[BitOp::Shl](dst: Reg, imm: Imm),
                Shri => op_bitwise_imm[BitOp::Shr](dst: Reg, imm: Imm),
                // Control
                Hlt => op_halt(),
            }
        }
    }

    /// Stores `value` into `dst` and applies the mutation flag policy to the
    /// value as stored.
    fn write(&mut self, dst: Register, value: Value) {
        let stored = self.registers.set(dst, value);
        self.flags.record_value(stored);
    }

    fn op_mov(&mut self, _instr: Instruction, dst: Register, src: Register) -> Result<(), VMError> {
        let v = self.registers.get(src);
        self.write(dst, v);
        Ok(())
    }

    fn op_movi(&mut self, _instr: Instruction, dst: Register, imm: Value) -> Result<(), VMError> {
        self.write(dst, imm);
        Ok(())
    }

    fn op_arith(
        &mut self,
        _instr: Instruction,
        op: ArithOp,
        dst: Register,
        src: Register,
    ) -> Result<(), VMError> {
        let rhs = self.registers.get(src);
        self.arith(op, dst, rhs)
    }

    fn op_arith_imm(
        &mut self,
        _instr: Instruction,
        op: ArithOp,
        dst: Register,
        imm: Value,
    ) -> Result<(), VMError> {
        self.arith(op, dst, imm)
    }

    fn arith(&mut self, op: ArithOp, dst: Register, rhs: Value) -> Result<(), VMError> {
        let lhs = self.registers.get(dst);
        let result = op.apply(lhs, rhs).ok_or(VMError::DivisionByZero {
            offset: self.instr_offset,
        })?;
        self.write(dst, result);
        Ok(())
    }

    fn op_cmp(&mut self, _instr: Instruction, dst: Register, src: Register) -> Result<(), VMError> {
        let a = self.registers.get(dst);
        let b = self.registers.get(src);
        self.flags.record_comparison(a.compare(b));
        Ok(())
    }

    fn op_branch(
        &mut self,
        _instr: Instruction,
        condition: Condition,
        target: usize,
    ) -> Result<(), VMError> {
        if condition.holds(&self.flags) {
            self.pc = target;
        }
        Ok(())
    }

    fn op_load(&mut self, _instr: Instruction, dst: Register, src: Register) -> Result<(), VMError> {
        let address = self.registers.get(src);
        let byte = self.memory.read_byte(address)?;
        self.write(dst, Value::Int(byte as i64));
        Ok(())
    }

    fn op_store(&mut self, _instr: Instruction, dst: Register, src: Register) -> Result<(), VMError> {
        let address = self.registers.get(dst);
        let value = self.registers.get(src);
        self.memory.write_byte(address, value.low_byte())?;
        self.flags.record_value(address);
        Ok(())
    }

    fn op_bitwise(
        &mut self,
        instr: Instruction,
        op: BitOp,
        dst: Register,
        src: Register,
    ) -> Result<(), VMError> {
        require_int(instr, dst)?;
        require_int(instr, src)?;
        let rhs = self.registers.get(src).as_i64();
        self.bitwise(op, dst, rhs);
        Ok(())
    }

    fn op_bitwise_imm(
        &mut self,
        instr: Instruction,
        op: BitOp,
        dst: Register,
        imm: Value,
    ) -> Result<(), VMError> {
        require_int(instr, dst)?;
        self.bitwise(op, dst, imm.as_i64());
        Ok(())
    }

    /// Applies `op` to an integer destination. Flags are left untouched.
    fn bitwise(&mut self, op: BitOp, dst: Register, rhs: i64) {
        let lhs = self.registers.get(dst).as_i64();
        self.registers.set(dst, Value::Int(op.apply(lhs, rhs)));
    }

    fn op_halt(&mut self, _instr: Instruction) -> Result<(), VMError> {
        self.state = CpuState::Halted;
        Ok(())
    }
}

/// Rejects floating-bank operands for integer-only instructions.
fn require_int(instr: Instruction, register: Register) -> Result<(), VMError> {
    if register.is_float() {
        return Err(VMError::IllegalOperand {
            instruction: instr.mnemonic(),
            register,
        });
    }
    Ok(())
}
