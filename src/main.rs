//! XORVM demo runner.
//!
//! Encrypts a payload in rwmem with a single-byte XOR key by running a small
//! XORVM program, then runs the same program again to restore it.
//!
//! # Usage
//! ```text
//! xorvm [payload] [OPTIONS]
//! ```
//!
//! # Options
//! - `--key <byte>`: XOR key, decimal or `0x` hex (defaults to `0x12`)
//! - `--disassemble`: Print the program listing before running it
//!
//! # Environment
//! CPU options are read from `XORVM_STEP_LIMIT`, `XORVM_TRACE` and
//! `XORVM_BRANCH_TARGETS`. Tracing also lowers the log level to debug.

use std::env;
use std::process;
use xorvm::utils::log::{self, Level};
use xorvm::virtual_machine::isa::disassemble;
use xorvm::virtual_machine::operand::{R0, R1, R2, R3, Word};
use xorvm::{Cpu, CpuOps, Memory, ProgramBuilder, VMError, error, info};

const DEFAULT_PAYLOAD: &str = "ABCD";
const DEFAULT_KEY: u8 = 0x12;

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut payload: Option<&str> = None;
    let mut key = DEFAULT_KEY;
    let mut show_listing = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            "--key" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("--key requires an argument");
                    process::exit(1);
                }
                key = match parse_key(&args[i]) {
                    Some(k) => k,
                    None => {
                        eprintln!("Invalid key: {}", args[i]);
                        process::exit(1);
                    }
                };
            }
            "--disassemble" => show_listing = true,
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                print_usage(&args[0]);
                process::exit(1);
            }
            arg => {
                if payload.replace(arg).is_some() {
                    eprintln!("Only one payload may be given");
                    process::exit(1);
                }
            }
        }
        i += 1;
    }

    let ops = match CpuOps::from_env() {
        Ok(ops) => ops,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    if ops.trace {
        log::set_level(Level::Debug);
    }

    let payload = payload.unwrap_or(DEFAULT_PAYLOAD).as_bytes().to_vec();
    let mut builder = ProgramBuilder::with_branch_targets(ops.branch_targets);
    if let Err(e) = emit_xor_payload(&mut builder, payload.len(), key) {
        error!("Failed to build program: {}", e);
        process::exit(1);
    }
    let code = builder.build();

    if show_listing {
        match disassemble(&code) {
            Ok(lines) => lines.iter().for_each(|line| println!("{}", line)),
            Err(e) => error!("Disassembly failed: {}", e),
        }
    }

    let mut memory = Memory::new(code, payload.clone());
    let mut cpu = Cpu::with_ops(&mut memory, ops);

    info!("Original payload        : {}", String::from_utf8_lossy(&payload));
    if let Err(e) = cpu.run() {
        error!("Encryption run failed: {}", e);
        process::exit(1);
    }
    info!(
        "XORed payload (key {:#04x}): {}",
        key,
        String::from_utf8_lossy(cpu.memory().rwmem())
    );

    cpu.reset();
    if let Err(e) = cpu.run() {
        error!("Decryption run failed: {}", e);
        process::exit(1);
    }
    let restored = cpu.memory().rwmem();
    info!("Restored payload        : {}", String::from_utf8_lossy(restored));
    if restored != payload.as_slice() {
        error!("Payload was not restored");
        process::exit(1);
    }

    println!("{}", cpu.dump());
}

/// Emits a loop that XORs each of the first `len` rwmem bytes with `key`.
///
/// The bound is checked before the first iteration, so `len == 0` halts
/// without touching rwmem.
fn emit_xor_payload(b: &mut ProgramBuilder, len: usize, key: u8) -> Result<(), VMError> {
    b.movi(R2, len as Word).movi(R3, key as Word).cmp(R1, R2);
    let skip = b.position();
    b.je(0);
    let top = b.position();
    b.ld(R0, R1)
        .xor(R0, R3)
        .str(R1, R0)
        .addi(R1, 1.0)
        .cmp(R1, R2)
        .jlt(top);
    let end = b.position();
    b.hlt();
    b.patch_branch(skip, end)
}

fn parse_key(raw: &str) -> Option<u8> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}

const USAGE: &str = "\
XORVM demo

USAGE:
    {program} [payload] [OPTIONS]

ARGS:
    [payload]    Text placed in rwmem (defaults to ABCD)

OPTIONS:
    --key <byte>     XOR key, decimal or 0x hex (defaults to 0x12)
    --disassemble    Print the program listing before running it
    -h, --help       Print this help message

ENVIRONMENT:
    XORVM_STEP_LIMIT        Fault after this many instructions
    XORVM_TRACE             Log every executed instruction (1/true)
    XORVM_BRANCH_TARGETS    exact (default) or pre-increment

EXAMPLES:
    # Encrypt and restore the default payload
    {program}

    # Use a custom payload and key, with an instruction trace
    XORVM_TRACE=1 {program} \"hello\" --key 0x20
";
