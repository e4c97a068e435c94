//! # Cycle-Budgeted MOS 6502 CPU Emulator
//!
//! An emulator core for the MOS 6502 8-bit microprocessor where every
//! primitive operation debits a caller-supplied cycle budget. The caller
//! owns a 64K `Memory`, seeds opcode and operand bytes into it, resets
//! the `CPU`, and hands `execute` a budget; the fetch-decode-execute
//! loop runs until the budget is spent or a fatal condition surfaces as
//! an `EmulatorError`.
//!
//! ## Features
//!
//! - Bounds-checked 64K byte-addressable memory with bulk reset
//! - Immediate, zero-page, zero-page-X and absolute addressing modes
//! - Vector-dereferencing reset ($FFFC/$FFFD, little-endian)
//! - Uniform cycle accounting through the fetch primitives
//! - Errors propagate to the caller instead of aborting the process
//!
//! ## Example
//!
//! ```rust
//! use cycle65::cpu::CPU;
//! use cycle65::memory::Memory;
//!
//! let mut cpu = CPU::new();
//! let mut memory = Memory::new();
//!
//! // Point the reset vector at $8000, then reset. The vector is
//! // latched before the memory wipe.
//! memory.write(0xFFFC, 0x00).unwrap();
//! memory.write(0xFFFD, 0x80).unwrap();
//! cpu.reset(&mut memory);
//!
//! // LDA #$42
//! memory.write(0x8000, 0xA9).unwrap();
//! memory.write(0x8001, 0x42).unwrap();
//!
//! let remaining = cpu.execute(2, &mut memory).unwrap();
//!
//! assert_eq!(cpu.get_register_a(), 0x42);
//! assert_eq!(remaining, 0);
//! ```

#![recursion_limit = "2048"]

pub mod cpu;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod server;
pub mod snapshots;

pub use cpu::CPU;
pub use error::EmulatorError;
pub use memory::Memory;
