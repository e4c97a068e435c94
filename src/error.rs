use thiserror::Error;

/// Failures the emulator can report to its caller.
///
/// The core never aborts the process itself; errors propagate out of
/// `execute` and the hosting program decides whether to terminate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmulatorError {
    /// A read or write landed outside the 64K address space. The address
    /// is kept at full width so $10000 is reported as-is, not wrapped.
    #[error("memory access out of bounds: ${address:06X}")]
    OutOfBounds { address: u32 },

    /// A fetched opcode byte has no entry in the dispatch table.
    /// Execution stops at the offending byte; there is no rollback.
    #[error("unknown opcode ${opcode:02X} at PC ${pc:04X}")]
    UnknownOpcode { opcode: u8, pc: u16 },

    /// A snapshot could not be restored (truncated or corrupt dump).
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}
