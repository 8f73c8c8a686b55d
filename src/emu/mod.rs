//! The emulator module for RASM-16.

use thiserror::Error;

pub mod alu;
pub mod emulator;
pub mod ram;
pub mod registers;

pub use emulator::{Cpu, Exit, RunPolicy};
pub use ram::MemoryFault;

/// A fatal execution error. Registers, flags and memory are left as they were when the fault was
/// detected; only PC and the cycle count reflect the bytes already fetched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EmuError {
    #[error("invalid opcode 0x{opcode:02X} at 0x{address:04X}")]
    InvalidOpcode { opcode: u8, address: u16 },
    #[error("invalid register code 0x{code:02X} at 0x{address:04X}")]
    InvalidRegister { code: u8, address: u16 },
    #[error("invalid mode 0x{mode:02X} at 0x{address:04X}")]
    InvalidMode { mode: u8, address: u16 },
    #[error("division by zero at 0x{address:04X}")]
    DivisionByZero { address: u16 },
    #[error("stack underflow (sp=0x{sp:04X}) at 0x{address:04X}")]
    StackUnderflow { sp: u16, address: u16 },
    #[error(transparent)]
    Memory(#[from] MemoryFault),
}
