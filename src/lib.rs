//! RASM-16: an assembler and emulator for a small 16-bit register machine.
//!
//! Source text goes through [asm::lexer::tokenize] and [asm::assembler::Assembler] into a flat
//! binary image, which [emu::Cpu] loads at [plat::CODE_BASE] and runs.
#![cfg_attr(doc, warn(missing_docs))]

pub mod asm;
pub mod diag;
pub mod emu;
pub mod plat;
