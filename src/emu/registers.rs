use std::fmt;

use crate::plat::{Register16, Register8, CODE_BASE, FRAMEBUFFER_BASE, STACK_BASE};

bitflags::bitflags! {
    /// The CPU status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// Set by `EQU` when both operands match. Also the branch condition of `JZ`/`JNZ`.
        const EQUAL = 1 << 0;
        /// Set if the result of the last arithmetic operation was zero.
        const ZERO = 1 << 1;
        const DECIMAL = 1 << 2;
        /// Top bit of the last arithmetic result.
        const SIGN = 1 << 3;
        /// Unsigned carry out of (or borrow into) the last arithmetic operation.
        const CARRY = 1 << 4;
        /// Signed overflow of the last arithmetic operation.
        const OVERFLOW = 1 << 5;
        const INTERRUPT = 1 << 6;
        const BREAK = 1 << 7;
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LETTERS: [(Flags, char); 8] = [
            (Flags::EQUAL, 'E'),
            (Flags::ZERO, 'Z'),
            (Flags::DECIMAL, 'D'),
            (Flags::SIGN, 'S'),
            (Flags::CARRY, 'C'),
            (Flags::OVERFLOW, 'O'),
            (Flags::INTERRUPT, 'I'),
            (Flags::BREAK, 'B'),
        ];
        for (flag, c) in LETTERS {
            write!(f, "{}", if self.contains(flag) { c } else { '-' })?;
        }
        Ok(())
    }
}

/// The full architectural register file.
///
/// Operand-addressable registers are reached through [`get16`](Self::get16) / [`set16`](Self::set16)
/// and [`get8`](Self::get8) / [`set8`](Self::set8); `pc`, `sp` and `fb` have no register code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    r: [u16; 4],
    /// Accumulator
    ra: u16,
    /// Address-intermediate
    ri: u16,
    b: [u8; 4],
    pub pc: u16,
    pub sp: u16,
    /// Frame-buffer base
    pub fb: u16,
}

impl RegisterFile {
    pub fn get16(&self, reg: Register16) -> u16 {
        match reg {
            Register16::R0 => self.r[0],
            Register16::R1 => self.r[1],
            Register16::R2 => self.r[2],
            Register16::R3 => self.r[3],
            Register16::RA => self.ra,
            Register16::RI => self.ri,
        }
    }

    pub fn set16(&mut self, reg: Register16, value: u16) {
        match reg {
            Register16::R0 => self.r[0] = value,
            Register16::R1 => self.r[1] = value,
            Register16::R2 => self.r[2] = value,
            Register16::R3 => self.r[3] = value,
            Register16::RA => self.ra = value,
            Register16::RI => self.ri = value,
        }
    }

    pub fn get8(&self, reg: Register8) -> u8 {
        match reg {
            Register8::B0 => self.b[0],
            Register8::B1 => self.b[1],
            Register8::B2 => self.b[2],
            Register8::B3 => self.b[3],
        }
    }

    pub fn set8(&mut self, reg: Register8, value: u8) {
        match reg {
            Register8::B0 => self.b[0] = value,
            Register8::B1 => self.b[1] = value,
            Register8::B2 => self.b[2] = value,
            Register8::B3 => self.b[3] = value,
        }
    }
}

impl Default for RegisterFile {
    /// Reset values.
    fn default() -> Self {
        Self {
            r: [0; 4],
            ra: 0,
            ri: 0,
            b: [0; 4],
            pc: CODE_BASE,
            sp: STACK_BASE,
            fb: FRAMEBUFFER_BASE,
        }
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for reg in Register16::ALL {
            write!(f, "{}={:04X} ", reg.name(), self.get16(reg))?;
        }
        writeln!(f)?;
        for reg in Register8::ALL {
            write!(f, "{}={:02X} ", reg.name(), self.get8(reg))?;
        }
        writeln!(f)?;
        write!(f, "PC={:04X} SP={:04X} FB={:04X}", self.pc, self.sp, self.fb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_are_independent() {
        let mut regs = RegisterFile::default();
        for (i, reg) in Register16::ALL.into_iter().enumerate() {
            regs.set16(reg, 0x1000 + i as u16);
        }
        for (i, reg) in Register8::ALL.into_iter().enumerate() {
            regs.set8(reg, 0x10 + i as u8);
        }
        for (i, reg) in Register16::ALL.into_iter().enumerate() {
            assert_eq!(regs.get16(reg), 0x1000 + i as u16);
        }
        for (i, reg) in Register8::ALL.into_iter().enumerate() {
            assert_eq!(regs.get8(reg), 0x10 + i as u8);
        }
        assert_eq!(regs.pc, CODE_BASE);
        assert_eq!(regs.sp, STACK_BASE);
        assert_eq!(regs.fb, FRAMEBUFFER_BASE);
    }

    #[test]
    fn test_flags_display() {
        assert_eq!(Flags::empty().to_string(), "--------");
        assert_eq!((Flags::EQUAL | Flags::CARRY).to_string(), "E---C---");
    }
}
