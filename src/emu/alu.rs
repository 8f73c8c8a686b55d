use crate::plat::Opcode;

use super::registers::Flags;

/// The ALU's mode of operation for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluMode {
    Add,
    Adc,
    Sub,
    Sbb,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
}

impl AluMode {
    /// The mode for an arithmetic or bitwise opcode, regardless of operand width.
    pub fn from_opcode(op: Opcode) -> Option<Self> {
        Some(match op {
            Opcode::Add | Opcode::Addb => Self::Add,
            Opcode::Adc | Opcode::Adcb => Self::Adc,
            Opcode::Sub | Opcode::Subb => Self::Sub,
            Opcode::Sbb | Opcode::Sbbb => Self::Sbb,
            Opcode::Mul | Opcode::Mulb => Self::Mul,
            Opcode::Div | Opcode::Divb => Self::Div,
            Opcode::And => Self::And,
            Opcode::Or => Self::Or,
            Opcode::Xor => Self::Xor,
            Opcode::Not => Self::Not,
            Opcode::Shl => Self::Shl,
            Opcode::Shr => Self::Shr,
            _ => return None,
        })
    }

    /// Only arithmetic modes write the status flags.
    pub fn sets_flags(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Adc | Self::Sub | Self::Sbb | Self::Mul | Self::Div
        )
    }
}

/// An unsigned operand width the ALU can work in.
pub trait AluWord: Copy + Into<u32> {
    const BITS: u32;

    /// Keeps the low [`BITS`](Self::BITS) bits.
    fn truncate(value: u32) -> Self;

    fn mask() -> u32 {
        (1u32 << Self::BITS) - 1
    }

    fn sign_bit() -> u32 {
        1u32 << (Self::BITS - 1)
    }
}

#[doc(hidden)]
macro_rules! impl_alu_word {
    ($t:ty) => {
        impl AluWord for $t {
            const BITS: u32 = <$t>::BITS;

            fn truncate(value: u32) -> Self {
                (value & Self::mask()) as $t
            }
        }
    };
}

impl_alu_word!(u8);
impl_alu_word!(u16);

/// The result of one ALU operation, plus the status it would report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluOutput<T> {
    pub result: T,
    pub zero: bool,
    pub sign: bool,
    pub carry: bool,
    pub overflow: bool,
}

impl<T: AluWord> AluOutput<T> {
    fn plain(result: T) -> Self {
        let r: u32 = result.into();
        Self {
            result,
            zero: r == 0,
            sign: r & T::sign_bit() != 0,
            carry: false,
            overflow: false,
        }
    }

    /// Writes zero, sign, carry and overflow. `EQUAL`, `DECIMAL`, `INTERRUPT` and `BREAK` are left alone.
    pub fn apply(&self, flags: &mut Flags) {
        flags.set(Flags::ZERO, self.zero);
        flags.set(Flags::SIGN, self.sign);
        flags.set(Flags::CARRY, self.carry);
        flags.set(Flags::OVERFLOW, self.overflow);
    }
}

/// `left + right + carry_in`
pub fn add<T: AluWord>(left: T, right: T, carry_in: bool) -> AluOutput<T> {
    let (a, b): (u32, u32) = (left.into(), right.into());
    let sum = a + b + u32::from(carry_in);
    let r = sum & T::mask();
    AluOutput {
        carry: sum > T::mask(),
        overflow: (a ^ b) & T::sign_bit() == 0 && (a ^ r) & T::sign_bit() != 0,
        ..AluOutput::plain(T::truncate(r))
    }
}

/// `left - right - borrow_in`
pub fn sub<T: AluWord>(left: T, right: T, borrow_in: bool) -> AluOutput<T> {
    let (a, b): (u32, u32) = (left.into(), right.into());
    let c = u32::from(borrow_in);
    let r = a.wrapping_sub(b).wrapping_sub(c) & T::mask();
    AluOutput {
        carry: a < b + c,
        overflow: (a ^ b) & T::sign_bit() != 0 && (a ^ r) & T::sign_bit() != 0,
        ..AluOutput::plain(T::truncate(r))
    }
}

/// Runs one ALU operation. Returns `None` on division by zero.
///
/// For [`Shl`](AluMode::Shl)/[`Shr`](AluMode::Shr), `right` is the shift count; counts of
/// [`BITS`](AluWord::BITS) or more give 0. [`Not`](AluMode::Not) ignores `right`.
pub fn execute<T: AluWord>(mode: AluMode, left: T, right: T, carry_in: bool) -> Option<AluOutput<T>> {
    let (a, b): (u32, u32) = (left.into(), right.into());
    let out = match mode {
        AluMode::Add => add(left, right, false),
        AluMode::Adc => add(left, right, carry_in),
        AluMode::Sub => sub(left, right, false),
        AluMode::Sbb => sub(left, right, carry_in),
        AluMode::Mul => AluOutput::plain(T::truncate(a.wrapping_mul(b))),
        AluMode::Div => AluOutput::plain(T::truncate(a.checked_div(b)?)),
        AluMode::And => AluOutput::plain(T::truncate(a & b)),
        AluMode::Or => AluOutput::plain(T::truncate(a | b)),
        AluMode::Xor => AluOutput::plain(T::truncate(a ^ b)),
        AluMode::Not => AluOutput::plain(T::truncate(!a)),
        AluMode::Shl if b < T::BITS => AluOutput::plain(T::truncate(a << b)),
        AluMode::Shr if b < T::BITS => AluOutput::plain(T::truncate(a >> b)),
        AluMode::Shl | AluMode::Shr => AluOutput::plain(T::truncate(0)),
    };
    Some(out)
}
