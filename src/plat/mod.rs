//! Common platform code between RASM-16's assembler and emulator.
//!
//! Everything in here is wire contract: the assembler emits exactly these bytes, and the CPU
//! decodes exactly these bytes.

use std::fmt;

use thiserror::Error;

/// Program counter reset vector. Binary images are loaded here, and jump targets are relative to it.
pub const CODE_BASE: u16 = 0xD000;
/// Stack pointer reset vector. The stack grows upward from here.
pub const STACK_BASE: u16 = 0xB000;
/// Frame-buffer base register reset vector.
pub const FRAMEBUFFER_BASE: u16 = 0xE000;
/// Size of the frame-buffer region in bytes.
pub const FRAMEBUFFER_LEN: usize = 0x1000;
/// Fill byte for a blank ("white") frame buffer.
pub const FRAMEBUFFER_WHITE: u8 = 0xFF;
/// Size of the flat address space in bytes.
pub const MEMORY_SIZE: usize = 0x10000;

/// An error for the core platform of RASM-16.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformError {
    #[error("invalid opcode 0x{0:02X}")]
    InvalidOpcode(u8),
    #[error("invalid register code 0x{0:02X}")]
    InvalidRegister(u8),
    #[error("invalid mode 0x{0:02X}")]
    InvalidMode(u8),
}

/// Type alias for Result<T, [PlatformError]>.
pub type PResult<T> = Result<T, PlatformError>;

/// The six addressable 16-bit registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register16 {
    R0 = 0xA0,
    R1 = 0xA1,
    R2 = 0xA2,
    R3 = 0xA3,
    /// Accumulator
    RA = 0xA4,
    /// Address-intermediate
    RI = 0xA5,
}

impl Register16 {
    pub const ALL: [Self; 6] = [Self::R0, Self::R1, Self::R2, Self::R3, Self::RA, Self::RI];

    pub fn name(self) -> &'static str {
        match self {
            Self::R0 => "R0",
            Self::R1 => "R1",
            Self::R2 => "R2",
            Self::R3 => "R3",
            Self::RA => "RA",
            Self::RI => "RI",
        }
    }
}

impl TryFrom<u8> for Register16 {
    type Error = PlatformError;

    fn try_from(value: u8) -> PResult<Self> {
        match value {
            0xA0 => Ok(Self::R0),
            0xA1 => Ok(Self::R1),
            0xA2 => Ok(Self::R2),
            0xA3 => Ok(Self::R3),
            0xA4 => Ok(Self::RA),
            0xA5 => Ok(Self::RI),
            _ => Err(PlatformError::InvalidRegister(value)),
        }
    }
}

/// The four addressable 8-bit registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register8 {
    B0 = 0xB5,
    B1 = 0xB6,
    B2 = 0xB7,
    B3 = 0xB8,
}

impl Register8 {
    pub const ALL: [Self; 4] = [Self::B0, Self::B1, Self::B2, Self::B3];

    pub fn name(self) -> &'static str {
        match self {
            Self::B0 => "B0",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::B3 => "B3",
        }
    }
}

impl TryFrom<u8> for Register8 {
    type Error = PlatformError;

    fn try_from(value: u8) -> PResult<Self> {
        match value {
            0xB5 => Ok(Self::B0),
            0xB6 => Ok(Self::B1),
            0xB7 => Ok(Self::B2),
            0xB8 => Ok(Self::B3),
            _ => Err(PlatformError::InvalidRegister(value)),
        }
    }
}

/// Any register that can appear as an operand, as written in assembly source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Word(Register16),
    Byte(Register8),
}

impl Register {
    /// Resolves a register mnemonic (case-sensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Register16::ALL
            .into_iter()
            .find(|r| r.name() == name)
            .map(Self::Word)
            .or_else(|| {
                Register8::ALL
                    .into_iter()
                    .find(|r| r.name() == name)
                    .map(Self::Byte)
            })
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Word(r) => r as u8,
            Self::Byte(r) => r as u8,
        }
    }

    pub fn width(self) -> Width {
        match self {
            Self::Word(_) => Width::Word,
            Self::Byte(_) => Width::Byte,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(r) => write!(f, "{}", r.name()),
            Self::Byte(r) => write!(f, "{}", r.name()),
        }
    }
}

/// Width-mode operand byte, selecting 8- or 16-bit operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Width {
    Byte = 0xA0,
    Word = 0xA1,
}

impl Width {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BYTE" => Some(Self::Byte),
            "WORD" => Some(Self::Word),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Width {
    type Error = PlatformError;

    fn try_from(value: u8) -> PResult<Self> {
        match value {
            0xA0 => Ok(Self::Byte),
            0xA1 => Ok(Self::Word),
            _ => Err(PlatformError::InvalidMode(value)),
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte => write!(f, "BYTE"),
            Self::Word => write!(f, "WORD"),
        }
    }
}

/// Source-mode operand byte of [STB][Opcode::Stb] and [STW][Opcode::Stw].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StoreMode {
    /// The value follows inline in the instruction stream.
    Imm = 0xA0,
    /// The value is read from a register.
    Reg = 0xA1,
}

impl TryFrom<u8> for StoreMode {
    type Error = PlatformError;

    fn try_from(value: u8) -> PResult<Self> {
        match value {
            0xA0 => Ok(Self::Imm),
            0xA1 => Ok(Self::Reg),
            _ => Err(PlatformError::InvalidMode(value)),
        }
    }
}

/// Declares [Opcode], its descriptor table and the byte decoder from one listing, so every
/// opcode has exactly one descriptor.
macro_rules! isa {
    ($(
        $(#[$meta:meta])*
        $op:ident = $byte:literal, $mnemonic:literal, $shape:expr;
    )+) => {
        /// The one-byte opcodes understood by the CPU.
        ///
        /// Arithmetic opcodes take `dest, left, right` and update the zero, sign, carry and
        /// overflow flags. Bitwise opcodes take a [Width] byte first and leave the flags alone.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$meta])* $op = $byte, )+
        }

        /// Every instruction of the ISA, in opcode order. `HLT` is last.
        pub static INSTRUCTIONS: &[InstrDesc] = &[
            $( InstrDesc { mnemonic: $mnemonic, opcode: Opcode::$op, shape: $shape }, )+
        ];

        impl Opcode {
            /// The descriptor of this opcode, equal to its entry in [INSTRUCTIONS].
            pub fn desc(self) -> &'static InstrDesc {
                match self {
                    $( Opcode::$op => {
                        const DESC: InstrDesc =
                            InstrDesc { mnemonic: $mnemonic, opcode: Opcode::$op, shape: $shape };
                        &DESC
                    } )+
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            type Error = PlatformError;

            fn try_from(value: u8) -> PResult<Self> {
                match value {
                    $( $byte => Ok(Opcode::$op), )+
                    _ => Err(PlatformError::InvalidOpcode(value)),
                }
            }
        }
    };
}

isa! {
    // Load immediate
    /// `R0 <- imm16`
    Lr0 = 0xA0, "LR0", Shape::Fixed(IMM16);
    Lr1 = 0xA1, "LR1", Shape::Fixed(IMM16);
    Lr2 = 0xA2, "LR2", Shape::Fixed(IMM16);
    Lr3 = 0xA3, "LR3", Shape::Fixed(IMM16);
    /// `B0 <- imm8`
    Lb0 = 0xA4, "LB0", Shape::Fixed(IMM8);
    Lb1 = 0xA5, "LB1", Shape::Fixed(IMM8);
    Lb2 = 0xA6, "LB2", Shape::Fixed(IMM8);
    Lb3 = 0xA7, "LB3", Shape::Fixed(IMM8);
    /// `RA <- imm16`
    Lda = 0xA8, "LDA", Shape::Fixed(IMM16);
    /// `RI <- imm16`
    Ldi = 0xA9, "LDI", Shape::Fixed(IMM16);

    // Stack
    /// `mem[SP] <- imm; SP += width`
    Push = 0xAA, "PUSH", Shape::Push;
    /// `SP -= width; reg <- mem[SP]; mem[SP] <- 0`
    Pop = 0xAB, "POP", Shape::Pop;

    // Memory
    /// `mem[regA] <- imm8 | regB`
    Stb = 0xAC, "STB", Shape::Store(Width::Byte);
    /// `mem[regA..regA+2] <- imm16 | regB`, low byte first
    Stw = 0xAD, "STW", Shape::Store(Width::Word);
    /// `regA <- mem[regB]`
    Ldb = 0xAE, "LDB", Shape::Fixed(R8R16);
    /// `regA <- mem[regB..regB+2]`, low byte first
    Ldw = 0xAF, "LDW", Shape::Fixed(RR16);

    // ALU, 16-bit
    Add = 0xB1, "ADD", Shape::Fixed(RRR16);
    Adc = 0xB2, "ADC", Shape::Fixed(RRR16);
    Sub = 0xB3, "SUB", Shape::Fixed(RRR16);
    Sbb = 0xB4, "SBB", Shape::Fixed(RRR16);
    Mul = 0xB5, "MUL", Shape::Fixed(RRR16);
    Div = 0xB6, "DIV", Shape::Fixed(RRR16);

    // ALU, 8-bit
    Addb = 0xB7, "ADDB", Shape::Fixed(RRR8);
    Adcb = 0xB8, "ADCB", Shape::Fixed(RRR8);
    Subb = 0xB9, "SUBB", Shape::Fixed(RRR8);
    Sbbb = 0xBA, "SBBB", Shape::Fixed(RRR8);
    Mulb = 0xBB, "MULB", Shape::Fixed(RRR8);
    Divb = 0xBC, "DIVB", Shape::Fixed(RRR8);

    // Branching
    /// `EQUAL <- regA == regB`
    Equ = 0xC0, "EQU", Shape::Fixed(RR16);
    /// Jumps to `CODE_BASE + imm16` when the equal flag is *clear*.
    Jz = 0xC1, "JZ", Shape::Fixed(LABEL);
    /// Jumps to `CODE_BASE + imm16` when the equal flag is *set*.
    Jnz = 0xC2, "JNZ", Shape::Fixed(LABEL);
    /// Jumps to `CODE_BASE + imm16`.
    Jmp = 0xC3, "JMP", Shape::Fixed(LABEL);

    // Bitwise
    And = 0xE0, "AND", Shape::Bitwise(3);
    Or = 0xE1, "OR", Shape::Bitwise(3);
    Xor = 0xE2, "XOR", Shape::Bitwise(3);
    Not = 0xE3, "NOT", Shape::Bitwise(2);
    Shl = 0xE4, "SHL", Shape::Bitwise(3);
    Shr = 0xE5, "SHR", Shape::Bitwise(3);

    /// Stops the CPU
    Hlt = 0xFF, "HLT", Shape::Fixed(NONE);
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        self.desc().mnemonic
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// A single fixed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Decimal immediate, one byte.
    Imm8,
    /// Decimal immediate, two bytes, high byte first.
    Imm16,
    /// Label reference, encoded as a high-byte-first location counter value.
    Label,
    /// 16-bit register code.
    Reg16,
    /// 8-bit register code.
    Reg8,
}

/// Operand layout of an instruction, as written in source and as encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A fixed list of operands, encoded in source order.
    Fixed(&'static [Operand]),
    /// `<Width> <immediate of that width>`
    Push,
    /// `<Width> <register of that width>`
    Pop,
    /// `<Reg16 address> <StoreMode> <immediate or register of the given width>`
    Store(Width),
    /// `<Width>` followed by this many registers of that width.
    Bitwise(usize),
}

/// Tagged instruction descriptor: the only place mnemonics are spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrDesc {
    pub mnemonic: &'static str,
    pub opcode: Opcode,
    pub shape: Shape,
}

const NONE: &[Operand] = &[];
const IMM8: &[Operand] = &[Operand::Imm8];
const IMM16: &[Operand] = &[Operand::Imm16];
const LABEL: &[Operand] = &[Operand::Label];
const RRR16: &[Operand] = &[Operand::Reg16, Operand::Reg16, Operand::Reg16];
const RRR8: &[Operand] = &[Operand::Reg8, Operand::Reg8, Operand::Reg8];
const RR16: &[Operand] = &[Operand::Reg16, Operand::Reg16];
const R8R16: &[Operand] = &[Operand::Reg8, Operand::Reg16];

/// Looks up an instruction by its exact (case-sensitive) mnemonic.
pub fn lookup(mnemonic: &str) -> Option<&'static InstrDesc> {
    INSTRUCTIONS.iter().find(|d| d.mnemonic == mnemonic)
}
