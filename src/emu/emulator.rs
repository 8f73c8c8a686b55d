use std::fmt;

use crate::{
    diag::{diag, Diagnostics, LogSink},
    plat::{
        Opcode, Register16, Register8, StoreMode, Width, CODE_BASE, FRAMEBUFFER_LEN,
        FRAMEBUFFER_WHITE, MEMORY_SIZE,
    },
};

use super::{
    alu::{self, AluMode, AluOutput, AluWord},
    ram::{MemoryFault, Ram},
    registers::{Flags, RegisterFile},
    EmuError,
};

/// Why a call to [`Cpu::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exit {
    /// A `HLT` was executed. The CPU will not run again until [`Cpu::reset`].
    Halted,
    /// The cycle budget ran out; calling [`Cpu::run`] again continues where execution stopped.
    BudgetExhausted,
}

/// How long a call to [`Cpu::run`] may execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPolicy {
    /// At most this many cycles. An instruction that has started always completes.
    Cycles(usize),
    /// Until `HLT` or a fault.
    UntilHalt,
}

/// The main emulation context for RASM-16.
pub struct Cpu<D: Diagnostics = LogSink> {
    pub registers: RegisterFile,
    pub flags: Flags,
    ram: Ram,
    halted: bool,
    /// Set when the last fetch consumed the byte at 0xFFFF and PC wrapped to 0. The next fetch
    /// from there faults instead of reading address 0.
    pc_past_end: bool,
    cycles: u64,
    /// `None` for [`RunPolicy::UntilHalt`].
    budget: Option<usize>,
    diag: D,
}

impl Default for Cpu<LogSink> {
    fn default() -> Self {
        Self::new(LogSink)
    }
}

impl<D: Diagnostics> Cpu<D> {
    /// Creates a CPU in its reset state.
    pub fn new(diag: D) -> Self {
        let mut this = Self {
            registers: RegisterFile::default(),
            flags: Flags::empty(),
            ram: Ram::new(),
            halted: false,
            pc_past_end: false,
            cycles: 0,
            budget: None,
            diag,
        };
        this.reset();
        this
    }

    /// Puts every register, flag and memory cell back to its reset value.
    pub fn reset(&mut self) {
        self.registers = RegisterFile::default();
        self.flags = Flags::empty();
        self.ram.clear();
        self.ram.fill(
            usize::from(self.registers.fb),
            FRAMEBUFFER_LEN,
            FRAMEBUFFER_WHITE,
        );
        self.halted = false;
        self.pc_past_end = false;
        self.cycles = 0;
        self.budget = None;
    }

    /// Writes a single byte of memory.
    pub fn load(&mut self, address: u16, byte: u8) -> Result<(), EmuError> {
        Ok(self.ram.write(usize::from(address), byte)?)
    }

    /// Copies a binary image into memory at [`CODE_BASE`].
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), EmuError> {
        self.ram.load(usize::from(CODE_BASE), image)?;
        diag!(
            self.diag,
            Debug,
            "loaded {} bytes at 0x{:04X}",
            image.len(),
            CODE_BASE
        );
        Ok(())
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn memory(&self) -> &[u8] {
        self.ram.as_slice()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Cycles consumed since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs for at most `budget` cycles.
    pub fn execute(&mut self, budget: usize) -> Result<Exit, EmuError> {
        self.run(RunPolicy::Cycles(budget))
    }

    pub fn run_until_halt(&mut self) -> Result<Exit, EmuError> {
        self.run(RunPolicy::UntilHalt)
    }

    /// Runs the fetch-decode-execute loop under the given policy.
    ///
    /// Calling this on a halted CPU is a no-op that returns [`Exit::Halted`].
    ///
    /// # Errors
    ///
    /// This function will return an error on an invalid opcode, register code or mode byte, on
    /// division by zero, and on any out-of-range memory access.
    pub fn run(&mut self, policy: RunPolicy) -> Result<Exit, EmuError> {
        if self.halted {
            diag!(self.diag, Debug, "already halted, not running");
            return Ok(Exit::Halted);
        }
        self.budget = match policy {
            RunPolicy::Cycles(n) => Some(n),
            RunPolicy::UntilHalt => None,
        };
        while self.budget != Some(0) {
            if let Err(e) = self.step() {
                diag!(self.diag, Error, "{}", e);
                return Err(e);
            }
            if self.halted {
                return Ok(Exit::Halted);
            }
        }
        Ok(Exit::BudgetExhausted)
    }

    fn tick(&mut self) {
        self.cycles += 1;
        if let Some(budget) = self.budget.as_mut() {
            *budget = budget.saturating_sub(1);
        }
    }

    /// Address of the next instruction-stream byte.
    fn pc_address(&self) -> Result<usize, EmuError> {
        if self.pc_past_end && self.registers.pc == 0 {
            return Err(MemoryFault {
                address: MEMORY_SIZE,
            }
            .into());
        }
        Ok(usize::from(self.registers.pc))
    }

    /// Only called after the bytes being skipped were read successfully.
    fn advance_pc(&mut self, by: u16) {
        let (pc, wrapped) = self.registers.pc.overflowing_add(by);
        self.registers.pc = pc;
        self.pc_past_end = wrapped;
    }

    fn fetch_byte(&mut self) -> Result<u8, EmuError> {
        let byte = self.ram.read(self.pc_address()?)?;
        self.advance_pc(1);
        self.tick();
        Ok(byte)
    }

    /// Instruction-stream words are high byte first.
    fn fetch_word(&mut self) -> Result<u16, EmuError> {
        let pc = self.pc_address()?;
        let hi = self.ram.read(pc)?;
        let lo = self.ram.read(pc + 1)?;
        self.advance_pc(2);
        self.tick();
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn fetch_register_u16(&mut self) -> Result<Register16, EmuError> {
        let address = self.registers.pc;
        let code = self.fetch_byte()?;
        Register16::try_from(code).map_err(|_| EmuError::InvalidRegister { code, address })
    }

    fn fetch_register_u8(&mut self) -> Result<Register8, EmuError> {
        let address = self.registers.pc;
        let code = self.fetch_byte()?;
        Register8::try_from(code).map_err(|_| EmuError::InvalidRegister { code, address })
    }

    fn fetch_width(&mut self) -> Result<Width, EmuError> {
        let address = self.registers.pc;
        let mode = self.fetch_byte()?;
        Width::try_from(mode).map_err(|_| EmuError::InvalidMode { mode, address })
    }

    fn fetch_store_mode(&mut self) -> Result<StoreMode, EmuError> {
        let address = self.registers.pc;
        let mode = self.fetch_byte()?;
        StoreMode::try_from(mode).map_err(|_| EmuError::InvalidMode { mode, address })
    }

    fn alu<T: AluWord>(
        &self,
        mode: AluMode,
        left: T,
        right: T,
        address: u16,
    ) -> Result<AluOutput<T>, EmuError> {
        let carry = self.flags.contains(Flags::CARRY);
        alu::execute(mode, left, right, carry).ok_or(EmuError::DivisionByZero { address })
    }

    /// Executes exactly one instruction.
    fn step(&mut self) -> Result<(), EmuError> {
        let address = self.registers.pc;
        let opcode = self.fetch_byte()?;
        let op =
            Opcode::try_from(opcode).map_err(|_| EmuError::InvalidOpcode { opcode, address })?;
        diag!(self.diag, Trace, "[pc={:04X}] {}", address, op);

        match op {
            Opcode::Lr0
            | Opcode::Lr1
            | Opcode::Lr2
            | Opcode::Lr3
            | Opcode::Lda
            | Opcode::Ldi => {
                let dest = match op {
                    Opcode::Lr0 => Register16::R0,
                    Opcode::Lr1 => Register16::R1,
                    Opcode::Lr2 => Register16::R2,
                    Opcode::Lr3 => Register16::R3,
                    Opcode::Lda => Register16::RA,
                    _ => Register16::RI,
                };
                let value = self.fetch_word()?;
                self.registers.set16(dest, value);
            }
            Opcode::Lb0 | Opcode::Lb1 | Opcode::Lb2 | Opcode::Lb3 => {
                let dest = match op {
                    Opcode::Lb0 => Register8::B0,
                    Opcode::Lb1 => Register8::B1,
                    Opcode::Lb2 => Register8::B2,
                    _ => Register8::B3,
                };
                let value = self.fetch_byte()?;
                self.registers.set8(dest, value);
            }
            Opcode::Push => {
                let width = self.fetch_width()?;
                let sp = self.registers.sp;
                let full = MemoryFault {
                    address: MEMORY_SIZE,
                };
                // SP must stay addressable after the push, checked before anything is written
                match width {
                    Width::Byte => {
                        let value = self.fetch_byte()?;
                        let top = sp.checked_add(1).ok_or(full)?;
                        self.ram.write(usize::from(sp), value)?;
                        self.registers.sp = top;
                    }
                    Width::Word => {
                        let value = self.fetch_word()?;
                        let top = sp.checked_add(2).ok_or(full)?;
                        self.ram.write_word(usize::from(sp), value)?;
                        self.registers.sp = top;
                    }
                }
                self.tick();
            }
            Opcode::Pop => {
                let width = self.fetch_width()?;
                let sp = self.registers.sp;
                match width {
                    Width::Byte => {
                        let dest = self.fetch_register_u8()?;
                        let top = sp
                            .checked_sub(1)
                            .ok_or(EmuError::StackUnderflow { sp, address })?;
                        let value = self.ram.read(usize::from(top))?;
                        self.ram.write(usize::from(top), 0)?;
                        self.registers.set8(dest, value);
                        self.registers.sp = top;
                    }
                    Width::Word => {
                        let dest = self.fetch_register_u16()?;
                        let top = sp
                            .checked_sub(2)
                            .ok_or(EmuError::StackUnderflow { sp, address })?;
                        let value = self.ram.read_word(usize::from(top))?;
                        self.ram.write_word(usize::from(top), 0)?;
                        self.registers.set16(dest, value);
                        self.registers.sp = top;
                    }
                }
            }
            Opcode::Stb => {
                let target = self.fetch_register_u16()?;
                let value = match self.fetch_store_mode()? {
                    StoreMode::Imm => self.fetch_byte()?,
                    StoreMode::Reg => {
                        let src = self.fetch_register_u8()?;
                        self.registers.get8(src)
                    }
                };
                self.ram
                    .write(usize::from(self.registers.get16(target)), value)?;
                self.tick();
            }
            Opcode::Stw => {
                let target = self.fetch_register_u16()?;
                let value = match self.fetch_store_mode()? {
                    StoreMode::Imm => self.fetch_word()?,
                    StoreMode::Reg => {
                        let src = self.fetch_register_u16()?;
                        self.registers.get16(src)
                    }
                };
                self.ram
                    .write_word(usize::from(self.registers.get16(target)), value)?;
                self.tick();
            }
            Opcode::Ldb => {
                let dest = self.fetch_register_u8()?;
                let src = self.fetch_register_u16()?;
                let value = self.ram.read(usize::from(self.registers.get16(src)))?;
                self.registers.set8(dest, value);
            }
            Opcode::Ldw => {
                let dest = self.fetch_register_u16()?;
                let src = self.fetch_register_u16()?;
                let value = self
                    .ram
                    .read_word(usize::from(self.registers.get16(src)))?;
                self.registers.set16(dest, value);
            }
            Opcode::Add
            | Opcode::Adc
            | Opcode::Sub
            | Opcode::Sbb
            | Opcode::Mul
            | Opcode::Div => {
                let mode = AluMode::from_opcode(op)
                    .ok_or(EmuError::InvalidOpcode { opcode, address })?;
                let dest = self.fetch_register_u16()?;
                let left = self.fetch_register_u16()?;
                let right = self.fetch_register_u16()?;
                let out = self.alu(
                    mode,
                    self.registers.get16(left),
                    self.registers.get16(right),
                    address,
                )?;
                self.registers.set16(dest, out.result);
                if mode.sets_flags() {
                    out.apply(&mut self.flags);
                }
            }
            Opcode::Addb
            | Opcode::Adcb
            | Opcode::Subb
            | Opcode::Sbbb
            | Opcode::Mulb
            | Opcode::Divb => {
                let mode = AluMode::from_opcode(op)
                    .ok_or(EmuError::InvalidOpcode { opcode, address })?;
                let dest = self.fetch_register_u8()?;
                let left = self.fetch_register_u8()?;
                let right = self.fetch_register_u8()?;
                let out = self.alu(
                    mode,
                    self.registers.get8(left),
                    self.registers.get8(right),
                    address,
                )?;
                self.registers.set8(dest, out.result);
                if mode.sets_flags() {
                    out.apply(&mut self.flags);
                }
            }
            Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Not
            | Opcode::Shl
            | Opcode::Shr => {
                let mode = AluMode::from_opcode(op)
                    .ok_or(EmuError::InvalidOpcode { opcode, address })?;
                match self.fetch_width()? {
                    Width::Word => {
                        let dest = self.fetch_register_u16()?;
                        let left = self.fetch_register_u16()?;
                        let right = if mode == AluMode::Not {
                            left
                        } else {
                            self.fetch_register_u16()?
                        };
                        let out = self.alu(
                            mode,
                            self.registers.get16(left),
                            self.registers.get16(right),
                            address,
                        )?;
                        self.registers.set16(dest, out.result);
                    }
                    Width::Byte => {
                        let dest = self.fetch_register_u8()?;
                        let left = self.fetch_register_u8()?;
                        let right = if mode == AluMode::Not {
                            left
                        } else {
                            self.fetch_register_u8()?
                        };
                        let out = self.alu(
                            mode,
                            self.registers.get8(left),
                            self.registers.get8(right),
                            address,
                        )?;
                        self.registers.set8(dest, out.result);
                    }
                }
            }
            Opcode::Equ => {
                let left = self.fetch_register_u16()?;
                let right = self.fetch_register_u16()?;
                let equal = self.registers.get16(left) == self.registers.get16(right);
                self.flags.set(Flags::EQUAL, equal);
            }
            Opcode::Jz | Opcode::Jnz | Opcode::Jmp => {
                let target = CODE_BASE.wrapping_add(self.fetch_word()?);
                let equal = self.flags.contains(Flags::EQUAL);
                // JZ branches on a *clear* equal flag
                let taken = match op {
                    Opcode::Jz => !equal,
                    Opcode::Jnz => equal,
                    _ => true,
                };
                if taken {
                    self.registers.pc = target;
                    self.pc_past_end = false;
                }
            }
            Opcode::Hlt => {
                self.halted = true;
                diag!(
                    self.diag,
                    Debug,
                    "halted at 0x{:04X} after {} cycles",
                    address,
                    self.cycles
                );
            }
        }
        Ok(())
    }
}

impl<D: Diagnostics> fmt::Display for Cpu<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.registers)?;
        write!(f, "FLAGS={} CYCLES={}", self.flags, self.cycles)
    }
}
