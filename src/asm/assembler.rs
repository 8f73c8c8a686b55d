use crate::{
    asm::{lexer::tokenize, AsmError, Token, TokenKind},
    diag::{diag, Diagnostics, LogSink},
    plat::{self, InstrDesc, Operand, Register, Shape, StoreMode, Width},
};

use super::labels::LabelTable;

/// How label references are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// One forward pass; a label may only be referenced after it is defined.
    #[default]
    SinglePass,
    /// Collects every label first, so forward references resolve too.
    TwoPass,
}

/// What one step of the location counter means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AddressUnit {
    /// One step per encoded instruction, regardless of its size.
    #[default]
    Instructions,
    /// One step per encoded byte, so label values are real offsets from the code base.
    Bytes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AssemblerOptions {
    pub resolution: Resolution,
    pub address_unit: AddressUnit,
}

/// The output of one assembly run.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// The binary image: raw opcode/operand bytes, no header.
    pub image: Vec<u8>,
    pub labels: LabelTable,
    pub instructions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassMode {
    /// Define labels as they appear and resolve references against what is defined so far.
    Single,
    /// Define labels, but don't resolve references.
    Collect,
    /// Labels are already known; only resolve references.
    Emit,
}

struct Pass<'t, 'd, D: Diagnostics> {
    tokens: &'t [Token],
    pos: usize,
    mode: PassMode,
    unit: AddressUnit,
    /// Kept wider than 16 bits so running off the end is only an error if something is placed there.
    location: u32,
    labels: LabelTable,
    out: Vec<u8>,
    instructions: usize,
    diag: &'d mut D,
}

impl<'t, 'd, D: Diagnostics> Pass<'t, 'd, D> {
    fn new(
        tokens: &'t [Token],
        mode: PassMode,
        unit: AddressUnit,
        labels: LabelTable,
        diag: &'d mut D,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            mode,
            unit,
            location: 0,
            labels,
            out: vec![],
            instructions: 0,
            diag,
        }
    }

    fn next(&mut self) -> Result<&'t Token, AsmError> {
        let tokens = self.tokens;
        match tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok)
            }
            None => Err(AsmError::UnexpectedEof {
                after: tokens.last().map(|t| t.text.clone()).unwrap_or_default(),
            }),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<&'t Token, AsmError> {
        let tok = self.next()?;
        if tok.kind == kind {
            Ok(tok)
        } else {
            Err(unexpected(expected, tok))
        }
    }

    fn location_u16(&self, loc: (usize, usize)) -> Result<u16, AsmError> {
        u16::try_from(self.location).map_err(|_| AsmError::LocationOverflow { loc })
    }

    fn run(&mut self) -> Result<(), AsmError> {
        let tokens = self.tokens;
        while let Some(tok) = tokens.get(self.pos) {
            self.pos += 1;
            if self.mode != PassMode::Emit {
                diag!(self.diag, Trace, "{}", tok);
            }
            match tok.kind {
                TokenKind::Org => {
                    let value = self.expect(TokenKind::Hex, "hex")?;
                    self.location = u32::from(parse_hex(value)?);
                }
                TokenKind::Ident => {
                    match tokens.get(self.pos) {
                        Some(t) if t.kind == TokenKind::Colon => self.pos += 1,
                        Some(t) => return Err(unexpected("colon", t)),
                        None => {
                            return Err(AsmError::UnexpectedEof {
                                after: tok.text.clone(),
                            })
                        }
                    }
                    self.define_label(tok)?;
                }
                TokenKind::Opcode => self.instruction(tok)?,
                TokenKind::Section => {
                    if self.mode != PassMode::Emit {
                        diag!(self.diag, Warn, "SECTION at {:?} is reserved and has no effect", tok.loc);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn define_label(&mut self, tok: &Token) -> Result<(), AsmError> {
        if self.mode == PassMode::Emit {
            return Ok(());
        }
        let address = self.location_u16(tok.loc)?;
        if self.labels.define(&tok.text, address).is_some() {
            return Err(AsmError::DuplicateLabel {
                name: tok.text.clone(),
                loc: tok.loc,
            });
        }
        diag!(self.diag, Debug, "label {} = 0x{:04X}", tok.text, address);
        Ok(())
    }

    fn instruction(&mut self, tok: &Token) -> Result<(), AsmError> {
        let desc: &InstrDesc = plat::lookup(&tok.text).ok_or_else(|| unexpected("opcode", tok))?;
        self.location_u16(tok.loc)?;
        let start = self.out.len();
        self.out.push(desc.opcode as u8);

        match desc.shape {
            Shape::Fixed(operands) => {
                for operand in operands {
                    self.operand(*operand)?;
                }
            }
            Shape::Push => match self.width()? {
                Width::Byte => self.operand(Operand::Imm8)?,
                Width::Word => self.operand(Operand::Imm16)?,
            },
            Shape::Pop => {
                let width = self.width()?;
                self.register(width)?;
            }
            Shape::Store(width) => {
                self.register(Width::Word)?;
                let src = self.next()?;
                match src.kind {
                    TokenKind::Number => {
                        self.out.push(StoreMode::Imm as u8);
                        let bits = match width {
                            Width::Byte => 8,
                            Width::Word => 16,
                        };
                        self.immediate(src, bits)?;
                    }
                    TokenKind::Ident => {
                        self.out.push(StoreMode::Reg as u8);
                        self.register_token(src, width)?;
                    }
                    _ => return Err(unexpected("number or register", src)),
                }
            }
            Shape::Bitwise(count) => {
                let width = self.width()?;
                for _ in 0..count {
                    self.register(width)?;
                }
            }
        }

        let size = self.out.len() - start;
        self.instructions += 1;
        self.location += match self.unit {
            AddressUnit::Instructions => 1,
            AddressUnit::Bytes => size as u32,
        };
        Ok(())
    }

    fn operand(&mut self, operand: Operand) -> Result<(), AsmError> {
        match operand {
            Operand::Imm8 => {
                let tok = self.expect(TokenKind::Number, "number")?;
                self.immediate(tok, 8)
            }
            Operand::Imm16 => {
                let tok = self.expect(TokenKind::Number, "number")?;
                self.immediate(tok, 16)
            }
            Operand::Label => {
                let tok = self.expect(TokenKind::Ident, "label")?;
                let address = match self.mode {
                    PassMode::Collect => 0,
                    PassMode::Single | PassMode::Emit => {
                        self.labels
                            .resolve(&tok.text)
                            .ok_or_else(|| AsmError::UndefinedLabel {
                                name: tok.text.clone(),
                                loc: tok.loc,
                            })?
                    }
                };
                self.out.extend_from_slice(&address.to_be_bytes());
                Ok(())
            }
            Operand::Reg16 => self.register(Width::Word),
            Operand::Reg8 => self.register(Width::Byte),
        }
    }

    fn immediate(&mut self, tok: &Token, bits: u32) -> Result<(), AsmError> {
        let value = parse_decimal(tok)?;
        if value >> bits != 0 {
            return Err(AsmError::ImmediateOverflow {
                text: tok.text.clone(),
                bits,
                loc: tok.loc,
            });
        }
        if bits == 8 {
            self.out.push(value as u8);
        } else {
            self.out.extend_from_slice(&(value as u16).to_be_bytes());
        }
        Ok(())
    }

    fn width(&mut self) -> Result<Width, AsmError> {
        let tok = self.expect(TokenKind::Ident, "BYTE or WORD")?;
        let width = Width::from_name(&tok.text).ok_or_else(|| AsmError::UnknownWidth {
            name: tok.text.clone(),
            loc: tok.loc,
        })?;
        self.out.push(width as u8);
        Ok(width)
    }

    fn register(&mut self, width: Width) -> Result<(), AsmError> {
        let tok = self.expect(TokenKind::Ident, "register")?;
        self.register_token(tok, width)
    }

    fn register_token(&mut self, tok: &Token, width: Width) -> Result<(), AsmError> {
        let reg = Register::from_name(&tok.text).ok_or_else(|| AsmError::UnknownRegister {
            name: tok.text.clone(),
            loc: tok.loc,
        })?;
        if reg.width() != width {
            return Err(AsmError::RegisterWidth {
                name: tok.text.clone(),
                expected: width,
                loc: tok.loc,
            });
        }
        self.out.push(reg.code());
        Ok(())
    }
}

fn unexpected(expected: &'static str, tok: &Token) -> AsmError {
    AsmError::UnexpectedToken {
        expected,
        found: tok.kind,
        text: tok.text.clone(),
        loc: tok.loc,
    }
}

/// Parses the leading decimal digits of a token, ignoring any non-numeric suffix.
fn parse_decimal(tok: &Token) -> Result<u64, AsmError> {
    let overflow = || AsmError::ImmediateOverflow {
        text: tok.text.clone(),
        bits: 16,
        loc: tok.loc,
    };
    tok.text
        .chars()
        .map_while(|c| c.to_digit(10))
        .try_fold(0u64, |acc, d| {
            acc.checked_mul(10)?.checked_add(u64::from(d))
        })
        .ok_or_else(overflow)
}

fn parse_hex(tok: &Token) -> Result<u16, AsmError> {
    let digits = tok.text.get(2..).unwrap_or_default();
    u16::from_str_radix(digits, 16).map_err(|_| AsmError::ImmediateOverflow {
        text: tok.text.clone(),
        bits: 16,
        loc: tok.loc,
    })
}

/// An assembly context capable of translating a source file into binary / machine code.
#[derive(Debug)]
pub struct Assembler<D: Diagnostics = LogSink> {
    options: AssemblerOptions,
    diag: D,
}

impl Default for Assembler<LogSink> {
    fn default() -> Self {
        Self::new(AssemblerOptions::default(), LogSink)
    }
}

impl<D: Diagnostics> Assembler<D> {
    pub fn new(options: AssemblerOptions, diag: D) -> Self {
        Self { options, diag }
    }

    /// Lexes and assembles program text.
    ///
    /// # Errors
    ///
    /// This function will return an error if the source fails to lex or assemble.
    pub fn assemble_source(&mut self, source: &str) -> Result<Assembly, AsmError> {
        let tokens = tokenize(source)?;
        self.assemble(&tokens)
    }

    /// Generates a binary image from a token sequence.
    ///
    /// # Errors
    ///
    /// This function will return an error for any malformed instruction, unknown register or
    /// unresolved label. Nothing is produced on error.
    pub fn assemble(&mut self, tokens: &[Token]) -> Result<Assembly, AsmError> {
        let unit = self.options.address_unit;
        let (out, labels, instructions) = match self.options.resolution {
            Resolution::SinglePass => {
                let mut pass = Pass::new(tokens, PassMode::Single, unit, LabelTable::new(), &mut self.diag);
                pass.run()?;
                (pass.out, pass.labels, pass.instructions)
            }
            Resolution::TwoPass => {
                let mut collect =
                    Pass::new(tokens, PassMode::Collect, unit, LabelTable::new(), &mut self.diag);
                collect.run()?;
                let labels = collect.labels;
                let mut emit = Pass::new(tokens, PassMode::Emit, unit, labels, &mut self.diag);
                emit.run()?;
                (emit.out, emit.labels, emit.instructions)
            }
        };
        diag!(
            self.diag,
            Info,
            "assembled {} instructions into {} bytes ({} labels)",
            instructions,
            out.len(),
            labels.len()
        );
        for label in labels.sorted() {
            diag!(self.diag, Debug, "symbol 0x{:04X} {}", label.address, label.name);
        }
        Ok(Assembly {
            image: out,
            labels,
            instructions,
        })
    }
}
