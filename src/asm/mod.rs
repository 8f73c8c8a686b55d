//! The assembler module for RASM-16.

use std::fmt;

use nom_locate::LocatedSpan;
use thiserror::Error;

use crate::plat::Width;

pub mod assembler;
pub mod labels;
pub mod lexer;

pub type Span<'a> = LocatedSpan<&'a str>;

/// An error produced while lexing source text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("malformed hex literal `{text}` at ({}:{})", .loc.0, .loc.1)]
    MalformedHex { text: String, loc: (usize, usize) },
    #[error("syntax error at ({}:{})", .loc.0, .loc.1)]
    Syntax { loc: (usize, usize) },
}

/// An error for the assembler module of RASM-16.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected end of input after `{after}`")]
    UnexpectedEof { after: String },
    #[error("expected {expected}, got {found} `{text}` at ({}:{})", .loc.0, .loc.1)]
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
        text: String,
        loc: (usize, usize),
    },
    #[error("undefined label `{name}` at ({}:{})", .loc.0, .loc.1)]
    UndefinedLabel { name: String, loc: (usize, usize) },
    #[error("duplicate label `{name}` at ({}:{})", .loc.0, .loc.1)]
    DuplicateLabel { name: String, loc: (usize, usize) },
    #[error("unknown register `{name}` at ({}:{})", .loc.0, .loc.1)]
    UnknownRegister { name: String, loc: (usize, usize) },
    #[error("register `{name}` is not a {expected} register at ({}:{})", .loc.0, .loc.1)]
    RegisterWidth {
        name: String,
        expected: Width,
        loc: (usize, usize),
    },
    #[error("unknown width `{name}` (must be BYTE or WORD) at ({}:{})", .loc.0, .loc.1)]
    UnknownWidth { name: String, loc: (usize, usize) },
    #[error("immediate value `{text}` does not fit in {bits} bits at ({}:{})", .loc.0, .loc.1)]
    ImmediateOverflow {
        text: String,
        bits: u32,
        loc: (usize, usize),
    },
    #[error("location counter overflowed 0xFFFF at ({}:{})", .loc.0, .loc.1)]
    LocationOverflow { loc: (usize, usize) },
}

/// The kind of an assembly language [Token].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A mnemonic listed in [INSTRUCTIONS][crate::plat::INSTRUCTIONS].
    Opcode,
    /// The `ORG` origin directive.
    Org,
    /// The reserved `SECTION` keyword.
    Section,
    Ident,
    /// Decimal literal.
    Number,
    /// `0x`-prefixed literal.
    Hex,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Semicolon,
    Underscore,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opcode => "opcode",
            Self::Org => "org",
            Self::Section => "section",
            Self::Ident => "ident",
            Self::Number => "number",
            Self::Hex => "hex",
            Self::LParen => "lparen",
            Self::RParen => "rparen",
            Self::LBracket => "lbracket",
            Self::RBracket => "rbracket",
            Self::LBrace => "lbrace",
            Self::RBrace => "rbrace",
            Self::Colon => "colon",
            Self::Semicolon => "semicolon",
            Self::Underscore => "underscore",
        };
        write!(f, "{}", s)
    }
}

/// An assembly language token. Output for the lexer, input for the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based (line, column) of the first character.
    pub loc: (usize, usize),
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, loc: (usize, usize)) -> Self {
        Self {
            kind,
            text: text.into(),
            loc,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.kind, self.text)
    }
}
