use nom::{
    branch::alt,
    bytes::complete::{take, take_while},
    character::complete::{multispace1, one_of, satisfy},
    combinator::{map, recognize, value},
    multi::many0,
    sequence::pair,
    IResult,
};

use crate::plat;

use super::{LexError, Span, Token, TokenKind};

pub const PUNCTUATION: &str = "()[]{}:;_";

fn loc(span: &Span) -> (usize, usize) {
    (span.location_line() as usize, span.get_utf8_column())
}

/// Classifies a maximal letter-initial alphanumeric run.
pub fn lex_word(inp: Span) -> IResult<Span, Option<Token>> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric()),
        )),
        |span: Span| {
            let text = *span.fragment();
            let kind = if plat::lookup(text).is_some() {
                TokenKind::Opcode
            } else if text == "ORG" {
                TokenKind::Org
            } else if text == "SECTION" {
                TokenKind::Section
            } else {
                TokenKind::Ident
            };
            Some(Token::new(kind, text, loc(&span)))
        },
    )(inp)
}

/// A maximal digit-initial alphanumeric run; a second character of `x`/`X` makes it [Hex][TokenKind::Hex].
pub fn lex_number(inp: Span) -> IResult<Span, Option<Token>> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_digit()),
            take_while(|c: char| c.is_ascii_alphanumeric()),
        )),
        |span: Span| {
            let text = *span.fragment();
            let kind = match text.as_bytes().get(1) {
                Some(b'x' | b'X') => TokenKind::Hex,
                _ => TokenKind::Number,
            };
            Some(Token::new(kind, text, loc(&span)))
        },
    )(inp)
}

pub fn lex_punctuation(inp: Span) -> IResult<Span, Option<Token>> {
    map(recognize(one_of(PUNCTUATION)), |span: Span| {
        let kind = match *span.fragment() {
            "(" => TokenKind::LParen,
            ")" => TokenKind::RParen,
            "[" => TokenKind::LBracket,
            "]" => TokenKind::RBracket,
            "{" => TokenKind::LBrace,
            "}" => TokenKind::RBrace,
            ":" => TokenKind::Colon,
            ";" => TokenKind::Semicolon,
            _ => TokenKind::Underscore,
        };
        Some(Token::new(kind, *span.fragment(), loc(&span)))
    })(inp)
}

/// Anything else is dropped on the floor.
pub fn lex_illegal(inp: Span) -> IResult<Span, Option<Token>> {
    value(None, take(1usize))(inp)
}

pub fn lex_lexeme(inp: Span) -> IResult<Span, Option<Token>> {
    alt((
        value(None, multispace1),
        lex_word,
        lex_number,
        lex_punctuation,
        lex_illegal,
    ))(inp)
}

fn check_hex(tok: &Token) -> Result<(), LexError> {
    let digits = tok
        .text
        .strip_prefix("0x")
        .or_else(|| tok.text.strip_prefix("0X"));
    match digits {
        Some(d) if !d.is_empty() && d.chars().all(|c| c.is_ascii_hexdigit()) => Ok(()),
        _ => Err(LexError::MalformedHex {
            text: tok.text.clone(),
            loc: tok.loc,
        }),
    }
}

/// Lexes assembly program text into a [Vec] of [Token]s, in source order.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let span = Span::new(source);
    let (rest, lexemes) = many0(lex_lexeme)(span).map_err(|e| {
        let span = match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
            nom::Err::Incomplete(_) => span,
        };
        LexError::Syntax { loc: loc(&span) }
    })?;
    if !rest.fragment().is_empty() {
        return Err(LexError::Syntax { loc: loc(&rest) });
    }

    let tokens: Vec<Token> = lexemes.into_iter().flatten().collect();
    for tok in tokens.iter().filter(|t| t.kind == TokenKind::Hex) {
        check_hex(tok)?;
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_program() {
        let prog = "
ORG 0x0000
start:
    LR0 82
    LR1 82
    JMP start
    HLT
";
        let toks = tokenize(prog).unwrap();
        let got: Vec<(TokenKind, &str)> = toks.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(
            got,
            vec![
                (TokenKind::Org, "ORG"),
                (TokenKind::Hex, "0x0000"),
                (TokenKind::Ident, "start"),
                (TokenKind::Colon, ":"),
                (TokenKind::Opcode, "LR0"),
                (TokenKind::Number, "82"),
                (TokenKind::Opcode, "LR1"),
                (TokenKind::Number, "82"),
                (TokenKind::Opcode, "JMP"),
                (TokenKind::Ident, "start"),
                (TokenKind::Opcode, "HLT"),
            ]
        );
        assert_eq!(toks[2].loc, (3, 1));
        assert_eq!(toks[4].loc, (4, 5));
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(
            kinds("SECTION section HLT hlt Hlt ORG org"),
            vec![
                TokenKind::Section,
                TokenKind::Ident,
                TokenKind::Opcode,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Org,
                TokenKind::Ident,
            ]
        );
    }

    #[test]
    fn test_every_mnemonic_is_an_opcode() {
        for desc in plat::INSTRUCTIONS {
            assert_eq!(kinds(desc.mnemonic), vec![TokenKind::Opcode]);
        }
    }

    #[test]
    fn test_punctuation_and_garbage() {
        assert_eq!(
            kinds("( ) [ ] { } : ; _ @ # ! ,"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Underscore,
            ]
        );
        // underscores split identifiers
        assert_eq!(
            kinds("my_label:"),
            vec![
                TokenKind::Ident,
                TokenKind::Underscore,
                TokenKind::Ident,
                TokenKind::Colon
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let toks = tokenize("7 0x1F 0XAB 42abc").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Number);
        assert_eq!(toks[1].kind, TokenKind::Hex);
        assert_eq!(toks[2].kind, TokenKind::Hex);
        assert_eq!(toks[3].kind, TokenKind::Number);
        assert_eq!(toks[3].text, "42abc");
    }

    #[test]
    fn test_malformed_hex() {
        assert_eq!(
            tokenize("ORG 0x"),
            Err(LexError::MalformedHex {
                text: "0x".into(),
                loc: (1, 5)
            })
        );
        assert!(matches!(
            tokenize("0xZZ"),
            Err(LexError::MalformedHex { .. })
        ));
        assert!(matches!(
            tokenize("1x10"),
            Err(LexError::MalformedHex { .. })
        ));
    }

    #[test]
    fn test_empty_source() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("  \n\t  ").unwrap().is_empty());
    }
}
