//! Lexer for synthetic-variable expressions

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::error::{CalcError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(Decimal),
    Ident(String),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::Str(s) => write!(f, "string \"{}\"", s),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Ge => f.write_str("'>='"),
            TokenKind::Le => f.write_str("'<='"),
            TokenKind::Eq => f.write_str("'=='"),
            TokenKind::Ne => f.write_str("'!='"),
            TokenKind::Eof => f.write_str("end of expression"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset in the source text
    pub pos: usize,
}

/// Split an expression into tokens, always terminated by `Eof`
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let kind = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            },
            b'+' => single(&mut i, TokenKind::Plus),
            b'-' => single(&mut i, TokenKind::Minus),
            b'*' => single(&mut i, TokenKind::Star),
            b'/' => single(&mut i, TokenKind::Slash),
            b'(' => single(&mut i, TokenKind::LParen),
            b')' => single(&mut i, TokenKind::RParen),
            b',' => single(&mut i, TokenKind::Comma),
            b'>' | b'<' | b'=' | b'!' => {
                let followed_by_eq = bytes.get(i + 1) == Some(&b'=');
                i += if followed_by_eq { 2 } else { 1 };
                match (c, followed_by_eq) {
                    (b'>', true) => TokenKind::Ge,
                    (b'>', false) => TokenKind::Gt,
                    (b'<', true) => TokenKind::Le,
                    (b'<', false) => TokenKind::Lt,
                    (b'=', true) => TokenKind::Eq,
                    (b'!', true) => TokenKind::Ne,
                    _ => {
                        return Err(CalcError::parse(format!(
                            "unexpected '{}' at position {} (did you mean '{}='?)",
                            c as char, start, c as char
                        )))
                    },
                }
            },
            b'"' | b'\'' => {
                let quote = c;
                i += 1;
                let content_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(CalcError::parse(format!(
                        "unterminated string literal at position {}",
                        start
                    )));
                }
                let literal = input[content_start..i].to_string();
                i += 1; // closing quote
                TokenKind::Str(literal)
            },
            b'0'..=b'9' | b'.' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'.' {
                    i += 1;
                    let fraction_start = i;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                    if i == fraction_start {
                        return Err(CalcError::parse(format!(
                            "malformed number '{}' at position {}",
                            &input[start..i],
                            start
                        )));
                    }
                }
                let text = &input[start..i];
                let value = if text.starts_with('.') {
                    Decimal::from_str(&format!("0{}", text))
                } else {
                    Decimal::from_str(text)
                }
                .map_err(|e| {
                    CalcError::parse(format!("invalid number '{}' at position {}: {}", text, start, e))
                })?;
                // Digits past 28 decimal places are rounded away by the parser
                if value.is_zero() && text.bytes().any(|b| (b'1'..=b'9').contains(&b)) {
                    return Err(CalcError::parse(format!(
                        "number '{}' at position {} is too small to represent",
                        text, start
                    )));
                }
                TokenKind::Number(value)
            },
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                TokenKind::Ident(input[start..i].to_string())
            },
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(CalcError::parse(format!(
                    "unexpected character '{}' at position {}",
                    ch, start
                )));
            },
        };
        tokens.push(Token { kind, pos: start });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: input.len(),
    });
    Ok(tokens)
}

fn single(i: &mut usize, kind: TokenKind) -> TokenKind {
    *i += 1;
    kind
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_operators_and_whitespace() {
        assert_eq!(
            kinds(" a>=1 <= 2!=3==4 < 5 >6 "),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ge,
                TokenKind::Number(Decimal::from(1)),
                TokenKind::Le,
                TokenKind::Number(Decimal::from(2)),
                TokenKind::Ne,
                TokenKind::Number(Decimal::from(3)),
                TokenKind::Eq,
                TokenKind::Number(Decimal::from(4)),
                TokenKind::Lt,
                TokenKind::Number(Decimal::from(5)),
                TokenKind::Gt,
                TokenKind::Number(Decimal::from(6)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_decimal_literals_are_exact() {
        assert_eq!(
            kinds("0.1 .5 12.250"),
            vec![
                TokenKind::Number(Decimal::from_str("0.1").unwrap()),
                TokenKind::Number(Decimal::from_str("0.5").unwrap()),
                TokenKind::Number(Decimal::from_str("12.250").unwrap()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_literal_below_smallest_scale_is_rejected() {
        let err = tokenize("0.00000000000000000000000000000001").unwrap_err();
        assert!(matches!(err, CalcError::Parse(_)), "{err:?}");
        assert!(matches!(tokenize("1 / .000000000000000000000000000000005"), Err(CalcError::Parse(_))));

        assert_eq!(
            kinds("0.000 0.0000000000000000000000000001"),
            vec![
                TokenKind::Number(Decimal::ZERO),
                TokenKind::Number(Decimal::new(1, 28)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_call_with_string_literals() {
        assert_eq!(
            kinds("avg(\"voltage\", '1h')"),
            vec![
                TokenKind::Ident("avg".into()),
                TokenKind::LParen,
                TokenKind::Str("voltage".into()),
                TokenKind::Comma,
                TokenKind::Str("1h".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("log10(x)").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("log10".into()));
        assert_eq!(tokens[1].pos, 5);
        assert_eq!(tokens[2].pos, 6);
        assert_eq!(tokens[4].pos, 8);
    }

    #[test]
    fn test_lexical_errors() {
        for input in ["a = b", "!a", "1.", "\"open", "a # b", "temp°"] {
            let err = tokenize(input).unwrap_err();
            assert!(matches!(err, CalcError::Parse(_)), "{input}");
        }
    }
}
