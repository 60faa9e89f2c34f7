use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::scanner::Scanner;
use crate::compiler::tokens::{Token, TokenKind};
use crate::error::Error;

static NUMBER_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A-?\d+(?:\.\d+)?").unwrap());
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A[a-zA-Z_][\w-]*\??").unwrap());
static STRING_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\A(?:'[^']*'|"[^"]*")"#).unwrap());

macro_rules! some_or_err {
    ($expr:expr, $scanner:expr, $start:expr) => {
        match $expr {
            Some(rv) => rv,
            None => return Err(unexpected_character($scanner, $start)),
        }
    };
}

fn special(byte: u8) -> Option<TokenKind> {
    Some(match byte {
        b'|' => TokenKind::Pipe,
        b'.' => TokenKind::Dot,
        b':' => TokenKind::Colon,
        b',' => TokenKind::Comma,
        b'[' => TokenKind::OpenSquare,
        b']' => TokenKind::CloseSquare,
        b'(' => TokenKind::OpenRound,
        b')' => TokenKind::CloseRound,
        b'?' => TokenKind::Question,
        b'-' => TokenKind::Dash,
        _ => return None,
    })
}

fn unexpected_character(scanner: &Scanner<'_>, start: usize) -> Error {
    let c = scanner.source()[start..].chars().next().unwrap_or(' ');
    Error::syntax(format!("Unexpected character {}", c))
}

/// Splits an expression into tokens.
///
/// The result always ends with an [`EndOfString`](TokenKind::EndOfString)
/// token.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, Error> {
    let mut scanner = Scanner::new(input);
    let mut output: Vec<Token<'_>> = Vec::new();

    loop {
        scanner.skip_whitespace();
        let start = scanner.pos();
        let peeked = match scanner.peek_byte() {
            Some(byte) => byte,
            None => break,
        };
        let text = |scanner: &Scanner<'_>| &input[start..scanner.pos()];

        if let Some(kind) = special(peeked) {
            scanner.scan_byte();
            if kind == TokenKind::Dot && scanner.peek_byte() == Some(b'.') {
                scanner.scan_byte();
                output.push(Token::new(TokenKind::DotDot, text(&scanner)));
            } else if kind == TokenKind::Dash
                && scanner.peek_byte().map_or(false, |b| b.is_ascii_digit())
            {
                scanner.set_pos(start);
                let number = some_or_err!(scanner.scan(&NUMBER_LITERAL), &scanner, start);
                output.push(Token::new(TokenKind::Number, number));
            } else {
                output.push(Token::new(kind, text(&scanner)));
            }
            continue;
        }

        match peeked {
            // these need a second character
            b'=' | b'!' => {
                scanner.scan_byte();
                if scanner.peek_byte() == Some(b'=') {
                    scanner.scan_byte();
                    output.push(Token::new(TokenKind::Comparison, text(&scanner)));
                } else {
                    return Err(unexpected_character(&scanner, start));
                }
            }
            b'<' | b'>' => {
                scanner.scan_byte();
                match (peeked, scanner.peek_byte()) {
                    (_, Some(b'=')) | (b'<', Some(b'>')) => {
                        scanner.scan_byte();
                    }
                    _ => {}
                }
                output.push(Token::new(TokenKind::Comparison, text(&scanner)));
            }
            b'0'..=b'9' => {
                let number = some_or_err!(scanner.scan(&NUMBER_LITERAL), &scanner, start);
                output.push(Token::new(TokenKind::Number, number));
            }
            b'\'' | b'"' => {
                let string = some_or_err!(scanner.scan(&STRING_LITERAL), &scanner, start);
                output.push(Token::new(TokenKind::String, string));
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let ident = some_or_err!(scanner.scan(&IDENTIFIER), &scanner, start);
                let after_dot = output.last().map_or(false, |x| x.kind == TokenKind::Dot);
                if ident == "contains" && !after_dot {
                    output.push(Token::new(TokenKind::Comparison, ident));
                } else {
                    output.push(Token::new(TokenKind::Id, ident));
                }
            }
            _ => return Err(unexpected_character(&scanner, start)),
        }
    }

    output.push(Token::new(TokenKind::EndOfString, ""));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn kinds(input: &str) -> Vec<(TokenKind, &str)> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|x| (x.kind, x.text))
            .collect()
    }

    #[test]
    fn test_basic() {
        assert_eq!(
            kinds("product.title | append: 'x', \"y\""),
            vec![
                (TokenKind::Id, "product"),
                (TokenKind::Dot, "."),
                (TokenKind::Id, "title"),
                (TokenKind::Pipe, "|"),
                (TokenKind::Id, "append"),
                (TokenKind::Colon, ":"),
                (TokenKind::String, "'x'"),
                (TokenKind::Comma, ","),
                (TokenKind::String, "\"y\""),
                (TokenKind::EndOfString, ""),
            ]
        );
    }

    #[test]
    fn test_numbers_and_ranges() {
        assert_eq!(
            kinds("(-1..2.5) - x"),
            vec![
                (TokenKind::OpenRound, "("),
                (TokenKind::Number, "-1"),
                (TokenKind::DotDot, ".."),
                (TokenKind::Number, "2.5"),
                (TokenKind::CloseRound, ")"),
                (TokenKind::Dash, "-"),
                (TokenKind::Id, "x"),
                (TokenKind::EndOfString, ""),
            ]
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            kinds("a == b != c <> d < e <= f > g >= h contains i"),
            vec![
                (TokenKind::Id, "a"),
                (TokenKind::Comparison, "=="),
                (TokenKind::Id, "b"),
                (TokenKind::Comparison, "!="),
                (TokenKind::Id, "c"),
                (TokenKind::Comparison, "<>"),
                (TokenKind::Id, "d"),
                (TokenKind::Comparison, "<"),
                (TokenKind::Id, "e"),
                (TokenKind::Comparison, "<="),
                (TokenKind::Id, "f"),
                (TokenKind::Comparison, ">"),
                (TokenKind::Id, "g"),
                (TokenKind::Comparison, ">="),
                (TokenKind::Id, "h"),
                (TokenKind::Comparison, "contains"),
                (TokenKind::Id, "i"),
                (TokenKind::EndOfString, ""),
            ]
        );
    }

    #[test]
    fn test_contains_after_dot_is_identifier() {
        assert_eq!(
            kinds("a.contains"),
            vec![
                (TokenKind::Id, "a"),
                (TokenKind::Dot, "."),
                (TokenKind::Id, "contains"),
                (TokenKind::EndOfString, ""),
            ]
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            kinds("foo-bar baz?"),
            vec![
                (TokenKind::Id, "foo-bar"),
                (TokenKind::Id, "baz?"),
                (TokenKind::EndOfString, ""),
            ]
        );
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a = b").unwrap_err();
        assert_eq!(err.message(), "Unexpected character =");
        let err = tokenize("a % b").unwrap_err();
        assert_eq!(err.message(), "Unexpected character %");
        let err = tokenize("'unterminated").unwrap_err();
        assert_eq!(err.message(), "Unexpected character '");
    }
}
