use crate::compiler::lexer::tokenize;
use crate::compiler::tokens::{Token, TokenKind};
use crate::error::Error;

/// A recursive descent parser over the expression tokens.
///
/// The parser does not build a tree.  It validates the markup against the
/// strict grammar and hands back canonical markup strings which are then
/// compiled with [`Expr::parse`](crate::compiler::expression::Expr::parse).
pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Tokenizes the input and creates a parser over it.
    pub fn new(input: &'a str) -> Result<Parser<'a>, Error> {
        Ok(Parser {
            tokens: ok!(tokenize(input)),
            pos: 0,
        })
    }

    fn current(&self) -> Token<'a> {
        match self.tokens.get(self.pos) {
            Some(token) => *token,
            None => Token::new(TokenKind::EndOfString, ""),
        }
    }

    /// Moves the cursor to an absolute token offset.
    pub fn jump(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// The current token offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Consumes the next token which must be of the given kind.
    pub fn consume(&mut self, kind: TokenKind) -> Result<&'a str, Error> {
        let token = self.current();
        if token.kind != kind {
            return Err(Error::syntax(format!(
                "Expected {} but found {}",
                kind, token.kind
            )));
        }
        self.pos += 1;
        Ok(token.text)
    }

    /// Consumes the next token whatever it is.
    pub fn consume_any(&mut self) -> &'a str {
        let token = self.current();
        self.pos += 1;
        token.text
    }

    /// Consumes the next token if it is of the given kind.
    pub fn consume_if(&mut self, kind: TokenKind) -> Option<&'a str> {
        let token = self.current();
        if token.kind == kind {
            self.pos += 1;
            Some(token.text)
        } else {
            None
        }
    }

    /// Consumes the next token if it is the identifier `name`.
    pub fn id(&mut self, name: &str) -> bool {
        let token = self.current();
        if token.kind == TokenKind::Id && token.text == name {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Checks the kind of the token `ahead` tokens from the cursor.
    pub fn look(&self, kind: TokenKind, ahead: usize) -> bool {
        self.tokens
            .get(self.pos + ahead)
            .map_or(false, |x| x.kind == kind)
    }

    /// Parses an expression and returns its canonical markup.
    pub fn expression(&mut self) -> Result<String, Error> {
        let token = self.current();
        match token.kind {
            TokenKind::Id => {
                self.pos += 1;
                let mut rv = token.text.to_string();
                rv.push_str(&ok!(self.variable_lookups()));
                Ok(rv)
            }
            TokenKind::OpenSquare => {
                self.pos += 1;
                let mut rv = String::from("[");
                rv.push_str(&ok!(self.expression()));
                rv.push_str(ok!(self.consume(TokenKind::CloseSquare)));
                rv.push_str(&ok!(self.variable_lookups()));
                Ok(rv)
            }
            TokenKind::String | TokenKind::Number => {
                self.pos += 1;
                Ok(token.text.to_string())
            }
            TokenKind::OpenRound => {
                self.pos += 1;
                let first = ok!(self.expression());
                ok!(self.consume(TokenKind::DotDot));
                let last = ok!(self.expression());
                ok!(self.consume(TokenKind::CloseRound));
                Ok(format!("({}..{})", first, last))
            }
            _ => Err(Error::syntax(format!("{} is not a valid expression", token))),
        }
    }

    /// Parses a filter argument which is either an expression or a
    /// keyword argument (`name: expression`).
    pub fn argument(&mut self) -> Result<String, Error> {
        let mut rv = String::new();
        if self.look(TokenKind::Id, 0) && self.look(TokenKind::Colon, 1) {
            rv.push_str(self.consume_any());
            rv.push_str(self.consume_any());
            rv.push(' ');
        }
        rv.push_str(&ok!(self.expression()));
        Ok(rv)
    }

    /// Parses a chain of `.name` and `[expression]` accessors.
    pub fn variable_lookups(&mut self) -> Result<String, Error> {
        let mut rv = String::new();
        loop {
            if self.look(TokenKind::OpenSquare, 0) {
                rv.push_str(self.consume_any());
                rv.push_str(&ok!(self.expression()));
                rv.push_str(ok!(self.consume(TokenKind::CloseSquare)));
            } else if self.look(TokenKind::Dot, 0) {
                rv.push_str(self.consume_any());
                rv.push_str(ok!(self.consume(TokenKind::Id)));
            } else {
                break;
            }
        }
        Ok(rv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_expressions() {
        let mut p = Parser::new("a.b[ 'c' ].d 42 \"s\" (1 .. x)").unwrap();
        assert_eq!(p.expression().unwrap(), "a.b['c'].d");
        assert_eq!(p.expression().unwrap(), "42");
        assert_eq!(p.expression().unwrap(), "\"s\"");
        assert_eq!(p.expression().unwrap(), "(1..x)");
        assert!(p.look(TokenKind::EndOfString, 0));
    }

    #[test]
    fn test_arguments() {
        let mut p = Parser::new("x, key: y.z").unwrap();
        assert_eq!(p.argument().unwrap(), "x");
        assert!(p.consume_if(TokenKind::Comma).is_some());
        assert_eq!(p.argument().unwrap(), "key: y.z");
    }

    #[test]
    fn test_errors() {
        let mut p = Parser::new("| x").unwrap();
        assert_eq!(
            p.expression().unwrap_err().message(),
            "pipe '|' is not a valid expression"
        );
        let mut p = Parser::new("a b").unwrap();
        p.expression().unwrap();
        assert_eq!(
            p.consume(TokenKind::EndOfString).unwrap_err().message(),
            "Expected end_of_string but found id"
        );
    }

    #[test]
    fn test_id() {
        let mut p = Parser::new("and or").unwrap();
        assert!(!p.id("or"));
        assert!(p.id("and"));
        assert!(p.id("or"));
    }
}
