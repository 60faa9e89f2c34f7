use std::fmt;

/// The kind of a token produced by the expression lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A comparison operator (`==`, `!=`, `<>`, `<`, `<=`, `>`, `>=`, `contains`)
    Comparison,
    /// An identifier.
    Id,
    /// A quoted string including the quotes.
    String,
    /// An integer or float literal.
    Number,
    /// The pipe symbol.
    Pipe,
    /// The dot operator (`.`)
    Dot,
    /// The colon operator (`:`)
    Colon,
    /// The comma operator (`,`)
    Comma,
    /// Open bracket
    OpenSquare,
    /// Close bracket
    CloseSquare,
    /// Open parenthesis
    OpenRound,
    /// Close parenthesis
    CloseRound,
    /// The question mark (`?`)
    Question,
    /// A dash that does not start a number.
    Dash,
    /// The range operator (`..`)
    DotDot,
    /// Marks the end of the input.
    EndOfString,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Comparison => "comparison",
            TokenKind::Id => "id",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Pipe => "pipe",
            TokenKind::Dot => "dot",
            TokenKind::Colon => "colon",
            TokenKind::Comma => "comma",
            TokenKind::OpenSquare => "open_square",
            TokenKind::CloseSquare => "close_square",
            TokenKind::OpenRound => "open_round",
            TokenKind::CloseRound => "close_round",
            TokenKind::Question => "question",
            TokenKind::Dash => "dash",
            TokenKind::DotDot => "dotdot",
            TokenKind::EndOfString => "end_of_string",
        })
    }
}

/// Represents a token in the expression stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str) -> Token<'a> {
        Token { kind, text }
    }
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::EndOfString => write!(f, "{}", self.kind),
            _ => write!(f, "{} '{}'", self.kind, self.text),
        }
    }
}
