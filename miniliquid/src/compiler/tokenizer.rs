use crate::compiler::scanner::Scanner;

/// Splits template source into text, tag and variable tokens.
///
/// Tokens are slices of the source: `{% ... %}` for tags, `{{ ... }}`
/// for variables, everything else is text.  Unterminated tags and
/// variables come back as the bare `"{%"` / `"{{"` fragment so the
/// parser can report them.
///
/// In liquid-tag mode (the body of `{% liquid %}`) the source is split
/// into lines instead and each line is one token.
#[derive(Debug)]
pub struct Tokenizer<'s> {
    tokens: Vec<&'s str>,
    offset: usize,
    line_number: Option<usize>,
    for_liquid_tag: bool,
}

impl<'s> Tokenizer<'s> {
    /// Tokenizes a document.
    pub fn new(source: &'s str, line_numbers: bool) -> Tokenizer<'s> {
        Tokenizer::with_options(source, if line_numbers { Some(1) } else { None }, false)
    }

    /// Tokenizes with an explicit starting line and mode.
    pub fn with_options(
        source: &'s str,
        line_number: Option<usize>,
        for_liquid_tag: bool,
    ) -> Tokenizer<'s> {
        let tokens = if for_liquid_tag {
            source.split('\n').collect()
        } else {
            let mut scanner = Scanner::new(source);
            let mut tokens = Vec::new();
            while !scanner.is_eos() {
                tokens.push(next_token(&mut scanner));
            }
            tokens
        };
        Tokenizer {
            tokens,
            offset: 0,
            line_number,
            for_liquid_tag,
        }
    }

    /// Returns the next token and advances the line counter past it.
    pub fn shift(&mut self) -> Option<&'s str> {
        let token = some!(self.tokens.get(self.offset).copied());
        self.offset += 1;
        if let Some(ref mut line_number) = self.line_number {
            *line_number += if self.for_liquid_tag {
                1
            } else {
                token.bytes().filter(|&b| b == b'\n').count()
            };
        }
        Some(token)
    }

    /// The line number after the last shifted token.
    pub fn line_number(&self) -> Option<usize> {
        self.line_number
    }

    /// Is this tokenizer splitting the body of a `{% liquid %}` tag?
    pub fn for_liquid_tag(&self) -> bool {
        self.for_liquid_tag
    }
}

fn next_token<'s>(scanner: &mut Scanner<'s>) -> &'s str {
    if scanner.peek_byte() == Some(b'{') {
        scanner.scan_byte();
        match scanner.peek_byte() {
            Some(b'%') => {
                scanner.scan_byte();
                return next_tag_token(scanner);
            }
            Some(b'{') => {
                scanner.scan_byte();
                return next_variable_token(scanner);
            }
            _ => scanner.set_pos(scanner.pos() - 1),
        }
    }
    next_text_token(scanner)
}

fn next_text_token<'s>(scanner: &mut Scanner<'s>) -> &'s str {
    let start = scanner.pos();
    let rest = scanner.rest().as_bytes();
    let found = rest
        .windows(2)
        .position(|w| w[0] == b'{' && (w[1] == b'{' || w[1] == b'%'));
    match found {
        // a token can never be empty; a lone `{` that is not followed by
        // `{` or `%` stays part of the text
        Some(idx) => {
            scanner.set_pos(start + idx);
            &scanner.source()[start..start + idx]
        }
        None => scanner.terminate(),
    }
}

fn next_variable_token<'s>(scanner: &mut Scanner<'s>) -> &'s str {
    let start = scanner.pos() - 2;
    let source = scanner.source();
    let mut byte_a = scanner.scan_byte();
    let mut byte_b = byte_a;
    while byte_b.is_some() {
        while let Some(b) = byte_a {
            if b == b'}' || b == b'{' {
                break;
            }
            byte_a = scanner.scan_byte();
        }
        let a = match byte_a {
            Some(a) => a,
            None => break,
        };
        if scanner.is_eos() {
            return if a == b'}' {
                &source[start..scanner.pos()]
            } else {
                "{{"
            };
        }
        byte_b = scanner.scan_byte();
        if a == b'}' {
            if byte_b != Some(b'}') {
                // a single `}` ends the variable, the next byte is not ours
                scanner.set_pos(scanner.pos() - 1);
            }
            return &source[start..scanner.pos()];
        } else if a == b'{' && byte_b == Some(b'%') {
            return next_tag_token_with_start(scanner, start);
        }
        byte_a = byte_b;
    }
    "{{"
}

fn next_tag_token<'s>(scanner: &mut Scanner<'s>) -> &'s str {
    let start = scanner.pos() - 2;
    match scanner.skip_until("%}") {
        Some(len) => &scanner.source()[start..start + len + 2],
        None => "{%",
    }
}

fn next_tag_token_with_start<'s>(scanner: &mut Scanner<'s>, start: usize) -> &'s str {
    scanner.skip_until("%}");
    &scanner.source()[start..scanner.pos()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn tokenize(source: &str) -> Vec<&str> {
        let mut tokenizer = Tokenizer::new(source, false);
        let mut rv = Vec::new();
        while let Some(token) = tokenizer.shift() {
            rv.push(token);
        }
        rv
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(tokenize(""), Vec::<&str>::new());
        assert_eq!(tokenize(" "), vec![" "]);
        assert_eq!(tokenize("hello world"), vec!["hello world"]);
        assert_eq!(
            tokenize("hi {{ name }} and {% if x %}y{% endif %}"),
            vec!["hi ", "{{ name }}", " and ", "{% if x %}", "y", "{% endif %}"]
        );
    }

    #[test]
    fn test_unterminated() {
        assert_eq!(tokenize("{{ oops"), vec!["{{"]);
        assert_eq!(tokenize("{% oops"), vec!["{%", " oops"]);
        assert_eq!(tokenize("a { b"), vec!["a { b"]);
    }

    #[test]
    fn test_tag_inside_variable() {
        assert_eq!(
            tokenize("{{ a {% if %} }} rest"),
            vec!["{{ a {% if %}", " }} rest"]
        );
    }

    #[test]
    fn test_single_closing_brace() {
        assert_eq!(tokenize("{{ a }b"), vec!["{{ a }", "b"]);
    }

    #[test]
    fn test_line_numbers() {
        let mut tokenizer = Tokenizer::new("a\nb{{ x }}\n\n{% y %}", true);
        assert_eq!(tokenizer.line_number(), Some(1));
        tokenizer.shift();
        assert_eq!(tokenizer.line_number(), Some(2));
        tokenizer.shift();
        tokenizer.shift();
        assert_eq!(tokenizer.line_number(), Some(4));
    }

    #[test]
    fn test_liquid_tag_mode() {
        let mut tokenizer = Tokenizer::with_options("echo a\nassign b = 1", Some(3), true);
        assert_eq!(tokenizer.shift(), Some("echo a"));
        assert_eq!(tokenizer.line_number(), Some(4));
        assert_eq!(tokenizer.shift(), Some("assign b = 1"));
        assert_eq!(tokenizer.shift(), None);
    }
}
