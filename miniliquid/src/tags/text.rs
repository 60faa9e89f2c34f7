use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::ast::{Flow, Tag};
use crate::compiler::parse_context::ParseContext;
use crate::compiler::syntax::WHITESPACE_OR_NOTHING;
use crate::compiler::tokenizer::Tokenizer;
use crate::error::Error;
use crate::output::Output;
use crate::vm::Context;

static TAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A\{%-?\s*(\w+|#)").unwrap());
static LIQUID_TAG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A\s*(\w+|#)").unwrap());
static FULL_TOKEN_POSSIBLY_INVALID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A(.*)\{%-?\s*(\w+)\s*(.*)?-?%\}\z").unwrap());
static INLINE_COMMENT_INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*[^#\s]").unwrap());

fn ends_with_trim_marker(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() >= 3 && bytes[bytes.len() - 3] == b'-'
}

/// The `comment` tag.
///
/// Everything up to the matching `endcomment` is skipped without being
/// parsed, so the body may contain invalid markup.  Nested `comment` tags
/// must be balanced and `raw` blocks inside must be closed.
#[derive(Debug)]
pub struct Comment {
    name: String,
    line: Option<usize>,
}

impl Comment {
    /// Compiles a `comment` block.
    pub fn parse(
        name: &str,
        _markup: &str,
        tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let line = ctx.line_number();
        ok!(ctx.nested(|ctx| skip_comment_body(name, tokenizer, ctx)));
        Ok(Box::new(Comment {
            name: name.to_string(),
            line,
        }))
    }
}

fn skip_comment_body(
    block_name: &str,
    tokenizer: &mut Tokenizer<'_>,
    ctx: &mut ParseContext<'_>,
) -> Result<(), Error> {
    let end_name = format!("end{}", block_name);
    let mut depth = 1usize;
    while let Some(token) = tokenizer.shift() {
        let caps = if tokenizer.for_liquid_tag() {
            if WHITESPACE_OR_NOTHING.is_match(token) {
                continue;
            }
            LIQUID_TAG_NAME.captures(token)
        } else {
            TAG_NAME.captures(token)
        };
        let tag_name = match caps.as_ref().and_then(|caps| caps.get(1)) {
            Some(tag_name) => tag_name.as_str(),
            None => continue,
        };

        if tag_name == "raw" {
            ok!(skip_raw_body(tokenizer, ctx));
        } else if tag_name == block_name {
            depth += 1;
        } else if tag_name == end_name {
            depth -= 1;
            if depth == 0 {
                if !tokenizer.for_liquid_tag() {
                    ctx.trim_whitespace = ends_with_trim_marker(token);
                }
                return Ok(());
            }
        }
    }
    Err(ctx.syntax_error(
        "errors.syntax.tag_never_closed",
        &[("block_name", block_name)],
    ))
}

fn skip_raw_body(tokenizer: &mut Tokenizer<'_>, ctx: &ParseContext<'_>) -> Result<(), Error> {
    while let Some(token) = tokenizer.shift() {
        if let Some(caps) = FULL_TOKEN_POSSIBLY_INVALID.captures(token) {
            if &caps[2] == "endraw" {
                return Ok(());
            }
        }
    }
    Err(ctx.syntax_error(
        "errors.syntax.tag_never_closed",
        &[("block_name", "raw")],
    ))
}

impl Tag for Comment {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn is_blank(&self) -> bool {
        true
    }

    fn render(&self, _ctx: &mut Context<'_>, _out: &mut Output) -> Result<Flow, Error> {
        Ok(Flow::Normal)
    }
}

/// The `raw` tag: outputs its body without interpreting it.
#[derive(Debug)]
pub struct Raw {
    name: String,
    line: Option<usize>,
    body: String,
}

impl Raw {
    /// Compiles a `raw` block.
    pub fn parse(
        name: &str,
        markup: &str,
        tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let line = ctx.line_number();
        if !WHITESPACE_OR_NOTHING.is_match(markup) {
            return Err(ctx.syntax_error("errors.syntax.tag_unexpected_args", &[("tag", name)]));
        }

        let end_name = format!("end{}", name);
        let mut body = String::new();
        while let Some(token) = tokenizer.shift() {
            if let Some(caps) = FULL_TOKEN_POSSIBLY_INVALID.captures(token) {
                if caps[2] == *end_name {
                    ctx.trim_whitespace = ends_with_trim_marker(token);
                    body.push_str(&caps[1]);
                    return Ok(Box::new(Raw {
                        name: name.to_string(),
                        line,
                        body,
                    }));
                }
            }
            body.push_str(token);
        }
        Err(ctx.syntax_error(
            "errors.syntax.tag_never_closed",
            &[("block_name", name)],
        ))
    }
}

impl Tag for Raw {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn is_blank(&self) -> bool {
        self.body.is_empty()
    }

    fn render(&self, _ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        out.write_str(&self.body);
        Ok(Flow::Normal)
    }
}

/// The inline comment tag: `{% # a note %}`.
///
/// Inside `{% liquid %}` a comment spanning several lines needs a `#` on
/// every line.
#[derive(Debug)]
pub struct InlineComment {
    name: String,
    line: Option<usize>,
}

impl InlineComment {
    /// Compiles an inline comment.
    pub fn parse(
        name: &str,
        markup: &str,
        _tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        if INLINE_COMMENT_INVALID.is_match(markup) {
            return Err(ctx.syntax_error("errors.syntax.inline_comment_invalid", &[]));
        }
        Ok(Box::new(InlineComment {
            name: name.to_string(),
            line: ctx.line_number(),
        }))
    }
}

impl Tag for InlineComment {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn is_blank(&self) -> bool {
        true
    }

    fn render(&self, _ctx: &mut Context<'_>, _out: &mut Output) -> Result<Flow, Error> {
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use crate::environment::Environment;
    use similar_asserts::assert_eq;

    fn render(source: &str) -> String {
        let env = Environment::new();
        env.parse(source).unwrap().render(()).unwrap()
    }

    #[test]
    fn test_comment() {
        assert_eq!(render("a{% comment %}{% if %}{{ x | }}{% endcomment %}b"), "ab");
        assert_eq!(
            render("a{% comment %}{% comment %}{% endcomment %}x{% endcomment %}b"),
            "ab"
        );
        assert_eq!(
            render("a{% comment %}{% raw %}{% endcomment %}{% endraw %}{% endcomment %}b"),
            "ab"
        );
        assert_eq!(render("a {% comment %}x{% endcomment -%}  b"), "a b");
    }

    #[test]
    fn test_comment_in_liquid_tag() {
        assert_eq!(
            render("{% liquid\ncomment\necho 'x'\nendcomment\necho 'y' %}"),
            "y"
        );
    }

    #[test]
    fn test_unclosed_comment() {
        let env = Environment::new();
        let err = env.parse("{% comment %}{% comment %}{% endcomment %}").unwrap_err();
        assert_eq!(err.message(), "'comment' tag was never closed");
    }

    #[test]
    fn test_raw() {
        assert_eq!(render("{% raw %}{{ x }}{% if %}{% endraw %}"), "{{ x }}{% if %}");
        assert_eq!(render("{% raw %} a {%- endraw -%} b"), " a b");
        let env = Environment::new();
        let err = env.parse("{% raw x %}{% endraw %}").unwrap_err();
        assert_eq!(err.message(), "Syntax Error in 'raw' - Valid syntax: raw");
    }

    #[test]
    fn test_inline_comment() {
        assert_eq!(render("a{% # note %}b"), "ab");
        assert_eq!(render("{% liquid\n# one\n# two\necho 'x' %}"), "x");
        let env = Environment::new();
        let err = env.parse("{% # a\n b %}").unwrap_err();
        assert_eq!(
            err.message(),
            "Syntax error in tag '#' - Each line of comments must be prefixed by the '#' character"
        );
    }
}
