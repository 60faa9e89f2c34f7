use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::ast::{Flow, Tag};
use crate::compiler::block_body::{parse_block, BlockBody};
use crate::compiler::parse_context::ParseContext;
use crate::compiler::tokenizer::Tokenizer;
use crate::compiler::variable::Variable;
use crate::error::Error;
use crate::output::Output;
use crate::value::Value;
use crate::vm::{assign_score_of, Context};

static ASSIGN_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)((?:\(?[\w\-\.\[\]]\)?)+)\s*=\s*(.*)\s*").unwrap());
static CAPTURE_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"((?:\(?[\w\-\.\[\]]\)?)+)").unwrap());

/// The `assign` tag: `{% assign name = expression | filter %}`.
///
/// The value is written to the outermost scope so it stays visible for
/// the rest of the render, also after enclosing loops end.
#[derive(Debug)]
pub struct Assign {
    name: String,
    line: Option<usize>,
    to: String,
    from: Variable,
}

impl Assign {
    /// Compiles an `assign` tag.
    pub fn parse(
        name: &str,
        markup: &str,
        _tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let line = ctx.line_number();
        let caps = match ASSIGN_SYNTAX.captures(markup) {
            Some(caps) => caps,
            None => return Err(ctx.syntax_error("errors.syntax.assign", &[])),
        };
        let from = ok!(Variable::parse(&caps[2], ctx));
        Ok(Box::new(Assign {
            name: name.to_string(),
            line,
            to: caps[1].to_string(),
            from,
        }))
    }

    /// The name of the assigned variable.
    pub fn to(&self) -> &str {
        &self.to
    }

    /// The assigned expression.
    pub fn from(&self) -> &Variable {
        &self.from
    }
}

impl Tag for Assign {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn is_blank(&self) -> bool {
        true
    }

    fn render(&self, ctx: &mut Context<'_>, _out: &mut Output) -> Result<Flow, Error> {
        let value = ok!(self.from.evaluate(ctx));
        let score = assign_score_of(&value);
        ctx.set_outer(self.to.as_str(), value);
        ok!(ctx.resource_limits().increment_assign_score(score));
        Ok(Flow::Normal)
    }
}

/// The `capture` tag: renders its body into a string variable.
#[derive(Debug)]
pub struct Capture {
    name: String,
    line: Option<usize>,
    to: String,
    body: BlockBody,
}

impl Capture {
    /// Compiles a `capture` block.
    pub fn parse(
        name: &str,
        markup: &str,
        tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let line = ctx.line_number();
        let to = match CAPTURE_SYNTAX.captures(markup) {
            Some(caps) => caps[1].to_string(),
            None => return Err(ctx.syntax_error("errors.syntax.capture", &[])),
        };
        let body = ok!(parse_block(name, tokenizer, ctx));
        Ok(Box::new(Capture {
            name: name.to_string(),
            line,
            to,
            body,
        }))
    }
}

impl Tag for Capture {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn is_blank(&self) -> bool {
        true
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        out.begin_capture();
        let rv = ctx.with_capture(|ctx| self.body.render(ctx, out));
        let captured = out.end_capture();
        let flow = ok!(rv);
        ctx.set_outer(self.to.as_str(), Value::from(captured));
        Ok(flow)
    }
}

/// The `echo` tag: an output statement in tag form.
///
/// This is mostly useful inside `{% liquid %}` where `{{ }}` is not
/// available.
#[derive(Debug)]
pub struct Echo {
    name: String,
    variable: Variable,
}

impl Echo {
    /// Compiles an `echo` tag.
    pub fn parse(
        name: &str,
        markup: &str,
        _tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        Ok(Box::new(Echo {
            name: name.to_string(),
            variable: ok!(Variable::parse(markup, ctx)),
        }))
    }
}

impl Tag for Echo {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.variable.line()
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        ok!(self.variable.render(ctx, out));
        Ok(Flow::Normal)
    }
}

/// The `increment` and `decrement` tags.
///
/// Counters live apart from assigned variables: `increment` outputs the
/// counter and then adds one, `decrement` subtracts one and outputs the
/// result.  Both start at zero.
#[derive(Debug)]
pub struct Counter {
    name: String,
    line: Option<usize>,
    variable: String,
    step: i64,
}

impl Counter {
    /// Compiles an `increment` tag, or a `decrement` tag if registered
    /// under that name.
    pub fn parse(
        name: &str,
        markup: &str,
        _tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        Ok(Box::new(Counter {
            name: name.to_string(),
            line: ctx.line_number(),
            variable: markup.trim().to_string(),
            step: if name == "decrement" { -1 } else { 1 },
        }))
    }
}

impl Tag for Counter {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        let value = ctx.counter(&self.variable).unwrap_or(0);
        let next = value + self.step;
        ctx.set_counter(&self.variable, next);
        write!(out, "{}", if self.step < 0 { next } else { value }).map_err(Error::from)?;
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use crate::context;
    use crate::environment::Environment;
    use crate::value::Value;
    use similar_asserts::assert_eq;

    fn render(source: &str, ctx: Value) -> String {
        let env = Environment::new();
        env.parse(source).unwrap().render(ctx).unwrap()
    }

    #[test]
    fn test_assign() {
        assert_eq!(render("{% assign a = 'x' | upcase %}{{ a }}", context!()), "X");
        assert_eq!(
            render("{% for i in (1..2) %}{% assign last = i %}{% endfor %}{{ last }}", context!()),
            "2"
        );
        assert_eq!(render("{% assign a.b = 1 %}{{ a.b }}|", context!()), "|");
    }

    #[test]
    fn test_assign_syntax_error() {
        let env = Environment::new();
        let err = env.parse("{% assign a %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Liquid syntax error (line 1): Syntax Error in 'assign' - Valid syntax: assign [var] = [source]"
        );
    }

    #[test]
    fn test_capture() {
        assert_eq!(
            render("{% capture greeting %}Hi {{ name }}{% endcapture %}[{{ greeting }}]", context!(name => "Ann")),
            "[Hi Ann]"
        );
    }

    #[test]
    fn test_echo() {
        assert_eq!(render("{% echo 'a' | append: 'b' %}", context!()), "ab");
        assert_eq!(render("{% liquid\necho x\necho x %}", context!(x => 1)), "11");
    }

    #[test]
    fn test_counters() {
        assert_eq!(
            render("{% increment n %}{% increment n %}{% decrement n %}{{ n }}", context!()),
            "0111"
        );
        assert_eq!(render("{% decrement m %}{% decrement m %}", context!()), "-1-2");
        assert_eq!(
            render("{% assign n = 10 %}{% increment n %}{{ n }}", context!()),
            "01"
        );
    }
}
