use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::ast::{Flow, Tag};
use crate::compiler::block_body::{block_unknown_tag_error, parse_body, BlockBody, BodyEnd};
use crate::compiler::condition::Condition;
use crate::compiler::expression::Expr;
use crate::compiler::parse_context::ParseContext;
use crate::compiler::syntax::QUOTED_FRAGMENT;
use crate::compiler::tokenizer::Tokenizer;
use crate::error::Error;
use crate::output::Output;
use crate::tags::parse_tag_expression;
use crate::vm::Context;

static CASE_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"({})", QUOTED_FRAGMENT)).unwrap());
static WHEN_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?s)({qf})(?:(?:\s+or\s+|\s*,\s*)((?:{qf}).*))?",
        qf = QUOTED_FRAGMENT
    ))
    .unwrap()
});

/// The `if` and `unless` tags.
///
/// The tag holds a list of branches: the opening condition, any number of
/// `elsif` conditions and optional `else` branches.  The first branch
/// whose condition holds is rendered.  For `unless` the opening condition
/// is negated, the `elsif` conditions are not.
#[derive(Debug)]
pub struct If {
    name: String,
    line: Option<usize>,
    negate: bool,
    blocks: Vec<(Condition, BlockBody)>,
    blank: bool,
}

impl If {
    /// Compiles an `if` block, or an `unless` block if registered under
    /// that name.
    pub fn parse(
        name: &str,
        markup: &str,
        tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let line = ctx.line_number();
        let mut condition = ok!(Condition::parse(markup, ctx));
        let mut blocks = Vec::new();
        loop {
            let mut body = BlockBody::new();
            let end = ok!(parse_body(name, &mut body, tokenizer, ctx));
            blocks.push((condition, body));
            condition = match end {
                BodyEnd::Closed => break,
                BodyEnd::Tag("elsif", markup) => ok!(Condition::parse(markup, ctx)),
                BodyEnd::Tag("else", _) => Condition::else_branch(),
                BodyEnd::Tag(tag, _) => return Err(block_unknown_tag_error(tag, name, ctx)),
            };
        }

        let blank = blocks.iter().all(|(_, body)| body.is_blank());
        if blank {
            for (_, body) in &mut blocks {
                body.remove_blank_strings();
            }
        }
        Ok(Box::new(If {
            name: name.to_string(),
            line,
            negate: name == "unless",
            blocks,
            blank,
        }))
    }

    /// The branches with their conditions.
    pub fn blocks(&self) -> &[(Condition, BlockBody)] {
        &self.blocks
    }
}

impl Tag for If {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn is_blank(&self) -> bool {
        self.blank
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        for (idx, (condition, body)) in self.blocks.iter().enumerate() {
            let mut result = ok!(condition.evaluate(ctx)).is_true();
            if idx == 0 && self.negate {
                result = !result;
            }
            if result {
                return body.render(ctx, out);
            }
        }
        Ok(Flow::Normal)
    }
}

/// The `case` tag.
///
/// Each `when` compares the case expression with one or more values
/// separated by `or` or commas.  Every matching `when` renders, the `else`
/// branches render only if none matched.
#[derive(Debug)]
pub struct Case {
    name: String,
    line: Option<usize>,
    left: Expr,
    blocks: Vec<(Condition, usize)>,
    bodies: Vec<BlockBody>,
    blank: bool,
}

impl Case {
    /// Compiles a `case` block.
    pub fn parse(
        name: &str,
        markup: &str,
        tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let line = ctx.line_number();
        let left = match CASE_SYNTAX.captures(markup) {
            Some(caps) => ok!(parse_tag_expression(&caps[1], ctx)),
            None => return Err(ctx.syntax_error("errors.syntax.case", &[])),
        };

        let mut case = Case {
            name: name.to_string(),
            line,
            left,
            blocks: Vec::new(),
            bodies: Vec::new(),
            blank: true,
        };

        // text before the first `when` is never rendered
        let mut leading = BlockBody::new();
        let mut end = ok!(parse_body(name, &mut leading, tokenizer, ctx));
        case.blank = leading.is_blank();
        loop {
            match end {
                BodyEnd::Closed => break,
                BodyEnd::Tag("when", markup) => ok!(case.record_when(markup, ctx)),
                BodyEnd::Tag("else", markup) => {
                    if !markup.trim().is_empty() {
                        return Err(ctx.syntax_error("errors.syntax.case_invalid_else", &[]));
                    }
                    case.blocks
                        .push((Condition::else_branch(), case.bodies.len()));
                }
                BodyEnd::Tag(tag, _) => return Err(block_unknown_tag_error(tag, name, ctx)),
            }
            let mut body = BlockBody::new();
            end = ok!(parse_body(name, &mut body, tokenizer, ctx));
            case.blank = case.blank && body.is_blank();
            case.bodies.push(body);
        }

        if case.blank {
            for body in &mut case.bodies {
                body.remove_blank_strings();
            }
        }
        Ok(Box::new(case))
    }

    fn record_when(&mut self, markup: &str, ctx: &ParseContext<'_>) -> Result<(), Error> {
        let body = self.bodies.len();
        let mut rest = Some(markup);
        while let Some(markup) = rest {
            let caps = match WHEN_SYNTAX.captures(markup) {
                Some(caps) => caps,
                None => return Err(ctx.syntax_error("errors.syntax.case_invalid_when", &[])),
            };
            let right = ok!(parse_tag_expression(&caps[1], ctx));
            self.blocks
                .push((Condition::new(self.left.clone(), Some("=="), right), body));
            rest = caps.get(2).map(|x| x.as_str());
        }
        Ok(())
    }
}

impl Tag for Case {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn is_blank(&self) -> bool {
        self.blank
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        let mut execute_else = true;
        for (condition, body) in &self.blocks {
            let body = match self.bodies.get(*body) {
                Some(body) => body,
                None => continue,
            };
            if condition.is_else() {
                if execute_else && ok!(body.render(ctx, out)) == Flow::Interrupt {
                    return Ok(Flow::Interrupt);
                }
            } else if ok!(condition.evaluate(ctx)).is_true() {
                execute_else = false;
                if ok!(body.render(ctx, out)) == Flow::Interrupt {
                    return Ok(Flow::Interrupt);
                }
            }
        }
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
    fn test_if_branches() {
        let tmpl = "{% if x > 2 %}big{% elsif x == 2 %}two{% else %}small{% endif %}";
        assert_eq!(render(tmpl, context!(x => 3)), "big");
        assert_eq!(render(tmpl, context!(x => 2)), "two");
        assert_eq!(render(tmpl, context!(x => 1)), "small");
    }

    #[test]
    fn test_if_empty_string_is_falsy() {
        assert_eq!(render("{% if s %}yes{% else %}no{% endif %}", context!(s => "")), "no");
        assert_eq!(render("{% if s == empty %}empty{% endif %}", context!(s => "")), "empty");
    }

    #[test]
    fn test_unless() {
        let tmpl = "{% unless x %}no x{% elsif y %}y{% else %}x{% endunless %}";
        assert_eq!(render(tmpl, context!()), "no x");
        assert_eq!(render(tmpl, context!(x => true, y => true)), "y");
        assert_eq!(render(tmpl, context!(x => true)), "x");
    }

    #[test]
    fn test_if_blank_body_drops_whitespace() {
        assert_eq!(render("{% if true %}\n  {% assign a = 1 %}\n{% endif %}{{ a }}", context!()), "1");
    }

    #[test]
    fn test_if_errors() {
        let env = Environment::new();
        let err = env.parse("{% if a %}x{% endfor %}").unwrap_err();
        assert_eq!(
            err.message(),
            "'endfor' is not a valid delimiter for if tags. use endif"
        );
        let err = env.parse("{% if a %}x").unwrap_err();
        assert_eq!(err.message(), "'if' tag was never closed");
    }

    #[test]
    fn test_comparison_error_is_rendered_inline() {
        assert_eq!(
            render("{% if 1 > 'a' %}x{% endif %}!", context!()),
            "Liquid error (line 1): comparison of Integer with String failed!"
        );
    }

    #[test]
    fn test_case() {
        let tmpl = "{% case x %}ignored{% when 1, 2 %}low{% when 3 or 4 %}high{% else %}none{% endcase %}";
        assert_eq!(render(tmpl, context!(x => 2)), "low");
        assert_eq!(render(tmpl, context!(x => 4)), "high");
        assert_eq!(render(tmpl, context!(x => 9)), "none");
    }

    #[test]
    fn test_case_renders_every_match() {
        let tmpl = "{% case x %}{% when 'a' %}1{% when 'a' %}2{% else %}3{% endcase %}";
        assert_eq!(render(tmpl, context!(x => "a")), "12");
    }

    #[test]
    fn test_case_errors() {
        let env = Environment::new();
        let err = env
            .parse("{% case x %}{% else y %}{% endcase %}")
            .unwrap_err();
        assert_eq!(
            err.message(),
            "Syntax Error in tag 'case' - Valid else condition: {% else %} (no parameters) "
        );
        let err = env.parse("{% case %}{% endcase %}").unwrap_err();
        assert_eq!(
            err.message(),
            "Syntax Error in 'case' - Valid syntax: case [condition]"
        );
    }
}
