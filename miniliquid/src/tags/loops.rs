use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::ast::{Flow, Tag};
use crate::compiler::block_body::{block_unknown_tag_error, parse_body, BlockBody, BodyEnd};
use crate::compiler::expression::Expr;
use crate::compiler::parse_context::ParseContext;
use crate::compiler::parser::Parser;
use crate::compiler::syntax::{tag_attributes, QUOTED_FRAGMENT, VARIABLE_SEGMENT};
use crate::compiler::tokenizer::Tokenizer;
use crate::compiler::tokens::TokenKind;
use crate::error::Error;
use crate::output::Output;
use crate::tags::parse_tag_expression;
use crate::value::{Object, Value, ValueRepr};
use crate::vm::{Context, Interrupt};

static FOR_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\A({vs}+)\s+in\s+((?:{qf})+)\s*(reversed)?",
        vs = VARIABLE_SEGMENT,
        qf = QUOTED_FRAGMENT
    ))
    .unwrap()
});
static CYCLE_NAMED_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?s)\A({})\s*:\s*(.*)", QUOTED_FRAGMENT)).unwrap());
static CYCLE_SIMPLE_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\A(?:{})+", QUOTED_FRAGMENT)).unwrap());
static CYCLE_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\s*({})\s*", QUOTED_FRAGMENT)).unwrap());

/// Where a loop starts.
#[derive(Debug, Clone)]
enum Offset {
    None,
    Expr(Expr),
    /// `offset: continue` resumes where the last loop over the same
    /// variable and collection stopped.
    Continue,
}

/// The `for` tag.
///
/// ```text
/// {% for item in collection limit: 2 offset: 1 reversed %}...{% else %}...{% endfor %}
/// ```
///
/// The `else` branch renders when there is nothing to iterate over.
/// Inside the loop the `forloop` object ([`ForloopDrop`]) describes the
/// current iteration.
#[derive(Debug)]
pub struct For {
    name: String,
    line: Option<usize>,
    variable_name: String,
    collection: Expr,
    loop_name: String,
    reversed: bool,
    limit: Option<Expr>,
    offset: Offset,
    body: BlockBody,
    else_body: Option<BlockBody>,
    blank: bool,
}

struct ForHeader {
    variable_name: String,
    collection: Expr,
    loop_name: String,
    reversed: bool,
    limit: Option<Expr>,
    offset: Offset,
}

impl ForHeader {
    fn set_attribute(&mut self, key: &str, markup: &str, ctx: &ParseContext<'_>) -> Result<(), Error> {
        match key {
            "offset" if markup == "continue" => self.offset = Offset::Continue,
            "offset" => self.offset = Offset::Expr(ok!(ctx.parse_expression(markup))),
            "limit" => self.limit = Some(ok!(ctx.parse_expression(markup))),
            _ => {}
        }
        Ok(())
    }
}

fn lax_header(ctx: &mut ParseContext<'_>, markup: &str) -> Result<ForHeader, Error> {
    let caps = match FOR_SYNTAX.captures(markup) {
        Some(caps) => caps,
        None => return Err(ctx.syntax_error("errors.syntax.for", &[])),
    };
    let collection_markup = &caps[2];
    let mut header = ForHeader {
        variable_name: caps[1].to_string(),
        collection: ok!(parse_tag_expression(collection_markup, ctx)),
        loop_name: format!("{}-{}", &caps[1], collection_markup),
        reversed: caps.get(3).is_some(),
        limit: None,
        offset: Offset::None,
    };
    for (key, value) in tag_attributes(markup) {
        ok!(header.set_attribute(key, value, ctx));
    }
    Ok(header)
}

fn strict_header(ctx: &mut ParseContext<'_>, markup: &str) -> Result<ForHeader, Error> {
    let mut p = ok!(Parser::new(markup));
    let variable_name = ok!(p.consume(TokenKind::Id)).to_string();
    if !p.id("in") {
        return Err(ctx.syntax_error("errors.syntax.for_invalid_in", &[]));
    }
    let collection_markup = ok!(p.expression());
    let mut header = ForHeader {
        loop_name: format!("{}-{}", variable_name, collection_markup),
        collection: ok!(ctx.parse_expression(&collection_markup)),
        variable_name,
        reversed: p.id("reversed"),
        limit: None,
        offset: Offset::None,
    };
    while p.look(TokenKind::Comma, 0) || p.look(TokenKind::Id, 0) {
        p.consume_if(TokenKind::Comma);
        let key = if p.id("limit") {
            "limit"
        } else if p.id("offset") {
            "offset"
        } else {
            return Err(ctx.syntax_error("errors.syntax.for_invalid_attribute", &[]));
        };
        ok!(p.consume(TokenKind::Colon));
        let value = ok!(p.expression());
        ok!(header.set_attribute(key, &value, ctx));
    }
    ok!(p.consume(TokenKind::EndOfString));
    Ok(header)
}

impl For {
    /// Compiles a `for` block.
    pub fn parse(
        name: &str,
        markup: &str,
        tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let line = ctx.line_number();
        let header = ok!(ctx.parse_with_selected_parser(markup, strict_header, lax_header));

        let mut body = BlockBody::new();
        let mut else_body = None;
        match ok!(parse_body(name, &mut body, tokenizer, ctx)) {
            BodyEnd::Closed => {}
            BodyEnd::Tag("else", _) => {
                let mut alternative = BlockBody::new();
                match ok!(parse_body(name, &mut alternative, tokenizer, ctx)) {
                    BodyEnd::Closed => {}
                    BodyEnd::Tag(tag, _) => return Err(block_unknown_tag_error(tag, name, ctx)),
                }
                else_body = Some(alternative);
            }
            BodyEnd::Tag(tag, _) => return Err(block_unknown_tag_error(tag, name, ctx)),
        }

        let blank = body.is_blank() && else_body.as_ref().map_or(true, |x| x.is_blank());
        if blank {
            body.remove_blank_strings();
            if let Some(ref mut else_body) = else_body {
                else_body.remove_blank_strings();
            }
        }

        Ok(Box::new(For {
            name: name.to_string(),
            line,
            variable_name: header.variable_name,
            collection: header.collection,
            loop_name: header.loop_name,
            reversed: header.reversed,
            limit: header.limit,
            offset: header.offset,
            body,
            else_body,
            blank,
        }))
    }

    /// Computes the items this render of the loop iterates over and
    /// records where it stopped for `offset: continue`.
    fn segment(&self, ctx: &mut Context<'_>) -> Result<Segment, Error> {
        let from = match self.offset {
            Offset::Continue => ctx.for_offset(&self.loop_name),
            Offset::Expr(ref expr) => ok!(ok!(ctx.evaluate(expr)).to_integer()),
            Offset::None => 0,
        };
        let collection = ok!(ctx.evaluate(&self.collection));
        let to = match self.limit {
            Some(ref limit) => {
                let limit = ok!(ctx.evaluate(limit));
                if limit.is_nil() {
                    None
                } else {
                    Some(ok!(limit.to_integer()).saturating_add(from))
                }
            }
            None => None,
        };

        let first = from.max(0);
        let segment = match collection.0 {
            ValueRepr::String(ref s) if s.is_empty() => Segment::Items(Vec::new()),
            ValueRepr::String(_) if first == 0 && to.map_or(true, |to| to > 0) => {
                Segment::Items(vec![collection.clone()])
            }
            ValueRepr::String(_) => Segment::Items(Vec::new()),
            ValueRepr::Range(start, end) => {
                let total = if end < start {
                    0
                } else {
                    end as i128 - start as i128 + 1
                };
                let stop = to.map_or(total, |to| total.min(to as i128));
                let len = (stop - first as i128).max(0);
                Segment::Range {
                    start: start as i128 + first as i128,
                    len: u64::try_from(len).unwrap_or(u64::MAX),
                }
            }
            _ => Segment::Items(
                collection
                    .to_list()
                    .into_iter()
                    .skip(usize::try_from(first).unwrap_or(usize::MAX))
                    .take(match to {
                        Some(to) => usize::try_from(to.saturating_sub(first)).unwrap_or(0),
                        None => usize::MAX,
                    })
                    .collect(),
            ),
        };
        let consumed = i64::try_from(segment.len()).unwrap_or(i64::MAX);
        ctx.set_for_offset(&self.loop_name, from.saturating_add(consumed));
        Ok(segment)
    }

    fn render_segment(
        &self,
        ctx: &mut Context<'_>,
        out: &mut Output,
        segment: Segment,
    ) -> Result<Flow, Error> {
        let parentloop = ctx.current_forloop().cloned().unwrap_or_default();
        ctx.stack(|ctx| {
            ctx.push_forloop(Value::NIL);
            let rv = self.render_items(ctx, out, segment, parentloop);
            ctx.pop_forloop();
            rv
        })
    }

    fn render_items(
        &self,
        ctx: &mut Context<'_>,
        out: &mut Output,
        segment: Segment,
        parentloop: Value,
    ) -> Result<Flow, Error> {
        let length = usize::try_from(segment.len()).unwrap_or(usize::MAX);
        for (index, item) in segment.items(self.reversed).enumerate() {
            let forloop = Value::from_object(ForloopDrop {
                name: self.loop_name.clone(),
                length,
                index,
                parentloop: parentloop.clone(),
            });
            ctx.set("forloop", forloop.clone());
            ctx.replace_forloop(forloop);
            ctx.set(self.variable_name.as_str(), item);
            ok!(self.body.render(ctx, out));
            match ctx.pop_interrupt() {
                Some(Interrupt::Break) => break,
                Some(Interrupt::Continue) | None => {}
            }
        }
        Ok(Flow::Normal)
    }
}

/// The items a loop iterates over.
///
/// Ranges are never materialized, their items are produced while the
/// loop runs so the resource limits can stop huge ones.
#[derive(Debug)]
enum Segment {
    Items(Vec<Value>),
    Range { start: i128, len: u64 },
}

impl Segment {
    fn len(&self) -> u64 {
        match *self {
            Segment::Items(ref items) => items.len() as u64,
            Segment::Range { len, .. } => len,
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn items(self, reversed: bool) -> Box<dyn Iterator<Item = Value>> {
        match self {
            Segment::Items(items) if reversed => Box::new(items.into_iter().rev()),
            Segment::Items(items) => Box::new(items.into_iter()),
            Segment::Range { start, len } => {
                let item = move |offset: u64| Value::from((start + offset as i128) as i64);
                if reversed {
                    Box::new((0..len).rev().map(item))
                } else {
                    Box::new((0..len).map(item))
                }
            }
        }
    }
}

impl Tag for For {
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
        let segment = ok!(self.segment(ctx));
        if !segment.is_empty() {
            self.render_segment(ctx, out, segment)
        } else if let Some(ref else_body) = self.else_body {
            else_body.render(ctx, out)
        } else {
            Ok(Flow::Normal)
        }
    }
}

/// The `forloop` object of a running loop.
///
/// It provides `name`, `length`, `index`, `index0`, `rindex`, `rindex0`,
/// `first`, `last` and `parentloop`, the object of the enclosing loop.
/// The `render` tag hands the same object to partials rendered with
/// `for`.
#[derive(Debug, Clone)]
pub struct ForloopDrop {
    name: String,
    length: usize,
    index: usize,
    parentloop: Value,
}

impl ForloopDrop {
    /// Creates the object for the iteration at `index` (zero based).
    pub fn new<N: Into<String>>(name: N, length: usize, index: usize, parentloop: Value) -> Self {
        ForloopDrop {
            name: name.into(),
            length,
            index,
            parentloop,
        }
    }
}

impl Object for ForloopDrop {
    fn get_value(&self, key: &str) -> Option<Value> {
        Some(match key {
            "name" => Value::from(self.name.as_str()),
            "length" => Value::from(self.length as i64),
            "index" => Value::from(self.index as i64 + 1),
            "index0" => Value::from(self.index as i64),
            "rindex" => Value::from((self.length - self.index) as i64),
            "rindex0" => Value::from((self.length - self.index) as i64 - 1),
            "first" => Value::from(self.index == 0),
            "last" => Value::from(self.index + 1 == self.length),
            "parentloop" => self.parentloop.clone(),
            _ => return None,
        })
    }

    fn type_name(&self) -> &str {
        "ForloopDrop"
    }
}

/// The `break` and `continue` tags.
#[derive(Debug)]
pub struct LoopControl {
    name: String,
    line: Option<usize>,
    interrupt: Interrupt,
}

impl LoopControl {
    /// Compiles a `break` tag, or a `continue` tag if registered under
    /// that name.
    pub fn parse(
        name: &str,
        _markup: &str,
        _tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        Ok(Box::new(LoopControl {
            name: name.to_string(),
            line: ctx.line_number(),
            interrupt: if name == "continue" {
                Interrupt::Continue
            } else {
                Interrupt::Break
            },
        }))
    }
}

impl Tag for LoopControl {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn render(&self, ctx: &mut Context<'_>, _out: &mut Output) -> Result<Flow, Error> {
        ctx.push_interrupt(self.interrupt);
        Ok(Flow::Interrupt)
    }
}

/// The `cycle` tag.
///
/// Every render outputs the next value of a group, starting over after the
/// last.  Groups are named explicitly (`{% cycle 'g': 'a', 'b' %}`) or by
/// their values.
#[derive(Debug)]
pub struct Cycle {
    name: String,
    line: Option<usize>,
    group: Expr,
    variables: Vec<Expr>,
}

impl Cycle {
    /// Compiles a `cycle` tag.
    pub fn parse(
        name: &str,
        markup: &str,
        _tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let line = ctx.line_number();
        let (group, variables) = if let Some(caps) = CYCLE_NAMED_SYNTAX.captures(markup) {
            let (_, variables) = ok!(cycle_variables(&caps[2], ctx));
            (ok!(parse_tag_expression(&caps[1], ctx)), variables)
        } else if CYCLE_SIMPLE_SYNTAX.is_match(markup) {
            let (key, variables) = ok!(cycle_variables(markup, ctx));
            (Expr::Literal(Value::from(key)), variables)
        } else {
            return Err(ctx.syntax_error("errors.syntax.cycle", &[]));
        };
        Ok(Box::new(Cycle {
            name: name.to_string(),
            line,
            group,
            variables,
        }))
    }
}

/// Splits the comma separated values of a cycle group.  Also returns
/// the normalized markup of the values which names unnamed groups.
fn cycle_variables(markup: &str, ctx: &ParseContext<'_>) -> Result<(String, Vec<Expr>), Error> {
    let mut key = Vec::new();
    let mut variables = Vec::new();
    for piece in markup.split(',') {
        if let Some(caps) = CYCLE_VARIABLE.captures(piece) {
            variables.push(ok!(parse_tag_expression(&caps[1], ctx)));
            key.push(caps[1].to_string());
        }
    }
    Ok((key.join(", "), variables))
}

impl Tag for Cycle {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        let group = ok!(ctx.evaluate(&self.group));
        let pos = ctx.next_cycle(&group.to_str(), self.variables.len());
        if let Some(expr) = self.variables.get(pos) {
            let value = ok!(ctx.evaluate(expr));
            ok!(write!(out, "{}", value).map_err(Error::from));
        }
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::environment::Environment;
    use similar_asserts::assert_eq;

    fn render(source: &str, ctx: Value) -> String {
        let env = Environment::new();
        env.parse(source).unwrap().render(ctx).unwrap()
    }

    #[test]
    fn test_for_basics() {
        let ctx = context!(items => vec![1, 2, 3]);
        assert_eq!(render("{% for i in items %}{{ i }}{% endfor %}", ctx.clone()), "123");
        assert_eq!(
            render("{% for i in items reversed %}{{ i }}{% endfor %}", ctx.clone()),
            "321"
        );
        assert_eq!(
            render("{% for i in items limit: 1 offset: 1 %}{{ i }}{% endfor %}", ctx),
            "2"
        );
        assert_eq!(render("{% for i in (3..5) %}{{ i }}{% endfor %}", context!()), "345");
    }

    #[test]
    fn test_for_segment_bounds() {
        let ctx = context!(items => vec![1, 2, 3]);
        assert_eq!(
            render(
                "{% for i in (1..3) limit: 9223372036854775807 offset: 1 %}{{ i }}{% endfor %}",
                context!()
            ),
            "23"
        );
        assert_eq!(
            render(
                "{% for i in items limit: 9223372036854775807 offset: 2 %}{{ i }}{% endfor %}",
                ctx.clone()
            ),
            "3"
        );
        assert_eq!(
            render("{% for i in items offset: 9223372036854775807 %}{{ i }}{% else %}none{% endfor %}", ctx),
            "none"
        );
        assert_eq!(
            render(
                "{% for i in (1..9223372036854775807) limit: 2 %}{{ i }}{% endfor %}",
                context!()
            ),
            "12"
        );
        assert_eq!(
            render(
                "{% for i in (-9223372036854775808..-9223372036854775807) reversed %}{{ i }},{% endfor %}",
                context!()
            ),
            "-9223372036854775807,-9223372036854775808,"
        );
    }

    #[test]
    fn test_huge_range_stops_at_render_score() {
        use crate::vm::Limits;
        use crate::RenderOptions;

        let env = Environment::new();
        let tmpl = env
            .parse("{% for i in (1..9223372036854775807) %}{{ i }}{% endfor %}")
            .unwrap();
        let options = RenderOptions {
            limits: Some(Limits {
                render_score_limit: Some(1000),
                ..Limits::default()
            }),
            ..RenderOptions::default()
        };
        assert_eq!(
            tmpl.render_with_options((), &options).unwrap(),
            "Liquid error: Memory limits exceeded"
        );
    }

    #[test]
    fn test_for_else() {
        assert_eq!(
            render("{% for i in items %}x{% else %}empty{% endfor %}", context!()),
            "empty"
        );
        assert_eq!(
            render("{% for i in s %}[{{ i }}]{% endfor %}", context!(s => "abc")),
            "[abc]"
        );
    }

    #[test]
    fn test_forloop_object() {
        assert_eq!(
            render(
                "{% for i in (1..3) %}{{ forloop.index }}/{{ forloop.rindex0 }}{% if forloop.last %}!{% endif %} {% endfor %}",
                context!()
            ),
            "1/2 2/1 3/0! "
        );
        assert_eq!(
            render(
                "{% for a in (1..2) %}{% for b in (1..2) %}{{ forloop.parentloop.index }}{{ b }} {% endfor %}{% endfor %}",
                context!()
            ),
            "11 12 21 22 "
        );
    }

    #[test]
    fn test_loop_variable_does_not_leak() {
        assert_eq!(render("{% for i in (1..2) %}{% endfor %}[{{ i }}]", context!()), "[]");
    }

    #[test]
    fn test_break_and_continue() {
        assert_eq!(
            render(
                "{% for i in (1..5) %}{% if i == 2 %}{% continue %}{% endif %}{% if i == 4 %}{% break %}{% endif %}{{ i }}{% endfor %}",
                context!()
            ),
            "13"
        );
        assert_eq!(
            render(
                "{% for a in (1..2) %}{% for b in (1..3) %}{% if b == 2 %}{% break %}{% endif %}{{ a }}{{ b }} {% endfor %}{% endfor %}",
                context!()
            ),
            "11 21 "
        );
    }

    #[test]
    fn test_offset_continue() {
        let ctx = context!(items => vec![1, 2, 3, 4, 5]);
        assert_eq!(
            render(
                "{% for i in items limit: 2 %}{{ i }}{% endfor %}|{% for i in items offset: continue limit: 2 %}{{ i }}{% endfor %}|{% for i in items offset: continue %}{{ i }}{% endfor %}",
                ctx
            ),
            "12|34|5"
        );
    }

    #[test]
    fn test_for_hash() {
        let ctx = context!(h => context!(a => 1, b => 2));
        assert_eq!(
            render("{% for pair in h %}{{ pair[0] }}={{ pair[1] }};{% endfor %}", ctx),
            "a=1;b=2;"
        );
    }

    #[test]
    fn test_strict_for_syntax() {
        let env = Environment::new();
        let options = crate::compiler::parse_context::ParseOptions {
            error_mode: Some(crate::compiler::parse_context::ErrorMode::Strict),
            ..Default::default()
        };
        let err = env
            .parse_with_options("{% for i items %}{% endfor %}", &options)
            .unwrap_err();
        assert_eq!(err.message(), "For loops require an 'in' clause");
        let err = env
            .parse_with_options("{% for i in items foo: 1 %}{% endfor %}", &options)
            .unwrap_err();
        assert_eq!(
            err.message(),
            "Invalid attribute in for loop. Valid attributes are limit and offset"
        );
        let tmpl = env
            .parse_with_options("{% for i in items, limit: 2 %}{{ i }}{% endfor %}", &options)
            .unwrap();
        assert_eq!(tmpl.render(context!(items => vec![1, 2, 3])).unwrap(), "12");
    }

    #[test]
    fn test_cycle() {
        assert_eq!(
            render("{% for i in (1..4) %}{% cycle 'a', 'b', 'c' %}{% endfor %}", context!()),
            "abca"
        );
        assert_eq!(
            render(
                "{% cycle 'x': 1, 2 %}{% cycle 'y': 1, 2 %}{% cycle 'x': 1, 2 %}",
                context!()
            ),
            "112"
        );
    }

    #[test]
    fn test_forloop_drop() {
        let drop = ForloopDrop::new("i-items", 3, 2, Value::NIL);
        assert_eq!(drop.get_value("rindex"), Some(Value::from(1)));
        assert_eq!(drop.get_value("last"), Some(Value::from(true)));
        assert_eq!(drop.get_value("missing"), None);
    }
}
