use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::expression::Expr;
use crate::compiler::parse_context::ParseContext;
use crate::compiler::parser::Parser;
use crate::compiler::syntax::QUOTED_FRAGMENT;
use crate::compiler::tokens::TokenKind;
use crate::error::Error;
use crate::output::Output;
use crate::value::{Value, ValueMap};
use crate::vm::Context;

static MARKUP_WITH_QUOTED_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?s)({})(.*)", QUOTED_FRAGMENT)).unwrap());
static FILTER_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\|\s*(.*)").unwrap());
static FILTER_PARSER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?:\s+|{}|,)+", QUOTED_FRAGMENT)).unwrap());
static FILTER_ARGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?::|,)\s*((?:\w+\s*:\s*)?(?:{}))", QUOTED_FRAGMENT)).unwrap()
});
static JUST_TAG_ATTRIBUTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\A(\w[\w-]*)\s*:\s*({})\z", QUOTED_FRAGMENT)).unwrap()
});
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// One filter application of a variable.
#[derive(Debug, Clone)]
pub struct FilterCall {
    name: String,
    args: Vec<Expr>,
    kwargs: Vec<(String, Expr)>,
}

impl FilterCall {
    /// The filter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The positional arguments.
    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    /// The keyword arguments in source order.
    pub fn kwargs(&self) -> &[(String, Expr)] {
        &self.kwargs
    }
}

/// A compiled output statement: `{{ name | filter: arg, key: value }}`.
///
/// The same type backs the `echo` and `assign` tags.
#[derive(Debug, Clone)]
pub struct Variable {
    markup: String,
    name: Expr,
    filters: Vec<FilterCall>,
    line: Option<usize>,
}

impl Variable {
    /// Compiles variable markup in the error mode of the parse context.
    pub fn parse(markup: &str, ctx: &mut ParseContext<'_>) -> Result<Variable, Error> {
        let line = ctx.line_number();
        let (name, filters) = ok!(ctx.parse_with_selected_parser(
            markup,
            |ctx, markup| strict_parse(markup, ctx),
            |ctx, markup| lax_parse(markup, ctx),
        ));
        Ok(Variable {
            markup: markup.to_string(),
            name,
            filters,
            line,
        })
    }

    /// The markup the variable was compiled from.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// The expression the filters are applied to.
    pub fn name(&self) -> &Expr {
        &self.name
    }

    /// The filter chain.
    pub fn filters(&self) -> &[FilterCall] {
        &self.filters
    }

    /// The line the variable appears on.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Evaluates the expression and folds the filter chain over it.
    pub fn evaluate(&self, ctx: &Context<'_>) -> Result<Value, Error> {
        let mut value = ok!(self.name.evaluate(ctx));
        for filter in &self.filters {
            let mut args = Vec::with_capacity(filter.args.len() + 1);
            for arg in &filter.args {
                args.push(ok!(arg.evaluate(ctx)));
            }
            if !filter.kwargs.is_empty() {
                let mut kwargs = ValueMap::default();
                for (key, expr) in &filter.kwargs {
                    kwargs.insert(key.as_str().into(), ok!(expr.evaluate(ctx)));
                }
                args.push(Value::from_kwargs(kwargs));
            }
            value = ok!(ctx.invoke_filter(&filter.name, value, &args));
        }
        ctx.apply_global_filter(value)
    }

    /// Evaluates the variable and writes the result.
    pub fn render(&self, ctx: &Context<'_>, out: &mut Output) -> Result<(), Error> {
        let value = ok!(self.evaluate(ctx));
        write!(out, "{}", value).map_err(Error::from)
    }
}

type Compiled = (Expr, Vec<FilterCall>);

fn lax_parse(markup: &str, ctx: &mut ParseContext<'_>) -> Result<Compiled, Error> {
    let mut filters = Vec::new();
    let caps = match MARKUP_WITH_QUOTED_FRAGMENT.captures(markup) {
        Some(caps) => caps,
        None => return Ok((Expr::nil(), filters)),
    };
    let name = ok!(ctx.parse_expression(&caps[1]));

    if let Some(filter_caps) = FILTER_MARKUP.captures(&caps[2]) {
        for chunk in FILTER_PARSER.find_iter(&filter_caps[1]) {
            let chunk = chunk.as_str();
            let filter_name = match WORD.find(chunk) {
                Some(m) => m.as_str(),
                None => continue,
            };
            let args: Vec<&str> = FILTER_ARGS
                .captures_iter(chunk)
                .filter_map(|caps| caps.get(1).map(|x| x.as_str()))
                .collect();
            filters.push(ok!(compile_filter(filter_name, &args, ctx)));
        }
    }

    Ok((name, filters))
}

fn strict_parse(markup: &str, ctx: &mut ParseContext<'_>) -> Result<Compiled, Error> {
    let mut filters = Vec::new();
    let mut p = ok!(Parser::new(markup));
    if p.look(TokenKind::EndOfString, 0) {
        return Ok((Expr::nil(), filters));
    }

    let name = ok!(ctx.parse_expression(&ok!(p.expression())));
    while p.consume_if(TokenKind::Pipe).is_some() {
        let filter_name = ok!(p.consume(TokenKind::Id));
        let mut args = Vec::new();
        if p.consume_if(TokenKind::Colon).is_some() {
            args.push(ok!(p.argument()));
            while p.consume_if(TokenKind::Comma).is_some() {
                args.push(ok!(p.argument()));
            }
        }
        let args: Vec<&str> = args.iter().map(|x| x.as_str()).collect();
        filters.push(ok!(compile_filter(filter_name, &args, ctx)));
    }
    ok!(p.consume(TokenKind::EndOfString));

    Ok((name, filters))
}

fn compile_filter(name: &str, raw_args: &[&str], ctx: &ParseContext<'_>) -> Result<FilterCall, Error> {
    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    for arg in raw_args {
        if let Some(caps) = JUST_TAG_ATTRIBUTES.captures(arg) {
            let expr = ok!(ctx.parse_expression(&caps[2]));
            let key = caps[1].to_string();
            match kwargs.iter_mut().find(|slot: &&mut (String, Expr)| slot.0 == key) {
                Some(slot) => slot.1 = expr,
                None => kwargs.push((key, expr)),
            }
        } else {
            args.push(ok!(ctx.parse_expression(arg)));
        }
    }
    Ok(FilterCall {
        name: name.to_string(),
        args,
        kwargs,
    })
}
