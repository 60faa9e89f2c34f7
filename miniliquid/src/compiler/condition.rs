use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::expression::Expr;
use crate::compiler::parse_context::ParseContext;
use crate::compiler::parser::Parser;
use crate::compiler::syntax::QUOTED_FRAGMENT;
use crate::compiler::tokens::TokenKind;
use crate::error::Error;
use crate::value::{compare, Inspect, Value, ValueRepr};
use crate::vm::Context;

static SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"({qf})\s*([=!<>a-z_]+)?\s*({qf})?",
        qf = QUOTED_FRAGMENT
    ))
    .unwrap()
});

/// How a condition is joined with the next one in its chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Relation {
    And,
    Or,
}

/// A boolean condition as used by `if`, `unless` and `case`.
///
/// A condition compares two expressions with an operator or, without an
/// operator, tests the truthiness of the left expression.  Conditions form
/// a chain through `and` / `or` that is evaluated left to right with
/// short circuiting and without operator precedence:
/// `a or b and c` evaluates as `a or (b and c)`.
#[derive(Debug, Clone)]
pub struct Condition {
    left: Expr,
    operator: Option<String>,
    right: Expr,
    child: Option<(Relation, Box<Condition>)>,
    is_else: bool,
}

impl Condition {
    /// Creates a comparison.  Without operator only `left` is tested.
    pub fn new(left: Expr, operator: Option<&str>, right: Expr) -> Condition {
        Condition {
            left,
            operator: operator.map(|x| x.to_string()),
            right,
            child: None,
            is_else: false,
        }
    }

    /// Creates the condition of an `else` branch which is always true.
    pub fn else_branch() -> Condition {
        Condition {
            left: Expr::nil(),
            operator: None,
            right: Expr::nil(),
            child: None,
            is_else: true,
        }
    }

    /// Is this the condition of an `else` branch?
    pub fn is_else(&self) -> bool {
        self.is_else
    }

    /// Chains another condition onto this one.
    pub fn with_child(mut self, relation: Relation, child: Condition) -> Condition {
        self.child = Some((relation, Box::new(child)));
        self
    }

    /// Compiles the markup of an `if`, `elsif` or `unless` tag.
    pub fn parse(markup: &str, ctx: &mut ParseContext<'_>) -> Result<Condition, Error> {
        ctx.parse_with_selected_parser(markup, strict_parse, lax_parse)
    }

    /// Evaluates the chain.
    ///
    /// The result is the value of the last evaluated comparison, which is
    /// a boolean for comparisons and the tested value otherwise.
    pub fn evaluate(&self, ctx: &Context<'_>) -> Result<Value, Error> {
        let mut condition = self;
        loop {
            let result = ok!(condition.interpret(ctx));
            condition = match condition.child {
                Some((Relation::Or, ref next)) if !result.is_true() => next,
                Some((Relation::And, ref next)) if result.is_true() => next,
                _ => return Ok(result),
            };
        }
    }

    fn interpret(&self, ctx: &Context<'_>) -> Result<Value, Error> {
        if self.is_else {
            return Ok(Value::from(true));
        }
        let op = match self.operator {
            Some(ref op) => op.as_str(),
            None if matches!(self.left, Expr::Blank | Expr::Empty) => {
                return Ok(Value::from(true))
            }
            None => return self.left.evaluate(ctx),
        };

        let left = ok!(self.left.evaluate(ctx));
        let right = ok!(self.right.evaluate(ctx));

        match op {
            "==" | "!=" | "<>" => {
                let equal = if let Some(check) = method_literal(&self.left) {
                    check(&right)
                } else if let Some(check) = method_literal(&self.right) {
                    check(&left)
                } else {
                    left == right
                };
                Ok(Value::from(if op == "==" { equal } else { !equal }))
            }
            "<" | ">" | "<=" | ">=" => {
                if method_literal(&self.left).is_some() || method_literal(&self.right).is_some() {
                    return Ok(Value::NIL);
                }
                let ordering = match ok!(order(&left, &right)) {
                    Some(ordering) => ordering,
                    None => return Ok(Value::NIL),
                };
                Ok(Value::from(match op {
                    "<" => ordering == Ordering::Less,
                    ">" => ordering == Ordering::Greater,
                    "<=" => ordering != Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            "contains" => {
                if method_literal(&self.left).is_some() {
                    return Ok(Value::from(false));
                }
                Ok(Value::from(contains(&left, &right)))
            }
            _ => Err(Error::argument(format!("Unknown operator {}", op))),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::And => "and",
            Relation::Or => "or",
        })
    }
}

fn method_literal(expr: &Expr) -> Option<fn(&Value) -> bool> {
    match expr {
        Expr::Blank => Some(Value::is_blank),
        Expr::Empty => Some(Value::is_empty),
        _ => None,
    }
}

/// Orders two values for the comparison operators.
///
/// Numbers order with numbers and strings with strings.  A number or a
/// string compared with something else fails, all other pairings have no
/// order.
fn order(left: &Value, right: &Value) -> Result<Option<Ordering>, Error> {
    if matches!(right.0, ValueRepr::Hash(..)) {
        return Ok(None);
    }
    match compare(left, right) {
        Some(ordering) => Ok(Some(ordering)),
        None if left.is_number() || left.as_str().is_some() => {
            let other = match right.0 {
                ValueRepr::Nil | ValueRepr::Bool(_) | ValueRepr::I64(_) | ValueRepr::F64(_) => {
                    Inspect(right).to_string()
                }
                _ => right.type_name().to_string(),
            };
            Err(Error::argument(format!(
                "comparison of {} with {} failed",
                left.type_name(),
                other
            )))
        }
        None => Ok(None),
    }
}

fn contains(left: &Value, right: &Value) -> bool {
    if right.is_nil() {
        return false;
    }
    match left.0 {
        ValueRepr::String(ref s) => s.contains(&*right.to_str()),
        ValueRepr::Array(ref items) => items.contains(right),
        ValueRepr::Hash(ref map, _) => right.as_str().map_or(false, |key| map.contains_key(key)),
        ValueRepr::Range(start, end) => match right.as_f64() {
            Some(val) => val >= start as f64 && val <= end as f64,
            None => false,
        },
        ValueRepr::Object(ref obj) => match obj.enumerate() {
            Some(items) => items.contains(right),
            None => false,
        },
        _ => false,
    }
}

fn if_syntax_error(ctx: &ParseContext<'_>) -> Error {
    ctx.syntax_error("errors.syntax.if", &[])
}

fn lax_comparison(markup: &str, ctx: &ParseContext<'_>) -> Result<Condition, Error> {
    let caps = match SYNTAX.captures(markup) {
        Some(caps) => caps,
        None => return Err(if_syntax_error(ctx)),
    };
    let left = ok!(ctx.parse_expression(&caps[1]));
    let right = match caps.get(3) {
        Some(right) => ok!(ctx.parse_expression(right.as_str())),
        None => Expr::nil(),
    };
    Ok(Condition::new(left, caps.get(2).map(|x| x.as_str()), right))
}

fn lax_parse(ctx: &mut ParseContext<'_>, markup: &str) -> Result<Condition, Error> {
    let mut parts = split_expressions(markup);
    let mut condition = ok!(lax_comparison(parts.pop().unwrap_or(""), ctx));
    while let Some(operator) = parts.pop() {
        let mut new_condition = ok!(lax_comparison(parts.pop().unwrap_or(""), ctx));
        let relation = match operator {
            "and" => Relation::And,
            "or" => Relation::Or,
            _ => return Err(if_syntax_error(ctx)),
        };
        new_condition.child = Some((relation, Box::new(condition)));
        condition = new_condition;
    }
    Ok(condition)
}

fn strict_parse(ctx: &mut ParseContext<'_>, markup: &str) -> Result<Condition, Error> {
    let mut p = ok!(Parser::new(markup));
    let mut conditions = vec![ok!(strict_comparison(&mut p, ctx))];
    let mut relations = Vec::new();
    loop {
        let relation = if p.id("and") {
            Relation::And
        } else if p.id("or") {
            Relation::Or
        } else {
            break;
        };
        relations.push(relation);
        conditions.push(ok!(strict_comparison(&mut p, ctx)));
    }
    ok!(p.consume(TokenKind::EndOfString));

    let mut rv = some_condition(conditions.pop());
    while let Some(mut condition) = conditions.pop() {
        if let Some(relation) = relations.pop() {
            condition.child = Some((relation, Box::new(rv)));
        }
        rv = condition;
    }
    Ok(rv)
}

fn some_condition(condition: Option<Condition>) -> Condition {
    condition.unwrap_or_else(|| Condition::new(Expr::nil(), None, Expr::nil()))
}

fn strict_comparison(p: &mut Parser<'_>, ctx: &ParseContext<'_>) -> Result<Condition, Error> {
    let left = ok!(ctx.parse_expression(&ok!(p.expression())));
    match p.consume_if(TokenKind::Comparison) {
        Some(op) => {
            let right = ok!(ctx.parse_expression(&ok!(p.expression())));
            Ok(Condition::new(left, Some(op), right))
        }
        None => Ok(Condition::new(left, None, Expr::nil())),
    }
}

/// Splits lax condition markup into alternating expressions and the
/// `and` / `or` operators between them.
///
/// Operators only count as whole words outside of quoted strings.
fn split_expressions(markup: &str) -> Vec<&str> {
    let bytes = markup.as_bytes();
    let mut rv = Vec::new();
    let mut expr_span: Option<(usize, usize)> = None;
    let mut pos = 0;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        let start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
            if bytes[pos] == b'"' || bytes[pos] == b'\'' {
                let quote = bytes[pos];
                pos = match bytes[pos + 1..].iter().position(|&b| b == quote) {
                    Some(offset) => pos + offset + 2,
                    None => pos + 1,
                };
            } else {
                pos += 1;
            }
        }
        let fragment = &markup[start..pos];
        if fragment == "and" || fragment == "or" {
            if let Some((s, e)) = expr_span.take() {
                rv.push(&markup[s..e]);
            }
            rv.push(fragment);
        } else {
            expr_span = Some(match expr_span {
                Some((s, _)) => (s, pos),
                None => (start, pos),
            });
        }
    }
    if let Some((s, e)) = expr_span {
        rv.push(&markup[s..e]);
    }
    rv
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_split_expressions() {
        assert_eq!(
            split_expressions("a == 'x and y' or b and c"),
            vec!["a == 'x and y'", "or", "b", "and", "c"]
        );
        assert_eq!(split_expressions("android"), vec!["android"]);
        assert_eq!(split_expressions("  "), Vec::<&str>::new());
    }

    #[test]
    fn test_contains() {
        assert!(contains(&Value::from("hello"), &Value::from("ell")));
        assert!(contains(&Value::from("a1"), &Value::from(1)));
        assert!(contains(&Value::from(vec![1, 2]), &Value::from(2)));
        assert!(!contains(&Value::from(vec![1, 2]), &Value::from("2")));
        assert!(contains(&Value::from_range(1, 5), &Value::from(3)));
        assert!(!contains(&Value::NIL, &Value::from(1)));
        assert!(!contains(&Value::from("x"), &Value::NIL));
    }

    #[test]
    fn test_order_errors() {
        let err = order(&Value::from(1), &Value::from("a")).unwrap_err();
        assert_eq!(err.message(), "comparison of Integer with String failed");
        let err = order(&Value::from("a"), &Value::from(1)).unwrap_err();
        assert_eq!(err.message(), "comparison of String with 1 failed");
        let err = order(&Value::from(1.5), &Value::NIL).unwrap_err();
        assert_eq!(err.message(), "comparison of Float with nil failed");
        assert_eq!(order(&Value::NIL, &Value::from(1)).unwrap(), None);
        assert_eq!(
            order(&Value::from("a"), &Value::from("b")).unwrap(),
            Some(Ordering::Less)
        );
    }
}
