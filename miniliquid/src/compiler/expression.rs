use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::cache::ExpressionCache;
use crate::error::{Error, ErrorKind};
use crate::value::{Value, ValueRepr};
use crate::vm::Context;

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A-?\d+\z").unwrap());
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A-?\d+\.\d+\z").unwrap());
static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\(\s*(\S+)\s*\.\.\s*(\S+)\s*\)\z").unwrap());

const COMMAND_METHODS: [&str; 3] = ["size", "first", "last"];

/// A compiled expression.
///
/// Expressions are what appears in variable names, filter arguments, tag
/// arguments and conditions: literals, the special `blank` and `empty`
/// literals, variable lookups and ranges.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant (`nil`, `true`, `false`, strings and numbers).
    Literal(Value),
    /// The `blank` literal.
    Blank,
    /// The `empty` literal.
    Empty,
    /// A path into the context (`product.variants[0].title`).
    Lookup(Arc<VariableLookup>),
    /// A range with at least one non constant bound.
    Range(Arc<RangeLookup>),
}

impl Expr {
    /// The `nil` literal.
    pub fn nil() -> Expr {
        Expr::Literal(Value::NIL)
    }

    /// Compiles markup into an expression.
    ///
    /// Literals are recognized directly, everything else goes through the
    /// given cache.
    pub fn parse(markup: &str, cache: &ExpressionCache) -> Result<Expr, Error> {
        let markup = markup.trim();
        if markup.len() >= 2
            && ((markup.starts_with('"') && markup.ends_with('"'))
                || (markup.starts_with('\'') && markup.ends_with('\'')))
        {
            return Ok(Expr::Literal(Value::from(&markup[1..markup.len() - 1])));
        } else if markup == "\"" || markup == "'" {
            return Ok(Expr::Literal(Value::from("")));
        }

        match markup {
            "" | "nil" | "null" => return Ok(Expr::nil()),
            "true" => return Ok(Expr::Literal(Value::from(true))),
            "false" => return Ok(Expr::Literal(Value::from(false))),
            "blank" => return Ok(Expr::Blank),
            "empty" => return Ok(Expr::Empty),
            _ => {}
        }

        if let Some(rv) = cache.get(markup) {
            return Ok(rv);
        }
        let rv = ok!(Expr::parse_uncached(markup, cache));
        cache.insert(markup, rv.clone());
        Ok(rv)
    }

    fn parse_uncached(markup: &str, cache: &ExpressionCache) -> Result<Expr, Error> {
        if markup.starts_with('(') && markup.ends_with(')') {
            if let Some(caps) = RANGE_RE.captures(markup) {
                return RangeLookup::parse(&caps[1], &caps[2], cache);
            }
        }
        if let Some(number) = parse_number(markup) {
            return Ok(Expr::Literal(number));
        }
        Ok(Expr::Lookup(Arc::new(ok!(VariableLookup::parse(
            markup, cache
        )))))
    }

    /// Evaluates the expression against the context.
    pub fn evaluate(&self, ctx: &Context) -> Result<Value, Error> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Blank | Expr::Empty => Ok(Value::from("")),
            Expr::Lookup(lookup) => lookup.evaluate(ctx),
            Expr::Range(range) => range.evaluate(ctx),
        }
    }

    /// Returns the variable lookup if this is one.
    pub fn as_lookup(&self) -> Option<&VariableLookup> {
        match self {
            Expr::Lookup(lookup) => Some(lookup),
            _ => None,
        }
    }
}

/// Parses the number forms the engine accepts.
///
/// Besides plain integers and floats a run of digits and dots parses as a
/// float up to the second dot (`1.2.3` is `1.2`) and a trailing dot is
/// ignored (`123.` is `123.0`).
pub fn parse_number(markup: &str) -> Option<Value> {
    if INTEGER_RE.is_match(markup) {
        return Some(match markup.parse::<i64>() {
            Ok(val) => Value::from(val),
            Err(_) => Value::from(markup.parse::<f64>().ok()?),
        });
    }
    if FLOAT_RE.is_match(markup) {
        return markup.parse::<f64>().ok().map(Value::from);
    }

    let bytes = markup.as_bytes();
    let (&first, rest) = bytes.split_first()?;
    if first == b'-' {
        if !rest.first().map_or(false, |b| b.is_ascii_digit()) {
            return None;
        }
    } else if !first.is_ascii_digit() {
        return None;
    }

    let mut first_dot = None;
    let mut num_end = None;
    for (idx, &byte) in bytes.iter().enumerate().skip(1) {
        if byte != b'.' && !byte.is_ascii_digit() {
            return None;
        }
        if num_end.is_some() {
            continue;
        }
        if byte == b'.' {
            if first_dot.is_none() {
                first_dot = Some(idx);
            } else {
                num_end = Some(idx);
            }
        }
    }

    let end = num_end.or(first_dot).unwrap_or(bytes.len());
    let number = markup[..end].trim_end_matches('.');
    number.parse::<f64>().ok().map(Value::from)
}

/// One accessor of a variable lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name`.  The flag marks the command names `size`, `first` and
    /// `last` which fall back to the built-in properties.
    Key(Arc<str>, bool),
    /// `[expression]`
    Index(Expr),
}

/// A compiled path into the render context.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLookup {
    name: Expr,
    segments: Vec<Segment>,
}

impl VariableLookup {
    /// Splits markup like `a.b[c]["d"].size` into its parts.
    pub fn parse(markup: &str, cache: &ExpressionCache) -> Result<VariableLookup, Error> {
        let mut parts = scan_lookups(markup).into_iter();
        let name = match parts.next() {
            Some(name) if name.starts_with('[') && name.ends_with(']') => {
                ok!(Expr::parse(&name[1..name.len() - 1], cache))
            }
            Some(name) => Expr::Literal(Value::from(name)),
            None => Expr::nil(),
        };
        let mut segments = Vec::new();
        for part in parts {
            if part.starts_with('[') && part.ends_with(']') {
                segments.push(Segment::Index(ok!(Expr::parse(
                    &part[1..part.len() - 1],
                    cache
                ))));
            } else {
                segments.push(Segment::Key(
                    Arc::from(part),
                    COMMAND_METHODS.contains(&part),
                ));
            }
        }
        Ok(VariableLookup { name, segments })
    }

    /// The root name if it is a plain identifier.
    pub fn name(&self) -> Option<&str> {
        match self.name {
            Expr::Literal(ref value) => value.as_str(),
            _ => None,
        }
    }

    /// The accessors after the root name.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolves the path.
    pub fn evaluate(&self, ctx: &Context) -> Result<Value, Error> {
        let name = ok!(self.name.evaluate(ctx));
        let mut object = ok!(ctx.find_variable(&name.to_str()));

        for segment in &self.segments {
            let (key, is_command) = match segment {
                Segment::Key(key, is_command) => (Value::from(key.clone()), *is_command),
                Segment::Index(expr) => (ok!(expr.evaluate(ctx)), false),
            };

            let found = match object.0 {
                ValueRepr::Hash(..) if object.has_key(&key.to_str()) => {
                    object.get_key(&key.to_str())
                }
                ValueRepr::Array(_) | ValueRepr::Range(..) if key.as_i64().is_some() => {
                    Some(key.as_i64().and_then(|idx| object.get_index(idx)).unwrap_or_default())
                }
                ValueRepr::Object(ref obj) => match obj.get_value_in(&key.to_str(), ctx) {
                    Some(value) => Some(value),
                    None if is_command => object.command(&key.to_str()),
                    None if ctx.strict_variables() => {
                        return Err(Error::new(
                            ErrorKind::UndefinedDropMethod,
                            format!("undefined method {}", key.to_str()),
                        ));
                    }
                    None => return Ok(Value::NIL),
                },
                _ if is_command => object.command(&key.to_str()),
                _ => None,
            };

            object = match found {
                Some(value) => value,
                None if ctx.strict_variables() => {
                    return Err(Error::new(
                        ErrorKind::UndefinedVariable,
                        format!("undefined variable {}", key.to_str()),
                    ));
                }
                None => return Ok(Value::NIL),
            };
        }

        Ok(object)
    }
}

/// Splits lookup markup into the root name and its accessors.
///
/// Bracketed parts keep their brackets and may nest.  Unbalanced opening
/// brackets and any characters that are not part of a name are skipped.
fn scan_lookups(markup: &str) -> Vec<&str> {
    let bytes = markup.as_bytes();
    let mut rv = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c == b'[' {
            let mut depth = 0usize;
            let mut end = None;
            for (idx, &b) in bytes.iter().enumerate().skip(pos) {
                if b == b'[' {
                    depth += 1;
                } else if b == b']' {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(idx);
                        break;
                    }
                }
            }
            match end {
                Some(end) => {
                    rv.push(&markup[pos..=end]);
                    pos = end + 1;
                }
                None => pos += 1,
            }
        } else if is_word_byte(c) {
            let start = pos;
            while pos < bytes.len() && is_word_byte(bytes[pos]) {
                pos += 1;
            }
            if bytes.get(pos) == Some(&b'?') {
                pos += 1;
            }
            rv.push(&markup[start..pos]);
        } else {
            pos += markup[pos..].chars().next().map_or(1, |c| c.len_utf8());
        }
    }

    rv
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b >= 0x80
}

/// A range whose bounds are evaluated at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeLookup {
    start: Expr,
    end: Expr,
}

impl RangeLookup {
    /// Compiles `(start..end)`.  Constant bounds fold into a range value.
    pub fn parse(start: &str, end: &str, cache: &ExpressionCache) -> Result<Expr, Error> {
        let start_expr = ok!(Expr::parse(start, cache));
        let end_expr = ok!(Expr::parse(end, cache));
        match (&start_expr, &end_expr) {
            (Expr::Literal(a), Expr::Literal(b)) => {
                let a = ok!(constant_bound(a, start));
                let b = ok!(constant_bound(b, end));
                Ok(Expr::Literal(Value::from_range(a, b)))
            }
            (Expr::Blank | Expr::Empty, _) => Err(invalid_range_bound(start)),
            (_, Expr::Blank | Expr::Empty) => Err(invalid_range_bound(end)),
            _ => Ok(Expr::Range(Arc::new(RangeLookup {
                start: start_expr,
                end: end_expr,
            }))),
        }
    }

    /// Evaluates both bounds into an integer range.
    pub fn evaluate(&self, ctx: &Context) -> Result<Value, Error> {
        let start = ok!(ok!(self.start.evaluate(ctx)).to_integer());
        let end = ok!(ok!(self.end.evaluate(ctx)).to_integer());
        Ok(Value::from_range(start, end))
    }
}

fn constant_bound(value: &Value, markup: &str) -> Result<i64, Error> {
    value.to_integer().map_err(|_| invalid_range_bound(markup))
}

fn invalid_range_bound(markup: &str) -> Error {
    Error::syntax(format!(
        "Invalid expression type '{}' in range expression",
        markup
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn parse(markup: &str) -> Expr {
        Expr::parse(markup, &ExpressionCache::new()).unwrap()
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("nil"), Expr::nil());
        assert_eq!(parse("null"), Expr::nil());
        assert_eq!(parse("  "), Expr::nil());
        assert_eq!(parse("true"), Expr::Literal(Value::from(true)));
        assert_eq!(parse("'hello'"), Expr::Literal(Value::from("hello")));
        assert_eq!(parse("\"a b\""), Expr::Literal(Value::from("a b")));
        assert_eq!(parse("blank"), Expr::Blank);
        assert_eq!(parse("empty"), Expr::Empty);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_number("42"), Some(Value::from(42)));
        assert_eq!(parse_number("-3"), Some(Value::from(-3)));
        assert_eq!(parse_number("1.5"), Some(Value::from(1.5)));
        assert_eq!(parse_number("1.2.3"), Some(Value::from(1.2)));
        assert_eq!(parse_number("123."), Some(Value::from(123.0)));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("1a"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(parse("(1..5)"), Expr::Literal(Value::from_range(1, 5)));
        assert!(matches!(parse("(1..n)"), Expr::Range(_)));
        let err = Expr::parse("(true..5)", &ExpressionCache::new()).unwrap_err();
        assert_eq!(
            err.message(),
            "Invalid expression type 'true' in range expression"
        );
    }

    #[test]
    fn test_lookup_segments() {
        let expr = parse("a.b[0]['c'].size");
        let lookup = expr.as_lookup().unwrap();
        assert_eq!(lookup.name(), Some("a"));
        assert_eq!(
            lookup.segments(),
            &[
                Segment::Key(Arc::from("b"), false),
                Segment::Index(Expr::Literal(Value::from(0))),
                Segment::Index(Expr::Literal(Value::from("c"))),
                Segment::Key(Arc::from("size"), true),
            ][..]
        );
    }

    #[test]
    fn test_scan_lookups() {
        assert_eq!(scan_lookups("a[b[c]].d?"), vec!["a", "[b[c]]", "d?"]);
        assert_eq!(scan_lookups("[\"x\"]"), vec!["[\"x\"]"]);
        assert_eq!(scan_lookups("a[b"), vec!["a", "b"]);
    }

    #[test]
    fn test_cache_is_shared() {
        let cache = ExpressionCache::new();
        let a = Expr::parse("x.y", &cache).unwrap();
        let b = Expr::parse("x.y", &cache).unwrap();
        match (a, b) {
            (Expr::Lookup(a), Expr::Lookup(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected lookups"),
        }
    }
}
