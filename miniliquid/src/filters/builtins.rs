use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, ErrorKind};
use crate::utils::{html_entity, HtmlEscape};
use crate::value::ops::{self, CoerceResult};
use crate::value::{Kwargs, Value, ValueRepr};
use crate::vm::Context;

static NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n").unwrap());
static ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A(?:[a-zA-Z]+|#\d+);").unwrap());

fn is_strip_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r' | '\0')
}

/// The items an array filter works on.
///
/// Nested arrays are flattened, a hash counts as a single item and nil
/// has no items at all.
fn input_items(value: &Value) -> Vec<Value> {
    fn flatten_into(items: &[Value], rv: &mut Vec<Value>) {
        for item in items {
            match item.as_slice() {
                Some(nested) => flatten_into(nested, rv),
                None => rv.push(item.clone()),
            }
        }
    }

    match value.0 {
        ValueRepr::Nil => Vec::new(),
        ValueRepr::Array(ref items) => {
            let mut rv = Vec::with_capacity(items.len());
            flatten_into(items, &mut rv);
            rv
        }
        ValueRepr::Range(..) => value.to_list(),
        ValueRepr::Object(ref obj) => obj.enumerate().unwrap_or_else(|| vec![value.clone()]),
        _ => vec![value.clone()],
    }
}

fn property_of(item: &Value, property: &str) -> Value {
    item.get_key(property).unwrap_or_default()
}

/// Appends a string to the input.
///
/// ```liquid
/// {{ "/my/fancy/url" | append: ".html" }}
///   -> /my/fancy/url.html
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn append(_ctx: &Context, input: String, suffix: String) -> String {
    input + &suffix
}

/// Prepends a string to the input.
///
/// ```liquid
/// {{ "apples" | prepend: "Some fruit: " }}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn prepend(_ctx: &Context, input: String, prefix: String) -> String {
    prefix + &input
}

/// Converts a string to uppercase.
///
/// ```liquid
/// <h1>{{ chapter.title | upcase }}</h1>
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn upcase(_ctx: &Context, input: String) -> String {
    input.to_uppercase()
}

/// Converts a string to lowercase.
///
/// ```liquid
/// <h1>{{ chapter.title | downcase }}</h1>
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn downcase(_ctx: &Context, input: String) -> String {
    input.to_lowercase()
}

/// Uppercases the first character and lowercases the rest.
///
/// ```liquid
/// {{ "my GREAT title" | capitalize }}
///   -> My great title
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn capitalize(_ctx: &Context, input: String) -> String {
    let mut chars = input.chars();
    match chars.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}

/// Removes whitespace from both ends of a string.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn strip(_ctx: &Context, input: String) -> String {
    input.trim_matches(is_strip_char).to_string()
}

/// Removes leading whitespace.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn lstrip(_ctx: &Context, input: String) -> String {
    input.trim_start_matches(is_strip_char).to_string()
}

/// Removes trailing whitespace.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn rstrip(_ctx: &Context, input: String) -> String {
    input.trim_end_matches(is_strip_char).to_string()
}

/// Removes all line breaks.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn strip_newlines(_ctx: &Context, input: String) -> String {
    NEWLINE.replace_all(&input, "").into_owned()
}

/// Inserts an HTML line break in front of every line break.
///
/// ```liquid
/// {{ description | newline_to_br }}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn newline_to_br(_ctx: &Context, input: String) -> String {
    NEWLINE.replace_all(&input, "<br />\n").into_owned()
}

/// Replaces every occurrence of a string.
///
/// ```liquid
/// {{ "Hello World" | replace: "Hello", "Goodbye" }}
///   -> Goodbye World
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn replace(_ctx: &Context, input: String, from: String, to: Option<String>) -> String {
    input.replace(&from, to.as_deref().unwrap_or(""))
}

/// Replaces the first occurrence of a string.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn replace_first(_ctx: &Context, input: String, from: String, to: Option<String>) -> String {
    input.replacen(&from, to.as_deref().unwrap_or(""), 1)
}

/// Removes every occurrence of a string.
///
/// ```liquid
/// {{ "rain, rain, go away" | remove: "rain" }}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn remove(_ctx: &Context, input: String, needle: String) -> String {
    input.replace(&needle, "")
}

/// Removes the first occurrence of a string.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn remove_first(_ctx: &Context, input: String, needle: String) -> String {
    input.replacen(&needle, "", 1)
}

/// Splits a string into an array.
///
/// A single space splits on runs of whitespace, an empty pattern splits
/// into characters.  Trailing empty items are dropped.
///
/// ```liquid
/// {% assign beatles = "John, Paul, George, Ringo" | split: ", " %}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn split(_ctx: &Context, input: String, pattern: String) -> Value {
    if pattern == " " {
        return input.split_whitespace().collect();
    }
    if pattern.is_empty() {
        return input.chars().map(String::from).collect();
    }
    let mut parts: Vec<&str> = input.split(pattern.as_str()).collect();
    while parts.last() == Some(&"") {
        parts.pop();
    }
    Value::from(parts)
}

/// Shortens a string to the given number of characters.
///
/// The length includes the ellipsis which defaults to `...`.
///
/// ```liquid
/// {{ "Ground control to Major Tom." | truncate: 20 }}
///   -> Ground control to...
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn truncate(
    _ctx: &Context,
    input: Value,
    length: Option<i64>,
    ellipsis: Option<String>,
) -> Value {
    if input.is_nil() {
        return input;
    }
    let s = input.to_str();
    let length = length.unwrap_or(50);
    let ellipsis = ellipsis.as_deref().unwrap_or("...");
    if (s.chars().count() as i64) <= length {
        return Value::from(s.into_owned());
    }
    let keep = length.saturating_sub(ellipsis.chars().count() as i64).max(0) as usize;
    let mut rv: String = s.chars().take(keep).collect();
    rv.push_str(ellipsis);
    Value::from(rv)
}

/// Shortens a string to the given number of words.
///
/// ```liquid
/// {{ "Ground control to Major Tom." | truncatewords: 3 }}
///   -> Ground control to...
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn truncatewords(
    _ctx: &Context,
    input: Value,
    words: Option<i64>,
    ellipsis: Option<String>,
) -> Value {
    if input.is_nil() {
        return input;
    }
    let s = input.to_str();
    let words = words.unwrap_or(15).max(1) as usize;
    let wordlist: Vec<&str> = s.split_whitespace().collect();
    if wordlist.len() <= words {
        return Value::from(s.into_owned());
    }
    let mut rv = wordlist[..words].join(" ");
    rv.push_str(ellipsis.as_deref().unwrap_or("..."));
    Value::from(rv)
}

/// HTML escapes a string.  Nil stays nil.
///
/// ```liquid
/// {{ "<p>love</p>" | escape }}
///   -> &lt;p&gt;love&lt;/p&gt;
/// ```
///
/// By default this filter is also registered under the alias `h`.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn escape(_ctx: &Context, input: Value) -> Value {
    if input.is_nil() {
        return input;
    }
    Value::from(HtmlEscape(&input.to_str()).to_string())
}

/// HTML escapes a string without escaping existing entities again.
///
/// ```liquid
/// {{ "1 &lt; 2 & 3" | escape_once }}
///   -> 1 &lt; 2 &amp; 3
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn escape_once(_ctx: &Context, input: String) -> String {
    let mut rv = String::with_capacity(input.len());
    for (idx, c) in input.char_indices() {
        match html_entity(c) {
            Some(_) if c == '&' && ENTITY.is_match(&input[idx + 1..]) => rv.push(c),
            Some(entity) => rv.push_str(entity),
            None => rv.push(c),
        }
    }
    rv
}

#[cfg(feature = "urlencode")]
mod url {
    use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

    pub const URL_SAFE: &AsciiSet = &NON_ALPHANUMERIC
        .remove(b'_')
        .remove(b'.')
        .remove(b'-')
        .remove(b'~');
}

/// Percent encodes a string for use in a URL.  Spaces become `+`.
///
/// ```liquid
/// {{ "john@liquid.com" | url_encode }}
///   -> john%40liquid.com
/// ```
#[cfg(feature = "urlencode")]
#[cfg_attr(docsrs, doc(cfg(all(feature = "builtins", feature = "urlencode"))))]
pub fn url_encode(_ctx: &Context, input: Value) -> Value {
    if input.is_nil() {
        return input;
    }
    let encoded = percent_encoding::utf8_percent_encode(&input.to_str(), url::URL_SAFE).to_string();
    Value::from(encoded.replace("%20", "+"))
}

/// Decodes a percent encoded string.
#[cfg(feature = "urlencode")]
#[cfg_attr(docsrs, doc(cfg(all(feature = "builtins", feature = "urlencode"))))]
pub fn url_decode(_ctx: &Context, input: Value) -> Result<Value, Error> {
    if input.is_nil() {
        return Ok(input);
    }
    let plain = input.to_str().replace('+', " ");
    percent_encoding::percent_decode_str(&plain)
        .decode_utf8()
        .map(|x| Value::from(x.into_owned()))
        .map_err(|err| Error::argument("invalid byte sequence in UTF-8").with_source(err))
}

/// Joins the items of an array with a separator (a space by default).
///
/// ```liquid
/// {{ product.tags | join: ", " }}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn join(_ctx: &Context, input: &Value, glue: Option<String>) -> String {
    let glue = glue.as_deref().unwrap_or(" ");
    let mut rv = String::new();
    for (idx, item) in input_items(input).iter().enumerate() {
        if idx > 0 {
            rv.push_str(glue);
        }
        rv.push_str(&item.to_str());
    }
    rv
}

fn first_or_last(input: &Value, first: bool) -> Value {
    let idx = if first { 0 } else { -1 };
    let rv = match input.0 {
        ValueRepr::Array(_) | ValueRepr::Range(..) => input.get_index(idx),
        ValueRepr::Hash(..) | ValueRepr::Object(_) => {
            let items = input.to_list();
            if first {
                items.into_iter().next()
            } else {
                items.into_iter().last()
            }
        }
        _ => None,
    };
    rv.unwrap_or_default()
}

/// Returns the first item of an array.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn first(_ctx: &Context, input: &Value) -> Value {
    first_or_last(input, true)
}

/// Returns the last item of an array.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn last(_ctx: &Context, input: &Value) -> Value {
    first_or_last(input, false)
}

/// Returns the number of characters in a string or items in a collection.
///
/// Values without a size report zero.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn size(_ctx: &Context, input: &Value) -> usize {
    input.len().unwrap_or(0)
}

/// Reverses the order of the items in an array.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn reverse(_ctx: &Context, input: &Value) -> Value {
    let mut items = input_items(input);
    items.reverse();
    Value::from(items)
}

fn sort_class(value: &Value) -> Option<u8> {
    match value.0 {
        ValueRepr::String(_) => Some(0),
        ValueRepr::I64(_) | ValueRepr::F64(_) => Some(1),
        _ => None,
    }
}

// all non nil keys must be strings or all must be numbers
fn check_sortable<'a, I: Iterator<Item = &'a Value>>(keys: I) -> Result<(), Error> {
    let mut keys = keys.filter(|x| !x.is_nil());
    let first = match keys.next() {
        Some(first) => sort_class(first),
        None => return Ok(()),
    };
    for key in keys {
        let class = sort_class(key);
        if class.is_none() || class != first {
            return Err(Error::argument("cannot sort values of incompatible types"));
        }
    }
    Ok(())
}

fn nil_last_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.is_nil(), b.is_nil()) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Greater),
        (false, true) => Some(Ordering::Less),
        (false, false) => None,
    }
}

fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    if let Some(rv) = nil_last_cmp(a, b) {
        return rv;
    }
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a.cmp(b),
        _ => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.total_cmp(&b)
        }
    }
}

fn natural_cmp(a: &Value, b: &Value) -> Ordering {
    if let Some(rv) = nil_last_cmp(a, b) {
        return rv;
    }
    a.to_str().to_lowercase().cmp(&b.to_str().to_lowercase())
}

fn sort_items(
    input: &Value,
    property: Option<&str>,
    cmp: fn(&Value, &Value) -> Ordering,
    check: bool,
) -> Result<Value, Error> {
    let mut keyed: Vec<(Value, Value)> = input_items(input)
        .into_iter()
        .map(|item| {
            let key = match property {
                Some(property) => property_of(&item, property),
                None => item.clone(),
            };
            (key, item)
        })
        .collect();
    if check {
        ok!(check_sortable(keyed.iter().map(|x| &x.0)));
    }
    keyed.sort_by(|a, b| cmp(&a.0, &b.0));
    Ok(keyed.into_iter().map(|x| x.1).collect())
}

/// Sorts an array, optionally by a property of its items.
///
/// Nil values sort last.  Mixing strings and numbers is an error.
///
/// ```liquid
/// {% assign products_by_price = collection.products | sort: "price" %}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn sort(_ctx: &Context, input: &Value, property: Option<String>) -> Result<Value, Error> {
    sort_items(input, property.as_deref(), sort_cmp, true)
}

/// Sorts an array case insensitively, optionally by a property.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn sort_natural(
    _ctx: &Context,
    input: &Value,
    property: Option<String>,
) -> Result<Value, Error> {
    sort_items(input, property.as_deref(), natural_cmp, false)
}

/// Removes duplicate items, optionally comparing a property.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn uniq(_ctx: &Context, input: &Value, property: Option<String>) -> Value {
    let mut seen: Vec<Value> = Vec::new();
    let mut rv = Vec::new();
    for item in input_items(input) {
        let key = match property {
            Some(ref property) => property_of(&item, property),
            None => item.clone(),
        };
        if !seen.contains(&key) {
            seen.push(key);
            rv.push(item);
        }
    }
    Value::from(rv)
}

/// Removes nil items, or items whose property is nil.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn compact(_ctx: &Context, input: &Value, property: Option<String>) -> Value {
    input_items(input)
        .into_iter()
        .filter(|item| match property {
            Some(ref property) => !property_of(item, property).is_nil(),
            None => !item.is_nil(),
        })
        .collect()
}

/// Extracts a property from every item.
///
/// ```liquid
/// {{ site.pages | map: "category" | join: ", " }}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn map(_ctx: &Context, input: &Value, property: String) -> Value {
    input_items(input)
        .into_iter()
        .map(|item| {
            if property == "to_liquid" {
                item
            } else {
                property_of(&item, &property)
            }
        })
        .collect()
}

/// Selects the items whose property equals a value.
///
/// Without a value the items with a truthy property are selected.
///
/// ```liquid
/// {% assign available = products | where: "available" %}
/// {% assign kitchen = products | where: "type", "kitchen" %}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn r#where(
    _ctx: &Context,
    input: &Value,
    property: String,
    target: Option<Value>,
) -> Value {
    input_items(input)
        .into_iter()
        .filter(|item| {
            let value = property_of(item, &property);
            match target {
                Some(ref target) => &value == target,
                None => value.is_true(),
            }
        })
        .collect()
}

/// Joins two arrays.
///
/// ```liquid
/// {% assign everything = fruits | concat: vegetables %}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn concat(_ctx: &Context, input: &Value, other: &Value) -> Result<Value, Error> {
    let other = match other.as_slice() {
        Some(other) => other,
        None => return Err(Error::argument("concat filter requires an array argument")),
    };
    let mut items = input_items(input);
    items.extend(other.iter().cloned());
    Ok(Value::from(items))
}

// the item range of a `slice` as `start..end`, `None` if out of bounds
fn slice_range(len: usize, offset: i64, length: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if offset < 0 { offset + len } else { offset };
    if start < 0 || start > len || length < 0 {
        return None;
    }
    let end = start.saturating_add(length).min(len);
    Some((start as usize, end as usize))
}

/// Returns a part of a string or an array.
///
/// The offset may be negative to count from the end, the length defaults
/// to one.
///
/// ```liquid
/// {{ "Liquid" | slice: 2, 3 }}
///   -> qui
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn slice(_ctx: &Context, input: &Value, offset: i64, length: Option<i64>) -> Value {
    let length = length.unwrap_or(1);
    if let Some(items) = input.as_slice() {
        return match slice_range(items.len(), offset, length) {
            Some((start, end)) => Value::from(items[start..end].to_vec()),
            None => Value::from(Vec::<Value>::new()),
        };
    }
    let s = input.to_str();
    match slice_range(s.chars().count(), offset, length) {
        Some((start, end)) => Value::from(s.chars().skip(start).take(end - start).collect::<String>()),
        None => Value::from(""),
    }
}

/// Adds a number.
///
/// ```liquid
/// {{ 4 | plus: 2 }}
///   -> 6
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn plus(_ctx: &Context, input: &Value, operand: &Value) -> Result<Value, Error> {
    ops::add(input, operand)
}

/// Subtracts a number.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn minus(_ctx: &Context, input: &Value, operand: &Value) -> Result<Value, Error> {
    ops::sub(input, operand)
}

/// Multiplies by a number.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn times(_ctx: &Context, input: &Value, operand: &Value) -> Result<Value, Error> {
    ops::mul(input, operand)
}

/// Divides by a number.
///
/// Dividing two integers rounds down to an integer.  Dividing by zero is
/// an error.
///
/// ```liquid
/// {{ 16 | divided_by: 4 }}
///   -> 4
/// {{ 5 | divided_by: 2.0 }}
///   -> 2.5
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn divided_by(_ctx: &Context, input: &Value, operand: &Value) -> Result<Value, Error> {
    ops::div(input, operand)
}

/// Returns the remainder of a division.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn modulo(_ctx: &Context, input: &Value, operand: &Value) -> Result<Value, Error> {
    ops::rem(input, operand)
}

/// Returns the absolute value of a number.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn abs(_ctx: &Context, input: &Value) -> Value {
    match ops::to_number(input).0 {
        ValueRepr::I64(x) => match x.checked_abs() {
            Some(x) => Value::from(x),
            None => Value::from((x as f64).abs()),
        },
        ValueRepr::F64(x) => Value::from(x.abs()),
        _ => Value::from(0),
    }
}

fn float_to_int(x: f64) -> Result<Value, Error> {
    if x.is_finite() {
        Ok(Value::from(x as i64))
    } else {
        Err(Error::new(ErrorKind::Argument, x.to_string()))
    }
}

/// Rounds a number up to the nearest integer.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn ceil(_ctx: &Context, input: &Value) -> Result<Value, Error> {
    let number = ops::to_number(input);
    match number.0 {
        ValueRepr::F64(x) => float_to_int(x.ceil()),
        _ => Ok(number),
    }
}

/// Rounds a number down to the nearest integer.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn floor(_ctx: &Context, input: &Value) -> Result<Value, Error> {
    let number = ops::to_number(input);
    match number.0 {
        ValueRepr::F64(x) => float_to_int(x.floor()),
        _ => Ok(number),
    }
}

/// Rounds a number to the given number of decimal places.
///
/// Without decimal places the result is an integer.
///
/// ```liquid
/// {{ 183.357 | round: 2 }}
///   -> 183.36
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn round(_ctx: &Context, input: &Value, digits: Option<Value>) -> Result<Value, Error> {
    let digits = match digits {
        Some(ref digits) => match ops::to_number(digits).0 {
            ValueRepr::I64(x) => x,
            ValueRepr::F64(x) => x as i64,
            _ => 0,
        },
        None => 0,
    };
    let number = ops::to_number(input);
    match number.0 {
        ValueRepr::F64(x) if digits == 0 => float_to_int(x.round()),
        ValueRepr::F64(x) => {
            let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
            Ok(Value::from((x * factor).round() / factor))
        }
        ValueRepr::I64(x) if digits < 0 => {
            let factor = 10f64.powi(-digits.clamp(-308, 308) as i32);
            float_to_int(((x as f64) / factor).round() * factor)
        }
        _ => Ok(number),
    }
}

fn pick_number(input: &Value, bound: &Value, want: Ordering) -> Value {
    let input = ops::to_number(input);
    let bound = ops::to_number(bound);
    let ordering = match ops::coerce(&bound, &input) {
        Some(CoerceResult::I64(a, b)) => a.cmp(&b),
        Some(CoerceResult::F64(a, b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        None => Ordering::Equal,
    };
    if ordering == want {
        bound
    } else {
        input
    }
}

/// Limits a number to a minimum value.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn at_least(_ctx: &Context, input: &Value, min: &Value) -> Value {
    pick_number(input, min, Ordering::Greater)
}

/// Limits a number to a maximum value.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn at_most(_ctx: &Context, input: &Value, max: &Value) -> Value {
    pick_number(input, max, Ordering::Less)
}

/// Returns a default value if the input is nil, false or empty.
///
/// With `allow_false: true` a `false` input is kept.
///
/// ```liquid
/// {{ product_price | default: 2.99 }}
/// {{ settings.flag | default: true, allow_false: true }}
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn default(
    _ctx: &Context,
    input: Value,
    default_value: Option<Value>,
    kwargs: Kwargs,
) -> Value {
    let allow_false = kwargs.get("allow_false").map_or(false, |x| x.is_true());
    let missing = if allow_false {
        input.is_nil()
    } else {
        input.is_nil() || input == Value::from(false)
    };
    if missing || input.is_empty() {
        default_value.unwrap_or_else(|| Value::from(""))
    } else {
        input
    }
}

/// Serializes a value to JSON.
///
/// ```liquid
/// <script>const product = {{ product | json }};</script>
/// ```
#[cfg(feature = "json")]
#[cfg_attr(docsrs, doc(cfg(all(feature = "builtins", feature = "json"))))]
pub fn json(_ctx: &Context, input: &Value) -> Result<String, Error> {
    serde_json::to_string(input).map_err(|err| {
        Error::new(ErrorKind::Argument, "unable to format value as JSON").with_source(err)
    })
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

    fn eval(source: &str) -> String {
        render(source, context!())
    }

    #[test]
    fn test_string_filters() {
        assert_eq!(eval("{{ 'a' | append: 'b' | prepend: 'c' }}"), "cab");
        assert_eq!(eval("{{ 'aBc' | upcase }}{{ 'aBc' | downcase }}"), "ABCabc");
        assert_eq!(eval("{{ 'my GREAT title' | capitalize }}"), "My great title");
        assert_eq!(eval("[{{ '  x  ' | strip }}][{{ '  x  ' | lstrip }}][{{ '  x  ' | rstrip }}]"), "[x][x  ][  x]");
        assert_eq!(eval("{{ nil | append: 'x' }}"), "x");
    }

    #[test]
    fn test_newlines() {
        let ctx = context!(s => "a\r\nb\nc");
        assert_eq!(render("{{ s | strip_newlines }}", ctx.clone()), "abc");
        assert_eq!(render("{{ s | newline_to_br }}", ctx), "a<br />\nb<br />\nc");
    }

    #[test]
    fn test_replace_and_remove() {
        assert_eq!(eval("{{ 'a-b-c' | replace: '-', '+' }}"), "a+b+c");
        assert_eq!(eval("{{ 'a-b-c' | replace_first: '-', '+' }}"), "a+b-c");
        assert_eq!(eval("{{ 'a-b-c' | replace: '-' }}"), "abc");
        assert_eq!(eval("{{ 'a-b-c' | remove: '-' }}"), "abc");
        assert_eq!(eval("{{ 'a-b-c' | remove_first: '-' }}"), "ab-c");
    }

    #[test]
    fn test_integer_bounds() {
        let quotient = eval("{{ -9223372036854775808 | divided_by: -1 }}");
        assert!(!quotient.is_empty() && !quotient.contains("error"));
        assert_eq!(
            eval("{{ -9223372036854775808 | divided_by: 2 }}"),
            "-4611686018427387904"
        );
        assert_eq!(eval("{{ -9223372036854775808 | modulo: -1 }}"), "0");
        assert_eq!(eval("{{ 5 | modulo: 9223372036854775807 }}"), "5");
        assert_eq!(eval("{{ 'abcdef' | truncate: -9223372036854775808 }}"), "...");
        let size = eval(
            "{% assign r = (-9223372036854775808..9223372036854775807) %}{{ r | size }}|{{ r.size }}",
        );
        assert!(!size.contains("error") && !size.contains('-'));
        assert_eq!(eval("{% assign r = (-5..5) %}{{ r | size }}"), "11");
    }

    #[test]
    fn test_split() {
        assert_eq!(eval("{{ 'a,b,,c,,' | split: ',' | join: '|' }}"), "a|b||c");
        assert_eq!(eval("{{ '  a  b ' | split: ' ' | join: '|' }}"), "a|b");
        assert_eq!(eval("{{ 'abc' | split: '' | join: '|' }}"), "a|b|c");
        assert_eq!(eval("{{ '' | split: ',' | size }}"), "0");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(eval("{{ 'Ground control to Major Tom.' | truncate: 20 }}"), "Ground control to...");
        assert_eq!(eval("{{ 'Ground control' | truncate: 20 }}"), "Ground control");
        assert_eq!(eval("{{ 'abcdef' | truncate: 4, '!' }}"), "abc!");
        assert_eq!(eval("{{ 'abcdef' | truncate: 2, '...' }}"), "...");
        assert_eq!(eval("{{ 'Ground control to Major Tom.' | truncatewords: 3 }}"), "Ground control to...");
        assert_eq!(eval("{{ 'one two' | truncatewords: 0, '' }}"), "one");
        assert_eq!(eval("{{ 'one  two' | truncatewords: 5 }}"), "one  two");
    }

    #[test]
    fn test_escape() {
        assert_eq!(eval("{{ '<p>a & b</p>' | escape }}"), "&lt;p&gt;a &amp; b&lt;/p&gt;");
        assert_eq!(eval("{{ '<b>' | h }}"), "&lt;b&gt;");
        assert_eq!(eval("{{ nil | escape }}|"), "|");
        assert_eq!(eval("{{ '1 &lt; 2 & 3 &#39;' | escape_once }}"), "1 &lt; 2 &amp; 3 &#39;");
    }

    #[cfg(feature = "urlencode")]
    #[test]
    fn test_url_filters() {
        assert_eq!(eval("{{ 'john@liquid.com' | url_encode }}"), "john%40liquid.com");
        assert_eq!(eval("{{ 'a b' | url_encode }}"), "a+b");
        assert_eq!(eval("{{ 'a+b%21' | url_decode }}"), "a b!");
    }

    #[test]
    fn test_array_basics() {
        let ctx = context!(items => vec![vec![3, 1], vec![2]]);
        assert_eq!(render("{{ items | join: ',' }}", ctx.clone()), "3,1,2");
        assert_eq!(render("{{ items | reverse | join: ',' }}", ctx.clone()), "2,1,3");
        assert_eq!(render("{{ items | size }}", ctx.clone()), "2");
        assert_eq!(render("{{ items | first | first }}", ctx.clone()), "3");
        assert_eq!(render("{{ items | last | last }}", ctx), "2");
        assert_eq!(eval("{{ 'abc' | size }}{{ 'abc' | first }}|"), "3|");
        assert_eq!(eval("{{ (1..4) | last }}"), "4");
    }

    #[test]
    fn test_sort() {
        let ctx = context!(items => vec!["b", "C", "a"]);
        assert_eq!(render("{{ items | sort | join }}", ctx.clone()), "C a b");
        assert_eq!(render("{{ items | sort_natural | join }}", ctx), "a b C");
        let ctx = context!(items => vec![3, 10, 1]);
        assert_eq!(render("{{ items | sort | join }}", ctx), "1 3 10");
    }

    #[test]
    fn test_sort_by_property() {
        let ctx = context!(items => vec![
            context!(name => "b", price => 2),
            context!(name => "a"),
            context!(name => "c", price => 1),
        ]);
        assert_eq!(
            render("{{ items | sort: 'price' | map: 'name' | join: ',' }}", ctx),
            "c,b,a"
        );
    }

    #[test]
    fn test_sort_incompatible() {
        let ctx = context!(items => vec![Value::from(1), Value::from("a")]);
        assert_eq!(
            render("{{ items | sort }}", ctx),
            "Liquid error (line 1): cannot sort values of incompatible types"
        );
    }

    #[test]
    fn test_uniq_compact() {
        let ctx = context!(items => vec![Value::from(1), Value::NIL, Value::from(1), Value::from(2)]);
        assert_eq!(render("{{ items | uniq | size }}", ctx.clone()), "3");
        assert_eq!(render("{{ items | compact | uniq | join: ',' }}", ctx), "1,2");
    }

    #[test]
    fn test_map_and_where() {
        let ctx = context!(products => vec![
            context!(title => "Pan", kind => "kitchen", available => true),
            context!(title => "Ball", kind => "toy", available => false),
            context!(title => "Pot", kind => "kitchen"),
        ]);
        assert_eq!(
            render("{{ products | where: 'kind', 'kitchen' | map: 'title' | join: ',' }}", ctx.clone()),
            "Pan,Pot"
        );
        assert_eq!(
            render("{{ products | where: 'available' | map: 'title' | join: ',' }}", ctx),
            "Pan"
        );
    }

    #[test]
    fn test_concat() {
        let ctx = context!(a => vec![1, 2], b => vec![3]);
        assert_eq!(render("{{ a | concat: b | join: ',' }}", ctx.clone()), "1,2,3");
        assert_eq!(
            render("{{ a | concat: 1 }}", ctx),
            "Liquid error (line 1): concat filter requires an array argument"
        );
    }

    #[test]
    fn test_slice() {
        assert_eq!(eval("{{ 'Liquid' | slice: 0 }}"), "L");
        assert_eq!(eval("{{ 'Liquid' | slice: 2, 3 }}"), "qui");
        assert_eq!(eval("{{ 'Liquid' | slice: -3, 2 }}"), "ui");
        assert_eq!(eval("{{ 'Liquid' | slice: 10 }}|"), "|");
        let ctx = context!(items => vec![1, 2, 3, 4]);
        assert_eq!(render("{{ items | slice: 1, 2 | join: ',' }}", ctx.clone()), "2,3");
        assert_eq!(render("{{ items | slice: -1, 5 | join: ',' }}", ctx), "4");
    }

    #[test]
    fn test_math() {
        assert_eq!(eval("{{ 4 | plus: 2 }}|{{ '4' | plus: '2.5' }}"), "6|6.5");
        assert_eq!(eval("{{ 4 | minus: 6 }}|{{ 3 | times: 1.5 }}"), "-2|4.5");
        assert_eq!(eval("{{ 7 | divided_by: 2 }}|{{ 5 | divided_by: 2.0 }}"), "3|2.5");
        assert_eq!(eval("{{ -7 | modulo: 3 }}"), "2");
        assert_eq!(eval("{{ -3 | abs }}|{{ '-1.5' | abs }}"), "3|1.5");
        assert_eq!(eval("{{ 1.2 | ceil }}|{{ 1.8 | floor }}|{{ 'x' | ceil }}"), "2|1|0");
        assert_eq!(eval("{{ 1.5 | round }}|{{ 183.357 | round: 2 }}|{{ 7 | round: 2 }}"), "2|183.36|7");
        assert_eq!(eval("{{ 1.26 | round: nil }}|{{ 1.26 | round: '1' }}"), "1|1.3");
        assert_eq!(eval("{{ 3 | at_least: 5 }}|{{ 7 | at_least: 5 }}"), "5|7");
        assert_eq!(eval("{{ 3 | at_most: 5 }}|{{ 7 | at_most: 5.5 }}"), "3|5.5");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            eval("{{ 1 | divided_by: 0 }}"),
            "Liquid error (line 1): divided by 0"
        );
    }

    #[test]
    fn test_default() {
        assert_eq!(eval("{{ nil | default: 'x' }}"), "x");
        assert_eq!(eval("{{ '' | default: 'x' }}"), "x");
        assert_eq!(eval("{{ false | default: 'x' }}"), "x");
        assert_eq!(eval("{{ false | default: 'x', allow_false: true }}"), "false");
        assert_eq!(eval("{{ 0 | default: 'x' }}"), "0");
        assert_eq!(eval("{{ nil | default }}|"), "|");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json() {
        let ctx = context!(item => context!(a => vec![1, 2]));
        assert_eq!(render("{{ item | json }}", ctx), r#"{"a":[1,2]}"#);
    }
}
