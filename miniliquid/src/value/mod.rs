//! Provides a dynamic value type abstraction.
//!
//! This module gives access to a dynamically typed value which is used by
//! the template engine during execution.
//!
//! For the most part the existence of the value type can be ignored as
//! MiniLiquid will perform the necessary conversions for you.  For instance
//! if you write a filter that converts a string you can directly declare the
//! filter to take a [`String`].  However for some more advanced use cases
//! it's useful to know that this type exists.
//!
//! # Converting Values
//!
//! Values are typically created via the [`From`] trait:
//!
//! ```
//! # use miniliquid::value::Value;
//! let int_value = Value::from(42);
//! let none_value = Value::from(());
//! let true_value = Value::from(true);
//! ```
//!
//! Or via the [`FromIterator`] trait:
//!
//! ```
//! # use miniliquid::value::Value;
//! // collection into a sequence
//! let value: Value = (1..10).into_iter().collect();
//!
//! // collection into a map
//! let value: Value = [("key", "value")].into_iter().collect();
//! ```
//!
//! Anything that implements [`Serialize`](serde::Serialize) can be turned
//! into a value with [`Value::from_serialize`].
//!
//! # Host Objects
//!
//! Host objects ("drops") are exposed to templates through the [`Object`]
//! trait and stored with [`Value::from_object`].
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub use crate::value::argtypes::{ArgType, FunctionArgs, FunctionResult, Kwargs, Rest};
pub use crate::value::object::Object;

mod argtypes;
mod object;
pub(crate) mod ops;
mod serialize;

/// The map type used for hashes.
///
/// With the `preserve_order` feature this is an insertion ordered map,
/// otherwise keys are sorted.
#[cfg(feature = "preserve_order")]
pub type ValueMap = indexmap::IndexMap<Arc<str>, Value>;

/// The map type used for hashes.
///
/// With the `preserve_order` feature this is an insertion ordered map,
/// otherwise keys are sorted.
#[cfg(not(feature = "preserve_order"))]
pub type ValueMap = std::collections::BTreeMap<Arc<str>, Value>;

/// Describes the kind of value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[non_exhaustive]
pub enum ValueKind {
    /// The value is nil.
    Nil,
    /// The value is a [`bool`]
    Bool,
    /// The value is a number of a supported type.
    Number,
    /// The value is a string.
    String,
    /// The value is an array of other values.
    Array,
    /// The value is a key/value mapping.
    Hash,
    /// The value is an inclusive integer range.
    Range,
    /// The value is a host object.
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            ValueKind::Nil => "nil",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Hash => "hash",
            ValueKind::Range => "range",
            ValueKind::Object => "object",
        })
    }
}

/// Marks hashes that carry filter keyword arguments.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum MapType {
    Normal,
    Kwargs,
}

#[derive(Clone)]
pub(crate) enum ValueRepr {
    Nil,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Hash(Arc<ValueMap>, MapType),
    Range(i64, i64),
    Object(Arc<dyn Object>),
}

impl fmt::Debug for ValueRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRepr::Nil => f.write_str("nil"),
            ValueRepr::Bool(val) => fmt::Debug::fmt(val, f),
            ValueRepr::I64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::F64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::String(val) => fmt::Debug::fmt(val, f),
            ValueRepr::Array(val) => f.debug_list().entries(val.iter()).finish(),
            ValueRepr::Hash(val, _) => f.debug_map().entries(val.iter()).finish(),
            ValueRepr::Range(start, end) => write!(f, "{}..{}", start, end),
            ValueRepr::Object(val) => fmt::Debug::fmt(val, f),
        }
    }
}

/// Represents a dynamically typed value in the template engine.
#[derive(Clone)]
pub struct Value(pub(crate) ValueRepr);

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl Default for Value {
    fn default() -> Value {
        Value::NIL
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (ValueRepr::Nil, ValueRepr::Nil) => true,
            (ValueRepr::Bool(a), ValueRepr::Bool(b)) => a == b,
            (ValueRepr::String(a), ValueRepr::String(b)) => a == b,
            (ValueRepr::Array(a), ValueRepr::Array(b)) => a == b,
            (ValueRepr::Hash(a, _), ValueRepr::Hash(b, _)) => a == b,
            (ValueRepr::Range(a1, a2), ValueRepr::Range(b1, b2)) => a1 == b1 && a2 == b2,
            (ValueRepr::Object(a), ValueRepr::Object(b)) => {
                std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
            }
            _ => match ops::coerce(self, other) {
                Some(ops::CoerceResult::I64(a, b)) => a == b,
                Some(ops::CoerceResult::F64(a, b)) => a == b,
                None => false,
            },
        }
    }
}

impl fmt::Display for Value {
    /// Renders the value the way a template outputs it.
    ///
    /// Nil renders as empty string, arrays render their items joined
    /// without separator, hashes render in inspect form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ValueRepr::Nil => Ok(()),
            ValueRepr::Bool(val) => fmt::Display::fmt(val, f),
            ValueRepr::I64(val) => fmt::Display::fmt(val, f),
            ValueRepr::F64(val) => write_float(f, *val),
            ValueRepr::String(val) => f.write_str(val),
            ValueRepr::Array(items) => {
                for item in items.iter() {
                    ok!(fmt::Display::fmt(item, f));
                }
                Ok(())
            }
            ValueRepr::Hash(_, _) => self.inspect(f),
            ValueRepr::Range(start, end) => write!(f, "{}..{}", start, end),
            ValueRepr::Object(obj) => obj.render(f),
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, val: f64) -> fmt::Result {
    if val.is_nan() {
        f.write_str("NaN")
    } else if val.is_infinite() {
        write!(f, "{}Infinity", if val.is_sign_negative() { "-" } else { "" })
    } else if val == val.trunc() && val.abs() < 1e16 {
        write!(f, "{:.1}", val)
    } else {
        write!(f, "{}", val)
    }
}

impl Value {
    /// The nil value.
    pub const NIL: Value = Value(ValueRepr::Nil);

    /// Creates a value from something that can be serialized.
    ///
    /// This is the method that MiniLiquid uses whenever a serializable
    /// object is passed to one of the APIs that internally want to create a
    /// value, for instance [`context!`](crate::context) and
    /// [`Template::render`](crate::Template::render).
    ///
    /// ```
    /// # use miniliquid::value::Value;
    /// let val = Value::from_serialize(&vec![1, 2, 3]);
    /// ```
    ///
    /// Values that fail to serialize turn into nil.
    pub fn from_serialize<T: serde::Serialize + ?Sized>(value: &T) -> Value {
        serialize::transform(value)
    }

    /// Creates a value from a host object.
    pub fn from_object<T: Object + 'static>(value: T) -> Value {
        Value(ValueRepr::Object(Arc::new(value)))
    }

    /// Creates a value from an already shared host object.
    pub fn from_dyn_object(value: Arc<dyn Object>) -> Value {
        Value(ValueRepr::Object(value))
    }

    /// Creates a hash value from a map.
    pub fn from_map(value: ValueMap) -> Value {
        Value(ValueRepr::Hash(Arc::new(value), MapType::Normal))
    }

    /// Creates the trailing keyword argument hash of a filter call.
    pub(crate) fn from_kwargs(value: ValueMap) -> Value {
        Value(ValueRepr::Hash(Arc::new(value), MapType::Kwargs))
    }

    /// Creates an inclusive integer range.
    pub fn from_range(start: i64, end: i64) -> Value {
        Value(ValueRepr::Range(start, end))
    }

    /// Returns the kind of the value.
    pub fn kind(&self) -> ValueKind {
        match self.0 {
            ValueRepr::Nil => ValueKind::Nil,
            ValueRepr::Bool(_) => ValueKind::Bool,
            ValueRepr::I64(_) | ValueRepr::F64(_) => ValueKind::Number,
            ValueRepr::String(_) => ValueKind::String,
            ValueRepr::Array(_) => ValueKind::Array,
            ValueRepr::Hash(_, _) => ValueKind::Hash,
            ValueRepr::Range(..) => ValueKind::Range,
            ValueRepr::Object(_) => ValueKind::Object,
        }
    }

    /// Returns the type name as it appears in error messages.
    pub fn type_name(&self) -> &str {
        match self.0 {
            ValueRepr::Nil => "NilClass",
            ValueRepr::Bool(true) => "TrueClass",
            ValueRepr::Bool(false) => "FalseClass",
            ValueRepr::I64(_) => "Integer",
            ValueRepr::F64(_) => "Float",
            ValueRepr::String(_) => "String",
            ValueRepr::Array(_) => "Array",
            ValueRepr::Hash(_, _) => "Hash",
            ValueRepr::Range(..) => "Range",
            ValueRepr::Object(ref obj) => obj.type_name(),
        }
    }

    /// Is this value nil?
    pub fn is_nil(&self) -> bool {
        matches!(self.0, ValueRepr::Nil)
    }

    /// Is this value a number?
    pub fn is_number(&self) -> bool {
        matches!(self.0, ValueRepr::I64(_) | ValueRepr::F64(_))
    }

    /// Is this value true?
    ///
    /// Nil, `false` and the empty string are falsy, everything else is
    /// truthy.  Host objects decide for themselves.
    pub fn is_true(&self) -> bool {
        match self.0 {
            ValueRepr::Nil => false,
            ValueRepr::Bool(val) => val,
            ValueRepr::String(ref val) => !val.is_empty(),
            ValueRepr::Object(ref obj) => obj.is_true(),
            _ => true,
        }
    }

    /// Does this value match the `blank` literal?
    ///
    /// Blank values are nil, `false`, strings made only of whitespace and
    /// empty collections.
    pub fn is_blank(&self) -> bool {
        match self.0 {
            ValueRepr::Nil => true,
            ValueRepr::Bool(val) => !val,
            ValueRepr::String(ref val) => val.trim().is_empty(),
            ValueRepr::Array(ref items) => items.is_empty(),
            ValueRepr::Hash(ref map, _) => map.is_empty(),
            ValueRepr::Object(ref obj) => obj.len() == Some(0),
            _ => false,
        }
    }

    /// Does this value match the `empty` literal?
    ///
    /// Empty values are nil, the empty string and empty collections.
    pub fn is_empty(&self) -> bool {
        match self.0 {
            ValueRepr::Nil => true,
            ValueRepr::String(ref val) => val.is_empty(),
            ValueRepr::Array(ref items) => items.is_empty(),
            ValueRepr::Hash(ref map, _) => map.is_empty(),
            ValueRepr::Object(ref obj) => obj.len() == Some(0),
            _ => false,
        }
    }

    /// If the value is a string, return it.
    pub fn as_str(&self) -> Option<&str> {
        match self.0 {
            ValueRepr::String(ref s) => Some(s),
            _ => None,
        }
    }

    /// If the value is an integer, return it.
    pub fn as_i64(&self) -> Option<i64> {
        match self.0 {
            ValueRepr::I64(val) => Some(val),
            _ => None,
        }
    }

    /// If the value is a number, return it as float.
    pub fn as_f64(&self) -> Option<f64> {
        match self.0 {
            ValueRepr::I64(val) => Some(val as f64),
            ValueRepr::F64(val) => Some(val),
            _ => None,
        }
    }

    /// If the value is an array, return its items.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self.0 {
            ValueRepr::Array(ref items) => Some(&items[..]),
            _ => None,
        }
    }

    /// If the value is a hash, return the map.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self.0 {
            ValueRepr::Hash(ref map, _) => Some(map),
            _ => None,
        }
    }

    /// If the value is a host object, return it.
    pub fn as_object(&self) -> Option<&Arc<dyn Object>> {
        match self.0 {
            ValueRepr::Object(ref obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the string form of the value, borrowing where possible.
    pub fn to_str(&self) -> Cow<'_, str> {
        match self.0 {
            ValueRepr::String(ref s) => Cow::Borrowed(s),
            _ => Cow::Owned(self.to_string()),
        }
    }

    /// Returns the length of strings, collections and ranges.
    pub fn len(&self) -> Option<usize> {
        match self.0 {
            ValueRepr::String(ref s) => Some(s.chars().count()),
            ValueRepr::Array(ref items) => Some(items.len()),
            ValueRepr::Hash(ref map, _) => Some(map.len()),
            ValueRepr::Range(start, end) => Some(range_len(start, end)),
            ValueRepr::Object(ref obj) => obj.len(),
            _ => None,
        }
    }

    /// Looks up a hash key or an object property.
    pub fn get_key(&self, key: &str) -> Option<Value> {
        match self.0 {
            ValueRepr::Hash(ref map, _) => map.get(key).cloned(),
            ValueRepr::Object(ref obj) => obj.get_value(key),
            _ => None,
        }
    }

    /// Returns true if the hash has the given key.
    pub(crate) fn has_key(&self, key: &str) -> bool {
        match self.0 {
            ValueRepr::Hash(ref map, _) => map.contains_key(key),
            _ => false,
        }
    }

    /// Looks up an index in an array or range.  Negative indexes count
    /// from the end.
    pub fn get_index(&self, idx: i64) -> Option<Value> {
        match self.0 {
            ValueRepr::Array(ref items) => {
                let idx = some!(resolve_index(idx, items.len()));
                items.get(idx).cloned()
            }
            ValueRepr::Range(start, end) => {
                let len = (end as i128 - start as i128 + 1).max(0);
                let idx = if idx < 0 { len + idx as i128 } else { idx as i128 };
                if (0..len).contains(&idx) {
                    Some(Value::from((start as i128 + idx) as i64))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns the values a `for` loop or an array filter iterates over.
    ///
    /// Hashes iterate as `[key, value]` pairs, strings iterate as a single
    /// item unless empty, scalars do not iterate at all.
    pub fn to_list(&self) -> Vec<Value> {
        match self.0 {
            ValueRepr::Array(ref items) => items.to_vec(),
            ValueRepr::Range(start, end) => (start..=end).map(Value::from).collect(),
            ValueRepr::Hash(ref map, _) => map
                .iter()
                .map(|(k, v)| Value::from(vec![Value::from(k.clone()), v.clone()]))
                .collect(),
            ValueRepr::String(ref s) if !s.is_empty() => vec![self.clone()],
            ValueRepr::Object(ref obj) => obj.enumerate().unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Applies one of the command properties (`size`, `first`, `last`).
    pub(crate) fn command(&self, name: &str) -> Option<Value> {
        match (name, &self.0) {
            ("size", _) => self.len().map(Value::from),
            ("first", ValueRepr::String(s)) => Some(Value::from(
                s.chars().next().map(String::from).unwrap_or_default(),
            )),
            ("last", ValueRepr::String(s)) => Some(Value::from(
                s.chars().last().map(String::from).unwrap_or_default(),
            )),
            ("first", ValueRepr::Hash(map, _)) => map
                .iter()
                .next()
                .map(|(k, v)| Value::from(vec![Value::from(k.clone()), v.clone()])),
            ("first", ValueRepr::Array(_) | ValueRepr::Range(..)) => self.get_index(0),
            ("last", ValueRepr::Array(_) | ValueRepr::Range(..)) => self.get_index(-1),
            ("first", ValueRepr::Object(obj)) => obj.enumerate().and_then(|x| x.first().cloned()),
            ("last", ValueRepr::Object(obj)) => obj.enumerate().and_then(|x| x.last().cloned()),
            _ => None,
        }
    }

    /// Converts a value to an integer the way ranges and loop arguments do.
    pub(crate) fn to_integer(&self) -> Result<i64, crate::Error> {
        match self.0 {
            ValueRepr::I64(val) => Ok(val),
            ValueRepr::F64(val) => Ok(val as i64),
            ValueRepr::Nil => Ok(0),
            ValueRepr::String(ref s) => Ok(leading_integer(s)),
            _ => Err(crate::Error::argument("invalid integer")),
        }
    }

    /// Writes the inspect form of the value (`{"a"=>1}`, `[1, "b"]`).
    pub(crate) fn inspect(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ValueRepr::Nil => f.write_str("nil"),
            ValueRepr::String(s) => write!(f, "{:?}", s),
            ValueRepr::Array(items) => {
                ok!(f.write_str("["));
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        ok!(f.write_str(", "));
                    }
                    ok!(item.inspect(f));
                }
                f.write_str("]")
            }
            ValueRepr::Hash(map, _) => {
                ok!(f.write_str("{"));
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        ok!(f.write_str(", "));
                    }
                    ok!(write!(f, "{:?}=>", key));
                    ok!(value.inspect(f));
                }
                f.write_str("}")
            }
            _ => fmt::Display::fmt(self, f),
        }
    }
}

/// Displays a value in its inspect form.
pub(crate) struct Inspect<'a>(pub &'a Value);

impl<'a> fmt::Display for Inspect<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.inspect(f)
    }
}

/// Parses the integer prefix of a string, `0` if there is none.
fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let digits_start = usize::from(s.starts_with(['-', '+']));
    let end = s[digits_start..]
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .map_or(s.len(), |x| x + digits_start);
    s[..end].parse().unwrap_or(0)
}

// saturates for ranges wider than the address space
fn range_len(start: i64, end: i64) -> usize {
    if end < start {
        0
    } else {
        usize::try_from(end as i128 - start as i128 + 1).unwrap_or(usize::MAX)
    }
}

fn resolve_index(idx: i64, len: usize) -> Option<usize> {
    let idx = if idx < 0 {
        len as i128 + idx as i128
    } else {
        idx as i128
    };
    usize::try_from(idx).ok().filter(|&idx| idx < len)
}

impl From<ValueRepr> for Value {
    #[inline(always)]
    fn from(val: ValueRepr) -> Value {
        Value(val)
    }
}

impl<'a> From<&'a str> for Value {
    #[inline(always)]
    fn from(val: &'a str) -> Self {
        ValueRepr::String(Arc::from(val)).into()
    }
}

impl From<String> for Value {
    #[inline(always)]
    fn from(val: String) -> Self {
        ValueRepr::String(Arc::from(val)).into()
    }
}

impl From<Arc<str>> for Value {
    #[inline(always)]
    fn from(val: Arc<str>) -> Self {
        ValueRepr::String(val).into()
    }
}

impl<'a> From<Cow<'a, str>> for Value {
    #[inline(always)]
    fn from(val: Cow<'a, str>) -> Self {
        match val {
            Cow::Borrowed(x) => x.into(),
            Cow::Owned(x) => x.into(),
        }
    }
}

impl From<()> for Value {
    #[inline(always)]
    fn from(_: ()) -> Self {
        ValueRepr::Nil.into()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline(always)]
    fn from(val: Option<T>) -> Self {
        match val {
            Some(val) => val.into(),
            None => Value::NIL,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(val: Vec<T>) -> Self {
        let vec = val.into_iter().map(|v| v.into()).collect();
        ValueRepr::Array(Arc::new(vec)).into()
    }
}

impl From<ValueMap> for Value {
    fn from(val: ValueMap) -> Self {
        Value::from_map(val)
    }
}

impl<V: Into<Value>> FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        let vec = iter.into_iter().map(|v| v.into()).collect();
        ValueRepr::Array(Arc::new(vec)).into()
    }
}

impl<K: Into<Arc<str>>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let map = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        ValueRepr::Hash(Arc::new(map), MapType::Normal).into()
    }
}

macro_rules! value_from {
    ($src:ty, $dst:ident) => {
        impl From<$src> for Value {
            #[inline(always)]
            fn from(val: $src) -> Self {
                ValueRepr::$dst(val as _).into()
            }
        }
    };
}

value_from!(bool, Bool);
value_from!(u8, I64);
value_from!(u16, I64);
value_from!(u32, I64);
value_from!(i8, I64);
value_from!(i16, I64);
value_from!(i32, I64);
value_from!(i64, I64);
value_from!(f32, F64);
value_from!(f64, F64);

impl From<u64> for Value {
    fn from(val: u64) -> Self {
        match i64::try_from(val) {
            Ok(val) => ValueRepr::I64(val).into(),
            Err(_) => ValueRepr::F64(val as f64).into(),
        }
    }
}

impl From<usize> for Value {
    fn from(val: usize) -> Self {
        Value::from(val as u64)
    }
}

impl From<char> for Value {
    fn from(val: char) -> Self {
        Value::from(val.to_string())
    }
}

/// Compares two values for ordering.
///
/// Only numbers with numbers and strings with strings are ordered.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (&a.0, &b.0) {
        (ValueRepr::String(a), ValueRepr::String(b)) => Some(a.cmp(b)),
        _ => match ops::coerce(a, b) {
            Some(ops::CoerceResult::I64(a, b)) => Some(a.cmp(&b)),
            Some(ops::CoerceResult::F64(a, b)) => a.partial_cmp(&b),
            None => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(Value::NIL.to_string(), "");
        assert_eq!(Value::from(1.0).to_string(), "1.0");
        assert_eq!(Value::from(0.5).to_string(), "0.5");
        assert_eq!(Value::from(vec![1, 2, 3]).to_string(), "123");
        assert_eq!(Value::from_range(1, 3).to_string(), "1..3");
        let map: Value = [("a", 1)].into_iter().collect();
        assert_eq!(map.to_string(), "{\"a\"=>1}");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::NIL.is_true());
        assert!(!Value::from(false).is_true());
        assert!(!Value::from("").is_true());
        assert!(Value::from(0).is_true());
        assert!(Value::from(Vec::<Value>::new()).is_true());
    }

    #[test]
    fn test_blank_and_empty() {
        assert!(Value::from("  \n").is_blank());
        assert!(!Value::from("  \n").is_empty());
        assert!(Value::from(false).is_blank());
        assert!(!Value::from(false).is_empty());
        assert!(Value::from(Vec::<Value>::new()).is_empty());
        assert!(!Value::from(0).is_blank());
    }

    #[test]
    fn test_commands() {
        let items = Value::from(vec![1, 2, 3]);
        assert_eq!(items.command("size"), Some(Value::from(3)));
        assert_eq!(items.command("first"), Some(Value::from(1)));
        assert_eq!(items.command("last"), Some(Value::from(3)));
        assert_eq!(Value::from("abc").command("first"), Some(Value::from("a")));
        assert_eq!(Value::from("").command("last"), Some(Value::from("")));
        assert_eq!(Value::from_range(2, 5).command("size"), Some(Value::from(4)));
    }

    #[test]
    fn test_wide_ranges() {
        let full = Value::from_range(i64::MIN, i64::MAX);
        assert_eq!(full.len(), Some(usize::MAX));
        assert!(full.command("size").unwrap().as_i64().is_none());
        assert_eq!(full.get_index(0), Some(Value::from(i64::MIN)));
        assert_eq!(full.get_index(-1), Some(Value::from(i64::MAX)));

        let small = Value::from_range(1, 3);
        assert_eq!(small.get_index(2), Some(Value::from(3)));
        assert_eq!(small.get_index(3), None);
        assert_eq!(small.get_index(-3), Some(Value::from(1)));
        assert_eq!(small.get_index(-4), None);
        assert_eq!(small.get_index(i64::MIN), None);
        assert_eq!(Value::from_range(3, 1).len(), Some(0));
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_eq!(
            compare(&Value::from(1), &Value::from(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(compare(&Value::from(1), &Value::from("a")), None);
    }
}
