use std::ops::{Deref, DerefMut};

use crate::error::{Error, ErrorKind};
use crate::value::{MapType, Value, ValueMap, ValueRepr};

/// A utility trait that represents the return value of filters.
///
/// It's implemented for the following types:
///
/// * `Rv` where `Rv` implements `Into<Value>`
/// * `Result<Rv, Error>` where `Rv` implements `Into<Value>`
pub trait FunctionResult {
    #[doc(hidden)]
    fn into_result(self) -> Result<Value, Error>;
}

impl<I: Into<Value>> FunctionResult for Result<I, Error> {
    fn into_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<I: Into<Value>> FunctionResult for I {
    fn into_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Helper trait representing valid filter arguments.
///
/// Since it's more convenient to write filters with concrete types instead
/// of values, this helper trait exists to automatically perform this
/// conversion.  It is implemented for filters up to an arity of 5
/// parameters (including the filter input).
///
/// For each argument the conversion is performed via the [`ArgType`]
/// trait which is implemented for many common types.
pub trait FunctionArgs<'a> {
    /// The output type of the function arguments.
    type Output;

    /// Converts to function arguments from a slice of values.
    #[doc(hidden)]
    fn from_values(values: &'a [Value]) -> Result<Self::Output, Error>;
}

/// A trait implemented by all filter argument types.
///
/// This trait is used by [`FunctionArgs`].  It's implemented for the
/// following types:
///
/// * integers: [`i64`], [`usize`] (numbers and numeric strings)
/// * floats: [`f64`] (numbers and numeric strings)
/// * bool: [`bool`]
/// * string: [`String`] (every value converts through its rendered form)
/// * values: [`Value`], `&Value`
/// * keyword arguments: [`Kwargs`]
///
/// The type is also implemented for optional values (`Option<T>`) which is
/// used to encode optional parameters to filters.  Additionally it's
/// implemented for [`Rest<T>`] which is used to encode the remaining
/// arguments of a filter call.
pub trait ArgType<'a> {
    /// The output type of this argument.
    type Output;

    #[doc(hidden)]
    fn from_value(value: Option<&'a Value>) -> Result<Self::Output, Error>;

    #[doc(hidden)]
    #[inline(always)]
    fn from_values(values: &'a [Value], offset: usize) -> Result<(Self::Output, usize), Error> {
        Ok((ok!(Self::from_value(values.get(offset))), 1))
    }
}

fn wrong_arity(given: usize, expected: usize) -> Error {
    Error::new(
        ErrorKind::Argument,
        format!(
            "wrong number of arguments (given {}, expected {})",
            given, expected
        ),
    )
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! tuple_impls {
    ( $( $name:ident )* ) => {
        impl<'a, $($name),*> FunctionArgs<'a> for ($($name,)*)
            where $($name: ArgType<'a>,)*
        {
            type Output = ($($name::Output,)*);

            fn from_values(values: &'a [Value]) -> Result<Self::Output, Error> {
                #![allow(non_snake_case, unused)]
                let expected = count!($($name)*);
                let mut idx = 0;
                $(
                    let ($name, offset) = match $name::from_values(values, idx) {
                        Ok(rv) => rv,
                        Err(err) if err.kind() == ErrorKind::Argument && values.get(idx).is_none() => {
                            return Err(wrong_arity(values.len(), expected));
                        }
                        Err(err) => return Err(err),
                    };
                    idx += offset;
                )*
                if values.get(idx).is_some() {
                    Err(wrong_arity(values.len(), expected))
                } else {
                    Ok(( $($name,)* ))
                }
            }
        }
    };
}

tuple_impls! {}
tuple_impls! { A }
tuple_impls! { A B }
tuple_impls! { A B C }
tuple_impls! { A B C D }
tuple_impls! { A B C D E }

fn missing_argument() -> Error {
    Error::new(ErrorKind::Argument, "missing argument")
}

fn invalid_integer() -> Error {
    Error::argument("invalid integer")
}

impl<'a> ArgType<'a> for Value {
    type Output = Self;

    fn from_value(value: Option<&'a Value>) -> Result<Self, Error> {
        match value {
            Some(value) => Ok(value.clone()),
            None => Err(missing_argument()),
        }
    }
}

impl<'a> ArgType<'a> for &Value {
    type Output = &'a Value;

    fn from_value(value: Option<&'a Value>) -> Result<&'a Value, Error> {
        value.ok_or_else(missing_argument)
    }
}

impl<'a> ArgType<'a> for String {
    type Output = Self;

    fn from_value(value: Option<&'a Value>) -> Result<Self, Error> {
        match value {
            Some(value) => Ok(value.to_string()),
            None => Err(missing_argument()),
        }
    }
}

impl<'a> ArgType<'a> for bool {
    type Output = Self;

    fn from_value(value: Option<&'a Value>) -> Result<Self, Error> {
        match value {
            Some(value) => Ok(value.is_true()),
            None => Err(missing_argument()),
        }
    }
}

impl<'a> ArgType<'a> for i64 {
    type Output = Self;

    fn from_value(value: Option<&'a Value>) -> Result<Self, Error> {
        match value {
            Some(value) => match value.0 {
                ValueRepr::I64(val) => Ok(val),
                ValueRepr::F64(val) => Ok(val as i64),
                ValueRepr::String(ref s) => s.trim().parse().map_err(|_| invalid_integer()),
                _ => Err(invalid_integer()),
            },
            None => Err(missing_argument()),
        }
    }
}

impl<'a> ArgType<'a> for usize {
    type Output = Self;

    fn from_value(value: Option<&'a Value>) -> Result<Self, Error> {
        let val = ok!(i64::from_value(value));
        usize::try_from(val).map_err(|_| invalid_integer())
    }
}

impl<'a> ArgType<'a> for f64 {
    type Output = Self;

    fn from_value(value: Option<&'a Value>) -> Result<Self, Error> {
        match value {
            Some(value) => match value.0 {
                ValueRepr::I64(val) => Ok(val as f64),
                ValueRepr::F64(val) => Ok(val),
                ValueRepr::String(ref s) => s
                    .trim()
                    .parse()
                    .map_err(|_| Error::argument("invalid value for Float")),
                _ => Err(Error::argument(format!(
                    "can't convert {} into Float",
                    value.type_name()
                ))),
            },
            None => Err(missing_argument()),
        }
    }
}

impl<'a, T: ArgType<'a, Output = T>> ArgType<'a> for Option<T> {
    type Output = Option<T>;

    fn from_value(value: Option<&'a Value>) -> Result<Self::Output, Error> {
        match value {
            Some(value) if value.is_nil() => Ok(None),
            Some(value) => T::from_value(Some(value)).map(Some),
            None => Ok(None),
        }
    }

    fn from_values(values: &'a [Value], offset: usize) -> Result<(Self::Output, usize), Error> {
        match values.get(offset) {
            // keyword arguments are always trailing and never fill an
            // optional positional slot.
            Some(value) if offset + 1 == values.len() && Kwargs::is_kwargs(value) => Ok((None, 0)),
            value => Ok((ok!(Self::from_value(value)), if value.is_some() { 1 } else { 0 })),
        }
    }
}

/// Utility type to capture remaining arguments.
///
/// ```
/// # use miniliquid::Context;
/// use miniliquid::value::Rest;
///
/// fn sum(_ctx: &Context, first: i64, rest: Rest<i64>) -> i64 {
///     first + rest.iter().sum::<i64>()
/// }
/// ```
#[derive(Debug)]
pub struct Rest<T>(pub Vec<T>);

impl<T> Deref for Rest<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Rest<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'a, T: ArgType<'a, Output = T>> ArgType<'a> for Rest<T> {
    type Output = Self;

    fn from_value(value: Option<&'a Value>) -> Result<Self, Error> {
        Ok(Rest(ok!(value
            .iter()
            .map(|v| T::from_value(Some(v)))
            .collect::<Result<_, _>>())))
    }

    fn from_values(values: &'a [Value], offset: usize) -> Result<(Self, usize), Error> {
        let args = values.get(offset..).unwrap_or_default();
        Ok((
            Rest(ok!(args
                .iter()
                .map(|v| T::from_value(Some(v)))
                .collect::<Result<_, _>>())),
            args.len(),
        ))
    }
}

/// Keyword arguments passed to a filter (`name: value`).
///
/// Keyword arguments arrive as a trailing hash after the positional
/// arguments.  A filter that accepts them declares a trailing `Kwargs`
/// parameter which is empty when none were passed.
///
/// ```
/// # use miniliquid::Context;
/// use miniliquid::value::{Kwargs, Value};
///
/// fn default(_ctx: &Context, value: Value, other: Option<Value>, kwargs: Kwargs) -> Value {
///     let allow_false = kwargs.get("allow_false").map_or(false, |x| x.is_true());
///     if value.is_true() || (allow_false && value == Value::from(false)) {
///         value
///     } else {
///         other.unwrap_or_else(|| Value::from(""))
///     }
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct Kwargs(ValueMap);

impl Kwargs {
    fn is_kwargs(value: &Value) -> bool {
        matches!(value.0, ValueRepr::Hash(_, MapType::Kwargs))
    }

    /// Returns a keyword argument.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Checks if a keyword argument was passed.
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over the passed keyword argument names.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|x| &**x)
    }
}

impl<'a> ArgType<'a> for Kwargs {
    type Output = Self;

    fn from_value(value: Option<&'a Value>) -> Result<Self, Error> {
        match value {
            Some(value) => match value.as_map() {
                Some(map) => Ok(Kwargs(map.clone())),
                None => Err(Error::argument("keyword arguments must be a hash")),
            },
            None => Ok(Kwargs::default()),
        }
    }

    fn from_values(values: &'a [Value], offset: usize) -> Result<(Self, usize), Error> {
        match values.get(offset) {
            Some(value) => Ok((ok!(Self::from_value(Some(value))), 1)),
            None => Ok((Kwargs::default(), 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[Value]) -> Vec<Value> {
        values.to_vec()
    }

    #[test]
    fn test_optional_and_required() {
        let values = args(&[Value::from("abc"), Value::from("5")]);
        let (s, n): (String, Option<i64>) =
            <(String, Option<i64>)>::from_values(&values).unwrap();
        assert_eq!(s, "abc");
        assert_eq!(n, Some(5));

        let values = args(&[Value::from("abc")]);
        let (_, n): (String, Option<i64>) =
            <(String, Option<i64>)>::from_values(&values).unwrap();
        assert_eq!(n, None);
    }

    #[test]
    fn test_arity_errors() {
        let values = args(&[Value::from(1)]);
        let err = <(i64, i64)>::from_values(&values).unwrap_err();
        assert_eq!(err.message(), "wrong number of arguments (given 1, expected 2)");

        let values = args(&[Value::from(1), Value::from(2), Value::from(3)]);
        let err = <(i64, i64)>::from_values(&values).unwrap_err();
        assert_eq!(err.message(), "wrong number of arguments (given 3, expected 2)");
    }

    #[test]
    fn test_kwargs_are_trailing() {
        let mut map = ValueMap::new();
        map.insert("allow_false".into(), Value::from(true));
        let values = args(&[Value::from(false), Value::from_kwargs(map)]);
        let (_, other, kwargs) =
            <(Value, Option<Value>, Kwargs)>::from_values(&values).unwrap();
        assert!(other.is_none());
        assert_eq!(kwargs.get("allow_false"), Some(&Value::from(true)));
    }
}
