//! Filter functions and abstractions.
//!
//! Liquid filters are functions which are applied to values to modify them.
//! For example the expression `{{ "hello" | append: " world" }}` invokes the
//! filter `append` with the input `"hello"` and the argument `" world"`.
//!
//! # Custom Filters
//!
//! A custom filter is a function which accepts the render [`Context`] and
//! at least the input value, and returns a new value.  For instance the
//! following shows a filter which replaces whitespace with dashes and
//! converts the input to lowercase:
//!
//! ```
//! # use miniliquid::{Context, Environment};
//! # let mut env = Environment::new();
//! fn slugify(_ctx: &Context, value: String) -> String {
//!     value.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
//! }
//!
//! env.register_filter("slugify", slugify);
//! ```
//!
//! Arguments are converted automatically through the
//! [`ArgType`](crate::value::ArgType) trait.  Optional arguments are
//! declared with `Option<T>`, the remaining positional arguments can be
//! captured with [`Rest<T>`](crate::value::Rest) and keyword arguments
//! (`name: value`) with [`Kwargs`](crate::value::Kwargs) in last position.
//! Passing the wrong number of arguments fails with
//! `wrong number of arguments (given N, expected M)` where the input counts
//! as an argument.
//!
//! # Name Resolution
//!
//! Filters are looked up by their exact name first, then by the camel case
//! form of a snake case name (`my_filter` finds `myFilter`) and finally case
//! insensitively.  If nothing matches and the input is a hash or a host
//! object, a property of the same name is returned instead.  Otherwise the
//! input is passed through unchanged, or with `strict_filters` an
//! `UndefinedFilter` error is raised.
//!
//! # Built-in Filters
//!
//! When the `builtins` feature is enabled the standard filters are
//! automatically registered with the environment.  They are also provided
//! in this module.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::utils::snake_to_camel;
use crate::value::{FunctionArgs, FunctionResult, Value};
use crate::vm::Context;

type FilterFunc = dyn Fn(&Context, &[Value]) -> Result<Value, Error> + Sync + Send + 'static;

/// A type-erased filter.
#[derive(Clone)]
pub struct BoxedFilter(Arc<FilterFunc>, &'static str);

/// A utility trait that represents filters.
///
/// Filters receive the render [`Context`] by reference as first parameter,
/// the input value as second and up to four further arguments.
///
/// A filter can return any of the following types:
///
/// * `Rv` where `Rv` implements `Into<Value>`
/// * `Result<Rv, Error>` where `Rv` implements `Into<Value>`
pub trait Filter<Rv, Args>: Send + Sync + 'static {
    /// Applies a filter to value with the given arguments.
    #[doc(hidden)]
    fn apply_to(&self, ctx: &Context, args: Args) -> Rv;
}

macro_rules! tuple_impls {
    ( $( $name:ident )* ) => {
        impl<Func, Rv, $($name),*> Filter<Rv, ($($name,)*)> for Func
        where
            Func: Fn(&Context, $($name),*) -> Rv + Send + Sync + 'static,
            Rv: FunctionResult,
        {
            fn apply_to(&self, ctx: &Context, args: ($($name,)*)) -> Rv {
                #[allow(non_snake_case)]
                let ($($name,)*) = args;
                (self)(ctx, $($name,)*)
            }
        }
    };
}

tuple_impls! { A }
tuple_impls! { A B }
tuple_impls! { A B C }
tuple_impls! { A B C D }
tuple_impls! { A B C D E }

impl BoxedFilter {
    /// Creates a new boxed filter.
    pub fn new<F, Rv, Args>(f: F) -> BoxedFilter
    where
        F: Filter<Rv, Args> + for<'a> Filter<Rv, <Args as FunctionArgs<'a>>::Output>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        BoxedFilter(
            Arc::new(move |ctx, args| -> Result<Value, Error> {
                f.apply_to(ctx, ok!(Args::from_values(args))).into_result()
            }),
            std::any::type_name::<F>(),
        )
    }

    /// Applies the filter to the input followed by the arguments.
    pub fn apply_to(&self, ctx: &Context, args: &[Value]) -> Result<Value, Error> {
        (self.0)(ctx, args)
    }
}

impl fmt::Debug for BoxedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxedFilter({})", self.1)
    }
}

/// A named collection of filters.
///
/// Filter sets are registered as a whole with
/// [`Environment::register_filters`](crate::Environment::register_filters)
/// or passed for a single render with
/// [`RenderOptions::filters`](crate::RenderOptions::filters).
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: BTreeMap<String, BoxedFilter>,
}

impl FilterSet {
    /// Creates an empty filter set.
    pub fn new() -> FilterSet {
        FilterSet::default()
    }

    /// Adds a filter to the set.
    pub fn add<N, F, Rv, Args>(&mut self, name: N, f: F) -> &mut Self
    where
        N: Into<String>,
        F: Filter<Rv, Args> + for<'a> Filter<Rv, <Args as FunctionArgs<'a>>::Output>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.filters.insert(name.into(), BoxedFilter::new(f));
        self
    }

    /// Adds an already boxed filter.
    pub fn add_boxed<N: Into<String>>(&mut self, name: N, f: BoxedFilter) -> &mut Self {
        self.filters.insert(name.into(), f);
        self
    }

    /// Iterates over the filters in the set.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoxedFilter)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if the set has no filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Resolves filter names and invokes filters.
///
/// The lookup table is computed when filters are added so that invoking a
/// filter never has to scan all names.
#[derive(Debug, Clone, Default)]
pub struct Strainer {
    filters: BTreeMap<String, BoxedFilter>,
    folded: BTreeMap<String, String>,
}

impl Strainer {
    /// Creates an empty strainer.
    pub fn new() -> Strainer {
        Strainer::default()
    }

    /// Adds a single filter.  Later additions replace earlier ones.
    pub fn add(&mut self, name: &str, filter: BoxedFilter) {
        self.folded.insert(name.to_lowercase(), name.to_string());
        self.filters.insert(name.to_string(), filter);
    }

    /// Adds all filters of a set.
    pub fn add_set(&mut self, set: &FilterSet) {
        for (name, filter) in set.iter() {
            self.add(name, filter.clone());
        }
    }

    /// Looks up a filter by name.
    pub fn get(&self, name: &str) -> Option<&BoxedFilter> {
        if let Some(filter) = self.filters.get(name) {
            return Some(filter);
        }
        if name.contains('_') {
            if let Some(filter) = self.filters.get(&snake_to_camel(name)) {
                return Some(filter);
            }
        }
        self.folded
            .get(&name.to_lowercase())
            .and_then(|name| self.filters.get(name))
    }

    /// Checks if a filter can be resolved.
    pub fn is_invokable(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Invokes a filter on the input.
    pub fn invoke(
        &self,
        ctx: &Context,
        name: &str,
        input: Value,
        args: &[Value],
    ) -> Result<Value, Error> {
        if let Some(filter) = self.get(name) {
            let mut all_args = Vec::with_capacity(args.len() + 1);
            all_args.push(input);
            all_args.extend_from_slice(args);
            return filter.apply_to(ctx, &all_args);
        }

        if let Some(value) = input.get_key(name) {
            return Ok(value);
        }

        if ctx.strict_filters() {
            Err(Error::new(
                ErrorKind::UndefinedFilter,
                format!("undefined filter {}", name),
            ))
        } else {
            Ok(input)
        }
    }
}

#[cfg(feature = "builtins")]
mod builtins;

#[cfg(feature = "builtins")]
pub use self::builtins::*;

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &Context, value: Value) -> Value {
        value
    }

    #[test]
    fn test_name_resolution() {
        let mut strainer = Strainer::new();
        strainer.add("myFilter", BoxedFilter::new(noop));
        strainer.add("Other", BoxedFilter::new(noop));
        assert!(strainer.is_invokable("myFilter"));
        assert!(strainer.is_invokable("my_filter"));
        assert!(strainer.is_invokable("MYFILTER"));
        assert!(strainer.is_invokable("other"));
        assert!(!strainer.is_invokable("missing"));
    }

    #[test]
    fn test_later_sets_override() {
        fn first(_ctx: &Context, _value: Value) -> &'static str {
            "first"
        }
        fn second(_ctx: &Context, _value: Value) -> &'static str {
            "second"
        }
        let mut a = FilterSet::new();
        a.add("pick", first);
        let mut b = FilterSet::new();
        b.add("pick", second);
        let mut strainer = Strainer::new();
        strainer.add_set(&a);
        strainer.add_set(&b);
        assert!(format!("{:?}", strainer.get("pick").unwrap()).contains("second"));
    }
}
