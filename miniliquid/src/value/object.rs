use std::fmt;
use std::sync::Arc;

use crate::value::Value;
use crate::vm::Context;

/// A utility trait that represents a dynamic host object (a "drop").
///
/// Drops are how a host application exposes data to templates without
/// converting it into plain values up front.  Properties are resolved
/// lazily through [`get_value`](Self::get_value) whenever a template
/// accesses `obj.property` or `obj["property"]`.  Only what a drop
/// explicitly returns is visible to templates.
///
/// ```
/// use std::fmt;
/// use miniliquid::value::{Object, Value};
///
/// #[derive(Debug)]
/// struct Product {
///     title: String,
///     price: i64,
/// }
///
/// impl Object for Product {
///     fn get_value(&self, key: &str) -> Option<Value> {
///         match key {
///             "title" => Some(Value::from(self.title.as_str())),
///             "price" => Some(Value::from(self.price)),
///             _ => None,
///         }
///     }
/// }
/// ```
///
/// A drop that is passed as the render assigns becomes the fallback for
/// all otherwise unresolved top-level variables.
pub trait Object: fmt::Debug + Send + Sync {
    /// Resolves a property of the object.
    ///
    /// Returning `None` signals that the property does not exist.  With
    /// strict variables enabled this turns into an
    /// [`UndefinedDropMethod`](crate::ErrorKind::UndefinedDropMethod) error.
    fn get_value(&self, key: &str) -> Option<Value>;

    /// Resolves a property while a template renders.
    ///
    /// This is what templates call.  It defaults to
    /// [`get_value`](Self::get_value), override it when a property depends
    /// on other variables of the render.  A drop used as the render assigns
    /// that looks up its own property through the context resolves it as
    /// undefined instead of recursing.
    fn get_value_in(&self, key: &str, _ctx: &Context<'_>) -> Option<Value> {
        self.get_value(key)
    }

    /// Returns the items of the object if it can be iterated over.
    ///
    /// This is used by the `for` tag and by array filters.
    fn enumerate(&self) -> Option<Vec<Value>> {
        None
    }

    /// Returns the length of the object if it has one.
    ///
    /// This backs the `size` command.
    fn len(&self) -> Option<usize> {
        self.enumerate().map(|x| x.len())
    }

    /// Returns the truthiness of the object.
    fn is_true(&self) -> bool {
        true
    }

    /// The type name used in error messages.
    fn type_name(&self) -> &str {
        "Drop"
    }

    /// Renders the object when it is output by a template.
    ///
    /// The default implementation renders the type name.
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl<T: Object + ?Sized> Object for Arc<T> {
    fn get_value(&self, key: &str) -> Option<Value> {
        (**self).get_value(key)
    }

    fn get_value_in(&self, key: &str, ctx: &Context<'_>) -> Option<Value> {
        (**self).get_value_in(key, ctx)
    }

    fn enumerate(&self) -> Option<Vec<Value>> {
        (**self).enumerate()
    }

    fn len(&self) -> Option<usize> {
        (**self).len()
    }

    fn is_true(&self) -> bool {
        (**self).is_true()
    }

    fn type_name(&self) -> &str {
        (**self).type_name()
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).render(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter(usize);

    impl Object for Counter {
        fn get_value(&self, key: &str) -> Option<Value> {
            match key {
                "count" => Some(Value::from(self.0 as i64)),
                _ => None,
            }
        }

        fn enumerate(&self) -> Option<Vec<Value>> {
            Some((0..self.0 as i64).map(Value::from).collect())
        }
    }

    #[test]
    fn test_default_len_uses_enumerate() {
        let obj = Counter(3);
        assert_eq!(obj.len(), Some(3));
        assert_eq!(obj.get_value("count"), Some(Value::from(3)));
        assert_eq!(obj.get_value("missing"), None);
    }
}
