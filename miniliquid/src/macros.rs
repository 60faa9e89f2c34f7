// Plain early returns for `Result` and `Option`.  Unlike `?` they never
// convert the error type, errors are always `crate::Error` here.

macro_rules! ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => return Err(err),
        }
    };
}

macro_rules! some {
    ($expr:expr) => {
        match $expr {
            Some(val) => val,
            None => return None,
        }
    };
}

/// Support functions for [`context!`](crate::context!).
#[doc(hidden)]
pub mod __context {
    use crate::value::{Value, ValueMap};

    #[inline(always)]
    pub fn new_assigns() -> ValueMap {
        ValueMap::default()
    }

    #[inline(always)]
    pub fn assign(assigns: &mut ValueMap, name: &'static str, value: Value) {
        assigns.insert(name.into(), value);
    }

    #[inline(always)]
    pub fn finish(assigns: ValueMap) -> Value {
        Value::from_map(assigns)
    }
}

/// Builds the assigns hash for a render.
///
/// ```rust
/// # use miniliquid::context;
/// let assigns = context!{
///     shop => "Cool Shop",
///     cart_count => 3,
/// };
/// ```
///
/// A key may stand alone if a local variable of the same name holds the
/// value:
///
/// ```rust
/// # use miniliquid::context;
/// let customer = "Ann";
/// let assigns = context!{ customer };
/// ```
///
/// Values go through [`Value::from_serialize`](crate::value::Value::from_serialize),
/// so anything serializable works, including nested invocations:
///
/// ```rust
/// # use miniliquid::context;
/// let assigns = context! {
///     products => vec![
///         context!(title => "Hat", price => 20),
///         context!(title => "Cap", price => 5),
///     ]
/// };
/// ```
#[macro_export]
macro_rules! context {
    () => {
        $crate::__context::finish($crate::__context::new_assigns())
    };
    (
        $($name:ident $(=> $value:expr)?),* $(,)?
    ) => {{
        let mut assigns = $crate::__context::new_assigns();
        $(
            $crate::__context_assign!(assigns, $name $(=> $value)?);
        )*
        $crate::__context::finish(assigns)
    }};
}

#[macro_export]
#[doc(hidden)]
macro_rules! __context_assign {
    ($assigns:ident, $name:ident) => {{
        $crate::__context_assign!($assigns, $name => $name);
    }};
    ($assigns:ident, $name:ident => $value:expr) => {
        $crate::__context::assign(
            &mut $assigns,
            stringify!($name),
            $crate::value::Value::from_serialize(&$value),
        );
    };
}
