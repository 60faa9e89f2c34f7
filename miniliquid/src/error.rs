use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Represents template errors.
///
/// Errors carry a kind, an optional message, and as much location
/// information as was available when they were raised: the template
/// name, the line number and a snippet of the offending markup.  The
/// [`Display`](std::fmt::Display) implementation renders them in the
/// format template authors are used to:
///
/// ```text
/// Liquid syntax error (line 3): Unknown tag 'foo'
/// Liquid error (layout line 2): comparison of Integer with String failed
/// ```
///
/// # Example
///
/// ```rust
/// # let env = miniliquid::Environment::new();
/// match env.parse("{% bogus %}") {
///     Ok(_) => unreachable!(),
///     Err(err) => {
///         eprintln!("Could not parse template:");
///         eprintln!("  {}", err);
///     }
/// }
/// ```
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    name: Option<String>,
    lineno: Option<usize>,
    markup_context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("detail", &self.detail)
            .field("name", &self.name)
            .field("lineno", &self.lineno)
            .field("markup_context", &self.markup_context)
            .field("source", &self.source)
            .finish()
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for Error {}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The template source could not be parsed.
    Syntax,
    /// A filter or operator received arguments it cannot work with.
    Argument,
    /// The render context was used incorrectly.
    Context,
    /// Templates or scopes were nested too deeply.
    StackLevel,
    /// A resource limit was exceeded.
    Memory,
    /// A variable was not defined (strict variables only).
    UndefinedVariable,
    /// A filter was not defined (strict filters only).
    UndefinedFilter,
    /// A host object does not provide a property (strict variables only).
    UndefinedDropMethod,
    /// The template source was not valid text.
    TemplateEncoding,
    /// A partial could not be loaded.
    FileSystem,
    /// A tag was used where it is disabled.
    Disabled,
    /// An internal engine failure.
    Internal,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Argument => "invalid argument",
            ErrorKind::Context => "context error",
            ErrorKind::StackLevel => "Nesting too deep",
            ErrorKind::Memory => "Memory limits exceeded",
            ErrorKind::UndefinedVariable => "undefined variable",
            ErrorKind::UndefinedFilter => "undefined filter",
            ErrorKind::UndefinedDropMethod => "undefined drop method",
            ErrorKind::TemplateEncoding => "invalid template encoding",
            ErrorKind::FileSystem => "file system error",
            ErrorKind::Disabled => "tag usage is not allowed in this context",
            ErrorKind::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ErrorKind::Syntax {
            write!(f, "Liquid syntax error")?;
        } else {
            write!(f, "Liquid error")?;
        }
        if let Some(lineno) = self.lineno {
            match self.name {
                Some(ref name) => write!(f, " ({} line {})", name, lineno)?,
                None => write!(f, " (line {})", lineno)?,
            }
        }
        write!(f, ": {}", self.message())?;
        if let Some(ref context) = self.markup_context {
            write!(f, " {}", context)?;
        }
        if f.alternate() {
            let mut source = std::error::Error::source(self);
            while let Some(err) = source {
                write!(f, "\n  caused by: {}", err)?;
                source = err.source();
            }
        }
        Ok(())
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            kind,
            detail: Some(detail.into()),
            name: None,
            lineno: None,
            markup_context: None,
            source: None,
        }
    }

    /// Shortcut for a syntax error.
    pub(crate) fn syntax<D: Into<Cow<'static, str>>>(detail: D) -> Error {
        Error::new(ErrorKind::Syntax, detail)
    }

    /// Shortcut for an argument error.
    pub(crate) fn argument<D: Into<Cow<'static, str>>>(detail: D) -> Error {
        Error::new(ErrorKind::Argument, detail)
    }

    /// Attaches another error as source to this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Sets the line number unless one was already recorded.
    pub(crate) fn with_line(mut self, lineno: Option<usize>) -> Self {
        if self.lineno.is_none() {
            self.lineno = lineno;
        }
        self
    }

    /// Sets the template name unless one was already recorded.
    pub(crate) fn with_name(mut self, name: Option<&str>) -> Self {
        if self.name.is_none() {
            self.name = name.map(|x| x.to_string());
        }
        self
    }

    /// Attaches the markup snippet (`in "..."`) to the error.
    pub(crate) fn with_markup_context(mut self, markup: &str) -> Self {
        self.markup_context = Some(format!("in \"{}\"", markup.trim()));
        self
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message without any location prefix.
    pub fn message(&self) -> &str {
        match self.detail {
            Some(ref detail) => detail,
            None => self.kind.description(),
        }
    }

    /// Returns the template name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the line.
    pub fn line(&self) -> Option<usize> {
        self.lineno
    }

    /// Returns the markup snippet the error was raised for.
    pub fn markup_context(&self) -> Option<&str> {
        self.markup_context.as_deref()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            detail: None,
            name: None,
            lineno: None,
            markup_context: None,
            source: None,
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::new(ErrorKind::Internal, "formatting failed")
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::new(ErrorKind::Internal, msg.to_string())
    }
}
