use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::compiler::ast::Tag;
use crate::compiler::cache::ExpressionCache;
use crate::compiler::document::Document;
use crate::compiler::parse_context::{ErrorMode, ParseContext, ParseOptions};
use crate::compiler::tokenizer::Tokenizer;
use crate::defaults;
use crate::error::{Error, ErrorKind};
use crate::file_system::{BlankFileSystem, FileSystem};
use crate::filters::{BoxedFilter, Filter, FilterSet, Strainer};
use crate::i18n::I18n;
use crate::template::Template;
use crate::utils::BTreeMapKeysDebug;
use crate::value::{FunctionArgs, FunctionResult, Value, ValueMap};
use crate::vm::Limits;

/// A registered tag constructor.
///
/// It receives the tag name, the markup after the name, the tokenizer
/// (so block tags can parse their bodies) and the parse context.
pub type TagParser = Arc<
    dyn Fn(&str, &str, &mut Tokenizer<'_>, &mut ParseContext<'_>) -> Result<Box<dyn Tag>, Error>
        + Send
        + Sync,
>;

/// A function applied to the result of every output statement.
pub type GlobalFilter = Arc<dyn Fn(&Value) -> Result<Value, Error> + Send + Sync>;

/// Turns a render error into the text that is written in its place.
///
/// Returning an error aborts the render with that error.
pub type ExceptionRenderer = Arc<dyn Fn(&Error) -> Result<String, Error> + Send + Sync>;

/// An abstraction that holds the engine configuration.
///
/// This object holds the central configuration state for templates: the
/// registered tags and filters, the default error mode, the file system
/// partials are loaded from, the messages used for errors, globals and
/// default resource limits.
///
/// There are generally two ways to construct an environment:
///
/// * [`Environment::new`] creates an environment preconfigured with the
///   standard tags and filters.
/// * [`Environment::empty`] creates a completely blank environment.
///
/// ```
/// # use miniliquid::{context, Environment};
/// let env = Environment::new();
/// let tmpl = env.parse("Hello {{ name | upcase }}!").unwrap();
/// assert_eq!(tmpl.render(context!(name => "World")).unwrap(), "Hello WORLD!");
/// ```
#[derive(Clone)]
pub struct Environment {
    tags: BTreeMap<String, TagParser>,
    strainer: Arc<Strainer>,
    error_mode: ErrorMode,
    file_system: Arc<dyn FileSystem>,
    i18n: Arc<I18n>,
    expression_cache: Arc<ExpressionCache>,
    globals: ValueMap,
    global_filter: Option<GlobalFilter>,
    exception_renderer: Option<ExceptionRenderer>,
    limits: Limits,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("tags", &BTreeMapKeysDebug(&self.tags))
            .field("error_mode", &self.error_mode)
            .field("file_system", &self.file_system)
            .field("globals", &self.globals)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Environment {
    /// Creates a new environment with the standard tags and filters.
    ///
    /// If you do not want any default configuration you can use the
    /// alternative [`empty`](Environment::empty) method.
    pub fn new() -> Environment {
        Environment {
            tags: defaults::get_builtin_tags(),
            strainer: Arc::new(defaults::get_builtin_filters()),
            ..Environment::empty()
        }
    }

    /// Creates a completely empty environment.
    ///
    /// This environment has no tags and no filters.  Only text and
    /// output statements can be parsed until tags are registered.
    pub fn empty() -> Environment {
        Environment {
            tags: BTreeMap::new(),
            strainer: Arc::new(Strainer::new()),
            error_mode: ErrorMode::default(),
            file_system: Arc::new(BlankFileSystem),
            i18n: Arc::new(I18n::new()),
            expression_cache: ExpressionCache::global(),
            globals: ValueMap::default(),
            global_filter: None,
            exception_renderer: None,
            limits: Limits::default(),
        }
    }

    /// Parses a template with the default options.
    pub fn parse(&self, source: &str) -> Result<Template<'_>, Error> {
        self.parse_with_options(source, &ParseOptions::default())
    }

    /// Parses a template.
    ///
    /// In warn mode the recovered errors are available through
    /// [`Template::warnings`].
    pub fn parse_with_options(
        &self,
        source: &str,
        options: &ParseOptions,
    ) -> Result<Template<'_>, Error> {
        let mut ctx = ParseContext::new(self, options);
        let root = ok!(Document::parse(source, &mut ctx));
        let warnings = ctx.take_warnings();
        Ok(Template::new(
            self,
            Arc::new(root),
            options.name.clone(),
            warnings,
        ))
    }

    /// Parses a template from raw bytes.
    ///
    /// Fails with a `TemplateEncoding` error if the bytes are not UTF-8.
    pub fn parse_bytes(
        &self,
        source: &[u8],
        options: &ParseOptions,
    ) -> Result<Template<'_>, Error> {
        match std::str::from_utf8(source) {
            Ok(source) => self.parse_with_options(source, options),
            Err(err) => Err(Error::new(
                ErrorKind::TemplateEncoding,
                "Invalid template encoding",
            )
            .with_source(err)),
        }
    }

    /// Registers a tag constructor.
    ///
    /// A tag registered under an existing name replaces it.  See
    /// [`Tag`](crate::Tag) for an example.
    pub fn register_tag<N, F>(&mut self, name: N, f: F)
    where
        N: Into<String>,
        F: Fn(&str, &str, &mut Tokenizer<'_>, &mut ParseContext<'_>) -> Result<Box<dyn Tag>, Error>
            + Send
            + Sync
            + 'static,
    {
        self.tags.insert(name.into(), Arc::new(f));
    }

    /// Removes a tag.
    pub fn remove_tag(&mut self, name: &str) {
        self.tags.remove(name);
    }

    /// Looks up a tag constructor.
    pub fn lookup_tag(&self, name: &str) -> Option<&TagParser> {
        self.tags.get(name)
    }

    /// Registers a filter.
    ///
    /// For details about filters have a look at [`filters`](crate::filters).
    pub fn register_filter<N, F, Rv, Args>(&mut self, name: N, f: F)
    where
        N: AsRef<str>,
        F: Filter<Rv, Args> + for<'a> Filter<Rv, <Args as FunctionArgs<'a>>::Output>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        Arc::make_mut(&mut self.strainer).add(name.as_ref(), BoxedFilter::new(f));
    }

    /// Registers all filters of a set.  Later registrations win.
    pub fn register_filters(&mut self, set: &FilterSet) {
        Arc::make_mut(&mut self.strainer).add_set(set);
    }

    pub(crate) fn strainer(&self) -> &Arc<Strainer> {
        &self.strainer
    }

    /// Adds a global variable.
    ///
    /// Globals are visible to every template rendered from this
    /// environment, including partials rendered in isolation.
    pub fn add_global<N, V>(&mut self, name: N, value: V)
    where
        N: Into<Arc<str>>,
        V: Into<Value>,
    {
        self.globals.insert(name.into(), value.into());
    }

    /// The global variables.
    pub fn globals(&self) -> &ValueMap {
        &self.globals
    }

    /// Sets the file system partials are loaded from.
    pub fn set_file_system<F: FileSystem + 'static>(&mut self, fs: F) {
        self.file_system = Arc::new(fs);
    }

    /// The file system partials are loaded from.
    pub fn file_system(&self) -> &dyn FileSystem {
        &*self.file_system
    }

    /// Sets the default error mode.
    pub fn set_error_mode(&mut self, mode: ErrorMode) {
        self.error_mode = mode;
    }

    /// The default error mode.
    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    /// Replaces the error messages.
    pub fn set_i18n(&mut self, i18n: I18n) {
        self.i18n = Arc::new(i18n);
    }

    /// The error messages.
    pub fn i18n(&self) -> &I18n {
        &self.i18n
    }

    /// Gives the environment its own expression cache instead of the
    /// process wide one.
    pub fn set_expression_cache(&mut self, cache: Arc<ExpressionCache>) {
        self.expression_cache = cache;
    }

    /// The expression cache.
    pub fn expression_cache(&self) -> &ExpressionCache {
        &self.expression_cache
    }

    /// Sets a function that is applied to every output statement.
    ///
    /// ```
    /// # use miniliquid::{Environment, value::Value};
    /// let mut env = Environment::new();
    /// env.set_global_filter(|value| Ok(Value::from(value.to_string().to_uppercase())));
    /// let tmpl = env.parse("{{ 'hi' }} there").unwrap();
    /// assert_eq!(tmpl.render(()).unwrap(), "HI there");
    /// ```
    pub fn set_global_filter<F>(&mut self, f: F)
    where
        F: Fn(&Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.global_filter = Some(Arc::new(f));
    }

    pub(crate) fn global_filter(&self) -> Option<&GlobalFilter> {
        self.global_filter.as_ref()
    }

    /// Sets the function that renders errors into the output.
    ///
    /// The default renders the error message, for instance
    /// `Liquid error (line 1): divided by 0`.
    pub fn set_exception_renderer<F>(&mut self, f: F)
    where
        F: Fn(&Error) -> Result<String, Error> + Send + Sync + 'static,
    {
        self.exception_renderer = Some(Arc::new(f));
    }

    pub(crate) fn exception_renderer(&self) -> Option<&ExceptionRenderer> {
        self.exception_renderer.as_ref()
    }

    /// Sets the default resource limits for renders.
    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// The default resource limits.
    pub fn limits(&self) -> Limits {
        self.limits
    }
}

/// Options for a single render.
///
/// ```
/// # use miniliquid::{Environment, RenderOptions};
/// let env = Environment::new();
/// let tmpl = env.parse("{{ missing }}").unwrap();
/// let options = RenderOptions {
///     strict_variables: true,
///     ..RenderOptions::default()
/// };
/// assert_eq!(tmpl.render_with_options((), &options).unwrap(), "");
/// assert_eq!(
///     tmpl.errors()[0].to_string(),
///     "Liquid error (line 1): undefined variable missing"
/// );
/// ```
#[derive(Clone, Default)]
pub struct RenderOptions {
    /// Undefined variables raise `UndefinedVariable` errors.
    pub strict_variables: bool,
    /// Undefined filters raise `UndefinedFilter` errors.
    pub strict_filters: bool,
    /// Render errors abort the render instead of being written inline.
    pub rethrow_errors: bool,
    /// Values for tags and filters that are not visible to templates.
    pub registers: ValueMap,
    /// Extra filters for this render.  They take precedence over the
    /// filters of the environment.
    pub filters: Vec<FilterSet>,
    /// Dynamic environments consulted before the globals.
    pub environments: Vec<Value>,
    /// Overrides the global filter of the environment.
    pub global_filter: Option<GlobalFilter>,
    /// Overrides the exception renderer of the environment.
    pub exception_renderer: Option<ExceptionRenderer>,
    /// Overrides the resource limits of the environment.
    pub limits: Option<Limits>,
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("strict_variables", &self.strict_variables)
            .field("strict_filters", &self.strict_filters)
            .field("rethrow_errors", &self.rethrow_errors)
            .field("registers", &self.registers)
            .field("filters", &self.filters)
            .field("environments", &self.environments)
            .field("global_filter", &self.global_filter.is_some())
            .field("exception_renderer", &self.exception_renderer.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}
