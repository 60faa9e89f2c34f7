use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::compiler::document::Document;
use crate::compiler::expression::Expr;
use crate::compiler::parse_context::{ParseContext, PartialOptions, MAX_DEPTH};
use crate::environment::{Environment, ExceptionRenderer, GlobalFilter, RenderOptions};
use crate::error::{Error, ErrorKind};
use crate::filters::Strainer;
use crate::utils::OnDrop;
use crate::value::{Object, Value, ValueMap, ValueRepr};
use crate::vm::limits::ResourceLimits;

/// A pending loop control request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// Leave the innermost loop.
    Break,
    /// Skip to the next iteration of the innermost loop.
    Continue,
}

/// State shared by a context and all of its isolated sub contexts.
#[derive(Debug)]
struct Shared {
    limits: ResourceLimits,
    errors: RefCell<Vec<Error>>,
    partials: RefCell<BTreeMap<String, Arc<Document>>>,
}

/// The render time state of a template.
///
/// A context is created for every render.  It resolves variables, holds
/// the scope stack written by `assign` and the loop tags, dispatches
/// filters and collects the errors raised while rendering.  Tags receive
/// it mutably, filters by shared reference.
///
/// Variable names are resolved in this order:
///
/// 1. the scopes pushed by tags, innermost first,
/// 2. the `increment` / `decrement` counters and the dynamic environments
///    passed with [`RenderOptions::environments`],
/// 3. the globals of the environment,
/// 4. the outermost scope which holds the render assigns and everything
///    assigned by the template,
/// 5. the host object passed as assigns, if any.
pub struct Context<'env> {
    env: &'env Environment,
    shared: Rc<Shared>,
    strainer: Arc<Strainer>,
    scopes: Vec<ValueMap>,
    environments: Vec<Value>,
    counters: ValueMap,
    registers: ValueMap,
    root_object: Option<Arc<dyn Object>>,
    interrupts: Vec<Interrupt>,
    for_offsets: BTreeMap<String, i64>,
    cycles: BTreeMap<String, usize>,
    for_stack: Vec<Value>,
    disabled_tags: Vec<String>,
    base_depth: usize,
    template_name: Option<String>,
    partial: bool,
    strict_variables: bool,
    strict_filters: bool,
    rethrow_errors: bool,
    global_filter: Option<GlobalFilter>,
    exception_renderer: Option<ExceptionRenderer>,
    resolving: RefCell<Vec<String>>,
}

impl<'env> fmt::Debug for Context<'env> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("scopes", &self.scopes)
            .field("environments", &self.environments)
            .field("counters", &self.counters)
            .field("registers", &self.registers)
            .field("interrupts", &self.interrupts)
            .field("template_name", &self.template_name)
            .field("partial", &self.partial)
            .finish_non_exhaustive()
    }
}

impl<'env> Context<'env> {
    /// Creates the context for rendering with some assigns.
    ///
    /// The assigns must be a hash, a host object or nil.  A hash becomes
    /// the outermost scope, a host object is consulted for all names that
    /// resolve nowhere else.
    pub fn new(
        env: &'env Environment,
        assigns: Value,
        options: &RenderOptions,
    ) -> Result<Context<'env>, Error> {
        let (outer, root_object) = match assigns.0 {
            ValueRepr::Hash(ref map, _) => ((**map).clone(), None),
            ValueRepr::Object(ref obj) => (ValueMap::default(), Some(obj.clone())),
            ValueRepr::Nil => (ValueMap::default(), None),
            _ => {
                return Err(Error::argument(format!(
                    "Expected Hash or Drop as assigns, got {}",
                    assigns.type_name()
                )))
            }
        };

        let strainer = if options.filters.is_empty() {
            env.strainer().clone()
        } else {
            let mut strainer = (**env.strainer()).clone();
            for set in &options.filters {
                strainer.add_set(set);
            }
            Arc::new(strainer)
        };

        Ok(Context {
            env,
            shared: Rc::new(Shared {
                limits: ResourceLimits::new(options.limits.unwrap_or_else(|| env.limits())),
                errors: RefCell::new(Vec::new()),
                partials: RefCell::new(BTreeMap::new()),
            }),
            strainer,
            scopes: vec![outer],
            environments: options.environments.clone(),
            counters: ValueMap::default(),
            registers: options.registers.clone(),
            root_object,
            interrupts: Vec::new(),
            for_offsets: BTreeMap::new(),
            cycles: BTreeMap::new(),
            for_stack: Vec::new(),
            disabled_tags: Vec::new(),
            base_depth: 0,
            template_name: None,
            partial: false,
            strict_variables: options.strict_variables,
            strict_filters: options.strict_filters,
            rethrow_errors: options.rethrow_errors,
            global_filter: options
                .global_filter
                .clone()
                .or_else(|| env.global_filter().cloned()),
            exception_renderer: options
                .exception_renderer
                .clone()
                .or_else(|| env.exception_renderer().cloned()),
            resolving: RefCell::new(Vec::new()),
        })
    }

    /// Creates a context for rendering a partial in isolation.
    ///
    /// The sub context shares the environment, the filters, the resource
    /// limits and the error list, and starts with copies of the registers
    /// and the disabled tags.  Variables of this context are not visible
    /// in it and nothing it assigns is visible here.
    pub fn new_isolated_subcontext(&self) -> Result<Context<'env>, Error> {
        ok!(self.check_overflow(0));
        Ok(Context {
            env: self.env,
            shared: self.shared.clone(),
            strainer: self.strainer.clone(),
            scopes: vec![ValueMap::default()],
            environments: Vec::new(),
            counters: ValueMap::default(),
            registers: self.registers.clone(),
            root_object: None,
            interrupts: Vec::new(),
            for_offsets: BTreeMap::new(),
            cycles: BTreeMap::new(),
            for_stack: Vec::new(),
            disabled_tags: self.disabled_tags.clone(),
            base_depth: self.base_depth + 1,
            template_name: self.template_name.clone(),
            partial: self.partial,
            strict_variables: self.strict_variables,
            strict_filters: self.strict_filters,
            rethrow_errors: self.rethrow_errors,
            global_filter: self.global_filter.clone(),
            exception_renderer: self.exception_renderer.clone(),
            resolving: RefCell::new(Vec::new()),
        })
    }

    /// The environment the template belongs to.
    pub fn env(&self) -> &'env Environment {
        self.env
    }

    /// Are undefined variables errors?
    pub fn strict_variables(&self) -> bool {
        self.strict_variables
    }

    /// Are undefined filters errors?
    pub fn strict_filters(&self) -> bool {
        self.strict_filters
    }

    /// The name of the template being rendered.
    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    /// Sets the name of the template being rendered.
    pub fn set_template_name(&mut self, name: Option<String>) {
        self.template_name = name;
    }

    /// Is a partial being rendered?
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Marks the context as rendering a partial.
    pub fn set_partial(&mut self, partial: bool) {
        self.partial = partial;
    }

    /// The resource accounting of the render.
    pub fn resource_limits(&self) -> &ResourceLimits {
        &self.shared.limits
    }

    /// The errors raised so far, including those of sub contexts.
    pub fn errors(&self) -> Vec<Error> {
        self.shared.errors.borrow().clone()
    }

    /// Evaluates an expression.
    pub fn evaluate(&self, expr: &Expr) -> Result<Value, Error> {
        expr.evaluate(self)
    }

    /// Resolves a top level variable name.
    ///
    /// Unknown names are nil, or an `UndefinedVariable` error with strict
    /// variables.
    pub fn find_variable(&self, key: &str) -> Result<Value, Error> {
        match self.lookup(key) {
            Some(value) => Ok(value),
            None if self.strict_variables => Err(Error::new(
                ErrorKind::UndefinedVariable,
                format!("undefined variable {}", key),
            )),
            None => Ok(Value::NIL),
        }
    }

    /// Resolves a top level variable name, `None` if it is not defined.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        for scope in self.scopes[1..].iter().rev() {
            if let Some(value) = scope.get(key) {
                return Some(value.clone());
            }
        }
        if let Some(value) = self.counters.get(key) {
            return Some(value.clone());
        }
        for env in &self.environments {
            if let Some(value) = env.get_key(key) {
                return Some(value);
            }
        }
        if let Some(value) = self.env.globals().get(key) {
            return Some(value.clone());
        }
        if let Some(value) = self.scopes[0].get(key) {
            return Some(value.clone());
        }
        self.lookup_root_object(key)
    }

    fn lookup_root_object(&self, key: &str) -> Option<Value> {
        let obj = some!(self.root_object.as_ref());
        if self.resolving.borrow().iter().any(|x| x == key) {
            return None;
        }
        self.resolving.borrow_mut().push(key.to_string());
        let _guard = OnDrop::new(|| {
            self.resolving.borrow_mut().pop();
        });
        obj.get_value_in(key, self)
    }

    fn check_overflow(&self, extra: usize) -> Result<(), Error> {
        if self.base_depth + self.scopes.len() + extra > MAX_DEPTH {
            Err(Error::from(ErrorKind::StackLevel))
        } else {
            Ok(())
        }
    }

    /// Pushes a new innermost scope.
    pub fn push_scope(&mut self) -> Result<(), Error> {
        ok!(self.check_overflow(1));
        self.scopes.push(ValueMap::default());
        Ok(())
    }

    /// Pops the innermost scope.  The outermost scope cannot be popped.
    pub fn pop_scope(&mut self) -> Result<ValueMap, Error> {
        if self.scopes.len() <= 1 {
            return Err(Error::new(
                ErrorKind::Context,
                "pop_scope called on the outermost scope",
            ));
        }
        Ok(self.scopes.pop().unwrap_or_default())
    }

    /// Runs `f` in a fresh innermost scope that is popped afterwards.
    pub fn stack<R, F>(&mut self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Self) -> Result<R, Error>,
    {
        ok!(self.push_scope());
        let rv = f(self);
        ok!(self.pop_scope());
        rv
    }

    /// Sets a variable in the innermost scope.
    pub fn set<K: Into<Arc<str>>>(&mut self, key: K, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.into(), value);
        }
    }

    /// Sets a variable in the outermost scope, where it stays visible for
    /// the rest of the render.
    pub fn set_outer<K: Into<Arc<str>>>(&mut self, key: K, value: Value) {
        self.scopes[0].insert(key.into(), value);
    }

    /// The value of an `increment` / `decrement` counter.
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).and_then(|x| x.as_i64())
    }

    /// Sets an `increment` / `decrement` counter.
    pub fn set_counter(&mut self, name: &str, value: i64) {
        self.counters.insert(name.into(), Value::from(value));
    }

    /// Reads a register.
    pub fn register(&self, key: &str) -> Option<&Value> {
        self.registers.get(key)
    }

    /// Writes a register.
    pub fn set_register<K: Into<Arc<str>>>(&mut self, key: K, value: Value) {
        self.registers.insert(key.into(), value);
    }

    /// Requests a `break` or `continue`.
    pub fn push_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupts.push(interrupt);
    }

    /// Takes the most recent interrupt.
    pub fn pop_interrupt(&mut self) -> Option<Interrupt> {
        self.interrupts.pop()
    }

    /// Is an interrupt pending?
    pub fn has_interrupt(&self) -> bool {
        !self.interrupts.is_empty()
    }

    /// Where the next `offset: continue` loop over `name` starts.
    pub fn for_offset(&self, name: &str) -> i64 {
        self.for_offsets.get(name).copied().unwrap_or(0)
    }

    /// Records where a loop over `name` stopped.
    pub fn set_for_offset(&mut self, name: &str, offset: i64) {
        self.for_offsets.insert(name.to_string(), offset);
    }

    /// Returns the position of a cycle group and advances it.
    pub fn next_cycle(&mut self, key: &str, len: usize) -> usize {
        let pos = self.cycles.entry(key.to_string()).or_insert(0);
        let rv = *pos;
        *pos = if len == 0 { 0 } else { (rv + 1) % len };
        rv
    }

    /// The `forloop` object of the innermost running loop.
    pub fn current_forloop(&self) -> Option<&Value> {
        self.for_stack.last()
    }

    pub(crate) fn push_forloop(&mut self, forloop: Value) {
        self.for_stack.push(forloop);
    }

    pub(crate) fn replace_forloop(&mut self, forloop: Value) {
        if let Some(last) = self.for_stack.last_mut() {
            *last = forloop;
        }
    }

    pub(crate) fn pop_forloop(&mut self) {
        self.for_stack.pop();
    }

    /// Runs `f` while writes count against the assign score.
    pub fn with_capture<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let shared = self.shared.clone();
        shared.limits.with_capture(|| f(self))
    }

    /// Runs `f` with some tags disabled.
    pub fn with_disabled_tags<R, F>(&mut self, tags: &[&str], f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let old_len = self.disabled_tags.len();
        self.disabled_tags
            .extend(tags.iter().map(|x| x.to_string()));
        let rv = f(self);
        self.disabled_tags.truncate(old_len);
        rv
    }

    /// Is the tag disabled in this context?
    pub fn tag_disabled(&self, name: &str) -> bool {
        self.disabled_tags.iter().any(|x| x == name)
    }

    /// Invokes a filter by name.
    pub fn invoke_filter(&self, name: &str, input: Value, args: &[Value]) -> Result<Value, Error> {
        self.strainer.invoke(self, name, input, args)
    }

    /// Applies the global filter to the result of a variable.
    pub fn apply_global_filter(&self, value: Value) -> Result<Value, Error> {
        match self.global_filter {
            Some(ref filter) => filter(&value),
            None => Ok(value),
        }
    }

    /// Records a render error and returns the text that replaces the
    /// failed node.
    ///
    /// The error is annotated with the template name and the line, pushed
    /// to the error list and handed to the exception renderer.  With
    /// `rethrow_errors` it is returned as error instead.
    pub fn handle_error(&self, err: Error, line: Option<usize>) -> Result<String, Error> {
        let err = err.with_name(self.template_name()).with_line(line);
        log::warn!("error while rendering: {}", err);
        self.shared.errors.borrow_mut().push(err.clone());
        if self.rethrow_errors {
            return Err(err);
        }
        match self.exception_renderer {
            Some(ref renderer) => renderer(&err),
            None => Ok(err.to_string()),
        }
    }

    /// Loads and parses a partial through the environment's file system.
    ///
    /// Parsed partials are cached for the rest of the render, keyed by
    /// name and parse options.
    pub fn load_partial(&self, name: &str, options: PartialOptions) -> Result<Arc<Document>, Error> {
        let key = format!("{}:{}:{}", name, options.error_mode, options.line_numbers);
        if let Some(doc) = self.shared.partials.borrow().get(&key) {
            return Ok(doc.clone());
        }
        let source = ok!(self.env.file_system().read_template_file(name));
        let mut parse_ctx = ParseContext::for_partial(self.env, name, options);
        let doc = Arc::new(ok!(Document::parse(&source, &mut parse_ctx)));
        self.shared
            .partials
            .borrow_mut()
            .insert(key, doc.clone());
        Ok(doc)
    }
}
