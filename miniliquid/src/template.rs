use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::compiler::document::Document;
use crate::environment::{Environment, RenderOptions};
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::value::Value;
use crate::vm::Context;

/// Represents a parsed template.
///
/// Templates are created with [`Environment::parse`] and borrow the
/// environment they were parsed with.  The parsed form is immutable, so a
/// template can be rendered any number of times, also from several
/// threads at once.
///
/// ```
/// # use miniliquid::{context, Environment};
/// let env = Environment::new();
/// let tmpl = env.parse("{% for item in items %}[{{ item }}]{% endfor %}").unwrap();
/// assert_eq!(tmpl.render(context!(items => vec![1, 2])).unwrap(), "[1][2]");
/// ```
pub struct Template<'env> {
    env: &'env Environment,
    root: Arc<Document>,
    name: Option<String>,
    warnings: Vec<Error>,
    errors: Mutex<Vec<Error>>,
}

impl<'env> fmt::Debug for Template<'env> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl<'env> Template<'env> {
    pub(crate) fn new(
        env: &'env Environment,
        root: Arc<Document>,
        name: Option<String>,
        warnings: Vec<Error>,
    ) -> Template<'env> {
        Template {
            env,
            root,
            name,
            warnings,
            errors: Mutex::new(Vec::new()),
        }
    }

    /// The name the template was parsed with.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The parsed document.
    pub fn document(&self) -> &Document {
        &self.root
    }

    /// The syntax errors recovered from in warn mode.
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    /// The errors raised by the last render.
    ///
    /// Errors rendered into the output by the exception renderer are
    /// collected here as well.
    pub fn errors(&self) -> Vec<Error> {
        match self.errors.lock() {
            Ok(errors) => errors.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Renders the template into a string.
    ///
    /// The assigns are typically a hash created with the
    /// [`context!`](crate::context) macro, any serializable value that
    /// serializes into a map, or a host object.
    pub fn render<S: Serialize>(&self, assigns: S) -> Result<String, Error> {
        self.render_with_options(assigns, &RenderOptions::default())
    }

    /// Renders the template with options.
    pub fn render_with_options<S: Serialize>(
        &self,
        assigns: S,
        options: &RenderOptions,
    ) -> Result<String, Error> {
        let mut ctx = ok!(Context::new(
            self.env,
            Value::from_serialize(&assigns),
            options
        ));
        let mut out = Output::new();
        ok!(self.render_context(&mut ctx, &mut out));
        Ok(out.into_string())
    }

    /// Renders the template into an [`io::Write`].
    ///
    /// The output is rendered completely before anything is written.
    pub fn render_to_write<S: Serialize, W: io::Write>(
        &self,
        assigns: S,
        mut w: W,
    ) -> Result<(), Error> {
        let rv = ok!(self.render(assigns));
        w.write_all(rv.as_bytes()).map_err(|err| {
            Error::new(ErrorKind::Internal, "could not write rendered output").with_source(err)
        })
    }

    /// Renders the template with an existing context.
    ///
    /// The resource limits of the context are reset first.  When a limit
    /// is exceeded the rendered error message replaces everything written
    /// so far.
    pub fn render_context(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<(), Error> {
        ctx.resource_limits().reset();
        if ctx.template_name().is_none() {
            ctx.set_template_name(self.name.clone());
        }

        let rv = match self.root.render(ctx, out) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::Memory => match ctx.handle_error(err, None) {
                Ok(message) => {
                    out.clear();
                    out.write_str(&message);
                    Ok(())
                }
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        if let Ok(mut errors) = self.errors.lock() {
            *errors = ctx.errors();
        }
        rv
    }
}
