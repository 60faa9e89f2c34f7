use std::fmt;

use crate::compiler::variable::Variable;
use crate::error::Error;
use crate::output::Output;
use crate::vm::Context;

/// A node of a parsed template body.
#[derive(Debug)]
pub enum Node {
    /// Literal text that is written out as is.
    Text(String),
    /// An output statement (`{{ ... }}`).
    Variable(Variable),
    /// A tag (`{% ... %}`), possibly owning nested bodies.
    Tag(Box<dyn Tag>),
}

/// Tells the enclosing body whether to keep rendering.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next node.
    Normal,
    /// A `break` or `continue` is pending and the body must stop.
    Interrupt,
}

/// A compiled tag.
///
/// Tags are created by the constructors registered with
/// [`Environment::register_tag`](crate::Environment::register_tag).  Block
/// tags parse their own bodies from the tokenizer handed to the
/// constructor and own them afterwards.
///
/// ```
/// # use miniliquid::{Context, Environment, Error, Flow, Output, Tag};
/// #[derive(Debug)]
/// struct Hello {
///     line: Option<usize>,
/// }
///
/// impl Tag for Hello {
///     fn name(&self) -> &str {
///         "hello"
///     }
///
///     fn line(&self) -> Option<usize> {
///         self.line
///     }
///
///     fn render(&self, _ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
///         out.write_str("Hello!");
///         Ok(Flow::Normal)
///     }
/// }
///
/// let mut env = Environment::new();
/// env.register_tag("hello", |_name, _markup, _tokenizer, parse_ctx| {
///     Ok(Box::new(Hello { line: parse_ctx.line_number() }))
/// });
/// let tmpl = env.parse("{% hello %}").unwrap();
/// assert_eq!(tmpl.render(()).unwrap(), "Hello!");
/// ```
pub trait Tag: fmt::Debug + Send + Sync {
    /// The name the tag was invoked with.
    fn name(&self) -> &str;

    /// The line the tag starts on if line numbers are tracked.
    fn line(&self) -> Option<usize>;

    /// Does the tag never produce output?
    ///
    /// Bodies made only of blank tags and whitespace drop that whitespace,
    /// and errors raised by blank tags are not written into the output.
    fn is_blank(&self) -> bool {
        false
    }

    /// Renders the tag.
    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error>;
}
