use std::fmt;
use std::str::FromStr;

use crate::compiler::cache::ExpressionCache;
use crate::compiler::expression::Expr;
use crate::environment::{Environment, TagParser};
use crate::error::{Error, ErrorKind};

/// The maximum nesting depth of blocks and render contexts.
pub const MAX_DEPTH: usize = 100;

/// Controls how strictly markup is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Parse what can be parsed with the forgiving regular expressions.
    #[default]
    Lax,
    /// Parse strictly, but record failures as warnings and fall back to
    /// lax parsing.
    Warn,
    /// Parse strictly and fail on invalid markup.
    Strict,
    /// Like strict, but tag arguments which strict mode still parses
    /// leniently must also be valid expressions.
    Rigid,
}

impl ErrorMode {
    /// Returns `true` for the strict and rigid modes.
    pub fn is_strict(self) -> bool {
        matches!(self, ErrorMode::Strict | ErrorMode::Rigid)
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorMode::Lax => "lax",
            ErrorMode::Warn => "warn",
            ErrorMode::Strict => "strict",
            ErrorMode::Rigid => "rigid",
        })
    }
}

impl FromStr for ErrorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<ErrorMode, Error> {
        match s {
            "lax" => Ok(ErrorMode::Lax),
            "warn" => Ok(ErrorMode::Warn),
            "strict" => Ok(ErrorMode::Strict),
            "rigid" | "strict2" => Ok(ErrorMode::Rigid),
            _ => Err(Error::argument(format!("unknown error mode '{}'", s))),
        }
    }
}

/// Options for a single parse.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Overrides the error mode of the environment.
    pub error_mode: Option<ErrorMode>,
    /// Track line numbers for error messages.  On by default.
    pub line_numbers: bool,
    /// The template name reported in errors.
    pub name: Option<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            error_mode: None,
            line_numbers: true,
            name: None,
        }
    }
}

/// The options partials of a template are parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialOptions {
    pub error_mode: ErrorMode,
    pub line_numbers: bool,
}

/// The state of a single parse.
///
/// It is handed to every tag constructor so tags can compile expressions,
/// parse nested bodies and report errors in the configured mode.
pub struct ParseContext<'env> {
    env: &'env Environment,
    error_mode: ErrorMode,
    line_numbers: bool,
    depth: usize,
    pub(crate) line_number: Option<usize>,
    pub(crate) trim_whitespace: bool,
    warnings: Vec<Error>,
    template_name: Option<String>,
    partial: bool,
}

impl<'env> fmt::Debug for ParseContext<'env> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseContext")
            .field("error_mode", &self.error_mode)
            .field("depth", &self.depth)
            .field("line_number", &self.line_number)
            .field("template_name", &self.template_name)
            .field("partial", &self.partial)
            .finish()
    }
}

impl<'env> ParseContext<'env> {
    /// Creates the context for a top level parse.
    pub fn new(env: &'env Environment, options: &ParseOptions) -> ParseContext<'env> {
        ParseContext {
            env,
            error_mode: options.error_mode.unwrap_or_else(|| env.error_mode()),
            line_numbers: options.line_numbers,
            depth: 0,
            line_number: None,
            trim_whitespace: false,
            warnings: Vec::new(),
            template_name: options.name.clone(),
            partial: false,
        }
    }

    /// Creates the context for parsing a partial.
    pub(crate) fn for_partial(
        env: &'env Environment,
        name: &str,
        options: PartialOptions,
    ) -> ParseContext<'env> {
        let mut rv = ParseContext::new(
            env,
            &ParseOptions {
                error_mode: Some(options.error_mode),
                line_numbers: options.line_numbers,
                name: Some(name.to_string()),
            },
        );
        rv.partial = true;
        rv
    }

    /// The environment tags and filters are registered with.
    pub fn env(&self) -> &'env Environment {
        self.env
    }

    /// The active error mode.
    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    /// Are line numbers tracked?
    pub fn line_numbers(&self) -> bool {
        self.line_numbers
    }

    /// The line the current token starts on.
    pub fn line_number(&self) -> Option<usize> {
        self.line_number
    }

    /// The current block nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The name of the template being parsed.
    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    /// Is a partial being parsed?
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// The options partials loaded by tags of this template use.
    pub fn partial_options(&self) -> PartialOptions {
        PartialOptions {
            error_mode: self.error_mode,
            line_numbers: self.line_numbers,
        }
    }

    /// The expression cache.
    pub fn cache(&self) -> &'env ExpressionCache {
        self.env.expression_cache()
    }

    /// Looks up a tag constructor.
    pub fn lookup_tag(&self, name: &str) -> Option<&'env TagParser> {
        self.env.lookup_tag(name)
    }

    /// Compiles an expression.
    pub fn parse_expression(&self, markup: &str) -> Result<Expr, Error> {
        Expr::parse(markup, self.cache())
    }

    /// Translates a message key with the environment's locale.
    pub fn translate(&self, key: &str, vars: &[(&str, &str)]) -> String {
        self.env.i18n().translate(key, vars)
    }

    /// Creates a syntax error from a message key.
    pub fn syntax_error(&self, key: &str, vars: &[(&str, &str)]) -> Error {
        Error::syntax(self.translate(key, vars))
    }

    /// Records a warning.
    pub fn add_warning(&mut self, err: Error) {
        log::debug!("falling back to lax parsing: {}", err);
        self.warnings.push(err);
    }

    /// The warnings recorded so far.
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.warnings)
    }

    /// Runs `f` one nesting level deeper.
    ///
    /// Fails with a `StackLevel` error if the maximum depth is reached.  The
    /// depth is restored when `f` returns, whether it failed or not.
    pub fn nested<R, F>(&mut self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Self) -> Result<R, Error>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(Error::from(ErrorKind::StackLevel));
        }
        self.depth += 1;
        let rv = f(self);
        self.depth -= 1;
        rv
    }

    /// Parses markup with the parser selected by the error mode.
    ///
    /// In lax mode only `lax` runs.  In warn mode `strict` runs first and on
    /// failure the error is recorded as a warning before `lax` runs.  In the
    /// strict modes the error of `strict` is returned.
    pub fn parse_with_selected_parser<R, S, L>(
        &mut self,
        markup: &str,
        strict: S,
        lax: L,
    ) -> Result<R, Error>
    where
        S: FnOnce(&mut Self, &str) -> Result<R, Error>,
        L: FnOnce(&mut Self, &str) -> Result<R, Error>,
    {
        match self.error_mode {
            ErrorMode::Lax => lax(self, markup),
            ErrorMode::Strict | ErrorMode::Rigid => strict(self, markup)
                .map_err(|err| self.with_markup_context(err, markup)),
            ErrorMode::Warn => match strict(self, markup) {
                Ok(rv) => Ok(rv),
                Err(err) if err.kind() == ErrorKind::Syntax => {
                    let err = self.with_markup_context(err, markup);
                    self.add_warning(err);
                    lax(self, markup)
                }
                Err(err) => Err(err),
            },
        }
    }

    /// Attaches the current line and the markup snippet to a syntax error.
    pub fn with_markup_context(&self, err: Error, markup: &str) -> Error {
        if err.kind() == ErrorKind::Syntax && err.markup_context().is_none() {
            err.with_line(self.line_number).with_markup_context(markup)
        } else {
            err
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mode_from_str() {
        assert_eq!("lax".parse::<ErrorMode>().unwrap(), ErrorMode::Lax);
        assert_eq!("strict2".parse::<ErrorMode>().unwrap(), ErrorMode::Rigid);
        assert!("loose".parse::<ErrorMode>().is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let env = Environment::empty();
        let mut ctx = ParseContext::new(&env, &ParseOptions::default());
        fn descend(ctx: &mut ParseContext<'_>, levels: usize) -> Result<(), Error> {
            if levels == 0 {
                return Ok(());
            }
            ctx.nested(|ctx| descend(ctx, levels - 1))
        }
        assert!(descend(&mut ctx, MAX_DEPTH).is_ok());
        assert_eq!(ctx.depth(), 0);
        let err = descend(&mut ctx, MAX_DEPTH + 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StackLevel);
        assert_eq!(ctx.depth(), 0);
    }
}
