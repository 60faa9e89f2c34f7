//! The standard tags.
//!
//! All tags are built on the public [`Tag`](crate::Tag) protocol and are
//! registered with [`Environment::new`](crate::Environment::new) when the
//! `builtins` feature is enabled:
//!
//! * [`Assign`] (`assign`), [`Capture`] (`capture`), [`Echo`] (`echo`),
//!   [`Counter`] (`increment`, `decrement`)
//! * [`If`] (`if`, `unless`), [`Case`] (`case`)
//! * [`For`] (`for`), [`LoopControl`] (`break`, `continue`), [`Cycle`]
//!   (`cycle`)
//! * [`Comment`] (`comment`), [`Raw`] (`raw`), [`InlineComment`] (`#`)
//! * [`Include`] (`include`), [`Render`] (`render`)
//!
//! The `liquid` tag is not a tag of its own.  The body parser handles it
//! by parsing its lines as tags.
use crate::compiler::expression::Expr;
use crate::compiler::parse_context::{ErrorMode, ParseContext};
use crate::compiler::parser::Parser;
use crate::compiler::tokens::TokenKind;
use crate::error::Error;

pub use self::conditionals::{Case, If};
pub use self::loops::{Cycle, For, ForloopDrop, LoopControl};
pub use self::partials::{Include, Render};
pub use self::text::{Comment, InlineComment, Raw};
pub use self::variables::{Assign, Capture, Counter, Echo};

mod conditionals;
mod loops;
mod partials;
mod text;
mod variables;

/// Compiles an expression found by one of the lax tag regexes.
///
/// In rigid mode the markup must also be a valid expression in the strict
/// grammar.
pub(crate) fn parse_tag_expression(markup: &str, ctx: &ParseContext<'_>) -> Result<Expr, Error> {
    if ctx.error_mode() != ErrorMode::Rigid {
        return ctx.parse_expression(markup);
    }
    let canonical = ok!(strict_expression(markup)
        .map_err(|err| ctx.with_markup_context(err, markup)));
    ctx.parse_expression(&canonical)
}

fn strict_expression(markup: &str) -> Result<String, Error> {
    let mut p = ok!(Parser::new(markup));
    let rv = ok!(p.expression());
    ok!(p.consume(TokenKind::EndOfString));
    Ok(rv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parse_context::ParseOptions;
    use crate::environment::Environment;

    #[test]
    fn test_rigid_tag_expressions() {
        let env = Environment::new();
        let lax = ParseContext::new(&env, &ParseOptions::default());
        assert!(parse_tag_expression("a b", &lax).is_ok());

        let rigid = ParseContext::new(
            &env,
            &ParseOptions {
                error_mode: Some(ErrorMode::Rigid),
                ..ParseOptions::default()
            },
        );
        assert!(parse_tag_expression("a.b[0]", &rigid).is_ok());
        let err = parse_tag_expression("a b", &rigid).unwrap_err();
        assert_eq!(err.markup_context(), Some("in \"a b\""));
    }
}
