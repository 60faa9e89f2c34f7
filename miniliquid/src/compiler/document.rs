use crate::compiler::ast::Flow;
use crate::compiler::block_body::BlockBody;
use crate::compiler::parse_context::ParseContext;
use crate::compiler::tokenizer::Tokenizer;
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::vm::Context;

/// The root of a parsed template.
#[derive(Debug)]
pub struct Document {
    body: BlockBody,
}

impl Document {
    /// Parses template source.
    ///
    /// Syntax errors are annotated with the line they were raised on and
    /// the template name of the parse context.
    pub fn parse(source: &str, ctx: &mut ParseContext<'_>) -> Result<Document, Error> {
        let mut tokenizer = Tokenizer::new(source, ctx.line_numbers());
        Document::parse_tokens(&mut tokenizer, ctx).map_err(|err| {
            if err.kind() == ErrorKind::Syntax {
                err.with_line(ctx.line_number())
                    .with_name(ctx.template_name())
            } else {
                err.with_name(ctx.template_name())
            }
        })
    }

    fn parse_tokens(tokenizer: &mut Tokenizer<'_>, ctx: &mut ParseContext<'_>) -> Result<Document, Error> {
        let mut body = BlockBody::new();
        match ok!(body.parse(tokenizer, ctx)) {
            None => Ok(Document { body }),
            Some((tag @ ("else" | "end"), _)) => Err(ctx.syntax_error(
                "errors.syntax.unexpected_outer_tag",
                &[("tag", tag)],
            )),
            Some((tag, _)) => Err(ctx.syntax_error("errors.syntax.unknown_tag", &[("tag", tag)])),
        }
    }

    /// The top level body.
    pub fn body(&self) -> &BlockBody {
        &self.body
    }

    /// Renders the document into the output.
    pub fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        self.body.render(ctx, out)
    }
}
