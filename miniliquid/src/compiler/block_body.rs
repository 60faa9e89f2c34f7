use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::ast::{Flow, Node};
use crate::compiler::parse_context::ParseContext;
use crate::compiler::syntax::{is_trim_space, WHITESPACE_OR_NOTHING};
use crate::compiler::tokenizer::Tokenizer;
use crate::compiler::variable::Variable;
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::vm::Context;

static FULL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A\{%-?(\s*)(\w+|#)(\s*)(.*?)-?%\}\z").unwrap());
static LIQUID_TAG_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\s*(\w+|#)\s*(.*?)\z").unwrap());

/// A tag the body parser does not know, handed back to the caller.
///
/// The first item is the tag name, the second the markup.
pub type UnknownTag<'s> = Option<(&'s str, &'s str)>;

/// An ordered list of nodes.
///
/// A body is parsed once and immutable afterwards.  It tracks whether it
/// is blank, that is made only of whitespace text and blank tags.
#[derive(Debug)]
pub struct BlockBody {
    nodes: Vec<Node>,
    blank: bool,
}

impl Default for BlockBody {
    fn default() -> Self {
        BlockBody::new()
    }
}

impl BlockBody {
    /// Creates an empty body.
    pub fn new() -> BlockBody {
        BlockBody {
            nodes: Vec::new(),
            blank: true,
        }
    }

    /// The nodes of the body.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Is the body made only of whitespace and blank tags?
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    /// Drops the whitespace text nodes of a blank body.
    pub fn remove_blank_strings(&mut self) {
        if self.blank {
            self.nodes.retain(|node| !matches!(node, Node::Text(_)));
        }
    }

    /// Parses nodes until the tokens run out or an unknown tag is found.
    ///
    /// Returns `None` when the tokens ran out, otherwise the name and
    /// markup of the tag that is not registered.  The caller decides if
    /// that is its closing tag, an intermediate tag like `else` or an
    /// error.
    pub fn parse<'s>(
        &mut self,
        tokenizer: &mut Tokenizer<'s>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<UnknownTag<'s>, Error> {
        ctx.line_number = tokenizer.line_number();
        if tokenizer.for_liquid_tag() {
            self.parse_for_liquid_tag(tokenizer, ctx)
        } else {
            self.parse_for_document(tokenizer, ctx)
        }
    }

    fn parse_for_document<'s>(
        &mut self,
        tokenizer: &mut Tokenizer<'s>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<UnknownTag<'s>, Error> {
        while let Some(token) = tokenizer.shift() {
            if token.is_empty() {
                continue;
            }

            if token.starts_with("{%") {
                self.handle_whitespace(token, ctx);
                let caps = match FULL_TOKEN.captures(token) {
                    Some(caps) => caps,
                    None => {
                        return Err(ctx.syntax_error(
                            "errors.syntax.tag_termination",
                            &[("token", token), ("tag_end", r"/\%\}/")],
                        ))
                    }
                };
                let (name, markup) = match (caps.get(2), caps.get(4)) {
                    (Some(name), Some(markup)) => (name.as_str(), markup.as_str()),
                    _ => continue,
                };
                if let Some(ref mut line) = ctx.line_number {
                    *line += count_newlines(caps.get(1).map_or("", |x| x.as_str()))
                        + count_newlines(caps.get(3).map_or("", |x| x.as_str()));
                }

                if name == "liquid" {
                    ok!(self.parse_liquid_tag(markup, ctx));
                } else {
                    let parser = match ctx.lookup_tag(name) {
                        Some(parser) => parser,
                        None => return Ok(Some((name, markup))),
                    };
                    let tag = ok!(parser(name, markup, tokenizer, ctx));
                    self.blank = self.blank && tag.is_blank();
                    self.nodes.push(Node::Tag(tag));
                }
            } else if token.starts_with("{{") {
                self.handle_whitespace(token, ctx);
                let var = ok!(create_variable(token, ctx));
                self.nodes.push(Node::Variable(var));
                self.blank = false;
            } else {
                let text = if ctx.trim_whitespace {
                    token.trim_start_matches(is_trim_space)
                } else {
                    token
                };
                ctx.trim_whitespace = false;
                self.blank = self.blank && WHITESPACE_OR_NOTHING.is_match(text);
                self.nodes.push(Node::Text(text.to_string()));
            }

            ctx.line_number = tokenizer.line_number();
        }

        Ok(None)
    }

    fn parse_for_liquid_tag<'s>(
        &mut self,
        tokenizer: &mut Tokenizer<'s>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<UnknownTag<'s>, Error> {
        while let Some(token) = tokenizer.shift() {
            if !token.is_empty() && !WHITESPACE_OR_NOTHING.is_match(token) {
                let (name, markup) = match LIQUID_TAG_TOKEN.captures(token) {
                    Some(caps) => match (caps.get(1), caps.get(2)) {
                        (Some(name), Some(markup)) => (name.as_str(), markup.as_str()),
                        _ => return Ok(Some((token, token))),
                    },
                    // the caller reports the line as unknown tag
                    None => return Ok(Some((token, token))),
                };

                if name == "liquid" {
                    ok!(self.parse_liquid_tag(markup, ctx));
                } else {
                    let parser = match ctx.lookup_tag(name) {
                        Some(parser) => parser,
                        None => return Ok(Some((name, markup))),
                    };
                    let tag = ok!(parser(name, markup, tokenizer, ctx));
                    self.blank = self.blank && tag.is_blank();
                    self.nodes.push(Node::Tag(tag));
                }
            }
            ctx.line_number = tokenizer.line_number();
        }

        Ok(None)
    }

    fn parse_liquid_tag(&mut self, markup: &str, ctx: &mut ParseContext<'_>) -> Result<(), Error> {
        let mut tokenizer = Tokenizer::with_options(markup, ctx.line_number(), true);
        match ok!(self.parse_for_liquid_tag(&mut tokenizer, ctx)) {
            Some((name, _)) => Err(unknown_tag_error(name, "liquid", "%}", ctx)),
            None => Ok(()),
        }
    }

    fn handle_whitespace(&mut self, token: &str, ctx: &mut ParseContext<'_>) {
        let bytes = token.as_bytes();
        if bytes.get(2) == Some(&b'-') {
            if let Some(Node::Text(previous)) = self.nodes.last_mut() {
                let len = previous.trim_end_matches(is_trim_space).len();
                previous.truncate(len);
            }
        }
        ctx.trim_whitespace = bytes.len() >= 3 && bytes[bytes.len() - 3] == b'-';
    }

    /// Renders all nodes in order.
    ///
    /// Errors raised by nodes are handed to the context's error handler
    /// and rendering continues with the next node.  Only resource limit
    /// errors and errors re-raised by the exception renderer abort the
    /// render.  Rendering stops early when a `break` or `continue` is
    /// pending.
    pub fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        ok!(ctx.resource_limits().increment_render_score(self.nodes.len()));

        for node in &self.nodes {
            match node {
                Node::Text(text) => out.write_str(text),
                Node::Variable(var) => {
                    if let Err(err) = var.render(ctx, out) {
                        ok!(rescue_render_error(ctx, out, err, var.line(), false));
                    }
                }
                Node::Tag(tag) => {
                    if ctx.tag_disabled(tag.name()) {
                        let err = Error::new(
                            ErrorKind::Disabled,
                            format!(
                                "{} {}",
                                tag.name(),
                                ctx.env().i18n().translate("errors.disabled.tag", &[])
                            ),
                        );
                        let message = ok!(ctx.handle_error(err, tag.line()));
                        out.write_str(&message);
                    } else {
                        let flow = match tag.render(ctx, out) {
                            Ok(flow) => flow,
                            Err(err) => {
                                ok!(rescue_render_error(
                                    ctx,
                                    out,
                                    err,
                                    tag.line(),
                                    tag.is_blank()
                                ));
                                Flow::Normal
                            }
                        };
                        if flow == Flow::Interrupt || ctx.has_interrupt() {
                            return Ok(Flow::Interrupt);
                        }
                    }
                }
            }
            ok!(ctx.resource_limits().increment_write_score(out.len()));
        }

        Ok(Flow::Normal)
    }
}

fn rescue_render_error(
    ctx: &mut Context<'_>,
    out: &mut Output,
    err: Error,
    line: Option<usize>,
    blank: bool,
) -> Result<(), Error> {
    match err.kind() {
        ErrorKind::Memory => Err(err),
        ErrorKind::UndefinedVariable
        | ErrorKind::UndefinedDropMethod
        | ErrorKind::UndefinedFilter => ctx.handle_error(err, line).map(|_| ()),
        _ => {
            let message = ok!(ctx.handle_error(err, line));
            if !blank {
                out.write_str(&message);
            }
            Ok(())
        }
    }
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

fn create_variable(token: &str, ctx: &mut ParseContext<'_>) -> Result<Variable, Error> {
    if !token.ends_with("}}") {
        return Err(ctx.syntax_error(
            "errors.syntax.variable_termination",
            &[("token", token), ("tag_end", r"/\}\}/")],
        ));
    }
    let bytes = token.as_bytes();
    let start = if bytes.get(2) == Some(&b'-') { 3 } else { 2 };
    let mut end = bytes.len() as isize - 3;
    if end >= 0 && bytes[end as usize] == b'-' {
        end -= 1;
    }
    let markup = if end + 1 - (start as isize) <= 0 {
        ""
    } else {
        &token[start..end as usize + 1]
    };
    Variable::parse(markup, ctx)
}

/// How a nested body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEnd<'s> {
    /// The closing `end<name>` tag was found.
    Closed,
    /// Another unknown tag was found, with its name and markup.
    Tag(&'s str, &'s str),
}

/// Parses the body of a block tag one nesting level deeper.
///
/// A missing closing tag is an error.  Intermediate tags (`else`,
/// `when`, ...) are returned so the block can start its next body and
/// call this again.
pub fn parse_body<'s>(
    block_name: &str,
    body: &mut BlockBody,
    tokenizer: &mut Tokenizer<'s>,
    ctx: &mut ParseContext<'_>,
) -> Result<BodyEnd<'s>, Error> {
    match ok!(ctx.nested(|ctx| body.parse(tokenizer, ctx))) {
        None => Err(ctx.syntax_error(
            "errors.syntax.tag_never_closed",
            &[("block_name", block_name)],
        )),
        Some((name, _)) if name.strip_prefix("end") == Some(block_name) => Ok(BodyEnd::Closed),
        Some((name, markup)) => Ok(BodyEnd::Tag(name, markup)),
    }
}

/// Parses the single body of a block tag that allows no intermediate tags.
pub fn parse_block<'s>(
    block_name: &str,
    tokenizer: &mut Tokenizer<'s>,
    ctx: &mut ParseContext<'_>,
) -> Result<BlockBody, Error> {
    let mut body = BlockBody::new();
    match ok!(parse_body(block_name, &mut body, tokenizer, ctx)) {
        BodyEnd::Closed => Ok(body),
        BodyEnd::Tag(name, _) => Err(block_unknown_tag_error(name, block_name, ctx)),
    }
}

/// The error for an unexpected tag inside a block.
pub fn block_unknown_tag_error(tag: &str, block_name: &str, ctx: &ParseContext<'_>) -> Error {
    unknown_tag_error(tag, block_name, &format!("end{}", block_name), ctx)
}

/// The error for an unexpected tag inside a block with the given delimiter.
pub fn unknown_tag_error(
    tag: &str,
    block_name: &str,
    block_delimiter: &str,
    ctx: &ParseContext<'_>,
) -> Error {
    if tag == "else" {
        ctx.syntax_error("errors.syntax.unexpected_else", &[("block_name", block_name)])
    } else if tag.starts_with("end") {
        ctx.syntax_error(
            "errors.syntax.invalid_delimiter",
            &[
                ("tag", tag),
                ("block_name", block_name),
                ("block_delimiter", block_delimiter),
            ],
        )
    } else {
        ctx.syntax_error("errors.syntax.unknown_tag", &[("tag", tag)])
    }
}
