use once_cell::sync::Lazy;
use regex::Regex;

use crate::compiler::ast::{Flow, Tag};
use crate::compiler::expression::Expr;
use crate::compiler::parse_context::{ParseContext, PartialOptions};
use crate::compiler::syntax::{tag_attributes, QUOTED_FRAGMENT, QUOTED_STRING, VARIABLE_SEGMENT};
use crate::compiler::tokenizer::Tokenizer;
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::tags::loops::ForloopDrop;
use crate::value::{Value, ValueRepr};
use crate::vm::Context;

static INCLUDE_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"((?:{qf})+)(\s+(?:with|for)\s+((?:{qf})+))?(\s+(?:as)\s+({vs}+))?",
        qf = QUOTED_FRAGMENT,
        vs = VARIABLE_SEGMENT
    ))
    .unwrap()
});
static RENDER_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"((?:{qs})+)(\s+(with|for)\s+((?:{qf})+))?(\s+(?:as)\s+({vs}+))?",
        qs = QUOTED_STRING,
        qf = QUOTED_FRAGMENT,
        vs = VARIABLE_SEGMENT
    ))
    .unwrap()
});

fn parse_attributes(markup: &str, ctx: &ParseContext<'_>) -> Result<Vec<(String, Expr)>, Error> {
    let mut rv = Vec::new();
    for (key, value) in tag_attributes(markup) {
        rv.push((key.to_string(), ok!(ctx.parse_expression(value))));
    }
    Ok(rv)
}

/// The variable name a partial sees its object under unless aliased.
fn default_variable_name(template_name: &str) -> &str {
    template_name.rsplit('/').next().unwrap_or(template_name)
}

/// The `include` tag.
///
/// The partial renders in the scope of the including template: it sees
/// and can overwrite its variables.  Prefer the `render` tag.
///
/// ```text
/// {% include 'product' with featured as item, size: 'large' %}
/// ```
///
/// With `with` or `for` the expression is passed to the partial under
/// the alias or the last path segment of the template name.  If it is an
/// array the partial renders once per item.
#[derive(Debug)]
pub struct Include {
    name: String,
    line: Option<usize>,
    template_name: Expr,
    variable: Option<Expr>,
    alias: Option<String>,
    attributes: Vec<(String, Expr)>,
    partial_options: PartialOptions,
}

impl Include {
    /// Compiles an `include` tag.
    pub fn parse(
        name: &str,
        markup: &str,
        _tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let caps = match INCLUDE_SYNTAX.captures(markup) {
            Some(caps) => caps,
            None => return Err(ctx.syntax_error("errors.syntax.include", &[])),
        };
        let variable = match caps.get(3) {
            Some(variable) => Some(ok!(ctx.parse_expression(variable.as_str()))),
            None => None,
        };
        Ok(Box::new(Include {
            name: name.to_string(),
            line: ctx.line_number(),
            template_name: ok!(ctx.parse_expression(&caps[1])),
            variable,
            alias: caps.get(5).map(|x| x.as_str().to_string()),
            attributes: ok!(parse_attributes(markup, ctx)),
            partial_options: ctx.partial_options(),
        }))
    }

    fn render_partial(
        &self,
        ctx: &mut Context<'_>,
        out: &mut Output,
        template_name: &str,
        variable: Value,
    ) -> Result<Flow, Error> {
        let partial = ok!(ctx.load_partial(template_name, self.partial_options));
        let variable_name = match self.alias {
            Some(ref alias) => alias.as_str(),
            None => default_variable_name(template_name),
        };
        ctx.stack(|ctx| {
            for (key, expr) in &self.attributes {
                let value = ok!(ctx.evaluate(expr));
                ctx.set(key.as_str(), value);
            }
            if let ValueRepr::Array(ref items) = variable.0 {
                for item in items.iter() {
                    ctx.set(variable_name, item.clone());
                    if ok!(partial.render(ctx, out)) == Flow::Interrupt {
                        return Ok(Flow::Interrupt);
                    }
                }
                Ok(Flow::Normal)
            } else {
                ctx.set(variable_name, variable);
                partial.render(ctx, out)
            }
        })
    }
}

impl Tag for Include {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        let template_name = ok!(ctx.evaluate(&self.template_name));
        let template_name = match template_name.as_str() {
            Some(template_name) => template_name.to_string(),
            None => {
                return Err(Error::argument(
                    ctx.env().i18n().translate("errors.argument.include", &[]),
                ))
            }
        };
        let variable = match self.variable {
            Some(ref expr) => ok!(ctx.evaluate(expr)),
            None => ctx.lookup(&template_name).unwrap_or_default(),
        };

        let old_name = ctx.template_name().map(|x| x.to_string());
        let old_partial = ctx.is_partial();
        ctx.set_template_name(Some(template_name.clone()));
        ctx.set_partial(true);
        let rv = self.render_partial(ctx, out, &template_name, variable);
        ctx.set_template_name(old_name);
        ctx.set_partial(old_partial);
        rv
    }
}

/// The `render` tag.
///
/// The partial renders in an isolated context: it only sees the
/// variables passed to it and the globals, and nothing it assigns leaks
/// back.  `include` is disabled inside.
///
/// ```text
/// {% render 'product', product: featured %}
/// {% render 'product' with featured as item %}
/// {% render 'product' for products %}
/// ```
///
/// With `for` the partial renders once per item and sees a `forloop`
/// object.
#[derive(Debug)]
pub struct Render {
    name: String,
    line: Option<usize>,
    template_name: Expr,
    variable: Option<Expr>,
    is_for_loop: bool,
    alias: Option<String>,
    attributes: Vec<(String, Expr)>,
    partial_options: PartialOptions,
}

impl Render {
    /// Compiles a `render` tag.
    pub fn parse(
        name: &str,
        markup: &str,
        _tokenizer: &mut Tokenizer<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Box<dyn Tag>, Error> {
        let caps = match RENDER_SYNTAX.captures(markup) {
            Some(caps) => caps,
            None => return Err(ctx.syntax_error("errors.syntax.render", &[])),
        };
        let variable = match caps.get(4) {
            Some(variable) => Some(ok!(ctx.parse_expression(variable.as_str()))),
            None => None,
        };
        Ok(Box::new(Render {
            name: name.to_string(),
            line: ctx.line_number(),
            template_name: ok!(ctx.parse_expression(&caps[1])),
            variable,
            is_for_loop: caps.get(3).map(|x| x.as_str()) == Some("for"),
            alias: caps.get(6).map(|x| x.as_str().to_string()),
            attributes: ok!(parse_attributes(markup, ctx)),
            partial_options: ctx.partial_options(),
        }))
    }

    fn render_one(
        &self,
        ctx: &mut Context<'_>,
        out: &mut Output,
        template_name: &str,
        variable: Value,
        forloop: Option<Value>,
    ) -> Result<(), Error> {
        let partial = ok!(ctx.load_partial(template_name, self.partial_options));
        let mut inner = ok!(ctx.new_isolated_subcontext());
        inner.set_template_name(Some(template_name.to_string()));
        inner.set_partial(true);
        if let Some(forloop) = forloop {
            inner.set("forloop", forloop);
        }
        for (key, expr) in &self.attributes {
            inner.set(key.as_str(), ok!(ctx.evaluate(expr)));
        }
        if !variable.is_nil() {
            let variable_name = match self.alias {
                Some(ref alias) => alias.as_str(),
                None => default_variable_name(template_name),
            };
            inner.set(variable_name, variable);
        }
        ok!(partial.render(&mut inner, out));
        Ok(())
    }

    fn render_partials(
        &self,
        ctx: &mut Context<'_>,
        out: &mut Output,
        template_name: &str,
    ) -> Result<(), Error> {
        let variable = match self.variable {
            Some(ref expr) => ok!(ctx.evaluate(expr)),
            None => Value::NIL,
        };
        let iterable = match variable.0 {
            ValueRepr::Array(_) | ValueRepr::Range(..) | ValueRepr::Hash(..) => true,
            ValueRepr::Object(ref obj) => obj.enumerate().is_some(),
            _ => false,
        };
        if self.is_for_loop && iterable {
            let items = variable.to_list();
            let length = items.len();
            for (index, item) in items.into_iter().enumerate() {
                let forloop = Value::from_object(ForloopDrop::new(
                    template_name,
                    length,
                    index,
                    Value::NIL,
                ));
                ok!(self.render_one(ctx, out, template_name, item, Some(forloop)));
            }
            Ok(())
        } else {
            self.render_one(ctx, out, template_name, variable, None)
        }
    }
}

impl Tag for Render {
    fn name(&self) -> &str {
        &self.name
    }

    fn line(&self) -> Option<usize> {
        self.line
    }

    fn render(&self, ctx: &mut Context<'_>, out: &mut Output) -> Result<Flow, Error> {
        let template_name = match self.template_name {
            Expr::Literal(ref value) if value.as_str().is_some() => value.to_string(),
            _ => {
                return Err(Error::new(
                    ErrorKind::Argument,
                    ctx.env().i18n().translate("errors.syntax.render", &[]),
                ))
            }
        };
        ok!(ctx.with_disabled_tags(&["include"], |ctx| {
            self.render_partials(ctx, out, &template_name)
        }));
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use crate::context;
    use crate::environment::Environment;
    use crate::file_system::MemoryFileSystem;
    use crate::value::Value;
    use similar_asserts::assert_eq;

    fn env() -> Environment {
        let mut fs = MemoryFileSystem::new();
        fs.add("product", "[{{ product.title }}{{ extra }}]")
            .add("item", "{{ forloop.index }}:{{ item }} ")
            .add("leak", "{% assign leaked = 'yes' %}{{ secret }}")
            .add("nested", "{% include 'product' %}")
            .add("dir/card", "<{{ card }}>")
            .add("self", "{% include 'self' %}");
        let mut env = Environment::new();
        env.set_file_system(fs);
        env
    }

    fn render(source: &str, ctx: Value) -> String {
        let env = env();
        let tmpl = env.parse(source).unwrap();
        tmpl.render(ctx).unwrap()
    }

    #[test]
    fn test_include_shares_scope() {
        let ctx = context!(product => context!(title => "Hat"));
        assert_eq!(render("{% include 'product' %}", ctx.clone()), "[Hat]");
        assert_eq!(
            render("{% include 'leak' %}{{ leaked }}", context!(secret => "s")),
            "syes"
        );
        assert_eq!(
            render("{% include 'product' with p extra: '!' %}", context!(p => context!(title => "Cap"))),
            "[Cap!]"
        );
    }

    #[test]
    fn test_include_array_and_alias() {
        assert_eq!(
            render(
                "{% include 'dir/card' for cards %}",
                context!(cards => vec!["a", "b"])
            ),
            "<a><b>"
        );
        assert_eq!(
            render("{% include 'dir/card' with 'x' as card %}", context!()),
            "<x>"
        );
    }

    #[test]
    fn test_include_invalid_name() {
        assert_eq!(
            render("{% include nothing %}", context!()),
            "Liquid error (line 1): Argument error in tag 'include' - Illegal template name"
        );
    }

    #[test]
    fn test_render_is_isolated() {
        assert_eq!(
            render("{% render 'leak' %}[{{ leaked }}]", context!(secret => "s")),
            "[]"
        );
        assert_eq!(
            render(
                "{% render 'product', product: p %}",
                context!(p => context!(title => "Cap"))
            ),
            "[Cap]"
        );
    }

    #[test]
    fn test_render_for() {
        assert_eq!(
            render("{% render 'item' for items %}", context!(items => vec![10, 20])),
            "1:10 2:20 "
        );
        assert_eq!(
            render("{% render 'item' with 5 %}", context!()),
            ":5 "
        );
    }

    #[test]
    fn test_include_disabled_inside_render() {
        let out = render("{% render 'nested' %}", context!());
        assert_eq!(
            out,
            "Liquid error (nested line 1): include usage is not allowed in this context"
        );
    }

    #[test]
    fn test_recursive_include() {
        let env = env();
        let tmpl = env.parse("{% include 'self' %}").unwrap();
        let out = tmpl.render(context!()).unwrap();
        assert!(out.contains("Nesting too deep"));
    }

    #[test]
    fn test_render_syntax_error() {
        let err = env().parse("{% render product %}").unwrap_err();
        assert_eq!(
            err.message(),
            "Syntax error in tag 'render' - Template name must be a quoted string"
        );
    }
}
