use std::sync::Arc;
use std::thread;

use similar_asserts::assert_eq;

use miniliquid::value::Value;
use miniliquid::{
    context, Context, Environment, Error, ErrorKind, ErrorMode, Limits, Output, ParseOptions,
    RenderOptions,
};

fn render(source: &str, ctx: Value) -> String {
    let env = Environment::new();
    env.parse(source).unwrap().render(ctx).unwrap()
}

#[test]
fn test_json_context() {
    let env = Environment::new();
    let tmpl = env
        .parse("{% for p in products %}{{ p.title }}={{ p.tags | join: '+' }}{% unless forloop.last %}, {% endunless %}{% endfor %}|{{ shop.open }}|[{{ shop.closed_on }}]")
        .unwrap();
    let ctx = serde_json::json!({
        "products": [
            {"title": "Hat", "tags": ["wool", "red"]},
            {"title": "Cap", "tags": []},
        ],
        "shop": {"open": true, "closed_on": null},
    });
    assert_eq!(tmpl.render(&ctx).unwrap(), "Hat=wool+red, Cap=|true|[]");
}

#[test]
fn test_hello_world() {
    assert_eq!(
        render("Hello {{ name }}", context!(name => "world")),
        "Hello world"
    );
}

#[test]
fn test_size_command() {
    assert_eq!(render("{{ items.size }}", context!(items => vec![1, 2, 3])), "3");
    assert_eq!(
        render("{{ items.first }}-{{ items.last }}", context!(items => vec![1, 2, 3])),
        "1-3"
    );
}

#[test]
fn test_hash_key_beats_command() {
    let ctx = context!(obj => context!(size => "big"));
    assert_eq!(render("{{ obj.size }}", ctx), "big");
}

#[test]
fn test_lookups() {
    let ctx = context!(
        user => context!(name => "Ann", tags => vec!["a", "b"]),
        key => "name",
    );
    assert_eq!(render("{{ user.name }}", ctx.clone()), "Ann");
    assert_eq!(render("{{ user['name'] }}", ctx.clone()), "Ann");
    assert_eq!(render("{{ user[key] }}", ctx.clone()), "Ann");
    assert_eq!(render("{{ user.tags[1] }}", ctx.clone()), "b");
    assert_eq!(render("{{ user.tags[-1] }}", ctx.clone()), "b");
    assert_eq!(render("[{{ user.missing.deeper }}]", ctx), "[]");
}

#[test]
fn test_unknown_tag() {
    let env = Environment::new();
    let err = env.parse("{% unknown_tag %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.to_string().contains("unknown_tag"));
    insta::assert_snapshot!(err, @"Liquid syntax error (line 1): Unknown tag 'unknown_tag'");
}

#[test]
fn test_whitespace_control() {
    assert_eq!(
        render("a {%- if true -%} b {%- endif -%} c", context!()),
        "abc"
    );
    assert_eq!(render("a  {{- 'b' -}}  c", context!()), "abc");
    assert_eq!(render("a\n  {%- assign x = 1 %}\nb", context!()), "a\nb");
}

#[test]
fn test_liquid_tag() {
    let tmpl = "{% liquid
        assign items = 'c,a,b' | split: ','
        for item in items
          if item == 'a'
            continue
          endif
          echo item
        endfor
    %}";
    assert_eq!(render(tmpl, context!()), "cb");
}

#[test]
fn test_nesting_depth() {
    fn nested(levels: usize) -> String {
        let mut source = String::new();
        for _ in 0..levels {
            source.push_str("{% if true %}");
        }
        source.push('x');
        for _ in 0..levels {
            source.push_str("{% endif %}");
        }
        source
    }

    let env = Environment::new();
    assert_eq!(env.parse(&nested(99)).unwrap().render(()).unwrap(), "x");
    let err = env.parse(&nested(101)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StackLevel);
    assert_eq!(err.message(), "Nesting too deep");
}

#[test]
fn test_blank_and_empty() {
    let ctx = context!(s => "", items => Vec::<i64>::new(), ws => "  ");
    assert_eq!(render("{% if s == blank %}y{% endif %}", ctx.clone()), "y");
    assert_eq!(render("{% if items == empty %}y{% endif %}", ctx.clone()), "y");
    assert_eq!(render("{% if ws == blank %}y{% endif %}", ctx.clone()), "y");
    assert_eq!(render("{% if ws == empty %}y{% else %}n{% endif %}", ctx), "n");
}

#[test]
fn test_conditions_chain() {
    let ctx = context!(a => true, b => false, s => "", name => "liquid");
    assert_eq!(render("{% if a and b %}y{% else %}n{% endif %}", ctx.clone()), "n");
    assert_eq!(render("{% if b or a %}y{% endif %}", ctx.clone()), "y");
    assert_eq!(render("{% if s or b %}y{% else %}n{% endif %}", ctx.clone()), "n");
    assert_eq!(render("{% if name contains 'qui' %}y{% endif %}", ctx.clone()), "y");
    assert_eq!(render("{% if 1 <> 2 and 2 >= 2 %}y{% endif %}", ctx), "y");
}

#[test]
fn test_filter_chain() {
    assert_eq!(
        render(
            "{{ title | downcase | replace: ' ', '-' | append: '.html' }}",
            context!(title => "My Page")
        ),
        "my-page.html"
    );
}

#[test]
fn test_undefined_filter() {
    let env = Environment::new();
    let tmpl = env.parse("{{ 'x' | nonexistent }}").unwrap();
    assert_eq!(tmpl.render(()).unwrap(), "x");

    let options = RenderOptions {
        strict_filters: true,
        ..RenderOptions::default()
    };
    assert_eq!(tmpl.render_with_options((), &options).unwrap(), "");
    let errors = tmpl.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::UndefinedFilter);
    insta::assert_snapshot!(errors[0], @"Liquid error (line 1): undefined filter nonexistent");
}

#[test]
fn test_strict_variables() {
    let env = Environment::new();
    let tmpl = env.parse("{{ user.name }}|{{ missing }}").unwrap();
    let options = RenderOptions {
        strict_variables: true,
        ..RenderOptions::default()
    };
    let rv = tmpl
        .render_with_options(context!(user => context!(name => "Ann")), &options)
        .unwrap();
    assert_eq!(rv, "Ann|");
    let errors = tmpl.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::UndefinedVariable);
}

#[test]
fn test_rethrow_errors() {
    let env = Environment::new();
    let tmpl = env.parse("a{{ 1 | divided_by: 0 }}b").unwrap();
    assert_eq!(
        tmpl.render(()).unwrap(),
        "aLiquid error (line 1): divided by 0b"
    );
    let options = RenderOptions {
        rethrow_errors: true,
        ..RenderOptions::default()
    };
    let err = tmpl.render_with_options((), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(err.line(), Some(1));
}

#[test]
fn test_exception_renderer() {
    let mut env = Environment::new();
    env.set_exception_renderer(|err| Ok(format!("<{}>", err.message())));
    let tmpl = env.parse("{{ 1 | modulo: 0 }}").unwrap();
    assert_eq!(tmpl.render(()).unwrap(), "<divided by 0>");
}

#[test]
fn test_error_line_numbers() {
    let env = Environment::new();
    let tmpl = env.parse("a\nb\n{{ 1 | divided_by: 0 }}").unwrap();
    assert_eq!(
        tmpl.render(()).unwrap(),
        "a\nb\nLiquid error (line 3): divided by 0"
    );

    let options = ParseOptions {
        line_numbers: false,
        ..ParseOptions::default()
    };
    let tmpl = env
        .parse_with_options("a\n{{ 1 | divided_by: 0 }}", &options)
        .unwrap();
    assert_eq!(tmpl.render(()).unwrap(), "a\nLiquid error: divided by 0");
}

#[test]
fn test_syntax_error_names_template() {
    let env = Environment::new();
    let options = ParseOptions {
        name: Some("layout".into()),
        ..ParseOptions::default()
    };
    let err = env
        .parse_with_options("a\n\n{% if x %}", &options)
        .unwrap_err();
    insta::assert_snapshot!(err, @"Liquid syntax error (layout line 3): 'if' tag was never closed");
}

#[test]
fn test_error_modes() {
    let source = "{{ a | | b }}";

    let mut env = Environment::new();
    assert!(env.parse(source).is_ok());

    env.set_error_mode(ErrorMode::Warn);
    let tmpl = env.parse(source).unwrap();
    assert_eq!(tmpl.warnings().len(), 1);

    env.set_error_mode(ErrorMode::Strict);
    let err = env.parse(source).unwrap_err();
    insta::assert_snapshot!(err, @r###"Liquid syntax error (line 1): Expected id but found pipe in "a | | b""###);
}

#[test]
fn test_error_mode_per_parse() {
    let env = Environment::new();
    let options = ParseOptions {
        error_mode: Some("strict2".parse().unwrap()),
        ..ParseOptions::default()
    };
    assert!(env.parse_with_options("{{ a | | b }}", &options).is_err());
}

#[test]
fn test_render_score_limit() {
    let env = Environment::new();
    let tmpl = env.parse("{{ a }}{{ a }}{{ a }}").unwrap();
    let limited = |limit| RenderOptions {
        limits: Some(Limits {
            render_score_limit: Some(limit),
            ..Limits::default()
        }),
        ..RenderOptions::default()
    };
    assert_eq!(
        tmpl.render_with_options(context!(a => 1), &limited(3)).unwrap(),
        "111"
    );
    assert_eq!(
        tmpl.render_with_options(context!(a => 1), &limited(2)).unwrap(),
        "Liquid error: Memory limits exceeded"
    );
    assert_eq!(tmpl.errors()[0].kind(), ErrorKind::Memory);
}

#[test]
fn test_render_length_limit() {
    let mut env = Environment::new();
    env.set_limits(Limits {
        render_length_limit: Some(5),
        ..Limits::default()
    });
    let tmpl = env.parse("{% for i in (1..10) %}{{ i }}{% endfor %}").unwrap();
    assert_eq!(tmpl.render(()).unwrap(), "Liquid error: Memory limits exceeded");
}

#[test]
fn test_assign_score_limit() {
    let mut env = Environment::new();
    env.set_limits(Limits {
        assign_score_limit: Some(3),
        ..Limits::default()
    });
    let tmpl = env.parse("{% assign a = 'abc' %}{{ a }}").unwrap();
    assert_eq!(tmpl.render(()).unwrap(), "abc");
    let tmpl = env.parse("{% capture a %}abcdef{% endcapture %}{{ a }}").unwrap();
    assert_eq!(tmpl.render(()).unwrap(), "Liquid error: Memory limits exceeded");
}

#[test]
fn test_lookup_precedence() {
    let mut env = Environment::new();
    env.add_global("shop", "Cool Shop");
    env.add_global("a", "global");
    let tmpl = env.parse("{{ shop }}|{{ a }}|{{ b }}").unwrap();
    assert_eq!(tmpl.render(()).unwrap(), "Cool Shop|global|");
    // the assigns form the outermost scope which comes after the globals
    assert_eq!(
        tmpl.render(context!(a => "local", b => "local")).unwrap(),
        "Cool Shop|global|local"
    );

    let options = RenderOptions {
        environments: vec![context!(a => "dynamic")],
        ..RenderOptions::default()
    };
    assert_eq!(
        tmpl.render_with_options((), &options).unwrap(),
        "Cool Shop|dynamic|"
    );
    let tmpl = env
        .parse("{% for a in (1..2) %}{{ a }}{% endfor %}|{{ a }}")
        .unwrap();
    assert_eq!(tmpl.render(()).unwrap(), "12|global");
}

#[test]
fn test_global_filter() {
    fn bracket(value: &Value) -> Result<Value, Error> {
        Ok(Value::from(format!("[{}]", value)))
    }

    let env = Environment::new();
    let tmpl = env.parse("{{ a }}-{{ b }}").unwrap();
    let options = RenderOptions {
        global_filter: Some(Arc::new(bracket)),
        ..RenderOptions::default()
    };
    assert_eq!(
        tmpl.render_with_options(context!(a => 1, b => "x"), &options)
            .unwrap(),
        "[1]-[x]"
    );
}

#[test]
fn test_render_to_write() {
    let env = Environment::new();
    let tmpl = env.parse("{{ a }} and {{ b }}").unwrap();
    let mut buf = Vec::new();
    tmpl.render_to_write(context!(a => 1, b => 2), &mut buf).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), "1 and 2");
}

#[test]
fn test_concurrent_renders() {
    let env = Environment::new();
    let tmpl = env
        .parse("{% for i in (1..n) %}{{ i }}{% endfor %}")
        .unwrap();
    thread::scope(|scope| {
        let handles: Vec<_> = (1..5)
            .map(|n| {
                let tmpl = &tmpl;
                scope.spawn(move || tmpl.render(context!(n => n)).unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|x| x.join().unwrap()).collect();
        assert_eq!(results.join(","), "1,12,123,1234");
    });
}

#[test]
fn test_serde_assigns() {
    #[derive(serde::Serialize)]
    struct Product {
        title: String,
        tags: Vec<&'static str>,
        price: f64,
    }

    let product = Product {
        title: "Shoe".into(),
        tags: vec!["a", "b"],
        price: 9.5,
    };
    assert_eq!(
        render(
            "{{ product.title }}: {{ product.tags | join: '/' }} {{ product.price | times: 2 }}",
            context!(product)
        ),
        "Shoe: a/b 19.0"
    );
}

#[test]
fn test_raw_tag_and_comments() {
    assert_eq!(
        render("{% raw %}{{ a }}{% endraw %}{% comment %}{{ a }}{% endcomment %}{% # note %}", context!(a => 1)),
        "{{ a }}"
    );
}

#[test]
fn test_render_with_shared_context() {
    let env = Environment::new();
    let setup = env.parse("{% assign greeting = 'Hi' %}").unwrap();
    let page = env.parse("{{ greeting }} {{ name }}").unwrap();

    let options = RenderOptions::default();
    let mut ctx = Context::new(&env, context!(name => "Ann"), &options).unwrap();
    let mut out = Output::new();
    setup.render_context(&mut ctx, &mut out).unwrap();
    page.render_context(&mut ctx, &mut out).unwrap();
    assert_eq!(out.into_string(), "Hi Ann");
}
