use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use similar_asserts::assert_eq;

use miniliquid::value::{Object, Value};
use miniliquid::{context, Context, Environment, ErrorKind, RenderOptions};

#[derive(Debug)]
struct Product {
    title: &'static str,
    price: i64,
}

impl Object for Product {
    fn get_value(&self, key: &str) -> Option<Value> {
        match key {
            "title" => Some(Value::from(self.title)),
            "price" => Some(Value::from(self.price)),
            _ => None,
        }
    }

    fn type_name(&self) -> &str {
        "ProductDrop"
    }
}

#[derive(Debug)]
struct Catalog {
    products: Vec<Arc<Product>>,
    lookups: AtomicUsize,
}

impl Object for Catalog {
    fn get_value(&self, key: &str) -> Option<Value> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        match key {
            "name" => Some(Value::from("Catalog")),
            "cheapest" => self
                .products
                .iter()
                .min_by_key(|x| x.price)
                .map(|x| Value::from_object(x.clone())),
            _ => None,
        }
    }

    fn enumerate(&self) -> Option<Vec<Value>> {
        Some(
            self.products
                .iter()
                .map(|x| Value::from_object(x.clone()))
                .collect(),
        )
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<catalog of {}>", self.products.len())
    }
}

#[derive(Debug)]
struct Storefront;

impl Object for Storefront {
    fn get_value(&self, key: &str) -> Option<Value> {
        match key {
            "name" => Some(Value::from("Cool Shop")),
            _ => None,
        }
    }

    fn get_value_in(&self, key: &str, ctx: &Context<'_>) -> Option<Value> {
        match key {
            "greeting" => ctx
                .lookup("customer")
                .map(|customer| Value::from(format!("Welcome {}", customer))),
            "echo" => ctx.lookup("echo"),
            _ => self.get_value(key),
        }
    }
}

fn catalog() -> Value {
    Value::from_object(Catalog {
        products: vec![
            Arc::new(Product {
                title: "Hat",
                price: 20,
            }),
            Arc::new(Product {
                title: "Cap",
                price: 5,
            }),
        ],
        lookups: AtomicUsize::new(0),
    })
}

fn render(source: &str, ctx: Value) -> String {
    let env = Environment::new();
    env.parse(source).unwrap().render(ctx).unwrap()
}

#[test]
fn test_drop_properties() {
    let ctx = context!(catalog => catalog());
    assert_eq!(render("{{ catalog.name }}", ctx.clone()), "Catalog");
    assert_eq!(render("{{ catalog.cheapest.title }}", ctx.clone()), "Cap");
    assert_eq!(render("{{ catalog['name'] }}", ctx.clone()), "Catalog");
    assert_eq!(render("[{{ catalog.unknown }}]", ctx.clone()), "[]");
    assert_eq!(render("{{ catalog }}", ctx), "<catalog of 2>");
}

#[test]
fn test_drop_default_rendering() {
    let product = Value::from_object(Product {
        title: "Hat",
        price: 1,
    });
    assert_eq!(render("{{ p }}", context!(p => product)), "ProductDrop");
}

#[test]
fn test_enumerable_drop() {
    let ctx = context!(catalog => catalog());
    assert_eq!(
        render(
            "{% for p in catalog %}{{ forloop.index }}.{{ p.title }} {% endfor %}",
            ctx.clone()
        ),
        "1.Hat 2.Cap "
    );
    assert_eq!(render("{{ catalog.size }}", ctx.clone()), "2");
    assert_eq!(
        render("{{ catalog | map: 'title' | join: ', ' }}", ctx.clone()),
        "Hat, Cap"
    );
    assert_eq!(
        render(
            "{% assign p = catalog | sort: 'price' | first %}{{ p.title }}",
            ctx
        ),
        "Cap"
    );
}

#[test]
fn test_drop_as_context() {
    let env = Environment::new();
    let tmpl = env
        .parse("{{ name }}: {{ cheapest.title }}{% assign name = 'x' %} {{ name }}")
        .unwrap();
    assert_eq!(tmpl.render(catalog()).unwrap(), "Catalog: Cap x");
}

#[test]
fn test_strict_drop_method() {
    let env = Environment::new();
    let tmpl = env.parse("{{ catalog.unknown }}").unwrap();
    let options = RenderOptions {
        strict_variables: true,
        ..RenderOptions::default()
    };
    tmpl.render_with_options(context!(catalog => catalog()), &options)
        .unwrap();
    let errors = tmpl.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::UndefinedDropMethod);
}

#[test]
fn test_drop_resolves_through_context() {
    let mut env = Environment::new();
    env.add_global("customer", "Ann");
    let tmpl = env.parse("{{ name }}: {{ greeting }}|[{{ echo }}]").unwrap();
    assert_eq!(
        tmpl.render(Value::from_object(Storefront)).unwrap(),
        "Cool Shop: Welcome Ann|[]"
    );

    let env = Environment::new();
    let tmpl = env.parse("{{ store.greeting }}|{{ store.name }}").unwrap();
    let ctx = context!(store => Value::from_object(Storefront), customer => "Bo");
    assert_eq!(tmpl.render(ctx).unwrap(), "Welcome Bo|Cool Shop");
}
