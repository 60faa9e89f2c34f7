//! <div align=center>
//!   <p><strong>MiniLiquid: a Liquid template engine for Rust with minimal dependencies</strong></p>
//! </div>
//!
//! MiniLiquid is a template engine for Rust which implements the syntax and
//! behavior of the [Liquid](https://shopify.github.io/liquid/) template
//! language.  It's implemented on top of [`serde`] so any serializable value
//! can be passed to a template.  Templates are parsed once into a tree and can
//! then be rendered many times with different data.
//!
//! ```liquid
//! {% for user in users %}
//!   <li>{{ user.name | capitalize }}</li>
//! {% endfor %}
//! ```
//!
//! # Template Usage
//!
//! To use MiniLiquid one needs to create an [`Environment`] and parse a
//! template with it.  To pass data one can pass any serde serializable
//! value.  The [`context!`] macro can be used to quickly construct a
//! template context:
//!
//! ```
//! use miniliquid::{Environment, context};
//!
//! let env = Environment::new();
//! let tmpl = env.parse("Hello {{ name }}!").unwrap();
//! assert_eq!(tmpl.render(context!(name => "John")).unwrap(), "Hello John!");
//! ```
//!
//! # Error Handling
//!
//! Errors while parsing are returned from [`Environment::parse`].  How lenient
//! the parser is can be configured with an [`ErrorMode`]: the lax mode
//! accepts and ignores malformed markup, the warn mode records warnings on
//! the template and the strict modes fail.
//!
//! Errors while rendering are by default written into the output in place
//! of the failing node (`Liquid error (line 1): divided by 0`) and are
//! collected on the template.  Render options can make them abort the
//! render instead.
//!
//! ```
//! use miniliquid::{Environment, RenderOptions};
//!
//! let env = Environment::new();
//! let tmpl = env.parse("{{ 1 | divided_by: 0 }}").unwrap();
//! assert_eq!(tmpl.render(()).unwrap(), "Liquid error (line 1): divided by 0");
//! assert_eq!(tmpl.errors().len(), 1);
//! ```
//!
//! # Custom Filters and Tags
//!
//! Filters are plain functions registered with the environment, see the
//! [`filters`] module.  Tags are registered as constructors which compile
//! the tag markup into a [`Tag`], see [`Environment::register_tag`].
//!
//! ```
//! use miniliquid::{Context, Environment};
//!
//! fn shout(_ctx: &Context, value: String) -> String {
//!     format!("{}!", value.to_uppercase())
//! }
//!
//! let mut env = Environment::new();
//! env.register_filter("shout", shout);
//! let tmpl = env.parse("{{ 'hey' | shout }}").unwrap();
//! assert_eq!(tmpl.render(()).unwrap(), "HEY!");
//! ```
//!
//! # Partials
//!
//! The `include` and `render` tags load other templates through a
//! [`FileSystem`].  The default environment has a [`BlankFileSystem`] which
//! refuses to load anything.
//!
//! ```
//! use miniliquid::{Environment, MemoryFileSystem};
//!
//! let mut fs = MemoryFileSystem::new();
//! fs.add("greeting", "Hi {{ name }}");
//! let mut env = Environment::new();
//! env.set_file_system(fs);
//! let tmpl = env.parse("{% render 'greeting', name: 'Ann' %}").unwrap();
//! assert_eq!(tmpl.render(()).unwrap(), "Hi Ann");
//! ```
//!
//! # Optional Features
//!
//! <details><summary><strong style="cursor: pointer">Configurable Features</strong></summary>
//!
//! - `builtins`: if this feature is removed the standard tags and filters
//!   are not compiled in and [`Environment::new`] behaves like
//!   [`Environment::empty`].
//! - `json`: enables the `json` filter.
//! - `urlencode`: enables the `url_encode` and `url_decode` filters.
//! - `preserve_order`: keeps hashes in insertion order.
//! - `speedups`: enables faster HTML escaping.
//!
//! </details>
#![allow(clippy::cognitive_complexity)]
#![allow(clippy::needless_borrowed_reference)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

#[macro_use]
mod macros;

mod defaults;
mod environment;
mod error;
mod output;
mod template;
mod utils;

pub mod compiler;
pub mod file_system;
pub mod filters;
pub mod i18n;
pub mod value;
pub mod vm;

#[cfg(feature = "builtins")]
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub mod tags;

pub use self::compiler::ast::{Flow, Tag};
pub use self::compiler::parse_context::{ErrorMode, ParseOptions};
pub use self::environment::{Environment, ExceptionRenderer, GlobalFilter, RenderOptions, TagParser};
pub use self::error::{Error, ErrorKind};
pub use self::file_system::{BlankFileSystem, FileSystem, LocalFileSystem, MemoryFileSystem};
pub use self::i18n::I18n;
pub use self::output::Output;
pub use self::template::Template;
pub use self::utils::HtmlEscape;
pub use self::vm::{Context, Interrupt, Limits};

/// Re-export for convenience.
pub use self::value::Value;

#[doc(hidden)]
pub use self::macros::__context;
