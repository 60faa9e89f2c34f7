//! Partial template loading.
//!
//! The `include` and `render` tags load their partials through the
//! [`FileSystem`] configured on the [`Environment`](crate::Environment).
//! By default this is the [`BlankFileSystem`] which refuses to load
//! anything.
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, ErrorKind};

static TEMPLATE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A[^./][a-zA-Z0-9_/]+\z").unwrap());

/// Loads the source of partial templates by name.
pub trait FileSystem: fmt::Debug + Send + Sync {
    /// Returns the source of the named template.
    fn read_template_file(&self, name: &str) -> Result<String, Error>;
}

/// A file system that does not allow any partials.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlankFileSystem;

impl FileSystem for BlankFileSystem {
    fn read_template_file(&self, _name: &str) -> Result<String, Error> {
        Err(Error::new(
            ErrorKind::FileSystem,
            "This liquid context does not allow includes.",
        ))
    }
}

/// Loads partials from a directory.
///
/// A template name `product` maps to `<root>/_product.liquid` and
/// `shop/product` to `<root>/shop/_product.liquid`.  The file name pattern
/// can be changed with [`with_pattern`](Self::with_pattern) where `%s`
/// stands for the last segment of the name.
///
/// Names must be made of ASCII letters, digits, `_` and `/` and may not
/// start with a slash, so nothing outside of the root can be read.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    pattern: String,
}

impl LocalFileSystem {
    /// Creates a file system rooted at `root` with the `_%s.liquid` pattern.
    pub fn new<P: AsRef<Path>>(root: P) -> LocalFileSystem {
        LocalFileSystem {
            root: root.as_ref().to_path_buf(),
            pattern: "_%s.liquid".into(),
        }
    }

    /// Changes the file name pattern.
    pub fn with_pattern<S: Into<String>>(mut self, pattern: S) -> LocalFileSystem {
        self.pattern = pattern.into();
        self
    }

    /// Resolves a template name to a path below the root.
    pub fn full_path(&self, name: &str) -> Result<PathBuf, Error> {
        if !TEMPLATE_NAME_RE.is_match(name) {
            return Err(Error::new(
                ErrorKind::FileSystem,
                format!("Illegal template name '{}'", name),
            ));
        }
        let mut rv = self.root.clone();
        let mut segments = name.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segment.is_empty() {
                continue;
            }
            if segments.peek().is_some() {
                rv.push(segment);
            } else {
                rv.push(self.pattern.replace("%s", segment));
            }
        }
        Ok(rv)
    }
}

impl FileSystem for LocalFileSystem {
    fn read_template_file(&self, name: &str) -> Result<String, Error> {
        let path = ok!(self.full_path(name));
        match fs::read_to_string(&path) {
            Ok(source) => Ok(source),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(Error::new(
                ErrorKind::FileSystem,
                format!("No such template '{}'", name),
            )),
            Err(err) => Err(Error::new(
                ErrorKind::FileSystem,
                format!("could not read template '{}'", name),
            )
            .with_source(err)),
        }
    }
}

/// Serves partials from memory.
///
/// ```
/// # use miniliquid::{Environment, MemoryFileSystem};
/// let mut fs = MemoryFileSystem::new();
/// fs.add("greeting", "Hello {{ name }}!");
/// let mut env = Environment::new();
/// env.set_file_system(fs);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    templates: BTreeMap<String, String>,
}

impl MemoryFileSystem {
    /// Creates an empty file system.
    pub fn new() -> MemoryFileSystem {
        MemoryFileSystem::default()
    }

    /// Adds or replaces a template.
    pub fn add<N: Into<String>, S: Into<String>>(&mut self, name: N, source: S) -> &mut Self {
        self.templates.insert(name.into(), source.into());
        self
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_template_file(&self, name: &str) -> Result<String, Error> {
        self.templates.get(name).cloned().ok_or_else(|| {
            Error::new(
                ErrorKind::FileSystem,
                format!("No such template '{}'", name),
            )
        })
    }
}
