#![allow(missing_docs)]
//! This module contains the internals of the compiler.
//!
//! Custom tags are built from the pieces exposed here: the [`Tokenizer`]
//! and [`ParseContext`] handed to tag constructors, [`BlockBody`] for
//! nested bodies and [`Variable`], [`Condition`] and [`Expr`] for the
//! markup a tag takes.
//!
//! [`Tokenizer`]: tokenizer::Tokenizer
//! [`ParseContext`]: parse_context::ParseContext
//! [`BlockBody`]: block_body::BlockBody
//! [`Variable`]: variable::Variable
//! [`Condition`]: condition::Condition
//! [`Expr`]: expression::Expr
pub mod ast;
pub mod block_body;
pub mod cache;
pub mod condition;
pub mod document;
pub mod expression;
pub(crate) mod lexer;
pub mod parse_context;
pub mod parser;
pub(crate) mod scanner;
pub mod syntax;
pub mod tokenizer;
pub mod tokens;
pub mod variable;
