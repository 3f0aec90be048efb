//! Core compiler for a declarative, datalog-flavored policy language.
//!
//! This crate owns three collaborating pieces:
//!
//! - the **term/value model** ([`value`]) and its [`ast`] (modules, rules,
//!   bodies) plus a visitor for walking and rewriting both;
//! - a **static bidirectional type checker** ([`typecheck`]) that grows one
//!   [`types::tree::TypeTree`] across a module set, consulted by...
//! - a **trie-based rule indexer** ([`index`]) that narrows which rules can
//!   possibly fire for a given input before evaluation ever runs.
//!
//! [`compiler::Compiler`] ties these together into one pass over a set of
//! already-parsed [`ast::Module`]s, publishing a read-only [`compiler::Program`]
//! that an evaluator (outside this crate) queries at request time.
//!
//! This crate does not parse the language's surface syntax, evaluate rules
//! against input, or resolve imports across modules beyond the narrow,
//! same-module rule-dependency sort the type checker needs — those are the
//! responsibility of a front end, an evaluator, and a module loader
//! respectively.

pub mod annotations;
pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod index;
pub mod location;
pub mod typecheck;
pub mod types;
pub mod value;

pub use compiler::{CancellationToken, Compiler, Program};
pub use config::CompilerOptions;
pub use error::{CompileError, CompilerError, ErrorCode};
pub use types::Type;
pub use value::{Term, Value};
