//! `treewalk` library crate.
//!
//! A tree-walking interpreter for a small dynamically-typed scripting
//! language. High-level layout:
//! - `ast`: the tree shape shared by the resolver and the evaluator
//! - `resolver`: static name resolution (a slot index for every reference)
//! - `heap`: tracing allocator that owns frames and lists
//! - `interpreter`: the recursive evaluator and its value model
//! - `builtins`: host functions installed as program-scope locals
//!
//! Parsing and the command-line driver are external: the entry points on
//! [`Interpreter`] consume already-built AST nodes.
pub mod ast;
pub mod builtins;
pub mod heap;
pub mod interpreter;
pub mod resolver;

pub use interpreter::value::Value;
pub use interpreter::{Error, Interpreter, RuntimeError};
pub use resolver::ResolveError;
