//! Tree-walking evaluation of resolved syntax trees.
//!
//! `Interpreter` owns the program scope: a root block whose locals are the
//! builtins plus whatever globals the driver declares, and the matching
//! program frame at the bottom of the frame stack. A script runner hands a
//! whole statement list to `eval_program`; a REPL feeds declarations,
//! statements and expressions one at a time through the `eval_raw_*` entry
//! points. Either way, nodes are resolved against the program block and then
//! executed.

use std::rc::Rc;

use crate::ast::{Block, DeclareList, Expr, Stmt};
use crate::resolver;

mod error;
mod runtime;
pub mod value;

pub use error::{Error, RuntimeError};

use runtime::Runtime;
use value::Value;

pub struct Interpreter {
    program: Rc<Block>,
    runtime: Runtime,
}

impl Interpreter {
    pub fn new() -> Self {
        let program = Block::new(Vec::new());
        let mut runtime = Runtime::new();
        runtime.install_builtins(&program);
        Self { program, runtime }
    }

    /// Add declarations to the program scope and evaluate their
    /// initialisers. This is how a REPL introduces new globals.
    pub fn eval_raw_decl_list(&mut self, decls: &Rc<DeclareList>) -> Result<(), Error> {
        let stmt = Stmt::DeclareList(Rc::clone(decls));
        self.eval_raw_stmt(&stmt)
    }

    /// Run a whole parsed program: resolve every statement against the
    /// program scope first (so statements may reference globals declared
    /// later, as inside any block), then execute them in order.
    pub fn eval_program(&mut self, stmts: &[Stmt]) -> Result<(), Error> {
        resolver::resolve_stmts_in(&self.program, stmts)?;
        for stmt in stmts {
            self.runtime.exec_top_stmt(stmt)?;
        }
        Ok(())
    }

    /// Resolve one statement in program scope, then execute it.
    pub fn eval_raw_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        resolver::resolve_stmt_in(&self.program, stmt)?;
        self.runtime.exec_top_stmt(stmt)?;
        Ok(())
    }

    /// Resolve one expression in program scope, evaluate it, and hand back
    /// its value.
    pub fn eval_raw_exp(&mut self, exp: &Expr) -> Result<Value, Error> {
        resolver::resolve_exp_in(&self.program, exp)?;
        Ok(self.runtime.eval_top_exp(exp)?)
    }

    /// Human-readable form of a value, chasing heap references.
    pub fn render(&self, value: &Value) -> String {
        self.runtime.render_value(value)
    }

    /// Drain the lines `print` has produced so far.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.runtime.output)
    }

    /// Force a mark-sweep pass; returns the number of objects reclaimed.
    pub fn collect_garbage(&mut self) -> usize {
        self.runtime.collect_garbage()
    }

    /// Number of live heap objects (frames and lists).
    pub fn heap_size(&self) -> usize {
        self.runtime.heap_len()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
