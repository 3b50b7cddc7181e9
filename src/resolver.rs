//! Static name resolution.
//!
//! One pass over an AST subtree turns every variable reference into either a
//! local slot index or an entry of the enclosing block's capture table, so
//! the evaluator never looks names up at runtime. The pass is stateful only
//! in a "current block" pointer that is saved and restored around each block
//! entry.
//!
//! Per block the pass runs two sweeps: the first hoists every declare-list
//! statement into the block's local table (so later references anywhere in
//! the block see all of its locals), the second walks statements and
//! expressions to stamp bindings.

use std::rc::Rc;

use thiserror::Error;

use crate::ast::{
    Binding, Block, BlockAttr, Condition, DeclareList, ElseBranch, Expr, FuncDef, NonLocalInfo,
    Stmt, VarExpr, VarInfo,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Duplicated local name '{name}'")]
    DuplicatedLocalName { name: String },
    #[error("No such name '{name}'")]
    NoSuchName { name: String },
}

/// Resolve a whole program: `block` becomes the root scope (no parent).
pub fn resolve_program(block: &Rc<Block>) -> Result<(), ResolveError> {
    Resolver { current: None }.walk_block(block)
}

/// Resolve one statement against an already-resolved scope.
///
/// A raw declare-list is hoisted into `block` first, exactly as the first
/// sweep would have done; this is how a REPL introduces new globals.
pub fn resolve_stmt_in(block: &Rc<Block>, stmt: &Stmt) -> Result<(), ResolveError> {
    if let Stmt::DeclareList(decls) = stmt {
        add_declarations(&mut block.attr.borrow_mut(), decls)?;
    }
    Resolver {
        current: Some(Rc::clone(block)),
    }
    .walk_stmt(stmt)
}

/// Resolve a batch of statements against `block` under the two-sweep rule of
/// a block body: hoist every top-level declare-list first, then walk. This is
/// the script-runner path, where a later global is visible to earlier
/// statements.
pub fn resolve_stmts_in(block: &Rc<Block>, stmts: &[Stmt]) -> Result<(), ResolveError> {
    {
        let mut attr = block.attr.borrow_mut();
        for stmt in stmts {
            if let Stmt::DeclareList(decls) = stmt {
                add_declarations(&mut attr, decls)?;
            }
        }
    }
    let mut resolver = Resolver {
        current: Some(Rc::clone(block)),
    };
    for stmt in stmts {
        resolver.walk_stmt(stmt)?;
    }
    Ok(())
}

/// Resolve one expression against an already-resolved scope.
pub fn resolve_exp_in(block: &Rc<Block>, exp: &Expr) -> Result<(), ResolveError> {
    Resolver {
        current: Some(Rc::clone(block)),
    }
    .walk_expr(exp)
}

/// Append one local to a block's table, rejecting duplicates.
///
/// Also the hook the interpreter uses to declare builtin names into the
/// program block before any user code resolves.
pub(crate) fn declare_local(attr: &mut BlockAttr, name: &str) -> Result<usize, ResolveError> {
    if attr.name_to_local_index.contains_key(name) {
        return Err(ResolveError::DuplicatedLocalName {
            name: name.to_string(),
        });
    }
    let index = attr.local_info.len();
    attr.name_to_local_index.insert(name.to_string(), index);
    attr.local_info.push(VarInfo {
        name: name.to_string(),
    });
    Ok(index)
}

fn add_declarations(attr: &mut BlockAttr, decls: &DeclareList) -> Result<(), ResolveError> {
    decls.attr.set(Some(attr.local_info.len()));
    for decl in &decls.decls {
        declare_local(attr, &decl.name)?;
    }
    Ok(())
}

/// Reuse or allocate a capture slot on `attr` for `name`, resolving the
/// target local through the ancestor chain.
fn add_nonlocal(attr: &mut BlockAttr, name: &str) -> Result<usize, ResolveError> {
    if let Some(&index) = attr.name_to_nonlocal_index.get(name) {
        return Ok(index);
    }
    let info = resolve_from_ancestors(attr.parent.clone(), name)?;
    let index = attr.nonlocal_indexes.len();
    attr.name_to_nonlocal_index.insert(name.to_string(), index);
    attr.nonlocal_indexes.push(info);
    Ok(index)
}

fn resolve_from_ancestors(
    start: Option<std::rc::Weak<Block>>,
    name: &str,
) -> Result<NonLocalInfo, ResolveError> {
    let mut cursor = start.and_then(|weak| weak.upgrade());
    while let Some(block) = cursor {
        let attr = block.attr.borrow();
        if let Some(&index) = attr.name_to_local_index.get(name) {
            drop(attr);
            return Ok(NonLocalInfo {
                target: Rc::downgrade(&block),
                index,
            });
        }
        let parent = attr.parent.clone();
        drop(attr);
        cursor = parent.and_then(|weak| weak.upgrade());
    }
    Err(ResolveError::NoSuchName {
        name: name.to_string(),
    })
}

struct Resolver {
    current: Option<Rc<Block>>,
}

impl Resolver {
    fn walk_block(&mut self, block: &Rc<Block>) -> Result<(), ResolveError> {
        let saved = self.current.replace(Rc::clone(block));
        block.attr.borrow_mut().parent = saved.as_ref().map(Rc::downgrade);
        let result = self.walk_block_stmts(block);
        self.current = saved;
        result
    }

    fn walk_block_stmts(&mut self, block: &Rc<Block>) -> Result<(), ResolveError> {
        {
            let mut attr = block.attr.borrow_mut();
            for stmt in &block.stmts {
                if let Stmt::DeclareList(decls) = stmt {
                    add_declarations(&mut attr, decls)?;
                }
            }
        }
        for stmt in &block.stmts {
            self.walk_stmt(stmt)?;
        }
        Ok(())
    }

    fn walk_stmt(&mut self, stmt: &Stmt) -> Result<(), ResolveError> {
        match stmt {
            Stmt::Block(block) => self.walk_block(block),
            Stmt::DeclareList(decls) => {
                for decl in &decls.decls {
                    if let Some(init) = &decl.init {
                        self.walk_expr(init)?;
                    }
                }
                Ok(())
            }
            Stmt::Condition(cond) => self.walk_condition(cond),
            Stmt::While(wh) => {
                self.walk_expr(&wh.test)?;
                self.walk_block(&wh.body)
            }
            Stmt::Return(value) => match value {
                Some(exp) => self.walk_expr(exp),
                None => Ok(()),
            },
            Stmt::Expr(exp) => self.walk_expr(exp),
            Stmt::Break | Stmt::Continue | Stmt::Empty => Ok(()),
        }
    }

    fn walk_condition(&mut self, cond: &Condition) -> Result<(), ResolveError> {
        self.walk_expr(&cond.test)?;
        self.walk_block(&cond.then_block)?;
        match &cond.orelse {
            Some(ElseBranch::Block(block)) => self.walk_block(block),
            Some(ElseBranch::ElseIf(next)) => self.walk_condition(next),
            None => Ok(()),
        }
    }

    fn walk_expr(&mut self, exp: &Expr) -> Result<(), ResolveError> {
        match exp {
            Expr::Op(op) => {
                for arg in &op.args {
                    self.walk_expr(arg)?;
                }
                Ok(())
            }
            Expr::Var(var) => self.bind_var(var),
            Expr::Func(def) => self.walk_func(def),
            Expr::List(items) => {
                for item in items {
                    self.walk_expr(item)?;
                }
                Ok(())
            }
            Expr::Null | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => Ok(()),
        }
    }

    fn bind_var(&mut self, var: &VarExpr) -> Result<(), ResolveError> {
        let block = self
            .current
            .as_ref()
            .expect("variable reference outside any block");
        let local = block.attr.borrow().name_to_local_index.get(&var.name).copied();
        match local {
            Some(index) => var.binding.set(Some(Binding::Local(index))),
            None => {
                let slot = add_nonlocal(&mut block.attr.borrow_mut(), &var.name)?;
                var.binding.set(Some(Binding::NonLocal(slot)));
            }
        }
        Ok(())
    }

    /// Parameters become the leading locals of the function body block; the
    /// body itself is a fresh scope whose parent is the block being resolved.
    fn walk_func(&mut self, def: &Rc<FuncDef>) -> Result<(), ResolveError> {
        if let Some(params) = &def.params {
            let saved = self.current.replace(Rc::clone(&def.body));
            def.body.attr.borrow_mut().parent = saved.as_ref().map(Rc::downgrade);
            let result = self.declare_params(params);
            self.current = saved;
            result?;
        }
        self.walk_block(&def.body)
    }

    fn declare_params(&mut self, params: &Rc<DeclareList>) -> Result<(), ResolveError> {
        let body = Rc::clone(self.current.as_ref().expect("entered function body"));
        add_declarations(&mut body.attr.borrow_mut(), params)?;
        for decl in &params.decls {
            if let Some(init) = &decl.init {
                self.walk_expr(init)?;
            }
        }
        Ok(())
    }
}
