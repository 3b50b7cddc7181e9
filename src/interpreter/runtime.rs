//! The recursive AST evaluator.
//!
//! Two explicit stacks drive execution: the frame stack is the dynamic call
//! chain, the value stack is the result register of expression evaluation.
//! Every expression pushes exactly one value on success; statements push
//! none. Both stacks double as garbage-collection roots, which is why
//! intermediate results ride the value stack instead of Rust locals whenever
//! a collection point (a statement boundary) can be reached before they are
//! stored somewhere reachable.

use std::rc::Rc;

use crate::ast::{
    Binding, Block, Condition, DeclareList, ElseBranch, Expr, OpCode, OpExpr, Stmt, VarExpr, While,
};
use crate::builtins::{Builtin, Builtins};
use crate::heap::{Heap, ObjId};
use crate::resolver;

use super::error::RuntimeError;
use super::value::{self, Closure, Frame, HeapObj, NumPair, Value};

/// Control-flow marker threaded out of statement execution. `Break` and
/// `Continue` are caught by the nearest enclosing loop, `Return` by the
/// nearest call boundary; anything that reaches an entry point is an error.
#[derive(Debug)]
pub(super) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub(super) struct Runtime {
    heap: Heap<HeapObj>,
    /// Dynamic chain of activation records; the program frame is the bottom
    /// entry for the lifetime of the interpreter.
    frames: Vec<ObjId>,
    /// Result register of the last expression; also a GC root.
    values: Vec<Value>,
    builtins: Builtins,
    /// Lines captured from `print`, drained by the driver.
    pub(super) output: Vec<String>,
}

impl Runtime {
    pub(super) fn new() -> Self {
        Self {
            heap: Heap::new(),
            frames: Vec::new(),
            values: Vec::new(),
            builtins: Builtins::new(),
            output: Vec::new(),
        }
    }

    /// Declare every builtin name as a program-block local and seed the
    /// program frame with the matching values. Must run before any user code
    /// resolves against the program block.
    pub(super) fn install_builtins(&mut self, program: &Rc<Block>) {
        {
            let mut attr = program.attr.borrow_mut();
            for (name, _) in self.builtins.entries() {
                resolver::declare_local(&mut attr, name).expect("builtin names are unique");
            }
        }
        let frame_id = self.create_frame(None, program);
        let frame = self.heap.frame_mut(frame_id);
        for (slot, (_, value)) in self.builtins.entries().iter().enumerate() {
            frame.vars[slot] = value.clone();
        }
        self.frames.push(frame_id);
    }

    pub(super) fn exec_top_stmt(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        self.collect_if_needed();
        let depth = self.values.len();
        match self.exec_stmt(stmt) {
            Ok(Flow::Normal) => Ok(()),
            Ok(Flow::Break) => Err(RuntimeError::BreakOutsideLoop),
            Ok(Flow::Continue) => Err(RuntimeError::ContinueOutsideLoop),
            Ok(Flow::Return(_)) => Err(RuntimeError::ReturnOutsideFunction),
            Err(error) => {
                // An abandoned evaluation may leave partial results behind.
                self.values.truncate(depth);
                Err(error)
            }
        }
    }

    pub(super) fn eval_top_exp(&mut self, exp: &Expr) -> Result<Value, RuntimeError> {
        self.collect_if_needed();
        let depth = self.values.len();
        match self.eval_exp(exp) {
            Ok(()) => Ok(self.pop_value()),
            Err(error) => {
                self.values.truncate(depth);
                Err(error)
            }
        }
    }

    pub(super) fn render_value(&self, value: &Value) -> String {
        value::render(value, &self.heap)
    }

    pub(super) fn heap_len(&self) -> usize {
        self.heap.len()
    }

    // ---- statements ----

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Block(block) => {
                let parent = self.top_frame();
                self.exec_block(block, Some(parent))
            }
            Stmt::DeclareList(decls) => {
                self.exec_declare_list(decls)?;
                Ok(Flow::Normal)
            }
            Stmt::Condition(cond) => self.exec_condition(cond),
            Stmt::While(wh) => self.exec_while(wh),
            Stmt::Return(value) => {
                let value = match value {
                    Some(exp) => {
                        self.eval_exp(exp)?;
                        self.pop_value()
                    }
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Expr(exp) => {
                self.eval_exp(exp)?;
                self.pop_value();
                Ok(Flow::Normal)
            }
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    /// Enter `block` with the given lexical parent frame, run its statements,
    /// and pop the frame again on every exit path, normal or abrupt.
    fn exec_block(&mut self, block: &Rc<Block>, parent: Option<ObjId>) -> Result<Flow, RuntimeError> {
        let frame_id = self.create_frame(parent, block);
        self.frames.push(frame_id);
        let flow = self.exec_stmts(block);
        self.frames.pop();
        flow
    }

    fn exec_stmts(&mut self, block: &Block) -> Result<Flow, RuntimeError> {
        for stmt in &block.stmts {
            self.collect_if_needed();
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_declare_list(&mut self, decls: &DeclareList) -> Result<(), RuntimeError> {
        let start = decls.attr.get().expect("declare-list was not resolved");

        // Grow the frame over the whole list up front: the program frame gains
        // slots as the REPL introduces globals, and forward references inside
        // one list must read null rather than a missing slot.
        let end = start + decls.decls.len();
        let frame_id = self.top_frame();
        let frame = self.heap.frame_mut(frame_id);
        if frame.vars.len() < end {
            frame.vars.resize(end, Value::Null);
        }

        for (offset, decl) in decls.decls.iter().enumerate() {
            let value = match &decl.init {
                Some(init) => {
                    self.eval_exp(init)?;
                    self.pop_value()
                }
                None => Value::Null,
            };
            self.heap.frame_mut(frame_id).vars[start + offset] = value;
        }
        Ok(())
    }

    fn exec_condition(&mut self, cond: &Condition) -> Result<Flow, RuntimeError> {
        self.eval_exp(&cond.test)?;
        let test = self.pop_value();
        let parent = self.top_frame();
        if test.is_truthy(&self.heap) {
            return self.exec_block(&cond.then_block, Some(parent));
        }
        match &cond.orelse {
            Some(ElseBranch::Block(block)) => self.exec_block(block, Some(parent)),
            Some(ElseBranch::ElseIf(next)) => self.exec_condition(next),
            None => Ok(Flow::Normal),
        }
    }

    fn exec_while(&mut self, wh: &While) -> Result<Flow, RuntimeError> {
        loop {
            self.eval_exp(&wh.test)?;
            let test = self.pop_value();
            if !test.is_truthy(&self.heap) {
                return Ok(Flow::Normal);
            }
            let parent = self.top_frame();
            match self.exec_block(&wh.body, Some(parent))? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Ok(Flow::Normal),
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
    }

    // ---- expressions ----

    /// Evaluate one expression, leaving exactly one value on the stack.
    fn eval_exp(&mut self, exp: &Expr) -> Result<(), RuntimeError> {
        match exp {
            Expr::Null => self.push_value(Value::Null),
            Expr::Bool(value) => self.push_value(Value::Bool(*value)),
            Expr::Int(value) => self.push_value(Value::Int(*value)),
            Expr::Float(value) => self.push_value(Value::Float(*value)),
            Expr::Str(value) => self.push_value(Value::Str(value.clone())),
            Expr::List(items) => {
                for item in items {
                    self.eval_exp(item)?;
                }
                let items = self.pop_values(items.len());
                let id = self.heap.alloc(HeapObj::List(items));
                self.push_value(Value::List(id));
            }
            Expr::Var(var) => {
                let value = self.read_var(var);
                self.push_value(value);
            }
            Expr::Func(def) => {
                let frame = self.top_frame();
                self.push_value(Value::Func(Closure {
                    def: Rc::clone(def),
                    frame,
                }));
            }
            Expr::Op(op) => self.eval_op(op)?,
        }
        Ok(())
    }

    fn eval_op(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        match op.op {
            OpCode::Add | OpCode::Sub => self.eval_plus_minus(op),
            OpCode::Mul | OpCode::Div | OpCode::Rem => self.eval_arith_binary(op),
            OpCode::Lt | OpCode::LtEq | OpCode::Gt | OpCode::GtEq => self.eval_ordering(op),
            OpCode::Eq | OpCode::NotEq => self.eval_equality(op),
            OpCode::Not => self.eval_not(op),
            OpCode::And => self.eval_short_circuit(op, false),
            OpCode::Or => self.eval_short_circuit(op, true),
            OpCode::Assign => self.eval_assign(op),
            OpCode::AddAssign
            | OpCode::SubAssign
            | OpCode::MulAssign
            | OpCode::DivAssign
            | OpCode::RemAssign => self.eval_compound_assign(op),
            OpCode::Call => self.eval_call(op),
            OpCode::Subscript => self.eval_subscript(op),
            OpCode::ExpList => self.eval_explist(op),
        }
    }

    /// `+` and `-` double as unary sign operators; arity decides.
    fn eval_plus_minus(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        match op.args.as_slice() {
            [operand] => {
                self.eval_exp(operand)?;
                let operand = self.pop_value();
                let result = match (op.op, operand) {
                    (OpCode::Add, Value::Int(value)) => Value::Int(value),
                    (OpCode::Add, Value::Float(value)) => Value::Float(value),
                    (OpCode::Sub, Value::Int(value)) => Value::Int(value.wrapping_neg()),
                    (OpCode::Sub, Value::Float(value)) => Value::Float(-value),
                    (code, operand) => {
                        return Err(RuntimeError::UnsupportedUnary {
                            op: code.symbol(),
                            operand: operand.type_name(),
                        });
                    }
                };
                self.push_value(result);
                Ok(())
            }
            [_, _] => self.eval_arith_binary(op),
            _ => panic!("operator '{}' expects one or two operands", op.op.symbol()),
        }
    }

    fn eval_arith_binary(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        let (lhs, rhs) = binary_args(op);
        self.eval_exp(lhs)?;
        self.eval_exp(rhs)?;
        let rhs = self.pop_value();
        let lhs = self.pop_value();
        let result = self.apply_binary(op.op, lhs, rhs)?;
        self.push_value(result);
        Ok(())
    }

    fn apply_binary(&mut self, op: OpCode, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
        if let Some(pair) = NumPair::of(&lhs, &rhs) {
            return numeric_binary(op, pair);
        }
        match op {
            OpCode::Add => match (lhs, rhs) {
                (Value::Str(lhs), Value::Str(rhs)) => Ok(Value::Str(lhs + &rhs)),
                (Value::List(lhs), Value::List(rhs)) => {
                    let mut items = self.heap.list(lhs).clone();
                    items.extend(self.heap.list(rhs).iter().cloned());
                    Ok(Value::List(self.heap.alloc(HeapObj::List(items))))
                }
                (lhs, rhs) => Err(unsupported_binary(op, &lhs, &rhs)),
            },
            OpCode::Mul => match (lhs, rhs) {
                (Value::Str(text), Value::Int(count)) | (Value::Int(count), Value::Str(text)) => {
                    Ok(Value::Str(repeat_str(&text, count)))
                }
                (Value::List(id), Value::Int(count)) | (Value::Int(count), Value::List(id)) => {
                    let items = repeat_items(self.heap.list(id), count);
                    Ok(Value::List(self.heap.alloc(HeapObj::List(items))))
                }
                (lhs, rhs) => Err(unsupported_binary(op, &lhs, &rhs)),
            },
            _ => Err(unsupported_binary(op, &lhs, &rhs)),
        }
    }

    fn eval_ordering(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        let (lhs, rhs) = binary_args(op);
        self.eval_exp(lhs)?;
        self.eval_exp(rhs)?;
        let rhs = self.pop_value();
        let lhs = self.pop_value();
        let result = value::compare(op.op, &lhs, &rhs)?;
        self.push_value(Value::Bool(result));
        Ok(())
    }

    fn eval_equality(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        let (lhs, rhs) = binary_args(op);
        self.eval_exp(lhs)?;
        self.eval_exp(rhs)?;
        let rhs = self.pop_value();
        let lhs = self.pop_value();
        let equal = lhs == rhs;
        self.push_value(Value::Bool(if op.op == OpCode::Eq { equal } else { !equal }));
        Ok(())
    }

    fn eval_not(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        match op.args.as_slice() {
            [operand] => {
                self.eval_exp(operand)?;
                let operand = self.pop_value();
                let truthy = operand.is_truthy(&self.heap);
                self.push_value(Value::Bool(!truthy));
                Ok(())
            }
            _ => panic!("operator '!' expects one operand"),
        }
    }

    /// `&&` / `||` yield the last evaluated operand, not a coerced bool.
    /// `keep_when_truthy` is true for `||` (a truthy left side is the result)
    /// and false for `&&`.
    fn eval_short_circuit(&mut self, op: &OpExpr, keep_when_truthy: bool) -> Result<(), RuntimeError> {
        let (lhs, rhs) = binary_args(op);
        self.eval_exp(lhs)?;
        let truthy = self
            .values
            .last()
            .expect("operand was just pushed")
            .is_truthy(&self.heap);
        if truthy == keep_when_truthy {
            return Ok(());
        }
        self.pop_value();
        self.eval_exp(rhs)
    }

    // ---- assignment ----

    fn eval_assign(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        let (lhs, rhs) = binary_args(op);
        self.eval_exp(rhs)?;
        self.assign_from_stack_top(lhs)
    }

    /// Write the value on top of the stack into `target`, leaving it there as
    /// the assignment's result. The value stays on the stack while subscript
    /// subexpressions run, so it survives any collection they trigger.
    fn assign_from_stack_top(&mut self, target: &Expr) -> Result<(), RuntimeError> {
        match target {
            Expr::Var(var) => {
                let value = self.peek_value().clone();
                self.write_var(var, value);
                Ok(())
            }
            Expr::Op(op) if op.op == OpCode::Subscript => {
                let (obj_exp, idx_exp) = binary_args(op);
                self.eval_exp(obj_exp)?;
                self.eval_exp(idx_exp)?;
                let index = self.pop_value();
                let object = self.pop_value();
                let value = self.peek_value().clone();
                self.set_item(object, index, value)
            }
            // Expression lists and anything else are not lvalues.
            _ => Err(RuntimeError::InvalidAssignTarget),
        }
    }

    fn eval_compound_assign(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        let base = op.op.compound_base().expect("compound assignment operator");
        let (lhs, rhs) = binary_args(op);
        match lhs {
            Expr::Var(var) => {
                let current = self.read_var(var);
                self.push_value(current);
                self.eval_exp(rhs)?;
                let rhs_value = self.pop_value();
                let current = self.pop_value();
                let result = self.apply_binary(base, current, rhs_value)?;
                self.write_var(var, result.clone());
                self.push_value(result);
                Ok(())
            }
            Expr::Op(target) if target.op == OpCode::Subscript => {
                let (obj_exp, idx_exp) = binary_args(target);
                self.eval_exp(obj_exp)?;
                self.eval_exp(idx_exp)?;
                let current = {
                    let index = self.values[self.values.len() - 1].clone();
                    let object = self.values[self.values.len() - 2].clone();
                    self.get_item(object, index)?
                };
                self.push_value(current);
                self.eval_exp(rhs)?;
                let rhs_value = self.pop_value();
                let current = self.pop_value();
                let index = self.pop_value();
                let object = self.pop_value();
                let result = self.apply_binary(base, current, rhs_value)?;
                self.set_item(object, index, result.clone())?;
                self.push_value(result);
                Ok(())
            }
            _ => Err(RuntimeError::InvalidAssignTarget),
        }
    }

    // ---- calls ----

    fn eval_call(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        let (callee_exp, arg_exps) = op
            .args
            .split_first()
            .expect("call operator without a callee");
        self.eval_exp(callee_exp)?;
        for arg in arg_exps {
            self.eval_exp(arg)?;
        }
        // The arguments leave the root set here; call_closure parks them in
        // the callee frame before the next collection point is reached.
        let args = self.pop_values(arg_exps.len());
        let callee = self.pop_value();
        let result = match callee {
            Value::Builtin(builtin) => self.call_builtin(builtin, args)?,
            Value::Func(closure) => self.call_closure(&closure, args)?,
            other => {
                return Err(RuntimeError::NotCallable {
                    type_name: other.type_name(),
                });
            }
        };
        self.push_value(result);
        Ok(())
    }

    /// Enter the function body with the captured frame as lexical parent
    /// (never the caller's frame), bind arguments into the leading parameter
    /// slots, and catch the return signal at this boundary.
    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let expected = closure.def.param_count();
        if args.len() != expected {
            return Err(RuntimeError::FunctionArityMismatch {
                expected,
                found: args.len(),
            });
        }

        let frame_id = self.create_frame(Some(closure.frame), &closure.def.body);
        let frame = self.heap.frame_mut(frame_id);
        for (slot, value) in args.into_iter().enumerate() {
            frame.vars[slot] = value;
        }

        self.frames.push(frame_id);
        let flow = self.exec_stmts(&closure.def.body);
        self.frames.pop();

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
            Flow::Break => Err(RuntimeError::BreakOutsideLoop),
            Flow::Continue => Err(RuntimeError::ContinueOutsideLoop),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match builtin {
            Builtin::Print => {
                let line = args
                    .iter()
                    .map(|value| value::render(value, &self.heap))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.output.push(line);
                Ok(Value::Null)
            }
            Builtin::Len => {
                let [value] = expect_args(builtin, args)?;
                match value {
                    Value::Str(text) => Ok(Value::Int(text.chars().count() as i64)),
                    Value::List(id) => Ok(Value::Int(self.heap.list(id).len() as i64)),
                    other => Err(RuntimeError::BuiltinArgumentType {
                        name: builtin.name(),
                        expected: "string or list",
                        got: other.type_name(),
                    }),
                }
            }
            Builtin::Push => {
                let [target, value] = expect_args(builtin, args)?;
                match target {
                    Value::List(id) => {
                        self.heap.list_mut(id).push(value);
                        Ok(Value::Null)
                    }
                    other => Err(RuntimeError::BuiltinArgumentType {
                        name: builtin.name(),
                        expected: "list",
                        got: other.type_name(),
                    }),
                }
            }
            Builtin::Str => {
                let [value] = expect_args(builtin, args)?;
                Ok(Value::Str(value::render(&value, &self.heap)))
            }
            Builtin::Type => {
                let [value] = expect_args(builtin, args)?;
                Ok(Value::Str(value.type_name().to_string()))
            }
        }
    }

    // ---- subscripts ----

    fn eval_subscript(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        let (obj_exp, idx_exp) = binary_args(op);
        self.eval_exp(obj_exp)?;
        self.eval_exp(idx_exp)?;
        let index = self.pop_value();
        let object = self.pop_value();
        let result = self.get_item(object, index)?;
        self.push_value(result);
        Ok(())
    }

    fn get_item(&self, object: Value, index: Value) -> Result<Value, RuntimeError> {
        let Value::Int(index) = index else {
            return Err(RuntimeError::NonIntegerIndex {
                type_name: index.type_name(),
            });
        };
        match object {
            Value::List(id) => {
                let items = self.heap.list(id);
                let slot = value::normalize_index(index, items.len())?;
                Ok(items[slot].clone())
            }
            Value::Str(text) => {
                let slot = value::normalize_index(index, text.chars().count())?;
                let ch = text.chars().nth(slot).expect("index was bounds-checked");
                Ok(Value::Str(ch.to_string()))
            }
            other => Err(RuntimeError::NotIndexable {
                type_name: other.type_name(),
            }),
        }
    }

    fn set_item(&mut self, object: Value, index: Value, value: Value) -> Result<(), RuntimeError> {
        let Value::Int(index) = index else {
            return Err(RuntimeError::NonIntegerIndex {
                type_name: index.type_name(),
            });
        };
        match object {
            Value::List(id) => {
                let len = self.heap.list(id).len();
                let slot = value::normalize_index(index, len)?;
                self.heap.list_mut(id)[slot] = value;
                Ok(())
            }
            // Strings are immutable; everything else is not a container.
            other => Err(RuntimeError::IndexAssignUnsupported {
                type_name: other.type_name(),
            }),
        }
    }

    /// The comma operator: evaluate left to right, yield the last value.
    fn eval_explist(&mut self, op: &OpExpr) -> Result<(), RuntimeError> {
        for arg in &op.args {
            self.eval_exp(arg)?;
        }
        let mut results = self.pop_values(op.args.len());
        self.push_value(results.pop().unwrap_or(Value::Null));
        Ok(())
    }

    // ---- variables and frames ----

    fn read_var(&self, var: &VarExpr) -> Value {
        let (frame_id, slot) = self.locate_var(var);
        // The program frame grows lazily as declare-lists execute; a slot
        // that was hoisted but not yet declared reads as null.
        self.heap
            .frame(frame_id)
            .vars
            .get(slot)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn write_var(&mut self, var: &VarExpr, value: Value) {
        let (frame_id, slot) = self.locate_var(var);
        let frame = self.heap.frame_mut(frame_id);
        if frame.vars.len() <= slot {
            frame.vars.resize(slot + 1, Value::Null);
        }
        frame.vars[slot] = value;
    }

    /// Turn a resolved reference into a concrete frame slot. Locals index the
    /// top frame directly; non-locals follow the capture entry to its target
    /// block, then walk the lexical parent chain until that block's frame.
    fn locate_var(&self, var: &VarExpr) -> (ObjId, usize) {
        let binding = var.binding.get().expect("variable was not resolved");
        let frame_id = self.top_frame();
        match binding {
            Binding::Local(slot) => (frame_id, slot),
            Binding::NonLocal(index) => {
                let (target, slot) = {
                    let frame = self.heap.frame(frame_id);
                    let attr = frame.block.attr.borrow();
                    let info = &attr.nonlocal_indexes[index];
                    (
                        info.target.upgrade().expect("capture target block dropped"),
                        info.index,
                    )
                };
                let mut cursor = self.heap.frame(frame_id).parent;
                while let Some(id) = cursor {
                    let frame = self.heap.frame(id);
                    if Rc::ptr_eq(&frame.block, &target) {
                        return (id, slot);
                    }
                    cursor = frame.parent;
                }
                panic!("no live frame for capture target");
            }
        }
    }

    fn create_frame(&mut self, parent: Option<ObjId>, block: &Rc<Block>) -> ObjId {
        let local_count = block.attr.borrow().local_info.len();
        self.heap.alloc(HeapObj::Frame(Frame {
            parent,
            block: Rc::clone(block),
            vars: vec![Value::Null; local_count],
        }))
    }

    fn top_frame(&self) -> ObjId {
        *self.frames.last().expect("frame stack is never empty")
    }

    // ---- value stack ----

    fn push_value(&mut self, value: Value) {
        self.values.push(value);
    }

    fn pop_value(&mut self) -> Value {
        self.values.pop().expect("value stack underflow")
    }

    fn peek_value(&self) -> &Value {
        self.values.last().expect("value stack is empty")
    }

    fn pop_values(&mut self, count: usize) -> Vec<Value> {
        let split = self.values.len() - count;
        self.values.split_off(split)
    }

    // ---- garbage collection ----

    fn collect_if_needed(&mut self) {
        if self.heap.wants_collect() {
            self.collect_garbage();
        }
    }

    /// Mark from the frame stack, the value stack and the builtin table, then
    /// sweep. Safe at statement boundaries, where those three sets cover
    /// every live object.
    pub(super) fn collect_garbage(&mut self) -> usize {
        let mut roots: Vec<ObjId> = self.frames.clone();
        for value in &self.values {
            value.each_ref(&mut |id| roots.push(id));
        }
        for (_, value) in self.builtins.entries() {
            value.each_ref(&mut |id| roots.push(id));
        }
        self.heap.collect(roots)
    }

    #[cfg(test)]
    pub(super) fn value_stack_depth(&self) -> usize {
        self.values.len()
    }

    #[cfg(test)]
    pub(super) fn frame_stack_depth(&self) -> usize {
        self.frames.len()
    }
}

fn binary_args(op: &OpExpr) -> (&Expr, &Expr) {
    match op.args.as_slice() {
        [lhs, rhs] => (lhs, rhs),
        _ => panic!("operator '{}' expects two operands", op.op.symbol()),
    }
}

fn numeric_binary(op: OpCode, pair: NumPair) -> Result<Value, RuntimeError> {
    Ok(match pair {
        NumPair::Ints(lhs, rhs) => match op {
            OpCode::Add => Value::Int(lhs.wrapping_add(rhs)),
            OpCode::Sub => Value::Int(lhs.wrapping_sub(rhs)),
            OpCode::Mul => Value::Int(lhs.wrapping_mul(rhs)),
            OpCode::Div => {
                if rhs == 0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                Value::Int(lhs.wrapping_div(rhs))
            }
            OpCode::Rem => {
                if rhs == 0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                Value::Int(lhs.wrapping_rem(rhs))
            }
            _ => panic!("not an arithmetic operator: {op:?}"),
        },
        NumPair::Floats(lhs, rhs) => match op {
            OpCode::Add => Value::Float(lhs + rhs),
            OpCode::Sub => Value::Float(lhs - rhs),
            OpCode::Mul => Value::Float(lhs * rhs),
            OpCode::Div => {
                if rhs == 0.0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                Value::Float(lhs / rhs)
            }
            OpCode::Rem => {
                if rhs == 0.0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                Value::Float(lhs % rhs)
            }
            _ => panic!("not an arithmetic operator: {op:?}"),
        },
    })
}

fn unsupported_binary(op: OpCode, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::UnsupportedBinary {
        op: op.symbol(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

fn repeat_str(text: &str, count: i64) -> String {
    if count <= 0 {
        return String::new();
    }
    text.repeat(count as usize)
}

fn repeat_items(items: &[Value], count: i64) -> Vec<Value> {
    if count <= 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(items.len() * count as usize);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

fn expect_args<const N: usize>(
    builtin: Builtin,
    args: Vec<Value>,
) -> Result<[Value; N], RuntimeError> {
    let found = args.len();
    args.try_into()
        .map_err(|_| RuntimeError::BuiltinArityMismatch {
            name: builtin.name(),
            expected: N,
            found,
        })
}
