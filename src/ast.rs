//! Syntax tree shared by the resolver and the evaluator.
//!
//! The parser-facing shape is immutable. Resolution writes into the attribute
//! records (`BlockAttr`, the declare-list start index, `VarExpr` bindings)
//! through interior mutability, so a resolved tree can be evaluated any
//! number of times without further bookkeeping. Blocks sit behind `Rc`
//! because frames and closures need to name the block they were entered for.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Debug)]
pub enum Stmt {
    Block(Rc<Block>),
    DeclareList(Rc<DeclareList>),
    Condition(Condition),
    While(While),
    Return(Option<Expr>),
    Break,
    Continue,
    Expr(Expr),
    Empty,
}

#[derive(Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub attr: RefCell<BlockAttr>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Rc<Self> {
        Rc::new(Self {
            stmts,
            attr: RefCell::new(BlockAttr::default()),
        })
    }
}

/// Resolver-populated metadata on a block.
///
/// `local_info` order fixes each local's slot index. `nonlocal_indexes` is the
/// block's capture table: one entry per distinct outer name referenced from
/// inside the block. The name→index maps are scratch for the resolution pass.
#[derive(Debug, Default)]
pub struct BlockAttr {
    pub parent: Option<Weak<Block>>,
    pub local_info: Vec<VarInfo>,
    pub nonlocal_indexes: Vec<NonLocalInfo>,
    pub(crate) name_to_local_index: HashMap<String, usize>,
    pub(crate) name_to_nonlocal_index: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    pub name: String,
}

/// Capture descriptor: a local slot in a strict ancestor block.
#[derive(Debug, Clone)]
pub struct NonLocalInfo {
    pub target: Weak<Block>,
    pub index: usize,
}

#[derive(Debug)]
pub struct DeclareList {
    pub decls: Vec<Declare>,
    /// Local-slot offset of the first declaration in the enclosing block.
    pub attr: Cell<Option<usize>>,
}

impl DeclareList {
    pub fn new(decls: Vec<Declare>) -> Rc<Self> {
        Rc::new(Self {
            decls,
            attr: Cell::new(None),
        })
    }
}

#[derive(Debug)]
pub struct Declare {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug)]
pub struct Condition {
    pub test: Expr,
    pub then_block: Rc<Block>,
    pub orelse: Option<ElseBranch>,
}

/// An `else` arm is either a plain block or the next link of an else-if chain.
#[derive(Debug)]
pub enum ElseBranch {
    Block(Rc<Block>),
    ElseIf(Box<Condition>),
}

#[derive(Debug)]
pub struct While {
    pub test: Expr,
    pub body: Rc<Block>,
}

#[derive(Debug)]
pub enum Expr {
    Op(OpExpr),
    Var(VarExpr),
    Func(Rc<FuncDef>),
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Expr>),
}

#[derive(Debug)]
pub struct OpExpr {
    pub op: OpCode,
    pub args: Vec<Expr>,
}

#[derive(Debug)]
pub struct VarExpr {
    pub name: String,
    pub binding: Cell<Option<Binding>>,
}

impl VarExpr {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: Cell::new(None),
        }
    }
}

/// Where a resolved variable reference lives: a slot of the owning block's
/// frame, or an entry of the owning block's capture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Local(usize),
    NonLocal(usize),
}

/// A function literal: parameter declare-list plus body block.
#[derive(Debug)]
pub struct FuncDef {
    pub params: Option<Rc<DeclareList>>,
    pub body: Rc<Block>,
}

impl FuncDef {
    pub fn new(params: Option<Rc<DeclareList>>, body: Rc<Block>) -> Rc<Self> {
        Rc::new(Self { params, body })
    }

    pub fn param_count(&self) -> usize {
        self.params.as_ref().map_or(0, |params| params.decls.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    Not,
    And,
    Or,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    Call,
    Subscript,
    ExpList,
}

impl OpCode {
    /// Operator spelling used in diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            OpCode::Add => "+",
            OpCode::Sub => "-",
            OpCode::Mul => "*",
            OpCode::Div => "/",
            OpCode::Rem => "%",
            OpCode::Lt => "<",
            OpCode::LtEq => "<=",
            OpCode::Gt => ">",
            OpCode::GtEq => ">=",
            OpCode::Eq => "==",
            OpCode::NotEq => "!=",
            OpCode::Not => "!",
            OpCode::And => "&&",
            OpCode::Or => "||",
            OpCode::Assign => "=",
            OpCode::AddAssign => "+=",
            OpCode::SubAssign => "-=",
            OpCode::MulAssign => "*=",
            OpCode::DivAssign => "/=",
            OpCode::RemAssign => "%=",
            OpCode::Call => "()",
            OpCode::Subscript => "[]",
            OpCode::ExpList => ",",
        }
    }

    /// The plain binary operator a compound assignment applies.
    pub(crate) fn compound_base(self) -> Option<OpCode> {
        match self {
            OpCode::AddAssign => Some(OpCode::Add),
            OpCode::SubAssign => Some(OpCode::Sub),
            OpCode::MulAssign => Some(OpCode::Mul),
            OpCode::DivAssign => Some(OpCode::Div),
            OpCode::RemAssign => Some(OpCode::Rem),
            _ => None,
        }
    }
}
