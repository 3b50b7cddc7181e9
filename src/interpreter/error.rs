use thiserror::Error;

use crate::resolver::ResolveError;

/// Typed runtime failures surfaced to the driver.
///
/// The variants group into the classic families: operand/kind mismatches,
/// call arity, zero division, bad subscripts, and control-flow signals that
/// escaped every construct that could catch them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Unsupported operand types for '{op}': {lhs} and {rhs}")]
    UnsupportedBinary {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("Unsupported operand type for unary '{op}': {operand}")]
    UnsupportedUnary {
        op: &'static str,
        operand: &'static str,
    },
    #[error("Cannot order {lhs} and {rhs}")]
    IncomparableTypes {
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("Object of type {type_name} is not callable")]
    NotCallable { type_name: &'static str },
    #[error("Object of type {type_name} is not indexable")]
    NotIndexable { type_name: &'static str },
    #[error("Index must be an integer, got {type_name}")]
    NonIntegerIndex { type_name: &'static str },
    #[error("Cannot assign into an index of {type_name}")]
    IndexAssignUnsupported { type_name: &'static str },
    #[error("Cannot assign to this expression")]
    InvalidAssignTarget,
    #[error("Function expected {expected} arguments, got {found}")]
    FunctionArityMismatch { expected: usize, found: usize },
    #[error("Builtin '{name}' expected {expected} arguments, got {found}")]
    BuiltinArityMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Invalid argument for builtin '{name}': expected {expected}, got {got}")]
    BuiltinArgumentType {
        name: &'static str,
        expected: &'static str,
        got: &'static str,
    },
    #[error("Division by zero")]
    ZeroDivision,
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("Return outside of function")]
    ReturnOutsideFunction,
    #[error("Break outside of loop")]
    BreakOutsideLoop,
    #[error("Continue outside of loop")]
    ContinueOutsideLoop,
}

/// Anything an entry point can fail with: static resolution or evaluation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
