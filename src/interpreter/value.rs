//! Runtime value model.
//!
//! Scalars and strings are plain clones; lists and frames are heap entities
//! addressed by id so they can be shared, mutated in place, and traced by the
//! collector. A closure is a function definition plus the frame that was on
//! top when the literal was evaluated.

use std::rc::Rc;

use crate::ast::{Block, FuncDef};
use crate::builtins::Builtin;
use crate::heap::{Heap, ObjId, Trace};

use super::error::RuntimeError;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ObjId),
    Func(Closure),
    Builtin(Builtin),
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub def: Rc<FuncDef>,
    /// Lexical parent frame captured at definition time.
    pub frame: ObjId,
}

/// Activation record for one entry of a block.
#[derive(Debug)]
pub struct Frame {
    /// Lexically enclosing frame at block entry, not the caller's frame.
    pub parent: Option<ObjId>,
    pub block: Rc<Block>,
    pub vars: Vec<Value>,
}

/// What the interpreter's heap stores.
#[derive(Debug)]
pub enum HeapObj {
    Frame(Frame),
    List(Vec<Value>),
}

impl Trace for HeapObj {
    fn each_ref(&self, visit: &mut dyn FnMut(ObjId)) {
        match self {
            HeapObj::Frame(frame) => {
                if let Some(parent) = frame.parent {
                    visit(parent);
                }
                for value in &frame.vars {
                    value.each_ref(visit);
                }
            }
            HeapObj::List(items) => {
                for value in items {
                    value.each_ref(visit);
                }
            }
        }
    }
}

impl Heap<HeapObj> {
    pub(crate) fn frame(&self, id: ObjId) -> &Frame {
        match self.get(id) {
            HeapObj::Frame(frame) => frame,
            HeapObj::List(_) => panic!("frame id points at a list"),
        }
    }

    pub(crate) fn frame_mut(&mut self, id: ObjId) -> &mut Frame {
        match self.get_mut(id) {
            HeapObj::Frame(frame) => frame,
            HeapObj::List(_) => panic!("frame id points at a list"),
        }
    }

    pub(crate) fn list(&self, id: ObjId) -> &Vec<Value> {
        match self.get(id) {
            HeapObj::List(items) => items,
            HeapObj::Frame(_) => panic!("list id points at a frame"),
        }
    }

    pub(crate) fn list_mut(&mut self, id: ObjId) -> &mut Vec<Value> {
        match self.get_mut(id) {
            HeapObj::List(items) => items,
            HeapObj::Frame(_) => panic!("list id points at a frame"),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Func(_) => "function",
            Value::Builtin(_) => "builtin",
        }
    }

    /// Heap ids this value keeps alive.
    pub(crate) fn each_ref(&self, visit: &mut dyn FnMut(ObjId)) {
        match self {
            Value::List(id) => visit(*id),
            Value::Func(closure) => visit(closure.frame),
            _ => {}
        }
    }

    /// Truthiness for branches and the logical operators: null, false, zero,
    /// the empty string and the empty list are falsy.
    pub fn is_truthy(&self, heap: &Heap<HeapObj>) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Str(value) => !value.is_empty(),
            Value::List(id) => !heap.list(*id).is_empty(),
            Value::Func(_) | Value::Builtin(_) => true,
        }
    }
}

/// Equality is total: structural for scalars with numeric widening, identity
/// for lists and functions, `false` across kinds.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let Some(pair) = NumPair::of(self, other) {
            return match pair {
                NumPair::Ints(lhs, rhs) => lhs == rhs,
                NumPair::Floats(lhs, rhs) => lhs == rhs,
            };
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(lhs), Value::Bool(rhs)) => lhs == rhs,
            (Value::Str(lhs), Value::Str(rhs)) => lhs == rhs,
            (Value::List(lhs), Value::List(rhs)) => lhs == rhs,
            (Value::Func(lhs), Value::Func(rhs)) => {
                Rc::ptr_eq(&lhs.def, &rhs.def) && lhs.frame == rhs.frame
            }
            (Value::Builtin(lhs), Value::Builtin(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

/// A numeric operand pair after the widening rule: floats win.
pub(crate) enum NumPair {
    Ints(i64, i64),
    Floats(f64, f64),
}

impl NumPair {
    pub(crate) fn of(lhs: &Value, rhs: &Value) -> Option<NumPair> {
        match (lhs, rhs) {
            (Value::Int(lhs), Value::Int(rhs)) => Some(NumPair::Ints(*lhs, *rhs)),
            (Value::Int(lhs), Value::Float(rhs)) => Some(NumPair::Floats(*lhs as f64, *rhs)),
            (Value::Float(lhs), Value::Int(rhs)) => Some(NumPair::Floats(*lhs, *rhs as f64)),
            (Value::Float(lhs), Value::Float(rhs)) => Some(NumPair::Floats(*lhs, *rhs)),
            _ => None,
        }
    }
}

/// Ordering comparison for `<`, `<=`, `>`, `>=`.
///
/// Defined on numeric pairs (after widening) and string pairs (code-point
/// order). Comparisons against NaN are all false. Anything else cannot be
/// ordered.
pub(crate) fn compare(
    op: crate::ast::OpCode,
    lhs: &Value,
    rhs: &Value,
) -> Result<bool, RuntimeError> {
    use crate::ast::OpCode;
    use std::cmp::Ordering;

    let ordering = if let Some(pair) = NumPair::of(lhs, rhs) {
        match pair {
            NumPair::Ints(lhs, rhs) => lhs.cmp(&rhs),
            NumPair::Floats(lhs, rhs) => match lhs.partial_cmp(&rhs) {
                Some(ordering) => ordering,
                None => return Ok(false),
            },
        }
    } else if let (Value::Str(lhs), Value::Str(rhs)) = (lhs, rhs) {
        lhs.cmp(rhs)
    } else {
        return Err(RuntimeError::IncomparableTypes {
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        });
    };

    Ok(match op {
        OpCode::Lt => ordering == Ordering::Less,
        OpCode::LtEq => ordering != Ordering::Greater,
        OpCode::Gt => ordering == Ordering::Greater,
        OpCode::GtEq => ordering != Ordering::Less,
        _ => panic!("not an ordering operator: {op:?}"),
    })
}

/// Map a possibly-negative subscript onto `0..len`.
pub(crate) fn normalize_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    let adjusted = if index < 0 { index + len as i64 } else { index };
    if adjusted < 0 || adjusted as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index, len });
    }
    Ok(adjusted as usize)
}

/// Human-readable form used by `print`, `str` and the REPL.
pub(crate) fn render(value: &Value, heap: &Heap<HeapObj>) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(value) => value.to_string(),
        Value::Int(value) => value.to_string(),
        // Debug formatting keeps the decimal point, so 1.0 stays a float.
        Value::Float(value) => format!("{value:?}"),
        Value::Str(value) => value.clone(),
        Value::List(id) => {
            let rendered = heap
                .list(*id)
                .iter()
                .map(|item| render(item, heap))
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{rendered}]")
        }
        Value::Func(_) => "<function>".to_string(),
        Value::Builtin(builtin) => format!("<built-in: {}>", builtin.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OpCode;

    #[test]
    fn equality_widens_numerics() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::Float(0.5), Value::Float(0.5));
        assert_ne!(Value::Int(3), Value::Float(3.5));
    }

    #[test]
    fn equality_is_false_across_kinds() {
        assert_ne!(Value::Str("1".to_string()), Value::Int(1));
        assert_ne!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn list_equality_is_identity() {
        let mut heap = Heap::new();
        let first = heap.alloc(HeapObj::List(vec![Value::Int(1)]));
        let second = heap.alloc(HeapObj::List(vec![Value::Int(1)]));
        assert_eq!(Value::List(first), Value::List(first));
        assert_ne!(Value::List(first), Value::List(second));
    }

    #[test]
    fn ordering_compares_numbers_and_strings() {
        assert!(compare(OpCode::Lt, &Value::Int(1), &Value::Float(1.5)).expect("numeric"));
        assert!(compare(OpCode::GtEq, &Value::Int(2), &Value::Int(2)).expect("numeric"));
        assert!(
            compare(
                OpCode::Lt,
                &Value::Str("apple".to_string()),
                &Value::Str("banana".to_string())
            )
            .expect("strings")
        );
    }

    #[test]
    fn ordering_against_nan_is_false() {
        let nan = Value::Float(f64::NAN);
        assert!(!compare(OpCode::Lt, &nan, &Value::Int(1)).expect("nan"));
        assert!(!compare(OpCode::GtEq, &nan, &Value::Int(1)).expect("nan"));
    }

    #[test]
    fn ordering_rejects_mixed_kinds() {
        assert_eq!(
            compare(OpCode::Lt, &Value::Str("1".to_string()), &Value::Int(2))
                .expect_err("mixed kinds"),
            RuntimeError::IncomparableTypes {
                lhs: "string",
                rhs: "int"
            }
        );
    }

    #[test]
    fn truthiness_follows_emptiness() {
        let mut heap = Heap::new();
        let empty = heap.alloc(HeapObj::List(vec![]));
        let full = heap.alloc(HeapObj::List(vec![Value::Null]));

        assert!(!Value::Null.is_truthy(&heap));
        assert!(!Value::Int(0).is_truthy(&heap));
        assert!(!Value::Float(0.0).is_truthy(&heap));
        assert!(!Value::Str(String::new()).is_truthy(&heap));
        assert!(!Value::List(empty).is_truthy(&heap));
        assert!(Value::List(full).is_truthy(&heap));
        assert!(Value::Int(-1).is_truthy(&heap));
        assert!(Value::Str(" ".to_string()).is_truthy(&heap));
    }

    #[test]
    fn negative_indexes_count_from_the_end() {
        assert_eq!(normalize_index(-1, 3).expect("last"), 2);
        assert_eq!(normalize_index(0, 3).expect("first"), 0);
        assert_eq!(
            normalize_index(3, 3).expect_err("past the end"),
            RuntimeError::IndexOutOfBounds { index: 3, len: 3 }
        );
        assert_eq!(
            normalize_index(-4, 3).expect_err("before the start"),
            RuntimeError::IndexOutOfBounds { index: -4, len: 3 }
        );
    }

    #[test]
    fn renders_values_recursively() {
        let mut heap = Heap::new();
        let inner = heap.alloc(HeapObj::List(vec![Value::Int(2), Value::Int(3)]));
        let outer = heap.alloc(HeapObj::List(vec![
            Value::Int(1),
            Value::List(inner),
            Value::Str("x".to_string()),
        ]));

        assert_eq!(render(&Value::List(outer), &heap), "[1, [2, 3], x]");
        assert_eq!(render(&Value::Float(1.0), &heap), "1.0");
        assert_eq!(render(&Value::Null, &heap), "null");
    }
}
