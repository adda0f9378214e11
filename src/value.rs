// The tagged value union at the heart of the system, plus the coercions
// every builtin uses to interpret it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A stable reference to a Value cell owned by a global or a local variable.
///
/// Arena 0 is reserved for globals; each compiled block gets its own arena
/// the moment it is opened for compilation, so a block's locals are dropped
/// along with its dictionary entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CellRef {
    pub arena: u32,
    pub offset: u32,
}

impl CellRef {
    /// The dummy placeholder the infix compiler pushes in place of an
    /// operator's not-yet-materialized result. Never dereferenced.
    pub const NULL: CellRef = CellRef {
        arena: u32::MAX,
        offset: 0,
    };

    pub fn is_null(self) -> bool {
        self.arena == u32::MAX
    }

    pub fn offset_by(self, n: i64) -> CellRef {
        CellRef {
            arena: self.arena,
            offset: (self.offset as i64 + n) as u32,
        }
    }

    pub fn encode(self) -> i64 {
        ((self.arena as i64) << 32) | self.offset as i64
    }
}

/// An opaque object supporting a message-send, the system's only
/// foreign-function hook.
pub trait ExternalObject: fmt::Debug {
    fn is_empty(&self) -> bool {
        true
    }

    /// Receive a message. Implementations may push a result directly onto
    /// the VM's user stack; the caller re-pushes the External value itself
    /// afterward regardless of what `send` does.
    fn send(&mut self, op: &str, arg: &Value) -> Value;
}

pub type ExternalHandle = Rc<RefCell<dyn ExternalObject>>;

#[derive(Clone, Debug)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Str(String),
    External(ExternalHandle),
    Ptr(CellRef),
}

impl Value {
    pub fn integer(n: i64) -> Value {
        Value::Integer(n)
    }

    pub fn string<S: Into<String>>(s: S) -> Value {
        Value::Str(s.into())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Ptr(a), Value::Ptr(b)) => a == b,
            (Value::External(a), Value::External(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// `asInteger`: Integer identity, Real truncated toward zero, String parsed
/// (0 on failure), External 0, ValuePtr dereferenced recursively.
pub fn as_integer(get_cell: &dyn Fn(CellRef) -> Option<Value>, v: &Value) -> i64 {
    match v {
        Value::Integer(n) => *n,
        Value::Real(r) => *r as i64,
        Value::Str(s) => s.trim().parse::<i64>().unwrap_or(0),
        Value::External(_) => 0,
        Value::Ptr(p) => match get_cell(*p) {
            Some(inner) => as_integer(get_cell, &inner),
            None => 0,
        },
    }
}

/// `asReal`: analogous to `as_integer`, with String parsed as floating point.
pub fn as_real(get_cell: &dyn Fn(CellRef) -> Option<Value>, v: &Value) -> f64 {
    match v {
        Value::Integer(n) => *n as f64,
        Value::Real(r) => *r,
        Value::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::External(_) => 0.0,
        Value::Ptr(p) => match get_cell(*p) {
            Some(inner) => as_real(get_cell, &inner),
            None => 0.0,
        },
    }
}

/// `asString`: canonical decimal form for numbers, identity for String,
/// the literal `(x)` for External, recursive dereference for ValuePtr.
pub fn as_string(get_cell: &dyn Fn(CellRef) -> Option<Value>, v: &Value) -> String {
    match v {
        Value::Integer(n) => n.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Str(s) => s.clone(),
        Value::External(_) => "(x)".to_string(),
        Value::Ptr(p) => match get_cell(*p) {
            Some(inner) => as_string(get_cell, &inner),
            None => String::new(),
        },
    }
}

/// `isTrue`: nonzero Integer/Real, non-empty String, non-empty External,
/// recursive dereference for ValuePtr.
pub fn is_true(get_cell: &dyn Fn(CellRef) -> Option<Value>, v: &Value) -> bool {
    match v {
        Value::Integer(n) => *n != 0,
        Value::Real(r) => *r != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::External(e) => !e.borrow().is_empty(),
        Value::Ptr(p) => match get_cell(*p) {
            Some(inner) => is_true(get_cell, &inner),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_cells(_: CellRef) -> Option<Value> {
        None
    }

    #[test]
    fn integer_coercions() {
        assert_eq!(as_integer(&no_cells, &Value::Integer(7)), 7);
        assert_eq!(as_integer(&no_cells, &Value::Real(7.9)), 7);
        assert_eq!(as_integer(&no_cells, &Value::Real(-7.9)), -7);
        assert_eq!(as_integer(&no_cells, &Value::string("42")), 42);
        assert_eq!(as_integer(&no_cells, &Value::string("nope")), 0);
    }

    #[test]
    fn real_coercions() {
        assert_eq!(as_real(&no_cells, &Value::Integer(3)), 3.0);
        assert_eq!(as_real(&no_cells, &Value::string("3.5")), 3.5);
        assert_eq!(as_real(&no_cells, &Value::string("garbage")), 0.0);
    }

    #[test]
    fn string_coercions() {
        assert_eq!(as_string(&no_cells, &Value::Integer(5)), "5");
        assert_eq!(as_string(&no_cells, &Value::string("hi")), "hi");
    }

    #[test]
    fn truthiness() {
        assert!(is_true(&no_cells, &Value::Integer(1)));
        assert!(!is_true(&no_cells, &Value::Integer(0)));
        assert!(!is_true(&no_cells, &Value::string("")));
        assert!(is_true(&no_cells, &Value::string("x")));
    }

    #[test]
    fn null_cell_ref_is_distinguished() {
        assert!(CellRef::NULL.is_null());
        assert!(!CellRef { arena: 0, offset: 0 }.is_null());
    }

    #[test]
    fn cell_ref_offset_supports_array_indexing() {
        let base = CellRef { arena: 1, offset: 4 };
        assert_eq!(base.offset_by(3), CellRef { arena: 1, offset: 7 });
    }
}
