// Variable declaration and access: `var`, `array`, `get`, `<-`, `->`.
//
// `var` and `array` are readers: rather than taking their arguments off the
// stack, they consume the next token(s) straight from the source buffer,
// the same way the compiler's `word` does.

use crate::dictionary::{Dictionary, IMMEDIATE};
use crate::value::Value;
use crate::vm::Vm;

impl Vm {
    /// `var NAME`: allocates a single cell named by the next token, in the
    /// globals arena or the currently-open block's locals.
    pub fn f_var(&mut self) {
        let name = match self.tokenize() {
            Some(v) => self.as_string(&v),
            None => return,
        };
        self.alloc_var(&name);
    }

    /// `array NAME N`: allocates N contiguous cells named by the next two
    /// tokens.
    pub fn f_array(&mut self) {
        let name = match self.tokenize() {
            Some(v) => self.as_string(&v),
            None => return,
        };
        let n = match self.tokenize() {
            Some(v) => self.as_integer(&v),
            None => return,
        };
        self.alloc_array(&name, n);
    }

    /// `get ( ptr -- value )`.
    pub fn f_get(&mut self) {
        match self.user.last() {
            Some(Value::Ptr(_)) => {}
            _ => return,
        }
        let ptr = self.user.pop().unwrap();
        if let Value::Ptr(r) = ptr {
            if let Some(v) = self.get_cell(r) {
                self.user.push(v);
            }
        }
    }

    /// `<- ( ptr value -- )`: pops the value, then the pointer.
    pub fn f_store_left(&mut self) {
        if self.user.len() < 2 {
            return;
        }
        let value = self.user.pop().unwrap();
        match self.user.last() {
            Some(Value::Ptr(_)) => {}
            _ => {
                self.user.push(value);
                return;
            }
        }
        let ptr = self.user.pop().unwrap();
        if let Value::Ptr(r) = ptr {
            self.set_cell(r, value);
        }
    }

    /// `-> ( value ptr -- )`: pops the pointer, then the value.
    pub fn f_store_right(&mut self) {
        if self.user.len() < 2 {
            return;
        }
        match self.user.last() {
            Some(Value::Ptr(_)) => {}
            _ => return,
        }
        let ptr = self.user.pop().unwrap();
        let value = self.user.pop().unwrap();
        if let Value::Ptr(r) = ptr {
            self.set_cell(r, value);
        }
    }
}

pub fn register(dict: &mut Dictionary) {
    dict.insert_builtin("var", Vm::f_var, IMMEDIATE, "var NAME, declares a variable");
    dict.insert_builtin("array", Vm::f_array, IMMEDIATE, "array NAME N, declares an array");
    dict.insert_builtin("get", Vm::f_get, 0, "get ( ptr -- value )");
    dict.insert_builtin("<-", Vm::f_store_left, 0, "<- ( ptr value -- )");
    dict.insert_builtin("->", Vm::f_store_right, 0, "-> ( value ptr -- )");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_store_and_get_round_trip() {
        let mut vm = Vm::new();
        vm.execute("var t  t 12 <-  t get");
        assert_eq!(vm.user, vec![Value::Integer(12)]);
    }

    #[test]
    fn array_cells_are_independently_addressable() {
        let mut vm = Vm::new();
        vm.execute("array a 10  a 1 + 1 <-  a 2 + 2 <-  a 1 + get  a 2 + get");
        assert_eq!(vm.user, vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn get_on_a_non_pointer_is_a_no_op() {
        let mut vm = Vm::new();
        vm.execute("5 get");
        assert_eq!(vm.user, vec![Value::Integer(5)]);
    }

    #[test]
    fn store_right_pops_pointer_then_value() {
        let mut vm = Vm::new();
        vm.execute("var t  99 t ->  t get");
        assert_eq!(vm.user, vec![Value::Integer(99)]);
    }
}
