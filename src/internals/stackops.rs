// Stack manipulation builtins: user-stack operations plus their system-stack
// mirrors, and the two cross-stack transfer words.

use crate::dictionary::Dictionary;
use crate::value::Value;
use crate::vm::Vm;

fn generic_dup(s: &mut Vec<Value>) {
    if let Some(v) = s.last().cloned() {
        s.push(v);
    }
}

fn generic_pop(s: &mut Vec<Value>) {
    s.pop();
}

fn generic_swap(s: &mut Vec<Value>) {
    let n = s.len();
    if n >= 2 {
        s.swap(n - 1, n - 2);
    }
}

/// a b c -> b c a
fn generic_rot(s: &mut Vec<Value>) {
    let n = s.len();
    if n >= 3 {
        let a = s.remove(n - 3);
        s.push(a);
    }
}

/// a b c -> c a b
fn generic_rrot(s: &mut Vec<Value>) {
    let n = s.len();
    if n >= 3 {
        let c = s.pop().unwrap();
        s.insert(n - 3, c);
    }
}

fn generic_over(s: &mut Vec<Value>) {
    let n = s.len();
    if n >= 2 {
        s.push(s[n - 2].clone());
    }
}

fn generic_nth(s: &[Value], n: i64) -> Option<Value> {
    if n < 0 {
        return None;
    }
    let idx = s.len() as i64 - 1 - n;
    if idx < 0 {
        return None;
    }
    Some(s[idx as usize].clone())
}

impl Vm {
    pub fn f_dup(&mut self) {
        generic_dup(&mut self.user);
    }

    pub fn f_pop(&mut self) {
        generic_pop(&mut self.user);
    }

    pub fn f_swap(&mut self) {
        generic_swap(&mut self.user);
    }

    pub fn f_rot(&mut self) {
        generic_rot(&mut self.user);
    }

    pub fn f_rrot(&mut self) {
        generic_rrot(&mut self.user);
    }

    pub fn f_over(&mut self) {
        generic_over(&mut self.user);
    }

    pub fn f_nth(&mut self) {
        if let Some(n) = self.user.pop() {
            let n = self.as_integer(&n);
            if let Some(v) = generic_nth(&self.user, n) {
                self.user.push(v);
            }
        }
    }

    pub fn f_size(&mut self) {
        let n = self.user.len() as i64;
        self.user.push(Value::Integer(n));
    }

    pub fn f_empty(&mut self) {
        let flag = if self.user.is_empty() { -1 } else { 0 };
        self.user.push(Value::Integer(flag));
    }

    pub fn f_sysdup(&mut self) {
        generic_dup(&mut self.system);
    }

    pub fn f_syspop(&mut self) {
        generic_pop(&mut self.system);
    }

    pub fn f_sysswap(&mut self) {
        generic_swap(&mut self.system);
    }

    pub fn f_sysrot(&mut self) {
        generic_rot(&mut self.system);
    }

    pub fn f_sysrrot(&mut self) {
        generic_rrot(&mut self.system);
    }

    pub fn f_sysover(&mut self) {
        generic_over(&mut self.system);
    }

    pub fn f_sysnth(&mut self) {
        if let Some(n) = self.user.pop() {
            let n = self.as_integer(&n);
            if let Some(v) = generic_nth(&self.system, n) {
                self.user.push(v);
            }
        }
    }

    /// move ( -- a ): pop the system stack, push the value on the user stack.
    pub fn f_move(&mut self) {
        if let Some(v) = self.system.pop() {
            self.user.push(v);
        }
    }

    /// sysmove ( a -- ): pop the user stack, push the value on the system stack.
    pub fn f_sysmove(&mut self) {
        if let Some(v) = self.user.pop() {
            self.system.push(v);
        }
    }
}

pub fn register(dict: &mut Dictionary) {
    dict.insert_builtin("dup", Vm::f_dup, 0, "dup ( a -- a a )");
    dict.insert_builtin("pop", Vm::f_pop, 0, "pop ( a -- )");
    dict.insert_builtin("swap", Vm::f_swap, 0, "swap ( a b -- b a )");
    dict.insert_builtin("rot", Vm::f_rot, 0, "rot ( a b c -- b c a )");
    dict.insert_builtin("rrot", Vm::f_rrot, 0, "rrot ( a b c -- c a b )");
    dict.insert_builtin("over", Vm::f_over, 0, "over ( a b -- a b a )");
    dict.insert_builtin("nth", Vm::f_nth, 0, "nth ( n -- a ) nth item from the top");
    dict.insert_builtin("size", Vm::f_size, 0, "size ( -- n ) depth of the user stack");
    dict.insert_builtin("empty", Vm::f_empty, 0, "empty ( -- flag )");
    dict.insert_builtin("sysdup", Vm::f_sysdup, 0, "sysdup, system-stack dup");
    dict.insert_builtin("syspop", Vm::f_syspop, 0, "syspop, discard system-stack top");
    dict.insert_builtin("sysswap", Vm::f_sysswap, 0, "sysswap, system-stack swap");
    dict.insert_builtin("sysrot", Vm::f_sysrot, 0, "sysrot, system-stack rot");
    dict.insert_builtin("sysrrot", Vm::f_sysrrot, 0, "sysrrot, system-stack rrot");
    dict.insert_builtin("sysover", Vm::f_sysover, 0, "sysover, system-stack over");
    dict.insert_builtin("sysnth", Vm::f_sysnth, 0, "sysnth, nth item on the system stack");
    dict.insert_builtin("move", Vm::f_move, 0, "move ( -- a ) pop system, push user");
    dict.insert_builtin("sysmove", Vm::f_sysmove, 0, "sysmove ( a -- ) pop user, push system");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_exchanges_top_two() {
        let mut s = vec![Value::Integer(1), Value::Integer(2)];
        generic_swap(&mut s);
        assert_eq!(s, vec![Value::Integer(2), Value::Integer(1)]);
    }

    #[test]
    fn rot_moves_third_to_top() {
        let mut s = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
        generic_rot(&mut s);
        assert_eq!(s, vec![Value::Integer(2), Value::Integer(3), Value::Integer(1)]);
    }

    #[test]
    fn rrot_moves_top_to_third() {
        let mut s = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
        generic_rrot(&mut s);
        assert_eq!(s, vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn underflow_is_a_silent_no_op() {
        let mut s = vec![Value::Integer(1)];
        generic_swap(&mut s);
        assert_eq!(s, vec![Value::Integer(1)]);
    }

    #[test]
    fn move_transfers_system_to_user() {
        let mut vm = Vm::new();
        vm.system.push(Value::Integer(9));
        vm.f_move();
        assert_eq!(vm.user, vec![Value::Integer(9)]);
        assert!(vm.system.is_empty());
    }
}
