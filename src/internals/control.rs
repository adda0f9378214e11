// Structured control flow: immediate, compile-only words that emit directly
// into the block currently open under `def`. Patch-slot bookkeeping during
// compilation rides on the VM's own system stack; it is distinct from the
// runtime `SYSPUSH`/`SYSPOP` bytecode these same words may also emit, which
// only runs later when the compiled word executes (see `f_for`/`f_each`).

use crate::dictionary::{Dictionary, COMPILE_ONLY, IMMEDIATE};
use crate::value::Value;
use crate::vm::Vm;

fn emit_call_named(vm: &mut Vm, name: &str) {
    if let Some(entry) = vm.dictionary.get(name) {
        if let Some(b) = vm.compiling.as_mut() {
            b.emit_call(entry);
        }
    }
}

impl Vm {
    /// `if`: a placeholder. The condition is whatever the preceding tokens
    /// left on the stack.
    pub fn f_if(&mut self) {}

    /// `then`: branch-past-jump idiom. Leaves the jump's patch slot on the
    /// compiler's system stack for `else`/`endif` to close.
    pub fn f_then(&mut self) {
        let jump_at = match self.compiling.as_mut() {
            Some(b) => {
                b.emit_branch(1);
                b.emit_jump(0)
            }
            None => return,
        };
        self.system.push(Value::Integer(jump_at as i64));
    }

    pub fn f_else(&mut self) {
        let prev_jump = match self.system.pop() {
            Some(v) => self.as_integer(&v) as usize,
            None => return,
        };
        let new_jump_at = match self.compiling.as_mut() {
            Some(b) => b.emit_jump(0),
            None => return,
        };
        let here = self.compiling.as_ref().unwrap().here();
        self.compiling.as_mut().unwrap().patch_to(prev_jump, here);
        self.system.push(Value::Integer(new_jump_at as i64));
    }

    pub fn f_endif(&mut self) {
        let pending = match self.system.pop() {
            Some(v) => self.as_integer(&v) as usize,
            None => return,
        };
        let here = match &self.compiling {
            Some(b) => b.here(),
            None => return,
        };
        self.compiling.as_mut().unwrap().patch_to(pending, here);
    }

    /// `while`: records the loop-head address for `done` to jump back to.
    pub fn f_while(&mut self) {
        let here = match &self.compiling {
            Some(b) => b.here(),
            None => return,
        };
        self.system.push(Value::Integer(here as i64));
    }

    pub fn f_do(&mut self) {
        let exit_at = match self.compiling.as_mut() {
            Some(b) => {
                b.emit_branch(1);
                b.emit_jump(0)
            }
            None => return,
        };
        self.system.push(Value::Integer(exit_at as i64));
    }

    pub fn f_done(&mut self) {
        if self.system.len() < 2 {
            return;
        }
        let exit_at = self.as_integer(&self.system.pop().unwrap()) as usize;
        let loop_head = self.as_integer(&self.system.pop().unwrap()) as usize;
        let b = match self.compiling.as_mut() {
            Some(b) => b,
            None => return,
        };
        let back_at = b.emit_jump(0);
        b.patch_to(back_at, loop_head);
        let here = b.here();
        b.patch_to(exit_at, here);
    }

    /// `for NAME`: allocates the loop variable, emits the default-step
    /// placeholder, and records (loop-var address, by-marker) for `by`/
    /// `each` to consume.
    pub fn f_for(&mut self) {
        let name = match self.tokenize() {
            Some(v) => self.as_string(&v),
            None => return,
        };
        let cref = self.alloc_var(&name);
        if let Some(b) = self.compiling.as_mut() {
            b.emit_syspush(Value::Integer(1));
        } else {
            return;
        }
        self.system.push(Value::Ptr(cref));
        self.system.push(Value::Integer(1));
    }

    /// `by`: discards the default-step placeholder at runtime and flips the
    /// compile-time marker so `each` knows an explicit step was compiled.
    pub fn f_by(&mut self) {
        if self.system.pop().is_none() {
            return;
        }
        if let Some(b) = self.compiling.as_mut() {
            b.emit_syspop();
        }
        self.system.push(Value::Integer(0));
    }

    /// `each`: emits the runtime bookkeeping that assembles (step, end) on
    /// the system stack and `start` into the loop variable, then the loop
    /// head and its exit test.
    pub fn f_each(&mut self) {
        let marker = match self.system.pop() {
            Some(v) => self.as_integer(&v),
            None => return,
        };
        let cref = match self.system.last().cloned() {
            Some(Value::Ptr(c)) => c,
            _ => return,
        };

        if marker == 1 {
            emit_call_named(self, "move");
        }
        emit_call_named(self, "sysmove");
        emit_call_named(self, "sysmove");

        if let Some(b) = self.compiling.as_mut() {
            b.emit_push(Value::Ptr(cref));
        }
        emit_call_named(self, "->");

        let loop_head = match &self.compiling {
            Some(b) => b.here(),
            None => return,
        };

        if let Some(b) = self.compiling.as_mut() {
            b.emit_push(Value::Ptr(cref));
        }
        emit_call_named(self, "get");
        emit_call_named(self, "forTest");

        let exit_at = match self.compiling.as_mut() {
            Some(b) => {
                b.emit_branch(1);
                b.emit_jump(0)
            }
            None => return,
        };

        self.system.push(Value::Integer(loop_head as i64));
        self.system.push(Value::Integer(exit_at as i64));
    }

    /// `next`: advances the loop variable by the step sitting on the
    /// (runtime) system stack, jumps back to the loop head, patches the
    /// exit jump, and discards (step, end) once the loop is done.
    pub fn f_next(&mut self) {
        if self.system.len() < 3 {
            return;
        }
        let exit_at = self.as_integer(&self.system.pop().unwrap()) as usize;
        let loop_head = self.as_integer(&self.system.pop().unwrap()) as usize;
        let cref = match self.system.pop().unwrap() {
            Value::Ptr(c) => c,
            _ => return,
        };

        if let Some(b) = self.compiling.as_mut() {
            b.emit_push(Value::Ptr(cref));
        }
        emit_call_named(self, "dup");
        emit_call_named(self, "get");
        if let Some(b) = self.compiling.as_mut() {
            b.emit_push(Value::Integer(1));
        }
        emit_call_named(self, "sysnth");
        emit_call_named(self, "+");
        emit_call_named(self, "swap");
        emit_call_named(self, "->");

        let back_at = match self.compiling.as_mut() {
            Some(b) => b.emit_jump(0),
            None => return,
        };
        self.compiling.as_mut().unwrap().patch_to(back_at, loop_head);

        let here = self.compiling.as_ref().unwrap().here();
        self.compiling.as_mut().unwrap().patch_to(exit_at, here);

        emit_call_named(self, "syspop");
        emit_call_named(self, "syspop");
    }

    /// `forTest ( var_value -- continue_flag )`: the runtime half of the
    /// for-loop exit test. Peeks (step, end) off the system stack (pushed
    /// there by `each`'s bookkeeping) and compares against the popped loop
    /// variable value, selecting `<=` or `>=` by the step's sign. A plain
    /// builtin rather than hand-emitted comparison bytecode, since the
    /// step's sign is only known at run time and `BuiltinFn` carries no
    /// closure state to thread a CellRef through inline instructions.
    pub fn f_for_test(&mut self) {
        let var_value = match self.user.pop() {
            Some(v) => v,
            None => return,
        };
        if self.system.len() < 2 {
            return;
        }
        let end = self.system[self.system.len() - 1].clone();
        let step = self.system[self.system.len() - 2].clone();
        let cur = self.as_integer(&var_value);
        let end_n = self.as_integer(&end);
        let step_n = self.as_integer(&step);
        let cont = if step_n >= 0 { cur <= end_n } else { cur >= end_n };
        self.user.push(Value::Integer(if cont { -1 } else { 0 }));
    }
}

pub fn register(dict: &mut Dictionary) {
    dict.insert_builtin("if", Vm::f_if, IMMEDIATE | COMPILE_ONLY, "if, no-op placeholder");
    dict.insert_builtin("then", Vm::f_then, IMMEDIATE | COMPILE_ONLY, "then, conditional branch");
    dict.insert_builtin("else", Vm::f_else, IMMEDIATE | COMPILE_ONLY, "else, alternate branch");
    dict.insert_builtin("endif", Vm::f_endif, IMMEDIATE | COMPILE_ONLY, "endif, closes if/then");
    dict.insert_builtin("while", Vm::f_while, IMMEDIATE | COMPILE_ONLY, "while, loop head");
    dict.insert_builtin("do", Vm::f_do, IMMEDIATE | COMPILE_ONLY, "do, loop exit test");
    dict.insert_builtin("done", Vm::f_done, IMMEDIATE | COMPILE_ONLY, "done, closes while/do");
    dict.insert_builtin("for", Vm::f_for, IMMEDIATE | COMPILE_ONLY, "for NAME, opens a counted loop");
    dict.insert_builtin("by", Vm::f_by, IMMEDIATE | COMPILE_ONLY, "by, sets an explicit step");
    dict.insert_builtin("each", Vm::f_each, IMMEDIATE | COMPILE_ONLY, "each, begins the loop body");
    dict.insert_builtin("next", Vm::f_next, IMMEDIATE | COMPILE_ONLY, "next, closes for/each");
    dict.insert_builtin("forTest", Vm::f_for_test, 0, "forTest ( v -- flag ), loop exit test");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn if_then_else_selects_a_branch() {
        let mut vm = Vm::new();
        vm.execute("def pick 1 then 111 else 222 endif end");
        vm.execute("pick");
        assert_eq!(vm.user, vec![Value::Integer(111)]);
    }

    #[test]
    fn if_then_without_else_falls_through_on_false() {
        let mut vm = Vm::new();
        vm.execute("def pick 0 then 111 endif 999 end");
        vm.execute("pick");
        assert_eq!(vm.user, vec![Value::Integer(999)]);
    }

    #[test]
    fn while_loop_counts_down_to_one() {
        let mut vm = Vm::new();
        vm.execute(
            "var n  def counter  n 10 <-  \
             while n get 0 > do  n get  n n get 1 - <-  done end",
        );
        vm.execute("counter");
        let collected: Vec<i64> = vm.user.iter().map(|v| vm.as_integer(v)).collect();
        assert_eq!(collected, vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
        assert!(vm.system.is_empty());
    }

    #[test]
    fn for_loop_runs_from_one_to_ten() {
        let mut vm = Vm::new();
        vm.execute("def count_up  for i 1 10 each  i get  next end");
        vm.execute("count_up");
        let collected: Vec<i64> = vm.user.iter().map(|v| vm.as_integer(v)).collect();
        assert_eq!(collected, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert!(vm.system.is_empty());
    }

    #[test]
    fn for_loop_with_explicit_step() {
        let mut vm = Vm::new();
        vm.execute("def evens  for i 1 10 by 2 each  i get  next end");
        vm.execute("evens");
        let collected: Vec<i64> = vm.user.iter().map(|v| vm.as_integer(v)).collect();
        assert_eq!(collected, vec![1, 3, 5, 7, 9]);
        assert!(vm.system.is_empty());
    }
}
