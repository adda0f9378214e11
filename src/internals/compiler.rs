// `word`, and the `def ... end` compiler: the only place that opens a new
// arena and a `BlockBuilder`, consuming tokens directly rather than going
// through the top-level evaluator's dispatch.

use crate::bytecode::BlockBuilder;
use crate::dictionary::{Dictionary, COMPILE_ONLY};
use crate::value::Value;
use crate::vm::Vm;

impl Vm {
    /// `word ( -- token )`: reads the next lexeme and pushes it.
    pub fn f_word(&mut self) {
        if let Some(t) = self.tokenize() {
            self.user.push(t);
        }
    }

    /// `end`/`return` never run through normal dispatch; `f_def`'s own loop
    /// intercepts those names before a dictionary lookup happens. These
    /// bodies exist only so the words are real dictionary entries (visible
    /// to `get_compiled`-adjacent tooling, and silently skippable if typed
    /// at top level, like any other compile-only word).
    pub fn f_end_marker(&mut self) {}
    pub fn f_return_marker(&mut self) {}

    /// `def NAME ... end`: opens a fresh arena and block, then repeatedly
    /// tokenizes and either executes an immediate word (letting it emit into
    /// the open block itself), appends a `CALL`, appends a `PUSH` of a
    /// variable's address, or appends a `PUSH` of a literal value.
    pub fn f_def(&mut self) {
        let name = match self.tokenize() {
            Some(v) => self.as_string(&v),
            None => return,
        };
        let arena = self.arenas.len() as u32;
        self.arenas.push(Vec::new());
        let previous = self.compiling.take();
        self.compiling = Some(BlockBuilder::new(arena));

        loop {
            let tok = match self.tokenize() {
                Some(t) => t,
                None => {
                    // Input exhausted before `end`: discard the partial block.
                    self.compiling = previous;
                    self.arenas.pop();
                    return;
                }
            };
            if let Value::Str(s) = &tok {
                match s.as_str() {
                    "end" => {
                        self.compiling.as_mut().unwrap().emit_return();
                        let block = self.compiling.take().unwrap().close();
                        self.dictionary.insert_compiled(&name, block, 0);
                        self.compiling = previous;
                        return;
                    }
                    "return" => {
                        self.compiling.as_mut().unwrap().emit_return();
                        continue;
                    }
                    _ => {}
                }
                if let Some(entry) = self.dictionary.get(s) {
                    if entry.is_immediate() {
                        self.exec_target(entry);
                    } else {
                        self.compiling.as_mut().unwrap().emit_call(entry);
                    }
                    continue;
                }
                if let Some(cref) = self.lookup_cell(s) {
                    self.compiling.as_mut().unwrap().emit_push(Value::Ptr(cref));
                    continue;
                }
                self.compiling.as_mut().unwrap().emit_push(tok);
                continue;
            }
            self.compiling.as_mut().unwrap().emit_push(tok);
        }
    }
}

pub fn register(dict: &mut Dictionary) {
    dict.insert_builtin("word", Vm::f_word, 0, "word ( -- token ) reads the next lexeme");
    dict.insert_builtin("def", Vm::f_def, 0, "def NAME ... end, compiles a word");
    dict.insert_builtin("end", Vm::f_end_marker, COMPILE_ONLY, "end, closes a def");
    dict.insert_builtin("return", Vm::f_return_marker, COMPILE_ONLY, "return, early exit from a def");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn def_compiles_a_callable_word() {
        let mut vm = Vm::new();
        vm.execute("def square dup * end");
        vm.execute("5 square");
        assert_eq!(vm.user, vec![Value::Integer(25)]);
    }

    #[test]
    fn return_exits_early_but_keeps_compiling() {
        let mut vm = Vm::new();
        vm.execute("def early 1 return 2 end");
        vm.execute("early");
        assert_eq!(vm.user, vec![Value::Integer(1)]);
    }

    #[test]
    fn unterminated_def_discards_the_partial_block() {
        let mut vm = Vm::new();
        vm.execute("def broken 1 2 3");
        assert!(!vm.dictionary.contains("broken"));
    }

    #[test]
    fn word_reads_the_next_lexeme_onto_the_stack() {
        let mut vm = Vm::new();
        vm.execute("word hello");
        assert_eq!(vm.user, vec![Value::Str("hello".to_string())]);
    }

    #[test]
    fn variable_reference_inside_a_def_pushes_its_address() {
        let mut vm = Vm::new();
        vm.execute("var t");
        vm.execute("def setter t 7 <- end");
        vm.execute("setter  t get");
        assert_eq!(vm.user, vec![Value::Integer(7)]);
    }
}
