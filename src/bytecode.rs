// The compiled-word bytecode: a small opcode set, a closed `Block` that the
// executor runs, and a `BlockBuilder` that the compiler emits into while a
// `def ... end` is open.

use std::collections::HashMap;

use crate::dictionary::WordRef;
use crate::value::{CellRef, Value};

#[derive(Clone)]
pub enum Instr {
    Nop,
    Push(Value),
    SysPush(Value),
    Pop,
    SysPop,
    Call(WordRef),
    Jump(i32),
    Branch(i32),
    Return,
}

impl Instr {
    pub fn opcode_name(&self) -> &'static str {
        match self {
            Instr::Nop => "NOP",
            Instr::Push(_) => "PUSH",
            Instr::SysPush(_) => "SYSPUSH",
            Instr::Pop => "POP",
            Instr::SysPop => "SYSPOP",
            Instr::Call(_) => "CALL",
            Instr::Jump(_) => "JUMP",
            Instr::Branch(_) => "BRANCH",
            Instr::Return => "RETURN",
        }
    }
}

/// A closed, immutable compiled word: bytecode plus the locals it owns.
pub struct Block {
    pub code: Vec<Instr>,
    pub arena: u32,
    pub locals: HashMap<String, CellRef>,
    pub reverse: HashMap<CellRef, String>,
}

impl Block {
    pub fn empty(arena: u32) -> Block {
        Block {
            code: Vec::new(),
            arena,
            locals: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// The block currently under construction inside `def ... end`. Owns the
/// same kind of local/reverse maps a closed `Block` does; closing it moves
/// those fields into a `Block`.
pub struct BlockBuilder {
    pub code: Vec<Instr>,
    pub arena: u32,
    pub locals: HashMap<String, CellRef>,
    pub reverse: HashMap<CellRef, String>,
}

impl BlockBuilder {
    pub fn new(arena: u32) -> BlockBuilder {
        BlockBuilder {
            code: Vec::new(),
            arena,
            locals: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    pub fn here(&self) -> usize {
        self.code.len()
    }

    fn emit(&mut self, instr: Instr) -> usize {
        let at = self.code.len();
        self.code.push(instr);
        at
    }

    pub fn emit_push(&mut self, v: Value) -> usize {
        self.emit(Instr::Push(v))
    }

    pub fn emit_syspush(&mut self, v: Value) -> usize {
        self.emit(Instr::SysPush(v))
    }

    pub fn emit_pop(&mut self) -> usize {
        self.emit(Instr::Pop)
    }

    pub fn emit_syspop(&mut self) -> usize {
        self.emit(Instr::SysPop)
    }

    pub fn emit_call(&mut self, target: WordRef) -> usize {
        self.emit(Instr::Call(target))
    }

    pub fn emit_jump(&mut self, by: i32) -> usize {
        self.emit(Instr::Jump(by))
    }

    pub fn emit_branch(&mut self, by: i32) -> usize {
        self.emit(Instr::Branch(by))
    }

    pub fn emit_return(&mut self) -> usize {
        self.emit(Instr::Return)
    }

    /// Patch a previously-emitted `Jump`/`Branch` at `at` so its
    /// displacement, added to `at` and then advanced by one (the executor's
    /// fetch-increment), lands on `target`.
    pub fn patch_to(&mut self, at: usize, target: usize) {
        let displacement = target as i32 - at as i32 - 1;
        match &mut self.code[at] {
            Instr::Jump(by) | Instr::Branch(by) => *by = displacement,
            _ => {}
        }
    }

    pub fn close(self) -> Block {
        Block {
            code: self.code,
            arena: self.arena,
            locals: self.locals,
            reverse: self.reverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_to_computes_relative_to_next_displacement() {
        let mut b = BlockBuilder::new(0);
        b.emit_push(Value::Integer(1));
        let jump_at = b.emit_jump(0);
        b.emit_push(Value::Integer(2));
        let target = b.here();
        b.patch_to(jump_at, target);
        match b.code[jump_at] {
            Instr::Jump(by) => assert_eq!(jump_at as i32 + by + 1, target as i32),
            _ => panic!("expected jump"),
        }
    }

    #[test]
    fn empty_block_has_no_instructions() {
        let block = Block::empty(0);
        assert_eq!(block.len(), 0);
        assert!(block.is_empty());
    }
}
