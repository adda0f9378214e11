// The virtual machine: dictionary, stacks, arenas, the tokenizer/executor
// core, and the programmatic debugger facade.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::{Block, BlockBuilder, Instr};
use crate::dictionary::{Dictionary, Target, WordRef};
use crate::messages::Msg;
use crate::value::{self, CellRef, Value};

use crate::internals::{arithmetic, compiler, control, debug as debug_words, infix, stackops, strings, variables};

pub struct DebugState {
    pub current: Option<WordRef>,
    pub pc: usize,
    pub frames: Vec<(WordRef, usize)>,
    pub breakpoints: Vec<(WordRef, usize)>,
}

impl DebugState {
    fn new() -> DebugState {
        DebugState {
            current: None,
            pc: 0,
            frames: Vec::new(),
            breakpoints: Vec::new(),
        }
    }
}

pub struct Vm {
    pub dictionary: Dictionary,
    pub arenas: Vec<Vec<Value>>,
    pub globals: HashMap<String, CellRef>,
    pub global_reverse: HashMap<CellRef, String>,
    pub user: Vec<Value>,
    pub system: Vec<Value>,
    pub input: Vec<char>,
    pub pos: usize,
    pub compiling: Option<BlockBuilder>,
    pub msg: Msg,
    pub debug: DebugState,
    pub exit_flag: bool,
}

impl Vm {
    pub fn new() -> Vm {
        let mut vm = Vm {
            dictionary: Dictionary::new(),
            arenas: vec![Vec::new()],
            globals: HashMap::new(),
            global_reverse: HashMap::new(),
            user: Vec::new(),
            system: Vec::new(),
            input: Vec::new(),
            pos: 0,
            compiling: None,
            msg: Msg::new(),
            debug: DebugState::new(),
            exit_flag: false,
        };
        vm.cold_start();
        vm
    }

    /// Registers every builtin word, the way the teacher's `compile_builtins`
    /// populates its dictionary at startup.
    fn cold_start(&mut self) {
        stackops::register(&mut self.dictionary);
        arithmetic::register(&mut self.dictionary);
        strings::register(&mut self.dictionary);
        variables::register(&mut self.dictionary);
        compiler::register(&mut self.dictionary);
        control::register(&mut self.dictionary);
        infix::register(&mut self.dictionary);
        debug_words::register(&mut self.dictionary);
    }

    // ---- value coercions, wired to this VM's cell storage ----

    pub fn get_cell(&self, r: CellRef) -> Option<Value> {
        self.arenas.get(r.arena as usize)?.get(r.offset as usize).cloned()
    }

    pub fn set_cell(&mut self, r: CellRef, v: Value) {
        if let Some(arena) = self.arenas.get_mut(r.arena as usize) {
            if let Some(slot) = arena.get_mut(r.offset as usize) {
                *slot = v;
            }
        }
    }

    pub fn as_integer(&self, v: &Value) -> i64 {
        value::as_integer(&|r| self.get_cell(r), v)
    }

    pub fn as_real(&self, v: &Value) -> f64 {
        value::as_real(&|r| self.get_cell(r), v)
    }

    pub fn as_string(&self, v: &Value) -> String {
        value::as_string(&|r| self.get_cell(r), v)
    }

    pub fn is_true(&self, v: &Value) -> bool {
        value::is_true(&|r| self.get_cell(r), v)
    }

    // ---- variable allocation ----

    pub fn is_compiling(&self) -> bool {
        self.compiling.is_some()
    }

    pub fn current_arena(&self) -> u32 {
        match &self.compiling {
            Some(b) => b.arena,
            None => 0,
        }
    }

    fn register_name(&mut self, arena: u32, name: &str, cref: CellRef) {
        if arena == 0 {
            self.globals.insert(name.to_string(), cref);
            self.global_reverse.insert(cref, name.to_string());
        } else if let Some(builder) = &mut self.compiling {
            builder.locals.insert(name.to_string(), cref);
            builder.reverse.insert(cref, name.to_string());
        }
    }

    /// `var NAME`: allocate a single cell in the current arena (globals if
    /// not compiling, the open block's locals otherwise).
    pub fn alloc_var(&mut self, name: &str) -> CellRef {
        let arena = self.current_arena();
        let offset = self.arenas[arena as usize].len() as u32;
        self.arenas[arena as usize].push(Value::Integer(0));
        let cref = CellRef { arena, offset };
        self.register_name(arena, name, cref);
        cref
    }

    /// `array NAME N`: allocate N contiguous cells, named by their first.
    pub fn alloc_array(&mut self, name: &str, n: i64) -> CellRef {
        let arena = self.current_arena();
        let offset = self.arenas[arena as usize].len() as u32;
        for _ in 0..n.max(0) {
            self.arenas[arena as usize].push(Value::Integer(0));
        }
        let cref = CellRef { arena, offset };
        self.register_name(arena, name, cref);
        cref
    }

    /// A name visible from wherever compilation currently stands: the open
    /// block's locals first, then globals.
    pub fn lookup_cell(&self, name: &str) -> Option<CellRef> {
        if let Some(builder) = &self.compiling {
            if let Some(c) = builder.locals.get(name) {
                return Some(*c);
            }
        }
        self.globals.get(name).copied()
    }

    // ---- tokenizer ----

    pub fn install_source(&mut self, text: &str) {
        self.input = text.chars().collect();
        self.pos = 0;
    }

    /// Consumes the next lexeme from the input buffer: a quoted string, an
    /// integer, a real, or a bare symbol. Returns `None` once the buffer is
    /// exhausted.
    pub fn tokenize(&mut self) -> Option<Value> {
        while self.pos < self.input.len() && self.input[self.pos].is_whitespace() {
            self.pos += 1;
        }
        if self.pos >= self.input.len() {
            return None;
        }
        let c = self.input[self.pos];
        if c == '\'' || c == '"' {
            return Some(self.tokenize_quoted(c));
        }
        let start = self.pos;
        while self.pos < self.input.len() && !self.input[self.pos].is_whitespace() {
            self.pos += 1;
        }
        let lexeme: String = self.input[start..self.pos].iter().collect();
        if let Ok(n) = lexeme.parse::<i64>() {
            return Some(Value::Integer(n));
        }
        if !lexeme.is_empty() && lexeme.chars().any(|ch| ch.is_ascii_digit()) {
            if let Ok(r) = lexeme.parse::<f64>() {
                return Some(Value::Real(r));
            }
        }
        Some(Value::Str(lexeme))
    }

    fn tokenize_quoted(&mut self, quote: char) -> Value {
        self.pos += 1;
        let mut s = String::new();
        let mut closed = false;
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            if ch == quote {
                closed = true;
                self.pos += 1;
                break;
            }
            if ch == '\\' && self.pos + 1 < self.input.len() {
                let esc = self.input[self.pos + 1];
                let mapped = match esc {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    '\\' => '\\',
                    other => other,
                };
                s.push(mapped);
                self.pos += 2;
                continue;
            }
            s.push(ch);
            self.pos += 1;
        }
        if closed {
            Value::Str(s)
        } else {
            // Marker for an unterminated string: the quote character
            // followed by the accumulated text.
            Value::Str(format!("{}{}", quote, s))
        }
    }

    // ---- top-level evaluator ----

    /// Evaluates a chunk of source at top level. Always returns `true`; the
    /// permissive-evaluator design reports no failure through this channel.
    pub fn execute(&mut self, source: &str) -> bool {
        self.install_source(source);
        loop {
            match self.tokenize() {
                None => break,
                Some(tok) => self.eval_top_level(tok),
            }
            if self.exit_flag {
                break;
            }
        }
        true
    }

    fn eval_top_level(&mut self, tok: Value) {
        if let Value::Str(s) = &tok {
            if let Some(entry) = self.dictionary.get(s) {
                if entry.is_compile_only() && !self.is_compiling() {
                    // Compile-time-only word reached outside compilation: the
                    // token is discarded, not executed and not left on the stack.
                    return;
                }
                self.exec_target(entry);
                return;
            }
            if let Some(cref) = self.globals.get(s).copied() {
                self.user.push(Value::Ptr(cref));
                return;
            }
            self.user.push(tok);
            return;
        }
        self.user.push(tok);
    }

    // ---- executor ----

    pub fn exec_target(&mut self, entry: WordRef) {
        match &entry.target {
            Target::Builtin(f) => f(self),
            Target::Compiled(block) => self.exec_block(block),
        }
    }

    fn exec_block(&mut self, block: &Block) {
        let mut pc: usize = 0;
        while pc < block.code.len() {
            let instr = &block.code[pc];
            if self.exec_one(instr, &mut pc) {
                return;
            }
            pc += 1;
        }
    }

    /// Runs a single instruction. `pc` is advanced in place for `JUMP`/
    /// `BRANCH`; the caller is responsible for the fetch-increment. Returns
    /// `true` if the instruction was `RETURN`.
    pub fn exec_one(&mut self, instr: &Instr, pc: &mut usize) -> bool {
        match instr {
            Instr::Nop => {}
            Instr::Push(v) => self.user.push(v.clone()),
            Instr::SysPush(v) => self.system.push(v.clone()),
            Instr::Pop => {
                self.user.pop();
            }
            Instr::SysPop => {
                self.system.pop();
            }
            Instr::Call(target) => self.exec_target(target.clone()),
            Instr::Jump(by) => {
                *pc = (*pc as i64 + *by as i64) as usize;
            }
            Instr::Branch(by) => {
                if let Some(v) = self.user.pop() {
                    if self.is_true(&v) {
                        *pc = (*pc as i64 + *by as i64) as usize;
                    }
                }
            }
            Instr::Return => return true,
        }
        false
    }

    // ---- debugger facade ----

    pub fn get_compiled(&self) -> Vec<String> {
        self.dictionary.compiled_names()
    }

    pub fn debug_target(&mut self, name: &str) -> Vec<String> {
        let entry = match self.dictionary.get(name) {
            Some(e) => e,
            None => {
                self.debug.current = None;
                self.debug.pc = 0;
                self.debug.frames.clear();
                return Vec::new();
            }
        };
        let lines = match &entry.target {
            Target::Compiled(block) => self.disassemble(block),
            Target::Builtin(_) => Vec::new(),
        };
        match &entry.target {
            Target::Compiled(_) => self.debug.current = Some(entry.clone()),
            Target::Builtin(_) => self.debug.current = None,
        }
        self.debug.pc = 0;
        self.debug.frames.clear();
        lines
    }

    fn debug_return(&mut self) {
        if let Some((word, pc)) = self.debug.frames.pop() {
            self.debug.current = Some(word);
            self.debug.pc = pc;
        } else {
            self.debug.current = None;
            self.debug.pc = 0;
        }
    }

    pub fn step_over(&mut self) {
        let current = match &self.debug.current {
            Some(c) => c.clone(),
            None => return,
        };
        let block = match &current.target {
            Target::Compiled(b) => b,
            Target::Builtin(_) => {
                self.debug.current = None;
                return;
            }
        };
        if self.debug.pc >= block.len() {
            self.debug_return();
            return;
        }
        let mut pc = self.debug.pc;
        let returned = {
            let instr = &block.code[pc];
            self.exec_one(instr, &mut pc)
        };
        if returned {
            self.debug_return();
        } else {
            self.debug.pc = pc + 1;
        }
    }

    pub fn step_into(&mut self) {
        let current = match &self.debug.current {
            Some(c) => c.clone(),
            None => return,
        };
        let block = match &current.target {
            Target::Compiled(b) => b,
            Target::Builtin(_) => {
                self.debug.current = None;
                return;
            }
        };
        if self.debug.pc >= block.len() {
            self.debug_return();
            return;
        }
        let pc = self.debug.pc;
        let instr = &block.code[pc];
        match instr {
            Instr::Call(target) => {
                let target = target.clone();
                match &target.target {
                    Target::Compiled(_) => {
                        self.debug.frames.push((current.clone(), pc + 1));
                        self.debug.current = Some(target);
                        self.debug.pc = 0;
                    }
                    Target::Builtin(f) => {
                        f(self);
                        self.debug.pc = pc + 1;
                    }
                }
            }
            Instr::Return => self.debug_return(),
            other => {
                let mut new_pc = pc;
                self.exec_one(other, &mut new_pc);
                self.debug.pc = new_pc + 1;
            }
        }
    }

    pub fn run(&mut self) {
        loop {
            if self.debug.current.is_none() || self.at_breakpoint() {
                break;
            }
            self.step_into();
        }
    }

    fn at_breakpoint(&self) -> bool {
        match &self.debug.current {
            None => false,
            Some(cur) => self
                .debug
                .breakpoints
                .iter()
                .any(|(w, p)| Rc::ptr_eq(w, cur) && *p == self.debug.pc),
        }
    }

    pub fn break_at(&mut self, pc: usize) {
        let current = match &self.debug.current {
            Some(c) => c.clone(),
            None => return,
        };
        if let Some(idx) = self
            .debug
            .breakpoints
            .iter()
            .position(|(w, p)| Rc::ptr_eq(w, &current) && *p == pc)
        {
            self.debug.breakpoints.remove(idx);
        } else {
            self.debug.breakpoints.push((current, pc));
        }
    }

    // ---- disassembly and stack snapshots ----

    pub fn render_value(&self, block: Option<&Block>, v: &Value) -> String {
        match v {
            Value::Integer(n) => n.to_string(),
            Value::Real(r) => r.to_string(),
            Value::Str(s) => format!("'{}'", s),
            Value::External(_) => "(x)".to_string(),
            Value::Ptr(c) => {
                if let Some(b) = block {
                    if let Some(name) = b.reverse.get(c) {
                        return format!("local:{}", name);
                    }
                }
                if let Some(name) = self.global_reverse.get(c) {
                    return format!("global:{}", name);
                }
                format!("*{}", c.encode())
            }
        }
    }

    pub fn disassemble(&self, block: &Block) -> Vec<String> {
        block
            .code
            .iter()
            .enumerate()
            .map(|(i, instr)| {
                let op = instr.opcode_name();
                match instr {
                    Instr::Push(v) | Instr::SysPush(v) => {
                        format!("{},{},{}", i, op, self.render_value(Some(block), v))
                    }
                    Instr::Call(t) => format!("{},{},{}", i, op, t.name),
                    Instr::Jump(by) | Instr::Branch(by) => format!("{},{},{}", i, op, by),
                    _ => format!("{},{}", i, op),
                }
            })
            .collect()
    }

    fn current_debug_block(&self) -> Option<&Block> {
        match &self.debug.current {
            Some(entry) => match &entry.target {
                Target::Compiled(b) => Some(b),
                Target::Builtin(_) => None,
            },
            None => None,
        }
    }

    pub fn user_snapshot(&self) -> Vec<String> {
        let block = self.current_debug_block();
        self.user.iter().map(|v| self.render_value(block, v)).collect()
    }

    pub fn system_snapshot(&self) -> Vec<String> {
        let block = self.current_debug_block();
        self.system.iter().map(|v| self.render_value(block, v)).collect()
    }

    pub fn global_vars(&self) -> Vec<String> {
        let mut names: Vec<&String> = self.globals.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|n| {
                let cell = self.globals[n];
                let v = self.get_cell(cell).unwrap_or(Value::Integer(0));
                format!("{}={}", n, self.render_value(None, &v))
            })
            .collect()
    }

    pub fn local_vars(&self) -> Vec<String> {
        match self.current_debug_block() {
            Some(block) => {
                let mut names: Vec<&String> = block.locals.keys().collect();
                names.sort();
                names
                    .into_iter()
                    .map(|n| {
                        let cell = block.locals[n];
                        let v = self.get_cell(cell).unwrap_or(Value::Integer(0));
                        format!("{}={}", n, self.render_value(Some(block), &v))
                    })
                    .collect()
            }
            None => Vec::new(),
        }
    }
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_round_trips_an_integer() {
        let mut vm = Vm::new();
        vm.execute("42");
        assert_eq!(vm.user_snapshot(), vec!["42".to_string()]);
    }

    #[test]
    fn tokenizer_round_trips_a_bare_symbol() {
        let mut vm = Vm::new();
        vm.execute("frobnicate");
        assert_eq!(vm.user_snapshot(), vec!["'frobnicate'".to_string()]);
    }

    #[test]
    fn swap_reorders_the_top_two() {
        let mut vm = Vm::new();
        vm.execute("1 2 swap");
        assert_eq!(vm.user_snapshot(), vec!["2".to_string(), "1".to_string()]);
    }

    #[test]
    fn infix_expression_computes_with_precedence() {
        let mut vm = Vm::new();
        vm.execute("( 1 + 2 * 3 )");
        assert_eq!(vm.user_snapshot(), vec!["7".to_string()]);
    }

    #[test]
    fn var_store_and_get_round_trip() {
        let mut vm = Vm::new();
        vm.execute("var t  t 12 <-  t get");
        assert_eq!(vm.user_snapshot(), vec!["12".to_string()]);
    }

    #[test]
    fn array_indexing_stores_and_loads_independent_cells() {
        let mut vm = Vm::new();
        vm.execute("array a 10  a 1 + 1 <-  a 2 + 2 <-  a 1 + get  a 2 + get");
        assert_eq!(vm.user_snapshot(), vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn compile_only_word_is_silently_skipped_at_top_level() {
        let mut vm = Vm::new();
        vm.execute("then");
        assert!(vm.user.is_empty());
    }

    #[test]
    fn unknown_word_is_left_as_a_string() {
        let mut vm = Vm::new();
        vm.execute("mystery");
        assert_eq!(vm.user_snapshot(), vec!["'mystery'".to_string()]);
    }

    #[test]
    fn stepping_a_word_to_completion_matches_calling_it_directly() {
        let mut direct = Vm::new();
        direct.execute("def square dup * end");
        direct.execute("6 square");

        let mut stepped = Vm::new();
        stepped.execute("def square dup * end");
        stepped.user.push(Value::Integer(6));
        stepped.debug_target("square");
        while stepped.debug.current.is_some() {
            stepped.step_into();
        }

        assert_eq!(direct.user, stepped.user);
    }
}
