// The name-to-target registry. Builtins and compiled words are dispatched
// through the same `Target` so the rest of the system never needs to care
// which kind of word it is calling.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::Block;
use crate::vm::Vm;

/// Runs during compilation, emitting into the open block, rather than being
/// compiled in as a `CALL`.
pub const IMMEDIATE: u8 = 0b01;
/// Valid only inside a `def`; silently skipped if reached at top level
/// outside compilation.
pub const COMPILE_ONLY: u8 = 0b10;

pub type BuiltinFn = fn(&mut Vm);

pub enum Target {
    Builtin(BuiltinFn),
    Compiled(Block),
}

pub struct DictEntry {
    pub name: String,
    pub target: Target,
    pub flags: u8,
    pub doc: &'static str,
}

impl DictEntry {
    pub fn is_immediate(&self) -> bool {
        self.flags & IMMEDIATE != 0
    }

    pub fn is_compile_only(&self) -> bool {
        self.flags & COMPILE_ONLY != 0
    }
}

/// A dictionary entry reached through `Rc` so that bytecode already compiled
/// against a word keeps calling the binding that existed at compile time,
/// even if the name is later redefined.
pub type WordRef = Rc<DictEntry>;

#[derive(Default)]
pub struct Dictionary {
    by_name: HashMap<String, WordRef>,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary {
            by_name: HashMap::new(),
        }
    }

    pub fn insert_builtin(&mut self, name: &str, code: BuiltinFn, flags: u8, doc: &'static str) {
        let entry = Rc::new(DictEntry {
            name: name.to_string(),
            target: Target::Builtin(code),
            flags,
            doc,
        });
        self.by_name.insert(name.to_string(), entry);
    }

    pub fn insert_compiled(&mut self, name: &str, block: Block, flags: u8) {
        let entry = Rc::new(DictEntry {
            name: name.to_string(),
            target: Target::Compiled(block),
            flags,
            doc: "",
        });
        self.by_name.insert(name.to_string(), entry);
    }

    pub fn get(&self, name: &str) -> Option<WordRef> {
        self.by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Names of currently-bound compiled (non-builtin) words, for
    /// `getCompiled()`.
    pub fn compiled_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_name
            .values()
            .filter(|e| matches!(e.target, Target::Compiled(_)))
            .map(|e| e.name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Block;

    fn noop(_vm: &mut Vm) {}

    #[test]
    fn insert_and_lookup_builtin() {
        let mut dict = Dictionary::new();
        dict.insert_builtin("+", noop, 0, "+ ( a b -- a+b )");
        let entry = dict.get("+").unwrap();
        assert_eq!(entry.name, "+");
        assert!(!entry.is_immediate());
    }

    #[test]
    fn redefinition_replaces_current_binding_but_not_old_references() {
        let mut dict = Dictionary::new();
        dict.insert_builtin("w", noop, 0, "");
        let old = dict.get("w").unwrap();
        dict.insert_compiled("w", Block::empty(1), 0);
        let new = dict.get("w").unwrap();
        assert!(!Rc::ptr_eq(&old, &new));
        assert!(matches!(old.target, Target::Builtin(_)));
        assert!(matches!(new.target, Target::Compiled(_)));
    }

    #[test]
    fn compiled_names_excludes_builtins() {
        let mut dict = Dictionary::new();
        dict.insert_builtin("+", noop, 0, "");
        dict.insert_compiled("square", Block::empty(1), 0);
        assert_eq!(dict.compiled_names(), vec!["square".to_string()]);
    }

    #[test]
    fn flags_round_trip() {
        let mut dict = Dictionary::new();
        dict.insert_builtin("then", noop, IMMEDIATE | COMPILE_ONLY, "");
        let entry = dict.get("then").unwrap();
        assert!(entry.is_immediate());
        assert!(entry.is_compile_only());
    }
}
