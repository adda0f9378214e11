// `dbg`, the one debugger-related word driven from inside running source; the
// rest of the debugger facade (step/run/breakpoints/disassembly) lives as
// plain `Vm` methods, driven from the REPL rather than from compiled bytecode.

use crate::dictionary::Dictionary;
use crate::messages::DebugLevel;
use crate::vm::Vm;

impl Vm {
    /// `dbg ( n -- )`: sets the message sink's level from a popped 0-3.
    pub fn f_dbg(&mut self) {
        if let Some(v) = self.user.pop() {
            let level = match self.as_integer(&v) {
                0 => DebugLevel::Error,
                1 => DebugLevel::Warning,
                2 => DebugLevel::Info,
                _ => DebugLevel::Debug,
            };
            self.msg.set_level(level);
        }
    }

    /// `bye ( -- )`: asks the REPL loop to stop after this line.
    pub fn f_bye(&mut self) {
        self.exit_flag = true;
    }
}

pub fn register(dict: &mut Dictionary) {
    dict.insert_builtin("dbg", Vm::f_dbg, 0, "dbg ( level -- ), sets the message threshold");
    dict.insert_builtin("bye", Vm::f_bye, 0, "bye ( -- ), exits the REPL");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::DebugLevel;

    #[test]
    fn dbg_sets_the_message_level() {
        let mut vm = Vm::new();
        vm.execute("2 dbg");
        assert_eq!(vm.msg.get_level(), DebugLevel::Info);
    }

    #[test]
    fn bye_sets_the_exit_flag() {
        let mut vm = Vm::new();
        vm.execute("bye");
        assert!(vm.exit_flag);
    }
}
