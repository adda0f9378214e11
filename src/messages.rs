// A leveled diagnostics sink. Nothing in the VM panics or writes to stderr
// directly; every error, warning, or trace goes through `Msg`.

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Error,
    Warning,
    Info,
    Debug,
}

#[derive(Clone, Debug)]
pub struct Msg {
    level: DebugLevel,
}

impl Msg {
    pub fn new() -> Msg {
        Msg {
            level: DebugLevel::Error,
        }
    }

    pub fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    pub fn get_level(&self) -> DebugLevel {
        self.level
    }

    pub fn error<T: std::fmt::Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        self.emit(DebugLevel::Error, caller, text, detail);
    }

    pub fn warning<T: std::fmt::Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        self.emit(DebugLevel::Warning, caller, text, detail);
    }

    pub fn info<T: std::fmt::Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        self.emit(DebugLevel::Info, caller, text, detail);
    }

    pub fn debug<T: std::fmt::Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        self.emit(DebugLevel::Debug, caller, text, detail);
    }

    fn emit<T: std::fmt::Debug>(&self, level: DebugLevel, caller: &str, text: &str, detail: Option<T>) {
        if level > self.level {
            return;
        }
        match detail {
            Some(d) => eprintln!("[{:?}] {}: {} ({:?})", level, caller, text, d),
            None => eprintln!("[{:?}] {}: {}", level, caller, text),
        }
    }
}

impl Default for Msg {
    fn default() -> Msg {
        Msg::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_error() {
        let msg = Msg::new();
        assert_eq!(msg.get_level(), DebugLevel::Error);
    }

    #[test]
    fn levels_order_by_verbosity() {
        assert!(DebugLevel::Error < DebugLevel::Warning);
        assert!(DebugLevel::Warning < DebugLevel::Info);
        assert!(DebugLevel::Info < DebugLevel::Debug);
    }

    #[test]
    fn set_and_get_level_round_trips() {
        let mut msg = Msg::new();
        msg.set_level(DebugLevel::Debug);
        assert_eq!(msg.get_level(), DebugLevel::Debug);
    }
}
