// Command line configuration.

use argh::FromArgs;

use crate::messages::DebugLevel;

pub const VERSION: &str = "0.1.0";
pub const DEFAULT_LIBRARY: &str = "./corelib.fifth";

/// A small concatenative (Forth-derived) language core.
#[derive(FromArgs)]
struct RawArgs {
    /// debug level: error, warning, info, debug
    #[argh(option, default = "String::from(\"error\")")]
    debug_level: String,

    /// a prelude source file to load before the session starts
    #[argh(option, short = 'l', default = "String::from(DEFAULT_LIBRARY)")]
    library: String,

    /// a source file to run non-interactively
    #[argh(option, short = 'f', default = "String::new()")]
    file: String,

    /// skip loading the prelude library
    #[argh(switch, short = 'n')]
    no_library: bool,
}

pub struct Config {
    pub debug_level: DebugLevel,
    pub loaded_file: String,
    pub library_file: String,
    pub no_library: bool,
}

impl Config {
    pub fn new() -> Config {
        Config {
            debug_level: DebugLevel::Error,
            loaded_file: String::new(),
            library_file: DEFAULT_LIBRARY.to_string(),
            no_library: false,
        }
    }

    /// Parses `std::env::args`, consistent with how the rest of the system
    /// avoids silent failure only at the process boundary: a malformed flag
    /// exits through argh's own usage-error path rather than the VM's
    /// permissive no-op model.
    pub fn process_args(&mut self) -> &Config {
        let raw: RawArgs = argh::from_env();
        self.debug_level = match raw.debug_level.as_str() {
            "debug" => DebugLevel::Debug,
            "info" => DebugLevel::Info,
            "warning" => DebugLevel::Warning,
            _ => DebugLevel::Error,
        };
        self.library_file = raw.library;
        self.no_library = raw.no_library;
        self.loaded_file = raw.file;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
