// fifth: a small concatenative language core, REPL front end.

mod bytecode;
mod config;
mod dictionary;
mod files;
mod internals;
mod messages;
mod value;
mod vm;

use std::path::Path;

use config::Config;
use files::FileHandle;
use vm::Vm;

fn main() {
    let mut config = Config::new();
    config.process_args();

    let mut vm = Vm::new();
    vm.msg.set_level(config.debug_level);

    if !config.no_library && !config.library_file.is_empty() {
        if let Some(mut handle) =
            FileHandle::new_file(Path::new(&config.library_file), vm.msg.clone(), files::FileMode::RO)
        {
            if let Some(text) = handle.read_to_string() {
                vm.execute(&text);
            }
        }
    }

    if !config.loaded_file.is_empty() {
        run_file(&mut vm, &config.loaded_file);
        return;
    }

    repl(&mut vm);
}

fn run_file(vm: &mut Vm, path: &str) {
    match FileHandle::new_file(Path::new(path), vm.msg.clone(), files::FileMode::RO) {
        Some(mut handle) => {
            if let Some(text) = handle.read_to_string() {
                vm.execute(&text);
            }
        }
        None => vm.msg.error("main", "unable to open source file", Some(path)),
    }
}

fn repl(vm: &mut Vm) {
    let mut input = FileHandle::stdin(vm.msg.clone());
    loop {
        print!("{} ok ", vm.user_snapshot().join(" "));
        match input.get_line() {
            Some(line) => vm.execute(&line),
            None => break,
        };
        if vm.exit_flag {
            break;
        }
    }
}
