// Read source text a line at a time, from a file or from standard input.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::messages::Msg;

#[derive(Debug)]
pub enum FileMode {
    RW,
    RO,
    WO,
}

#[derive(Debug)]
pub enum FType {
    Stdin,
    File(File),
    BReader(BufReader<File>),
}

#[derive(Debug)]
pub struct FileHandle {
    pub source: FType,
    pub file_mode: FileMode,
    msg: Msg,
}

impl FileHandle {
    pub fn new_file(path: &Path, msg: Msg, mode: FileMode) -> Option<FileHandle> {
        match File::open(path) {
            Ok(file) => match mode {
                FileMode::RO => Some(FileHandle {
                    source: FType::BReader(BufReader::new(file)),
                    file_mode: FileMode::RO,
                    msg,
                }),
                FileMode::RW | FileMode::WO => Some(FileHandle {
                    source: FType::File(file),
                    file_mode: FileMode::RO,
                    msg,
                }),
            },
            Err(_) => {
                msg.error("FileHandle::new_file", "unable to open file", Some(path));
                None
            }
        }
    }

    pub fn stdin(msg: Msg) -> FileHandle {
        FileHandle {
            source: FType::Stdin,
            file_mode: FileMode::RO,
            msg,
        }
    }

    /// Reads one line of text, blocking on stdin. `None` at EOF or on error.
    pub fn get_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let result = match &mut self.source {
            FType::Stdin => {
                let _ = io::stdout().flush();
                io::stdin().read_line(&mut line)
            }
            FType::BReader(br) => br.read_line(&mut line),
            FType::File(_) => return None,
        };
        match result {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(e) => {
                self.msg.error("get_line", "read_line error", Some(e.to_string()));
                None
            }
        }
    }

    /// Reads the whole remaining contents at once, used for non-interactive
    /// `-f file` execution.
    pub fn read_to_string(&mut self) -> Option<String> {
        let mut buf = String::new();
        let result = match &mut self.source {
            FType::BReader(br) => br.read_to_string(&mut buf),
            FType::File(f) => f.read_to_string(&mut buf),
            FType::Stdin => return None,
        };
        match result {
            Ok(_) => Some(buf),
            Err(e) => {
                self.msg.error("read_to_string", "read error", Some(e.to_string()));
                None
            }
        }
    }

    pub fn read_char(&self) -> Option<char> {
        let mut buf = [0u8; 1];
        match io::stdin().lock().read(&mut buf) {
            Ok(n) if n > 0 => Some(buf[0] as char),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_error_and_returns_none() {
        let msg = Msg::new();
        let handle = FileHandle::new_file(Path::new("/no/such/file.fifth"), msg, FileMode::RO);
        assert!(handle.is_none());
    }
}
