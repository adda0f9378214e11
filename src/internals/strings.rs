// String-only builtins: length, splitting into characters, and output.

use crate::dictionary::Dictionary;
use crate::value::Value;
use crate::vm::Vm;

impl Vm {
    /// `len ( s -- n )`: character count for a String, byte count is never
    /// used since all string handling here is Unicode-scalar based.
    pub fn f_len(&mut self) {
        if let Some(v) = self.user.pop() {
            let s = self.as_string(&v);
            self.user.push(Value::Integer(s.chars().count() as i64));
        }
    }

    /// `explode ( s -- c1 .. cn n )`: pushes every character as a
    /// one-character String, then the count.
    pub fn f_explode(&mut self) {
        if let Some(v) = self.user.pop() {
            let s = self.as_string(&v);
            let mut count = 0i64;
            for ch in s.chars() {
                self.user.push(Value::Str(ch.to_string()));
                count += 1;
            }
            self.user.push(Value::Integer(count));
        }
    }

    /// `ch ( s n -- c )`: the nth character (0-based) of a string, or an
    /// empty string if out of range.
    pub fn f_ch(&mut self) {
        if self.user.len() < 2 {
            return;
        }
        let n = self.user.pop().unwrap();
        let s = self.user.pop().unwrap();
        let n = self.as_integer(&n);
        let s = self.as_string(&s);
        let ch = if n >= 0 {
            s.chars().nth(n as usize)
        } else {
            None
        };
        self.user.push(Value::Str(ch.map(|c| c.to_string()).unwrap_or_default()));
    }

    /// `print ( a -- )`: writes the `asString` rendering with no trailing
    /// newline.
    pub fn f_print(&mut self) {
        if let Some(v) = self.user.pop() {
            print!("{}", self.as_string(&v));
        }
    }
}

pub fn register(dict: &mut Dictionary) {
    dict.insert_builtin("len", Vm::f_len, 0, "len ( s -- n )");
    dict.insert_builtin("explode", Vm::f_explode, 0, "explode ( s -- c1 .. cn n )");
    dict.insert_builtin("ch", Vm::f_ch, 0, "ch ( s n -- c )");
    dict.insert_builtin("print", Vm::f_print, 0, "print ( a -- )");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_characters() {
        let mut vm = Vm::new();
        vm.execute("'hello' len");
        assert_eq!(vm.user, vec![Value::Integer(5)]);
    }

    #[test]
    fn explode_pushes_each_character_then_count() {
        let mut vm = Vm::new();
        vm.execute("'this' explode");
        assert_eq!(
            vm.user,
            vec![
                Value::Str("t".to_string()),
                Value::Str("h".to_string()),
                Value::Str("i".to_string()),
                Value::Str("s".to_string()),
                Value::Integer(4),
            ]
        );
    }

    #[test]
    fn ch_reads_the_nth_character() {
        let mut vm = Vm::new();
        vm.execute("'abc' 1 ch");
        assert_eq!(vm.user, vec![Value::Str("b".to_string())]);
    }

    #[test]
    fn ch_out_of_range_pushes_empty_string() {
        let mut vm = Vm::new();
        vm.execute("'abc' 9 ch");
        assert_eq!(vm.user, vec![Value::Str(String::new())]);
    }
}
