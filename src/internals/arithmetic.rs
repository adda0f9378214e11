// Arithmetic and comparison builtins. Binary operators pop right, then left,
// and dispatch primarily on the left operand's tag, coercing the right
// operand to match (the "mixed" semantics called out per-operator below).

use crate::dictionary::Dictionary;
use crate::value::Value;
use crate::vm::Vm;

fn pop2(vm: &mut Vm) -> Option<(Value, Value)> {
    if vm.user.len() < 2 {
        return None;
    }
    let r = vm.user.pop().unwrap();
    let l = vm.user.pop().unwrap();
    Some((l, r))
}

fn round_half_up(x: f64) -> i64 {
    if x >= 0.0 {
        (x + 0.5).floor() as i64
    } else {
        -((-x + 0.5).floor() as i64)
    }
}

fn bool_value(b: bool) -> Value {
    Value::Integer(if b { -1 } else { 0 })
}

fn add_values(vm: &Vm, l: &Value, r: &Value) -> Value {
    match l {
        Value::Integer(a) => match r {
            Value::Integer(b) => Value::Integer(a + b),
            Value::Real(_) => Value::Integer(round_half_up(*a as f64 + vm.as_real(r))),
            _ => Value::Integer(a + vm.as_integer(r)),
        },
        Value::Real(a) => Value::Real(a + vm.as_real(r)),
        Value::Str(a) => match r {
            Value::Str(b) => Value::Str(format!("{}{}", a, b)),
            _ => Value::Str(format!("{}{}", a, vm.as_string(r))),
        },
        Value::Ptr(p) => Value::Ptr(p.offset_by(vm.as_integer(r))),
        Value::External(e) => {
            let _ = e.borrow_mut().send("+", r);
            Value::External(e.clone())
        }
    }
}

fn subtract_values(vm: &Vm, l: &Value, r: &Value) -> Value {
    match l {
        Value::Integer(a) => match r {
            Value::Integer(b) => Value::Integer(a - b),
            Value::Real(_) => Value::Integer(round_half_up(*a as f64 - vm.as_real(r))),
            _ => Value::Integer(a - vm.as_integer(r)),
        },
        Value::Real(a) => Value::Real(a - vm.as_real(r)),
        Value::Str(a) => match r {
            Value::Integer(n) => {
                let n = (*n).max(0) as usize;
                let len = a.chars().count();
                let keep = len.saturating_sub(n);
                Value::Str(a.chars().take(keep).collect())
            }
            Value::Str(b) => {
                if let Some(pos) = a.find(b.as_str()) {
                    let mut s = a.clone();
                    s.replace_range(pos..pos + b.len(), "");
                    Value::Str(s)
                } else {
                    Value::Str(a.clone())
                }
            }
            _ => Value::Str(a.clone()),
        },
        Value::Ptr(p) => Value::Ptr(p.offset_by(-vm.as_integer(r))),
        Value::External(e) => {
            let _ = e.borrow_mut().send("-", r);
            Value::External(e.clone())
        }
    }
}

fn multiply_values(vm: &Vm, l: &Value, r: &Value) -> Value {
    match l {
        Value::Integer(a) => match r {
            Value::Integer(b) => Value::Integer(a * b),
            Value::Real(_) => Value::Integer(round_half_up(*a as f64 * vm.as_real(r))),
            _ => Value::Integer(a * vm.as_integer(r)),
        },
        Value::Real(a) => Value::Real(a * vm.as_real(r)),
        Value::Str(a) => match r {
            Value::Integer(n) => Value::Str(a.repeat((*n).max(0) as usize)),
            Value::Real(f) => {
                let whole = f.trunc().max(0.0) as usize;
                let frac = f.fract().abs();
                let len = a.chars().count();
                let prefix_len = ((len as f64) * frac).floor() as usize;
                let mut result = a.repeat(whole);
                result.push_str(&a.chars().take(prefix_len).collect::<String>());
                Value::Str(result)
            }
            _ => Value::Str(a.clone()),
        },
        Value::Ptr(_) => l.clone(),
        Value::External(e) => {
            let _ = e.borrow_mut().send("*", r);
            Value::External(e.clone())
        }
    }
}

fn divide_numeric(vm: &Vm, l: &Value, r: &Value) -> Value {
    match l {
        Value::Integer(a) => match r {
            Value::Integer(b) => {
                if *b == 0 {
                    Value::Integer(0)
                } else {
                    Value::Integer(a / b)
                }
            }
            _ => {
                let rv = vm.as_real(r);
                if rv == 0.0 {
                    Value::Integer(0)
                } else {
                    Value::Integer(round_half_up(*a as f64 / rv))
                }
            }
        },
        Value::Real(a) => {
            let rv = vm.as_real(r);
            if rv == 0.0 {
                Value::Real(0.0)
            } else {
                Value::Real(a / rv)
            }
        }
        Value::Ptr(p) => Value::Ptr(p.offset_by(-vm.as_integer(r))),
        _ => Value::Integer(0),
    }
}

/// `/`: numeric division for numbers; for strings, splits and pushes every
/// fragment followed by the fragment count, rather than a single result.
pub fn f_divide(vm: &mut Vm) {
    let (l, r) = match pop2(vm) {
        Some(x) => x,
        None => return,
    };
    match (&l, &r) {
        (Value::Str(s), Value::Str(sep)) => {
            if sep.is_empty() {
                vm.user.push(Value::Str(s.clone()));
                vm.user.push(Value::Integer(1));
            } else {
                let parts: Vec<&str> = s.split(sep.as_str()).collect();
                let count = parts.len();
                for p in parts {
                    vm.user.push(Value::Str(p.to_string()));
                }
                vm.user.push(Value::Integer(count as i64));
            }
        }
        (Value::Str(s), Value::Integer(n)) => {
            let width = (*n).max(1) as usize;
            let chars: Vec<char> = s.chars().collect();
            let mut count = 0i64;
            let mut i = 0;
            while i < chars.len() {
                let end = (i + width).min(chars.len());
                vm.user.push(Value::Str(chars[i..end].iter().collect()));
                count += 1;
                i = end;
            }
            if count == 0 {
                vm.user.push(Value::Str(String::new()));
                count = 1;
            }
            vm.user.push(Value::Integer(count));
        }
        (Value::Str(s), Value::Real(width)) => {
            let chars: Vec<char> = s.chars().collect();
            let step = width.abs().max(0.0001);
            let mut count = 0i64;
            let mut acc = 0.0f64;
            let mut cut = 0usize;
            while cut < chars.len() {
                acc += step;
                let next = (acc.floor() as usize).min(chars.len()).max(cut + 1);
                vm.user.push(Value::Str(chars[cut..next].iter().collect()));
                count += 1;
                cut = next;
            }
            vm.user.push(Value::Integer(count));
        }
        _ => {
            let result = divide_numeric(vm, &l, &r);
            vm.user.push(result);
        }
    }
}

/// `%`: Integer modulo; a Real operand coerces both sides to Real. Division
/// by zero yields -1 rather than crashing the VM.
pub fn f_modulo(vm: &mut Vm) {
    let (l, r) = match pop2(vm) {
        Some(x) => x,
        None => return,
    };
    let result = match (&l, &r) {
        (Value::Real(_), _) | (_, Value::Real(_)) => {
            let a = vm.as_real(&l);
            let b = vm.as_real(&r);
            if b == 0.0 {
                Value::Integer(-1)
            } else {
                Value::Real(a - b * (a / b).trunc())
            }
        }
        _ => {
            let a = vm.as_integer(&l);
            let b = vm.as_integer(&r);
            if b == 0 {
                Value::Integer(-1)
            } else {
                Value::Integer(a % b)
            }
        }
    };
    vm.user.push(result);
}

fn compare_eq(vm: &Vm, l: &Value, r: &Value) -> bool {
    match l {
        Value::Integer(a) => matches!(r, Value::Integer(b) if a == b),
        Value::Real(a) => matches!(r, Value::Real(b) if a == b),
        Value::Str(a) => matches!(r, Value::Str(b) if a == b),
        Value::Ptr(a) => matches!(r, Value::Ptr(b) if a == b),
        Value::External(e) => vm.is_true(&e.borrow_mut().send("=", r)),
    }
}

fn apply_ord(op: &str, ord: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match ord {
        None => false,
        Some(o) => match op {
            "<" => o == Less,
            "<=" => o == Less || o == Equal,
            ">" => o == Greater,
            ">=" => o == Greater || o == Equal,
            _ => false,
        },
    }
}

fn compare_order(vm: &Vm, l: &Value, r: &Value, op: &str) -> bool {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => apply_ord(op, a.partial_cmp(b)),
        (Value::Real(a), Value::Real(b)) => apply_ord(op, a.partial_cmp(b)),
        (Value::Str(a), Value::Str(b)) => apply_ord(op, a.partial_cmp(b)),
        (Value::External(e), _) => vm.is_true(&e.borrow_mut().send(op, r)),
        _ => false,
    }
}

macro_rules! binop {
    ($name:ident, $values_fn:expr) => {
        pub fn $name(vm: &mut Vm) {
            let (l, r) = match pop2(vm) {
                Some(x) => x,
                None => return,
            };
            let result = $values_fn(vm, &l, &r);
            vm.user.push(result);
        }
    };
}

binop!(f_plus, add_values);
binop!(f_minus, subtract_values);
binop!(f_times, multiply_values);

pub fn f_power(vm: &mut Vm) {
    let (l, r) = match pop2(vm) {
        Some(x) => x,
        None => return,
    };
    let a = vm.as_real(&l);
    let b = vm.as_real(&r);
    vm.user.push(Value::Real(a.powf(b)));
}

macro_rules! compare_op {
    ($name:ident, $op:expr) => {
        pub fn $name(vm: &mut Vm) {
            let (l, r) = match pop2(vm) {
                Some(x) => x,
                None => return,
            };
            let result = compare_order(vm, &l, &r, $op);
            vm.user.push(bool_value(result));
        }
    };
}

compare_op!(f_less, "<");
compare_op!(f_less_equal, "<=");
compare_op!(f_greater, ">");
compare_op!(f_greater_equal, ">=");

pub fn f_equal(vm: &mut Vm) {
    let (l, r) = match pop2(vm) {
        Some(x) => x,
        None => return,
    };
    let result = compare_eq(vm, &l, &r);
    vm.user.push(bool_value(result));
}

pub fn f_not_equal(vm: &mut Vm) {
    let (l, r) = match pop2(vm) {
        Some(x) => x,
        None => return,
    };
    let result = !compare_eq(vm, &l, &r);
    vm.user.push(bool_value(result));
}

macro_rules! logic_op {
    ($name:ident, $combine:expr) => {
        pub fn $name(vm: &mut Vm) {
            let (l, r) = match pop2(vm) {
                Some(x) => x,
                None => return,
            };
            let a = vm.is_true(&l);
            let b = vm.is_true(&r);
            vm.user.push(bool_value($combine(a, b)));
        }
    };
}

logic_op!(f_and, |a: bool, b: bool| a && b);
logic_op!(f_or, |a: bool, b: bool| a || b);
logic_op!(f_nand, |a: bool, b: bool| !(a && b));
logic_op!(f_nor, |a: bool, b: bool| !(a || b));
logic_op!(f_xor, |a: bool, b: bool| a != b);

pub fn register(dict: &mut Dictionary) {
    dict.insert_builtin("+", f_plus, 0, "+ ( a b -- a+b )");
    dict.insert_builtin("-", f_minus, 0, "- ( a b -- a-b )");
    dict.insert_builtin("*", f_times, 0, "* ( a b -- a*b )");
    dict.insert_builtin("/", f_divide, 0, "/ ( a b -- a/b )");
    dict.insert_builtin("%", f_modulo, 0, "% ( a b -- a%b )");
    dict.insert_builtin("^", f_power, 0, "^ ( a b -- a^b )");
    dict.insert_builtin("=", f_equal, 0, "= ( a b -- flag )");
    dict.insert_builtin("!=", f_not_equal, 0, "!= ( a b -- flag )");
    dict.insert_builtin("<>", f_not_equal, 0, "<> ( a b -- flag )");
    dict.insert_builtin("<", f_less, 0, "< ( a b -- flag )");
    dict.insert_builtin("<=", f_less_equal, 0, "<= ( a b -- flag )");
    dict.insert_builtin(">", f_greater, 0, "> ( a b -- flag )");
    dict.insert_builtin(">=", f_greater_equal, 0, ">= ( a b -- flag )");
    dict.insert_builtin("and", f_and, 0, "and ( a b -- flag )");
    dict.insert_builtin("or", f_or, 0, "or ( a b -- flag )");
    dict.insert_builtin("nand", f_nand, 0, "nand ( a b -- flag )");
    dict.insert_builtin("nor", f_nor, 0, "nor ( a b -- flag )");
    dict.insert_builtin("xor", f_xor, 0, "xor ( a b -- flag )");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition() {
        let mut vm = Vm::new();
        vm.execute("3 4 +");
        assert_eq!(vm.user, vec![Value::Integer(7)]);
    }

    #[test]
    fn string_concatenation() {
        let mut vm = Vm::new();
        vm.execute("'ab' 'cd' +");
        assert_eq!(vm.user, vec![Value::Str("abcd".to_string())]);
    }

    #[test]
    fn string_minus_integer_truncates_trailing_chars() {
        let mut vm = Vm::new();
        vm.execute("'hello' 2 -");
        assert_eq!(vm.user, vec![Value::Str("hel".to_string())]);
    }

    #[test]
    fn modulo_by_zero_yields_negative_one() {
        let mut vm = Vm::new();
        vm.execute("5 0 %");
        assert_eq!(vm.user, vec![Value::Integer(-1)]);
    }

    #[test]
    fn split_on_string_pushes_fragments_then_count() {
        let mut vm = Vm::new();
        vm.execute("'this,is,a,test' ',' /");
        assert_eq!(
            vm.user,
            vec![
                Value::Str("this".to_string()),
                Value::Str("is".to_string()),
                Value::Str("a".to_string()),
                Value::Str("test".to_string()),
                Value::Integer(4),
            ]
        );
    }

    #[test]
    fn underflow_on_binary_op_is_a_no_op() {
        let mut vm = Vm::new();
        vm.execute("5 +");
        assert_eq!(vm.user, vec![Value::Integer(5)]);
    }

    #[test]
    fn comparisons_use_forth_style_booleans() {
        let mut vm = Vm::new();
        vm.execute("3 4 <");
        assert_eq!(vm.user, vec![Value::Integer(-1)]);
        vm.user.clear();
        vm.execute("4 3 <");
        assert_eq!(vm.user, vec![Value::Integer(0)]);
    }
}
