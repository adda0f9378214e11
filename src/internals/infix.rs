// The infix expression compiler: `( ... )`, Dijkstra's shunting yard over a
// fixed precedence table. Works both while compiling (emitting bytecode) and
// at top level (evaluating immediately), mirroring every other control-flow
// immediate in this crate.

use crate::dictionary::{Dictionary, IMMEDIATE};
use crate::value::{CellRef, Value};
use crate::vm::Vm;

fn precedence(op: &str) -> u8 {
    match op {
        "and" | "or" | "nand" | "nor" | "xor" => 10,
        "<=" | "<" | "=" | "!=" | "<>" | ">" | ">=" => 20,
        "+" | "-" => 30,
        "*" | "/" | "%" => 40,
        "^" => 50,
        _ => 0,
    }
}

/// An operand not yet materialized into bytecode (or a live value): a plain
/// value/pointer pushed as-is, or a `*name` that still needs a `get`. The
/// dummy placeholder standing in for a previous operator's result already
/// sitting on the runtime stack is `Val(Value::Ptr(CellRef::NULL))`.
enum Operand {
    Val(Value),
    Deref(CellRef),
}

const DUMMY: Operand = Operand::Val(Value::Ptr(CellRef::NULL));

fn resolve_operand(vm: &mut Vm, s: &str) -> Operand {
    if let Some(rest) = s.strip_prefix('*') {
        match vm.lookup_cell(rest) {
            Some(cref) => Operand::Deref(cref),
            None => Operand::Val(Value::Integer(0)),
        }
    } else if let Some(cref) = vm.lookup_cell(s) {
        Operand::Val(Value::Ptr(cref))
    } else {
        Operand::Val(Value::Str(s.to_string()))
    }
}

/// Materializes one operand: emits it (while compiling) or pushes its live
/// value (while not). The dummy placeholder materializes to nothing in
/// either mode, since its value is already where it needs to be.
fn materialize(vm: &mut Vm, operand: Operand, compiling: bool) {
    match operand {
        Operand::Val(Value::Ptr(c)) if c.is_null() => {}
        Operand::Val(v) => {
            if compiling {
                if let Some(b) = vm.compiling.as_mut() {
                    b.emit_push(v);
                }
            } else {
                vm.user.push(v);
            }
        }
        Operand::Deref(c) => {
            if compiling {
                if let Some(b) = vm.compiling.as_mut() {
                    b.emit_push(Value::Ptr(c));
                }
                if let Some(get_entry) = vm.dictionary.get("get") {
                    if let Some(b) = vm.compiling.as_mut() {
                        b.emit_call(get_entry);
                    }
                }
            } else {
                let value = vm.get_cell(c).unwrap_or(Value::Integer(0));
                vm.user.push(value);
            }
        }
    }
}

fn apply(vm: &mut Vm, op: &str, operands: &mut Vec<Operand>) {
    if operands.len() < 2 {
        return;
    }
    let right = operands.pop().unwrap();
    let left = operands.pop().unwrap();
    let entry = match vm.dictionary.get(op) {
        Some(e) => e,
        None => return,
    };
    let compiling = vm.is_compiling();
    materialize(vm, left, compiling);
    materialize(vm, right, compiling);
    if compiling {
        if let Some(b) = vm.compiling.as_mut() {
            b.emit_call(entry);
        }
        operands.push(DUMMY);
    } else {
        vm.exec_target(entry);
        let result = vm.user.pop().unwrap_or(Value::Integer(0));
        operands.push(Operand::Val(result));
    }
}

fn finalize(vm: &mut Vm, operands: &mut Vec<Operand>) {
    if let Some(operand) = operands.pop() {
        let compiling = vm.is_compiling();
        materialize(vm, operand, compiling);
    }
}

/// `( ... )`: reads tokens until the matching `)`, applying operators by
/// precedence as it goes. `[` is the sentinel marking the bottom of this
/// expression's (locally held, not VM-shared) operator stack.
pub fn f_open_paren(vm: &mut Vm) {
    let mut operators: Vec<String> = vec!["[".to_string()];
    let mut operands: Vec<Operand> = Vec::new();
    loop {
        let tok = match vm.tokenize() {
            Some(t) => t,
            None => return,
        };
        if let Value::Str(s) = &tok {
            match s.as_str() {
                ")" => loop {
                    match operators.pop() {
                        Some(op) if op == "(" => break,
                        Some(op) if op == "[" => {
                            finalize(vm, &mut operands);
                            return;
                        }
                        Some(op) => apply(vm, &op, &mut operands),
                        None => {
                            finalize(vm, &mut operands);
                            return;
                        }
                    }
                },
                "(" => operators.push("(".to_string()),
                _ if precedence(s) > 0 => {
                    while let Some(top) = operators.last() {
                        if top == "(" || top == "[" {
                            break;
                        }
                        if precedence(top) >= precedence(s) {
                            let op = operators.pop().unwrap();
                            apply(vm, &op, &mut operands);
                        } else {
                            break;
                        }
                    }
                    operators.push(s.clone());
                }
                _ => operands.push(resolve_operand(vm, s)),
            }
            continue;
        }
        operands.push(Operand::Val(tok));
    }
}

pub fn register(dict: &mut Dictionary) {
    dict.insert_builtin("(", f_open_paren, IMMEDIATE, "( expr ), infix expression");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_orders_multiplication_before_addition() {
        let mut vm = Vm::new();
        vm.execute("( 1 + 2 * 3 )");
        assert_eq!(vm.user, vec![Value::Integer(7)]);
    }

    #[test]
    fn parentheses_override_precedence() {
        let mut vm = Vm::new();
        vm.execute("( ( 1 + 2 ) * 3 )");
        assert_eq!(vm.user, vec![Value::Integer(9)]);
    }

    #[test]
    fn dereference_prefix_reads_a_variables_value() {
        let mut vm = Vm::new();
        vm.execute("var x  x 4 <-  ( *x + 1 )");
        assert_eq!(vm.user, vec![Value::Integer(5)]);
    }

    #[test]
    fn plain_name_is_used_as_a_pointer_not_a_value() {
        let mut vm = Vm::new();
        vm.execute("array a 10  a 1 + 99 <-  ( a + 1 ) get");
        assert_eq!(vm.user, vec![Value::Integer(99)]);
    }

    #[test]
    fn infix_expression_compiles_inside_a_def() {
        let mut vm = Vm::new();
        vm.execute("def sq1  var t  t ->  ( *t * *t + 1 )  end");
        vm.execute("5 sq1");
        assert_eq!(vm.user, vec![Value::Integer(26)]);
    }
}
