use expr_value::{Value, ValueType};

use crate::error::Result;

use super::{Arity, Operator};

fn all_boolean(arg_types: &[ValueType]) -> bool {
    arg_types.iter().all(|t| *t == ValueType::Boolean)
}

/// Unary boolean negation. `unknown -> unknown`.
#[derive(Debug)]
pub struct Not;

impl Operator for Not {
    fn name(&self) -> &'static str {
        "NOT"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        all_boolean(arg_types)
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        Ok(match args[0].as_bool() {
            Some(b) => Value::Boolean(!b),
            None => Value::Unknown,
        })
    }
}

/// Variadic AND: known-false if any argument is known-false, *even in the
/// presence of unknown arguments*; otherwise unknown if any argument is
/// unknown; otherwise true. Rejects zero arguments at construction (§9 open
/// question).
#[derive(Debug)]
pub struct And;

impl Operator for And {
    fn name(&self) -> &'static str {
        "AND"
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        all_boolean(arg_types)
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        let mut any_unknown = false;
        for a in args {
            match a.as_bool() {
                Some(false) => return Ok(Value::Boolean(false)),
                Some(true) => {}
                None => any_unknown = true,
            }
        }
        Ok(if any_unknown { Value::Unknown } else { Value::Boolean(true) })
    }
}

/// Variadic OR, the dual of [`And`]: known-true short-circuits even past
/// unknowns; otherwise unknown if any argument is unknown; otherwise false.
#[derive(Debug)]
pub struct Or;

impl Operator for Or {
    fn name(&self) -> &'static str {
        "OR"
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        all_boolean(arg_types)
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        let mut any_unknown = false;
        for a in args {
            match a.as_bool() {
                Some(true) => return Ok(Value::Boolean(true)),
                Some(false) => {}
                None => any_unknown = true,
            }
        }
        Ok(if any_unknown { Value::Unknown } else { Value::Boolean(false) })
    }
}

/// Binary exclusive-or. Any unknown operand makes the result unknown (no
/// short-circuit, unlike `AND`/`OR`).
#[derive(Debug)]
pub struct Xor;

impl Operator for Xor {
    fn name(&self) -> &'static str {
        "XOR"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        all_boolean(arg_types)
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        Ok(match (args[0].as_bool(), args[1].as_bool()) {
            (Some(a), Some(b)) => Value::Boolean(a != b),
            _ => Value::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_is_false_when_any_arg_is_false_even_with_unknowns_present() {
        let op = And;
        let args = [Value::Boolean(true), Value::Unknown, Value::Boolean(false)];
        assert_eq!(op.apply(&args).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn and_is_unknown_when_no_false_but_some_unknown() {
        let op = And;
        let args = [Value::Boolean(true), Value::Unknown];
        assert_eq!(op.apply(&args).unwrap(), Value::Unknown);
    }

    #[test]
    fn or_is_true_when_any_arg_is_true_even_with_unknowns_present() {
        let op = Or;
        let args = [Value::Boolean(false), Value::Unknown, Value::Boolean(true)];
        assert_eq!(op.apply(&args).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn xor_is_unknown_if_either_side_is_unknown() {
        let op = Xor;
        assert_eq!(op.apply(&[Value::Boolean(true), Value::Unknown]).unwrap(), Value::Unknown);
        assert_eq!(op.apply(&[Value::Boolean(true), Value::Boolean(false)]).unwrap(), Value::Boolean(true));
    }
}
