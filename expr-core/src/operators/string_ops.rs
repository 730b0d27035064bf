use std::fmt::Write as _;

use arcstr::ArcStr;
use expr_value::{Value, ValueType};

use crate::error::Result;

use super::{Arity, Operator};

/// Variadic string concatenation. Zero arguments yields `""`; any unknown
/// operand makes the whole result unknown.
#[derive(Debug)]
pub struct Concat;

impl Operator for Concat {
    fn name(&self) -> &'static str {
        "CONCAT"
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(0)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::String
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.iter().all(|t| *t == ValueType::String)
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        let mut out = String::new();
        for a in args {
            match a.as_str() {
                Some(s) => {
                    let _ = write!(out, "{s}");
                }
                None => return Ok(Value::Unknown),
            }
        }
        Ok(Value::String(ArcStr::from(out)))
    }
}

/// Unary string length. `unknown -> unknown`.
#[derive(Debug)]
pub struct StrLen;

impl Operator for StrLen {
    fn name(&self) -> &'static str {
        "STRLEN"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Integer
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.len() == 1 && arg_types[0] == ValueType::String
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        Ok(match args[0].as_str() {
            Some(s) => Value::Integer(s.chars().count() as i64),
            None => Value::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_with_no_arguments_is_empty_string() {
        let op = Concat;
        assert_eq!(op.apply(&[]).unwrap(), Value::String(ArcStr::from("")));
    }

    #[test]
    fn concat_is_unknown_if_any_argument_is_unknown() {
        let op = Concat;
        assert_eq!(op.apply(&[Value::String("a".into()), Value::Unknown]).unwrap(), Value::Unknown);
    }

    #[test]
    fn strlen_counts_characters() {
        let op = StrLen;
        assert_eq!(op.apply(&[Value::String("hello".into())]).unwrap(), Value::Integer(5));
    }
}
