use expr_value::{Value, ValueType};

use crate::error::Result;

use super::{Arity, Operator};

/// Unary: element count of an array-typed argument. An overall-unknown
/// array (the container itself, not merely some elements) has no size.
#[derive(Debug)]
pub struct Size;

impl Operator for Size {
    fn name(&self) -> &'static str {
        "SIZE"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Integer
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.len() == 1 && arg_types[0].is_array()
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        Ok(match args[0].as_any_array() {
            Some(a) => Value::Integer(a.size() as i64),
            None => Value::Unknown,
        })
    }
}

/// Unary: true iff every element of the array is known. An overall-unknown
/// array reads as unknown, not false.
#[derive(Debug)]
pub struct AllKnown;

impl Operator for AllKnown {
    fn name(&self) -> &'static str {
        "ALL_KNOWN"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.len() == 1 && arg_types[0].is_array()
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        Ok(match args[0].as_any_array() {
            Some(a) => Value::Boolean(a.all_known()),
            None => Value::Unknown,
        })
    }
}

/// Unary: true iff at least one element of the array is known.
#[derive(Debug)]
pub struct AnyKnown;

impl Operator for AnyKnown {
    fn name(&self) -> &'static str {
        "ANY_KNOWN"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.len() == 1 && arg_types[0].is_array()
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        Ok(match args[0].as_any_array() {
            Some(a) => Value::Boolean(a.any_known()),
            None => Value::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr_value::Array;

    #[test]
    fn size_of_known_array_is_its_element_count() {
        let op = Size;
        let v = Value::IntegerArray(Array::from_known_values([1, 2, 3]));
        assert_eq!(op.apply(&[v]).unwrap(), Value::Integer(3));
    }

    #[test]
    fn all_known_is_false_when_any_slot_is_unknown() {
        let op = AllKnown;
        let mut a: Array<i64> = Array::with_size(2);
        a.set(0, 1).unwrap();
        assert_eq!(op.apply(&[Value::IntegerArray(a)]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn size_of_an_overall_unknown_array_is_unknown() {
        let op = Size;
        assert_eq!(op.apply(&[Value::Unknown]).unwrap(), Value::Unknown);
    }
}
