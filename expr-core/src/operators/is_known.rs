use expr_value::{Value, ValueType};

use crate::error::Result;

use super::{Arity, Operator};

/// Unary: always known, regardless of its operand. Reports the operand's
/// own known-flag as a `Boolean` (§4.7, §8 testable property 7).
#[derive(Debug)]
pub struct IsKnown;

impl Operator for IsKnown {
    fn name(&self) -> &'static str {
        "IsKnown"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Boolean
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.len() == 1
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        Ok(Value::Boolean(args[0].is_known()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_known_never_itself_returns_unknown() {
        let op = IsKnown;
        assert_eq!(op.apply(&[Value::Unknown]).unwrap(), Value::Boolean(false));
        assert_eq!(op.apply(&[Value::Integer(1)]).unwrap(), Value::Boolean(true));
    }
}
