use expr_value::{Value, ValueType};

use crate::error::Result;

use super::{Arity, Operator};

fn is_numeric(t: ValueType) -> bool {
    matches!(t, ValueType::Integer | ValueType::Real | ValueType::Date | ValueType::Duration)
}

/// Types `EQ`/`NE` accept: numeric (mixed-promoted), `String`, `Boolean`,
/// and the four internal closed enums.
fn eq_comparable(arg_types: &[ValueType]) -> bool {
    if arg_types.len() != 2 {
        return false;
    }
    let (a, b) = (arg_types[0], arg_types[1]);
    if is_numeric(a) && is_numeric(b) {
        return true;
    }
    a == b
        && matches!(
            a,
            ValueType::String
                | ValueType::Boolean
                | ValueType::NodeState
                | ValueType::NodeOutcome
                | ValueType::FailureType
                | ValueType::CommandHandle
        )
}

/// Types `LT`/`LE`/`GT`/`GE` accept: numeric (mixed-promoted) or `String`
/// (lexicographic).
fn ord_comparable(arg_types: &[ValueType]) -> bool {
    if arg_types.len() != 2 {
        return false;
    }
    let (a, b) = (arg_types[0], arg_types[1]);
    (is_numeric(a) && is_numeric(b)) || (a == ValueType::String && b == ValueType::String)
}

/// Three-valued order: `None` if either side is unknown; `Some(Ordering)`
/// for numeric (mixed-promoted) or lexicographic `String` comparison.
fn ord(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if !a.is_known() || !b.is_known() {
        return None;
    }
    match (a.as_numeric(), b.as_numeric()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => Some(x.cmp(y)),
            _ => None,
        },
    }
}

macro_rules! eq_op {
    ($name:ident, $op_name:literal, $result:expr) => {
        #[derive(Debug)]
        pub struct $name;

        impl Operator for $name {
            fn name(&self) -> &'static str {
                $op_name
            }

            fn arity(&self) -> Arity {
                Arity::Fixed(2)
            }

            fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
                ValueType::Boolean
            }

            fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
                eq_comparable(arg_types)
            }

            fn apply(&self, args: &[Value]) -> Result<Value> {
                let f: fn(Option<bool>) -> Option<bool> = $result;
                Ok(match f(args[0].semantic_eq(&args[1])) {
                    Some(b) => Value::Boolean(b),
                    None => Value::Unknown,
                })
            }
        }
    };
}

eq_op!(Eq, "EQ", |eq| eq);
eq_op!(Ne, "NE", |eq| eq.map(|b| !b));

macro_rules! ord_op {
    ($name:ident, $op_name:literal, $pred:expr) => {
        #[derive(Debug)]
        pub struct $name;

        impl Operator for $name {
            fn name(&self) -> &'static str {
                $op_name
            }

            fn arity(&self) -> Arity {
                Arity::Fixed(2)
            }

            fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
                ValueType::Boolean
            }

            fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
                ord_comparable(arg_types)
            }

            fn apply(&self, args: &[Value]) -> Result<Value> {
                let pred: fn(std::cmp::Ordering) -> bool = $pred;
                Ok(match ord(&args[0], &args[1]) {
                    Some(o) => Value::Boolean(pred(o)),
                    None => Value::Unknown,
                })
            }
        }
    };
}

ord_op!(Lt, "LT", |o| o == std::cmp::Ordering::Less);
ord_op!(Le, "LE", |o| o != std::cmp::Ordering::Greater);
ord_op!(Gt, "GT", |o| o == std::cmp::Ordering::Greater);
ord_op!(Ge, "GE", |o| o != std::cmp::Ordering::Less);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_promotes_numeric_types_across_integer_and_real() {
        let op = Eq;
        assert_eq!(op.apply(&[Value::Integer(2), Value::Real(2.0)]).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn eq_is_unknown_when_either_side_is_unknown() {
        let op = Eq;
        assert_eq!(op.apply(&[Value::Integer(2), Value::Unknown]).unwrap(), Value::Unknown);
    }

    #[test]
    fn lt_orders_strings_lexicographically() {
        let op = Lt;
        assert_eq!(
            op.apply(&[Value::String("abc".into()), Value::String("abd".into())]).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn ne_is_the_negation_of_eq_when_both_known() {
        let op = Ne;
        assert_eq!(op.apply(&[Value::Integer(1), Value::Integer(2)]).unwrap(), Value::Boolean(true));
    }
}
