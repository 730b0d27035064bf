use expr_value::{Value, ValueType};

use crate::error::{PlanError, Result};

use super::{Arity, Operator};

fn is_numeric(t: ValueType) -> bool {
    matches!(t, ValueType::Integer | ValueType::Real | ValueType::Date | ValueType::Duration)
}

fn all_numeric(arg_types: &[ValueType]) -> bool {
    !arg_types.is_empty() && arg_types.iter().all(|t| is_numeric(*t))
}

/// Any `Real`/`Date`/`Duration` operand promotes the result to `Real`;
/// otherwise the result is `Integer`.
fn promote(arg_types: &[ValueType]) -> ValueType {
    if arg_types.iter().any(|t| matches!(t, ValueType::Real | ValueType::Date | ValueType::Duration)) {
        ValueType::Real
    } else {
        ValueType::Integer
    }
}

fn any_unknown(args: &[Value]) -> bool {
    args.iter().any(|a| !a.is_known())
}

fn is_any_real(args: &[Value]) -> bool {
    args.iter().any(|a| matches!(a, Value::Real(_) | Value::Date(_) | Value::Duration(_)))
}

macro_rules! variadic_numeric_op {
    ($(#[$meta:meta])* $name:ident, $op_name:literal, $fold_f:expr, $fold_i:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name;

        impl Operator for $name {
            fn name(&self) -> &'static str {
                $op_name
            }

            fn arity(&self) -> Arity {
                Arity::AtLeast(1)
            }

            fn result_type(&self, arg_types: &[ValueType]) -> ValueType {
                promote(arg_types)
            }

            fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
                all_numeric(arg_types)
            }

            fn apply(&self, args: &[Value]) -> Result<Value> {
                if any_unknown(args) {
                    return Ok(Value::Unknown);
                }
                if is_any_real(args) {
                    let f: fn(f64, f64) -> f64 = $fold_f;
                    let mut acc: Option<f64> = None;
                    for a in args {
                        let v = a.as_numeric().expect("checked known+numeric above");
                        acc = Some(match acc {
                            None => v,
                            Some(prev) => f(prev, v),
                        });
                    }
                    Ok(Value::Real(acc.expect("arity >= 1")))
                } else {
                    let g: fn(i64, i64) -> Option<i64> = $fold_i;
                    let mut acc: i64 = 0;
                    let mut first = true;
                    for a in args {
                        let v = a.as_i64().expect("checked known+integer above");
                        acc = if first {
                            v
                        } else {
                            g(acc, v).ok_or(PlanError::IntegerOverflow { class: $op_name })?
                        };
                        first = false;
                    }
                    Ok(Value::Integer(acc))
                }
            }
        }
    };
}

variadic_numeric_op!(
    /// Variadic sum.
    Add, "ADD", |a, b| a + b, |a: i64, b: i64| a.checked_add(b)
);
variadic_numeric_op!(
    /// Variadic left-fold subtraction: `a0 - a1 - a2 - ...`.
    Sub, "SUB", |a, b| a - b, |a: i64, b: i64| a.checked_sub(b)
);
variadic_numeric_op!(
    /// Variadic product.
    Mul, "MUL", |a, b| a * b, |a: i64, b: i64| a.checked_mul(b)
);
variadic_numeric_op!(
    /// Variadic maximum.
    Max, "MAX", |a: f64, b: f64| a.max(b), |a: i64, b: i64| Some(a.max(b))
);
variadic_numeric_op!(
    /// Variadic minimum.
    Min, "MIN", |a: f64, b: f64| a.min(b), |a: i64, b: i64| Some(a.min(b))
);

/// Binary division. `DIV by zero -> unknown`, not fatal (§4.7).
#[derive(Debug)]
pub struct Div;

impl Operator for Div {
    fn name(&self) -> &'static str {
        "DIV"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn result_type(&self, arg_types: &[ValueType]) -> ValueType {
        promote(arg_types)
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        all_numeric(arg_types) && arg_types.len() == 2
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        if any_unknown(args) {
            return Ok(Value::Unknown);
        }
        if is_any_real(args) {
            let a = args[0].as_numeric().unwrap();
            let b = args[1].as_numeric().unwrap();
            if b == 0.0 {
                return Ok(Value::Unknown);
            }
            Ok(Value::Real(a / b))
        } else {
            let a = args[0].as_i64().unwrap();
            let b = args[1].as_i64().unwrap();
            if b == 0 {
                return Ok(Value::Unknown);
            }
            a.checked_div(b).map(Value::Integer).map_or(Ok(Value::Unknown), Ok)
        }
    }
}

/// Binary modulo. `MOD by zero -> unknown`, not fatal (§4.7).
#[derive(Debug)]
pub struct Mod;

impl Operator for Mod {
    fn name(&self) -> &'static str {
        "MOD"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }

    fn result_type(&self, arg_types: &[ValueType]) -> ValueType {
        promote(arg_types)
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        all_numeric(arg_types) && arg_types.len() == 2
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        if any_unknown(args) {
            return Ok(Value::Unknown);
        }
        if is_any_real(args) {
            let a = args[0].as_numeric().unwrap();
            let b = args[1].as_numeric().unwrap();
            if b == 0.0 {
                return Ok(Value::Unknown);
            }
            Ok(Value::Real(a % b))
        } else {
            let a = args[0].as_i64().unwrap();
            let b = args[1].as_i64().unwrap();
            if b == 0 {
                return Ok(Value::Unknown);
            }
            a.checked_rem(b).map(Value::Integer).map_or(Ok(Value::Unknown), Ok)
        }
    }
}

macro_rules! unary_real_passthrough_op {
    ($(#[$meta:meta])* $name:ident, $op_name:literal, $f:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name;

        impl Operator for $name {
            fn name(&self) -> &'static str {
                $op_name
            }

            fn arity(&self) -> Arity {
                Arity::Fixed(1)
            }

            fn result_type(&self, arg_types: &[ValueType]) -> ValueType {
                promote(arg_types)
            }

            fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
                arg_types.len() == 1 && is_numeric(arg_types[0])
            }

            fn apply(&self, args: &[Value]) -> Result<Value> {
                match &args[0] {
                    Value::Unknown => Ok(Value::Unknown),
                    Value::Integer(i) => Ok(Value::Integer(*i)),
                    v => {
                        let f: fn(f64) -> f64 = $f;
                        Ok(Value::Real(f(v.as_numeric().expect("numeric checked by check_arg_types"))))
                    }
                }
            }
        }
    };
}

unary_real_passthrough_op!(
    /// Rounds toward positive infinity. An `Integer` operand passes through
    /// unchanged (it is already its own ceiling).
    Ceil, "CEIL", f64::ceil
);
unary_real_passthrough_op!(
    /// Rounds toward negative infinity.
    Floor, "FLOOR", f64::floor
);
unary_real_passthrough_op!(
    /// Rounds to the nearest integer value, ties away from zero.
    Round, "ROUND", f64::round
);
unary_real_passthrough_op!(
    /// Rounds toward zero.
    Trunc, "TRUNC", f64::trunc
);

/// Absolute value. Integer overflow only at `i64::MIN` (whose absolute
/// value does not fit in `i64`), surfaced as a `PlanError` rather than
/// silently wrapping.
#[derive(Debug)]
pub struct Abs;

impl Operator for Abs {
    fn name(&self) -> &'static str {
        "ABS"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, arg_types: &[ValueType]) -> ValueType {
        promote(arg_types)
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.len() == 1 && is_numeric(arg_types[0])
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        match &args[0] {
            Value::Unknown => Ok(Value::Unknown),
            Value::Integer(i) => {
                i.checked_abs().map(Value::Integer).ok_or(PlanError::IntegerOverflow { class: "ABS" })
            }
            v => Ok(Value::Real(v.as_numeric().expect("numeric checked by check_arg_types").abs())),
        }
    }
}

/// Square root. Always `Real`-typed, even of an `Integer` operand. Negative
/// operands are not a fatal condition here; they read as unknown.
#[derive(Debug)]
pub struct Sqrt;

impl Operator for Sqrt {
    fn name(&self) -> &'static str {
        "SQRT"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Real
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.len() == 1 && is_numeric(arg_types[0])
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        match args[0].as_numeric() {
            None => Ok(Value::Unknown),
            Some(v) if v < 0.0 => Ok(Value::Unknown),
            Some(v) => Ok(Value::Real(v.sqrt())),
        }
    }
}

/// Explicit `Real -> Integer` conversion, rounding to the nearest integer
/// (ties away from zero). A magnitude or non-finite value that cannot fit
/// in `i64` is a `PlanError` (§7's "type coercion failure").
#[derive(Debug)]
pub struct RealToInt;

impl Operator for RealToInt {
    fn name(&self) -> &'static str {
        "REAL_TO_INT"
    }

    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }

    fn result_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Integer
    }

    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool {
        arg_types.len() == 1 && is_numeric(arg_types[0])
    }

    fn apply(&self, args: &[Value]) -> Result<Value> {
        match args[0].as_numeric() {
            None => Ok(Value::Unknown),
            Some(v) => {
                let rounded = v.round();
                if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
                    return Err(PlanError::IntegerOverflow { class: "REAL_TO_INT" });
                }
                Ok(Value::Integer(rounded as i64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_promotes_to_real_if_any_operand_is_real() {
        let op = Add;
        assert_eq!(op.apply(&[Value::Integer(2), Value::Real(1.5)]).unwrap(), Value::Real(3.5));
        assert_eq!(op.apply(&[Value::Integer(2), Value::Integer(3)]).unwrap(), Value::Integer(5));
    }

    #[test]
    fn div_by_zero_is_unknown_not_an_error() {
        let op = Div;
        assert_eq!(op.apply(&[Value::Integer(4), Value::Integer(0)]).unwrap(), Value::Unknown);
        assert_eq!(op.apply(&[Value::Real(4.0), Value::Real(0.0)]).unwrap(), Value::Unknown);
    }

    #[test]
    fn any_unknown_operand_makes_the_whole_expression_unknown() {
        let op = Mul;
        assert_eq!(op.apply(&[Value::Integer(2), Value::Unknown]).unwrap(), Value::Unknown);
    }

    #[test]
    fn abs_of_i64_min_overflows() {
        let op = Abs;
        assert!(matches!(op.apply(&[Value::Integer(i64::MIN)]).unwrap_err(), PlanError::IntegerOverflow { .. }));
    }

    #[test]
    fn sqrt_of_negative_is_unknown() {
        let op = Sqrt;
        assert_eq!(op.apply(&[Value::Real(-4.0)]).unwrap(), Value::Unknown);
        assert_eq!(op.apply(&[Value::Integer(9)]).unwrap(), Value::Real(3.0));
    }

    #[test]
    fn real_to_int_rounds_and_detects_overflow() {
        let op = RealToInt;
        assert_eq!(op.apply(&[Value::Real(2.6)]).unwrap(), Value::Integer(3));
        assert!(matches!(op.apply(&[Value::Real(1e300)]).unwrap_err(), PlanError::IntegerOverflow { .. }));
    }
}
