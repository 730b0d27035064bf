use std::fmt;

use arcstr::ArcStr;

use crate::array::{AnyArray, Array};
use crate::enums::{CommandHandle, FailureType, NodeOutcome, NodeState};
use crate::error::ValueError;

/// The closed set of types a [`Value`] can carry. `Date` and `Duration` are
/// `Real` at the value level but distinguished here so typechecking can
/// tell them apart from a plain real number. `Array` is a wildcard used
/// only by operators that accept any element type (`SIZE`, `ALL_KNOWN`,
/// `ANY_KNOWN`); concrete values always carry one of the four
/// element-typed array variants instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Unknown,
    Boolean,
    Integer,
    Real,
    String,
    Date,
    Duration,
    NodeState,
    NodeOutcome,
    FailureType,
    CommandHandle,
    BooleanArray,
    IntegerArray,
    RealArray,
    StringArray,
    Array,
}

impl ValueType {
    pub fn is_array(self) -> bool {
        matches!(
            self,
            ValueType::Array
                | ValueType::BooleanArray
                | ValueType::IntegerArray
                | ValueType::RealArray
                | ValueType::StringArray
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Real | ValueType::Date | ValueType::Duration)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Unknown => "Unknown",
            ValueType::Boolean => "Boolean",
            ValueType::Integer => "Integer",
            ValueType::Real => "Real",
            ValueType::String => "String",
            ValueType::Date => "Date",
            ValueType::Duration => "Duration",
            ValueType::NodeState => "NodeState",
            ValueType::NodeOutcome => "NodeOutcome",
            ValueType::FailureType => "FailureType",
            ValueType::CommandHandle => "CommandHandle",
            ValueType::BooleanArray => "BooleanArray",
            ValueType::IntegerArray => "IntegerArray",
            ValueType::RealArray => "RealArray",
            ValueType::StringArray => "StringArray",
            ValueType::Array => "Array",
        };
        f.write_str(name)
    }
}

/// A typed value, or the distinguished unknown marker.
///
/// `PartialEq` on `Value` is bitwise equality (used for change detection):
/// two `Unknown`s are equal, and two knowns are equal iff same variant and
/// payload. For the three-valued comparison PLEXIL's `EQ`/`NE` operators
/// need — where comparing anything against an unknown yields unknown, not
/// `false` — use [`Value::semantic_eq`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unknown,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(ArcStr),
    Date(f64),
    Duration(f64),
    NodeState(NodeState),
    NodeOutcome(NodeOutcome),
    FailureType(FailureType),
    CommandHandle(CommandHandle),
    BooleanArray(Array<bool>),
    IntegerArray(Array<i64>),
    RealArray(Array<f64>),
    StringArray(Array<ArcStr>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Unknown => ValueType::Unknown,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Duration(_) => ValueType::Duration,
            Value::NodeState(_) => ValueType::NodeState,
            Value::NodeOutcome(_) => ValueType::NodeOutcome,
            Value::FailureType(_) => ValueType::FailureType,
            Value::CommandHandle(_) => ValueType::CommandHandle,
            Value::BooleanArray(_) => ValueType::BooleanArray,
            Value::IntegerArray(_) => ValueType::IntegerArray,
            Value::RealArray(_) => ValueType::RealArray,
            Value::StringArray(_) => ValueType::StringArray,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Value::Unknown)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric payload with `Integer`/`Real`/`Date`/`Duration` promoted to
    /// `f64`, the promotion the arithmetic and comparison operators use.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) | Value::Date(r) | Value::Duration(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_any_array(&self) -> Option<&dyn AnyArray> {
        match self {
            Value::BooleanArray(a) => Some(a),
            Value::IntegerArray(a) => Some(a),
            Value::RealArray(a) => Some(a),
            Value::StringArray(a) => Some(a),
            _ => None,
        }
    }

    /// Three-valued equality: `None` (unknown) if either side is unknown or
    /// the types are not semantically comparable; otherwise `Some(eq)`.
    pub fn semantic_eq(&self, other: &Value) -> Option<bool> {
        if !self.is_known() || !other.is_known() {
            return None;
        }
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
            (Value::String(a), Value::String(b)) => Some(a == b),
            (Value::NodeState(a), Value::NodeState(b)) => Some(a == b),
            (Value::NodeOutcome(a), Value::NodeOutcome(b)) => Some(a == b),
            (Value::FailureType(a), Value::FailureType(b)) => Some(a == b),
            (Value::CommandHandle(a), Value::CommandHandle(b)) => Some(a == b),
            _ => match (self.as_numeric(), other.as_numeric()) {
                (Some(a), Some(b)) => Some(a == b),
                _ => None,
            },
        }
    }

    /// Parse a literal of the given type from text, per the AST literal
    /// intake described for `Value` literals. Empty text always yields
    /// `Unknown`.
    pub fn parse(ty: ValueType, text: &str) -> Result<Value, ValueError> {
        if text.is_empty() {
            return Ok(Value::Unknown);
        }
        let fail = || ValueError::ParseFailure { ty, text: text.to_string() };
        match ty {
            ValueType::Unknown => Ok(Value::Unknown),
            ValueType::Boolean => match text {
                "true" | "TRUE" | "1" => Ok(Value::Boolean(true)),
                "false" | "FALSE" | "0" => Ok(Value::Boolean(false)),
                _ => Err(fail()),
            },
            ValueType::Integer => text.parse::<i64>().map(Value::Integer).map_err(|_| fail()),
            ValueType::Real => text.parse::<f64>().map(Value::Real).map_err(|_| fail()),
            ValueType::Date => text.parse::<f64>().map(Value::Date).map_err(|_| fail()),
            ValueType::Duration => text.parse::<f64>().map(Value::Duration).map_err(|_| fail()),
            ValueType::String => Ok(Value::String(ArcStr::from(text))),
            _ => Err(fail()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => write!(f, "UNKNOWN"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) | Value::Date(r) | Value::Duration(r) => write!(f, "{r}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::NodeState(v) => write!(f, "{v}"),
            Value::NodeOutcome(v) => write!(f, "{v}"),
            Value::FailureType(v) => write!(f, "{v}"),
            Value::CommandHandle(v) => write!(f, "{v}"),
            Value::BooleanArray(a) => write_array(f, a),
            Value::IntegerArray(a) => write_array(f, a),
            Value::RealArray(a) => write_array(f, a),
            Value::StringArray(a) => write_array(f, a),
        }
    }
}

fn write_array(f: &mut fmt::Formatter<'_>, a: &dyn AnyArray) -> fmt::Result {
    write!(f, "#(")?;
    for i in 0..a.size() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", a.element_value(i).expect("index within size"))?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_eq_is_unknown_when_either_side_unknown() {
        assert_eq!(Value::Unknown.semantic_eq(&Value::Unknown), None);
        assert_eq!(Value::Integer(1).semantic_eq(&Value::Unknown), None);
    }

    #[test]
    fn semantic_eq_promotes_numeric_types() {
        assert_eq!(Value::Integer(2).semantic_eq(&Value::Real(2.0)), Some(true));
        assert_eq!(Value::Date(1.0).semantic_eq(&Value::Duration(1.0)), Some(true));
    }

    #[test]
    fn bitwise_eq_treats_two_unknowns_as_equal() {
        assert_eq!(Value::Unknown, Value::Unknown);
        assert_ne!(Value::Integer(1), Value::Integer(2));
    }

    #[test]
    fn parse_empty_text_is_unknown_for_every_type() {
        assert_eq!(Value::parse(ValueType::Integer, "").unwrap(), Value::Unknown);
        assert_eq!(Value::parse(ValueType::String, "").unwrap(), Value::Unknown);
    }

    #[test]
    fn parse_rejects_malformed_text() {
        assert!(Value::parse(ValueType::Integer, "not-a-number").is_err());
    }
}
