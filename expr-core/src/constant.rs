use std::sync::OnceLock;

use expr_value::{Value, ValueType};

use crate::arena::Graph;
use crate::expr::Expression;

/// An immutable, always-active-equivalent expression. `Graph::read` answers
/// a constant's value regardless of its activation count (see §4.2);
/// `is_propagation_source` is false since a value that never changes has
/// nothing to tell a listener that activation order doesn't already imply.
///
/// `declared_type` is tracked separately from `value` so that an
/// unknown-valued constant still reports its declared type (§4.2: constants
/// are typed even when unknown) rather than `ValueType::Unknown`.
#[derive(Debug, Clone)]
pub struct Constant {
    value: Value,
    declared_type: ValueType,
}

impl Constant {
    pub fn new(value: Value) -> Self {
        let declared_type = value.value_type();
        Self { value, declared_type }
    }

    pub fn unknown(ty: ValueType) -> Self {
        Self { value: Value::Unknown, declared_type: ty }
    }

    /// The canonical `true` Boolean constant singleton.
    pub fn boolean_true() -> &'static Constant {
        static TRUE: OnceLock<Constant> = OnceLock::new();
        TRUE.get_or_init(|| Constant::new(Value::Boolean(true)))
    }

    /// The canonical `false` Boolean constant singleton.
    pub fn boolean_false() -> &'static Constant {
        static FALSE: OnceLock<Constant> = OnceLock::new();
        FALSE.get_or_init(|| Constant::new(Value::Boolean(false)))
    }

    /// The canonical unknown-Boolean constant singleton.
    pub fn boolean_unknown() -> &'static Constant {
        static UNKNOWN: OnceLock<Constant> = OnceLock::new();
        UNKNOWN.get_or_init(|| Constant::unknown(ValueType::Boolean))
    }
}

impl Expression for Constant {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn name(&self) -> &str {
        "(constant)"
    }

    fn expr_name(&self) -> &'static str {
        "Constant"
    }

    fn value_type(&self) -> ValueType {
        self.declared_type
    }

    fn is_constant(&self) -> bool {
        true
    }

    fn is_propagation_source(&self) -> bool {
        false
    }

    fn handle_activate(&mut self, _graph: &mut Graph) {}

    fn handle_deactivate(&mut self, _graph: &mut Graph) {}

    fn read(&self, _graph: &Graph) -> crate::error::Result<Value> {
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Graph;

    #[test]
    fn constant_reads_regardless_of_activation() {
        let mut graph = Graph::new();
        let id = graph.insert(Box::new(Constant::new(Value::Integer(7))), []);
        assert!(!graph.is_active(id));
        assert_eq!(graph.read(id).unwrap(), Value::Integer(7));
    }

    #[test]
    fn unknown_constant_reports_its_declared_type() {
        let c = Constant::unknown(ValueType::Integer);
        assert_eq!(c.value_type(), ValueType::Integer);
        assert_eq!(c.read(&Graph::new()).unwrap(), Value::Unknown);
    }

    #[test]
    fn boolean_singletons_are_stable_across_calls() {
        let a = Constant::boolean_true() as *const Constant;
        let b = Constant::boolean_true() as *const Constant;
        assert_eq!(a, b);
    }
}
