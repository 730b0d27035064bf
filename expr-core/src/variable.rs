use arcstr::ArcStr;
use smallvec::SmallVec;

use expr_value::{Value, ValueType};

use crate::arena::{ExprId, Graph};
use crate::error::{PlanError, Result};
use crate::expr::{Assignable, Expression};

/// A mutable scalar variable: `Boolean`, `Integer`, `Real`, `String`,
/// `Date`, `Duration`, or one of the closed enum types.
#[derive(Debug)]
pub struct ScalarVariable {
    name: ArcStr,
    node: ArcStr,
    declared_type: ValueType,
    current: Value,
    initializer: Option<ExprId>,
    saved: Option<Value>,
}

impl ScalarVariable {
    pub fn new(name: ArcStr, node: ArcStr, declared_type: ValueType, initializer: Option<ExprId>) -> Self {
        Self { name, node, declared_type, current: Value::Unknown, initializer, saved: None }
    }

    fn type_mismatch(&self, found: ValueType) -> PlanError {
        PlanError::TypeCoercionFailure {
            node: self.node.clone(),
            name: self.name.clone(),
            class: self.expr_name(),
            expected: self.declared_type,
            found,
        }
    }
}

impl Expression for ScalarVariable {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn expr_name(&self) -> &'static str {
        "ScalarVariable"
    }

    fn value_type(&self) -> ValueType {
        self.declared_type
    }

    fn as_assignable(&self) -> Option<&dyn Assignable> {
        Some(self)
    }

    fn as_assignable_mut(&mut self) -> Option<&mut dyn Assignable> {
        Some(self)
    }

    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        self.initializer.into_iter().collect()
    }

    fn handle_activate(&mut self, graph: &mut Graph) {
        if let Some(init) = self.initializer {
            graph.activate(init);
            if let Ok(v) = graph.read(init) {
                self.current = v;
            }
        }
    }

    fn handle_deactivate(&mut self, graph: &mut Graph) {
        self.saved = None;
        if let Some(init) = self.initializer {
            let _ = graph.deactivate(init);
        }
    }

    fn read(&self, _graph: &Graph) -> Result<Value> {
        Ok(self.current.clone())
    }
}

impl Assignable for ScalarVariable {
    fn set_value(&mut self, _graph: &mut Graph, value: Value) -> Result<bool> {
        if value.is_known() && value.value_type() != self.declared_type {
            return Err(self.type_mismatch(value.value_type()));
        }
        let changed = value != self.current;
        self.current = value;
        Ok(changed)
    }

    fn set_unknown_value(&mut self, _graph: &mut Graph) -> Result<bool> {
        let changed = self.current != Value::Unknown;
        self.current = Value::Unknown;
        Ok(changed)
    }

    fn save_current(&mut self, _graph: &mut Graph) {
        self.saved = Some(self.current.clone());
    }

    fn restore_saved(&mut self, _graph: &mut Graph) -> Result<bool> {
        let restored = self.saved.take().unwrap_or(Value::Unknown);
        let changed = restored != self.current;
        self.current = restored;
        Ok(changed)
    }

    fn saved_value(&self) -> Value {
        self.saved.clone().unwrap_or(Value::Unknown)
    }

    fn reset(&mut self) {
        self.current = Value::Unknown;
        self.saved = None;
    }
}

/// Reset a variable's current and saved slots to unknown. Legal only while
/// inactive.
pub fn reset(graph: &mut Graph, id: ExprId) -> Result<()> {
    if graph.is_active(id) {
        return Err(PlanError::Other {
            node: ArcStr::from("<unknown>"),
            name: graph.expr(id).map(|e| ArcStr::from(e.name())).unwrap_or_default(),
            class: "ScalarVariable",
            message: arcstr::literal!("reset called while active"),
        });
    }
    if let Some(mut expr) = graph.take_expr(id) {
        if let Some(var) = expr.as_assignable_mut() {
            var.reset();
        }
        graph.put_expr(id, expr);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::constant::Constant;

    #[test]
    fn set_publishes_only_on_change() {
        let mut graph = Graph::new();
        let id = graph.insert(Box::new(ScalarVariable::new(ArcStr::from("x"), ArcStr::from("n"), ValueType::Integer, None)), []);
        graph.activate(id);
        assert_eq!(graph.read(id).unwrap(), Value::Unknown);

        let changed = {
            let mut expr = graph.take_expr(id).unwrap();
            let r = expr.as_assignable_mut().unwrap().set_value(&mut graph, Value::Integer(3)).unwrap();
            graph.put_expr(id, expr);
            r
        };
        assert!(changed);
        assert_eq!(graph.read(id).unwrap(), Value::Integer(3));
    }

    #[test]
    fn save_restore_round_trips_through_unknown() {
        let mut graph = Graph::new();
        let id = graph.insert(Box::new(ScalarVariable::new(ArcStr::from("v"), ArcStr::from("n"), ValueType::String, None)), []);
        graph.activate(id);
        let mut expr = graph.take_expr(id).unwrap();
        {
            let a = expr.as_assignable_mut().unwrap();
            a.save_current(&mut graph);
            a.set_value(&mut graph, Value::String(arcstr::literal!("bad").into())).unwrap();
            a.restore_saved(&mut graph).unwrap();
        }
        graph.put_expr(id, expr);
        assert_eq!(graph.read(id).unwrap(), Value::Unknown);
    }

    #[test]
    fn initializer_sets_current_on_activation() {
        let mut graph = Graph::new();
        let init = graph.insert(Box::new(Constant::new(Value::Integer(42))), []);
        let id = graph.insert(
            Box::new(ScalarVariable::new(ArcStr::from("y"), ArcStr::from("n"), ValueType::Integer, Some(init))),
            [init],
        );
        graph.activate(id);
        assert_eq!(graph.read(id).unwrap(), Value::Integer(42));
    }

    proptest! {
        /// Testable property #3 (§8): for an active variable starting known
        /// at an arbitrary value, `save(); set(v'); restore()` always
        /// returns to the original value, for any pair of values.
        #[test]
        fn prop_save_restore_round_trips_through_an_arbitrary_intermediate_value(
            original in any::<i64>(),
            intermediate in any::<i64>(),
        ) {
            let mut graph = Graph::new();
            let id = graph.insert(
                Box::new(ScalarVariable::new(ArcStr::from("v"), ArcStr::from("n"), ValueType::Integer, None)),
                [],
            );
            graph.activate(id);
            graph.set(id, Value::Integer(original)).unwrap();
            graph.save_current(id).unwrap();
            graph.set(id, Value::Integer(intermediate)).unwrap();
            graph.restore_saved(id).unwrap();
            prop_assert_eq!(graph.read(id).unwrap(), Value::Integer(original));
        }
    }
}
