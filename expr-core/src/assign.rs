use arcstr::ArcStr;

use expr_value::Value;

use crate::arena::{ExprId, Graph};
use crate::error::{PlanError, Result};
use crate::expr::base_variable_of;

impl Graph {
    /// Assign a new value to an [`crate::expr::Assignable`] and publish a
    /// changed notification if it took effect. This is the entry point a
    /// host (a command's effect, an assignment node, a test) uses to mutate
    /// a variable; `Assignable::set_value` itself only reports whether the
    /// value changed; publishing is this crate's responsibility so that a
    /// direct call through `as_assignable_mut` (as array references and
    /// aliases make internally) can defer publishing to its own caller.
    pub fn set(&mut self, id: ExprId, value: Value) -> Result<()> {
        let mut expr = self.take_expr(id).ok_or_else(|| not_assignable(id))?;
        let result = match expr.as_assignable_mut() {
            Some(a) => a.set_value(self, value),
            None => Err(not_assignable(id)),
        };
        self.put_expr(id, expr);
        self.publish_if_changed(id, result)
    }

    pub fn set_unknown(&mut self, id: ExprId) -> Result<()> {
        let mut expr = self.take_expr(id).ok_or_else(|| not_assignable(id))?;
        let result = match expr.as_assignable_mut() {
            Some(a) => a.set_unknown_value(self),
            None => Err(not_assignable(id)),
        };
        self.put_expr(id, expr);
        self.publish_if_changed(id, result)
    }

    pub fn save_current(&mut self, id: ExprId) -> Result<()> {
        let mut expr = self.take_expr(id).ok_or_else(|| not_assignable(id))?;
        match expr.as_assignable_mut() {
            Some(a) => a.save_current(self),
            None => {
                self.put_expr(id, expr);
                return Err(not_assignable(id));
            }
        }
        self.put_expr(id, expr);
        Ok(())
    }

    pub fn restore_saved(&mut self, id: ExprId) -> Result<()> {
        let mut expr = self.take_expr(id).ok_or_else(|| not_assignable(id))?;
        let result = match expr.as_assignable_mut() {
            Some(a) => a.restore_saved(self),
            None => Err(not_assignable(id)),
        };
        self.put_expr(id, expr);
        self.publish_if_changed(id, result)
    }

    /// Publish on `id` itself — and, if `id` is a proxy (a `MutableArrayRef`
    /// or `InOutAlias`) over some other expression's storage, on the base
    /// variable it ultimately writes through as well. A write through a
    /// proxy mutates the base variable's value directly, so the base
    /// variable's own listeners (a second reference into the same array, a
    /// whole-array reader, a `SIZE`/`ALL_KNOWN` function over it) must be
    /// told too, not just whatever happens to be listening on the proxy.
    fn publish_if_changed(&mut self, id: ExprId, result: Result<bool>) -> Result<()> {
        match result {
            Ok(true) => {
                self.publish_changed(id);
                let base = base_variable_of(self, id);
                if base != id {
                    self.publish_changed(base);
                }
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn not_assignable(id: ExprId) -> PlanError {
    PlanError::NotAssignable {
        node: ArcStr::from("<unknown>"),
        name: ArcStr::from(format!("{id}")),
        class: "expression",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::ScalarVariable;
    use expr_value::ValueType;

    #[test]
    fn set_publishes_a_change_to_listeners() {
        let mut graph = Graph::new();
        let id = graph.insert(
            Box::new(ScalarVariable::new(ArcStr::from("v"), ArcStr::from("n"), ValueType::Integer, None)),
            [],
        );
        graph.activate(id);
        graph.set(id, Value::Integer(5)).unwrap();
        assert_eq!(graph.read(id).unwrap(), Value::Integer(5));
    }

    #[test]
    fn save_restore_round_trip_preserves_known_value() {
        let mut graph = Graph::new();
        let id = graph.insert(
            Box::new(ScalarVariable::new(ArcStr::from("v"), ArcStr::from("n"), ValueType::String, None)),
            [],
        );
        graph.activate(id);
        graph.set(id, Value::String(arcstr::literal!("ok").into())).unwrap();
        graph.save_current(id).unwrap();
        graph.set(id, Value::String(arcstr::literal!("bad").into())).unwrap();
        graph.restore_saved(id).unwrap();
        assert_eq!(graph.read(id).unwrap(), Value::String(arcstr::literal!("ok").into()));
    }
}
