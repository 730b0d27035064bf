use arcstr::ArcStr;
use smallvec::SmallVec;

use expr_value::{Value, ValueType};

use crate::arena::{ExprId, Graph};
use crate::error::{ParserError, PlanError, Result};
use crate::expr::{base_variable_of, Assignable, Expression};

/// A read-only proxy that presents `target` under a different local name
/// (§4.6). It does not own `target`'s activation — the owner that wired this
/// alias into the graph must activate `target` independently — so when this
/// alias itself is inactive a read returns unknown even if `target` is
/// active and known.
#[derive(Debug)]
pub struct Alias {
    name: ArcStr,
    target: ExprId,
    value_type: ValueType,
    is_constant: bool,
}

impl Alias {
    /// Construct a read-only alias over `target`. Per the open-question
    /// decision in §9, wrapping an expression whose runtime value type would
    /// narrow under `declared_type` is rejected at construction rather than
    /// silently truncated at read time.
    pub fn new(
        name: ArcStr,
        target: ExprId,
        target_type: ValueType,
        target_is_constant: bool,
        declared_type: Option<ValueType>,
    ) -> std::result::Result<Self, ParserError> {
        if let Some(declared) = declared_type {
            if declared != target_type {
                return Err(ParserError::AliasNarrows {
                    name: name.clone(),
                    expected: declared,
                    found: target_type,
                });
            }
        }
        Ok(Self { name, target, value_type: target_type, is_constant: target_is_constant })
    }
}

impl Expression for Alias {
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
        "Alias"
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn is_constant(&self) -> bool {
        self.is_constant
    }

    /// An alias does not own `target`'s *lifecycle* — `handle_activate`/
    /// `handle_deactivate` below are overridden to no-ops so activating this
    /// alias never transitively activates what it wraps. But `target` is
    /// still listed here, because `Graph::insert`/`Graph::destroy` use
    /// `subexpressions()` to wire/unwire listener registration: without this,
    /// `target`'s changes would never reach this alias's own listeners, and
    /// §4.6's "re-publishes changes" would silently not happen.
    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        let mut v = SmallVec::new();
        v.push(self.target);
        v
    }

    fn handle_activate(&mut self, _graph: &mut Graph) {}

    fn handle_deactivate(&mut self, _graph: &mut Graph) {}

    fn read(&self, graph: &Graph) -> Result<Value> {
        graph.read(self.target)
    }

    fn on_source_changed(&mut self, _graph: &mut Graph, _source: ExprId) -> bool {
        true
    }
}

/// The writable counterpart: forwards reads the same way, but also exposes
/// `target`'s [`Assignable`] surface so the alias can be assigned through.
/// Still does not own `target`'s activation.
#[derive(Debug)]
pub struct InOutAlias {
    name: ArcStr,
    target: ExprId,
    value_type: ValueType,
    is_constant: bool,
}

impl InOutAlias {
    pub fn new(
        name: ArcStr,
        target: ExprId,
        target_type: ValueType,
        target_is_constant: bool,
        declared_type: Option<ValueType>,
    ) -> std::result::Result<Self, ParserError> {
        if let Some(declared) = declared_type {
            if declared != target_type {
                return Err(ParserError::AliasNarrows {
                    name: name.clone(),
                    expected: declared,
                    found: target_type,
                });
            }
        }
        Ok(Self { name, target, value_type: target_type, is_constant: target_is_constant })
    }

    fn not_assignable(&self) -> PlanError {
        PlanError::NotAssignable { node: arcstr::literal!("<alias>"), name: self.name.clone(), class: "InOutAlias" }
    }

    fn with_target_assignable_mut<R>(
        &self,
        graph: &mut Graph,
        f: impl FnOnce(&mut dyn Assignable, &mut Graph) -> Result<R>,
    ) -> Result<R> {
        let mut expr = graph.take_expr(self.target).ok_or_else(|| self.not_assignable())?;
        let result = match expr.as_assignable_mut() {
            Some(a) => f(a, graph),
            None => Err(self.not_assignable()),
        };
        graph.put_expr(self.target, expr);
        result
    }
}

impl Expression for InOutAlias {
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
        "InOutAlias"
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn is_constant(&self) -> bool {
        self.is_constant
    }

    fn as_assignable(&self) -> Option<&dyn Assignable> {
        Some(self)
    }

    fn as_assignable_mut(&mut self) -> Option<&mut dyn Assignable> {
        Some(self)
    }

    /// See the read-only `Alias::subexpressions` above: `target` is listed
    /// here purely so `Graph::insert` wires listener registration, not to
    /// drive activation (which stays a no-op below).
    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        let mut v = SmallVec::new();
        v.push(self.target);
        v
    }

    fn handle_activate(&mut self, _graph: &mut Graph) {}

    fn handle_deactivate(&mut self, _graph: &mut Graph) {}

    fn read(&self, graph: &Graph) -> Result<Value> {
        graph.read(self.target)
    }
}

impl Assignable for InOutAlias {
    fn set_value(&mut self, graph: &mut Graph, value: Value) -> Result<bool> {
        self.with_target_assignable_mut(graph, |a, graph| a.set_value(graph, value))
    }

    fn set_unknown_value(&mut self, graph: &mut Graph) -> Result<bool> {
        self.with_target_assignable_mut(graph, |a, graph| a.set_unknown_value(graph))
    }

    /// Delegates straight to the target's own save slot: an `InOutAlias`
    /// keeps no saved value of its own, so a save/restore cycle through the
    /// alias is indistinguishable from one through the target directly.
    fn save_current(&mut self, graph: &mut Graph) {
        let _ = self.with_target_assignable_mut(graph, |a, graph| {
            a.save_current(graph);
            Ok(())
        });
    }

    fn restore_saved(&mut self, graph: &mut Graph) -> Result<bool> {
        self.with_target_assignable_mut(graph, |a, graph| a.restore_saved(graph))
    }

    fn saved_value(&self) -> Value {
        Value::Unknown
    }

    fn base_variable(&self, graph: &Graph) -> Option<ExprId> {
        Some(base_variable_of(graph, self.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::ScalarVariable;

    #[test]
    fn s6_read_only_alias_is_transparent_and_rejects_writes() {
        let mut graph = Graph::new();
        let u = graph.insert(
            Box::new(ScalarVariable::new(ArcStr::from("u"), ArcStr::from("n"), ValueType::Integer, None)),
            [],
        );
        graph.activate(u);
        graph.set(u, Value::Integer(10)).unwrap();
        let a = graph.insert(
            Box::new(Alias::new(ArcStr::from("a"), u, ValueType::Integer, false, None).unwrap()),
            [],
        );
        graph.activate(a);
        assert_eq!(graph.read(a).unwrap(), Value::Integer(10));
        graph.set(u, Value::Integer(11)).unwrap();
        assert_eq!(graph.read(a).unwrap(), Value::Integer(11));
        assert!(!graph.expr(a).unwrap().is_assignable());
    }

    #[test]
    fn alias_construction_rejects_a_narrowing_type() {
        let mut graph = Graph::new();
        let u = graph.insert(
            Box::new(ScalarVariable::new(ArcStr::from("u"), ArcStr::from("n"), ValueType::Real, None)),
            [],
        );
        let err = Alias::new(ArcStr::from("a"), u, ValueType::Real, false, Some(ValueType::Integer)).unwrap_err();
        assert!(matches!(err, ParserError::AliasNarrows { .. }));
        let _ = graph;
    }

    #[test]
    fn inactive_alias_reads_unknown_even_if_target_is_active() {
        let mut graph = Graph::new();
        let u = graph.insert(
            Box::new(ScalarVariable::new(ArcStr::from("u"), ArcStr::from("n"), ValueType::Integer, None)),
            [],
        );
        graph.activate(u);
        graph.set(u, Value::Integer(5)).unwrap();
        let a = graph.insert(
            Box::new(Alias::new(ArcStr::from("a"), u, ValueType::Integer, false, None).unwrap()),
            [],
        );
        assert_eq!(graph.read(a).unwrap(), Value::Unknown);
    }

    /// A minimal listener standing in for a host-side consumer that cares
    /// about the *notification*, not just a fresh `read` — exactly the shape
    /// `LookupOnChange::on_source_changed` relies on when one of its own
    /// subexpressions is itself an alias (a tolerance or state parameter
    /// presented under a library-node-local name).
    #[derive(Debug)]
    struct Spy {
        watched: ExprId,
        notified: std::cell::Cell<bool>,
    }

    impl Expression for Spy {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
        fn name(&self) -> &str {
            "spy"
        }
        fn expr_name(&self) -> &'static str {
            "Spy"
        }
        fn value_type(&self) -> ValueType {
            ValueType::Boolean
        }
        fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
            let mut v = SmallVec::new();
            v.push(self.watched);
            v
        }
        fn read(&self, _graph: &Graph) -> Result<Value> {
            Ok(Value::Boolean(self.notified.get()))
        }
        fn on_source_changed(&mut self, _graph: &mut Graph, _source: ExprId) -> bool {
            self.notified.set(true);
            true
        }
    }

    /// Without `Alias`/`InOutAlias` listing their target in `subexpressions`,
    /// `Graph::insert` never wires the alias as a listener of `target`, so a
    /// change to `target` would never reach anything listening on the alias
    /// itself — breaking §4.6's "re-publishes changes" for any consumer that
    /// depends on the alias rather than re-reading it directly.
    #[test]
    fn alias_forwards_target_changes_to_its_own_listeners() {
        let mut graph = Graph::new();
        let u = graph.insert(
            Box::new(ScalarVariable::new(ArcStr::from("u"), ArcStr::from("n"), ValueType::Integer, None)),
            [],
        );
        let a = graph.insert(
            Box::new(Alias::new(ArcStr::from("a"), u, ValueType::Integer, false, None).unwrap()),
            [],
        );
        let spy = graph.insert(Box::new(Spy { watched: a, notified: std::cell::Cell::new(false) }), []);

        graph.activate(u);
        graph.activate(a);
        graph.activate(spy);
        assert_eq!(graph.read(spy).unwrap(), Value::Boolean(false));

        graph.set(u, Value::Integer(1)).unwrap();
        assert_eq!(graph.read(spy).unwrap(), Value::Boolean(true));
    }
}
