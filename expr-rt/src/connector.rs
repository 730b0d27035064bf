use expr_core::{Expression, ExprId, Graph};

use crate::lookup::LookupOnChange;

/// A minimal subset of a plan node's API needed to wire an expression into
/// the graph it belongs to: its id for diagnostics, and variable lookup by
/// declared name. Stateless on purpose — everything else a node needs
/// (activation, listener wiring) goes through the `Graph` directly.
pub trait NodeConnector {
    fn node_id(&self) -> &str;

    /// Resolve a declared variable by name, scoped to this node (and its
    /// ancestors, per whatever scoping rule the owning plan executive
    /// enforces). `None` if no such variable is visible from here.
    fn resolve_variable(&self, name: &str) -> Option<ExprId>;
}

/// Insert a `LookupOnChange` and bind its own id onto it — a `LookupOnChange`
/// needs to know its own `ExprId` (to register itself as a cache subscriber)
/// before any `handle_activate` call can reach it, but no `Expression`
/// method is ever handed its own id. This two-phase insert-then-bind is the
/// one place in the crate that does the `as_any_mut` downcast the id-binding
/// depends on.
pub fn insert_lookup_on_change(graph: &mut Graph, lookup: LookupOnChange, owned_children: impl IntoIterator<Item = ExprId>) -> ExprId {
    let id = graph.insert(Box::new(lookup), owned_children);
    graph
        .with_expr_mut(id, |expr| {
            if let Some(l) = expr.as_any_mut().downcast_mut::<LookupOnChange>() {
                l.bind_id(id);
            }
        })
        .expect("id freshly returned by insert must still resolve");
    id
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arcstr::ArcStr;
    use expr_core::Constant;
    use expr_value::{Value, ValueType};
    use smallvec::SmallVec;

    use super::*;
    use crate::cache::Cache;
    use crate::interface::test_support::FakeInterface;
    use crate::scheduler::Scheduler;

    #[test]
    fn bound_lookup_on_change_subscribes_on_activation() {
        let iface = Arc::new(FakeInterface::new());
        iface.set_answer("alt", Value::Real(3.0));
        let cache = Arc::new(Cache::new(iface.clone(), Arc::new(Scheduler::new())));

        let mut graph = Graph::new();
        let name = graph.insert(Box::new(Constant::new(Value::String(ArcStr::from("alt")))), []);
        let lookup =
            LookupOnChange::new(ArcStr::from("l"), ArcStr::from("n"), ValueType::Real, name, SmallVec::new(), None, cache);
        let id = insert_lookup_on_change(&mut graph, lookup, []);

        graph.activate(id);
        assert_eq!(graph.read(id).unwrap(), Value::Real(3.0));
        assert!(iface.is_subscribed("alt"));
    }
}
