use std::fmt;

use smallvec::SmallVec;

use expr_value::{Value, ValueType};

use crate::arena::{ExprId, Graph};
use crate::error::Result;

/// A node in the reactive dataflow graph. Every concrete expression type
/// (constant, variable, array variable, array reference, alias, function,
/// lookup) implements this trait and is stored in a [`Graph`] behind a
/// `Box<dyn Expression>`.
///
/// Activation and notification bookkeeping (the active count, the listener
/// set, `publish_changed`) live on [`Graph`], keyed by [`ExprId`] — not on
/// the expression itself — so `handle_activate`/`handle_deactivate` only
/// need to walk this node's own subexpressions; the generic plumbing is
/// handled once, in `Graph::activate`/`Graph::deactivate`.
pub trait Expression: fmt::Debug {
    /// Downcast hook: lets a collaborator that owns domain knowledge this
    /// crate does not (the state cache, in `expr-rt`, driving a
    /// `LookupOnChange`'s per-subscriber latch) reach a concrete type
    /// behind the `dyn Expression` stored in the arena, without this crate
    /// needing to know that type exists.
    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;

    fn name(&self) -> &str;

    /// Short class tag used in diagnostics (`"IntegerVariable"`, `"ADD"`,
    /// `"ArrayRef"`, ...).
    fn expr_name(&self) -> &'static str;

    fn value_type(&self) -> ValueType;

    fn is_constant(&self) -> bool {
        false
    }

    fn is_assignable(&self) -> bool {
        self.as_assignable().is_some()
    }

    fn as_assignable(&self) -> Option<&dyn Assignable> {
        None
    }

    fn as_assignable_mut(&mut self) -> Option<&mut dyn Assignable> {
        None
    }

    /// Present as an [`ArrayAssignable`] when this expression owns array
    /// element storage directly (only `ArrayVariable` does). Array
    /// references use this to reach the element-level API of the variable
    /// they index into.
    fn as_array_assignable_mut(&mut self) -> Option<&mut dyn ArrayAssignable> {
        None
    }

    fn as_array_assignable(&self) -> Option<&dyn ArrayAssignable> {
        None
    }

    /// Every expression directly referenced by this one (arguments, the
    /// wrapped alias target, an array and its index). Used to wire
    /// listener registration at insertion and to drive the activation walk.
    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        SmallVec::new()
    }

    /// Subclass hook called on the 0->1 activation transition. The default
    /// activates every subexpression, which is correct for anything whose
    /// only activation-time work is "make my inputs live".
    fn handle_activate(&mut self, graph: &mut Graph) {
        for id in self.subexpressions() {
            graph.activate(id);
        }
    }

    /// Subclass hook called on the 1->0 deactivation transition.
    fn handle_deactivate(&mut self, graph: &mut Graph) {
        for id in self.subexpressions() {
            let _ = graph.deactivate(id);
        }
    }

    /// Whether a 0->1 activation transition, if it leaves this expression
    /// known, should publish a changed notification. True for everything
    /// except constants, which never change and so have nothing to tell a
    /// newly-active listener that activation order couldn't already imply.
    fn is_propagation_source(&self) -> bool {
        true
    }

    /// Compute this expression's current value. `Graph::read` guarantees
    /// this is only called while active (or for a constant, unconditionally),
    /// so implementations do not need to re-check activation themselves.
    ///
    /// Returns `Err` only for the handful of conditions §7 designates as a
    /// `PlanError` rather than a silent unknown (array index out of range,
    /// element type mismatch, ...); composite expressions propagate a
    /// sub-expression's error with `?` rather than swallowing it.
    fn read(&self, graph: &Graph) -> Result<Value>;

    /// Called when `source`, one of this expression's direct dependencies,
    /// has published a change. Returns whether to continue propagating the
    /// notification to this expression's own listeners. The default simply
    /// forwards: this expression's own cached value (if any) is considered
    /// stale and will be recomputed lazily on the next `read`.
    fn on_source_changed(&mut self, graph: &mut Graph, source: ExprId) -> bool {
        let _ = (graph, source);
        true
    }
}

/// The subset of expressions that support in-place mutation with
/// save/restore transactional semantics: scalar variables, array variables,
/// writable array references, and writable aliases.
pub trait Assignable: Expression {
    /// Assign a new value. Returns `Ok(true)` if this changed the value
    /// (the caller is responsible for publishing), `Ok(false)` if the new
    /// value bitwise-equals the current one.
    fn set_value(&mut self, graph: &mut Graph, value: Value) -> Result<bool>;

    fn set_unknown_value(&mut self, graph: &mut Graph) -> Result<bool>;

    /// Snapshot the current value into the saved slot. Takes `&mut Graph`
    /// (not just `&Graph`) so a proxy (an `InOutAlias`) can delegate to its
    /// target's own save slot rather than keeping one of its own.
    fn save_current(&mut self, graph: &mut Graph);

    /// Overwrite the current value from the saved slot. Returns `Ok(true)`
    /// if this changed the value.
    fn restore_saved(&mut self, graph: &mut Graph) -> Result<bool>;

    fn saved_value(&self) -> Value;

    /// Clear current and saved value back to unknown. Legal only while
    /// inactive; callers (`Graph`-level helpers) are responsible for
    /// checking that. The default is a no-op, appropriate for proxies
    /// (aliases, array references) that hold no storage of their own to
    /// reset.
    fn reset(&mut self) {}

    /// Peel one layer of proxy (alias, array reference) toward the
    /// underlying storage. `None` means this expression *is* the base
    /// variable.
    fn base_variable(&self, graph: &Graph) -> Option<ExprId> {
        let _ = graph;
        None
    }
}

/// The element-level API an array reference needs from the array variable
/// it indexes into; kept separate from [`Assignable`] because most
/// assignables (scalars, whole-array `set`) have no notion of an element.
pub trait ArrayAssignable: Assignable {
    fn get_element(&self, idx: i64) -> Result<Value>;
    fn element_is_known(&self, idx: i64) -> Result<bool>;
    fn set_element(&mut self, idx: i64, value: Value) -> Result<bool>;
    fn set_element_unknown(&mut self, idx: i64) -> Result<bool>;
}

/// Resolve `id` down to the base variable it ultimately proxies to (itself,
/// if it is not a proxy at all).
pub fn base_variable_of(graph: &Graph, mut id: ExprId) -> ExprId {
    loop {
        let next = graph.expr(id).and_then(|e| e.as_assignable()).and_then(|a| a.base_variable(graph));
        match next {
            Some(other) if other != id => id = other,
            _ => return id,
        }
    }
}
