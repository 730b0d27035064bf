use arcstr::ArcStr;
use smallvec::SmallVec;

use expr_value::{Value, ValueType};

use crate::arena::{ExprId, Graph};
use crate::error::{PlanError, Result};
use crate::expr::{base_variable_of, ArrayAssignable, Assignable, Expression};

fn current_index(graph: &Graph, index: ExprId, ctx: &IndexCtx) -> Result<i64> {
    match graph.read(index)?.as_i64() {
        Some(i) => Ok(i),
        None => Err(PlanError::Other {
            node: ctx.node.clone(),
            name: ctx.name.clone(),
            class: ctx.class,
            message: arcstr::literal!("array reference index is unknown or not an Integer"),
        }),
    }
}

struct IndexCtx {
    node: ArcStr,
    name: ArcStr,
    class: &'static str,
}

/// A read-only proxy denoting one element of an array expression (§4.5).
/// Unlike the writable variant it carries no save/restore state of its own.
#[derive(Debug)]
pub struct ArrayRef {
    name: ArcStr,
    node: ArcStr,
    array: ExprId,
    index: ExprId,
    element_type: ValueType,
}

impl ArrayRef {
    pub fn new(name: ArcStr, node: ArcStr, array: ExprId, index: ExprId, element_type: ValueType) -> Self {
        Self { name, node, array, index, element_type }
    }

    fn read_element(&self, graph: &Graph) -> Result<Value> {
        read_array_element(
            graph,
            self.array,
            self.index,
            &IndexCtx { node: self.node.clone(), name: self.name.clone(), class: "ArrayRef" },
        )
    }
}

/// Shared by [`ArrayRef`] and [`MutableArrayRef`]: resolve the index, then
/// look up the array's element at that index. Unknown array or unknown
/// index reads as unknown; an index outside `[0, size)` is a `PlanError`.
fn read_array_element(graph: &Graph, array: ExprId, index: ExprId, ctx: &IndexCtx) -> Result<Value> {
    let array_value = graph.read(array)?;
    let any = match array_value.as_any_array() {
        Some(a) => a,
        None => return Ok(Value::Unknown),
    };
    let idx = match graph.read(index)?.as_i64() {
        Some(i) => i,
        None => return Ok(Value::Unknown),
    };
    if idx < 0 || idx as usize >= any.size() {
        return Err(PlanError::IndexOutOfRange {
            node: ctx.node.clone(),
            name: ctx.name.clone(),
            class: ctx.class,
            index: idx,
            size: any.size(),
        });
    }
    Ok(any.element_value(idx as usize).expect("range checked above"))
}

impl Expression for ArrayRef {
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
        "ArrayRef"
    }

    fn value_type(&self) -> ValueType {
        self.element_type
    }

    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        SmallVec::from_slice(&[self.array, self.index])
    }

    fn read(&self, graph: &Graph) -> Result<Value> {
        self.read_element(graph)
    }
}

/// The writable variant: `set`/`set_unknown`/save/restore mutate the
/// referenced array's element storage in place, via the array's
/// [`ArrayAssignable`] surface reached through [`base_variable_of`] so that
/// the array operand may itself be wrapped in an alias. Save/restore
/// remembers the index *at save time*; a restore after the live index has
/// moved on still writes back to the saved slot (§4.5).
#[derive(Debug)]
pub struct MutableArrayRef {
    name: ArcStr,
    node: ArcStr,
    array: ExprId,
    index: ExprId,
    element_type: ValueType,
    saved: Option<(i64, Value)>,
}

impl MutableArrayRef {
    pub fn new(name: ArcStr, node: ArcStr, array: ExprId, index: ExprId, element_type: ValueType) -> Self {
        Self { name, node, array, index, element_type, saved: None }
    }

    fn ctx(&self) -> IndexCtx {
        IndexCtx { node: self.node.clone(), name: self.name.clone(), class: "MutableArrayRef" }
    }

    fn array_base(&self, graph: &Graph) -> ExprId {
        base_variable_of(graph, self.array)
    }

    fn with_array_assignable_mut<R>(
        &self,
        graph: &mut Graph,
        f: impl FnOnce(&mut dyn ArrayAssignable) -> Result<R>,
    ) -> Result<R> {
        let base = self.array_base(graph);
        let mut expr = graph.take_expr(base).ok_or_else(|| not_assignable(&self.ctx()))?;
        let result = match expr.as_array_assignable_mut() {
            Some(a) => f(a),
            None => Err(not_assignable(&self.ctx())),
        };
        graph.put_expr(base, expr);
        result
    }
}

fn not_assignable(ctx: &IndexCtx) -> PlanError {
    PlanError::NotAssignable { node: ctx.node.clone(), name: ctx.name.clone(), class: ctx.class }
}

impl Expression for MutableArrayRef {
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
        "MutableArrayRef"
    }

    fn value_type(&self) -> ValueType {
        self.element_type
    }

    fn as_assignable(&self) -> Option<&dyn Assignable> {
        Some(self)
    }

    fn as_assignable_mut(&mut self) -> Option<&mut dyn Assignable> {
        Some(self)
    }

    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        SmallVec::from_slice(&[self.array, self.index])
    }

    fn read(&self, graph: &Graph) -> Result<Value> {
        read_array_element(graph, self.array, self.index, &self.ctx())
    }
}

impl Assignable for MutableArrayRef {
    fn set_value(&mut self, graph: &mut Graph, value: Value) -> Result<bool> {
        let ctx = self.ctx();
        let idx = current_index(graph, self.index, &ctx)?;
        self.with_array_assignable_mut(graph, |a| a.set_element(idx, value))
    }

    fn set_unknown_value(&mut self, graph: &mut Graph) -> Result<bool> {
        let ctx = self.ctx();
        let idx = current_index(graph, self.index, &ctx)?;
        self.with_array_assignable_mut(graph, |a| a.set_element_unknown(idx))
    }

    fn save_current(&mut self, graph: &mut Graph) {
        let ctx = self.ctx();
        self.saved = current_index(graph, self.index, &ctx).ok().and_then(|idx| {
            let base = self.array_base(graph);
            let value = graph
                .expr(base)
                .and_then(|e| e.as_array_assignable())
                .and_then(|a| a.get_element(idx).ok())
                .unwrap_or(Value::Unknown);
            Some((idx, value))
        });
    }

    fn restore_saved(&mut self, graph: &mut Graph) -> Result<bool> {
        let Some((idx, value)) = self.saved.take() else {
            return Ok(false);
        };
        self.with_array_assignable_mut(graph, |a| match &value {
            Value::Unknown => a.set_element_unknown(idx),
            v => a.set_element(idx, v.clone()),
        })
    }

    fn saved_value(&self) -> Value {
        self.saved.as_ref().map(|(_, v)| v.clone()).unwrap_or(Value::Unknown)
    }

    fn base_variable(&self, graph: &Graph) -> Option<ExprId> {
        Some(self.array_base(graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array_variable::ArrayVariable;
    use crate::constant::Constant;
    use crate::variable::ScalarVariable;
    use expr_value::Array;

    fn setup() -> (Graph, ExprId, ExprId, ExprId) {
        let mut graph = Graph::new();
        let init = graph.insert(Box::new(Constant::new(Value::IntegerArray(Array::from_known_values([0, 1, 2, 3])))), []);
        let arr = graph.insert(
            Box::new(ArrayVariable::new(ArcStr::from("A"), ArcStr::from("n"), ValueType::Integer, None, Some(init))),
            [init],
        );
        let idx = graph.insert(Box::new(ScalarVariable::new(ArcStr::from("i"), ArcStr::from("n"), ValueType::Integer, None)), []);
        let r = graph.insert(
            Box::new(MutableArrayRef::new(ArcStr::from("R"), ArcStr::from("n"), arr, idx, ValueType::Integer)),
            [],
        );
        (graph, arr, idx, r)
    }

    #[test]
    fn s2_array_element_round_trip() {
        let (mut graph, arr, idx, r) = setup();
        graph.activate(arr);
        graph.activate(idx);
        graph.activate(r);
        graph.set(idx, Value::Integer(2)).unwrap();
        assert_eq!(graph.read(r).unwrap(), Value::Integer(2));

        graph.set(idx, Value::Integer(0)).unwrap();
        assert_eq!(graph.read(r).unwrap(), Value::Integer(0));

        graph.set(r, Value::Integer(42)).unwrap();
        assert_eq!(graph.read(arr).unwrap().as_any_array().unwrap().element_value(0).unwrap(), Value::Integer(42));

        graph.set(idx, Value::Integer(5)).unwrap();
        assert!(matches!(graph.read(r).unwrap_err(), PlanError::IndexOutOfRange { .. }));
    }

    #[test]
    fn restore_writes_back_to_the_saved_index_not_the_live_one() {
        let (mut graph, arr, idx, r) = setup();
        graph.activate(arr);
        graph.activate(idx);
        graph.activate(r);
        graph.set(idx, Value::Integer(1)).unwrap();
        graph.save_current(r).unwrap();
        graph.set(idx, Value::Integer(2)).unwrap();
        graph.set(r, Value::Integer(99)).unwrap();
        graph.set(idx, Value::Integer(3)).unwrap();
        graph.restore_saved(r).unwrap();
        let snapshot = graph.read(arr).unwrap();
        let any = snapshot.as_any_array().unwrap();
        assert_eq!(any.element_value(1).unwrap(), Value::Integer(1));
        assert_eq!(any.element_value(2).unwrap(), Value::Integer(99));
    }

    /// A minimal listener standing in for any consumer of the array variable
    /// itself — a second `ArrayRef` into the same array, a whole-array
    /// reader, a `SIZE`/`ALL_KNOWN` function over it.
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
            SmallVec::from_slice(&[self.watched])
        }
        fn read(&self, _graph: &Graph) -> Result<Value> {
            Ok(Value::Boolean(self.notified.get()))
        }
        fn on_source_changed(&mut self, _graph: &mut Graph, _source: ExprId) -> bool {
            self.notified.set(true);
            true
        }
    }

    /// A write through a `MutableArrayRef` mutates the base `ArrayVariable`'s
    /// element storage, so the base variable's own listeners must be told,
    /// not just whatever happens to be listening on the reference itself.
    #[test]
    fn set_through_mutable_ref_notifies_the_base_arrays_listeners() {
        let (mut graph, arr, idx, r) = setup();
        graph.activate(arr);
        graph.activate(idx);
        graph.activate(r);
        graph.set(idx, Value::Integer(0)).unwrap();

        let spy = graph.insert(Box::new(Spy { watched: arr, notified: std::cell::Cell::new(false) }), []);
        graph.activate(spy);
        assert_eq!(graph.read(spy).unwrap(), Value::Boolean(false));

        graph.set(r, Value::Integer(42)).unwrap();
        assert_eq!(graph.read(spy).unwrap(), Value::Boolean(true));
    }
}
