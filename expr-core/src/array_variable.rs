use arcstr::ArcStr;
use smallvec::SmallVec;

use expr_value::{AnyArray, Array, Value, ValueType};

use crate::arena::{ExprId, Graph};
use crate::error::{PlanError, Result};
use crate::expr::{ArrayAssignable, Assignable, Expression};

fn empty_array(element_type: ValueType) -> Box<dyn AnyArray> {
    match element_type {
        ValueType::Boolean => Box::new(Array::<bool>::new()),
        ValueType::Integer => Box::new(Array::<i64>::new()),
        ValueType::Real => Box::new(Array::<f64>::new()),
        ValueType::String => Box::new(Array::<arcstr::ArcStr>::new()),
        other => unreachable!("not an array element type: {other}"),
    }
}

/// A mutable array-typed variable. Unlike `ScalarVariable`, activation also
/// has to resolve a `max_size` from an optional Integer-valued expression
/// before it can size the backing storage, per §4.4.
#[derive(Debug)]
pub struct ArrayVariable {
    name: ArcStr,
    node: ArcStr,
    element_type: ValueType,
    max_size_expr: Option<ExprId>,
    max_size: usize,
    initializer: Option<ExprId>,
    current: Box<dyn AnyArray>,
    saved: Option<Box<dyn AnyArray>>,
    known: bool,
}

impl ArrayVariable {
    pub fn new(
        name: ArcStr,
        node: ArcStr,
        element_type: ValueType,
        max_size_expr: Option<ExprId>,
        initializer: Option<ExprId>,
    ) -> Self {
        Self {
            name,
            node,
            element_type,
            max_size_expr,
            max_size: 0,
            initializer,
            current: empty_array(element_type),
            saved: None,
            known: false,
        }
    }

    pub fn array_value_type(&self) -> ValueType {
        match self.element_type {
            ValueType::Boolean => ValueType::BooleanArray,
            ValueType::Integer => ValueType::IntegerArray,
            ValueType::Real => ValueType::RealArray,
            ValueType::String => ValueType::StringArray,
            other => other,
        }
    }

    fn too_large(&self, found: usize) -> PlanError {
        PlanError::ArrayTooLarge {
            node: self.node.clone(),
            name: self.name.clone(),
            class: self.expr_name(),
            found,
            max: self.max_size,
        }
    }

    fn out_of_range(&self, idx: i64) -> PlanError {
        PlanError::IndexOutOfRange {
            node: self.node.clone(),
            name: self.name.clone(),
            class: self.expr_name(),
            index: idx,
            size: self.current.size(),
        }
    }

    fn element_mismatch(&self, found: ValueType) -> PlanError {
        PlanError::ElementTypeMismatch {
            node: self.node.clone(),
            name: self.name.clone(),
            class: self.expr_name(),
            expected: self.element_type,
            found,
        }
    }

    pub fn get_element(&self, idx: i64) -> Result<Value> {
        if idx < 0 || idx as usize >= self.current.size() {
            return Err(self.out_of_range(idx));
        }
        Ok(self.current.element_value(idx as usize).expect("range checked above"))
    }

    pub fn element_is_known(&self, idx: i64) -> Result<bool> {
        if idx < 0 || idx as usize >= self.current.size() {
            return Err(self.out_of_range(idx));
        }
        Ok(self.current.element_known(idx as usize).expect("range checked above"))
    }

    pub fn set_element(&mut self, idx: i64, value: Value) -> Result<bool> {
        if idx < 0 || idx as usize >= self.current.size() {
            return Err(self.out_of_range(idx));
        }
        if value.is_known() && value.value_type() != self.element_type {
            return Err(self.element_mismatch(value.value_type()));
        }
        let before = self.current.element_value(idx as usize).expect("range checked above");
        self.current.set_element_value(idx as usize, &value).expect("range and type checked above");
        Ok(before != value)
    }

    pub fn set_element_unknown(&mut self, idx: i64) -> Result<bool> {
        if idx < 0 || idx as usize >= self.current.size() {
            return Err(self.out_of_range(idx));
        }
        let was_known = self.current.element_known(idx as usize).expect("range checked above");
        self.current.set_element_unknown(idx as usize).expect("range checked above");
        Ok(was_known)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn resolve_max_size(&mut self, graph: &Graph) -> Result<()> {
        if let Some(expr) = self.max_size_expr {
            match graph.read(expr)?.as_i64() {
                Some(n) if n >= 0 => self.max_size = n as usize,
                _ => {
                    return Err(PlanError::UninitializedSize {
                        node: self.node.clone(),
                        name: self.name.clone(),
                        class: self.expr_name(),
                    })
                }
            }
        }
        Ok(())
    }
}

impl Expression for ArrayVariable {
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
        "ArrayVariable"
    }

    fn value_type(&self) -> ValueType {
        self.array_value_type()
    }

    fn as_assignable(&self) -> Option<&dyn Assignable> {
        Some(self)
    }

    fn as_assignable_mut(&mut self) -> Option<&mut dyn Assignable> {
        Some(self)
    }

    fn as_array_assignable(&self) -> Option<&dyn ArrayAssignable> {
        Some(self)
    }

    fn as_array_assignable_mut(&mut self) -> Option<&mut dyn ArrayAssignable> {
        Some(self)
    }

    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        self.max_size_expr.into_iter().chain(self.initializer).collect()
    }

    fn handle_activate(&mut self, graph: &mut Graph) {
        if let Some(max_expr) = self.max_size_expr {
            graph.activate(max_expr);
        }
        if let Some(init) = self.initializer {
            graph.activate(init);
        }
        // best-effort: an unresolved max size leaves max_size at 0, and a
        // later `set`/`set_element` will surface the same condition as a
        // `PlanError` once something actually depends on the bound.
        let _ = self.resolve_max_size(graph);

        if let Some(init) = self.initializer {
            if let Some(initial) =
                graph.read(init).ok().and_then(|v| v.as_any_array().map(|a| a.clone_boxed()))
            {
                if self.max_size > 0 && initial.size() > self.max_size {
                    // Cannot raise a `PlanError` from `handle_activate` (it
                    // has no `Result` return); leave current empty and known
                    // false, matching an unresolved/invalid container. The
                    // offending oversize is surfaced the moment something
                    // reads or writes through this variable.
                    self.known = false;
                } else {
                    let mut arr = initial;
                    if self.max_size > arr.size() {
                        arr.resize(self.max_size);
                    }
                    self.current = arr;
                    self.known = true;
                }
            }
        } else if self.max_size_expr.is_some() {
            self.current = empty_array(self.element_type);
            self.current.resize(self.max_size);
            self.known = true;
        }
    }

    fn handle_deactivate(&mut self, graph: &mut Graph) {
        self.saved = None;
        if let Some(max_expr) = self.max_size_expr {
            let _ = graph.deactivate(max_expr);
        }
        if let Some(init) = self.initializer {
            let _ = graph.deactivate(init);
        }
    }

    fn read(&self, _graph: &Graph) -> Result<Value> {
        if !self.known {
            return Ok(Value::Unknown);
        }
        Ok(self.current.to_value())
    }
}

impl Assignable for ArrayVariable {
    fn set_value(&mut self, _graph: &mut Graph, value: Value) -> Result<bool> {
        let incoming = match value.as_any_array() {
            Some(a) => a,
            None if !value.is_known() => {
                let changed = self.known;
                self.known = false;
                return Ok(changed);
            }
            None => return Err(self.element_mismatch(value.value_type())),
        };
        if self.max_size > 0 && incoming.size() > self.max_size {
            return Err(self.too_large(incoming.size()));
        }
        let mut cloned = incoming.clone_boxed();
        if self.max_size > cloned.size() {
            cloned.resize(self.max_size);
        }
        let changed = !self.known || !self.current.equals_any(cloned.as_ref());
        self.current = cloned;
        self.known = true;
        Ok(changed)
    }

    fn set_unknown_value(&mut self, _graph: &mut Graph) -> Result<bool> {
        let changed = self.known;
        self.current = empty_array(self.element_type);
        self.known = false;
        Ok(changed)
    }

    fn save_current(&mut self, _graph: &mut Graph) {
        self.saved = Some(if self.known { self.current.clone_boxed() } else { empty_array(self.element_type) });
    }

    fn restore_saved(&mut self, _graph: &mut Graph) -> Result<bool> {
        match self.saved.take() {
            Some(saved) => {
                let changed = !self.known || !self.current.equals_any(saved.as_ref());
                self.current = saved;
                self.known = true;
                Ok(changed)
            }
            None => {
                let changed = self.known;
                self.current = empty_array(self.element_type);
                self.known = false;
                Ok(changed)
            }
        }
    }

    fn saved_value(&self) -> Value {
        self.saved.as_ref().map(|a| a.to_value()).unwrap_or(Value::Unknown)
    }

    fn reset(&mut self) {
        self.current = empty_array(self.element_type);
        self.saved = None;
        self.known = false;
    }
}

impl ArrayAssignable for ArrayVariable {
    fn get_element(&self, idx: i64) -> Result<Value> {
        ArrayVariable::get_element(self, idx)
    }

    fn element_is_known(&self, idx: i64) -> Result<bool> {
        ArrayVariable::element_is_known(self, idx)
    }

    fn set_element(&mut self, idx: i64, value: Value) -> Result<bool> {
        ArrayVariable::set_element(self, idx, value)
    }

    fn set_element_unknown(&mut self, idx: i64) -> Result<bool> {
        ArrayVariable::set_element_unknown(self, idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;

    fn int_array_const(values: &[i64]) -> Constant {
        Constant::new(Value::IntegerArray(Array::from_known_values(values.iter().copied())))
    }

    #[test]
    fn initializer_resizes_to_declared_max() {
        let mut graph = Graph::new();
        let max = graph.insert(Box::new(Constant::new(Value::Integer(4))), []);
        let init = graph.insert(Box::new(int_array_const(&[0, 1, 2, 3])), []);
        let id = graph.insert(
            Box::new(ArrayVariable::new(ArcStr::from("a"), ArcStr::from("n"), ValueType::Integer, Some(max), Some(init))),
            [max, init],
        );
        graph.activate(id);
        assert_eq!(graph.read(id).unwrap(), Value::IntegerArray(Array::from_known_values([0, 1, 2, 3])));
    }

    #[test]
    fn oversize_initializer_is_a_plan_error_on_explicit_set() {
        let mut graph = Graph::new();
        let max = graph.insert(Box::new(Constant::new(Value::Integer(2))), []);
        let id = graph.insert(
            Box::new(ArrayVariable::new(ArcStr::from("a"), ArcStr::from("n"), ValueType::Integer, Some(max), None)),
            [max],
        );
        graph.activate(id);
        let mut expr = graph.take_expr(id).unwrap();
        let err = expr
            .as_assignable_mut()
            .unwrap()
            .set_value(&mut graph, Value::IntegerArray(Array::from_known_values([1, 2, 3])))
            .unwrap_err();
        assert!(matches!(err, PlanError::ArrayTooLarge { .. }));
        graph.put_expr(id, expr);
    }

    #[test]
    fn element_out_of_range_is_a_plan_error() {
        let mut graph = Graph::new();
        let id = graph.insert(
            Box::new(ArrayVariable::new(ArcStr::from("a"), ArcStr::from("n"), ValueType::Integer, None, None)),
            [],
        );
        graph.activate(id);
        let mut expr = graph.take_expr(id).unwrap();
        expr.as_assignable_mut()
            .unwrap()
            .set_value(&mut graph, Value::IntegerArray(Array::from_known_values([1, 2])))
            .unwrap();
        let err = expr.as_array_assignable_mut().unwrap().set_element(5, Value::Integer(9)).unwrap_err();
        graph.put_expr(id, expr);
        assert!(matches!(err, PlanError::IndexOutOfRange { .. }));
    }
}
