use std::sync::Arc;

use arcstr::ArcStr;
use smallvec::SmallVec;

use expr_core::{ExprId, Expression, Graph, Result};
use expr_value::{Value, ValueType};

use crate::cache::Cache;
use crate::state::State;

/// Resolve a `LookupNow`/`LookupOnChange`'s state-name and parameter
/// subexpressions into a [`State`]; `None` if the name or any parameter is
/// currently unknown (§4.8: lookups on an unresolved state read `Unknown`
/// rather than erroring).
fn resolve_state(graph: &Graph, state_name: ExprId, parameters: &[ExprId]) -> Result<Option<State>> {
    let name_val = graph.read(state_name)?;
    let Some(name) = name_val.as_str() else { return Ok(None) };
    let mut params: SmallVec<[Value; 2]> = SmallVec::new();
    for p in parameters {
        let v = graph.read(*p)?;
        if !v.is_known() {
            return Ok(None);
        }
        params.push(v);
    }
    Ok(Some(State::new(ArcStr::from(name), params)))
}

/// A one-shot, cycle-cached read of an external state (§4.8). Re-evaluates
/// the state name and parameters on every `read`, but only asks the
/// interface for a fresh sample once per scheduler cycle.
#[derive(Debug)]
pub struct LookupNow {
    name: ArcStr,
    node: ArcStr,
    value_type: ValueType,
    state_name: ExprId,
    parameters: SmallVec<[ExprId; 2]>,
    cache: Arc<Cache>,
}

impl LookupNow {
    pub fn new(
        name: ArcStr,
        node: ArcStr,
        value_type: ValueType,
        state_name: ExprId,
        parameters: SmallVec<[ExprId; 2]>,
        cache: Arc<Cache>,
    ) -> Self {
        Self { name, node, value_type, state_name, parameters, cache }
    }
}

impl Expression for LookupNow {
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
        "LookupNow"
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        let mut v: SmallVec<[ExprId; 4]> = SmallVec::new();
        v.push(self.state_name);
        v.extend(self.parameters.iter().copied());
        v
    }

    fn read(&self, graph: &Graph) -> Result<Value> {
        let _ = &self.node;
        match resolve_state(graph, self.state_name, &self.parameters)? {
            Some(state) => Ok(self.cache.ensure_fresh(&state)),
            None => Ok(Value::Unknown),
        }
    }
}

/// A standing subscription to an external state that republishes only when
/// its own, independently-latched value drifts past its own tolerance
/// (§4.8). The shared threshold band the interface is told about is the
/// intersection of every subscriber's own band — computed by the
/// [`Cache`], not by this expression.
#[derive(Debug)]
pub struct LookupOnChange {
    name: ArcStr,
    node: ArcStr,
    value_type: ValueType,
    state_name: ExprId,
    parameters: SmallVec<[ExprId; 2]>,
    tolerance: Option<ExprId>,
    cache: Arc<Cache>,
    self_id: Option<ExprId>,
    current_state: Option<State>,
}

impl LookupOnChange {
    pub fn new(
        name: ArcStr,
        node: ArcStr,
        value_type: ValueType,
        state_name: ExprId,
        parameters: SmallVec<[ExprId; 2]>,
        tolerance: Option<ExprId>,
        cache: Arc<Cache>,
    ) -> Self {
        Self { name, node, value_type, state_name, parameters, tolerance, cache, self_id: None, current_state: None }
    }

    /// Bind this node's own id, once it is known — see `connector::insert_lookup_on_change`
    /// for why this can't simply be a constructor argument.
    pub(crate) fn bind_id(&mut self, id: ExprId) {
        self.self_id = Some(id);
    }

    fn read_tolerance(&self, graph: &Graph) -> Result<Option<f64>> {
        match self.tolerance {
            None => Ok(Some(0.0)),
            Some(t) => Ok(graph.read(t)?.as_numeric()),
        }
    }
}

impl Expression for LookupOnChange {
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
        "LookupOnChange"
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        let mut v: SmallVec<[ExprId; 4]> = SmallVec::new();
        v.push(self.state_name);
        v.extend(self.parameters.iter().copied());
        if let Some(t) = self.tolerance {
            v.push(t);
        }
        v
    }

    fn handle_activate(&mut self, graph: &mut Graph) {
        for id in self.subexpressions() {
            graph.activate(id);
        }
        let Some(self_id) = self.self_id else {
            log::warn!("{} activated before its id was bound", self.name);
            return;
        };
        if let Ok(Some(state)) = resolve_state(graph, self.state_name, &self.parameters) {
            let tolerance = self.read_tolerance(graph).ok().flatten();
            self.cache.subscribe(&state, self_id, tolerance);
            self.current_state = Some(state);
        }
    }

    fn handle_deactivate(&mut self, graph: &mut Graph) {
        if let (Some(self_id), Some(state)) = (self.self_id, self.current_state.take()) {
            self.cache.unsubscribe(&state, self_id);
        }
        for id in self.subexpressions() {
            let _ = graph.deactivate(id);
        }
    }

    fn on_source_changed(&mut self, graph: &mut Graph, source: ExprId) -> bool {
        let Some(self_id) = self.self_id else { return true };

        if Some(source) == self.tolerance {
            let tolerance = self.read_tolerance(graph).ok().flatten();
            return match &self.current_state {
                Some(state) => self.cache.set_tolerance(state, self_id, tolerance),
                None => false,
            };
        }

        if source == self.state_name || self.parameters.contains(&source) {
            let new_state = resolve_state(graph, self.state_name, &self.parameters).ok().flatten();
            if new_state == self.current_state {
                return false;
            }
            if let Some(old) = self.current_state.take() {
                self.cache.unsubscribe(&old, self_id);
            }
            if let Some(ref state) = new_state {
                let tolerance = self.read_tolerance(graph).ok().flatten();
                self.cache.subscribe(state, self_id, tolerance);
            }
            self.current_state = new_state;
            return true;
        }

        true
    }

    fn read(&self, graph: &Graph) -> Result<Value> {
        let _ = (graph, &self.node);
        match (self.self_id, &self.current_state) {
            (Some(id), Some(state)) => Ok(self.cache.subscriber_value(state, id)),
            _ => Ok(Value::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use expr_core::Constant;

    use super::*;
    use crate::interface::test_support::FakeInterface;
    use crate::scheduler::Scheduler;

    #[test]
    fn lookup_now_samples_once_per_cycle() {
        let iface = Arc::new(FakeInterface::new());
        iface.set_answer("press", Value::Real(14.7));
        let scheduler = Arc::new(Scheduler::new());
        let cache = Arc::new(Cache::new(iface.clone(), scheduler.clone()));

        let mut graph = Graph::new();
        let name = graph.insert(Box::new(Constant::new(Value::String(ArcStr::from("press")))), []);
        let lookup =
            LookupNow::new(ArcStr::from("p"), ArcStr::from("n"), ValueType::Real, name, SmallVec::new(), cache);
        let id = graph.insert(Box::new(lookup), []);
        graph.activate(id);

        assert_eq!(graph.read(id).unwrap(), Value::Real(14.7));

        iface.set_answer("press", Value::Real(20.0));
        assert_eq!(graph.read(id).unwrap(), Value::Real(14.7));

        scheduler.increment_cycle();
        assert_eq!(graph.read(id).unwrap(), Value::Real(20.0));
    }

    #[test]
    fn lookup_now_reports_unknown_for_an_unresolved_state_name() {
        let iface = Arc::new(FakeInterface::new());
        let cache = Arc::new(Cache::new(iface, Arc::new(Scheduler::new())));

        let mut graph = Graph::new();
        let name = graph.insert(Box::new(Constant::unknown(ValueType::String)), []);
        let lookup =
            LookupNow::new(ArcStr::from("p"), ArcStr::from("n"), ValueType::Real, name, SmallVec::new(), cache);
        let id = graph.insert(Box::new(lookup), []);
        graph.activate(id);

        assert_eq!(graph.read(id).unwrap(), Value::Unknown);
    }
}
