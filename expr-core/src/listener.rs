use crate::arena::{ExprId, Graph};
use crate::error::{PlanError, Result};

impl Graph {
    /// Register `listener` as a consumer of `source`'s changes. Idempotent:
    /// adding the same listener twice is a no-op, so every change is
    /// delivered at most once per listener per `publish_changed` call.
    pub fn add_listener(&mut self, source: ExprId, listener: ExprId) {
        if let Some(meta) = self.meta_mut(source) {
            meta.listeners.insert(listener);
        }
    }

    /// Unregister a listener. Idempotent: removing an absent listener is a
    /// silent no-op. Uses `shift_remove` rather than `swap_remove` so the
    /// remaining listeners keep their relative activation order.
    pub fn remove_listener(&mut self, source: ExprId, listener: ExprId) {
        if let Some(meta) = self.meta_mut(source) {
            meta.listeners.shift_remove(&listener);
        }
    }

    /// Increment `id`'s activation count. On the 0->1 transition, walks
    /// subexpressions via `handle_activate`, then publishes a changed
    /// notification if the expression ended up known and is a propagation
    /// source (constants never are; most everything else is).
    pub fn activate(&mut self, id: ExprId) {
        let was_inactive = match self.meta_mut(id) {
            Some(meta) => {
                let was = meta.active_count == 0;
                meta.active_count += 1;
                was
            }
            None => return,
        };
        if !was_inactive {
            return;
        }
        log::trace!("{id} activating");
        if let Some(mut expr) = self.take_expr(id) {
            expr.handle_activate(self);
            self.put_expr(id, expr);
        }
        let should_publish = self.expr(id).map(|e| e.is_propagation_source()).unwrap_or(false)
            && self.read(id).map(|v| v.is_known()).unwrap_or(false);
        if should_publish {
            self.publish_changed(id);
        }
    }

    /// Decrement `id`'s activation count. Underflow (deactivating an
    /// already-inactive expression) is a programmer error surfaced as a
    /// `PlanError` rather than a panic, since it can be triggered by a
    /// malformed plan rather than only by an engine bug.
    pub fn deactivate(&mut self, id: ExprId) -> Result<()> {
        let now_inactive = {
            let meta = self.meta_mut(id).ok_or_else(|| PlanError::ActivationUnderflow {
                node: arcstr::literal!("<graph>"),
                name: arcstr::ArcStr::from(format!("{id}")),
                class: "expression",
            })?;
            if meta.active_count == 0 {
                return Err(PlanError::ActivationUnderflow {
                    node: arcstr::literal!("<graph>"),
                    name: arcstr::ArcStr::from(format!("{id}")),
                    class: "expression",
                });
            }
            meta.active_count -= 1;
            meta.active_count == 0
        };
        if now_inactive {
            log::trace!("{id} deactivating");
            if let Some(mut expr) = self.take_expr(id) {
                expr.handle_deactivate(self);
                self.put_expr(id, expr);
            }
        }
        Ok(())
    }

    /// Lazily read `id`'s current value. Expressions that are not active
    /// read as unknown, except constants, which are always-active-
    /// equivalent and answer reads regardless of activation count.
    pub fn read(&self, id: ExprId) -> Result<expr_value::Value> {
        match self.expr(id) {
            Some(e) if e.is_constant() || self.is_active(id) => e.read(self),
            _ => Ok(expr_value::Value::Unknown),
        }
    }

    /// Depth-first fan-out of a "changed" notification to `source`'s
    /// listeners. Inactive listeners drop the notification silently (it
    /// would be spurious: nothing downstream of an inactive listener can
    /// observe the change anyway). Guarded against re-entrant cycles: the
    /// graph is a DAG by construction, but a defensive guard here means a
    /// bug upstream degrades to a dropped notification and a warning
    /// instead of an infinite recursion.
    pub fn publish_changed(&mut self, source: ExprId) {
        if !self.in_propagation_mut().insert(source) {
            log::warn!("dropped re-entrant propagation through {source}");
            return;
        }
        let listeners: smallvec::SmallVec<[ExprId; 8]> = match self.meta(source) {
            Some(meta) => meta.listeners.iter().copied().collect(),
            None => smallvec::SmallVec::new(),
        };
        for listener in listeners {
            if !self.is_active(listener) {
                log::warn!("notify_changed delivered to inactive listener {listener}");
                continue;
            }
            log::trace!("{source} changed, notifying {listener}");
            let keep_propagating = match self.take_expr(listener) {
                Some(mut expr) => {
                    let keep = expr.on_source_changed(self, source);
                    self.put_expr(listener, expr);
                    keep
                }
                None => true,
            };
            if keep_propagating {
                self.publish_changed(listener);
            }
        }
        self.in_propagation_mut().remove(&source);
    }
}
