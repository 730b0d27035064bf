use std::fmt;

use arcstr::ArcStr;
use smallvec::SmallVec;

use crate::expr::Expression;

/// A non-owning, generational handle into a [`Graph`]. Listener links and
/// cross-references (variable refs, aliases, array refs) are stored as
/// `ExprId`s rather than borrowed references, so that two graph nodes never
/// need to be borrowed at once — the usual aliasing problem with intrusive
/// listener graphs in a language without a tracing GC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

pub(crate) struct NodeMeta {
    pub(crate) active_count: u32,
    /// Insertion-ordered so `publish_changed` delivers in listener
    /// *activation* order (§5's ordering guarantee #2), not hash order.
    pub(crate) listeners: indexmap::IndexSet<ExprId, fxhash::FxBuildHasher>,
}

impl NodeMeta {
    fn new() -> Self {
        Self { active_count: 0, listeners: indexmap::IndexSet::default() }
    }
}

struct Slot {
    generation: u32,
    occupied: Option<Occupied>,
}

struct Occupied {
    // `None` only while a mutating call has temporarily taken the box out
    // to get an unaliased `&mut Graph` for recursive subexpression calls.
    expr: Option<Box<dyn Expression>>,
    meta: NodeMeta,
    owned_children: SmallVec<[ExprId; 4]>,
}

/// Owns every expression in the graph. Expressions never hold `Box`es of
/// each other directly (aside from a Function's own parameter list, which
/// is itself a list of `ExprId`s) — all structure is expressed through
/// `ExprId` plus this arena, matching the generational-id pattern used
/// elsewhere in the dataflow-engine lineage for its own bind identifiers.
pub struct Graph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    in_propagation: fxhash::FxHashSet<ExprId>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), in_propagation: fxhash::FxHashSet::default() }
    }

    /// Insert a freshly constructed expression, wiring it as a listener of
    /// every id returned by its `subexpressions()` at the moment of
    /// insertion. `owned_children` records which of those subexpressions
    /// this node is responsible for destroying (the "garbage-tagged" set);
    /// pass an empty iterator for expressions that only reference others by
    /// id without owning them (variable refs resolved through a node
    /// connector, alias targets, etc).
    pub fn insert(
        &mut self,
        expr: Box<dyn Expression>,
        owned_children: impl IntoIterator<Item = ExprId>,
    ) -> ExprId {
        let children = expr.subexpressions();
        let occupied = Occupied {
            expr: Some(expr),
            meta: NodeMeta::new(),
            owned_children: owned_children.into_iter().collect(),
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.occupied = Some(occupied);
                ExprId { index, generation: slot.generation }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, occupied: Some(occupied) });
                ExprId { index, generation: 0 }
            }
        };
        for child in children {
            self.add_listener(child, id);
        }
        id
    }

    /// Destroy an expression. Fails if it is still active or still listened
    /// to by anything else — destruction is permitted only when inactive,
    /// per the lifecycle rule. On success, recursively destroys owned
    /// children (they cannot be referenced by anything but this node).
    pub fn destroy(&mut self, id: ExprId) -> crate::error::Result<()> {
        let (owned_children, had_listeners, was_active) = {
            let occ = self.occupied_mut(id).expect("destroy: stale ExprId");
            (occ.owned_children.clone(), !occ.meta.listeners.is_empty(), occ.meta.active_count > 0)
        };
        if was_active || had_listeners {
            return Err(crate::error::PlanError::Other {
                node: arcstr::literal!("<graph>"),
                name: ArcStr::from(format!("{id}")),
                class: "expression",
                message: arcstr::literal!(
                    "destroy called while active or still referenced by a listener"
                ),
            });
        }
        let subs = self.expr(id).map(|e| e.subexpressions()).unwrap_or_default();
        for child in subs {
            self.remove_listener(child, id);
        }
        let slot = &mut self.slots[id.index as usize];
        slot.occupied = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        for child in owned_children {
            // best-effort: a child already destroyed transitively is fine.
            let _ = self.destroy(child);
        }
        Ok(())
    }

    pub fn is_active(&self, id: ExprId) -> bool {
        self.meta(id).map_or(false, |m| m.active_count > 0)
    }

    pub fn expr(&self, id: ExprId) -> Option<&dyn Expression> {
        self.occupied(id).and_then(|o| o.expr.as_deref())
    }

    pub(crate) fn meta(&self, id: ExprId) -> Option<&NodeMeta> {
        self.occupied(id).map(|o| &o.meta)
    }

    pub(crate) fn meta_mut(&mut self, id: ExprId) -> Option<&mut NodeMeta> {
        self.occupied_mut(id).map(|o| &mut o.meta)
    }

    pub(crate) fn take_expr(&mut self, id: ExprId) -> Option<Box<dyn Expression>> {
        self.occupied_mut(id).and_then(|o| o.expr.take())
    }

    pub(crate) fn put_expr(&mut self, id: ExprId, expr: Box<dyn Expression>) {
        if let Some(o) = self.occupied_mut(id) {
            o.expr = Some(expr);
        }
    }

    /// Public take/apply/put-back for a collaborator outside this crate that
    /// needs mutable access to a concrete expression type hidden behind
    /// `dyn Expression` (the state cache driving a `LookupOnChange` through
    /// `Expression::as_any_mut`). `None` if `id` is stale.
    pub fn with_expr_mut<R>(&mut self, id: ExprId, f: impl FnOnce(&mut dyn Expression) -> R) -> Option<R> {
        let mut expr = self.take_expr(id)?;
        let result = f(expr.as_mut());
        self.put_expr(id, expr);
        Some(result)
    }

    pub(crate) fn in_propagation(&self) -> &fxhash::FxHashSet<ExprId> {
        &self.in_propagation
    }

    pub(crate) fn in_propagation_mut(&mut self) -> &mut fxhash::FxHashSet<ExprId> {
        &mut self.in_propagation
    }

    fn occupied(&self, id: ExprId) -> Option<&Occupied> {
        self.slots.get(id.index as usize).and_then(|s| {
            if s.generation == id.generation {
                s.occupied.as_ref()
            } else {
                None
            }
        })
    }

    fn occupied_mut(&mut self, id: ExprId) -> Option<&mut Occupied> {
        self.slots.get_mut(id.index as usize).and_then(|s| {
            if s.generation == id.generation {
                s.occupied.as_mut()
            } else {
                None
            }
        })
    }
}
