use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use expr_core::{ExprId, Graph};
use expr_value::Value;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::Mutex;

use crate::interface::{Interface, ThresholdBand};
use crate::scheduler::Scheduler;
use crate::state::State;

/// Monotonic bit transform so an `f64`'s total order (for the finite,
/// non-NaN tolerances and sampled values this cache ever sees) matches the
/// natural order of the transformed `u64`. Lets the tightest-band multisets
/// below use a plain `BTreeMap` instead of a float-aware ordered-set crate.
fn order_key(f: f64) -> u64 {
    let bits = f.to_bits();
    if f.is_sign_negative() {
        !bits
    } else {
        bits | (1 << 63)
    }
}

fn from_order_key(k: u64) -> f64 {
    let bits = if k & (1 << 63) != 0 { k & !(1 << 63) } else { !k };
    f64::from_bits(bits)
}

/// An ordered multiset of `f64`s supporting O(log n) insert/remove/min/max —
/// the "ordered multiset of tolerances" the design calls for so that one
/// subscriber joining, leaving, or changing its tolerance doesn't force an
/// O(n) rescan of every other subscriber to find the new tightest band.
#[derive(Debug, Default)]
struct Multiset(BTreeMap<u64, usize>);

impl Multiset {
    fn insert(&mut self, v: f64) {
        *self.0.entry(order_key(v)).or_insert(0) += 1;
    }

    fn remove(&mut self, v: f64) {
        let k = order_key(v);
        if let Some(count) = self.0.get_mut(&k) {
            *count -= 1;
            if *count == 0 {
                self.0.remove(&k);
            }
        }
    }

    fn min(&self) -> Option<f64> {
        self.0.keys().next().copied().map(from_order_key)
    }

    fn max(&self) -> Option<f64> {
        self.0.keys().next_back().copied().map(from_order_key)
    }
}

#[derive(Debug, Clone)]
struct Subscriber {
    tolerance: Option<f64>,
    latched: Value,
}

/// Per-state cache record (§4.8): the most recent sample, the cycle it was
/// taken in, and the set of `LookupOnChange` subscribers each with their own
/// latched value and tolerance.
#[derive(Debug)]
struct CacheEntry {
    last_value: Value,
    last_cycle: Option<u64>,
    subscribers: FxHashMap<ExprId, Subscriber>,
    lower_bounds: Multiset,
    upper_bounds: Multiset,
    thresholds: Option<ThresholdBand>,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            last_value: Value::Unknown,
            last_cycle: None,
            subscribers: FxHashMap::default(),
            lower_bounds: Multiset::default(),
            upper_bounds: Multiset::default(),
            thresholds: None,
        }
    }
}

impl CacheEntry {
    fn bounds_of(sub: &Subscriber) -> Option<(f64, f64)> {
        let tol = sub.tolerance?;
        let latched = sub.latched.as_numeric()?;
        Some((latched - tol, latched + tol))
    }

    fn remove_bounds(&mut self, sub: &Subscriber) {
        if let Some((lo, hi)) = Self::bounds_of(sub) {
            self.lower_bounds.remove(lo);
            self.upper_bounds.remove(hi);
        }
    }

    fn insert_bounds(&mut self, sub: &Subscriber) {
        if let Some((lo, hi)) = Self::bounds_of(sub) {
            self.lower_bounds.insert(lo);
            self.upper_bounds.insert(hi);
        }
    }
}

/// Bitwise-plus-tolerance comparison deciding whether a subscriber's latched
/// value should move to `new` (§4.8's per-subscriber latching). Identical
/// values never republish regardless of tolerance; otherwise a numeric
/// tolerance gates on drift, and anything else (including the very first
/// reading, latched value `Unknown`) republishes unconditionally.
fn drifted(old: &Value, new: &Value, tolerance: Option<f64>) -> bool {
    if old == new {
        return false;
    }
    match tolerance {
        None => true,
        Some(tol) => match (old.as_numeric(), new.as_numeric()) {
            (Some(a), Some(b)) => (b - a).abs() >= tol,
            _ => true,
        },
    }
}

/// The state cache (§4.8): the seam between the reactive graph's lazy
/// `LookupNow`/`LookupOnChange` reads and an external [`Interface`]. Owns no
/// `Graph` reference itself — `drain_updates` is handed one explicitly by
/// the exec loop so that notification (`Graph::publish_changed`) happens
/// only at the well-defined once-per-macro-step point §5 describes.
pub struct Cache {
    entries: Mutex<FxHashMap<State, CacheEntry>>,
    inbound: Mutex<VecDeque<(State, Value)>>,
    interface: Arc<dyn Interface>,
    scheduler: Arc<Scheduler>,
}

impl Cache {
    pub fn new(interface: Arc<dyn Interface>, scheduler: Arc<Scheduler>) -> Self {
        Self { entries: Mutex::new(FxHashMap::default()), inbound: Mutex::new(VecDeque::new()), interface, scheduler }
    }

    /// `LookupNow`'s synchronous pull path: if the entry was not sampled
    /// this cycle, ask the interface and stamp it fresh.
    pub fn ensure_fresh(&self, state: &State) -> Value {
        let current_cycle = self.scheduler.current_cycle();
        let mut entries = self.entries.lock();
        let entry = entries.entry(state.clone()).or_default();
        if entry.last_cycle != Some(current_cycle) {
            entry.last_value = self.interface.lookup_now(state);
            entry.last_cycle = Some(current_cycle);
        }
        entry.last_value.clone()
    }

    /// Subscribe `id` to `state` with an optional known tolerance (`None`
    /// means "unknown tolerance", which republishes on every change). If the
    /// state has never been sampled, seeds it with a synchronous
    /// `lookup_now` so the new subscriber has an initial value to read
    /// immediately, matching the always-notifies-on-first-activation
    /// behavior exercised by S3/S4. Returns the subscriber's initial latched
    /// value.
    pub fn subscribe(&self, state: &State, id: ExprId, tolerance: Option<f64>) -> Value {
        let current_cycle = self.scheduler.current_cycle();
        let mut entries = self.entries.lock();
        let entry = entries.entry(state.clone()).or_default();
        if entry.last_cycle.is_none() {
            entry.last_value = self.interface.lookup_now(state);
            entry.last_cycle = Some(current_cycle);
        }
        let sub = Subscriber { tolerance, latched: entry.last_value.clone() };
        entry.insert_bounds(&sub);
        let latched = sub.latched.clone();
        entry.subscribers.insert(id, sub);
        self.interface.subscribe(state);
        self.recompute_thresholds(state, entry);
        latched
    }

    pub fn unsubscribe(&self, state: &State, id: ExprId) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(state) else { return };
        if let Some(sub) = entry.subscribers.remove(&id) {
            entry.remove_bounds(&sub);
        }
        if entry.subscribers.is_empty() {
            self.interface.unsubscribe(state);
        }
        self.recompute_thresholds(state, entry);
    }

    /// Update a subscriber's tolerance in place (the state name/parameter
    /// expressions are unaffected). Returns whether the subscriber's latched
    /// value moved as a result — the caller (`LookupOnChange::on_source_changed`)
    /// uses this to decide whether to keep propagating the change.
    pub fn set_tolerance(&self, state: &State, id: ExprId, tolerance: Option<f64>) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(state) else { return false };
        let Some(mut sub) = entry.subscribers.remove(&id) else { return false };
        entry.remove_bounds(&sub);
        sub.tolerance = tolerance;
        let changed = drifted(&sub.latched, &entry.last_value, tolerance);
        if changed {
            sub.latched = entry.last_value.clone();
        }
        entry.insert_bounds(&sub);
        entry.subscribers.insert(id, sub);
        self.recompute_thresholds(state, entry);
        changed
    }

    /// The value a specific subscriber currently has latched — what its
    /// `read()` answers, distinct from the shared `entry.last_value`.
    pub fn subscriber_value(&self, state: &State, id: ExprId) -> Value {
        let entries = self.entries.lock();
        entries.get(state).and_then(|e| e.subscribers.get(&id)).map(|s| s.latched.clone()).unwrap_or(Value::Unknown)
    }

    /// Producer-thread entry point (§5): the interface's own timer/I-O
    /// thread calls this to hand off a fresh sample. Only enqueues — no
    /// cache mutation or notification happens here, so this is safe to call
    /// from any thread without touching the graph.
    pub fn update(&self, state: State, value: Value) {
        self.inbound.lock().push_back((state, value));
    }

    /// Exec-thread drain point (§5): called once per macro-step, before
    /// lookups re-evaluate. Applies every queued update, recomputes
    /// thresholds, and — only now, back on the exec thread — calls
    /// `Graph::publish_changed` for every subscriber whose latched value
    /// moved.
    pub fn drain_updates(&self, graph: &mut Graph) {
        let current_cycle = self.scheduler.current_cycle();
        let batch: Vec<(State, Value)> = {
            let mut inbound = self.inbound.lock();
            inbound.drain(..).collect()
        };
        let mut to_publish: FxHashSet<ExprId> = FxHashSet::default();
        {
            let mut entries = self.entries.lock();
            for (state, value) in batch {
                let entry = entries.entry(state.clone()).or_default();
                entry.last_value = value.clone();
                entry.last_cycle = Some(current_cycle);
                let changed_ids: Vec<ExprId> = entry
                    .subscribers
                    .iter()
                    .filter(|(_, sub)| drifted(&sub.latched, &value, sub.tolerance))
                    .map(|(id, _)| *id)
                    .collect();
                for id in changed_ids {
                    if let Some(mut sub) = entry.subscribers.remove(&id) {
                        entry.remove_bounds(&sub);
                        sub.latched = value.clone();
                        entry.insert_bounds(&sub);
                        entry.subscribers.insert(id, sub);
                    }
                    to_publish.insert(id);
                }
                self.recompute_thresholds(&state, entry);
            }
        }
        for id in to_publish {
            graph.publish_changed(id);
        }
    }

    fn recompute_thresholds(&self, state: &State, entry: &mut CacheEntry) {
        match (entry.lower_bounds.max(), entry.upper_bounds.min()) {
            (Some(lo), Some(hi)) => {
                let band = if matches!(entry.last_value, Value::Integer(_)) {
                    ThresholdBand::Integer { hi: hi.round() as i64, lo: lo.round() as i64 }
                } else {
                    ThresholdBand::Real { hi, lo }
                };
                if entry.thresholds != Some(band) {
                    entry.thresholds = Some(band);
                    self.interface.set_thresholds(state, band);
                }
            }
            _ => {
                if entry.thresholds.is_some() {
                    entry.thresholds = None;
                    self.interface.clear_thresholds(state);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use arcstr::ArcStr;
    use smallvec::SmallVec;

    use super::*;
    use crate::interface::test_support::FakeInterface;

    fn id(n: u32) -> ExprId {
        // Exercised only as an opaque map key in these tests; construct via
        // a throwaway graph insert rather than reaching into expr-core's
        // private representation.
        let mut g = Graph::new();
        let mut last = None;
        for _ in 0..=n {
            last = Some(g.insert(Box::new(expr_core::Constant::unknown(expr_value::ValueType::Integer)), []));
        }
        last.unwrap()
    }

    fn state(name: &str) -> State {
        State::new(ArcStr::from(name), SmallVec::new())
    }

    #[test]
    fn s3_lookup_on_change_deadband() {
        let iface = Arc::new(FakeInterface::new());
        iface.set_answer("alt", Value::Real(1.0));
        let sched = Arc::new(Scheduler::new());
        let cache = Cache::new(iface.clone(), sched);
        let sub = id(0);
        let st = state("alt");

        let initial = cache.subscribe(&st, sub, Some(0.5));
        assert_eq!(initial, Value::Real(1.0));

        cache.update(st.clone(), Value::Real(1.4));
        let mut g = Graph::new();
        cache.drain_updates(&mut g);
        assert_eq!(cache.subscriber_value(&st, sub), Value::Real(1.0));

        cache.update(st.clone(), Value::Real(1.6));
        cache.drain_updates(&mut g);
        assert_eq!(cache.subscriber_value(&st, sub), Value::Real(1.6));

        match iface.thresholds_for("alt").unwrap() {
            ThresholdBand::Real { hi, lo } => {
                assert!((hi - 2.1).abs() < 1e-9);
                assert!((lo - 1.1).abs() < 1e-9);
            }
            _ => panic!("expected a Real band"),
        }
    }

    #[test]
    fn s4_tighter_tolerance_wins_the_shared_band() {
        let iface = Arc::new(FakeInterface::new());
        iface.set_answer("s", Value::Real(0.0));
        let sched = Arc::new(Scheduler::new());
        let cache = Cache::new(iface.clone(), sched);
        let st = state("s");
        let a = id(0);
        let b = id(1);

        cache.subscribe(&st, a, Some(0.5));
        cache.subscribe(&st, b, Some(0.25));
        match iface.thresholds_for("s").unwrap() {
            ThresholdBand::Real { hi, lo } => {
                assert_eq!(hi, 0.25);
                assert_eq!(lo, -0.25);
            }
            _ => panic!(),
        }

        cache.set_tolerance(&st, a, Some(1.0));
        match iface.thresholds_for("s").unwrap() {
            ThresholdBand::Real { hi, lo } => {
                assert_eq!(hi, 0.25);
                assert_eq!(lo, -0.25);
            }
            _ => panic!(),
        }

        cache.set_tolerance(&st, b, None);
        match iface.thresholds_for("s").unwrap() {
            ThresholdBand::Real { hi, lo } => {
                assert_eq!(hi, 1.0);
                assert_eq!(lo, -1.0);
            }
            _ => panic!(),
        }
    }
}
