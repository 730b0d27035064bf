use expr_value::Value;

use crate::state::State;

/// The two threshold overloads the original interface exposes (§6):
/// numeric states are banded either as `Real` or as `Integer`, never mixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdBand {
    Real { hi: f64, lo: f64 },
    Integer { hi: i64, lo: i64 },
}

/// The external collaborator a state cache is built on top of (§6):
/// everything the core needs from whatever system actually owns the live
/// data (telemetry bus, simulator, a real spacecraft interface, ...).
///
/// `lookup_now` is the only method the core calls synchronously from the
/// exec thread; it is expected to return promptly (§5's "bounded synchronous
/// call owned by the interface layer"). Every other method is fire-and-
/// forget bookkeeping the interface uses to decide what to push later,
/// asynchronously, through [`crate::cache::Cache::update`].
pub trait Interface: Send + Sync {
    /// Sample `state` right now. Unknown states/arguments the interface
    /// cannot resolve should answer `Value::Unknown` rather than block.
    fn lookup_now(&self, state: &State) -> Value;

    fn subscribe(&self, state: &State);

    fn unsubscribe(&self, state: &State);

    fn set_thresholds(&self, state: &State, band: ThresholdBand);

    fn clear_thresholds(&self, state: &State);

    fn current_time(&self) -> f64;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use fxhash::FxHashMap;

    use super::*;

    /// An in-memory `Interface` double: `lookup_now` answers from a
    /// programmable table, and every subscribe/threshold call is recorded
    /// for assertions. Grounded on `TestInterface` in the reference
    /// material's lookup test (`lookupNow` switching on state name, a
    /// `ThresholdMap` recording the most recent `setThresholds` per state).
    #[derive(Default)]
    pub struct FakeInterface {
        pub answers: Mutex<FxHashMap<ArcStrKey, Value>>,
        pub subscribed: Mutex<FxHashMap<ArcStrKey, bool>>,
        pub thresholds: Mutex<FxHashMap<ArcStrKey, ThresholdBand>>,
    }

    pub type ArcStrKey = arcstr::ArcStr;

    impl FakeInterface {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_answer(&self, name: &str, value: Value) {
            self.answers.lock().unwrap().insert(arcstr::ArcStr::from(name), value);
        }

        pub fn thresholds_for(&self, name: &str) -> Option<ThresholdBand> {
            self.thresholds.lock().unwrap().get(&arcstr::ArcStr::from(name)).copied()
        }

        pub fn is_subscribed(&self, name: &str) -> bool {
            self.subscribed.lock().unwrap().get(&arcstr::ArcStr::from(name)).copied().unwrap_or(false)
        }
    }

    impl Interface for FakeInterface {
        fn lookup_now(&self, state: &State) -> Value {
            self.answers.lock().unwrap().get(&state.name).cloned().unwrap_or(Value::Unknown)
        }

        fn subscribe(&self, state: &State) {
            self.subscribed.lock().unwrap().insert(state.name.clone(), true);
        }

        fn unsubscribe(&self, state: &State) {
            self.subscribed.lock().unwrap().insert(state.name.clone(), false);
        }

        fn set_thresholds(&self, state: &State, band: ThresholdBand) {
            self.thresholds.lock().unwrap().insert(state.name.clone(), band);
        }

        fn clear_thresholds(&self, state: &State) {
            self.thresholds.lock().unwrap().remove(&state.name);
        }

        fn current_time(&self) -> f64 {
            0.0
        }
    }
}
