use std::hash::{Hash, Hasher};

use arcstr::ArcStr;
use smallvec::SmallVec;

use expr_value::Value;

/// The identity the external Interface keys its data on: a name plus a
/// (usually short) parameter list (§4.8). Two states with the same name and
/// bitwise-equal parameters are the same cache entry.
#[derive(Debug, Clone)]
pub struct State {
    pub name: ArcStr,
    pub parameters: SmallVec<[Value; 2]>,
}

impl State {
    pub fn new(name: ArcStr, parameters: SmallVec<[Value; 2]>) -> Self {
        Self { name, parameters }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.parameters == other.parameters
    }
}

impl Eq for State {}

/// `Value` has no derived `Hash` (its `Real`/`Date`/`Duration` payload is an
/// `f64`), so this hashes numeric payloads via `to_bits()` — consistent with
/// `PartialEq`'s bitwise comparison, not [`Value::semantic_eq`]'s promotion.
fn hash_value(v: &Value, state: &mut impl Hasher) {
    std::mem::discriminant(v).hash(state);
    match v {
        Value::Unknown => {}
        Value::Boolean(b) => b.hash(state),
        Value::Integer(i) => i.hash(state),
        Value::Real(r) | Value::Date(r) | Value::Duration(r) => r.to_bits().hash(state),
        Value::String(s) => s.hash(state),
        Value::NodeState(v) => (*v as u8).hash(state),
        Value::NodeOutcome(v) => (*v as u8).hash(state),
        Value::FailureType(v) => (*v as u8).hash(state),
        Value::CommandHandle(v) => (*v as u8).hash(state),
        // Array-valued state parameters are not part of the expected usage
        // (§4.8 calls parameters a `Value[]` of scalars); hash on size alone
        // so a `State` built with one is still usable as a map key rather
        // than panicking.
        Value::BooleanArray(a) => a.size().hash(state),
        Value::IntegerArray(a) => a.size().hash(state),
        Value::RealArray(a) => a.size().hash(state),
        Value::StringArray(a) => a.size().hash(state),
    }
}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.parameters.len().hash(state);
        for p in &self.parameters {
            hash_value(p, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(s: &State) -> u64 {
        let mut h = fxhash::FxHasher::default();
        s.hash(&mut h);
        h.finish()
    }

    #[test]
    fn equal_states_hash_equal() {
        let a = State::new(ArcStr::from("alt"), SmallVec::from_slice(&[Value::String(ArcStr::from("A"))]));
        let b = State::new(ArcStr::from("alt"), SmallVec::from_slice(&[Value::String(ArcStr::from("A"))]));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn different_parameters_are_different_states() {
        let a = State::new(ArcStr::from("alt"), SmallVec::from_slice(&[Value::Integer(1)]));
        let b = State::new(ArcStr::from("alt"), SmallVec::from_slice(&[Value::Integer(2)]));
        assert_ne!(a, b);
    }
}
