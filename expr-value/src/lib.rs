//! Typed value and array model for the expression graph engine.
//!
//! Every value the graph computes is either a concrete, typed payload or the
//! distinguished "unknown" marker. [`Value`] is a closed tagged union over the
//! type list in [`ValueType`]; [`Array`] is the homogeneous, per-element-known
//! array storage shared by array variables, array references and the array
//! operators.

mod array;
mod enums;
mod error;
mod value;

pub use array::{AnyArray, Array};
pub use enums::{CommandHandle, FailureType, NodeOutcome, NodeState};
pub use error::{ArrayError, ValueError};
pub use value::{Value, ValueType};
