//! N-ary operator composition (§4.7): a [`Function`] expression pairs one
//! [`Operator`] with a fixed argument list. Each operator family
//! (boolean, arithmetic, comparison, string, array, `IsKnown`) lives in its
//! own submodule, mirroring the per-node-kind file split the teacher uses
//! for its own operator table.

mod arithmetic;
mod array_ops;
mod boolean;
mod compare;
mod is_known;
mod string_ops;

pub use arithmetic::{Abs, Add, Ceil, Div, Floor, Max, Min, Mod, Mul, RealToInt, Round, Sqrt, Sub, Trunc};
pub use array_ops::{AllKnown, AnyKnown, Size};
pub use boolean::{And, Not, Or, Xor};
pub use compare::{Eq, Ge, Gt, Le, Lt, Ne};
pub use is_known::IsKnown;
pub use string_ops::{Concat, StrLen};

use std::fmt;

use arcstr::ArcStr;
use smallvec::SmallVec;

use expr_value::{Value, ValueType};

use crate::arena::{ExprId, Graph};
use crate::error::{ParserError, Result};
use crate::expr::Expression;

/// Either a fixed arity (`Fixed(n)`) or an open-ended minimum (`AtLeast(n)`),
/// used by variadic operators (`AND`, `OR`, `CONCAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Fixed(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Arity::Fixed(0) => "0",
            Arity::Fixed(1) => "1",
            Arity::Fixed(2) => "2",
            Arity::Fixed(_) => "a fixed number of",
            Arity::AtLeast(1) => "at least 1",
            Arity::AtLeast(_) => "at least one",
        }
    }
}

/// The per-family behavior a [`Function`] delegates to. Implementations are
/// stateless: everything an operator needs to know is either its fixed
/// identity or derived from the argument values/types it is given.
pub trait Operator: fmt::Debug {
    fn name(&self) -> &'static str;

    fn arity(&self) -> Arity;

    /// The result type given the (already arity-checked) argument types.
    /// Most operators ignore the input and return a fixed type; arithmetic
    /// promotes to `Real` when any operand is `Real`/`Date`/`Duration`.
    fn result_type(&self, arg_types: &[ValueType]) -> ValueType;

    /// Reject argument type combinations this operator cannot apply to.
    /// Called once at construction time, not on every evaluation.
    fn check_arg_types(&self, arg_types: &[ValueType]) -> bool;

    /// Evaluate eagerly over already-read argument values. `Err` only for
    /// the handful of conditions that are `PlanError`s rather than a silent
    /// unknown result (see §7); everything else (an unknown operand, DIV by
    /// zero) returns `Ok(Value::Unknown)` or the operator's defined result.
    fn apply(&self, args: &[Value]) -> Result<Value>;
}

/// `operator(arg0, arg1, ...)`: the composite expression for every built-in
/// function. Activation walks every argument; each argument's listener set
/// includes this `Function` so an argument change triggers re-evaluation on
/// the next lazy read (§4.7).
#[derive(Debug)]
pub struct Function {
    name: ArcStr,
    operator: Box<dyn Operator>,
    args: SmallVec<[ExprId; 4]>,
    result_type: ValueType,
}

impl Function {
    /// Construct a `Function`, checking arity and argument types up front —
    /// a `ParserError` here is a construction-time failure, never raised
    /// once the graph is evaluating.
    pub fn new(
        name: ArcStr,
        operator: Box<dyn Operator>,
        args: SmallVec<[ExprId; 4]>,
        arg_types: &[ValueType],
    ) -> std::result::Result<Self, ParserError> {
        if !operator.arity().accepts(args.len()) {
            return Err(ParserError::ArityMismatch {
                operator: ArcStr::from(operator.name()),
                expected: operator.arity().describe(),
                found: args.len(),
            });
        }
        if !operator.check_arg_types(arg_types) {
            return Err(ParserError::Other(ArcStr::from(format!(
                "{}: argument types {:?} are not accepted",
                operator.name(),
                arg_types
            ))));
        }
        let result_type = operator.result_type(arg_types);
        Ok(Self { name, operator, args, result_type })
    }
}

impl Expression for Function {
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
        self.operator.name()
    }

    fn value_type(&self) -> ValueType {
        self.result_type
    }

    fn subexpressions(&self) -> SmallVec<[ExprId; 4]> {
        self.args.clone()
    }

    fn read(&self, graph: &Graph) -> Result<Value> {
        let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(self.args.len());
        for arg in &self.args {
            values.push(graph.read(*arg)?);
        }
        self.operator.apply(&values)
    }
}
