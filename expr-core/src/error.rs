use arcstr::ArcStr;
use expr_value::ValueType;

/// Construction-time failure: a shape or typing violation discovered while
/// a factory builds an expression from an AST fragment. Always fatal to the
/// enclosing plan load; never raised once the graph is running.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("{operator} requires {expected} argument(s), got {found}")]
    ArityMismatch { operator: ArcStr, expected: &'static str, found: usize },

    #[error("{name}: expected type {expected}, resolved variable has type {found}")]
    TypeMismatch { name: ArcStr, expected: ValueType, found: ValueType },

    #[error("{name}: no variable or expression visible under this name")]
    UnresolvedName { name: ArcStr },

    #[error("read-only alias over {name} may not narrow a wider runtime type ({found}) to {expected}")]
    AliasNarrows { name: ArcStr, expected: ValueType, found: ValueType },

    #[error("{0}")]
    Other(ArcStr),
}

/// Runtime failure: a violation that can only be detected once the graph is
/// evaluating. Aborts the current plan step with enough context (expression
/// name, owning node id, class tag) for the host to print a diagnostic; the
/// host decides whether to fail the owning node or the whole plan.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanError {
    #[error("[{node}] {name} ({class}): index {index} out of range for array of size {size}")]
    IndexOutOfRange { node: ArcStr, name: ArcStr, class: &'static str, index: i64, size: usize },

    #[error("[{node}] {name} ({class}): array of size {found} exceeds declared max size {max}")]
    ArrayTooLarge { node: ArcStr, name: ArcStr, class: &'static str, found: usize, max: usize },

    #[error("[{node}] {name} ({class}): element type mismatch, expected {expected}, got {found}")]
    ElementTypeMismatch {
        node: ArcStr,
        name: ArcStr,
        class: &'static str,
        expected: ValueType,
        found: ValueType,
    },

    #[error("[{node}] {name} ({class}): expression is not assignable")]
    NotAssignable { node: ArcStr, name: ArcStr, class: &'static str },

    #[error("[{node}] {name} ({class}): deactivate called with activation count already zero")]
    ActivationUnderflow { node: ArcStr, name: ArcStr, class: &'static str },

    #[error("[{node}] {name} ({class}): cannot coerce value of type {found} into a slot of type {expected}")]
    TypeCoercionFailure {
        node: ArcStr,
        name: ArcStr,
        class: &'static str,
        expected: ValueType,
        found: ValueType,
    },

    #[error("[{node}] {name} ({class}): max-size expression is unknown or negative")]
    UninitializedSize { node: ArcStr, name: ArcStr, class: &'static str },

    /// Raised by an arithmetic operator's `apply`, which has no expression
    /// identity of its own to attach (it runs inside `Function::read`,
    /// given only argument values) — `class` carries the operator name
    /// (`"ADD"`, `"REAL_TO_INT"`, ...) so the host can still tell which
    /// computation overflowed.
    #[error("integer overflow evaluating {class}")]
    IntegerOverflow { class: &'static str },

    #[error("[{node}] {name} ({class}): {message}")]
    Other { node: ArcStr, name: ArcStr, class: &'static str, message: ArcStr },
}

pub type Result<T> = std::result::Result<T, PlanError>;
