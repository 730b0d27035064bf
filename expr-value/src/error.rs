use crate::value::ValueType;

/// Errors raised by [`crate::Array`]/[`crate::AnyArray`] operations.
///
/// These are low-level and context-free by design: the caller (an
/// `ArrayVariable` or `ArrayReference` in `expr-core`) is responsible for
/// attaching the expression name, owning node id and class tag before
/// surfacing a `PlanError` to the host.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ArrayError {
    #[error("index {index} out of range for array of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("element type mismatch: array holds {expected}, got {found}")]
    ElementTypeMismatch { expected: ValueType, found: ValueType },
}

/// Errors raised by [`crate::Value`] parsing and narrowing conversions.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValueError {
    #[error("could not parse {text:?} as {ty}")]
    ParseFailure { ty: ValueType, text: String },

    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: ValueType, found: ValueType },
}
