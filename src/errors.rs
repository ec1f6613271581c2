//! Error types for the symbolics crate.
//!
//! Every fallible operation of the engine reports one of three kinds of failure:
//!
//! - `ShapeError`: operand dimensionalities are incompatible (e.g. adding a 3-vector to a
//!   2x2 matrix, `Atan2` of a matrix, a `Matrix` built from the wrong number of values)
//! - `IndexError`: out-of-bounds element access, or an `Inserter` that received the wrong
//!   number of values
//! - `InternalError`: an invariant violation or an unsupported construct reached at runtime
//!   (second derivatives, an argument of a type an operator cannot take)
//!
//! None of these are meant to be retried. They signal that the expression being built is
//! invalid, and callers decide whether to propagate, convert or abort.

use thiserror::Error;

/// Errors raised while building, simplifying or differentiating expressions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolicsError {
    /// Error when operand shapes cannot be combined
    #[error("ShapeError: {0}")]
    ShapeError(String),
    /// Error when an element index lies outside of a matrix or an insertion count is wrong
    #[error("IndexError: {0}")]
    IndexError(String),
    /// Error when an engine invariant is violated or an unsupported operation is requested
    #[error("InternalError: {0}")]
    InternalError(String),
}

impl SymbolicsError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        SymbolicsError::ShapeError(msg.into())
    }

    pub(crate) fn index(msg: impl Into<String>) -> Self {
        SymbolicsError::IndexError(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        SymbolicsError::InternalError(msg.into())
    }
}
