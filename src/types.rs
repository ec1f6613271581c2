use std::collections::{BTreeMap, BTreeSet};

use crate::errors::SymbolicsError;
use crate::expr::Expr;

/// Result type returned by every fallible operation of the engine.
pub type SymbolicsResult<T> = Result<T, SymbolicsError>;

/// Ordered list of child expressions.
///
/// Used for the argument lists of n-ary nodes and for the row-major element
/// storage of a `Matrix`.
pub type ExprVec = Vec<Expr>;

/// Set of expressions ordered by the canonical expression order.
///
/// This is what `Expr::atoms` returns: every distinct `Symbol` in a DAG,
/// regardless of how often it is shared.
pub type ExprSet = BTreeSet<Expr>;

/// Map keyed by expressions in canonical order.
///
/// The simplifier uses it to collect like terms (term -> coefficient) and
/// like factors (base -> exponent) in a deterministic order.
pub type ExprMap = BTreeMap<Expr, Expr>;
