//! Smart constructors for comparisons and the conditional.
//!
//! Comparisons of numbers (or of two truth values, for `equal`) fold to a `Bool`, which in
//! turn lets `if_then_else` select its branch.

use crate::expr::{Expr, ExprKind};
use crate::types::SymbolicsResult;

/// Folds a comparison when both operands are numbers.
fn compare(
    kind: ExprKind,
    a: &Expr,
    b: &Expr,
    op: fn(f64, f64) -> bool,
) -> SymbolicsResult<Expr> {
    let raw = Expr::build(kind)?;
    match (a.numeric_value(), b.numeric_value()) {
        (Some(x), Some(y)) => Ok(Expr::boolean(op(x, y))),
        _ => Ok(raw),
    }
}

pub fn equal(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    if let (Some(x), Some(y)) = (a.as_bool(), b.as_bool()) {
        return Ok(Expr::boolean(x == y));
    }
    compare(ExprKind::Equal(a.clone(), b.clone()), a, b, |x, y| x == y)
}

pub fn greater(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    compare(ExprKind::Greater(a.clone(), b.clone()), a, b, |x, y| x > y)
}

pub fn less(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    compare(ExprKind::Less(a.clone(), b.clone()), a, b, |x, y| x < y)
}

/// `if condition then a else b`. Both branches must have the same shape.
pub fn if_then_else(condition: &Expr, a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    let raw = Expr::build(ExprKind::If(condition.clone(), a.clone(), b.clone()))?;
    match condition.as_bool() {
        Some(true) => Ok(a.clone()),
        Some(false) => Ok(b.clone()),
        None => Ok(raw),
    }
}
