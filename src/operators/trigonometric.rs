//! Smart constructors for trigonometric functions and their inverses.
//!
//! Rules applied when a node is built:
//! - numeric arguments are folded to `Real`
//! - a function applied to its own inverse cancels (`sin(asin(x)) -> x`)
//! - odd functions pull a negation out (`sin(-x) -> -sin(x)`), `cos` drops it
//! - a `Matrix` argument is mapped elementwise
//!
//! Every function except `atan2` accepts any shape and keeps it.

use crate::expr::{Expr, ExprKind};
use crate::matrix::Matrix;
use crate::operators::arithmetic::neg;
use crate::types::SymbolicsResult;

/// A folded value, unless it left the domain of the function.
fn finite(v: f64) -> Option<Expr> {
    v.is_finite().then(|| Expr::real(v))
}

/// Shared rules of the odd functions `sin`, `tan`, `asin` and `atan`.
fn odd_function(
    x: &Expr,
    f: fn(&Expr) -> SymbolicsResult<Expr>,
    eval: fn(f64) -> f64,
    inverse: fn(&ExprKind) -> Option<&Expr>,
    build: fn(Expr) -> ExprKind,
) -> SymbolicsResult<Expr> {
    if let Some(inner) = inverse(x.kind()) {
        return Ok(inner.clone());
    }
    match x.kind() {
        // f(0) -> 0
        ExprKind::Zero(_) => Ok(x.clone()),
        ExprKind::Int(_) | ExprKind::Real(_) => {
            match finite(eval(x.numeric_value().unwrap_or_default())) {
                Some(v) => Ok(v),
                None => Expr::build(build(x.clone())),
            }
        }
        // f(-x) -> -f(x)
        ExprKind::Neg(inner) => neg(&f(inner)?),
        ExprKind::Matrix(m) => Ok(Expr::from(m.map_elements(f)?)),
        _ => Expr::build(build(x.clone())),
    }
}

fn asin_arg(kind: &ExprKind) -> Option<&Expr> {
    match kind {
        ExprKind::Asin(inner) => Some(inner),
        _ => None,
    }
}

fn atan_arg(kind: &ExprKind) -> Option<&Expr> {
    match kind {
        ExprKind::Atan(inner) => Some(inner),
        _ => None,
    }
}

fn sin_arg(kind: &ExprKind) -> Option<&Expr> {
    match kind {
        ExprKind::Sin(inner) => Some(inner),
        _ => None,
    }
}

fn tan_arg(kind: &ExprKind) -> Option<&Expr> {
    match kind {
        ExprKind::Tan(inner) => Some(inner),
        _ => None,
    }
}

pub fn sin(x: &Expr) -> SymbolicsResult<Expr> {
    odd_function(x, sin, f64::sin, asin_arg, ExprKind::Sin)
}

pub fn tan(x: &Expr) -> SymbolicsResult<Expr> {
    odd_function(x, tan, f64::tan, atan_arg, ExprKind::Tan)
}

pub fn asin(x: &Expr) -> SymbolicsResult<Expr> {
    odd_function(x, asin, f64::asin, sin_arg, ExprKind::Asin)
}

pub fn atan(x: &Expr) -> SymbolicsResult<Expr> {
    odd_function(x, atan, f64::atan, tan_arg, ExprKind::Atan)
}

/// Cosine. Shaped zeros give a matrix of ones.
pub fn cos(x: &Expr) -> SymbolicsResult<Expr> {
    match x.kind() {
        // cos(0) -> 1
        ExprKind::Zero(shape) if shape.is_scalar() => Ok(Expr::one()),
        ExprKind::Zero(shape) => Ok(Expr::from(Matrix::from_values(
            vec![Expr::one(); shape.num_el()],
            *shape,
        )?)),
        ExprKind::Int(_) | ExprKind::Real(_) => {
            Ok(Expr::real(x.numeric_value().unwrap_or_default().cos()))
        }
        // cos(acos(x)) -> x
        ExprKind::Acos(inner) => Ok(inner.clone()),
        // cos(-x) -> cos(x)
        ExprKind::Neg(inner) => cos(inner),
        ExprKind::Matrix(m) => Ok(Expr::from(m.map_elements(cos)?)),
        _ => Expr::build(ExprKind::Cos(x.clone())),
    }
}

pub fn acos(x: &Expr) -> SymbolicsResult<Expr> {
    match x.kind() {
        _ if x.numeric_value().is_some() => {
            match finite(x.numeric_value().unwrap_or_default().acos()) {
                Some(v) => Ok(v),
                None => Expr::build(ExprKind::Acos(x.clone())),
            }
        }
        // acos(cos(x)) -> x
        ExprKind::Cos(inner) => Ok(inner.clone()),
        ExprKind::Matrix(m) => Ok(Expr::from(m.map_elements(acos)?)),
        _ => Expr::build(ExprKind::Acos(x.clone())),
    }
}

/// Four-quadrant arc tangent of `y / x`. Both arguments must be scalar.
pub fn atan2(y: &Expr, x: &Expr) -> SymbolicsResult<Expr> {
    let raw = Expr::build(ExprKind::Atan2(y.clone(), x.clone()))?;
    match (y.numeric_value(), x.numeric_value()) {
        (Some(a), Some(b)) => Ok(Expr::real(a.atan2(b))),
        _ => Ok(raw),
    }
}
