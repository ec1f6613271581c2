//! Smart constructors for `abs` and `sign`.

use crate::expr::{Expr, ExprKind};
use crate::operators::arithmetic::neg;
use crate::types::SymbolicsResult;
use crate::util::is_int;

/// Absolute value.
pub fn abs(x: &Expr) -> SymbolicsResult<Expr> {
    match x.kind() {
        // abs(0) -> 0
        ExprKind::Zero(_) => Ok(x.clone()),
        ExprKind::Int(v) => Ok(v
            .checked_abs()
            .map(Expr::int)
            .unwrap_or_else(|| Expr::real((*v as f64).abs()))),
        ExprKind::Real(v) => Ok(Expr::real(v.abs())),
        // abs(-x) -> abs(x)
        ExprKind::Neg(inner) => abs(inner),
        // abs(abs(x)) -> abs(x)
        ExprKind::Abs(_) => Ok(x.clone()),
        // abs(x^2) -> x^2
        ExprKind::Pow(_, exponent) if is_int(exponent).is_some_and(|n| n % 2 == 0) => {
            Ok(x.clone())
        }
        ExprKind::Matrix(m) => Ok(Expr::from(m.map_elements(abs)?)),
        _ => Expr::build(ExprKind::Abs(x.clone())),
    }
}

/// Sign function: `1` for positive, `-1` for negative and `0` for zero arguments.
pub fn sign(x: &Expr) -> SymbolicsResult<Expr> {
    match x.kind() {
        ExprKind::Zero(_) => Ok(x.clone()),
        ExprKind::Int(_) | ExprKind::Real(_) => {
            let v = x.numeric_value().unwrap_or_default();
            Ok(if v == 0.0 {
                Expr::zero()
            } else if v > 0.0 {
                Expr::one()
            } else {
                Expr::minus_one()
            })
        }
        ExprKind::Bool(b) => Ok(Expr::integer(i64::from(*b))),
        // sign(-x) -> -sign(x)
        ExprKind::Neg(inner) => neg(&sign(inner)?),
        // sign(sign(x)) -> sign(x)
        ExprKind::Sign(_) => Ok(x.clone()),
        ExprKind::Matrix(m) => Ok(Expr::from(m.map_elements(sign)?)),
        _ => Expr::build(ExprKind::Sign(x.clone())),
    }
}
