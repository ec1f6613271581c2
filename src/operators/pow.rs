//! Smart constructor for powers.
//!
//! The exponent is always scalar. It may be numeric (the common case, where most rules apply)
//! or symbolic, in which case the node is kept as is and differentiation uses the
//! exponential-log rule.

use crate::expr::{Expr, ExprKind};
use crate::matrix::Matrix;
use crate::operators::arithmetic::{mul, neg};
use crate::types::SymbolicsResult;
use crate::util::{eye, is_int, is_one, is_zero};

/// Raises `base` to `exponent`.
///
/// # Arguments
/// * `base` - A scalar or a square matrix
/// * `exponent` - A scalar
///
/// # Returns
/// The power, or a `ShapeError` for a non-scalar exponent, a vector base or a non-square
/// matrix base
pub fn pow(base: &Expr, exponent: &Expr) -> SymbolicsResult<Expr> {
    // Validate shapes before any shortcut
    let raw = Expr::build(ExprKind::Pow(base.clone(), exponent.clone()))?;

    // x^0 -> 1
    if is_zero(exponent) {
        return eye(base.shape());
    }
    // x^1 -> x
    if is_one(exponent) {
        return Ok(base.clone());
    }
    // Integral real exponents become integers: x^2.0 -> x^2
    if let (Some(_), Some(n)) = (exponent.as_real(), is_int(exponent)) {
        return pow(base, &Expr::int(n));
    }
    // 0^n -> 0, whichever number spells the zero
    if matches!(base.kind(), ExprKind::Zero(_)) || base.numeric_value() == Some(0.0) {
        return Ok(Expr::zeros(base.shape()));
    }
    // 1^n -> 1
    if base.is_scalar() && is_one(base) {
        return Ok(Expr::one());
    }
    // Fold constants: 2^3 -> 8
    if let (Some(b), Some(e)) = (base.numeric_value(), exponent.numeric_value()) {
        if let (Some(i), Some(n)) = (base.as_int(), exponent.as_int()) {
            if let Some(v) = u32::try_from(n).ok().and_then(|n| i.checked_pow(n)) {
                return Ok(Expr::integer(v));
            }
        }
        // (-8)^0.5 and overflows stay symbolic
        let v = b.powf(e);
        return Ok(if v.is_finite() { Expr::real(v) } else { raw });
    }

    match base.kind() {
        ExprKind::Matrix(m) if m.num_el() == 1 => {
            let value = pow(&m.get_index(0)?, exponent)?;
            Ok(Expr::from(Matrix::from_values(vec![value], m.shape())?))
        }
        ExprKind::Matrix(m) => match exponent.as_int() {
            Some(n) if n > 0 => {
                let mut result = m.clone();
                for _ in 1..n {
                    result = result.mul(m)?;
                }
                Ok(Expr::from(result))
            }
            Some(n) => {
                let positive = pow(base, &Expr::int(-n))?;
                Expr::build(ExprKind::Pow(positive, Expr::minus_one()))
            }
            None => Ok(raw),
        },
        // (x^a)^b -> x^(a*b)
        ExprKind::Pow(inner, a) => pow(inner, &mul(a, exponent)?),
        // (-x)^n -> x^n for even n, -(x^n) for odd n
        ExprKind::Neg(inner) => match is_int(exponent) {
            Some(n) if n % 2 == 0 => pow(inner, exponent),
            Some(_) => neg(&pow(inner, exponent)?),
            None => Ok(raw),
        },
        _ => Ok(raw),
    }
}
