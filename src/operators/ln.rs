//! Smart constructor for the natural logarithm.

use crate::expr::{Expr, ExprKind};
use crate::types::SymbolicsResult;
use crate::util::is_one;

/// Natural logarithm.
///
/// `log(1)` is zero and positive numbers are folded. Matrices are mapped elementwise.
pub fn log(x: &Expr) -> SymbolicsResult<Expr> {
    if x.is_scalar() && is_one(x) {
        return Ok(Expr::zero());
    }
    match (x.kind(), x.numeric_value()) {
        (_, Some(v)) if v > 0.0 => Ok(Expr::real(v.ln())),
        (ExprKind::Matrix(m), _) => Ok(Expr::from(m.map_elements(log)?)),
        _ => Expr::build(ExprKind::Log(x.clone())),
    }
}
