//! Smart constructors for time derivatives and opaque functions.

use crate::errors::SymbolicsError;
use crate::expr::{Expr, ExprKind};
use crate::types::{ExprVec, SymbolicsResult};

/// Time derivative of `x`.
///
/// Constants vanish, matrices are differentiated elementwise and every other expression is
/// expanded with [`Expr::der`].
///
/// # Returns
/// The derivative, or an `InternalError` when `x` is itself a time derivative
pub fn der(x: &Expr) -> SymbolicsResult<Expr> {
    match x.kind() {
        ExprKind::Zero(_) => Ok(x.clone()),
        ExprKind::Int(_) | ExprKind::Real(_) => Ok(Expr::zero()),
        ExprKind::Matrix(m) => Ok(Expr::from(m.map_elements(der)?)),
        ExprKind::Der(_) => Err(SymbolicsError::internal(
            "Derivative of Der is not supported!",
        )),
        _ => x.der(),
    }
}

/// Opaque named function of `args`. Its shape is the broadcast of the argument shapes.
pub fn unknown(name: &str, args: ExprVec) -> SymbolicsResult<Expr> {
    Expr::build(ExprKind::Unknown(name.to_string(), args))
}
