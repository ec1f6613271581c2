//! Predicates and small helpers shared by the smart constructors, the simplifier and the
//! differentiation rules.

use log::debug;

use crate::errors::SymbolicsError;
use crate::expr::{Expr, ExprKind, Type};
use crate::matrix::Matrix;
use crate::operators::{mul, neg, pow};
use crate::shape::Shape;
use crate::types::SymbolicsResult;

/// Tolerance under which a real number is treated as an integer.
pub const INT_TOLERANCE: f64 = 1e-13;

/// Whether `e` is known to be zero: a `Zero` of any shape, a zero-valued number, a matrix of
/// zeros, or the negation of one of these.
pub fn is_zero(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::Zero(_) => true,
        ExprKind::Int(v) => *v == 0,
        ExprKind::Real(v) => *v == 0.0,
        ExprKind::Matrix(m) => m.values().iter().all(is_zero),
        ExprKind::Neg(inner) => is_zero(inner),
        _ => false,
    }
}

/// Whether `e` is known to be one: a number equal to `1`, a vector of ones, an identity
/// matrix, or the negation of `-1`.
pub fn is_one(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::Int(_) | ExprKind::Real(_) => e.numeric_value() == Some(1.0),
        ExprKind::Matrix(m) if m.shape().is_vector() => m.values().iter().all(is_one),
        ExprKind::Matrix(m) if m.shape().is_matrix() && m.shape().is_square() => {
            *m == Matrix::identity(m.shape().dim1())
        }
        ExprKind::Neg(inner) => inner.numeric_value() == Some(-1.0),
        _ => false,
    }
}

/// Whether `e` depends on no symbol.
pub fn is_const(e: &Expr) -> bool {
    e.atoms().is_empty()
}

/// Whether a node of type `ty` occurs anywhere in `e`.
pub fn has_function(e: &Expr, ty: Type) -> bool {
    let mut found = false;
    e.scan(&mut |node: &Expr| {
        if node.ty() == ty {
            found = true;
        }
        !found
    });
    found
}

/// The integer value of `e`, if `e` is an `Int` or a `Real` within [`INT_TOLERANCE`] of one.
pub fn is_int(e: &Expr) -> Option<i64> {
    match e.kind() {
        ExprKind::Int(v) => Some(*v),
        ExprKind::Zero(shape) if shape.is_scalar() => Some(0),
        ExprKind::Real(v) => {
            let rounded = v.round();
            ((v - rounded).abs() < INT_TOLERANCE && rounded.abs() < i64::MAX as f64)
                .then_some(rounded as i64)
        }
        _ => None,
    }
}

/// Multiplicative identity of `shape`: `1` for scalars, the identity matrix for square
/// matrices.
///
/// # Returns
/// The identity, or an `InternalError` for vector and non-square shapes
pub fn eye(shape: Shape) -> SymbolicsResult<Expr> {
    if shape.is_vector() {
        return Err(SymbolicsError::internal(
            "cannot generate Eye from Vector Shape!",
        ));
    }
    if !shape.is_square() {
        return Err(SymbolicsError::internal(
            "cannot generate Eye from Shape with different Dimensions!",
        ));
    }
    if shape.is_scalar() {
        return Ok(Expr::one());
    }
    Ok(Expr::from(Matrix::identity(shape.dim1())))
}

/// `a / b`, built as `a * b^-1`.
pub fn div(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    mul(a, &pow(b, &Expr::minus_one())?)
}

/// `x^0.5`
pub fn sqrt(x: &Expr) -> SymbolicsResult<Expr> {
    pow(x, &Expr::real(0.5))
}

/// Solves `e = 0` for `symbol`, provided `e` depends on it linearly.
///
/// The solution is `-e(symbol = 0) / (de / dsymbol)`.
///
/// # Arguments
/// * `e` - A scalar expression
/// * `symbol` - A scalar symbol
///
/// # Returns
/// `Some(solution)`, `None` if `e` is not linear in `symbol` (or does not depend on it), or
/// an `InternalError` for non-scalar arguments
pub fn solve_for(e: &Expr, symbol: &Expr) -> SymbolicsResult<Option<Expr>> {
    if !e.is_scalar() || !symbol.is_scalar() || symbol.as_symbol().is_none() {
        return Err(SymbolicsError::internal(format!(
            "solve_for needs a scalar expression and a scalar symbol, got {e} and {symbol}!"
        )));
    }
    debug!("solving {e} = 0 for {symbol}");
    let slope = e.der_wrt(symbol)?.simplify()?;
    if is_zero(&slope) || slope.atoms().contains(symbol) {
        return Ok(None);
    }
    let offset = e.subs(symbol, &Expr::zero())?.simplify()?;
    let solution = div(&neg(&offset)?, &slope)?.simplify()?;
    Ok(Some(solution))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::SymbolKind;
    use crate::operators::{add, cos, sin};

    fn sym(name: &str) -> Expr {
        Expr::symbol(name)
    }

    #[test]
    fn test_is_zero() {
        assert!(is_zero(&Expr::zero()));
        assert!(is_zero(&Expr::zeros(Shape::matrix(2, 2))));
        assert!(is_zero(&Expr::real(0.0)));
        assert!(is_zero(&Expr::from(Matrix::new(Shape::vector(3)))));
        assert!(!is_zero(&sym("x")));
        assert!(!is_zero(&Expr::int(1)));
    }

    #[test]
    fn test_is_one() {
        assert!(is_one(&Expr::one()));
        assert!(is_one(&Expr::real(1.0)));
        assert!(!is_one(&Expr::minus_one()));
        assert!(is_one(&Expr::from(Matrix::identity(3))));
        let ones = Matrix::from_values(vec![Expr::one(); 2], Shape::vector(2)).unwrap();
        assert!(is_one(&Expr::from(ones)));
        let full = Matrix::from_values(vec![Expr::one(); 4], Shape::matrix(2, 2)).unwrap();
        assert!(!is_one(&Expr::from(full)));
    }

    #[test]
    fn test_is_int() {
        assert_eq!(is_int(&Expr::int(-3)), Some(-3));
        assert_eq!(is_int(&Expr::real(2.0)), Some(2));
        assert_eq!(is_int(&Expr::real(2.0 + 1e-14)), Some(2));
        assert_eq!(is_int(&Expr::real(-1.0000001)), None);
        assert_eq!(is_int(&Expr::real(2.5)), None);
        assert_eq!(is_int(&sym("x")), None);
    }

    #[test]
    fn test_eye() {
        assert_eq!(eye(Shape::scalar()).unwrap(), Expr::one());
        let i = eye(Shape::matrix(2, 2)).unwrap();
        assert_eq!(i.to_string(), "matrix([1,0];[0,1])");
        assert!(matches!(eye(Shape::vector(2)), Err(SymbolicsError::InternalError(_))));
        assert!(matches!(
            eye(Shape::matrix(2, 3)),
            Err(SymbolicsError::InternalError(_))
        ));
    }

    #[test]
    fn test_has_function_and_const() {
        let e = add(&sin(&sym("x")).unwrap(), &cos(&Expr::int(2)).unwrap()).unwrap();
        assert!(has_function(&e, Type::Sin));
        assert!(!has_function(&e, Type::Cos));
        assert!(has_function(&e, Type::Add));
        assert!(!is_const(&e));
        assert!(is_const(&cos(&Expr::int(2)).unwrap()));
    }

    #[test]
    fn test_div_and_sqrt() {
        assert_eq!(div(&Expr::int(3), &Expr::int(4)).unwrap(), Expr::real(0.75));
        assert_eq!(div(&sym("x"), &sym("y")).unwrap().to_string(), "(x * (y)^-1)");
        assert_eq!(sqrt(&Expr::int(9)).unwrap(), Expr::int(3));
        assert_eq!(sqrt(&sym("x")).unwrap().to_string(), "(x)^0.5");
    }

    #[test]
    fn test_solve_for() {
        let (x, a) = (sym("x"), sym("a"));
        // 2*x - a = 0  ->  x = a/2
        let e = add(
            &mul(&Expr::int(2), &x).unwrap(),
            &neg(&a).unwrap(),
        )
        .unwrap();
        let solution = solve_for(&e, &x).unwrap().unwrap();
        assert_eq!(solution, mul(&Expr::real(0.5), &a).unwrap());

        // not linear in x
        let e = mul(&x, &x).unwrap();
        assert_eq!(solve_for(&e, &x).unwrap(), None);
        // independent of x
        assert_eq!(solve_for(&a, &x).unwrap(), None);

        let v = Expr::symbol_with("v", Shape::vector(2), SymbolKind::Variable);
        assert!(solve_for(&v, &x).is_err());
    }
}
