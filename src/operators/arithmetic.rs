//! Smart constructors for sums, products and negation.
//!
//! These apply the cheap local rules (identity elimination, constant folding, matrix
//! arithmetic, flattening) when a node is built. The canonicalising passes that collect like
//! terms and factors run in `simplify`.

use crate::errors::SymbolicsError;
use crate::expr::{Expr, ExprKind};
use crate::types::{ExprVec, SymbolicsResult};
use crate::util::{is_one, is_zero};

/// Folds two scalar numeric leaves with the given integer and float operations.
///
/// Integer results that overflow fall back to floating point.
pub(crate) fn fold_numbers(
    a: &Expr,
    b: &Expr,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    real_op: impl Fn(f64, f64) -> f64,
) -> Option<Expr> {
    let (x, y) = (a.numeric_value()?, b.numeric_value()?);
    let as_int = |e: &Expr| match e.kind() {
        ExprKind::Int(v) => Some(*v),
        ExprKind::Zero(_) => Some(0),
        _ => None,
    };
    if let (Some(i), Some(j)) = (as_int(a), as_int(b)) {
        if let Some(v) = int_op(i, j) {
            return Some(Expr::integer(v));
        }
    }
    Some(Expr::real(real_op(x, y)))
}

fn flatten_into(e: &Expr, ty: fn(&ExprKind) -> Option<&ExprVec>, out: &mut ExprVec) {
    match ty(e.kind()) {
        Some(args) => out.extend(args.iter().cloned()),
        None => out.push(e.clone()),
    }
}

fn add_args(kind: &ExprKind) -> Option<&ExprVec> {
    match kind {
        ExprKind::Add(args) => Some(args),
        _ => None,
    }
}

fn mul_args(kind: &ExprKind) -> Option<&ExprVec> {
    match kind {
        ExprKind::Mul(args) => Some(args),
        _ => None,
    }
}

/// Sum of two expressions.
///
/// # Arguments
/// * `a` - The left operand
/// * `b` - The right operand
///
/// # Returns
/// The sum, or a `ShapeError` if the operand shapes are not conformable
pub fn add(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    let shape = a.shape().combine_elementwise(&b.shape())?;

    // 0 + x -> x, x + 0 -> x
    if is_zero(a) && b.shape() == shape {
        return Ok(b.clone());
    }
    if is_zero(b) && a.shape() == shape {
        return Ok(a.clone());
    }
    // Fold constants: 1 + 2 -> 3
    if let Some(folded) = fold_numbers(a, b, i64::checked_add, |x, y| x + y) {
        return Ok(folded);
    }
    match (a.kind(), b.kind()) {
        (ExprKind::Matrix(m1), ExprKind::Matrix(m2)) => return Ok(Expr::from(m1.add(m2)?)),
        (ExprKind::Matrix(m), _) if b.is_scalar() => return Ok(Expr::from(m.add_scalar(b)?)),
        (_, ExprKind::Matrix(m)) if a.is_scalar() => return Ok(Expr::from(m.add_scalar(a)?)),
        _ => {}
    }
    let mut args = Vec::new();
    flatten_into(a, add_args, &mut args);
    flatten_into(b, add_args, &mut args);
    Expr::build(ExprKind::Add(args))
}

/// `a - b`, built as `a + (-b)`.
pub fn sub(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    add(a, &neg(b)?)
}

/// Product of two expressions.
///
/// Non-scalar operands multiply as matrices, so the operand order matters.
///
/// # Arguments
/// * `a` - The left operand
/// * `b` - The right operand
///
/// # Returns
/// The product, or a `ShapeError` if the inner dimensions differ
pub fn mul(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    let shape = a.shape().combine_matmul(&b.shape())?;

    // x * 0 -> 0
    if is_zero(a) || is_zero(b) {
        return Ok(Expr::zeros(shape));
    }
    // x * 1 -> x
    if is_one(a) && b.shape() == shape {
        return Ok(b.clone());
    }
    if is_one(b) && a.shape() == shape {
        return Ok(a.clone());
    }
    // Fold constants: 2 * 3 -> 6
    if let Some(folded) = fold_numbers(a, b, i64::checked_mul, |x, y| x * y) {
        return Ok(folded);
    }
    match (a.kind(), b.kind()) {
        (ExprKind::Matrix(m1), ExprKind::Matrix(m2)) => {
            let product = m1.mul(m2)?;
            if product.shape().is_scalar() {
                return product.get_index(0);
            }
            return Ok(Expr::from(product));
        }
        (ExprKind::Matrix(m), _) if b.is_scalar() => return Ok(Expr::from(m.scale(b)?)),
        (_, ExprKind::Matrix(m)) if a.is_scalar() => return Ok(Expr::from(m.scale(a)?)),
        _ => {}
    }
    let mut args = Vec::new();
    flatten_into(a, mul_args, &mut args);
    flatten_into(b, mul_args, &mut args);
    Expr::build(ExprKind::Mul(args))
}

/// Negation.
///
/// A product with a leading numeric coefficient absorbs the sign into the coefficient, so
/// `-(2*x)` becomes `-2*x`.
pub fn neg(x: &Expr) -> SymbolicsResult<Expr> {
    match x.kind() {
        // -0 -> 0
        ExprKind::Zero(_) => Ok(x.clone()),
        ExprKind::Int(v) => Ok(v
            .checked_neg()
            .map(Expr::int)
            .unwrap_or_else(|| Expr::real(-(*v as f64)))),
        ExprKind::Real(v) => Ok(Expr::real(-v)),
        ExprKind::Bool(b) => Ok(Expr::boolean(!b)),
        // --x -> x
        ExprKind::Neg(inner) => Ok(inner.clone()),
        ExprKind::Matrix(m) => Ok(Expr::from(m.neg()?)),
        ExprKind::Mul(args) if args.len() > 1 && args[0].is_number() => {
            let coeff = neg(&args[0])?;
            let rest = &args[1..];
            if is_one(&coeff) {
                return match rest {
                    [single] => Ok(single.clone()),
                    _ => Expr::build(ExprKind::Mul(rest.to_vec())),
                };
            }
            let mut factors = Vec::with_capacity(args.len());
            factors.push(coeff);
            factors.extend(rest.iter().cloned());
            Expr::build(ExprKind::Mul(factors))
        }
        _ => Expr::build(ExprKind::Neg(x.clone())),
    }
}

/// Sums a list of terms with [`add`], starting from `Zero`.
pub fn sum(terms: &[Expr]) -> SymbolicsResult<Expr> {
    terms.iter().try_fold(Expr::zero(), |acc, t| add(&acc, t))
}

/// Multiplies a list of factors with [`mul`] from left to right.
pub fn product(factors: &[Expr]) -> SymbolicsResult<Expr> {
    let (first, rest) = factors
        .split_first()
        .ok_or_else(|| SymbolicsError::internal("product of an empty list of factors!"))?;
    rest.iter().try_fold(first.clone(), |acc, f| mul(&acc, f))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::SymbolKind;
    use crate::matrix::Matrix;
    use crate::shape::Shape;

    fn sym(name: &str) -> Expr {
        Expr::symbol(name)
    }

    #[test]
    fn test_add_folding() {
        assert_eq!(add(&Expr::int(1), &Expr::int(2)).unwrap(), Expr::int(3));
        let r = add(&Expr::real(1.0), &Expr::int(1)).unwrap();
        assert_eq!(r, Expr::real(2.0));
        assert!(r.as_real().is_some());
        let z = add(&Expr::int(2), &Expr::int(-2)).unwrap();
        assert!(matches!(z.kind(), ExprKind::Zero(_)));
    }

    #[test]
    fn test_add_identity_and_flatten() {
        let x = sym("x");
        assert!(add(&Expr::zero(), &x).unwrap().ptr_eq(&x));
        assert!(add(&x, &Expr::int(0)).unwrap().ptr_eq(&x));

        let xy = add(&x, &sym("y")).unwrap();
        let xyz = add(&xy, &sym("z")).unwrap();
        assert_eq!(xyz.args().len(), 3);
        assert_eq!(xyz.to_string(), "(x + y + z)");

        // a shaped zero is kept when it determines the shape of the sum
        let v = Expr::symbol_with("v", Shape::vector(2), SymbolKind::Variable);
        assert!(add(&Expr::zero(), &v).unwrap().ptr_eq(&v));
        let shaped = add(&Expr::zeros(Shape::vector(2)), &x).unwrap();
        assert_eq!(shaped.shape(), Shape::vector(2));
    }

    #[test]
    fn test_add_matrix() {
        let m = Matrix::from_values(vec![Expr::int(1), sym("a")], Shape::vector(2)).unwrap();
        let m = Expr::from(m);
        let r = add(&m, &Expr::int(1)).unwrap();
        assert_eq!(r.to_string(), "vector([2,(a + 1)])");
        let r = add(&m, &m).unwrap();
        assert_eq!(r.as_matrix().unwrap().get_index(0).unwrap(), Expr::int(2));

        let w = Expr::symbol_with("w", Shape::vector(3), SymbolKind::Variable);
        assert!(matches!(add(&m, &w), Err(SymbolicsError::ShapeError(_))));
    }

    #[test]
    fn test_mul_rules() {
        let x = sym("x");
        assert_eq!(mul(&Expr::int(2), &Expr::int(3)).unwrap(), Expr::int(6));
        assert_eq!(mul(&Expr::real(0.5), &Expr::int(4)).unwrap(), Expr::int(2));
        assert!(mul(&Expr::one(), &x).unwrap().ptr_eq(&x));
        assert_eq!(mul(&x, &Expr::zero()).unwrap(), Expr::zero());

        let m = Expr::symbol_with("M", Shape::matrix(2, 3), SymbolKind::Variable);
        let z = mul(&Expr::zero(), &m).unwrap();
        assert_eq!(z, Expr::zeros(Shape::matrix(2, 3)));

        let xyz = mul(&mul(&x, &sym("y")).unwrap(), &sym("z")).unwrap();
        assert_eq!(xyz.to_string(), "(x * y * z)");

        assert!(matches!(mul(&m, &m), Err(SymbolicsError::ShapeError(_))));
    }

    #[test]
    fn test_mul_matrices() {
        let a = Matrix::from_values(vec![sym("a"), sym("b")], Shape::vector(2)).unwrap();
        let a = Expr::from(a);
        let scaled = mul(&Expr::int(2), &a).unwrap();
        assert_eq!(scaled.to_string(), "vector([(2 * a),(2 * b)])");

        let row = Expr::from(a.as_matrix().unwrap().transpose());
        let dot = mul(&row, &a).unwrap();
        assert!(dot.is_scalar());
        assert_eq!(dot.to_string(), "((a * a) + (b * b))");
    }

    #[test]
    fn test_neg() {
        let x = sym("x");
        assert_eq!(neg(&Expr::int(3)).unwrap(), Expr::int(-3));
        assert_eq!(neg(&neg(&x).unwrap()).unwrap(), x);
        assert_eq!(neg(&Expr::boolean(true)).unwrap(), Expr::boolean(false));
        let two_x = mul(&Expr::int(2), &x).unwrap();
        assert_eq!(neg(&two_x).unwrap().to_string(), "(-2 * x)");
        let minus_x = mul(&Expr::minus_one(), &x).unwrap();
        assert!(neg(&minus_x).unwrap().ptr_eq(&x));
        assert_eq!(sub(&x, &x).unwrap().to_string(), "(x - x)");
    }

    #[test]
    fn test_sum_and_product() {
        let terms = vec![Expr::int(1), sym("x"), Expr::int(2)];
        assert_eq!(sum(&terms).unwrap().to_string(), "(1 + x + 2)");
        assert_eq!(product(&terms).unwrap().to_string(), "(x * 2)");
        assert!(product(&[]).is_err());
    }
}
