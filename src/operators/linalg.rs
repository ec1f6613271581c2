//! Smart constructors for the linear algebra nodes.
//!
//! Each constructor validates its shapes through the raw node first, then applies its local
//! rules:
//! - `transpose` and `inverse` cancel themselves and pull negations out
//! - `element`, `scalar` and `skew` are evaluated directly on explicit matrices
//! - `outer` and `solve` fold trivial operands
//! - `jacobian` is expanded into an explicit matrix when its symbols are given explicitly

use log::debug;

use crate::errors::SymbolicsError;
use crate::expr::{Expr, ExprKind};
use crate::matrix::Matrix;
use crate::operators::arithmetic::{add, neg};
use crate::operators::function::der;
use crate::operators::pow::pow;
use crate::shape::Shape;
use crate::types::{ExprVec, SymbolicsResult};
use crate::util::{div, is_const, is_one, is_zero};

/// Entry `(row, col)` of `x`.
///
/// # Returns
/// The entry, or an `IndexError` if the indices lie outside the shape of `x`
pub fn element(x: &Expr, row: usize, col: usize) -> SymbolicsResult<Expr> {
    let raw = Expr::build(ExprKind::Element(x.clone(), row, col))?;
    if x.is_scalar() {
        return Ok(x.clone());
    }
    match x.kind() {
        ExprKind::Zero(_) => Ok(Expr::zero()),
        ExprKind::Matrix(m) => m.get(row, col),
        ExprKind::Neg(inner) => neg(&element(inner, row, col)?),
        ExprKind::Transpose(inner) => element(inner, col, row),
        ExprKind::Skew(v) => {
            let v_i = |i: usize| element(v, i, 0);
            match (row, col) {
                (0, 1) => neg(&v_i(2)?),
                (0, 2) => v_i(1),
                (1, 0) => v_i(2),
                (1, 2) => neg(&v_i(0)?),
                (2, 0) => neg(&v_i(1)?),
                (2, 1) => v_i(0),
                _ => Ok(Expr::zero()),
            }
        }
        ExprKind::Der(inner) => der(&element(inner, row, col)?),
        ExprKind::Add(args) => args.iter().try_fold(Expr::zero(), |acc, a| {
            let entry = if a.is_scalar() {
                a.clone()
            } else {
                element(a, row, col)?
            };
            add(&acc, &entry)
        }),
        _ => Ok(raw),
    }
}

/// Scalar view of a `(1,1)` shaped expression.
pub fn scalar(x: &Expr) -> SymbolicsResult<Expr> {
    let raw = Expr::build(ExprKind::Scalar(x.clone()))?;
    if x.is_scalar() {
        return Ok(x.clone());
    }
    match x.kind() {
        ExprKind::Zero(_) => Ok(Expr::zero()),
        ExprKind::Matrix(m) => m.get_index(0),
        ExprKind::Neg(inner) => neg(&scalar(inner)?),
        _ => Ok(raw),
    }
}

/// Skew-symmetric matrix of a 3-vector, such that `skew(a) * b` is the cross product.
pub fn skew(x: &Expr) -> SymbolicsResult<Expr> {
    let raw = Expr::build(ExprKind::Skew(x.clone()))?;
    if is_zero(x) {
        return Ok(Expr::zeros(Shape::matrix(3, 3)));
    }
    match x.kind() {
        ExprKind::Matrix(m) => {
            let v = m.values();
            let values = vec![
                Expr::zero(),
                neg(&v[2])?,
                v[1].clone(),
                v[2].clone(),
                Expr::zero(),
                neg(&v[0])?,
                neg(&v[1])?,
                v[0].clone(),
                Expr::zero(),
            ];
            Ok(Expr::from(Matrix::from_values(values, Shape::matrix(3, 3))?))
        }
        ExprKind::Neg(inner) => neg(&skew(inner)?),
        _ => Ok(raw),
    }
}

pub fn transpose(x: &Expr) -> SymbolicsResult<Expr> {
    if x.is_scalar() {
        return Ok(x.clone());
    }
    match x.kind() {
        ExprKind::Zero(shape) => Ok(Expr::zeros(shape.transpose())),
        ExprKind::Matrix(m) => Ok(Expr::from(m.transpose())),
        // T(-x) -> -T(x)
        ExprKind::Neg(inner) => neg(&transpose(inner)?),
        // T(T(x)) -> x
        ExprKind::Transpose(inner) => Ok(inner.clone()),
        // T(c * X) -> c * T(X)
        ExprKind::Mul(args) if args.iter().any(Expr::is_scalar) => transpose_product(args),
        _ => Expr::build(ExprKind::Transpose(x.clone())),
    }
}

/// Pulls the scalar factors of a product out of its transpose.
///
/// The numeric coefficient stays in front and the other scalars follow the transposed
/// matrix part, which is the order `simplify` gives a product.
fn transpose_product(args: &[Expr]) -> SymbolicsResult<Expr> {
    let (scalars, others): (ExprVec, ExprVec) = args.iter().cloned().partition(Expr::is_scalar);
    let inner = match others.as_slice() {
        [single] => transpose(single)?,
        _ => Expr::build(ExprKind::Transpose(Expr::build(ExprKind::Mul(others))?))?,
    };
    let mut scalars = scalars.into_iter().peekable();
    let mut factors = Vec::with_capacity(args.len());
    if let Some(c) = scalars.next_if(Expr::is_number) {
        factors.push(c);
    }
    match inner.kind() {
        ExprKind::Mul(inner_args) => factors.extend(inner_args.iter().cloned()),
        _ => factors.push(inner),
    }
    factors.extend(scalars);
    Expr::build(ExprKind::Mul(factors))
}

/// Matrix inverse. The inverse of a scalar is its reciprocal.
pub fn inverse(x: &Expr) -> SymbolicsResult<Expr> {
    if x.is_scalar() {
        return pow(x, &Expr::minus_one());
    }
    let raw = Expr::build(ExprKind::Inverse(x.clone()))?;
    match x.kind() {
        // the zero matrix has no inverse; the node is kept symbolic as zero
        ExprKind::Zero(_) => Ok(x.clone()),
        ExprKind::Matrix(_) if is_one(x) => Ok(x.clone()),
        // inv(-x) -> -inv(x)
        ExprKind::Neg(inner) => neg(&inverse(inner)?),
        // inv(inv(x)) -> x
        ExprKind::Inverse(inner) => Ok(inner.clone()),
        _ => Ok(raw),
    }
}

/// Outer product `a * b^T` of two vectors of equal length.
pub fn outer(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    let raw = Expr::build(ExprKind::Outer(a.clone(), b.clone()))?;
    if is_zero(a) || is_zero(b) {
        return Ok(Expr::zeros(raw.shape()));
    }
    match (a.kind(), b.kind()) {
        (ExprKind::Matrix(m1), ExprKind::Matrix(m2)) => {
            let m2 = m2.transpose();
            Ok(Expr::from(m1.mul(&m2)?))
        }
        _ => Ok(raw),
    }
}

/// Solution `x` of the linear system `a * x = b`.
pub fn solve(a: &Expr, b: &Expr) -> SymbolicsResult<Expr> {
    let raw = Expr::build(ExprKind::Solve(a.clone(), b.clone()))?;
    // solve(A, 0) -> 0
    if is_zero(b) {
        return Ok(b.clone());
    }
    // solve(1, b) -> b
    if is_one(a) {
        return Ok(b.clone());
    }
    if a.is_scalar() && b.is_scalar() {
        return div(b, a);
    }
    Ok(raw)
}

/// Jacobian matrix of `e` with respect to a vector of symbols.
///
/// When `symbols` is an explicit `Matrix`, the Jacobian is expanded: entry `(j, i)` is the
/// partial derivative of the `j`-th entry of `e` with respect to the `i`-th symbol. A scalar
/// `e` gives a single row.
///
/// # Arguments
/// * `e` - A scalar or vector expression
/// * `symbols` - A vector whose entries are the variables to differentiate by
///
/// # Returns
/// The Jacobian, or an `InternalError` if `e` is a matrix or `symbols` is not a vector
pub fn jacobian(e: &Expr, symbols: &Expr) -> SymbolicsResult<Expr> {
    let raw = Expr::build(ExprKind::Jacobian(e.clone(), symbols.clone()))?;
    let shape = raw.shape();
    if is_const(e) {
        return Ok(Expr::zeros(shape));
    }
    let Some(vars) = symbols.as_matrix() else {
        return Ok(raw);
    };
    let entries: ExprVec = match e.kind() {
        _ if e.is_scalar() => vec![e.clone()],
        ExprKind::Matrix(m) => m.values().to_vec(),
        _ => return Ok(raw),
    };
    debug!("jacobian of {e} with respect to {symbols}");
    let mut values = Vec::with_capacity(shape.num_el());
    for entry in &entries {
        for var in vars.values() {
            if var.as_symbol().is_none() {
                return Err(SymbolicsError::internal(format!(
                    "Jacobian: {var} is not a symbol!"
                )));
            }
            values.push(entry.der_wrt(var)?.simplify()?);
        }
    }
    Ok(Expr::from(Matrix::from_values(values, shape)?))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::SymbolKind;
    use crate::operators::arithmetic::mul;
    use crate::operators::trigonometric::sin;

    fn sym(name: &str) -> Expr {
        Expr::symbol(name)
    }

    fn vector(names: &[&str]) -> Expr {
        let values = names.iter().map(|n| sym(n)).collect::<ExprVec>();
        let shape = Shape::vector(values.len());
        Expr::from(Matrix::from_values(values, shape).unwrap())
    }

    #[test]
    fn test_transpose() {
        let x = sym("x");
        assert!(transpose(&x).unwrap().ptr_eq(&x));
        assert_eq!(
            transpose(&Expr::zeros(Shape::vector(3))).unwrap(),
            Expr::zeros(Shape::row_vector(3))
        );
        let a = Expr::symbol_with("A", Shape::matrix(2, 3), SymbolKind::Variable);
        let at = transpose(&a).unwrap();
        assert_eq!(at.shape(), Shape::matrix(3, 2));
        assert!(transpose(&at).unwrap().ptr_eq(&a));
        assert_eq!(
            transpose(&neg(&a).unwrap()).unwrap().to_string(),
            "-(Transpose(A))"
        );
        assert_eq!(transpose(&vector(&["a", "b"])).unwrap().to_string(), "vector([a,b])'");

        // coefficients move out of the transpose, so both spellings meet
        let twice = mul(&Expr::int(2), &a).unwrap();
        let t = transpose(&twice).unwrap();
        assert_eq!(t.to_string(), "(2 * Transpose(A))");
        assert_eq!(transpose(&t).unwrap(), twice);
        assert_eq!(neg(&t).unwrap().to_string(), "(-2 * Transpose(A))");
        let x = sym("x");
        let scaled = mul(&mul(&Expr::int(3), &x).unwrap(), &a).unwrap();
        assert_eq!(transpose(&scaled).unwrap().to_string(), "(3 * Transpose(A) * x)");
    }

    #[test]
    fn test_element() {
        let v = vector(&["a", "b", "c"]);
        assert_eq!(element(&v, 1, 0).unwrap(), sym("b"));
        assert!(matches!(
            element(&v, 3, 0),
            Err(SymbolicsError::IndexError(m)) if m == "Element: Row outside range!"
        ));
        let x = sym("x");
        assert!(element(&x, 0, 0).unwrap().ptr_eq(&x));

        let a = Expr::symbol_with("A", Shape::matrix(2, 3), SymbolKind::Variable);
        let at = transpose(&a).unwrap();
        assert_eq!(element(&at, 2, 1).unwrap().to_string(), "Element(A,1,2)");
        assert_eq!(element(&Expr::zeros(Shape::matrix(2, 2)), 1, 1).unwrap(), Expr::zero());
        assert_eq!(
            element(&neg(&a).unwrap(), 0, 0).unwrap().to_string(),
            "-(Element(A,0,0))"
        );
    }

    #[test]
    fn test_element_of_skew() {
        let w = Expr::symbol_with("w", Shape::vector(3), SymbolKind::Variable);
        let s = skew(&w).unwrap();
        assert_eq!(element(&s, 0, 0).unwrap(), Expr::zero());
        assert_eq!(element(&s, 0, 1).unwrap().to_string(), "-(Element(w,2,0))");
        assert_eq!(element(&s, 2, 1).unwrap().to_string(), "Element(w,0,0)");
    }

    #[test]
    fn test_element_of_sum() {
        let v = Expr::symbol_with("v", Shape::vector(2), SymbolKind::Variable);
        let sum = add(&v, &sym("x")).unwrap();
        assert_eq!(
            element(&sum, 1, 0).unwrap().to_string(),
            "(Element(v,1,0) + x)"
        );
    }

    #[test]
    fn test_scalar() {
        let x = sym("x");
        assert!(scalar(&x).unwrap().ptr_eq(&x));
        let one = Expr::from(Matrix::from_values(vec![x.clone()], Shape::matrix(1, 1)).unwrap());
        assert!(scalar(&one).unwrap().ptr_eq(&x));
        let v = Expr::symbol_with("v", Shape::vector(2), SymbolKind::Variable);
        assert!(matches!(scalar(&v), Err(SymbolicsError::ShapeError(_))));
    }

    #[test]
    fn test_skew() {
        let v = vector(&["a", "b", "c"]);
        let s = skew(&v).unwrap();
        assert_eq!(s.to_string(), "matrix([0,-(c),b];[c,0,-(a)];[-(b),a,0])");
        assert_eq!(
            skew(&Expr::zeros(Shape::vector(3))).unwrap(),
            Expr::zeros(Shape::matrix(3, 3))
        );
        let w = Expr::symbol_with("w", Shape::vector(3), SymbolKind::Variable);
        assert_eq!(skew(&neg(&w).unwrap()).unwrap().to_string(), "-(Skew(w))");
        let u = Expr::symbol_with("u", Shape::vector(2), SymbolKind::Variable);
        assert!(matches!(skew(&u), Err(SymbolicsError::ShapeError(_))));

        // skew(a) * b is the cross product a x b
        let e = vector(&["d", "e", "f"]);
        let cross = mul(&s, &e).unwrap();
        assert_eq!(
            element(&cross, 0, 0).unwrap().to_string(),
            "((-(c) * e) + (b * f))"
        );
    }

    #[test]
    fn test_inverse() {
        let x = sym("x");
        assert_eq!(inverse(&x).unwrap().to_string(), "(x)^-1");
        let a = Expr::symbol_with("A", Shape::matrix(2, 2), SymbolKind::Variable);
        let inv = inverse(&a).unwrap();
        assert!(inverse(&inv).unwrap().ptr_eq(&a));
        assert_eq!(inverse(&neg(&a).unwrap()).unwrap().to_string(), "-(Inverse(A))");
        let id = Expr::from(Matrix::identity(2));
        assert!(inverse(&id).unwrap().ptr_eq(&id));
        let b = Expr::symbol_with("B", Shape::matrix(2, 3), SymbolKind::Variable);
        assert!(matches!(inverse(&b), Err(SymbolicsError::ShapeError(_))));
        let v = Expr::symbol_with("v", Shape::vector(2), SymbolKind::Variable);
        assert!(matches!(inverse(&v), Err(SymbolicsError::InternalError(_))));
    }

    #[test]
    fn test_outer() {
        let a = vector(&["a", "b"]);
        let c = vector(&["c", "d"]);
        let o = outer(&a, &c).unwrap();
        assert_eq!(o.to_string(), "matrix([(a * c),(a * d)];[(b * c),(b * d)])");
        let u = Expr::symbol_with("u", Shape::vector(2), SymbolKind::Variable);
        assert_eq!(
            outer(&Expr::zeros(Shape::vector(2)), &u).unwrap(),
            Expr::zeros(Shape::matrix(2, 2))
        );
        let w = Expr::symbol_with("w", Shape::vector(3), SymbolKind::Variable);
        assert!(matches!(outer(&u, &w), Err(SymbolicsError::ShapeError(_))));
    }

    #[test]
    fn test_solve() {
        let a = Expr::symbol_with("A", Shape::matrix(2, 2), SymbolKind::Variable);
        let b = Expr::symbol_with("b", Shape::vector(2), SymbolKind::Variable);
        assert_eq!(solve(&a, &b).unwrap().to_string(), "Solve(A,b)");
        let zero = Expr::zeros(Shape::vector(2));
        assert!(solve(&a, &zero).unwrap().ptr_eq(&zero));
        let id = Expr::from(Matrix::identity(2));
        assert!(solve(&id, &b).unwrap().ptr_eq(&b));
        assert_eq!(solve(&Expr::int(2), &Expr::int(6)).unwrap(), Expr::int(3));

        let c = Expr::symbol_with("c", Shape::vector(3), SymbolKind::Variable);
        assert!(matches!(solve(&a, &c), Err(SymbolicsError::ShapeError(_))));
        let wide = Expr::symbol_with("W", Shape::matrix(2, 3), SymbolKind::Variable);
        assert!(matches!(solve(&wide, &b), Err(SymbolicsError::ShapeError(_))));
    }

    #[test]
    fn test_jacobian() {
        let (x, y) = (sym("x"), sym("y"));
        let vars = vector(&["x", "y"]);

        // scalar expression: a single row
        let e = mul(&x, &y).unwrap();
        let j = jacobian(&e, &vars).unwrap();
        assert_eq!(j.shape(), Shape::matrix(1, 2));
        assert_eq!(j.to_string(), "matrix([y,x])");

        // vector expression: one row per entry
        let f = Expr::from(
            Matrix::from_values(vec![sin(&x).unwrap(), add(&x, &y).unwrap()], Shape::vector(2))
                .unwrap(),
        );
        let j = jacobian(&f, &vars).unwrap();
        assert_eq!(j.to_string(), "matrix([cos(x),0];[1,1])");

        // constant expression
        let j = jacobian(&Expr::int(3), &vars).unwrap();
        assert_eq!(j, Expr::zeros(Shape::matrix(1, 2)));

        let m = Expr::symbol_with("M", Shape::matrix(2, 2), SymbolKind::Variable);
        assert!(matches!(jacobian(&m, &vars), Err(SymbolicsError::InternalError(_))));
        assert!(matches!(jacobian(&x, &y), Err(SymbolicsError::InternalError(_))));
    }
}
