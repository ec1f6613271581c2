//! Symbolic differentiation.
//!
//! Two derivatives are supported:
//! - the total time derivative [`Expr::der`], where variables depend on time and their
//!   derivatives stay symbolic as `der(x)`, while constants and parameters vanish
//! - the partial derivative [`Expr::der_wrt`] with respect to a symbol
//!
//! Both share one set of rules. Results are built from smart constructors where that keeps
//! them readable and from raw nodes for sums and products, so they are generally not
//! simplified. Call [`Expr::simplify`] on the result.

use log::debug;

use crate::errors::SymbolicsError;
use crate::expr::{Expr, ExprKind};
use crate::operators::{
    add, cos, der, element, equal, greater, if_then_else, inverse, less, log, mul, neg, outer,
    pow, scalar, sign, sin, skew, solve, sub, transpose, unknown,
};
use crate::types::{ExprVec, SymbolicsResult};
use crate::util::{div, eye, is_zero, sqrt};

impl Expr {
    /// Total time derivative.
    ///
    /// # Returns
    /// The derivative, or an `InternalError` for expressions whose time derivative is not
    /// defined (`Bool`) or not supported (derivatives of `der(..)`)
    pub fn der(&self) -> SymbolicsResult<Expr> {
        debug!("der({self})");
        self.derivative(None)
    }

    /// Partial derivative with respect to `symbol`.
    ///
    /// # Arguments
    /// * `symbol` - The symbol to differentiate by
    ///
    /// # Returns
    /// The derivative, or an `InternalError` for expressions whose partial derivative is not
    /// supported (`jacobian(..)`)
    pub fn der_wrt(&self, symbol: &Expr) -> SymbolicsResult<Expr> {
        debug!("der({self}, {symbol})");
        self.derivative(Some(symbol))
    }

    /// Applies the differentiation rules. `wrt` selects the partial derivative, `None` the
    /// time derivative.
    fn derivative(&self, wrt: Option<&Expr>) -> SymbolicsResult<Expr> {
        if let Some(s) = wrt {
            if self == s {
                return eye(self.shape());
            }
        }
        let d = |e: &Expr| e.derivative(wrt);
        match self.kind() {
            ExprKind::Zero(_) => Ok(self.clone()),
            ExprKind::Int(_) | ExprKind::Real(_) => Ok(Expr::zero()),
            ExprKind::Bool(_) => match wrt {
                None => Err(SymbolicsError::internal("Derivative of Bool does not exist!")),
                Some(_) => Ok(Expr::zero()),
            },
            ExprKind::Symbol(s) => match wrt {
                None if s.is_time_invariant() => Ok(Expr::zeros(self.shape())),
                None => Expr::build(ExprKind::Der(self.clone())),
                Some(_) => Ok(Expr::zeros(self.shape())),
            },
            ExprKind::Matrix(m) => Ok(Expr::from(m.map_elements(|v| v.derivative(wrt))?)),

            // d/dx(-f) = -(df/dx)
            ExprKind::Neg(a) => neg(&d(a)?),

            ExprKind::Add(args) => {
                // d/dx(f + g) = df/dx + dg/dx
                let terms = args.iter().map(d).collect::<SymbolicsResult<ExprVec>>()?;
                Expr::build(ExprKind::Add(terms))
            }

            ExprKind::Mul(args) => {
                // d/dx(f * g * h) = df/dx * g * h + f * dg/dx * h + f * g * dh/dx
                // Factors keep their position, non-scalar products do not commute.
                let mut terms = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    let mut factors = args.clone();
                    factors[i] = d(arg)?;
                    terms.push(Expr::build(ExprKind::Mul(factors))?);
                }
                Expr::build(ExprKind::Add(terms))
            }

            ExprKind::Pow(base, exponent) => power_rule(base, exponent, wrt),

            // d/dx(sin(f)) = cos(f) * df/dx
            ExprKind::Sin(a) => mul(&d(a)?, &cos(a)?),
            // d/dx(cos(f)) = -sin(f) * df/dx
            ExprKind::Cos(a) => neg(&mul(&d(a)?, &sin(a)?)?),
            // d/dx(tan(f)) = df/dx / cos(f)^2
            ExprKind::Tan(a) => div(&d(a)?, &pow(&cos(a)?, &Expr::int(2))?),
            // d/dx(asin(f)) = df/dx / sqrt(1 - f^2)
            ExprKind::Asin(a) => div(&d(a)?, &sqrt(&sub(&Expr::one(), &square(a)?)?)?),
            // d/dx(acos(f)) = -df/dx / sqrt(1 - f^2)
            ExprKind::Acos(a) => neg(&div(&d(a)?, &sqrt(&sub(&Expr::one(), &square(a)?)?)?)?),
            // d/dx(atan(f)) = df/dx / (1 + f^2)
            ExprKind::Atan(a) => div(&d(a)?, &add(&Expr::one(), &square(a)?)?),
            ExprKind::Atan2(y, x) => {
                // d/dx(atan2(y, x)) = (x * dy/dx - y * dx/dx) / (x^2 + y^2)
                let numerator = sub(&mul(x, &d(y)?)?, &mul(y, &d(x)?)?)?;
                div(&numerator, &add(&square(x)?, &square(y)?)?)
            }
            // d/dx|f| = sign(f) * df/dx
            ExprKind::Abs(a) => mul(&sign(a)?, &d(a)?),
            // sign is piecewise constant
            ExprKind::Sign(a) => Ok(Expr::zeros(a.shape())),
            // d/dx(ln(f)) = df/dx / f
            ExprKind::Log(a) => div(&d(a)?, a),

            ExprKind::Der(a) => match wrt {
                None => Err(SymbolicsError::internal(
                    "Derivative of Der is not supported!",
                )),
                Some(_) => der(&d(a)?),
            },

            ExprKind::Element(a, row, col) => {
                let da = d(a)?;
                // An opaque derivative of the argument stays opaque: der(a[i,j])
                if let ExprKind::Der(inner) = da.kind() {
                    if inner == a {
                        return Expr::build(ExprKind::Der(self.clone()));
                    }
                }
                element(&da, *row, *col)
            }
            ExprKind::Scalar(a) => scalar(&d(a)?),
            ExprKind::Skew(a) => skew(&d(a)?),
            ExprKind::Transpose(a) => transpose(&d(a)?),

            ExprKind::Solve(a, b) => {
                // x = A^-1 * b  =>  dx/dt = A^-1 * (db/dt - dA/dt * x)
                let x = solve(a, b)?;
                let rhs = sub(&d(b)?, &mul(&d(a)?, &x)?)?;
                solve(a, &rhs)
            }
            ExprKind::Inverse(a) => {
                // d/dx(A^-1) = -(A^-1 * dA/dx * A^-1)
                let inv = inverse(a)?;
                neg(&mul(&mul(&inv, &d(a)?)?, &inv)?)
            }
            ExprKind::Outer(a, b) => {
                // d/dx(a * b^T) = da/dx * b^T + a * db/dx^T
                add(&outer(&d(a)?, b)?, &outer(a, &d(b)?)?)
            }
            ExprKind::Jacobian(_, _) => match wrt {
                None => Expr::build(ExprKind::Der(self.clone())),
                Some(_) => Err(SymbolicsError::internal(
                    "Partial derivative of Jacobian is not supported!",
                )),
            },

            ExprKind::If(c, a, b) => if_then_else(c, &d(a)?, &d(b)?),
            ExprKind::Greater(a, b) => greater(&d(a)?, &d(b)?),
            ExprKind::Less(a, b) => less(&d(a)?, &d(b)?),
            ExprKind::Equal(a, b) => equal(&d(a)?, &d(b)?),

            ExprKind::Unknown(name, args) => match wrt {
                None => Expr::build(ExprKind::Der(self.clone())),
                Some(_) => {
                    let args = args.iter().map(d).collect::<SymbolicsResult<ExprVec>>()?;
                    unknown(name, args)
                }
            },
        }
    }
}

fn square(x: &Expr) -> SymbolicsResult<Expr> {
    pow(x, &Expr::int(2))
}

/// Derivative of `base^exponent`.
fn power_rule(base: &Expr, exponent: &Expr, wrt: Option<&Expr>) -> SymbolicsResult<Expr> {
    let d_base = base.derivative(wrt)?;
    let d_exponent = exponent.derivative(wrt)?;

    if !is_zero(&d_exponent) {
        if !base.is_scalar() {
            return Err(SymbolicsError::internal(format!(
                "Derivative of matrix power with variable exponent {exponent} is not supported!"
            )));
        }
        // d/dx(f^g) = f^g * (dg/dx * ln(f) + g * df/dx / f)
        let inner = add(
            &mul(&d_exponent, &log(base)?)?,
            &mul(exponent, &div(&d_base, base)?)?,
        )?;
        return mul(&pow(base, exponent)?, &inner);
    }

    if base.is_scalar() {
        // d/dx(f^n) = n * f^(n-1) * df/dx
        let reduced = pow(base, &sub(exponent, &Expr::one())?)?;
        return mul(exponent, &mul(&d_base, &reduced)?);
    }

    // Matrix powers do not commute with their derivative
    match exponent.as_int() {
        // d/dx(A^n) = sum_k A^k * dA/dx * A^(n-1-k)
        Some(n) if n > 0 => {
            let mut terms = Vec::with_capacity(n as usize);
            for k in 0..n {
                let left = pow(base, &Expr::int(k))?;
                let right = pow(base, &Expr::int(n - 1 - k))?;
                terms.push(mul(&mul(&left, &d_base)?, &right)?);
            }
            terms.iter().try_fold(Expr::zeros(base.shape()), |acc, t| add(&acc, t))
        }
        // d/dx(A^-1) = -(A^-1 * dA/dx * A^-1)
        Some(-1) => {
            let inv = pow(base, &Expr::minus_one())?;
            neg(&mul(&mul(&inv, &d_base)?, &inv)?)
        }
        _ => Err(SymbolicsError::internal(format!(
            "Derivative of matrix power with exponent {exponent} is not supported!"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::SymbolKind;
    use crate::matrix::Matrix;
    use crate::operators::{abs, atan2, jacobian};
    use crate::shape::Shape;

    fn sym(name: &str) -> Expr {
        Expr::symbol(name)
    }

    fn raw(kind: ExprKind) -> Expr {
        Expr::build(kind).unwrap()
    }

    fn der_of(e: &Expr) -> Expr {
        raw(ExprKind::Der(e.clone()))
    }

    #[test]
    fn test_symbol_rules() {
        let x = sym("x");
        assert_eq!(x.der().unwrap(), der_of(&x));
        assert_eq!(x.der_wrt(&x).unwrap(), Expr::one());
        assert_eq!(x.der_wrt(&sym("y")).unwrap(), Expr::zero());

        let p = Expr::symbol_with("p", Shape::scalar(), SymbolKind::Parameter);
        assert_eq!(p.der().unwrap(), Expr::zero());
        assert_eq!(p.der_wrt(&p).unwrap(), Expr::one());

        let m = Expr::symbol_with("M", Shape::matrix(2, 2), SymbolKind::Variable);
        assert_eq!(m.der_wrt(&m).unwrap().to_string(), "matrix([1,0];[0,1])");
        let c = Expr::symbol_with("c", Shape::vector(3), SymbolKind::Constant);
        assert_eq!(c.der().unwrap(), Expr::zeros(Shape::vector(3)));
    }

    #[test]
    fn test_leaves() {
        assert_eq!(Expr::int(3).der().unwrap(), Expr::zero());
        assert_eq!(Expr::real(0.5).der_wrt(&sym("x")).unwrap(), Expr::zero());
        let z = Expr::zeros(Shape::vector(2));
        assert_eq!(z.der().unwrap(), z);
        assert!(matches!(
            Expr::boolean(true).der(),
            Err(SymbolicsError::InternalError(m)) if m == "Derivative of Bool does not exist!"
        ));
        assert_eq!(Expr::boolean(true).der_wrt(&sym("x")).unwrap(), Expr::zero());
    }

    #[test]
    fn test_linearity() {
        let (x, y) = (sym("x"), sym("y"));
        let e = raw(ExprKind::Add(vec![x.clone(), y.clone()]));
        let expected = raw(ExprKind::Add(vec![der_of(&x), der_of(&y)]));
        assert_eq!(e.der().unwrap(), expected);

        let e = raw(ExprKind::Mul(vec![x.clone(), y.clone()]));
        let expected = raw(ExprKind::Add(vec![
            raw(ExprKind::Mul(vec![der_of(&x), y.clone()])),
            raw(ExprKind::Mul(vec![x.clone(), der_of(&y)])),
        ]));
        assert_eq!(e.der().unwrap(), expected);

        let d = e.der_wrt(&x).unwrap();
        let expected = raw(ExprKind::Add(vec![
            raw(ExprKind::Mul(vec![Expr::one(), y.clone()])),
            raw(ExprKind::Mul(vec![x.clone(), Expr::zero()])),
        ]));
        assert_eq!(d, expected);
        assert!(d.simplify().unwrap().ptr_eq(&y));
    }

    #[test]
    fn test_product_keeps_factor_order() {
        let a = Expr::symbol_with("A", Shape::matrix(2, 2), SymbolKind::Variable);
        let b = Expr::symbol_with("B", Shape::matrix(2, 2), SymbolKind::Variable);
        let e = raw(ExprKind::Mul(vec![a.clone(), b.clone()]));
        let d = e.der().unwrap().simplify().unwrap();
        assert_eq!(d.to_string(), "((A * der(B)) + (der(A) * B))");
    }

    #[test]
    fn test_power_rule() {
        let (x, y) = (sym("x"), sym("y"));
        let e = pow(&x, &Expr::int(3)).unwrap();
        assert_eq!(e.der_wrt(&x).unwrap().to_string(), "(3 * (x)^2)");

        let e = pow(&x, &y).unwrap();
        let d = e.der_wrt(&y).unwrap().simplify().unwrap();
        assert_eq!(d.to_string(), "((x)^y * log(x))");

        let m = Expr::symbol_with("M", Shape::matrix(2, 2), SymbolKind::Variable);
        let d = pow(&m, &Expr::int(2)).unwrap().der().unwrap().simplify().unwrap();
        assert_eq!(d.to_string(), "((M * der(M)) + (der(M) * M))");
        assert!(pow(&m, &y).unwrap().der_wrt(&y).is_err());
    }

    #[test]
    fn test_trig_rules() {
        let x = sym("x");
        assert_eq!(sin(&x).unwrap().der_wrt(&x).unwrap(), cos(&x).unwrap());
        assert_eq!(
            cos(&x).unwrap().der_wrt(&x).unwrap(),
            neg(&sin(&x).unwrap()).unwrap()
        );
        let d = cos(&x).unwrap().der().unwrap();
        assert_eq!(d.to_string(), "-((der(x) * sin(x)))");

        // atan2(y, x) with respect to x is -y / (x^2 + y^2)
        let y = sym("y");
        let d = atan2(&y, &x).unwrap().der_wrt(&x).unwrap().simplify().unwrap();
        let expected = raw(ExprKind::Neg(raw(ExprKind::Mul(vec![
            y.clone(),
            raw(ExprKind::Pow(
                raw(ExprKind::Add(vec![
                    raw(ExprKind::Pow(x.clone(), Expr::int(2))),
                    raw(ExprKind::Pow(y.clone(), Expr::int(2))),
                ])),
                Expr::minus_one(),
            )),
        ]))));
        assert_eq!(d, expected);
    }

    #[test]
    fn test_abs_and_sign() {
        let x = sym("x");
        let d = abs(&x).unwrap().der_wrt(&x).unwrap();
        assert_eq!(d.to_string(), "Sign(x)");
        assert_eq!(sign(&x).unwrap().der().unwrap(), Expr::zero());
    }

    #[test]
    fn test_der_of_der() {
        let x = sym("x");
        let dx = x.der().unwrap();
        assert!(matches!(
            dx.der(),
            Err(SymbolicsError::InternalError(m)) if m == "Derivative of Der is not supported!"
        ));
        // der(x) is an independent variable for partial derivatives
        assert_eq!(dx.der_wrt(&dx).unwrap(), Expr::one());
        assert_eq!(dx.der_wrt(&x).unwrap(), Expr::zero());
    }

    #[test]
    fn test_element_of_symbol() {
        let v = Expr::symbol_with("v", Shape::vector(3), SymbolKind::Variable);
        let e = element(&v, 1, 0).unwrap();
        let d = e.der().unwrap();
        assert_eq!(d.to_string(), "der(Element(v,1,0))");
        assert_eq!(element(&v.der().unwrap(), 1, 0).unwrap(), d);
        assert_eq!(e.der_wrt(&e).unwrap(), Expr::one());
        assert_eq!(e.der_wrt(&sym("x")).unwrap(), Expr::zero());
    }

    #[test]
    fn test_matrix_elementwise() {
        let x = sym("x");
        let m = Matrix::from_values(
            vec![pow(&x, &Expr::int(2)).unwrap(), Expr::int(4)],
            Shape::vector(2),
        )
        .unwrap();
        let d = Expr::from(m).der_wrt(&x).unwrap().simplify().unwrap();
        assert_eq!(d.to_string(), "vector([(2 * x),0])");
    }

    #[test]
    fn test_linear_algebra_rules() {
        let a = Expr::symbol_with("A", Shape::matrix(2, 2), SymbolKind::Variable);
        let d = inverse(&a).unwrap().der().unwrap();
        assert_eq!(
            d.to_string(),
            "-((Inverse(A) * der(A) * Inverse(A)))"
        );

        let b = Expr::symbol_with("b", Shape::vector(2), SymbolKind::Constant);
        let p = Expr::symbol_with("P", Shape::matrix(2, 2), SymbolKind::Parameter);
        assert_eq!(solve(&p, &b).unwrap().der().unwrap(), Expr::zeros(Shape::vector(2)));

        let u = Expr::symbol_with("u", Shape::vector(2), SymbolKind::Variable);
        let d = outer(&u, &b).unwrap().der().unwrap();
        assert_eq!(d.to_string(), "Outer(der(u),b)");

        let t = transpose(&u).unwrap();
        assert_eq!(t.der().unwrap().to_string(), "Transpose(der(u))");
    }

    #[test]
    fn test_jacobian() {
        let (x, y) = (sym("x"), sym("y"));
        let w = Expr::symbol_with("w", Shape::vector(2), SymbolKind::Variable);
        let j = jacobian(&mul(&x, &y).unwrap(), &w).unwrap();
        assert_eq!(j.der().unwrap(), der_of(&j));
        assert!(matches!(
            j.der_wrt(&x),
            Err(SymbolicsError::InternalError(m))
                if m == "Partial derivative of Jacobian is not supported!"
        ));
    }

    #[test]
    fn test_unknown_and_if() {
        let (x, y) = (sym("x"), sym("y"));
        let f = unknown("f", vec![x.clone(), y.clone()]).unwrap();
        assert_eq!(f.der().unwrap(), der_of(&f));
        assert_eq!(f.der_wrt(&x).unwrap().to_string(), "f(1,0)");

        let c = greater(&x, &y).unwrap();
        let e = if_then_else(&c, &x, &mul(&Expr::int(2), &y).unwrap()).unwrap();
        let d = e.der_wrt(&y).unwrap().simplify().unwrap();
        assert_eq!(d.to_string(), "If(greater(x,y) then 0 else 2)");
    }
}
