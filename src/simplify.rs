//! Bottom-up simplification.
//!
//! `Expr::simplify` first simplifies the children of a node, then re-applies the local rules
//! of the node's smart constructor to the simplified children. Sums and products have their
//! own canonicalising passes:
//!
//! - **Add**: nested sums are flattened, numeric terms are folded, explicit matrices are summed
//!   and like terms are collected (`2*x + x - y + y -> 3*x`). The result lists the numeric
//!   term first, followed by the remaining terms in canonical order.
//! - **Mul**: nested products are flattened, negations are pulled out, numeric factors are
//!   folded and scalar factors with the same base are merged into powers
//!   (`x * y * x^2 -> x^3 * y`). Non-scalar factors keep their relative order; adjacent
//!   explicit matrices are multiplied out.
//!
//! Every result is flagged as simplified, so simplifying it again (or any expression sharing
//! it) returns immediately.

use log::{debug, trace};

use crate::expr::{Expr, ExprKind};
use crate::matrix::Matrix;
use crate::operators::{self, add, mul, neg, pow};
use crate::shape::Shape;
use crate::types::{ExprMap, ExprVec, SymbolicsResult};
use crate::util::is_zero;

impl Expr {
    /// Returns the simplified form of this expression.
    ///
    /// The result is structurally canonical for the implemented rules, and simplifying it
    /// again yields an equal expression.
    ///
    /// # Returns
    /// The simplified expression, or an error raised by a rule (e.g. a shape error surfacing
    /// while multiplying out explicit matrices)
    pub fn simplify(&self) -> SymbolicsResult<Expr> {
        if self.is_simplified() {
            return Ok(self.clone());
        }
        let args = self
            .args()
            .iter()
            .map(Expr::simplify)
            .collect::<SymbolicsResult<ExprVec>>()?;
        let result = apply_rules(self, args)?;
        // Elementwise rules leave the entries of explicit matrices unsimplified
        let result = match result.as_matrix() {
            Some(m) if !result.is_simplified() => Expr::from(simplify_elements(m)?),
            _ => result,
        };
        result.mark_simplified();
        Ok(result)
    }
}

/// Rebuilds `expr` from simplified children through the rules of its node type.
fn apply_rules(expr: &Expr, args: ExprVec) -> SymbolicsResult<Expr> {
    let arg = |i: usize| &args[i];
    match expr.kind() {
        ExprKind::Bool(_)
        | ExprKind::Symbol(_)
        | ExprKind::Zero(_)
        | ExprKind::Int(_)
        | ExprKind::Real(_) => Ok(expr.clone()),
        ExprKind::Matrix(m) => {
            let mut m = Matrix::from_values(args, m.shape())?;
            m.set_simplified(true);
            Ok(Expr::from(m))
        }
        ExprKind::Add(_) => simplify_add(args, expr.shape()),
        ExprKind::Mul(_) => simplify_mul(args, expr.shape()),
        ExprKind::Neg(_) => neg(arg(0)),
        ExprKind::Pow(_, _) => pow(arg(0), arg(1)),
        ExprKind::Sin(_) => operators::sin(arg(0)),
        ExprKind::Cos(_) => operators::cos(arg(0)),
        ExprKind::Tan(_) => operators::tan(arg(0)),
        ExprKind::Asin(_) => operators::asin(arg(0)),
        ExprKind::Acos(_) => operators::acos(arg(0)),
        ExprKind::Atan(_) => operators::atan(arg(0)),
        ExprKind::Atan2(_, _) => operators::atan2(arg(0), arg(1)),
        ExprKind::Abs(_) => operators::abs(arg(0)),
        ExprKind::Sign(_) => operators::sign(arg(0)),
        ExprKind::Log(_) => operators::log(arg(0)),
        // The argument of an opaque derivative is not re-expanded
        ExprKind::Der(_) => {
            if matches!(
                arg(0).kind(),
                ExprKind::Matrix(_) | ExprKind::Zero(_) | ExprKind::Int(_) | ExprKind::Real(_)
            ) {
                operators::der(arg(0))
            } else {
                expr.with_args(args)
            }
        }
        ExprKind::Element(_, row, col) => operators::element(arg(0), *row, *col),
        ExprKind::Scalar(_) => operators::scalar(arg(0)),
        ExprKind::Skew(_) => operators::skew(arg(0)),
        ExprKind::Transpose(_) => operators::transpose(arg(0)),
        ExprKind::Inverse(_) => operators::inverse(arg(0)),
        ExprKind::Solve(_, _) => operators::solve(arg(0), arg(1)),
        ExprKind::Outer(_, _) => operators::outer(arg(0), arg(1)),
        ExprKind::Jacobian(_, _) => operators::jacobian(arg(0), arg(1)),
        ExprKind::If(_, _, _) => operators::if_then_else(arg(0), arg(1), arg(2)),
        ExprKind::Equal(_, _) => operators::equal(arg(0), arg(1)),
        ExprKind::Greater(_, _) => operators::greater(arg(0), arg(1)),
        ExprKind::Less(_, _) => operators::less(arg(0), arg(1)),
        ExprKind::Unknown(name, _) => operators::unknown(name, args),
    }
}

/// Simplifies the elements of a matrix produced by matrix arithmetic.
fn simplify_elements(m: &Matrix) -> SymbolicsResult<Matrix> {
    m.map(|v| Ok(v.clone()))
}

// ────────────────────────────────────────────────────────────────────────────
//  Add
// ────────────────────────────────────────────────────────────────────────────

/// Splices nested sums and negated sums into a flat list of terms, dropping scalar zeros.
fn flatten_terms(args: ExprVec, terms: &mut ExprVec) -> SymbolicsResult<()> {
    for a in args {
        match a.kind() {
            ExprKind::Zero(shape) if shape.is_scalar() => {}
            ExprKind::Add(inner) => flatten_terms(inner.clone(), terms)?,
            // -(a + b) -> -a - b
            ExprKind::Neg(inner) if matches!(inner.kind(), ExprKind::Add(_)) => {
                let negated = inner
                    .args()
                    .iter()
                    .map(neg)
                    .collect::<SymbolicsResult<ExprVec>>()?;
                flatten_terms(negated, terms)?;
            }
            ExprKind::Neg(inner) if matches!(inner.kind(), ExprKind::Matrix(_)) => {
                terms.push(neg(inner)?);
            }
            ExprKind::Matrix(m) if m.shape().is_scalar() => terms.push(m.get_index(0)?),
            _ => terms.push(a),
        }
    }
    Ok(())
}

/// Splits a term into its numeric coefficient and the remaining symbolic part.
fn split_coefficient(term: &Expr) -> SymbolicsResult<(Expr, Expr)> {
    match term.kind() {
        ExprKind::Neg(inner) => {
            let (c, t) = split_coefficient(inner)?;
            Ok((neg(&c)?, t))
        }
        ExprKind::Mul(args) if args.len() > 1 && args[0].is_number() => {
            let rest = match &args[1..] {
                [single] => single.clone(),
                rest => Expr::build(ExprKind::Mul(rest.to_vec()))?,
            };
            Ok((args[0].clone(), rest))
        }
        _ => Ok((Expr::one(), term.clone())),
    }
}

fn simplify_add(args: ExprVec, shape: Shape) -> SymbolicsResult<Expr> {
    let mut terms = Vec::with_capacity(args.len());
    flatten_terms(args, &mut terms)?;
    if terms.is_empty() {
        return Ok(Expr::zeros(shape));
    }
    if terms.len() == 1 && terms[0].shape() == shape {
        return Ok(terms.swap_remove(0));
    }
    debug!("simplifying sum of {} terms", terms.len());

    let mut value = Expr::zero();
    let mut matrix: Option<Matrix> = None;
    let mut coefficients = ExprMap::new();
    for term in terms {
        match term.kind() {
            ExprKind::Int(_) | ExprKind::Real(_) => value = add(&value, &term)?,
            // shaped zeros only carry the shape, which is already known
            ExprKind::Zero(_) => {}
            ExprKind::Matrix(m) => {
                matrix = Some(match matrix {
                    Some(acc) => acc.add(m)?,
                    None => m.clone(),
                });
            }
            _ => {
                let (c, t) = split_coefficient(&term)?;
                let entry = coefficients.entry(t).or_insert_with(Expr::zero);
                *entry = add(entry, &c)?;
            }
        }
    }

    let mut result = Vec::with_capacity(coefficients.len() + 2);
    if !is_zero(&value) {
        result.push(value);
    }
    for (term, c) in coefficients {
        if is_zero(&c) {
            continue;
        }
        result.push(match c.numeric_value() {
            Some(v) if v == 1.0 => term,
            Some(v) if v == -1.0 => neg(&term)?,
            _ => mul(&c, &term)?,
        });
    }

    if !shape.is_scalar() {
        let (scalars, others): (ExprVec, ExprVec) =
            result.into_iter().partition(|t| t.is_scalar());
        if matrix.is_some() || others.is_empty() {
            // Broadcast the scalar terms into an explicit matrix
            let mut acc = matrix.unwrap_or_else(|| Matrix::new(shape));
            for s in &scalars {
                acc = acc.add_scalar(s)?;
            }
            let acc = Expr::from(simplify_elements(&acc)?);
            result = if is_zero(&acc) {
                others
            } else {
                std::iter::once(acc).chain(others).collect()
            };
        } else {
            result = scalars.into_iter().chain(others).collect();
        }
    }

    match result.len() {
        0 => Ok(Expr::zeros(shape)),
        1 if result[0].shape() == shape => Ok(result.swap_remove(0)),
        _ => {
            let sum = Expr::build(ExprKind::Add(result))?;
            trace!("simplified sum:\n{}", sum.tree());
            Ok(sum)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
//  Mul
// ────────────────────────────────────────────────────────────────────────────

/// Flattens nested products into `factors`, pulling negations out into `negate`.
fn flatten_factors(args: ExprVec, factors: &mut ExprVec, negate: &mut bool) -> SymbolicsResult<()> {
    for a in args {
        match a.kind() {
            ExprKind::Mul(inner) => flatten_factors(inner.clone(), factors, negate)?,
            ExprKind::Neg(inner) => {
                *negate = !*negate;
                flatten_factors(vec![inner.clone()], factors, negate)?;
            }
            ExprKind::Matrix(m) if m.shape().is_scalar() => {
                flatten_factors(vec![m.get_index(0)?], factors, negate)?
            }
            _ => factors.push(a),
        }
    }
    Ok(())
}

/// Multiplies adjacent explicit matrices. Products of scalar shape are returned separately.
fn merge_matrices(factors: ExprVec) -> SymbolicsResult<(ExprVec, ExprVec)> {
    let mut merged: ExprVec = Vec::with_capacity(factors.len());
    let mut scalars = Vec::new();
    for f in factors {
        let product = match (merged.last().and_then(Expr::as_matrix), f.as_matrix()) {
            (Some(m1), Some(m2)) => Some(m1.mul(m2)?),
            _ => None,
        };
        match product {
            Some(p) if p.shape().is_scalar() => {
                merged.pop();
                scalars.push(p.get_index(0)?.simplify()?);
            }
            Some(p) => {
                merged.pop();
                merged.push(Expr::from(simplify_elements(&p)?));
            }
            None => merged.push(f),
        }
    }
    Ok((merged, scalars))
}

fn simplify_mul(args: ExprVec, shape: Shape) -> SymbolicsResult<Expr> {
    // x * 0 -> 0
    if args.iter().any(is_zero) {
        return Ok(Expr::zeros(shape));
    }
    let mut negate = false;
    let mut factors = Vec::with_capacity(args.len());
    flatten_factors(args, &mut factors, &mut negate)?;
    debug!("simplifying product of {} factors", factors.len());

    let (mut scalars, others): (ExprVec, ExprVec) =
        factors.into_iter().partition(|f| f.is_scalar());
    let (others, products) = merge_matrices(others)?;
    for p in products {
        flatten_factors(vec![p], &mut scalars, &mut negate)?;
    }

    // Fold numbers and collect exponents per base: x * x^2 -> x^3
    let mut value = Expr::one();
    let mut exponents = ExprMap::new();
    for s in scalars {
        if s.numeric_value().is_some() {
            value = mul(&value, &s)?;
            continue;
        }
        let (base, exponent) = match s.kind() {
            ExprKind::Pow(b, e) if e.numeric_value().is_some() => (b.clone(), e.clone()),
            _ => (s.clone(), Expr::one()),
        };
        let entry = exponents.entry(base).or_insert_with(Expr::zero);
        *entry = add(entry, &exponent)?;
    }
    let mut symbolic = Vec::with_capacity(exponents.len());
    for (base, exponent) in exponents {
        let p = pow(&base, &exponent)?;
        if p.numeric_value().is_some() {
            value = mul(&value, &p)?;
        } else {
            symbolic.push(p);
        }
    }
    if is_zero(&value) {
        return Ok(Expr::zeros(shape));
    }
    if value.numeric_value() == Some(-1.0) {
        negate = !negate;
        value = Expr::one();
    }

    // A single explicit matrix absorbs the scalar factors
    if let [only] = others.as_slice() {
        if let Some(m) = only.as_matrix() {
            let factor = symbolic
                .iter()
                .try_fold(value.clone(), |acc, s| mul(&acc, s))?;
            let m = m.scale(&factor)?;
            let m = if negate { m.neg()? } else { m };
            return Ok(Expr::from(simplify_elements(&m)?));
        }
    }

    let mut result = Vec::with_capacity(symbolic.len() + others.len() + 1);
    if value.numeric_value() != Some(1.0) {
        result.push(value);
    }
    result.extend(others);
    result.extend(symbolic);
    let product = match result.len() {
        0 => Expr::one(),
        1 => result.swap_remove(0),
        _ => Expr::build(ExprKind::Mul(result))?,
    };
    trace!("simplified product:\n{}", product.tree());
    if negate {
        neg(&product)
    } else {
        Ok(product)
    }
}
