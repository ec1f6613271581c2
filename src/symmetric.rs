//! Square matrices that are equal to their own transpose.
//!
//! Only the upper triangle is stored, row by row, so an `n x n` matrix holds
//! `n * (n + 1) / 2` values. Element `(row, col)` and element `(col, row)` share one slot.
//! Arithmetic that keeps symmetry (sums, differences, scaling, negation) stays packed; anything
//! else goes through the dense [`Matrix`] obtained with `From`.

use std::fmt;

use crate::errors::SymbolicsError;
use crate::expr::Expr;
use crate::matrix::Matrix;
use crate::operators;
use crate::shape::Shape;
use crate::types::{ExprVec, SymbolicsResult};
use crate::util;

/// Packed symmetric matrix of scalar expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricMatrix {
    n: usize,
    values: ExprVec,
}

fn check_square(shape: &Shape) -> SymbolicsResult<usize> {
    if !shape.is_matrix() || !shape.is_square() {
        return Err(SymbolicsError::internal(format!(
            "SymmetricMatrix is only defined for square matrices but got {shape}!"
        )));
    }
    Ok(shape.dim1())
}

fn packed_len(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Position of `(row, col)` in the upper triangle of an `n x n` matrix.
fn packed_index(n: usize, row: usize, col: usize) -> usize {
    let (row, col) = if row > col { (col, row) } else { (row, col) };
    row * (2 * n - row + 1) / 2 + col - row
}

impl SymmetricMatrix {
    /// A symmetric matrix of the given square shape filled with scalar zeros.
    ///
    /// # Returns
    /// The matrix, or an `InternalError` if `shape` is not a square matrix shape
    pub fn new(shape: Shape) -> SymbolicsResult<Self> {
        let n = check_square(&shape)?;
        Ok(SymmetricMatrix {
            n,
            values: vec![Expr::zero(); packed_len(n)],
        })
    }

    /// Builds a symmetric matrix from the upper triangle, given row by row.
    ///
    /// # Arguments
    /// * `values` - `n * (n + 1) / 2` scalar elements: `(0,0), (0,1) .. (0,n-1), (1,1) ..`
    /// * `shape` - The square shape of the matrix
    pub fn from_values(values: ExprVec, shape: Shape) -> SymbolicsResult<Self> {
        let n = check_square(&shape)?;
        if values.len() != packed_len(n) {
            return Err(SymbolicsError::shape(format!(
                "Size of values ({}) must match size of SymmetricMatrix {shape}!",
                values.len()
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_scalar()) {
            return Err(SymbolicsError::shape(format!(
                "Elements of a Matrix must be scalar but {v} has shape {}!",
                v.shape()
            )));
        }
        Ok(SymmetricMatrix { n, values })
    }

    /// Packs a dense matrix.
    ///
    /// # Returns
    /// The packed matrix, or an `InternalError` if `matrix` is not square or differs from its
    /// transpose
    pub fn from_matrix(matrix: &Matrix) -> SymbolicsResult<Self> {
        let n = check_square(&matrix.shape())?;
        let dense = matrix.values();
        let mut values = Vec::with_capacity(packed_len(n));
        for row in 0..n {
            for col in row..n {
                if dense[row * n + col] != dense[col * n + row] {
                    return Err(SymbolicsError::internal(format!(
                        "Matrix is not symmetric at ({row},{col})!"
                    )));
                }
                values.push(dense[row * n + col].clone());
            }
        }
        Ok(SymmetricMatrix { n, values })
    }

    pub fn shape(&self) -> Shape {
        Shape::matrix(self.n, self.n)
    }

    /// Number of stored values, `n * (n + 1) / 2`.
    pub fn num_el(&self) -> usize {
        self.values.len()
    }

    /// The stored upper triangle, row by row.
    pub fn values(&self) -> &[Expr] {
        &self.values
    }

    pub fn is_simplified(&self) -> bool {
        self.values.iter().all(Expr::is_simplified)
    }

    fn index(&self, row: usize, col: usize) -> SymbolicsResult<usize> {
        if row >= self.n || col >= self.n {
            return Err(SymbolicsError::index("Index out of bounds!"));
        }
        Ok(packed_index(self.n, row, col))
    }

    pub fn get(&self, row: usize, col: usize) -> SymbolicsResult<Expr> {
        let index = self.index(row, col)?;
        Ok(self.values[index].clone())
    }

    /// Replaces element `(row, col)` and with it element `(col, row)`.
    pub fn set(&mut self, row: usize, col: usize, value: Expr) -> SymbolicsResult<()> {
        let index = self.index(row, col)?;
        self.set_index(index, value)
    }

    /// Replaces the stored value at packed position `index`.
    pub fn set_index(&mut self, index: usize, value: Expr) -> SymbolicsResult<()> {
        if index >= self.values.len() {
            return Err(SymbolicsError::index("Index out of bounds!"));
        }
        if !value.is_scalar() {
            return Err(SymbolicsError::shape(format!(
                "Elements of a Matrix must be scalar but {value} has shape {}!",
                value.shape()
            )));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Starts a bulk assignment of the upper triangle, row by row.
    ///
    /// ```
    /// use symbolics::prelude::*;
    ///
    /// let mut m = SymmetricMatrix::new(Shape::try_matrix(2, 2).unwrap()).unwrap();
    /// m.insert().push(1).push(2).push(3).finish().unwrap();
    /// assert_eq!(m.get(1, 0).unwrap(), Expr::int(2));
    /// ```
    pub fn insert(&mut self) -> SymmetricInserter<'_> {
        SymmetricInserter {
            matrix: self,
            values: Vec::new(),
        }
    }

    fn map_values<F>(&self, f: F) -> SymbolicsResult<SymmetricMatrix>
    where
        F: FnMut(&Expr) -> SymbolicsResult<Expr>,
    {
        let values = self.values.iter().map(f).collect::<SymbolicsResult<ExprVec>>()?;
        SymmetricMatrix::from_values(values, self.shape())
    }

    fn zip_with<F>(&self, rhs: &SymmetricMatrix, mut f: F) -> SymbolicsResult<SymmetricMatrix>
    where
        F: FnMut(&Expr, &Expr) -> SymbolicsResult<Expr>,
    {
        let shape = self.shape().combine_elementwise(&rhs.shape())?;
        let values = self
            .values
            .iter()
            .zip(&rhs.values)
            .map(|(a, b)| f(a, b))
            .collect::<SymbolicsResult<ExprVec>>()?;
        SymmetricMatrix::from_values(values, shape)
    }

    pub fn add(&self, rhs: &SymmetricMatrix) -> SymbolicsResult<SymmetricMatrix> {
        self.zip_with(rhs, operators::add)
    }

    pub fn sub(&self, rhs: &SymmetricMatrix) -> SymbolicsResult<SymmetricMatrix> {
        self.zip_with(rhs, operators::sub)
    }

    /// Adds a scalar expression to every element.
    pub fn add_scalar(&self, value: &Expr) -> SymbolicsResult<SymmetricMatrix> {
        self.map_values(|v| operators::add(v, value))
    }

    /// Subtracts a scalar expression from every element.
    pub fn sub_scalar(&self, value: &Expr) -> SymbolicsResult<SymmetricMatrix> {
        self.map_values(|v| operators::sub(v, value))
    }

    /// Multiplies every element by a scalar expression.
    pub fn scale(&self, factor: &Expr) -> SymbolicsResult<SymmetricMatrix> {
        self.map_values(|v| operators::mul(factor, v))
    }

    /// Divides every element by a scalar expression.
    pub fn div_scalar(&self, divisor: &Expr) -> SymbolicsResult<SymmetricMatrix> {
        self.map_values(|v| util::div(v, divisor))
    }

    pub fn neg(&self) -> SymbolicsResult<SymmetricMatrix> {
        self.map_values(operators::neg)
    }

    pub fn transpose(&self) -> SymmetricMatrix {
        self.clone()
    }

    /// Replaces `old` by `new` in every stored value.
    pub fn subs(&self, old: &Expr, new: &Expr) -> SymbolicsResult<SymmetricMatrix> {
        self.map_values(|v| v.subs(old, new))
    }

    /// Applies `f` to every stored value and simplifies the result.
    pub fn map<F>(&self, mut f: F) -> SymbolicsResult<SymmetricMatrix>
    where
        F: FnMut(&Expr) -> SymbolicsResult<Expr>,
    {
        self.map_values(|v| f(v)?.simplify())
    }

    pub fn add_assign(&mut self, rhs: &SymmetricMatrix) -> SymbolicsResult<()> {
        *self = self.add(rhs)?;
        Ok(())
    }

    pub fn sub_assign(&mut self, rhs: &SymmetricMatrix) -> SymbolicsResult<()> {
        *self = self.sub(rhs)?;
        Ok(())
    }
}

/// Bulk assignment of the upper triangle of a [`SymmetricMatrix`].
///
/// Works like [`crate::matrix::Inserter`]: exactly `num_el` values must be pushed, and they are
/// only written by [`SymmetricInserter::finish`].
#[must_use = "values are only written by `finish`"]
pub struct SymmetricInserter<'a> {
    matrix: &'a mut SymmetricMatrix,
    values: ExprVec,
}

impl SymmetricInserter<'_> {
    pub fn push(mut self, value: impl Into<Expr>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Writes the collected values into the matrix.
    ///
    /// # Returns
    /// `Ok(())`, or an `IndexError` if the number of values differs from the number of stored
    /// values. The matrix is left unchanged on error.
    pub fn finish(self) -> SymbolicsResult<()> {
        let expected = self.matrix.num_el();
        let n = self.values.len();
        if n != expected {
            return Err(SymbolicsError::index(format!(
                "Numbers of right hand side arguments does not match shape! Expected {expected} but got {n}"
            )));
        }
        *self.matrix = SymmetricMatrix::from_values(self.values, self.matrix.shape())?;
        Ok(())
    }
}

impl From<&SymmetricMatrix> for Matrix {
    fn from(sym: &SymmetricMatrix) -> Self {
        let n = sym.n;
        let values = (0..n * n)
            .map(|i| sym.values[packed_index(n, i / n, i % n)].clone())
            .collect();
        Matrix::from_scalars(values, sym.shape())
    }
}

impl From<SymmetricMatrix> for Matrix {
    fn from(sym: SymmetricMatrix) -> Self {
        Matrix::from(&sym)
    }
}

impl From<SymmetricMatrix> for Expr {
    fn from(sym: SymmetricMatrix) -> Self {
        Expr::from(Matrix::from(&sym))
    }
}

impl fmt::Display for SymmetricMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Matrix::from(self))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn sym(name: &str) -> Expr {
        Expr::symbol(name)
    }

    fn ints(values: &[i64], n: usize) -> SymmetricMatrix {
        let values = values.iter().map(|v| Expr::int(*v)).collect();
        SymmetricMatrix::from_values(values, Shape::matrix(n, n)).unwrap()
    }

    #[test]
    fn test_new_requires_square_shape() {
        let m = SymmetricMatrix::new(Shape::matrix(3, 3)).unwrap();
        assert_eq!(m.num_el(), 6);
        assert_eq!(m.shape(), Shape::matrix(3, 3));
        assert!(m.values().iter().all(|v| *v == Expr::zero()));

        for shape in [Shape::vector(3), Shape::matrix(2, 3), Shape::scalar()] {
            assert!(matches!(
                SymmetricMatrix::new(shape),
                Err(SymbolicsError::InternalError(_))
            ));
        }
    }

    #[test]
    fn test_from_values() {
        let m = ints(&[1, 2, 3, 4, 5, 6], 3);
        assert_eq!(m.get(0, 2).unwrap(), Expr::int(3));
        assert_eq!(m.get(2, 0).unwrap(), Expr::int(3));
        assert_eq!(m.get(1, 1).unwrap(), Expr::int(4));
        assert_eq!(m.get(2, 1).unwrap(), Expr::int(5));
        assert_eq!(m.get(2, 2).unwrap(), Expr::int(6));

        let err =
            SymmetricMatrix::from_values(vec![Expr::int(1); 9], Shape::matrix(3, 3)).unwrap_err();
        assert_eq!(
            err,
            SymbolicsError::shape("Size of values (9) must match size of SymmetricMatrix (3,3)!")
        );
    }

    #[test]
    fn test_set_mirrors() {
        let mut m = SymmetricMatrix::new(Shape::matrix(3, 3)).unwrap();
        m.set(2, 0, sym("a")).unwrap();
        assert_eq!(m.get(0, 2).unwrap(), sym("a"));
        assert_eq!(m.values()[2], sym("a"));

        m.set(0, 2, sym("b")).unwrap();
        assert_eq!(m.get(2, 0).unwrap(), sym("b"));

        assert!(matches!(m.get(3, 0), Err(SymbolicsError::IndexError(_))));
        assert!(matches!(m.set_index(6, sym("c")), Err(SymbolicsError::IndexError(_))));
        let v = Expr::symbol_with("v", Shape::vector(2), crate::expr::SymbolKind::Variable);
        assert!(matches!(m.set(0, 0, v), Err(SymbolicsError::ShapeError(_))));
    }

    #[test]
    fn test_inserter() {
        let mut m = SymmetricMatrix::new(Shape::matrix(2, 2)).unwrap();
        m.insert().push(1).push(sym("x")).push(2.5).finish().unwrap();
        assert_eq!(m.get(1, 0).unwrap(), sym("x"));
        assert_eq!(m.get(1, 1).unwrap(), Expr::real(2.5));

        let before = m.clone();
        let err = m.insert().push(1).push(2).push(3).push(4).finish().unwrap_err();
        assert_eq!(
            err,
            SymbolicsError::index(
                "Numbers of right hand side arguments does not match shape! Expected 3 but got 4"
            )
        );
        assert_eq!(m, before);
        assert!(m.insert().push(1).finish().is_err());
        assert_eq!(m, before);
    }

    #[test]
    fn test_arithmetic_stays_symmetric() {
        let c = ints(&[1, 2, 3, 4, 5, 6], 3);
        assert_eq!(c.add(&c).unwrap(), ints(&[2, 4, 6, 8, 10, 12], 3));
        assert_eq!(c.sub(&c).unwrap(), SymmetricMatrix::new(Shape::matrix(3, 3)).unwrap());
        assert_eq!(c.scale(&Expr::int(2)).unwrap(), ints(&[2, 4, 6, 8, 10, 12], 3));
        assert_eq!(c.add_scalar(&Expr::int(1)).unwrap(), ints(&[2, 3, 4, 5, 6, 7], 3));
        assert_eq!(c.sub_scalar(&Expr::int(1)).unwrap(), ints(&[0, 1, 2, 3, 4, 5], 3));
        assert_eq!(c.neg().unwrap(), ints(&[-1, -2, -3, -4, -5, -6], 3));
        assert_eq!(
            ints(&[2, 4, 6], 2).div_scalar(&Expr::int(2)).unwrap(),
            ints(&[1, 2, 3], 2)
        );
        assert_eq!(c.transpose(), c);

        let small = ints(&[1, 2, 3], 2);
        assert!(matches!(c.add(&small), Err(SymbolicsError::ShapeError(_))));

        let mut acc = SymmetricMatrix::new(Shape::matrix(3, 3)).unwrap();
        acc.add_assign(&c).unwrap();
        acc.add_assign(&c).unwrap();
        acc.sub_assign(&c).unwrap();
        assert_eq!(acc, c);
    }

    #[test]
    fn test_dense_conversion() {
        let values = vec![sym("a"), sym("b"), sym("c")];
        let m = SymmetricMatrix::from_values(values, Shape::matrix(2, 2)).unwrap();
        let dense = Matrix::from(&m);
        assert_eq!(dense.values(), &[sym("a"), sym("b"), sym("b"), sym("c")]);
        assert_eq!(dense.transpose(), dense);
        assert_eq!(m.to_string(), "matrix([a,b];[b,c])");
        assert_eq!(SymmetricMatrix::from_matrix(&dense).unwrap(), m);

        let e = Expr::from(m.clone());
        assert_eq!(e.shape(), Shape::matrix(2, 2));
        assert_eq!(operators::transpose(&e).unwrap(), e);

        let skewed =
            Matrix::from_values(vec![sym("a"), sym("b"), sym("c"), sym("d")], Shape::matrix(2, 2))
                .unwrap();
        assert!(matches!(
            SymmetricMatrix::from_matrix(&skewed),
            Err(SymbolicsError::InternalError(_))
        ));
    }

    #[test]
    fn test_subs_and_map() {
        let values = vec![sym("a"), sym("b"), sym("a")];
        let m = SymmetricMatrix::from_values(values, Shape::matrix(2, 2)).unwrap();
        let replaced = m.subs(&sym("a"), &Expr::int(7)).unwrap();
        assert_eq!(replaced.get(1, 1).unwrap(), Expr::int(7));
        assert_eq!(replaced.get(0, 1).unwrap(), sym("b"));

        let doubled = m.map(|v| operators::add(v, v)).unwrap();
        assert!(doubled.is_simplified());
        assert_eq!(
            doubled.get(1, 0).unwrap(),
            operators::mul(&Expr::int(2), &sym("b")).unwrap()
        );
    }
}
