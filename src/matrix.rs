//! Dense container of expressions with a scalar, vector or matrix shape.
//!
//! A `Matrix` stores its elements row-major: element `(row, col)` lives at index
//! `row * dim2 + col`. All arithmetic goes through the smart constructors of
//! [`crate::operators`], so every produced element is already locally simplified.
//!
//! A `Matrix` is a plain owned value. It can be mutated element by element (or with an
//! [`Inserter`]) while it is being filled, and is frozen once it is turned into an
//! [`Expr`]. The `simplified` flag is carried over into the expression node.

use std::fmt;

use itertools::Itertools;

use crate::errors::SymbolicsError;
use crate::expr::Expr;
use crate::operators;
use crate::shape::Shape;
use crate::types::{ExprVec, SymbolicsResult};
use crate::util;

/// Row-major container of expressions.
#[derive(Debug, Clone)]
pub struct Matrix {
    shape: Shape,
    values: ExprVec,
    simplified: bool,
}

impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.values == other.values
    }
}

impl Eq for Matrix {}

impl Matrix {
    /// A matrix of the given shape filled with scalar zeros.
    pub fn new(shape: Shape) -> Self {
        Matrix {
            shape,
            values: vec![Expr::zero(); shape.num_el()],
            simplified: true,
        }
    }

    /// Builds a matrix from row-major values.
    ///
    /// # Arguments
    /// * `values` - The elements in row-major order; each must be scalar
    /// * `shape` - The shape of the matrix
    ///
    /// # Returns
    /// The matrix, or a `ShapeError` if the number of values does not match the shape or an
    /// element is not scalar
    pub fn from_values(values: ExprVec, shape: Shape) -> SymbolicsResult<Self> {
        if values.len() != shape.num_el() {
            return Err(SymbolicsError::shape(format!(
                "Size of values ({}) must match size of Matrix {shape}!",
                values.len()
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_scalar()) {
            return Err(SymbolicsError::shape(format!(
                "Elements of a Matrix must be scalar but {v} has shape {}!",
                v.shape()
            )));
        }
        let simplified = values.iter().all(Expr::is_simplified);
        Ok(Matrix {
            shape,
            values,
            simplified,
        })
    }

    /// Wraps values already known to be scalar and to fill `shape`.
    pub(crate) fn from_scalars(values: ExprVec, shape: Shape) -> Self {
        debug_assert_eq!(values.len(), shape.num_el());
        let simplified = values.iter().all(Expr::is_simplified);
        Matrix {
            shape,
            values,
            simplified,
        }
    }

    /// The `n x n` identity matrix. Public callers go through [`crate::util::eye`].
    pub(crate) fn identity(n: usize) -> Self {
        let mut m = Matrix::new(Shape::matrix(n, n));
        for i in 0..n {
            m.values[i * n + i] = Expr::one();
        }
        m
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn num_el(&self) -> usize {
        self.values.len()
    }

    /// Elements in row-major order.
    pub fn values(&self) -> &[Expr] {
        &self.values
    }

    pub fn into_values(self) -> ExprVec {
        self.values
    }

    pub fn is_simplified(&self) -> bool {
        self.simplified
    }

    pub(crate) fn set_simplified(&mut self, simplified: bool) {
        self.simplified = simplified;
    }

    fn check_index(&self, row: usize, col: usize) -> SymbolicsResult<usize> {
        if row >= self.shape.dim1() || col >= self.shape.dim2() {
            return Err(SymbolicsError::index("Index out of bounds!"));
        }
        Ok(row * self.shape.dim2() + col)
    }

    pub fn get(&self, row: usize, col: usize) -> SymbolicsResult<Expr> {
        let index = self.check_index(row, col)?;
        Ok(self.values[index].clone())
    }

    pub fn get_index(&self, index: usize) -> SymbolicsResult<Expr> {
        self.values
            .get(index)
            .cloned()
            .ok_or_else(|| SymbolicsError::index("Index out of bounds!"))
    }

    /// Replaces element `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: Expr) -> SymbolicsResult<()> {
        let index = self.check_index(row, col)?;
        self.set_index(index, value)
    }

    /// Replaces the element at row-major position `index`.
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
        self.simplified &= value.is_simplified();
        self.values[index] = value;
        Ok(())
    }

    /// Starts a bulk assignment of all elements.
    ///
    /// ```
    /// use symbolics::prelude::*;
    ///
    /// let mut m = Matrix::new(Shape::try_matrix(2, 2).unwrap());
    /// m.insert().push(1).push(2).push(3).push(4).finish().unwrap();
    /// assert_eq!(m.get(1, 0).unwrap(), Expr::int(3));
    /// ```
    pub fn insert(&mut self) -> Inserter<'_> {
        Inserter {
            matrix: self,
            values: Vec::new(),
        }
    }

    /// Value at `index` when `self` is used as the left operand of an elementwise operation;
    /// a single-element matrix broadcasts.
    fn broadcast(&self, index: usize) -> &Expr {
        if self.values.len() == 1 {
            &self.values[0]
        } else {
            &self.values[index]
        }
    }

    fn zip_with<F>(&self, rhs: &Matrix, mut f: F) -> SymbolicsResult<Matrix>
    where
        F: FnMut(&Expr, &Expr) -> SymbolicsResult<Expr>,
    {
        let shape = self.shape.combine_elementwise(&rhs.shape)?;
        let values = (0..shape.num_el())
            .map(|i| f(self.broadcast(i), rhs.broadcast(i)))
            .collect::<SymbolicsResult<ExprVec>>()?;
        Matrix::from_values(values, shape)
    }

    pub(crate) fn map_elements<F>(&self, f: F) -> SymbolicsResult<Matrix>
    where
        F: FnMut(&Expr) -> SymbolicsResult<Expr>,
    {
        let values = self.values.iter().map(f).collect::<SymbolicsResult<ExprVec>>()?;
        Matrix::from_values(values, self.shape)
    }

    /// Elementwise sum. A single-element operand broadcasts.
    pub fn add(&self, rhs: &Matrix) -> SymbolicsResult<Matrix> {
        self.zip_with(rhs, operators::add)
    }

    /// Elementwise difference. A single-element operand broadcasts.
    pub fn sub(&self, rhs: &Matrix) -> SymbolicsResult<Matrix> {
        self.zip_with(rhs, operators::sub)
    }

    /// Matrix product.
    ///
    /// A scalar-shaped operand scales the other one. A row vector times a column vector
    /// yields a scalar-shaped matrix holding the dot product.
    ///
    /// # Returns
    /// The product, or a `ShapeError` if the inner dimensions differ
    pub fn mul(&self, rhs: &Matrix) -> SymbolicsResult<Matrix> {
        if self.shape.is_scalar() {
            return rhs.scale(&self.values[0]);
        }
        if rhs.shape.is_scalar() {
            return self.scale(&rhs.values[0]);
        }
        let shape = self.shape.combine_matmul(&rhs.shape)?;
        let (rows, inner, cols) = (self.shape.dim1(), self.shape.dim2(), rhs.shape.dim2());
        let mut values = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                let mut acc = Expr::zero();
                for k in 0..inner {
                    let term = operators::mul(&self.values[i * inner + k], &rhs.values[k * cols + j])?;
                    acc = operators::add(&acc, &term)?;
                }
                values.push(acc);
            }
        }
        Matrix::from_values(values, shape)
    }

    /// Adds a scalar expression to every element.
    pub fn add_scalar(&self, value: &Expr) -> SymbolicsResult<Matrix> {
        self.map_elements(|v| operators::add(v, value))
    }

    /// Multiplies every element by a scalar expression.
    pub fn scale(&self, factor: &Expr) -> SymbolicsResult<Matrix> {
        self.map_elements(|v| operators::mul(factor, v))
    }

    /// Divides every element by a scalar expression.
    pub fn div_scalar(&self, divisor: &Expr) -> SymbolicsResult<Matrix> {
        self.map_elements(|v| util::div(v, divisor))
    }

    pub fn neg(&self) -> SymbolicsResult<Matrix> {
        self.map_elements(operators::neg)
    }

    pub fn transpose(&self) -> Matrix {
        let (rows, cols) = (self.shape.dim1(), self.shape.dim2());
        let values = (0..cols)
            .cartesian_product(0..rows)
            .map(|(c, r)| self.values[r * cols + c].clone())
            .collect();
        Matrix {
            shape: self.shape.transpose(),
            values,
            simplified: self.simplified,
        }
    }

    /// Applies `f` to every element and simplifies the result.
    ///
    /// The returned matrix is marked as simplified.
    pub fn map<F>(&self, mut f: F) -> SymbolicsResult<Matrix>
    where
        F: FnMut(&Expr) -> SymbolicsResult<Expr>,
    {
        let mut m = self.map_elements(|v| f(v)?.simplify())?;
        m.simplified = true;
        Ok(m)
    }

    pub fn add_assign(&mut self, rhs: &Matrix) -> SymbolicsResult<()> {
        *self = self.add(rhs)?;
        Ok(())
    }

    pub fn sub_assign(&mut self, rhs: &Matrix) -> SymbolicsResult<()> {
        *self = self.sub(rhs)?;
        Ok(())
    }

    pub fn mul_assign(&mut self, rhs: &Matrix) -> SymbolicsResult<()> {
        *self = self.mul(rhs)?;
        Ok(())
    }
}

/// Bulk assignment of all elements of a [`Matrix`].
///
/// Values are collected with [`Inserter::push`] and written by [`Inserter::finish`] in
/// row-major order. The number of values must equal the number of elements, which is one for
/// a scalar target.
#[must_use = "values are only written by `finish`"]
pub struct Inserter<'a> {
    matrix: &'a mut Matrix,
    values: ExprVec,
}

impl Inserter<'_> {
    pub fn push(mut self, value: impl Into<Expr>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Writes the collected values into the matrix.
    ///
    /// # Returns
    /// `Ok(())`, or an `IndexError` if the number of values differs from the number of
    /// elements. The matrix is left unchanged on error.
    pub fn finish(self) -> SymbolicsResult<()> {
        let expected = self.matrix.num_el();
        let n = self.values.len();
        if n != expected {
            return Err(SymbolicsError::index(format!(
                "Numbers of right hand side arguments does not match shape! Expected {expected} but got {n}"
            )));
        }
        *self.matrix = Matrix::from_values(self.values, self.matrix.shape)?;
        Ok(())
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shape.is_scalar() {
            return write!(f, "{}", self.values[0]);
        }
        let rows = self
            .values
            .chunks(self.shape.dim2())
            .map(|row| format!("[{}]", row.iter().join(",")))
            .join(";");
        if self.shape.is_vector() {
            write!(f, "vector([{}])", self.values.iter().join(","))?;
            if self.shape.is_row_vector() {
                write!(f, "'")?;
            }
            Ok(())
        } else {
            write!(f, "matrix({rows})")
        }
    }
}
