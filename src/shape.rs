//! Dimensionality descriptor attached to every expression node.
//!
//! A `Shape` is one of
//! - a scalar (0 dimensions),
//! - a vector (1 dimension), either a column `(n)` or a row `(n)'`,
//! - a matrix (2 dimensions) with `rows x cols` entries.
//!
//! Internally the shape is stored as `(ndim, dim1, dim2)` so that every shape has a row count
//! and a column count: a scalar is `(0, 1, 1)`, a column vector `(1, n, 1)`, a row vector
//! `(1, 1, n)` and a matrix `(2, rows, cols)`. The derived ordering is lexicographic over
//! that triple.
//!
//! Two combination rules decide whether operands are conformable:
//! - [`Shape::combine_elementwise`] (addition): equal shapes, or one side scalar
//! - [`Shape::combine_matmul`] (multiplication): one side scalar, or matching inner dimension

use std::fmt;

use crate::errors::SymbolicsError;
use crate::types::SymbolicsResult;

/// Scalar, vector or matrix dimensionality of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Shape {
    ndim: u8,
    dim1: usize,
    dim2: usize,
}

impl Default for Shape {
    fn default() -> Self {
        Shape::scalar()
    }
}

impl Shape {
    /// The shape of a single value.
    pub const fn scalar() -> Self {
        Shape {
            ndim: 0,
            dim1: 1,
            dim2: 1,
        }
    }

    // Unchecked constructors for dimensions taken from existing shapes or constants

    pub(crate) const fn vector(n: usize) -> Self {
        Shape {
            ndim: 1,
            dim1: n,
            dim2: 1,
        }
    }

    pub(crate) const fn row_vector(n: usize) -> Self {
        Shape {
            ndim: 1,
            dim1: 1,
            dim2: n,
        }
    }

    pub(crate) const fn matrix(rows: usize, cols: usize) -> Self {
        Shape {
            ndim: 2,
            dim1: rows,
            dim2: cols,
        }
    }

    /// A column vector with `n` entries.
    ///
    /// # Returns
    /// The shape, or a `ShapeError` if `n` is zero
    pub fn try_vector(n: usize) -> SymbolicsResult<Self> {
        Shape::new(1, n, 1)
    }

    /// A row vector with `n` entries, or a `ShapeError` if `n` is zero.
    pub fn try_row_vector(n: usize) -> SymbolicsResult<Self> {
        Shape::new(1, 1, n)
    }

    /// A `rows x cols` matrix, or a `ShapeError` if a dimension is zero.
    pub fn try_matrix(rows: usize, cols: usize) -> SymbolicsResult<Self> {
        Shape::new(2, rows, cols)
    }

    /// Builds a shape from its raw `(ndim, dim1, dim2)` representation.
    ///
    /// # Arguments
    /// * `ndim` - Number of dimensions (0, 1 or 2)
    /// * `dim1` - Number of rows
    /// * `dim2` - Number of columns
    ///
    /// # Returns
    /// The shape, or a `ShapeError` if a dimension is zero, a scalar has dimensions other
    /// than `1x1`, or a vector has neither a single row nor a single column.
    pub fn new(ndim: u8, dim1: usize, dim2: usize) -> SymbolicsResult<Self> {
        if dim1 == 0 || dim2 == 0 {
            return Err(SymbolicsError::shape(format!(
                "Dimensions of Shape({ndim},{dim1},{dim2}) must not be zero!"
            )));
        }
        match ndim {
            0 if dim1 == 1 && dim2 == 1 => Ok(Shape::scalar()),
            1 if dim1 == 1 || dim2 == 1 => Ok(Shape { ndim, dim1, dim2 }),
            2 => Ok(Shape::matrix(dim1, dim2)),
            _ => Err(SymbolicsError::shape(format!(
                "Shape({ndim},{dim1},{dim2}) is neither scalar, vector or matrix!"
            ))),
        }
    }

    pub fn ndim(&self) -> u8 {
        self.ndim
    }

    /// Number of rows (1 for scalars and row vectors).
    pub fn dim1(&self) -> usize {
        self.dim1
    }

    /// Number of columns (1 for scalars and column vectors).
    pub fn dim2(&self) -> usize {
        self.dim2
    }

    /// Number of elements a value of this shape holds.
    pub fn num_el(&self) -> usize {
        self.dim1 * self.dim2
    }

    pub fn is_scalar(&self) -> bool {
        self.ndim == 0
    }

    pub fn is_vector(&self) -> bool {
        self.ndim == 1
    }

    pub fn is_row_vector(&self) -> bool {
        self.ndim == 1 && self.dim1 == 1 && self.dim2 != 1
    }

    pub fn is_matrix(&self) -> bool {
        self.ndim == 2
    }

    pub fn is_square(&self) -> bool {
        self.dim1 == self.dim2
    }

    /// Swaps rows and columns. Scalars are unchanged; vectors change orientation.
    pub fn transpose(&self) -> Self {
        Shape {
            ndim: self.ndim,
            dim1: self.dim2,
            dim2: self.dim1,
        }
    }

    /// Shape of `self + rhs`.
    ///
    /// A scalar operand broadcasts to the other operand's shape; otherwise both shapes must
    /// be identical.
    ///
    /// # Returns
    /// The combined shape, or a `ShapeError` if the shapes are not conformable
    pub fn combine_elementwise(&self, rhs: &Shape) -> SymbolicsResult<Shape> {
        if self.is_scalar() {
            return Ok(*rhs);
        }
        if rhs.is_scalar() || self == rhs {
            return Ok(*self);
        }
        Err(SymbolicsError::shape(format!(
            "Shapes {self}!={rhs} do not match!"
        )))
    }

    /// Shape of `self * rhs`.
    ///
    /// A scalar operand broadcasts. Otherwise the column count of `self` must equal the row
    /// count of `rhs`. A row vector times a column vector is an inner product and yields a
    /// scalar; a column vector times a row vector is an outer product and yields a matrix.
    ///
    /// # Returns
    /// The combined shape, or a `ShapeError` if the inner dimensions differ
    pub fn combine_matmul(&self, rhs: &Shape) -> SymbolicsResult<Shape> {
        if self.is_scalar() {
            return Ok(*rhs);
        }
        if rhs.is_scalar() {
            return Ok(*self);
        }
        if self.dim2 != rhs.dim1 {
            return Err(SymbolicsError::shape("Inner dimensions must be equal!"));
        }
        if self.is_vector() && rhs.is_vector() {
            if self.dim1 == 1 {
                return Ok(Shape::scalar());
            }
            return Ok(Shape::matrix(self.dim1, rhs.dim2));
        }
        Ok(Shape {
            ndim: self.ndim.min(rhs.ndim),
            dim1: self.dim1,
            dim2: rhs.dim2,
        })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ndim {
            0 => write!(f, "()"),
            1 if self.dim1 == 1 && self.dim2 != 1 => write!(f, "({})'", self.dim2),
            1 => write!(f, "({})", self.dim1),
            _ => write!(f, "({},{})", self.dim1, self.dim2),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn sample_shapes() -> Vec<Shape> {
        vec![
            Shape::scalar(),
            Shape::vector(1),
            Shape::vector(2),
            Shape::vector(3),
            Shape::row_vector(2),
            Shape::row_vector(3),
            Shape::matrix(2, 2),
            Shape::matrix(2, 3),
            Shape::matrix(3, 2),
            Shape::matrix(3, 3),
        ]
    }

    #[test]
    fn test_constructors() {
        assert_eq!(Shape::default(), Shape::scalar());
        assert_eq!(Shape::vector(3).num_el(), 3);
        assert_eq!(Shape::matrix(2, 3).num_el(), 6);
        assert!(Shape::vector(3).is_vector());
        assert!(Shape::row_vector(3).is_row_vector());
        assert!(!Shape::vector(3).is_row_vector());

        assert_eq!(Shape::new(1, 3, 1).unwrap(), Shape::vector(3));
        assert!(matches!(
            Shape::new(2, 0, 3),
            Err(SymbolicsError::ShapeError(_))
        ));
        assert!(Shape::new(1, 2, 2).is_err());
        assert!(Shape::new(0, 2, 1).is_err());
    }

    #[test]
    fn test_checked_constructors() {
        assert_eq!(Shape::try_vector(3).unwrap(), Shape::vector(3));
        assert_eq!(Shape::try_row_vector(3).unwrap(), Shape::row_vector(3));
        assert_eq!(Shape::try_matrix(2, 3).unwrap(), Shape::matrix(2, 3));
        assert_eq!(
            Shape::try_matrix(2, 0).unwrap_err(),
            SymbolicsError::shape("Dimensions of Shape(2,2,0) must not be zero!")
        );
        assert!(matches!(Shape::try_vector(0), Err(SymbolicsError::ShapeError(_))));
        assert!(matches!(Shape::try_row_vector(0), Err(SymbolicsError::ShapeError(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::scalar().to_string(), "()");
        assert_eq!(Shape::vector(3).to_string(), "(3)");
        assert_eq!(Shape::row_vector(3).to_string(), "(3)'");
        assert_eq!(Shape::matrix(2, 3).to_string(), "(2,3)");
    }

    #[test]
    fn test_transpose() {
        assert_eq!(Shape::scalar().transpose(), Shape::scalar());
        assert_eq!(Shape::vector(3).transpose(), Shape::row_vector(3));
        assert_eq!(Shape::matrix(2, 3).transpose(), Shape::matrix(3, 2));
        assert_eq!(Shape::vector(4).num_el(), Shape::vector(4).transpose().num_el());
    }

    #[test]
    fn test_ordering() {
        assert!(Shape::scalar() < Shape::vector(1));
        assert!(Shape::vector(3) < Shape::matrix(1, 1));
        assert!(Shape::matrix(2, 3) < Shape::matrix(3, 2));
        assert!(Shape::row_vector(3) < Shape::vector(3));
    }

    #[test]
    fn test_elementwise_conformability() {
        for a in sample_shapes() {
            for b in sample_shapes() {
                let expected_ok = a == b || a.is_scalar() || b.is_scalar();
                let result = a.combine_elementwise(&b);
                assert_eq!(result.is_ok(), expected_ok, "{a} + {b}");
                if let Ok(shape) = result {
                    assert_eq!(shape, if a.is_scalar() { b } else { a });
                }
            }
        }
        assert_eq!(
            Shape::vector(3)
                .combine_elementwise(&Shape::vector(2))
                .unwrap_err()
                .to_string(),
            "ShapeError: Shapes (3)!=(2) do not match!"
        );
    }

    #[test]
    fn test_matmul_conformability() {
        for a in sample_shapes() {
            for b in sample_shapes() {
                let expected_ok = a.is_scalar() || b.is_scalar() || a.dim2() == b.dim1();
                assert_eq!(a.combine_matmul(&b).is_ok(), expected_ok, "{a} * {b}");
            }
        }
    }

    #[test]
    fn test_matmul_results() {
        // inner product
        assert_eq!(
            Shape::row_vector(3).combine_matmul(&Shape::vector(3)).unwrap(),
            Shape::scalar()
        );
        // outer product
        assert_eq!(
            Shape::vector(3).combine_matmul(&Shape::row_vector(2)).unwrap(),
            Shape::matrix(3, 2)
        );
        // matrix * vector
        assert_eq!(
            Shape::matrix(2, 3).combine_matmul(&Shape::vector(3)).unwrap(),
            Shape::vector(2)
        );
        // row vector * matrix
        assert_eq!(
            Shape::row_vector(2).combine_matmul(&Shape::matrix(2, 3)).unwrap(),
            Shape::row_vector(3)
        );
        assert_eq!(
            Shape::matrix(2, 3).combine_matmul(&Shape::matrix(3, 4)).unwrap(),
            Shape::matrix(2, 4)
        );
        assert_eq!(
            Shape::scalar().combine_matmul(&Shape::matrix(3, 4)).unwrap(),
            Shape::matrix(3, 4)
        );
        assert!(matches!(
            Shape::matrix(2, 3).combine_matmul(&Shape::matrix(2, 3)),
            Err(SymbolicsError::ShapeError(m)) if m == "Inner dimensions must be equal!"
        ));
    }
}
