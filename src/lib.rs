//! Shape-aware symbolic expressions with simplification and differentiation.
//!
//! This crate provides the expression core of a modelling tool: an immutable, shared
//! expression DAG whose nodes carry a shape (scalar, vector or matrix), smart constructors
//! that apply local rewrite rules while a model is built, a bottom-up simplifier, and
//! symbolic differentiation with respect to time or to a symbol.
//!
//! # Features
//!
//! - Scalar, vector and matrix expressions with shape checking at construction
//! - Explicit matrices with symbolic entries, dense or packed symmetric
//! - Canonical simplification (constant folding, like terms, like factors)
//! - Total time derivatives (`der`) and partial derivatives (`der_wrt`)
//! - Jacobians, linear solves, inverses, skew and outer products
//! - A printer interface for code generators
//!
//! # Example
//!
//! ```rust
//! use symbolics::prelude::*;
//!
//! let x = Expr::symbol("x");
//! let y = Expr::symbol("y");
//!
//! // x * y + x * y
//! let xy = mul(&x, &y).unwrap();
//! let e = add(&xy, &xy).unwrap();
//! assert_eq!(e.simplify().unwrap().to_string(), "(2 * x * y)");
//!
//! // d/dx (x^2 * y) = 2 * x * y
//! let e = mul(&pow(&x, &Expr::int(2)).unwrap(), &y).unwrap();
//! let d = e.der_wrt(&x).unwrap().simplify().unwrap();
//! assert_eq!(d.to_string(), "(2 * x * y)");
//! ```

pub use errors::SymbolicsError;
pub use expr::Expr;
pub use matrix::Matrix;
pub use shape::Shape;
pub use symmetric::SymmetricMatrix;

pub mod prelude {
    pub use crate::errors::SymbolicsError;
    pub use crate::expr::{Expr, ExprKind, Symbol, SymbolKind, Type, Visitor};
    pub use crate::matrix::{Inserter, Matrix};
    pub use crate::operators::*;
    pub use crate::shape::Shape;
    pub use crate::symmetric::{SymmetricInserter, SymmetricMatrix};
    pub use crate::types::{ExprMap, ExprSet, ExprVec, SymbolicsResult};
    pub use crate::util::{div, eye, is_const, is_one, is_zero, solve_for, sqrt};
}

/// Error types for the various failure modes
pub mod errors;
/// Expression DAG, structural identity and traversal
pub mod expr;
/// Explicit matrices of scalar expressions
pub mod matrix;
/// Code generation interface
pub mod printer;
/// Scalar, vector and matrix shapes
pub mod shape;
/// Packed symmetric matrices
pub mod symmetric;
/// Shared type aliases
pub mod types;
/// Predicates and helpers on expressions
pub mod util;
/// Smart constructors, one module per family of node types
pub mod operators {
    pub mod abs;
    pub mod arithmetic;
    pub mod function;
    pub mod linalg;
    pub mod ln;
    pub mod logic;
    pub mod pow;
    pub mod trigonometric;

    pub use abs::{abs, sign};
    pub use arithmetic::{add, mul, neg, product, sub, sum};
    pub use function::{der, unknown};
    pub use linalg::{element, inverse, jacobian, outer, scalar, skew, solve, transpose};
    pub use ln::log;
    pub use logic::{equal, greater, if_then_else, less};
    pub use pow::pow;
    pub use trigonometric::{acos, asin, atan, atan2, cos, sin, tan};
}

mod derivative;
mod simplify;
