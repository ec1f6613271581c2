//! Expression module for representing symbolic scalar, vector and matrix expressions.
//!
//! The main types are:
//!
//! - `Expr`: a cheap-to-clone shared handle to an immutable expression node
//! - `ExprKind`: the closed set of node variants (leaves, operators, functions)
//! - `Type`: the discriminant of a node, whose declaration order is the canonical sort order
//! - `Symbol` / `SymbolKind`: named leaves and their role in a model
//!
//! Nodes are reference counted and freely shared between parents, so an expression is a
//! DAG rather than a tree. Every node carries
//! - its `Shape`, computed and validated when the node is built,
//! - a structural hash, computed once from the hashes of its children,
//! - a memoisation flag recording that the node is already in simplified form.
//!
//! # Structural identity
//! Equality, ordering and hashing are structural and mutually consistent:
//! - nodes are ordered by type tag, then by shape, then by payload/children
//! - `Zero`, `Int` and `Real` form one numeric class compared by value (`Int(2) == Real(2.0)`)
//! - `Add` compares its terms as a multiset, `Mul` compares its scalar factors as a multiset
//!   and its non-scalar factors positionally
//!
//! This makes expressions usable as keys of ordered and hashed containers.
//!
//! # Traversal
//! - `subs` replaces every structurally equal occurrence of a subexpression
//! - `iterate` rebuilds the DAG bottom-up through a caller supplied [`Visitor`]
//! - `scan` walks the DAG top-down without rebuilding it
//! - `atoms` collects the symbols an expression depends on
//!
//! Recursive walks visit a shared subexpression once per parent that references it. This is
//! observably correct because every pass is pure, but it is the main cost on heavily shared
//! DAGs; `atoms` skips nodes it has already seen.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use colored::Colorize;
use itertools::Itertools;
use log::debug;

use crate::errors::SymbolicsError;
use crate::matrix::Matrix;
use crate::shape::Shape;
use crate::types::{ExprSet, ExprVec, SymbolicsResult};

/// Discriminant of an expression node.
///
/// The declaration order is significant: it is the first key of the canonical ordering
/// of expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Bool,
    Symbol,
    Zero,
    Int,
    Real,
    Matrix,
    Neg,
    Add,
    Mul,
    Pow,
    Sin,
    Cos,
    Der,
    Element,
    Atan,
    Solve,
    Atan2,
    Abs,
    Acos,
    Asin,
    Scalar,
    Skew,
    Transpose,
    Unknown,
    Tan,
    If,
    Greater,
    Less,
    Equal,
    Sign,
    Jacobian,
    Outer,
    Inverse,
    Log,
}

/// Role of a symbol in a model.
///
/// The discriminants are bit flags so that collaborators can combine them into masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SymbolKind {
    Variable = 0x1,
    Constant = 0x2,
    Parameter = 0x4,
    Input = 0x8,
    UserExp = 0x40,
    Controller = 0x400,
}

/// A named leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    shape: Shape,
    kind: SymbolKind,
}

impl Symbol {
    pub fn new(name: impl Into<String>, shape: Shape, kind: SymbolKind) -> Self {
        Symbol {
            name: name.into(),
            shape,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Constants and parameters do not change over time.
    pub fn is_time_invariant(&self) -> bool {
        matches!(self.kind, SymbolKind::Constant | SymbolKind::Parameter)
    }
}

/// An expression node variant.
///
/// Composite variants hold their children as shared [`Expr`] handles. Variant-specific data
/// (symbol, numeric value, element indices, function name) is stored inline.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A truth value
    Bool(bool),
    /// A named leaf
    Symbol(Symbol),
    /// The additive identity of the given shape
    Zero(Shape),
    /// An integer constant
    Int(i64),
    /// A floating point constant
    Real(f64),
    /// A dense row-major container of expressions
    Matrix(Matrix),
    /// Negation
    Neg(Expr),
    /// Sum of one or more terms
    Add(ExprVec),
    /// Product of one or more factors (matrix product for non-scalar factors)
    Mul(ExprVec),
    /// Base raised to a scalar exponent
    Pow(Expr, Expr),
    Sin(Expr),
    Cos(Expr),
    /// Opaque time derivative of an expression without a known derivative rule
    Der(Expr),
    /// Entry `(row, col)` of a non-scalar expression
    Element(Expr, usize, usize),
    Atan(Expr),
    /// Solution `x` of the linear system `A x = b`
    Solve(Expr, Expr),
    Atan2(Expr, Expr),
    Abs(Expr),
    Acos(Expr),
    Asin(Expr),
    /// Scalar view of a `(1,1)` shaped expression
    Scalar(Expr),
    /// Skew-symmetric (cross product) matrix of a 3-vector
    Skew(Expr),
    Transpose(Expr),
    /// Opaque named function of its arguments
    Unknown(String, ExprVec),
    Tan(Expr),
    /// `If(condition, then, else)`
    If(Expr, Expr, Expr),
    Greater(Expr, Expr),
    Less(Expr, Expr),
    Equal(Expr, Expr),
    Sign(Expr),
    /// Jacobian of an expression with respect to a vector of symbols
    Jacobian(Expr, Expr),
    /// Outer product of two vectors
    Outer(Expr, Expr),
    /// Matrix inverse
    Inverse(Expr),
    /// Natural logarithm
    Log(Expr),
}

impl ExprKind {
    pub fn ty(&self) -> Type {
        match self {
            ExprKind::Bool(_) => Type::Bool,
            ExprKind::Symbol(_) => Type::Symbol,
            ExprKind::Zero(_) => Type::Zero,
            ExprKind::Int(_) => Type::Int,
            ExprKind::Real(_) => Type::Real,
            ExprKind::Matrix(_) => Type::Matrix,
            ExprKind::Neg(_) => Type::Neg,
            ExprKind::Add(_) => Type::Add,
            ExprKind::Mul(_) => Type::Mul,
            ExprKind::Pow(_, _) => Type::Pow,
            ExprKind::Sin(_) => Type::Sin,
            ExprKind::Cos(_) => Type::Cos,
            ExprKind::Der(_) => Type::Der,
            ExprKind::Element(_, _, _) => Type::Element,
            ExprKind::Atan(_) => Type::Atan,
            ExprKind::Solve(_, _) => Type::Solve,
            ExprKind::Atan2(_, _) => Type::Atan2,
            ExprKind::Abs(_) => Type::Abs,
            ExprKind::Acos(_) => Type::Acos,
            ExprKind::Asin(_) => Type::Asin,
            ExprKind::Scalar(_) => Type::Scalar,
            ExprKind::Skew(_) => Type::Skew,
            ExprKind::Transpose(_) => Type::Transpose,
            ExprKind::Unknown(_, _) => Type::Unknown,
            ExprKind::Tan(_) => Type::Tan,
            ExprKind::If(_, _, _) => Type::If,
            ExprKind::Greater(_, _) => Type::Greater,
            ExprKind::Less(_, _) => Type::Less,
            ExprKind::Equal(_, _) => Type::Equal,
            ExprKind::Sign(_) => Type::Sign,
            ExprKind::Jacobian(_, _) => Type::Jacobian,
            ExprKind::Outer(_, _) => Type::Outer,
            ExprKind::Inverse(_) => Type::Inverse,
            ExprKind::Log(_) => Type::Log,
        }
    }

    /// Children in positional order. Leaves have none; a matrix's children are its elements.
    pub fn children(&self) -> ExprVec {
        match self {
            ExprKind::Bool(_)
            | ExprKind::Symbol(_)
            | ExprKind::Zero(_)
            | ExprKind::Int(_)
            | ExprKind::Real(_) => Vec::new(),
            ExprKind::Matrix(m) => m.values().to_vec(),
            ExprKind::Add(args) | ExprKind::Mul(args) | ExprKind::Unknown(_, args) => {
                args.clone()
            }
            ExprKind::Neg(a)
            | ExprKind::Sin(a)
            | ExprKind::Cos(a)
            | ExprKind::Der(a)
            | ExprKind::Element(a, _, _)
            | ExprKind::Atan(a)
            | ExprKind::Abs(a)
            | ExprKind::Acos(a)
            | ExprKind::Asin(a)
            | ExprKind::Scalar(a)
            | ExprKind::Skew(a)
            | ExprKind::Transpose(a)
            | ExprKind::Tan(a)
            | ExprKind::Sign(a)
            | ExprKind::Inverse(a)
            | ExprKind::Log(a) => vec![a.clone()],
            ExprKind::Pow(a, b)
            | ExprKind::Solve(a, b)
            | ExprKind::Atan2(a, b)
            | ExprKind::Greater(a, b)
            | ExprKind::Less(a, b)
            | ExprKind::Equal(a, b)
            | ExprKind::Jacobian(a, b)
            | ExprKind::Outer(a, b) => vec![a.clone(), b.clone()],
            ExprKind::If(c, a, b) => vec![c.clone(), a.clone(), b.clone()],
        }
    }
}

struct Node {
    kind: ExprKind,
    shape: Shape,
    hash: u64,
    simplified: Cell<bool>,
}

/// Shared handle to an immutable expression node.
///
/// Cloning an `Expr` is a reference count increment; the node itself is never mutated
/// apart from its memoisation flag.
#[derive(Clone)]
pub struct Expr(Rc<Node>);

/// Bottom-up rewrite callback for [`Expr::iterate`].
///
/// `process` receives every node after its children have been processed and rebuilt, and
/// returns the node that replaces it.
pub trait Visitor {
    fn process(&mut self, expr: Expr) -> SymbolicsResult<Expr>;
}

impl<F> Visitor for F
where
    F: FnMut(Expr) -> SymbolicsResult<Expr>,
{
    fn process(&mut self, expr: Expr) -> SymbolicsResult<Expr> {
        self(expr)
    }
}

impl Expr {
    /// Builds a node from its variant, validating and computing its shape.
    ///
    /// This is the raw constructor: no rewrite rules are applied. The smart constructors in
    /// [`crate::operators`] apply the local simplification rules of each node type.
    ///
    /// # Returns
    /// The new node, or the `ShapeError`/`IndexError`/`InternalError` raised by the shape
    /// rules of the variant
    pub fn build(kind: ExprKind) -> SymbolicsResult<Expr> {
        let shape = infer_shape(&kind)?;
        Ok(Expr::from_parts(kind, shape))
    }

    fn from_parts(kind: ExprKind, shape: Shape) -> Expr {
        let hash = structural_hash(&kind, &shape);
        let simplified = matches!(
            kind,
            ExprKind::Bool(_)
                | ExprKind::Symbol(_)
                | ExprKind::Zero(_)
                | ExprKind::Int(_)
                | ExprKind::Real(_)
        );
        Expr(Rc::new(Node {
            kind,
            shape,
            hash,
            simplified: Cell::new(simplified),
        }))
    }

    pub fn int(value: i64) -> Expr {
        Expr::from_parts(ExprKind::Int(value), Shape::scalar())
    }

    pub fn real(value: f64) -> Expr {
        Expr::from_parts(ExprKind::Real(value), Shape::scalar())
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::from_parts(ExprKind::Bool(value), Shape::scalar())
    }

    /// The scalar zero.
    pub fn zero() -> Expr {
        Expr::zeros(Shape::scalar())
    }

    /// The zero of the given shape.
    pub fn zeros(shape: Shape) -> Expr {
        Expr::from_parts(ExprKind::Zero(shape), shape)
    }

    pub fn one() -> Expr {
        Expr::int(1)
    }

    pub fn minus_one() -> Expr {
        Expr::int(-1)
    }

    /// Integer result of constant folding; `0` is produced as the scalar `Zero`.
    pub(crate) fn integer(value: i64) -> Expr {
        if value == 0 {
            Expr::zero()
        } else {
            Expr::int(value)
        }
    }

    /// A scalar variable.
    pub fn symbol(name: &str) -> Expr {
        Expr::from(Symbol::new(name, Shape::scalar(), SymbolKind::Variable))
    }

    /// A symbol of arbitrary shape and kind.
    pub fn symbol_with(name: &str, shape: Shape, kind: SymbolKind) -> Expr {
        Expr::from(Symbol::new(name, shape, kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn ty(&self) -> Type {
        self.0.kind.ty()
    }

    pub fn shape(&self) -> Shape {
        self.0.shape
    }

    pub fn is_scalar(&self) -> bool {
        self.0.shape.is_scalar()
    }

    pub fn is_vector(&self) -> bool {
        self.0.shape.is_vector()
    }

    pub fn is_matrix(&self) -> bool {
        self.0.shape.is_matrix()
    }

    /// Whether this node is known to be in simplified form.
    pub fn is_simplified(&self) -> bool {
        self.0.simplified.get()
    }

    pub(crate) fn mark_simplified(&self) {
        self.0.simplified.set(true);
    }

    /// Whether both handles point to the same node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.kind() {
            ExprKind::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self.kind() {
            ExprKind::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            ExprKind::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.kind() {
            ExprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Matrix> {
        match self.kind() {
            ExprKind::Matrix(m) => Some(m),
            _ => None,
        }
    }

    /// Value of a scalar numeric leaf (`Zero`, `Int` or `Real`).
    pub fn numeric_value(&self) -> Option<f64> {
        match self.kind() {
            ExprKind::Zero(shape) if shape.is_scalar() => Some(0.0),
            ExprKind::Int(v) => Some(*v as f64),
            ExprKind::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this is an `Int` or `Real` leaf.
    pub fn is_number(&self) -> bool {
        matches!(self.kind(), ExprKind::Int(_) | ExprKind::Real(_))
    }

    /// Children in positional order.
    pub fn args(&self) -> ExprVec {
        self.0.kind.children()
    }

    /// Rebuilds this node with new children, keeping its variant and payload.
    ///
    /// Leaves are returned unchanged. Shapes are validated again, but no rewrite rules are
    /// applied.
    ///
    /// # Arguments
    /// * `args` - The new children, in the order returned by [`Expr::args`]
    ///
    /// # Returns
    /// The rebuilt node, or an `InternalError` if the number of children does not fit the
    /// variant
    pub fn with_args(&self, args: ExprVec) -> SymbolicsResult<Expr> {
        let kind = match self.kind() {
            ExprKind::Bool(_)
            | ExprKind::Symbol(_)
            | ExprKind::Zero(_)
            | ExprKind::Int(_)
            | ExprKind::Real(_)
                if args.is_empty() =>
            {
                return Ok(self.clone())
            }
            ExprKind::Matrix(m) => ExprKind::Matrix(Matrix::from_values(args, m.shape())?),
            ExprKind::Add(_) if !args.is_empty() => ExprKind::Add(args),
            ExprKind::Mul(_) if !args.is_empty() => ExprKind::Mul(args),
            ExprKind::Unknown(name, _) => ExprKind::Unknown(name.clone(), args),
            kind => match (kind, args.as_slice()) {
                (ExprKind::Neg(_), [a]) => ExprKind::Neg(a.clone()),
                (ExprKind::Sin(_), [a]) => ExprKind::Sin(a.clone()),
                (ExprKind::Cos(_), [a]) => ExprKind::Cos(a.clone()),
                (ExprKind::Der(_), [a]) => ExprKind::Der(a.clone()),
                (ExprKind::Element(_, row, col), [a]) => ExprKind::Element(a.clone(), *row, *col),
                (ExprKind::Atan(_), [a]) => ExprKind::Atan(a.clone()),
                (ExprKind::Abs(_), [a]) => ExprKind::Abs(a.clone()),
                (ExprKind::Acos(_), [a]) => ExprKind::Acos(a.clone()),
                (ExprKind::Asin(_), [a]) => ExprKind::Asin(a.clone()),
                (ExprKind::Scalar(_), [a]) => ExprKind::Scalar(a.clone()),
                (ExprKind::Skew(_), [a]) => ExprKind::Skew(a.clone()),
                (ExprKind::Transpose(_), [a]) => ExprKind::Transpose(a.clone()),
                (ExprKind::Tan(_), [a]) => ExprKind::Tan(a.clone()),
                (ExprKind::Sign(_), [a]) => ExprKind::Sign(a.clone()),
                (ExprKind::Inverse(_), [a]) => ExprKind::Inverse(a.clone()),
                (ExprKind::Log(_), [a]) => ExprKind::Log(a.clone()),
                (ExprKind::Pow(_, _), [a, b]) => ExprKind::Pow(a.clone(), b.clone()),
                (ExprKind::Solve(_, _), [a, b]) => ExprKind::Solve(a.clone(), b.clone()),
                (ExprKind::Atan2(_, _), [a, b]) => ExprKind::Atan2(a.clone(), b.clone()),
                (ExprKind::Greater(_, _), [a, b]) => ExprKind::Greater(a.clone(), b.clone()),
                (ExprKind::Less(_, _), [a, b]) => ExprKind::Less(a.clone(), b.clone()),
                (ExprKind::Equal(_, _), [a, b]) => ExprKind::Equal(a.clone(), b.clone()),
                (ExprKind::Jacobian(_, _), [a, b]) => ExprKind::Jacobian(a.clone(), b.clone()),
                (ExprKind::Outer(_, _), [a, b]) => ExprKind::Outer(a.clone(), b.clone()),
                (ExprKind::If(_, _, _), [c, a, b]) => ExprKind::If(c.clone(), a.clone(), b.clone()),
                (kind, args) => {
                    return Err(SymbolicsError::internal(format!(
                        "{:?} cannot be rebuilt from {} arguments!",
                        kind.ty(),
                        args.len()
                    )))
                }
            },
        };
        Expr::build(kind)
    }

    /// Replaces every occurrence of `old` (by structural equality) with `new`.
    ///
    /// Subtrees that contain no occurrence are shared with the original expression.
    ///
    /// # Arguments
    /// * `old` - The subexpression to look for
    /// * `new` - The replacement
    ///
    /// # Returns
    /// The substituted expression, or an error if a rebuilt node violates its shape rules
    /// (e.g. when `new` has a different shape than `old`)
    pub fn subs(&self, old: &Expr, new: &Expr) -> SymbolicsResult<Expr> {
        debug!("subs({old} -> {new})");
        self.subs_rec(old, new)
    }

    fn subs_rec(&self, old: &Expr, new: &Expr) -> SymbolicsResult<Expr> {
        if self == old {
            return Ok(new.clone());
        }
        let args = self.args();
        if args.is_empty() {
            return Ok(self.clone());
        }
        let new_args = args
            .iter()
            .map(|a| a.subs_rec(old, new))
            .collect::<SymbolicsResult<ExprVec>>()?;
        if new_args.iter().zip(&args).all(|(n, o)| n.ptr_eq(o)) {
            return Ok(self.clone());
        }
        self.with_args(new_args)
    }

    /// Rebuilds the expression bottom-up through `visitor`.
    ///
    /// Children are processed first (post-order); each node is rebuilt from its processed
    /// children and then handed to the visitor, whose result replaces it.
    pub fn iterate<V: Visitor + ?Sized>(&self, visitor: &mut V) -> SymbolicsResult<Expr> {
        let args = self.args();
        let node = if args.is_empty() {
            self.clone()
        } else {
            let new_args = args
                .iter()
                .map(|a| a.iterate(visitor))
                .collect::<SymbolicsResult<ExprVec>>()?;
            if new_args.iter().zip(&args).all(|(n, o)| n.ptr_eq(o)) {
                self.clone()
            } else {
                self.with_args(new_args)?
            }
        };
        visitor.process(node)
    }

    /// Walks the expression top-down.
    ///
    /// `f` is called for every node before its children; returning `false` skips the
    /// children of that node.
    pub fn scan<F: FnMut(&Expr) -> bool>(&self, f: &mut F) {
        if f(self) {
            for arg in self.args() {
                arg.scan(f);
            }
        }
    }

    /// The set of symbols this expression depends on.
    pub fn atoms(&self) -> ExprSet {
        let mut atoms = ExprSet::new();
        let mut seen: HashSet<*const Node> = HashSet::new();
        self.scan(&mut |e: &Expr| {
            if !seen.insert(Rc::as_ptr(&e.0)) {
                return false;
            }
            if e.as_symbol().is_some() {
                atoms.insert(e.clone());
            }
            true
        });
        atoms
    }

    /// Multi-line rendering of the DAG with highlighted type tags, for debugging.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, 0);
        out
    }

    fn write_tree(&self, out: &mut String, depth: usize) {
        let label = match self.kind() {
            ExprKind::Bool(_)
            | ExprKind::Symbol(_)
            | ExprKind::Zero(_)
            | ExprKind::Int(_)
            | ExprKind::Real(_) => format!(" {self}"),
            ExprKind::Element(_, row, col) => format!(" [{row},{col}]"),
            ExprKind::Unknown(name, _) => format!(" {name}"),
            _ => String::new(),
        };
        out.push_str(&format!(
            "{}{}{} {}\n",
            "  ".repeat(depth),
            format!("{:?}", self.ty()).cyan().bold(),
            label,
            self.shape().to_string().dimmed()
        ));
        for arg in self.args() {
            arg.write_tree(out, depth + 1);
        }
    }

    /// Type tag used for ordering: the numeric leaves share one rank.
    fn rank(&self) -> Type {
        match self.ty() {
            Type::Int | Type::Real => Type::Zero,
            ty => ty,
        }
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        let shape = symbol.shape();
        Expr::from_parts(ExprKind::Symbol(symbol), shape)
    }
}

impl From<Matrix> for Expr {
    fn from(matrix: Matrix) -> Self {
        let shape = matrix.shape();
        let simplified = matrix.is_simplified();
        let expr = Expr::from_parts(ExprKind::Matrix(matrix), shape);
        if simplified {
            expr.mark_simplified();
        }
        expr
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::int(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::int(i64::from(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::real(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::boolean(value)
    }
}

// ────────────────────────────────────────────────────────────────────────────
//  Shape rules
// ────────────────────────────────────────────────────────────────────────────

fn require_same_shape(a: &Expr, b: &Expr, what: &str) -> SymbolicsResult<Shape> {
    if a.shape() != b.shape() {
        return Err(SymbolicsError::internal(format!(
            "{what}: shapes {} and {} are not equal!",
            a.shape(),
            b.shape()
        )));
    }
    Ok(a.shape())
}

fn infer_shape(kind: &ExprKind) -> SymbolicsResult<Shape> {
    match kind {
        ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Real(_) => Ok(Shape::scalar()),
        ExprKind::Zero(shape) => Ok(*shape),
        ExprKind::Symbol(s) => Ok(s.shape()),
        ExprKind::Matrix(m) => Ok(m.shape()),
        ExprKind::Neg(a)
        | ExprKind::Sin(a)
        | ExprKind::Cos(a)
        | ExprKind::Tan(a)
        | ExprKind::Asin(a)
        | ExprKind::Acos(a)
        | ExprKind::Atan(a)
        | ExprKind::Abs(a)
        | ExprKind::Sign(a)
        | ExprKind::Der(a)
        | ExprKind::Log(a) => Ok(a.shape()),
        ExprKind::Add(args) => {
            let (first, rest) = args
                .split_first()
                .ok_or_else(|| SymbolicsError::internal("Add needs at least one argument!"))?;
            rest.iter()
                .try_fold(first.shape(), |acc, a| acc.combine_elementwise(&a.shape()))
        }
        ExprKind::Mul(args) => {
            let (first, rest) = args
                .split_first()
                .ok_or_else(|| SymbolicsError::internal("Mul needs at least one argument!"))?;
            rest.iter()
                .try_fold(first.shape(), |acc, a| acc.combine_matmul(&a.shape()))
        }
        ExprKind::Unknown(_, args) => args
            .iter()
            .try_fold(Shape::scalar(), |acc, a| acc.combine_elementwise(&a.shape())),
        ExprKind::Pow(base, exponent) => {
            let s = base.shape();
            if !exponent.is_scalar() {
                return Err(SymbolicsError::shape(format!(
                    "Exponent of Pow must be scalar but is {}!",
                    exponent.shape()
                )));
            }
            if s.is_vector() {
                return Err(SymbolicsError::shape("Pow is not defined for vectors!"));
            }
            if s.is_matrix() && !s.is_square() {
                return Err(SymbolicsError::shape(
                    "Pow is only defined for square matrices!",
                ));
            }
            Ok(s)
        }
        ExprKind::Element(arg, row, col) => {
            let s = arg.shape();
            if *row >= s.dim1() {
                return Err(SymbolicsError::index("Element: Row outside range!"));
            }
            if *col >= s.dim2() {
                return Err(SymbolicsError::index("Element: Column outside range!"));
            }
            Ok(Shape::scalar())
        }
        ExprKind::Solve(a, b) => {
            let (s1, s2) = (a.shape(), b.shape());
            if !s1.is_square() {
                return Err(SymbolicsError::shape(
                    "Solve is only defined for square matrix as first argument!",
                ));
            }
            if s2.dim2() != 1 {
                return Err(SymbolicsError::shape(format!(
                    "Solve is only defined for vectors as second argument! Got {s2} instead."
                )));
            }
            if s1.dim1() != s2.dim1() {
                return Err(SymbolicsError::shape(format!(
                    "Solve: Dimension of Matrix {s1} does not fit dimension of Vector {s2}!"
                )));
            }
            if s2.is_scalar() {
                Ok(Shape::scalar())
            } else {
                Ok(Shape::vector(s1.dim2()))
            }
        }
        ExprKind::Atan2(a, b) => {
            if !a.is_scalar() {
                return Err(SymbolicsError::shape(
                    "Atan2 - First argument must be scalar!",
                ));
            }
            if !b.is_scalar() {
                return Err(SymbolicsError::shape(
                    "Atan2 - Second argument must be scalar!",
                ));
            }
            Ok(Shape::scalar())
        }
        ExprKind::Scalar(a) => {
            let s = a.shape();
            if s.dim1() != 1 || s.dim2() != 1 {
                return Err(SymbolicsError::shape(format!(
                    "Scalar - Argument must be (1,1) but is {s}!"
                )));
            }
            Ok(Shape::scalar())
        }
        ExprKind::Skew(a) => {
            if !matches!(a.kind(), ExprKind::Zero(_)) && a.shape() != Shape::vector(3) {
                return Err(SymbolicsError::shape(format!(
                    "Skew is only defined for 3x1 Vectors! Shape of argument is {}.",
                    a.shape()
                )));
            }
            Ok(Shape::matrix(3, 3))
        }
        ExprKind::Transpose(a) => Ok(a.shape().transpose()),
        ExprKind::If(_, a, b) => require_same_shape(a, b, "If then exp has different shape as else exp"),
        ExprKind::Greater(a, b) => require_same_shape(a, b, "Greater"),
        ExprKind::Less(a, b) => require_same_shape(a, b, "Less"),
        ExprKind::Equal(a, b) => require_same_shape(a, b, "Equal"),
        ExprKind::Jacobian(e, symbols) => {
            if e.is_matrix() {
                return Err(SymbolicsError::internal(
                    "Jacobian could only be used with Scalar or Vector as first argument!",
                ));
            }
            if !symbols.is_vector() {
                return Err(SymbolicsError::internal(
                    "Jacobian could only be used with Vector as second argument!",
                ));
            }
            Ok(Shape::matrix(e.shape().num_el(), symbols.shape().num_el()))
        }
        ExprKind::Outer(a, b) => {
            if !a.is_vector() {
                return Err(SymbolicsError::shape(format!(
                    "First Argument of Outer must be a nx1 Vector! Shape of argument is {}.",
                    a.shape()
                )));
            }
            if !b.is_vector() {
                return Err(SymbolicsError::shape(format!(
                    "Second Argument of Outer must be a nx1 Vector! Shape of argument is {}.",
                    b.shape()
                )));
            }
            let (n, m) = (a.shape().num_el(), b.shape().num_el());
            if n != m {
                return Err(SymbolicsError::shape(format!(
                    "First and second argument must have same length ({n}!={m})!"
                )));
            }
            Ok(Shape::matrix(n, n))
        }
        ExprKind::Inverse(a) => {
            let s = a.shape();
            if !s.is_matrix() {
                return Err(SymbolicsError::internal(format!(
                    "Inverse of {a} is not defined!"
                )));
            }
            if !s.is_square() {
                return Err(SymbolicsError::shape(format!(
                    "Inverse is only defined for square matrices but got {s}!"
                )));
            }
            Ok(s)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
//  Structural identity
// ────────────────────────────────────────────────────────────────────────────

/// Numeric value used for hashing the numeric class; `-0.0` becomes `0.0`.
fn numeric_key(kind: &ExprKind) -> Option<f64> {
    let v = match kind {
        ExprKind::Zero(_) => 0.0,
        ExprKind::Int(v) => *v as f64,
        ExprKind::Real(v) => *v,
        _ => return None,
    };
    Some(if v == 0.0 { 0.0 } else { v })
}

/// Exact ordering of two members of the numeric class.
///
/// Integers are never rounded to `f64`, so `Int(2^53 + 1)` stays above `Real(2^53)`.
fn cmp_numeric(a: &ExprKind, b: &ExprKind) -> Option<Ordering> {
    let int = |k: &ExprKind| match k {
        ExprKind::Zero(_) => Some(0),
        ExprKind::Int(v) => Some(*v),
        _ => None,
    };
    match (int(a), int(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        (Some(x), None) => Some(cmp_int_real(x, numeric_key(b)?)),
        (None, Some(y)) => Some(cmp_int_real(y, numeric_key(a)?).reverse()),
        (None, None) => Some(numeric_key(a)?.total_cmp(&numeric_key(b)?)),
    }
}

fn cmp_int_real(i: i64, r: f64) -> Ordering {
    // i64::MIN and 2^63 are exact in f64
    const LOWER: f64 = i64::MIN as f64;
    const UPPER: f64 = -(i64::MIN as f64);
    if !r.is_finite() {
        return (i as f64).total_cmp(&r);
    }
    let floor = r.floor();
    if floor < LOWER {
        return Ordering::Greater;
    }
    if floor >= UPPER {
        return Ordering::Less;
    }
    match i.cmp(&(floor as i64)) {
        Ordering::Equal if r > floor => Ordering::Less,
        o => o,
    }
}

/// Multiplicative string hash (factor 65599) used for symbol names.
fn name_hash(name: &str) -> u64 {
    name.bytes()
        .fold(0u64, |h, b| u64::from(b).wrapping_add(h.wrapping_mul(65599)))
}

/// Finalizer that spreads child hashes before they are summed.
fn mix(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

fn unordered_hash<'a>(args: impl Iterator<Item = &'a Expr>) -> u64 {
    args.fold(0u64, |acc, a| acc.wrapping_add(mix(a.0.hash)))
}

fn structural_hash(kind: &ExprKind, shape: &Shape) -> u64 {
    let mut hasher = DefaultHasher::new();
    let rank = match kind.ty() {
        Type::Int | Type::Real => Type::Zero,
        ty => ty,
    };
    rank.hash(&mut hasher);
    shape.hash(&mut hasher);
    match kind {
        ExprKind::Zero(_) | ExprKind::Int(_) | ExprKind::Real(_) => {
            numeric_key(kind).unwrap_or_default().to_bits().hash(&mut hasher)
        }
        ExprKind::Bool(b) => b.hash(&mut hasher),
        ExprKind::Symbol(s) => name_hash(s.name()).hash(&mut hasher),
        ExprKind::Add(args) => {
            args.len().hash(&mut hasher);
            unordered_hash(args.iter()).hash(&mut hasher);
        }
        ExprKind::Mul(args) => {
            let (scalars, others): (Vec<&Expr>, Vec<&Expr>) =
                args.iter().partition(|a| a.is_scalar());
            scalars.len().hash(&mut hasher);
            unordered_hash(scalars.into_iter()).hash(&mut hasher);
            for a in others {
                a.0.hash.hash(&mut hasher);
            }
        }
        ExprKind::Element(a, row, col) => {
            a.0.hash.hash(&mut hasher);
            row.hash(&mut hasher);
            col.hash(&mut hasher);
        }
        ExprKind::Unknown(name, args) => {
            name.hash(&mut hasher);
            args.len().hash(&mut hasher);
            for a in args {
                a.0.hash.hash(&mut hasher);
            }
        }
        kind => {
            for a in kind.children() {
                a.0.hash.hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

fn cmp_seq(a: &[Expr], b: &[Expr]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

fn cmp_unordered(a: &[Expr], b: &[Expr]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        let a: ExprVec = a.iter().sorted().cloned().collect();
        let b: ExprVec = b.iter().sorted().cloned().collect();
        cmp_seq(&a, &b)
    })
}

fn cmp_payload(a: &ExprKind, b: &ExprKind) -> Ordering {
    if let Some(o) = cmp_numeric(a, b) {
        return o;
    }
    match (a, b) {
        (ExprKind::Bool(x), ExprKind::Bool(y)) => x.cmp(y),
        (ExprKind::Symbol(x), ExprKind::Symbol(y)) => x.name().cmp(y.name()),
        (ExprKind::Matrix(x), ExprKind::Matrix(y)) => cmp_seq(x.values(), y.values()),
        (ExprKind::Add(x), ExprKind::Add(y)) => cmp_unordered(x, y),
        (ExprKind::Mul(x), ExprKind::Mul(y)) => {
            let (xs, xo): (ExprVec, ExprVec) = x.iter().cloned().partition(|e| e.is_scalar());
            let (ys, yo): (ExprVec, ExprVec) = y.iter().cloned().partition(|e| e.is_scalar());
            cmp_unordered(&xs, &ys).then_with(|| cmp_seq(&xo, &yo))
        }
        (ExprKind::Element(x, r1, c1), ExprKind::Element(y, r2, c2)) => {
            x.cmp(y).then(r1.cmp(r2)).then(c1.cmp(c2))
        }
        (ExprKind::Unknown(n1, x), ExprKind::Unknown(n2, y)) => {
            n1.cmp(n2).then_with(|| cmp_seq(x, y))
        }
        (a, b) => cmp_seq(&a.children(), &b.children()),
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.0.hash == other.0.hash && self.cmp(other).is_eq())
    }
}

impl Eq for Expr {}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.ptr_eq(other) {
            return Ordering::Equal;
        }
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.shape().cmp(&other.shape()))
            .then_with(|| cmp_payload(self.kind(), other.kind()))
    }
}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

// ────────────────────────────────────────────────────────────────────────────
//  Display
// ────────────────────────────────────────────────────────────────────────────

/// Debug string form of an expression.
///
/// This is not a program fragment of any target language; that is the job of a
/// [`crate::printer::Printer`]. Sums render negated terms with `-`, e.g. `(a + b - c)`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Bool(b) => write!(f, "{b}"),
            ExprKind::Symbol(s) => write!(f, "{}", s.name()),
            ExprKind::Zero(shape) if shape.is_scalar() => write!(f, "0"),
            ExprKind::Zero(shape) => write!(f, "zeros{shape}"),
            ExprKind::Int(v) => write!(f, "{v}"),
            ExprKind::Real(v) => write!(f, "{v:?}"),
            ExprKind::Matrix(m) => write!(f, "{m}"),
            ExprKind::Neg(a) => write!(f, "-({a})"),
            ExprKind::Add(args) => {
                write!(f, "(")?;
                for (i, arg) in args.iter().enumerate() {
                    match (i, arg.kind()) {
                        (0, _) => write!(f, "{arg}")?,
                        (_, ExprKind::Neg(inner)) => write!(f, " - {inner}")?,
                        _ => write!(f, " + {arg}")?,
                    }
                }
                write!(f, ")")
            }
            ExprKind::Mul(args) => write!(f, "({})", args.iter().join(" * ")),
            ExprKind::Pow(base, exponent) => write!(f, "({base})^{exponent}"),
            ExprKind::Sin(a) => write!(f, "sin({a})"),
            ExprKind::Cos(a) => write!(f, "cos({a})"),
            ExprKind::Tan(a) => write!(f, "tan({a})"),
            ExprKind::Asin(a) => write!(f, "Asin({a})"),
            ExprKind::Acos(a) => write!(f, "Acos({a})"),
            ExprKind::Atan(a) => write!(f, "Atan({a})"),
            ExprKind::Atan2(a, b) => write!(f, "atan2({a},{b})"),
            ExprKind::Der(a) => write!(f, "der({a})"),
            ExprKind::Element(a, row, col) => write!(f, "Element({a},{row},{col})"),
            ExprKind::Solve(a, b) => write!(f, "Solve({a},{b})"),
            ExprKind::Abs(a) => write!(f, "abs({a})"),
            ExprKind::Scalar(a) => write!(f, "Scalar({a})"),
            ExprKind::Skew(a) => write!(f, "Skew({a})"),
            ExprKind::Transpose(a) => write!(f, "Transpose({a})"),
            ExprKind::Unknown(name, args) => write!(f, "{name}({})", args.iter().join(",")),
            ExprKind::If(c, a, b) => write!(f, "If({c} then {a} else {b})"),
            ExprKind::Greater(a, b) => write!(f, "greater({a},{b})"),
            ExprKind::Less(a, b) => write!(f, "less({a},{b})"),
            ExprKind::Equal(a, b) => write!(f, "equal({a},{b})"),
            ExprKind::Sign(a) => write!(f, "Sign({a})"),
            ExprKind::Jacobian(a, b) => write!(f, "jacobian({a},{b})"),
            ExprKind::Outer(a, b) => write!(f, "Outer({a},{b})"),
            ExprKind::Inverse(a) => write!(f, "Inverse({a})"),
            ExprKind::Log(a) => write!(f, "log({a})"),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
