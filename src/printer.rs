//! Interface for code generators that print expressions in a target language.
//!
//! A [`Printer`] dispatches every node variant to its own `print_*` method. The methods for
//! which no target-independent form exists (matrices, element access, powers, skew matrices,
//! zeros and truth values) must be provided by the implementor; all others default to a
//! C-like function call notation.
//!
//! Printing never fails. A construct the target cannot express is reported through
//! [`Printer::error`], which logs a warning, counts the error and returns a placeholder, so
//! that a code generator can finish a whole model and report every problem at once.

use log::warn;

use crate::expr::{Expr, ExprKind};
use crate::matrix::Matrix;
use crate::shape::Shape;

/// Number of soft errors a printer has reported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCount(usize);

impl ErrorCount {
    pub fn get(&self) -> usize {
        self.0
    }
}

/// Separators and brackets used by [`Printer::print_matrix_with`].
///
/// A matrix is printed as
/// `open row_open a11 col_sep a12 row_close row_sep line_break row_open ... row_close close`.
/// Vectors are printed flat (`open a1 sep a2 close`, using `row_sep` for column vectors and
/// `col_sep` for row vectors) when the separators differ or `flat_vectors` is set.
#[derive(Debug, Clone, Copy)]
pub struct MatrixFormat<'a> {
    pub col_sep: &'a str,
    pub row_sep: &'a str,
    pub open: &'a str,
    pub close: &'a str,
    pub row_open: &'a str,
    pub row_close: &'a str,
    pub line_break: &'a str,
    pub flat_vectors: bool,
}

impl Default for MatrixFormat<'_> {
    fn default() -> Self {
        MatrixFormat {
            col_sep: ",",
            row_sep: ";",
            open: "[",
            close: "]",
            row_open: "",
            row_close: "",
            line_break: "",
            flat_vectors: false,
        }
    }
}

pub trait Printer {
    /// The error counter owned by the printer.
    fn error_counter(&mut self) -> &mut ErrorCount;

    fn print_element(&mut self, x: &Expr, row: usize, col: usize) -> String;
    fn print_matrix(&mut self, m: &Matrix) -> String;
    fn print_pow(&mut self, base: &Expr, exponent: &Expr) -> String;
    fn print_skew(&mut self, x: &Expr) -> String;
    fn print_zero(&mut self, shape: Shape) -> String;
    fn print_bool(&mut self, value: bool) -> String;

    /// Prints `e` by dispatching on its node type.
    fn print(&mut self, e: &Expr) -> String {
        match e.kind() {
            ExprKind::Bool(b) => self.print_bool(*b),
            ExprKind::Symbol(s) => self.print_symbol(s.name()),
            ExprKind::Zero(shape) => self.print_zero(*shape),
            ExprKind::Int(v) => self.print_int(*v),
            ExprKind::Real(v) => self.print_real(*v),
            ExprKind::Matrix(m) => self.print_matrix(m),
            ExprKind::Neg(a) => self.print_neg(a),
            ExprKind::Add(args) => self.print_add(args),
            ExprKind::Mul(args) => self.print_mul(args),
            ExprKind::Pow(base, exponent) => self.print_pow(base, exponent),
            ExprKind::Sin(a) => self.print_function("sin", a),
            ExprKind::Cos(a) => self.print_function("cos", a),
            ExprKind::Tan(a) => self.print_function("tan", a),
            ExprKind::Asin(a) => self.print_function("asin", a),
            ExprKind::Acos(a) => self.print_function("acos", a),
            ExprKind::Atan(a) => self.print_function("atan", a),
            ExprKind::Atan2(y, x) => self.print_atan2(y, x),
            ExprKind::Abs(a) => self.print_function("abs", a),
            ExprKind::Sign(a) => self.print_function("sign", a),
            ExprKind::Log(a) => self.print_function("log", a),
            ExprKind::Der(a) => self.print_der(a),
            ExprKind::Element(a, row, col) => self.print_element(a, *row, *col),
            ExprKind::Scalar(a) => self.print_scalar(a),
            ExprKind::Skew(a) => self.print_skew(a),
            ExprKind::Transpose(a) => self.print_transpose(a),
            ExprKind::Inverse(a) => self.print_inverse(a),
            ExprKind::Solve(a, b) => self.print_solve(a, b),
            ExprKind::Outer(a, b) => self.print_outer(a, b),
            ExprKind::Jacobian(a, b) => self.print_jacobian(a, b),
            ExprKind::If(c, a, b) => self.print_if(c, a, b),
            ExprKind::Equal(a, b) => self.print_comparison(a, "==", b),
            ExprKind::Greater(a, b) => self.print_comparison(a, ">", b),
            ExprKind::Less(a, b) => self.print_comparison(a, "<", b),
            ExprKind::Unknown(name, args) => self.print_unknown(name, args),
        }
    }

    /// Reports a construct the target cannot express.
    ///
    /// # Returns
    /// A placeholder to put in place of the printed expression
    fn error(&mut self, msg: &str) -> String {
        warn!("Printer: {msg}");
        self.error_counter().0 += 1;
        format!("(Error: {msg})")
    }

    /// Number of errors reported so far, optionally resetting the counter.
    fn error_count(&mut self, reset: bool) -> usize {
        let counter = self.error_counter();
        let count = counter.0;
        if reset {
            counter.0 = 0;
        }
        count
    }

    fn print_symbol(&mut self, name: &str) -> String {
        name.to_string()
    }

    fn print_int(&mut self, value: i64) -> String {
        // parenthesized so that the sign never follows another operator
        if value < 0 {
            format!("({value})")
        } else {
            value.to_string()
        }
    }

    fn print_real(&mut self, value: f64) -> String {
        if value < 0.0 {
            format!("({value:?})")
        } else {
            format!("{value:?}")
        }
    }

    fn print_neg(&mut self, x: &Expr) -> String {
        format!("(-{})", self.print(x))
    }

    fn print_add(&mut self, args: &[Expr]) -> String {
        format!("({})", self.join_signed(args, " + ", " - "))
    }

    fn print_mul(&mut self, args: &[Expr]) -> String {
        format!("({})", self.join(args, " * "))
    }

    fn print_function(&mut self, name: &str, x: &Expr) -> String {
        format!("{name}({})", self.print(x))
    }

    fn print_atan2(&mut self, y: &Expr, x: &Expr) -> String {
        format!("atan2({},{})", self.print(y), self.print(x))
    }

    /// Time derivatives are printed as `der_x`, which requires the argument to be a symbol
    /// or an element of a symbol.
    fn print_der(&mut self, x: &Expr) -> String {
        let printable = match x.kind() {
            ExprKind::Symbol(_) => true,
            ExprKind::Element(inner, _, _) => inner.as_symbol().is_some(),
            _ => false,
        };
        if !printable {
            let printed = self.print(x);
            return self.error(&format!(
                "Der: Argument of Der can only be Symbol or Element of Symbol in chosen export \
                 language, but it is of type '{:?}' and expands to: '{printed}'",
                x.ty()
            ));
        }
        format!("der_{}", self.print(x))
    }

    fn print_transpose(&mut self, x: &Expr) -> String {
        format!("transpose({})", self.print(x))
    }

    fn print_scalar(&mut self, _x: &Expr) -> String {
        self.error("Function 'Scalar' not implemented in chosen export language")
    }

    fn print_inverse(&mut self, _x: &Expr) -> String {
        self.error("Function 'Inverse' not implemented in chosen export language")
    }

    fn print_solve(&mut self, _a: &Expr, _b: &Expr) -> String {
        self.error("Function 'Solve' not implemented in chosen export language")
    }

    fn print_jacobian(&mut self, _e: &Expr, _symbols: &Expr) -> String {
        self.error("Function 'Jacobian' not implemented in chosen export language")
    }

    fn print_if(&mut self, _condition: &Expr, _a: &Expr, _b: &Expr) -> String {
        self.error("Function 'If' not implemented in chosen export language")
    }

    /// `a * b^T`
    fn print_outer(&mut self, a: &Expr, b: &Expr) -> String {
        let product = Expr::build(ExprKind::Transpose(b.clone()))
            .and_then(|bt| Expr::build(ExprKind::Mul(vec![a.clone(), bt])));
        match product {
            Ok(p) => self.print(&p),
            Err(err) => self.error(&err.to_string()),
        }
    }

    fn print_comparison(&mut self, a: &Expr, op: &str, b: &Expr) -> String {
        format!("({} {op} {})", self.print(a), self.print(b))
    }

    fn print_unknown(&mut self, name: &str, args: &[Expr]) -> String {
        format!("{name}({})", self.join(args, ","))
    }

    /// Prints `args` separated by `sep`.
    fn join(&mut self, args: &[Expr], sep: &str) -> String {
        args.iter()
            .map(|a| self.print(a))
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// Prints the terms of a sum; negated terms and negative numbers after the first term use
    /// `neg_sep` and are printed without their sign.
    fn join_signed(&mut self, args: &[Expr], pos_sep: &str, neg_sep: &str) -> String {
        let mut out = String::new();
        for (i, arg) in args.iter().enumerate() {
            if i == 0 {
                out += &self.print(arg);
                continue;
            }
            match arg.kind() {
                ExprKind::Neg(inner) => {
                    out += neg_sep;
                    out += &self.print(inner);
                }
                ExprKind::Int(v) if *v < 0 => {
                    out += neg_sep;
                    out += &self.print_int(v.saturating_neg());
                }
                ExprKind::Real(v) if *v < 0.0 => {
                    out += neg_sep;
                    out += &self.print_real(-v);
                }
                _ => {
                    out += pos_sep;
                    out += &self.print(arg);
                }
            }
        }
        out
    }

    /// Prints an explicit matrix with the given separators and brackets.
    fn print_matrix_with(&mut self, m: &Matrix, format: MatrixFormat<'_>) -> String {
        let shape = m.shape();
        let values = m.values();
        if shape.is_scalar() {
            return self.print(&values[0]);
        }
        if shape.is_vector() && (format.col_sep != format.row_sep || format.flat_vectors) {
            let sep = if shape.dim1() > 1 {
                format.row_sep
            } else {
                format.col_sep
            };
            return format!("{}{}{}", format.open, self.join(values, sep), format.close);
        }
        let (rows, cols) = (shape.dim1(), shape.dim2());
        let mut out = String::from(format.open);
        for r in 0..rows {
            out += format.row_open;
            out += &self.join(&values[r * cols..(r + 1) * cols], format.col_sep);
            out += format.row_close;
            if r + 1 < rows {
                out += format.row_sep;
                if !shape.is_vector() {
                    out += format.line_break;
                }
            }
        }
        out + format.close
    }
}
