//! Kinematics of a planar double pendulum.
//!
//! Builds the position of the second mass from the joint angles `q1` and `q2`, then derives:
//! - its velocity, with the time derivative `der`
//! - the Jacobian with respect to the joint angles
//! - the residual `v - J * der(q)`, which simplifies to zero
//!
//! The rewrite passes log at debug level.
//!
//! Run with: `cargo run --example pendulum`

use colored::Colorize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use symbolics::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let (q1, q2) = (Expr::symbol("q1"), Expr::symbol("q2"));
    let l1 = Expr::symbol_with("l1", Shape::scalar(), SymbolKind::Parameter);
    let l2 = Expr::symbol_with("l2", Shape::scalar(), SymbolKind::Parameter);

    // r = [l1 sin(q1) + l2 sin(q2), -(l1 cos(q1) + l2 cos(q2))]
    let x = add(&mul(&l1, &sin(&q1)?)?, &mul(&l2, &sin(&q2)?)?)?;
    let y = neg(&add(&mul(&l1, &cos(&q1)?)?, &mul(&l2, &cos(&q2)?)?)?)?;
    let r = Expr::from(Matrix::from_values(vec![x, y], Shape::try_vector(2)?)?);

    println!("\n{}", "=== Position ===".bright_blue().bold());
    println!("r = {r}");

    println!("\n{}", "=== Velocity ===".bright_green().bold());
    let v = r.der()?.simplify()?;
    println!("v = {v}");

    println!("\n{}", "=== Jacobian ===".bright_yellow().bold());
    let q = Expr::from(Matrix::from_values(vec![q1, q2], Shape::try_vector(2)?)?);
    let j = jacobian(&r, &q)?;
    println!("J = {j}");

    let residual = sub(&v, &mul(&j, &q.der()?)?)?.simplify()?;
    println!("\nv - J * der(q) = {residual}");
    println!("\n{}", j.tree());

    Ok(())
}
