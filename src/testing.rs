/*
 * @file testing.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Test helpers: random operands, naive reference products, and
 * tolerance comparisons.
 */

use crate::tilematrix::matrix::{Matrix,MatrixMut,DynamicMatrix};
use crate::tilematrix::panel::{DynamicPanelMatrix,PanelOptions};
use approx::assert_relative_eq;

/** Sizes straddling the register and tile edges */
pub const SIZES : [usize; 8] = [1,3,4,5,7,8,9,13];

/** A few sizes with several full blocks */
pub const LARGE_SIZES : [usize; 3] = [31,64,67];

/** Panel heights to exercise: one and two registers */
pub const PANEL_HEIGHTS : [usize; 2] = [4,8];

pub fn random_matrix(rows:usize, cols:usize) -> DynamicMatrix<f64> {
    let mut ret = DynamicMatrix::new(rows, cols);
    ret.randomize();
    ret
}

/** Panel-major copy of `m`, with panels of `height` rows */
pub fn to_panel<M:Matrix<f64>>(m:&M, height:usize) -> DynamicPanelMatrix<f64> {
    let opts = PanelOptions { panel_height: Some(height), zero_init: false };
    let mut ret = match DynamicPanelMatrix::with_options(m.rows(), m.columns(), &opts) {
        Ok(p) => p,
        Err(e) => panic!("bad test panel height {}: {}", height, e)
    };
    for i in 0..m.rows() { for j in 0..m.columns() { ret.set(i,j,m.get(i,j)); }}
    ret
}

pub fn random_panel(rows:usize, cols:usize, height:usize) -> DynamicPanelMatrix<f64> {
    to_panel(&random_matrix(rows, cols), height)
}

/** beta*C + alpha*op(A)*op(B), the slow way */
pub fn reference_gemm<A:Matrix<f64>, B:Matrix<f64>, C:Matrix<f64>>(
    alpha:f64, a:&A, trans_a:bool, b:&B, trans_b:bool, beta:f64, c:&C
) -> DynamicMatrix<f64> {
    let (m,k) = if trans_a { (a.columns(), a.rows()) } else { a.shape() };
    let n = if trans_b { b.rows() } else { b.columns() };
    DynamicMatrix::from_fn(m, n, |i,j| {
        let mut acc = 0.0;
        for l in 0..k {
            let x = if trans_a { a.get(l,i) } else { a.get(i,l) };
            let y = if trans_b { b.get(j,l) } else { b.get(l,j) };
            acc += x*y;
        }
        let base = if beta == 0.0 { 0.0 } else { beta * c.get(i,j) };
        base + alpha*acc
    })
}

/** The lower (or upper) triangle of `m`, with zeros elsewhere */
pub fn triangle<M:Matrix<f64>>(m:&M, lower:bool, unit:bool) -> DynamicMatrix<f64> {
    DynamicMatrix::from_fn(m.rows(), m.columns(), |i,j| {
        if i == j && unit { 1.0 }
        else if (lower && i >= j) || (!lower && i <= j) { m.get(i,j) }
        else { 0.0 }
    })
}

/** R*R^T + n*I for a random R: symmetric, comfortably positive definite */
pub fn make_positive_definite(n:usize) -> DynamicMatrix<f64> {
    let r = random_matrix(n, n);
    DynamicMatrix::from_fn(n, n, |i,j| {
        let mut acc = if i == j { n as f64 } else { 0.0 };
        for l in 0..n { acc += r.get(i,l) * r.get(j,l); }
        acc
    })
}

/** A triangular matrix with a dominant diagonal, so that solves are well conditioned */
pub fn well_conditioned_triangle(n:usize, lower:bool) -> DynamicMatrix<f64> {
    let r = random_matrix(n, n);
    DynamicMatrix::from_fn(n, n, |i,j| {
        if i == j { 2.0 + r.get(i,j).abs() }
        else if (lower && i > j) || (!lower && i < j) { r.get(i,j) / (n as f64) }
        else { 0.0 }
    })
}

pub fn assert_close<A:Matrix<f64>, B:Matrix<f64>>(a:&A, b:&B, tol:f64) {
    assert_eq!(a.shape(), b.shape());
    for i in 0..a.rows() { for j in 0..a.columns() {
        assert_relative_eq!(a.get(i,j), b.get(i,j), epsilon = tol, max_relative = tol);
    }}
}
