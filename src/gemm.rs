/*
 * @file gemm.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * General matrix multiply, D = beta*C + alpha*op(A)*op(B).
 *
 * The output is covered by register tiles: row blocks of 3, 2 or 1
 * registers by TILE_COLUMNS columns.  Each tile loads beta*C, runs the
 * whole reduction in registers (in increasing k order, so results are
 * reproducible), and is stored once.  Transposes are resolved up front by
 * handing the tile a transposed pointer; the inner loop never branches
 * on them.
 */

use crate::blocking::{row_blocks,check_shape};
use crate::error::Result;
use crate::simd::Scalar;
use crate::tilematrix::matrix::{Matrix,MatrixMut};
use crate::tilematrix::pointer::MatrixPointer;
use crate::tilematrix::tile::{RegisterTile,TILE_COLUMNS};
use std::cmp::min;

/** Whether to use an operand as-is or transposed */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Op {
    NoTrans,
    Trans
}

/**************************************************************************
 * Tiled backend
 **************************************************************************/

/** Compute one row block of the output, all columns */
#[allow(clippy::too_many_arguments)]
fn gemm_rows<T,PA,PB,C,D,const RM:usize>(
    alpha:T, a:PA, b:PB, (m,n,k):(usize,usize,usize),
    beta:T, c:Option<&C>, d:&mut D, i:usize
) where T:Scalar, PA:MatrixPointer<T>, PB:MatrixPointer<T>, C:Matrix<T>, D:MatrixMut<T> {
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, m-i);
    let pa = a.at(i,0);
    let mut j = 0;
    while j < n {
        let cols = min(TILE_COLUMNS, n-j);
        let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
        if beta != T::zero() {
            match c {
                Some(c) => ker.load_scaled(beta, c.ptr(i,j), rows, cols),
                None => ker.load_scaled(beta, d.ptr(i,j), rows, cols)
            }
        }
        ker.gemm(alpha, pa, b.at(0,j), k, rows, cols);
        ker.store_partial(&mut d.ptr_mut(i,j), rows, cols);
        j += TILE_COLUMNS;
    }
}

/**
 * D = beta*C + alpha*A*B for pointers `a` (m x k) and `b` (k x n).  With
 * `c == None`, C is D itself.  Shapes are not checked here.
 */
#[allow(clippy::too_many_arguments)]
pub(crate) fn gemm_backend<T,PA,PB,C,D>(
    alpha:T, a:PA, b:PB, m:usize, n:usize, k:usize,
    beta:T, c:Option<&C>, d:&mut D
) where T:Scalar, PA:MatrixPointer<T>, PB:MatrixPointer<T>, C:Matrix<T>, D:MatrixMut<T> {
    for (i,regs) in row_blocks(m, T::LANES) {
        match regs {
            3 => gemm_rows::<T,PA,PB,C,D,3>(alpha, a, b, (m,n,k), beta, c, d, i),
            2 => gemm_rows::<T,PA,PB,C,D,2>(alpha, a, b, (m,n,k), beta, c, d, i),
            _ => gemm_rows::<T,PA,PB,C,D,1>(alpha, a, b, (m,n,k), beta, c, d, i),
        }
    }
}

/** Check shapes, then run the backend.  `(m,k)` is op(A)'s shape, `(kb,n)` op(B)'s. */
#[allow(clippy::too_many_arguments)]
fn gemm_checked<T,PA,PB,C,D>(
    op:&'static str, alpha:T, a:PA, (m,k):(usize,usize), b:PB, (kb,n):(usize,usize),
    beta:T, c:Option<&C>, d:&mut D
) -> Result<()> where T:Scalar, PA:MatrixPointer<T>, PB:MatrixPointer<T>, C:Matrix<T>, D:MatrixMut<T> {
    check_shape(op, (k,n), (kb,n))?;
    if let Some(c) = c { check_shape(op, (m,n), c.shape())?; }
    check_shape(op, (m,n), d.shape())?;
    gemm_backend(alpha, a, b, m, n, k, beta, c, d);
    Ok(())
}

fn transposed(shape:(usize,usize)) -> (usize,usize) { (shape.1, shape.0) }

/**************************************************************************
 * Entry points
 **************************************************************************/

/** D = beta*C + alpha*A*B */
pub fn gemm<T,A,B,C,D>(alpha:T, a:&A, b:&B, beta:T, c:&C, d:&mut D) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, C:Matrix<T>, D:MatrixMut<T> {
    gemm_checked("gemm", alpha, a.ptr(0,0), a.shape(), b.ptr(0,0), b.shape(), beta, Some(c), d)
}

/** D = beta*C + alpha*A*B^T */
pub fn gemm_nt<T,A,B,C,D>(alpha:T, a:&A, b:&B, beta:T, c:&C, d:&mut D) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, C:Matrix<T>, D:MatrixMut<T> {
    gemm_checked("gemm_nt", alpha, a.ptr(0,0), a.shape(),
        b.ptr(0,0).trans(), transposed(b.shape()), beta, Some(c), d)
}

/** D = beta*C + alpha*A^T*B */
pub fn gemm_tn<T,A,B,C,D>(alpha:T, a:&A, b:&B, beta:T, c:&C, d:&mut D) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, C:Matrix<T>, D:MatrixMut<T> {
    gemm_checked("gemm_tn", alpha, a.ptr(0,0).trans(), transposed(a.shape()),
        b.ptr(0,0), b.shape(), beta, Some(c), d)
}

/** D = beta*C + alpha*A^T*B^T */
pub fn gemm_tt<T,A,B,C,D>(alpha:T, a:&A, b:&B, beta:T, c:&C, d:&mut D) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, C:Matrix<T>, D:MatrixMut<T> {
    gemm_checked("gemm_tt", alpha, a.ptr(0,0).trans(), transposed(a.shape()),
        b.ptr(0,0).trans(), transposed(b.shape()), beta, Some(c), d)
}

/** D = beta*C + alpha*op_a(A)*op_b(B), with the transposes chosen at run time */
#[allow(clippy::too_many_arguments)]
pub fn gemm_op<T,A,B,C,D>(alpha:T, a:&A, op_a:Op, b:&B, op_b:Op, beta:T, c:&C, d:&mut D) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, C:Matrix<T>, D:MatrixMut<T> {
    match (op_a, op_b) {
        (Op::NoTrans, Op::NoTrans) => gemm(alpha, a, b, beta, c, d),
        (Op::NoTrans, Op::Trans)   => gemm_nt(alpha, a, b, beta, c, d),
        (Op::Trans,   Op::NoTrans) => gemm_tn(alpha, a, b, beta, c, d),
        (Op::Trans,   Op::Trans)   => gemm_tt(alpha, a, b, beta, c, d),
    }
}

/** C = beta*C + alpha*op_a(A)*op_b(B) */
pub fn gemm_op_in_place<T,A,B,C>(alpha:T, a:&A, op_a:Op, b:&B, op_b:Op, beta:T, c:&mut C) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, C:MatrixMut<T> {
    let none = None::<&C>;
    match (op_a, op_b) {
        (Op::NoTrans, Op::NoTrans) => gemm_checked("gemm", alpha, a.ptr(0,0), a.shape(),
            b.ptr(0,0), b.shape(), beta, none, c),
        (Op::NoTrans, Op::Trans) => gemm_checked("gemm_nt", alpha, a.ptr(0,0), a.shape(),
            b.ptr(0,0).trans(), transposed(b.shape()), beta, none, c),
        (Op::Trans, Op::NoTrans) => gemm_checked("gemm_tn", alpha, a.ptr(0,0).trans(), transposed(a.shape()),
            b.ptr(0,0), b.shape(), beta, none, c),
        (Op::Trans, Op::Trans) => gemm_checked("gemm_tt", alpha, a.ptr(0,0).trans(), transposed(a.shape()),
            b.ptr(0,0).trans(), transposed(b.shape()), beta, none, c),
    }
}
