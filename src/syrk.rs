/*
 * @file syrk.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Symmetric rank-k update, lower triangle: D = beta*C + alpha*A*A^T.
 *
 * Tiled like GEMM, but only tiles that touch the lower triangle are
 * computed.  Tiles straddling the diagonal are stored with a mask, so
 * nothing above the diagonal of D is ever written.
 */

use crate::blocking::{row_blocks,check_shape,check_square};
use crate::error::Result;
use crate::simd::Scalar;
use crate::tilematrix::matrix::{Matrix,MatrixMut};
use crate::tilematrix::pointer::MatrixPointer;
use crate::tilematrix::tile::{RegisterTile,TILE_COLUMNS};
use std::cmp::min;

#[allow(clippy::too_many_arguments)]
fn syrk_rows<T,A,C,D,const RM:usize>(
    alpha:T, a:&A, (n,k):(usize,usize), beta:T, c:Option<&C>, d:&mut D, i:usize
) where T:Scalar, A:Matrix<T>, C:Matrix<T>, D:MatrixMut<T> {
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, n-i);
    let mut j = 0;
    while j < min(i+rows, n) {
        let cols = min(TILE_COLUMNS, n-j);
        let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
        if beta != T::zero() {
            match c {
                Some(c) => ker.load_scaled(beta, c.ptr(i,j), rows, cols),
                None => ker.load_scaled(beta, d.ptr(i,j), rows, cols)
            }
        }
        ker.gemm(alpha, a.ptr(i,0), a.ptr(j,0).trans(), k, rows, cols);
        if j + cols <= i {
            ker.store_partial(&mut d.ptr_mut(i,j), rows, cols);
        } else {
            debug_assert!(j >= i); // row blocks start on register boundaries
            ker.store_lower(&mut d.ptr_mut(i,j), rows, cols, j-i);
        }
        j += TILE_COLUMNS;
    }
}

fn syrk_backend<T,A,C,D>(alpha:T, a:&A, beta:T, c:Option<&C>, d:&mut D)
where T:Scalar, A:Matrix<T>, C:Matrix<T>, D:MatrixMut<T> {
    let (n,k) = a.shape();
    for (i,regs) in row_blocks(n, T::LANES) {
        match regs {
            3 => syrk_rows::<T,A,C,D,3>(alpha, a, (n,k), beta, c, d, i),
            2 => syrk_rows::<T,A,C,D,2>(alpha, a, (n,k), beta, c, d, i),
            _ => syrk_rows::<T,A,C,D,1>(alpha, a, (n,k), beta, c, d, i),
        }
    }
}

/**
 * Lower triangle of D = beta*C + alpha*A*A^T.  Entries of C above the
 * diagonal may be loaded along with diagonal tiles, but they never reach
 * D.  Entries of D above the diagonal keep their old values.
 */
pub fn syrk_ln<T,A,C,D>(alpha:T, a:&A, beta:T, c:&C, d:&mut D) -> Result<()>
where T:Scalar, A:Matrix<T>, C:Matrix<T>, D:MatrixMut<T> {
    let n = a.rows();
    check_shape("syrk_ln", (n,n), c.shape())?;
    check_shape("syrk_ln", (n,n), d.shape())?;
    syrk_backend(alpha, a, beta, Some(c), d);
    Ok(())
}

/** Lower triangle of C = beta*C + alpha*A*A^T */
pub fn syrk_ln_in_place<T,A,C>(alpha:T, a:&A, beta:T, c:&mut C) -> Result<()>
where T:Scalar, A:Matrix<T>, C:MatrixMut<T> {
    let n = check_square("syrk_ln", c.shape())?;
    check_shape("syrk_ln", (n,a.columns()), a.shape())?;
    syrk_backend(alpha, a, beta, None::<&C>, c);
    Ok(())
}
