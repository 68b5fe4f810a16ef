/*
 * @file trmm.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Triangular matrix multiply into a separate output.  Each output tile
 * only runs its reduction over the part of the triangle that can be
 * nonzero, and masks the rest inside the diagonal block, so the other
 * triangle of A is never read.
 */

use crate::blocking::{row_blocks,check_shape,check_square};
use crate::error::Result;
use crate::simd::Scalar;
use crate::tilematrix::matrix::{Matrix,MatrixMut};
use crate::tilematrix::tile::{RegisterTile,TILE_COLUMNS};
use std::cmp::min;

fn left_upper_rows<T,A,B,D,const RM:usize>(alpha:T, a:&A, b:&B, d:&mut D, i:usize)
where T:Scalar, A:Matrix<T>, B:Matrix<T>, D:MatrixMut<T> {
    let (m,n) = b.shape();
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, m-i);
    let mut j = 0;
    while j < n {
        let cols = min(TILE_COLUMNS, n-j);
        let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
        ker.trmm_left_upper(alpha, a.ptr(i,i), b.ptr(i,j), m-i, rows, cols);
        ker.store_partial(&mut d.ptr_mut(i,j), rows, cols);
        j += TILE_COLUMNS;
    }
}

fn right_lower_rows<T,B,A,D,const RM:usize>(alpha:T, b:&B, a:&A, d:&mut D, i:usize)
where T:Scalar, B:Matrix<T>, A:Matrix<T>, D:MatrixMut<T> {
    let (m,n) = b.shape();
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, m-i);
    let mut j = 0;
    while j < n {
        let cols = min(TILE_COLUMNS, n-j);
        let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
        ker.trmm_right_lower(alpha, b.ptr(i,j), a.ptr(j,j), n-j, rows, cols);
        ker.store_partial(&mut d.ptr_mut(i,j), rows, cols);
        j += TILE_COLUMNS;
    }
}

/** D = alpha*A*B, with A upper triangular.  The strictly lower part of A is not read. */
pub fn trmm_left_upper<T,A,B,D>(alpha:T, a:&A, b:&B, d:&mut D) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, D:MatrixMut<T> {
    let m = check_square("trmm_left_upper", a.shape())?;
    check_shape("trmm_left_upper", (m,b.columns()), b.shape())?;
    check_shape("trmm_left_upper", b.shape(), d.shape())?;
    for (i,regs) in row_blocks(m, T::LANES) {
        match regs {
            3 => left_upper_rows::<T,A,B,D,3>(alpha, a, b, d, i),
            2 => left_upper_rows::<T,A,B,D,2>(alpha, a, b, d, i),
            _ => left_upper_rows::<T,A,B,D,1>(alpha, a, b, d, i),
        }
    }
    Ok(())
}

/** D = alpha*B*A, with A lower triangular.  The strictly upper part of A is not read. */
pub fn trmm_right_lower<T,B,A,D>(alpha:T, b:&B, a:&A, d:&mut D) -> Result<()>
where T:Scalar, B:Matrix<T>, A:Matrix<T>, D:MatrixMut<T> {
    let n = check_square("trmm_right_lower", a.shape())?;
    check_shape("trmm_right_lower", (b.rows(),n), b.shape())?;
    check_shape("trmm_right_lower", b.shape(), d.shape())?;
    for (i,regs) in row_blocks(b.rows(), T::LANES) {
        match regs {
            3 => right_lower_rows::<T,B,A,D,3>(alpha, b, a, d, i),
            2 => right_lower_rows::<T,B,A,D,2>(alpha, b, a, d, i),
            _ => right_lower_rows::<T,B,A,D,1>(alpha, b, a, d, i),
        }
    }
    Ok(())
}
