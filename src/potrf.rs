/*
 * @file potrf.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Cholesky factorization, A = L*L^T with L lower triangular.
 *
 * Left-looking and blocked by TILE_COLUMNS columns.  For each column block
 * k, every tile of the block at or below the diagonal loads A, subtracts
 * the contribution of the finished columns to its left, and then either
 * factors in registers (the diagonal tile) or solves against the
 * just-finished diagonal block (the tiles below it).  Column blocks are
 * finished strictly left to right, so on failure everything to the left
 * of the failing block is final.
 */

use crate::blocking::{row_blocks,check_shape,check_square};
use crate::error::{Error,Result};
use crate::simd::Scalar;
use crate::tilematrix::matrix::{Matrix,MatrixMut};
use crate::tilematrix::pointer::MatrixPointer;
use crate::tilematrix::tile::{RegisterTile,TILE_COLUMNS,Diag};
use std::cmp::min;

/** One tile of column block `k`, with its top row at `i` */
fn potrf_tile<T,A,L,const RM:usize>(a:Option<&A>, l:&mut L, n:usize, k:usize, i:usize) -> Result<()>
where T:Scalar, A:Matrix<T>, L:MatrixMut<T> {
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, n-i);
    let cols = min(TILE_COLUMNS, n-k);
    let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
    match a {
        Some(a) => ker.load_partial(a.ptr(i,k), rows, cols),
        None => ker.load_partial(l.ptr(i,k), rows, cols)
    }

    {
        let done : &L = &*l;
        ker.gemm(-T::one(), done.ptr(i,0), done.ptr(k,0).trans(), k, rows, cols);
        if i == k {
            if let Err(c) = ker.potrf(cols) {
                log::debug!("potrf: non-positive pivot in column {} of {}", k+c, n);
                return Err(Error::NotPositiveDefinite { column: k+c });
            }
        } else {
            ker.trsm_right_lower_trans(done.ptr(k,k), cols, Diag::NonUnit);
        }
    }

    ker.store_partial(&mut l.ptr_mut(i,k), rows, cols);
    Ok(())
}

/** Factor, reading A from `a` or (if None) from `l` itself */
fn potrf_backend<T,A,L>(a:Option<&A>, l:&mut L, n:usize) -> Result<()>
where T:Scalar, A:Matrix<T>, L:MatrixMut<T> {
    let mut k = 0;
    while k < n {
        let cols = min(TILE_COLUMNS, n-k);
        for r in 0..k {
            for c in k..k+cols { l.set(r, c, T::zero()); }
        }
        for (di,regs) in row_blocks(n-k, T::LANES) {
            match regs {
                3 => potrf_tile::<T,A,L,3>(a, l, n, k, k+di)?,
                2 => potrf_tile::<T,A,L,2>(a, l, n, k, k+di)?,
                _ => potrf_tile::<T,A,L,1>(a, l, n, k, k+di)?,
            }
        }
        k += TILE_COLUMNS;
    }
    Ok(())
}

/**
 * Cholesky-factor the symmetric positive definite `a` into `l`.  Only the
 * lower triangle of `a` is read.  On success `l` is lower triangular, with
 * exact zeros above the diagonal.
 *
 * Fails with `NotPositiveDefinite { column }` at the first column whose
 * pivot is not strictly positive (or is NaN).  Column blocks before the
 * one containing that column hold their final values; the rest of `l` is
 * unspecified.
 */
pub fn potrf<T,A,L>(a:&A, l:&mut L) -> Result<()>
where T:Scalar, A:Matrix<T>, L:MatrixMut<T> {
    let n = check_square("potrf", a.shape())?;
    check_shape("potrf", (n,n), l.shape())?;
    potrf_backend(Some(a), l, n)
}

/** Cholesky-factor `a` in place.  Same contract as [`potrf`]. */
pub fn potrf_in_place<T,A>(a:&mut A) -> Result<()>
where T:Scalar, A:MatrixMut<T> {
    let n = check_square("potrf", a.shape())?;
    potrf_backend(None::<&A>, a, n)
}
