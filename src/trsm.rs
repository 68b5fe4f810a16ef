/*
 * @file trsm.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Triangular solves with many right-hand sides.
 *
 * Left solves walk row blocks in dependency order (down for lower, up for
 * upper), right solves walk column blocks (left to right).  Each tile
 * first subtracts the contribution of the already-solved part of X with a
 * tile GEMM, then finishes with an in-register solve against its diagonal
 * block.  Only the relevant triangle of A is ever read.
 */

use crate::blocking::{row_blocks,check_shape,check_square};
use crate::error::Result;
use crate::simd::Scalar;
use crate::tilematrix::matrix::{Matrix,MatrixMut};
use crate::tilematrix::pointer::MatrixPointer;
use crate::tilematrix::tile::{RegisterTile,TILE_COLUMNS,Diag};
use std::cmp::min;

/** Load the right-hand side for the tile at (i,j): from `b`, or from `x` itself */
fn load_rhs<T,B,X,const RM:usize>(ker:&mut RegisterTile<T,RM,TILE_COLUMNS>, b:Option<&B>, x:&X,
    i:usize, j:usize, rows:usize, cols:usize)
where T:Scalar, B:Matrix<T>, X:Matrix<T> {
    match b {
        Some(b) => ker.load_partial(b.ptr(i,j), rows, cols),
        None => ker.load_partial(x.ptr(i,j), rows, cols)
    }
}

/**************************************************************************
 * Left solves: A*X = B
 **************************************************************************/

#[allow(clippy::too_many_arguments)]
fn left_lower_rows<T,P,B,X,const RM:usize>(diag:Diag, a:P, (m,n):(usize,usize), b:Option<&B>, x:&mut X, i:usize)
where T:Scalar, P:MatrixPointer<T>, B:Matrix<T>, X:MatrixMut<T> {
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, m-i);
    let mut j = 0;
    while j < n {
        let cols = min(TILE_COLUMNS, n-j);
        let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
        load_rhs(&mut ker, b, &*x, i, j, rows, cols);
        {
            let solved : &X = &*x;
            ker.gemm(-T::one(), a.at(i,0), solved.ptr(0,j), i, rows, cols);
        }
        ker.trsm_left_lower(a.at(i,i), rows, diag);
        ker.store_partial(&mut x.ptr_mut(i,j), rows, cols);
        j += TILE_COLUMNS;
    }
}

fn left_lower_backend<T,P,B,X>(diag:Diag, a:P, m:usize, n:usize, b:Option<&B>, x:&mut X)
where T:Scalar, P:MatrixPointer<T>, B:Matrix<T>, X:MatrixMut<T> {
    for (i,regs) in row_blocks(m, T::LANES) {
        match regs {
            3 => left_lower_rows::<T,P,B,X,3>(diag, a, (m,n), b, x, i),
            2 => left_lower_rows::<T,P,B,X,2>(diag, a, (m,n), b, x, i),
            _ => left_lower_rows::<T,P,B,X,1>(diag, a, (m,n), b, x, i),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn left_upper_rows<T,P,B,X,const RM:usize>(diag:Diag, a:P, (m,n):(usize,usize), b:Option<&B>, x:&mut X, i:usize)
where T:Scalar, P:MatrixPointer<T>, B:Matrix<T>, X:MatrixMut<T> {
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, m-i);
    let below = i + rows;
    let mut j = 0;
    while j < n {
        let cols = min(TILE_COLUMNS, n-j);
        let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
        load_rhs(&mut ker, b, &*x, i, j, rows, cols);
        if below < m {
            let solved : &X = &*x;
            ker.gemm(-T::one(), a.at(i,below), solved.ptr(below,j), m-below, rows, cols);
        }
        ker.trsm_left_upper(a.at(i,i), rows, diag);
        ker.store_partial(&mut x.ptr_mut(i,j), rows, cols);
        j += TILE_COLUMNS;
    }
}

fn left_upper_backend<T,P,B,X>(diag:Diag, a:P, m:usize, n:usize, b:Option<&B>, x:&mut X)
where T:Scalar, P:MatrixPointer<T>, B:Matrix<T>, X:MatrixMut<T> {
    for (i,regs) in row_blocks(m, T::LANES).into_iter().rev() {
        match regs {
            3 => left_upper_rows::<T,P,B,X,3>(diag, a, (m,n), b, x, i),
            2 => left_upper_rows::<T,P,B,X,2>(diag, a, (m,n), b, x, i),
            _ => left_upper_rows::<T,P,B,X,1>(diag, a, (m,n), b, x, i),
        }
    }
}

/**************************************************************************
 * Right solves: X*A^T = B with A lower, i.e. X*U = B with U = A^T upper
 **************************************************************************/

#[allow(clippy::too_many_arguments)]
fn right_rows<T,P,B,X,const RM:usize>(diag:Diag, a:P, (m,n):(usize,usize), b:Option<&B>, x:&mut X, i:usize, j:usize)
where T:Scalar, P:MatrixPointer<T>, B:Matrix<T>, X:MatrixMut<T> {
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, m-i);
    let cols = min(TILE_COLUMNS, n-j);
    let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
    load_rhs(&mut ker, b, &*x, i, j, rows, cols);
    {
        let solved : &X = &*x;
        ker.gemm(-T::one(), solved.ptr(i,0), a.at(j,0).trans(), j, rows, cols);
    }
    ker.trsm_right_lower_trans(a.at(j,j), cols, diag);
    ker.store_partial(&mut x.ptr_mut(i,j), rows, cols);
}

/**
 * Solve X*A^T = B, where `a` points at the top-left of a lower-triangular
 * n x n matrix.  Pass a transposed pointer to an upper-triangular U to
 * solve X*U = B instead.
 */
fn right_backend<T,P,B,X>(diag:Diag, a:P, m:usize, n:usize, b:Option<&B>, x:&mut X)
where T:Scalar, P:MatrixPointer<T>, B:Matrix<T>, X:MatrixMut<T> {
    let blocks = row_blocks(m, T::LANES);
    let mut j = 0;
    while j < n {
        for &(i,regs) in blocks.iter() {
            match regs {
                3 => right_rows::<T,P,B,X,3>(diag, a, (m,n), b, x, i, j),
                2 => right_rows::<T,P,B,X,2>(diag, a, (m,n), b, x, i, j),
                _ => right_rows::<T,P,B,X,1>(diag, a, (m,n), b, x, i, j),
            }
        }
        j += TILE_COLUMNS;
    }
}

/**************************************************************************
 * Entry points
 **************************************************************************/

/** Shapes for a left solve: A is m x m, and B, X are m x n */
fn check_left<T:Scalar, A:Matrix<T>>(op:&'static str, a:&A, b:(usize,usize), x:(usize,usize)) -> Result<(usize,usize)> {
    let m = check_square(op, a.shape())?;
    check_shape(op, (m,b.1), b)?;
    check_shape(op, b, x)?;
    Ok(b)
}

/** Shapes for a right solve: A is n x n, and B, X are m x n */
fn check_right<T:Scalar, A:Matrix<T>>(op:&'static str, a:&A, b:(usize,usize), x:(usize,usize)) -> Result<(usize,usize)> {
    let n = check_square(op, a.shape())?;
    check_shape(op, (b.0,n), b)?;
    check_shape(op, b, x)?;
    Ok(b)
}

/** Solve A*X = B for X, with A lower triangular */
pub fn trsm_left_lower<T,A,B,X>(diag:Diag, a:&A, b:&B, x:&mut X) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, X:MatrixMut<T> {
    let (m,n) = check_left("trsm_left_lower", a, b.shape(), x.shape())?;
    left_lower_backend(diag, a.ptr(0,0), m, n, Some(b), x);
    Ok(())
}

/** Overwrite B with the solution X of A*X = B, A lower triangular */
pub fn trsm_left_lower_in_place<T,A,B>(diag:Diag, a:&A, b:&mut B) -> Result<()>
where T:Scalar, A:Matrix<T>, B:MatrixMut<T> {
    let (m,n) = check_left("trsm_left_lower", a, b.shape(), b.shape())?;
    left_lower_backend(diag, a.ptr(0,0), m, n, None::<&B>, b);
    Ok(())
}

/** Solve A*X = B for X, with A upper triangular */
pub fn trsm_left_upper<T,A,B,X>(diag:Diag, a:&A, b:&B, x:&mut X) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, X:MatrixMut<T> {
    let (m,n) = check_left("trsm_left_upper", a, b.shape(), x.shape())?;
    left_upper_backend(diag, a.ptr(0,0), m, n, Some(b), x);
    Ok(())
}

/** Overwrite B with the solution X of A*X = B, A upper triangular */
pub fn trsm_left_upper_in_place<T,A,B>(diag:Diag, a:&A, b:&mut B) -> Result<()>
where T:Scalar, A:Matrix<T>, B:MatrixMut<T> {
    let (m,n) = check_left("trsm_left_upper", a, b.shape(), b.shape())?;
    left_upper_backend(diag, a.ptr(0,0), m, n, None::<&B>, b);
    Ok(())
}

/** Solve X*A^T = B for X, with A lower triangular */
pub fn trsm_right_lower_trans<T,A,B,X>(diag:Diag, a:&A, b:&B, x:&mut X) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, X:MatrixMut<T> {
    let (m,n) = check_right("trsm_right_lower_trans", a, b.shape(), x.shape())?;
    right_backend(diag, a.ptr(0,0), m, n, Some(b), x);
    Ok(())
}

/** Overwrite B with the solution X of X*A^T = B, A lower triangular */
pub fn trsm_right_lower_trans_in_place<T,A,B>(diag:Diag, a:&A, b:&mut B) -> Result<()>
where T:Scalar, A:Matrix<T>, B:MatrixMut<T> {
    let (m,n) = check_right("trsm_right_lower_trans", a, b.shape(), b.shape())?;
    right_backend(diag, a.ptr(0,0), m, n, None::<&B>, b);
    Ok(())
}

/** Solve X*A = B for X, with A upper triangular */
pub fn trsm_right_upper<T,A,B,X>(diag:Diag, a:&A, b:&B, x:&mut X) -> Result<()>
where T:Scalar, A:Matrix<T>, B:Matrix<T>, X:MatrixMut<T> {
    let (m,n) = check_right("trsm_right_upper", a, b.shape(), x.shape())?;
    right_backend(diag, a.ptr(0,0).trans(), m, n, Some(b), x);
    Ok(())
}

/** Overwrite B with the solution X of X*A = B, A upper triangular */
pub fn trsm_right_upper_in_place<T,A,B>(diag:Diag, a:&A, b:&mut B) -> Result<()>
where T:Scalar, A:Matrix<T>, B:MatrixMut<T> {
    let (m,n) = check_right("trsm_right_upper", a, b.shape(), b.shape())?;
    right_backend(diag, a.ptr(0,0).trans(), m, n, None::<&B>, b);
    Ok(())
}
