/*
 * @file level2.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Matrix-vector operations: rank-1 update, triangular solve with a
 * single right-hand side, and index of the largest entry.
 */

use crate::blocking::{row_blocks,check_shape,check_square};
use crate::error::Result;
use crate::simd::Scalar;
use crate::tilematrix::matrix::{Matrix,MatrixMut};
use crate::tilematrix::pointer::VectorPointer;
use crate::tilematrix::tile::{RegisterTile,TILE_COLUMNS};
use std::cmp::min;

fn ger_rows<T,A,D,const RM:usize>(alpha:T, x:&[T], y:&[T], a:&A, d:&mut D, i:usize)
where T:Scalar, A:Matrix<T>, D:MatrixMut<T> {
    let (m,n) = a.shape();
    let rows = min(RegisterTile::<T,RM,TILE_COLUMNS>::ROWS, m-i);
    let mut j = 0;
    while j < n {
        let cols = min(TILE_COLUMNS, n-j);
        let mut ker = RegisterTile::<T,RM,TILE_COLUMNS>::zero();
        ker.load_partial(a.ptr(i,j), rows, cols);
        ker.ger(alpha, &x[i..], &y[j..], rows, cols);
        ker.store_partial(&mut d.ptr_mut(i,j), rows, cols);
        j += TILE_COLUMNS;
    }
}

/** D = A + alpha*x*y^T */
pub fn ger<T,A,D>(alpha:T, x:&[T], y:&[T], a:&A, d:&mut D) -> Result<()>
where T:Scalar, A:Matrix<T>, D:MatrixMut<T> {
    check_shape("ger", a.shape(), (x.len(), y.len()))?;
    check_shape("ger", a.shape(), d.shape())?;
    for (i,regs) in row_blocks(a.rows(), T::LANES) {
        match regs {
            3 => ger_rows::<T,A,D,3>(alpha, x, y, a, d, i),
            2 => ger_rows::<T,A,D,2>(alpha, x, y, a, d, i),
            _ => ger_rows::<T,A,D,1>(alpha, x, y, a, d, i),
        }
    }
    Ok(())
}

/** Solve A*x = b in place (x holds b on entry), A lower triangular */
pub fn trsv_lower<T,A>(a:&A, x:&mut [T]) -> Result<()>
where T:Scalar, A:Matrix<T> {
    let n = check_square("trsv_lower", a.shape())?;
    check_shape("trsv_lower", (n,1), (x.len(),1))?;
    for j in 0..n {
        let col = a.column(j);
        let xj = x[j] / col.element(j);
        x[j] = xj;
        for i in j+1..n { x[i] -= col.element(i) * xj; }
    }
    Ok(())
}

/** Solve A*x = b in place (x holds b on entry), A upper triangular */
pub fn trsv_upper<T,A>(a:&A, x:&mut [T]) -> Result<()>
where T:Scalar, A:Matrix<T> {
    let n = check_square("trsv_upper", a.shape())?;
    check_shape("trsv_upper", (n,1), (x.len(),1))?;
    for j in (0..n).rev() {
        let col = a.column(j);
        let xj = x[j] / col.element(j);
        x[j] = xj;
        for i in 0..j { x[i] -= col.element(i) * xj; }
    }
    Ok(())
}

/**
 * Index of the first of the first `n` entries with the largest absolute
 * value, or None if `n == 0`.  NaN entries are never chosen unless the
 * first entry is NaN.
 */
pub fn iamax<T:Scalar, V:VectorPointer<T>>(x:V, n:usize) -> Option<usize> {
    if n == 0 { return None; }
    let mut best = 0;
    let mut max = x.element(0).abs();
    for k in 1..n {
        let v = x.element(k).abs();
        if v > max { best = k; max = v; }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use crate::level2::*;
    use crate::testing::{SIZES,random_matrix,random_panel,well_conditioned_triangle};
    use crate::tilematrix::matrix::{Matrix,MatrixMut,DynamicMatrix};
    use approx::assert_abs_diff_eq;
    use rand::{Rng,thread_rng};

    fn random_vec(n:usize) -> Vec<f64> {
        (0..n).map(|_| thread_rng().gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn rank_one_update() {
        for &m in SIZES.iter() { for &n in SIZES.iter() {
            let a = random_panel(m, n, 8);
            let (x,y) = (random_vec(m), random_vec(n));
            let mut d = DynamicMatrix::<f64>::new(m, n);
            ger(0.5, &x, &y, &a, &mut d).unwrap();
            for i in 0..m { for j in 0..n {
                assert_abs_diff_eq!(d.get(i,j), a.get(i,j) + 0.5*x[i]*y[j], epsilon = 1e-14);
            }}
        }}
        let a = random_matrix(3, 3);
        let mut d = random_matrix(3, 3);
        assert!(ger(1.0, &[1.0,2.0], &[1.0,2.0,3.0], &a, &mut d).is_err());
    }

    #[test]
    fn triangular_vector_solves() {
        for &n in SIZES.iter() {
            let b = random_vec(n);
            for &lower in [true,false].iter() {
                let t = well_conditioned_triangle(n, lower);
                let mut x = b.clone();
                if lower { trsv_lower(&t, &mut x).unwrap(); } else { trsv_upper(&t, &mut x).unwrap(); }
                for i in 0..n {
                    let ax : f64 = (0..n).map(|j| t.get(i,j)*x[j]).sum();
                    assert_abs_diff_eq!(ax, b[i], epsilon = 1e-12);
                }
            }
        }
        let t = well_conditioned_triangle(4, true);
        let mut short = vec![1.0; 3];
        assert!(trsv_lower(&t, &mut short).is_err());
    }

    #[test]
    fn largest_entry() {
        let xs = [1.0, -5.0, 3.0, 5.0, -2.0];
        assert_eq!(iamax(&xs[..], 5), Some(1));
        assert_eq!(iamax(&xs[..], 1), Some(0));
        assert_eq!(iamax(&xs[..], 0), None);

        let mut m = DynamicMatrix::<f64>::new(6, 3);
        m.set(4, 2, -9.0);
        m.set(1, 2, 8.0);
        assert_eq!(iamax(m.column(2), 6), Some(4));
        assert_eq!(iamax(m.row(1), 3), Some(2));
    }
}
