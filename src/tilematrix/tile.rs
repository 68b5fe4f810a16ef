/*
 * @file tile.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Register tiles: a small ROWS x N block of a matrix held entirely in SIMD
 * registers, `RM` registers per column.  The blocked drivers load a tile,
 * run a handful of rank-1 updates and triangular operations on it, and
 * store it once.
 *
 * Every operation takes the valid extent (m rows, n columns) of the tile
 * explicitly.  Rows and columns outside it are zero on load, never read
 * from memory, and never stored.
 */

/**************************************************************************
 * Single-tile operations
 **************************************************************************/
use crate::simd::{Scalar,SimdVec};
use crate::tilematrix::pointer::{MatrixPointer,MatrixPointerMut,VectorPointer,Column,Row};
use rand::Rng;
use rand::distributions::{Distribution,Standard};
use std::cmp::min;

/** Columns per tile in the blocked drivers */
pub const TILE_COLUMNS : usize = 4;

/** Whether a triangular operand has an implicit unit diagonal */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Diag {
    Unit,
    NonUnit
}

/** A `RM*LANES` x `N` block of scalars in registers, column-major */
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct RegisterTile<T:Scalar, const RM:usize, const N:usize> {
    v : [[T::Simd; N]; RM]
}

impl <T:Scalar, const RM:usize, const N:usize> RegisterTile<T,RM,N> {
    pub const ROWS : usize = RM * T::LANES;
    pub const COLUMNS : usize = N;

    pub fn zero() -> Self {
        RegisterTile { v: [[T::Simd::zero(); N]; RM] }
    }

    /** One element of the tile */
    #[inline(always)]
    pub fn get(&self, i:usize, j:usize) -> T {
        self.v[i / T::LANES][j].lane(i % T::LANES)
    }

    /** Set one element of the tile */
    #[inline(always)]
    pub fn set(&mut self, i:usize, j:usize, x:T) {
        self.v[i / T::LANES][j].set_lane(i % T::LANES, x);
    }

    /** Load a full tile */
    #[inline(always)]
    pub fn load<P:MatrixPointer<T>>(&mut self, p:P) {
        self.load_partial(p, Self::ROWS, N);
    }

    /** Load the top-left m x n of the tile; zero the rest */
    #[inline(always)]
    pub fn load_partial<P:MatrixPointer<T>>(&mut self, p:P, m:usize, n:usize) {
        let l = T::LANES;
        for c in 0..N {
            for ri in 0..RM {
                self.v[ri][c] = if c < n && ri*l < m {
                    p.at(ri*l,c).load(m - ri*l)
                } else {
                    T::Simd::zero()
                };
            }
        }
    }

    /** Load `beta` times the top-left m x n; zero the rest */
    #[inline(always)]
    pub fn load_scaled<P:MatrixPointer<T>>(&mut self, beta:T, p:P, m:usize, n:usize) {
        self.load_partial(p, m, n);
        let b = T::Simd::splat(beta);
        for c in 0..min(n,N) {
            for ri in 0..RM { self.v[ri][c] = self.v[ri][c].mul(b); }
        }
    }

    /** Store the full tile */
    #[inline(always)]
    pub fn store<P:MatrixPointerMut<T>>(&self, p:&mut P) {
        self.store_partial(p, Self::ROWS, N);
    }

    /** Store the top-left m x n of the tile */
    #[inline(always)]
    pub fn store_partial<P:MatrixPointerMut<T>>(&self, p:&mut P, m:usize, n:usize) {
        let l = T::LANES;
        for c in 0..min(n,N) {
            for ri in 0..RM {
                if ri*l >= m { break; }
                p.store_at(ri*l, c, self.v[ri][c], 0, m - ri*l);
            }
        }
    }

    /**
     * Store elements (r,c) of the top-left m x n with `r >= c + d`, i.e. on or
     * below a diagonal that starts `d` columns to the left of the tile.  Used
     * for the diagonal tiles of symmetric outputs.
     */
    #[inline(always)]
    pub fn store_lower<P:MatrixPointerMut<T>>(&self, p:&mut P, m:usize, n:usize, d:usize) {
        let l = T::LANES;
        for c in 0..min(n,N) {
            for ri in 0..RM {
                let base = ri*l;
                if base >= m { break; }
                let lo = min((c + d).saturating_sub(base), l);
                p.store_at(base, c, self.v[ri][c], lo, m - base);
            }
        }
    }

    /** self += alpha * x * y^T over the top-left m x n */
    #[inline(always)]
    pub fn ger<X:VectorPointer<T>, Y:VectorPointer<T>>(&mut self, alpha:T, x:X, y:Y, m:usize, n:usize) {
        let l = T::LANES;
        let a = T::Simd::splat(alpha);
        let mut ax = [T::Simd::zero(); RM];
        for ri in 0..RM {
            if ri*l < m { ax[ri] = x.load(ri*l, m - ri*l).mul(a); }
        }
        for c in 0..min(n,N) {
            let b = y.broadcast(c);
            for ri in 0..RM { self.v[ri][c] = ax[ri].fmadd(b, self.v[ri][c]); }
        }
    }

    /**
     * self += alpha * A * B, where `a` points at an m x k block and `b` at a
     * k x n block.  Pass `trans()` pointers to multiply by transposes.  The
     * k rank-1 updates are applied in increasing order.
     */
    #[inline(always)]
    pub fn gemm<PA:MatrixPointer<T>, PB:MatrixPointer<T>>(&mut self, alpha:T, a:PA, b:PB, k:usize, m:usize, n:usize) {
        for kk in 0..k {
            self.ger(alpha, Column(a.at(0,kk)), Row(b.at(kk,0)), m, n);
        }
    }

    /**
     * Cholesky-factor the tile in place, as the diagonal block of a lower
     * factorization: the top n x n becomes lower-triangular L with zeros
     * above the diagonal, and any rows below it become B * L^-T.
     *
     * Fails with the tile column whose pivot is not strictly positive.
     * Columns before it are finished; the rest are garbage.
     */
    pub fn potrf(&mut self, n:usize) -> Result<(),usize> {
        debug_assert!(N <= Self::ROWS);
        let l = T::LANES;
        for k in 0..min(n,N) {
            let (kr,kl) = (k / l, k % l);
            for j in 0..k {
                let lkj = T::Simd::splat(self.v[kr][j].lane(kl));
                for ri in 0..RM { self.v[ri][k] = self.v[ri][j].fnmadd(lkj, self.v[ri][k]); }
            }
            let pivot = self.v[kr][k].lane(kl);
            if !(pivot > T::zero()) { return Err(k); } // also catches NaN
            let root = pivot.sqrt();
            let scale = T::Simd::splat(T::one() / root);
            for ri in 0..RM { self.v[ri][k] = self.v[ri][k].mul(scale); }
            self.v[kr][k].set_lane(kl, root);
            for r in 0..k { self.v[r / l][k].set_lane(r % l, T::zero()); }
        }
        Ok(())
    }

    /**
     * Solve X * A^T = self for X in place, where `a` points at the diagonal
     * of a lower-triangular n x n block.  Only the lower triangle of that
     * block is read.
     */
    pub fn trsm_right_lower_trans<P:MatrixPointer<T>>(&mut self, a:P, n:usize, diag:Diag) {
        for j in 0..min(n,N) {
            for k in 0..j {
                let ajk = a.at(j,k).broadcast();
                for ri in 0..RM { self.v[ri][j] = self.v[ri][k].fnmadd(ajk, self.v[ri][j]); }
            }
            if diag == Diag::NonUnit {
                let inv = T::Simd::splat(T::one() / a.at(j,j).get());
                for ri in 0..RM { self.v[ri][j] = self.v[ri][j].mul(inv); }
            }
        }
    }

    /**
     * Solve A * X = self for X in place, where `a` points at the diagonal of
     * a lower-triangular m x m block.  Forward substitution, one row at a
     * time; entries above the diagonal are masked off, never used.
     */
    pub fn trsm_left_lower<P:MatrixPointer<T>>(&mut self, a:P, m:usize, diag:Diag) {
        let l = T::LANES;
        let m = min(m, Self::ROWS);
        for s in 0..m {
            let (sr,sl) = (s / l, s % l);
            if diag == Diag::NonUnit {
                let inv = T::one() / a.at(s,s).get();
                for c in 0..N {
                    let x = self.v[sr][c].lane(sl) * inv;
                    self.v[sr][c].set_lane(sl, x);
                }
            }
            for ri in sr..RM {
                let base = ri*l;
                if base >= m { break; }
                let mut col = a.at(base,s).load(m - base);
                if base <= s {
                    for lane in 0..min(l, s+1-base) { col.set_lane(lane, T::zero()); }
                }
                for c in 0..N {
                    let x = T::Simd::splat(self.v[sr][c].lane(sl));
                    self.v[ri][c] = col.fnmadd(x, self.v[ri][c]);
                }
            }
        }
    }

    /**
     * Solve A * X = self for X in place, where `a` points at the diagonal of
     * an upper-triangular m x m block.  Back substitution.
     */
    pub fn trsm_left_upper<P:MatrixPointer<T>>(&mut self, a:P, m:usize, diag:Diag) {
        let l = T::LANES;
        let m = min(m, Self::ROWS);
        for s in (0..m).rev() {
            let (sr,sl) = (s / l, s % l);
            if diag == Diag::NonUnit {
                let inv = T::one() / a.at(s,s).get();
                for c in 0..N {
                    let x = self.v[sr][c].lane(sl) * inv;
                    self.v[sr][c].set_lane(sl, x);
                }
            }
            for ri in 0..sr+1 {
                let base = ri*l;
                let mut col = a.at(base,s).load(m - base);
                for lane in s-base..l { col.set_lane(lane, T::zero()); }
                for c in 0..N {
                    let x = T::Simd::splat(self.v[sr][c].lane(sl));
                    self.v[ri][c] = col.fnmadd(x, self.v[ri][c]);
                }
            }
        }
    }

    /**
     * self += alpha * triu(A) * B, where `a` points at a diagonal element of
     * an upper-triangular A and the product runs over k of its columns.  `b`
     * points at the matching k x n block of B.
     */
    pub fn trmm_left_upper<PA:MatrixPointer<T>, PB:MatrixPointer<T>>(&mut self, alpha:T, a:PA, b:PB, k:usize, m:usize, n:usize) {
        let l = T::LANES;
        let al = T::Simd::splat(alpha);
        for t in 0..k {
            let mut ax = [T::Simd::zero(); RM];
            for ri in 0..RM {
                let base = ri*l;
                if base >= m || base > t { continue; }
                let mut col = a.at(base,t).load(m - base);
                for lane in t+1-base..l { col.set_lane(lane, T::zero()); }
                ax[ri] = col.mul(al);
            }
            for c in 0..min(n,N) {
                let bb = b.at(t,c).broadcast();
                for ri in 0..RM { self.v[ri][c] = ax[ri].fmadd(bb, self.v[ri][c]); }
            }
        }
    }

    /**
     * self += alpha * B * tril(A), where `b` points at an m x k block of B and
     * `a` at a diagonal element of a lower-triangular A.
     */
    pub fn trmm_right_lower<PB:MatrixPointer<T>, PA:MatrixPointer<T>>(&mut self, alpha:T, b:PB, a:PA, k:usize, m:usize, n:usize) {
        let l = T::LANES;
        let al = T::Simd::splat(alpha);
        for t in 0..k {
            let mut bx = [T::Simd::zero(); RM];
            for ri in 0..RM {
                if ri*l < m { bx[ri] = b.at(ri*l,t).load(m - ri*l).mul(al); }
            }
            for c in 0..min(min(n,N), t+1) {
                let aa = a.at(t,c).broadcast();
                for ri in 0..RM { self.v[ri][c] = bx[ri].fmadd(aa, self.v[ri][c]); }
            }
        }
    }
}

impl <T:Scalar, const RM:usize, const N:usize> Default for RegisterTile<T,RM,N> {
    fn default() -> Self { Self::zero() }
}

impl <T:Scalar, const RM:usize, const N:usize> Distribution<RegisterTile<T,RM,N>> for Standard {
    /** Uniform entries in [-1, 1) */
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> RegisterTile<T,RM,N> {
        let mut ret = RegisterTile::zero();
        for i in 0..RegisterTile::<T,RM,N>::ROWS {
            for j in 0..N { ret.set(i,j,rng.gen_range(-T::one()..T::one())); }
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use crate::tilematrix::tile::{RegisterTile,Diag};
    use crate::tilematrix::matrix::{Matrix,MatrixMut,DynamicMatrix};
    use crate::tilematrix::pointer::MatrixPointer;
    use crate::testing::{random_matrix,make_positive_definite,reference_gemm,assert_close};
    use approx::assert_relative_eq;
    use rand::{Rng,thread_rng};

    type Tile12 = RegisterTile<f64,3,4>;
    type Tile8 = RegisterTile<f64,2,4>;
    type Tile4 = RegisterTile<f64,1,4>;

    fn tile_to_matrix<const RM:usize, const N:usize>(t:&RegisterTile<f64,RM,N>, m:usize, n:usize) -> DynamicMatrix<f64> {
        DynamicMatrix::from_fn(m, n, |i,j| t.get(i,j))
    }

    #[test]
    fn partial_load_store() {
        for _ in 0..100 {
            let m = thread_rng().gen_range(1..=12);
            let n = thread_rng().gen_range(1..=4);
            let src = random_matrix(13, 7);
            let (i0,j0) = (thread_rng().gen_range(0..=13-m), thread_rng().gen_range(0..=7-n));
            let mut t = Tile12::zero();
            t.load_partial(src.ptr(i0,j0), m, n);
            for i in 0..12 { for j in 0..4 {
                let expect = if i < m && j < n { src.get(i0+i,j0+j) } else { 0.0 };
                assert_eq!(t.get(i,j), expect);
            }}

            let mut dst = DynamicMatrix::<f64>::from_fn(13, 7, |_,_| -7.0);
            t.store_partial(&mut dst.ptr_mut(i0,j0), m, n);
            for i in 0..13 { for j in 0..7 {
                let inside = i >= i0 && i < i0+m && j >= j0 && j < j0+n;
                assert_eq!(dst.get(i,j), if inside { src.get(i,j) } else { -7.0 });
            }}
        }
    }

    #[test]
    fn store_lower_respects_diagonal() {
        let t : Tile8 = thread_rng().gen();
        for d in 0..8 {
            let mut dst = DynamicMatrix::<f64>::new(8, 4);
            t.store_lower(&mut dst.ptr_mut(0,0), 7, 4, d);
            for i in 0..8 { for j in 0..4 {
                let expect = if i < 7 && i >= j + d { t.get(i,j) } else { 0.0 };
                assert_eq!(dst.get(i,j), expect);
            }}
        }
    }

    #[test]
    fn tile_gemm_matches_reference() {
        for _ in 0..50 {
            let m = thread_rng().gen_range(1..=12);
            let n = thread_rng().gen_range(1..=4);
            let k = thread_rng().gen_range(0..10);
            let a = random_matrix(m, k);
            let b = random_matrix(n, k);
            let c = random_matrix(m, n);
            let mut t = Tile12::zero();
            t.load_scaled(0.5, c.ptr(0,0), m, n);
            t.gemm(-2.0, a.ptr(0,0), b.ptr(0,0).trans(), k, m, n);
            let expect = reference_gemm(-2.0, &a, false, &b, true, 0.5, &c);
            assert_close(&tile_to_matrix(&t, m, n), &expect, 1e-12);
        }
    }

    #[test]
    fn tile_potrf() {
        for n in 1..=4 {
            let s = make_positive_definite(n);
            let below = random_matrix(8, n);
            let a = DynamicMatrix::<f64>::from_fn(12, n, |i,j| if i < n { s.get(i,j) } else if i >= 4 { below.get(i-4,j) } else { 0.0 });
            let mut t = Tile12::zero();
            t.load_partial(a.ptr(0,0), 12, n);
            assert_eq!(t.potrf(n), Ok(()));

            let l = tile_to_matrix(&t, n, n);
            for i in 0..n { for j in i+1..n { assert_eq!(l.get(i,j), 0.0); }}
            assert_relative_eq!(l.get(0,0), s.get(0,0).sqrt(), max_relative = 1e-15);
            let llt = reference_gemm(1.0, &l, false, &l, true, 0.0, &l);
            assert_close(&llt, &s, 1e-12);

            /* Rows below the block solve X L^T = below */
            let x = DynamicMatrix::<f64>::from_fn(8, n, |i,j| t.get(i+4,j));
            let xlt = reference_gemm(1.0, &x, false, &l, true, 0.0, &below);
            assert_close(&xlt, &below, 1e-12);
        }
    }

    #[test]
    fn tile_potrf_rejects_indefinite() {
        let mut a = make_positive_definite(4);
        a.set(2, 2, -1.0);
        let mut t = Tile4::zero();
        t.load(a.ptr(0,0));
        assert_eq!(t.potrf(4), Err(2));

        let mut t = Tile4::zero();
        let nan = DynamicMatrix::<f64>::from_fn(4, 4, |_,_| f64::NAN);
        t.load(nan.ptr(0,0));
        assert_eq!(t.potrf(4), Err(0));
    }

    #[test]
    fn tile_trsm() {
        for _ in 0..20 {
            let m = thread_rng().gen_range(1..=8);
            let n = thread_rng().gen_range(1..=4);
            let spd = make_positive_definite(8);
            let b = random_matrix(m, n);

            /* Lower, from the left */
            let lower = DynamicMatrix::<f64>::from_fn(m, m, |i,j| if i >= j { spd.get(i,j) } else { f64::NAN });
            let mut t = Tile8::zero();
            t.load_partial(b.ptr(0,0), m, n);
            t.trsm_left_lower(lower.ptr(0,0), m, Diag::NonUnit);
            let x = tile_to_matrix(&t, m, n);
            let clean = DynamicMatrix::<f64>::from_fn(m, m, |i,j| if i >= j { spd.get(i,j) } else { 0.0 });
            assert_close(&reference_gemm(1.0, &clean, false, &x, false, 0.0, &b), &b, 1e-11);

            /* Upper, from the left */
            let upper = DynamicMatrix::<f64>::from_fn(m, m, |i,j| if i <= j { spd.get(i,j) } else { f64::NAN });
            let mut t = Tile8::zero();
            t.load_partial(b.ptr(0,0), m, n);
            t.trsm_left_upper(upper.ptr(0,0), m, Diag::NonUnit);
            let x = tile_to_matrix(&t, m, n);
            let clean = DynamicMatrix::<f64>::from_fn(m, m, |i,j| if i <= j { spd.get(i,j) } else { 0.0 });
            assert_close(&reference_gemm(1.0, &clean, false, &x, false, 0.0, &b), &b, 1e-11);

            /* Unit lower */
            let unit = DynamicMatrix::<f64>::from_fn(m, m, |i,j| if i > j { spd.get(i,j) } else if i == j { 1.0 } else { 0.0 });
            let mut t = Tile8::zero();
            t.load_partial(b.ptr(0,0), m, n);
            t.trsm_left_lower(lower.ptr(0,0), m, Diag::Unit);
            let x = tile_to_matrix(&t, m, n);
            assert_close(&reference_gemm(1.0, &unit, false, &x, false, 0.0, &b), &b, 1e-11);

            /* Lower transposed, from the right */
            let small = DynamicMatrix::<f64>::from_fn(n, n, |i,j| if i >= j { spd.get(i,j) } else { f64::NAN });
            let clean = DynamicMatrix::<f64>::from_fn(n, n, |i,j| if i >= j { spd.get(i,j) } else { 0.0 });
            let bb = random_matrix(m, n);
            let mut t = Tile8::zero();
            t.load_partial(bb.ptr(0,0), m, n);
            t.trsm_right_lower_trans(small.ptr(0,0), n, Diag::NonUnit);
            let x = tile_to_matrix(&t, m, n);
            assert_close(&reference_gemm(1.0, &x, false, &clean, true, 0.0, &bb), &bb, 1e-11);
        }
    }

    #[test]
    fn tile_trmm() {
        for _ in 0..20 {
            let m = thread_rng().gen_range(1..=8);
            let n = thread_rng().gen_range(1..=4);
            let k = m + thread_rng().gen_range(0..5);
            let a = random_matrix(k, k);
            let upper = DynamicMatrix::<f64>::from_fn(m, k, |i,j| if i <= j { a.get(i,j) } else { 0.0 });
            let b = random_matrix(k, n);
            let mut t = Tile8::zero();
            t.trmm_left_upper(1.5, a.ptr(0,0), b.ptr(0,0), k, m, n);
            let expect = reference_gemm(1.5, &upper, false, &b, false, 0.0, &DynamicMatrix::<f64>::new(m,n));
            assert_close(&tile_to_matrix(&t, m, n), &expect, 1e-12);

            let kk = n + thread_rng().gen_range(0..5);
            let a = random_matrix(kk, kk);
            let lower = DynamicMatrix::<f64>::from_fn(kk, n, |i,j| if i >= j { a.get(i,j) } else { 0.0 });
            let b = random_matrix(m, kk);
            let mut t = Tile8::zero();
            t.trmm_right_lower(-1.0, b.ptr(0,0), a.ptr(0,0), kk, m, n);
            let expect = reference_gemm(-1.0, &b, false, &lower, false, 0.0, &DynamicMatrix::<f64>::new(m,n));
            assert_close(&tile_to_matrix(&t, m, n), &expect, 1e-12);
        }
    }

    #[test]
    fn float_tiles() {
        let a = DynamicMatrix::<f32>::from_fn(8, 4, |i,j| if i == j { 4.0 } else { 1.0 });
        let mut t = RegisterTile::<f32,1,4>::zero();
        t.load(a.ptr(0,0));
        assert_eq!(t.potrf(4), Ok(()));
        assert_eq!(t.get(0,0), 2.0);
        assert_eq!(t.get(1,0), 0.5);
        assert_eq!(t.get(0,1), 0.0);
        let rnd : RegisterTile<f32,1,4> = thread_rng().gen();
        for i in 0..8 { for j in 0..4 { assert!(rnd.get(i,j).abs() <= 1.0); }}
    }
}
