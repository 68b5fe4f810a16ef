/*
 * @file pointer.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Matrix and vector pointers.  A pointer names one element of some
 * matrix's buffer, and knows the layout well enough to step to its
 * neighbours and to load a column strip into a SIMD register.  The
 * register tile and the blocked drivers only ever talk to matrices
 * through these, so they don't care whether the buffer is panel-major,
 * plain, static or borrowed.
 *
 * Pointers borrow the buffer, so they can't outlive the matrix or see it
 * resized.
 */

use crate::simd::{Scalar,SimdVec};
use crate::tilematrix::layout::Layout;
use std::cmp::min;

/** Read-only pointer to an element of a matrix */
pub trait MatrixPointer<T:Scalar> : Copy {
    /** Pointer type over the transposed matrix */
    type Trans : MatrixPointer<T,Trans=Self>;

    /** Pointer to the element `di` rows down and `dj` columns right */
    fn at(self, di:usize, dj:usize) -> Self;

    /** Move right by `dj` columns */
    fn hmove(&mut self, dj:usize);

    /** Move down by `di` rows */
    fn vmove(&mut self, di:usize);

    /** The element pointed to */
    fn get(self) -> T;

    /**
     * Load the element pointed to and the ones below it in the same column,
     * `min(n, LANES)` of them.  The remaining lanes are zero.  Nothing past
     * the first `n` rows is touched.
     */
    fn load(self, n:usize) -> T::Simd;

    /** The element pointed to, in every lane */
    #[inline(always)]
    fn broadcast(self) -> T::Simd { T::Simd::splat(self.get()) }

    /** Spacing of the underlying layout */
    fn spacing(self) -> usize;

    /** The same element, seen as (j,i) of the transposed matrix */
    fn trans(self) -> Self::Trans;

    /** (row, column) pointed to */
    fn position(self) -> (usize,usize);
}

/** Writable pointer to an element of a matrix */
pub trait MatrixPointerMut<T:Scalar> {
    /** Element at offset (di,dj) */
    fn get_at(&self, di:usize, dj:usize) -> T;

    /** Set the element at offset (di,dj) */
    fn set_at(&mut self, di:usize, dj:usize, x:T);

    /**
     * Store lanes `lo..hi` of `v` to rows `di+lo .. di+hi` of column `dj`.
     * Other rows are left alone.
     */
    fn store_at(&mut self, di:usize, dj:usize, v:T::Simd, lo:usize, hi:usize);
}

/** Read-only pointer into a vector, or a row or column of a matrix */
pub trait VectorPointer<T:Scalar> : Copy {
    /** Element `k` */
    fn element(self, k:usize) -> T;

    /** Elements `k .. k+min(n,LANES)`, zero-filled */
    fn load(self, k:usize, n:usize) -> T::Simd;

    /** Element `k` in every lane */
    #[inline(always)]
    fn broadcast(self, k:usize) -> T::Simd { T::Simd::splat(self.element(k)) }
}

/**************************************************************************
 * Pointers into a flat buffer with a layout
 **************************************************************************/

/** Pointer to element (i,j) of a buffer with layout `L` */
#[derive(Clone,Copy,Debug)]
pub struct MatrixPtr<'a,T,L> {
    data   : &'a [T],
    layout : L,
    i      : usize,
    j      : usize
}

impl <'a,T:Scalar,L:Layout> MatrixPtr<'a,T,L> {
    pub fn new(data:&'a [T], layout:L, i:usize, j:usize) -> Self {
        MatrixPtr { data: data, layout: layout, i: i, j: j }
    }

    pub fn layout(&self) -> L { self.layout }
}

impl <'a,T:Scalar,L:Layout> MatrixPointer<T> for MatrixPtr<'a,T,L> {
    type Trans = MatrixPtr<'a,T,L::Trans>;

    #[inline(always)]
    fn at(self, di:usize, dj:usize) -> Self {
        MatrixPtr { data: self.data, layout: self.layout, i: self.i+di, j: self.j+dj }
    }

    #[inline(always)]
    fn hmove(&mut self, dj:usize) { self.j += dj; }

    #[inline(always)]
    fn vmove(&mut self, di:usize) { self.i += di; }

    #[inline(always)]
    fn get(self) -> T { self.data[self.layout.offset(self.i,self.j)] }

    #[inline(always)]
    fn load(self, n:usize) -> T::Simd {
        let n = min(n, T::LANES);
        let off = self.layout.offset(self.i,self.j);
        if n == T::LANES && self.layout.contiguous_rows(self.i) >= n {
            T::Simd::load(&self.data[off..off+n])
        } else {
            let mut ret = T::Simd::zero();
            for r in 0..n {
                ret.set_lane(r, self.data[self.layout.offset(self.i+r,self.j)]);
            }
            ret
        }
    }

    #[inline(always)]
    fn spacing(self) -> usize { self.layout.spacing() }

    #[inline(always)]
    fn trans(self) -> Self::Trans {
        MatrixPtr { data: self.data, layout: self.layout.trans(), i: self.j, j: self.i }
    }

    #[inline(always)]
    fn position(self) -> (usize,usize) { (self.i,self.j) }
}

/** Writable pointer to element (i,j) of a buffer with layout `L` */
#[derive(Debug)]
pub struct MatrixPtrMut<'a,T,L> {
    data   : &'a mut [T],
    layout : L,
    i      : usize,
    j      : usize
}

impl <'a,T:Scalar,L:Layout> MatrixPtrMut<'a,T,L> {
    pub fn new(data:&'a mut [T], layout:L, i:usize, j:usize) -> Self {
        MatrixPtrMut { data: data, layout: layout, i: i, j: j }
    }

    /** Move right by `dj` columns */
    pub fn hmove(&mut self, dj:usize) { self.j += dj; }

    /** Move down by `di` rows */
    pub fn vmove(&mut self, di:usize) { self.i += di; }

    /** A read-only pointer to the same element */
    pub fn as_ptr(&self) -> MatrixPtr<'_,T,L> {
        MatrixPtr { data: &*self.data, layout: self.layout, i: self.i, j: self.j }
    }

    pub fn position(&self) -> (usize,usize) { (self.i,self.j) }
}

impl <'a,T:Scalar,L:Layout> MatrixPointerMut<T> for MatrixPtrMut<'a,T,L> {
    #[inline(always)]
    fn get_at(&self, di:usize, dj:usize) -> T {
        self.data[self.layout.offset(self.i+di,self.j+dj)]
    }

    #[inline(always)]
    fn set_at(&mut self, di:usize, dj:usize, x:T) {
        let off = self.layout.offset(self.i+di,self.j+dj);
        self.data[off] = x;
    }

    #[inline(always)]
    fn store_at(&mut self, di:usize, dj:usize, v:T::Simd, lo:usize, hi:usize) {
        let hi = min(hi, T::LANES);
        if lo >= hi { return; }
        let (i,j) = (self.i+di, self.j+dj);
        if lo == 0 && hi == T::LANES && self.layout.contiguous_rows(i) >= hi {
            let off = self.layout.offset(i,j);
            v.store(&mut self.data[off..off+hi]);
        } else {
            for r in lo..hi {
                let off = self.layout.offset(i+r,j);
                self.data[off] = v.lane(r);
            }
        }
    }
}

/**************************************************************************
 * Vector pointers
 **************************************************************************/

/** The column that starts at a matrix pointer, going down */
#[derive(Clone,Copy,Debug)]
pub struct Column<P>(pub P);

/** The row that starts at a matrix pointer, going right */
#[derive(Clone,Copy,Debug)]
pub struct Row<P>(pub P);

impl <T:Scalar,P:MatrixPointer<T>> VectorPointer<T> for Column<P> {
    #[inline(always)]
    fn element(self, k:usize) -> T { self.0.at(k,0).get() }
    #[inline(always)]
    fn load(self, k:usize, n:usize) -> T::Simd { self.0.at(k,0).load(n) }
}

impl <T:Scalar,P:MatrixPointer<T>> VectorPointer<T> for Row<P> {
    #[inline(always)]
    fn element(self, k:usize) -> T { self.0.at(0,k).get() }
    #[inline(always)]
    fn load(self, k:usize, n:usize) -> T::Simd { self.0.trans().at(k,0).load(n) }
}

impl <'a,T:Scalar> VectorPointer<T> for &'a [T] {
    #[inline(always)]
    fn element(self, k:usize) -> T { self[k] }

    #[inline(always)]
    fn load(self, k:usize, n:usize) -> T::Simd {
        let n = min(n, T::LANES);
        if n == T::LANES {
            T::Simd::load(&self[k..k+n])
        } else {
            let mut ret = T::Simd::zero();
            for r in 0..n { ret.set_lane(r, self[k+r]); }
            ret
        }
    }
}
