/*
 * @file matrix.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Dense matrices.  The kernels only need to know a matrix's shape, its
 * layout, and its buffer; the `Matrix` and `MatrixMut` traits expose
 * exactly that, and everything else (element access, pointers, views) is
 * derived from it.  Owned matrices keep their buffer as a vector of SIMD
 * registers so that it is always register-aligned.
 */

use crate::blocking::check_shape;
use crate::error::{Error,Result};
use crate::simd::{Scalar,SimdVec,next_multiple};
use crate::tilematrix::layout::{Layout,DenseLayout,ColumnMajor,Shifted};
use crate::tilematrix::pointer::{MatrixPtr,MatrixPtrMut,Column,Row};
use bincode::{Encode,Decode};
use bincode::enc::Encoder;
use bincode::de::Decoder;
use bincode::error::{EncodeError,DecodeError};
use rand::{Rng,thread_rng};

/**************************************************************************
 * Capability traits
 **************************************************************************/

/** A readable matrix: shape, layout and buffer */
pub trait Matrix<T:Scalar> {
    type Layout : Layout;

    fn rows(&self) -> usize;
    fn columns(&self) -> usize;
    fn layout(&self) -> Self::Layout;

    /** The underlying buffer, including any padding */
    fn data(&self) -> &[T];

    fn shape(&self) -> (usize,usize) { (self.rows(), self.columns()) }

    fn spacing(&self) -> usize { self.layout().spacing() }

    /** Element (i,j) */
    #[inline(always)]
    fn get(&self, i:usize, j:usize) -> T {
        debug_assert!(i < self.rows() && j < self.columns());
        self.data()[self.layout().offset(i,j)]
    }

    /** Pointer to element (i,j) */
    #[inline(always)]
    fn ptr(&self, i:usize, j:usize) -> MatrixPtr<'_,T,Self::Layout> {
        MatrixPtr::new(self.data(), self.layout(), i, j)
    }

    /** Row `i`, as a vector pointer */
    fn row(&self, i:usize) -> Row<MatrixPtr<'_,T,Self::Layout>> { Row(self.ptr(i,0)) }

    /** Column `j`, as a vector pointer */
    fn column(&self, j:usize) -> Column<MatrixPtr<'_,T,Self::Layout>> { Column(self.ptr(0,j)) }

    /** The m x n block starting at (i,j), without copying */
    fn submatrix(&self, i:usize, j:usize, m:usize, n:usize) -> Submatrix<'_,T,Self::Layout> {
        assert!(i+m <= self.rows() && j+n <= self.columns(), "submatrix out of range");
        MatrixView {
            data: self.data(),
            layout: Shifted { inner: self.layout(), i0: i, j0: j },
            rows: m,
            columns: n
        }
    }

    /** Copy out into a fresh column-major matrix */
    fn to_owned_matrix(&self) -> DynamicMatrix<T> {
        DynamicMatrix::from_fn(self.rows(), self.columns(), |i,j| self.get(i,j))
    }
}

/** A writable matrix */
pub trait MatrixMut<T:Scalar> : Matrix<T> {
    fn data_mut(&mut self) -> &mut [T];

    /** Set element (i,j) */
    #[inline(always)]
    fn set(&mut self, i:usize, j:usize, x:T) {
        debug_assert!(i < self.rows() && j < self.columns());
        let off = self.layout().offset(i,j);
        self.data_mut()[off] = x;
    }

    /** Writable pointer to element (i,j) */
    #[inline(always)]
    fn ptr_mut(&mut self, i:usize, j:usize) -> MatrixPtrMut<'_,T,Self::Layout> {
        let layout = self.layout();
        MatrixPtrMut::new(self.data_mut(), layout, i, j)
    }

    /** The writable m x n block starting at (i,j) */
    fn submatrix_mut(&mut self, i:usize, j:usize, m:usize, n:usize) -> SubmatrixMut<'_,T,Self::Layout> {
        assert!(i+m <= self.rows() && j+n <= self.columns(), "submatrix out of range");
        let layout = Shifted { inner: self.layout(), i0: i, j0: j };
        MatrixViewMut { data: self.data_mut(), layout: layout, rows: m, columns: n }
    }

    /** Set every element to `x` */
    fn fill(&mut self, x:T) {
        for j in 0..self.columns() {
            for i in 0..self.rows() { self.set(i,j,x); }
        }
    }

    /** Fill with uniform random entries in [-1, 1) */
    fn randomize(&mut self) {
        let mut rng = thread_rng();
        for j in 0..self.columns() {
            for i in 0..self.rows() { self.set(i,j,rng.gen_range(-T::one()..T::one())); }
        }
    }
}

/** Copy `src` into `dst`, which must have the same shape */
pub fn assign<T:Scalar, D:MatrixMut<T>, S:Matrix<T>>(dst:&mut D, src:&S) -> Result<()> {
    check_shape("assign", dst.shape(), src.shape())?;
    for j in 0..src.columns() {
        for i in 0..src.rows() { dst.set(i,j,src.get(i,j)); }
    }
    Ok(())
}

/**************************************************************************
 * Owned dense matrices
 **************************************************************************/

/**
 * A heap-allocated dense matrix.  The stride is padded to a multiple of
 * the SIMD width, so every column (or row) starts on a register boundary.
 */
#[derive(Clone,Debug)]
pub struct DynamicMatrix<T:Scalar, L:DenseLayout=ColumnMajor> {
    rows    : usize,
    columns : usize,
    layout  : L,
    data    : Vec<T::Simd>
}

impl <T:Scalar, L:DenseLayout> DynamicMatrix<T,L> {
    /** A zero matrix */
    pub fn new(rows:usize, columns:usize) -> Self {
        let layout = L::for_shape(rows, columns, T::LANES);
        let regs = next_multiple(layout.required_len(rows,columns), T::LANES) / T::LANES;
        DynamicMatrix { rows: rows, columns: columns, layout: layout, data: vec![T::Simd::zero(); regs] }
    }

    pub fn zeros(rows:usize, columns:usize) -> Self { Self::new(rows, columns) }

    /** Matrix with element (i,j) equal to `f(i,j)` */
    pub fn from_fn<F:FnMut(usize,usize)->T>(rows:usize, columns:usize, mut f:F) -> Self {
        let mut ret = Self::new(rows, columns);
        for j in 0..columns {
            for i in 0..rows { ret.set(i,j,f(i,j)); }
        }
        ret
    }

    /** Copy of any other matrix */
    pub fn from_matrix<M:Matrix<T>>(src:&M) -> Self {
        Self::from_fn(src.rows(), src.columns(), |i,j| src.get(i,j))
    }

    /** The n x n identity */
    pub fn identity(n:usize) -> Self {
        Self::from_fn(n, n, |i,j| if i == j { T::one() } else { T::zero() })
    }
}

impl <T:Scalar, L:DenseLayout> Matrix<T> for DynamicMatrix<T,L> {
    type Layout = L;
    fn rows(&self) -> usize { self.rows }
    fn columns(&self) -> usize { self.columns }
    fn layout(&self) -> L { self.layout }
    fn data(&self) -> &[T] { bytemuck::cast_slice(&self.data) }
}

impl <T:Scalar, L:DenseLayout> MatrixMut<T> for DynamicMatrix<T,L> {
    fn data_mut(&mut self) -> &mut [T] { bytemuck::cast_slice_mut(&mut self.data) }
}

impl <T:Scalar, L:DenseLayout> PartialEq for DynamicMatrix<T,L> {
    /** Same shape and elements; padding is ignored */
    fn eq(&self, other:&Self) -> bool {
        if self.shape() != other.shape() { return false; }
        for j in 0..self.columns { for i in 0..self.rows {
            if self.get(i,j) != other.get(i,j) { return false; }
        }}
        true
    }
}

/**
 * Serialized as the row and column counts, then the elements in
 * column-major order.  Padding is not serialized.
 */
impl <T:Scalar, L:DenseLayout> Encode for DynamicMatrix<T,L> {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> core::result::Result<(), EncodeError> {
        (self.rows as u64).encode(encoder)?;
        (self.columns as u64).encode(encoder)?;
        for j in 0..self.columns { for i in 0..self.rows {
            self.get(i,j).encode(encoder)?;
        }}
        Ok(())
    }
}

/** Decode a u64 size field */
pub(crate) fn decode_size<Context, D:Decoder<Context=Context>>(decoder:&mut D) -> core::result::Result<usize,DecodeError> {
    let x = u64::decode(decoder)?;
    usize::try_from(x).map_err(|_| DecodeError::Other("matrix dimension does not fit in usize"))
}

/**
 * Check that a decoded header describes storage that can be allocated:
 * `len` elements of `T`, padding included, must not overflow or exceed
 * `isize::MAX` bytes.
 */
pub(crate) fn check_allocation<T:Scalar>(len:Option<usize>) -> core::result::Result<usize,DecodeError> {
    let bytes = len.and_then(|n| n.checked_mul(core::mem::size_of::<T>()));
    match (len, bytes) {
        (Some(n), Some(b)) if b <= isize::MAX as usize => Ok(n),
        _ => Err(DecodeError::Other("matrix too large"))
    }
}

impl <Context, T:Scalar+Decode<Context>, L:DenseLayout> Decode<Context> for DynamicMatrix<T,L> {
    fn decode<D: Decoder<Context=Context>>(decoder: &mut D) -> core::result::Result<Self, DecodeError> {
        let rows = decode_size(decoder)?;
        let columns = decode_size(decoder)?;
        let elements = check_allocation::<T>(rows.checked_mul(columns))?;
        check_allocation::<T>(L::checked_len(rows, columns, T::LANES))?;
        decoder.claim_container_read::<T>(elements)?;
        let mut ret = Self::new(rows, columns);
        for j in 0..columns { for i in 0..rows {
            ret.set(i,j,T::decode(decoder)?);
        }}
        Ok(ret)
    }
}

/**
 * A fixed-size column-major matrix, stored inline.  As with
 * [`DynamicMatrix`], the column stride is padded to a multiple of the
 * SIMD width, so columns start on register boundaries.
 *
 * The storage is `M` registers per column, enough for any lane count;
 * only the first `next_multiple(M, LANES)` elements of each are used.
 */
#[derive(Clone,Copy,Debug)]
pub struct StaticMatrix<T:Scalar, const M:usize, const N:usize> {
    data : [[T::Simd; M]; N]
}

impl <T:Scalar, const M:usize, const N:usize> StaticMatrix<T,M,N> {
    pub fn new() -> Self {
        StaticMatrix { data: [[T::Simd::zero(); M]; N] }
    }

    pub fn from_fn<F:FnMut(usize,usize)->T>(mut f:F) -> Self {
        let mut ret = Self::new();
        for j in 0..N { for i in 0..M { ret.set(i,j,f(i,j)); }}
        ret
    }
}

impl <T:Scalar, const M:usize, const N:usize> Default for StaticMatrix<T,M,N> {
    fn default() -> Self { Self::new() }
}

impl <T:Scalar, const M:usize, const N:usize> Matrix<T> for StaticMatrix<T,M,N> {
    type Layout = ColumnMajor;
    fn rows(&self) -> usize { M }
    fn columns(&self) -> usize { N }
    fn layout(&self) -> ColumnMajor { ColumnMajor::for_shape(M, N, T::LANES) }
    fn data(&self) -> &[T] { bytemuck::cast_slice(self.data.as_flattened()) }
}

impl <T:Scalar, const M:usize, const N:usize> MatrixMut<T> for StaticMatrix<T,M,N> {
    fn data_mut(&mut self) -> &mut [T] { bytemuck::cast_slice_mut(self.data.as_flattened_mut()) }
}

impl <T:Scalar, const M:usize, const N:usize> PartialEq for StaticMatrix<T,M,N> {
    /** Same elements; padding is ignored */
    fn eq(&self, other:&Self) -> bool {
        for j in 0..N { for i in 0..M {
            if self.get(i,j) != other.get(i,j) { return false; }
        }}
        true
    }
}

/**************************************************************************
 * Borrowed views
 **************************************************************************/

/** A read-only matrix over someone else's buffer */
#[derive(Clone,Copy,Debug)]
pub struct MatrixView<'a,T,L> {
    data    : &'a [T],
    layout  : L,
    rows    : usize,
    columns : usize
}

/** A block of another matrix */
pub type Submatrix<'a,T,L> = MatrixView<'a,T,Shifted<L>>;

/** A writable block of another matrix */
pub type SubmatrixMut<'a,T,L> = MatrixViewMut<'a,T,Shifted<L>>;

/** A writable matrix over someone else's buffer */
#[derive(Debug)]
pub struct MatrixViewMut<'a,T,L> {
    data    : &'a mut [T],
    layout  : L,
    rows    : usize,
    columns : usize
}

fn check_buffer<L:Layout>(len:usize, layout:&L, rows:usize, columns:usize) -> Result<()> {
    let needed = layout.required_len(rows, columns);
    if len < needed {
        log::debug!("view of {}x{} needs {} elements, buffer has {}", rows, columns, needed, len);
        Err(Error::BufferTooSmall { len: len, needed: needed })
    } else {
        Ok(())
    }
}

fn check_column_major(rows:usize, columns:usize, spacing:usize) -> Result<()> {
    if columns > 1 && spacing < rows {
        return Err(Error::DimensionMismatch { op: "view", expected: (rows,columns), found: (spacing,columns) });
    }
    Ok(())
}

impl <'a,T:Scalar,L:Layout> MatrixView<'a,T,L> {
    /** View `data` as a rows x columns matrix with the given layout */
    pub fn new(data:&'a [T], rows:usize, columns:usize, layout:L) -> Result<Self> {
        check_buffer(data.len(), &layout, rows, columns)?;
        Ok(MatrixView { data: data, layout: layout, rows: rows, columns: columns })
    }

    /** The transpose, over the same buffer */
    pub fn trans(&self) -> MatrixView<'a,T,L::Trans> {
        MatrixView { data: self.data, layout: self.layout.trans(), rows: self.columns, columns: self.rows }
    }
}

impl <'a,T:Scalar> MatrixView<'a,T,ColumnMajor> {
    /** View a column-major buffer with leading dimension `spacing` */
    pub fn column_major(data:&'a [T], rows:usize, columns:usize, spacing:usize) -> Result<Self> {
        check_column_major(rows, columns, spacing)?;
        Self::new(data, rows, columns, ColumnMajor { spacing: spacing })
    }
}

impl <'a,T:Scalar,L:Layout> MatrixViewMut<'a,T,L> {
    /** View `data` as a writable rows x columns matrix with the given layout */
    pub fn new(data:&'a mut [T], rows:usize, columns:usize, layout:L) -> Result<Self> {
        check_buffer(data.len(), &layout, rows, columns)?;
        Ok(MatrixViewMut { data: data, layout: layout, rows: rows, columns: columns })
    }
}

impl <'a,T:Scalar> MatrixViewMut<'a,T,ColumnMajor> {
    /** View a writable column-major buffer with leading dimension `spacing` */
    pub fn column_major(data:&'a mut [T], rows:usize, columns:usize, spacing:usize) -> Result<Self> {
        check_column_major(rows, columns, spacing)?;
        Self::new(data, rows, columns, ColumnMajor { spacing: spacing })
    }
}

impl <'a,T:Scalar,L:Layout> Matrix<T> for MatrixView<'a,T,L> {
    type Layout = L;
    fn rows(&self) -> usize { self.rows }
    fn columns(&self) -> usize { self.columns }
    fn layout(&self) -> L { self.layout }
    fn data(&self) -> &[T] { self.data }
}

impl <'a,T:Scalar,L:Layout> Matrix<T> for MatrixViewMut<'a,T,L> {
    type Layout = L;
    fn rows(&self) -> usize { self.rows }
    fn columns(&self) -> usize { self.columns }
    fn layout(&self) -> L { self.layout }
    fn data(&self) -> &[T] { &*self.data }
}

impl <'a,T:Scalar,L:Layout> MatrixMut<T> for MatrixViewMut<'a,T,L> {
    fn data_mut(&mut self) -> &mut [T] { &mut *self.data }
}
