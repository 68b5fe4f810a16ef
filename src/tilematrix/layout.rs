/*
 * @file layout.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Layouts: how a (row, column) index maps to an offset in a flat buffer.
 * These are small Copy values, fixed once a matrix is built.  Plain
 * row- and column-major layouts and the panel layout all implement the
 * same trait, so the kernels are written once against it.
 */

use std::fmt::Debug;

/** Which index varies fastest in memory */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum StorageOrder {
    RowMajor,
    ColumnMajor,
}

impl StorageOrder {
    pub fn trans(self) -> StorageOrder {
        match self {
            StorageOrder::RowMajor => StorageOrder::ColumnMajor,
            StorageOrder::ColumnMajor => StorageOrder::RowMajor,
        }
    }
}

/**
 * Map from a 2-D index to a linear offset.
 *
 * `trans()` gives the layout of the transposed matrix over the same
 * buffer: `self.trans().offset(j,i) == self.offset(i,j)`.
 */
pub trait Layout : Copy + Debug + PartialEq {
    /** Layout of the transpose */
    type Trans : Layout<Trans=Self>;

    /** Storage order of the elements within a panel (or the whole matrix) */
    const ORDER: StorageOrder;

    /** Offset of element (i,j) */
    fn offset(&self, i:usize, j:usize) -> usize;

    /** Stride between consecutive columns (column-major), rows (row-major), or panels */
    fn spacing(&self) -> usize;

    /** The same buffer, read transposed */
    fn trans(&self) -> Self::Trans;

    /**
     * How many rows starting at row `i` of any column sit at consecutive
     * offsets.  Loads and stores of that many rows are a single slice copy.
     */
    fn contiguous_rows(&self, i:usize) -> usize;

    /** Minimum buffer length that holds a rows x cols matrix */
    fn required_len(&self, rows:usize, cols:usize) -> usize {
        if rows == 0 || cols == 0 { 0 } else { self.offset(rows-1,cols-1) + 1 }
    }
}

/** Dense column-major storage: element (i,j) at `i + j*spacing` */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct ColumnMajor {
    pub spacing : usize
}

/** Dense row-major storage: element (i,j) at `i*spacing + j` */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct RowMajor {
    pub spacing : usize
}

impl Layout for ColumnMajor {
    type Trans = RowMajor;
    const ORDER: StorageOrder = StorageOrder::ColumnMajor;
    #[inline(always)]
    fn offset(&self, i:usize, j:usize) -> usize { i + j*self.spacing }
    #[inline(always)]
    fn spacing(&self) -> usize { self.spacing }
    #[inline(always)]
    fn trans(&self) -> RowMajor { RowMajor { spacing: self.spacing } }
    #[inline(always)]
    fn contiguous_rows(&self, _i:usize) -> usize { usize::MAX }
}

impl Layout for RowMajor {
    type Trans = ColumnMajor;
    const ORDER: StorageOrder = StorageOrder::RowMajor;
    #[inline(always)]
    fn offset(&self, i:usize, j:usize) -> usize { i*self.spacing + j }
    #[inline(always)]
    fn spacing(&self) -> usize { self.spacing }
    #[inline(always)]
    fn trans(&self) -> ColumnMajor { ColumnMajor { spacing: self.spacing } }
    #[inline(always)]
    fn contiguous_rows(&self, _i:usize) -> usize { 1 }
}

/** Dense layouts that an owned matrix can allocate for itself */
pub trait DenseLayout : Layout {
    /** Layout for a rows x cols matrix, with the stride padded to a multiple of `align` */
    fn for_shape(rows:usize, cols:usize, align:usize) -> Self;

    /**
     * Elements of storage behind `for_shape(rows,cols,align)`, counting the
     * padding, or `None` if the count overflows.  Empty shapes need none.
     */
    fn checked_len(rows:usize, cols:usize, align:usize) -> Option<usize>;
}

impl DenseLayout for ColumnMajor {
    fn for_shape(rows:usize, _cols:usize, align:usize) -> Self {
        ColumnMajor { spacing: crate::simd::next_multiple(rows.max(1), align) }
    }
    fn checked_len(rows:usize, cols:usize, align:usize) -> Option<usize> {
        if rows == 0 { return Some(0); }
        crate::simd::checked_next_multiple(rows, align)?.checked_mul(cols)
    }
}

impl DenseLayout for RowMajor {
    fn for_shape(_rows:usize, cols:usize, align:usize) -> Self {
        RowMajor { spacing: crate::simd::next_multiple(cols.max(1), align) }
    }
    fn checked_len(rows:usize, cols:usize, align:usize) -> Option<usize> {
        if cols == 0 { return Some(0); }
        crate::simd::checked_next_multiple(cols, align)?.checked_mul(rows)
    }
}

/**
 * Panel storage.  Rows are grouped into panels of `height` rows; within a
 * panel the elements are column-major with column stride `height`, and
 * consecutive panels are `spacing` elements apart.  Element (i,j) lives at
 * `(i/height)*spacing + j*height + i%height`.
 */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Panel {
    pub height  : usize,
    pub spacing : usize
}

/** Transpose of a `Panel` layout: panels of columns, row-major within */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct PanelRowMajor {
    pub height  : usize,
    pub spacing : usize
}

impl Panel {
    /** Panel layout for a matrix with `cols` columns, padded to multiples of `lanes` */
    pub fn for_columns(height:usize, cols:usize, lanes:usize) -> Panel {
        Panel { height: height, spacing: height * crate::simd::next_multiple(cols, lanes) }
    }
}

impl Layout for Panel {
    type Trans = PanelRowMajor;
    const ORDER: StorageOrder = StorageOrder::ColumnMajor;
    #[inline(always)]
    fn offset(&self, i:usize, j:usize) -> usize {
        (i / self.height) * self.spacing + j * self.height + i % self.height
    }
    #[inline(always)]
    fn spacing(&self) -> usize { self.spacing }
    #[inline(always)]
    fn trans(&self) -> PanelRowMajor { PanelRowMajor { height: self.height, spacing: self.spacing } }
    #[inline(always)]
    fn contiguous_rows(&self, i:usize) -> usize { self.height - i % self.height }
}

impl Layout for PanelRowMajor {
    type Trans = Panel;
    const ORDER: StorageOrder = StorageOrder::RowMajor;
    #[inline(always)]
    fn offset(&self, i:usize, j:usize) -> usize {
        (j / self.height) * self.spacing + i * self.height + j % self.height
    }
    #[inline(always)]
    fn spacing(&self) -> usize { self.spacing }
    #[inline(always)]
    fn trans(&self) -> Panel { Panel { height: self.height, spacing: self.spacing } }
    #[inline(always)]
    fn contiguous_rows(&self, _i:usize) -> usize { 1 }
}

/** Another layout, with the origin moved to (i0,j0).  Used by submatrix views. */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Shifted<L:Layout> {
    pub inner : L,
    pub i0 : usize,
    pub j0 : usize
}

impl <L:Layout> Layout for Shifted<L> {
    type Trans = Shifted<L::Trans>;
    const ORDER: StorageOrder = L::ORDER;
    #[inline(always)]
    fn offset(&self, i:usize, j:usize) -> usize { self.inner.offset(i+self.i0, j+self.j0) }
    #[inline(always)]
    fn spacing(&self) -> usize { self.inner.spacing() }
    #[inline(always)]
    fn trans(&self) -> Shifted<L::Trans> {
        Shifted { inner: self.inner.trans(), i0: self.j0, j0: self.i0 }
    }
    #[inline(always)]
    fn contiguous_rows(&self, i:usize) -> usize { self.inner.contiguous_rows(i+self.i0) }
}
