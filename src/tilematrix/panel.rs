/*
 * @file panel.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Panel-major matrices.  Rows are grouped into horizontal panels whose
 * height is a multiple of the SIMD width; each panel is stored
 * column-major.  A register tile whose rows fall in one panel loads every
 * column with a single aligned register load, which is the point.
 */

use crate::error::{Error,Result};
use crate::simd::{Scalar,SimdVec,next_multiple,checked_next_multiple};
use crate::tilematrix::layout::Panel;
use crate::tilematrix::matrix::{Matrix,MatrixMut,DynamicMatrix,decode_size,check_allocation};
use bincode::{Encode,Decode};
use bincode::enc::Encoder;
use bincode::de::Decoder;
use bincode::error::{EncodeError,DecodeError};

/** Options for allocating a panel matrix */
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct PanelOptions {
    /**
     * Rows per panel.  Must be a positive multiple of the SIMD width.
     * `None` means one register.  A height above the row count rounded up
     * to a register is reduced to that.
     */
    pub panel_height : Option<usize>,

    /**
     * Zero the buffer on allocation.  If false it is filled with NaN
     * instead, so that reading an element before writing it shows up.
     */
    pub zero_init : bool,
}

impl Default for PanelOptions {
    fn default() -> Self {
        PanelOptions {
            panel_height: None,
            zero_init: true
        }
    }
}

/** Tallest useful panel for `rows` rows: one panel holding them all */
fn max_panel_height(rows:usize, lanes:usize) -> usize {
    checked_next_multiple(rows, lanes).unwrap_or(usize::MAX).max(lanes)
}

/** A heap-allocated panel-major matrix */
#[derive(Clone,Debug)]
pub struct DynamicPanelMatrix<T:Scalar> {
    rows    : usize,
    columns : usize,
    layout  : Panel,
    data    : Vec<T::Simd>
}

impl <T:Scalar> DynamicPanelMatrix<T> {
    /** A zero matrix with the default panel height */
    pub fn new(rows:usize, columns:usize) -> Self {
        Self::allocate(rows, columns, T::LANES, true)
    }

    /** A matrix allocated according to `options` */
    pub fn with_options(rows:usize, columns:usize, options:&PanelOptions) -> Result<Self> {
        let height = options.panel_height.unwrap_or(T::LANES);
        if height == 0 || height % T::LANES != 0 {
            log::debug!("rejecting panel height {} for {}-lane registers", height, T::LANES);
            return Err(Error::InvalidPanelHeight(height, T::LANES));
        }
        let height = height.min(max_panel_height(rows, T::LANES));
        Ok(Self::allocate(rows, columns, height, options.zero_init))
    }

    fn allocate(rows:usize, columns:usize, height:usize, zero_init:bool) -> Self {
        let layout = Panel::for_columns(height, columns, T::LANES);
        let panels = next_multiple(rows, height) / height;
        let regs = panels * layout.spacing / T::LANES;
        let fill = if zero_init { T::Simd::zero() } else { T::Simd::splat(T::nan()) };
        log::trace!("allocating {}x{} panel matrix: {} panels of height {}, {} registers",
            rows, columns, panels, height, regs);
        DynamicPanelMatrix { rows: rows, columns: columns, layout: layout, data: vec![fill; regs] }
    }

    /** Matrix with element (i,j) equal to `f(i,j)` */
    pub fn from_fn<F:FnMut(usize,usize)->T>(rows:usize, columns:usize, mut f:F) -> Self {
        let mut ret = Self::new(rows, columns);
        for j in 0..columns {
            for i in 0..rows { ret.set(i,j,f(i,j)); }
        }
        ret
    }

    /** Panel-major copy of any other matrix */
    pub fn from_matrix<M:Matrix<T>>(src:&M) -> Self {
        Self::from_fn(src.rows(), src.columns(), |i,j| src.get(i,j))
    }

    /** Column-major copy */
    pub fn to_dense(&self) -> DynamicMatrix<T> {
        DynamicMatrix::from_matrix(self)
    }

    pub fn panel_height(&self) -> usize { self.layout.height }

    /** Number of panels, counting a partial last one */
    pub fn panel_count(&self) -> usize {
        next_multiple(self.rows, self.layout.height) / self.layout.height
    }
}

impl <T:Scalar> Matrix<T> for DynamicPanelMatrix<T> {
    type Layout = Panel;
    fn rows(&self) -> usize { self.rows }
    fn columns(&self) -> usize { self.columns }
    fn layout(&self) -> Panel { self.layout }
    fn data(&self) -> &[T] { bytemuck::cast_slice(&self.data) }
}

impl <T:Scalar> MatrixMut<T> for DynamicPanelMatrix<T> {
    fn data_mut(&mut self) -> &mut [T] { bytemuck::cast_slice_mut(&mut self.data) }
}

impl <T:Scalar> PartialEq for DynamicPanelMatrix<T> {
    /** Same shape, panel height and elements; padding is ignored */
    fn eq(&self, other:&Self) -> bool {
        if self.shape() != other.shape() || self.panel_height() != other.panel_height() { return false; }
        for j in 0..self.columns { for i in 0..self.rows {
            if self.get(i,j) != other.get(i,j) { return false; }
        }}
        true
    }
}

/**
 * A fixed-size panel-major matrix, stored inline.  Panels are one register
 * high and `N` columns wide, without column padding.
 *
 * The storage holds `M` panels, enough for any lane count; only the first
 * `ceil(M/LANES)` are used.
 */
#[derive(Clone,Copy,Debug)]
pub struct StaticPanelMatrix<T:Scalar, const M:usize, const N:usize> {
    data : [[T::Simd; N]; M]
}

impl <T:Scalar, const M:usize, const N:usize> StaticPanelMatrix<T,M,N> {
    pub fn new() -> Self {
        StaticPanelMatrix { data: [[T::Simd::zero(); N]; M] }
    }

    pub fn from_fn<F:FnMut(usize,usize)->T>(mut f:F) -> Self {
        let mut ret = Self::new();
        for j in 0..N { for i in 0..M { ret.set(i,j,f(i,j)); }}
        ret
    }

    /** Panel-major copy of any other M x N matrix */
    pub fn from_matrix<S:Matrix<T>>(src:&S) -> Result<Self> {
        let mut ret = Self::new();
        crate::tilematrix::matrix::assign(&mut ret, src)?;
        Ok(ret)
    }

    pub fn panel_height(&self) -> usize { T::LANES }

    pub fn panel_count(&self) -> usize { next_multiple(M, T::LANES) / T::LANES }
}

impl <T:Scalar, const M:usize, const N:usize> Default for StaticPanelMatrix<T,M,N> {
    fn default() -> Self { Self::new() }
}

impl <T:Scalar, const M:usize, const N:usize> Matrix<T> for StaticPanelMatrix<T,M,N> {
    type Layout = Panel;
    fn rows(&self) -> usize { M }
    fn columns(&self) -> usize { N }
    fn layout(&self) -> Panel { Panel { height: T::LANES, spacing: T::LANES * N } }
    fn data(&self) -> &[T] { bytemuck::cast_slice(self.data.as_flattened()) }
}

impl <T:Scalar, const M:usize, const N:usize> MatrixMut<T> for StaticPanelMatrix<T,M,N> {
    fn data_mut(&mut self) -> &mut [T] { bytemuck::cast_slice_mut(self.data.as_flattened_mut()) }
}

impl <T:Scalar, const M:usize, const N:usize> PartialEq for StaticPanelMatrix<T,M,N> {
    /** Same elements; padding is ignored */
    fn eq(&self, other:&Self) -> bool {
        for j in 0..N { for i in 0..M {
            if self.get(i,j) != other.get(i,j) { return false; }
        }}
        true
    }
}

/**
 * Serialized as rows, columns and panel height, then the elements in
 * column-major order.  The element order doesn't depend on the panel
 * height.
 */
impl <T:Scalar> Encode for DynamicPanelMatrix<T> {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> core::result::Result<(), EncodeError> {
        (self.rows as u64).encode(encoder)?;
        (self.columns as u64).encode(encoder)?;
        (self.layout.height as u64).encode(encoder)?;
        for j in 0..self.columns { for i in 0..self.rows {
            self.get(i,j).encode(encoder)?;
        }}
        Ok(())
    }
}

impl <Context, T:Scalar+Decode<Context>> Decode<Context> for DynamicPanelMatrix<T> {
    fn decode<D: Decoder<Context=Context>>(decoder: &mut D) -> core::result::Result<Self, DecodeError> {
        let rows = decode_size(decoder)?;
        let columns = decode_size(decoder)?;
        let height = decode_size(decoder)?;
        let lanes = T::LANES;
        if height == 0 || height % lanes != 0 || height > max_panel_height(rows, lanes) {
            return Err(DecodeError::Other("invalid panel height"));
        }

        let elements = check_allocation::<T>(rows.checked_mul(columns))?;
        let spacing = checked_next_multiple(columns, lanes).and_then(|c| c.checked_mul(height));
        let padded = checked_next_multiple(rows, height)
            .zip(spacing)
            .and_then(|(r,s)| (r / height).checked_mul(s));
        check_allocation::<T>(spacing)?;
        check_allocation::<T>(padded)?;
        decoder.claim_container_read::<T>(elements)?;
        let mut ret = Self::allocate(rows, columns, height, true);
        for j in 0..columns { for i in 0..rows {
            ret.set(i,j,T::decode(decoder)?);
        }}
        Ok(ret)
    }
}
