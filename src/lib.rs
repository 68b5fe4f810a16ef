/*!
 * Small dense linear algebra.
 *
 * This crate provides BLAS-like kernels (matrix multiply, symmetric rank-k
 * update, Cholesky factorization, and triangular solve and multiply) for
 * matrices from a handful of rows up to a few hundred.  That's the regime
 * of embedded optimal control and batched scientific code, where the
 * per-call overhead of a general BLAS is a large share of the work.
 *
 * # Matrices
 *
 * The main storage type is [`DynamicPanelMatrix<T>`].  Its rows are cut
 * into horizontal panels, a multiple of the SIMD width high, and each panel
 * is stored column-major.  A block of a few registers by a few columns
 * inside one panel can then be loaded with aligned register loads.  Panel
 * height and initialization are set with [`PanelOptions`].
 *
 * The kernels also accept plain column- or row-major [`DynamicMatrix`]s,
 * compile-time sized [`StaticMatrix`]s and [`StaticPanelMatrix`]s, and
 * [`MatrixView`]s of borrowed buffers.  Anything implementing [`Matrix`]
 * (read) or [`MatrixMut`] (write) will do, including submatrices of any
 * of the above, and operands of different kinds can be mixed in one call.
 *
 * Element types are `f64` (4 lanes) and `f32` (8 lanes).
 *
 * # Kernels
 *
 * Every kernel writes to an explicit output operand, and most have an
 * `_in_place` form that overwrites one of the inputs instead:
 *
 * * [`gemm`], [`gemm_nt`], [`gemm_tn`], [`gemm_tt`], [`gemm_op`]: `D = beta*C + alpha*op(A)*op(B)`.
 * * [`syrk_ln`]: the lower triangle of `D = beta*C + alpha*A*A^T`.  Nothing above the
 *   diagonal of `D` is written.
 * * [`potrf`]: Cholesky factorization `A = L*L^T`.
 * * [`trsm_left_lower`], [`trsm_left_upper`], [`trsm_right_lower_trans`], [`trsm_right_upper`]:
 *   triangular solves with many right-hand sides.
 * * [`trmm_left_upper`], [`trmm_right_lower`]: triangular multiplies.
 * * [`ger`], [`trsv_lower`], [`trsv_upper`], [`iamax`]: matrix-vector operations.
 *
 * Shapes are checked before anything is written.  A mismatch is reported as
 * [`Error::DimensionMismatch`] and leaves the output untouched.  Cholesky
 * factorization of a matrix that isn't positive definite fails with
 * [`Error::NotPositiveDefinite`], naming the column where it stopped.
 *
 * # Internals
 *
 * All the kernels are built from one microkernel, [`RegisterTile`]: a block
 * of 1 to 3 SIMD registers by 4 columns, held in registers for the whole
 * of an update.  Tiles read and write matrices through pointers
 * ([`MatrixPointer`]) that know the matrix's layout.  So the same kernel
 * code, monomorphized, runs on every storage type.  Partial tiles at the
 * edges of a matrix carry their valid extent explicitly, and never read or
 * write outside it.
 *
 * On x86_64 with `avx2` and `fma` enabled at compile time, the register
 * arithmetic uses intrinsics.  Elsewhere it's plain lane loops, which are
 * correct but slower.
 *
 * # Serialization
 *
 * [`DynamicPanelMatrix`] and [`DynamicMatrix`] implement bincode's
 * [`Encode`](bincode::enc::Encode) and [`Decode`](bincode::de::Decode).
 * Please use [`STD_BINCODE_CONFIG`].
 *
 * TODO: BorrowDecode for views over serialized buffers.
 *
 * # C interface
 *
 * With the `cffi` feature (on by default), the `cffi` module exports
 * `pblas_*` functions over column-major `double` buffers, plus handles for
 * panel matrices.  The build script writes a header for them.
 */

/**
 * Matrix storage, pointers and the register tile.
 */
pub mod tilematrix;

mod error;
mod simd;
mod blocking;
mod gemm;
mod syrk;
mod potrf;
mod trsm;
mod trmm;
mod level2;
pub mod size;

#[cfg(feature="cffi")]
pub mod cffi;

#[cfg(test)]
mod testing;

pub use error::{Error,Result};
pub use simd::{Scalar,SimdVec,F64x4,F32x8};
pub use tilematrix::layout::{Layout,DenseLayout,StorageOrder,ColumnMajor,RowMajor,Panel,PanelRowMajor,Shifted};
pub use tilematrix::pointer::{MatrixPointer,MatrixPointerMut,VectorPointer,MatrixPtr,MatrixPtrMut,Column,Row};
pub use tilematrix::matrix::{Matrix,MatrixMut,DynamicMatrix,StaticMatrix,MatrixView,MatrixViewMut,
    Submatrix,SubmatrixMut,assign};
pub use tilematrix::panel::{DynamicPanelMatrix,StaticPanelMatrix,PanelOptions};
pub use tilematrix::tile::{RegisterTile,Diag,TILE_COLUMNS};
pub use gemm::{Op,gemm,gemm_nt,gemm_tn,gemm_tt,gemm_op,gemm_op_in_place};
pub use syrk::{syrk_ln,syrk_ln_in_place};
pub use potrf::{potrf,potrf_in_place};
pub use trsm::{trsm_left_lower,trsm_left_lower_in_place,trsm_left_upper,trsm_left_upper_in_place,
    trsm_right_lower_trans,trsm_right_lower_trans_in_place,trsm_right_upper,trsm_right_upper_in_place};
pub use trmm::{trmm_left_upper,trmm_right_lower};
pub use level2::{ger,trsv_lower,trsv_upper,iamax};
pub use size::serialized_size;

/** Recommended bincode configuration for encoding matrices */
pub const STD_BINCODE_CONFIG : bincode::config::Configuration = bincode::config::standard();
