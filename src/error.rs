/*
 * @file error.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Errors reported by the kernel entry points.
 */

use thiserror::Error;

/** Why an operation refused to run, or stopped. */
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /**
     * Cholesky factorization met a pivot that was not strictly positive
     * (or was NaN).  `column` is the global column index of that pivot.
     */
    #[error("matrix is not positive definite: pivot in column {column} is not positive")]
    NotPositiveDefinite { column: usize },

    /** Operand shapes don't fit the operation.  Nothing was written. */
    #[error("{op}: dimension mismatch, expected {expected:?}, found {found:?}")]
    DimensionMismatch { op: &'static str, expected: (usize, usize), found: (usize, usize) },

    /** Panel height must be a positive multiple of the SIMD lane count. */
    #[error("panel height {0} is not a positive multiple of the SIMD width {1}")]
    InvalidPanelHeight(usize, usize),

    /** A borrowed buffer is too short for the layout it was described with. */
    #[error("buffer holds {len} elements but the layout needs {needed}")]
    BufferTooSmall { len: usize, needed: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn messages() {
        let e = Error::NotPositiveDefinite { column: 3 };
        assert_eq!(e.to_string(), "matrix is not positive definite: pivot in column 3 is not positive");
        let e = Error::DimensionMismatch { op: "gemm", expected: (2,3), found: (3,2) };
        assert_eq!(e.to_string(), "gemm: dimension mismatch, expected (2, 3), found (3, 2)");
    }
}
