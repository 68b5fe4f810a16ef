/*
 * @file cffi.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * C foreign function interface.
 *
 * The kernels take column-major double-precision buffers with leading
 * dimensions, in the usual BLAS way, and return 0 on success, -1 on bad
 * arguments, or (for Cholesky) the failing column plus one.  Passing the
 * same pointer for an input and the output selects the in-place form,
 * where one exists; other overlaps are not allowed.
 *
 * There is also a small handle API for panel matrices, so that C callers
 * can keep factors around in panel form and serialize them.
 */

use crate::{Error,Result,Diag,Op,ColumnMajor,MatrixView,MatrixViewMut,DynamicPanelMatrix,Matrix,
    STD_BINCODE_CONFIG,serialized_size,assign,gemm_op,gemm_op_in_place,syrk_ln,syrk_ln_in_place,potrf,
    potrf_in_place,trsm_left_lower,trsm_left_lower_in_place,trsm_right_lower_trans,
    trsm_right_lower_trans_in_place,trmm_left_upper,trmm_right_lower};
use core::ptr::NonNull;
use core::slice::{from_raw_parts,from_raw_parts_mut};
use bincode::{encode_into_slice,decode_from_slice};

/// Returned when the arguments don't describe valid matrices
const BAD_ARGUMENTS : i32 = -1;

/** Elements spanned by a rows x cols column-major matrix with leading dimension ld */
fn span(rows:usize, cols:usize, ld:usize) -> Option<usize> {
    if rows == 0 || cols == 0 { return Some(0); }
    ld.checked_mul(cols-1)?.checked_add(rows)
}

unsafe fn view<'a>(ptr:*const f64, rows:usize, cols:usize, ld:usize) -> Option<MatrixView<'a,f64,ColumnMajor>> {
    let len = span(rows, cols, ld)?;
    let data : &[f64] = if len == 0 { &[] } else if ptr.is_null() { return None; } else { from_raw_parts(ptr, len) };
    MatrixView::column_major(data, rows, cols, ld).ok()
}

unsafe fn view_mut<'a>(ptr:*mut f64, rows:usize, cols:usize, ld:usize) -> Option<MatrixViewMut<'a,f64,ColumnMajor>> {
    let len = span(rows, cols, ld)?;
    let data : &mut [f64] = if len == 0 { &mut [] } else if ptr.is_null() { return None; } else { from_raw_parts_mut(ptr, len) };
    MatrixViewMut::column_major(data, rows, cols, ld).ok()
}

fn bad(op:&str) -> i32 {
    log::warn!("{}: null pointer or invalid leading dimension", op);
    BAD_ARGUMENTS
}

fn status(op:&str, result:Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(Error::NotPositiveDefinite { column }) => i32::try_from(column+1).unwrap_or(i32::MAX),
        Err(e) => {
            log::warn!("{}: {}", op, e);
            BAD_ARGUMENTS
        }
    }
}

/** In-place if `out` is `inp`, which then must have the same leading dimension */
fn in_place(op:&str, inp:*const f64, ld_in:usize, out:*mut f64, ld_out:usize) -> Option<bool> {
    if inp != out as *const f64 { return Some(false); }
    if ld_in != ld_out {
        log::warn!("{}: in-place call with leading dimensions {} and {}", op, ld_in, ld_out);
        return None;
    }
    Some(true)
}

fn op(trans:bool) -> Op { if trans { Op::Trans } else { Op::NoTrans } }

/****************************************************************************
 * Level 3 kernels, column-major f64
 ****************************************************************************/

#[no_mangle]
/// D = beta*C + alpha*op(A)*op(B), where op(A) is m x k and op(B) is k x n.
/// D may be C (with ldd == ldc).
pub unsafe extern "C" fn pblas_dgemm(
    trans_a: bool, trans_b: bool, m: usize, n: usize, k: usize,
    alpha: f64, a: *const f64, lda: usize, b: *const f64, ldb: usize,
    beta: f64, c: *const f64, ldc: usize, d: *mut f64, ldd: usize
) -> i32 {
    let name = "pblas_dgemm";
    let (ar,ac) = if trans_a { (k,m) } else { (m,k) };
    let (br,bc) = if trans_b { (n,k) } else { (k,n) };
    let (Some(av), Some(bv)) = (view(a,ar,ac,lda), view(b,br,bc,ldb)) else { return bad(name) };
    let Some(same) = in_place(name, c, ldc, d, ldd) else { return BAD_ARGUMENTS };
    let Some(mut dv) = view_mut(d,m,n,ldd) else { return bad(name) };
    if same {
        status(name, gemm_op_in_place(alpha, &av, op(trans_a), &bv, op(trans_b), beta, &mut dv))
    } else {
        let Some(cv) = view(c,m,n,ldc) else { return bad(name) };
        status(name, gemm_op(alpha, &av, op(trans_a), &bv, op(trans_b), beta, &cv, &mut dv))
    }
}

#[no_mangle]
/// Lower triangle of D = beta*C + alpha*A*A^T, where A is n x k.  D may be C.
pub unsafe extern "C" fn pblas_dsyrk_ln(
    n: usize, k: usize, alpha: f64, a: *const f64, lda: usize,
    beta: f64, c: *const f64, ldc: usize, d: *mut f64, ldd: usize
) -> i32 {
    let name = "pblas_dsyrk_ln";
    let Some(av) = view(a,n,k,lda) else { return bad(name) };
    let Some(same) = in_place(name, c, ldc, d, ldd) else { return BAD_ARGUMENTS };
    let Some(mut dv) = view_mut(d,n,n,ldd) else { return bad(name) };
    if same {
        status(name, syrk_ln_in_place(alpha, &av, beta, &mut dv))
    } else {
        let Some(cv) = view(c,n,n,ldc) else { return bad(name) };
        status(name, syrk_ln(alpha, &av, beta, &cv, &mut dv))
    }
}

#[no_mangle]
/// Cholesky factor L of the n x n matrix A.  Returns column+1 if A is not
/// positive definite.  L may be A.
pub unsafe extern "C" fn pblas_dpotrf_l(n: usize, a: *const f64, lda: usize, l: *mut f64, ldl: usize) -> i32 {
    let name = "pblas_dpotrf_l";
    let Some(same) = in_place(name, a, lda, l, ldl) else { return BAD_ARGUMENTS };
    let Some(mut lv) = view_mut(l,n,n,ldl) else { return bad(name) };
    if same {
        status(name, potrf_in_place(&mut lv))
    } else {
        let Some(av) = view(a,n,n,lda) else { return bad(name) };
        status(name, potrf(&av, &mut lv))
    }
}

#[no_mangle]
/// Solve A*X = B, with A m x m lower triangular and B m x n.  X may be B.
pub unsafe extern "C" fn pblas_dtrsm_llnn(
    m: usize, n: usize, a: *const f64, lda: usize,
    b: *const f64, ldb: usize, x: *mut f64, ldx: usize
) -> i32 {
    let name = "pblas_dtrsm_llnn";
    let Some(av) = view(a,m,m,lda) else { return bad(name) };
    let Some(same) = in_place(name, b, ldb, x, ldx) else { return BAD_ARGUMENTS };
    let Some(mut xv) = view_mut(x,m,n,ldx) else { return bad(name) };
    if same {
        status(name, trsm_left_lower_in_place(Diag::NonUnit, &av, &mut xv))
    } else {
        let Some(bv) = view(b,m,n,ldb) else { return bad(name) };
        status(name, trsm_left_lower(Diag::NonUnit, &av, &bv, &mut xv))
    }
}

#[no_mangle]
/// Solve X*A^T = B, with A n x n lower triangular and B m x n.  X may be B.
pub unsafe extern "C" fn pblas_dtrsm_rltn(
    m: usize, n: usize, a: *const f64, lda: usize,
    b: *const f64, ldb: usize, x: *mut f64, ldx: usize
) -> i32 {
    let name = "pblas_dtrsm_rltn";
    let Some(av) = view(a,n,n,lda) else { return bad(name) };
    let Some(same) = in_place(name, b, ldb, x, ldx) else { return BAD_ARGUMENTS };
    let Some(mut xv) = view_mut(x,m,n,ldx) else { return bad(name) };
    if same {
        status(name, trsm_right_lower_trans_in_place(Diag::NonUnit, &av, &mut xv))
    } else {
        let Some(bv) = view(b,m,n,ldb) else { return bad(name) };
        status(name, trsm_right_lower_trans(Diag::NonUnit, &av, &bv, &mut xv))
    }
}

#[no_mangle]
/// D = alpha*A*B, with A m x m upper triangular and B m x n.  D must not overlap B.
pub unsafe extern "C" fn pblas_dtrmm_lunn(
    m: usize, n: usize, alpha: f64, a: *const f64, lda: usize,
    b: *const f64, ldb: usize, d: *mut f64, ldd: usize
) -> i32 {
    let name = "pblas_dtrmm_lunn";
    if b == d as *const f64 { return bad(name); }
    let (Some(av), Some(bv)) = (view(a,m,m,lda), view(b,m,n,ldb)) else { return bad(name) };
    let Some(mut dv) = view_mut(d,m,n,ldd) else { return bad(name) };
    status(name, trmm_left_upper(alpha, &av, &bv, &mut dv))
}

#[no_mangle]
/// D = alpha*B*A, with A n x n lower triangular and B m x n.  D must not overlap B.
pub unsafe extern "C" fn pblas_dtrmm_rlnn(
    m: usize, n: usize, alpha: f64, b: *const f64, ldb: usize,
    a: *const f64, lda: usize, d: *mut f64, ldd: usize
) -> i32 {
    let name = "pblas_dtrmm_rlnn";
    if b == d as *const f64 { return bad(name); }
    let (Some(av), Some(bv)) = (view(a,n,n,lda), view(b,m,n,ldb)) else { return bad(name) };
    let Some(mut dv) = view_mut(d,m,n,ldd) else { return bad(name) };
    status(name, trmm_right_lower(alpha, &bv, &av, &mut dv))
}

/****************************************************************************
 * Panel matrix handles
 ****************************************************************************/

#[no_mangle]
/// Copy a column-major matrix into a new panel matrix.  Return NULL on failure.
pub unsafe extern "C" fn pblas_panel_from_column_major(
    rows: usize, cols: usize, data: *const f64, ld: usize
) -> *mut DynamicPanelMatrix<f64> {
    let Some(src) = view(data,rows,cols,ld) else {
        bad("pblas_panel_from_column_major");
        return std::ptr::null_mut();
    };
    Box::into_raw(Box::new(DynamicPanelMatrix::from_matrix(&src)))
}

#[no_mangle]
/// Copy a panel matrix out to a column-major buffer with leading dimension ld.
pub unsafe extern "C" fn pblas_panel_to_column_major(
    ptr: NonNull<DynamicPanelMatrix<f64>>, data: *mut f64, ld: usize
) -> i32 {
    let name = "pblas_panel_to_column_major";
    let m = ptr.as_ref();
    let Some(mut dst) = view_mut(data,m.rows(),m.columns(),ld) else { return bad(name) };
    status(name, assign(&mut dst, m))
}

#[no_mangle]
/// Number of rows of a panel matrix
pub unsafe extern "C" fn pblas_panel_rows(ptr: NonNull<DynamicPanelMatrix<f64>>) -> usize {
    ptr.as_ref().rows()
}

#[no_mangle]
/// Number of columns of a panel matrix
pub unsafe extern "C" fn pblas_panel_columns(ptr: NonNull<DynamicPanelMatrix<f64>>) -> usize {
    ptr.as_ref().columns()
}

#[no_mangle]
/// Cholesky-factor a panel matrix in place.  Returns column+1 if it is not positive definite.
pub unsafe extern "C" fn pblas_panel_potrf(mut ptr: NonNull<DynamicPanelMatrix<f64>>) -> i32 {
    status("pblas_panel_potrf", potrf_in_place(ptr.as_mut()))
}

#[no_mangle]
/// Encode to output_buf, if it's big enough.  Return the serialized size of the matrix, in bytes,
/// or 0 if it couldn't be encoded.
pub unsafe extern "C" fn pblas_panel_encode(
    ptr: NonNull<DynamicPanelMatrix<f64>>,
    output_buf: *mut u8,
    output_buf_size: usize
) -> usize {
    let m = ptr.as_ref();
    let required_size = match serialized_size(m, STD_BINCODE_CONFIG) {
        Ok(size) => size,
        Err(e) => { log::warn!("pblas_panel_encode: {}", e); return 0; }
    };
    if required_size <= output_buf_size && !output_buf.is_null() {
        if let Err(e) = encode_into_slice(m, from_raw_parts_mut(output_buf,output_buf_size), STD_BINCODE_CONFIG) {
            log::warn!("pblas_panel_encode: {}", e);
            return 0;
        }
    }
    required_size
}

/**
 * Whether `input` is long enough for the elements its header announces.
 * Checked before decoding, so that a corrupt header can't trigger a huge
 * allocation.
 */
fn header_fits(input:&[u8]) -> bool {
    let elem = core::mem::size_of::<f64>() as u64;
    match decode_from_slice::<(u64,u64,u64),_>(input, STD_BINCODE_CONFIG) {
        Ok(((rows,cols,_height),_)) => rows.checked_mul(cols)
            .and_then(|n| n.checked_mul(elem))
            .map_or(false, |bytes| bytes <= input.len() as u64),
        Err(_) => false
    }
}

#[no_mangle]
/// Decode a panel matrix.  Return NULL on failure.
pub unsafe extern "C" fn pblas_panel_decode(input_buf: *const u8, input_buf_size: usize) -> *mut DynamicPanelMatrix<f64> {
    if input_buf.is_null() {
        bad("pblas_panel_decode");
        return std::ptr::null_mut();
    }
    let input = from_raw_parts(input_buf,input_buf_size);
    if !header_fits(input) {
        log::warn!("pblas_panel_decode: {} byte buffer is too short for its header", input_buf_size);
        return std::ptr::null_mut();
    }
    match decode_from_slice(input, STD_BINCODE_CONFIG) {
        Ok((m,_)) => Box::into_raw(Box::new(m)),
        Err(e) => {
            log::warn!("pblas_panel_decode: {}", e);
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
/// Destroy and free a panel matrix
pub unsafe extern "C" fn pblas_panel_free(ptr: *mut DynamicPanelMatrix<f64>) {
    if !ptr.is_null() { drop(Box::from_raw(ptr)); }
}

#[cfg(test)]
mod tests {
    use crate::cffi::*;
    use crate::testing::{make_positive_definite,random_matrix,reference_gemm,assert_close};
    use crate::tilematrix::matrix::DynamicMatrix;
    use core::ptr::NonNull;

    /** Column-major copy with leading dimension `ld` */
    fn to_buf(m:&DynamicMatrix<f64>, ld:usize) -> Vec<f64> {
        let mut ret = vec![0.0; ld*m.columns()];
        for j in 0..m.columns() { for i in 0..m.rows() { ret[i+j*ld] = m.get(i,j); }}
        ret
    }

    fn from_buf(buf:&[f64], rows:usize, cols:usize, ld:usize) -> DynamicMatrix<f64> {
        DynamicMatrix::from_fn(rows, cols, |i,j| buf[i+j*ld])
    }

    #[test]
    fn dgemm() {
        let (m,n,k) = (7,5,6);
        let a = random_matrix(k, m);
        let b = random_matrix(k, n);
        let c = random_matrix(m, n);
        let (abuf, bbuf, cbuf) = (to_buf(&a, 9), to_buf(&b, 6), to_buf(&c, 8));
        let mut dbuf = vec![0.0; 8*n];
        let r = unsafe { pblas_dgemm(true, false, m, n, k, 2.0, abuf.as_ptr(), 9, bbuf.as_ptr(), 6,
            0.5, cbuf.as_ptr(), 8, dbuf.as_mut_ptr(), 8) };
        assert_eq!(r, 0);
        let expect = reference_gemm(2.0, &a, true, &b, false, 0.5, &c);
        assert_close(&from_buf(&dbuf, m, n, 8), &expect, 1e-12);

        /* In place */
        let mut cbuf = to_buf(&c, 8);
        let cp = cbuf.as_mut_ptr();
        let r = unsafe { pblas_dgemm(true, false, m, n, k, 2.0, abuf.as_ptr(), 9, bbuf.as_ptr(), 6,
            0.5, cp, 8, cp, 8) };
        assert_eq!(r, 0);
        assert_close(&from_buf(&cbuf, m, n, 8), &expect, 1e-12);

        /* Bad leading dimension */
        let r = unsafe { pblas_dgemm(false, false, m, n, k, 1.0, abuf.as_ptr(), 3, bbuf.as_ptr(), 6,
            0.5, cbuf.as_ptr(), 8, dbuf.as_mut_ptr(), 8) };
        assert_eq!(r, -1);
    }

    #[test]
    fn dpotrf_and_solves() {
        let n = 9;
        let a = make_positive_definite(n);
        let abuf = to_buf(&a, 12);
        let mut lbuf = vec![f64::NAN; 12*n];
        assert_eq!(unsafe { pblas_dpotrf_l(n, abuf.as_ptr(), 12, lbuf.as_mut_ptr(), 12) }, 0);
        let l = from_buf(&lbuf, n, n, 12);
        assert_close(&reference_gemm(1.0, &l, false, &l, true, 0.0, &a), &a, 1e-10);

        /* L*Y = B, in place */
        let b = random_matrix(n, 3);
        let mut ybuf = to_buf(&b, n);
        let yp = ybuf.as_mut_ptr();
        assert_eq!(unsafe { pblas_dtrsm_llnn(n, 3, lbuf.as_ptr(), 12, yp, n, yp, n) }, 0);
        let y = from_buf(&ybuf, n, 3, n);
        assert_close(&reference_gemm(1.0, &l, false, &y, false, 0.0, &b), &b, 1e-10);

        /* X*L^T = B */
        let b = random_matrix(3, n);
        let bbuf = to_buf(&b, 3);
        let mut xbuf = vec![0.0; 3*n];
        assert_eq!(unsafe { pblas_dtrsm_rltn(3, n, lbuf.as_ptr(), 12, bbuf.as_ptr(), 3, xbuf.as_mut_ptr(), 3) }, 0);
        let x = from_buf(&xbuf, 3, n, 3);
        assert_close(&reference_gemm(1.0, &x, false, &l, true, 0.0, &b), &b, 1e-10);

        /* In-place potrf, and a failure */
        let mut inplace = to_buf(&a, n);
        let p = inplace.as_mut_ptr();
        assert_eq!(unsafe { pblas_dpotrf_l(n, p, n, p, n) }, 0);
        let mut bad = to_buf(&a, n);
        bad[3 + 3*n] = -1.0;
        let p = bad.as_mut_ptr();
        assert_eq!(unsafe { pblas_dpotrf_l(n, p, n, p, n) }, 4);
    }

    #[test]
    fn syrk_and_trmm() {
        let (n,k) = (6,3);
        let a = random_matrix(n, k);
        let abuf = to_buf(&a, n);
        let mut cbuf = vec![0.0; n*n];
        let cp = cbuf.as_mut_ptr();
        assert_eq!(unsafe { pblas_dsyrk_ln(n, k, 1.0, abuf.as_ptr(), n, 0.0, cp, n, cp, n) }, 0);
        let c = from_buf(&cbuf, n, n, n);
        let full = reference_gemm(1.0, &a, false, &a, true, 0.0, &a);
        for i in 0..n { for j in 0..=i { approx::assert_relative_eq!(c.get(i,j), full.get(i,j), epsilon = 1e-13); }}

        let t = random_matrix(n, n);
        let tbuf = to_buf(&t, n);
        let b = random_matrix(n, 2);
        let bbuf = to_buf(&b, n);
        let mut dbuf = vec![0.0; 2*n];
        assert_eq!(unsafe { pblas_dtrmm_lunn(n, 2, 1.0, tbuf.as_ptr(), n, bbuf.as_ptr(), n, dbuf.as_mut_ptr(), n) }, 0);
        let upper = crate::testing::triangle(&t, false, false);
        assert_close(&from_buf(&dbuf, n, 2, n), &reference_gemm(1.0, &upper, false, &b, false, 0.0, &b), 1e-12);

        let bt = random_matrix(2, n);
        let btbuf = to_buf(&bt, 2);
        let mut dtbuf = vec![0.0; 2*n];
        assert_eq!(unsafe { pblas_dtrmm_rlnn(2, n, 1.0, btbuf.as_ptr(), 2, tbuf.as_ptr(), n, dtbuf.as_mut_ptr(), 2) }, 0);
        let lower = crate::testing::triangle(&t, true, false);
        assert_close(&from_buf(&dtbuf, 2, n, 2), &reference_gemm(1.0, &bt, false, &lower, false, 0.0, &bt), 1e-12);

        let p = dbuf.as_mut_ptr();
        assert_eq!(unsafe { pblas_dtrmm_lunn(n, 2, 1.0, tbuf.as_ptr(), n, p, n, p, n) }, -1);
    }

    #[test]
    fn panel_handles() {
        let n = 10;
        let a = make_positive_definite(n);
        let abuf = to_buf(&a, n);
        unsafe {
            let h = pblas_panel_from_column_major(n, n, abuf.as_ptr(), n);
            let hp = NonNull::new(h).unwrap();
            assert_eq!(pblas_panel_rows(hp), n);
            assert_eq!(pblas_panel_columns(hp), n);
            assert_eq!(pblas_panel_potrf(hp), 0);

            let size = pblas_panel_encode(hp, std::ptr::null_mut(), 0);
            assert!(size > 0);
            let mut bytes = vec![0u8; size];
            assert_eq!(pblas_panel_encode(hp, bytes.as_mut_ptr(), size), size);
            let h2 = pblas_panel_decode(bytes.as_ptr(), size);
            let h2p = NonNull::new(h2).unwrap();

            let mut lbuf = vec![0.0; n*n];
            assert_eq!(pblas_panel_to_column_major(h2p, lbuf.as_mut_ptr(), n), 0);
            let l = from_buf(&lbuf, n, n, n);
            assert_close(&reference_gemm(1.0, &l, false, &l, true, 0.0, &a), &a, 1e-10);

            assert!(pblas_panel_decode(bytes.as_ptr(), size-1).is_null());
            pblas_panel_free(h);
            pblas_panel_free(h2);
            pblas_panel_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn panel_decode_rejects_oversized_headers() {
        let headers : [(u64,u64,u64); 4] = [(1<<40, 1, 4), (1<<60, 4, 4), (u64::MAX, u64::MAX, 4), (3, 3, 4)];
        for header in headers {
            let bytes = bincode::encode_to_vec(header, STD_BINCODE_CONFIG).unwrap();
            assert!(!header_fits(&bytes));
            unsafe { assert!(pblas_panel_decode(bytes.as_ptr(), bytes.len()).is_null()); }
        }
        unsafe { assert!(pblas_panel_decode([0u8; 2].as_ptr(), 2).is_null()); }

        let m = crate::DynamicPanelMatrix::<f64>::from_fn(3, 3, |i,j| (i+j) as f64);
        let bytes = bincode::encode_to_vec(&m, STD_BINCODE_CONFIG).unwrap();
        assert!(header_fits(&bytes));
        unsafe {
            let h = pblas_panel_decode(bytes.as_ptr(), bytes.len());
            assert_eq!(*h, m);
            pblas_panel_free(h);
        }
    }
}
