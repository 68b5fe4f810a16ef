/*
 * @file simd.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Scalar types and the SIMD registers that hold them.  Registers are
 * 256 bits wide: 4 doubles or 8 floats.  The arithmetic is done in
 * the `vectorized` module, which uses AVX2+FMA intrinsics when the
 * target has them and plain lane loops (which the compiler is usually
 * smart enough to vectorize) otherwise.
 */

use bincode::Encode;
use bytemuck::{Pod,Zeroable};
use num_traits::{Float,NumAssign};
use rand::distributions::uniform::SampleUniform;
use std::fmt::Debug;

/** A SIMD register of floating-point lanes. */
pub trait SimdVec : Copy + Pod + Debug + PartialEq + Send + Sync + 'static {
    /** Type of one lane */
    type Elem : Copy;

    /** Number of lanes */
    const LANES: usize;

    fn zero() -> Self;
    fn splat(x:Self::Elem) -> Self;

    /** Load the first `LANES` elements of `src` */
    fn load(src:&[Self::Elem]) -> Self;

    /** Store to the first `LANES` elements of `dst` */
    fn store(self, dst:&mut [Self::Elem]);

    fn lane(self, i:usize) -> Self::Elem;
    fn set_lane(&mut self, i:usize, x:Self::Elem);

    fn add(self, b:Self) -> Self;
    fn sub(self, b:Self) -> Self;
    fn mul(self, b:Self) -> Self;

    /** self*b + c */
    fn fmadd(self, b:Self, c:Self) -> Self;

    /** c - self*b */
    fn fnmadd(self, b:Self, c:Self) -> Self;
}

/**
 * Element types the kernels work over.  Implemented for `f32` and `f64`.
 */
pub trait Scalar : Float + NumAssign + Pod + Default + Debug + SampleUniform + Encode + Send + Sync + 'static {
    /** The SIMD register for this type */
    type Simd : SimdVec<Elem=Self>;

    /** Lanes per register, i.e. `Self::Simd::LANES` */
    const LANES: usize;
}

/** Round `x` up to a multiple of `m` */
#[inline(always)]
pub const fn next_multiple(x:usize, m:usize) -> usize {
    (x + m - 1) / m * m
}

/** Round `x` up to a multiple of `m`, or `None` on overflow */
#[inline(always)]
pub const fn checked_next_multiple(x:usize, m:usize) -> Option<usize> {
    match x.checked_add(m - 1) {
        Some(y) => Some(y / m * m),
        None => None
    }
}

macro_rules! simd_register {
    ($name:ident, $t:ty, $lanes:expr, $add:ident, $sub:ident, $mul:ident, $fmadd:ident, $fnmadd:ident) => {
        #[derive(Clone,Copy,Debug,PartialEq)]
        #[repr(C, align(32))]
        pub struct $name(pub [$t; $lanes]);

        // SAFETY: a bare array of floats that exactly fills its alignment, so no padding.
        unsafe impl Zeroable for $name {}
        unsafe impl Pod for $name {}

        impl SimdVec for $name {
            type Elem = $t;
            const LANES: usize = $lanes;

            #[inline(always)]
            fn zero() -> Self { $name([0.0; $lanes]) }

            #[inline(always)]
            fn splat(x:$t) -> Self { $name([x; $lanes]) }

            #[inline(always)]
            fn load(src:&[$t]) -> Self {
                let mut ret = [0.0; $lanes];
                ret.copy_from_slice(&src[..$lanes]);
                $name(ret)
            }

            #[inline(always)]
            fn store(self, dst:&mut [$t]) { dst[..$lanes].copy_from_slice(&self.0); }

            #[inline(always)]
            fn lane(self, i:usize) -> $t { self.0[i] }

            #[inline(always)]
            fn set_lane(&mut self, i:usize, x:$t) { self.0[i] = x; }

            #[inline(always)]
            fn add(self, b:Self) -> Self { vectorized::$add(self,b) }

            #[inline(always)]
            fn sub(self, b:Self) -> Self { vectorized::$sub(self,b) }

            #[inline(always)]
            fn mul(self, b:Self) -> Self { vectorized::$mul(self,b) }

            #[inline(always)]
            fn fmadd(self, b:Self, c:Self) -> Self { vectorized::$fmadd(self,b,c) }

            #[inline(always)]
            fn fnmadd(self, b:Self, c:Self) -> Self { vectorized::$fnmadd(self,b,c) }
        }
    }
}

simd_register!(F64x4, f64, 4, add_pd, sub_pd, mul_pd, fmadd_pd, fnmadd_pd);
simd_register!(F32x8, f32, 8, add_ps, sub_ps, mul_ps, fmadd_ps, fnmadd_ps);

impl Scalar for f64 {
    type Simd = F64x4;
    const LANES: usize = 4;
}

impl Scalar for f32 {
    type Simd = F32x8;
    const LANES: usize = 8;
}

/**************************************************************************
 * Per-architecture register arithmetic
 **************************************************************************/

#[cfg(not(all(target_arch="x86_64", target_feature="avx2", target_feature="fma")))]
pub mod vectorized {
    use crate::simd::{F64x4,F32x8};

    macro_rules! lanewise2 {
        ($fn:ident, $ty:ident, $lanes:expr, $op:tt) => {
            #[inline(always)]
            pub fn $fn(a:$ty, b:$ty) -> $ty {
                let mut ret = a;
                for i in 0..$lanes { ret.0[i] = a.0[i] $op b.0[i]; }
                ret
            }
        }
    }

    lanewise2!(add_pd, F64x4, 4, +);
    lanewise2!(sub_pd, F64x4, 4, -);
    lanewise2!(mul_pd, F64x4, 4, *);
    lanewise2!(add_ps, F32x8, 8, +);
    lanewise2!(sub_ps, F32x8, 8, -);
    lanewise2!(mul_ps, F32x8, 8, *);

    /* PERF: not fused.  `mul_add` is a libm call when the target lacks FMA. */
    #[inline(always)]
    pub fn fmadd_pd(a:F64x4, b:F64x4, c:F64x4) -> F64x4 {
        let mut ret = c;
        for i in 0..4 { ret.0[i] = a.0[i]*b.0[i] + c.0[i]; }
        ret
    }

    #[inline(always)]
    pub fn fnmadd_pd(a:F64x4, b:F64x4, c:F64x4) -> F64x4 {
        let mut ret = c;
        for i in 0..4 { ret.0[i] = c.0[i] - a.0[i]*b.0[i]; }
        ret
    }

    #[inline(always)]
    pub fn fmadd_ps(a:F32x8, b:F32x8, c:F32x8) -> F32x8 {
        let mut ret = c;
        for i in 0..8 { ret.0[i] = a.0[i]*b.0[i] + c.0[i]; }
        ret
    }

    #[inline(always)]
    pub fn fnmadd_ps(a:F32x8, b:F32x8, c:F32x8) -> F32x8 {
        let mut ret = c;
        for i in 0..8 { ret.0[i] = c.0[i] - a.0[i]*b.0[i]; }
        ret
    }
}

#[cfg(all(target_arch="x86_64", target_feature="avx2", target_feature="fma"))]
pub mod vectorized {
    use crate::simd::{F64x4,F32x8};
    use core::arch::x86_64::*;

    #[inline(always)]
    fn pd(a:F64x4) -> __m256d { unsafe { _mm256_load_pd(a.0.as_ptr()) } }

    #[inline(always)]
    fn from_pd(r:__m256d) -> F64x4 {
        let mut ret = F64x4([0.0;4]);
        unsafe { _mm256_store_pd(ret.0.as_mut_ptr(), r); }
        ret
    }

    #[inline(always)]
    fn ps(a:F32x8) -> __m256 { unsafe { _mm256_load_ps(a.0.as_ptr()) } }

    #[inline(always)]
    fn from_ps(r:__m256) -> F32x8 {
        let mut ret = F32x8([0.0;8]);
        unsafe { _mm256_store_ps(ret.0.as_mut_ptr(), r); }
        ret
    }

    #[inline(always)]
    pub fn add_pd(a:F64x4, b:F64x4) -> F64x4 { from_pd(unsafe { _mm256_add_pd(pd(a),pd(b)) }) }
    #[inline(always)]
    pub fn sub_pd(a:F64x4, b:F64x4) -> F64x4 { from_pd(unsafe { _mm256_sub_pd(pd(a),pd(b)) }) }
    #[inline(always)]
    pub fn mul_pd(a:F64x4, b:F64x4) -> F64x4 { from_pd(unsafe { _mm256_mul_pd(pd(a),pd(b)) }) }
    #[inline(always)]
    pub fn fmadd_pd(a:F64x4, b:F64x4, c:F64x4) -> F64x4 {
        from_pd(unsafe { _mm256_fmadd_pd(pd(a),pd(b),pd(c)) })
    }
    #[inline(always)]
    pub fn fnmadd_pd(a:F64x4, b:F64x4, c:F64x4) -> F64x4 {
        from_pd(unsafe { _mm256_fnmadd_pd(pd(a),pd(b),pd(c)) })
    }

    #[inline(always)]
    pub fn add_ps(a:F32x8, b:F32x8) -> F32x8 { from_ps(unsafe { _mm256_add_ps(ps(a),ps(b)) }) }
    #[inline(always)]
    pub fn sub_ps(a:F32x8, b:F32x8) -> F32x8 { from_ps(unsafe { _mm256_sub_ps(ps(a),ps(b)) }) }
    #[inline(always)]
    pub fn mul_ps(a:F32x8, b:F32x8) -> F32x8 { from_ps(unsafe { _mm256_mul_ps(ps(a),ps(b)) }) }
    #[inline(always)]
    pub fn fmadd_ps(a:F32x8, b:F32x8, c:F32x8) -> F32x8 {
        from_ps(unsafe { _mm256_fmadd_ps(ps(a),ps(b),ps(c)) })
    }
    #[inline(always)]
    pub fn fnmadd_ps(a:F32x8, b:F32x8, c:F32x8) -> F32x8 {
        from_ps(unsafe { _mm256_fnmadd_ps(ps(a),ps(b),ps(c)) })
    }
}

#[cfg(test)]
mod tests {
    use crate::simd::{SimdVec,F64x4,F32x8,next_multiple,checked_next_multiple};
    use rand::{Rng,thread_rng};

    #[test]
    fn rounding() {
        assert_eq!(next_multiple(0,4), 0);
        assert_eq!(next_multiple(1,4), 4);
        assert_eq!(next_multiple(4,4), 4);
        assert_eq!(next_multiple(13,8), 16);
        assert_eq!(checked_next_multiple(13,8), Some(16));
        assert_eq!(checked_next_multiple(usize::MAX-7,8), Some(usize::MAX-7));
        assert_eq!(checked_next_multiple(usize::MAX,4), None);
    }

    #[test]
    fn lanes_match_scalar_arithmetic() {
        for _ in 0..100 {
            let mut a = [0.0f64;4]; let mut b = [0.0f64;4]; let mut c = [0.0f64;4];
            for i in 0..4 {
                a[i] = thread_rng().gen_range(-1.0..1.0);
                b[i] = thread_rng().gen_range(-1.0..1.0);
                c[i] = thread_rng().gen_range(-1.0..1.0);
            }
            let (va,vb,vc) = (F64x4::load(&a), F64x4::load(&b), F64x4::load(&c));
            for i in 0..4 {
                assert_eq!(va.add(vb).lane(i), a[i]+b[i]);
                assert_eq!(va.sub(vb).lane(i), a[i]-b[i]);
                assert_eq!(va.mul(vb).lane(i), a[i]*b[i]);
                assert!((va.fmadd(vb,vc).lane(i) - (a[i]*b[i]+c[i])).abs() < 1e-15);
                assert!((va.fnmadd(vb,vc).lane(i) - (c[i]-a[i]*b[i])).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn load_store_lanes() {
        let src : Vec<f32> = (0..10).map(|x| x as f32).collect();
        let v = F32x8::load(&src[2..]);
        for i in 0..8 { assert_eq!(v.lane(i), (i+2) as f32); }
        let mut dst = [0.0f32; 9];
        let mut w = v;
        w.set_lane(3, -1.0);
        w.store(&mut dst[1..]);
        assert_eq!(dst[0], 0.0);
        assert_eq!(dst[4], -1.0);
        assert_eq!(dst[8], 9.0);
        assert_eq!(F32x8::splat(2.5).lane(7), 2.5);
        assert_eq!(F32x8::zero(), F32x8::splat(0.0));
    }
}
