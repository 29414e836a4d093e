//! Fixed-point numbers
//!
//! `Fixed<R, K>` stores a real value `x` as the integer `x * 2^K` in the
//! native signed integer `R`. Intermediate products and quotients are
//! widened to `i128`; results are truncated back to `R`, so overflow of the
//! storage width wraps. Pick a width large enough for the grid's scale.

use super::Numeric;
use rand::RngCore;
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Native signed integer usable as fixed-point storage
pub trait RawInt: Copy + Default + Send + Sync + Ord + Hash + fmt::Debug + 'static {
    const BITS: u32;

    fn to_i128(self) -> i128;

    /// Truncate to this width
    fn wrap(value: i128) -> Self;
}

macro_rules! impl_raw_int {
    ($($t:ty),*) => {
        $(
            impl RawInt for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline(always)]
                fn to_i128(self) -> i128 {
                    self as i128
                }

                #[inline(always)]
                fn wrap(value: i128) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_raw_int!(i8, i16, i32, i64);

/// Q(N, K) fixed-point value with storage `R` and `K` fractional bits
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Fixed<R: RawInt, const K: u32> {
    raw: R,
}

/// `FIXED(32,16)`
pub type Fixed32x16 = Fixed<i32, 16>;
/// `FIXED(64,32)` and `FAST_FIXED(64,32)`
pub type Fixed64x32 = Fixed<i64, 32>;
/// `FIXED(64,16)`
pub type Fixed64x16 = Fixed<i64, 16>;
/// `FAST_FIXED(32,16)` resolves to the platform's fast 64-bit storage
pub type FastFixed32x16 = Fixed64x16;

impl<R: RawInt, const K: u32> Fixed<R, K> {
    #[inline(always)]
    pub fn raw(self) -> R {
        self.raw
    }

    #[inline(always)]
    fn wide(self) -> i128 {
        self.raw.to_i128()
    }

    #[inline(always)]
    fn from_wide(value: i128) -> Self {
        Self { raw: R::wrap(value) }
    }

    fn scale() -> f64 {
        (1u128 << K) as f64
    }
}

impl<R: RawInt, const K: u32> PartialOrd for Fixed<R, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R: RawInt, const K: u32> Ord for Fixed<R, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<R: RawInt, const K: u32> Add for Fixed<R, K> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_wide(self.wide() + rhs.wide())
    }
}

impl<R: RawInt, const K: u32> Sub for Fixed<R, K> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_wide(self.wide() - rhs.wide())
    }
}

impl<R: RawInt, const K: u32> Mul for Fixed<R, K> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::from_wide((self.wide() * rhs.wide()) >> K)
    }
}

impl<R: RawInt, const K: u32> Div for Fixed<R, K> {
    type Output = Self;

    /// Division by a zero raw value yields zero.
    fn div(self, rhs: Self) -> Self {
        let divisor = rhs.wide();
        if divisor == 0 {
            return Self::default();
        }
        Self::from_wide((self.wide() << K) / divisor)
    }
}

impl<R: RawInt, const K: u32> Neg for Fixed<R, K> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::from_wide(-self.wide())
    }
}

impl<R: RawInt, const K: u32> AddAssign for Fixed<R, K> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<R: RawInt, const K: u32> SubAssign for Fixed<R, K> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<R: RawInt, const K: u32> MulAssign for Fixed<R, K> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<R: RawInt, const K: u32> fmt::Display for Fixed<R, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl<R: RawInt, const K: u32> fmt::Debug for Fixed<R, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", Self::type_label(), self.to_f64())
    }
}

impl<R: RawInt, const K: u32> Numeric for Fixed<R, K> {
    fn from_int(value: i64) -> Self {
        Self::from_wide((value as i128) << K)
    }

    fn from_f64(value: f64) -> Self {
        // `as` truncates toward zero and saturates at the i128 bounds
        Self::from_wide((value * Self::scale()) as i128)
    }

    fn to_f64(self) -> f64 {
        self.wide() as f64 / Self::scale()
    }

    fn abs(self) -> Self {
        if self.wide() < 0 {
            -self
        } else {
            self
        }
    }

    fn random01<G: RngCore + ?Sized>(rng: &mut G) -> Self {
        let mask = (1u64 << K) - 1;
        Self::from_wide((rng.next_u64() & mask) as i128)
    }

    fn fixed_parts(self) -> Option<(i128, u32)> {
        Some((self.wide(), K))
    }

    fn from_fixed_parts(raw: i128, frac_bits: u32) -> Self {
        if frac_bits > K {
            Self::from_wide(raw >> (frac_bits - K))
        } else {
            Self::from_wide(raw << (K - frac_bits))
        }
    }

    fn is_fixed_point() -> bool {
        true
    }

    fn type_label() -> String {
        format!("FIXED({},{})", R::BITS, K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_integer_construction_shifts() {
        let three = Fixed32x16::from_int(3);
        assert_eq!(three.raw(), 3 << 16);
        assert_eq!(three.to_f64(), 3.0);
    }

    #[test]
    fn test_float_construction_truncates() {
        // 1/3 * 2^16 = 21845.33..
        assert_eq!(Fixed32x16::from_f64(1.0 / 3.0).raw(), 21845);
        assert_eq!(Fixed32x16::from_f64(-1.0 / 3.0).raw(), -21845);
    }

    #[test]
    fn test_arithmetic() {
        let a = Fixed32x16::from_f64(1.5);
        let b = Fixed32x16::from_f64(0.25);
        assert_eq!((a + b).to_f64(), 1.75);
        assert_eq!((a - b).to_f64(), 1.25);
        assert_eq!((a * b).to_f64(), 0.375);
        assert_eq!((a / b).to_f64(), 6.0);
        assert_eq!((-a).to_f64(), -1.5);

        let mut c = a;
        c += b;
        c *= Fixed32x16::from_int(2);
        c -= Fixed32x16::from_int(1);
        assert_eq!(c.to_f64(), 2.5);
    }

    #[test]
    fn test_wide_multiplication_does_not_overflow_intermediate() {
        // raw values near 2^40 would overflow a plain i64 product
        let a = Fixed64x32::from_int(300);
        let b = Fixed64x32::from_int(200);
        assert_eq!((a * b).to_f64(), 60000.0);
        assert_eq!((a / b).to_f64(), 1.5);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        let a = Fixed32x16::from_int(5);
        assert_eq!(a / Fixed32x16::zero(), Fixed32x16::zero());
    }

    #[test]
    fn test_ordering_and_abs() {
        let neg = Fixed32x16::from_f64(-0.5);
        let pos = Fixed32x16::from_f64(0.25);
        assert!(neg < pos);
        assert_eq!(neg.abs().to_f64(), 0.5);
        assert_eq!(pos.abs(), pos);
    }

    #[test]
    fn test_random01_stays_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let one = Fixed32x16::from_int(1);
        for _ in 0..1000 {
            let sample = Fixed32x16::random01(&mut rng);
            assert!(sample >= Fixed32x16::zero());
            assert!(sample < one);
        }
    }

    #[test]
    fn test_type_label() {
        assert_eq!(Fixed32x16::type_label(), "FIXED(32,16)");
        assert_eq!(FastFixed32x16::type_label(), "FIXED(64,16)");
    }
}
