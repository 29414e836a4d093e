//! IEEE float and double representations

use super::Numeric;
use rand::RngCore;

macro_rules! impl_float_numeric {
    ($t:ty, $label:expr) => {
        impl Numeric for $t {
            #[inline(always)]
            fn from_int(value: i64) -> Self {
                value as $t
            }

            #[inline(always)]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline(always)]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            /// Uniform 32-bit draw divided by the generator's maximum, so both
            /// ends of [0, 1] are reachable
            fn random01<G: RngCore + ?Sized>(rng: &mut G) -> Self {
                (rng.next_u32() as f64 / u32::MAX as f64) as $t
            }

            fn fixed_parts(self) -> Option<(i128, u32)> {
                None
            }

            fn from_fixed_parts(raw: i128, frac_bits: u32) -> Self {
                (raw as f64 / (1u128 << frac_bits) as f64) as $t
            }

            fn is_fixed_point() -> bool {
                false
            }

            fn type_label() -> String {
                $label.to_string()
            }
        }
    };
}

impl_float_numeric!(f32, "FLOAT");
impl_float_numeric!(f64, "DOUBLE");

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_float_uniformity() {
        assert_eq!(f32::from_int(3), 3.0);
        assert_eq!(f64::from_f64(-0.125), -0.125);
        assert_eq!(Numeric::abs(-2.0f64), 2.0);
        assert!(f32::fixed_parts(1.0).is_none());
        assert_eq!(f64::from_fixed_parts(3 << 15, 16), 1.5);
    }

    #[test]
    fn test_random01_bounds() {
        let mut rng = StdRng::seed_from_u64(1337);
        for _ in 0..1000 {
            let sample = f64::random01(&mut rng);
            assert!((0.0..=1.0).contains(&sample));
        }
    }

    /// Generator stuck at its maximum output
    struct MaxRng;

    impl RngCore for MaxRng {
        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }

        fn next_u64(&mut self) -> u64 {
            u64::MAX
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0xff);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn test_random01_reaches_one_on_max_draw() {
        assert_eq!(f64::random01(&mut MaxRng), 1.0);
        assert_eq!(f32::random01(&mut MaxRng), 1.0);
    }

    #[test]
    fn test_labels() {
        assert_eq!(f32::type_label(), "FLOAT");
        assert_eq!(f64::type_label(), "DOUBLE");
        assert!(!f64::is_fixed_point());
    }
}
