//! Numeric value abstraction
//!
//! The simulator is generic over the representation of pressure, velocity
//! and velocity flow. Each representation implements [`Numeric`]; the closed
//! set of supported instantiations is chosen once at startup from textual
//! type specifiers (see [`NumericKind`] and [`StorageType`]).

pub mod fixed;
pub mod float;
pub mod kind;

pub use fixed::{FastFixed32x16, Fixed, Fixed32x16, Fixed64x16, Fixed64x32, RawInt};
pub use kind::{NumericKind, StorageType};

use rand::RngCore;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Capability set the simulation engine needs from a number representation
pub trait Numeric:
    Copy
    + Default
    + Send
    + Sync
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + 'static
{
    /// Build from an integer value
    fn from_int(value: i64) -> Self;

    /// Build from a real value, truncating toward zero for fixed formats
    fn from_f64(value: f64) -> Self;

    /// Real value of this number
    fn to_f64(self) -> f64;

    fn abs(self) -> Self;

    /// Uniform sample in [0, 1] at this representation's resolution; fixed
    /// formats never reach 1
    fn random01<R: RngCore + ?Sized>(rng: &mut R) -> Self;

    /// Raw integer and fractional bit count for fixed-point formats
    fn fixed_parts(self) -> Option<(i128, u32)>;

    /// Build from a raw fixed-point value with `frac_bits` fractional bits
    fn from_fixed_parts(raw: i128, frac_bits: u32) -> Self;

    /// Whether this representation is fixed-point
    fn is_fixed_point() -> bool;

    /// Specifier-style name, e.g. `FIXED(32,16)`
    fn type_label() -> String;

    fn zero() -> Self {
        Self::default()
    }

    /// Convert from any other representation.
    ///
    /// Fixed to fixed shifts by the difference in fractional bits (dropping
    /// low bits without rounding); everything else goes through `f64`.
    fn convert<T: Numeric>(other: T) -> Self {
        match other.fixed_parts() {
            Some((raw, frac_bits)) => Self::from_fixed_parts(raw, frac_bits),
            None => Self::from_f64(other.to_f64()),
        }
    }

    fn min_of(self, other: Self) -> Self {
        if other < self {
            other
        } else {
            self
        }
    }
}
