//! Type specifiers
//!
//! `FLOAT`, `DOUBLE`, `FIXED(N,K)` and `FAST_FIXED(N,K)` name a number
//! representation. A specifier resolves to a [`StorageType`], one member of
//! the closed set of representations the engine is compiled for.

use crate::error::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed type specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericKind {
    Float,
    Double,
    /// Exactly `bits` wide storage, which must be a native width
    Fixed { bits: u32, frac: u32 },
    /// At least `bits` wide, using the fastest native width
    FastFixed { bits: u32, frac: u32 },
}

/// Concrete representation the engine is instantiated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    F32,
    F64,
    /// `Fixed<i32, 16>`
    I32Q16,
    /// `Fixed<i64, 16>`
    I64Q16,
    /// `Fixed<i64, 32>`
    I64Q32,
}

fn unknown(specifier: &str) -> SimulationError {
    SimulationError::UnknownType {
        specifier: specifier.to_string(),
    }
}

/// Parse `PREFIX(N,K)`; `None` when the prefix does not match
fn parse_fixed_args(text: &str, prefix: &str) -> Option<SimResult<(u32, u32)>> {
    let rest = text.strip_prefix(prefix)?;
    let inner = match rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => inner,
        None => return Some(Err(unknown(text))),
    };
    let mut parts = inner.split(',');
    let parsed = match (parts.next(), parts.next(), parts.next()) {
        (Some(n), Some(k), None) => n
            .trim()
            .parse::<u32>()
            .ok()
            .zip(k.trim().parse::<u32>().ok()),
        _ => None,
    };
    Some(parsed.ok_or_else(|| unknown(text)))
}

impl NumericKind {
    /// Parse a specifier string
    pub fn parse(specifier: &str) -> SimResult<Self> {
        let text = specifier.trim();
        match text {
            "FLOAT" => return Ok(NumericKind::Float),
            "DOUBLE" => return Ok(NumericKind::Double),
            _ => {}
        }

        let (kind, bits, frac) = if let Some(args) = parse_fixed_args(text, "FAST_FIXED") {
            let (bits, frac) = args?;
            (NumericKind::FastFixed { bits, frac }, bits, frac)
        } else if let Some(args) = parse_fixed_args(text, "FIXED") {
            let (bits, frac) = args?;
            (NumericKind::Fixed { bits, frac }, bits, frac)
        } else {
            return Err(unknown(text));
        };

        // K must leave at least the sign bit in the storage width
        if bits == 0 || bits > 64 || frac >= kind.storage_bits().unwrap_or(0) {
            return Err(unknown(text));
        }
        Ok(kind)
    }

    /// Native storage width, or `None` when no native width fits
    pub fn storage_bits(&self) -> Option<u32> {
        match *self {
            NumericKind::Float => Some(32),
            NumericKind::Double => Some(64),
            NumericKind::Fixed { bits, .. } => match bits {
                8 | 16 | 32 | 64 => Some(bits),
                _ => None,
            },
            NumericKind::FastFixed { bits, .. } => match bits {
                1..=8 => Some(8),
                9..=64 => Some(64),
                _ => None,
            },
        }
    }

    /// Resolve to a compiled representation
    pub fn storage(&self) -> SimResult<StorageType> {
        let resolved = match *self {
            NumericKind::Float => Some(StorageType::F32),
            NumericKind::Double => Some(StorageType::F64),
            NumericKind::Fixed { frac, .. } | NumericKind::FastFixed { frac, .. } => {
                match (self.storage_bits(), frac) {
                    (Some(32), 16) => Some(StorageType::I32Q16),
                    (Some(64), 16) => Some(StorageType::I64Q16),
                    (Some(64), 32) => Some(StorageType::I64Q32),
                    _ => None,
                }
            }
        };
        resolved.ok_or_else(|| unknown(&self.to_string()))
    }
}

impl FromStr for NumericKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> SimResult<Self> {
        NumericKind::parse(s)
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericKind::Float => write!(f, "FLOAT"),
            NumericKind::Double => write!(f, "DOUBLE"),
            NumericKind::Fixed { bits, frac } => write!(f, "FIXED({},{})", bits, frac),
            NumericKind::FastFixed { bits, frac } => write!(f, "FAST_FIXED({},{})", bits, frac),
        }
    }
}
