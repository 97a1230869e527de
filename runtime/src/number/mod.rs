//! The ten scalar encodings the machine can store and operate on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the bytes of a number are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interpretation {
    Unsigned,
    Signed,
    Float,
}

/// One of the supported scalar encodings.
///
/// Exactly one variant exists per supported (interpretation, size) pair;
/// floats only at 4 and 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Sint8,
    Sint16,
    Sint32,
    Sint64,
    Fp32,
    Fp64,
}

impl NumberType {
    /// Every supported encoding, in declaration order.
    pub const ALL: [NumberType; 10] = [
        NumberType::Uint8,
        NumberType::Uint16,
        NumberType::Uint32,
        NumberType::Uint64,
        NumberType::Sint8,
        NumberType::Sint16,
        NumberType::Sint32,
        NumberType::Sint64,
        NumberType::Fp32,
        NumberType::Fp64,
    ];

    /// The integer encodings, in declaration order.
    pub const INTEGERS: [NumberType; 8] = [
        NumberType::Uint8,
        NumberType::Uint16,
        NumberType::Uint32,
        NumberType::Uint64,
        NumberType::Sint8,
        NumberType::Sint16,
        NumberType::Sint32,
        NumberType::Sint64,
    ];

    pub fn size_in_bytes(&self) -> usize {
        match self {
            NumberType::Uint8 | NumberType::Sint8 => 1,
            NumberType::Uint16 | NumberType::Sint16 => 2,
            NumberType::Uint32 | NumberType::Sint32 | NumberType::Fp32 => 4,
            NumberType::Uint64 | NumberType::Sint64 | NumberType::Fp64 => 8,
        }
    }

    pub fn interpretation(&self) -> Interpretation {
        match self {
            NumberType::Uint8 | NumberType::Uint16 | NumberType::Uint32 | NumberType::Uint64 => {
                Interpretation::Unsigned
            }
            NumberType::Sint8 | NumberType::Sint16 | NumberType::Sint32 | NumberType::Sint64 => {
                Interpretation::Signed
            }
            NumberType::Fp32 | NumberType::Fp64 => Interpretation::Float,
        }
    }

    /// Mask covering the value bits of this encoding: `2^(8*size) - 1`.
    pub fn bitmask(&self) -> u64 {
        match self.size_in_bytes() {
            8 => u64::MAX,
            size => (1u64 << (8 * size)) - 1,
        }
    }

    /// Inverse of `(interpretation, size_in_bytes)`. Returns `None` off the
    /// supported grid.
    pub fn from_parts(interpretation: Interpretation, size_in_bytes: usize) -> Option<Self> {
        NumberType::ALL
            .iter()
            .copied()
            .find(|ty| ty.interpretation() == interpretation && ty.size_in_bytes() == size_in_bytes)
    }

    pub fn is_integer(&self) -> bool {
        self.interpretation() != Interpretation::Float
    }
}

impl fmt::Display for NumberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumberType::Uint8 => "u8",
            NumberType::Uint16 => "u16",
            NumberType::Uint32 => "u32",
            NumberType::Uint64 => "u64",
            NumberType::Sint8 => "s8",
            NumberType::Sint16 => "s16",
            NumberType::Sint32 => "s32",
            NumberType::Sint64 => "s64",
            NumberType::Fp32 => "f32",
            NumberType::Fp64 => "f64",
        };
        write!(f, "{}", name)
    }
}

/// A runtime value, tagged by interpretation.
///
/// The width is carried by the `NumberType` the value travels with; the
/// payload is always the widest native representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Number {
    /// Raw bit pattern for integer storage; floats truncate toward zero.
    pub fn to_u64(&self) -> u64 {
        match *self {
            Number::Unsigned(value) => value,
            Number::Signed(value) => value as u64,
            Number::Float(value) => value as u64,
        }
    }

    pub fn to_i64(&self) -> i64 {
        match *self {
            Number::Unsigned(value) => value as i64,
            Number::Signed(value) => value,
            Number::Float(value) => value as i64,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match *self {
            Number::Unsigned(value) => value as f64,
            Number::Signed(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Number::Unsigned(value) => value == 0,
            Number::Signed(value) => value == 0,
            Number::Float(value) => value == 0.0,
        }
    }

    /// Reinterpret this value under another encoding's interpretation.
    ///
    /// Value-preserving where representable; float-to-int truncates toward
    /// zero. Width truncation happens when the value is written through a
    /// memory buffer, not here.
    pub fn cast_to(&self, target: NumberType) -> Number {
        match target.interpretation() {
            Interpretation::Unsigned => Number::Unsigned(self.to_u64()),
            Interpretation::Signed => Number::Signed(self.to_i64()),
            Interpretation::Float => Number::Float(self.to_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Unsigned(value) => write!(f, "{}", value),
            Number::Signed(value) => write!(f, "{}", value),
            Number::Float(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_variant_per_supported_pair() {
        for ty in NumberType::ALL {
            let found = NumberType::from_parts(ty.interpretation(), ty.size_in_bytes());
            assert_eq!(found, Some(ty));
        }
    }

    #[test]
    fn test_floats_only_at_four_and_eight() {
        assert_eq!(NumberType::from_parts(Interpretation::Float, 1), None);
        assert_eq!(NumberType::from_parts(Interpretation::Float, 2), None);
        assert_eq!(
            NumberType::from_parts(Interpretation::Float, 4),
            Some(NumberType::Fp32)
        );
        assert_eq!(
            NumberType::from_parts(Interpretation::Float, 8),
            Some(NumberType::Fp64)
        );
    }

    #[test]
    fn test_bitmasks() {
        assert_eq!(NumberType::Uint8.bitmask(), 0xFF);
        assert_eq!(NumberType::Sint16.bitmask(), 0xFFFF);
        assert_eq!(NumberType::Uint32.bitmask(), 0xFFFF_FFFF);
        assert_eq!(NumberType::Fp32.bitmask(), 0xFFFF_FFFF);
        assert_eq!(NumberType::Sint64.bitmask(), u64::MAX);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(NumberType::Uint8.size_in_bytes(), 1);
        assert_eq!(NumberType::Sint16.size_in_bytes(), 2);
        assert_eq!(NumberType::Fp32.size_in_bytes(), 4);
        assert_eq!(NumberType::Uint64.size_in_bytes(), 8);
    }

    #[test]
    fn test_cast_identity() {
        for ty in NumberType::ALL {
            let value = match ty.interpretation() {
                Interpretation::Unsigned => Number::Unsigned(42),
                Interpretation::Signed => Number::Signed(-42),
                Interpretation::Float => Number::Float(42.5),
            };
            assert_eq!(value.cast_to(ty), value);
        }
    }

    #[test]
    fn test_cast_float_to_int_truncates_toward_zero() {
        assert_eq!(Number::Float(52.4).cast_to(NumberType::Sint32), Number::Signed(52));
        assert_eq!(Number::Float(-52.9).cast_to(NumberType::Sint32), Number::Signed(-52));
    }

    #[test]
    fn test_cast_int_to_float() {
        assert_eq!(Number::Signed(-3).cast_to(NumberType::Fp64), Number::Float(-3.0));
        assert_eq!(Number::Unsigned(7).cast_to(NumberType::Fp32), Number::Float(7.0));
    }

    #[test]
    fn test_unsigned_float_round_trip_below_2_53() {
        let exact = (1u64 << 53) - 1;
        let through = Number::Unsigned(exact).cast_to(NumberType::Fp64);
        assert_eq!(through.cast_to(NumberType::Uint64), Number::Unsigned(exact));
    }

    #[test]
    fn test_is_zero() {
        assert!(Number::Unsigned(0).is_zero());
        assert!(Number::Float(0.0).is_zero());
        assert!(!Number::Signed(-1).is_zero());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(NumberType::Uint8.to_string(), "u8");
        assert_eq!(NumberType::Fp64.to_string(), "f64");
        assert_eq!(NumberType::Sint32.to_string(), "s32");
    }
}
