//! Scalar fields a circuit can be instantiated over.
//!
//! The arithmetic itself comes from Plonky3: [`Bn254`] is the Montgomery-form
//! BN254 scalar field and [`Mersenne31`] is the small field `2^31 - 1`. This
//! module adds the pieces the compiler needs on top of `p3_field`: a runtime
//! tag with a stable on-disk id, modulus-based selection, and the fixed-length
//! canonical byte form used by every codec.

use alloc::vec::Vec;
use core::fmt;
use core::hash::Hash;

use num_bigint::BigUint;
pub use p3_bn254::Bn254;
use p3_field::{Field, PrimeCharacteristicRing, PrimeField};
pub use p3_mersenne_31::Mersenne31;

use crate::CircuitError;

/// Runtime tag for the closed set of supported fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    /// BN254 scalar field, 254 bits.
    Bn254,
    /// Mersenne prime `2^31 - 1`.
    Mersenne31,
}

impl FieldKind {
    pub const ALL: [Self; 2] = [Self::Bn254, Self::Mersenne31];

    /// Stable identifier written into serialized artifacts.
    pub const fn id(self) -> u8 {
        match self {
            Self::Bn254 => 1,
            Self::Mersenne31 => 2,
        }
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Bn254),
            2 => Some(Self::Mersenne31),
            _ => None,
        }
    }

    pub fn modulus(self) -> BigUint {
        match self {
            Self::Bn254 => Bn254::order(),
            Self::Mersenne31 => Mersenne31::order(),
        }
    }

    /// Bit length of the modulus.
    pub fn bits(self) -> usize {
        match self {
            Self::Bn254 => Bn254::bits(),
            Self::Mersenne31 => Mersenne31::bits(),
        }
    }

    /// Length of the canonical byte form, `ceil(bits / 8)`.
    pub fn byte_len(self) -> usize {
        self.bits().div_ceil(8)
    }

    /// Selects the backend whose modulus is exactly `modulus`.
    pub fn from_modulus(modulus: &BigUint) -> Result<Self, CircuitError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.modulus() == *modulus)
            .ok_or_else(|| CircuitError::UnknownField {
                modulus: modulus.clone(),
            })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bn254 => write!(f, "BN254"),
            Self::Mersenne31 => write!(f, "M31"),
        }
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Bn254 {}
    impl Sealed for super::Mersenne31 {}
}

/// Field operations required by the IR, the solver and the codecs.
///
/// Implemented only for the backends listed in [`FieldKind`]; code that is
/// generic over `F: CircuitField` is monomorphised per field so the hot loops
/// never dispatch dynamically.
pub trait CircuitField: PrimeField + Hash + Send + Sync + 'static + sealed::Sealed {
    const KIND: FieldKind;

    /// Length of the canonical byte form.
    fn byte_len() -> usize {
        Self::KIND.byte_len()
    }

    /// Little-endian canonical representative, zero-padded to [`Self::byte_len`].
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = self.as_canonical_biguint().to_bytes_le();
        bytes.resize(Self::byte_len(), 0);
        bytes
    }

    /// Inverse of [`Self::to_canonical_bytes`]. Rejects wrong lengths and
    /// values that are not reduced modulo `p`.
    fn from_canonical_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::byte_len() {
            return None;
        }
        let value = BigUint::from_bytes_le(bytes);
        if value >= Self::order() {
            return None;
        }
        Some(Self::from_biguint(&value))
    }

    /// Reduces an arbitrary-precision integer modulo `p`.
    fn from_biguint(value: &BigUint) -> Self {
        let base = Self::from_u64(1 << 32).square();
        value
            .to_u64_digits()
            .iter()
            .rev()
            .fold(Self::ZERO, |acc, &digit| acc * base + Self::from_u64(digit))
    }

    /// Maps a signed integer to the field, negatives wrapping around `p`.
    fn from_i64(value: i64) -> Self {
        let magnitude = Self::from_u64(value.unsigned_abs());
        if value < 0 { -magnitude } else { magnitude }
    }
}

impl CircuitField for Bn254 {
    const KIND: FieldKind = FieldKind::Bn254;
}

impl CircuitField for Mersenne31 {
    const KIND: FieldKind = FieldKind::Mersenne31;
}
