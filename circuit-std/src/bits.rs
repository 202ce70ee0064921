//! 32-bit words as little-endian vectors of 0/1 field elements.
//!
//! None of the operations here constrain booleanity: words built with
//! [`U32Bits::decompose`] or [`add_mod32`] are range-checked by `to_binary`,
//! words built with [`U32Bits::from_bits`] are trusted as given.

use alloc::vec::Vec;
use core::array;

use ecc_circuit::{CircuitBuilder, CircuitBuilderError, CircuitField, Expression};
use p3_field::PrimeCharacteristicRing;

pub const WORD_BITS: usize = 32;

/// A 32-bit word; `bits[0]` is the least significant bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct U32Bits<F: CircuitField> {
    bits: [Expression<F>; WORD_BITS],
}

impl<F: CircuitField> U32Bits<F> {
    pub fn constant(value: u32) -> Self {
        Self {
            bits: array::from_fn(|i| Expression::constant(F::from_bool((value >> i) & 1 == 1))),
        }
    }

    /// Wraps 32 little-endian bit expressions.
    pub fn from_bits(bits: Vec<Expression<F>>) -> Result<Self, CircuitBuilderError> {
        let actual = bits.len();
        let bits = bits
            .try_into()
            .map_err(|_| CircuitBuilderError::InvalidDimension {
                expected: WORD_BITS,
                actual,
            })?;
        Ok(Self { bits })
    }

    /// Range-checks `value` to 32 bits and splits it.
    pub fn decompose(
        builder: &mut CircuitBuilder<F>,
        value: &Expression<F>,
    ) -> Result<Self, CircuitBuilderError> {
        Self::from_bits(builder.to_binary(value, WORD_BITS)?)
    }

    /// Assembles a word from four bytes given most significant first, each
    /// as 8 little-endian bits.
    pub fn from_be_bytes(bytes: [&[Expression<F>]; 4]) -> Result<Self, CircuitBuilderError> {
        let bits: Vec<_> = bytes.iter().rev().flat_map(|b| b.iter().cloned()).collect();
        Self::from_bits(bits)
    }

    pub fn bits(&self) -> &[Expression<F>; WORD_BITS] {
        &self.bits
    }

    pub fn into_bits(self) -> [Expression<F>; WORD_BITS] {
        self.bits
    }

    /// The word packed into a single field element.
    pub fn value(&self, builder: &CircuitBuilder<F>) -> Expression<F> {
        builder.from_binary(&self.bits)
    }

    /// The four bytes of the word, least significant first.
    pub fn le_bytes(&self, builder: &CircuitBuilder<F>) -> [Expression<F>; 4] {
        array::from_fn(|i| builder.from_binary(&self.bits[8 * i..8 * (i + 1)]))
    }

    /// Rotation towards the least significant bit.
    pub fn rotr(&self, n: usize) -> Self {
        Self {
            bits: array::from_fn(|i| self.bits[(i + n) % WORD_BITS].clone()),
        }
    }

    /// Logical right shift.
    pub fn shr(&self, n: usize) -> Self {
        Self {
            bits: array::from_fn(|i| {
                self.bits
                    .get(i + n)
                    .cloned()
                    .unwrap_or_else(Expression::zero)
            }),
        }
    }

    pub fn not(&self, builder: &CircuitBuilder<F>) -> Self {
        Self {
            bits: array::from_fn(|i| not_bit(builder, &self.bits[i])),
        }
    }

    pub fn xor(&self, builder: &mut CircuitBuilder<F>, other: &Self) -> Self {
        Self {
            bits: array::from_fn(|i| xor_bit(builder, &self.bits[i], &other.bits[i])),
        }
    }

    pub fn and(&self, builder: &mut CircuitBuilder<F>, other: &Self) -> Self {
        Self {
            bits: array::from_fn(|i| and_bit(builder, &self.bits[i], &other.bits[i])),
        }
    }

    /// Per bit: `cond ? then : otherwise`.
    pub fn select(
        builder: &mut CircuitBuilder<F>,
        cond: &Self,
        then: &Self,
        otherwise: &Self,
    ) -> Self {
        Self {
            bits: array::from_fn(|i| {
                select_bit(builder, &cond.bits[i], &then.bits[i], &otherwise.bits[i])
            }),
        }
    }

    /// Per bit: set when at least two of `x`, `y`, `z` are.
    pub fn majority(builder: &mut CircuitBuilder<F>, x: &Self, y: &Self, z: &Self) -> Self {
        Self {
            bits: array::from_fn(|i| {
                let differ = xor_bit(builder, &x.bits[i], &y.bits[i]);
                select_bit(builder, &differ, &z.bits[i], &x.bits[i])
            }),
        }
    }
}

pub(crate) fn not_bit<F: CircuitField>(
    builder: &CircuitBuilder<F>,
    x: &Expression<F>,
) -> Expression<F> {
    builder.sub(&builder.constant(F::ONE), x)
}

/// `x + y - 2xy`; a known constant operand costs nothing.
pub(crate) fn xor_bit<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    x: &Expression<F>,
    y: &Expression<F>,
) -> Expression<F> {
    match (x.constant_value(), y.constant_value()) {
        (Some(c), _) if c == F::ZERO => y.clone(),
        (_, Some(c)) if c == F::ZERO => x.clone(),
        (Some(c), _) if c == F::ONE => not_bit(builder, y),
        (_, Some(c)) if c == F::ONE => not_bit(builder, x),
        _ => {
            let xy = builder.mul(x, y);
            builder.sub(&builder.add(x, y), &xy.scale(F::TWO))
        }
    }
}

pub(crate) fn and_bit<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    x: &Expression<F>,
    y: &Expression<F>,
) -> Expression<F> {
    match (x.constant_value(), y.constant_value()) {
        (Some(c), _) | (_, Some(c)) if c == F::ZERO => Expression::zero(),
        (Some(c), _) if c == F::ONE => y.clone(),
        (_, Some(c)) if c == F::ONE => x.clone(),
        _ => builder.mul(x, y),
    }
}

pub(crate) fn select_bit<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    cond: &Expression<F>,
    then: &Expression<F>,
    otherwise: &Expression<F>,
) -> Expression<F> {
    match cond.constant_value() {
        Some(c) if c == F::ZERO => otherwise.clone(),
        Some(c) if c == F::ONE => then.clone(),
        _ => builder.select(cond, then, otherwise),
    }
}

/// Sum of `words` modulo 2^32.
///
/// The full sum is decomposed with `to_binary` and the carry bits dropped, so
/// the field must hold `32 + ceil(log2(words.len()))` bits.
pub fn add_mod32<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    words: &[&U32Bits<F>],
) -> Result<U32Bits<F>, CircuitBuilderError> {
    let carry_bits = (usize::BITS - words.len().saturating_sub(1).leading_zeros()) as usize;
    let sum = words
        .iter()
        .fold(Expression::zero(), |acc, word| acc.add(&word.value(builder)));
    let mut bits = builder.to_binary(&sum, WORD_BITS + carry_bits)?;
    bits.truncate(WORD_BITS);
    U32Bits::from_bits(bits)
}
