//! SHA-256 over a fixed-length byte message.
//!
//! Words are [`U32Bits`]; rotations and shifts are free, bitwise functions
//! cost one multiplication per bit and additions go through [`add_mod32`].
//! The message length is known when the circuit is built, so padding is
//! appended as constant bits. Additions need 35-bit decompositions, which
//! rules out Mersenne31.

use alloc::vec;
use alloc::vec::Vec;

use ecc_circuit::{CircuitBuilder, CircuitBuilderError, CircuitField, Define, Expression};
use itertools::Itertools;
use p3_field::PrimeCharacteristicRing;
use tracing::instrument;

use crate::bits::{U32Bits, add_mod32};

pub const BLOCK_BYTES: usize = 64;
pub const DIGEST_WORDS: usize = 8;

const IV: [u32; DIGEST_WORDS] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

/// Hashes `message_len` input bytes.
///
/// Each input is range-checked to a byte. The 32 outputs are the digest
/// bytes, word by word, with each 4-byte word in little-endian order:
/// output `4i + j` is digest byte `4i + 3 - j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sha256Circuit {
    message_len: usize,
}

impl Sha256Circuit {
    pub const fn new(message_len: usize) -> Self {
        Self { message_len }
    }

    pub const fn message_len(&self) -> usize {
        self.message_len
    }
}

impl<F: CircuitField> Define<F> for Sha256Circuit {
    fn num_inputs(&self) -> usize {
        self.message_len
    }

    fn define(&self, builder: &mut CircuitBuilder<F>) -> Result<(), CircuitBuilderError> {
        let message = builder.inputs();
        let digest = sha256(builder, &message)?;
        for word in &digest {
            for byte in word.le_bytes(builder) {
                builder.output(&byte);
            }
        }
        Ok(())
    }
}

/// Digest of `message`, one expression per byte, as eight words.
#[instrument(skip_all, fields(bytes = message.len()))]
pub fn sha256<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    message: &[Expression<F>],
) -> Result<Vec<U32Bits<F>>, CircuitBuilderError> {
    let mut bytes = Vec::with_capacity(padded_len(message.len()));
    for byte in message {
        bytes.push(builder.to_binary(byte, 8)?);
    }
    bytes.extend(padding(message.len()).into_iter().map(constant_byte));

    let mut state: Vec<_> = IV.iter().map(|&word| U32Bits::constant(word)).collect();
    for block in bytes.chunks_exact(BLOCK_BYTES) {
        let mut words = Vec::with_capacity(16);
        for be in block.chunks_exact(4) {
            let be = [be[0].as_slice(), be[1].as_slice(), be[2].as_slice(), be[3].as_slice()];
            words.push(U32Bits::from_be_bytes(be)?);
        }
        state = compress(builder, &state, words)?;
    }
    Ok(state)
}

const fn padded_len(len: usize) -> usize {
    (len + 9).div_ceil(BLOCK_BYTES) * BLOCK_BYTES
}

/// `0x80`, zeros, then the bit length as a big-endian u64.
fn padding(len: usize) -> Vec<u8> {
    let mut pad = vec![0u8; padded_len(len) - len];
    pad[0] = 0x80;
    let bit_len = (len as u64).wrapping_mul(8).to_be_bytes();
    let tail = pad.len() - 8;
    pad[tail..].copy_from_slice(&bit_len);
    pad
}

fn constant_byte<F: CircuitField>(value: u8) -> Vec<Expression<F>> {
    (0..8)
        .map(|i| Expression::constant(F::from_bool((value >> i) & 1 == 1)))
        .collect()
}

fn compress<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    state: &[U32Bits<F>],
    block: Vec<U32Bits<F>>,
) -> Result<Vec<U32Bits<F>>, CircuitBuilderError> {
    let mut w = block;
    for t in 16..64 {
        let s0 = small_sigma_0(builder, &w[t - 15]);
        let s1 = small_sigma_1(builder, &w[t - 2]);
        let next = add_mod32(builder, &[&w[t - 16], &s0, &w[t - 7], &s1])?;
        w.push(next);
    }

    let mut v = state.to_vec();
    for (t, w_t) in w.iter().enumerate() {
        let [a, b, c, d, e, f, g, h] = [0, 1, 2, 3, 4, 5, 6, 7].map(|i| &v[i]);

        let sigma_e = big_sigma_1(builder, e);
        let ch_efg = U32Bits::select(builder, e, f, g);
        let k = U32Bits::constant(K[t]);
        let sigma_a = big_sigma_0(builder, a);
        let maj_abc = U32Bits::majority(builder, a, b, c);

        // T1 = h + Σ1(e) + Ch(e, f, g) + K[t] + W[t], T2 = Σ0(a) + Maj(a, b, c).
        let new_e = add_mod32(builder, &[h, &sigma_e, &ch_efg, &k, w_t, d])?;
        let new_a = add_mod32(builder, &[h, &sigma_e, &ch_efg, &k, w_t, &sigma_a, &maj_abc])?;

        v.rotate_right(1);
        v[0] = new_a;
        v[4] = new_e;
    }

    state
        .iter()
        .zip_eq(&v)
        .map(|(init, word)| add_mod32(builder, &[init, word]))
        .collect()
}

fn xor3<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    x: &U32Bits<F>,
    y: &U32Bits<F>,
    z: &U32Bits<F>,
) -> U32Bits<F> {
    let xy = x.xor(builder, y);
    xy.xor(builder, z)
}

fn big_sigma_0<F: CircuitField>(builder: &mut CircuitBuilder<F>, x: &U32Bits<F>) -> U32Bits<F> {
    xor3(builder, &x.rotr(2), &x.rotr(13), &x.rotr(22))
}

fn big_sigma_1<F: CircuitField>(builder: &mut CircuitBuilder<F>, x: &U32Bits<F>) -> U32Bits<F> {
    xor3(builder, &x.rotr(6), &x.rotr(11), &x.rotr(25))
}

fn small_sigma_0<F: CircuitField>(builder: &mut CircuitBuilder<F>, x: &U32Bits<F>) -> U32Bits<F> {
    xor3(builder, &x.rotr(7), &x.rotr(18), &x.shr(3))
}

fn small_sigma_1<F: CircuitField>(builder: &mut CircuitBuilder<F>, x: &U32Bits<F>) -> U32Bits<F> {
    xor3(builder, &x.rotr(17), &x.rotr(19), &x.shr(10))
}
