//! Standard gadgets for [`ecc_circuit::CircuitBuilder`]: 32-bit words as bit
//! vectors, a Brent–Kung adder and SHA-256.

#![no_std]
extern crate alloc;

pub mod adder;
pub mod bits;
pub mod sha256;

pub use adder::brent_kung_add;
pub use bits::{U32Bits, WORD_BITS, add_mod32};
pub use sha256::{Sha256Circuit, sha256};
