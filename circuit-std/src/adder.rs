//! Brent–Kung parallel-prefix adder over 0/1 bit vectors.
//!
//! Each position carries a (generate, propagate) pair. The prefix operator is
//! `(g1, p1) ∘ (g0, p0) = (g1 + p1·g0, p1·p0)`. Generate and propagate are
//! never both set in a high operand, so the sum never exceeds one and no OR
//! gadget is needed.

use alloc::vec::Vec;

use ecc_circuit::{CircuitBuilder, CircuitBuilderError, CircuitField, Expression};

use crate::bits::xor_bit;

#[derive(Debug, Clone)]
struct Span<F: CircuitField> {
    generate: Expression<F>,
    propagate: Expression<F>,
}

/// `high ∘ low` for adjacent spans, `high` covering the more significant bits.
fn combine<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    high: &Span<F>,
    low: &Span<F>,
) -> Span<F> {
    let carried = builder.mul(&high.propagate, &low.generate);
    Span {
        generate: high.generate.add(&carried),
        propagate: builder.mul(&high.propagate, &low.propagate),
    }
}

/// Adds two little-endian bit vectors of equal width plus a carry bit.
///
/// Returns the sum bits and the carry out. Operands are assumed boolean.
/// Cost: O(n) multiplications, with `2·log2(n)` prefix levels.
pub fn brent_kung_add<F: CircuitField>(
    builder: &mut CircuitBuilder<F>,
    a: &[Expression<F>],
    b: &[Expression<F>],
    carry_in: &Expression<F>,
) -> Result<(Vec<Expression<F>>, Expression<F>), CircuitBuilderError> {
    if a.len() != b.len() {
        return Err(CircuitBuilderError::InvalidDimension {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let n = a.len();
    if n == 0 {
        return Ok((Vec::new(), carry_in.clone()));
    }

    let propagate: Vec<_> = a
        .iter()
        .zip(b)
        .map(|(x, y)| xor_bit(builder, x, y))
        .collect();
    let mut spans: Vec<_> = a
        .iter()
        .zip(b)
        .zip(&propagate)
        .map(|((x, y), p)| Span {
            generate: builder.mul(x, y),
            propagate: p.clone(),
        })
        .collect();

    // The carry-in joins the lowest span as a generate term.
    let absorbed = builder.mul(&spans[0].propagate, carry_in);
    spans[0].generate = spans[0].generate.add(&absorbed);

    // Up-sweep: spans[i] for i = 2d-1 mod 2d covers the 2d bits ending at i.
    let mut d = 1;
    while d < n {
        for i in (2 * d - 1..n).step_by(2 * d) {
            spans[i] = combine(builder, &spans[i], &spans[i - d]);
        }
        d *= 2;
    }

    // Down-sweep: fill in the remaining prefixes from the coarse ones.
    let mut d = n.next_power_of_two() / 4;
    while d >= 1 {
        for i in (3 * d - 1..n).step_by(2 * d) {
            spans[i] = combine(builder, &spans[i], &spans[i - d]);
        }
        d /= 2;
    }

    let mut sum = Vec::with_capacity(n);
    let mut carry = carry_in.clone();
    for (p, span) in propagate.iter().zip(&spans) {
        sum.push(xor_bit(builder, p, &carry));
        carry = span.generate.clone();
    }
    Ok((sum, carry))
}

#[cfg(test)]
mod tests {
    use ecc_circuit::{HintRegistry, InputSolver, Mersenne31, SolverConfig};
    use p3_field::PrimeCharacteristicRing;
    use proptest::prelude::*;

    use super::*;

    type F = Mersenne31;

    /// Adds two `width`-bit numbers in-circuit and returns (sum, carry out).
    fn add_in_circuit(width: usize, a: u64, b: u64, cin: bool) -> (u64, bool) {
        let mut builder = CircuitBuilder::<F>::new(2 * width + 1, 0).unwrap();
        let inputs = builder.inputs();
        let (sum, carry) =
            brent_kung_add(&mut builder, &inputs[..width], &inputs[width..2 * width], &inputs[2 * width])
                .unwrap();
        for bit in sum.iter().chain([&carry]) {
            builder.output(bit);
        }

        let bit = |v: u64, i: usize| F::from_bool((v >> i) & 1 == 1);
        let values: Vec<F> = (0..width)
            .map(|i| bit(a, i))
            .chain((0..width).map(|i| bit(b, i)))
            .chain([F::from_bool(cin)])
            .collect();
        let solver = InputSolver::new(builder.build().unwrap(), HintRegistry::with_builtins()).unwrap();
        let witness = solver.solve(&values, &SolverConfig::default()).unwrap();

        let outputs = witness.outputs();
        let sum = (0..width).fold(0, |acc, i| acc | (u64::from(outputs[i] == F::ONE) << i));
        (sum, outputs[width] == F::ONE)
    }

    #[test]
    fn test_one_plus_one() {
        assert_eq!(add_in_circuit(32, 1, 1, false), (2, false));
    }

    #[test]
    fn test_carry_ripples_through_every_bit() {
        assert_eq!(add_in_circuit(32, u64::from(u32::MAX), 0, true), (0, true));
        assert_eq!(add_in_circuit(8, 0xff, 0xff, true), (0xff, true));
    }

    #[test]
    fn test_width_mismatch() {
        let mut builder = CircuitBuilder::<F>::new(3, 0).unwrap();
        let inputs = builder.inputs();
        assert!(matches!(
            brent_kung_add(&mut builder, &inputs[..2], &inputs[2..], &Expression::zero()),
            Err(CircuitBuilderError::InvalidDimension {
                expected: 2,
                actual: 1
            })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn matches_native_addition(width in 1usize..=32, a: u64, b: u64, cin: bool) {
            let mask = (1u64 << width) - 1;
            let (a, b) = (a & mask, b & mask);
            let total = a + b + u64::from(cin);
            prop_assert_eq!(
                add_in_circuit(width, a, b, cin),
                (total & mask, total >> width == 1)
            );
        }
    }
}
