use ecc_circuit::{
    AnyInputSolver, AnyLayeredCircuit, Bn254, CircuitBuilder, CircuitBuilderError, CircuitError,
    CircuitField, CompileConfig, Define, Mersenne31, SolverConfig, compile,
};
use ecc_circuit_std::{Sha256Circuit, brent_kung_add};
use ecc_test_utils::init_logger;
use p3_field::PrimeCharacteristicRing;
use sha2::{Digest, Sha256};

const MESSAGE_LEN: usize = 100;

/// SHA-256 of the inputs, also asserting that the first byte is non-zero.
struct HashNonZeroPrefix;

impl<F: CircuitField> Define<F> for HashNonZeroPrefix {
    fn num_inputs(&self) -> usize {
        MESSAGE_LEN
    }

    fn define(&self, builder: &mut CircuitBuilder<F>) -> Result<(), CircuitBuilderError> {
        Sha256Circuit::new(MESSAGE_LEN).define(builder)?;
        let first = builder.input(0)?;
        builder.assert_ne(&first, &builder.constant(F::ZERO));
        Ok(())
    }
}

/// `a + b + carry_in` over 32 bits, checked bit by bit against `expected`.
struct CheckedAdder;

impl Define<Mersenne31> for CheckedAdder {
    fn num_inputs(&self) -> usize {
        32 * 3 + 1
    }

    fn define(&self, builder: &mut CircuitBuilder<Mersenne31>) -> Result<(), CircuitBuilderError> {
        let inputs = builder.inputs();
        let (a, rest) = inputs.split_at(32);
        let (b, rest) = rest.split_at(32);
        let (carry_in, expected) = rest.split_at(1);
        for bit in a.iter().chain(b).chain(carry_in) {
            builder.assert_bool(bit);
        }
        let (sum, carry_out) = brent_kung_add(builder, a, b, &carry_in[0])?;
        for (bit, want) in sum.iter().zip(expected) {
            builder.assert_eq(bit, want);
        }
        builder.output(&carry_out);
        Ok(())
    }
}

fn message() -> Vec<u8> {
    (1..=MESSAGE_LEN as u8).collect()
}

/// Digest bytes in output order: each 4-byte word reversed.
fn expected_outputs() -> Vec<Bn254> {
    Sha256::digest(message())
        .chunks_exact(4)
        .flat_map(|word| word.iter().rev().map(|&b| Bn254::from_u8(b)))
        .collect()
}

#[test]
fn sha256_of_hundred_bytes_matches_sha2() {
    init_logger();
    let compiled = compile::<Bn254, _>(&HashNonZeroPrefix, &CompileConfig::default()).unwrap();
    let inputs: Vec<Bn254> = message().into_iter().map(Bn254::from_u8).collect();

    let witness = compiled
        .solver
        .solve(&inputs, &SolverConfig::default().with_workers(8))
        .unwrap();
    assert_eq!(witness.outputs(), expected_outputs().as_slice());
    assert_eq!(
        compiled.layered.evaluate(witness.layered_inputs()).unwrap(),
        witness.outputs()
    );
}

#[test]
fn sha256_artifacts_round_trip() {
    init_logger();
    let compiled = compile::<Bn254, _>(&HashNonZeroPrefix, &CompileConfig::default()).unwrap();
    let inputs: Vec<Bn254> = message().into_iter().map(Bn254::from_u8).collect();
    let config = SolverConfig::default();
    let before = compiled.solver.solve(&inputs, &config).unwrap();

    let solver_bytes = compiled.solver.to_bytes().unwrap();
    let layered_bytes = compiled.layered.to_bytes().unwrap();

    let AnyInputSolver::Bn254(solver) = AnyInputSolver::from_bytes(&solver_bytes).unwrap() else {
        panic!("solver blob should carry the BN254 field id");
    };
    let AnyLayeredCircuit::Bn254(layered) = AnyLayeredCircuit::from_bytes(&layered_bytes).unwrap()
    else {
        panic!("layered blob should carry the BN254 field id");
    };
    assert_eq!(solver.to_bytes().unwrap(), solver_bytes);
    assert_eq!(layered.to_bytes().unwrap(), layered_bytes);

    let after = solver.solve(&inputs, &config).unwrap();
    assert_eq!(after.outputs(), before.outputs());
    assert_eq!(
        layered.evaluate(after.layered_inputs()).unwrap(),
        before.outputs()
    );
}

#[test]
fn brent_kung_one_plus_one() {
    init_logger();
    let compiled = compile::<Mersenne31, _>(&CheckedAdder, &CompileConfig::default()).unwrap();
    let bits = |v: u32| (0..32).map(move |i| Mersenne31::from_bool((v >> i) & 1 == 1));
    let inputs: Vec<Mersenne31> = bits(1)
        .chain(bits(1))
        .chain([Mersenne31::ZERO])
        .chain(bits(2))
        .collect();

    let witness = compiled
        .solver
        .solve(&inputs, &SolverConfig::default())
        .unwrap();
    assert_eq!(witness.outputs(), &[Mersenne31::ZERO]);
    assert_eq!(
        compiled.layered.evaluate(witness.layered_inputs()).unwrap(),
        witness.outputs()
    );

    // A wrong expected sum trips exactly the constraint of the differing bit.
    let mut wrong = inputs.clone();
    wrong[65] = Mersenne31::ONE;
    match compiled.solver.solve(&wrong, &SolverConfig::default()) {
        // 65 boolean checks come first, then one equality per sum bit.
        Err(CircuitError::ConstraintViolation { index, .. }) => assert_eq!(index, 65),
        other => panic!("expected a constraint violation, got {other:?}"),
    }
}
