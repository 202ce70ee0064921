use ecc_circuit::{
    Bn254, CircuitError, CompileConfig, FieldKind, HintFailure, HintMode, InputSolver,
    LayeredCircuit, Mersenne31, SolverConfig, SubCircuitId, compile,
};
use ecc_test_utils::{
    AssertDifferent, AssertNonZero, Identity, SquareChain, init_logger, square_chain_native,
};
use p3_field::PrimeCharacteristicRing;

#[test]
fn identity_over_bn254() {
    init_logger();
    let compiled = compile::<Bn254, _>(&Identity, &CompileConfig::default()).unwrap();
    let witness = compiled
        .solver
        .solve(&[Bn254::from_u64(7)], &SolverConfig::default())
        .unwrap();

    assert_eq!(witness.outputs(), &[Bn254::from_u64(7)]);
    assert_eq!(compiled.solver.root().entry().unwrap().constraints().len(), 0);
    assert_eq!(compiled.layered.constraints().len(), 0);
    assert_eq!(
        compiled.layered.evaluate(witness.layered_inputs()).unwrap(),
        witness.outputs()
    );
}

#[test]
fn assert_non_zero_accepts_and_rejects() {
    init_logger();
    let compiled = compile::<Bn254, _>(&AssertNonZero, &CompileConfig::default()).unwrap();
    let lenient = SolverConfig::default().with_hint_mode(HintMode::Lenient);

    assert!(compiled.solver.solve(&[Bn254::from_u64(5)], &lenient).is_ok());

    match compiled.solver.solve(&[Bn254::ZERO], &lenient) {
        Err(CircuitError::ConstraintViolation { circuit, index, .. }) => {
            assert_eq!(circuit, SubCircuitId::ENTRY);
            assert_eq!(index, 0);
        }
        other => panic!("expected a constraint violation, got {other:?}"),
    }
}

#[test]
fn equal_operands_fail_in_the_inverse_hint() {
    init_logger();
    let compiled = compile::<Bn254, _>(&AssertDifferent, &CompileConfig::default()).unwrap();
    let same = [Bn254::from_u64(42), Bn254::from_u64(42)];

    match compiled.solver.solve(&same, &SolverConfig::default()) {
        Err(CircuitError::HintError { name, failure, .. }) => {
            assert_eq!(name, "inverse");
            assert_eq!(failure, HintFailure::DivisionByZero);
        }
        other => panic!("expected a hint error, got {other:?}"),
    }

    let differ = [Bn254::from_u64(42), Bn254::from_u64(43)];
    assert!(compiled.solver.solve(&differ, &SolverConfig::default()).is_ok());
}

#[test]
fn artifacts_survive_a_round_trip() {
    init_logger();
    let chain = SquareChain { rounds: 5 };
    let compiled = compile::<Mersenne31, _>(&chain, &CompileConfig::default()).unwrap();
    let inputs = [Mersenne31::from_u64(3)];
    let config = SolverConfig::default();
    let before = compiled.solver.solve(&inputs, &config).unwrap();

    let solver_bytes = compiled.solver.to_bytes().unwrap();
    let layered_bytes = compiled.layered.to_bytes().unwrap();
    assert_eq!(
        ecc_circuit::peek_field(&solver_bytes).unwrap(),
        FieldKind::Mersenne31
    );

    let solver = InputSolver::<Mersenne31>::from_bytes(
        &solver_bytes,
        compiled.solver.hints().clone(),
    )
    .unwrap();
    let layered = LayeredCircuit::<Mersenne31>::from_bytes(&layered_bytes).unwrap();
    assert_eq!(layered, compiled.layered);

    let after = solver.solve(&inputs, &config).unwrap();
    assert_eq!(after, before);
    assert_eq!(after.outputs(), &[square_chain_native(inputs[0], 5)]);
    assert_eq!(
        layered.evaluate(after.layered_inputs()).unwrap(),
        before.outputs()
    );
}

#[test]
fn solving_is_independent_of_worker_count() {
    init_logger();
    let chain = SquareChain { rounds: 16 };
    let compiled = compile::<Bn254, _>(&chain, &CompileConfig::default()).unwrap();
    let inputs = [Bn254::from_u64(11)];

    let baseline = compiled
        .solver
        .solve(&inputs, &SolverConfig::default())
        .unwrap();
    for workers in [0, 2, 3, 8] {
        let config = SolverConfig::default().with_workers(workers);
        assert_eq!(compiled.solver.solve(&inputs, &config).unwrap(), baseline);
    }
    assert_eq!(baseline.instances().len(), 17);
    assert_eq!(baseline.public_inputs(), &inputs);
}

#[test]
fn layered_circuit_agrees_with_solver() {
    init_logger();
    for dce in [true, false] {
        let config = CompileConfig::default().with_dead_code_elimination(dce);
        let compiled = compile::<Bn254, _>(&SquareChain { rounds: 4 }, &config).unwrap();
        for x in [0u64, 1, 2, 1 << 40] {
            let witness = compiled
                .solver
                .solve(&[Bn254::from_u64(x)], &SolverConfig::default())
                .unwrap();
            assert_eq!(
                compiled.layered.evaluate(witness.layered_inputs()).unwrap(),
                witness.outputs()
            );
        }
    }
}
