use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use itertools::zip_eq;
use tracing::{debug, instrument};

use super::config::{HintMode, SolverConfig};
use super::constraints::first_violation;
use super::witness::{InstanceValues, Witness};
use crate::circuit::{check_defined, push_wire, RootCircuit};
use crate::errors::IrLocation;
use crate::expr::Expression;
use crate::field::{CircuitField, FieldKind};
use crate::hints::HintRegistry;
use crate::instruction::Instruction;
use crate::types::SubCircuitId;
use crate::CircuitError;

/// Computes the full witness of a root circuit from its external inputs.
///
/// Instructions are evaluated in a single pass per circuit instance, calling
/// hints by name and recursing into sub-circuits. Once every instance is
/// populated the constraints are checked, optionally across several workers.
#[derive(Debug, Clone)]
pub struct InputSolver<F> {
    root: RootCircuit<F>,
    hints: HintRegistry<F>,
    num_inputs: usize,
    num_public_inputs: usize,
}

/// Mutable state threaded through the recursive instance solve.
struct SolveState<F> {
    mode: HintMode,
    instances: Vec<InstanceValues<F>>,
    hint_outputs: Vec<F>,
}

impl<F: CircuitField> InputSolver<F> {
    /// Wraps a validated root circuit. Every hint the circuit calls must be
    /// present in `hints`.
    pub fn new(root: RootCircuit<F>, hints: HintRegistry<F>) -> Result<Self, CircuitError> {
        if let Some(name) = hint_names(&root)
            .into_iter()
            .find(|name| !hints.contains(name))
        {
            return Err(CircuitError::UnknownHint { name });
        }
        let entry = root.entry()?;
        let (num_inputs, num_public_inputs) = (entry.num_inputs(), entry.num_public_inputs());
        Ok(Self {
            root,
            hints,
            num_inputs,
            num_public_inputs,
        })
    }

    pub const fn root(&self) -> &RootCircuit<F> {
        &self.root
    }

    pub const fn hints(&self) -> &HintRegistry<F> {
        &self.hints
    }

    /// Replaces the hint registry, for instance after deserialisation.
    pub fn with_hints(self, hints: HintRegistry<F>) -> Result<Self, CircuitError> {
        Self::new(self.root, hints)
    }

    pub const fn field(&self) -> FieldKind {
        F::KIND
    }

    pub const fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub const fn num_public_inputs(&self) -> usize {
        self.num_public_inputs
    }

    /// Names of every hint referenced by the circuit, sorted.
    pub fn hint_names(&self) -> BTreeSet<String> {
        hint_names(&self.root)
    }

    #[instrument(skip_all)]
    pub fn solve(&self, inputs: &[F], config: &SolverConfig) -> Result<Witness<F>, CircuitError> {
        if inputs.len() != self.num_inputs {
            return Err(CircuitError::InputLengthMismatch {
                expected: self.num_inputs,
                got: inputs.len(),
            });
        }

        let mut state = SolveState {
            mode: config.hint_mode,
            instances: Vec::new(),
            hint_outputs: Vec::new(),
        };
        let outputs = self.solve_instance(SubCircuitId::ENTRY, inputs, &mut state)?;

        if let Some(violation) =
            first_violation(&self.root, &state.instances, config.effective_workers())?
        {
            debug!(
                instance = violation.instance,
                circuit = %violation.circuit,
                index = violation.index,
                "constraint violated"
            );
            return Err(CircuitError::ConstraintViolation {
                circuit: violation.circuit,
                index: violation.index,
                value: violation.value.to_string(),
            });
        }

        debug!(
            instances = state.instances.len(),
            hint_outputs = state.hint_outputs.len(),
            workers = config.effective_workers(),
            "witness solved"
        );

        let mut layered_inputs = Vec::with_capacity(inputs.len() + state.hint_outputs.len());
        layered_inputs.extend_from_slice(inputs);
        layered_inputs.extend(state.hint_outputs);

        Ok(Witness {
            instances: state.instances,
            outputs,
            layered_inputs,
            num_public_inputs: self.num_public_inputs,
        })
    }

    /// Solves one instance of circuit `id` and returns its output values.
    ///
    /// The instance slot is reserved before any nested call so that
    /// instances end up in call pre-order.
    fn solve_instance(
        &self,
        id: SubCircuitId,
        inputs: &[F],
        state: &mut SolveState<F>,
    ) -> Result<Vec<F>, CircuitError> {
        let circuit = self.root.circuit(id)?;
        let slot = state.instances.len();
        state.instances.push(InstanceValues {
            circuit: id,
            values: Vec::new(),
        });

        let mut values = Vec::with_capacity(circuit.num_wires());
        values.push(F::ONE);
        values.extend_from_slice(inputs);

        for (i, instr) in circuit.instructions().iter().enumerate() {
            let location = IrLocation::Instruction(i);
            match instr {
                Instruction::LinComb { expr, out } => {
                    let value = eval_checked(expr, &values, id, location)?;
                    push_wire(&mut values, *out, value, id, location)?;
                }
                Instruction::Mul { lhs, rhs, out } => {
                    let value = eval_checked(lhs, &values, id, location)?
                        * eval_checked(rhs, &values, id, location)?;
                    push_wire(&mut values, *out, value, id, location)?;
                }
                Instruction::Hint {
                    name,
                    inputs,
                    outputs,
                } => {
                    let args = eval_all(inputs, &values, id, location)?;
                    let results = match self.hints.call(name, &args, outputs.len()) {
                        Ok(results) => results,
                        Err(CircuitError::HintError { .. }) if state.mode == HintMode::Lenient => {
                            vec![F::ZERO; outputs.len()]
                        }
                        Err(e) => return Err(e),
                    };
                    state.hint_outputs.extend_from_slice(&results);
                    for (&out, value) in zip_eq(outputs, results) {
                        push_wire(&mut values, out, value, id, location)?;
                    }
                }
                Instruction::SubCircuit {
                    sub_circuit_id,
                    inputs,
                    outputs,
                } => {
                    let args = eval_all(inputs, &values, id, location)?;
                    let callee = self.root.circuit(*sub_circuit_id)?;
                    if callee.num_inputs() != args.len() || callee.outputs().len() != outputs.len()
                    {
                        return Err(CircuitError::MalformedIr {
                            circuit: id,
                            location,
                            reason: format!("arity mismatch calling {sub_circuit_id}"),
                        });
                    }
                    let results = self.solve_instance(*sub_circuit_id, &args, state)?;
                    for (&out, value) in zip_eq(outputs, results) {
                        push_wire(&mut values, out, value, id, location)?;
                    }
                }
            }
        }

        for (i, constraint) in circuit.constraints().iter().enumerate() {
            check_defined(constraint, values.len(), id, IrLocation::Constraint(i))?;
        }
        let outputs = circuit
            .outputs()
            .iter()
            .enumerate()
            .map(|(i, output)| eval_checked(output, &values, id, IrLocation::Output(i)))
            .collect::<Result<Vec<_>, _>>()?;

        state.instances[slot].values = values;
        Ok(outputs)
    }
}

/// Every hint name referenced anywhere in `root`.
pub(crate) fn hint_names<F: CircuitField>(root: &RootCircuit<F>) -> BTreeSet<String> {
    root.circuits()
        .flat_map(|(_, circuit)| circuit.instructions())
        .filter_map(|instr| match instr {
            Instruction::Hint { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn eval_checked<F: CircuitField>(
    expr: &Expression<F>,
    values: &[F],
    circuit: SubCircuitId,
    location: IrLocation,
) -> Result<F, CircuitError> {
    check_defined(expr, values.len(), circuit, location)?;
    Ok(expr.eval(values))
}

fn eval_all<F: CircuitField>(
    exprs: &[Expression<F>],
    values: &[F],
    circuit: SubCircuitId,
    location: IrLocation,
) -> Result<Vec<F>, CircuitError> {
    exprs
        .iter()
        .map(|expr| eval_checked(expr, values, circuit, location))
        .collect()
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;

    use p3_bn254::Bn254;
    use p3_field::PrimeCharacteristicRing;
    use p3_mersenne_31::Mersenne31;
    use proptest::prelude::*;

    use super::*;
    use crate::builder::{CircuitBuilder, CircuitBuilderError};
    use crate::circuit::Circuit;
    use crate::errors::HintFailure;
    use crate::hints::builtin;
    use crate::types::WireId;

    type F = Mersenne31;

    fn f(v: u64) -> F {
        F::from_u64(v)
    }

    fn solver(builder: CircuitBuilder<F>) -> InputSolver<F> {
        InputSolver::new(builder.build().unwrap(), HintRegistry::with_builtins()).unwrap()
    }

    #[test]
    fn test_identity_circuit() {
        let mut builder = CircuitBuilder::<Bn254>::new(1, 1).unwrap();
        let x = builder.input(0).unwrap();
        builder.output(&x);
        let solver =
            InputSolver::new(builder.build().unwrap(), HintRegistry::with_builtins()).unwrap();

        let witness = solver
            .solve(&[Bn254::from_u64(7)], &SolverConfig::default())
            .unwrap();
        assert_eq!(witness.outputs(), &[Bn254::from_u64(7)]);
        assert_eq!(witness.values(), &[Bn254::ONE, Bn254::from_u64(7)]);
        assert_eq!(witness.public_inputs(), &[Bn254::from_u64(7)]);
    }

    #[test]
    fn test_mul_and_constraint() {
        let mut builder = CircuitBuilder::<F>::new(2, 0).unwrap();
        let [a, b] = [builder.input(0).unwrap(), builder.input(1).unwrap()];
        let prod = builder.mul(&a, &b);
        let expected = builder.constant_u64(12);
        builder.assert_eq(&prod, &expected);
        builder.output(&prod);
        let solver = solver(builder);

        let witness = solver.solve(&[f(3), f(4)], &SolverConfig::default()).unwrap();
        assert_eq!(witness.outputs(), &[f(12)]);

        let err = solver
            .solve(&[f(3), f(5)], &SolverConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CircuitError::ConstraintViolation { circuit: SubCircuitId::ENTRY, index: 0, ref value }
                if value == "3"
        ));
    }

    #[test]
    fn test_input_length_mismatch() {
        let builder = CircuitBuilder::<F>::new(2, 0).unwrap();
        let err = solver(builder)
            .solve(&[f(1)], &SolverConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CircuitError::InputLengthMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn test_unknown_hint_rejected_at_construction() {
        let mut builder = CircuitBuilder::<F>::new(1, 0).unwrap();
        let x = builder.input(0).unwrap();
        builder.hint(builtin::INVERSE, &[x], 1).unwrap();
        let err = InputSolver::new(builder.build().unwrap(), HintRegistry::empty()).unwrap_err();
        assert!(matches!(err, CircuitError::UnknownHint { ref name } if name == builtin::INVERSE));
    }

    fn assert_ne_solver() -> InputSolver<F> {
        let mut builder = CircuitBuilder::<F>::new(2, 0).unwrap();
        let [a, b] = [builder.input(0).unwrap(), builder.input(1).unwrap()];
        builder.assert_ne(&a, &b);
        solver(builder)
    }

    #[test]
    fn test_assert_ne_strict() {
        let solver = assert_ne_solver();
        assert!(solver.solve(&[f(1), f(2)], &SolverConfig::default()).is_ok());

        let err = solver
            .solve(&[f(42), f(42)], &SolverConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CircuitError::HintError { ref name, failure: HintFailure::DivisionByZero, .. }
                if name == builtin::INVERSE
        ));
    }

    #[test]
    fn test_assert_ne_lenient() {
        let config = SolverConfig::default().with_hint_mode(HintMode::Lenient);
        let err = assert_ne_solver()
            .solve(&[f(42), f(42)], &config)
            .unwrap_err();
        assert!(matches!(
            err,
            CircuitError::ConstraintViolation { circuit: SubCircuitId::ENTRY, index: 0, .. }
        ));
    }

    #[test]
    fn test_sub_circuit_instances_in_pre_order() {
        let mut builder = CircuitBuilder::<F>::new(1, 0).unwrap();
        let square = builder
            .define_sub_circuit("square", 1, |b| {
                let x = b.input(0)?;
                let sq = b.mul(&x, &x);
                b.output(&sq);
                Ok::<(), CircuitBuilderError>(())
            })
            .unwrap();
        let quad = builder
            .define_sub_circuit("quad", 1, |b| {
                let x = b.input(0)?;
                let sq = b.call(square, &[x])?;
                let q = b.call(square, &sq)?;
                b.output(&q[0]);
                Ok(())
            })
            .unwrap();
        let x = builder.input(0).unwrap();
        let y = builder.call(quad, &[x]).unwrap();
        builder.output(&y[0]);
        let solver = solver(builder);

        let witness = solver.solve(&[f(3)], &SolverConfig::default()).unwrap();
        assert_eq!(witness.outputs(), &[f(81)]);
        let order: Vec<_> = witness.instances().iter().map(|i| i.circuit).collect();
        assert_eq!(order, vec![SubCircuitId::ENTRY, quad, square, square]);
        assert_eq!(witness.instances()[3].values, vec![F::ONE, f(9), f(81)]);
    }

    #[test]
    fn test_hint_outputs_feed_layered_inputs() {
        let mut builder = CircuitBuilder::<F>::new(1, 0).unwrap();
        let x = builder.input(0).unwrap();
        let bits = builder.to_binary(&x, 4).unwrap();
        builder.output(&bits[0]);
        let witness = solver(builder)
            .solve(&[f(6)], &SolverConfig::default())
            .unwrap();
        assert_eq!(witness.layered_inputs(), &[f(6), f(0), f(1), f(1), f(0)]);
    }

    #[test]
    fn test_malformed_output_order() {
        let entry = Circuit::from_parts(
            1,
            0,
            vec![Instruction::LinComb {
                expr: Expression::wire(WireId(1)),
                out: WireId(5),
            }],
            vec![],
            vec![],
        );
        let root = RootCircuit::new_unchecked(BTreeMap::from([(SubCircuitId::ENTRY, entry)]));
        let solver = InputSolver::new(root, HintRegistry::with_builtins()).unwrap();
        let err = solver.solve(&[f(1)], &SolverConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            CircuitError::MalformedIr { location: IrLocation::Instruction(0), .. }
        ));
    }

    fn chain_solver(len: usize) -> InputSolver<F> {
        let mut builder = CircuitBuilder::<F>::new(1, 0).unwrap();
        let mut acc = builder.input(0).unwrap();
        for i in 0..len {
            acc = builder.mul(&acc, &acc);
            let bound = builder.constant_u64(i as u64 % 7);
            let diff = builder.sub(&acc, &bound);
            builder.assert_zero(&diff);
        }
        solver(builder)
    }

    proptest! {
        #[test]
        fn solve_result_independent_of_workers(x in 0u64..16, workers in 1usize..9) {
            let solver = chain_solver(12);
            let single = solver.solve(&[f(x)], &SolverConfig::default());
            let multi = solver.solve(&[f(x)], &SolverConfig::default().with_workers(workers));
            match (single, multi) {
                (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
                (
                    Err(CircuitError::ConstraintViolation { circuit: c1, index: i1, value: v1 }),
                    Err(CircuitError::ConstraintViolation { circuit: c2, index: i2, value: v2 }),
                ) => {
                    prop_assert_eq!(c1, c2);
                    prop_assert_eq!(i1, i2);
                    prop_assert_eq!(v1, v2);
                }
                (a, b) => prop_assert!(false, "diverging results: {a:?} vs {b:?}"),
            }
        }
    }
}
