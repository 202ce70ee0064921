use alloc::vec::Vec;

use bytes::{Buf, BufMut};
use tracing::{debug, instrument};

use super::ir::{deserialize_circuits, serialize_circuits, HintTable};
use super::{
    expect_consumed, DeserializeBytes, Header, SerializationError, SerializeBytes, SOLVER_MAGIC,
};
use crate::circuit::RootCircuit;
use crate::field::CircuitField;
use crate::hints::HintRegistry;
use crate::solver::InputSolver;
use crate::CircuitError;

/// Counts stored right after the header of a solver blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SolverCounts {
    num_inputs: usize,
    num_public_inputs: usize,
    num_instructions: usize,
    num_constraints: usize,
}

impl SolverCounts {
    fn of<F: CircuitField>(root: &RootCircuit<F>) -> Result<Self, CircuitError> {
        let entry = root.entry()?;
        let (num_instructions, num_constraints) = root
            .circuits()
            .fold((0, 0), |(instructions, constraints), (_, circuit)| {
                (
                    instructions + circuit.instructions().len(),
                    constraints + circuit.constraints().len(),
                )
            });
        Ok(Self {
            num_inputs: entry.num_inputs(),
            num_public_inputs: entry.num_public_inputs(),
            num_instructions,
            num_constraints,
        })
    }
}

impl SerializeBytes for SolverCounts {
    fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
        self.num_inputs.serialize(&mut write_buf)?;
        self.num_public_inputs.serialize(&mut write_buf)?;
        self.num_instructions.serialize(&mut write_buf)?;
        self.num_constraints.serialize(&mut write_buf)
    }
}

impl DeserializeBytes for SolverCounts {
    fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
        Ok(Self {
            num_inputs: usize::deserialize(&mut read_buf)?,
            num_public_inputs: usize::deserialize(&mut read_buf)?,
            num_instructions: usize::deserialize(&mut read_buf)?,
            num_constraints: usize::deserialize(&mut read_buf)?,
        })
    }
}

impl<F: CircuitField> InputSolver<F> {
    /// Serialises the solver: header, input and instruction counts, the hint
    /// name table and every circuit.
    #[instrument(skip_all)]
    pub fn to_bytes(&self) -> Result<Vec<u8>, CircuitError> {
        let hints = HintTable::new(self.hint_names());
        let mut buf = Vec::new();
        Header::new::<F>(SOLVER_MAGIC).write(&mut buf)?;
        SolverCounts::of(self.root())?.serialize(&mut buf)?;
        serialize_circuits(self.root(), &hints, &mut buf)?;
        debug!(bytes = buf.len(), hints = hints.names().len(), "serialized input solver");
        Ok(buf)
    }

    /// Decodes a solver written by [`Self::to_bytes`]. Hints are bound by
    /// name against `hints`, which must provide every name in the table.
    #[instrument(skip_all)]
    pub fn from_bytes(bytes: &[u8], hints: HintRegistry<F>) -> Result<Self, CircuitError> {
        let mut read_buf = bytes;
        Header::read(SOLVER_MAGIC, &mut read_buf)?.expect_field::<F>()?;
        let counts = SolverCounts::deserialize(&mut read_buf)?;
        let (table, circuits) = deserialize_circuits(&mut read_buf)?;
        expect_consumed(&read_buf)?;

        let root = RootCircuit::new(circuits)?;
        if SolverCounts::of(&root)? != counts {
            return Err(SerializationError::InvalidConstruction {
                name: "solver header counts",
            }
            .into());
        }
        if let Some(name) = table.names().iter().find(|name| !hints.contains(name)) {
            return Err(CircuitError::UnknownHint { name: name.clone() });
        }
        Self::new(root, hints)
    }
}

#[cfg(test)]
mod tests {
    use p3_bn254::Bn254;
    use p3_field::{Field, PrimeCharacteristicRing};
    use p3_mersenne_31::Mersenne31;

    use super::*;
    use crate::builder::CircuitBuilder;
    use crate::errors::HintFailure;
    use crate::solver::SolverConfig;

    type F = Bn254;

    fn sample_solver() -> InputSolver<F> {
        let mut hints = HintRegistry::with_builtins();
        hints.register("half", |inputs: &[F], _: usize| -> Result<Vec<F>, HintFailure> {
            Ok(alloc::vec![inputs[0] * F::TWO.inverse()])
        });
        let mut builder = CircuitBuilder::<F>::new(2, 1)
            .unwrap()
            .with_hints(hints.clone());
        let [a, b] = [builder.input(0).unwrap(), builder.input(1).unwrap()];
        let half = builder.hint("half", &[a.clone()], 1).unwrap();
        let twice = builder.scale(&half[0], F::TWO);
        builder.assert_eq(&twice, &a);
        builder.assert_ne(&a, &b);
        let prod = builder.mul(&half[0], &b);
        builder.output(&prod);
        InputSolver::new(builder.build().unwrap(), hints).unwrap()
    }

    #[test]
    fn test_solver_round_trip() {
        let solver = sample_solver();
        let bytes = solver.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"ECIS");

        let decoded = InputSolver::from_bytes(&bytes, solver.hints().clone()).unwrap();
        assert_eq!(decoded.root(), solver.root());
        assert_eq!(decoded.to_bytes().unwrap(), bytes);

        let inputs = [F::from_u64(10), F::from_u64(3)];
        let config = SolverConfig::default();
        assert_eq!(
            decoded.solve(&inputs, &config).unwrap(),
            solver.solve(&inputs, &config).unwrap()
        );
    }

    #[test]
    fn test_missing_hint_is_reported_by_name() {
        let bytes = sample_solver().to_bytes().unwrap();
        assert!(matches!(
            InputSolver::<F>::from_bytes(&bytes, HintRegistry::with_builtins()),
            Err(CircuitError::UnknownHint { ref name }) if name == "half"
        ));
    }

    #[test]
    fn test_wrong_field_or_magic() {
        let bytes = sample_solver().to_bytes().unwrap();
        assert!(matches!(
            InputSolver::<Mersenne31>::from_bytes(&bytes, HintRegistry::with_builtins()),
            Err(CircuitError::FieldMismatch { .. })
        ));
        assert!(matches!(
            RootCircuit::<F>::from_bytes(&bytes),
            Err(CircuitError::Serialization(SerializationError::BadMagic { .. }))
        ));
    }

    #[test]
    fn test_tampered_counts_are_rejected() {
        let mut bytes = sample_solver().to_bytes().unwrap();
        // First count after the 7-byte header is the number of inputs.
        bytes[7] = 3;
        assert!(matches!(
            InputSolver::<F>::from_bytes(&bytes, sample_solver().hints().clone()),
            Err(CircuitError::Serialization(SerializationError::InvalidConstruction { .. }))
        ));
    }
}
