use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use bytes::{Buf, BufMut};
use tracing::instrument;

use super::{
    deserialize_field, expect_consumed, serialize_field, DeserializeBytes, Header,
    SerializationError, SerializeBytes, IR_MAGIC,
};
use crate::circuit::{Circuit, RootCircuit};
use crate::expr::{Expression, Term};
use crate::field::CircuitField;
use crate::instruction::{Instruction, InstructionKind};
use crate::types::{SubCircuitId, WireId};
use crate::CircuitError;

impl<F: CircuitField> SerializeBytes for Expression<F> {
    fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
        self.len().serialize(&mut write_buf)?;
        for term in self.terms() {
            term.wire.serialize(&mut write_buf)?;
            serialize_field(&term.coef, &mut write_buf)?;
        }
        Ok(())
    }
}

impl<F: CircuitField> DeserializeBytes for Expression<F> {
    fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
        let len = usize::deserialize(&mut read_buf)?;
        let terms = (0..len)
            .map(|_| {
                let wire = WireId::deserialize(&mut read_buf)?;
                let coef = deserialize_field(&mut read_buf)?;
                Ok(Term::new(coef, wire))
            })
            .collect::<Result<Vec<_>, SerializationError>>()?;
        Self::from_canonical_terms(terms).ok_or(SerializationError::NonCanonicalExpression)
    }
}

/// Sorted hint names of a root circuit. Instructions refer to hints by their
/// position in this table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HintTable {
    names: Vec<String>,
}

impl HintTable {
    pub(crate) fn new(names: BTreeSet<String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    fn id(&self, name: &str) -> Result<u32, SerializationError> {
        let index = self
            .names
            .binary_search_by(|known| known.as_str().cmp(name))
            .map_err(|_| SerializationError::InvalidConstruction { name: "hint table" })?;
        u32::try_from(index).map_err(|_| SerializationError::UsizeTooLarge { size: index })
    }

    fn name(&self, id: u32) -> Result<&String, SerializationError> {
        self.names
            .get(id as usize)
            .ok_or(SerializationError::UnknownVariant {
                name: "hint",
                index: id.into(),
            })
    }
}

impl SerializeBytes for HintTable {
    fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
        self.names.serialize(write_buf)
    }
}

impl DeserializeBytes for HintTable {
    fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
        let names = Vec::<String>::deserialize(read_buf)?;
        if !names.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(SerializationError::InvalidConstruction { name: "hint table" });
        }
        Ok(Self { names })
    }
}

fn serialize_instruction<F: CircuitField>(
    instr: &Instruction<F>,
    hints: &HintTable,
    mut write_buf: impl BufMut,
) -> Result<(), SerializationError> {
    (instr.kind() as u8).serialize(&mut write_buf)?;
    match instr {
        Instruction::LinComb { expr, out } => {
            out.serialize(&mut write_buf)?;
            expr.serialize(&mut write_buf)
        }
        Instruction::Mul { lhs, rhs, out } => {
            out.serialize(&mut write_buf)?;
            lhs.serialize(&mut write_buf)?;
            rhs.serialize(&mut write_buf)
        }
        Instruction::Hint {
            name,
            inputs,
            outputs,
        } => {
            hints.id(name)?.serialize(&mut write_buf)?;
            inputs.serialize(&mut write_buf)?;
            outputs.serialize(&mut write_buf)
        }
        Instruction::SubCircuit {
            sub_circuit_id,
            inputs,
            outputs,
        } => {
            sub_circuit_id.serialize(&mut write_buf)?;
            inputs.serialize(&mut write_buf)?;
            outputs.serialize(&mut write_buf)
        }
    }
}

fn deserialize_instruction<F: CircuitField>(
    hints: &HintTable,
    mut read_buf: impl Buf,
) -> Result<Instruction<F>, SerializationError> {
    let tag = u8::deserialize(&mut read_buf)?;
    let kind = InstructionKind::from_tag(tag).ok_or(SerializationError::UnknownVariant {
        name: "Instruction",
        index: tag.into(),
    })?;
    Ok(match kind {
        InstructionKind::LinComb => {
            let out = WireId::deserialize(&mut read_buf)?;
            let expr = Expression::deserialize(&mut read_buf)?;
            Instruction::LinComb { expr, out }
        }
        InstructionKind::Mul => {
            let out = WireId::deserialize(&mut read_buf)?;
            let lhs = Expression::deserialize(&mut read_buf)?;
            let rhs = Expression::deserialize(&mut read_buf)?;
            Instruction::Mul { lhs, rhs, out }
        }
        InstructionKind::Hint => {
            let name = hints.name(u32::deserialize(&mut read_buf)?)?.clone();
            let inputs = Vec::deserialize(&mut read_buf)?;
            let outputs = Vec::deserialize(&mut read_buf)?;
            Instruction::Hint {
                name,
                inputs,
                outputs,
            }
        }
        InstructionKind::SubCircuit => {
            let sub_circuit_id = SubCircuitId::deserialize(&mut read_buf)?;
            let inputs = Vec::deserialize(&mut read_buf)?;
            let outputs = Vec::deserialize(&mut read_buf)?;
            Instruction::SubCircuit {
                sub_circuit_id,
                inputs,
                outputs,
            }
        }
    })
}

fn serialize_circuit<F: CircuitField>(
    circuit: &Circuit<F>,
    hints: &HintTable,
    mut write_buf: impl BufMut,
) -> Result<(), SerializationError> {
    circuit.num_inputs().serialize(&mut write_buf)?;
    circuit.num_public_inputs().serialize(&mut write_buf)?;
    circuit.instructions().len().serialize(&mut write_buf)?;
    for instr in circuit.instructions() {
        serialize_instruction(instr, hints, &mut write_buf)?;
    }
    circuit.constraints().serialize(&mut write_buf)?;
    circuit.outputs().serialize(&mut write_buf)
}

fn deserialize_circuit<F: CircuitField>(
    hints: &HintTable,
    mut read_buf: impl Buf,
) -> Result<Circuit<F>, SerializationError> {
    let num_inputs = usize::deserialize(&mut read_buf)?;
    let num_public_inputs = usize::deserialize(&mut read_buf)?;
    let num_instructions = usize::deserialize(&mut read_buf)?;
    let instructions = (0..num_instructions)
        .map(|_| deserialize_instruction(hints, &mut read_buf))
        .collect::<Result<Vec<_>, _>>()?;
    let constraints = Vec::deserialize(&mut read_buf)?;
    let outputs = Vec::deserialize(&mut read_buf)?;
    Ok(Circuit::from_parts(
        num_inputs,
        num_public_inputs,
        instructions,
        constraints,
        outputs,
    ))
}

/// Writes the hint table followed by every circuit, keyed by id.
pub(crate) fn serialize_circuits<F: CircuitField>(
    root: &RootCircuit<F>,
    hints: &HintTable,
    mut write_buf: impl BufMut,
) -> Result<(), SerializationError> {
    hints.serialize(&mut write_buf)?;
    root.len().serialize(&mut write_buf)?;
    for (id, circuit) in root.circuits() {
        id.serialize(&mut write_buf)?;
        serialize_circuit(circuit, hints, &mut write_buf)?;
    }
    Ok(())
}

/// Inverse of [`serialize_circuits`]. The result is not validated yet.
pub(crate) fn deserialize_circuits<F: CircuitField>(
    mut read_buf: impl Buf,
) -> Result<(HintTable, BTreeMap<SubCircuitId, Circuit<F>>), SerializationError> {
    let hints = HintTable::deserialize(&mut read_buf)?;
    let len = usize::deserialize(&mut read_buf)?;
    let mut circuits = BTreeMap::new();
    for _ in 0..len {
        let id = SubCircuitId::deserialize(&mut read_buf)?;
        let circuit = deserialize_circuit(&hints, &mut read_buf)?;
        if circuits.insert(id, circuit).is_some() {
            return Err(SerializationError::InvalidConstruction {
                name: "duplicate circuit id",
            });
        }
    }
    Ok((hints, circuits))
}

impl<F: CircuitField> RootCircuit<F> {
    /// Serialises the root circuit on its own, with hints referenced by name.
    #[instrument(skip_all)]
    pub fn to_bytes(&self) -> Result<Vec<u8>, CircuitError> {
        let hints = HintTable::new(crate::solver::hint_names(self));
        let mut buf = Vec::new();
        Header::new::<F>(IR_MAGIC).write(&mut buf)?;
        serialize_circuits(self, &hints, &mut buf)?;
        Ok(buf)
    }

    /// Decodes and validates a root circuit written by [`Self::to_bytes`].
    #[instrument(skip_all)]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CircuitError> {
        let mut read_buf = bytes;
        Header::read(IR_MAGIC, &mut read_buf)?.expect_field::<F>()?;
        let (_, circuits) = deserialize_circuits(&mut read_buf)?;
        expect_consumed(&read_buf)?;
        Self::new(circuits)
    }
}
