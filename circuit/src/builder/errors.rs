use alloc::boxed::Box;
use alloc::string::String;

use thiserror::Error;

use crate::types::SubCircuitId;
use crate::CircuitError;

/// Errors that can occur while recording a circuit.
#[derive(Debug, Error)]
pub enum CircuitBuilderError {
    /// External input index beyond the declared input count.
    #[error("Input index {index} out of range (circuit has {num_inputs} inputs)")]
    InputOutOfRange { index: usize, num_inputs: usize },

    /// Hint name not present in the builder's registry.
    #[error("Unknown hint `{name}`")]
    UnknownHint { name: String },

    /// Call to a sub-circuit id that was never defined.
    #[error("Unknown sub-circuit {id}")]
    UnknownSubCircuit { id: SubCircuitId },

    /// Sub-circuit called with the wrong number of inputs.
    #[error("{id} expects {expected} inputs, got {got}")]
    ArityMismatch {
        id: SubCircuitId,
        expected: usize,
        got: usize,
    },

    /// More public inputs than inputs.
    #[error("{num_public_inputs} public inputs exceed {num_inputs} inputs")]
    InvalidPublicInputCount {
        num_public_inputs: usize,
        num_inputs: usize,
    },

    /// Requested bit length cannot be decomposed soundly in this field.
    #[error("Too many bits for binary decomposition: expected at most {expected}, got {n_bits}")]
    BinaryDecompositionTooManyBits { expected: usize, n_bits: usize },

    /// Invalid dimension: expected a specific number of elements.
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    /// More external inputs than wire ids can address.
    #[error("{num_inputs} inputs exceed the wire id range")]
    TooManyInputs { num_inputs: usize },

    /// An assertion whose operands fold to a constant that can never satisfy it.
    #[error("`{kind}` can never hold: its operand is the constant {value}")]
    UnsatisfiableAssertion { kind: &'static str, value: String },

    /// Division or inversion by the constant zero.
    #[error("`{op}` by the constant zero")]
    DivisionByZero { op: &'static str },

    /// Error raised by a user circuit definition.
    #[error("{0}")]
    UserError(String),

    /// The recorded circuit failed validation.
    #[error("Malformed circuit: {0}")]
    Malformed(Box<CircuitError>),
}

impl From<CircuitError> for CircuitBuilderError {
    fn from(error: CircuitError) -> Self {
        Self::Malformed(Box::new(error))
    }
}
