use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use num_bigint::BigUint;
use thiserror::Error;

use crate::field::FieldKind;
use crate::serialization::SerializationError;
use crate::types::SubCircuitId;
use crate::CircuitBuilderError;

/// Errors that can occur while validating, solving, emitting or decoding a circuit.
#[derive(Debug, Error)]
pub enum CircuitError {
    /// No backend matches the requested modulus.
    #[error("Unknown field: no backend for modulus {modulus}")]
    UnknownField { modulus: BigUint },

    /// An artifact was produced for a different field than the one requested.
    #[error("Field mismatch: expected {expected}, got {got}")]
    FieldMismatch { expected: FieldKind, got: FieldKind },

    /// An IR invariant does not hold.
    #[error("Malformed IR in {circuit} at {location}: {reason}")]
    MalformedIr {
        circuit: SubCircuitId,
        location: IrLocation,
        reason: String,
    },

    /// A hint function failed during solving.
    #[error("Hint `{name}` failed on inputs [{}]: {failure}", inputs.join(", "))]
    HintError {
        name: String,
        inputs: Vec<String>,
        failure: HintFailure,
    },

    /// A constraint evaluated to a non-zero value.
    #[error("Constraint {index} of {circuit} is violated: evaluates to {value}")]
    ConstraintViolation {
        circuit: SubCircuitId,
        index: usize,
        value: String,
    },

    /// Wrong number of external inputs supplied to a solve or evaluation.
    #[error("Input length mismatch: expected {expected}, got {got}")]
    InputLengthMismatch { expected: usize, got: usize },

    /// A hint referenced by name is missing from the registry.
    #[error("Unknown hint `{name}`")]
    UnknownHint { name: String },

    /// The constraint worker pool could not be started.
    #[error("Worker pool error: {reason}")]
    WorkerPool { reason: String },

    /// Decoding or encoding an artifact failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Invalid Circuit
    #[error("Failed to build circuit: {error}")]
    InvalidCircuit { error: CircuitBuilderError },
}

impl From<CircuitBuilderError> for CircuitError {
    fn from(error: CircuitBuilderError) -> Self {
        Self::InvalidCircuit { error }
    }
}

/// Position inside a circuit that an IR error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrLocation {
    Instruction(usize),
    Constraint(usize),
    Output(usize),
    /// A gate of a layered circuit.
    Gate { layer: usize, index: usize },
    Header,
}

impl fmt::Display for IrLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instruction(i) => write!(f, "instruction {i}"),
            Self::Constraint(i) => write!(f, "constraint {i}"),
            Self::Output(i) => write!(f, "output {i}"),
            Self::Gate { layer, index } => write!(f, "gate {index} of layer {layer}"),
            Self::Header => write!(f, "header"),
        }
    }
}

/// Failure reported by a hint function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HintFailure {
    #[error("division by zero")]
    DivisionByZero,

    #[error("expected {expected} inputs, got {got}")]
    InputCount { expected: usize, got: usize },

    #[error("expected {expected} outputs, got {got}")]
    OutputCount { expected: usize, got: usize },

    /// The value does not fit in the requested number of bits.
    #[error("value does not fit in {bits} bits")]
    ValueOutOfRange { bits: usize },

    #[error("{0}")]
    Custom(String),
}
