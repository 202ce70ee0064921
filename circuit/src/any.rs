//! Field-erased wrappers, for callers that only learn the field at runtime
//! from a modulus or from an artifact header.

use alloc::vec::Vec;

use num_bigint::BigUint;

use crate::builder::CompileConfig;
use crate::compile::{compile, CompileResult, Define};
use crate::field::{Bn254, FieldKind, Mersenne31};
use crate::hints::HintRegistry;
use crate::layered::{LayeredCircuit, LayeredStats};
use crate::serialization::peek_field;
use crate::solver::InputSolver;
use crate::{CircuitError, RootCircuit};

/// A root circuit over one of the supported fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyRootCircuit {
    Bn254(RootCircuit<Bn254>),
    Mersenne31(RootCircuit<Mersenne31>),
}

/// An input solver over one of the supported fields.
#[derive(Debug, Clone)]
pub enum AnyInputSolver {
    Bn254(InputSolver<Bn254>),
    Mersenne31(InputSolver<Mersenne31>),
}

/// A layered circuit over one of the supported fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyLayeredCircuit {
    Bn254(LayeredCircuit<Bn254>),
    Mersenne31(LayeredCircuit<Mersenne31>),
}

impl AnyRootCircuit {
    pub const fn field(&self) -> FieldKind {
        match self {
            Self::Bn254(_) => FieldKind::Bn254,
            Self::Mersenne31(_) => FieldKind::Mersenne31,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CircuitError> {
        match self {
            Self::Bn254(root) => root.to_bytes(),
            Self::Mersenne31(root) => root.to_bytes(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CircuitError> {
        Ok(match peek_field(bytes)? {
            FieldKind::Bn254 => Self::Bn254(RootCircuit::from_bytes(bytes)?),
            FieldKind::Mersenne31 => Self::Mersenne31(RootCircuit::from_bytes(bytes)?),
        })
    }
}

impl AnyInputSolver {
    pub const fn field(&self) -> FieldKind {
        match self {
            Self::Bn254(_) => FieldKind::Bn254,
            Self::Mersenne31(_) => FieldKind::Mersenne31,
        }
    }

    pub const fn num_inputs(&self) -> usize {
        match self {
            Self::Bn254(solver) => solver.num_inputs(),
            Self::Mersenne31(solver) => solver.num_inputs(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CircuitError> {
        match self {
            Self::Bn254(solver) => solver.to_bytes(),
            Self::Mersenne31(solver) => solver.to_bytes(),
        }
    }

    /// Decodes a solver blob, binding its hints against the builtin registry.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CircuitError> {
        Ok(match peek_field(bytes)? {
            FieldKind::Bn254 => {
                Self::Bn254(InputSolver::from_bytes(bytes, HintRegistry::with_builtins())?)
            }
            FieldKind::Mersenne31 => {
                Self::Mersenne31(InputSolver::from_bytes(bytes, HintRegistry::with_builtins())?)
            }
        })
    }
}

impl AnyLayeredCircuit {
    pub const fn field(&self) -> FieldKind {
        match self {
            Self::Bn254(_) => FieldKind::Bn254,
            Self::Mersenne31(_) => FieldKind::Mersenne31,
        }
    }

    pub fn stats(&self) -> LayeredStats {
        match self {
            Self::Bn254(layered) => layered.stats(),
            Self::Mersenne31(layered) => layered.stats(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CircuitError> {
        match self {
            Self::Bn254(layered) => layered.to_bytes(),
            Self::Mersenne31(layered) => layered.to_bytes(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CircuitError> {
        Ok(match peek_field(bytes)? {
            FieldKind::Bn254 => Self::Bn254(LayeredCircuit::from_bytes(bytes)?),
            FieldKind::Mersenne31 => Self::Mersenne31(LayeredCircuit::from_bytes(bytes)?),
        })
    }
}

/// Compiles `circuit` over the field whose modulus is `modulus`, with the
/// default configuration and builtin hints.
///
/// Fails with [`CircuitError::UnknownField`] before recording anything when
/// no backend matches.
pub fn compile_for_modulus<C>(
    modulus: &BigUint,
    circuit: &C,
) -> Result<(AnyInputSolver, AnyLayeredCircuit), CircuitError>
where
    C: Define<Bn254> + Define<Mersenne31> + ?Sized,
{
    Ok(match FieldKind::from_modulus(modulus)? {
        FieldKind::Bn254 => {
            let CompileResult { solver, layered } =
                compile::<Bn254, C>(circuit, &CompileConfig::default())?;
            (AnyInputSolver::Bn254(solver), AnyLayeredCircuit::Bn254(layered))
        }
        FieldKind::Mersenne31 => {
            let CompileResult { solver, layered } =
                compile::<Mersenne31, C>(circuit, &CompileConfig::default())?;
            (
                AnyInputSolver::Mersenne31(solver),
                AnyLayeredCircuit::Mersenne31(layered),
            )
        }
    })
}
