//! Named prover-side functions invoked by `Hint` instructions.
//!
//! Instructions refer to hints by name only, so a registry has to be supplied
//! again when a serialized solver is loaded. The builtins below are always
//! available under the same names.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::errors::HintFailure;
use crate::field::CircuitField;
use crate::CircuitError;

/// Stable names of the builtin hints.
pub mod builtin {
    /// `[x] -> [x^-1]`, fails on zero.
    pub const INVERSE: &str = "inverse";
    /// `[a, b] -> [a / b]`, fails when `b` is zero.
    pub const DIV: &str = "div";
    /// `[x] -> n little-endian bits of x`, fails if `x >= 2^n`.
    pub const TO_BINARY: &str = "to_binary";
    /// Copies its inputs.
    pub const IDENTITY: &str = "identity";
    /// `[x] -> [1]` if `x` is zero, `[0]` otherwise.
    pub const IS_ZERO: &str = "is_zero";
    /// `[x] -> [x^-1]`, or `[0]` when `x` is zero.
    pub const INVERSE_OR_ZERO: &str = "inverse_or_zero";
}

/// A deterministic function from input values to `n_outputs` output values.
pub trait Hint<F>: Send + Sync {
    fn compute(&self, inputs: &[F], n_outputs: usize) -> Result<Vec<F>, HintFailure>;
}

impl<F, T> Hint<F> for T
where
    T: Fn(&[F], usize) -> Result<Vec<F>, HintFailure> + Send + Sync,
{
    fn compute(&self, inputs: &[F], n_outputs: usize) -> Result<Vec<F>, HintFailure> {
        self(inputs, n_outputs)
    }
}

/// Name-indexed hint table.
pub struct HintRegistry<F> {
    hints: BTreeMap<String, Arc<dyn Hint<F>>>,
}

impl<F> Clone for HintRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            hints: self.hints.clone(),
        }
    }
}

impl<F> fmt::Debug for HintRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hints.keys()).finish()
    }
}

impl<F: CircuitField> Default for HintRegistry<F> {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn expect_arity(got: usize, expected: usize, outputs: bool) -> Result<(), HintFailure> {
    if got == expected {
        Ok(())
    } else if outputs {
        Err(HintFailure::OutputCount { expected, got })
    } else {
        Err(HintFailure::InputCount { expected, got })
    }
}

fn inverse<F: CircuitField>(inputs: &[F], n_outputs: usize) -> Result<Vec<F>, HintFailure> {
    expect_arity(inputs.len(), 1, false)?;
    expect_arity(n_outputs, 1, true)?;
    let inv = inputs[0].try_inverse().ok_or(HintFailure::DivisionByZero)?;
    Ok(vec![inv])
}

fn inverse_or_zero<F: CircuitField>(inputs: &[F], n_outputs: usize) -> Result<Vec<F>, HintFailure> {
    expect_arity(inputs.len(), 1, false)?;
    expect_arity(n_outputs, 1, true)?;
    Ok(vec![inputs[0].try_inverse().unwrap_or(F::ZERO)])
}

fn div<F: CircuitField>(inputs: &[F], n_outputs: usize) -> Result<Vec<F>, HintFailure> {
    expect_arity(inputs.len(), 2, false)?;
    expect_arity(n_outputs, 1, true)?;
    let inv = inputs[1].try_inverse().ok_or(HintFailure::DivisionByZero)?;
    Ok(vec![inputs[0] * inv])
}

fn to_binary<F: CircuitField>(inputs: &[F], n_outputs: usize) -> Result<Vec<F>, HintFailure> {
    expect_arity(inputs.len(), 1, false)?;
    let value = inputs[0].as_canonical_biguint();
    if value.bits() > n_outputs as u64 {
        return Err(HintFailure::ValueOutOfRange { bits: n_outputs });
    }
    Ok((0..n_outputs as u64)
        .map(|i| if value.bit(i) { F::ONE } else { F::ZERO })
        .collect())
}

fn identity<F: CircuitField>(inputs: &[F], n_outputs: usize) -> Result<Vec<F>, HintFailure> {
    expect_arity(n_outputs, inputs.len(), true)?;
    Ok(inputs.to_vec())
}

fn is_zero<F: CircuitField>(inputs: &[F], n_outputs: usize) -> Result<Vec<F>, HintFailure> {
    expect_arity(inputs.len(), 1, false)?;
    expect_arity(n_outputs, 1, true)?;
    Ok(vec![if inputs[0].is_zero() { F::ONE } else { F::ZERO }])
}

impl<F: CircuitField> HintRegistry<F> {
    /// A registry without any hint, not even the builtins.
    pub const fn empty() -> Self {
        Self {
            hints: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .register(builtin::INVERSE, inverse::<F>)
            .register(builtin::DIV, div::<F>)
            .register(builtin::TO_BINARY, to_binary::<F>)
            .register(builtin::IDENTITY, identity::<F>)
            .register(builtin::IS_ZERO, is_zero::<F>)
            .register(builtin::INVERSE_OR_ZERO, inverse_or_zero::<F>);
        registry
    }

    /// Registers `hint` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, hint: impl Hint<F> + 'static) -> &mut Self {
        self.hints.insert(name.into(), Arc::new(hint));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hints.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.hints.keys().map(String::as_str)
    }

    /// Runs the hint `name` and checks it returned exactly `n_outputs` values.
    pub fn call(&self, name: &str, inputs: &[F], n_outputs: usize) -> Result<Vec<F>, CircuitError> {
        let hint = self.hints.get(name).ok_or_else(|| CircuitError::UnknownHint {
            name: name.to_string(),
        })?;
        let hint_error = |failure: HintFailure| CircuitError::HintError {
            name: name.to_string(),
            inputs: inputs.iter().map(ToString::to_string).collect(),
            failure,
        };
        let outputs = hint.compute(inputs, n_outputs).map_err(&hint_error)?;
        if outputs.len() != n_outputs {
            return Err(hint_error(HintFailure::OutputCount {
                expected: n_outputs,
                got: outputs.len(),
            }));
        }
        Ok(outputs)
    }
}
