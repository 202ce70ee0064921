//! Shared helpers for the ecc-circuit integration tests.

use ecc_circuit::{CircuitBuilder, CircuitBuilderError, CircuitField, Define};
use tracing_forest::ForestLayer;
use tracing_forest::util::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

pub use p3_field;

/// Installs a forest logger filtered by `RUST_LOG` (default `INFO`).
///
/// Safe to call from every test: only the first call installs anything.
pub fn init_logger() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    // Every test calls this in one process; only the first call installs the
    // subscriber and later calls get an already-set error.
    let _ = Registry::default()
        .with(env_filter)
        .with(ForestLayer::default())
        .try_init();
}

/// One input, exposed unchanged as the only output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<F: CircuitField> Define<F> for Identity {
    fn num_inputs(&self) -> usize {
        1
    }

    fn define(&self, builder: &mut CircuitBuilder<F>) -> Result<(), CircuitBuilderError> {
        let x = builder.input(0)?;
        builder.output(&x);
        Ok(())
    }
}

/// Asserts that its two inputs differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertDifferent;

impl<F: CircuitField> Define<F> for AssertDifferent {
    fn num_inputs(&self) -> usize {
        2
    }

    fn define(&self, builder: &mut CircuitBuilder<F>) -> Result<(), CircuitBuilderError> {
        let a = builder.input(0)?;
        let b = builder.input(1)?;
        builder.assert_ne(&a, &b);
        Ok(())
    }
}

/// Asserts that its single input is non-zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertNonZero;

impl<F: CircuitField> Define<F> for AssertNonZero {
    fn num_inputs(&self) -> usize {
        1
    }

    fn define(&self, builder: &mut CircuitBuilder<F>) -> Result<(), CircuitBuilderError> {
        let x = builder.input(0)?;
        builder.assert_ne(&x, &builder.constant(F::ZERO));
        Ok(())
    }
}

/// `x_{i+1} = x_i^2 + x_i + 1` iterated `rounds` times, each round a shared
/// sub-circuit call. The first input is public.
#[derive(Debug, Clone, Copy)]
pub struct SquareChain {
    pub rounds: usize,
}

impl<F: CircuitField> Define<F> for SquareChain {
    fn num_inputs(&self) -> usize {
        1
    }

    fn num_public_inputs(&self) -> usize {
        1
    }

    fn define(&self, builder: &mut CircuitBuilder<F>) -> Result<(), CircuitBuilderError> {
        let step = builder.define_sub_circuit("square_step", 1, |sub| {
            let x = sub.input(0)?;
            let sq = sub.mul(&x, &x);
            let next = sub.add(&sq, &x);
            let next = sub.add(&next, &sub.constant_u64(1));
            sub.output(&next);
            Ok(())
        })?;

        let mut x = builder.input(0)?;
        for _ in 0..self.rounds {
            x = builder.call(step, &[x])?.remove(0);
        }
        builder.output(&x);
        Ok(())
    }
}

/// Native evaluation of [`SquareChain`].
pub fn square_chain_native<F: CircuitField>(x: F, rounds: usize) -> F {
    (0..rounds).fold(x, |x, _| x * x + x + F::ONE)
}
