use tracing::{debug, instrument};

use crate::builder::{CircuitBuilder, CircuitBuilderError, CompileConfig};
use crate::field::CircuitField;
use crate::layered::{emit_layered, LayeredCircuit};
use crate::solver::InputSolver;
use crate::CircuitError;

/// A circuit definition: its input counts and the body recorded on a
/// [`CircuitBuilder`].
///
/// Implement it for every field the circuit should compile over.
pub trait Define<F: CircuitField> {
    fn num_inputs(&self) -> usize;

    /// Number of leading inputs that are public.
    fn num_public_inputs(&self) -> usize {
        0
    }

    fn define(&self, builder: &mut CircuitBuilder<F>) -> Result<(), CircuitBuilderError>;
}

/// Both artifacts of a compiled circuit.
#[derive(Debug, Clone)]
pub struct CompileResult<F> {
    pub solver: InputSolver<F>,
    pub layered: LayeredCircuit<F>,
}

/// Records `circuit`, freezes it and emits the input solver and the layered
/// circuit.
#[instrument(skip_all)]
pub fn compile<F, C>(circuit: &C, config: &CompileConfig<F>) -> Result<CompileResult<F>, CircuitError>
where
    F: CircuitField,
    C: Define<F> + ?Sized,
{
    let mut builder = CircuitBuilder::new(circuit.num_inputs(), circuit.num_public_inputs())?
        .with_hints(config.hints.clone());
    circuit.define(&mut builder)?;
    let root = if config.validate {
        builder.build()?
    } else {
        builder.build_unchecked()?
    };

    if let Ok(stats) = root.stats() {
        let field = F::KIND;
        debug!(
            %field,
            circuits = stats.num_circuits,
            constraints = stats.constraints,
            expanded_muls = stats.expanded.muls,
            expanded_constraints = stats.expanded.constraints,
            "compiled root circuit"
        );
    }

    let layered = emit_layered(&root, config.dead_code_elimination)?;
    let solver = InputSolver::new(root, config.hints.clone())?;
    Ok(CompileResult { solver, layered })
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use p3_bn254::Bn254;
    use p3_field::PrimeCharacteristicRing;
    use p3_mersenne_31::Mersenne31;

    use super::*;
    use crate::solver::SolverConfig;

    /// out = x^3 + x + 5, with x public.
    struct Cubic;

    impl<F: CircuitField> Define<F> for Cubic {
        fn num_inputs(&self) -> usize {
            1
        }

        fn num_public_inputs(&self) -> usize {
            1
        }

        fn define(&self, builder: &mut CircuitBuilder<F>) -> Result<(), CircuitBuilderError> {
            let x = builder.input(0)?;
            let sq = builder.mul(&x, &x);
            let cube = builder.mul(&sq, &x);
            let out = builder.add(&cube, &x);
            let out = builder.add(&out, &builder.constant_u64(5));
            builder.output(&out);
            Ok(())
        }
    }

    struct Failing;

    impl Define<Mersenne31> for Failing {
        fn num_inputs(&self) -> usize {
            0
        }

        fn define(&self, _: &mut CircuitBuilder<Mersenne31>) -> Result<(), CircuitBuilderError> {
            Err(CircuitBuilderError::UserError("refused".to_string()))
        }
    }

    fn check_cubic<F: CircuitField>() {
        let compiled = compile::<F, _>(&Cubic, &CompileConfig::default()).unwrap();
        let witness = compiled
            .solver
            .solve(&[F::from_u64(3)], &SolverConfig::default())
            .unwrap();
        assert_eq!(witness.outputs(), &[F::from_u64(35)]);
        assert_eq!(
            compiled.layered.evaluate(witness.layered_inputs()).unwrap(),
            witness.outputs()
        );
        assert_eq!(compiled.layered.num_public_inputs(), 1);
    }

    #[test]
    fn test_compile_over_both_fields() {
        check_cubic::<Bn254>();
        check_cubic::<Mersenne31>();
    }

    #[test]
    fn test_user_error_is_propagated() {
        let err = compile::<Mersenne31, _>(&Failing, &CompileConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            CircuitError::InvalidCircuit {
                error: CircuitBuilderError::UserError(ref msg)
            } if msg == "refused"
        ));
    }
}
