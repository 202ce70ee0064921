use crate::field::CircuitField;
use crate::hints::HintRegistry;

/// Configuration for [`crate::compile`].
#[derive(Debug, Clone)]
pub struct CompileConfig<F> {
    /// Drop layered gates that reach neither an output nor a constraint.
    pub dead_code_elimination: bool,
    /// Validate the recorded IR before emitting artifacts.
    pub validate: bool,
    /// Hints available to the circuit definition and the solver.
    pub hints: HintRegistry<F>,
}

impl<F: CircuitField> Default for CompileConfig<F> {
    fn default() -> Self {
        Self {
            dead_code_elimination: true,
            validate: true,
            hints: HintRegistry::with_builtins(),
        }
    }
}

impl<F: CircuitField> CompileConfig<F> {
    /// Creates a new compile configuration with the builtin hints.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dead_code_elimination(mut self, enabled: bool) -> Self {
        self.dead_code_elimination = enabled;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    pub fn with_hints(mut self, hints: HintRegistry<F>) -> Self {
        self.hints = hints;
        self
    }
}

#[cfg(test)]
mod tests {
    use p3_mersenne_31::Mersenne31;

    use super::*;
    use crate::hints::builtin;

    #[test]
    fn test_compile_config_default() {
        let config = CompileConfig::<Mersenne31>::default();
        assert!(config.dead_code_elimination);
        assert!(config.validate);
        assert!(config.hints.contains(builtin::INVERSE));
    }

    #[test]
    fn test_compile_config_overrides() {
        let config = CompileConfig::<Mersenne31>::new()
            .with_dead_code_elimination(false)
            .with_validation(false)
            .with_hints(HintRegistry::empty());

        assert!(!config.dead_code_elimination);
        assert!(!config.validate);
        assert_eq!(config.hints.names().count(), 0);
    }
}
