/// What the solver does when a hint function fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HintMode {
    /// Abort with `CircuitError::HintError`.
    #[default]
    Strict,
    /// Write zeros to the hint's outputs and let the constraint check report
    /// whichever constraint the zeros violate.
    Lenient,
}

/// Configuration for [`crate::InputSolver::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    /// Number of workers for the constraint check. Zero is treated as one.
    pub workers: usize,
    pub hint_mode: HintMode,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            hint_mode: HintMode::Strict,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub const fn with_hint_mode(mut self, hint_mode: HintMode) -> Self {
        self.hint_mode = hint_mode;
        self
    }

    pub(crate) const fn effective_workers(&self) -> usize {
        if self.workers == 0 { 1 } else { self.workers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_config_default() {
        let config = SolverConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.hint_mode, HintMode::Strict);
    }

    #[test]
    fn test_zero_workers_means_one() {
        let config = SolverConfig::new()
            .with_workers(0)
            .with_hint_mode(HintMode::Lenient);
        assert_eq!(config.effective_workers(), 1);
        assert_eq!(config.hint_mode, HintMode::Lenient);
    }
}
