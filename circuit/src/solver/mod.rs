//! Input solver: evaluates a root circuit on concrete inputs and checks its
//! constraints.

mod config;
mod constraints;
mod input_solver;
mod witness;

pub use config::{HintMode, SolverConfig};
pub(crate) use input_solver::hint_names;
pub use input_solver::InputSolver;
pub use witness::{InstanceValues, Witness};
