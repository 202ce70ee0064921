//! Circuit builder module with specialized sub-components.

mod circuit_builder;
mod config;
mod errors;
mod sub_circuits;

pub use circuit_builder::CircuitBuilder;
pub use config::CompileConfig;
pub use errors::CircuitBuilderError;
