#![no_std]
extern crate alloc;
#[cfg(feature = "parallel")]
extern crate std;

pub mod any;
pub mod builder;
pub mod circuit;
pub mod compile;
pub mod errors;
pub mod expr;
pub mod field;
pub mod hints;
pub mod instruction;
pub mod layered;
pub mod serialization;
pub mod solver;
pub mod types;

// Re-export public API
pub use any::{AnyInputSolver, AnyLayeredCircuit, AnyRootCircuit, compile_for_modulus};
pub use builder::{CircuitBuilder, CircuitBuilderError, CompileConfig};
pub use circuit::{Circuit, CircuitStats, ExpandedCounts, RootCircuit};
pub use compile::{CompileResult, Define, compile};
pub use errors::{CircuitError, HintFailure, IrLocation};
pub use expr::{Expression, Term};
pub use field::{Bn254, CircuitField, FieldKind, Mersenne31};
pub use hints::{Hint, HintRegistry};
pub use instruction::{Instruction, InstructionKind};
pub use layered::{Gate, GateKind, LayeredCircuit, LayeredEmitter, LayeredStats, emit_layered};
pub use serialization::{DeserializeBytes, SerializationError, SerializeBytes, peek_field};
pub use solver::{HintMode, InputSolver, InstanceValues, SolverConfig, Witness};
pub use types::{SubCircuitId, WireAllocator, WireId};
