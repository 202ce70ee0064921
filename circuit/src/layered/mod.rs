//! Layered circuits: the IR lowered into depth-ordered layers of gates.

mod circuit;
mod emitter;

pub use circuit::{Gate, GateKind, LayeredCircuit, LayeredStats};
pub use emitter::{emit_layered, LayeredEmitter};
