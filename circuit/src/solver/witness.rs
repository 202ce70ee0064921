use alloc::vec::Vec;

use crate::types::{SubCircuitId, WireId};

/// Wire values of one solved circuit instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceValues<F> {
    pub circuit: SubCircuitId,
    /// Indexed by wire id; `values[0]` is one.
    pub values: Vec<F>,
}

/// Result of a successful solve.
///
/// Instances are stored in call pre-order: the entry circuit is instance 0
/// and every sub-circuit call appears right after its caller's earlier calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness<F> {
    pub(crate) instances: Vec<InstanceValues<F>>,
    pub(crate) outputs: Vec<F>,
    pub(crate) layered_inputs: Vec<F>,
    pub(crate) num_public_inputs: usize,
}

impl<F: Copy> Witness<F> {
    /// Full wire vector of the entry circuit.
    pub fn values(&self) -> &[F] {
        self.instances
            .first()
            .map_or(&[], |instance| instance.values.as_slice())
    }

    pub fn value(&self, wire: WireId) -> Option<F> {
        self.values().get(wire.index()).copied()
    }

    pub fn instances(&self) -> &[InstanceValues<F>] {
        &self.instances
    }

    /// Values of the entry circuit's outputs.
    pub fn outputs(&self) -> &[F] {
        &self.outputs
    }

    /// Values of the public inputs, a prefix of the external inputs.
    pub fn public_inputs(&self) -> &[F] {
        let values = self.values();
        let end = (1 + self.num_public_inputs).min(values.len());
        values.get(1..end).unwrap_or(&[])
    }

    /// Input vector of the layered circuit: the external inputs followed by
    /// every hint output in depth-first instruction order.
    pub fn layered_inputs(&self) -> &[F] {
        &self.layered_inputs
    }
}
