use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::circuit::Circuit;
use crate::field::CircuitField;
use crate::types::SubCircuitId;

/// Sub-circuits defined so far, keyed by the caller-chosen name.
///
/// Ids are handed out in definition order starting at 1; the entry circuit
/// keeps [`SubCircuitId::ENTRY`].
#[derive(Debug, Clone)]
pub(crate) struct SubCircuitRegistry<F> {
    by_key: BTreeMap<String, SubCircuitId>,
    circuits: BTreeMap<SubCircuitId, Circuit<F>>,
    next_id: u64,
}

impl<F> Default for SubCircuitRegistry<F> {
    fn default() -> Self {
        Self {
            by_key: BTreeMap::new(),
            circuits: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Registry state to return to when a definition fails.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint(u64);

impl<F: CircuitField> SubCircuitRegistry<F> {
    pub(crate) fn lookup(&self, key: &str) -> Option<SubCircuitId> {
        self.by_key.get(key).copied()
    }

    pub(crate) fn get(&self, id: SubCircuitId) -> Option<&Circuit<F>> {
        self.circuits.get(&id)
    }

    pub(crate) fn insert(&mut self, key: String, circuit: Circuit<F>) -> SubCircuitId {
        let id = SubCircuitId(self.next_id);
        self.next_id += 1;
        self.by_key.insert(key, id);
        self.circuits.insert(id, circuit);
        id
    }

    pub(crate) const fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.next_id)
    }

    /// Forgets every definition made after `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        let Checkpoint(first_dropped) = checkpoint;
        self.circuits.retain(|id, _| id.0 < first_dropped);
        self.by_key.retain(|_, id| id.0 < first_dropped);
        self.next_id = first_dropped;
    }

    pub(crate) fn into_circuits(self) -> BTreeMap<SubCircuitId, Circuit<F>> {
        self.circuits
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use p3_mersenne_31::Mersenne31;

    use super::*;

    fn empty_circuit(num_inputs: usize) -> Circuit<Mersenne31> {
        Circuit::from_parts(num_inputs, 0, vec![], vec![], vec![])
    }

    #[test]
    fn test_ids_in_definition_order() {
        let mut registry = SubCircuitRegistry::default();
        let a = registry.insert("a".into(), empty_circuit(1));
        let b = registry.insert("b".into(), empty_circuit(2));

        assert_eq!(a, SubCircuitId(1));
        assert_eq!(b, SubCircuitId(2));
        assert_eq!(registry.lookup("b"), Some(b));
        assert_eq!(registry.get(a).unwrap().num_inputs(), 1);
    }

    #[test]
    fn test_rollback() {
        let mut registry = SubCircuitRegistry::default();
        registry.insert("kept".into(), empty_circuit(1));
        let checkpoint = registry.checkpoint();
        registry.insert("dropped".into(), empty_circuit(1));

        registry.rollback(checkpoint);

        assert_eq!(registry.lookup("dropped"), None);
        assert_eq!(registry.lookup("kept"), Some(SubCircuitId(1)));
        assert_eq!(registry.insert("again".into(), empty_circuit(0)), SubCircuitId(2));
        assert_eq!(registry.into_circuits().len(), 2);
    }
}
