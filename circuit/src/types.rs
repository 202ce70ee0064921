use core::fmt;

use serde::{Deserialize, Serialize};

/// Wire identifier: a dense index into a circuit's value vector.
///
/// Wire 0 always carries the constant one, wires `1..=n_ext` are external inputs,
/// and every wire after that is produced by exactly one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireId(pub u32);

impl WireId {
    /// The wire that holds the constant one.
    pub const ONE: Self = Self(0);

    /// Wire carrying the `index`-th external input.
    ///
    /// `index` must be below `u32::MAX`; `CircuitBuilder::new` rejects larger input counts.
    pub const fn input(index: usize) -> Self {
        debug_assert!(index < u32::MAX as usize, "input index exceeds the wire id range");
        Self(index as u32 + 1)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Identifier of a circuit inside a root circuit. Id 0 is the entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubCircuitId(pub u64);

impl SubCircuitId {
    /// The entry circuit.
    pub const ENTRY: Self = Self(0);
}

impl fmt::Display for SubCircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub{}", self.0)
    }
}

/// Wire allocator for monotonic index assignment.
///
/// Starts right after the external inputs so that instruction outputs are
/// sequential, which is what the IR validator expects.
#[derive(Debug, Clone)]
pub struct WireAllocator {
    next_idx: u32,
}

impl WireAllocator {
    /// Allocator for a circuit with `num_inputs` external inputs.
    pub const fn new(num_inputs: usize) -> Self {
        debug_assert!(num_inputs < u32::MAX as usize, "input count exceeds the wire id range");
        Self {
            next_idx: num_inputs as u32 + 1,
        }
    }

    pub const fn alloc(&mut self) -> WireId {
        let idx = WireId(self.next_idx);
        self.next_idx += 1;
        idx
    }

    /// Total number of wires, including the constant wire and the inputs.
    pub const fn wire_count(&self) -> u32 {
        self.next_idx
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn test_wire_id_display() {
        assert_eq!(format!("{}", WireId(42)), "w42");
        assert_eq!(format!("{}", SubCircuitId(3)), "sub3");
    }

    #[test]
    fn test_input_wires_skip_constant() {
        assert_eq!(WireId::input(0), WireId(1));
        assert_eq!(WireId::input(9), WireId(10));
    }

    #[test]
    fn test_wire_allocator() {
        let mut allocator = WireAllocator::new(2);

        let w0 = allocator.alloc();
        let w1 = allocator.alloc();

        assert_eq!(w0, WireId(3));
        assert_eq!(w1, WireId(4));
        assert_eq!(allocator.wire_count(), 5);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "input count exceeds the wire id range")]
    fn test_wire_allocator_rejects_oversized_input_count() {
        let _ = WireAllocator::new(u32::MAX as usize);
    }

    #[test]
    fn test_largest_input_index() {
        assert_eq!(WireId::input(u32::MAX as usize - 1), WireId(u32::MAX));
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn wire_id_ordering(a in 0u32..u32::MAX, b in 0u32..u32::MAX) {
                prop_assert_eq!(WireId(a).cmp(&WireId(b)), a.cmp(&b));
            }

            #[test]
            fn wire_allocator_unique(inputs in 0usize..64, count in 1usize..100) {
                let mut allocator = WireAllocator::new(inputs);
                let mut seen = hashbrown::HashSet::new();

                for _ in 0..count {
                    let id = allocator.alloc();
                    prop_assert!(id.index() > inputs, "outputs must come after inputs");
                    prop_assert!(seen.insert(id), "each allocation should be unique");
                }
                prop_assert_eq!(allocator.wire_count() as usize, 1 + inputs + count);
            }
        }
    }
}
