use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use strum::EnumCount;
use strum_macros::EnumCount as EnumCountMacro;

use crate::errors::IrLocation;
use crate::field::{CircuitField, FieldKind};
use crate::types::SubCircuitId;
use crate::CircuitError;

/// Tag of a layered gate, as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCountMacro)]
#[repr(u8)]
pub enum GateKind {
    Input = 0,
    Constant = 1,
    Add = 2,
    Mul = 3,
}

impl GateKind {
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Input),
            1 => Some(Self::Constant),
            2 => Some(Self::Add),
            3 => Some(Self::Mul),
            _ => None,
        }
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// One gate of a layered circuit.
///
/// Operands index the concatenation of all gates of earlier layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate<F> {
    /// `inputs[index]`.
    Input { index: usize },
    Constant { value: F },
    /// `v[a] + coef * v[b]`.
    Add { a: usize, b: usize, coef: F },
    /// `coef * v[a] * v[b]`.
    Mul { a: usize, b: usize, coef: F },
}

impl<F> Gate<F> {
    pub const fn kind(&self) -> GateKind {
        match self {
            Self::Input { .. } => GateKind::Input,
            Self::Constant { .. } => GateKind::Constant,
            Self::Add { .. } => GateKind::Add,
            Self::Mul { .. } => GateKind::Mul,
        }
    }

    /// Operand indices of an `Add` or `Mul` gate.
    pub const fn operands(&self) -> Option<(usize, usize)> {
        match self {
            Self::Add { a, b, .. } | Self::Mul { a, b, .. } => Some((*a, *b)),
            Self::Input { .. } | Self::Constant { .. } => None,
        }
    }
}

/// Gate-level statistics of a layered circuit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayeredStats {
    pub layers: usize,
    /// Gates per kind.
    pub gates: [usize; GateKind::COUNT],
    pub widest_layer: usize,
    pub outputs: usize,
    pub constraints: usize,
}

impl LayeredStats {
    pub const fn count(&self, kind: GateKind) -> usize {
        self.gates[kind as usize]
    }

    pub fn total_gates(&self) -> usize {
        self.gates.iter().sum()
    }
}

/// A circuit lowered into layers of input, constant, add and mul gates.
///
/// Layer 0 holds the input gates, in input order, followed by the constant
/// gates. Every later layer only holds `Add` and `Mul` gates whose operands
/// live in strictly earlier layers.
///
/// The input vector is the external inputs followed by every hint output,
/// the same vector [`Witness::layered_inputs`](crate::Witness::layered_inputs)
/// returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeredCircuit<F> {
    num_inputs: usize,
    num_external_inputs: usize,
    num_public_inputs: usize,
    layers: Vec<Vec<Gate<F>>>,
    outputs: Vec<usize>,
    constraints: Vec<usize>,
}

impl<F: CircuitField> LayeredCircuit<F> {
    /// Assembles and validates a layered circuit.
    pub fn new(
        num_inputs: usize,
        num_external_inputs: usize,
        num_public_inputs: usize,
        layers: Vec<Vec<Gate<F>>>,
        outputs: Vec<usize>,
        constraints: Vec<usize>,
    ) -> Result<Self, CircuitError> {
        let circuit = Self {
            num_inputs,
            num_external_inputs,
            num_public_inputs,
            layers,
            outputs,
            constraints,
        };
        circuit.check()?;
        Ok(circuit)
    }

    fn check(&self) -> Result<(), CircuitError> {
        let malformed = |location: IrLocation, reason: String| CircuitError::MalformedIr {
            circuit: SubCircuitId::ENTRY,
            location,
            reason,
        };

        if self.num_public_inputs > self.num_external_inputs
            || self.num_external_inputs > self.num_inputs
        {
            return Err(malformed(
                IrLocation::Header,
                format!(
                    "expected public ({}) <= external ({}) <= total ({}) inputs",
                    self.num_public_inputs, self.num_external_inputs, self.num_inputs
                ),
            ));
        }
        if self.layers.is_empty() && self.num_inputs > 0 {
            return Err(malformed(
                IrLocation::Header,
                "input gates are missing".to_string(),
            ));
        }

        let mut start = 0;
        for (layer, gates) in self.layers.iter().enumerate() {
            for (index, gate) in gates.iter().enumerate() {
                let location = IrLocation::Gate { layer, index };
                match *gate {
                    Gate::Input { index: input } => {
                        if layer != 0 || input != index || input >= self.num_inputs {
                            return Err(malformed(
                                location,
                                format!("input {input} is out of place"),
                            ));
                        }
                    }
                    Gate::Constant { .. } => {
                        if layer != 0 || index < self.num_inputs {
                            return Err(malformed(
                                location,
                                "constant gate is out of place".to_string(),
                            ));
                        }
                    }
                    Gate::Add { a, b, .. } | Gate::Mul { a, b, .. } => {
                        if layer == 0 || a >= start || b >= start {
                            return Err(malformed(
                                location,
                                format!("operands ({a}, {b}) are not in an earlier layer"),
                            ));
                        }
                    }
                }
            }
            if layer == 0 && gates.len() < self.num_inputs {
                return Err(malformed(
                    IrLocation::Header,
                    format!(
                        "layer 0 holds {} gates, expected at least {} inputs",
                        gates.len(),
                        self.num_inputs
                    ),
                ));
            }
            start += gates.len();
        }

        if let Some((i, &o)) = self.outputs.iter().enumerate().find(|&(_, &o)| o >= start) {
            return Err(malformed(
                IrLocation::Output(i),
                format!("gate {o} does not exist"),
            ));
        }
        if let Some((i, &c)) = self
            .constraints
            .iter()
            .enumerate()
            .find(|&(_, &c)| c >= start)
        {
            return Err(malformed(
                IrLocation::Constraint(i),
                format!("gate {c} does not exist"),
            ));
        }
        Ok(())
    }

    pub const fn field(&self) -> FieldKind {
        F::KIND
    }

    /// Length of the input vector: external inputs plus hint outputs.
    pub const fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub const fn num_external_inputs(&self) -> usize {
        self.num_external_inputs
    }

    pub const fn num_public_inputs(&self) -> usize {
        self.num_public_inputs
    }

    pub fn layers(&self) -> &[Vec<Gate<F>>] {
        &self.layers
    }

    pub fn num_gates(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Indices of the gates exposed as outputs.
    pub fn outputs(&self) -> &[usize] {
        &self.outputs
    }

    /// Indices of the gates that must evaluate to zero.
    pub fn constraints(&self) -> &[usize] {
        &self.constraints
    }

    pub fn stats(&self) -> LayeredStats {
        let mut gates = [0; GateKind::COUNT];
        for gate in self.layers.iter().flatten() {
            gates[gate.kind() as usize] += 1;
        }
        LayeredStats {
            layers: self.layers.len(),
            gates,
            widest_layer: self.layers.iter().map(Vec::len).max().unwrap_or(0),
            outputs: self.outputs.len(),
            constraints: self.constraints.len(),
        }
    }

    /// Evaluates every gate on `inputs`, checks the constraint gates and
    /// returns the output values.
    ///
    /// A non-zero constraint gate is reported as a
    /// [`CircuitError::ConstraintViolation`] whose index is the position in
    /// [`Self::constraints`].
    pub fn evaluate(&self, inputs: &[F]) -> Result<Vec<F>, CircuitError> {
        if inputs.len() != self.num_inputs {
            return Err(CircuitError::InputLengthMismatch {
                expected: self.num_inputs,
                got: inputs.len(),
            });
        }

        let mut values: Vec<F> = Vec::with_capacity(self.num_gates());
        for gate in self.layers.iter().flatten() {
            let value = match *gate {
                Gate::Input { index } => inputs[index],
                Gate::Constant { value } => value,
                Gate::Add { a, b, coef } => values[a] + coef * values[b],
                Gate::Mul { a, b, coef } => coef * values[a] * values[b],
            };
            values.push(value);
        }

        if let Some((index, value)) = self
            .constraints
            .iter()
            .map(|&c| values[c])
            .enumerate()
            .find(|(_, value)| !value.is_zero())
        {
            return Err(CircuitError::ConstraintViolation {
                circuit: SubCircuitId::ENTRY,
                index,
                value: value.to_string(),
            });
        }
        Ok(self.outputs.iter().map(|&o| values[o]).collect())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use p3_field::PrimeCharacteristicRing;
    use p3_mersenne_31::Mersenne31;

    use super::*;

    type F = Mersenne31;

    fn f(v: u64) -> F {
        F::from_u64(v)
    }

    /// out = 3 * x * (x + 2 * y), constraint x - 5
    fn sample() -> LayeredCircuit<F> {
        LayeredCircuit::new(
            2,
            2,
            1,
            vec![
                vec![
                    Gate::Input { index: 0 },
                    Gate::Input { index: 1 },
                    Gate::Constant { value: f(5) },
                ],
                vec![
                    Gate::Add {
                        a: 0,
                        b: 1,
                        coef: f(2),
                    },
                    Gate::Add {
                        a: 0,
                        b: 2,
                        coef: -F::ONE,
                    },
                ],
                vec![Gate::Mul {
                    a: 0,
                    b: 3,
                    coef: f(3),
                }],
            ],
            vec![5],
            vec![4],
        )
        .unwrap()
    }

    #[test]
    fn test_evaluate() {
        let circuit = sample();
        assert_eq!(circuit.evaluate(&[f(5), f(1)]).unwrap(), vec![f(105)]);

        let err = circuit.evaluate(&[f(4), f(1)]).unwrap_err();
        assert!(matches!(
            err,
            CircuitError::ConstraintViolation { index: 0, ref value, .. } if value == "2147483646"
        ));

        let err = circuit.evaluate(&[f(4)]).unwrap_err();
        assert!(matches!(
            err,
            CircuitError::InputLengthMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(stats.layers, 3);
        assert_eq!(stats.count(GateKind::Input), 2);
        assert_eq!(stats.count(GateKind::Constant), 1);
        assert_eq!(stats.count(GateKind::Add), 2);
        assert_eq!(stats.count(GateKind::Mul), 1);
        assert_eq!(stats.widest_layer, 3);
        assert_eq!(stats.total_gates(), 6);
    }

    #[test]
    fn test_rejects_operand_in_same_layer() {
        let err = LayeredCircuit::<F>::new(
            1,
            1,
            0,
            vec![
                vec![Gate::Input { index: 0 }],
                vec![
                    Gate::Add {
                        a: 0,
                        b: 0,
                        coef: F::ONE,
                    },
                    Gate::Mul {
                        a: 0,
                        b: 1,
                        coef: F::ONE,
                    },
                ],
            ],
            vec![2],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CircuitError::MalformedIr {
                location: IrLocation::Gate { layer: 1, index: 1 },
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_misplaced_inputs() {
        let err = LayeredCircuit::<F>::new(
            2,
            2,
            0,
            vec![vec![Gate::Input { index: 1 }, Gate::Input { index: 0 }]],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, CircuitError::MalformedIr { .. }));

        let err = LayeredCircuit::<F>::new(1, 2, 0, vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(
            err,
            CircuitError::MalformedIr {
                location: IrLocation::Header,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_dangling_output() {
        let err = LayeredCircuit::<F>::new(
            1,
            1,
            0,
            vec![vec![Gate::Input { index: 0 }]],
            vec![1],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CircuitError::MalformedIr {
                location: IrLocation::Output(0),
                ..
            }
        ));
    }
}
