use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use strum::EnumCount;

use crate::errors::IrLocation;
use crate::expr::Expression;
use crate::field::{CircuitField, FieldKind};
use crate::instruction::{Instruction, InstructionKind};
use crate::types::{SubCircuitId, WireId};
use crate::CircuitError;

/// A single circuit body: instructions in evaluation order, the constraints
/// that must vanish and the expressions exposed as outputs.
///
/// Wire 0 is the constant one, wires `1..=num_inputs` are the external inputs
/// and the first `num_public_inputs` of those are public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit<F> {
    num_inputs: usize,
    num_public_inputs: usize,
    instructions: Vec<Instruction<F>>,
    constraints: Vec<Expression<F>>,
    outputs: Vec<Expression<F>>,
}

impl<F: CircuitField> Circuit<F> {
    /// Assembles a circuit without checking it. [`RootCircuit::new`] validates.
    pub const fn from_parts(
        num_inputs: usize,
        num_public_inputs: usize,
        instructions: Vec<Instruction<F>>,
        constraints: Vec<Expression<F>>,
        outputs: Vec<Expression<F>>,
    ) -> Self {
        Self {
            num_inputs,
            num_public_inputs,
            instructions,
            constraints,
            outputs,
        }
    }

    pub const fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub const fn num_public_inputs(&self) -> usize {
        self.num_public_inputs
    }

    pub fn instructions(&self) -> &[Instruction<F>] {
        &self.instructions
    }

    pub fn constraints(&self) -> &[Expression<F>] {
        &self.constraints
    }

    pub fn outputs(&self) -> &[Expression<F>] {
        &self.outputs
    }

    /// Length of the value vector: the constant wire, the inputs and every
    /// instruction output.
    pub fn num_wires(&self) -> usize {
        1 + self.num_inputs
            + self
                .instructions
                .iter()
                .map(|instr| instr.outputs().len())
                .sum::<usize>()
    }

    fn check(&self, id: SubCircuitId, root: &RootCircuit<F>) -> Result<(), CircuitError> {
        let malformed = |location: IrLocation, reason: String| CircuitError::MalformedIr {
            circuit: id,
            location,
            reason,
        };
        let check_expr = |expr: &Expression<F>, defined: usize, location: IrLocation| {
            if !expr.is_canonical() {
                return Err(malformed(location, format!("expression `{expr}` is not canonical")));
            }
            match expr.max_wire() {
                Some(w) if w.index() >= defined => Err(malformed(
                    location,
                    format!("{w} is used before it is defined"),
                )),
                _ => Ok(()),
            }
        };

        if self.num_public_inputs > self.num_inputs {
            return Err(malformed(
                IrLocation::Header,
                format!(
                    "{} public inputs exceed {} inputs",
                    self.num_public_inputs, self.num_inputs
                ),
            ));
        }

        let mut next = 1 + self.num_inputs;
        for (i, instr) in self.instructions.iter().enumerate() {
            let location = IrLocation::Instruction(i);
            for input in instr.inputs() {
                check_expr(input, next, location)?;
            }
            if let Instruction::SubCircuit {
                sub_circuit_id,
                inputs,
                outputs,
            } = instr
            {
                if *sub_circuit_id == id {
                    return Err(malformed(location, format!("{id} calls itself")));
                }
                let callee = root.circuits.get(sub_circuit_id).ok_or_else(|| {
                    malformed(location, format!("{sub_circuit_id} does not exist"))
                })?;
                if callee.num_inputs != inputs.len() || callee.outputs.len() != outputs.len() {
                    return Err(malformed(
                        location,
                        format!(
                            "call to {sub_circuit_id} binds {} inputs and {} outputs, expected {} and {}",
                            inputs.len(),
                            outputs.len(),
                            callee.num_inputs,
                            callee.outputs.len()
                        ),
                    ));
                }
            }
            for out in instr.outputs() {
                if out.index() != next {
                    return Err(malformed(
                        location,
                        format!("output {out} is not sequential, expected {}", WireId(next as u32)),
                    ));
                }
                next += 1;
            }
        }

        for (i, c) in self.constraints.iter().enumerate() {
            check_expr(c, next, IrLocation::Constraint(i))?;
        }
        for (i, o) in self.outputs.iter().enumerate() {
            check_expr(o, next, IrLocation::Output(i))?;
        }
        Ok(())
    }
}

impl<F: CircuitField> fmt::Display for Circuit<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "inputs: {} ({} public)",
            self.num_inputs, self.num_public_inputs
        )?;
        for instr in &self.instructions {
            writeln!(f, "  {instr}")?;
        }
        for c in &self.constraints {
            writeln!(f, "  assert {c} == 0")?;
        }
        for o in &self.outputs {
            writeln!(f, "  output {o}")?;
        }
        Ok(())
    }
}

/// A set of circuits bound to one field. [`SubCircuitId::ENTRY`] is the entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCircuit<F> {
    circuits: BTreeMap<SubCircuitId, Circuit<F>>,
}

/// Totals for one circuit with every sub-circuit call expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandedCounts {
    pub instances: usize,
    pub muls: usize,
    pub constraints: usize,
    pub hint_outputs: usize,
    pub wires: usize,
}

/// Summary statistics of a root circuit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitStats {
    pub num_circuits: usize,
    /// Instructions per kind, summed over circuit definitions.
    pub instructions: [usize; InstructionKind::COUNT],
    pub constraints: usize,
    pub expanded: ExpandedCounts,
}

impl CircuitStats {
    pub const fn count(&self, kind: InstructionKind) -> usize {
        self.instructions[kind as usize]
    }
}

impl<F: CircuitField> RootCircuit<F> {
    /// Builds a root circuit and validates every IR invariant.
    pub fn new(circuits: BTreeMap<SubCircuitId, Circuit<F>>) -> Result<Self, CircuitError> {
        let root = Self { circuits };
        root.validate()?;
        Ok(root)
    }

    pub(crate) const fn new_unchecked(circuits: BTreeMap<SubCircuitId, Circuit<F>>) -> Self {
        Self { circuits }
    }

    pub const fn field(&self) -> FieldKind {
        F::KIND
    }

    /// The entry circuit. Validated roots always have one.
    pub fn entry(&self) -> Result<&Circuit<F>, CircuitError> {
        self.circuit(SubCircuitId::ENTRY)
    }

    pub fn circuit(&self, id: SubCircuitId) -> Result<&Circuit<F>, CircuitError> {
        self.circuits.get(&id).ok_or_else(|| CircuitError::MalformedIr {
            circuit: id,
            location: IrLocation::Header,
            reason: format!("{id} does not exist"),
        })
    }

    pub fn get(&self, id: SubCircuitId) -> Option<&Circuit<F>> {
        self.circuits.get(&id)
    }

    pub fn circuits(&self) -> impl Iterator<Item = (SubCircuitId, &Circuit<F>)> + '_ {
        self.circuits.iter().map(|(&id, c)| (id, c))
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    /// Checks the IR invariants: canonical expressions, define-before-use,
    /// sequential outputs, existing and arity-matching callees, an acyclic
    /// call graph and `num_public_inputs <= num_inputs`.
    pub fn validate(&self) -> Result<(), CircuitError> {
        self.entry()?;
        for (&id, circuit) in &self.circuits {
            circuit.check(id, self)?;
        }
        let mut marks = BTreeMap::new();
        for &id in self.circuits.keys() {
            self.visit_calls(id, &mut marks)?;
        }
        Ok(())
    }

    /// Depth-first walk of the call graph. `marks[id]` is `false` while `id`
    /// is on the stack and `true` once it is finished.
    fn visit_calls(
        &self,
        id: SubCircuitId,
        marks: &mut BTreeMap<SubCircuitId, bool>,
    ) -> Result<(), CircuitError> {
        if marks.contains_key(&id) {
            return Ok(());
        }
        marks.insert(id, false);
        for (i, instr) in self.circuit(id)?.instructions.iter().enumerate() {
            if let Instruction::SubCircuit { sub_circuit_id, .. } = instr {
                if marks.get(sub_circuit_id) == Some(&false) {
                    return Err(CircuitError::MalformedIr {
                        circuit: id,
                        location: IrLocation::Instruction(i),
                        reason: format!("call to {sub_circuit_id} closes a cycle"),
                    });
                }
                self.visit_calls(*sub_circuit_id, marks)?;
            }
        }
        marks.insert(id, true);
        Ok(())
    }

    /// Expanded totals of every circuit, callees before callers.
    pub fn expanded_counts(&self) -> Result<BTreeMap<SubCircuitId, ExpandedCounts>, CircuitError> {
        let mut memo = BTreeMap::new();
        for &id in self.circuits.keys() {
            self.expand(id, &mut memo)?;
        }
        Ok(memo)
    }

    fn expand(
        &self,
        id: SubCircuitId,
        memo: &mut BTreeMap<SubCircuitId, ExpandedCounts>,
    ) -> Result<ExpandedCounts, CircuitError> {
        if let Some(counts) = memo.get(&id) {
            return Ok(*counts);
        }
        let circuit = self.circuit(id)?;
        let mut counts = ExpandedCounts {
            instances: 1,
            constraints: circuit.constraints.len(),
            wires: circuit.num_wires(),
            ..Default::default()
        };
        for instr in &circuit.instructions {
            match instr {
                Instruction::Mul { .. } => counts.muls += 1,
                Instruction::Hint { outputs, .. } => counts.hint_outputs += outputs.len(),
                Instruction::SubCircuit { sub_circuit_id, .. } => {
                    let sub = self.expand(*sub_circuit_id, memo)?;
                    counts.instances = counts.instances.saturating_add(sub.instances);
                    counts.muls = counts.muls.saturating_add(sub.muls);
                    counts.constraints = counts.constraints.saturating_add(sub.constraints);
                    counts.hint_outputs = counts.hint_outputs.saturating_add(sub.hint_outputs);
                    counts.wires = counts.wires.saturating_add(sub.wires);
                }
                Instruction::LinComb { .. } => {}
            }
        }
        memo.insert(id, counts);
        Ok(counts)
    }

    pub fn stats(&self) -> Result<CircuitStats, CircuitError> {
        let mut stats = CircuitStats {
            num_circuits: self.circuits.len(),
            ..Default::default()
        };
        for circuit in self.circuits.values() {
            for instr in &circuit.instructions {
                stats.instructions[instr.kind() as usize] += 1;
            }
            stats.constraints += circuit.constraints.len();
        }
        stats.expanded = self
            .expanded_counts()?
            .remove(&SubCircuitId::ENTRY)
            .unwrap_or_default();
        Ok(stats)
    }

    pub(crate) fn into_circuits(self) -> BTreeMap<SubCircuitId, Circuit<F>> {
        self.circuits
    }
}

impl<F: CircuitField> fmt::Display for RootCircuit<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "field: {}", F::KIND)?;
        for (id, circuit) in &self.circuits {
            writeln!(f, "== {id} ==")?;
            write!(f, "{circuit}")?;
        }
        Ok(())
    }
}

/// Fails unless every wire of `expr` is below `defined`.
pub(crate) fn check_defined<F: CircuitField>(
    expr: &Expression<F>,
    defined: usize,
    circuit: SubCircuitId,
    location: IrLocation,
) -> Result<(), CircuitError> {
    match expr.max_wire() {
        Some(wire) if wire.index() >= defined => Err(CircuitError::MalformedIr {
            circuit,
            location,
            reason: format!("{wire} is used before it is defined"),
        }),
        _ => Ok(()),
    }
}

/// Appends the value of `out`, which must be the next unassigned wire.
pub(crate) fn push_wire<T>(
    values: &mut Vec<T>,
    out: WireId,
    value: T,
    circuit: SubCircuitId,
    location: IrLocation,
) -> Result<(), CircuitError> {
    if out.index() != values.len() {
        return Err(CircuitError::MalformedIr {
            circuit,
            location,
            reason: format!("output {out} is not the next wire w{}", values.len()),
        });
    }
    values.push(value);
    Ok(())
}
