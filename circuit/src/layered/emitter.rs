use alloc::collections::BinaryHeap;
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Reverse;

use hashbrown::HashMap;
use itertools::{zip_eq, Itertools};
use tracing::{debug, instrument};

use super::circuit::{Gate, LayeredCircuit};
use crate::circuit::{check_defined, push_wire, RootCircuit};
use crate::errors::IrLocation;
use crate::expr::Expression;
use crate::field::CircuitField;
use crate::instruction::Instruction;
use crate::types::SubCircuitId;
use crate::CircuitError;

/// Value of a wire during emission: either a folded constant or a gate
/// output scaled by a non-zero coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value<F> {
    Constant(F),
    Scaled { node: usize, coef: F },
}

/// A gate whose operands are arena indices, with its depth.
#[derive(Debug, Clone, Copy)]
struct Node<F> {
    gate: Gate<F>,
    depth: usize,
}

/// Lowers a root circuit into a [`LayeredCircuit`].
///
/// Sub-circuits are inlined at every call site. Linear combinations are
/// folded into chains of `Add` gates that always join the two shallowest
/// operands first, and constant-only subexpressions never produce gates.
/// Hint outputs become input gates, numbered after the external inputs in
/// depth-first instruction order.
#[derive(Debug)]
pub struct LayeredEmitter<'a, F> {
    root: &'a RootCircuit<F>,
    nodes: Vec<Node<F>>,
    constants: HashMap<F, usize>,
    next_input: usize,
    constraints: Vec<usize>,
}

impl<'a, F: CircuitField> LayeredEmitter<'a, F> {
    pub fn new(root: &'a RootCircuit<F>) -> Self {
        Self {
            root,
            nodes: Vec::new(),
            constants: HashMap::new(),
            next_input: 0,
            constraints: Vec::new(),
        }
    }

    /// Emits the layered circuit, dropping gates outside the cone of the
    /// outputs and constraints when `dead_code_elimination` is set. Input
    /// gates are always kept.
    pub fn emit(mut self, dead_code_elimination: bool) -> Result<LayeredCircuit<F>, CircuitError> {
        let entry = self.root.entry()?;
        let (num_external_inputs, num_public_inputs) =
            (entry.num_inputs(), entry.num_public_inputs());

        let inputs = (0..num_external_inputs)
            .map(|_| self.input_value())
            .collect();
        let outputs = self.emit_instance(SubCircuitId::ENTRY, inputs)?;
        let outputs: Vec<usize> = outputs
            .into_iter()
            .map(|value| self.materialize(value))
            .collect();

        let num_nodes = self.nodes.len();
        let (layers, outputs, constraints) =
            assign_layers(self.nodes, &outputs, &self.constraints, dead_code_elimination);
        let circuit = LayeredCircuit::new(
            self.next_input,
            num_external_inputs,
            num_public_inputs,
            layers,
            outputs,
            constraints,
        )?;

        let stats = circuit.stats();
        debug!(
            layers = stats.layers,
            gates = stats.total_gates(),
            widest_layer = stats.widest_layer,
            removed = num_nodes - stats.total_gates(),
            "emitted layered circuit"
        );
        Ok(circuit)
    }

    fn emit_instance(
        &mut self,
        id: SubCircuitId,
        inputs: Vec<Value<F>>,
    ) -> Result<Vec<Value<F>>, CircuitError> {
        let root = self.root;
        let circuit = root.circuit(id)?;
        let mut wires = Vec::with_capacity(circuit.num_wires());
        wires.push(Value::Constant(F::ONE));
        wires.extend(inputs);

        for (i, instr) in circuit.instructions().iter().enumerate() {
            let location = IrLocation::Instruction(i);
            match instr {
                Instruction::LinComb { expr, out } => {
                    let value = self.reduce(expr, &wires, id, location)?;
                    push_wire(&mut wires, *out, value, id, location)?;
                }
                Instruction::Mul { lhs, rhs, out } => {
                    let lhs_value = self.reduce(lhs, &wires, id, location)?;
                    let rhs_value = if rhs == lhs {
                        lhs_value
                    } else {
                        self.reduce(rhs, &wires, id, location)?
                    };
                    let value = self.mul(lhs_value, rhs_value);
                    push_wire(&mut wires, *out, value, id, location)?;
                }
                Instruction::Hint {
                    inputs, outputs, ..
                } => {
                    for input in inputs {
                        check_defined(input, wires.len(), id, location)?;
                    }
                    for &out in outputs {
                        let value = self.input_value();
                        push_wire(&mut wires, out, value, id, location)?;
                    }
                }
                Instruction::SubCircuit {
                    sub_circuit_id,
                    inputs,
                    outputs,
                } => {
                    let args = inputs
                        .iter()
                        .map(|input| self.reduce(input, &wires, id, location))
                        .collect::<Result<Vec<_>, _>>()?;
                    let callee = root.circuit(*sub_circuit_id)?;
                    if callee.num_inputs() != args.len() || callee.outputs().len() != outputs.len()
                    {
                        return Err(CircuitError::MalformedIr {
                            circuit: id,
                            location,
                            reason: format!("arity mismatch calling {sub_circuit_id}"),
                        });
                    }
                    let results = self.emit_instance(*sub_circuit_id, args)?;
                    for (&out, value) in zip_eq(outputs, results) {
                        push_wire(&mut wires, out, value, id, location)?;
                    }
                }
            }
        }

        for (i, constraint) in circuit.constraints().iter().enumerate() {
            match self.reduce(constraint, &wires, id, IrLocation::Constraint(i))? {
                Value::Constant(k) if k.is_zero() => {}
                Value::Constant(k) => {
                    let node = self.constant(k);
                    self.constraints.push(node);
                }
                // A non-zero scale does not change whether the gate is zero.
                Value::Scaled { node, .. } => self.constraints.push(node),
            }
        }

        circuit
            .outputs()
            .iter()
            .enumerate()
            .map(|(i, output)| self.reduce(output, &wires, id, IrLocation::Output(i)))
            .collect()
    }

    fn push(&mut self, gate: Gate<F>) -> usize {
        push_node(&mut self.nodes, gate)
    }

    fn input_value(&mut self) -> Value<F> {
        let node = self.push(Gate::Input {
            index: self.next_input,
        });
        self.next_input += 1;
        Value::Scaled {
            node,
            coef: F::ONE,
        }
    }

    fn constant(&mut self, value: F) -> usize {
        let nodes = &mut self.nodes;
        *self
            .constants
            .entry(value)
            .or_insert_with(|| push_node(nodes, Gate::Constant { value }))
    }

    /// Turns a value into a single gate carrying exactly that value.
    fn materialize(&mut self, value: Value<F>) -> usize {
        match value {
            Value::Constant(k) => self.constant(k),
            Value::Scaled { node, coef } if coef == F::ONE => node,
            Value::Scaled { node, coef } => {
                let one = self.constant(F::ONE);
                self.push(Gate::Mul { a: node, b: one, coef })
            }
        }
    }

    fn mul(&mut self, lhs: Value<F>, rhs: Value<F>) -> Value<F> {
        match (lhs, rhs) {
            (Value::Constant(a), Value::Constant(b)) => Value::Constant(a * b),
            (Value::Constant(k), Value::Scaled { node, coef })
            | (Value::Scaled { node, coef }, Value::Constant(k)) => {
                if k.is_zero() {
                    Value::Constant(F::ZERO)
                } else {
                    Value::Scaled {
                        node,
                        coef: coef * k,
                    }
                }
            }
            (Value::Scaled { node: a, coef: ca }, Value::Scaled { node: b, coef: cb }) => {
                let node = self.push(Gate::Mul { a, b, coef: ca * cb });
                Value::Scaled {
                    node,
                    coef: F::ONE,
                }
            }
        }
    }

    /// Folds a linear combination of wire values into a single value.
    fn reduce(
        &mut self,
        expr: &Expression<F>,
        wires: &[Value<F>],
        id: SubCircuitId,
        location: IrLocation,
    ) -> Result<Value<F>, CircuitError> {
        check_defined(expr, wires.len(), id, location)?;

        let mut constant = F::ZERO;
        let mut scaled = Vec::with_capacity(expr.len() + 1);
        for term in expr.terms() {
            match wires[term.wire.index()] {
                Value::Constant(k) => constant += term.coef * k,
                Value::Scaled { node, coef } => scaled.push((node, term.coef * coef)),
            }
        }
        if scaled.is_empty() {
            return Ok(Value::Constant(constant));
        }
        if !constant.is_zero() {
            let one = self.constant(F::ONE);
            scaled.push((one, constant));
        }

        let mut scaled: Vec<(usize, F)> = scaled
            .into_iter()
            .sorted_by_key(|&(node, _)| node)
            .coalesce(|(n1, c1), (n2, c2)| {
                if n1 == n2 {
                    Ok((n1, c1 + c2))
                } else {
                    Err(((n1, c1), (n2, c2)))
                }
            })
            .filter(|(_, coef)| !coef.is_zero())
            .collect();

        match scaled.len() {
            0 => return Ok(Value::Constant(F::ZERO)),
            1 => {
                let (node, coef) = scaled[0];
                return Ok(Value::Scaled { node, coef });
            }
            _ => {}
        }

        // Min-heap on (depth, slot); slots break ties in a fixed order.
        let mut heap: BinaryHeap<Reverse<(usize, usize)>> = scaled
            .iter()
            .enumerate()
            .map(|(slot, &(node, _))| Reverse((self.nodes[node].depth, slot)))
            .collect();
        while let (Some(Reverse((_, s1))), Some(Reverse((_, s2)))) = (heap.pop(), heap.pop()) {
            let (a, ca) = scaled[s1];
            let (b, cb) = scaled[s2];
            let inv = ca.try_inverse().ok_or_else(|| CircuitError::MalformedIr {
                circuit: id,
                location,
                reason: format!("zero coefficient while folding `{expr}`"),
            })?;
            let node = self.push(Gate::Add {
                a,
                b,
                coef: cb * inv,
            });
            if heap.is_empty() {
                return Ok(Value::Scaled { node, coef: ca });
            }
            let slot = scaled.len();
            scaled.push((node, ca));
            heap.push(Reverse((self.nodes[node].depth, slot)));
        }
        Err(CircuitError::MalformedIr {
            circuit: id,
            location,
            reason: format!("could not fold `{expr}`"),
        })
    }
}

/// Lowers `root` into a layered circuit.
#[instrument(skip_all)]
pub fn emit_layered<F: CircuitField>(
    root: &RootCircuit<F>,
    dead_code_elimination: bool,
) -> Result<LayeredCircuit<F>, CircuitError> {
    LayeredEmitter::new(root).emit(dead_code_elimination)
}

fn push_node<F>(nodes: &mut Vec<Node<F>>, gate: Gate<F>) -> usize {
    let depth = gate
        .operands()
        .map_or(0, |(a, b)| 1 + nodes[a].depth.max(nodes[b].depth));
    nodes.push(Node { gate, depth });
    nodes.len() - 1
}

/// Groups the live nodes by depth and rewrites operands, outputs and
/// constraints to indices into the concatenated layers.
fn assign_layers<F: Copy>(
    nodes: Vec<Node<F>>,
    outputs: &[usize],
    constraints: &[usize],
    dead_code_elimination: bool,
) -> (Vec<Vec<Gate<F>>>, Vec<usize>, Vec<usize>) {
    let mut live = vec![!dead_code_elimination; nodes.len()];
    for &root in outputs.iter().chain(constraints) {
        live[root] = true;
    }
    // Operands always precede their users, so one backward sweep suffices.
    for i in (0..nodes.len()).rev() {
        match nodes[i].gate {
            Gate::Input { .. } => live[i] = true,
            gate if live[i] => {
                if let Some((a, b)) = gate.operands() {
                    live[a] = true;
                    live[b] = true;
                }
            }
            _ => {}
        }
    }

    let num_layers = nodes
        .iter()
        .zip(&live)
        .filter(|(_, live)| **live)
        .map(|(node, _)| node.depth + 1)
        .max()
        .unwrap_or(0);
    let mut by_depth: Vec<Vec<usize>> = vec![Vec::new(); num_layers];
    let (inputs, constants): (Vec<usize>, Vec<usize>) = (0..nodes.len())
        .filter(|&i| live[i] && nodes[i].depth == 0)
        .partition(|&i| matches!(nodes[i].gate, Gate::Input { .. }));
    if let Some(first) = by_depth.first_mut() {
        first.extend(inputs);
        first.extend(constants);
    }
    for (i, node) in nodes.iter().enumerate() {
        if live[i] && node.depth > 0 {
            by_depth[node.depth].push(i);
        }
    }

    let mut position = vec![usize::MAX; nodes.len()];
    for (pos, &i) in by_depth.iter().flatten().enumerate() {
        position[i] = pos;
    }
    let layers = by_depth
        .iter()
        .map(|layer| {
            layer
                .iter()
                .map(|&i| match nodes[i].gate {
                    Gate::Add { a, b, coef } => Gate::Add {
                        a: position[a],
                        b: position[b],
                        coef,
                    },
                    Gate::Mul { a, b, coef } => Gate::Mul {
                        a: position[a],
                        b: position[b],
                        coef,
                    },
                    gate => gate,
                })
                .collect()
        })
        .collect();
    let remap = |ids: &[usize]| -> Vec<usize> { ids.iter().map(|&i| position[i]).collect() };
    (layers, remap(outputs), remap(constraints))
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;

    use p3_bn254::Bn254;
    use p3_field::PrimeCharacteristicRing;
    use p3_mersenne_31::Mersenne31;
    use proptest::prelude::*;

    use super::*;
    use crate::builder::{CircuitBuilder, CircuitBuilderError};
    use crate::circuit::Circuit;
    use crate::hints::HintRegistry;
    use crate::layered::GateKind;
    use crate::solver::{InputSolver, SolverConfig};

    type F = Mersenne31;

    fn f(v: u64) -> F {
        F::from_u64(v)
    }

    #[test]
    fn test_identity_has_no_gates_beyond_inputs() {
        let mut builder = CircuitBuilder::<Bn254>::new(1, 1).unwrap();
        let x = builder.input(0).unwrap();
        builder.output(&x);
        let layered = emit_layered(&builder.build().unwrap(), true).unwrap();

        assert_eq!(layered.layers().len(), 1);
        assert_eq!(layered.layers()[0], vec![Gate::Input { index: 0 }]);
        assert_eq!(layered.outputs(), &[0]);
        assert_eq!(layered.num_public_inputs(), 1);
        assert_eq!(
            layered.evaluate(&[Bn254::from_u64(7)]).unwrap(),
            vec![Bn254::from_u64(7)]
        );
    }

    #[test]
    fn test_constant_folding() {
        let mut builder = CircuitBuilder::<F>::new(1, 0).unwrap();
        let two = builder.constant_u64(2);
        let three = builder.constant_u64(3);
        let six = builder.mul(&two, &three);
        let x = builder.input(0).unwrap();
        let scaled = builder.mul(&six, &x);
        builder.output(&scaled);
        builder.output(&six);
        let layered = emit_layered(&builder.build().unwrap(), true).unwrap();

        let stats = layered.stats();
        assert_eq!(stats.count(GateKind::Add), 0);
        // 6 * x needs a scaling gate against the constant one.
        assert_eq!(stats.count(GateKind::Mul), 1);
        assert_eq!(layered.evaluate(&[f(5)]).unwrap(), vec![f(30), f(6)]);
    }

    #[test]
    fn test_dead_code_elimination() {
        let build = || {
            let mut builder = CircuitBuilder::<F>::new(2, 0).unwrap();
            let [a, b] = [builder.input(0).unwrap(), builder.input(1).unwrap()];
            let _unused = builder.mul(&a, &b);
            let sum = builder.add(&a, &b);
            let used = builder.mul(&sum, &sum);
            builder.output(&used);
            builder.build().unwrap()
        };
        let root = build();
        let pruned = emit_layered(&root, true).unwrap();
        let full = emit_layered(&root, false).unwrap();

        assert_eq!(pruned.stats().count(GateKind::Mul), 1);
        assert_eq!(pruned.stats().count(GateKind::Add), 1);
        assert_eq!(full.stats().count(GateKind::Mul), 2);
        assert_eq!(pruned.stats().count(GateKind::Input), 2);
        let inputs = [f(2), f(3)];
        assert_eq!(pruned.evaluate(&inputs).unwrap(), vec![f(25)]);
        assert_eq!(full.evaluate(&inputs).unwrap(), vec![f(25)]);
    }

    #[test]
    fn test_long_sum_is_balanced() {
        let mut builder = CircuitBuilder::<F>::new(8, 0).unwrap();
        let sum = builder
            .inputs()
            .iter()
            .fold(Expression::zero(), |acc, x| acc.add(x));
        builder.output(&sum);
        let layered = emit_layered(&builder.build().unwrap(), true).unwrap();

        // Eight leaves at depth 0 fold in three levels.
        assert_eq!(layered.layers().len(), 4);
        let inputs: Vec<F> = (1..=8).map(f).collect();
        assert_eq!(layered.evaluate(&inputs).unwrap(), vec![f(36)]);
    }

    #[test]
    fn test_unsatisfiable_constant_constraint_is_kept() {
        // The builder refuses this constraint, but a decoded IR can carry it.
        let entry = Circuit::from_parts(0, 0, vec![], vec![Expression::constant(F::ONE)], vec![]);
        let root = RootCircuit::new(BTreeMap::from([(SubCircuitId::ENTRY, entry)])).unwrap();
        let layered = emit_layered(&root, true).unwrap();
        assert_eq!(layered.constraints().len(), 1);
        assert!(matches!(
            layered.evaluate(&[]),
            Err(CircuitError::ConstraintViolation { index: 0, .. })
        ));
    }

    #[test]
    fn test_hint_outputs_become_inputs() {
        let mut builder = CircuitBuilder::<F>::new(1, 0).unwrap();
        let x = builder.input(0).unwrap();
        let bits = builder.to_binary(&x, 3).unwrap();
        let top = builder.mul(&bits[2], &x);
        builder.output(&top);
        let root = builder.build().unwrap();
        let layered = emit_layered(&root, true).unwrap();
        assert_eq!(layered.num_inputs(), 4);
        assert_eq!(layered.num_external_inputs(), 1);

        let solver = InputSolver::new(root, HintRegistry::with_builtins()).unwrap();
        let witness = solver.solve(&[f(5)], &SolverConfig::default()).unwrap();
        assert_eq!(
            layered.evaluate(witness.layered_inputs()).unwrap(),
            witness.outputs()
        );
        assert!(layered.evaluate(&[f(5), f(1), f(1), f(0)]).is_err());
    }

    fn polynomial_root() -> RootCircuit<F> {
        let mut builder = CircuitBuilder::<F>::new(3, 1).unwrap();
        let cube = builder
            .define_sub_circuit("cube_plus", 2, |b| {
                let [x, y] = [b.input(0)?, b.input(1)?];
                let sq = b.mul(&x, &x);
                let cube = b.mul(&sq, &x);
                let three_y = b.scale(&y, F::from_u64(3));
                let out = b.add(&cube, &three_y);
                b.output(&out);
                Ok::<(), CircuitBuilderError>(())
            })
            .unwrap();
        let [a, b, c] = [
            builder.input(0).unwrap(),
            builder.input(1).unwrap(),
            builder.input(2).unwrap(),
        ];
        let seven = builder.constant_u64(7);
        let shifted = builder.add(&b, &seven);
        let first = builder.call(cube, &[a.clone(), shifted]).unwrap();
        let second = builder.call(cube, &[first[0].clone(), c.clone()]).unwrap();
        let prod = builder.mul(&second[0], &a.sub(&c));
        let is_nonzero_diff = builder.sub(&a, &b);
        builder.assert_ne(&is_nonzero_diff, &Expression::zero());
        builder.output(&prod);
        builder.output(&first[0].add(&seven));
        builder.build().unwrap()
    }

    proptest! {
        #[test]
        fn layered_evaluation_matches_solver(a in 0u64..1000, b in 0u64..1000, c in 0u64..1000) {
            prop_assume!(a != b);
            let root = polynomial_root();
            let layered = emit_layered(&root, true).unwrap();
            let solver = InputSolver::new(root, HintRegistry::with_builtins()).unwrap();
            let witness = solver.solve(&[f(a), f(b), f(c)], &SolverConfig::default()).unwrap();
            prop_assert_eq!(layered.evaluate(witness.layered_inputs()).unwrap(), witness.outputs());
        }
    }
}
