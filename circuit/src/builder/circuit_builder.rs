use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use hashbrown::HashSet;
use itertools::zip_eq;
use tracing::debug;

use super::sub_circuits::SubCircuitRegistry;
use crate::circuit::{Circuit, RootCircuit};
use crate::expr::Expression;
use crate::field::CircuitField;
use crate::hints::{HintRegistry, builtin};
use crate::instruction::Instruction;
use crate::types::{SubCircuitId, WireAllocator, WireId};
use crate::CircuitBuilderError;

/// Builder for constructing circuits.
///
/// Expressions are plain values: linear operations combine them without
/// touching the builder, while every non-linear operation records an
/// instruction and hands back a fresh single-wire expression.
#[derive(Debug)]
pub struct CircuitBuilder<F: CircuitField> {
    num_inputs: usize,
    num_public_inputs: usize,

    /// Wire index allocator
    wire_alloc: WireAllocator,

    instructions: Vec<Instruction<F>>,
    constraints: Vec<Expression<F>>,
    outputs: Vec<Expression<F>>,

    /// Hints the circuit may reference by name.
    hints: HintRegistry<F>,

    /// Sub-circuits defined so far, shared with nested definitions.
    sub_circuits: SubCircuitRegistry<F>,

    /// Expressions already known to be 0 or 1.
    booleans: HashSet<Expression<F>>,

    /// First assertion found to fail on constant operands, reported by `build`.
    unsatisfiable: Option<CircuitBuilderError>,
}

impl<F: CircuitField> CircuitBuilder<F> {
    /// Creates a builder for a circuit with `num_inputs` external inputs, the
    /// first `num_public_inputs` of which are public.
    pub fn new(num_inputs: usize, num_public_inputs: usize) -> Result<Self, CircuitBuilderError> {
        check_input_count(num_inputs)?;
        if num_public_inputs > num_inputs {
            return Err(CircuitBuilderError::InvalidPublicInputCount {
                num_public_inputs,
                num_inputs,
            });
        }
        Ok(Self::blank(
            num_inputs,
            num_public_inputs,
            HintRegistry::with_builtins(),
            SubCircuitRegistry::default(),
        ))
    }

    fn blank(
        num_inputs: usize,
        num_public_inputs: usize,
        hints: HintRegistry<F>,
        sub_circuits: SubCircuitRegistry<F>,
    ) -> Self {
        Self {
            num_inputs,
            num_public_inputs,
            wire_alloc: WireAllocator::new(num_inputs),
            instructions: Vec::new(),
            constraints: Vec::new(),
            outputs: Vec::new(),
            hints,
            sub_circuits,
            booleans: HashSet::new(),
            unsatisfiable: None,
        }
    }

    /// Replaces the hint registry used to check [`Self::hint`] names.
    pub fn with_hints(mut self, hints: HintRegistry<F>) -> Self {
        self.hints = hints;
        self
    }

    pub const fn hints(&self) -> &HintRegistry<F> {
        &self.hints
    }

    pub const fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub const fn num_public_inputs(&self) -> usize {
        self.num_public_inputs
    }

    /// Expression for the `index`-th external input.
    pub fn input(&self, index: usize) -> Result<Expression<F>, CircuitBuilderError> {
        if index >= self.num_inputs {
            return Err(CircuitBuilderError::InputOutOfRange {
                index,
                num_inputs: self.num_inputs,
            });
        }
        Ok(Expression::wire(WireId::input(index)))
    }

    /// Expressions for every external input, in order.
    pub fn inputs(&self) -> Vec<Expression<F>> {
        (0..self.num_inputs)
            .map(|i| Expression::wire(WireId::input(i)))
            .collect()
    }

    pub fn constant(&self, value: F) -> Expression<F> {
        Expression::constant(value)
    }

    pub fn constant_u64(&self, value: u64) -> Expression<F> {
        Expression::constant(F::from_u64(value))
    }

    pub fn constant_i64(&self, value: i64) -> Expression<F> {
        Expression::constant(<F as CircuitField>::from_i64(value))
    }

    /// Cost: free, the result stays a linear combination.
    pub fn add(&self, lhs: &Expression<F>, rhs: &Expression<F>) -> Expression<F> {
        lhs.add(rhs)
    }

    /// Cost: free, the result stays a linear combination.
    pub fn sub(&self, lhs: &Expression<F>, rhs: &Expression<F>) -> Expression<F> {
        lhs.sub(rhs)
    }

    pub fn neg(&self, value: &Expression<F>) -> Expression<F> {
        value.neg()
    }

    pub fn scale(&self, value: &Expression<F>, factor: F) -> Expression<F> {
        value.scale(factor)
    }

    /// Multiplies two expressions.
    ///
    /// Cost: 1 `Mul` instruction and 1 fresh wire.
    pub fn mul(&mut self, lhs: &Expression<F>, rhs: &Expression<F>) -> Expression<F> {
        let out = self.wire_alloc.alloc();
        self.instructions.push(Instruction::Mul {
            lhs: lhs.clone(),
            rhs: rhs.clone(),
            out,
        });
        Expression::wire(out)
    }

    /// Anchors an expression on a fresh wire.
    ///
    /// Cost: 1 `LinComb` instruction and 1 fresh wire.
    pub fn reify(&mut self, value: &Expression<F>) -> Expression<F> {
        let out = self.wire_alloc.alloc();
        self.instructions.push(Instruction::LinComb {
            expr: value.clone(),
            out,
        });
        Expression::wire(out)
    }

    /// Computes `∑ a[i] * b[i]`.
    ///
    /// Cost: `N` multiplications, where `N` is the length of the slices.
    pub fn inner_product(
        &mut self,
        a: &[Expression<F>],
        b: &[Expression<F>],
    ) -> Result<Expression<F>, CircuitBuilderError> {
        if a.len() != b.len() {
            return Err(CircuitBuilderError::InvalidDimension {
                expected: a.len(),
                actual: b.len(),
            });
        }
        Ok(zip_eq(a, b).fold(Expression::zero(), |acc, (x, y)| {
            let product = self.mul(x, y);
            acc.add(&product)
        }))
    }

    /// Records `value == 0`.
    ///
    /// A constant `value` records nothing: zero always holds, anything else
    /// makes [`Self::build`] fail with `UnsatisfiableAssertion`.
    pub fn assert_zero(&mut self, value: &Expression<F>) {
        self.push_constraint("assert_zero", value.clone());
    }

    /// Records `lhs - rhs == 0`.
    pub fn assert_eq(&mut self, lhs: &Expression<F>, rhs: &Expression<F>) {
        self.push_constraint("assert_eq", lhs.sub(rhs));
    }

    /// Asserts `lhs != rhs`.
    ///
    /// The `inverse` hint supplies `w = (lhs - rhs)^-1` and the constraint
    /// `(lhs - rhs) * w - 1 == 0` binds it. Constant operands are decided
    /// here and record nothing.
    /// Cost: 1 hint output + 1 mul + 1 constraint.
    pub fn assert_ne(&mut self, lhs: &Expression<F>, rhs: &Expression<F>) {
        let diff = lhs.sub(rhs);
        if let Some(k) = diff.constant_value() {
            if k == F::ZERO {
                self.reject("assert_ne", k);
            }
            return;
        }
        let inv = self.push_hint(builtin::INVERSE, vec![diff.clone()], 1);
        let prod = self.mul(&diff, &inv[0]);
        self.constraints.push(prod.sub(&Expression::constant(F::ONE)));
    }

    /// Asserts that an expression is boolean: b ∈ {0,1}.
    ///
    /// Encodes the constraint b · (b − 1) = 0, once per distinct expression.
    /// Cost: 1 mul + 1 constraint, nothing for constants and known booleans.
    pub fn assert_bool(&mut self, b: &Expression<F>) {
        if let Some(k) = b.constant_value() {
            if k != F::ZERO && k != F::ONE {
                self.reject("assert_bool", k);
            }
            return;
        }
        if !self.booleans.insert(b.clone()) {
            return;
        }
        let b_minus_one = b.sub(&Expression::constant(F::ONE));
        let prod = self.mul(b, &b_minus_one);
        self.constraints.push(prod);
    }

    fn push_constraint(&mut self, kind: &'static str, value: Expression<F>) {
        match value.constant_value() {
            Some(k) if k == F::ZERO => {}
            Some(k) => self.reject(kind, k),
            None => self.constraints.push(value),
        }
    }

    fn reject(&mut self, kind: &'static str, value: F) {
        debug!(kind, %value, "unsatisfiable assertion on a constant");
        if self.unsatisfiable.is_none() {
            self.unsatisfiable = Some(CircuitBuilderError::UnsatisfiableAssertion {
                kind,
                value: value.to_string(),
            });
        }
    }

    /// Selects between two values using selector `b`:
    /// result = f + b · (t − f).
    ///
    /// When `b` ∈ {0,1}, this returns `t` if b = 1, else `f`.
    /// Call `assert_bool(b)` beforehand if you need booleanity enforced.
    /// Cost: 1 mul.
    pub fn select(
        &mut self,
        b: &Expression<F>,
        t: &Expression<F>,
        f: &Expression<F>,
    ) -> Expression<F> {
        let scaled = self.mul(b, &t.sub(f));
        f.add(&scaled)
    }

    /// Multiplies, folding a constant operand into a free scale.
    fn product(&mut self, lhs: &Expression<F>, rhs: &Expression<F>) -> Expression<F> {
        match (lhs.constant_value(), rhs.constant_value()) {
            (Some(k), _) => rhs.scale(k),
            (_, Some(k)) => lhs.scale(k),
            _ => self.mul(lhs, rhs),
        }
    }

    fn mark_boolean(&mut self, value: &Expression<F>) {
        if !value.is_constant() {
            self.booleans.insert(value.clone());
        }
    }

    /// Returns `x^-1`, constraining `x` to be non-zero.
    ///
    /// A constant `x` is inverted here; zero fails with `DivisionByZero`.
    /// Cost: 1 hint output + 1 mul + 1 constraint.
    pub fn inverse(&mut self, x: &Expression<F>) -> Result<Expression<F>, CircuitBuilderError> {
        if let Some(k) = x.constant_value() {
            return k
                .try_inverse()
                .map(Expression::constant)
                .ok_or(CircuitBuilderError::DivisionByZero { op: "inverse" });
        }
        let inv = self.push_hint(builtin::INVERSE, vec![x.clone()], 1).remove(0);
        let prod = self.mul(x, &inv);
        self.constraints.push(prod.sub(&Expression::constant(F::ONE)));
        Ok(inv)
    }

    /// Returns `a / b`, constraining `b` to be non-zero.
    ///
    /// Cost: 1 hint output + 2 muls + 1 constraint, less when either side is constant.
    pub fn div(
        &mut self,
        a: &Expression<F>,
        b: &Expression<F>,
    ) -> Result<Expression<F>, CircuitBuilderError> {
        let inv = self.inverse(b)?;
        Ok(self.product(a, &inv))
    }

    /// Returns `q` bound by `q · b = a`.
    ///
    /// `b != 0` is not enforced: with `a = b = 0` any `q` satisfies the constraint.
    /// Cost: 1 hint output + 1 mul + 1 constraint.
    pub fn div_unchecked(
        &mut self,
        a: &Expression<F>,
        b: &Expression<F>,
    ) -> Result<Expression<F>, CircuitBuilderError> {
        if let Some(k) = b.constant_value() {
            let inv = k
                .try_inverse()
                .ok_or(CircuitBuilderError::DivisionByZero { op: "div_unchecked" })?;
            return Ok(a.scale(inv));
        }
        let q = self
            .push_hint(builtin::DIV, vec![a.clone(), b.clone()], 1)
            .remove(0);
        let prod = self.mul(&q, b);
        self.constraints.push(prod.sub(a));
        Ok(q)
    }

    /// Returns 1 if `x` is zero and 0 otherwise.
    ///
    /// The `is_zero` hint supplies `r` and `inverse_or_zero` supplies `m`.
    /// `x · r = 0` and `x · m - 1 + r = 0` leave `r` no other value.
    /// Cost: 2 hint outputs + 2 muls + 2 constraints.
    pub fn is_zero(&mut self, x: &Expression<F>) -> Expression<F> {
        if let Some(k) = x.constant_value() {
            return Expression::constant(F::from_bool(k == F::ZERO));
        }
        let r = self.push_hint(builtin::IS_ZERO, vec![x.clone()], 1).remove(0);
        let m = self
            .push_hint(builtin::INVERSE_OR_ZERO, vec![x.clone()], 1)
            .remove(0);
        let xr = self.mul(x, &r);
        self.constraints.push(xr);
        let xm = self.mul(x, &m);
        self.constraints
            .push(xm.sub(&Expression::constant(F::ONE)).add(&r));
        self.mark_boolean(&r);
        r
    }

    /// Boolean AND. Both operands are asserted boolean.
    ///
    /// Cost: 1 mul plus any booleanity checks not yet recorded.
    pub fn and(&mut self, a: &Expression<F>, b: &Expression<F>) -> Expression<F> {
        self.assert_bool(a);
        self.assert_bool(b);
        let res = self.product(a, b);
        self.mark_boolean(&res);
        res
    }

    /// Boolean OR: `a + b - a·b`. Both operands are asserted boolean.
    pub fn or(&mut self, a: &Expression<F>, b: &Expression<F>) -> Expression<F> {
        self.assert_bool(a);
        self.assert_bool(b);
        let ab = self.product(a, b);
        let res = a.add(b).sub(&ab);
        self.mark_boolean(&res);
        res
    }

    /// Boolean XOR: `a + b - 2·a·b`. Both operands are asserted boolean.
    pub fn xor(&mut self, a: &Expression<F>, b: &Expression<F>) -> Expression<F> {
        self.assert_bool(a);
        self.assert_bool(b);
        let ab = self.product(a, b);
        let res = a.add(b).sub(&ab.scale(F::TWO));
        self.mark_boolean(&res);
        res
    }

    /// Picks `values[b0 + 2·b1]`. Both selector bits are asserted boolean.
    ///
    /// Cost: 3 muls.
    pub fn lookup2(
        &mut self,
        b0: &Expression<F>,
        b1: &Expression<F>,
        values: [&Expression<F>; 4],
    ) -> Expression<F> {
        self.assert_bool(b0);
        self.assert_bool(b1);
        let low = self.select(b0, values[1], values[0]);
        let high = self.select(b0, values[3], values[2]);
        self.select(b1, &high, &low)
    }

    /// Decomposes `value` into `n_bits` little-endian boolean expressions and
    /// constrains them to recompose to `value`.
    ///
    /// `n_bits` must be below the field's bit length so the decomposition is unique.
    /// Cost: `n_bits` hint outputs + `n_bits` boolean checks + 1 constraint.
    pub fn to_binary(
        &mut self,
        value: &Expression<F>,
        n_bits: usize,
    ) -> Result<Vec<Expression<F>>, CircuitBuilderError> {
        let max_bits = F::bits() - 1;
        if n_bits > max_bits {
            return Err(CircuitBuilderError::BinaryDecompositionTooManyBits {
                expected: max_bits,
                n_bits,
            });
        }
        let bits = self.push_hint(builtin::TO_BINARY, vec![value.clone()], n_bits);
        for bit in &bits {
            self.assert_bool(bit);
        }
        let recomposed = self.from_binary(&bits);
        self.assert_eq(&recomposed, value);
        Ok(bits)
    }

    /// Packs little-endian bits: `∑ 2^i · bits[i]`.
    ///
    /// Cost: free, no booleanity is enforced.
    pub fn from_binary(&self, bits: &[Expression<F>]) -> Expression<F> {
        let mut weight = F::ONE;
        bits.iter().fold(Expression::zero(), |acc, bit| {
            let acc = acc.add(&bit.scale(weight));
            weight = weight.double();
            acc
        })
    }

    /// Exposes `value` as a circuit output.
    pub fn output(&mut self, value: &Expression<F>) {
        self.outputs.push(value.clone());
    }

    /// Calls the registered hint `name` and returns `n_outputs` fresh wires.
    ///
    /// The outputs are unconstrained: callers must bind them with constraints.
    pub fn hint(
        &mut self,
        name: &str,
        inputs: &[Expression<F>],
        n_outputs: usize,
    ) -> Result<Vec<Expression<F>>, CircuitBuilderError> {
        if !self.hints.contains(name) {
            return Err(CircuitBuilderError::UnknownHint {
                name: name.to_string(),
            });
        }
        Ok(self.push_hint(name, inputs.to_vec(), n_outputs))
    }

    fn push_hint(
        &mut self,
        name: &str,
        inputs: Vec<Expression<F>>,
        n_outputs: usize,
    ) -> Vec<Expression<F>> {
        let outputs: Vec<WireId> = (0..n_outputs).map(|_| self.wire_alloc.alloc()).collect();
        let exprs = outputs.iter().map(|&w| Expression::wire(w)).collect();
        self.instructions.push(Instruction::Hint {
            name: name.to_string(),
            inputs,
            outputs,
        });
        exprs
    }

    /// Defines a reusable sub-circuit with `num_inputs` inputs.
    ///
    /// `body` records the sub-circuit on a fresh builder. The first definition
    /// of `key` wins: later calls with the same key return the existing id
    /// without running `body`. If `body` fails, or records an assertion that
    /// can never hold, every definition it made is discarded and the error is
    /// returned.
    pub fn define_sub_circuit<B>(
        &mut self,
        key: &str,
        num_inputs: usize,
        body: B,
    ) -> Result<SubCircuitId, CircuitBuilderError>
    where
        B: FnOnce(&mut Self) -> Result<(), CircuitBuilderError>,
    {
        if let Some(id) = self.sub_circuits.lookup(key) {
            return Ok(id);
        }
        check_input_count(num_inputs)?;

        let checkpoint = self.sub_circuits.checkpoint();
        let mut child = Self::blank(
            num_inputs,
            0,
            self.hints.clone(),
            mem::take(&mut self.sub_circuits),
        );
        let result = body(&mut child);
        let unsatisfiable = child.unsatisfiable.take();
        let (circuit, mut registry) = child.into_parts();

        let result = match result.and_then(|()| unsatisfiable.map_or(Ok(()), Err)) {
            Ok(()) => Ok(registry.insert(String::from(key), circuit)),
            Err(err) => {
                registry.rollback(checkpoint);
                Err(err)
            }
        };
        self.sub_circuits = registry;
        result
    }

    /// Instantiates sub-circuit `id` on `inputs` and returns its outputs as
    /// fresh wires.
    pub fn call(
        &mut self,
        id: SubCircuitId,
        inputs: &[Expression<F>],
    ) -> Result<Vec<Expression<F>>, CircuitBuilderError> {
        let callee = self
            .sub_circuits
            .get(id)
            .ok_or(CircuitBuilderError::UnknownSubCircuit { id })?;
        if callee.num_inputs() != inputs.len() {
            return Err(CircuitBuilderError::ArityMismatch {
                id,
                expected: callee.num_inputs(),
                got: inputs.len(),
            });
        }
        let n_outputs = callee.outputs().len();

        let outputs: Vec<WireId> = (0..n_outputs).map(|_| self.wire_alloc.alloc()).collect();
        let exprs = outputs.iter().map(|&w| Expression::wire(w)).collect();
        self.instructions.push(Instruction::SubCircuit {
            sub_circuit_id: id,
            inputs: inputs.to_vec(),
            outputs,
        });
        Ok(exprs)
    }

    fn into_parts(self) -> (Circuit<F>, SubCircuitRegistry<F>) {
        let circuit = Circuit::from_parts(
            self.num_inputs,
            self.num_public_inputs,
            self.instructions,
            self.constraints,
            self.outputs,
        );
        (circuit, self.sub_circuits)
    }

    /// Freezes the recorded circuits without validating the IR.
    ///
    /// Still fails if an assertion on constants can never hold.
    pub(crate) fn build_unchecked(mut self) -> Result<RootCircuit<F>, CircuitBuilderError> {
        if let Some(err) = self.unsatisfiable.take() {
            return Err(err);
        }
        let (entry, registry) = self.into_parts();
        let mut circuits = registry.into_circuits();
        circuits.insert(SubCircuitId::ENTRY, entry);
        Ok(RootCircuit::new_unchecked(circuits))
    }

    /// Freezes and validates the recorded circuits.
    pub fn build(self) -> Result<RootCircuit<F>, CircuitBuilderError> {
        let root = self.build_unchecked()?;
        root.validate()?;
        debug!(
            circuits = root.len(),
            field = %root.field(),
            "built root circuit"
        );
        Ok(root)
    }
}

/// Wire ids are `u32` and input `i` lands on wire `i + 1`.
fn check_input_count(num_inputs: usize) -> Result<(), CircuitBuilderError> {
    match u32::try_from(num_inputs) {
        Ok(n) if n < u32::MAX => Ok(()),
        _ => Err(CircuitBuilderError::TooManyInputs { num_inputs }),
    }
}
