use alloc::vec::Vec;
use core::fmt;
use core::ops::{Add, Mul, Neg, Sub};

use itertools::{EitherOrBoth, Itertools};

use crate::field::CircuitField;
use crate::types::WireId;

/// A single `coefficient * wire` monomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term<F> {
    pub coef: F,
    pub wire: WireId,
}

impl<F: CircuitField> Term<F> {
    pub const fn new(coef: F, wire: WireId) -> Self {
        Self { coef, wire }
    }

    fn scaled(self, c: F) -> Self {
        Self {
            coef: self.coef * c,
            wire: self.wire,
        }
    }
}

/// Degree-1 linear combination of wires in canonical form.
///
/// Terms are strictly increasing by wire id and carry non-zero coefficients,
/// so the empty combination is the constant zero and a constant `k` is the
/// single term `k * w0`. Every constructor restores this shape, which makes
/// the derived `PartialEq`/`Hash` structural over the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression<F> {
    terms: Vec<Term<F>>,
}

impl<F: CircuitField> Default for Expression<F> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<F: CircuitField> Expression<F> {
    pub const fn zero() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn constant(value: F) -> Self {
        Self::term(value, WireId::ONE)
    }

    /// The expression `1 * wire`.
    pub fn wire(wire: WireId) -> Self {
        Self::term(F::ONE, wire)
    }

    pub fn term(coef: F, wire: WireId) -> Self {
        if coef.is_zero() {
            return Self::zero();
        }
        Self {
            terms: alloc::vec![Term { coef, wire }],
        }
    }

    /// Normalises an arbitrary term list: sorts by wire, merges duplicates and
    /// drops zero coefficients.
    pub fn from_terms(terms: impl IntoIterator<Item = Term<F>>) -> Self {
        let mut terms: Vec<_> = terms.into_iter().collect();
        terms.sort_by_key(|t| t.wire);
        let terms = terms
            .into_iter()
            .coalesce(|a, b| {
                if a.wire == b.wire {
                    Ok(Term::new(a.coef + b.coef, a.wire))
                } else {
                    Err((a, b))
                }
            })
            .filter(|t| !t.coef.is_zero())
            .collect();
        Self { terms }
    }

    /// Accepts a term list only if it is already canonical.
    pub fn from_canonical_terms(terms: Vec<Term<F>>) -> Option<Self> {
        let expr = Self { terms };
        expr.is_canonical().then_some(expr)
    }

    pub fn terms(&self) -> &[Term<F>] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True for the constant zero.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        match self.terms.as_slice() {
            [] => true,
            [t] => t.wire == WireId::ONE,
            _ => false,
        }
    }

    pub fn constant_value(&self) -> Option<F> {
        match self.terms.as_slice() {
            [] => Some(F::ZERO),
            [t] if t.wire == WireId::ONE => Some(t.coef),
            _ => None,
        }
    }

    /// Returns `w` when the expression is exactly `1 * w` for a non-constant wire.
    pub fn as_single_wire(&self) -> Option<WireId> {
        match self.terms.as_slice() {
            [t] if t.wire != WireId::ONE && t.coef == F::ONE => Some(t.wire),
            _ => None,
        }
    }

    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.terms.iter().map(|t| t.wire)
    }

    pub fn max_wire(&self) -> Option<WireId> {
        self.terms.last().map(|t| t.wire)
    }

    pub fn is_canonical(&self) -> bool {
        self.terms.iter().all(|t| !t.coef.is_zero())
            && self.terms.windows(2).all(|w| w[0].wire < w[1].wire)
    }

    fn merge(&self, other: &Self, sign: F) -> Self {
        let terms = self
            .terms
            .iter()
            .merge_join_by(&other.terms, |a, b| a.wire.cmp(&b.wire))
            .filter_map(|pair| match pair {
                EitherOrBoth::Left(a) => Some(*a),
                EitherOrBoth::Right(b) => Some(b.scaled(sign)),
                EitherOrBoth::Both(a, b) => {
                    let coef = a.coef + b.coef * sign;
                    (!coef.is_zero()).then_some(Term::new(coef, a.wire))
                }
            })
            .collect();
        Self { terms }
    }

    pub fn add(&self, other: &Self) -> Self {
        self.merge(other, F::ONE)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.merge(other, F::NEG_ONE)
    }

    pub fn neg(&self) -> Self {
        self.scale(F::NEG_ONE)
    }

    pub fn scale(&self, c: F) -> Self {
        if c.is_zero() {
            return Self::zero();
        }
        Self {
            terms: self.terms.iter().map(|t| t.scaled(c)).collect(),
        }
    }

    /// Evaluates the combination over a wire-value vector indexed by wire id.
    ///
    /// Callers guarantee every referenced wire is in range; validated circuits do.
    pub fn eval(&self, values: &[F]) -> F {
        self.terms
            .iter()
            .map(|t| t.coef * values[t.wire.index()])
            .sum()
    }
}

impl<F: CircuitField> From<F> for Expression<F> {
    fn from(value: F) -> Self {
        Self::constant(value)
    }
}

impl<F: CircuitField> FromIterator<Term<F>> for Expression<F> {
    fn from_iter<I: IntoIterator<Item = Term<F>>>(iter: I) -> Self {
        Self::from_terms(iter)
    }
}

impl<F: CircuitField> From<WireId> for Expression<F> {
    fn from(wire: WireId) -> Self {
        Self::wire(wire)
    }
}

impl<F: CircuitField> Add for &Expression<F> {
    type Output = Expression<F>;

    fn add(self, rhs: Self) -> Expression<F> {
        Expression::add(self, rhs)
    }
}

impl<F: CircuitField> Add for Expression<F> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Expression::add(&self, &rhs)
    }
}

impl<F: CircuitField> Sub for &Expression<F> {
    type Output = Expression<F>;

    fn sub(self, rhs: Self) -> Expression<F> {
        Expression::sub(self, rhs)
    }
}

impl<F: CircuitField> Sub for Expression<F> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Expression::sub(&self, &rhs)
    }
}

impl<F: CircuitField> Neg for &Expression<F> {
    type Output = Expression<F>;

    fn neg(self) -> Expression<F> {
        Expression::neg(self)
    }
}

impl<F: CircuitField> Neg for Expression<F> {
    type Output = Self;

    fn neg(self) -> Self {
        Expression::neg(&self)
    }
}

impl<F: CircuitField> Mul<F> for &Expression<F> {
    type Output = Expression<F>;

    fn mul(self, rhs: F) -> Expression<F> {
        self.scale(rhs)
    }
}

impl<F: CircuitField> Mul<F> for Expression<F> {
    type Output = Self;

    fn mul(self, rhs: F) -> Self {
        self.scale(rhs)
    }
}

impl<F: CircuitField> fmt::Display for Expression<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            match (t.wire == WireId::ONE, t.coef == F::ONE) {
                (true, _) => write!(f, "{}", t.coef)?,
                (false, true) => write!(f, "{}", t.wire)?,
                (false, false) => write!(f, "{}*{}", t.coef, t.wire)?,
            }
        }
        Ok(())
    }
}
