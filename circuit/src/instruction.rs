use alloc::string::String;
use alloc::vec::Vec;
use core::{fmt, slice};

use strum_macros::EnumCount;

use crate::expr::Expression;
use crate::field::CircuitField;
use crate::types::{SubCircuitId, WireId};

/// A wire-producing step of a circuit.
///
/// Every variant reads only wires defined before it and writes fresh wires
/// that follow the previous instruction's outputs without gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<F> {
    /// `out = expr`.
    LinComb { expr: Expression<F>, out: WireId },
    /// `out = lhs * rhs`.
    Mul {
        lhs: Expression<F>,
        rhs: Expression<F>,
        out: WireId,
    },
    /// `outputs = name(inputs)`, computed by a registered hint at solve time.
    Hint {
        name: String,
        inputs: Vec<Expression<F>>,
        outputs: Vec<WireId>,
    },
    /// Instantiates another circuit of the same root.
    SubCircuit {
        sub_circuit_id: SubCircuitId,
        inputs: Vec<Expression<F>>,
        outputs: Vec<WireId>,
    },
}

/// Variant tag, used for statistics and as the on-disk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount)]
#[repr(u8)]
pub enum InstructionKind {
    LinComb = 0,
    Mul = 1,
    Hint = 2,
    SubCircuit = 3,
}

impl InstructionKind {
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::LinComb),
            1 => Some(Self::Mul),
            2 => Some(Self::Hint),
            3 => Some(Self::SubCircuit),
            _ => None,
        }
    }
}

impl<F> Instruction<F> {
    pub const fn kind(&self) -> InstructionKind {
        match self {
            Self::LinComb { .. } => InstructionKind::LinComb,
            Self::Mul { .. } => InstructionKind::Mul,
            Self::Hint { .. } => InstructionKind::Hint,
            Self::SubCircuit { .. } => InstructionKind::SubCircuit,
        }
    }

    /// Wires written by this instruction, in order.
    pub fn outputs(&self) -> &[WireId] {
        match self {
            Self::LinComb { out, .. } | Self::Mul { out, .. } => slice::from_ref(out),
            Self::Hint { outputs, .. } | Self::SubCircuit { outputs, .. } => outputs,
        }
    }

    /// Expressions read by this instruction.
    pub fn inputs(&self) -> impl Iterator<Item = &Expression<F>> + '_ {
        let (fixed, many): ([Option<&Expression<F>>; 2], &[Expression<F>]) = match self {
            Self::LinComb { expr, .. } => ([Some(expr), None], &[]),
            Self::Mul { lhs, rhs, .. } => ([Some(lhs), Some(rhs)], &[]),
            Self::Hint { inputs, .. } | Self::SubCircuit { inputs, .. } => ([None, None], inputs),
        };
        fixed.into_iter().flatten().chain(many)
    }
}

fn write_wires(f: &mut fmt::Formatter<'_>, wires: &[WireId]) -> fmt::Result {
    for (i, w) in wires.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{w}")?;
    }
    Ok(())
}

fn write_args<F: CircuitField>(f: &mut fmt::Formatter<'_>, args: &[Expression<F>]) -> fmt::Result {
    for (i, e) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

impl<F: CircuitField> fmt::Display for Instruction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinComb { expr, out } => write!(f, "{out} = {expr}"),
            Self::Mul { lhs, rhs, out } => write!(f, "{out} = ({lhs}) * ({rhs})"),
            Self::Hint {
                name,
                inputs,
                outputs,
            } => {
                write_wires(f, outputs)?;
                write!(f, " = hint {name}(")?;
                write_args(f, inputs)?;
                write!(f, ")")
            }
            Self::SubCircuit {
                sub_circuit_id,
                inputs,
                outputs,
            } => {
                write_wires(f, outputs)?;
                write!(f, " = call {sub_circuit_id}(")?;
                write_args(f, inputs)?;
                write!(f, ")")
            }
        }
    }
}
