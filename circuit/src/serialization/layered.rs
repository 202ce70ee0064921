use alloc::vec::Vec;

use bytes::{Buf, BufMut};
use tracing::{debug, instrument};

use super::{
    deserialize_field, expect_consumed, serialize_field, DeserializeBytes, Header,
    SerializationError, SerializeBytes, LAYERED_MAGIC,
};
use crate::field::CircuitField;
use crate::layered::{Gate, GateKind, LayeredCircuit};
use crate::CircuitError;

// Every gate is a fixed-size record `(tag, a, b, coef)`. Input gates store
// their index in `a`, constant gates their value in `coef`; unused fields
// are zero.
impl<F: CircuitField> SerializeBytes for Gate<F> {
    fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
        let (a, b, coef) = match *self {
            Self::Input { index } => (index, 0, F::ZERO),
            Self::Constant { value } => (0, 0, value),
            Self::Add { a, b, coef } | Self::Mul { a, b, coef } => (a, b, coef),
        };
        self.kind().tag().serialize(&mut write_buf)?;
        a.serialize(&mut write_buf)?;
        b.serialize(&mut write_buf)?;
        serialize_field(&coef, write_buf)
    }
}

impl<F: CircuitField> DeserializeBytes for Gate<F> {
    fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
        let tag = u8::deserialize(&mut read_buf)?;
        let kind = GateKind::from_tag(tag).ok_or(SerializationError::UnknownVariant {
            name: "Gate",
            index: tag.into(),
        })?;
        let a = usize::deserialize(&mut read_buf)?;
        let b = usize::deserialize(&mut read_buf)?;
        let coef: F = deserialize_field(&mut read_buf)?;

        let unused_is_zero = match kind {
            GateKind::Input => b == 0 && coef.is_zero(),
            GateKind::Constant => a == 0 && b == 0,
            GateKind::Add | GateKind::Mul => true,
        };
        if !unused_is_zero {
            return Err(SerializationError::InvalidConstruction { name: "gate record" });
        }
        Ok(match kind {
            GateKind::Input => Self::Input { index: a },
            GateKind::Constant => Self::Constant { value: coef },
            GateKind::Add => Self::Add { a, b, coef },
            GateKind::Mul => Self::Mul { a, b, coef },
        })
    }
}

impl<F: CircuitField> LayeredCircuit<F> {
    /// Serialises the layered circuit: header, input counts, the layers as
    /// length-prefixed gate lists, then the output and constraint gates.
    #[instrument(skip_all)]
    pub fn to_bytes(&self) -> Result<Vec<u8>, CircuitError> {
        let mut buf = Vec::new();
        Header::new::<F>(LAYERED_MAGIC).write(&mut buf)?;
        self.num_inputs().serialize(&mut buf)?;
        self.num_external_inputs().serialize(&mut buf)?;
        self.num_public_inputs().serialize(&mut buf)?;
        self.layers().serialize(&mut buf)?;
        self.outputs().serialize(&mut buf)?;
        self.constraints().serialize(&mut buf)?;
        debug!(bytes = buf.len(), layers = self.layers().len(), "serialized layered circuit");
        Ok(buf)
    }

    /// Decodes and validates a layered circuit written by [`Self::to_bytes`].
    #[instrument(skip_all)]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CircuitError> {
        let mut read_buf = bytes;
        Header::read(LAYERED_MAGIC, &mut read_buf)?.expect_field::<F>()?;
        let num_inputs = usize::deserialize(&mut read_buf)?;
        let num_external_inputs = usize::deserialize(&mut read_buf)?;
        let num_public_inputs = usize::deserialize(&mut read_buf)?;
        let layers = Vec::<Vec<Gate<F>>>::deserialize(&mut read_buf)?;
        let outputs = Vec::deserialize(&mut read_buf)?;
        let constraints = Vec::deserialize(&mut read_buf)?;
        expect_consumed(&read_buf)?;
        Self::new(
            num_inputs,
            num_external_inputs,
            num_public_inputs,
            layers,
            outputs,
            constraints,
        )
    }
}
