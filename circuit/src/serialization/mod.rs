//! Binary codecs for the circuit IR, the input solver and layered circuits.
//!
//! All integers are little-endian and every length is written as a `u32`.
//! Each artifact opens with a 4-byte magic, a `u16` format version and the
//! field id, so a blob can be routed to the right backend before decoding.

mod ir;
mod layered;
mod solver;

use alloc::string::String;
use alloc::vec::Vec;

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::field::{CircuitField, FieldKind};
use crate::types::{SubCircuitId, WireId};
use crate::CircuitError;

/// Current version of every artifact format.
pub const FORMAT_VERSION: u16 = 1;

/// Magic of a serialised root circuit.
pub const IR_MAGIC: [u8; 4] = *b"ECIR";
/// Magic of a serialised input solver.
pub const SOLVER_MAGIC: [u8; 4] = *b"ECIS";
/// Magic of a serialised layered circuit.
pub const LAYERED_MAGIC: [u8; 4] = *b"ECLC";

pub trait SerializeBytes {
    fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError>;
}

pub trait DeserializeBytes {
    fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError>
    where
        Self: Sized;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Write buffer is full")]
    WriteBufferFull,
    #[error("Not enough data in read buffer to deserialize")]
    NotEnoughBytes,
    #[error("Bad magic {found:?}, expected {expected:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },
    #[error("Unsupported format version {version}")]
    UnsupportedVersion { version: u16 },
    #[error("Unknown variant index {name}::{index}")]
    UnknownVariant { name: &'static str, index: u64 },
    #[error("Field element is not in canonical form")]
    NonCanonicalField,
    #[error("Expression terms are not sorted, merged and non-zero")]
    NonCanonicalExpression,
    #[error("String is not valid UTF-8")]
    InvalidUtf8,
    #[error("Invalid construction of {name}")]
    InvalidConstruction { name: &'static str },
    #[error("usize {size} is too large to serialize (max is {max})", max = u32::MAX)]
    UsizeTooLarge { size: usize },
    #[error("{remaining} unexpected trailing bytes")]
    TrailingBytes { remaining: usize },
}

impl<T: SerializeBytes + ?Sized> SerializeBytes for &T {
    fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
        (**self).serialize(write_buf)
    }
}

impl SerializeBytes for usize {
    fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
        let value: u32 = (*self)
            .try_into()
            .map_err(|_| SerializationError::UsizeTooLarge { size: *self })?;
        SerializeBytes::serialize(&value, &mut write_buf)
    }
}

impl DeserializeBytes for usize {
    fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
        let value: u32 = DeserializeBytes::deserialize(&mut read_buf)?;
        Ok(value as Self)
    }
}

macro_rules! impl_int_codec {
    ($ty:ty, $put:ident, $get:ident) => {
        impl SerializeBytes for $ty {
            fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
                assert_enough_space_for(&write_buf, core::mem::size_of::<Self>())?;
                write_buf.$put(*self);
                Ok(())
            }
        }

        impl DeserializeBytes for $ty {
            fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
                assert_enough_data_for(&read_buf, core::mem::size_of::<Self>())?;
                Ok(read_buf.$get())
            }
        }
    };
}

impl_int_codec!(u64, put_u64_le, get_u64_le);
impl_int_codec!(u32, put_u32_le, get_u32_le);
impl_int_codec!(u16, put_u16_le, get_u16_le);
impl_int_codec!(u8, put_u8, get_u8);

impl SerializeBytes for str {
    fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
        let bytes = self.as_bytes();
        SerializeBytes::serialize(&bytes.len(), &mut write_buf)?;
        assert_enough_space_for(&write_buf, bytes.len())?;
        write_buf.put_slice(bytes);
        Ok(())
    }
}

impl SerializeBytes for String {
    fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
        self.as_str().serialize(write_buf)
    }
}

impl DeserializeBytes for String {
    fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
        let len = usize::deserialize(&mut read_buf)?;
        assert_enough_data_for(&read_buf, len)?;
        Self::from_utf8(read_buf.copy_to_bytes(len).to_vec())
            .map_err(|_| SerializationError::InvalidUtf8)
    }
}

impl<T: SerializeBytes> SerializeBytes for [T] {
    fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
        SerializeBytes::serialize(&self.len(), &mut write_buf)?;
        self.iter()
            .try_for_each(|item| SerializeBytes::serialize(item, &mut write_buf))
    }
}

impl<T: SerializeBytes> SerializeBytes for Vec<T> {
    fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
        self.as_slice().serialize(write_buf)
    }
}

impl<T: DeserializeBytes> DeserializeBytes for Vec<T> {
    fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
        let len = usize::deserialize(&mut read_buf)?;
        (0..len)
            .map(|_| DeserializeBytes::deserialize(&mut read_buf))
            .collect()
    }
}

impl SerializeBytes for WireId {
    fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
        self.0.serialize(write_buf)
    }
}

impl DeserializeBytes for WireId {
    fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
        u32::deserialize(read_buf).map(Self)
    }
}

impl SerializeBytes for SubCircuitId {
    fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
        self.0.serialize(write_buf)
    }
}

impl DeserializeBytes for SubCircuitId {
    fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
        u64::deserialize(read_buf).map(Self)
    }
}

/// Writes a field element as its fixed-length canonical little-endian bytes.
pub(crate) fn serialize_field<F: CircuitField>(
    value: &F,
    mut write_buf: impl BufMut,
) -> Result<(), SerializationError> {
    let bytes = value.to_canonical_bytes();
    assert_enough_space_for(&write_buf, bytes.len())?;
    write_buf.put_slice(&bytes);
    Ok(())
}

pub(crate) fn deserialize_field<F: CircuitField>(
    mut read_buf: impl Buf,
) -> Result<F, SerializationError> {
    let len = F::byte_len();
    assert_enough_data_for(&read_buf, len)?;
    let bytes = read_buf.copy_to_bytes(len);
    F::from_canonical_bytes(&bytes).ok_or(SerializationError::NonCanonicalField)
}

/// Leading bytes shared by every artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub magic: [u8; 4],
    pub field: FieldKind,
}

impl Header {
    pub(crate) const fn new<F: CircuitField>(magic: [u8; 4]) -> Self {
        Self {
            magic,
            field: F::KIND,
        }
    }

    pub(crate) fn write(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
        assert_enough_space_for(&write_buf, self.magic.len())?;
        write_buf.put_slice(&self.magic);
        FORMAT_VERSION.serialize(&mut write_buf)?;
        self.field.id().serialize(&mut write_buf)
    }

    /// Reads a header and checks its magic and version.
    pub(crate) fn read(
        expected_magic: [u8; 4],
        mut read_buf: impl Buf,
    ) -> Result<Self, SerializationError> {
        let magic = read_magic(&mut read_buf)?;
        if magic != expected_magic {
            return Err(SerializationError::BadMagic {
                expected: expected_magic,
                found: magic,
            });
        }
        Self::read_rest(magic, read_buf)
    }

    fn read_rest(magic: [u8; 4], mut read_buf: impl Buf) -> Result<Self, SerializationError> {
        let version = u16::deserialize(&mut read_buf)?;
        if version != FORMAT_VERSION {
            return Err(SerializationError::UnsupportedVersion { version });
        }
        let id = u8::deserialize(&mut read_buf)?;
        let field = FieldKind::from_id(id).ok_or(SerializationError::UnknownVariant {
            name: "FieldKind",
            index: id.into(),
        })?;
        Ok(Self { magic, field })
    }

    /// Fails with [`CircuitError::FieldMismatch`] unless the artifact was
    /// written for `F`.
    pub(crate) fn expect_field<F: CircuitField>(&self) -> Result<(), CircuitError> {
        if self.field != F::KIND {
            return Err(CircuitError::FieldMismatch {
                expected: F::KIND,
                got: self.field,
            });
        }
        Ok(())
    }
}

fn read_magic(mut read_buf: impl Buf) -> Result<[u8; 4], SerializationError> {
    let mut magic = [0; 4];
    assert_enough_data_for(&read_buf, magic.len())?;
    read_buf.copy_to_slice(&mut magic);
    Ok(magic)
}

/// Reads the field an artifact was written for, whatever its kind.
pub fn peek_field(bytes: &[u8]) -> Result<FieldKind, CircuitError> {
    let mut read_buf = bytes;
    let magic = read_magic(&mut read_buf)?;
    if ![IR_MAGIC, SOLVER_MAGIC, LAYERED_MAGIC].contains(&magic) {
        return Err(SerializationError::BadMagic {
            expected: IR_MAGIC,
            found: magic,
        }
        .into());
    }
    Ok(Header::read_rest(magic, &mut read_buf)?.field)
}

pub(crate) fn expect_consumed(read_buf: &impl Buf) -> Result<(), SerializationError> {
    match read_buf.remaining() {
        0 => Ok(()),
        remaining => Err(SerializationError::TrailingBytes { remaining }),
    }
}

#[inline]
pub fn assert_enough_space_for(
    write_buf: &impl BufMut,
    size: usize,
) -> Result<(), SerializationError> {
    if write_buf.remaining_mut() < size {
        return Err(SerializationError::WriteBufferFull);
    }
    Ok(())
}

#[inline]
pub fn assert_enough_data_for(read_buf: &impl Buf, size: usize) -> Result<(), SerializationError> {
    if read_buf.remaining() < size {
        return Err(SerializationError::NotEnoughBytes);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use p3_bn254::Bn254;
    use p3_field::PrimeCharacteristicRing;
    use p3_mersenne_31::Mersenne31;

    use super::*;

    #[test]
    fn test_string_and_vec() {
        let mut buf = Vec::new();
        "inverse".to_string().serialize(&mut buf).unwrap();
        vec![1u32, 2, 3].serialize(&mut buf).unwrap();
        assert_eq!(&buf[..4], &7u32.to_le_bytes());

        let mut read_buf = buf.as_slice();
        assert_eq!(String::deserialize(&mut read_buf).unwrap(), "inverse");
        assert_eq!(Vec::<u32>::deserialize(&mut read_buf).unwrap(), vec![1, 2, 3]);
        assert!(expect_consumed(&read_buf).is_ok());
    }

    #[test]
    fn test_truncated_input() {
        let mut read_buf: &[u8] = &[1, 0];
        assert_eq!(
            u32::deserialize(&mut read_buf),
            Err(SerializationError::NotEnoughBytes)
        );
        let mut read_buf: &[u8] = &[5, 0, 0, 0, b'a'];
        assert_eq!(
            String::deserialize(&mut read_buf),
            Err(SerializationError::NotEnoughBytes)
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut read_buf: &[u8] = &[2, 0, 0, 0, 0xff, 0xfe];
        assert_eq!(
            String::deserialize(&mut read_buf),
            Err(SerializationError::InvalidUtf8)
        );
    }

    #[test]
    fn test_field_encoding() {
        let mut buf = Vec::new();
        serialize_field(&Mersenne31::from_u64(7), &mut buf).unwrap();
        serialize_field(&Bn254::NEG_ONE, &mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 32);
        assert_eq!(&buf[..4], &[7, 0, 0, 0]);

        let mut read_buf = buf.as_slice();
        assert_eq!(
            deserialize_field::<Mersenne31>(&mut read_buf).unwrap(),
            Mersenne31::from_u64(7)
        );
        assert_eq!(deserialize_field::<Bn254>(&mut read_buf).unwrap(), Bn254::NEG_ONE);

        // 2^31 - 1 is the modulus itself.
        let mut read_buf: &[u8] = &[0xff, 0xff, 0xff, 0x7f];
        assert_eq!(
            deserialize_field::<Mersenne31>(&mut read_buf),
            Err(SerializationError::NonCanonicalField)
        );
    }

    #[test]
    fn test_header() {
        let mut buf = Vec::new();
        Header::new::<Bn254>(SOLVER_MAGIC).write(&mut buf).unwrap();
        assert_eq!(buf.len(), 7);
        assert_eq!(peek_field(&buf).unwrap(), FieldKind::Bn254);

        let header = Header::read(SOLVER_MAGIC, buf.as_slice()).unwrap();
        assert!(header.expect_field::<Bn254>().is_ok());
        assert!(matches!(
            header.expect_field::<Mersenne31>(),
            Err(CircuitError::FieldMismatch {
                expected: FieldKind::Mersenne31,
                got: FieldKind::Bn254
            })
        ));
        assert!(matches!(
            Header::read(LAYERED_MAGIC, buf.as_slice()),
            Err(SerializationError::BadMagic { .. })
        ));

        buf[4] = 9;
        assert!(matches!(
            Header::read(SOLVER_MAGIC, buf.as_slice()),
            Err(SerializationError::UnsupportedVersion { version: 9 })
        ));
    }
}
