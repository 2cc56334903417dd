//! Field values and fields bound to a record buffer.

use derive_more::Display;
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bits;
use crate::error::{Error, Result};
use crate::huffman::Decoded;
use crate::table::HuffmanBuffer;
use crate::types::{FieldDefinition, FieldType, Tag};

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    /// Text of a string or compressed string field
    #[display("{_0}")]
    String(String),
    /// Bytes of a binary field, or the bits of a field with an unknown type
    #[display("{_0:02X?}")]
    Binary(Vec<u8>),
    /// Value of a signed integer field
    #[display("{_0}")]
    SignedInt(i64),
    /// Value of an unsigned integer field
    #[display("{_0}")]
    UnsignedInt(u64),
    /// Value of a float field
    #[display("{_0}")]
    Float(f32),
}

impl FieldValue {
    /// The text of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The bytes of a binary value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// An integer value as unsigned, if it is not negative
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            FieldValue::UnsignedInt(v) => Some(v),
            FieldValue::SignedInt(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// An integer value as signed, if it fits
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::SignedInt(v) => Some(v),
            FieldValue::UnsignedInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value of a float
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            FieldValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! from_integer {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for FieldValue {
                fn from(value: $source) -> Self {
                    FieldValue::$variant(value as $target)
                }
            }
        )+
    };
}

from_integer!(UnsignedInt, u64, u8, u16, u32, u64);
from_integer!(SignedInt, i64, i8, i16, i32, i64);

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Binary(value)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        FieldValue::Binary(value.to_vec())
    }
}

impl PartialEq<&str> for FieldValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<u64> for FieldValue {
    fn eq(&self, other: &u64) -> bool {
        self.as_u64() == Some(*other)
    }
}

impl PartialEq<i64> for FieldValue {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}

/// How a definition's bits are read
enum Layout {
    Text,
    Bytes,
    Signed,
    Unsigned,
    Float,
    Raw,
}

impl Layout {
    fn of(definition: &FieldDefinition) -> Layout {
        match definition.field_type {
            FieldType::String => Layout::Text,
            FieldType::Binary => Layout::Bytes,
            FieldType::SignedInt => Layout::Signed,
            FieldType::UnsignedInt => Layout::Unsigned,
            FieldType::Float if definition.bits == 32 => Layout::Float,
            _ => Layout::Raw,
        }
    }
}

/// Byte range of a string or binary field
fn byte_span(definition: &FieldDefinition) -> Result<(usize, usize)> {
    if definition.offset % 8 != 0 || definition.bits % 8 != 0 {
        return Err(Error::UnalignedField {
            field: definition.name.to_string(),
        });
    }
    Ok((definition.offset as usize / 8, definition.bits as usize / 8))
}

fn mismatch(definition: &FieldDefinition) -> Error {
    Error::TypeMismatch {
        field: definition.name.to_string(),
        expected: definition.field_type.to_string(),
    }
}

fn out_of_range(definition: &FieldDefinition) -> Error {
    Error::ValueOutOfRange {
        field: definition.name.to_string(),
        bits: definition.bits,
    }
}

/// A field stored directly in the record buffer
#[derive(Debug, Clone, Copy)]
pub struct PlainField<'a> {
    definition: &'a FieldDefinition,
    record: &'a [u8],
    length_bits: u32,
}

impl<'a> PlainField<'a> {
    /// Decode the field
    pub fn value(&self) -> Result<FieldValue> {
        let definition = self.definition;
        definition.validate(self.length_bits)?;

        let offset = definition.offset as usize;
        let width = definition.bits as usize;
        Ok(match Layout::of(definition) {
            Layout::Text => {
                let (start, len) = byte_span(definition)?;
                FieldValue::String(bits::read_string(self.record, start, len)?)
            }
            Layout::Bytes => {
                let (start, len) = byte_span(definition)?;
                FieldValue::Binary(bits::read_bytes(self.record, start, len)?.to_vec())
            }
            Layout::Signed => FieldValue::SignedInt(bits::read_signed_bits(self.record, offset, width)?),
            Layout::Unsigned => FieldValue::UnsignedInt(bits::read_bits(self.record, offset, width)?),
            Layout::Float => FieldValue::Float(bits::read_float(self.record, offset)?),
            Layout::Raw => FieldValue::Binary(bits::read_raw_bits(self.record, offset, width)?),
        })
    }
}

/// A field whose record slot points into the table's huffman buffer
///
/// The record stores, at the definition's bit span, the byte offset of the
/// value in the huffman buffer. Definitions without a bit span carry that
/// offset directly. At the offset sits a big endian length prefix of one or two
/// bytes followed by the compressed bits.
#[derive(Debug, Clone, Copy)]
pub struct HuffmanField<'a> {
    definition: &'a FieldDefinition,
    record: &'a [u8],
    length_bits: u32,
    buffer: Option<&'a HuffmanBuffer>,
}

impl<'a> HuffmanField<'a> {
    /// Byte offset of the value inside the huffman buffer
    pub fn offset(&self) -> Result<usize> {
        payload_offset(self.definition, self.length_bits, self.record)
    }

    /// The length prefix and compressed bytes of the value
    pub fn payload(&self) -> Result<&'a [u8]> {
        let buffer = self.buffer()?;
        let offset = self.offset()?;
        let prefix = self.definition.field_type.prefix_len().unwrap_or(1);
        buffer.payload(self.definition.name, offset, prefix)
    }

    /// Decode the value, keeping track of whether it ended on a terminator
    pub fn decode(&self) -> Result<Decoded> {
        let buffer = self.buffer()?;
        let payload = self.payload()?;
        let prefix = self.definition.field_type.prefix_len().unwrap_or(1);
        Ok(buffer.tree().decode(&payload[prefix..]))
    }

    /// Decode the value as text
    pub fn value(&self) -> Result<FieldValue> {
        let decoded = self.decode()?;
        if !decoded.complete {
            warn!(field = %self.definition.name, "compressed value has no terminator");
        }
        Ok(FieldValue::String(decoded.text()))
    }

    fn buffer(&self) -> Result<&'a HuffmanBuffer> {
        self.buffer.ok_or_else(|| Error::FieldRange {
            field: self.definition.name.to_string(),
            offset: self.definition.offset as u64,
            bits: self.definition.bits as u64,
            limit: 0,
        })
    }
}

/// Locate a compressed value inside the huffman buffer
pub(crate) fn payload_offset(definition: &FieldDefinition, length_bits: u32, record: &[u8]) -> Result<usize> {
    if definition.bits == 0 {
        return Ok(definition.offset as usize);
    }
    definition.validate(length_bits)?;
    let offset = bits::read_bits(record, definition.offset as usize, definition.bits as usize)?;
    Ok(offset as usize)
}

/// A field definition bound to one record's buffer
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    /// Value lives in the record
    Plain(PlainField<'a>),
    /// Value lives in the table's huffman buffer
    Huffman(HuffmanField<'a>),
}

impl<'a> Field<'a> {
    /// Bind `definition` to `record`
    ///
    /// Compressed types bind as [`Field::Huffman`], everything else as [`Field::Plain`].
    pub fn bind(
        definition: &'a FieldDefinition,
        record: &'a [u8],
        length_bits: u32,
        buffer: Option<&'a HuffmanBuffer>,
    ) -> Field<'a> {
        if definition.field_type.is_compressed() {
            Field::Huffman(HuffmanField {
                definition,
                record,
                length_bits,
                buffer,
            })
        } else {
            Field::Plain(PlainField {
                definition,
                record,
                length_bits,
            })
        }
    }

    /// The definition this field was bound from
    pub fn definition(&self) -> &'a FieldDefinition {
        match self {
            Field::Plain(f) => f.definition,
            Field::Huffman(f) => f.definition,
        }
    }

    /// Name of the field
    pub fn name(&self) -> Tag {
        self.definition().name
    }

    /// Decode the field
    pub fn value(&self) -> Result<FieldValue> {
        match self {
            Field::Plain(f) => f.value(),
            Field::Huffman(f) => f.value(),
        }
    }

    /// Bits of the field inside the record, left aligned
    pub fn raw(&self) -> Result<Vec<u8>> {
        let (definition, record, length_bits) = match self {
            Field::Plain(f) => (f.definition, f.record, f.length_bits),
            Field::Huffman(f) => (f.definition, f.record, f.length_bits),
        };
        definition.validate(length_bits)?;
        bits::read_raw_bits(record, definition.offset as usize, definition.bits as usize)
    }
}

/// Store `value` into `record` at the position described by `definition`
///
/// Compressed fields are read-only and fail with [`Error::Encoding`].
pub(crate) fn write_value(
    definition: &FieldDefinition,
    length_bits: u32,
    record: &mut [u8],
    value: FieldValue,
) -> Result<()> {
    if definition.field_type.is_compressed() {
        return Err(Error::Encoding {
            field: definition.name.to_string(),
        });
    }
    definition.validate(length_bits)?;

    let offset = definition.offset as usize;
    let width = definition.bits as usize;
    match (Layout::of(definition), value) {
        (Layout::Text, FieldValue::String(s)) => {
            let (start, len) = byte_span(definition)?;
            bits::write_bytes(record, start, len, s.as_bytes())
        }
        (Layout::Bytes, FieldValue::Binary(b)) => {
            let (start, len) = byte_span(definition)?;
            bits::write_bytes(record, start, len, &b)
        }
        (Layout::Signed, v @ (FieldValue::SignedInt(_) | FieldValue::UnsignedInt(_))) => {
            let v = v.as_i64().ok_or_else(|| out_of_range(definition))?;
            if !bits::fits_signed(v, width) {
                return Err(out_of_range(definition));
            }
            bits::write_signed_bits(record, offset, width, v)
        }
        (Layout::Unsigned, v @ (FieldValue::SignedInt(_) | FieldValue::UnsignedInt(_))) => {
            let v = v.as_u64().ok_or_else(|| out_of_range(definition))?;
            if !bits::fits_unsigned(v, width) {
                return Err(out_of_range(definition));
            }
            bits::write_bits(record, offset, width, v)
        }
        (Layout::Float, FieldValue::Float(f)) => bits::write_float(record, offset, f),
        (Layout::Raw, FieldValue::Binary(b)) => bits::write_raw_bits(record, offset, width, &b),
        _ => Err(mismatch(definition)),
    }
}
