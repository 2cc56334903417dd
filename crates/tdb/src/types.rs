//! Base types for structure of TDB file.

use binrw::{BinRead, BinWrite};
use derive_more::{Deref, Display};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Size of the [`TdbHeader`] on disk
pub const FILE_HEADER_LEN: usize = 0x18;

/// Size of a [`DirectoryEntry`] on disk
pub const DIRECTORY_ENTRY_LEN: usize = 0x08;

/// Size of a [`TableHeader`] on disk
pub const TABLE_HEADER_LEN: usize = 0x28;

/// Size of a [`FieldDefinition`] on disk
pub const FIELD_DEFINITION_LEN: usize = 0x10;

/// Size of the trailer that follows the last table
pub const FOOTER_LEN: usize = 0x04;

/// A four character code naming a table or a field
///
/// Codes are stored byte reversed on disk, `AWPL` is written as `LPWA`.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deref, Display)]
#[display("{}", String::from_utf8_lossy(_0))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub struct Tag([u8; 4]);

impl Tag {
    /// Create a tag from its characters in reading order
    pub const fn new(code: [u8; 4]) -> Self {
        Tag(code)
    }

    /// Create a tag from its on-disk, reversed, representation
    pub fn from_disk(mut raw: [u8; 4]) -> Self {
        raw.reverse();
        Tag(raw)
    }

    /// The on-disk, reversed, representation of this tag
    pub fn to_disk(&self) -> [u8; 4] {
        let mut raw = self.0;
        raw.reverse();
        raw
    }

    /// The characters of this tag in reading order
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", self.to_string())
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        <[u8; 4]>::try_from(s.as_bytes())
            .map(Tag)
            .map_err(|_| Error::InvalidTag(s.to_owned()))
    }
}

impl TryFrom<&str> for Tag {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Tag::from_str(value)
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Tag::from_str(&value)
    }
}

impl From<Tag> for String {
    fn from(value: Tag) -> Self {
        value.to_string()
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// TDB file header
///
/// The first 24 bytes of every file. All data is stored in big endian format.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TdbHeader {
    /// Format marker, `DB` in ASCII
    pub digit: u16,

    /// Format version
    pub version: u16,

    pub unknown1: u32,

    /// Declared size of the database
    pub db_size: u32,

    pub zero: u32,

    /// The number of entries in the table directory
    pub table_count: u32,

    pub unknown2: u32,
}

/// An entry of the table directory
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectoryEntry {
    /// Name of the table
    #[br(map = Tag::from_disk)]
    #[bw(map = Tag::to_disk)]
    pub name: Tag,

    /// Offset of the table header, counted from the end of the directory
    pub offset: u32,
}

/// How a table lays out its record slots
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// Only `current_records` slots are stored
    Compact,
    /// `max_records` slots are stored, the ones past `current_records` are unused
    Preallocated,
    /// Record slots are followed by a huffman buffer holding compressed strings
    Compressed,
}

impl From<u32> for Allocation {
    fn from(value: u32) -> Self {
        match value {
            2 | 6 => Allocation::Preallocated,
            66 => Allocation::Compressed,
            _ => Allocation::Compact,
        }
    }
}

/// Header preceding every table
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TableHeader {
    /// Checksum carried over from the previous table
    pub prior_crc: u32,

    /// Allocation type code, see [`Allocation`]
    pub data_allocation_type: u32,

    /// Size of one record in bytes
    pub length_bytes: u32,

    /// Size of one record in bits
    pub length_bits: u32,

    pub zero: u32,

    /// Number of record slots reserved by the table
    pub max_records: u16,

    /// Number of record slots holding data
    pub current_records: u16,

    pub unknown2: u32,

    /// Number of field definitions following this header
    pub field_count: u8,

    pub index_count: u8,

    pub zero2: u16,

    pub zero3: u32,

    /// Checksum of this header
    pub header_crc: u32,
}

impl TableHeader {
    /// Interpretation of [`TableHeader::data_allocation_type`]
    pub fn allocation(&self) -> Allocation {
        Allocation::from(self.data_allocation_type)
    }

    /// Number of fixed-size record buffers exposed by the table
    pub fn slot_count(&self) -> usize {
        match self.allocation() {
            Allocation::Preallocated => self.max_records as usize,
            _ => self.current_records as usize,
        }
    }

    /// Size in bytes of the record block following the field definitions
    ///
    /// Compressed tables reserve `max_records` slots before their huffman buffer.
    pub fn record_block_len(&self) -> usize {
        let slots = match self.allocation() {
            Allocation::Compact => self.current_records,
            Allocation::Preallocated | Allocation::Compressed => self.max_records,
        };
        self.length_bytes as usize * slots as usize
    }

    /// Size in bytes of the field definition block following this header
    pub fn field_block_len(&self) -> usize {
        self.field_count as usize * FIELD_DEFINITION_LEN
    }
}

/// Storage type of a field
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u32", into = "u32"))]
pub enum FieldType {
    /// NUL padded text
    #[display("string")]
    String,
    /// Raw bytes
    #[display("binary")]
    Binary,
    /// Two's complement integer
    #[display("signed integer")]
    SignedInt,
    /// Unsigned integer
    #[display("unsigned integer")]
    UnsignedInt,
    /// IEEE-754 single precision float
    #[display("float")]
    Float,
    /// Huffman compressed text with a one byte length prefix
    #[display("compressed string")]
    HuffmanNarrow,
    /// Huffman compressed text with a two byte length prefix
    #[display("compressed string")]
    HuffmanWide,
    /// Any other code, handled as raw bits
    #[display("unknown ({_0})")]
    Unknown(u32),
}

impl FieldType {
    /// Whether values of this type live in the table's huffman buffer
    pub fn is_compressed(&self) -> bool {
        matches!(self, FieldType::HuffmanNarrow | FieldType::HuffmanWide)
    }

    /// Width in bytes of the length prefix of a compressed value
    pub fn prefix_len(&self) -> Option<usize> {
        match self {
            FieldType::HuffmanNarrow => Some(1),
            FieldType::HuffmanWide => Some(2),
            _ => None,
        }
    }
}

impl From<u32> for FieldType {
    fn from(value: u32) -> Self {
        match value {
            0 => FieldType::String,
            1 => FieldType::Binary,
            2 => FieldType::SignedInt,
            3 => FieldType::UnsignedInt,
            4 => FieldType::Float,
            13 => FieldType::HuffmanNarrow,
            14 => FieldType::HuffmanWide,
            other => FieldType::Unknown(other),
        }
    }
}

impl From<FieldType> for u32 {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::String => 0,
            FieldType::Binary => 1,
            FieldType::SignedInt => 2,
            FieldType::UnsignedInt => 3,
            FieldType::Float => 4,
            FieldType::HuffmanNarrow => 13,
            FieldType::HuffmanWide => 14,
            FieldType::Unknown(other) => other,
        }
    }
}

/// Definition of a field shared by every record of a table
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDefinition {
    /// Storage type
    #[br(map = |x: u32| FieldType::from(x))]
    #[bw(map = |t: &FieldType| u32::from(*t))]
    pub field_type: FieldType,

    /// First bit of the field inside a record
    pub offset: u32,

    /// Name of the field
    #[br(map = Tag::from_disk)]
    #[bw(map = Tag::to_disk)]
    pub name: Tag,

    /// Width of the field in bits
    pub bits: u32,
}

impl FieldDefinition {
    /// One past the last bit of the field inside a record
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.bits as u64
    }

    /// Ensure the field fits inside a record of `limit` bits
    ///
    /// Compressed fields may carry their payload offset directly and are
    /// only checked when they declare a bit span.
    pub fn validate(&self, limit: u32) -> Result<()> {
        if self.field_type.is_compressed() && self.bits == 0 {
            return Ok(());
        }

        if self.end() > limit as u64 {
            return Err(Error::FieldRange {
                field: self.name.to_string(),
                offset: self.offset as u64,
                bits: self.bits as u64,
                limit: limit as u64,
            });
        }

        Ok(())
    }
}
