//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// input ended while the parser was waiting for more bytes
    #[error("input ended in state {state} with {needed} bytes still needed")]
    TruncatedInput {
        /// Name of the parser state that was waiting
        state: &'static str,
        /// Bytes missing to complete the state
        needed: usize,
    },

    /// a table header sits at a position no directory entry points to
    #[error("no directory entry for a table at offset {offset}")]
    DirectoryMismatch {
        /// Offset of the table header relative to the end of the directory
        offset: u64,
    },

    /// a table name appears twice in the file
    #[error("table {0} appears more than once")]
    DuplicateTable(String),

    /// a field's bit span does not fit in its record
    #[error("field {field} spans bits {offset}..{offset}+{bits} but the record only has {limit}")]
    FieldRange {
        /// Name of the field
        field: String,
        /// First bit of the span
        offset: u64,
        /// Width of the span
        bits: u64,
        /// Number of bits available
        limit: u64,
    },

    /// string and binary fields must start and end on a byte boundary
    #[error("field {field} is not byte aligned")]
    UnalignedField {
        /// Name of the field
        field: String,
    },

    /// the value cannot be stored in the field
    #[error("unable to encode a value for field {field}")]
    Encoding {
        /// Name of the field
        field: String,
    },

    /// the huffman tree description ended before the tree was complete
    #[error("huffman tree is incomplete at byte {offset}")]
    InvalidHuffmanTree {
        /// Byte offset at which a node pair was expected
        offset: usize,
    },

    /// the value has the wrong type for the field
    #[error("field {field} expects a {expected} value")]
    TypeMismatch {
        /// Name of the field
        field: String,
        /// The type the field stores
        expected: String,
    },

    /// the value does not fit in the field's bit width
    #[error("value does not fit in the {bits} bits of field {field}")]
    ValueOutOfRange {
        /// Name of the field
        field: String,
        /// Width of the field
        bits: u32,
    },

    /// a 4 character code was malformed
    #[error("{0:?} is not a 4 character code")]
    InvalidTag(String),

    /// unable to find requested field
    #[error("unable to find field {0}")]
    FieldNotFound(String),

    /// unable to find requested table
    #[error("unable to find table {0}")]
    TableNotFound(String),

    /// unable to find requested record
    #[error("unable to find record {0}")]
    RecordNotFound(usize),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
