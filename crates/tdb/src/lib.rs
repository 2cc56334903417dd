//! This library handles reading from and writing **TDB** table databases used by sports games.
//!
//! # TDB Format Documentation
//!
//! A TDB file is a small relational store: a list of named tables, each made of fixed-size records
//! whose fields are packed at arbitrary bit positions. Names of tables and fields are four character
//! codes. All multi-byte integers are big endian.
//!
//! ## File Structure
//!
//! A TDB file consists of a header, a table directory, the tables one after the other and a footer.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Digit                  | 2 bytes: 0x4442 ("DB")                                     |
//! | 0x0002         | Version                | 2 bytes                                                    |
//! | 0x0004         | Unknown                | 4 bytes                                                    |
//! | 0x0008         | Database Size          | 4 bytes                                                    |
//! | 0x000C         | Zero                   | 4 bytes                                                    |
//! | 0x0010         | Table Count            | 4 bytes: Number of directory entries                       |
//! | 0x0014         | Unknown                | 4 bytes                                                    |
//!
//! ### Directory
//!
//! `Table Count` entries of 8 bytes follow the header:
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Name                   | 4 bytes: Table name, characters stored in reverse order    |
//! | 0x0004         | Offset                 | 4 bytes: Offset of the table from the end of the directory |
//!
//! ### Tables
//!
//! Every table starts with a 40 byte header:
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Prior CRC              | 4 bytes                                                    |
//! | 0x0004         | Allocation Type        | 4 bytes: Record slot layout                                |
//! | 0x0008         | Length Bytes           | 4 bytes: Size of a record in bytes                         |
//! | 0x000C         | Length Bits            | 4 bytes: Size of a record in bits                          |
//! | 0x0010         | Zero                   | 4 bytes                                                    |
//! | 0x0014         | Max Records            | 2 bytes: Record slots reserved                             |
//! | 0x0016         | Current Records        | 2 bytes: Record slots in use                               |
//! | 0x0018         | Unknown                | 4 bytes                                                    |
//! | 0x001C         | Field Count            | 1 byte: Number of field definitions                        |
//! | 0x001D         | Index Count            | 1 byte                                                     |
//! | 0x001E         | Zero                   | 2 bytes                                                    |
//! | 0x0020         | Zero                   | 4 bytes                                                    |
//! | 0x0024         | Header CRC             | 4 bytes                                                    |
//!
//! followed by `Field Count` field definitions of 16 bytes:
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Type                   | 4 bytes: Storage type of the field                         |
//! | 0x0004         | Offset                 | 4 bytes: First bit of the field in a record                |
//! | 0x0008         | Name                   | 4 bytes: Field name, characters stored in reverse order    |
//! | 0x000C         | Bits                   | 4 bytes: Width of the field in bits                        |
//!
//! and by the record block:
//!
//! - **Allocation Types** `2` and `6` store `Max Records` slots, of which the first `Current Records`
//!   are in use.
//! - **Allocation Type** `66` stores `Max Records` slots followed by a huffman buffer, which runs up
//!   to the next table.
//! - Any other type stores exactly `Current Records` slots.
//!
//! ### Fields
//!
//! Bits are numbered from the most significant bit of the first byte of a record.
//!
//! - `0`: String, NUL padded, byte aligned
//! - `1`: Binary, byte aligned
//! - `2`: Signed integer, two's complement
//! - `3`: Unsigned integer
//! - `4`: Float, IEEE-754 single precision
//! - `13`: Compressed string with a 1 byte length prefix
//! - `14`: Compressed string with a 2 byte length prefix
//!
//! Other types are exposed as raw bits. Compressed strings are stored in the huffman buffer of their
//! table, the record holds the byte offset of the value in that buffer.
//!
//! ### Huffman Buffer
//!
//! The buffer opens with the table's prefix tree, described level by level as pairs of
//! `(index, value)` bytes for the left and right child of every internal node. An index of `0` is a
//! leaf holding `value`. Compressed values follow the tree.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.db`
//! - **Endianness**: Big-endian for all multi-byte integers
//! - **Footer**: 4 bytes after the last table, passed through untouched
//!

pub mod bits;
pub mod error;
pub mod field;
pub mod file;
pub mod huffman;
pub mod read;
pub mod table;
pub mod types;
pub mod write;

pub use field::{Field, FieldValue};
pub use file::TdbFile;
pub use read::{ParserOptions, TdbParser};
pub use table::{Record, RecordMut, Table};
pub use types::{FieldType, Tag};
pub use write::TdbWriter;
