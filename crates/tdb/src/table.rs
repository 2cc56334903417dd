//! Tables, their records and the huffman buffer of compressed tables.

use std::collections::BTreeSet;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::field::{self, Field, FieldValue};
use crate::huffman::HuffmanTree;
use crate::types::{
    Allocation, FieldDefinition, TableHeader, Tag, FIELD_DEFINITION_LEN, TABLE_HEADER_LEN,
};

/// Trailing buffer of a compressed table
///
/// Starts with the [`HuffmanTree`] shared by every compressed field of the
/// table, followed by the length prefixed payloads of those fields.
#[derive(Debug, Clone)]
pub struct HuffmanBuffer {
    bytes: Vec<u8>,
    tree: HuffmanTree,
    boundaries: Vec<usize>,
}

impl HuffmanBuffer {
    /// Parse the tree at the start of `bytes`
    pub fn parse(bytes: Vec<u8>) -> Result<HuffmanBuffer> {
        let tree = HuffmanTree::parse(&bytes)?;
        Ok(HuffmanBuffer {
            bytes,
            tree,
            boundaries: Vec::new(),
        })
    }

    /// The whole buffer as stored in the file
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The tree shared by the table's compressed fields
    pub fn tree(&self) -> &HuffmanTree {
        &self.tree
    }

    /// Size of the buffer in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload offsets of every compressed value of the table, sorted
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    fn set_boundaries(&mut self, mut offsets: Vec<usize>) {
        offsets.sort_unstable();
        offsets.dedup();
        self.boundaries = offsets;
    }

    /// Length prefix and compressed bytes of the value at `offset`
    ///
    /// The compressed bytes stop at whichever comes first of the length given
    /// by the `prefix` byte wide length, the next payload and the end of the buffer.
    ///
    /// The next payload is the nearest higher offset held by any compressed
    /// field of any populated record, not only by the same field. This can cut
    /// a value earlier than the next value of the same field would, but the
    /// decoded text still ends at the terminator.
    pub fn payload(&self, field: Tag, offset: usize, prefix: usize) -> Result<&[u8]> {
        let start = offset.saturating_add(prefix);
        let head = self
            .bytes
            .get(offset..start)
            .ok_or_else(|| Error::FieldRange {
                field: field.to_string(),
                offset: offset as u64 * 8,
                bits: prefix as u64 * 8,
                limit: self.bytes.len() as u64 * 8,
            })?;
        let declared = BigEndian::read_uint(head, prefix) as usize;

        let next = self.boundaries.partition_point(|&b| b <= offset);
        let limit = self
            .boundaries
            .get(next)
            .copied()
            .unwrap_or(self.bytes.len());
        let end = start
            .saturating_add(declared)
            .min(limit)
            .min(self.bytes.len())
            .max(start);

        Ok(&self.bytes[offset..end])
    }
}

/// A table of fixed size records
#[derive(Debug, Clone)]
pub struct Table {
    name: Tag,
    offset: u32,
    header: TableHeader,
    definitions: Vec<FieldDefinition>,
    fields: IndexMap<Tag, usize>,
    records: Vec<u8>,
    huffman: Option<HuffmanBuffer>,
    changes: BTreeSet<(usize, usize)>,
}

impl Table {
    /// Assemble a table from its parsed parts
    ///
    /// `records` holds every record slot of the table, `huffman` the trailing
    /// buffer of a compressed table.
    pub fn new(
        name: Tag,
        offset: u32,
        header: TableHeader,
        definitions: Vec<FieldDefinition>,
        records: Vec<u8>,
        huffman: Option<HuffmanBuffer>,
    ) -> Result<Table> {
        let needed = header.slot_count() * header.length_bytes as usize;
        if records.len() < needed {
            return Err(Error::TruncatedInput {
                state: "TableRecords",
                needed: needed - records.len(),
            });
        }

        let mut fields = IndexMap::with_capacity(definitions.len());
        for (index, definition) in definitions.iter().enumerate() {
            fields.entry(definition.name).or_insert(index);
        }

        let mut table = Table {
            name,
            offset,
            header,
            definitions,
            fields,
            records,
            huffman,
            changes: BTreeSet::new(),
        };

        if table.huffman.is_some() {
            let offsets = table.payload_offsets();
            trace!(table = %table.name, payloads = offsets.len(), "indexed huffman payloads");
            if let Some(buffer) = table.huffman.as_mut() {
                buffer.set_boundaries(offsets);
            }
        }

        Ok(table)
    }

    /// A table whose header declares zero length records
    ///
    /// Nothing past such a header is parsed, the rest of the file is kept as the footer.
    pub fn sentinel(name: Tag, offset: u32, header: TableHeader) -> Table {
        Table {
            name,
            offset,
            header,
            definitions: Vec::new(),
            fields: IndexMap::new(),
            records: Vec::new(),
            huffman: None,
            changes: BTreeSet::new(),
        }
    }

    fn payload_offsets(&self) -> Vec<usize> {
        let length_bits = self.header.length_bits;
        let mut offsets = Vec::new();
        for slot in 0..self.len() {
            let record = self.slot(slot);
            for definition in self.definitions.iter().filter(|d| d.field_type.is_compressed()) {
                match field::payload_offset(definition, length_bits, record) {
                    Ok(offset) => offsets.push(offset),
                    Err(e) => trace!(field = %definition.name, slot, "no payload offset: {e}"),
                }
            }
        }
        offsets
    }

    /// Name of the table
    pub fn name(&self) -> Tag {
        self.name
    }

    /// Offset of the table header, counted from the end of the directory
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The parsed table header
    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    /// How the table lays out its record slots
    pub fn allocation(&self) -> Allocation {
        self.header.allocation()
    }

    /// Whether this is the zero length table that ends the parsed part of a file
    pub fn is_sentinel(&self) -> bool {
        self.header.length_bytes == 0
    }

    /// Field definitions in file order
    pub fn definitions(&self) -> &[FieldDefinition] {
        &self.definitions
    }

    /// Definition of the field called `name`
    pub fn definition(&self, name: &str) -> Option<&FieldDefinition> {
        self.field_index(name).ok().map(|i| &self.definitions[i])
    }

    /// The record block, every slot included
    pub fn data(&self) -> &[u8] {
        &self.records
    }

    /// Trailing huffman buffer of a compressed table
    pub fn huffman(&self) -> Option<&HuffmanBuffer> {
        self.huffman.as_ref()
    }

    /// Number of record slots stored, populated or not
    pub fn slot_count(&self) -> usize {
        self.header.slot_count()
    }

    /// Number of populated records
    pub fn len(&self) -> usize {
        self.slot_count().min(self.header.current_records as usize)
    }

    /// Whether the table has no populated records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the table once serialized
    pub fn encoded_len(&self) -> usize {
        TABLE_HEADER_LEN
            + self.definitions.len() * FIELD_DEFINITION_LEN
            + self.records.len()
            + self.huffman.as_ref().map_or(0, HuffmanBuffer::len)
    }

    /// Populated records in slot order
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        (0..self.len()).map(move |slot| Record { table: self, slot })
    }

    /// The populated record at `index`
    pub fn record(&self, index: usize) -> Result<Record<'_>> {
        if index >= self.len() {
            return Err(Error::RecordNotFound(index));
        }
        Ok(Record {
            table: self,
            slot: index,
        })
    }

    /// Mutable view of the populated record at `index`
    pub fn record_mut(&mut self, index: usize) -> Result<RecordMut<'_>> {
        if index >= self.len() {
            return Err(Error::RecordNotFound(index));
        }
        Ok(RecordMut {
            table: self,
            slot: index,
        })
    }

    /// Whether any field of any record was set since parsing
    pub fn is_modified(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Record index and field name of every field set since parsing
    pub fn changes(&self) -> impl Iterator<Item = (usize, Tag)> + '_ {
        self.changes
            .iter()
            .map(|&(slot, index)| (slot, self.definitions[index].name))
    }

    fn field_index(&self, name: &str) -> Result<usize> {
        Tag::from_str(name)
            .ok()
            .and_then(|tag| self.fields.get(&tag).copied())
            .ok_or_else(|| Error::FieldNotFound(name.to_owned()))
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let length = self.header.length_bytes as usize;
        slot * length..(slot + 1) * length
    }

    fn slot(&self, slot: usize) -> &[u8] {
        &self.records[self.slot_range(slot)]
    }

    fn bind(&self, slot: usize, index: usize) -> Field<'_> {
        Field::bind(
            &self.definitions[index],
            self.slot(slot),
            self.header.length_bits,
            self.huffman.as_ref(),
        )
    }
}

/// Read-only view of one populated record
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    table: &'a Table,
    slot: usize,
}

impl<'a> Record<'a> {
    /// Position of the record in its table
    pub fn index(&self) -> usize {
        self.slot
    }

    /// The record's bytes
    pub fn buffer(&self) -> &'a [u8] {
        self.table.slot(self.slot)
    }

    /// The field called `name`, bound to this record
    pub fn field(&self, name: &str) -> Result<Field<'a>> {
        let index = self.table.field_index(name)?;
        Ok(self.table.bind(self.slot, index))
    }

    /// Every field of the record in definition order
    pub fn fields(&self) -> impl Iterator<Item = Field<'a>> + 'a {
        let table = self.table;
        let slot = self.slot;
        (0..table.definitions.len()).map(move |index| table.bind(slot, index))
    }

    /// Decode the field called `name`
    pub fn get(&self, name: &str) -> Result<FieldValue> {
        self.field(name)?.value()
    }

    /// Decode every field of the record
    pub fn values(&self) -> Result<IndexMap<Tag, FieldValue>> {
        self.fields()
            .map(|field| Ok((field.name(), field.value()?)))
            .collect()
    }

    /// Whether the field called `name` was set since parsing
    pub fn is_changed(&self, name: &str) -> bool {
        self.table
            .field_index(name)
            .is_ok_and(|index| self.table.changes.contains(&(self.slot, index)))
    }
}

/// Mutable view of one populated record
///
/// Setting a field rewrites its bits in the table's record block, so the
/// change is picked up by the next write of the file.
#[derive(Debug)]
pub struct RecordMut<'a> {
    table: &'a mut Table,
    slot: usize,
}

impl RecordMut<'_> {
    /// Read-only view of the same record
    pub fn as_record(&self) -> Record<'_> {
        Record {
            table: self.table,
            slot: self.slot,
        }
    }

    /// Decode the field called `name`
    pub fn get(&self, name: &str) -> Result<FieldValue> {
        self.as_record().get(name)
    }

    /// Store `value` in the field called `name`
    ///
    /// Integers are range checked against the field's width, strings and
    /// binary values are NUL padded or truncated to fit.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let index = self.table.field_index(name)?;
        let definition = self.table.definitions[index];
        let length_bits = self.table.header.length_bits;
        let range = self.table.slot_range(self.slot);

        field::write_value(
            &definition,
            length_bits,
            &mut self.table.records[range],
            value.into(),
        )?;

        debug!(table = %self.table.name, record = self.slot, field = %definition.name, "set field");
        self.table.changes.insert((self.slot, index));
        Ok(())
    }
}
