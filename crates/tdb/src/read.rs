//! Streaming parser for TDB files
//!
//! [`TdbParser`] accepts the file in chunks of any size and only decodes a
//! structure once all of its bytes have arrived. Every state asks for an exact
//! number of bytes, except the huffman buffer of the last table and the footer
//! which run to the end of the input and are settled by [`TdbParser::finish`].

use std::io::Cursor;

use binrw::BinRead;
use bon::Builder;
use indexmap::IndexMap;
use tracing::{debug, instrument, trace, warn};

use crate::error::{Error, Result};
use crate::file::TdbFile;
use crate::table::{HuffmanBuffer, Table};
use crate::types::{
    Allocation, DirectoryEntry, FieldDefinition, FieldType, TableHeader, Tag, TdbHeader,
    DIRECTORY_ENTRY_LEN, FILE_HEADER_LEN, FOOTER_LEN, TABLE_HEADER_LEN,
};

/// Options for how a TDB file should be parsed
#[derive(Debug, Clone, Copy, Builder)]
pub struct ParserOptions {
    /// Fail on field definitions that do not fit in their record
    ///
    /// When disabled the definition is only logged, reading or writing the
    /// field still fails.
    #[builder(default = true)]
    pub strict_field_ranges: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Directory,
    TableHeader,
    FieldDefinitions,
    TableRecords,
    HuffmanBuffer,
    Footer,
    SkipRemainder,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Header => "Header",
            State::Directory => "Directory",
            State::TableHeader => "TableHeader",
            State::FieldDefinitions => "FieldDefinitions",
            State::TableRecords => "TableRecords",
            State::HuffmanBuffer => "HuffmanBuffer",
            State::Footer => "Footer",
            State::SkipRemainder => "SkipRemainder",
        }
    }
}

#[derive(Debug, Default)]
struct PendingTable {
    name: Tag,
    offset: u32,
    header: TableHeader,
    definitions: Vec<FieldDefinition>,
    records: Vec<u8>,
}

/// Push based TDB parser
///
/// ```
/// # fn doit() -> tdb::error::Result<()>
/// # {
/// use tdb::read::{ParserOptions, TdbParser};
///
/// # let bytes = [0x44, 0x42, 0x00, 0x08, 0, 0, 0, 0, 0, 0, 0, 0x18, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
/// let mut parser = TdbParser::new(ParserOptions::default());
/// for chunk in bytes.chunks(7) {
///     parser.push(chunk)?;
/// }
/// let file = parser.finish()?;
/// assert_eq!(file.len(), 0);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug)]
pub struct TdbParser {
    options: ParserOptions,
    state: State,
    pending: Vec<u8>,
    cursor: usize,
    position: u64,
    data_start: u64,
    header: TdbHeader,
    directory: Vec<DirectoryEntry>,
    tables: IndexMap<Tag, Table>,
    table: PendingTable,
}

impl TdbParser {
    /// Create a parser waiting for the file header
    pub fn new(options: ParserOptions) -> TdbParser {
        TdbParser {
            options,
            state: State::Header,
            pending: Vec::new(),
            cursor: 0,
            position: 0,
            data_start: 0,
            header: TdbHeader::default(),
            directory: Vec::new(),
            tables: IndexMap::new(),
            table: PendingTable::default(),
        }
    }

    /// Number of bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of tables completed so far
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Feed the next chunk of the file
    ///
    /// Structures are decoded as soon as they are complete, anything left over
    /// is kept for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if self.cursor > 0 {
            self.pending.drain(..self.cursor);
            self.cursor = 0;
        }
        self.pending.extend_from_slice(chunk);

        while let Some(needed) = self.needed() {
            if self.available() < needed {
                break;
            }
            let bytes = self.take(needed);
            self.advance(bytes)?;
        }

        Ok(())
    }

    /// Signal the end of the input and collect the parsed file
    #[instrument(skip_all, err)]
    pub fn finish(mut self) -> Result<TdbFile> {
        let remaining = self.available();
        let footer = match self.state {
            State::HuffmanBuffer if self.needed().is_none() => {
                let body = remaining.saturating_sub(FOOTER_LEN);
                let buffer = self.take(body);
                self.complete_table(buffer)?;
                self.take(remaining - body)
            }
            State::TableHeader if self.tables.len() < self.header.table_count as usize => {
                if remaining > 0 {
                    return Err(Error::TruncatedInput {
                        state: State::TableHeader.name(),
                        needed: TABLE_HEADER_LEN - remaining,
                    });
                }
                let offset = self
                    .directory
                    .iter()
                    .find(|entry| !self.tables.contains_key(&entry.name))
                    .map_or(self.relative_position(), |entry| entry.offset as u64);
                return Err(Error::DirectoryMismatch { offset });
            }
            State::TableHeader | State::Footer | State::SkipRemainder => self.take(remaining),
            state => {
                let needed = self.needed().unwrap_or_default();
                return Err(Error::TruncatedInput {
                    state: state.name(),
                    needed: needed.saturating_sub(remaining),
                });
            }
        };

        debug!(
            tables = self.tables.len(),
            footer = footer.len(),
            "finished parsing"
        );

        Ok(TdbFile::from_parts(
            self.header,
            self.directory,
            self.tables,
            footer,
        ))
    }

    fn available(&self) -> usize {
        self.pending.len() - self.cursor
    }

    fn take(&mut self, count: usize) -> Vec<u8> {
        let start = self.cursor;
        self.cursor += count;
        self.position += count as u64;
        self.pending[start..start + count].to_vec()
    }

    /// Bytes the current state needs, `None` when it runs to the end of the input
    fn needed(&self) -> Option<usize> {
        match self.state {
            State::Header => Some(FILE_HEADER_LEN),
            State::Directory => Some(self.header.table_count as usize * DIRECTORY_ENTRY_LEN),
            State::TableHeader => Some(TABLE_HEADER_LEN),
            State::FieldDefinitions => Some(self.table.header.field_block_len()),
            State::TableRecords => Some(self.table.header.record_block_len()),
            State::HuffmanBuffer => self.huffman_extent(),
            State::Footer | State::SkipRemainder => None,
        }
    }

    /// Offset of the current position from the end of the directory
    fn relative_position(&self) -> u64 {
        self.position - self.data_start
    }

    /// Distance to the next table header named in the directory
    fn huffman_extent(&self) -> Option<usize> {
        let position = self.relative_position();
        self.directory
            .iter()
            .map(|entry| entry.offset as u64)
            .filter(|&offset| offset >= position)
            .min()
            .map(|offset| (offset - position) as usize)
    }

    fn transition(&mut self, state: State) {
        let from = std::mem::replace(&mut self.state, state);
        trace!(
            from = from.name(),
            to = state.name(),
            position = self.position,
            needed = ?self.needed(),
            "parser transition"
        );
    }

    fn next_table(&mut self) {
        if self.tables.len() >= self.header.table_count as usize {
            self.transition(State::Footer);
        } else {
            self.transition(State::TableHeader);
        }
    }

    fn advance(&mut self, bytes: Vec<u8>) -> Result<()> {
        let start = self.position - bytes.len() as u64;
        match self.state {
            State::Header => {
                self.header = TdbHeader::read(&mut Cursor::new(&bytes))?;
                trace!(header = ?self.header, "read file header");
                self.transition(State::Directory);
            }
            State::Directory => {
                let mut reader = Cursor::new(&bytes);
                self.directory = (0..self.header.table_count)
                    .map(|_| DirectoryEntry::read(&mut reader))
                    .collect::<binrw::BinResult<_>>()?;
                self.data_start = self.position;
                self.next_table();
            }
            State::TableHeader => self.read_table_header(start, &bytes)?,
            State::FieldDefinitions => self.read_field_definitions(&bytes)?,
            State::TableRecords => {
                self.table.records = bytes;
                if self.table.header.allocation() == Allocation::Compressed {
                    self.transition(State::HuffmanBuffer);
                } else {
                    self.complete_table(Vec::new())?;
                }
            }
            State::HuffmanBuffer => self.complete_table(bytes)?,
            State::Footer | State::SkipRemainder => {}
        }
        Ok(())
    }

    fn read_table_header(&mut self, start: u64, bytes: &[u8]) -> Result<()> {
        let header = TableHeader::read(&mut Cursor::new(bytes))?;
        let offset = start - self.data_start;
        let entry = self
            .directory
            .iter()
            .find(|entry| entry.offset as u64 == offset)
            .ok_or(Error::DirectoryMismatch { offset })?;

        if self.tables.contains_key(&entry.name) {
            return Err(Error::DuplicateTable(entry.name.to_string()));
        }

        let name = entry.name;
        trace!(table = %name, offset, ?header, "read table header");

        if header.length_bytes == 0 {
            debug!(table = %name, "zero length table, skipping the rest of the input");
            let table = Table::sentinel(name, offset as u32, header);
            self.tables.insert(name, table);
            self.transition(State::SkipRemainder);
            return Ok(());
        }

        self.table = PendingTable {
            name,
            offset: offset as u32,
            header,
            ..Default::default()
        };
        self.transition(State::FieldDefinitions);
        Ok(())
    }

    fn read_field_definitions(&mut self, bytes: &[u8]) -> Result<()> {
        let mut reader = Cursor::new(bytes);
        let definitions = (0..self.table.header.field_count)
            .map(|_| FieldDefinition::read(&mut reader))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        let length_bits = self.table.header.length_bits;
        for definition in &definitions {
            if let FieldType::Unknown(code) = definition.field_type {
                warn!(table = %self.table.name, field = %definition.name, code, "unknown field type, reading as raw bits");
            }
            if let Err(e) = definition.validate(length_bits) {
                if self.options.strict_field_ranges {
                    return Err(e);
                }
                warn!(table = %self.table.name, "{e}");
            }
        }

        self.table.definitions = definitions;
        self.transition(State::TableRecords);
        Ok(())
    }

    fn complete_table(&mut self, huffman: Vec<u8>) -> Result<()> {
        let PendingTable {
            name,
            offset,
            header,
            definitions,
            records,
        } = std::mem::take(&mut self.table);

        let huffman = if huffman.is_empty() {
            None
        } else {
            Some(HuffmanBuffer::parse(huffman)?)
        };

        let table = Table::new(name, offset, header, definitions, records, huffman)?;
        debug!(
            table = %name,
            records = table.len(),
            fields = table.definitions().len(),
            "parsed table"
        );

        self.tables.insert(name, table);
        self.next_table();
        Ok(())
    }
}
