//! The parsed contents of a TDB file.

use std::io::{Cursor, Read};

use indexmap::IndexMap;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::read::{ParserOptions, TdbParser};
use crate::table::Table;
use crate::types::{DirectoryEntry, Tag, TdbHeader};
use crate::write::{TdbWriter, TdbWriterOptions};

/// Size of the chunks [`TdbFile::from_reader`] feeds to the parser
const READ_CHUNK_LEN: usize = 64 * 1024;

/// A TDB file: header, directory, tables in file order and the trailing footer
///
/// ```no_run
/// fn rename_first_player(path: &str) -> tdb::error::Result<()> {
///     let mut file = tdb::TdbFile::from_reader(std::fs::File::open(path)?)?;
///
///     file.table_mut("PLAY")?.record_mut(0)?.set("PFNA", "Test")?;
///     std::fs::write(path, file.to_bytes()?)?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TdbFile {
    header: TdbHeader,
    directory: Vec<DirectoryEntry>,
    tables: IndexMap<Tag, Table>,
    footer: Vec<u8>,
}

impl TdbFile {
    pub(crate) fn from_parts(
        header: TdbHeader,
        directory: Vec<DirectoryEntry>,
        tables: IndexMap<Tag, Table>,
        footer: Vec<u8>,
    ) -> TdbFile {
        TdbFile {
            header,
            directory,
            tables,
            footer,
        }
    }

    /// Parse a whole file held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<TdbFile> {
        Self::from_bytes_with(bytes, ParserOptions::default())
    }

    /// Parse a whole file held in memory with custom options
    pub fn from_bytes_with(bytes: &[u8], options: ParserOptions) -> Result<TdbFile> {
        let mut parser = TdbParser::new(options);
        parser.push(bytes)?;
        parser.finish()
    }

    /// Parse a file by streaming it from `reader`
    pub fn from_reader(reader: impl Read) -> Result<TdbFile> {
        Self::from_reader_with(reader, ParserOptions::default())
    }

    /// Parse a file by streaming it from `reader` with custom options
    #[instrument(skip(reader), err)]
    pub fn from_reader_with(mut reader: impl Read, options: ParserOptions) -> Result<TdbFile> {
        let mut parser = TdbParser::new(options);
        let mut chunk = vec![0u8; READ_CHUNK_LEN];
        loop {
            let read = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from(e)),
            };
            parser.push(&chunk[..read])?;
        }
        parser.finish()
    }

    /// Serialize the file
    ///
    /// Without any field changes the output is identical to the parsed input.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let writer = TdbWriter::new(Cursor::new(Vec::new()), TdbWriterOptions::default());
        Ok(writer.write(self)?.into_inner())
    }

    /// The file header
    pub fn header(&self) -> &TdbHeader {
        &self.header
    }

    /// Directory entries in file order
    pub fn directory(&self) -> &[DirectoryEntry] {
        &self.directory
    }

    /// Bytes following the last table
    pub fn footer(&self) -> &[u8] {
        &self.footer
    }

    /// Number of parsed tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the file holds no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Returns an iterator over the table names in file order
    pub fn table_names(&self) -> impl Iterator<Item = Tag> + '_ {
        self.tables.keys().copied()
    }

    /// Tables in file order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Mutable tables in file order
    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.tables.values_mut()
    }

    /// Search for a table by name
    pub fn table(&self, name: &str) -> Result<&Table> {
        name.parse::<Tag>()
            .ok()
            .and_then(|tag| self.tables.get(&tag))
            .ok_or_else(|| Error::TableNotFound(name.to_owned()))
    }

    /// Search for a table by name, for changing its records
    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        name.parse::<Tag>()
            .ok()
            .and_then(|tag| self.tables.get_mut(&tag))
            .ok_or_else(|| Error::TableNotFound(name.to_owned()))
    }

    /// Get a table by its position in the file
    pub fn by_index(&self, index: usize) -> Option<&Table> {
        self.tables.get_index(index).map(|(_, table)| table)
    }

    /// Whether any table has changed field values
    pub fn is_modified(&self) -> bool {
        self.tables.values().any(Table::is_modified)
    }
}
