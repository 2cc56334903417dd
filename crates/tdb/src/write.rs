//! Types for writing TDB files
//!

use binrw::BinWrite;
use bon::Builder;
use indexmap::IndexMap;
use std::io::{Seek, SeekFrom, Write};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::file::TdbFile;
use crate::table::Table;
use crate::types::{DirectoryEntry, Tag, DIRECTORY_ENTRY_LEN, FILE_HEADER_LEN};

/// Which parts of the file are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Header, directory, tables and footer
    #[default]
    Full,
    /// Only the tables and footer, written at their offset in the output
    ///
    /// Meant for updating an existing file whose header and directory are
    /// already in place.
    Tables,
}

/// Options for how the TDB file should be written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct TdbWriterOptions {
    /// Parts of the file to write
    #[builder(default)]
    pub mode: WriteMode,
}

/// TDB file generator
///
/// Tables are written back with their header and field definitions untouched,
/// checksums included, and their record block as it currently stands.
///
/// ```
/// # fn doit() -> tdb::error::Result<()>
/// # {
/// use tdb::write::{TdbWriter, TdbWriterOptions, WriteMode};
///
/// # let bytes = [0x44, 0x42, 0x00, 0x08, 0, 0, 0, 0, 0, 0, 0, 0x18, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
/// let file = tdb::TdbFile::from_bytes(&bytes)?;
///
/// let writer = TdbWriter::new(
///     std::io::Cursor::new(Vec::new()),
///     TdbWriterOptions::builder().mode(WriteMode::Full).build(),
/// );
/// let output = writer.write(&file)?.into_inner();
/// assert_eq!(output, bytes);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct TdbWriter<W: Write + Seek> {
    inner: W,
    options: TdbWriterOptions,
}

impl<W: Write + Seek> TdbWriter<W> {
    /// Wrap `inner`, nothing is written until [`TdbWriter::write`]
    pub fn new(inner: W, options: TdbWriterOptions) -> TdbWriter<W> {
        TdbWriter { inner, options }
    }

    /// Write `file` and return the inner writer
    #[instrument(skip_all, fields(mode = ?self.options.mode, tables = file.len()), err)]
    pub fn write(mut self, file: &TdbFile) -> Result<W> {
        match self.options.mode {
            WriteMode::Full => {
                file.header().write(&mut self.inner)?;
                for entry in directory(file) {
                    entry.write(&mut self.inner)?;
                }
            }
            WriteMode::Tables => {
                let data_start = FILE_HEADER_LEN + file.directory().len() * DIRECTORY_ENTRY_LEN;
                self.inner.seek(SeekFrom::Start(data_start as u64))?;
            }
        }

        for table in file.tables() {
            self.write_table(table)?;
        }
        self.inner.write_all(file.footer())?;
        self.inner.flush()?;

        Ok(self.inner)
    }

    fn write_table(&mut self, table: &Table) -> Result<()> {
        table.header().write(&mut self.inner)?;
        for definition in table.definitions() {
            definition.write(&mut self.inner)?;
        }
        self.inner.write_all(table.data())?;
        if let Some(huffman) = table.huffman() {
            self.inner.write_all(huffman.bytes())?;
        }

        debug!(
            table = %table.name(),
            size = table.encoded_len(),
            modified = table.is_modified(),
            "wrote table"
        );
        Ok(())
    }
}

/// Directory entries of `file` with offsets taken from where its tables are written
///
/// Entries keep their order. Entries without a parsed table keep their offset.
pub fn directory(file: &TdbFile) -> Vec<DirectoryEntry> {
    let mut offsets = IndexMap::<Tag, u32>::with_capacity(file.len());
    let mut position = 0u32;
    for table in file.tables() {
        offsets.insert(table.name(), position);
        position += table.encoded_len() as u32;
    }

    file.directory()
        .iter()
        .map(|entry| DirectoryEntry {
            name: entry.name,
            offset: offsets.get(&entry.name).copied().unwrap_or(entry.offset),
        })
        .collect()
}
