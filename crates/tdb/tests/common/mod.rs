#![allow(dead_code)]

use binrw::BinWrite;
use std::io::{Cursor, Write};
use tdb::bits;
use tdb::types::{DirectoryEntry, FieldDefinition, FieldType, TableHeader, Tag, TdbHeader};

pub const FOOTER: [u8; 4] = [0x9C, 0x41, 0x0E, 0x27];

pub struct TableSpec {
    pub name: &'static str,
    pub header: TableHeader,
    pub fields: Vec<FieldDefinition>,
    /// Record slots followed by the huffman buffer, if any
    pub data: Vec<u8>,
}

impl TableSpec {
    fn encoded_len(&self) -> usize {
        40 + self.fields.len() * 16 + self.data.len()
    }
}

pub fn tag(name: &str) -> Tag {
    name.parse().unwrap()
}

pub fn field(field_type: u32, offset: u32, name: &str, bits: u32) -> FieldDefinition {
    FieldDefinition {
        field_type: FieldType::from(field_type),
        offset,
        name: tag(name),
        bits,
    }
}

pub fn header(allocation: u32, length_bytes: u32, length_bits: u32, max: u16, current: u16) -> TableHeader {
    TableHeader {
        prior_crc: 0xC922_F4E5,
        data_allocation_type: allocation,
        length_bytes,
        length_bits,
        zero: 0,
        max_records: max,
        current_records: current,
        unknown2: 0xFFFF,
        field_count: 0,
        index_count: 0,
        zero2: 0,
        zero3: 0,
        header_crc: 0x8C85_785A,
    }
}

/// Serialize `tables` behind a header and directory, then append `footer`
///
/// Directory entries are listed in table order, `extra` entries are appended after them.
pub fn build_with(tables: &[TableSpec], extra: &[DirectoryEntry], footer: &[u8]) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());

    let data_len: usize = tables.iter().map(TableSpec::encoded_len).sum();
    TdbHeader {
        digit: 0x4442,
        version: 8,
        unknown1: 0x0100_0000,
        db_size: (24 + (tables.len() + extra.len()) * 8 + data_len + footer.len()) as u32,
        zero: 0,
        table_count: (tables.len() + extra.len()) as u32,
        unknown2: 0x77D6_F445,
    }
    .write(&mut out)
    .unwrap();

    let mut offset = 0;
    for table in tables {
        DirectoryEntry {
            name: tag(table.name),
            offset: offset as u32,
        }
        .write(&mut out)
        .unwrap();
        offset += table.encoded_len();
    }
    for entry in extra {
        entry.write(&mut out).unwrap();
    }

    for table in tables {
        TableHeader {
            field_count: table.fields.len() as u8,
            ..table.header
        }
        .write(&mut out)
        .unwrap();
        for definition in &table.fields {
            definition.write(&mut out).unwrap();
        }
        out.write_all(&table.data).unwrap();
    }
    out.write_all(footer).unwrap();

    out.into_inner()
}

pub fn build(tables: &[TableSpec]) -> Vec<u8> {
    build_with(tables, &[], &FOOTER)
}

/// A preallocated player table: 660 slots of 96 bytes, 49 of them in use
pub fn players() -> TableSpec {
    let fields = vec![
        field(3, 0, "STC1", 32),
        field(0, 32, "PFNA", 128),
        field(0, 160, "PLNA", 128),
        field(2, 288, "CPYA", 18),
        field(4, 320, "RATE", 32),
        field(1, 352, "PPIC", 16),
        field(3, 708, "CGID", 2),
    ];

    let mut data = vec![0u8; 96 * 660];
    for i in 0..49usize {
        let record = &mut data[i * 96..(i + 1) * 96];
        bits::write_bytes(record, 4, 16, format!("Player{i}").as_bytes()).unwrap();
        bits::write_bytes(record, 20, 16, b"Smith").unwrap();
        bits::write_signed_bits(record, 288, 18, -(i as i64) * 100).unwrap();
        bits::write_float(record, 320, i as f32 / 2.0).unwrap();
        bits::write_bytes(record, 44, 2, &[0xBE, i as u8]).unwrap();
        bits::write_bits(record, 708, 2, (i % 4) as u64).unwrap();
    }

    TableSpec {
        name: "AWPL",
        header: header(2, 96, 767, 660, 49),
        fields,
        data,
    }
}

/// A compact team table with two records
pub fn teams() -> TableSpec {
    TableSpec {
        name: "TEAM",
        header: header(0, 4, 32, 32, 2),
        fields: vec![field(3, 0, "TGID", 10), field(0, 16, "TMAB", 16)],
        data: vec![0x00, 0x40, b'N', b'Y', 0x01, 0x80, b'B', b'O'],
    }
}

// a = 0, b = 10, c = 110, d = 111
pub const TREE: [u8; 12] = [
    0x00, b'a', 0x01, 0x00, 0x00, b'b', 0x02, 0x00, 0x00, b'c', 0x00, b'd',
];

/// A compressed table: two of three slots in use, names in the huffman buffer
pub fn nicknames() -> TableSpec {
    let mut data = vec![12, 21, 15, 30, 0, 0];
    data.extend(TREE);
    // "bad" and "cab", each padded with the incomplete code 11 and terminated
    data.extend([0x02, 0b1001_1111, 0x00]);
    data.extend([0x02, 0b1100_1011, 0x00]);

    TableSpec {
        name: "NICK",
        header: header(66, 2, 16, 3, 2),
        fields: vec![field(13, 0, "NKNA", 8), field(3, 8, "NKAG", 8)],
        data,
    }
}

/// Zero length table, nothing after its header is parsed
pub fn sentinel() -> TableSpec {
    TableSpec {
        name: "ZZZZ",
        header: header(0, 0, 0, 0, 0),
        fields: Vec::new(),
        data: Vec::new(),
    }
}

/// Reader handing out at most `chunk` bytes per call
pub struct Trickle<'a> {
    pub data: &'a [u8],
    pub chunk: usize,
}

impl std::io::Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let count = self.chunk.min(buf.len()).min(self.data.len());
        buf[..count].copy_from_slice(&self.data[..count]);
        self.data = &self.data[count..];
        Ok(count)
    }
}
