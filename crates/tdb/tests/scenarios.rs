mod common;

use common::*;
use pretty_assertions::assert_eq;
use tdb::error::{Error, Result};
use tdb::read::{ParserOptions, TdbParser};
use tdb::types::DirectoryEntry;
use tdb::{FieldValue, TdbFile};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn header_fields() -> Result<()> {
    let file = TdbFile::from_bytes(&build(&[teams()]))?;
    let header = file.header();

    assert_eq!(header.digit, 17474);
    assert_eq!(header.version, 8);
    assert_eq!(header.unknown1, 16777216);
    assert_eq!(header.table_count, 1);

    Ok(())
}

#[test]
fn directory_names_are_reversed() -> Result<()> {
    let bytes = build(&[players(), teams()]);
    assert_eq!(&bytes[24..32], &[b'L', b'P', b'W', b'A', 0, 0, 0, 0]);

    let file = TdbFile::from_bytes(&bytes)?;
    let entry = file.directory()[0];

    assert_eq!(entry.name, "AWPL");
    assert_eq!(entry.offset, 0);

    let names: Vec<_> = file.table_names().map(|t| t.to_string()).collect();
    assert_eq!(names, vec!["AWPL", "TEAM"]);

    Ok(())
}

#[traced_test]
#[test]
fn preallocated_table_set_integer() -> Result<()> {
    let bytes = build(&[players()]);
    let mut file = TdbFile::from_bytes(&bytes)?;

    let table = file.table("AWPL")?;
    assert_eq!(table.slot_count(), 660);
    assert_eq!(table.len(), 49);
    assert_eq!(table.records().count(), 49);

    let before = table.record(0)?.values()?;
    assert_eq!(before.get(&tag("STC1")), Some(&FieldValue::UnsignedInt(0)));

    file.table_mut("AWPL")?.record_mut(0)?.set("STC1", 20u32)?;

    let record = file.table("AWPL")?.record(0)?;
    assert_eq!(record.get("STC1")?, 20u64);
    assert!(record.is_changed("STC1"));

    let after = record.values()?;
    for (name, value) in &before {
        if *name != "STC1" {
            assert_eq!(after.get(name), Some(value), "{name} changed");
        }
    }

    // only the four bytes of STC1 differ in the output
    let output = file.to_bytes()?;
    let record_start = 24 + 8 + 40 + 7 * 16;
    let mut expected = bytes;
    expected[record_start..record_start + 4].copy_from_slice(&[0, 0, 0, 20]);
    assert_eq!(output, expected);

    Ok(())
}

#[test]
fn string_set_is_nul_padded() -> Result<()> {
    let mut file = TdbFile::from_bytes(&build(&[players()]))?;
    let table = file.table_mut("AWPL")?;

    assert_eq!(table.record(0)?.get("PFNA")?, "Player0");
    table.record_mut(0)?.set("PFNA", "Test")?;

    let record = table.record(0)?;
    assert_eq!(record.get("PFNA")?, "Test");
    assert_eq!(&record.buffer()[4..20], b"Test\0\0\0\0\0\0\0\0\0\0\0\0");
    assert_eq!(record.get("PLNA")?, "Smith");

    Ok(())
}

#[test]
fn plain_field_types() -> Result<()> {
    let file = TdbFile::from_bytes(&build(&[players()]))?;
    let record = file.table("AWPL")?.record(7)?;

    assert_eq!(record.get("PFNA")?, "Player7");
    assert_eq!(record.get("CPYA")?, -700i64);
    assert_eq!(record.get("RATE")?, FieldValue::Float(3.5));
    assert_eq!(record.get("PPIC")?, FieldValue::Binary(vec![0xBE, 7]));
    assert_eq!(record.get("CGID")?, 3u64);

    Ok(())
}

#[test]
fn compressed_table_in_the_middle() -> Result<()> {
    let bytes = build(&[teams(), nicknames(), players()]);
    let file = TdbFile::from_bytes(&bytes)?;
    let table = file.table("NICK")?;

    assert_eq!(table.len(), 2);
    assert_eq!(table.huffman().map(|h| h.len()), Some(18));
    assert_eq!(table.record(0)?.get("NKNA")?, "bad");
    assert_eq!(table.record(1)?.get("NKNA")?, "cab");
    assert_eq!(table.record(1)?.get("NKAG")?, 30u64);
    assert_eq!(file.table("AWPL")?.len(), 49);
    assert_eq!(file.to_bytes()?, bytes);

    Ok(())
}

#[test]
fn compressed_table_last() -> Result<()> {
    let bytes = build(&[teams(), nicknames()]);
    let file = TdbFile::from_bytes(&bytes)?;

    assert_eq!(file.table("NICK")?.record(1)?.get("NKNA")?, "cab");
    assert_eq!(file.footer(), &FOOTER);
    assert_eq!(file.to_bytes()?, bytes);

    Ok(())
}

#[test]
fn compressed_fields_are_read_only() -> Result<()> {
    let mut file = TdbFile::from_bytes(&build(&[nicknames()]))?;

    assert!(matches!(
        file.table_mut("NICK")?.record_mut(0)?.set("NKNA", "dab"),
        Err(Error::Encoding { .. })
    ));
    assert!(!file.is_modified());

    Ok(())
}

#[traced_test]
#[test]
fn unmodified_round_trip() -> Result<()> {
    let bytes = build(&[players(), teams(), nicknames()]);

    let file = TdbFile::from_reader(Trickle {
        data: &bytes,
        chunk: 13,
    })?;

    assert_eq!(file.len(), 3);
    assert!(!file.is_modified());
    assert_eq!(file.footer(), &FOOTER);
    assert_eq!(file.to_bytes()?, bytes);

    Ok(())
}

#[test]
fn sentinel_keeps_the_rest() -> Result<()> {
    let unparsed = DirectoryEntry {
        name: tag("LAST"),
        offset: 0x1000,
    };
    let mut bytes = build_with(&[teams(), sentinel()], &[unparsed], &[]);
    bytes.extend_from_slice(b"remaining bytes");
    bytes.extend_from_slice(&FOOTER);

    let file = TdbFile::from_bytes(&bytes)?;

    assert_eq!(file.len(), 2);
    assert!(file.table("ZZZZ")?.is_sentinel());
    assert!(matches!(file.table("LAST"), Err(Error::TableNotFound(_))));
    assert_eq!(file.footer().len(), 15 + 4);
    assert_eq!(file.directory().len(), 3);
    assert_eq!(file.to_bytes()?, bytes);

    Ok(())
}

#[test]
fn truncated_input() {
    let bytes = build(&[players(), teams()]);

    let result = TdbFile::from_bytes(&bytes[..1000]);
    assert!(matches!(
        result,
        Err(Error::TruncatedInput {
            state: "TableRecords",
            ..
        })
    ));

    let result = TdbFile::from_bytes(&bytes[..30]);
    assert!(matches!(
        result,
        Err(Error::TruncatedInput {
            state: "Directory",
            needed: 10
        })
    ));
}

#[test]
fn directory_mismatch() {
    let mut bytes = build(&[teams(), players()]);
    // second entry no longer points at the player table
    bytes[24 + 8 + 7] += 1;

    assert!(matches!(
        TdbFile::from_bytes(&bytes),
        Err(Error::DirectoryMismatch { .. })
    ));
}

#[test]
fn duplicate_table() {
    let mut second = teams();
    second.header.current_records = 1;
    second.data.truncate(4);

    let bytes = build(&[teams(), second]);

    assert!(matches!(
        TdbFile::from_bytes(&bytes),
        Err(Error::DuplicateTable(name)) if name == "TEAM"
    ));
}

#[test]
fn push_in_one_byte_chunks() -> Result<()> {
    let bytes = build(&[teams(), nicknames()]);
    let mut parser = TdbParser::new(ParserOptions::default());
    for byte in &bytes {
        parser.push(std::slice::from_ref(byte))?;
    }
    let file = parser.finish()?;

    assert_eq!(file.table("TEAM")?.record(1)?.get("TMAB")?, "BO");
    assert_eq!(file.table("TEAM")?.record(1)?.get("TGID")?, 6u64);
    assert_eq!(file.to_bytes()?, bytes);

    Ok(())
}

#[test]
fn values_as_json() -> Result<()> {
    let file = TdbFile::from_bytes(&build(&[players()]))?;
    let values = file.table("AWPL")?.record(2)?.values()?;
    let json = serde_json::to_value(&values).map_err(std::io::Error::from)?;

    assert_eq!(json["PFNA"], "Player2");
    assert_eq!(json["CPYA"], -200);
    assert_eq!(json["CGID"], 2);

    Ok(())
}

#[test]
fn missing_table_fails() {
    let bytes = build(&[teams(), players()]);
    // header, two directory entries and the team table
    let team_end = 24 + 16 + 80;

    let mut cut = bytes[..team_end].to_vec();
    cut.extend_from_slice(&FOOTER);
    assert!(matches!(
        TdbFile::from_bytes(&cut),
        Err(Error::TruncatedInput {
            state: "TableHeader",
            needed: 36
        })
    ));

    assert!(matches!(
        TdbFile::from_bytes(&bytes[..team_end + 30]),
        Err(Error::TruncatedInput {
            state: "TableHeader",
            needed: 10
        })
    ));

    assert!(matches!(
        TdbFile::from_bytes(&bytes[..team_end]),
        Err(Error::DirectoryMismatch { offset: 80 })
    ));
}

#[test]
fn empty_compact_table() -> Result<()> {
    let empty = TableSpec {
        name: "EMPT",
        header: header(0, 4, 32, 10, 0),
        fields: vec![field(3, 0, "EMID", 8)],
        data: Vec::new(),
    };
    let bytes = build(&[empty, teams()]);
    let file = TdbFile::from_bytes(&bytes)?;

    let table = file.table("EMPT")?;
    assert!(table.is_empty());
    assert!(!table.is_sentinel());
    assert_eq!(table.records().count(), 0);
    assert!(matches!(table.record(0), Err(Error::RecordNotFound(0))));

    assert_eq!(file.table("TEAM")?.record(0)?.get("TMAB")?, "NY");
    assert_eq!(file.footer(), &FOOTER);
    assert_eq!(file.to_bytes()?, bytes);

    Ok(())
}
