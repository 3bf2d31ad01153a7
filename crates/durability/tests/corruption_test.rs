//! Corruption detection tests
//!
//! These tests verify how the WAL treats damaged files:
//! - A torn final record is end-of-log, not an error
//! - A checksum failure in the middle of the log is fatal
//! - A checksummed record with an unknown opcode is fatal
//! - Bytes before the damage are still returned in order

use crc32fast::Hasher;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::TempDir;
use vectory_core::Error;
use vectory_durability::{encode_entry, DurabilityMode, Wal, WalRecord};

fn write_records(path: &Path, records: &[WalRecord]) -> Vec<u64> {
    let mut wal = Wal::open(path, DurabilityMode::Strict).unwrap();
    let mut offsets = Vec::new();
    for r in records {
        offsets.push(wal.size());
        wal.append(r).unwrap();
    }
    offsets
}

fn flip_byte(path: &Path, offset: u64) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .unwrap();

    file.seek(SeekFrom::Start(offset)).unwrap();
    let mut buf = [0u8; 1];
    file.read_exact(&mut buf).unwrap();
    buf[0] ^= 0xFF;
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&buf).unwrap();
    file.sync_all().unwrap();
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

fn records() -> Vec<WalRecord> {
    vec![
        WalRecord::AddVertex { id: 1, level: 0 },
        WalRecord::SetEntryPointWithMaxLayer { id: 1, level: 0 },
        WalRecord::AddVertex { id: 2, level: 0 },
        WalRecord::SetConnectionsAtLevel {
            id: 2,
            level: 0,
            neighbors: vec![1],
        },
    ]
}

#[test]
fn test_bit_flip_in_last_record_is_torn_tail() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("index.wal");
    let offsets = write_records(&wal_path, &records());

    // Damage the payload of the final record
    flip_byte(&wal_path, offsets[3] + 6);

    let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
    assert_eq!(wal.next_seq(), 4, "final record must be dropped");
    assert_eq!(wal.size(), offsets[3]);

    let read: Vec<_> = wal
        .read_from(1)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(read.len(), 3);
}

#[test]
fn test_bit_flip_mid_file_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("index.wal");
    let offsets = write_records(&wal_path, &records());

    flip_byte(&wal_path, offsets[1] + 6);

    match Wal::open(&wal_path, DurabilityMode::Strict) {
        Err(Error::ChecksumMismatch { offset, .. }) => assert_eq!(offset, offsets[1]),
        Err(e) => panic!("expected checksum mismatch, got {:?}", e),
        Ok(_) => panic!("expected open to fail on mid-file corruption"),
    }
}

#[test]
fn test_unknown_opcode_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("index.wal");
    write_records(&wal_path, &records()[..2]);

    // A well-formed, correctly checksummed entry with opcode 9
    let body = [9u8, 0, 0, 0, 0, 0, 0, 0, 0];
    let mut hasher = Hasher::new();
    hasher.update(&body);
    let crc = hasher.finalize();
    let mut raw = Vec::new();
    raw.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    raw.extend_from_slice(&body);
    raw.extend_from_slice(&crc.to_le_bytes());
    append_raw(&wal_path, &raw);

    let err = Wal::open(&wal_path, DurabilityMode::Strict).err();
    assert!(
        matches!(err, Some(Error::UnknownOpcode { opcode: 9, .. })),
        "expected unknown opcode error, got {:?}",
        err
    );
}

#[test]
fn test_partial_length_prefix_is_torn_tail() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("index.wal");
    write_records(&wal_path, &records());

    append_raw(&wal_path, &[0x11, 0x00]);

    let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
    assert_eq!(wal.next_seq(), 5);
    let count = wal.read_from(1).unwrap().count();
    assert_eq!(count, 4);
}

#[test]
fn test_reader_reports_error_distinctly_from_end() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("index.wal");
    let recs = records();

    let mut wal = Wal::open(&wal_path, DurabilityMode::Strict).unwrap();
    for r in &recs {
        wal.append(r).unwrap();
    }

    // Corrupt record 2 behind the open handle's back, then append a valid one
    let second_offset = encode_entry(&recs[0]).unwrap().len() as u64;
    flip_byte(&wal_path, second_offset + 5);
    wal.append(&WalRecord::DeleteVertex { id: 1 }).unwrap();

    let mut iter = wal.read_from(1).unwrap();
    assert_eq!(iter.next().unwrap().unwrap().1, recs[0]);
    assert!(matches!(
        iter.next(),
        Some(Err(Error::ChecksumMismatch { .. }))
    ));
    assert!(iter.next().is_none());
}
