//! Tests for ChunkRecords
//!
//! Backing records: one file per evicted chunk plus the length record.

use chunkpad::storage::ChunkRecords;
use chunkpad::ChunkpadError;
use tempfile::TempDir;

fn setup_records() -> (TempDir, ChunkRecords) {
    let temp_dir = TempDir::new().unwrap();
    let records = ChunkRecords::open(&temp_dir.path().join("session")).unwrap();
    (temp_dir, records)
}

#[test]
fn test_open_creates_directory() {
    let (_temp, records) = setup_records();
    assert!(records.dir().is_dir());
}

#[test]
fn test_write_then_read_chunk() {
    let (_temp, records) = setup_records();
    records.write_chunk(0, b"hello").unwrap();

    let mut buf = [0u8; 8];
    let read = records.read_chunk(0, &mut buf).unwrap();

    assert_eq!(read, 5);
    assert_eq!(&buf[..read], b"hello");
    assert!(records.exists(0));
}

#[test]
fn test_missing_record_reads_empty() {
    let (_temp, records) = setup_records();
    let mut buf = [0u8; 8];

    assert_eq!(records.read_chunk(7, &mut buf).unwrap(), 0);
    assert!(!records.exists(7));
}

#[test]
fn test_read_stops_at_buffer_size() {
    let (_temp, records) = setup_records();
    records.write_chunk(0, b"abcdefgh").unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(records.read_chunk(0, &mut buf).unwrap(), 4);
    assert_eq!(&buf, b"abcd");
}

#[test]
fn test_write_chunk_replaces_previous_content() {
    let (_temp, records) = setup_records();
    records.write_chunk(2, b"longer content").unwrap();
    records.write_chunk(2, b"short").unwrap();

    let mut buf = [0u8; 32];
    let read = records.read_chunk(2, &mut buf).unwrap();
    assert_eq!(&buf[..read], b"short");
}

#[test]
fn test_rename_and_remove() {
    let (_temp, records) = setup_records();
    records.write_chunk(1, b"one").unwrap();

    records.rename_chunk(1, 2).unwrap();
    assert!(!records.exists(1));
    assert!(records.exists(2));

    // Missing sources and targets are fine
    records.rename_chunk(5, 6).unwrap();
    records.remove_chunk(2).unwrap();
    records.remove_chunk(2).unwrap();
    assert!(!records.exists(2));
}

#[test]
fn test_scan_lengths_stops_at_first_gap() {
    let (_temp, records) = setup_records();
    records.write_chunk(0, b"abcd").unwrap();
    records.write_chunk(1, b"").unwrap();
    records.write_chunk(2, b"xy").unwrap();
    records.write_chunk(4, b"orphan").unwrap();

    assert_eq!(records.scan_lengths().unwrap(), vec![4, 0, 2]);
}

#[test]
fn test_length_record() {
    let (_temp, records) = setup_records();
    assert_eq!(records.read_length().unwrap(), None);

    records.write_length(12345).unwrap();
    assert_eq!(records.read_length().unwrap(), Some(12345));

    let text = std::fs::read_to_string(records.dir().join("length")).unwrap();
    assert_eq!(text, "12345");
}

#[test]
fn test_garbled_length_record_is_corruption() {
    let (_temp, records) = setup_records();
    std::fs::write(records.dir().join("length"), "twelve").unwrap();

    assert!(matches!(records.read_length(), Err(ChunkpadError::Corruption(_))));
}

#[test]
fn test_destroy_is_idempotent() {
    let (_temp, records) = setup_records();
    records.write_chunk(0, b"data").unwrap();
    records.write_length(4).unwrap();

    records.destroy().unwrap();
    assert!(!records.dir().exists());
    records.destroy().unwrap();
}
