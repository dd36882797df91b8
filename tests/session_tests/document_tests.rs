//! Tests for Document
//!
//! These tests verify:
//! - Client lifecycle and STATS fan-out
//! - DATA applied to the buffer and relayed to everyone but the sender
//! - FETCH answered privately
//! - CURSOR stamped with the sender's id
//! - Debug subscriptions and pushes
//! - Malformed edits dropped without touching the buffer

use std::time::Duration;

use bytes::Bytes;
use chunkpad::config::StoreOptions;
use chunkpad::protocol::{decode_command, Command, Decoded};
use chunkpad::session::{ClientId, Document};
use tempfile::TempDir;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, Receiver};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_document(chunk_size: usize) -> (TempDir, Document) {
    let temp_dir = TempDir::new().unwrap();
    let options = StoreOptions {
        chunk_size,
        evict_after: Duration::from_secs(60),
    };
    let doc = Document::open("room", &temp_dir.path().join("room"), options).unwrap();
    (temp_dir, doc)
}

fn join(doc: &mut Document) -> (ClientId, Receiver<Bytes>) {
    join_with_capacity(doc, 64)
}

fn join_with_capacity(doc: &mut Document, capacity: usize) -> (ClientId, Receiver<Bytes>) {
    let (outbox, rx) = mpsc::channel(capacity);
    let id = doc.connect(outbox);
    (id, rx)
}

/// Every frame queued so far, decoded
fn drain(rx: &mut Receiver<Bytes>) -> Vec<Command> {
    let mut commands = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        match decode_command(&frame) {
            Decoded::Command(command) => commands.push(command),
            Decoded::NoCommand => panic!("Server queued an undecodable frame"),
        }
    }
    commands
}

fn data(start: u32, end: u32, bytes: &'static [u8]) -> Command {
    Command::Data {
        start,
        end,
        bytes: Bytes::from_static(bytes),
    }
}

fn content(doc: &mut Document) -> Vec<u8> {
    let len = doc.store().len();
    doc.store_mut().read(0, len).unwrap()
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_connect_broadcasts_client_count() {
    let (_temp, mut doc) = setup_document(64);

    let (a, mut rx_a) = join(&mut doc);
    assert_eq!(drain(&mut rx_a), vec![Command::Stats { clients: 1 }]);

    let (b, mut rx_b) = join(&mut doc);
    assert_ne!(a, b);
    assert_eq!(drain(&mut rx_a), vec![Command::Stats { clients: 2 }]);
    assert_eq!(drain(&mut rx_b), vec![Command::Stats { clients: 2 }]);

    doc.disconnect(b);
    assert_eq!(drain(&mut rx_a), vec![Command::Stats { clients: 1 }]);
    assert!(drain(&mut rx_b).is_empty());
    assert_eq!(doc.client_count(), 1);
}

#[test]
fn test_disconnect_unknown_client_is_silent() {
    let (_temp, mut doc) = setup_document(64);
    let (a, mut rx_a) = join(&mut doc);
    drain(&mut rx_a);

    doc.disconnect(a + 100);

    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(doc.client_count(), 1);
}

#[test]
fn test_client_ids_are_nonzero_and_distinct() {
    let (_temp, mut doc) = setup_document(64);
    let mut ids = Vec::new();
    let mut receivers = Vec::new();

    for _ in 0..5 {
        let (id, rx) = join(&mut doc);
        ids.push(id);
        receivers.push(rx);
    }

    assert!(ids.iter().all(|id| *id != 0));
    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn test_idle_only_without_clients() {
    let (_temp, mut doc) = setup_document(64);
    assert!(doc.is_idle(Duration::ZERO));

    let (a, _rx) = join(&mut doc);
    assert!(!doc.is_idle(Duration::ZERO));

    doc.disconnect(a);
    assert!(doc.is_idle(Duration::ZERO));
    assert!(!doc.is_idle(Duration::from_secs(3600)));
}

#[test]
fn test_stalled_client_is_dropped_when_queue_fills() {
    let (_temp, mut doc) = setup_document(64);
    let (a, mut rx_a) = join_with_capacity(&mut doc, 16);
    let (b, mut rx_b) = join_with_capacity(&mut doc, 4);
    drain(&mut rx_a);

    // B never reads; its queue already holds one STATS frame
    for pos in 0..100 {
        doc.execute(a, Command::Cursor { pos, client: 0 }).unwrap();
    }

    assert_eq!(doc.client_count(), 1);
    assert_eq!(drain(&mut rx_a), vec![Command::Stats { clients: 1 }]);

    // What was queued before the drop is still delivered, then the queue closes
    let queued = drain(&mut rx_b);
    assert_eq!(queued.len(), 4);
    assert_eq!(queued[0], Command::Stats { clients: 2 });
    assert_eq!(queued[3], Command::Cursor { pos: 2, client: a });
    assert_eq!(rx_b.try_recv(), Err(TryRecvError::Disconnected));

    // B's id is free and nothing more is queued for it
    doc.disconnect(b);
    assert!(drain(&mut rx_a).is_empty());
}

// =============================================================================
// DATA Tests
// =============================================================================

#[test]
fn test_data_relayed_to_others_not_sender() {
    let (_temp, mut doc) = setup_document(64);
    let (a, mut rx_a) = join(&mut doc);
    let (_b, mut rx_b) = join(&mut doc);
    drain(&mut rx_a);
    drain(&mut rx_b);

    doc.execute(a, data(0, 0, b"hello world")).unwrap();

    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(drain(&mut rx_b), vec![data(0, 0, b"hello world")]);
    assert_eq!(content(&mut doc), b"hello world");
}

#[test]
fn test_data_replaces_range() {
    let (_temp, mut doc) = setup_document(64);
    let (a, _rx_a) = join(&mut doc);

    doc.execute(a, data(0, 0, b"hello world")).unwrap();
    doc.execute(a, data(6, 11, b"X")).unwrap();

    assert_eq!(content(&mut doc), b"hello X");
}

#[test]
fn test_data_larger_than_chunk_is_split() {
    let (_temp, mut doc) = setup_document(4);
    let (a, _rx_a) = join(&mut doc);
    let (_b, mut rx_b) = join(&mut doc);
    drain(&mut rx_b);

    doc.execute(a, data(0, 0, b"abcdefghij")).unwrap();
    doc.execute(a, data(2, 8, b"0123456789")).unwrap();

    assert_eq!(content(&mut doc), b"ab0123456789ij");
    // Relayed whole, as received
    assert_eq!(
        drain(&mut rx_b),
        vec![data(0, 0, b"abcdefghij"), data(2, 8, b"0123456789")]
    );
}

#[test]
fn test_data_with_bad_range_is_dropped() {
    let (_temp, mut doc) = setup_document(64);
    let (a, _rx_a) = join(&mut doc);
    let (_b, mut rx_b) = join(&mut doc);
    doc.execute(a, data(0, 0, b"hello")).unwrap();
    drain(&mut rx_b);

    // start past the end
    doc.execute(a, data(9, 9, b"x")).unwrap();
    // start after end
    doc.execute(a, data(3, 1, b"x")).unwrap();

    assert_eq!(content(&mut doc), b"hello");
    assert!(drain(&mut rx_b).is_empty());
}

#[test]
fn test_data_end_past_buffer_is_clamped() {
    let (_temp, mut doc) = setup_document(64);
    let (a, _rx_a) = join(&mut doc);
    doc.execute(a, data(0, 0, b"hello")).unwrap();

    doc.execute(a, data(3, 50, b"p!")).unwrap();

    assert_eq!(content(&mut doc), b"help!");
}

// =============================================================================
// FETCH Tests
// =============================================================================

#[test]
fn test_fetch_answers_only_the_sender() {
    let (_temp, mut doc) = setup_document(4);
    let (a, mut rx_a) = join(&mut doc);
    let (b, mut rx_b) = join(&mut doc);
    doc.execute(a, data(0, 0, b"hello world")).unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    doc.execute(b, Command::Fetch { offset: 6, len: 5 }).unwrap();

    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(
        drain(&mut rx_b),
        vec![Command::FetchResponse {
            start: 6,
            end: 6,
            bytes: Bytes::from_static(b"world"),
        }]
    );
}

#[test]
fn test_fetch_is_clamped_to_buffer() {
    let (_temp, mut doc) = setup_document(64);
    let (a, mut rx_a) = join(&mut doc);
    doc.execute(a, data(0, 0, b"hello")).unwrap();
    drain(&mut rx_a);

    doc.execute(a, Command::Fetch { offset: 3, len: 100 }).unwrap();

    assert_eq!(
        drain(&mut rx_a),
        vec![Command::FetchResponse {
            start: 3,
            end: 3,
            bytes: Bytes::from_static(b"lo"),
        }]
    );
}

#[test]
fn test_fetch_past_end_gets_no_reply() {
    let (_temp, mut doc) = setup_document(64);
    let (a, mut rx_a) = join(&mut doc);
    doc.execute(a, data(0, 0, b"hello")).unwrap();
    drain(&mut rx_a);

    doc.execute(a, Command::Fetch { offset: 5, len: 10 }).unwrap();
    doc.execute(a, Command::Fetch { offset: 0, len: 0 }).unwrap();

    assert!(drain(&mut rx_a).is_empty());
}

// =============================================================================
// CURSOR Tests
// =============================================================================

#[test]
fn test_cursor_stamped_with_sender() {
    let (_temp, mut doc) = setup_document(64);
    let (a, mut rx_a) = join(&mut doc);
    let (_b, mut rx_b) = join(&mut doc);
    drain(&mut rx_a);
    drain(&mut rx_b);

    // Whatever the client claims, the relayed id is the connection's
    doc.execute(a, Command::Cursor { pos: 4, client: 999 }).unwrap();

    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(drain(&mut rx_b), vec![Command::Cursor { pos: 4, client: a }]);
}

// =============================================================================
// Debug Tests
// =============================================================================

#[test]
fn test_debug_push_only_to_subscribers() {
    let (_temp, mut doc) = setup_document(4);
    let (a, mut rx_a) = join(&mut doc);
    let (b, mut rx_b) = join(&mut doc);
    doc.execute(a, data(0, 0, b"abcdefghij")).unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    doc.push_debug();
    assert!(drain(&mut rx_a).is_empty());

    doc.execute(b, Command::ToggleDebug { enabled: true }).unwrap();
    assert!(doc.is_debug_subscribed(b));
    doc.push_debug();

    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(
        drain(&mut rx_b),
        vec![Command::Debug {
            length: 10,
            total_chunks: 3,
            loaded_chunks: 3,
            chunk_size: 4,
        }]
    );

    doc.execute(b, Command::ToggleDebug { enabled: false }).unwrap();
    doc.push_debug();
    assert!(drain(&mut rx_b).is_empty());
}

#[test]
fn test_debug_reflects_evictions() {
    let temp_dir = TempDir::new().unwrap();
    let options = StoreOptions {
        chunk_size: 4,
        evict_after: Duration::ZERO,
    };
    let mut doc = Document::open("room", temp_dir.path(), options).unwrap();
    let (a, mut rx_a) = join(&mut doc);
    doc.execute(a, data(0, 0, b"abcdefghij")).unwrap();
    doc.execute(a, Command::ToggleDebug { enabled: true }).unwrap();
    drain(&mut rx_a);

    doc.clean_up().unwrap();
    doc.push_debug();

    match drain(&mut rx_a).as_slice() {
        [Command::Debug {
            total_chunks,
            loaded_chunks,
            ..
        }] => {
            assert_eq!(*total_chunks, 3);
            assert_eq!(*loaded_chunks, 0);
        }
        other => panic!("Expected one DEBUG frame, got {:?}", other),
    }
}

#[test]
fn test_server_only_commands_are_ignored() {
    let (_temp, mut doc) = setup_document(64);
    let (a, mut rx_a) = join(&mut doc);
    let (_b, mut rx_b) = join(&mut doc);
    drain(&mut rx_a);
    drain(&mut rx_b);

    doc.execute(a, Command::Stats { clients: 9 }).unwrap();
    doc.execute(
        a,
        Command::FetchResponse {
            start: 0,
            end: 0,
            bytes: Bytes::from_static(b"x"),
        },
    )
    .unwrap();

    assert!(drain(&mut rx_a).is_empty());
    assert!(drain(&mut rx_b).is_empty());
    assert!(doc.store().is_empty());
}

#[test]
fn test_stats_snapshot() {
    let (_temp, mut doc) = setup_document(4);
    let (a, _rx_a) = join(&mut doc);
    doc.execute(a, data(0, 0, b"abcdef")).unwrap();

    let stats = doc.stats();
    assert_eq!(stats.length, 6);
    assert_eq!(stats.total_chunks, 2);
    assert_eq!(stats.chunk_size, 4);
}
