//! Integration tests for durable history stores and crash recovery

use num_bigint::BigInt;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;
use token_history::{
    DurabilityMode, FileRecordStore, FixedUpstream, HistoryAccessor, HistoryConfig, InvocationContext, RecordKey,
    RecordStore, TokenHistory,
};

const TOKEN: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";

fn token() -> RecordKey {
    TOKEN.parse().unwrap()
}

#[test]
fn test_created_record_visible_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = FileRecordStore::open(temp_dir.path(), DurabilityMode::Sync).unwrap();
        let accessor = HistoryAccessor::new(store, FixedUpstream::new(1_000_000u64, "Token", "TKN"));
        accessor
            .get_or_create_aggregate_record(&token(), &InvocationContext::none())
            .unwrap();
    }

    let store = FileRecordStore::open(temp_dir.path(), DurabilityMode::Sync).unwrap();
    let record = store.load(&token()).unwrap().unwrap();
    assert_eq!(record.name, "Token");
    assert_eq!(record.total_supply, BigInt::from(1_000_000u64));
    assert!(record.counters_are_zero());
}

#[test]
fn test_reopen_does_not_resnapshot_upstream() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = FileRecordStore::open(temp_dir.path(), DurabilityMode::Sync).unwrap();
        let accessor = HistoryAccessor::new(store, FixedUpstream::new(100u32, "Token", "TKN"));
        accessor
            .get_or_create_aggregate_record(&token(), &InvocationContext::none())
            .unwrap();
    }

    let store = FileRecordStore::open(temp_dir.path(), DurabilityMode::Sync).unwrap();
    let accessor = HistoryAccessor::new(store, FixedUpstream::new(999u32, "Renamed", "NEW"));
    let lookup = accessor.lookup(&token(), &InvocationContext::none()).unwrap();

    assert!(!lookup.was_created());
    assert_eq!(lookup.record().total_supply, BigInt::from(100u32));
    assert_eq!(lookup.record().symbol, "TKN");
}

#[test]
fn test_counter_updates_recovered_through_checkpoints() {
    let temp_dir = TempDir::new().unwrap();
    let config = HistoryConfig::new(token())
        .data_dir(temp_dir.path())
        .durability(DurabilityMode::Sync)
        .checkpoint_threshold(3);

    {
        let history = TokenHistory::open(config.clone(), FixedUpstream::new(5u8, "Token", "TKN")).unwrap();
        for _ in 0..10 {
            history
                .update(&InvocationContext::none(), |record| record.record_transfer())
                .unwrap();
        }
    }

    let history = TokenHistory::open(config, FixedUpstream::new(5u8, "Token", "TKN")).unwrap();
    let record = history.history(&InvocationContext::none()).unwrap();
    assert_eq!(record.transfer_count, BigInt::from(10));
}

#[test]
fn test_torn_wal_tail_is_ignored_on_recovery() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = FileRecordStore::open(temp_dir.path(), DurabilityMode::Sync).unwrap();
        let accessor = HistoryAccessor::new(store, FixedUpstream::new(1u8, "Token", "TKN"));
        accessor
            .get_or_create_aggregate_record(&token(), &InvocationContext::none())
            .unwrap();
    }

    let wal_path = temp_dir.path().join("history.wal");
    let mut wal = OpenOptions::new().append(true).open(&wal_path).unwrap();
    wal.write_all(&128u32.to_le_bytes()).unwrap();
    wal.write_all(b"partial").unwrap();
    drop(wal);

    let store = FileRecordStore::open(temp_dir.path(), DurabilityMode::Sync).unwrap();
    assert_eq!(store.len().unwrap(), 1);
    assert!(store.load(&token()).unwrap().is_some());
}

#[test]
fn test_manual_checkpoint_writes_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileRecordStore::open(temp_dir.path(), DurabilityMode::Async).unwrap();
    let accessor = HistoryAccessor::new(store, FixedUpstream::new(1u8, "Token", "TKN"));
    accessor
        .get_or_create_aggregate_record(&token(), &InvocationContext::none())
        .unwrap();

    accessor.store().checkpoint().unwrap();

    assert!(temp_dir.path().join("history.snapshot").exists());
    assert_eq!(std::fs::metadata(temp_dir.path().join("history.wal")).unwrap().len(), 0);
}
