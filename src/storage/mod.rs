pub mod engine;
pub mod file;
pub mod memory;
pub mod persistence;

pub use engine::RecordStore;
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use persistence::{DurabilityMode, PersistenceManager, SnapshotManager, WalEntry, WalManager};
