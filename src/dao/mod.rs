/// Database model definitions.
pub mod models;
/// Snapshot persistence abstraction and its in-memory implementation.
pub mod snapshot_store;
/// Storage error types shared by every backend.
pub mod storage;
