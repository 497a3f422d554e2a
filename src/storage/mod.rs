//! Byte-level key-value storage
//!
//! The table engine in `sql::engine::kv` serializes schemas, records and the
//! catalog into these stores; it never enumerates keys.

pub mod disk;
pub mod engine;
pub mod memory;
