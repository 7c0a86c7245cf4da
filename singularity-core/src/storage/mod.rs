//! Storage modules for Singularity
//!
//! Provides the SQLite-backed record table.

pub mod record_store;

pub use record_store::{Record, RecordStore, StoreLocation};
