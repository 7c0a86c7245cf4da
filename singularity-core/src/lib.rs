//! Singularity Core - content-addressed record storage
//!
//! Records are addressed by the SHA256 of their canonical serialization,
//! compressed with zstd, guarded by a BLAKE3 integrity digest checked on
//! every read, and persisted in SQLite. Stores can be linked to copy records
//! between them with per-item failure tolerance.

pub mod codec;
pub mod digest;
pub mod error;
pub mod operations;
pub mod payload;
pub mod singularity;
pub mod storage;
pub mod temporal;

pub use codec::Codec;
pub use digest::{content_id, integrity_digest, tagged_content_id, verify_integrity};
pub use error::{Result, SingularityError};
pub use payload::{CanonicalPayload, Payload, PayloadKind, TabularFrame};
pub use singularity::{DataSingularity, SingularityOptions, Wormhole};
pub use storage::{Record, RecordStore, StoreLocation};
pub use temporal::{TemporalIndex, TemporalIndexer};
