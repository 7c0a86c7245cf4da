//! Full-store snapshots and their restoration.

use crate::digest::verify_integrity;
use crate::{Codec, Payload, Record, RecordStore, Result, SingularityError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const BACKUP_FORMAT_VERSION: &str = "4.3";
pub const BACKUP_FILE_PREFIX: &str = "singularity_bkp_";
pub const BACKUP_FILE_EXTENSION: &str = "sq";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub format_version: String,
    pub compression_level: f64,
    pub quantum_storage_flag: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEnvelope {
    pub metadata: BackupMetadata,
    pub data: Vec<Record>,
}

impl BackupEnvelope {
    /// Read and decode a backup file written by [`BackupOperation`].
    pub fn read_from(path: &Path, codec: &Codec) -> Result<Self> {
        let compressed = std::fs::read(path)?;
        let bytes = codec.decompress(&compressed)?;
        let envelope: BackupEnvelope = serde_json::from_slice(&bytes)?;

        let major = |version: &str| version.split('.').next().map(str::to_string);
        if major(&envelope.metadata.format_version) != major(BACKUP_FORMAT_VERSION) {
            return Err(SingularityError::Config(format!(
                "unsupported backup format version {} in {}",
                envelope.metadata.format_version,
                path.display()
            )));
        }

        Ok(envelope)
    }
}

#[derive(Clone)]
pub struct BackupOperation {
    record_store: Arc<RecordStore>,
    codec: Codec,
    quantum_storage: bool,
}

#[derive(Debug, Clone)]
pub struct BackupOperationRequest {
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BackupOperationResult {
    pub path: PathBuf,
    pub records: usize,
    pub bytes_written: usize,
}

impl BackupOperation {
    pub fn new(record_store: Arc<RecordStore>, codec: Codec, quantum_storage: bool) -> Self {
        Self {
            record_store,
            codec,
            quantum_storage,
        }
    }

    pub fn run(&self, request: BackupOperationRequest) -> Result<BackupOperationResult> {
        let BackupOperationRequest { dir } = request;
        std::fs::create_dir_all(&dir)?;

        let records = self.record_store.select_all()?;
        let created_at = Utc::now();
        let envelope = BackupEnvelope {
            metadata: BackupMetadata {
                format_version: BACKUP_FORMAT_VERSION.to_string(),
                compression_level: self.codec.level(),
                quantum_storage_flag: self.quantum_storage,
                created_at,
            },
            data: records,
        };

        let serialized = serde_json::to_vec(&envelope)?;
        let compressed = self.codec.compress(&serialized)?;

        let path = dir.join(format!(
            "{}{}.{}",
            BACKUP_FILE_PREFIX,
            created_at.timestamp_millis(),
            BACKUP_FILE_EXTENSION
        ));

        write_atomically(&path, &compressed)?;

        tracing::info!(
            "Wrote backup {} with {} records ({} bytes)",
            path.display(),
            envelope.data.len(),
            compressed.len()
        );

        Ok(BackupOperationResult {
            path,
            records: envelope.data.len(),
            bytes_written: compressed.len(),
        })
    }
}

/// Write to temporary file first, then rename for atomicity
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let written = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&temp_path, path)
    })();

    if let Err(error) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error.into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct RestoreOperation {
    record_store: Arc<RecordStore>,
    codec: Codec,
}

#[derive(Debug, Clone)]
pub struct RestoreOperationRequest {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RestoreOperationResult {
    pub metadata: BackupMetadata,
    pub restored: usize,
    pub already_present: usize,
}

impl RestoreOperation {
    pub fn new(record_store: Arc<RecordStore>, codec: Codec) -> Self {
        Self {
            record_store,
            codec,
        }
    }

    /// Restore every record of a backup. All records are verified before
    /// anything is written; existing ids are left as they are.
    pub fn run(&self, request: RestoreOperationRequest) -> Result<RestoreOperationResult> {
        let RestoreOperationRequest { path } = request;
        let envelope = BackupEnvelope::read_from(&path, &self.codec)?;

        for record in &envelope.data {
            self.verify_record(record)?;
        }

        let restored = self.record_store.insert_many(&envelope.data)?;
        let already_present = envelope.data.len() - restored;

        tracing::info!(
            "Restored {} records from {} ({} already present)",
            restored,
            path.display(),
            already_present
        );

        Ok(RestoreOperationResult {
            metadata: envelope.metadata,
            restored,
            already_present,
        })
    }

    /// A restored record must pass its integrity digest, decode under its
    /// stored kind, and sit under the id its content hashes to.
    fn verify_record(&self, record: &Record) -> Result<()> {
        verify_integrity(&record.id, &record.compressed_payload, &record.integrity_digest)?;

        let decoded = self
            .codec
            .decompress(&record.compressed_payload)
            .and_then(|bytes| Payload::decode(record.payload_kind, &bytes))
            .map_err(|e| SingularityError::Format {
                id: record.id.clone(),
                reason: e.to_string(),
            })?;

        let actual = decoded.canonicalize()?.content_id();
        if actual != record.id {
            return Err(SingularityError::IntegrityViolation {
                id: record.id.clone(),
                expected: record.id.clone(),
                actual,
            });
        }
        Ok(())
    }
}
