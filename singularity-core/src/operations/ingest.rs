use crate::digest::integrity_digest;
use crate::{Codec, Payload, Record, RecordStore, Result, TemporalIndexer};
use std::sync::Arc;

pub const DEFAULT_DIMENSION_TAG: i64 = 4;

#[derive(Clone)]
pub struct IngestOperation {
    record_store: Arc<RecordStore>,
    codec: Codec,
    indexer: TemporalIndexer,
}

#[derive(Debug, Clone)]
pub struct IngestOperationRequest {
    pub payload: Payload,
    pub dimension_tag: i64,
}

impl IngestOperationRequest {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            dimension_tag: DEFAULT_DIMENSION_TAG,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOperationResult {
    pub id: String,
    /// False when the content was already stored under the same id.
    pub inserted: bool,
    pub compressed_len: usize,
}

impl IngestOperation {
    pub fn new(record_store: Arc<RecordStore>, codec: Codec, indexer: TemporalIndexer) -> Self {
        Self {
            record_store,
            codec,
            indexer,
        }
    }

    pub fn run(&self, request: IngestOperationRequest) -> Result<IngestOperationResult> {
        let IngestOperationRequest {
            payload,
            dimension_tag,
        } = request;

        let canonical = payload.canonicalize()?;
        let id = canonical.content_id();
        let compressed = self.codec.compress(&canonical.bytes)?;
        let digest = integrity_digest(&compressed);
        let temporal_index = self.indexer.create_index(&canonical);

        let record = Record {
            id: id.clone(),
            integrity_digest: digest,
            compressed_payload: compressed,
            temporal_index,
            dimension_tag,
            payload_kind: canonical.kind,
        };

        let inserted = self.record_store.insert(&record)?;
        if inserted {
            tracing::debug!(
                "Stored record {} (kind {}, {} -> {} bytes)",
                id,
                record.payload_kind,
                canonical.bytes.len(),
                record.compressed_payload.len()
            );
        } else {
            tracing::debug!("Record {} already present, ingest is a no-op", id);
        }

        Ok(IngestOperationResult {
            id,
            inserted,
            compressed_len: record.compressed_payload.len(),
        })
    }
}
