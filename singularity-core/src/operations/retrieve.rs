use crate::digest::verify_integrity;
use crate::{Codec, Payload, RecordStore, Result, SingularityError, TemporalIndex};
use std::sync::Arc;

#[derive(Clone)]
pub struct RetrieveOperation {
    record_store: Arc<RecordStore>,
    codec: Codec,
}

#[derive(Debug, Clone)]
pub struct RetrieveOperationRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct RetrieveOperationResult {
    pub id: String,
    pub payload: Payload,
    pub dimension_tag: i64,
    pub temporal_index: TemporalIndex,
}

impl RetrieveOperation {
    pub fn new(record_store: Arc<RecordStore>, codec: Codec) -> Self {
        Self {
            record_store,
            codec,
        }
    }

    pub fn run(&self, request: RetrieveOperationRequest) -> Result<RetrieveOperationResult> {
        let RetrieveOperationRequest { id } = request;

        let record = self
            .record_store
            .select_by_id(&id)?
            .ok_or_else(|| SingularityError::RecordNotFound(id.clone()))?;

        verify_integrity(&id, &record.compressed_payload, &record.integrity_digest)?;

        let decompressed = self
            .codec
            .decompress(&record.compressed_payload)
            .map_err(|e| match e {
                SingularityError::Codec(reason) => {
                    SingularityError::Codec(format!("record {}: {}", id, reason))
                }
                other => other,
            })?;

        let payload = Payload::decode(record.payload_kind, &decompressed).map_err(|e| {
            SingularityError::Format {
                id: id.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::debug!("Retrieved record {} (kind {})", id, record.payload_kind);

        Ok(RetrieveOperationResult {
            id,
            payload,
            dimension_tag: record.dimension_tag,
            temporal_index: record.temporal_index,
        })
    }
}
