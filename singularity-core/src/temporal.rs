use crate::payload::CanonicalPayload;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Advisory metadata attached to every record. Never used for addressing
/// or integrity checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalIndex {
    pub ingestion_time: DateTime<Utc>,
    pub temporal_vectors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalIndexer;

impl TemporalIndexer {
    pub fn new() -> Self {
        Self
    }

    pub fn create_index(&self, payload: &CanonicalPayload) -> TemporalIndex {
        self.create_index_at(payload, Utc::now())
    }

    pub fn create_index_at(&self, payload: &CanonicalPayload, at: DateTime<Utc>) -> TemporalIndex {
        TemporalIndex {
            ingestion_time: at,
            temporal_vectors: vec![fingerprint(&payload.bytes)],
        }
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadKind;
    use chrono::TimeZone;

    #[test]
    fn test_index_is_pure_in_content() {
        let indexer = TemporalIndexer::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let payload = CanonicalPayload {
            kind: PayloadKind::Record,
            bytes: b"{}".to_vec(),
        };

        let a = indexer.create_index_at(&payload, at);
        let b = indexer.create_index_at(&payload, at);
        assert_eq!(a, b);
        assert_eq!(a.temporal_vectors, vec!["99914b932bd37a50b983c5e7c90ae93b".to_string()]);
    }

    #[test]
    fn test_index_serializes_as_json() {
        let indexer = TemporalIndexer::new();
        let payload = CanonicalPayload {
            kind: PayloadKind::Sequence,
            bytes: b"[]".to_vec(),
        };
        let index = indexer.create_index(&payload);
        let json = serde_json::to_string(&index).unwrap();
        let back: TemporalIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }
}
