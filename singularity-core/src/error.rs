use thiserror::Error;

#[derive(Debug, Error)]
pub enum SingularityError {
    #[error("unsupported payload type: {0}")]
    UnsupportedPayloadType(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// The stored integrity digest no longer matches the stored bytes.
    #[error("integrity violation for record {id}: expected digest {expected}, got {actual}")]
    IntegrityViolation {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("format error for record {id}: {reason}")]
    Format { id: String, reason: String },

    #[error("transfer of record {id} failed: {source}")]
    TransferItem {
        id: String,
        #[source]
        source: Box<SingularityError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SingularityError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SingularityError::RecordNotFound(_))
    }

    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, SingularityError::IntegrityViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, SingularityError>;
