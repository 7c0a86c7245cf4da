pub mod backup;
pub mod ingest;
pub mod retrieve;
pub mod transfer;

pub use backup::{
    BACKUP_FORMAT_VERSION, BackupEnvelope, BackupMetadata, BackupOperation,
    BackupOperationRequest, BackupOperationResult, RestoreOperation, RestoreOperationRequest,
    RestoreOperationResult,
};
pub use ingest::{
    DEFAULT_DIMENSION_TAG, IngestOperation, IngestOperationRequest, IngestOperationResult,
};
pub use retrieve::{RetrieveOperation, RetrieveOperationRequest, RetrieveOperationResult};
pub use transfer::{
    TransferFailure, TransferOperation, TransferOperationRequest, TransferOperationResult,
};
