use crate::operations::{
    IngestOperation, IngestOperationRequest, RetrieveOperation, RetrieveOperationRequest,
};
use crate::{Result, SingularityError};
use ulid::Ulid;

/// Copies records from one store to another, one id at a time.
///
/// A failing id is logged and reported but never stops the batch. There is
/// no rollback of ids that were already copied.
#[derive(Clone)]
pub struct TransferOperation {
    source: RetrieveOperation,
    target: IngestOperation,
}

#[derive(Debug, Clone)]
pub struct TransferOperationRequest {
    pub ids: Vec<String>,
}

#[derive(Debug)]
pub struct TransferFailure {
    pub id: String,
    pub cause: SingularityError,
}

impl TransferFailure {
    pub fn into_error(self) -> SingularityError {
        SingularityError::TransferItem {
            id: self.id,
            source: Box::new(self.cause),
        }
    }
}

#[derive(Debug)]
pub struct TransferOperationResult {
    pub transfer_id: Ulid,
    /// Ids copied successfully, in request order.
    pub transferred: Vec<String>,
    pub failures: Vec<TransferFailure>,
}

impl TransferOperationResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl TransferOperation {
    pub fn new(source: RetrieveOperation, target: IngestOperation) -> Self {
        Self { source, target }
    }

    pub fn run(&self, request: TransferOperationRequest) -> TransferOperationResult {
        let TransferOperationRequest { ids } = request;
        let transfer_id = Ulid::new();

        let mut transferred = Vec::with_capacity(ids.len());
        let mut failures = Vec::new();

        for id in ids {
            match self.transfer_one(&id) {
                Ok(inserted) => {
                    tracing::debug!(
                        "Transfer {}: copied record {} (new on target: {})",
                        transfer_id,
                        id,
                        inserted
                    );
                    transferred.push(id);
                }
                Err(cause) => {
                    tracing::warn!("Transfer {}: skipping record {}: {}", transfer_id, id, cause);
                    failures.push(TransferFailure { id, cause });
                }
            }
        }

        tracing::info!(
            "Transfer {} finished: {} transferred, {} failed",
            transfer_id,
            transferred.len(),
            failures.len()
        );

        TransferOperationResult {
            transfer_id,
            transferred,
            failures,
        }
    }

    fn transfer_one(&self, id: &str) -> Result<bool> {
        let retrieved = self.source.run(RetrieveOperationRequest { id: id.to_string() })?;

        let ingested = self.target.run(IngestOperationRequest {
            payload: retrieved.payload,
            dimension_tag: retrieved.dimension_tag,
        })?;

        if ingested.id != id {
            return Err(SingularityError::Internal(format!(
                "target stored record under id {}, expected {}",
                ingested.id, id
            )));
        }

        Ok(ingested.inserted)
    }
}
