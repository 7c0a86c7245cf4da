use crate::operations::{
    BackupOperation, BackupOperationRequest, DEFAULT_DIMENSION_TAG, IngestOperation,
    IngestOperationRequest, RestoreOperation, RestoreOperationRequest, RestoreOperationResult,
    RetrieveOperation, RetrieveOperationRequest, TransferOperation, TransferOperationRequest,
    TransferOperationResult,
};
use crate::{Codec, Payload, RecordStore, Result, StoreLocation, TemporalIndexer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingularityOptions {
    pub connection: String,
    pub compression_level: f64,
    pub quantum_storage: bool,
}

impl Default for SingularityOptions {
    fn default() -> Self {
        Self {
            connection: "sqlite:///:memory:".to_string(),
            compression_level: 0.9,
            quantum_storage: true,
        }
    }
}

impl SingularityOptions {
    pub fn with_connection(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            ..Self::default()
        }
    }
}

/// Handle to one content-addressed store.
///
/// Cloning is cheap and clones share the same backing record store.
#[derive(Clone)]
pub struct DataSingularity {
    options: SingularityOptions,
    record_store: Arc<RecordStore>,
    codec: Codec,
    indexer: TemporalIndexer,
}

impl DataSingularity {
    pub fn open(options: SingularityOptions) -> Result<Self> {
        let codec = Codec::new(options.compression_level)?;
        let location = StoreLocation::parse(&options.connection)?;
        let record_store = Arc::new(RecordStore::open(location)?);

        tracing::debug!(
            "Opened singularity at {} (zstd level {})",
            options.connection,
            codec.zstd_level()
        );

        Ok(Self {
            options,
            record_store,
            codec,
            indexer: TemporalIndexer::new(),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(SingularityOptions::default())
    }

    pub fn options(&self) -> &SingularityOptions {
        &self.options
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn record_store(&self) -> &Arc<RecordStore> {
        &self.record_store
    }

    pub fn ingest_operation(&self) -> IngestOperation {
        IngestOperation::new(self.record_store.clone(), self.codec, self.indexer)
    }

    pub fn retrieve_operation(&self) -> RetrieveOperation {
        RetrieveOperation::new(self.record_store.clone(), self.codec)
    }

    pub fn backup_operation(&self) -> BackupOperation {
        BackupOperation::new(
            self.record_store.clone(),
            self.codec,
            self.options.quantum_storage,
        )
    }

    pub fn restore_operation(&self) -> RestoreOperation {
        RestoreOperation::new(self.record_store.clone(), self.codec)
    }

    pub fn ingest(&self, payload: Payload) -> Result<String> {
        self.ingest_with_tag(payload, DEFAULT_DIMENSION_TAG)
    }

    pub fn ingest_with_tag(&self, payload: Payload, dimension_tag: i64) -> Result<String> {
        let result = self.ingest_operation().run(IngestOperationRequest {
            payload,
            dimension_tag,
        })?;
        Ok(result.id)
    }

    /// Ingest an arbitrary JSON value; scalars are rejected.
    pub fn ingest_value(&self, value: Value) -> Result<String> {
        self.ingest(Payload::from_value(value)?)
    }

    pub fn retrieve(&self, id: &str) -> Result<Payload> {
        let result = self.retrieve_operation().run(RetrieveOperationRequest {
            id: id.to_string(),
        })?;
        Ok(result.payload)
    }

    pub fn backup(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let result = self.backup_operation().run(BackupOperationRequest {
            dir: dir.as_ref().to_path_buf(),
        })?;
        Ok(result.path)
    }

    pub fn restore(&self, path: impl AsRef<Path>) -> Result<RestoreOperationResult> {
        self.restore_operation().run(RestoreOperationRequest {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        self.record_store.contains(id)
    }

    pub fn len(&self) -> Result<usize> {
        self.record_store.count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn ids(&self) -> Result<Vec<String>> {
        self.record_store.list_ids()
    }

    /// Open the store at `target_connection` with this store's settings and
    /// link the two.
    pub fn create_wormhole(&self, target_connection: &str) -> Result<Wormhole> {
        let target = DataSingularity::open(SingularityOptions {
            connection: target_connection.to_string(),
            ..self.options.clone()
        })?;
        Ok(Wormhole::new(self.clone(), target))
    }
}

/// Replication link between two stores.
#[derive(Clone)]
pub struct Wormhole {
    source: DataSingularity,
    target: DataSingularity,
}

impl Wormhole {
    pub fn new(source: DataSingularity, target: DataSingularity) -> Self {
        Self { source, target }
    }

    pub fn source(&self) -> &DataSingularity {
        &self.source
    }

    pub fn target(&self) -> &DataSingularity {
        &self.target
    }

    pub fn transfer<I, S>(&self, ids: I) -> TransferOperationResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let operation = TransferOperation::new(
            self.source.retrieve_operation(),
            self.target.ingest_operation(),
        );
        operation.run(TransferOperationRequest {
            ids: ids.into_iter().map(Into::into).collect(),
        })
    }

    /// Transfer every record currently held by the source.
    pub fn sync_all(&self) -> Result<TransferOperationResult> {
        let ids = self.source.ids()?;
        tracing::info!(
            "Synchronising {} records {} -> {}",
            ids.len(),
            self.source.options.connection,
            self.target.options.connection
        );
        Ok(self.transfer(ids))
    }
}
