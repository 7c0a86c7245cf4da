use crate::error::{Result, SingularityError};
use crate::payload::PayloadKind;
use crate::temporal::TemporalIndex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RECORD_COLUMNS: &str =
    "id, integrity_digest, compressed_payload, temporal_index, dimension_tag, payload_kind";

/// Record as persisted in the `compressed_data` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub integrity_digest: String,
    #[serde(with = "base64_bytes")]
    pub compressed_payload: Vec<u8>,
    pub temporal_index: TemporalIndex,
    pub dimension_tag: i64,
    pub payload_kind: PayloadKind,
}

/// Where the backing database lives, parsed from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    /// Accepts `sqlite:///:memory:`, `sqlite::memory:`, `:memory:`,
    /// `sqlite:///relative.db`, `sqlite:////abs/path.db` or a plain path.
    pub fn parse(connection: &str) -> Result<Self> {
        let connection = connection.trim();
        if connection.is_empty() {
            return Err(SingularityError::Config(
                "connection string must not be empty".to_string(),
            ));
        }

        let rest = if let Some(rest) = connection.strip_prefix("sqlite:///") {
            rest
        } else if let Some(rest) = connection.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = connection.strip_prefix("sqlite:") {
            rest
        } else if connection.contains("://") {
            return Err(SingularityError::Config(format!(
                "unsupported store backend in '{}'",
                connection
            )));
        } else {
            connection
        };

        match rest {
            "" | ":memory:" => Ok(StoreLocation::Memory),
            path => Ok(StoreLocation::File(PathBuf::from(path))),
        }
    }
}

enum Backend {
    File(PathBuf),
    Memory(Mutex<Connection>),
}

/// Record persistence over SQLite.
///
/// File-backed stores open a connection per call; every call runs in its
/// own transaction. In-memory stores share one connection behind a mutex.
pub struct RecordStore {
    backend: Backend,
}

impl RecordStore {
    pub fn open(location: StoreLocation) -> Result<Self> {
        let backend = match location {
            StoreLocation::Memory => {
                let conn = Connection::open_in_memory()?;
                Backend::Memory(Mutex::new(conn))
            }
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Backend::File(path)
            }
        };

        let store = Self { backend };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(path) => Some(path),
            Backend::Memory(_) => None,
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        match &self.backend {
            Backend::File(path) => {
                let mut conn = Connection::open(path)?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                f(&mut conn)
            }
            Backend::Memory(conn) => {
                let mut guard = conn.lock().map_err(|_| {
                    SingularityError::Internal("record store connection poisoned".to_string())
                })?;
                f(&mut guard)
            }
        }
    }

    fn init_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS compressed_data (
                    id TEXT PRIMARY KEY,
                    integrity_digest TEXT NOT NULL,
                    compressed_payload BLOB NOT NULL,
                    temporal_index TEXT NOT NULL,
                    dimension_tag INTEGER NOT NULL,
                    payload_kind TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
    }

    /// Insert a record. Returns false when a record with the same id is
    /// already present; the stored record is left untouched.
    pub fn insert(&self, record: &Record) -> Result<bool> {
        let temporal_json = serde_json::to_string(&record.temporal_index)?;

        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let affected = insert_row(&tx, record, &temporal_json)?;
            tx.commit()?;
            Ok(affected > 0)
        })
    }

    /// Insert several records in one transaction. Returns how many were new.
    pub fn insert_many(&self, records: &[Record]) -> Result<usize> {
        let rows = records
            .iter()
            .map(|record| -> Result<(&Record, String)> {
                Ok((record, serde_json::to_string(&record.temporal_index)?))
            })
            .collect::<Result<Vec<_>>>()?;

        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut inserted = 0;
            for (record, temporal_json) in &rows {
                inserted += insert_row(&tx, record, temporal_json)?;
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    pub fn select_by_id(&self, id: &str) -> Result<Option<Record>> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {} FROM compressed_data WHERE id = ?1", RECORD_COLUMNS),
                    [id],
                    record_from_row,
                )
                .optional()?;
            Ok(record)
        })
    }

    pub fn select_all(&self) -> Result<Vec<Record>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM compressed_data ORDER BY id",
                RECORD_COLUMNS
            ))?;
            let rows = stmt.query_map([], record_from_row)?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
    }

    pub fn list_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM compressed_data ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            Ok(ids)
        })
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM compressed_data WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM compressed_data", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}

fn insert_row(conn: &Connection, record: &Record, temporal_json: &str) -> Result<usize> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO compressed_data (
            id, integrity_digest, compressed_payload, temporal_index, dimension_tag, payload_kind
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            record.integrity_digest,
            record.compressed_payload,
            temporal_json,
            record.dimension_tag,
            record.payload_kind.as_str(),
        ],
    )?;
    Ok(affected)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let temporal_json: String = row.get(3)?;
    let kind: String = row.get(5)?;

    let temporal_index: TemporalIndex = serde_json::from_str(&temporal_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let payload_kind: PayloadKind = kind
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Record {
        id: row.get(0)?,
        integrity_digest: row.get(1)?,
        compressed_payload: row.get(2)?,
        temporal_index,
        dimension_tag: row.get(4)?,
        payload_kind,
    })
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
