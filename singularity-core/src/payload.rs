//! Payload shapes accepted by the store and their canonical byte form.
//!
//! Three shapes are supported: structured records (JSON objects), ordered
//! sequences (JSON arrays) and tabular frames. Canonicalization sorts object
//! keys recursively and frame columns, so equal logical content always yields
//! identical bytes.

use crate::digest::tagged_content_id;
use crate::error::{Result, SingularityError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Record,
    Sequence,
    Frame,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Record => "record",
            PayloadKind::Sequence => "sequence",
            PayloadKind::Frame => "frame",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadKind {
    type Err = SingularityError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "record" => Ok(PayloadKind::Record),
            "sequence" => Ok(PayloadKind::Sequence),
            "frame" => Ok(PayloadKind::Frame),
            other => Err(SingularityError::UnsupportedPayloadType(format!(
                "unknown payload kind '{}'",
                other
            ))),
        }
    }
}

/// Column-named table of JSON cells.
///
/// Columns are kept in sorted order; construction permutes every row to
/// match, so two frames that differ only in column order are equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularFrame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SingularityError::UnsupportedPayloadType(format!(
                    "frame has duplicate column '{}'",
                    column
                )));
            }
        }

        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(SingularityError::UnsupportedPayloadType(format!(
                    "frame row {} has {} cells, expected {}",
                    index,
                    row.len(),
                    columns.len()
                )));
            }
        }

        let mut order: Vec<usize> = (0..columns.len()).collect();
        order.sort_by(|a, b| columns[*a].cmp(&columns[*b]));

        let sorted_columns = order.iter().map(|i| columns[*i].clone()).collect();
        let sorted_rows = rows
            .iter()
            .map(|row| order.iter().map(|i| canonical_value(&row[*i])).collect())
            .collect();

        Ok(Self {
            columns: sorted_columns,
            rows: sorted_rows,
        })
    }

    /// Build a frame from row objects. Columns are the union of all keys;
    /// cells missing from a row are null.
    pub fn from_records(records: Vec<Map<String, Value>>) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for record in &records {
            for key in record.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|column| record.remove(column).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Record(Map<String, Value>),
    Sequence(Vec<Value>),
    Frame(TabularFrame),
}

/// Canonical bytes of a payload together with its shape tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPayload {
    pub kind: PayloadKind,
    pub bytes: Vec<u8>,
}

impl CanonicalPayload {
    pub fn content_id(&self) -> String {
        tagged_content_id(self.kind.as_str(), &self.bytes)
    }
}

impl Payload {
    /// Classify an arbitrary JSON value. Objects become records, arrays become
    /// sequences; scalars are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Payload::Record(map)),
            Value::Array(items) => Ok(Payload::Sequence(items)),
            other => Err(SingularityError::UnsupportedPayloadType(format!(
                "expected a structured record, sequence or frame, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Record(_) => PayloadKind::Record,
            Payload::Sequence(_) => PayloadKind::Sequence,
            Payload::Frame(_) => PayloadKind::Frame,
        }
    }

    pub fn canonicalize(&self) -> Result<CanonicalPayload> {
        let bytes = match self {
            Payload::Record(map) => serde_json::to_vec(&canonical_map(map))?,
            Payload::Sequence(items) => {
                let items: Vec<Value> = items.iter().map(canonical_value).collect();
                serde_json::to_vec(&items)?
            }
            // Frames are canonical by construction.
            Payload::Frame(frame) => serde_json::to_vec(frame)?,
        };

        Ok(CanonicalPayload {
            kind: self.kind(),
            bytes,
        })
    }

    /// Rebuild a payload from canonical bytes of the given shape.
    pub fn decode(kind: PayloadKind, bytes: &[u8]) -> Result<Self> {
        match kind {
            PayloadKind::Record => match serde_json::from_slice::<Value>(bytes)? {
                Value::Object(map) => Ok(Payload::Record(map)),
                other => Err(SingularityError::UnsupportedPayloadType(format!(
                    "record payload decoded to {}",
                    json_type_name(&other)
                ))),
            },
            PayloadKind::Sequence => match serde_json::from_slice::<Value>(bytes)? {
                Value::Array(items) => Ok(Payload::Sequence(items)),
                other => Err(SingularityError::UnsupportedPayloadType(format!(
                    "sequence payload decoded to {}",
                    json_type_name(&other)
                ))),
            },
            PayloadKind::Frame => {
                let raw: RawFrame = serde_json::from_slice(bytes)?;
                Ok(Payload::Frame(TabularFrame::new(raw.columns, raw.rows)?))
            }
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Record(map) => Value::Object(map),
            Payload::Sequence(items) => Value::Array(items),
            Payload::Frame(frame) => {
                let mut map = Map::new();
                map.insert(
                    "columns".to_string(),
                    Value::Array(frame.columns.into_iter().map(Value::String).collect()),
                );
                map.insert(
                    "rows".to_string(),
                    Value::Array(frame.rows.into_iter().map(Value::Array).collect()),
                );
                Value::Object(map)
            }
        }
    }
}

impl TryFrom<Value> for Payload {
    type Error = SingularityError;

    fn try_from(value: Value) -> Result<Self> {
        Payload::from_value(value)
    }
}

impl From<TabularFrame> for Payload {
    fn from(frame: TabularFrame) -> Self {
        Payload::Frame(frame)
    }
}

fn canonical_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut sorted = Map::new();
    for (key, value) in entries {
        sorted.insert(key.clone(), canonical_value(value));
    }
    sorted
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(canonical_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
