use anyhow::{Context, bail};
use serde_json::{Map, Value};
use singularity_core::TabularFrame;

/// Parse a frame from either an array of row objects or a
/// `{"columns": [...], "rows": [[...]]}` object.
pub fn frame_from_value(value: Value) -> anyhow::Result<TabularFrame> {
    match value {
        Value::Array(items) => {
            let records = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    _ => bail!("frame rows must be JSON objects"),
                })
                .collect::<anyhow::Result<Vec<Map<String, Value>>>>()?;
            Ok(TabularFrame::from_records(records)?)
        }
        Value::Object(mut map) => {
            let columns: Vec<String> = serde_json::from_value(
                map.remove("columns").context("frame object needs a 'columns' field")?,
            )
            .context("frame 'columns' must be a list of strings")?;
            let rows: Vec<Vec<Value>> = serde_json::from_value(
                map.remove("rows").context("frame object needs a 'rows' field")?,
            )
            .context("frame 'rows' must be a list of lists")?;
            Ok(TabularFrame::new(columns, rows)?)
        }
        _ => bail!("a frame must be an array of row objects or a columns/rows object"),
    }
}
