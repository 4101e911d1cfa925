//! Column table for stored scaling-state documents.
//!
//! Every field that is read from or written to storage is listed in
//! [`STATE_COLUMNS`] together with its kind. Conversion in both directions
//! walks this table, so unknown document fields are dropped on read and
//! never written.
//!
//! Timestamps are held as milliseconds in memory and stored as
//! `{"seconds": i64, "nanos": u32}`. Older records stored plain integer
//! milliseconds; both forms are accepted on read.

use serde_json::{Map, Value, json};

use crate::error::{StateError, StateResult};
use crate::types::ScalingState;

/// Storage representation of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Timestamp,
    String,
    Number,
}

/// A recognized document field.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

pub const CREATED_ON: &str = "createdOn";
pub const UPDATED_ON: &str = "updatedOn";

pub const STATE_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "lastScalingTimestamp", kind: ColumnKind::Timestamp },
    ColumnDef { name: CREATED_ON, kind: ColumnKind::Timestamp },
    ColumnDef { name: UPDATED_ON, kind: ColumnKind::Timestamp },
    ColumnDef { name: "lastScalingCompleteTimestamp", kind: ColumnKind::Timestamp },
    ColumnDef { name: "scalingOperationId", kind: ColumnKind::String },
    ColumnDef { name: "scalingRequestedSize", kind: ColumnKind::Number },
    ColumnDef { name: "scalingPreviousSize", kind: ColumnKind::Number },
    ColumnDef { name: "scalingMethod", kind: ColumnKind::String },
];

/// Convert a state into a storage document containing every column.
pub fn to_document(state: &ScalingState) -> StateResult<Map<String, Value>> {
    let Value::Object(mut fields) =
        serde_json::to_value(state).map_err(|e| StateError::Serialize(e.to_string()))?
    else {
        return Err(StateError::Serialize("state is not an object".into()));
    };

    let mut doc = Map::new();
    for col in STATE_COLUMNS {
        let value = fields.remove(col.name).unwrap_or(Value::Null);
        let stored = match col.kind {
            ColumnKind::Timestamp => millis_to_timestamp(value.as_u64().unwrap_or(0)),
            ColumnKind::String | ColumnKind::Number => value,
        };
        doc.insert(col.name.to_string(), stored);
    }
    Ok(doc)
}

/// Convert a storage document into a state.
///
/// Missing timestamp columns read as 0, other missing columns as null.
pub fn from_document(doc: &Map<String, Value>) -> StateResult<ScalingState> {
    let mut fields = Map::new();
    for col in STATE_COLUMNS {
        let value = match (col.kind, doc.get(col.name)) {
            (ColumnKind::Timestamp, Some(stored)) => json!(timestamp_to_millis(col.name, stored)?),
            (ColumnKind::Timestamp, None) => json!(0),
            (_, Some(stored)) => stored.clone(),
            (_, None) => Value::Null,
        };
        fields.insert(col.name.to_string(), value);
    }
    serde_json::from_value(Value::Object(fields)).map_err(|e| StateError::Deserialize(e.to_string()))
}

fn millis_to_timestamp(millis: u64) -> Value {
    json!({
        "seconds": millis / 1000,
        "nanos": (millis % 1000) * 1_000_000,
    })
}

fn timestamp_to_millis(column: &str, stored: &Value) -> StateResult<u64> {
    match stored {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| invalid_timestamp(column, stored)),
        Value::Object(obj) => {
            let seconds = obj.get("seconds").and_then(Value::as_u64);
            let nanos = obj.get("nanos").and_then(Value::as_u64).unwrap_or(0);
            seconds
                .and_then(|s| s.checked_mul(1000))
                .and_then(|ms| ms.checked_add(nanos / 1_000_000))
                .ok_or_else(|| invalid_timestamp(column, stored))
        }
        _ => Err(invalid_timestamp(column, stored)),
    }
}

fn invalid_timestamp(column: &str, stored: &Value) -> StateError {
    StateError::Deserialize(format!("invalid timestamp in {column}: {stored}"))
}
