//! Result normalization and document identifier coercion.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use serde_json::{Map, Value};

use common::models::{QueryResult, Row};

use crate::adapters::RawResult;

/// Upper bound on documents returned by a single find.
pub const MAX_DOCUMENTS: i64 = 10;

/// Returned instead of running a find with no conditions.
pub const EMPTY_FILTER_NOTE: &str =
    "Empty filter refused: a MongoDB query must specify at least one condition.";

pub fn normalize(raw: RawResult) -> QueryResult {
    match raw {
        RawResult::Rows(rows) => QueryResult::rows(rows),
        RawResult::Affected(count) => QueryResult::affected(count),
        RawResult::Refused { note } => QueryResult::refused(note),
    }
}

/// Converts a JSON filter value to BSON, turning document identifiers into
/// ObjectIds.
///
/// `{"$oid": "<hex>"}` and any 24-character string that parses as an
/// ObjectId are converted. Anything that fails to parse is kept as it was.
pub fn coerce_document_ids(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => number_to_bson(n),
        Value::String(s) => parse_object_id(s)
            .map(Bson::ObjectId)
            .unwrap_or_else(|| Bson::String(s.clone())),
        Value::Array(items) => Bson::Array(items.iter().map(coerce_document_ids).collect()),
        Value::Object(map) => {
            if let Some(oid) = extended_object_id(map) {
                return Bson::ObjectId(oid);
            }
            Bson::Document(coerce_filter(map))
        }
    }
}

/// [`coerce_document_ids`] for a whole filter object.
pub fn coerce_filter(filter: &Map<String, Value>) -> Document {
    filter
        .iter()
        .map(|(key, value)| (key.clone(), coerce_document_ids(value)))
        .collect()
}

/// Converts a fetched document into a plain JSON row via relaxed extended JSON.
pub fn document_to_row(doc: Document) -> Row {
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(map) => map,
        other => {
            let mut row = Row::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

fn parse_object_id(s: &str) -> Option<ObjectId> {
    if s.len() != 24 {
        return None;
    }
    ObjectId::parse_str(s).ok()
}

fn extended_object_id(map: &Map<String, Value>) -> Option<ObjectId> {
    if map.len() != 1 {
        return None;
    }
    match map.get("$oid") {
        Some(Value::String(hex)) => ObjectId::parse_str(hex).ok(),
        _ => None,
    }
}

fn number_to_bson(n: &serde_json::Number) -> Bson {
    if let Some(i) = n.as_i64() {
        return match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        };
    }
    Bson::Double(n.as_f64().unwrap_or(f64::NAN))
}
