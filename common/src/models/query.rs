//! Query execution models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

/// One result row: column or field name to value, in column order.
pub type Row = Map<String, Value>;

/// The query text, or a structured filter for the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryInput {
    Text(String),
    Document(Map<String, Value>),
}

impl QueryInput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            QueryInput::Text(text) => Some(text),
            QueryInput::Document(_) => None,
        }
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

/// Bind parameters: a JSON array binds by position, an object by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindParams {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

/// Arguments of the `execute_query` tool.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct QueryRequest {
    /// Alias of a configured database.
    #[validate(length(min = 1, message = "database_alias is required"))]
    pub database_alias: String,

    /// SQL text, or a MongoDB filter as JSON text or object.
    #[schema(value_type = Object)]
    pub query: QueryInput,

    /// Optional bind parameters.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub params: Option<BindParams>,

    /// Collection to search (MongoDB only).
    #[serde(default)]
    pub collection: Option<String>,

    /// Schema to switch the session to before running the query (Oracle only).
    #[serde(default, alias = "schema_override")]
    pub oracle_schema: Option<String>,
}

impl QueryRequest {
    pub fn new(database_alias: impl Into<String>, query: impl Into<QueryInput>) -> Self {
        Self {
            database_alias: database_alias.into(),
            query: query.into(),
            params: None,
            collection: None,
            oracle_schema: None,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

/// Uniform result of a query, whatever engine answered it.
///
/// For reads `row_count == data.len()`; for mutations `data` is empty and
/// `row_count` is the number of affected rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Row>,

    pub row_count: u64,

    /// Why a query was refused without being executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl QueryResult {
    pub fn rows(data: Vec<Row>) -> Self {
        Self {
            row_count: data.len() as u64,
            data,
            note: None,
        }
    }

    pub fn affected(count: u64) -> Self {
        Self {
            data: Vec::new(),
            row_count: count,
            note: None,
        }
    }

    pub fn refused(note: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            row_count: 0,
            note: Some(note.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_accepts_text_or_object() {
        let text: QueryRequest = serde_json::from_value(json!({
            "database_alias": "pg",
            "query": "SELECT 1",
            "params": [1, "a"]
        }))
        .unwrap();
        assert_eq!(text.query.as_text(), Some("SELECT 1"));
        assert!(matches!(text.params, Some(BindParams::Positional(ref v)) if v.len() == 2));

        let doc: QueryRequest = serde_json::from_value(json!({
            "database_alias": "mg",
            "query": {"status": "active"},
            "collection": "users",
            "params": {"id": 7}
        }))
        .unwrap();
        assert!(matches!(doc.query, QueryInput::Document(ref m) if m.contains_key("status")));
        assert!(matches!(doc.params, Some(BindParams::Named(_))));
    }

    #[test]
    fn test_schema_override_alias() {
        let req: QueryRequest = serde_json::from_value(json!({
            "database_alias": "ora",
            "query": "SELECT 1 FROM dual",
            "schema_override": "HR"
        }))
        .unwrap();
        assert_eq!(req.oracle_schema.as_deref(), Some("HR"));
    }

    #[test]
    fn test_result_shapes() {
        let mut row = Row::new();
        row.insert("id".into(), json!(1));
        let read = QueryResult::rows(vec![row.clone(), row]);
        assert_eq!(read.row_count, 2);

        let write = QueryResult::affected(5);
        assert!(write.data.is_empty());
        assert_eq!(write.row_count, 5);

        let body = serde_json::to_value(QueryResult::affected(0)).unwrap();
        assert!(body.get("note").is_none());
    }
}
