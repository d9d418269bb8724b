//! Oracle adapter.
//!
//! The `oracle` driver is blocking, so each call runs on the blocking pool.
//! There is no separate connect timeout; the dispatcher's query timeout
//! bounds the whole call.

use async_trait::async_trait;
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, ResultSet, Statement};
use serde_json::{Map, Value};

use common::models::{BindParams, ConnectionParams, EngineKind, OracleParams, QueryInput, Row};

use super::{float_value, hex_value, oracle_params, sql_text, EngineAdapter, ExecuteOptions, RawResult};
use crate::error::{EngineError, EngineResult};

const MAX_IDENTIFIER_LEN: usize = 128;

#[derive(Default)]
pub struct OracleAdapter;

impl OracleAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineAdapter for OracleAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Oracle
    }

    async fn execute(
        &self,
        params: &ConnectionParams,
        query: &QueryInput,
        binds: Option<&BindParams>,
        options: &ExecuteOptions,
    ) -> EngineResult<RawResult> {
        let params = oracle_params(params)?.clone();
        let sql = sql_text(query)?.to_string();
        let binds = binds.cloned();
        let schema = options
            .schema_override
            .as_deref()
            .map(schema_identifier)
            .transpose()?
            .map(str::to_string);

        tokio::task::spawn_blocking(move || run_blocking(&params, &sql, binds.as_ref(), schema.as_deref()))
            .await
            .map_err(|e| EngineError::Execution(format!("Oracle worker failed: {}", e)))?
    }
}

fn run_blocking(
    params: &OracleParams,
    sql: &str,
    binds: Option<&BindParams>,
    schema: Option<&str>,
) -> EngineResult<RawResult> {
    let conn = Connection::connect(&params.user, &params.password, &params.dsn)
        .map_err(EngineError::connection_failed)?;

    let result = run_on(&conn, sql, binds, schema);
    if let Err(e) = conn.close() {
        tracing::debug!(error = %e, "Failed to close oracle connection");
    }
    result
}

fn run_on(conn: &Connection, sql: &str, binds: Option<&BindParams>, schema: Option<&str>) -> EngineResult<RawResult> {
    if let Some(schema) = schema {
        conn.execute(&format!("ALTER SESSION SET CURRENT_SCHEMA = {}", schema), &[])?;
    }

    let mut stmt = conn.statement(sql).build()?;
    let bound = BoundValues::from_binds(binds);

    if stmt.is_query() {
        let rows = match &bound {
            BoundValues::Positional(values) => stmt.query(&positional_refs(values))?,
            BoundValues::Named(values) => stmt.query_named(&named_refs(values))?,
        };
        return Ok(RawResult::Rows(collect_rows(rows)?));
    }

    execute_statement(&mut stmt, &bound)?;
    let affected = stmt.row_count()?;
    conn.commit()?;
    Ok(RawResult::Affected(affected))
}

fn execute_statement(stmt: &mut Statement, bound: &BoundValues) -> EngineResult<()> {
    match bound {
        BoundValues::Positional(values) => stmt.execute(&positional_refs(values))?,
        BoundValues::Named(values) => stmt.execute_named(&named_refs(values))?,
    }
    Ok(())
}

fn collect_rows(rows: ResultSet<oracle::Row>) -> EngineResult<Vec<Row>> {
    let columns = column_layout(rows.column_info().iter().map(|c| (c.name(), c.oracle_type())));

    let mut out = Vec::new();
    for row in rows {
        let row = row?;
        let mut map = Map::new();
        for (idx, (name, oracle_type)) in columns.iter().enumerate() {
            map.insert(name.clone(), column_value(&row, idx, oracle_type)?);
        }
        out.push(map);
    }
    Ok(out)
}

/// Result columns as (name, type) pairs. Oracle reports unquoted names in
/// upper case; rows are keyed in lower case.
fn column_layout<'a>(columns: impl IntoIterator<Item = (&'a str, &'a OracleType)>) -> Vec<(String, OracleType)> {
    columns
        .into_iter()
        .map(|(name, oracle_type)| (name.to_lowercase(), oracle_type.clone()))
        .collect()
}

fn column_value(row: &oracle::Row, idx: usize, oracle_type: &OracleType) -> EngineResult<Value> {
    let value = match oracle_type {
        OracleType::Number(_, _)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble
        | OracleType::Int64
        | OracleType::UInt64 => row.get::<usize, Option<String>>(idx)?.map(|s| number_value(&s)),
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => {
            row.get::<usize, Option<Vec<u8>>>(idx)?.map(|b| hex_value(&b))
        }
        _ => row.get::<usize, Option<String>>(idx)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Oracle numbers arrive as text; keep integers exact.
fn number_value(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    match text.parse::<f64>() {
        Ok(f) => float_value(f),
        Err(_) => Value::String(text.to_string()),
    }
}

/// Accepts a plain, unquoted Oracle identifier.
fn schema_identifier(schema: &str) -> EngineResult<&str> {
    let mut chars = schema.chars();
    let valid = schema.len() <= MAX_IDENTIFIER_LEN
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'));
    if valid {
        Ok(schema)
    } else {
        Err(EngineError::invalid_query(format!("Invalid schema name: '{}'", schema)))
    }
}

/// Owned bind values in the shape the driver expects.
enum BoundValues {
    Positional(Vec<Box<dyn ToSql>>),
    Named(Vec<(String, Box<dyn ToSql>)>),
}

impl BoundValues {
    fn from_binds(binds: Option<&BindParams>) -> Self {
        match binds {
            None => BoundValues::Positional(Vec::new()),
            Some(BindParams::Positional(values)) => {
                BoundValues::Positional(values.iter().map(to_sql).collect())
            }
            Some(BindParams::Named(values)) => BoundValues::Named(
                values
                    .iter()
                    .map(|(name, value)| (name.clone(), to_sql(value)))
                    .collect(),
            ),
        }
    }
}

fn positional_refs(values: &[Box<dyn ToSql>]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v.as_ref()).collect()
}

fn named_refs(values: &[(String, Box<dyn ToSql>)]) -> Vec<(&str, &dyn ToSql)> {
    values.iter().map(|(name, v)| (name.as_str(), v.as_ref())).collect()
}

fn to_sql(value: &Value) -> Box<dyn ToSql> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Box::new(i),
            None => Box::new(n.as_f64()),
        },
        Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_identifier_accepts_plain_names() {
        for name in ["HR", "app_owner", "SYS$X", "a#1"] {
            assert_eq!(schema_identifier(name).unwrap(), name);
        }
    }

    #[test]
    fn test_schema_identifier_rejects_injection() {
        for name in ["", "1abc", "HR; DROP TABLE x", "\"HR\"", "hr.emp"] {
            assert!(matches!(schema_identifier(name), Err(EngineError::InvalidQuery(_))), "{name}");
        }
        assert!(schema_identifier(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_number_text_conversion() {
        assert_eq!(number_value("42"), json!(42));
        assert_eq!(number_value("-7"), json!(-7));
        assert_eq!(number_value("1.25"), json!(1.25));
        assert_eq!(number_value(".5"), json!(0.5));
        assert_eq!(number_value("~"), json!("~"));
    }

    #[test]
    fn test_bound_values_keep_shape() {
        let positional = BindParams::Positional(vec![json!(1), json!(true), json!(null)]);
        match BoundValues::from_binds(Some(&positional)) {
            BoundValues::Positional(values) => assert_eq!(values.len(), 3),
            BoundValues::Named(_) => panic!("expected positional binds"),
        }

        let named = BindParams::Named(json!({"id": 7, "tags": ["a"]}).as_object().unwrap().clone());
        match BoundValues::from_binds(Some(&named)) {
            BoundValues::Named(values) => {
                let names: Vec<_> = values.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["id", "tags"]);
            }
            BoundValues::Positional(_) => panic!("expected named binds"),
        }
    }

    #[test]
    fn test_column_names_are_lower_cased() {
        let number = OracleType::Number(6, 0);
        let text = OracleType::Varchar2(25);
        let layout = column_layout([("EMPLOYEE_ID", &number), ("Last_Name", &text), ("hired", &OracleType::Date)]);

        let names: Vec<_> = layout.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["employee_id", "last_name", "hired"]);
        assert!(matches!(layout[0].1, OracleType::Number(6, 0)));
        assert!(matches!(layout[1].1, OracleType::Varchar2(25)));
        assert!(matches!(layout[2].1, OracleType::Date));
    }
}
