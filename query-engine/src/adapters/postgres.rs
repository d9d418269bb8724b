//! PostgreSQL adapter.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow, PgStatement};
use sqlx::query::Query;
use sqlx::{Column, Connection, Either, Executor, Postgres, Row as _, Statement, TypeInfo};
use uuid::Uuid;

use common::models::{BindParams, ConnectionParams, EngineKind, QueryInput, Row};

use super::{connect_within, float_value, hex_value, sql_params, sql_text, EngineAdapter, ExecuteOptions, RawResult};
use crate::binds::{self, Placeholder, ResolvedSql};
use crate::error::{EngineError, EngineResult};

pub struct PostgresAdapter {
    connect_timeout: Duration,
}

impl PostgresAdapter {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn run(conn: &mut PgConnection, resolved: &ResolvedSql) -> EngineResult<RawResult> {
        // The prepared statement is cached under this text with the parameter
        // types the server inferred; the query below reuses it, so every value
        // is encoded as its slot's type.
        let statement = (&mut *conn).prepare(resolved.sql.as_str()).await?;
        let returns_rows = !statement.columns().is_empty();
        let slots = parameter_types(&statement);
        if slots.len() != resolved.values.len() {
            return Err(EngineError::invalid_query(format!(
                "Expected {} bind parameters, got {}",
                slots.len(),
                resolved.values.len()
            )));
        }

        let mut query = sqlx::query(&resolved.sql);
        for (idx, (value, type_name)) in resolved.values.iter().zip(&slots).enumerate() {
            let param = pg_param(value, type_name).map_err(|reason| {
                EngineError::invalid_query(format!(
                    "Bind parameter ${} ({}): {}",
                    idx + 1,
                    type_name.to_lowercase(),
                    reason
                ))
            })?;
            query = bind_param(query, param);
        }

        if returns_rows {
            let rows = query.fetch_all(&mut *conn).await?;
            return Ok(RawResult::Rows(rows.iter().map(row_to_map).collect()));
        }

        let mut tx = conn.begin().await?;
        let done = query.execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(RawResult::Affected(done.rows_affected()))
    }
}

#[async_trait]
impl EngineAdapter for PostgresAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Postgres
    }

    async fn execute(
        &self,
        params: &ConnectionParams,
        query: &QueryInput,
        binds: Option<&BindParams>,
        _options: &ExecuteOptions,
    ) -> EngineResult<RawResult> {
        let p = sql_params(params)?;
        let resolved = binds::resolve(sql_text(query)?, binds, Placeholder::Numbered)?;

        let options = PgConnectOptions::new()
            .host(&p.host)
            .port(p.port)
            .username(&p.user)
            .password(&p.password)
            .database(&p.dbname);
        let mut conn = connect_within(self.connect_timeout, PgConnection::connect_with(&options)).await?;

        let result = Self::run(&mut conn, &resolved).await;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Failed to close postgres connection");
        }
        result
    }
}

fn parameter_types(statement: &PgStatement<'_>) -> Vec<String> {
    match statement.parameters() {
        Some(Either::Left(types)) => types.iter().map(|t| t.name().to_string()).collect(),
        _ => Vec::new(),
    }
}

/// A bind value converted to the type of the slot it fills.
#[derive(Debug, Clone, PartialEq)]
enum PgParam {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Numeric(Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Json(Value),
}

/// Converts a JSON value for a slot of the named server type. Types without
/// a conversion take the value's own JSON type.
fn pg_param(value: &Value, type_name: &str) -> Result<PgParam, String> {
    if value.is_null() {
        return Ok(PgParam::Null);
    }
    let param = match type_name {
        "BOOL" => PgParam::Bool(as_bool(value)?),
        "INT2" => PgParam::Int2(narrow(as_i64(value)?)?),
        "INT4" => PgParam::Int4(narrow(as_i64(value)?)?),
        "INT8" => PgParam::Int8(as_i64(value)?),
        "FLOAT4" => PgParam::Float4(as_f64(value)? as f32),
        "FLOAT8" => PgParam::Float8(as_f64(value)?),
        "NUMERIC" => PgParam::Numeric(as_decimal(value)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => PgParam::Text(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
        "DATE" => PgParam::Date(as_str(value)?.parse::<NaiveDate>().map_err(|e| e.to_string())?),
        "TIME" => PgParam::Time(as_str(value)?.parse::<NaiveTime>().map_err(|e| e.to_string())?),
        "TIMESTAMP" => PgParam::Timestamp(naive_datetime(as_str(value)?)?),
        "TIMESTAMPTZ" => {
            let text = as_str(value)?;
            let utc = match DateTime::parse_from_rfc3339(text) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(_) => naive_datetime(text)?.and_utc(),
            };
            PgParam::TimestampTz(utc)
        }
        "UUID" => PgParam::Uuid(Uuid::parse_str(as_str(value)?).map_err(|e| e.to_string())?),
        "BYTEA" => PgParam::Bytes(from_hex(as_str(value)?)?),
        "JSON" | "JSONB" => PgParam::Json(value.clone()),
        _ => match value {
            Value::Bool(b) => PgParam::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgParam::Int8(i),
                None => PgParam::Float8(as_f64(value)?),
            },
            Value::String(s) => PgParam::Text(s.clone()),
            other => PgParam::Json(other.clone()),
        },
    };
    Ok(param)
}

fn as_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => s.parse().map_err(|_| format!("'{}' is not a boolean", s)),
        other => Err(format!("expected a boolean, got {}", other)),
    }
}

fn as_i64(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| format!("{} is not an integer", n)),
        Value::String(s) => s.trim().parse().map_err(|_| format!("'{}' is not an integer", s)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn narrow<T: TryFrom<i64>>(i: i64) -> Result<T, String> {
    T::try_from(i).map_err(|_| format!("{} is out of range", i))
}

fn as_f64(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{} is not a number", n)),
        Value::String(s) => s.trim().parse().map_err(|_| format!("'{}' is not a number", s)),
        other => Err(format!("expected a number, got {}", other)),
    }
}

fn as_decimal(value: &Value) -> Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(format!("expected a number, got {}", other)),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("'{}' is not a decimal", text))
}

fn as_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {}", value))
}

fn naive_datetime(text: &str) -> Result<NaiveDateTime, String> {
    text.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| format!("'{}': {}", text, e))
}

/// Hex text, with or without the `\x` prefix postgres prints.
fn from_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits = text.strip_prefix("\\x").unwrap_or(text);
    if digits.len() % 2 != 0 {
        return Err(format!("'{}' is not hex", text));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("'{}' is not hex", text))
        })
        .collect()
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: PgParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        PgParam::Null => query.bind(Option::<String>::None),
        PgParam::Bool(v) => query.bind(v),
        PgParam::Int2(v) => query.bind(v),
        PgParam::Int4(v) => query.bind(v),
        PgParam::Int8(v) => query.bind(v),
        PgParam::Float4(v) => query.bind(v),
        PgParam::Float8(v) => query.bind(v),
        PgParam::Numeric(v) => query.bind(v),
        PgParam::Text(v) => query.bind(v),
        PgParam::Date(v) => query.bind(v),
        PgParam::Time(v) => query.bind(v),
        PgParam::Timestamp(v) => query.bind(v),
        PgParam::TimestampTz(v) => query.bind(v),
        PgParam::Uuid(v) => query.bind(v),
        PgParam::Bytes(v) => query.bind(v),
        PgParam::Json(v) => query.bind(v),
    }
}

fn row_to_map(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), extract_value(row, column.ordinal())))
        .collect()
}

fn extract_value(row: &PgRow, idx: usize) -> Value {
    // Integers before bool.
    decode_as!(row, idx, i64, Value::from);
    decode_as!(row, idx, i32, Value::from);
    decode_as!(row, idx, i16, Value::from);
    decode_as!(row, idx, bool, Value::Bool);
    decode_as!(row, idx, f64, float_value);
    decode_as!(row, idx, f32, |f| float_value(f as f64));
    decode_as!(row, idx, Decimal, |d| d
        .to_f64()
        .map(float_value)
        .unwrap_or_else(|| Value::String(d.to_string())));
    decode_as!(row, idx, String, Value::String);
    decode_as!(row, idx, DateTime<Utc>, |dt| Value::String(dt.to_rfc3339()));
    decode_as!(row, idx, NaiveDateTime, |dt| Value::String(
        dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    ));
    decode_as!(row, idx, NaiveDate, |d| Value::String(d.to_string()));
    decode_as!(row, idx, NaiveTime, |t| Value::String(t.to_string()));
    decode_as!(row, idx, Uuid, |u| Value::String(u.to_string()));
    decode_as!(row, idx, Vec<u8>, |b| hex_value(&b));
    decode_as!(row, idx, Value, |v| v);

    tracing::debug!(
        column = %row.columns()[idx].name(),
        type_name = %row.columns()[idx].type_info(),
        "Unsupported postgres column type, returning null"
    );
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::SqlParams;
    use serde_json::json;

    #[test]
    fn test_integers_take_the_slot_width() {
        assert_eq!(pg_param(&json!(1), "INT4"), Ok(PgParam::Int4(1)));
        assert_eq!(pg_param(&json!("7"), "INT2"), Ok(PgParam::Int2(7)));
        assert_eq!(pg_param(&json!(1), "INT8"), Ok(PgParam::Int8(1)));
        assert!(pg_param(&json!(70000), "INT2").is_err());
        assert!(pg_param(&json!(1.5), "INT4").is_err());
    }

    #[test]
    fn test_numbers_and_text() {
        assert_eq!(
            pg_param(&json!(12.5), "NUMERIC"),
            Ok(PgParam::Numeric(Decimal::from_str("12.5").unwrap()))
        );
        assert_eq!(
            pg_param(&json!("3"), "NUMERIC"),
            Ok(PgParam::Numeric(Decimal::from(3)))
        );
        assert_eq!(pg_param(&json!(2), "FLOAT8"), Ok(PgParam::Float8(2.0)));
        assert_eq!(pg_param(&json!(42), "TEXT"), Ok(PgParam::Text("42".into())));
        assert_eq!(pg_param(&json!("ada"), "VARCHAR"), Ok(PgParam::Text("ada".into())));
        assert_eq!(pg_param(&json!("true"), "BOOL"), Ok(PgParam::Bool(true)));
        assert!(pg_param(&json!("yes"), "BOOL").is_err());
    }

    #[test]
    fn test_temporal_and_binary_slots() {
        assert_eq!(
            pg_param(&json!("2020-01-31"), "DATE"),
            Ok(PgParam::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()))
        );
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(1, 4, 5)
            .unwrap();
        assert_eq!(
            pg_param(&json!("2024-01-02T03:04:05+02:00"), "TIMESTAMPTZ"),
            Ok(PgParam::TimestampTz(expected.and_utc()))
        );
        assert_eq!(
            pg_param(&json!("2024-01-02 01:04:05"), "TIMESTAMP"),
            Ok(PgParam::Timestamp(expected))
        );
        assert!(pg_param(&json!(20200131), "DATE").is_err());
        assert_eq!(pg_param(&json!("\\xdead"), "BYTEA"), Ok(PgParam::Bytes(vec![0xde, 0xad])));
        assert!(pg_param(&json!("abc"), "BYTEA").is_err());
    }

    #[test]
    fn test_null_and_unknown_slots() {
        assert_eq!(pg_param(&Value::Null, "INT4"), Ok(PgParam::Null));
        assert_eq!(pg_param(&json!("10.0.0.1"), "INET"), Ok(PgParam::Text("10.0.0.1".into())));
        assert_eq!(pg_param(&json!(5), "MOOD"), Ok(PgParam::Int8(5)));
        assert_eq!(pg_param(&json!({"a": 1}), "JSONB"), Ok(PgParam::Json(json!({"a": 1}))));
    }

    /// Server from the libpq environment; live tests return early without `PGHOST`.
    fn live_params() -> Option<ConnectionParams> {
        let host = std::env::var("PGHOST").ok()?;
        Some(ConnectionParams::Sql(SqlParams {
            host,
            port: std::env::var("PGPORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5432),
            user: std::env::var("PGUSER").unwrap_or_else(|_| "postgres".into()),
            password: std::env::var("PGPASSWORD").unwrap_or_default(),
            dbname: std::env::var("PGDATABASE").unwrap_or_else(|_| "postgres".into()),
        }))
    }

    async fn run_sql(params: &ConnectionParams, sql: &str, binds: Value) -> EngineResult<RawResult> {
        let binds: Option<BindParams> = if binds.is_null() {
            None
        } else {
            Some(serde_json::from_value(binds).unwrap())
        };
        PostgresAdapter::new(Duration::from_secs(5))
            .execute(params, &QueryInput::from(sql), binds.as_ref(), &ExecuteOptions::default())
            .await
    }

    #[tokio::test]
    async fn test_binds_against_typed_columns() {
        let Some(params) = live_params() else { return };
        let table = format!("bind_types_{}", Uuid::new_v4().simple());

        let created = run_sql(
            &params,
            &format!("CREATE TABLE {table} (id int4, born date, amount numeric(10, 2), name text)"),
            Value::Null,
        )
        .await
        .unwrap();
        assert_eq!(created, RawResult::Affected(0));

        let insert = format!("INSERT INTO {table} VALUES ($1, $2, $3, $4)");
        let inserted = run_sql(&params, &insert, json!([1, "2020-01-31", 12.5, "ada"])).await.unwrap();
        assert_eq!(inserted, RawResult::Affected(1));
        let insert = format!("INSERT INTO {table} VALUES (:id, :born, :amount, :name)");
        let inserted = run_sql(&params, &insert, json!({"id": 2, "born": null, "amount": "3", "name": "bob"}))
            .await
            .unwrap();
        assert_eq!(inserted, RawResult::Affected(1));

        let select = format!("SELECT id, name FROM {table} WHERE id = $1");
        let RawResult::Rows(rows) = run_sql(&params, &select, json!([1])).await.unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["name"], json!("ada"));

        let update = format!("UPDATE {table} SET name = $1 WHERE id = $2");
        assert_eq!(run_sql(&params, &update, json!(["grace", 2])).await.unwrap(), RawResult::Affected(1));

        let select = format!("SELECT born, amount FROM {table} WHERE id = :id");
        let RawResult::Rows(rows) = run_sql(&params, &select, json!({"id": 1})).await.unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["born"], json!("2020-01-31"));
        assert_eq!(rows[0]["amount"], json!(12.5));

        let err = run_sql(&params, &select, json!({"id": "one"})).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuery(_)));

        run_sql(&params, &format!("DROP TABLE {table}"), Value::Null).await.unwrap();
    }
}
