//! MySQL adapter.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Connection, Executor, MySql, Row as _, Statement};

use common::models::{BindParams, ConnectionParams, EngineKind, QueryInput, Row};

use super::{connect_within, float_value, hex_value, sql_params, sql_text, EngineAdapter, ExecuteOptions, RawResult};
use crate::binds::{self, Placeholder, ResolvedSql};
use crate::error::EngineResult;

pub struct MySqlAdapter {
    connect_timeout: Duration,
}

impl MySqlAdapter {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn run(conn: &mut MySqlConnection, resolved: &ResolvedSql) -> EngineResult<RawResult> {
        let statement = (&mut *conn).prepare(resolved.sql.as_str()).await?;
        let returns_rows = !statement.columns().is_empty();

        let mut query = sqlx::query(&resolved.sql);
        for value in &resolved.values {
            query = bind_value(query, value);
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
impl EngineAdapter for MySqlAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Mysql
    }

    async fn execute(
        &self,
        params: &ConnectionParams,
        query: &QueryInput,
        binds: Option<&BindParams>,
        _options: &ExecuteOptions,
    ) -> EngineResult<RawResult> {
        let p = sql_params(params)?;
        let resolved = binds::resolve(sql_text(query)?, binds, Placeholder::Question)?;

        let options = MySqlConnectOptions::new()
            .host(&p.host)
            .port(p.port)
            .username(&p.user)
            .password(&p.password)
            .database(&p.dbname);
        let mut conn = connect_within(self.connect_timeout, MySqlConnection::connect_with(&options)).await?;

        let result = Self::run(&mut conn, &resolved).await;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Failed to close mysql connection");
        }
        result
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}

fn row_to_map(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), extract_value(row, column.ordinal())))
        .collect()
}

fn extract_value(row: &MySqlRow, idx: usize) -> Value {
    decode_as!(row, idx, i64, Value::from);
    decode_as!(row, idx, u64, Value::from);
    decode_as!(row, idx, bool, Value::Bool);
    decode_as!(row, idx, f64, float_value);
    decode_as!(row, idx, f32, |f| float_value(f as f64));
    decode_as!(row, idx, rust_decimal::Decimal, |d| d
        .to_f64()
        .map(float_value)
        .unwrap_or_else(|| Value::String(d.to_string())));
    decode_as!(row, idx, String, Value::String);
    decode_as!(row, idx, chrono::DateTime<chrono::Utc>, |dt| Value::String(dt.to_rfc3339()));
    decode_as!(row, idx, chrono::NaiveDateTime, |dt| Value::String(
        dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    ));
    decode_as!(row, idx, chrono::NaiveDate, |d| Value::String(d.to_string()));
    decode_as!(row, idx, chrono::NaiveTime, |t| Value::String(t.to_string()));
    decode_as!(row, idx, Value, |v| v);
    decode_as!(row, idx, Vec<u8>, |b| hex_value(&b));

    tracing::debug!(
        column = %row.columns()[idx].name(),
        type_name = %row.columns()[idx].type_info(),
        "Unsupported mysql column type, returning null"
    );
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::SqlParams;
    use serde_json::json;

    /// Server from the mysql client environment; live tests return early without `MYSQL_HOST`.
    fn live_params() -> Option<ConnectionParams> {
        let host = std::env::var("MYSQL_HOST").ok()?;
        Some(ConnectionParams::Sql(SqlParams {
            host,
            port: std::env::var("MYSQL_TCP_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3306),
            user: std::env::var("MYSQL_USER").unwrap_or_else(|_| "root".into()),
            password: std::env::var("MYSQL_PWD").unwrap_or_default(),
            dbname: std::env::var("MYSQL_DATABASE").unwrap_or_else(|_| "test".into()),
        }))
    }

    async fn run_sql(params: &ConnectionParams, sql: &str, binds: Value) -> EngineResult<RawResult> {
        let binds: Option<BindParams> = if binds.is_null() {
            None
        } else {
            Some(serde_json::from_value(binds).unwrap())
        };
        MySqlAdapter::new(Duration::from_secs(5))
            .execute(params, &QueryInput::from(sql), binds.as_ref(), &ExecuteOptions::default())
            .await
    }

    #[tokio::test]
    async fn test_binds_against_typed_columns() {
        let Some(params) = live_params() else { return };
        let table = format!("bind_types_{}", uuid::Uuid::new_v4().simple());

        run_sql(
            &params,
            &format!("CREATE TABLE {table} (id INT, born DATE, amount DECIMAL(10, 2), name VARCHAR(40))"),
            Value::Null,
        )
        .await
        .unwrap();

        let insert = format!("INSERT INTO {table} VALUES (?, ?, ?, ?)");
        assert_eq!(
            run_sql(&params, &insert, json!([1, "2020-01-31", 12.5, "ada"])).await.unwrap(),
            RawResult::Affected(1)
        );
        let insert = format!("INSERT INTO {table} VALUES (:id, :born, :amount, :name)");
        assert_eq!(
            run_sql(&params, &insert, json!({"id": 2, "born": null, "amount": "3", "name": "bob"}))
                .await
                .unwrap(),
            RawResult::Affected(1)
        );

        let update = format!("UPDATE {table} SET name = :name WHERE id = :id OR name = :name");
        assert_eq!(
            run_sql(&params, &update, json!({"name": "grace", "id": 2})).await.unwrap(),
            RawResult::Affected(1)
        );

        let select = format!("SELECT name, born FROM {table} WHERE id = ?");
        let RawResult::Rows(rows) = run_sql(&params, &select, json!([1])).await.unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("ada"));
        assert_eq!(rows[0]["born"], json!("2020-01-31"));

        run_sql(&params, &format!("DROP TABLE {table}"), Value::Null).await.unwrap();
    }
}
