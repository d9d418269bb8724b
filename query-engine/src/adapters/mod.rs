//! Engine adapters.
//!
//! One [`EngineAdapter`] per engine family, looked up by [`EngineKind`] in an
//! [`AdapterRegistry`]. Adapters open a connection per call and release it
//! before returning.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Number, Value};

use common::models::{
    BindParams, ConnectionParams, EngineKind, MongoParams, OracleParams, QueryInput, Row,
    SqlParams,
};

use crate::error::{EngineError, EngineResult};

/// Returns from the enclosing function if column `$idx` decodes as `$ty`.
/// SQL NULL becomes JSON null.
macro_rules! decode_as {
    ($row:expr, $idx:expr, $ty:ty, $map:expr) => {
        if let Ok(value) = $row.try_get::<Option<$ty>, _>($idx) {
            return value.map($map).unwrap_or(serde_json::Value::Null);
        }
    };
}

pub mod mongo;
pub mod mysql;
pub mod oracle;
pub mod postgres;

pub use mongo::MongoAdapter;
pub use mysql::MySqlAdapter;
pub use oracle::OracleAdapter;
pub use postgres::PostgresAdapter;

/// What an engine handed back, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// The statement produced a result set.
    Rows(Vec<Row>),
    /// The statement changed data; rows affected.
    Affected(u64),
    /// The query was not run.
    Refused { note: String },
}

/// Per-call options that only some engines read.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub collection: Option<String>,
    pub schema_override: Option<String>,
}

#[async_trait]
pub trait EngineAdapter: Send + Sync {
    fn kind(&self) -> EngineKind;

    async fn execute(
        &self,
        params: &ConnectionParams,
        query: &QueryInput,
        binds: Option<&BindParams>,
        options: &ExecuteOptions,
    ) -> EngineResult<RawResult>;

    async fn list_collections(&self, _params: &ConnectionParams) -> EngineResult<Vec<String>> {
        Err(EngineError::not_supported(format!(
            "Listing collections is not supported for {}",
            self.kind()
        )))
    }
}

/// Adapter lookup table keyed by engine kind.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<EngineKind, Arc<dyn EngineAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in adapters.
    pub fn with_defaults(connect_timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PostgresAdapter::new(connect_timeout)));
        registry.register(Arc::new(MySqlAdapter::new(connect_timeout)));
        registry.register(Arc::new(OracleAdapter::new()));
        registry.register(Arc::new(MongoAdapter::new(connect_timeout)));
        registry
    }

    /// Registers an adapter under its own kind, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn EngineAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: EngineKind) -> Option<Arc<dyn EngineAdapter>> {
        self.adapters.get(&kind).cloned()
    }
}

pub(crate) fn sql_params(params: &ConnectionParams) -> EngineResult<&SqlParams> {
    match params {
        ConnectionParams::Sql(p) => Ok(p),
        _ => Err(EngineError::connection_failed("expected host/port/user/password/dbname parameters")),
    }
}

pub(crate) fn oracle_params(params: &ConnectionParams) -> EngineResult<&OracleParams> {
    match params {
        ConnectionParams::Oracle(p) => Ok(p),
        _ => Err(EngineError::connection_failed("expected user/password/dsn parameters")),
    }
}

pub(crate) fn mongo_params(params: &ConnectionParams) -> EngineResult<&MongoParams> {
    match params {
        ConnectionParams::Mongo(p) => Ok(p),
        _ => Err(EngineError::connection_failed("expected uri/dbname parameters")),
    }
}

/// SQL engines only take query text.
pub(crate) fn sql_text(query: &QueryInput) -> EngineResult<&str> {
    query
        .as_text()
        .ok_or_else(|| EngineError::invalid_query("SQL query must be a string"))
}

pub(crate) fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

pub(crate) fn hex_value(bytes: &[u8]) -> Value {
    Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Bounds a connect future by `timeout`.
pub(crate) async fn connect_within<T, E, F>(timeout: Duration, connect: F) -> EngineResult<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(EngineError::connection_failed(e)),
        Err(_) => Err(EngineError::ConnectTimeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_registry_covers_every_kind() {
        let registry = AdapterRegistry::with_defaults(Duration::from_secs(1));
        for kind in EngineKind::ALL {
            let adapter = registry.get(kind).expect("adapter registered");
            assert_eq!(adapter.kind(), kind);
        }
    }

    #[test]
    fn test_empty_registry_has_no_adapters() {
        let registry = AdapterRegistry::new();
        assert!(registry.get(EngineKind::Postgres).is_none());
    }

    #[test]
    fn test_value_helpers() {
        assert_eq!(hex_value(&[0x00, 0xab, 0x10]), json!("00ab10"));
        assert_eq!(float_value(1.5), json!(1.5));
        assert_eq!(float_value(f64::NAN), Value::Null);
    }

    #[test]
    fn test_sql_text_rejects_documents() {
        assert_eq!(sql_text(&QueryInput::from("SELECT 1")).unwrap(), "SELECT 1");
        let doc = QueryInput::Document(serde_json::Map::new());
        assert!(matches!(sql_text(&doc), Err(EngineError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_connect_within_times_out() {
        let pending = std::future::pending::<Result<(), String>>();
        let err = connect_within(Duration::from_millis(10), pending).await.unwrap_err();
        assert!(matches!(err, EngineError::ConnectTimeout(_)));

        let failed = async { Err::<(), _>("refused") };
        let err = connect_within(Duration::from_secs(1), failed).await.unwrap_err();
        assert_eq!(err.to_string(), "Connection failed: refused");
    }
}
