//! Query dispatcher.
//!
//! Resolves an alias through the connection store, routes the request to the
//! adapter for the stored engine kind, bounds the call by the query timeout
//! and normalizes the outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;

use common::errors::{AppError, AppResult};
use common::models::{ConnectionEntry, QueryRequest, QueryResult};
use registry::ConnectionStore;

use crate::adapters::{AdapterRegistry, EngineAdapter, ExecuteOptions};
use crate::error::EngineError;
use crate::normalizer;

pub struct Dispatcher {
    store: Arc<dyn ConnectionStore>,
    adapters: Arc<AdapterRegistry>,
    query_timeout: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn ConnectionStore>, adapters: Arc<AdapterRegistry>, query_timeout: Duration) -> Self {
        Self {
            store,
            adapters,
            query_timeout,
        }
    }

    #[instrument(skip_all, fields(alias = %request.database_alias))]
    pub async fn execute_query(&self, request: &QueryRequest) -> AppResult<QueryResult> {
        let entry = self.resolve(&request.database_alias).await?;
        let adapter = self.adapter_for(&entry)?;
        let options = ExecuteOptions {
            collection: request.collection.clone(),
            schema_override: request.oracle_schema.clone(),
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.query_timeout,
            adapter.execute(&entry.parameters, &request.query, request.params.as_ref(), &options),
        )
        .await;

        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(execution_failed(&entry, e)),
            Err(_) => return Err(execution_failed(&entry, timed_out(self.query_timeout))),
        };

        let result = normalizer::normalize(raw);
        tracing::info!(
            engine = %entry.engine_kind,
            row_count = result.row_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(result)
    }

    /// Collection names of a document-store alias.
    #[instrument(skip(self))]
    pub async fn list_collections(&self, alias: &str) -> AppResult<Vec<String>> {
        let entry = self.resolve(alias).await?;
        if !entry.engine_kind.is_document_store() {
            return Err(AppError::Validation(format!(
                "Database alias '{}' is a {} database; collections are only available for mongo.",
                alias, entry.engine_kind
            )));
        }
        let adapter = self.adapter_for(&entry)?;

        let names = match tokio::time::timeout(self.query_timeout, adapter.list_collections(&entry.parameters)).await {
            Ok(Ok(names)) => names,
            Ok(Err(e)) => return Err(execution_failed(&entry, e)),
            Err(_) => return Err(execution_failed(&entry, timed_out(self.query_timeout))),
        };
        tracing::info!(count = names.len(), "Collections listed");
        Ok(names)
    }

    async fn resolve(&self, alias: &str) -> AppResult<ConnectionEntry> {
        match self.store.get(alias).await {
            Ok(Some(entry)) => Ok(entry),
            Ok(None) => Err(AppError::NotFound(format!(
                "Database alias '{}' not found in configuration.",
                alias
            ))),
            Err(e @ AppError::UnsupportedDatabaseType(_)) => Err(AppError::Execution(e.to_string())),
            Err(e) => Err(e),
        }
    }

    fn adapter_for(&self, entry: &ConnectionEntry) -> AppResult<Arc<dyn EngineAdapter>> {
        self.adapters.get(entry.engine_kind).ok_or_else(|| {
            AppError::Execution(format!("Unsupported database type: {}", entry.engine_kind))
        })
    }
}

fn timed_out(limit: Duration) -> EngineError {
    EngineError::Execution(format!("query timed out after {}s", limit.as_secs()))
}

fn execution_failed(entry: &ConnectionEntry, err: EngineError) -> AppError {
    tracing::warn!(alias = %entry.alias, engine = %entry.engine_kind, error = %err, "Query failed");
    AppError::Execution(format!("Query execution failed: {}", err))
}
