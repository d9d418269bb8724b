//! 连接管理服务模块

use std::sync::Arc;

use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::{AddDatabaseRequest, AliasSummary, ConnectionEntry};

use crate::params;
use crate::store::ConnectionStore;

/// Alias management on top of a [`ConnectionStore`].
#[derive(Clone)]
pub struct ConnectionService {
    store: Arc<dyn ConnectionStore>,
}

impl ConnectionService {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<AliasSummary>> {
        self.store.list_all().await
    }

    /// Validates the request, builds the parameter bag and stores it under
    /// the alias, replacing any previous entry.
    pub async fn add(&self, req: AddDatabaseRequest) -> AppResult<ConnectionEntry> {
        req.validate()?;
        let (kind, parameters) = params::build(&req.db_type, &req.fields)?;
        let entry = ConnectionEntry::new(req.alias, kind, parameters)?;

        self.store.upsert(&entry).await?;
        tracing::info!(alias = %entry.alias, engine = %entry.engine_kind, "Connection saved");
        Ok(entry)
    }

    /// Removes an alias. Unknown aliases are reported as not found.
    pub async fn remove(&self, alias: &str) -> AppResult<()> {
        if !self.store.remove(alias).await? {
            return Err(AppError::NotFound(format!(
                "Database alias '{}' not found.",
                alias
            )));
        }
        tracing::info!(alias = %alias, "Connection removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteConnectionStore;
    use common::models::{ConnectionFields, EngineKind};

    async fn service() -> ConnectionService {
        let store = SqliteConnectionStore::in_memory().await.unwrap();
        ConnectionService::new(Arc::new(store))
    }

    fn mongo_request(alias: &str) -> AddDatabaseRequest {
        AddDatabaseRequest {
            alias: alias.into(),
            db_type: "mongo".into(),
            fields: ConnectionFields {
                uri: Some("mongodb://localhost:27017".into()),
                dbname: Some("crm".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_add_then_list() {
        let svc = service().await;
        let entry = svc.add(mongo_request("crm")).await.unwrap();
        assert_eq!(entry.engine_kind, EngineKind::Mongo);

        let listed = svc.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].alias, "crm");
        assert_eq!(listed[0].engine_kind, "mongo");
    }

    #[tokio::test]
    async fn test_invalid_add_leaves_store_untouched() {
        let svc = service().await;
        let mut req = mongo_request("crm");
        req.fields.dbname = None;
        assert!(matches!(svc.add(req).await, Err(AppError::Validation(_))));

        let mut req = mongo_request("");
        req.fields.dbname = Some("crm".into());
        assert!(matches!(svc.add(req).await, Err(AppError::Validation(_))));

        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_alias_is_not_found() {
        let svc = service().await;
        let err = svc.remove("ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "Database alias 'ghost' not found.");

        svc.add(mongo_request("crm")).await.unwrap();
        svc.remove("crm").await.unwrap();
        assert!(svc.list().await.unwrap().is_empty());
    }
}
