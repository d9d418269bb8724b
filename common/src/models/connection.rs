//! Connection registry models.
//!
//! A [`ConnectionEntry`] binds an alias to exactly one parameter shape. The
//! engine kind decides the shape, both when an entry is built and when it is
//! read back from storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::AppError;

/// Supported database engine families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// PostgreSQL.
    Postgres,
    /// MySQL.
    Mysql,
    /// Oracle Database.
    Oracle,
    /// MongoDB document store.
    Mongo,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Postgres,
        EngineKind::Mysql,
        EngineKind::Oracle,
        EngineKind::Mongo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "mysql",
            EngineKind::Oracle => "oracle",
            EngineKind::Mongo => "mongo",
        }
    }

    pub fn is_document_store(&self) -> bool {
        matches!(self, EngineKind::Mongo)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EngineKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::UnsupportedDatabaseType(s.to_string()))
    }
}

/// Parameters for the PostgreSQL and MySQL engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(alias = "database")]
    pub dbname: String,
}

/// Parameters for the Oracle engine. `dsn` is `host:port/service`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OracleParams {
    pub user: String,
    pub password: String,
    pub dsn: String,
}

/// Parameters for the MongoDB engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MongoParams {
    pub uri: String,
    pub dbname: String,
}

/// Engine-specific connection parameters, one shape per engine family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConnectionParams {
    Sql(SqlParams),
    Oracle(OracleParams),
    Mongo(MongoParams),
}

impl ConnectionParams {
    /// Whether this shape is the one `kind` expects.
    pub fn fits(&self, kind: EngineKind) -> bool {
        matches!(
            (self, kind),
            (ConnectionParams::Sql(_), EngineKind::Postgres | EngineKind::Mysql)
                | (ConnectionParams::Oracle(_), EngineKind::Oracle)
                | (ConnectionParams::Mongo(_), EngineKind::Mongo)
        )
    }

    /// Decodes stored JSON using the shape dictated by `kind`.
    pub fn from_json(kind: EngineKind, json: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EngineKind::Postgres | EngineKind::Mysql => {
                ConnectionParams::Sql(serde_json::from_str(json)?)
            }
            EngineKind::Oracle => ConnectionParams::Oracle(serde_json::from_str(json)?),
            EngineKind::Mongo => ConnectionParams::Mongo(serde_json::from_str(json)?),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One configured database connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub alias: String,
    pub engine_kind: EngineKind,
    pub parameters: ConnectionParams,
}

impl ConnectionEntry {
    /// Pairs an alias with parameters, rejecting a shape that does not fit the kind.
    pub fn new(
        alias: impl Into<String>,
        engine_kind: EngineKind,
        parameters: ConnectionParams,
    ) -> Result<Self, AppError> {
        if !parameters.fits(engine_kind) {
            return Err(AppError::Validation(format!(
                "Connection parameters do not match database type '{}'",
                engine_kind
            )));
        }
        Ok(Self {
            alias: alias.into(),
            engine_kind,
            parameters,
        })
    }
}

/// Alias listing item. `type` is kept as stored so unknown kinds still list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AliasSummary {
    pub alias: String,
    #[serde(rename = "type")]
    pub engine_kind: String,
}

/// Caller-supplied connection fields, before per-engine validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ConnectionFields {
    /// Database host (SQL engines).
    pub host: Option<String>,
    /// Database port (SQL engines).
    pub port: Option<u16>,
    /// Database user (SQL engines).
    pub user: Option<String>,
    /// Database password (SQL engines).
    pub password: Option<String>,
    /// Database name, or service name for Oracle.
    pub dbname: Option<String>,
    /// MongoDB connection URI.
    pub uri: Option<String>,
}

/// Arguments of the `add_database` tool.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddDatabaseRequest {
    /// Unique alias; an existing entry with the same alias is replaced.
    #[validate(length(min = 1, max = 128, message = "alias must be 1-128 characters"))]
    pub alias: String,
    /// One of postgres, mysql, oracle, mongo.
    #[serde(rename = "type", alias = "db_type")]
    pub db_type: String,
    #[serde(flatten)]
    pub fields: ConnectionFields,
}

/// Arguments of the `remove_database` tool.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RemoveDatabaseRequest {
    #[validate(length(min = 1, message = "alias is required"))]
    pub alias: String,
}

/// Arguments of the `list_collections` tool.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ListCollectionsRequest {
    #[validate(length(min = 1, message = "database_alias is required"))]
    pub database_alias: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql() -> ConnectionParams {
        ConnectionParams::Sql(SqlParams {
            host: "db".into(),
            port: 5432,
            user: "app".into(),
            password: "secret".into(),
            dbname: "orders".into(),
        })
    }

    #[test]
    fn test_engine_kind_parses_wire_names() {
        assert_eq!("mongo".parse::<EngineKind>().unwrap(), EngineKind::Mongo);
        assert_eq!("oracle".parse::<EngineKind>().unwrap(), EngineKind::Oracle);
        assert!(matches!(
            "redis".parse::<EngineKind>(),
            Err(AppError::UnsupportedDatabaseType(t)) if t == "redis"
        ));
    }

    #[test]
    fn test_stored_json_decodes_by_kind() {
        let json = sql().to_json().unwrap();
        let decoded = ConnectionParams::from_json(EngineKind::Mysql, &json).unwrap();
        assert_eq!(decoded, sql());
        // A SQL bag is not an Oracle bag.
        assert!(ConnectionParams::from_json(EngineKind::Oracle, &json).is_err());
    }

    #[test]
    fn test_legacy_database_key_is_accepted() {
        let json = r#"{"host":"h","port":3306,"user":"u","password":"p","database":"d"}"#;
        match ConnectionParams::from_json(EngineKind::Mysql, json).unwrap() {
            ConnectionParams::Sql(p) => assert_eq!(p.dbname, "d"),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_entry_rejects_mismatched_shape() {
        assert!(ConnectionEntry::new("a", EngineKind::Postgres, sql()).is_ok());
        assert!(ConnectionEntry::new("a", EngineKind::Mongo, sql()).is_err());
    }

    #[test]
    fn test_add_request_accepts_flat_tool_arguments() {
        let req: AddDatabaseRequest = serde_json::from_value(serde_json::json!({
            "alias": "crm",
            "type": "mongo",
            "uri": "mongodb://localhost:27017",
            "dbname": "crm"
        }))
        .unwrap();
        assert_eq!(req.db_type, "mongo");
        assert_eq!(req.fields.uri.as_deref(), Some("mongodb://localhost:27017"));
        assert!(req.fields.host.is_none());
    }
}
