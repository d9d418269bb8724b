//! Shared data models.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    AddDatabaseRequest, AliasSummary, ConnectionEntry, ConnectionFields, ConnectionParams,
    EngineKind, ListCollectionsRequest, MongoParams, OracleParams, RemoveDatabaseRequest,
    SqlParams,
};
pub use query::{BindParams, QueryInput, QueryRequest, QueryResult, Row};
