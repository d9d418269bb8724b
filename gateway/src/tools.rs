//! Tool catalogue and invocation.
//!
//! The same five tools back the HTTP surface and the CLI subcommands.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::{
    AddDatabaseRequest, AliasSummary, ListCollectionsRequest, QueryRequest, QueryResult,
    RemoveDatabaseRequest,
};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    ListAliases,
    AddDatabase,
    RemoveDatabase,
    ListCollections,
    ExecuteQuery,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::ListAliases,
        Tool::AddDatabase,
        Tool::RemoveDatabase,
        Tool::ListCollections,
        Tool::ExecuteQuery,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::ListAliases => "list_aliases",
            Tool::AddDatabase => "add_database",
            Tool::RemoveDatabase => "remove_database",
            Tool::ListCollections => "list_collections",
            Tool::ExecuteQuery => "execute_query",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::ListAliases => "Lists all configured database aliases and their types.",
            Tool::AddDatabase => {
                "Adds or replaces a database connection. postgres, mysql and oracle require \
                 host, port, user, password and dbname; mongo requires uri and dbname."
            }
            Tool::RemoveDatabase => "Removes a database connection from the configuration.",
            Tool::ListCollections => "Lists the collections of a configured MongoDB database.",
            Tool::ExecuteQuery => {
                "Executes a query on a configured database and returns {data, row_count}. \
                 MongoDB queries take a JSON filter and a collection."
            }
        }
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| AppError::NotFound(format!("Unknown tool: '{}'", s)))
    }
}

/// Catalogue entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AliasList {
    pub aliases: Vec<AliasSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusMessage {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CollectionList {
    pub collections: Vec<String>,
}

/// Result of any tool.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ToolOutput {
    Aliases(AliasList),
    Status(StatusMessage),
    Collections(CollectionList),
    Query(QueryResult),
}

pub async fn list_aliases(state: &AppState) -> AppResult<AliasList> {
    Ok(AliasList {
        aliases: state.connections.list().await?,
    })
}

pub async fn add_database(state: &AppState, req: AddDatabaseRequest) -> AppResult<StatusMessage> {
    let entry = state.connections.add(req).await?;
    Ok(StatusMessage {
        status: format!("Database '{}' added successfully.", entry.alias),
    })
}

pub async fn remove_database(state: &AppState, req: RemoveDatabaseRequest) -> AppResult<StatusMessage> {
    req.validate()?;
    state.connections.remove(&req.alias).await?;
    Ok(StatusMessage {
        status: format!("Database '{}' removed successfully.", req.alias),
    })
}

pub async fn list_collections(state: &AppState, req: ListCollectionsRequest) -> AppResult<CollectionList> {
    req.validate()?;
    Ok(CollectionList {
        collections: state.dispatcher.list_collections(&req.database_alias).await?,
    })
}

pub async fn execute_query(state: &AppState, req: QueryRequest) -> AppResult<QueryResult> {
    req.validate()?;
    state.dispatcher.execute_query(&req).await
}

/// Runs `tool` with JSON arguments.
pub async fn invoke(state: &AppState, tool: Tool, args: Value) -> AppResult<ToolOutput> {
    let output = match tool {
        Tool::ListAliases => ToolOutput::Aliases(list_aliases(state).await?),
        Tool::AddDatabase => ToolOutput::Status(add_database(state, arguments(tool, args)?).await?),
        Tool::RemoveDatabase => ToolOutput::Status(remove_database(state, arguments(tool, args)?).await?),
        Tool::ListCollections => {
            ToolOutput::Collections(list_collections(state, arguments(tool, args)?).await?)
        }
        Tool::ExecuteQuery => ToolOutput::Query(execute_query(state, arguments(tool, args)?).await?),
    };
    Ok(output)
}

fn arguments<T: DeserializeOwned>(tool: Tool, args: Value) -> AppResult<T> {
    serde_json::from_value(args)
        .map_err(|e| AppError::Validation(format!("Invalid arguments for {}: {}", tool, e)))
}
