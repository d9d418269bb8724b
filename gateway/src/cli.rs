//! Command-line surface.
//!
//! Each subcommand other than `run` calls the matching tool once and renders
//! its output as text.

use clap::{Args, Parser, Subcommand};

use common::errors::{AppError, AppResult};
use common::models::{
    AddDatabaseRequest, BindParams, ConnectionFields, ListCollectionsRequest, QueryInput,
    QueryRequest, RemoveDatabaseRequest,
};

use crate::state::AppState;
use crate::tools;

#[derive(Debug, Parser)]
#[command(
    name = "db-gateway",
    version,
    about = "Query PostgreSQL, MySQL, Oracle and MongoDB databases by alias"
)]
pub struct Cli {
    /// Connection registry location (sqlx SQLite URL)
    #[arg(long, global = true, env = "REGISTRY_URL")]
    pub registry_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The subcommand to run; `run` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run(ServeArgs::default()))
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the tool server
    Run(ServeArgs),
    /// List all configured database aliases
    ListAliases,
    /// Add a database connection, replacing any with the same alias
    AddDb(AddDbArgs),
    /// Remove a database connection
    RemoveDb {
        /// Alias of the connection to remove
        #[arg(long)]
        alias: String,
    },
    /// Execute a query on a configured database
    ExecuteQuery(ExecuteQueryArgs),
    /// List the collections of a MongoDB alias
    ListCollections {
        /// Alias of a mongo connection
        #[arg(long, alias = "database_alias")]
        database_alias: String,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Bind host (overrides SERVER_HOST)
    #[arg(long)]
    pub host: Option<String>,
    /// Bind port (overrides SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
pub struct AddDbArgs {
    /// Unique alias for the connection
    #[arg(long)]
    pub alias: String,
    /// Database type
    #[arg(long = "type", value_parser = ["postgres", "mysql", "oracle", "mongo"])]
    pub db_type: String,
    /// Host (not for mongo)
    #[arg(long)]
    pub host: Option<String>,
    /// Port (not for mongo)
    #[arg(long)]
    pub port: Option<u16>,
    /// User (not for mongo)
    #[arg(long)]
    pub user: Option<String>,
    /// Password (not for mongo)
    #[arg(long)]
    pub password: Option<String>,
    /// Database name, or Oracle service name
    #[arg(long)]
    pub dbname: Option<String>,
    /// MongoDB connection URI
    #[arg(long)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ExecuteQueryArgs {
    /// Alias of the database to query
    #[arg(long, alias = "database_alias")]
    pub database_alias: String,
    /// SQL text, or a JSON filter for mongo
    #[arg(long)]
    pub query: String,
    /// Bind parameters as JSON (array for positional, object for named)
    #[arg(long)]
    pub params: Option<String>,
    /// Collection to search (mongo only)
    #[arg(long)]
    pub collection: Option<String>,
    /// Schema to switch to before running the query (oracle only)
    #[arg(long, alias = "oracle_schema")]
    pub oracle_schema: Option<String>,
}

impl From<AddDbArgs> for AddDatabaseRequest {
    fn from(args: AddDbArgs) -> Self {
        AddDatabaseRequest {
            alias: args.alias,
            db_type: args.db_type,
            fields: ConnectionFields {
                host: args.host,
                port: args.port,
                user: args.user,
                password: args.password,
                dbname: args.dbname,
                uri: args.uri,
            },
        }
    }
}

impl ExecuteQueryArgs {
    fn into_request(self) -> AppResult<QueryRequest> {
        let params = self
            .params
            .as_deref()
            .map(serde_json::from_str::<BindParams>)
            .transpose()
            .map_err(|e| AppError::Validation(format!("Invalid --params JSON: {}", e)))?;

        Ok(QueryRequest {
            database_alias: self.database_alias,
            query: QueryInput::Text(self.query),
            params,
            collection: self.collection,
            oracle_schema: self.oracle_schema,
        })
    }
}

/// Runs a one-shot subcommand and returns the text to print.
pub async fn execute(state: &AppState, command: Command) -> AppResult<String> {
    match command {
        Command::Run(_) => Err(AppError::Config("`run` is not a one-shot command".to_string())),
        Command::ListAliases => {
            let list = tools::list_aliases(state).await?;
            if list.aliases.is_empty() {
                return Ok("No database aliases configured.".to_string());
            }
            let mut out = String::from("Configured database aliases:");
            for item in &list.aliases {
                out.push_str(&format!("\n  - Alias: {}, Type: {}", item.alias, item.engine_kind));
            }
            Ok(out)
        }
        Command::AddDb(args) => {
            let added = tools::add_database(state, args.into()).await?;
            Ok(added.status)
        }
        Command::RemoveDb { alias } => {
            let removed = tools::remove_database(state, RemoveDatabaseRequest { alias }).await?;
            Ok(removed.status)
        }
        Command::ExecuteQuery(args) => {
            let result = tools::execute_query(state, args.into_request()?).await?;
            serde_json::to_string_pretty(&result)
                .map_err(|e| AppError::Execution(format!("Failed to render result: {}", e)))
        }
        Command::ListCollections { database_alias } => {
            let list = tools::list_collections(
                state,
                ListCollectionsRequest {
                    database_alias: database_alias.clone(),
                },
            )
            .await?;
            if list.collections.is_empty() {
                return Ok(format!("No collections found in '{}'.", database_alias));
            }
            let mut out = format!("Collections in '{}':", database_alias);
            for name in &list.collections {
                out.push_str(&format!("\n  - {}", name));
            }
            Ok(out)
        }
    }
}
