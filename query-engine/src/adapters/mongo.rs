//! MongoDB adapter. Find only.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::Client;
use serde_json::{Map, Value};

use common::models::{BindParams, ConnectionParams, EngineKind, MongoParams, QueryInput};

use super::{mongo_params, EngineAdapter, ExecuteOptions, RawResult};
use crate::error::{EngineError, EngineResult};
use crate::normalizer::{self, EMPTY_FILTER_NOTE, MAX_DOCUMENTS};

pub struct MongoAdapter {
    connect_timeout: Duration,
}

impl MongoAdapter {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn client(&self, params: &MongoParams) -> EngineResult<Client> {
        let mut options = ClientOptions::parse(&params.uri)
            .await
            .map_err(EngineError::connection_failed)?;
        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);
        Client::with_options(options).map_err(EngineError::connection_failed)
    }

    async fn find(
        client: &Client,
        params: &MongoParams,
        collection: &str,
        (filter, options): (Document, FindOptions),
    ) -> EngineResult<Vec<Document>> {
        let cursor = client
            .database(&params.dbname)
            .collection::<Document>(collection)
            .find(filter)
            .with_options(options)
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }
}

/// Parses the query into a filter object. `None` means the filter is empty.
fn parse_filter(query: &QueryInput) -> EngineResult<Option<Map<String, Value>>> {
    let filter = match query {
        QueryInput::Document(map) => map.clone(),
        QueryInput::Text(text) if text.trim().is_empty() => return Ok(None),
        QueryInput::Text(text) => match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => map,
            _ => return Err(EngineError::invalid_query("MongoDB filter must be a JSON object")),
        },
    };
    Ok(Some(filter).filter(|f| !f.is_empty()))
}

/// The filter and options sent to `find`, capped at [`MAX_DOCUMENTS`].
/// `None` means the filter is empty and nothing should run.
fn find_request(query: &QueryInput) -> EngineResult<Option<(Document, FindOptions)>> {
    let Some(filter) = parse_filter(query)? else {
        return Ok(None);
    };
    let mut options = FindOptions::default();
    options.limit = Some(MAX_DOCUMENTS);
    Ok(Some((normalizer::coerce_filter(&filter), options)))
}

#[async_trait]
impl EngineAdapter for MongoAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Mongo
    }

    async fn execute(
        &self,
        params: &ConnectionParams,
        query: &QueryInput,
        _binds: Option<&BindParams>,
        options: &ExecuteOptions,
    ) -> EngineResult<RawResult> {
        let params = mongo_params(params)?;
        let collection = options
            .collection
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| EngineError::invalid_query("MongoDB query requires a 'collection' to be specified."))?;

        let Some(request) = find_request(query)? else {
            tracing::warn!(collection = %collection, "Refusing MongoDB find with an empty filter");
            return Ok(RawResult::Refused {
                note: EMPTY_FILTER_NOTE.to_string(),
            });
        };
        let client = self.client(params).await?;
        let result = Self::find(&client, params, collection, request).await;
        client.shutdown().await;

        let documents = result?;
        Ok(RawResult::Rows(documents.into_iter().map(normalizer::document_to_row).collect()))
    }

    async fn list_collections(&self, params: &ConnectionParams) -> EngineResult<Vec<String>> {
        let params = mongo_params(params)?;
        let client = self.client(params).await?;
        let result = client.database(&params.dbname).list_collection_names().await;
        client.shutdown().await;

        let mut names = result?;
        names.sort();
        Ok(names)
    }
}
