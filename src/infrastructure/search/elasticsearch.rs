//! Elasticsearch REST client for the message index.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::SearchError;
use crate::application::pipeline::{MessageDocument, SearchIndexer};
use crate::config::SearchSettings;
use crate::domain::Message;
use crate::shared::error::AppError;

/// Hits returned by one search request
const SEARCH_RESULT_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: MessageDocument,
}

#[derive(Debug, Clone)]
pub struct ElasticsearchIndex {
    client: Client,
    base_url: String,
    index: String,
    credentials: Option<(String, Option<String>)>,
}

impl ElasticsearchIndex {
    pub fn new(settings: &SearchSettings) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            index: settings.index.clone(),
            credentials: settings
                .username
                .clone()
                .map(|user| (user, settings.password.clone())),
        })
    }

    /// Index mapping for message documents.
    pub fn mapping() -> Value {
        json!({
            "mappings": {
                "properties": {
                    "chat_id": { "type": "keyword" },
                    "message_number": { "type": "integer" },
                    "body": { "type": "text", "analyzer": "standard" },
                    "created_at": { "type": "date" }
                }
            }
        })
    }

    /// `filter: chat_id == X`, `must: fuzzy match on body`.
    pub fn search_query(chat_id: i64, query: &str) -> Value {
        json!({
            "size": SEARCH_RESULT_SIZE,
            "query": {
                "bool": {
                    "filter": [
                        { "term": { "chat_id": chat_id.to_string() } }
                    ],
                    "must": [
                        { "match": { "body": { "query": query, "fuzziness": "AUTO" } } }
                    ]
                }
            }
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SearchError> {
        let response = self.authorized(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::Status { status, body })
    }
}

#[async_trait]
impl SearchIndexer for ElasticsearchIndex {
    async fn ensure_index(&self) -> Result<(), AppError> {
        let request = self
            .client
            .put(self.url(&self.index))
            .json(&Self::mapping());

        match self.send(request).await {
            Ok(_) => {
                info!(index = %self.index, "Search index created");
                Ok(())
            }
            Err(SearchError::Status { status: 400, body })
                if body.contains("resource_already_exists_exception") =>
            {
                debug!(index = %self.index, "Search index already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, message), fields(document_id = %message.document_id()))]
    async fn index(&self, message: &Message) -> Result<(), AppError> {
        let path = format!("{}/_doc/{}", self.index, message.document_id());
        let request = self
            .client
            .put(self.url(&path))
            .query(&[("refresh", "true")])
            .json(&MessageDocument::from(message));

        self.send(request).await?;
        Ok(())
    }

    async fn search(&self, chat_id: i64, query: &str) -> Result<Vec<MessageDocument>, AppError> {
        let path = format!("{}/_search", self.index);
        let request = self
            .client
            .post(self.url(&path))
            .json(&Self::search_query(chat_id, query));

        let response: SearchResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(SearchError::from)?;

        Ok(response.hits.hits.into_iter().map(|hit| hit.source).collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.send(self.client.get(self.url("/"))).await?;
        Ok(())
    }
}
