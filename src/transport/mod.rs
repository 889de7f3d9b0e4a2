//! Query transport: the HTTP seam between the client and the backend.
//!
//! [`QueryTransport`] is the trait the pagination engine and client surface
//! are written against; [`HttpTransport`] is the reqwest implementation
//! speaking the Loki HTTP v1 API.

pub mod wire;

use crate::config::LokiConfig;
use crate::error::{Error, QueryError, Result};
use crate::model::QueryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wire::{format_nanos, QueryEnvelope, ValuesEnvelope};

#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Evaluate `expr` at a single instant.
    async fn query_instant(
        &self,
        expr: &str,
        time: DateTime<Utc>,
        limit: u32,
    ) -> Result<QueryResult>;

    /// Evaluate `expr` over `[start, end]`, entries in ascending timestamp
    /// order, at most `limit` entries. Single-shot: no paging here.
    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<QueryResult>;

    /// List label names known in the range.
    async fn labels(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<String>>;

    /// List values of one label in the range.
    async fn label_values(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>>;
}

/// HTTP implementation of [`QueryTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &LokiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_query(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<QueryResult> {
        let envelope: QueryEnvelope = self.get_json(path, params).await?;
        envelope.into_result()
    }

    async fn get_values(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<String>> {
        let envelope: ValuesEnvelope = self.get_json(path, params).await?;
        if envelope.status != "success" {
            return Err(Error::MalformedResponse(format!(
                "unexpected response status '{}'",
                envelope.status
            )));
        }
        Ok(envelope.data)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "issuing query");

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), %message, "backend rejected query");
            return Err(Error::Query(QueryError::Backend(extract_message(&message))));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Loki reports errors either as plain text or as a JSON object with a
/// `message` field, depending on the endpoint and version.
fn extract_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn query_instant(
        &self,
        expr: &str,
        time: DateTime<Utc>,
        limit: u32,
    ) -> Result<QueryResult> {
        self.get_query(
            "/loki/api/v1/query",
            &[
                ("query", expr.to_string()),
                ("time", format_nanos(time)),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<QueryResult> {
        self.get_query(
            "/loki/api/v1/query_range",
            &[
                ("query", expr.to_string()),
                ("start", format_nanos(start)),
                ("end", format_nanos(end)),
                ("limit", limit.to_string()),
                ("direction", "forward".to_string()),
            ],
        )
        .await
    }

    async fn labels(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<String>> {
        self.get_values(
            "/loki/api/v1/labels",
            &[("start", format_nanos(start)), ("end", format_nanos(end))],
        )
        .await
    }

    async fn label_values(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.get_values(
            &format!("/loki/api/v1/label/{}/values", name),
            &[("start", format_nanos(start)), ("end", format_nanos(end))],
        )
        .await
    }
}
