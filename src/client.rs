use crate::config::LokiConfig;
use crate::error::{QueryError, Result};
use crate::model::{Entry, Labels, LogStream, MatrixSeries, QueryResult, VectorSample};
use crate::paginate::iter::StreamIter;
use crate::paginate::StreamPager;
use crate::transport::{HttpTransport, QueryTransport};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// When a unified [`Loki::query`] should be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRange {
    /// Evaluate at a single instant.
    Instant(DateTime<Utc>),
    /// Evaluate over `[start, end)`.
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Client for a Loki-style log aggregation backend.
///
/// The configured `limit` bounds how many entries the backend returns per
/// call; range operations that can exceed it page through the range and
/// deduplicate window boundaries internally.
///
/// Operations are independent: the client holds no per-query state, so one
/// instance can serve concurrent queries.
pub struct Loki {
    transport: Box<dyn QueryTransport>,
    limit: u32,
}

impl Loki {
    /// Connect over HTTP.
    pub fn connect(config: &LokiConfig) -> Result<Self> {
        Ok(Self {
            transport: Box::new(HttpTransport::new(config)?),
            limit: config.limit,
        })
    }

    /// Build a client on top of any transport. Intended for alternate
    /// transports and for tests running against an in-memory backend.
    pub fn with_transport(transport: Box<dyn QueryTransport>, limit: u32) -> Self {
        Self { transport, limit }
    }

    /// Label names known in the range.
    pub async fn get_labels(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        check_metadata_range(start, end)?;
        self.transport.labels(start, end).await
    }

    /// Values of one label in the range.
    pub async fn get_label_values(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        check_metadata_range(start, end)?;
        self.transport.label_values(name, start, end).await
    }

    /// Streams matching a log selector at a single instant.
    pub async fn get_instant_streams(
        &self,
        expr: &str,
        time: DateTime<Utc>,
    ) -> Result<Vec<LogStream>> {
        self.transport
            .query_instant(expr, time, self.limit)
            .await?
            .into_streams()
    }

    /// Samples of an aggregating expression at a single instant.
    pub async fn get_instant_vector(
        &self,
        expr: &str,
        time: DateTime<Utc>,
    ) -> Result<Vec<VectorSample>> {
        self.transport
            .query_instant(expr, time, self.limit)
            .await?
            .into_vector()
    }

    /// All streams matching a log selector over the range, fully
    /// materialized. Pages through the backend limit, so the range may be
    /// arbitrarily large; entries per stream come back in ascending
    /// timestamp order without gaps or duplicates.
    pub async fn get_range_streams(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogStream>> {
        let mut pager =
            StreamPager::new(self.transport.as_ref(), expr, start, end, self.limit)?;

        let mut merged: BTreeMap<Labels, Vec<Entry>> = BTreeMap::new();
        while let Some(batch) = pager.next_batch().await? {
            for (labels, entries) in batch.streams {
                merged.entry(labels).or_default().extend(entries);
            }
        }

        Ok(merged
            .into_iter()
            .map(|(labels, entries)| LogStream { labels, entries })
            .collect())
    }

    /// Series of an aggregating expression over the range. Matrix results
    /// are aggregated server-side and are not paged.
    pub async fn get_range_matrix(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MatrixSeries>> {
        check_query_range(start, end)?;
        self.transport
            .query_range(expr, start, end, self.limit)
            .await?
            .into_matrix()
    }

    /// Total number of log lines matching the selector in the range.
    /// Retains nothing; a selector matching no streams yields zero.
    pub async fn get_lines_count(
        &self,
        selector: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let mut pager =
            StreamPager::new(self.transport.as_ref(), selector, start, end, self.limit)?;

        let mut count = 0u64;
        while let Some(batch) = pager.next_batch().await? {
            count += batch.rows as u64;
        }
        Ok(count)
    }

    /// Lazily iterate the streams matching a selector over the range,
    /// fetching backend batches on demand. With `lines_limit`, iteration
    /// stops once at least that many entries have been delivered; the
    /// overshoot is bounded by one batch.
    pub fn iterate_streams(
        &self,
        selector: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        lines_limit: Option<u64>,
    ) -> Result<StreamIter<'_>> {
        StreamIter::new(
            self.transport.as_ref(),
            selector,
            start,
            end,
            self.limit,
            lines_limit,
        )
    }

    /// Evaluate any expression, instant or ranged. The result shape follows
    /// the expression: log selectors yield streams, aggregations yield a
    /// vector (instant) or matrix (range).
    pub async fn query(&self, expr: &str, range: QueryRange) -> Result<QueryResult> {
        match range {
            QueryRange::Instant(time) => {
                self.transport.query_instant(expr, time, self.limit).await
            }
            QueryRange::Range { start, end } => {
                check_query_range(start, end)?;
                self.transport.query_range(expr, start, end, self.limit).await
            }
        }
    }
}

fn check_metadata_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(QueryError::ThroughBeforeFrom.into());
    }
    Ok(())
}

fn check_query_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(QueryError::EndBeforeStart.into());
    }
    Ok(())
}
