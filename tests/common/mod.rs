//! In-memory backend used by the integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loki_client::error::{QueryError, Result};
use loki_client::model::{Entry, Labels, LogStream, MatrixSeries, QueryResult, VectorSample};
use loki_client::transport::QueryTransport;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Install a subscriber so `RUST_LOG` shows pagination decisions during
/// test runs.
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[allow(dead_code)]
pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn entry(secs: i64, line: &str) -> Entry {
    Entry {
        timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
        line: line.to_string(),
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Scripted backend over fixed streams.
///
/// Range queries behave like the real one: entries at `start <= t < end`
/// across all matching streams, globally ordered by timestamp, truncated at
/// `limit`. Selectors are matched on the `job` label by substring, `{}` is
/// rejected as a parse error, and expressions containing `(` are treated as
/// aggregations yielding vector/matrix results.
pub struct MockBackend {
    streams: Vec<(Labels, Vec<Entry>)>,
    range_calls: AtomicUsize,
    instant_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new(streams: Vec<(Labels, Vec<Entry>)>) -> Self {
        Self {
            streams,
            range_calls: AtomicUsize::new(0),
            instant_calls: AtomicUsize::new(0),
        }
    }

    pub fn single_stream(job: &str, entries: Vec<Entry>) -> Self {
        Self::new(vec![(labels(&[("job", job)]), entries)])
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    pub fn instant_calls(&self) -> usize {
        self.instant_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.range_calls() + self.instant_calls()
    }

    fn matches(&self, expr: &str, stream_labels: &Labels) -> bool {
        match stream_labels.get("job") {
            Some(job) => expr.contains(job.as_str()),
            None => false,
        }
    }

    fn select(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Vec<(Labels, Entry)> {
        let mut hits: Vec<(Labels, Entry)> = self
            .streams
            .iter()
            .filter(|(l, _)| self.matches(expr, l))
            .flat_map(|(l, entries)| {
                entries
                    .iter()
                    .filter(|e| e.timestamp >= start && e.timestamp < end)
                    .map(|e| (l.clone(), e.clone()))
            })
            .collect();
        hits.sort_by_key(|(_, e)| e.timestamp);
        hits.truncate(limit as usize);
        hits
    }
}

fn group(hits: Vec<(Labels, Entry)>) -> Vec<LogStream> {
    let mut grouped: std::collections::BTreeMap<Labels, Vec<Entry>> = Default::default();
    for (l, e) in hits {
        grouped.entry(l).or_default().push(e);
    }
    grouped
        .into_iter()
        .map(|(labels, entries)| LogStream { labels, entries })
        .collect()
}

/// Delegating wrapper so tests can hand the client a transport while keeping
/// a handle on the call counters. (A direct impl on `Arc<MockBackend>` would
/// violate the orphan rule, since both `Arc` and the trait are foreign here.)
pub struct SharedBackend(pub std::sync::Arc<MockBackend>);

#[async_trait]
impl QueryTransport for SharedBackend {
    async fn query_instant(
        &self,
        expr: &str,
        time: DateTime<Utc>,
        limit: u32,
    ) -> Result<QueryResult> {
        self.0.query_instant(expr, time, limit).await
    }

    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<QueryResult> {
        self.0.query_range(expr, start, end, limit).await
    }

    async fn labels(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<String>> {
        self.0.labels(start, end).await
    }

    async fn label_values(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.0.label_values(name, start, end).await
    }
}

#[async_trait]
impl QueryTransport for MockBackend {
    async fn query_instant(
        &self,
        expr: &str,
        time: DateTime<Utc>,
        limit: u32,
    ) -> Result<QueryResult> {
        self.instant_calls.fetch_add(1, Ordering::SeqCst);

        if expr == "{}" {
            return Err(QueryError::Backend(
                "parse error: queries require at least one regexp or equality matcher".into(),
            )
            .into());
        }

        if expr.contains('(') {
            return Ok(QueryResult::Vector(vec![VectorSample {
                metric: labels(&[("job", "nginx")]),
                timestamp: time,
                value: 42.0,
            }]));
        }

        let hits = self.select(expr, DateTime::<Utc>::MIN_UTC, time, limit);
        Ok(QueryResult::Streams(group(hits)))
    }

    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<QueryResult> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);

        if expr == "{}" {
            return Err(QueryError::Backend(
                "parse error: queries require at least one regexp or equality matcher".into(),
            )
            .into());
        }

        if expr.contains('(') {
            let matching = self
                .streams
                .iter()
                .filter(|(l, _)| self.matches(expr, l))
                .map(|(l, entries)| MatrixSeries {
                    metric: l.clone(),
                    samples: vec![(start, entries.len() as f64)],
                })
                .collect();
            return Ok(QueryResult::Matrix(matching));
        }

        Ok(QueryResult::Streams(group(self.select(expr, start, end, limit))))
    }

    async fn labels(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(vec!["host".to_string(), "job".to_string()])
    }

    async fn label_values(
        &self,
        name: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        Ok(self
            .streams
            .iter()
            .filter_map(|(l, _)| l.get(name).cloned())
            .collect())
    }
}
