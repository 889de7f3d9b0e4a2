//! Windowed pagination over a size-limited backend.
//!
//! A single range query returns at most `limit` entries, so large ranges
//! have to be walked in windows. [`StreamPager`] repeatedly narrows the
//! window to start at the last timestamp the previous batch reached, and a
//! per-session boundary set drops the entries re-delivered by that
//! inclusive re-query. Sessions are self-contained: all cursor state lives
//! in the pager.

pub mod iter;

use crate::error::{QueryError, Result};
use crate::model::{Entry, Labels};
use crate::transport::QueryTransport;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Composite identity of one entry, used for boundary deduplication.
/// Timestamps alone are not unique, and identical lines can occur in
/// different streams at the same instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    labels: Labels,
    timestamp: DateTime<Utc>,
    line: String,
}

impl EntryKey {
    fn new(labels: &Labels, entry: &Entry) -> Self {
        Self {
            labels: labels.clone(),
            timestamp: entry.timestamp,
            line: entry.line.clone(),
        }
    }
}

/// The result of one single-shot range query: streams keyed by label set,
/// plus the entry count. An expression matching nothing yields an empty
/// batch, not an error.
#[derive(Debug, Default)]
pub struct Batch {
    pub streams: BTreeMap<Labels, Vec<Entry>>,
    pub rows: usize,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Issue one bounded range query and materialize the streams result.
///
/// Strictly single-shot: no paging, no dedup. Rejects `start >= end`
/// locally before any request goes out.
pub async fn fetch_batch(
    transport: &dyn QueryTransport,
    expr: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: u32,
) -> Result<Batch> {
    if start >= end {
        return Err(QueryError::EndBeforeStart.into());
    }

    let streams = transport
        .query_range(expr, start, end, limit)
        .await?
        .into_streams()?;

    let mut batch = Batch::default();
    for stream in streams {
        batch.rows += stream.entries.len();
        batch
            .streams
            .entry(stream.labels)
            .or_default()
            .extend(stream.entries);
    }
    Ok(batch)
}

/// One pagination session over `[start, end)`.
///
/// Each [`next_batch`](StreamPager::next_batch) call fetches the next
/// window and returns its deduplicated entries; `Ok(None)` means the range
/// is exhausted. Guarantees per-stream ascending timestamp order with no
/// gaps and no duplicates, provided the backend returns entries in
/// ascending order within a batch.
///
/// A batch returning fewer rows than `limit` is taken to mean the range is
/// exhausted; the backend is assumed never to short-return for any other
/// reason. If more than `limit` entries share a single timestamp the window
/// cannot advance past it; the session then ends early with the data
/// retrieved so far rather than refetching the same window forever.
pub struct StreamPager<'a> {
    transport: &'a dyn QueryTransport,
    selector: String,
    window_start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: u32,
    boundary: HashSet<EntryKey>,
    done: bool,
}

impl std::fmt::Debug for StreamPager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPager")
            .field("selector", &self.selector)
            .field("window_start", &self.window_start)
            .field("end", &self.end)
            .field("limit", &self.limit)
            .field("boundary", &self.boundary)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<'a> StreamPager<'a> {
    pub fn new(
        transport: &'a dyn QueryTransport,
        selector: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Self> {
        if start >= end {
            return Err(QueryError::EndBeforeStart.into());
        }

        Ok(Self {
            transport,
            selector: selector.to_string(),
            window_start: start,
            end,
            limit,
            boundary: HashSet::new(),
            done: false,
        })
    }

    /// Fetch the next window. The returned batch's `rows` counts only the
    /// entries actually delivered, after boundary dedup.
    pub async fn next_batch(&mut self) -> Result<Option<Batch>> {
        loop {
            if self.done {
                return Ok(None);
            }

            let fetched = fetch_batch(
                self.transport,
                &self.selector,
                self.window_start,
                self.end,
                self.limit,
            )
            .await?;

            if fetched.is_empty() {
                self.done = true;
                return Ok(None);
            }

            let max_ts = fetched
                .streams
                .values()
                .flatten()
                .map(|e| e.timestamp)
                .max()
                .expect("non-empty batch has a max timestamp");

            // Entries at max_ts may have been truncated mid-timestamp; the
            // next window re-queries from max_ts inclusive and this set
            // suppresses the repeats.
            let next_boundary: HashSet<EntryKey> = fetched
                .streams
                .iter()
                .flat_map(|(labels, entries)| {
                    entries
                        .iter()
                        .filter(|e| e.timestamp == max_ts)
                        .map(|e| EntryKey::new(labels, e))
                })
                .collect();

            let mut delivered = Batch::default();
            for (labels, entries) in fetched.streams {
                let kept: Vec<Entry> = if self.boundary.is_empty() {
                    entries
                } else {
                    entries
                        .into_iter()
                        .filter(|e| !self.boundary.contains(&EntryKey::new(&labels, e)))
                        .collect()
                };
                if !kept.is_empty() {
                    delivered.rows += kept.len();
                    delivered.streams.insert(labels, kept);
                }
            }

            if fetched.rows < self.limit as usize {
                // Short batch: the backend has nothing more in the window.
                self.done = true;
            } else if max_ts > self.window_start {
                tracing::debug!(
                    selector = %self.selector,
                    window_start = %max_ts,
                    rows = delivered.rows,
                    "advancing pagination window"
                );
                self.window_start = max_ts;
                self.boundary = next_boundary;
            } else if delivered.is_empty() {
                // A full batch entirely at the window-start timestamp with
                // nothing new in it: more entries share this timestamp than
                // the limit can return. End the session with what we have
                // instead of refetching the same batch forever.
                tracing::warn!(
                    selector = %self.selector,
                    timestamp = %max_ts,
                    limit = self.limit,
                    "pagination cannot advance past timestamp; ending session early"
                );
                self.done = true;
            } else {
                // The window is pinned at one timestamp but this fetch still
                // surfaced unseen siblings; remember them and refetch.
                self.boundary.extend(next_boundary);
            }

            if delivered.is_empty() {
                continue;
            }

            return Ok(Some(delivered));
        }
    }
}
