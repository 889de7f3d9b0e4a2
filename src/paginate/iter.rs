//! Lazy, pull-based delivery of paginated streams.

use super::StreamPager;
use crate::error::Result;
use crate::model::LogStream;
use crate::transport::QueryTransport;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::VecDeque;

/// Pull-based iterator over the streams of one pagination session.
///
/// Backend batches are fetched on demand, one at a time, and handed out as
/// [`LogStream`]s; nothing beyond the current batch is buffered. With a
/// `lines_limit`, no further batches are requested once the delivered entry
/// total reaches the limit, so the overshoot is bounded by one batch.
///
/// Each iterator is one session: it starts at the beginning of the range
/// and is not restartable.
pub struct StreamIter<'a> {
    pager: StreamPager<'a>,
    buffered: VecDeque<LogStream>,
    delivered: u64,
    lines_limit: Option<u64>,
}

impl<'a> StreamIter<'a> {
    pub fn new(
        transport: &'a dyn QueryTransport,
        selector: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
        lines_limit: Option<u64>,
    ) -> Result<Self> {
        Ok(Self {
            pager: StreamPager::new(transport, selector, start, end, limit)?,
            buffered: VecDeque::new(),
            delivered: 0,
            lines_limit,
        })
    }

    /// Next stream, or `Ok(None)` when the range is exhausted or the line
    /// limit has been reached.
    pub async fn next(&mut self) -> Result<Option<LogStream>> {
        if let Some(stream) = self.buffered.pop_front() {
            return Ok(Some(stream));
        }

        if let Some(limit) = self.lines_limit {
            if self.delivered >= limit {
                return Ok(None);
            }
        }

        match self.pager.next_batch().await? {
            None => Ok(None),
            Some(batch) => {
                self.delivered += batch.rows as u64;
                self.buffered = batch
                    .streams
                    .into_iter()
                    .map(|(labels, entries)| LogStream { labels, entries })
                    .collect();
                Ok(self.buffered.pop_front())
            }
        }
    }

    /// Total entries handed out so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Adapt into a [`futures::Stream`] of streams.
    pub fn into_stream(self) -> impl Stream<Item = Result<LogStream>> + 'a {
        futures::stream::unfold(self, |mut iter| async move {
            match iter.next().await {
                Ok(Some(stream)) => Some((Ok(stream), iter)),
                Ok(None) => None,
                Err(e) => Some((Err(e), iter)),
            }
        })
    }
}
