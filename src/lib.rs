//! Async client for Loki-style log aggregation backends.
//!
//! The backend caps every query at a configured number of entries, so
//! retrieving a large time range means paging through it window by window.
//! This crate's pagination engine ([`paginate::StreamPager`]) does that
//! without losing or duplicating entries, and [`Loki`] exposes it both as
//! fully materialized results ([`Loki::get_range_streams`]) and as a lazy
//! iterator with an optional line cut-off ([`Loki::iterate_streams`]).

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod paginate;
pub mod transport;

pub use client::{Loki, QueryRange};
pub use config::LokiConfig;
pub use error::{Error, QueryError, Result};
pub use model::{Entry, Labels, LogStream, MatrixSeries, QueryResult, VectorSample};
pub use paginate::iter::StreamIter;
pub use paginate::{Batch, StreamPager};
pub use transport::{HttpTransport, QueryTransport};
