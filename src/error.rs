use thiserror::Error;

/// A query the backend (or a local precondition check) rejected.
///
/// Everything here means "your query was bad", as opposed to [`Error::Http`]
/// and [`Error::Decode`], which mean the backend was unreachable or returned
/// something unintelligible.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Range validation failure for label/metadata lookups.
    #[error("invalid query, through < from")]
    ThroughBeforeFrom,

    /// Range validation failure for log/metric range queries.
    #[error("end timestamp must not be before or equal to start time")]
    EndBeforeStart,

    /// The expression produced a different result type than the caller
    /// asked for, e.g. an aggregation where streams were expected.
    #[error("unexpected result type: expected {expected}, got {got}")]
    UnexpectedResultType {
        expected: &'static str,
        got: String,
    },

    /// Error reported by the backend, passed through verbatim. Covers
    /// malformed expressions and server-side execution failures.
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("query rejected: {0}")]
    Query(#[from] QueryError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl Error {
    /// True when the backend rejected the query itself, false for
    /// transport-level faults.
    pub fn is_query_error(&self) -> bool {
        matches!(self, Error::Query(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
