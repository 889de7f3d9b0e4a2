use crate::error::{QueryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label name to value mapping identifying a stream or series.
///
/// Ordered so equal label sets compare and hash identically regardless of
/// the order the backend serialized them in.
pub type Labels = BTreeMap<String, String>;

/// A single timestamped log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub timestamp: DateTime<Utc>,
    pub line: String,
}

/// A log stream: a label set plus its entries in ascending timestamp order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStream {
    pub labels: Labels,
    pub entries: Vec<Entry>,
}

/// A numeric sample at a single instant, produced by an aggregating
/// expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSample {
    pub metric: Labels,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A numeric series over a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSeries {
    pub metric: Labels,
    pub samples: Vec<(DateTime<Utc>, f64)>,
}

/// The result of a query, shaped by the expression: log selectors yield
/// streams, aggregating expressions yield a vector (instant) or matrix
/// (range).
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Streams(Vec<LogStream>),
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixSeries>),
}

impl QueryResult {
    fn type_name(&self) -> &'static str {
        match self {
            QueryResult::Streams(_) => "streams",
            QueryResult::Vector(_) => "vector",
            QueryResult::Matrix(_) => "matrix",
        }
    }

    pub fn into_streams(self) -> Result<Vec<LogStream>> {
        match self {
            QueryResult::Streams(streams) => Ok(streams),
            other => Err(QueryError::UnexpectedResultType {
                expected: "streams",
                got: other.type_name().to_string(),
            }
            .into()),
        }
    }

    pub fn into_vector(self) -> Result<Vec<VectorSample>> {
        match self {
            QueryResult::Vector(samples) => Ok(samples),
            other => Err(QueryError::UnexpectedResultType {
                expected: "vector",
                got: other.type_name().to_string(),
            }
            .into()),
        }
    }

    pub fn into_matrix(self) -> Result<Vec<MatrixSeries>> {
        match self {
            QueryResult::Matrix(series) => Ok(series),
            other => Err(QueryError::UnexpectedResultType {
                expected: "matrix",
                got: other.type_name().to_string(),
            }
            .into()),
        }
    }
}
