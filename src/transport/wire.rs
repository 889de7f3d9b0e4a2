//! Typed decoding of the Loki HTTP v1 response envelope.
//!
//! Query responses arrive as `{"status": ..., "data": {"resultType": ...,
//! "result": [...]}}`. Stream entries carry nanosecond timestamps as decimal
//! strings; vector/matrix samples carry fractional unix seconds plus a
//! stringified number.

use crate::error::{Error, Result};
use crate::model::{Entry, Labels, LogStream, MatrixSeries, QueryResult, VectorSample};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct QueryEnvelope {
    pub status: String,
    pub data: QueryData,
}

#[derive(Debug, Deserialize)]
pub struct QueryData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: serde_json::Value,
}

/// Envelope for the labels / label-values endpoints, whose `data` is a bare
/// string array.
#[derive(Debug, Deserialize)]
pub struct ValuesEnvelope {
    pub status: String,
    #[serde(default)]
    pub data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireStream {
    stream: Labels,
    values: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct WireVectorSample {
    metric: Labels,
    value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct WireMatrixSeries {
    metric: Labels,
    values: Vec<(f64, String)>,
}

impl QueryEnvelope {
    pub fn into_result(self) -> Result<QueryResult> {
        if self.status != "success" {
            return Err(Error::MalformedResponse(format!(
                "unexpected response status '{}'",
                self.status
            )));
        }
        match self.data.result_type.as_str() {
            "streams" => {
                let wire: Vec<WireStream> = serde_json::from_value(self.data.result)?;
                let streams = wire
                    .into_iter()
                    .map(|s| {
                        let entries = s
                            .values
                            .into_iter()
                            .map(|(ts, line)| {
                                Ok(Entry {
                                    timestamp: parse_nanos(&ts)?,
                                    line,
                                })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(LogStream {
                            labels: s.stream,
                            entries,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(QueryResult::Streams(streams))
            }
            "vector" => {
                let wire: Vec<WireVectorSample> = serde_json::from_value(self.data.result)?;
                let samples = wire
                    .into_iter()
                    .map(|s| {
                        Ok(VectorSample {
                            metric: s.metric,
                            timestamp: parse_unix_seconds(s.value.0),
                            value: parse_value(&s.value.1)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(QueryResult::Vector(samples))
            }
            "matrix" => {
                let wire: Vec<WireMatrixSeries> = serde_json::from_value(self.data.result)?;
                let series = wire
                    .into_iter()
                    .map(|s| {
                        let samples = s
                            .values
                            .into_iter()
                            .map(|(ts, v)| Ok((parse_unix_seconds(ts), parse_value(&v)?)))
                            .collect::<Result<Vec<_>>>()?;
                        Ok(MatrixSeries {
                            metric: s.metric,
                            samples,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(QueryResult::Matrix(series))
            }
            other => Err(Error::MalformedResponse(format!(
                "unknown result type '{}'",
                other
            ))),
        }
    }
}

fn parse_nanos(ts: &str) -> Result<DateTime<Utc>> {
    let nanos: i64 = ts
        .parse()
        .map_err(|_| Error::MalformedResponse(format!("bad nanosecond timestamp '{}'", ts)))?;
    Ok(DateTime::from_timestamp_nanos(nanos))
}

fn parse_unix_seconds(secs: f64) -> DateTime<Utc> {
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract() * 1e9).round() as u32;
    DateTime::from_timestamp(whole, nanos).unwrap_or_default()
}

fn parse_value(v: &str) -> Result<f64> {
    v.parse()
        .map_err(|_| Error::MalformedResponse(format!("bad sample value '{}'", v)))
}

/// Nanosecond timestamp in the format the query endpoints expect.
pub fn format_nanos(ts: DateTime<Utc>) -> String {
    ts.timestamp_nanos_opt()
        .unwrap_or_else(|| ts.timestamp() * 1_000_000_000)
        .to_string()
}
