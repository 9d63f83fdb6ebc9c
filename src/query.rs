use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::error::SpicedashError;
use crate::frame::Frame;

/// Remote error text signalling the runtime's concurrent request limit.
pub const CONCURRENT_LIMIT_MESSAGE: &str =
    "rpc error: code = Unknown desc = Exceeded concurrent request limit";

/// One query as received from the host. `json` is the raw query model.
#[derive(Debug, Clone)]
pub struct DataQuery {
    pub ref_id: String,
    pub json: String,
}

impl DataQuery {
    pub fn new(ref_id: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            json: json.into(),
        }
    }

    /// Query carrying only a SQL text.
    pub fn sql(ref_id: impl Into<String>, sql: &str) -> Self {
        let json = serde_json::json!({ "queryText": sql }).to_string();
        Self::new(ref_id, json)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryDataRequest {
    pub queries: Vec<DataQuery>,
}

impl QueryDataRequest {
    /// Parse a JSON array of query objects, each carrying its own `refId`.
    pub fn from_json(json: &str) -> Result<Self, SpicedashError> {
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(|e| SpicedashError::Config {
                message: format!("invalid request file: {e}"),
            })?;

        let queries = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let ref_id = entry
                    .get("refId")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| SpicedashError::Config {
                        message: format!("query {} has no refId", i + 1),
                    })?;
                Ok(DataQuery::new(ref_id, entry.to_string()))
            })
            .collect::<Result<Vec<_>, SpicedashError>>()?;

        Ok(Self { queries })
    }

    /// Queries from plain SQL texts, with ref ids A, B, C, ...
    pub fn from_sql<S: AsRef<str>>(texts: &[S]) -> Self {
        let queries = texts
            .iter()
            .enumerate()
            .map(|(i, sql)| DataQuery::sql(ref_id_for(i), sql.as_ref()))
            .collect();
        Self { queries }
    }
}

/// Spreadsheet-style ref id for the n-th query: A..Z, AA, AB, ...
pub fn ref_id_for(index: usize) -> String {
    let mut n = index + 1;
    let mut id = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        id.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    id.reverse();
    String::from_utf8_lossy(&id).into_owned()
}

/// Query model sent by the query editor.
#[derive(Debug, Default, Deserialize)]
pub struct QueryModel {
    #[serde(default, rename = "queryText", alias = "QueryText")]
    pub query_text: Option<String>,
}

impl QueryModel {
    /// Parse a raw query payload. An empty payload and malformed JSON are both
    /// bad requests.
    pub fn parse(json: &str) -> Result<Self, SpicedashError> {
        if json.trim().is_empty() {
            return Err(SpicedashError::BadRequest {
                message: "empty query".to_string(),
            });
        }
        serde_json::from_str(json).map_err(|e| SpicedashError::BadRequest {
            message: format!("json unmarshal: {e}"),
        })
    }

    /// The trimmed SQL text, rejected when blank.
    pub fn sql(&self) -> Result<&str, SpicedashError> {
        match self.query_text.as_deref().map(str::trim) {
            Some(sql) if !sql.is_empty() => Ok(sql),
            _ => Err(SpicedashError::BadRequest {
                message: "empty query text".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    BadRequest,
    Timeout,
    TooManyRequests,
    Internal,
}

impl Status {
    /// HTTP-style code the host uses for this status.
    pub fn code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Timeout => 504,
            Self::TooManyRequests => 429,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest => write!(f, "bad_request"),
            Self::Timeout => write!(f, "timeout"),
            Self::TooManyRequests => write!(f, "too_many_requests"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    pub status: Status,
    pub message: String,
}

impl From<&SpicedashError> for ResponseError {
    fn from(err: &SpicedashError) -> Self {
        let status = match err {
            SpicedashError::BadRequest { .. } => Status::BadRequest,
            SpicedashError::Timeout { .. } => Status::Timeout,
            SpicedashError::Throttled { .. } => Status::TooManyRequests,
            SpicedashError::Query { message } if message == CONCURRENT_LIMIT_MESSAGE => {
                Status::TooManyRequests
            }
            _ => Status::Internal,
        };
        Self {
            status,
            message: err.detail(),
        }
    }
}

/// Result of one query: the frames accumulated so far and, if the query
/// failed, why. A failure mid-stream keeps the partial frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataResponse {
    pub frames: Vec<Frame>,
    pub error: Option<ResponseError>,
}

impl DataResponse {
    pub fn from_frame(frame: Frame) -> Self {
        Self {
            frames: vec![frame],
            error: None,
        }
    }

    pub fn from_error(err: &SpicedashError) -> Self {
        Self {
            frames: Vec::new(),
            error: Some(ResponseError::from(err)),
        }
    }

    pub fn partial(frame: Frame, err: &SpicedashError) -> Self {
        Self {
            frames: vec![frame],
            error: Some(ResponseError::from(err)),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Responses keyed by the caller's ref id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDataResponse {
    pub responses: BTreeMap<String, DataResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckHealthResult {
    pub status: HealthStatus,
    pub message: String,
}
