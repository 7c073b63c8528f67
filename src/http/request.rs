//! Per-call request descriptor handed to the [`Requestor`](super::Requestor).

use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use super::retry::BackoffFn;

/// HTTP verbs supported by the requestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether requests with this verb carry a body.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A query parameter value. Lists are sent comma-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Scalar(String),
    List(Vec<String>),
}

impl QueryValue {
    /// Renders the value as it appears on the wire (before percent-encoding).
    pub fn render(&self) -> String {
        match self {
            QueryValue::Scalar(value) => value.clone(),
            QueryValue::List(values) => values.join(","),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Scalar(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl<T: ToString> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        QueryValue::List(values.iter().map(ToString::to_string).collect())
    }
}

/// Where a file upload body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Read from disk on every physical attempt.
    Path(PathBuf),
    /// Already in memory.
    Bytes(Vec<u8>),
}

/// Everything a caller supplies for one logical call.
///
/// The requestor only reads from this; URLs and headers are derived from it
/// on every call, so the same descriptor can be reused.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    /// Full base URL override. Takes precedence over the configured host.
    pub base_url: Option<String>,
    /// Resource path appended to the base URL.
    pub path: Option<String>,
    /// Trailing identifier segment appended after `path`.
    pub id: Option<String>,
    pub query: Vec<(String, QueryValue)>,

    pub access_token: Option<String>,
    pub assume_user: Option<String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub file: Option<FileSource>,
    pub user_agent: Option<String>,
    pub api_scenario: Option<String>,
    pub change_agent: Option<String>,
    pub custom_headers: Vec<(String, String)>,

    pub body: Option<Value>,

    pub max_retry_duration_millis: Option<u64>,
    pub calc_retry_backoff: Option<BackoffFn>,
}

impl ApiRequest {
    /// Creates a descriptor for the given resource path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_assume_user(mut self, user: impl Into<String>) -> Self {
        self.assume_user = Some(user.into());
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.content_disposition = Some(disposition.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(FileSource::Path(path.into()));
        self
    }

    pub fn with_file_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.file = Some(FileSource::Bytes(bytes));
        self
    }

    pub fn with_user_agent(mut self, tag: impl Into<String>) -> Self {
        self.user_agent = Some(tag.into());
        self
    }

    pub fn with_api_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.api_scenario = Some(scenario.into());
        self
    }

    pub fn with_change_agent(mut self, agent: impl Into<String>) -> Self {
        self.change_agent = Some(agent.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_max_retry_duration_millis(mut self, millis: u64) -> Self {
        self.max_retry_duration_millis = Some(millis);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffFn) -> Self {
        self.calc_retry_backoff = Some(backoff);
        self
    }

    /// Path of the file to upload, if the descriptor points at one on disk.
    pub fn file_path(&self) -> Option<&std::path::Path> {
        match &self.file {
            Some(FileSource::Path(path)) => Some(path.as_path()),
            _ => None,
        }
    }
}
