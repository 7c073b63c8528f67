//! Classification of raw HTTP exchanges into success payloads or failures.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::Headers;

/// One raw exchange as reported by a [`Transport`](super::Transport).
///
/// `data` is the decoded body: parsed JSON for JSON content types, otherwise
/// the body text as a JSON string (`Null` when empty).
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessResponse {
    pub status_code: u16,
    pub headers: Headers,
    pub content: Value,
}

/// A failed exchange, including the raw headers and body the logger needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FailureDetail {
    /// `None` when the remote end never responded.
    pub status_code: Option<u16>,
    pub error_code: Option<i64>,
    pub message: String,
    pub ref_id: Option<String>,
    pub detail: Option<Value>,
    pub headers: Headers,
    pub body: Value,
}

impl FailureDetail {
    /// A failure with no HTTP response behind it.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            status_label(&self.status_code, &self.error_code),
            self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Success(SuccessResponse),
    Failure(FailureDetail),
}

/// Caller-facing error: a [`FailureDetail`] without the raw headers and body.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{}: {message}", status_label(.status_code, .error_code))]
pub struct ApiError {
    pub status_code: Option<u16>,
    pub error_code: Option<i64>,
    pub message: String,
    pub ref_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ApiError {
    /// True when the failure happened before any HTTP response arrived.
    pub fn is_transport(&self) -> bool {
        self.status_code.is_none()
    }
}

impl From<FailureDetail> for ApiError {
    fn from(detail: FailureDetail) -> Self {
        Self {
            status_code: detail.status_code,
            error_code: detail.error_code,
            message: detail.message,
            ref_id: detail.ref_id,
            detail: detail.detail,
        }
    }
}

fn status_label(status_code: &Option<u16>, error_code: &Option<i64>) -> String {
    match (status_code, error_code) {
        (Some(status), Some(code)) => format!("HTTP {} (error {})", status, code),
        (Some(status), None) => format!("HTTP {}", status),
        (None, _) => "Transport error".to_string(),
    }
}

/// Returns true when the `content-type` header names JSON.
pub fn is_json_content_type(headers: &Headers) -> bool {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .is_some_and(|(_, value)| value.to_ascii_lowercase().contains("application/json"))
}

/// Turns one raw exchange into a success or a failure. Only 200 succeeds.
pub fn classify(response: RawResponse) -> Classified {
    let RawResponse {
        status,
        headers,
        data,
    } = response;

    if status == 200 {
        return Classified::Success(SuccessResponse {
            status_code: status,
            headers,
            content: data,
        });
    }

    let mut failure = FailureDetail {
        status_code: Some(status),
        ..Default::default()
    };

    match data.as_object() {
        Some(fields) if is_json_content_type(&headers) => {
            failure.error_code = fields.get("errorCode").and_then(error_code_of);
            failure.message = fields.get("message").map(text_of).unwrap_or_default();
            failure.ref_id = fields.get("refId").map(text_of);
            failure.detail = fields.get("detail").cloned();
        }
        _ => failure.message = text_of(&data),
    }

    failure.headers = headers;
    failure.body = data;
    Classified::Failure(failure)
}

fn error_code_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
