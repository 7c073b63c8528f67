//! Redacted, size-bounded logging of every request/response cycle.

use serde_json::{Map, Value};

use super::{LogLevel, LogSink, NullSink, format_log};
use crate::http::{FailureDetail, Headers, Method, PreparedBody, PreparedRequest, SuccessResponse};

/// Maximum number of characters logged at the preview tier.
pub const PREVIEW_LIMIT: usize = 1024;

/// Number of trailing characters left visible by [`censor`].
const VISIBLE_SUFFIX: usize = 4;

const SENSITIVE_FIELDS: [&str; 2] = ["access_token", "refresh_token"];

/// Logs requests, retries and outcomes to a [`LogSink`].
pub struct RequestLogger {
    sink: Box<dyn LogSink>,
}

impl RequestLogger {
    /// Wraps `sink` and installs the timestamp/level formatter on it.
    pub fn new(mut sink: Box<dyn LogSink>) -> Self {
        sink.add_filter(format_log);
        Self { sink }
    }

    /// A logger that drops everything.
    pub fn disabled() -> Self {
        Self::new(Box::new(NullSink))
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.sink.log(level, message);
    }

    pub fn log_request(&self, method: Method, request: &PreparedRequest) {
        self.sink.info(&format!(
            "{} {}",
            method,
            url_with_query(&request.url, &request.query)
        ));
        self.log_headers("Request", &request.headers);

        if let PreparedBody::Json(body) = &request.body {
            if let Some(payload) = payload_text(body) {
                self.log_payload("Request", &payload, &payload);
            }
        }
    }

    pub fn log_retry_attempt(
        &self,
        method: Method,
        request: &PreparedRequest,
        error: &FailureDetail,
        attempt: u32,
    ) {
        self.sink.warn(&format!(
            "Request failed, performing retry #{}\nCause: {}",
            attempt, error
        ));
        self.sink.warn(&format!(
            "{} {}",
            method,
            url_with_query(&request.url, &request.query)
        ));
    }

    pub fn log_retry_failure(&self, _method: Method, _request: &PreparedRequest, attempt: u32) {
        self.sink
            .error(&format!("Request failed after {} retries", attempt));
    }

    pub fn log_successful_response(&self, response: &SuccessResponse) {
        self.sink.info(&format!(
            "Response: Success (HTTP {})",
            response.status_code
        ));
        self.log_headers("Response", &response.headers);

        if let Some(full) = payload_text(&response.content) {
            let mut redacted = response.content.clone();
            redact_sensitive_fields(&mut redacted);
            let shown = payload_text(&redacted).unwrap_or_default();
            self.log_payload("Response", &full, &shown);
        }
    }

    pub fn log_error_response(
        &self,
        method: Method,
        request: &PreparedRequest,
        error: &FailureDetail,
    ) {
        self.sink.error(&format!(
            "{} {}",
            method,
            url_with_query(&request.url, &request.query)
        ));
        self.sink.error(&format!(
            "Response: Failure (HTTP {})\n\tError Code: {} - {}\n\tRef ID: {}",
            or_unknown(error.status_code),
            or_unknown(error.error_code),
            error.message,
            error.ref_id.as_deref().unwrap_or("unknown")
        ));
        self.log_headers("Response", &error.headers);
    }

    fn log_headers(&self, direction: &str, headers: &Headers) {
        if headers.is_empty() {
            return;
        }
        let redacted: Map<String, Value> = headers
            .iter()
            .map(|(name, value)| {
                let value = if name.eq_ignore_ascii_case("authorization") {
                    censor(value)
                } else {
                    value.clone()
                };
                (name.clone(), Value::String(value))
            })
            .collect();
        self.sink.silly(&format!(
            "{} Headers: {}",
            direction,
            Value::Object(redacted)
        ));
    }

    /// Logs `full` uncut at debug and a capped preview of `shown` at verbose.
    fn log_payload(&self, direction: &str, full: &str, shown: &str) {
        self.sink
            .debug(&format!("{} Payload (full): {}", direction, full));
        self.sink
            .verbose(&format!("{} Payload (preview): {}", direction, preview(shown)));
    }
}

/// Replaces all but the last four characters with `*`.
pub fn censor(value: &str) -> String {
    let len = value.chars().count();
    let hidden = len.saturating_sub(VISIBLE_SUFFIX);
    "*".repeat(hidden) + &value.chars().skip(hidden).collect::<String>()
}

/// Caps `payload` at [`PREVIEW_LIMIT`] characters, marking cuts with `...`.
pub fn preview(payload: &str) -> String {
    match payload.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}...", &payload[..cut]),
        None => payload.to_string(),
    }
}

fn url_with_query(url: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let encoded: Vec<String> = query
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect();
    format!("{}?{}", url, encoded.join("&"))
}

fn payload_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(fields) if fields.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn redact_sensitive_fields(value: &mut Value) {
    match value {
        Value::Object(fields) => {
            for (name, field) in fields.iter_mut() {
                match field {
                    Value::String(secret) if SENSITIVE_FIELDS.contains(&name.as_str()) => {
                        *secret = censor(secret);
                    }
                    _ => redact_sensitive_fields(field),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_sensitive_fields),
        _ => {}
    }
}

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}
