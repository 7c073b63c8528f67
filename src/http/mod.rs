//! HTTP requestor with response classification and deadline-bounded retries.

mod client;
mod headers;
mod request;
mod response;
mod retry;
mod transport;

use std::collections::BTreeMap;

/// Header name to value. Ordered so that derived header maps are reproducible.
pub type Headers = BTreeMap<String, String>;

pub use client::{Completion, Requestor};
pub use headers::{
    API_SCENARIO_HEADER, CHANGE_AGENT_HEADER, USER_AGENT_PREFIX, build_headers, build_url,
    content_type_for, query_pairs, user_agent,
};
pub use request::{ApiRequest, FileSource, Method, QueryValue};
pub use response::{
    ApiError, Classified, FailureDetail, RawResponse, SuccessResponse, classify,
    is_json_content_type,
};
pub use retry::{
    AttemptState, BackoffFn, DEFAULT_MAX_RETRY_DURATION_MILLIS, RetryDecision, RetryPolicy,
    RetryableErrorCode, is_retryable,
};
pub use transport::{PreparedBody, PreparedRequest, ReqwestTransport, Transport, TransportError};
