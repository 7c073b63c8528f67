//! Requestor: builds each call, dispatches it and retries transient failures.

use anyhow::Context;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::time::Instant;

use super::Headers;
use super::headers::{build_headers, build_url, query_pairs};
use super::request::{ApiRequest, FileSource, Method};
use super::response::{ApiError, Classified, FailureDetail, SuccessResponse, classify};
use super::retry::{AttemptState, RetryDecision};
use super::transport::{PreparedBody, PreparedRequest, ReqwestTransport, Transport, TransportError};
use crate::config::ClientConfig;
use crate::logging::{LogCrateSink, LogLevel, RequestLogger};

/// Error-first completion callback, invoked once per logical call.
pub type Completion<'a> = Box<dyn FnOnce(Result<&Value, &ApiError>) + Send + 'a>;

/// Issues authenticated API calls with deadline-bounded retries.
///
/// Holds no per-call state, so one requestor can serve concurrent calls.
pub struct Requestor {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    logger: RequestLogger,
}

impl Requestor {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, logger: RequestLogger) -> Self {
        Self {
            config,
            transport,
            logger,
        }
    }

    /// A requestor over reqwest that logs through the `log` facade.
    pub fn with_client(config: ClientConfig, client: reqwest::Client) -> Self {
        Self::new(
            config,
            Arc::new(ReqwestTransport::new(client)),
            RequestLogger::new(Box::new(LogCrateSink::new())),
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_url(&self, request: &ApiRequest) -> String {
        build_url(&self.config.base_url, request)
    }

    pub fn build_headers(&self, request: &ApiRequest) -> io::Result<Headers> {
        build_headers(request)
    }

    pub async fn get(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        self.dispatch(Method::Get, request, PreparedBody::Empty, None).await
    }

    /// Performs a GET and deserializes the content into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, request: &ApiRequest) -> anyhow::Result<T> {
        let content = self.get(request).await?;
        serde_json::from_value(content).context("Failed to parse JSON response")
    }

    pub async fn post(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        self.dispatch(Method::Post, request, json_body(request), None).await
    }

    /// POSTs the request's file (from disk or memory) as the body.
    pub async fn post_file(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        self.dispatch(Method::Post, request, file_body(request), None).await
    }

    pub async fn put(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        self.dispatch(Method::Put, request, json_body(request), None).await
    }

    pub async fn delete(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        self.dispatch(Method::Delete, request, PreparedBody::Empty, None).await
    }

    /// Performs any verb and reports the outcome to `callback` as well as
    /// returning it.
    ///
    /// POST and PUT send the JSON body when one is set, otherwise the file.
    pub async fn call(
        &self,
        method: Method,
        request: &ApiRequest,
        callback: Option<Completion<'_>>,
    ) -> Result<Value, ApiError> {
        let body = if !method.has_body() {
            PreparedBody::Empty
        } else if request.body.is_some() {
            json_body(request)
        } else {
            file_body(request)
        };
        self.dispatch(method, request, body, callback).await
    }

    #[tracing::instrument(skip(self, request, body, callback), fields(method = %method))]
    async fn dispatch(
        &self,
        method: Method,
        request: &ApiRequest,
        body: PreparedBody,
        callback: Option<Completion<'_>>,
    ) -> Result<Value, ApiError> {
        let outcome = match self.prepare(method, request, body) {
            Ok(prepared) => {
                self.logger.log_request(method, &prepared);

                let policy = self.config.retry.resolve(request);
                let state = AttemptState::start(policy, Instant::now());

                match self.send_with_retries(&prepared, state).await {
                    Ok(response) => {
                        self.logger.log_successful_response(&response);
                        Ok(response.content)
                    }
                    Err(failure) => {
                        self.logger.log_error_response(method, &prepared, &failure);
                        Err(ApiError::from(failure))
                    }
                }
            }
            Err(failure) => {
                self.logger.log(
                    LogLevel::Error,
                    &format!("{} {} not sent: {}", method, self.build_url(request), failure),
                );
                Err(ApiError::from(failure))
            }
        };

        if let Some(callback) = callback {
            callback(outcome.as_ref());
        }
        outcome
    }

    fn prepare(
        &self,
        method: Method,
        request: &ApiRequest,
        body: PreparedBody,
    ) -> Result<PreparedRequest, FailureDetail> {
        let headers = build_headers(request).map_err(|e| {
            FailureDetail::transport(format!("Failed to determine file size: {}", e))
        })?;

        Ok(PreparedRequest {
            method,
            url: self.build_url(request),
            headers,
            query: query_pairs(&request.query),
            body,
        })
    }

    /// Runs attempts until one succeeds or the retry policy gives up.
    async fn send_with_retries(
        &self,
        request: &PreparedRequest,
        mut state: AttemptState,
    ) -> Result<SuccessResponse, FailureDetail> {
        loop {
            let failure = match self.attempt(request).await {
                Classified::Success(response) => return Ok(response),
                Classified::Failure(failure) => failure,
            };

            match state.decide(&failure, Instant::now()) {
                RetryDecision::Retry { attempt, delay } => {
                    self.logger
                        .log_retry_attempt(request.method, request, &failure, attempt);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp { attempt } => {
                    self.logger.log_retry_failure(request.method, request, attempt);
                    return Err(failure);
                }
            }
        }
    }

    /// Single physical exchange without retry.
    async fn attempt(&self, request: &PreparedRequest) -> Classified {
        match self.transport.send(request).await {
            Ok(response) => classify(response),
            Err(TransportError {
                response: Some(response),
                ..
            }) => classify(response),
            Err(error) => {
                debug!("{} {}: transport failure: {}", request.method, request.url, error);
                Classified::Failure(FailureDetail::transport(error.message))
            }
        }
    }
}

fn json_body(request: &ApiRequest) -> PreparedBody {
    request
        .body
        .clone()
        .map_or(PreparedBody::Empty, PreparedBody::Json)
}

fn file_body(request: &ApiRequest) -> PreparedBody {
    match &request.file {
        Some(FileSource::Path(path)) => PreparedBody::File(path.clone()),
        Some(FileSource::Bytes(bytes)) => PreparedBody::Bytes(bytes.clone()),
        None => PreparedBody::Empty,
    }
}
