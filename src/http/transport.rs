//! One physical HTTP exchange, behind a trait so the requestor can be tested
//! without a network.

use async_trait::async_trait;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Body, Client};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

use super::Headers;
use super::request::Method;
use super::response::{RawResponse, is_json_content_type};

/// Body of a prepared request.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedBody {
    Empty,
    Json(Value),
    Bytes(Vec<u8>),
    /// Reopened and streamed from disk on each attempt.
    File(PathBuf),
}

/// A fully resolved request, reused unchanged for every attempt of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub query: Vec<(String, String)>,
    pub body: PreparedBody,
}

/// A failed exchange. `response` is set when the remote end did answer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub response: Option<RawResponse>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
        }
    }

    pub fn with_response(message: impl Into<String>, response: RawResponse) -> Self {
        Self {
            message: message.into(),
            response: Some(response),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs exactly one exchange. Non-2xx statuses are not errors here.
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a reqwest [`Client`].
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(
        skip(self, request),
        fields(method = %request.method, url = %request.url)
    )]
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.request(request.method.into(), &request.url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            PreparedBody::Empty => builder,
            PreparedBody::Json(value) => {
                let bytes = serde_json::to_vec(value).map_err(|e| {
                    TransportError::new(format!("Failed to serialize request body: {}", e))
                })?;
                builder.body(bytes)
            }
            PreparedBody::Bytes(bytes) => builder.body(bytes.clone()),
            PreparedBody::File(path) => {
                let file = tokio::fs::File::open(path).await.map_err(|e| {
                    TransportError::new(format!("Failed to open {}: {}", path.display(), e))
                })?;
                builder.body(Body::wrap_stream(ReaderStream::new(file)))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(format!("Failed to send request: {}", e)))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::new(format!("Failed to read response body: {}", e)))?;
        debug!("HTTP {} with {} byte body", status, text.len());

        let data = decode_body(&headers, text);
        Ok(RawResponse {
            status,
            headers,
            data,
        })
    }
}

/// Flattens response headers, joining repeated fields with `", "`.
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes());
        match headers.entry(name.as_str().to_string()) {
            Entry::Occupied(mut entry) => {
                let joined = entry.get_mut();
                joined.push_str(", ");
                joined.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value.into_owned());
            }
        }
    }
    headers
}

/// Parses JSON bodies; anything else is kept as text.
fn decode_body(headers: &Headers, text: String) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if is_json_content_type(headers) {
        if let Ok(value) = serde_json::from_str(&text) {
            return value;
        }
    }
    Value::String(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prepared(method: Method, url: String) -> PreparedRequest {
        PreparedRequest {
            method,
            url,
            headers: Headers::new(),
            query: Vec::new(),
            body: PreparedBody::Empty,
        }
    }

    #[test]
    fn test_decode_body() {
        let mut headers = Headers::new();
        assert_eq!(decode_body(&headers, String::new()), Value::Null);
        assert_eq!(decode_body(&headers, "{\"a\":1}".into()), json!("{\"a\":1}"));

        headers.insert("content-type".into(), "application/json;charset=UTF-8".into());
        assert_eq!(decode_body(&headers, "{\"a\":1}".into()), json!({"a": 1}));
        assert_eq!(decode_body(&headers, "not json".into()), json!("not json"));
    }

    #[test]
    fn test_collect_headers_joins_repeated_fields() {
        let mut map = HeaderMap::new();
        map.append("set-cookie", "a=1".parse().unwrap());
        map.append("set-cookie", "b=2".parse().unwrap());
        map.insert("content-type", "application/json".parse().unwrap());

        let headers = collect_headers(&map);

        assert_eq!(headers["set-cookie"], "a=1, b=2");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers.len(), 2);
    }

    #[tokio::test]
    async fn test_send_get_with_query_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/sheets")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("include".into(), "format,objectValue".into()),
                mockito::Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .match_header("authorization", "Bearer TOKEN")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [1, 2]}"#)
            .create_async()
            .await;

        let mut request = prepared(Method::Get, format!("{}/sheets", server.url()));
        request.query = vec![
            ("include".into(), "format,objectValue".into()),
            ("page".into(), "1".into()),
        ];
        request
            .headers
            .insert("Authorization".into(), "Bearer TOKEN".into());

        let response = ReqwestTransport::default().send(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.headers["content-type"], "application/json");
        assert_eq!(response.data, json!({"data": [1, 2]}));
    }

    #[tokio::test]
    async fn test_send_post_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sheets")
            .match_body(mockito::Matcher::Json(json!({"name": "sheet"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": {"id": 7}}"#)
            .create_async()
            .await;

        let mut request = prepared(Method::Post, format!("{}/sheets", server.url()));
        request.body = PreparedBody::Json(json!({"name": "sheet"}));

        let response = ReqwestTransport::default().send(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.data["result"]["id"], 7);
    }

    #[tokio::test]
    async fn test_send_file_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/attachments")
            .match_body("a,b\n1,2\n")
            .with_status(200)
            .create_async()
            .await;

        let mut request = prepared(Method::Post, format!("{}/attachments", server.url()));
        request.body = PreparedBody::File(path);

        let response = ReqwestTransport::default().send(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_send_large_file_body_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.bin");
        let contents: String = (0..20_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        std::fs::write(&path, &contents).unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/attachments")
            .match_header("content-length", "20000")
            .match_body(contents.as_str())
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let mut request = prepared(Method::Post, format!("{}/attachments", server.url()));
        request
            .headers
            .insert("Content-Length".to_string(), contents.len().to_string());
        request.body = PreparedBody::File(path);

        let transport = ReqwestTransport::default();
        transport.send(&request).await.unwrap();
        transport.send(&request).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_missing_file_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = prepared(Method::Post, "http://127.0.0.1:1/attachments".to_string());
        request.body = PreparedBody::File(dir.path().join("gone.csv"));

        let error = ReqwestTransport::default().send(&request).await.unwrap_err();

        assert!(error.message.starts_with("Failed to open"));
        assert!(error.response.is_none());
    }

    #[tokio::test]
    async fn test_send_repeated_response_headers_are_joined() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/sheets")
            .with_status(200)
            .with_header("x-trace", "one")
            .with_header("x-trace", "two")
            .create_async()
            .await;

        let request = prepared(Method::Get, format!("{}/sheets", server.url()));
        let response = ReqwestTransport::default().send(&request).await.unwrap();

        assert_eq!(response.headers["x-trace"], "one, two");
    }

    #[tokio::test]
    async fn test_send_error_status_is_not_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("DELETE", "/sheets/1")
            .with_status(404)
            .with_header("content-type", "text/plain")
            .with_body("gone")
            .create_async()
            .await;

        let request = prepared(Method::Delete, format!("{}/sheets/1", server.url()));
        let response = ReqwestTransport::default().send(&request).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.data, json!("gone"));
    }

    #[tokio::test]
    async fn test_send_connection_failure() {
        let request = prepared(Method::Get, "http://127.0.0.1:1/unreachable".to_string());
        let error = ReqwestTransport::default().send(&request).await.unwrap_err();

        assert!(error.response.is_none());
        assert!(error.message.contains("Failed to send request"));
    }
}
