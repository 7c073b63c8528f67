//! URL and header derivation from an [`ApiRequest`].

use std::io;
use std::path::Path;

use super::Headers;
use super::request::{ApiRequest, QueryValue};

/// Product token sent in every `User-Agent`.
pub const USER_AGENT_PREFIX: &str = "smartsheet-rust-sdk";

pub const CHANGE_AGENT_HEADER: &str = "Smartsheet-Change-Agent";
pub const API_SCENARIO_HEADER: &str = "Api-Scenario";

const JSON: &str = "application/json";

/// Resolves the request URL.
///
/// A non-empty `base_url` on the request wins over `default_base`; the path
/// and optional id are appended verbatim.
pub fn build_url(default_base: &str, request: &ApiRequest) -> String {
    let base = request
        .base_url
        .as_deref()
        .filter(|b| !b.is_empty())
        .unwrap_or(default_base);
    let path = request.path.as_deref().unwrap_or("");

    match request.id.as_deref() {
        Some(id) if !id.is_empty() => format!("{}{}{}", base, path, id),
        _ => format!("{}{}", base, path),
    }
}

/// Flattens the query into wire pairs, comma-joining list values.
pub fn query_pairs(query: &[(String, QueryValue)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(key, value)| (key.clone(), value.render()))
        .collect()
}

pub fn user_agent(tag: Option<&str>) -> String {
    let base = format!("{}/{}", USER_AGENT_PREFIX, env!("CARGO_PKG_VERSION"));
    match tag {
        Some(tag) if !tag.is_empty() => format!("{}/{}", base, tag),
        _ => base,
    }
}

/// Builds the header map for a request.
///
/// The only I/O is a stat of `request.file` when it is a path, used for
/// `Content-Length`.
pub fn build_headers(request: &ApiRequest) -> io::Result<Headers> {
    let mut headers = Headers::new();

    headers.insert(
        "Accept".to_string(),
        request.accept.clone().unwrap_or_else(|| JSON.to_string()),
    );

    let content_type = request
        .content_type
        .clone()
        .or_else(|| {
            request
                .file_name
                .as_deref()
                .and_then(content_type_for)
                .map(str::to_string)
        })
        .unwrap_or_else(|| JSON.to_string());
    headers.insert("Content-Type".to_string(), content_type);

    headers.insert(
        "User-Agent".to_string(),
        user_agent(request.user_agent.as_deref()),
    );

    if let Some(token) = non_empty(&request.access_token) {
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
    }
    if let Some(user) = non_empty(&request.assume_user) {
        headers.insert(
            "Assume-User".to_string(),
            urlencoding::encode(user).into_owned(),
        );
    }

    if let Some(disposition) = non_empty(&request.content_disposition) {
        headers.insert("Content-Disposition".to_string(), disposition.to_string());
    } else if let Some(file_name) = non_empty(&request.file_name) {
        headers.insert(
            "Content-Disposition".to_string(),
            format!("attachment; filename=\"{}\"", file_name),
        );
    }

    if let Some(path) = request.file_path() {
        headers.insert("Content-Length".to_string(), file_size(path)?.to_string());
    } else if let Some(size) = request.file_size {
        headers.insert("Content-Length".to_string(), size.to_string());
    }

    if let Some(scenario) = non_empty(&request.api_scenario) {
        headers.insert(API_SCENARIO_HEADER.to_string(), scenario.to_string());
    }
    if let Some(agent) = non_empty(&request.change_agent) {
        headers.insert(CHANGE_AGENT_HEADER.to_string(), agent.to_string());
    }

    for (name, value) in &request.custom_headers {
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        headers.insert(name.clone(), value.clone());
    }

    Ok(headers)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn file_size(path: &Path) -> io::Result<u64> {
    std::fs::metadata(path).map(|m| m.len())
}

/// Guesses a MIME type from a file name's extension.
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    let mime = match extension.as_str() {
        "csv" => "text/csv",
        "txt" | "text" | "log" => "text/plain",
        "htm" | "html" => "text/html",
        "xml" => "application/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "rtf" => "application/rtf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(mime)
}
