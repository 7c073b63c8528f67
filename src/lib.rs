pub mod config;
pub mod http;
pub mod logging;

pub use config::ClientConfig;
pub use http::{ApiError, ApiRequest, Method, Requestor};
