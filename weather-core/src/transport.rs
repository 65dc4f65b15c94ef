use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::FetchError;

pub mod http;
pub mod tls;

pub use tls::TlsTransport;

/// Port the weather service is reached on.
pub const HTTPS_PORT: u16 = 443;

/// Sends one raw HTTP request over a secure channel and returns the response body.
#[async_trait]
pub trait SecureTransport: Send + Sync + Debug {
    async fn fetch(&self, host: &str, request: &str) -> Result<String, FetchError>;
}
