use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore, crypto::ring, pki_types::ServerName},
};

use crate::error::FetchError;

use super::{HTTPS_PORT, SecureTransport, http::HttpResponse};

/// TCP + TLS transport trusting the bundled Mozilla root store.
#[derive(Debug, Clone)]
pub struct TlsTransport {
    port: u16,
    timeout: Duration,
}

impl TlsTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            port: HTTPS_PORT,
            timeout,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client_config() -> Result<Arc<ClientConfig>, FetchError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Arc::new(config))
    }

    /// Connects, writes `request` verbatim and reads until the server closes.
    /// The socket and TLS session are dropped when this returns.
    async fn exchange(&self, host: &str, request: &str) -> Result<Vec<u8>, FetchError> {
        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|_| FetchError::InvalidHost(host.to_owned()))?;

        let tcp = TcpStream::connect((host, self.port))
            .await
            .map_err(|source| FetchError::Connect {
                host: host.to_owned(),
                port: self.port,
                source,
            })?;

        let connector = TlsConnector::from(Self::client_config()?);
        let mut stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|source| FetchError::Handshake {
                host: host.to_owned(),
                source,
            })?;
        tracing::debug!(host, port = self.port, "TLS session established");

        stream.write_all(request.as_bytes()).await?;
        stream.flush().await?;

        let mut raw = Vec::new();
        match stream.read_to_end(&mut raw).await {
            Ok(_) => {}
            // Plenty of servers close the socket without a TLS close_notify.
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof && !raw.is_empty() => {
                tracing::debug!("peer closed the connection without close_notify");
            }
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(bytes = raw.len(), "read response");
        Ok(raw)
    }
}

#[async_trait]
impl SecureTransport for TlsTransport {
    async fn fetch(&self, host: &str, request: &str) -> Result<String, FetchError> {
        let raw = tokio::time::timeout(self.timeout, self.exchange(host, request))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let response = HttpResponse::decode(&raw)?;
        if !response.is_success() {
            tracing::warn!(
                status = response.status,
                reason = %response.reason,
                "weather service answered with an error status"
            );
        }

        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_host_that_is_not_a_dns_name() {
        let transport = TlsTransport::new(Duration::from_secs(1));

        let err = transport
            .fetch("not a host!", "GET / HTTP/1.1\n\n")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidHost(host) if host == "not a host!"));
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let transport = TlsTransport::new(Duration::from_secs(5)).with_port(port);

        let err = transport
            .fetch("localhost", "GET / HTTP/1.1\n\n")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Connect { .. }));
    }
}
