//! Intercepting Proxy (MITM): a `CONNECT`-based TLS-terminating
//! forward proxy. For allow-listed hosts it terminates TLS with a freshly
//! minted leaf certificate and rewrites catalog-prefixed requests to the
//! local PDP; everything else is tunneled raw or forwarded untouched.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig as TlsServerConfig;
use tokio_rustls::TlsAcceptor;

use super::cert::{CertError, CertificateAuthority};
use super::tunnel::splice;

/// Lifecycle of a single hijacked connection: `AwaitingHandshake
/// -> Serving(readLoop) -> Closed`. An EOF on read transitions to `Closed`
/// cleanly; any transport error logs and closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingHandshake,
    Serving,
    Closed,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("non-CONNECT method rejected")]
    MethodNotAllowed,
    #[error("missing or invalid proxy authentication")]
    AuthenticationRequired,
    #[error("malformed CONNECT target: {0}")]
    MalformedTarget(String),
    #[error("certificate error: {0}")]
    Cert(#[from] CertError),
    #[error("tls error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static proxy configuration: fixed proxy credentials, the
/// host allow-list that triggers MITM, and the catalog path prefixes that
/// get rewritten to the local PDP.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub proxy_username: String,
    pub proxy_password: String,
    pub target_allow_list: HashSet<String>,
    pub catalog_path_prefixes: Vec<String>,
    pub pdp_base_url: String,
}

impl ProxyConfig {
    #[must_use]
    pub fn is_allow_listed(&self, host: &str) -> bool {
        self.target_allow_list.contains(host)
    }

    #[must_use]
    pub fn is_catalog_path(&self, path: &str) -> bool {
        self.catalog_path_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Validates an HTTP Basic `Proxy-Authorization` header value against
    /// the fixed username/password loaded at startup. The password compare
    /// is constant-time so a timing side channel can't leak it byte by byte.
    #[must_use]
    pub fn check_proxy_auth(&self, header_value: Option<&str>) -> bool {
        let Some(value) = header_value else { return false };
        let Some(encoded) = value.strip_prefix("Basic ") else { return false };
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
            return false;
        };
        let Ok(text) = String::from_utf8(decoded) else { return false };
        let Some((user, pass)) = text.split_once(':') else { return false };
        user == self.proxy_username && pass.as_bytes().ct_eq(self.proxy_password.as_bytes()).into()
    }
}

/// Parses a `CONNECT host:port HTTP/1.1` request line into `(host, port)`.
pub fn parse_connect_target(request_line: &str) -> Result<(String, u16), ProxyError> {
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    if !method.eq_ignore_ascii_case("CONNECT") {
        return Err(ProxyError::MethodNotAllowed);
    }
    let target = parts
        .next()
        .ok_or_else(|| ProxyError::MalformedTarget(request_line.to_string()))?;
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::MalformedTarget(target.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| ProxyError::MalformedTarget(target.to_string()))?;
    Ok((host.to_string(), port))
}

/// The MITM proxy. The CA key/cert and the shared forwarding HTTP client
/// are read-only after startup and safe for concurrent use across the one
/// task spawned per accepted connection.
pub struct MitmProxy {
    ca: Arc<CertificateAuthority>,
    config: ProxyConfig,
    forward_client: reqwest::Client,
}

impl MitmProxy {
    #[must_use]
    pub fn new(ca: Arc<CertificateAuthority>, config: ProxyConfig, forward_client: reqwest::Client) -> Self {
        MitmProxy { ca, config, forward_client }
    }

    /// Handles one accepted proxy connection end to end. Never panics on
    /// per-request errors; a failure here closes this connection
    /// but leaves the listener intact.
    pub async fn handle_connection(&self, socket: TcpStream) {
        if let Err(err) = self.handle_connection_inner(socket).await {
            tracing::warn!(error = %err, "mitm proxy: connection closed with error");
        }
    }

    async fn handle_connection_inner(&self, socket: TcpStream) -> Result<(), ProxyError> {
        let mut reader = BufReader::new(socket);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;
        let request_line = request_line.trim_end().to_string();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await?;
            if line.trim().is_empty() {
                break;
            }
            headers.push(line.trim_end().to_string());
        }
        let mut socket = reader.into_inner();

        let (host, port) = match parse_connect_target(&request_line) {
            Ok(target) => target,
            Err(ProxyError::MethodNotAllowed) => {
                socket.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n").await?;
                return Err(ProxyError::MethodNotAllowed);
            }
            Err(other) => return Err(other),
        };

        let proxy_auth = headers
            .iter()
            .find_map(|h| h.strip_prefix("Proxy-Authorization: ").map(str::to_string));
        if !self.config.check_proxy_auth(proxy_auth.as_deref()) {
            socket
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await?;
            return Err(ProxyError::AuthenticationRequired);
        }

        if self.config.is_allow_listed(&host) {
            self.mitm_connection(socket, &host, port).await
        } else {
            self.raw_tunnel(socket, &host, port).await
        }
    }

    async fn raw_tunnel(&self, mut socket: TcpStream, host: &str, port: u16) -> Result<(), ProxyError> {
        let upstream = TcpStream::connect((host, port)).await?;
        socket.write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n").await?;
        splice(socket, upstream).await?;
        Ok(())
    }

    async fn mitm_connection(&self, mut socket: TcpStream, host: &str, _port: u16) -> Result<(), ProxyError> {
        let mut state = ConnectionState::AwaitingHandshake;
        socket.write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n").await?;

        let leaf = self.ca.issue_leaf(host)?;
        let cert_chain = vec![CertificateDer::from(leaf.cert_der)];
        let key = PrivateKeyDer::try_from(leaf.key_der).map_err(|e| {
            ProxyError::Tls(tokio_rustls::rustls::Error::General(e.to_string()))
        })?;

        let tls_config = TlsServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(cert_chain, key)?;
        let acceptor = TlsAcceptor::from(Arc::new(tls_config));

        let tls_stream = acceptor.accept(socket).await?;
        state = ConnectionState::Serving;
        tracing::debug!(host, ?state, "mitm: tls handshake complete");

        self.serve_tls_loop(tls_stream, host).await;
        Ok(())
    }

    async fn serve_tls_loop(&self, mut tls_stream: tokio_rustls::server::TlsStream<TcpStream>, host: &str) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        loop {
            let mut buf = vec![0u8; 8192];
            let n = match tls_stream.read(&mut buf).await {
                Ok(0) => {
                    tracing::debug!(host, "mitm: peer closed (EOF)");
                    break;
                }
                Ok(n) => n,
                Err(err) => {
                    tracing::warn!(host, error = %err, "mitm: read error, closing");
                    break;
                }
            };
            buf.truncate(n);
            let request_text = String::from_utf8_lossy(&buf);
            let Some(first_line) = request_text.lines().next() else { break };
            let path = first_line.split_whitespace().nth(1).unwrap_or("/");

            let target_base = if self.config.is_catalog_path(path) {
                self.config.pdp_base_url.clone()
            } else {
                format!("https://{host}")
            };

            match self.forward_client.get(format!("{target_base}{path}")).send().await {
                Ok(response) => {
                    let status_line = format!("HTTP/1.1 {}\r\n\r\n", response.status());
                    let body = response.bytes().await.unwrap_or_default();
                    if tls_stream.write_all(status_line.as_bytes()).await.is_err() {
                        break;
                    }
                    if tls_stream.write_all(&body).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(host, path, error = %err, "mitm: forward failed");
                    let _ = tls_stream
                        .write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n")
                        .await;
                    break;
                }
            }
        }
    }
}
