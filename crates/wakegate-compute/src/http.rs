//! Minimal HTTP/1.1 client transport over plain TCP or rustls.
//!
//! One connection per request: the controller issues a handful of calls
//! per start/stop cycle, so pooling buys nothing.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{ComputeError, ComputeResult};

const USER_AGENT: &str = concat!("wakegate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// A parsed base URL: scheme, host, port and optional path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Path prefix without a trailing slash (usually empty).
    pub base_path: String,
}

impl Endpoint {
    /// Parse `http(s)://host[:port][/prefix]`.
    pub fn parse(url: &str) -> ComputeResult<Self> {
        let invalid = |reason: &str| ComputeError::Endpoint {
            endpoint: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        let scheme = match uri.scheme_str() {
            Some("https") => Scheme::Https,
            Some("http") => Scheme::Http,
            Some(other) => return Err(invalid(&format!("unsupported scheme {other}"))),
            None => return Err(invalid("missing scheme")),
        };
        let host = uri.host().ok_or_else(|| invalid("missing host"))?.to_string();
        let port = uri.port_u16().unwrap_or(match scheme {
            Scheme::Https => 443,
            Scheme::Http => 80,
        });

        Ok(Self {
            scheme,
            host,
            port,
            base_path: uri.path().trim_end_matches('/').to_string(),
        })
    }

    /// Plain-HTTP endpoint for `host` or `host:port`.
    pub fn http(host_port: &str) -> ComputeResult<Self> {
        Self::parse(&format!("http://{host_port}"))
    }

    /// Value for the `Host` header.
    pub fn authority(&self) -> String {
        match (self.scheme, self.port) {
            (Scheme::Https, 443) | (Scheme::Http, 80) => self.host.clone(),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Issues single HTTP requests with a per-call timeout.
#[derive(Clone)]
pub struct HttpTransport {
    tls: TlsConnector,
}

impl HttpTransport {
    /// Transport trusting the Mozilla root certificate store.
    pub fn new() -> ComputeResult<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| ComputeError::Tls(format!("tls protocol version error: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            tls: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Send one request and read the whole response body.
    pub async fn request(
        &self,
        endpoint: &Endpoint,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Option<Bytes>,
        timeout: Duration,
    ) -> ComputeResult<Response> {
        let what = format!("{method} {}{path}", endpoint.authority());
        match tokio::time::timeout(
            timeout,
            self.request_inner(endpoint, method, path, headers, body),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ComputeError::Timeout {
                what,
                after: timeout,
            }),
        }
    }

    async fn request_inner(
        &self,
        endpoint: &Endpoint,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Option<Bytes>,
    ) -> ComputeResult<Response> {
        let body = body.unwrap_or_default();
        let mut builder = http::Request::builder()
            .method(method)
            .uri(path)
            .header("host", endpoint.authority())
            .header("user-agent", USER_AGENT)
            .header("content-length", body.len().to_string());
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| ComputeError::Http(format!("invalid request: {e}")))?;

        let stream = tokio::net::TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| ComputeError::Http(format!("connect {}: {e}", endpoint.authority())))?;

        match endpoint.scheme {
            Scheme::Http => exchange(stream, request).await,
            Scheme::Https => {
                let server_name = rustls::pki_types::ServerName::try_from(endpoint.host.clone())
                    .map_err(|e| ComputeError::Tls(format!("invalid server name: {e}")))?;
                let tls_stream = self
                    .tls
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| ComputeError::Tls(format!("handshake with {}: {e}", endpoint.host)))?;
                exchange(tls_stream, request).await
            }
        }
    }
}

async fn exchange<S>(stream: S, request: http::Request<Full<Bytes>>) -> ComputeResult<Response>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ComputeError::Http(format!("handshake failed: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "http connection closed with error");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| ComputeError::Http(format!("request failed: {e}")))?;

    let status = response.status().as_u16();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| ComputeError::Http(format!("reading body failed: {e}")))?
        .to_bytes();

    Ok(Response { status, body })
}
