//! Upstream transports
//!
//! One round trip to an engine endpoint, over TCP (plain or TLS) or a Unix
//! domain socket. Request and response bodies are streamed.

use crate::error::ProxyError;
use crate::store::TlsConfiguration;
use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::{HeaderValue, Request, Response, header};
use hyper_util::rt::TokioIo;
use reqwest::{Certificate, Identity, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::{debug, instrument};

/// Transport family selected for an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Http,
    Https,
    Socket,
}

/// A round trip to the engine
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send `request` (origin-form URI) and return the engine's response
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError>;

    fn kind(&self) -> UpstreamKind;
}

/// TCP transport backed by a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base: Url,
    kind: UpstreamKind,
}

impl HttpUpstream {
    /// Build a client for `host:port`, using TLS when `tls.tls` is set
    pub async fn new(
        host: &str,
        port: u16,
        tls: &TlsConfiguration,
        connect_timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let (scheme, kind) = if tls.tls {
            ("https", UpstreamKind::Https)
        } else {
            ("http", UpstreamKind::Http)
        };

        let base_str = format!("{}://{}:{}", scheme, host, port);
        let base = Url::parse(&base_str).map_err(|e| ProxyError::InvalidUrl {
            url: base_str.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);

        if tls.tls {
            builder = builder.use_rustls_tls();

            if tls.tls_skip_verify {
                builder = builder.danger_accept_invalid_certs(true);
            } else if let Some(ca_path) = &tls.tls_ca_cert_path {
                let pem = read_tls_file(ca_path).await?;
                let ca = Certificate::from_pem(&pem)
                    .map_err(|e| ProxyError::Tls(format!("invalid CA certificate: {e}")))?;
                builder = builder.add_root_certificate(ca);
            }

            if let (Some(cert_path), Some(key_path)) = (&tls.tls_cert_path, &tls.tls_key_path) {
                let mut pem = read_tls_file(cert_path).await?;
                pem.push(b'\n');
                pem.extend(read_tls_file(key_path).await?);
                let identity = Identity::from_pem(&pem)
                    .map_err(|e| ProxyError::Tls(format!("invalid client certificate: {e}")))?;
                builder = builder.identity(identity);
            }
        }

        let client = builder
            .build()
            .map_err(|e| ProxyError::Tls(format!("failed to build client: {e}")))?;

        Ok(Self { client, base, kind })
    }
}

async fn read_tls_file(path: &Path) -> Result<Vec<u8>, ProxyError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ProxyError::Tls(format!("unable to read {}: {e}", path.display())))
}

#[async_trait]
impl Upstream for HttpUpstream {
    #[instrument(skip_all, fields(base = %self.base, uri = %request.uri()))]
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let (parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self
            .base
            .join(path_and_query)
            .map_err(|e| ProxyError::InvalidUrl {
                url: path_and_query.to_string(),
                reason: e.to_string(),
            })?;

        let mut builder = self.client.request(parts.method, url).headers(parts.headers);
        if body.size_hint().exact() != Some(0) {
            builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = builder.send().await.map_err(|e| {
            debug!(error = %e, "Engine request failed");
            ProxyError::Upstream(e.to_string())
        })?;

        let mut response = Response::builder().status(upstream.status());
        if let Some(headers) = response.headers_mut() {
            headers.extend(
                upstream
                    .headers()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
        }

        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| ProxyError::Response(e.to_string()))
    }

    fn kind(&self) -> UpstreamKind {
        self.kind
    }
}

/// Unix domain socket transport; one HTTP/1 connection per round trip
#[derive(Debug, Clone)]
pub struct SocketUpstream {
    path: PathBuf,
}

impl SocketUpstream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Upstream for SocketUpstream {
    #[instrument(skip_all, fields(socket = %self.path.display(), uri = %request.uri()))]
    async fn round_trip(&self, mut request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| ProxyError::Upstream(format!("{}: {e}", self.path.display())))?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "Engine socket connection closed with error");
            }
        });

        // The engine ignores the host, but HTTP/1.1 requires one
        request
            .headers_mut()
            .insert(header::HOST, HeaderValue::from_static("docker"));

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        Ok(response.map(Body::new))
    }

    fn kind(&self) -> UpstreamKind {
        UpstreamKind::Socket
    }
}
