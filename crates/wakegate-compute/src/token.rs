//! OAuth access tokens for the Compute Engine API.
//!
//! Either a static token from configuration, or tokens minted by the GCE
//! metadata server for the instance's default service account, cached
//! until shortly before they expire.

use std::time::Duration;

use http::Method;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ComputeError, ComputeResult};
use crate::http::{Endpoint, HttpTransport};

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Upper bound on how long a metadata token is reused, whatever `expires_in` says.
const MAX_CACHE_LIFETIME: Duration = Duration::from_secs(60 * 60);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Where bearer tokens come from.
pub struct TokenSource {
    kind: Kind,
}

enum Kind {
    Static(String),
    Metadata {
        endpoint: Endpoint,
        cache: Mutex<Option<CachedToken>>,
    },
}

impl TokenSource {
    /// Static token, used verbatim on every request.
    pub fn fixed(token: &str) -> Self {
        Self {
            kind: Kind::Static(token.to_string()),
        }
    }

    /// Tokens from the metadata server at `host` (or `host:port`).
    pub fn metadata(host: &str) -> ComputeResult<Self> {
        Ok(Self {
            kind: Kind::Metadata {
                endpoint: Endpoint::http(host)?,
                cache: Mutex::new(None),
            },
        })
    }

    /// A valid bearer token.
    pub async fn token(&self, http: &HttpTransport) -> ComputeResult<String> {
        match &self.kind {
            Kind::Static(token) => Ok(token.clone()),
            Kind::Metadata { endpoint, cache } => {
                let mut cache = cache.lock().await;
                if let Some(cached) = cache.as_ref()
                    && Instant::now() < cached.refresh_at
                {
                    return Ok(cached.token.clone());
                }

                let fresh = fetch_metadata_token(http, endpoint).await?;
                let lifetime = Duration::from_secs(fresh.expires_in)
                    .saturating_sub(REFRESH_MARGIN)
                    .min(MAX_CACHE_LIFETIME);
                debug!(expires_in = fresh.expires_in, "fetched access token from metadata server");
                *cache = Some(CachedToken {
                    token: fresh.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(fresh.access_token)
            }
        }
    }
}

async fn fetch_metadata_token(
    http: &HttpTransport,
    endpoint: &Endpoint,
) -> ComputeResult<TokenResponse> {
    let path = format!("{}{TOKEN_PATH}", endpoint.base_path);
    let response = http
        .request(
            endpoint,
            Method::GET,
            &path,
            &[("metadata-flavor", "Google".to_string())],
            None,
            METADATA_TIMEOUT,
        )
        .await
        .map_err(|e| ComputeError::Auth(e.to_string()))?;

    if !response.is_success() {
        return Err(ComputeError::Auth(format!(
            "metadata server returned {}: {}",
            response.status,
            response.body_text()
        )));
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| ComputeError::Auth(format!("malformed token response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let http = HttpTransport::new().unwrap();
        let source = TokenSource::fixed("ya29.static");
        assert_eq!(source.token(&http).await.unwrap(), "ya29.static");
    }

    #[tokio::test]
    async fn metadata_token_is_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            TOKEN_PATH,
            get(move |headers: HeaderMap| {
                let counter = counter.clone();
                async move {
                    if headers.get("metadata-flavor").map(|v| v.as_bytes()) != Some(&b"Google"[..]) {
                        return (StatusCode::FORBIDDEN, String::new());
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::OK,
                        r#"{"access_token":"ya29.meta","expires_in":3599,"token_type":"Bearer"}"#
                            .to_string(),
                    )
                }
            }),
        );
        let host = serve(router).await;

        let http = HttpTransport::new().unwrap();
        let source = TokenSource::metadata(&host).unwrap();
        assert_eq!(source.token(&http).await.unwrap(), "ya29.meta");
        assert_eq!(source.token(&http).await.unwrap(), "ya29.meta");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn huge_expiry_is_capped() {
        let router = Router::new().route(
            TOKEN_PATH,
            get(|| async {
                r#"{"access_token":"ya29.long","expires_in":18446744073709551615,"token_type":"Bearer"}"#
            }),
        );
        let host = serve(router).await;

        let http = HttpTransport::new().unwrap();
        let source = TokenSource::metadata(&host).unwrap();
        assert_eq!(source.token(&http).await.unwrap(), "ya29.long");
        assert_eq!(source.token(&http).await.unwrap(), "ya29.long");
    }

    #[tokio::test]
    async fn metadata_error_is_auth_error() {
        let router = Router::new().route(
            TOKEN_PATH,
            get(|| async { (StatusCode::NOT_FOUND, "no service account") }),
        );
        let host = serve(router).await;

        let http = HttpTransport::new().unwrap();
        let source = TokenSource::metadata(&host).unwrap();
        let err = source.token(&http).await.unwrap_err();
        assert!(matches!(err, ComputeError::Auth(msg) if msg.contains("404")));
    }
}
