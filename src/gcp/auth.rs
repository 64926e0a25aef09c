//! The warehouse's own credential for calling the IAM APIs.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use super::iam::{IamError, IamResult};

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the metadata server says they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expiration: DateTime<Utc>,
}

impl CachedToken {
    fn fresh(&self) -> bool { Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expiration }
}

/// Token endpoint of a metadata server and the last token it handed out.
#[derive(Debug)]
pub struct MetadataServer {
    client: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Debug)]
pub enum CredentialSource {
    /// A bearer token supplied by the operator, used as-is.
    Static(String),
    /// The default service account token from the GCE/GKE metadata server.
    Metadata(MetadataServer),
}

impl CredentialSource {
    pub fn metadata(client: reqwest::Client) -> Self { Self::metadata_at(client, METADATA_TOKEN_URL) }

    pub fn metadata_at(client: reqwest::Client, url: impl Into<String>) -> Self {
        CredentialSource::Metadata(MetadataServer { client, url: url.into(), cached: Mutex::new(None) })
    }

    pub async fn token(&self) -> IamResult<String> {
        let MetadataServer { client, url, cached } = match self {
            CredentialSource::Static(token) => return Ok(token.clone()),
            CredentialSource::Metadata(server) => server,
        };
        let hit = cached.lock().as_ref().filter(|t| t.fresh()).map(|t| t.token.clone());
        if let Some(token) = hit {
            return Ok(token);
        }

        debug!(target: "ga4gh::gcp", "fetching default account token from metadata server");
        let resp = client
            .get(url.as_str())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| IamError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(IamError::Api { status: status.as_u16(), message });
        }
        let body: MetadataTokenResponse = resp.json().await.map_err(|e| IamError::Decode(e.to_string()))?;
        let fresh = CachedToken { token: body.access_token, expiration: Utc::now() + Duration::seconds(body.expires_in) };
        *cached.lock() = Some(fresh.clone());
        Ok(fresh.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};

    async fn serve(hits: Arc<AtomicUsize>, expires_in: i64) -> String {
        let app = Router::new()
            .route(
                "/token",
                get(move |State(hits): State<Arc<AtomicUsize>>, headers: HeaderMap| async move {
                    assert_eq!(headers.get("metadata-flavor").and_then(|v| v.to_str().ok()), Some("Google"));
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({"access_token": format!("tok-{}", n), "expires_in": expires_in, "token_type": "Bearer"}))
                }),
            )
            .with_state(hits);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}/token", addr)
    }

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        assert_eq!(CredentialSource::Static("abc".into()).token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn metadata_token_is_cached_until_near_expiry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let src = CredentialSource::metadata_at(reqwest::Client::new(), serve(hits.clone(), 3600).await);
        assert_eq!(src.token().await.unwrap(), "tok-0");
        assert_eq!(src.token().await.unwrap(), "tok-0");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let hits = Arc::new(AtomicUsize::new(0));
        let short = CredentialSource::metadata_at(reqwest::Client::new(), serve(hits.clone(), 30).await);
        assert_eq!(short.token().await.unwrap(), "tok-0");
        assert_eq!(short.token().await.unwrap(), "tok-1");
    }
}
