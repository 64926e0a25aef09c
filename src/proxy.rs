//! Reverse proxy that swaps caller bearer tokens for Google access tokens.
//!
//! A request carrying `Authorization: Bearer <token>` whose token evaluates
//! successfully is forwarded with the header replaced by a fresh access token
//! for the caller's backing account. Anything else goes upstream untouched:
//! other schemes, malformed headers, tokens that fail evaluation and tokens the
//! warehouse cannot mint for. The upstream decides what to do with those.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONNECTION, HOST};
use axum::http::{HeaderMap, HeaderValue, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use futures_util::TryStreamExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::gcp::AccountWarehouse;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug)]
pub struct Proxy {
    target: Uri,
    evaluator: Arc<Evaluator>,
    warehouse: Arc<AccountWarehouse>,
    client: reqwest::Client,
}

/// The token of a `Bearer <token>` header: exactly two whitespace separated
/// fields, scheme compared case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let fields: Vec<&str> = value.split_whitespace().collect();
    match fields.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => Some(token.to_string()),
        _ => None,
    }
}

/// Remove the fixed hop-by-hop set plus any header named in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    for name in listed.iter().map(String::as_str).chain(HOP_BY_HOP) {
        headers.remove(name);
    }
}

/// Upstream client. Redirects go back to the caller instead of being followed.
fn upstream_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::config(format!("building upstream client: {}", e)))
}

impl Proxy {
    /// `target` must be absolute; only its scheme and authority are used.
    pub fn new(target: Uri, evaluator: Arc<Evaluator>, warehouse: Arc<AccountWarehouse>) -> Result<Self> {
        if target.scheme().is_none() || target.authority().is_none() {
            return Err(Error::config(format!("proxy target {:?} must include scheme and host", target.to_string())));
        }
        Ok(Self { target, evaluator, warehouse, client: upstream_client()? })
    }

    pub fn target(&self) -> &Uri { &self.target }

    /// Prepare an inbound request for the upstream: translate its credential
    /// when possible, drop `Host` and point the URI at the target.
    pub async fn direct(&self, req: &mut Request<Body>) {
        if let Some(token) = bearer_token(req.headers()) {
            self.swap_auth_header(req.headers_mut(), &token).await;
        }

        req.headers_mut().remove(HOST);
        let mut parts = req.uri().clone().into_parts();
        parts.scheme = self.target.scheme().cloned();
        parts.authority = self.target.authority().cloned();
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(axum::http::uri::PathAndQuery::from_static("/"));
        }
        match Uri::from_parts(parts) {
            Ok(uri) => *req.uri_mut() = uri,
            Err(e) => warn!(target: "ga4gh::proxy", error = %e, "rewriting request URI"),
        }
    }

    /// Replace `Authorization` with a minted access token. Leaves the header
    /// alone on any failure.
    pub async fn swap_auth_header(&self, headers: &mut HeaderMap, auth: &str) {
        let id = match self.evaluator.evaluate(auth).await {
            Ok(id) => id,
            Err(e) => {
                warn!(target: "ga4gh::proxy", error = %e, "error during evaluation");
                return;
            }
        };
        let token = match self.warehouse.get_access_token(&id.subject).await {
            Ok(token) => token,
            Err(e) => {
                warn!(target: "ga4gh::proxy", subject = %id.subject, error = %e, "error getting access token");
                return;
            }
        };
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(v) => {
                headers.insert(AUTHORIZATION, v);
                debug!(target: "ga4gh::proxy", subject = %id.subject, "swapped authorization header");
            }
            Err(e) => warn!(target: "ga4gh::proxy", error = %e, "minted token is not a valid header value"),
        }
    }

    /// Send a directed request upstream and stream the answer back.
    pub async fn forward(&self, req: Request<Body>) -> Response<Body> {
        let (parts, body) = req.into_parts();
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        let upstream = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send()
            .await;
        let resp = match upstream {
            Ok(resp) => resp,
            Err(e) => {
                warn!(target: "ga4gh::proxy", uri = %parts.uri, error = %e, "upstream request failed");
                return (StatusCode::BAD_GATEWAY, "bad gateway").into_response();
            }
        };

        let mut out = Response::builder().status(resp.status());
        if let Some(h) = out.headers_mut() {
            let mut returned = resp.headers().clone();
            strip_hop_by_hop(&mut returned);
            h.extend(returned);
        }
        let uri = parts.uri;
        let stream = resp.bytes_stream().inspect_err(move |e| {
            warn!(target: "ga4gh::proxy", uri = %uri, error = %e, "upstream body interrupted");
        });
        out.body(Body::from_stream(stream))
            .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
    }

    /// Every path and method goes through the proxy.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().fallback(proxy_handler).with_state(self)
    }
}

async fn proxy_handler(State(proxy): State<Arc<Proxy>>, mut req: Request<Body>) -> Response<Body> {
    proxy.direct(&mut req).await;
    proxy.forward(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::{AccountWarehouseOptions, InMemoryIam};
    use crate::identity::{Identity, StringValue};
    use crate::parser::Parser;
    use crate::shim::StaticShim;
    use crate::validator::{Simple, Validator};

    const ROLE: &str = "roles/viewer";

    fn proxy(validator: Validator, roles: &[&str]) -> Proxy {
        let id = Identity { subject: "alice".into(), issuer: "static".into(), role: vec![StringValue::new("researcher", "static")], ..Default::default() };
        let ev = Evaluator::new(Parser::from_parts(vec![StaticShim::new(id).into()], vec![]), validator);
        let iam = Arc::new(InMemoryIam::new().with_roles("proj", roles.iter().copied()));
        let wh = AccountWarehouse::new(iam, AccountWarehouseOptions { project: "proj".into(), default_role: ROLE.into(), scopes: vec!["s1".into()] });
        Proxy::new("https://upstream.example:8443".parse().unwrap(), Arc::new(ev), Arc::new(wh)).unwrap()
    }

    fn researcher() -> Validator { Simple::new([("Role", "researcher")]).unwrap().into() }

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().uri("/bucket/object?alt=media").header(HOST, "proxy.local");
        if let Some(a) = auth {
            b = b.header(AUTHORIZATION, a);
        }
        b.body(Body::empty()).unwrap()
    }

    fn auth(req: &Request<Body>) -> Option<&str> { req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()) }

    #[test]
    fn bearer_token_shapes() {
        let h = |v: &str| {
            let mut m = HeaderMap::new();
            m.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
            m
        };
        assert_eq!(bearer_token(&h("Bearer abc")).as_deref(), Some("abc"));
        assert_eq!(bearer_token(&h("bEaReR   abc")).as_deref(), Some("abc"));
        assert_eq!(bearer_token(&h("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&h("Bearer")), None);
        assert_eq!(bearer_token(&h("Bearer a b")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn connection_listed_headers_are_stripped() {
        let mut h = HeaderMap::new();
        h.insert(CONNECTION, HeaderValue::from_static("X-Session-Hint, keep-alive"));
        h.insert("x-session-hint", HeaderValue::from_static("abc"));
        h.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        h.insert("x-request-id", HeaderValue::from_static("r1"));
        strip_hop_by_hop(&mut h);
        assert!(h.get(CONNECTION).is_none());
        assert!(h.get("x-session-hint").is_none());
        assert!(h.get("keep-alive").is_none());
        assert_eq!(h.get("x-request-id").unwrap(), "r1");
    }

    #[tokio::test]
    async fn bearer_is_swapped_and_target_applied() {
        let p = proxy(researcher(), &[ROLE]);
        let mut req = request(Some("Bearer caller-token"));
        p.direct(&mut req).await;
        let swapped = auth(&req).unwrap();
        assert!(swapped.starts_with("Bearer mem."), "{}", swapped);
        assert!(swapped.contains("s1"));
        assert!(req.headers().get(HOST).is_none());
        assert_eq!(req.uri().to_string(), "https://upstream.example:8443/bucket/object?alt=media");
    }

    #[tokio::test]
    async fn other_schemes_pass_through() {
        let p = proxy(researcher(), &[ROLE]);
        let mut req = request(Some("Basic dXNlcjpwYXNz"));
        p.direct(&mut req).await;
        assert_eq!(auth(&req), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(req.uri().authority().unwrap().as_str(), "upstream.example:8443");

        let mut bare = request(None);
        p.direct(&mut bare).await;
        assert_eq!(auth(&bare), None);
    }

    #[tokio::test]
    async fn failures_keep_the_original_header() {
        // evaluation rejects
        let p = proxy(Validator::constant(false), &[ROLE]);
        let mut req = request(Some("Bearer caller-token"));
        p.direct(&mut req).await;
        assert_eq!(auth(&req), Some("Bearer caller-token"));

        // minting fails: the role binding does not exist
        let p = proxy(researcher(), &[]);
        let mut req = request(Some("Bearer caller-token"));
        p.direct(&mut req).await;
        assert_eq!(auth(&req), Some("Bearer caller-token"));
    }

    #[test]
    fn relative_target_is_rejected() {
        let ev = Arc::new(Evaluator::new(Parser::default(), Validator::constant(false)));
        let wh = Arc::new(AccountWarehouse::new(Arc::new(InMemoryIam::new()), AccountWarehouseOptions::default()));
        let err = Proxy::new("/just/a/path".parse().unwrap(), ev, wh).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
