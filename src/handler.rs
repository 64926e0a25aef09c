//! Inbound HTTP authorization and the key vendor endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::evaluator::Evaluator;
use crate::gcp::AccountWarehouse;
use crate::identity::AuthenticatedIdentity;

/// Middleware that admits only requests whose bearer token evaluates, and
/// attaches the resulting `Identity` to the request extensions.
pub async fn require_identity(State(evaluator): State<Arc<Evaluator>>, mut request: Request, next: Next) -> Response {
    let header = request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()).unwrap_or("");
    let token = match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.to_string(),
        _ => return (StatusCode::UNAUTHORIZED, "authorization requires a bearer token").into_response(),
    };

    match evaluator.evaluate(&token).await {
        Ok(id) => {
            request.extensions_mut().insert(id);
            next.run(request).await
        }
        Err(e) => {
            info!(target: "ga4gh::handler", code = e.code_str(), error = %e, "authorization rejected");
            (StatusCode::UNAUTHORIZED, "not authorized").into_response()
        }
    }
}

#[derive(Clone)]
struct VendorState {
    warehouse: Arc<AccountWarehouse>,
}

/// Non-authorization failures as the caller sees them. Details stay in the log.
fn failure_response(e: &Error) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match status {
        StatusCode::SERVICE_UNAVAILABLE => "service unavailable",
        StatusCode::BAD_GATEWAY => "bad gateway",
        _ => "internal server error",
    };
    (status, body).into_response()
}

async fn get_account_key(State(state): State<VendorState>, AuthenticatedIdentity(id): AuthenticatedIdentity) -> Response {
    match state.warehouse.get_account_key(&id.subject).await {
        Ok(key) => {
            info!(target: "ga4gh::vendor", subject = %id.subject, issuer = %id.issuer, "issued account key");
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(key))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            if matches!(e, Error::Config(_)) {
                error!(target: "ga4gh::vendor", subject = %id.subject, error = %e, "getting account key");
            } else {
                warn!(target: "ga4gh::vendor", subject = %id.subject, error = %e, "getting account key");
            }
            failure_response(&e)
        }
    }
}

/// Routes of the key vendor daemon.
pub fn key_vendor_router(evaluator: Arc<Evaluator>, warehouse: Arc<AccountWarehouse>) -> Router {
    let protected = Router::new()
        .route("/v1/GetAccountKey", get(get_account_key).post(get_account_key))
        .with_state(VendorState { warehouse })
        .layer(middleware::from_fn_with_state(evaluator, require_identity));

    Router::new().route("/healthz", get(|| async { "ok" })).merge(protected)
}
