use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

use super::Identity;

/// Extractor for the identity the authorization middleware attached to the
/// request. Handlers mounted behind `handler::require_identity` take this as
/// an argument; a request that somehow skipped the middleware is rejected.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity(pub Identity);

impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(id) => Ok(AuthenticatedIdentity(id.clone())),
            None => {
                tracing::warn!(target: "ga4gh::handler", "Context missing identity");
                Err((StatusCode::UNAUTHORIZED, "not authorized"))
            }
        }
    }
}
