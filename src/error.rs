//! Unified error model for identity evaluation and credential exchange.
//! Frontends (the authorization middleware, the key vendor and the proxy) map
//! these onto HTTP statuses through `http_status`.

use crate::gcp::IamError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Malformed input
    #[error("empty authorization")]
    EmptyAuthorization,
    #[error("parsing JWT: {0}")]
    MalformedToken(String),

    // Untrusted or unverifiable token
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("verifying token: {0}")]
    Verification(String),

    // Policy rejection
    #[error("validation failed")]
    ValidationFailed,
    #[error("validating identity: {0}")]
    Validation(String),

    #[error("parsing authorization: {0}")]
    Parse(#[source] Box<Error>),

    // Deployment defects: unknown claim names, missing role bindings, bad issuer metadata
    #[error("configuration error: {0}")]
    Config(String),

    // Remote IAM failures
    #[error("{op}: {source}")]
    Provider { op: String, #[source] source: IamError },
    #[error("decoding {what}: {message}")]
    Decode { what: &'static str, message: String },
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self { Error::Config(msg.into()) }

    pub fn provider<S: Into<String>>(op: S, source: IamError) -> Self { Error::Provider { op: op.into(), source } }

    pub fn code_str(&self) -> &'static str {
        match self {
            Error::EmptyAuthorization => "empty_authorization",
            Error::MalformedToken(_) => "malformed_token",
            Error::InvalidIssuer => "invalid_issuer",
            Error::Verification(_) => "verification_failed",
            Error::ValidationFailed => "validation_failed",
            Error::Validation(_) => "validation_error",
            Error::Parse(inner) => inner.code_str(),
            Error::Config(_) => "config_error",
            Error::Provider { .. } => "provider_error",
            Error::Decode { .. } => "decode_error",
        }
    }

    /// True for per-request outcomes a caller sees as "not authorized":
    /// malformed input, untrusted tokens and policy rejections.
    pub fn is_authorization_failure(&self) -> bool {
        match self {
            Error::EmptyAuthorization
            | Error::MalformedToken(_)
            | Error::InvalidIssuer
            | Error::Verification(_)
            | Error::ValidationFailed
            | Error::Validation(_) => true,
            Error::Parse(inner) => inner.is_authorization_failure(),
            Error::Config(_) | Error::Provider { .. } | Error::Decode { .. } => false,
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Parse(inner) => inner.http_status(),
            e if e.is_authorization_failure() => 401,
            Error::Provider { .. } => 503,
            Error::Decode { .. } => 502,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
