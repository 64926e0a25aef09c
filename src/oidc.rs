//! Per-issuer signed token verification.
//!
//! An `IssuerVerifier` is resolved once, at startup, from the issuer's OpenID
//! Connect discovery document and the key set it points at. After that it is
//! immutable: no refresh on unknown key ids and no TTL, so a parser built at
//! startup keeps exactly the keys it saw then.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A single signing key trusted for one issuer.
#[derive(Clone)]
pub struct VerificationKey {
    pub kid: Option<String>,
    pub alg: Algorithm,
    pub key: DecodingKey,
}

impl VerificationKey {
    pub fn new(kid: Option<&str>, alg: Algorithm, key: DecodingKey) -> Self {
        Self { kid: kid.map(str::to_string), alg, key }
    }

    /// Convert a published JWK. Encryption keys and keys whose algorithm cannot
    /// be determined yield `None`.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) { return None; }
        let alg = match jwk.common.key_algorithm {
            Some(ka) => signing_algorithm(ka)?,
            None => default_algorithm(&jwk.algorithm)?,
        };
        let key = DecodingKey::from_jwk(jwk).ok()?;
        Some(Self { kid: jwk.common.key_id.clone(), alg, key })
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey").field("kid", &self.kid).field("alg", &self.alg).finish()
    }
}

fn signing_algorithm(ka: KeyAlgorithm) -> Option<Algorithm> {
    Some(match ka {
        KeyAlgorithm::HS256 => Algorithm::HS256,
        KeyAlgorithm::HS384 => Algorithm::HS384,
        KeyAlgorithm::HS512 => Algorithm::HS512,
        KeyAlgorithm::ES256 => Algorithm::ES256,
        KeyAlgorithm::ES384 => Algorithm::ES384,
        KeyAlgorithm::RS256 => Algorithm::RS256,
        KeyAlgorithm::RS384 => Algorithm::RS384,
        KeyAlgorithm::RS512 => Algorithm::RS512,
        KeyAlgorithm::PS256 => Algorithm::PS256,
        KeyAlgorithm::PS384 => Algorithm::PS384,
        KeyAlgorithm::PS512 => Algorithm::PS512,
        KeyAlgorithm::EdDSA => Algorithm::EdDSA,
        _ => return None,
    })
}

fn default_algorithm(params: &AlgorithmParameters) -> Option<Algorithm> {
    match params {
        AlgorithmParameters::RSA(_) => Some(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
            EllipticCurve::P256 => Some(Algorithm::ES256),
            EllipticCurve::P384 => Some(Algorithm::ES384),
            _ => None,
        },
        AlgorithmParameters::OctetKeyPair(_) => Some(Algorithm::EdDSA),
        AlgorithmParameters::OctetKey(_) => Some(Algorithm::HS256),
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

/// Verifies tokens for exactly one issuer and one expected audience.
#[derive(Debug, Clone)]
pub struct IssuerVerifier {
    issuer: String,
    audience: String,
    keys: Vec<VerificationKey>,
}

impl IssuerVerifier {
    pub fn from_keys(issuer: impl Into<String>, audience: impl Into<String>, keys: Vec<VerificationKey>) -> Self {
        Self { issuer: issuer.into(), audience: audience.into(), keys }
    }

    pub fn from_jwks(issuer: impl Into<String>, audience: impl Into<String>, jwks: &JwkSet) -> Self {
        let keys = jwks.keys.iter().filter_map(VerificationKey::from_jwk).collect();
        Self::from_keys(issuer, audience, keys)
    }

    /// Resolve `<issuer>/.well-known/openid-configuration` and the key set it
    /// names. The discovered issuer must equal the configured one exactly.
    pub async fn discover(client: &reqwest::Client, issuer: &str, audience: &str) -> Result<Self> {
        let discovery_url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
        info!(target: "ga4gh::oidc", issuer = %issuer, "Fetching OIDC discovery document");
        let doc: DiscoveryDocument = fetch_json(client, &discovery_url).await
            .map_err(|e| Error::config(format!("creating provider for {:?}: {}", issuer, e)))?;
        if doc.issuer != issuer {
            return Err(Error::config(format!("creating provider for {:?}: issuer did not match the issuer returned by provider, expected {:?} got {:?}", issuer, issuer, doc.issuer)));
        }
        let jwks: JwkSet = fetch_json(client, &doc.jwks_uri).await
            .map_err(|e| Error::config(format!("fetching keys for {:?}: {}", issuer, e)))?;
        let verifier = Self::from_jwks(issuer, audience, &jwks);
        if verifier.keys.is_empty() {
            return Err(Error::config(format!("no usable signing keys published by {:?}", issuer)));
        }
        info!(target: "ga4gh::oidc", issuer = %issuer, jwks_uri = %doc.jwks_uri, keys = verifier.keys.len(), "OIDC discovery successful");
        Ok(verifier)
    }

    pub fn issuer(&self) -> &str { &self.issuer }

    pub fn audience(&self) -> &str { &self.audience }

    /// Fully verify signature, expiry, issuer and audience, then decode the
    /// claim set into `T`.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let header = decode_header(token).map_err(|e| Error::Verification(e.to_string()))?;
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // expiry is checked without clock skew allowance
        validation.leeway = 0;

        let candidates = self.keys.iter().filter(|k| {
            k.alg == header.alg && (header.kid.is_none() || k.kid.is_none() || k.kid == header.kid)
        });
        let mut last_err = None;
        for k in candidates {
            match decode::<T>(token, &k.key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => last_err = Some(e),
                Err(e) => return Err(Error::Verification(e.to_string())),
            }
        }
        debug!(target: "ga4gh::oidc", issuer = %self.issuer, kid = ?header.kid, alg = ?header.alg, "no key verified token");
        Err(Error::Verification(match last_err {
            Some(e) => format!("failed to verify signature: {}", e),
            None => format!("no {:?} key for kid {:?}", header.alg, header.kid),
        }))
    }
}

async fn fetch_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> std::result::Result<T, String> {
    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("{}: HTTP {}", url, resp.status()));
    }
    resp.json::<T>().await.map_err(|e| e.to_string())
}

#[derive(Debug, Deserialize)]
struct BaseClaims {
    #[serde(default)]
    iss: Option<String>,
}

/// Read the `iss` claim without verifying anything. This only selects which
/// verifier to run; that verifier re-checks signature, issuer, audience and
/// expiry before any claim is trusted.
pub fn peek_issuer(token: &str) -> Result<String> {
    decode_header(token).map_err(|e| Error::MalformedToken(e.to_string()))?;
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return Err(Error::MalformedToken("compact JWS format must have three parts".into()));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::MalformedToken(format!("decoding payload: {}", e)))?;
    let claims: BaseClaims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("extracting base claims: {}", e)))?;
    Ok(claims.iss.unwrap_or_default())
}
