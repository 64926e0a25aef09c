//! ELIXIR AAI identities translated into GA4GH identities.

use serde::Deserialize;

use crate::error::Result;
use crate::identity::{BoolValue, Identity};
use crate::oidc::IssuerVerifier;

pub const ELIXIR_ISSUER: &str = "https://login.elixir-czech.org/oidc/";

#[derive(Debug, Deserialize)]
struct ElixirClaims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    iss: String,
    #[serde(default)]
    bona_fide_status: Option<String>,
}

/// Accepts tokens issued by ELIXIR whose audience is the configured client id.
#[derive(Debug, Clone)]
pub struct ElixirShim {
    verifier: IssuerVerifier,
}

impl ElixirShim {
    /// Discover the ELIXIR issuer and build a shim that rejects tokens whose
    /// audience is not `client_id`.
    pub async fn new(client: &reqwest::Client, client_id: &str) -> Result<Self> {
        let verifier = IssuerVerifier::discover(client, ELIXIR_ISSUER, client_id).await?;
        Ok(Self { verifier })
    }

    pub fn with_verifier(verifier: IssuerVerifier) -> Self { Self { verifier } }

    pub fn shim(&self, auth: &str) -> Result<Identity> {
        let claims: ElixirClaims = self.verifier.verify(auth)?;
        let mut id = Identity { issuer: claims.iss, subject: claims.sub, ..Default::default() };
        // A non-empty status string is the assertion; its contents are not inspected.
        if claims.bona_fide_status.as_deref().is_some_and(|s| !s.is_empty()) {
            id.bona_fide.push(BoolValue::new(true, self.verifier.issuer()));
        }
        Ok(id)
    }
}
