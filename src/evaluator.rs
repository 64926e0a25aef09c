use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::parser::Parser;
use crate::validator::Validator;

/// Parsing and validation of authorization tokens combined into one decision.
#[derive(Debug, Clone)]
pub struct Evaluator {
    pub parser: Parser,
    pub validator: Validator,
}

impl Evaluator {
    pub fn new(parser: Parser, validator: Validator) -> Self { Self { parser, validator } }

    /// Returns an identity only if `auth` both parses and validates.
    pub async fn evaluate(&self, auth: &str) -> Result<Identity> {
        if auth.is_empty() {
            return Err(Error::EmptyAuthorization);
        }
        let id = self.parser.parse(auth).await.map_err(|e| Error::Parse(Box::new(e)))?;
        if !self.validator.validate(Some(&id))? {
            debug!(target: "ga4gh::evaluator", subject = %id.subject, issuer = %id.issuer, "identity rejected by policy");
            return Err(Error::ValidationFailed);
        }
        Ok(id)
    }
}
