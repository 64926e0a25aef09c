//! Build an `Evaluator` from a stored description of it.
//!
//! The description is JSON. Each shim and validator is an externally tagged
//! object, e.g.
//!
//! ```json
//! {
//!   "parser": {
//!     "shims": [{"elixir": {"client_id": "my-client"}}],
//!     "issuers": {"https://idp.example.org": "my-client"}
//!   },
//!   "validator": {"and": {"validators": [
//!     {"simple": {"claims": {"Role": "researcher"}}},
//!     {"simple": {"claims": {"BonaFide": true}}}
//!   ]}}
//! }
//! ```
//!
//! A missing validator denies everything.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::identity::{ClaimValue, Identity};
use crate::parser::Parser;
use crate::shim::{ElixirShim, Shim, StaticShim};
use crate::validator::{Simple, Validator};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub validator: Option<ValidatorConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub shims: Vec<ShimConfig>,
    /// Issuer base URL -> expected client id (audience).
    #[serde(default)]
    pub issuers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShimConfig {
    Elixir { client_id: String },
    Static { identity: Identity },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorConfig {
    Constant { value: bool },
    Simple { claims: BTreeMap<String, ClaimValue> },
    And { validators: Vec<ValidatorConfig> },
    Or { validators: Vec<ValidatorConfig> },
}

pub fn parse_config(text: &str) -> Result<EvaluatorConfig> {
    serde_json::from_str(text).map_err(|e| Error::config(format!("unmarshaling evaluator: {}", e)))
}

/// Construct an evaluator. Issuer discovery happens here, so this is the
/// point where an unreachable or misconfigured issuer stops startup.
pub async fn build(client: &reqwest::Client, cfg: &EvaluatorConfig) -> Result<Evaluator> {
    let parser = build_parser(client, &cfg.parser).await
        .map_err(|e| Error::config(format!("building parser: {}", e)))?;
    let validator = match &cfg.validator {
        Some(v) => build_validator(v).map_err(|e| Error::config(format!("building validator: {}", e)))?,
        None => Validator::constant(false),
    };
    Ok(Evaluator::new(parser, validator))
}

async fn build_parser(client: &reqwest::Client, p: &ParserConfig) -> Result<Parser> {
    let mut shims = Vec::with_capacity(p.shims.len());
    for s in &p.shims {
        shims.push(build_shim(client, s).await?);
    }
    Parser::new(client, shims, &p.issuers).await
}

async fn build_shim(client: &reqwest::Client, s: &ShimConfig) -> Result<Shim> {
    match s {
        ShimConfig::Elixir { client_id } => {
            let shim = ElixirShim::new(client, client_id).await
                .map_err(|e| Error::config(format!("building Elixir shim: {}", e)))?;
            Ok(shim.into())
        }
        ShimConfig::Static { identity } => Ok(StaticShim::new(identity.clone()).into()),
    }
}

pub fn build_validator(v: &ValidatorConfig) -> Result<Validator> {
    match v {
        ValidatorConfig::Constant { value } => Ok(Validator::constant(*value)),
        ValidatorConfig::Simple { claims } => Ok(Simple::new(claims.iter().map(|(k, v)| (k, v.clone())))?.into()),
        ValidatorConfig::And { validators } => Ok(Validator::And(build_validators("and", validators)?)),
        ValidatorConfig::Or { validators } => Ok(Validator::Or(build_validators("or", validators)?)),
    }
}

fn build_validators(kind: &str, vs: &[ValidatorConfig]) -> Result<Vec<Validator>> {
    if vs.is_empty() {
        return Err(Error::config(format!("'{}' validator requires at least one child", kind)));
    }
    vs.iter()
        .map(|v| build_validator(v).map_err(|e| Error::config(format!("building '{}' validator: {}", kind, e))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StringValue;

    fn id() -> Identity {
        Identity {
            origin_organization: vec![StringValue::new("Earth", ""), StringValue::new("Mars", "")],
            role: vec![StringValue::new("human", ""), StringValue::new("person", "")],
            ..Default::default()
        }
    }

    fn validator(json: &str) -> Validator {
        build_validator(&serde_json::from_str(json).unwrap()).unwrap()
    }

    #[test]
    fn build_validator_cases() {
        let cases = [
            ("simple", r#"{"simple": {"claims": {"OriginOrganization": "Mars", "Role": "person"}}}"#, true),
            ("constant true", r#"{"constant": {"value": true}}"#, true),
            ("constant false", r#"{"constant": {"value": false}}"#, false),
            ("boolean and", r#"{"and": {"validators": [
                {"simple": {"claims": {"Role": "human"}}},
                {"simple": {"claims": {"OriginOrganization": "Earth"}}}
            ]}}"#, true),
            ("boolean or", r#"{"or": {"validators": [
                {"simple": {"claims": {"Role": "robot"}}},
                {"simple": {"claims": {"Role": "toaster"}}}
            ]}}"#, false),
        ];
        for (name, json, ok) in cases {
            assert_eq!(validator(json).validate(Some(&id())).unwrap(), ok, "{}", name);
        }
    }

    #[test]
    fn rejects_empty_combinators_and_unknown_claims() {
        for json in [r#"{"and": {"validators": []}}"#, r#"{"or": {"validators": []}}"#, r#"{"simple": {"claims": {"Planet": "Mars"}}}"#] {
            let cfg: ValidatorConfig = serde_json::from_str(json).unwrap();
            assert!(matches!(build_validator(&cfg), Err(Error::Config(_))), "{}", json);
        }
        // nested failures surface too
        let cfg: ValidatorConfig = serde_json::from_str(r#"{"or": {"validators": [{"and": {"validators": []}}]}}"#).unwrap();
        assert!(build_validator(&cfg).is_err());
    }

    #[tokio::test]
    async fn missing_validator_denies() {
        let cfg = parse_config(r#"{"parser": {"shims": [{"static": {"identity": {"sub": "s", "iss": "static"}}}]}}"#).unwrap();
        let ev = build(&reqwest::Client::new(), &cfg).await.unwrap();
        assert!(matches!(ev.evaluate("token").await, Err(Error::ValidationFailed)));
    }

    #[test]
    fn bad_json_is_a_config_error() {
        assert!(matches!(parse_config("{not json"), Err(Error::Config(_))));
    }
}
