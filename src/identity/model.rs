use serde::{Deserialize, Serialize};

/// A string claim value and the issuer or shim that asserted it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StringValue {
    pub value: String,
    #[serde(default)]
    pub source: String,
}

/// A boolean claim value and the issuer or shim that asserted it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoolValue {
    pub value: bool,
    #[serde(default)]
    pub source: String,
}

impl StringValue {
    pub fn new(value: impl Into<String>, source: impl Into<String>) -> Self { Self { value: value.into(), source: source.into() } }
}

impl BoolValue {
    pub fn new(value: bool, source: impl Into<String>) -> Self { Self { value, source: source.into() } }
}

/// A GA4GH identity as described by the Data Use and Researcher Identity
/// workstream. Every claim slot keeps all assertions in the order they were
/// produced; nothing is deduplicated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,

    #[serde(rename = "ga4gh.IdentityOriginOrganization", default)]
    pub origin_organization: Vec<StringValue>,
    #[serde(rename = "ga4gh.AcademicInstitutionAffiliations", default)]
    pub academic_institution_affiliations: Vec<StringValue>,
    #[serde(rename = "ga4gh.Role", default)]
    pub role: Vec<StringValue>,
    #[serde(rename = "ga4gh.HasAcknowledgedEthicsTerms", default)]
    pub has_acknowledged_ethics_terms: Vec<StringValue>,
    #[serde(rename = "ga4gh.ResearcherStatus.BonaFide", default)]
    pub bona_fide: Vec<BoolValue>,
}

/// Expected value for a claim comparison. Strings only ever equal string
/// claims and booleans only ever equal boolean claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ClaimValue {
    Bool(bool),
    String(String),
}

impl From<&str> for ClaimValue {
    fn from(s: &str) -> Self { ClaimValue::String(s.to_string()) }
}

impl From<String> for ClaimValue {
    fn from(s: String) -> Self { ClaimValue::String(s) }
}

impl From<bool> for ClaimValue {
    fn from(b: bool) -> Self { ClaimValue::Bool(b) }
}

impl std::fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimValue::Bool(b) => write!(f, "{}", b),
            ClaimValue::String(s) => write!(f, "{:?}", s),
        }
    }
}
