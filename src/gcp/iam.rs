use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IamError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("IAM API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("decoding response: {0}")]
    Decode(String),
}

pub type IamResult<T> = Result<T, IamError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub unique_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Project IAM policy. `etag` is carried through the read-modify-write so the
/// provider can reject writes based on a stale read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub name: String,
    /// Base64 of the credential file.
    #[serde(default)]
    pub private_key_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expire_time: String,
}

/// The slice of the Google IAM control plane the account warehouse needs.
/// Account and key names are full resource names
/// (`projects/<p>/serviceAccounts/<email>`).
#[async_trait]
pub trait IamBackend: Send + Sync {
    async fn get_service_account(&self, name: &str) -> IamResult<ServiceAccount>;
    async fn create_service_account(&self, project: &str, account_id: &str, display_name: &str) -> IamResult<ServiceAccount>;
    async fn get_iam_policy(&self, project: &str) -> IamResult<Policy>;
    async fn set_iam_policy(&self, project: &str, policy: Policy) -> IamResult<Policy>;
    async fn create_key(&self, account: &str) -> IamResult<ServiceAccountKey>;
    async fn generate_access_token(&self, account: &str, scopes: &[String]) -> IamResult<AccessToken>;
}
