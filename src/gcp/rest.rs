//! `IamBackend` over the Google REST APIs.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::auth::CredentialSource;
use super::iam::{AccessToken, IamBackend, IamError, IamResult, Policy, ServiceAccount, ServiceAccountKey};

pub const IAM_ENDPOINT: &str = "https://iam.googleapis.com";
pub const CREDENTIALS_ENDPOINT: &str = "https://iamcredentials.googleapis.com";
pub const RESOURCE_MANAGER_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com";

const KEY_TYPE: &str = "TYPE_GOOGLE_CREDENTIALS_FILE";

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub iam: String,
    pub credentials: String,
    pub resource_manager: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            iam: IAM_ENDPOINT.into(),
            credentials: CREDENTIALS_ENDPOINT.into(),
            resource_manager: RESOURCE_MANAGER_ENDPOINT.into(),
        }
    }
}

impl Endpoints {
    /// All three APIs served from one base URL.
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self { iam: base.clone(), credentials: base.clone(), resource_manager: base }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

#[derive(Debug)]
pub struct GoogleIam {
    client: reqwest::Client,
    credentials: CredentialSource,
    endpoints: Endpoints,
}

impl GoogleIam {
    pub fn new(client: reqwest::Client, credentials: CredentialSource) -> Self {
        Self { client, credentials, endpoints: Endpoints::default() }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> IamResult<T> {
        let token = self.credentials.token().await?;
        let resp = req.bearer_auth(token).send().await.map_err(|e| IamError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return resp.json::<T>().await.map_err(|e| IamError::Decode(e.to_string()));
        }
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GoogleErrorBody>(&text).map(|b| b.error.message).unwrap_or(text);
        Err(match status {
            StatusCode::NOT_FOUND => IamError::NotFound(message),
            StatusCode::CONFLICT => IamError::AlreadyExists(message),
            _ => IamError::Api { status: status.as_u16(), message },
        })
    }
}

#[async_trait]
impl IamBackend for GoogleIam {
    async fn get_service_account(&self, name: &str) -> IamResult<ServiceAccount> {
        self.send(self.client.get(format!("{}/v1/{}", self.endpoints.iam, name))).await
    }

    async fn create_service_account(&self, project: &str, account_id: &str, display_name: &str) -> IamResult<ServiceAccount> {
        let url = format!("{}/v1/projects/{}/serviceAccounts", self.endpoints.iam, project);
        let body = json!({"accountId": account_id, "serviceAccount": {"displayName": display_name}});
        self.send(self.client.post(url).json(&body)).await
    }

    async fn get_iam_policy(&self, project: &str) -> IamResult<Policy> {
        let url = format!("{}/v1/projects/{}:getIamPolicy", self.endpoints.resource_manager, project);
        self.send(self.client.post(url).json(&json!({}))).await
    }

    async fn set_iam_policy(&self, project: &str, policy: Policy) -> IamResult<Policy> {
        let url = format!("{}/v1/projects/{}:setIamPolicy", self.endpoints.resource_manager, project);
        self.send(self.client.post(url).json(&json!({"policy": policy}))).await
    }

    async fn create_key(&self, account: &str) -> IamResult<ServiceAccountKey> {
        let url = format!("{}/v1/{}/keys", self.endpoints.iam, account);
        self.send(self.client.post(url).json(&json!({"privateKeyType": KEY_TYPE}))).await
    }

    async fn generate_access_token(&self, account: &str, scopes: &[String]) -> IamResult<AccessToken> {
        let url = format!("{}/v1/{}:generateAccessToken", self.endpoints.credentials, account);
        self.send(self.client.post(url).json(&json!({"scope": scopes}))).await
    }
}
