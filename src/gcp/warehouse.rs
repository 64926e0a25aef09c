//! Maps external subjects onto Google service accounts and mints credentials
//! for them.
//!
//! Every subject gets exactly one backing account, named by a hash of the
//! subject so no mapping table is needed. Accounts are created on first use
//! and bound into a role that must already exist in the project policy. Every
//! lookup re-checks that binding, so out-of-band policy edits heal on the next
//! request.
//!
//! Provisioning for one subject is serialized in-process. Across processes a
//! duplicate create is resolved by fetching the account the other writer made.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use parking_lot::Mutex;
use sha3::{Digest, Sha3_224};
use tracing::{debug, info};

use super::iam::{IamBackend, IamError};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct AccountWarehouseOptions {
    pub project: String,
    /// `roles/<name>` or `projects/<id>/roles/<name>`; the latter binds on `<id>`.
    pub default_role: String,
    pub scopes: Vec<String>,
}

type Gates = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct AccountWarehouse {
    iam: Arc<dyn IamBackend>,
    opts: AccountWarehouseOptions,
    gates: Gates,
}

impl std::fmt::Debug for AccountWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountWarehouse").field("opts", &self.opts).finish_non_exhaustive()
    }
}

/// Holds a subject's provisioning gate; the map entry goes away with the last
/// holder, including when the owning future is dropped mid-flight.
struct Flight<'a> {
    gates: &'a Gates,
    key: String,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> Flight<'a> {
    fn join(gates: &'a Gates, key: &str) -> Self {
        let gate = gates.lock().entry(key.to_string()).or_default().clone();
        Flight { gates, key: key.to_string(), gate }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock();
        // one reference in the map, one here
        if Arc::strong_count(&self.gate) <= 2 {
            gates.remove(&self.key);
        }
    }
}

/// Deterministic account id for a subject: `i` plus the first 29 hex digits of
/// its SHA3-224. Starts with a letter and fits the 6..30 character limit.
pub fn hash_id(subject: &str) -> String {
    let digest = Sha3_224::digest(subject.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(29);
    format!("i{}", id)
}

/// `projects/<id>/roles/<name>` lives in `<id>`; any other role is bound on
/// `default_project`.
pub fn role_project<'a>(default_project: &'a str, role: &'a str) -> &'a str {
    let parts: Vec<&str> = role.split('/').collect();
    match parts.as_slice() {
        ["projects", project, _, _] => *project,
        _ => default_project,
    }
}

pub fn account_name(project: &str, email: &str) -> String { format!("projects/{}/serviceAccounts/{}", project, email) }

impl AccountWarehouse {
    pub fn new(iam: Arc<dyn IamBackend>, opts: AccountWarehouseOptions) -> Self {
        Self { iam, opts, gates: Mutex::new(HashMap::new()) }
    }

    pub fn options(&self) -> &AccountWarehouseOptions { &self.opts }

    /// The project whose policy holds the configured role.
    pub fn role_project(&self) -> &str { role_project(&self.opts.project, &self.opts.default_role) }

    /// Email of the subject's backing account, creating and binding it if needed.
    pub async fn get_backing_account(&self, subject: &str) -> Result<String> {
        let flight = Flight::join(&self.gates, subject);
        let _turn = flight.gate.lock().await;

        let hid = hash_id(subject);
        let email = format!("{}@{}.iam.gserviceaccount.com", hid, self.opts.project);
        let name = account_name(&self.opts.project, &email);

        match self.iam.get_service_account(&name).await {
            Ok(account) => {
                self.configure_role(&account.email).await?;
                return Ok(account.email);
            }
            Err(IamError::NotFound(_)) => {}
            Err(e) => return Err(Error::provider("getting account", e)),
        }

        let account = match self.iam.create_service_account(&self.opts.project, &hid, subject).await {
            Ok(account) => {
                info!(target: "ga4gh::warehouse", account = %account.email, "created backing account");
                account
            }
            Err(IamError::AlreadyExists(_)) => {
                debug!(target: "ga4gh::warehouse", account = %email, "account created concurrently; fetching");
                self.iam
                    .get_service_account(&name)
                    .await
                    .map_err(|e| Error::provider("getting concurrently created account", e))?
            }
            Err(e) => return Err(Error::provider("creating backing account", e)),
        };
        self.configure_role(&account.email).await?;
        Ok(account.email)
    }

    /// Make `email` a member of the configured role's existing binding. Writes
    /// the policy only when the member is missing.
    pub async fn configure_role(&self, email: &str) -> Result<()> {
        let role = &self.opts.default_role;
        let project = self.role_project();

        let mut policy = self
            .iam
            .get_iam_policy(project)
            .await
            .map_err(|e| Error::provider(format!("getting IAM policy for project {:?}", project), e))?;

        let binding = policy
            .bindings
            .iter_mut()
            .find(|b| &b.role == role)
            .ok_or_else(|| Error::config(format!("no bindings for {:?} in policy of project {:?}", role, project)))?;

        let member = format!("serviceAccount:{}", email);
        if binding.members.contains(&member) {
            return Ok(());
        }
        binding.members.push(member);

        self.iam
            .set_iam_policy(project, policy)
            .await
            .map_err(|e| Error::provider(format!("setting IAM policy for project {:?}", project), e))?;
        debug!(target: "ga4gh::warehouse", account = %email, role = %role, project = %project, "bound account to role");
        Ok(())
    }

    /// A new credential file for the subject's account. Earlier keys are left
    /// in place.
    pub async fn get_account_key(&self, subject: &str) -> Result<Vec<u8>> {
        let account = self.get_backing_account(subject).await?;
        // TODO: delete older user-managed keys before issuing a new one; accounts cap at 10 keys.
        let key = self
            .iam
            .create_key(&account_name("-", &account))
            .await
            .map_err(|e| Error::provider("creating key", e))?;
        base64::engine::general_purpose::STANDARD
            .decode(key.private_key_data.as_bytes())
            .map_err(|e| Error::Decode { what: "key", message: e.to_string() })
    }

    /// A fresh access token for the subject's account, limited to the
    /// configured scopes. Tokens are never cached.
    pub async fn get_access_token(&self, subject: &str) -> Result<String> {
        let account = self.get_backing_account(subject).await?;
        let token = self
            .iam
            .generate_access_token(&account_name("-", &account), &self.opts.scopes)
            .await
            .map_err(|e| Error::provider("generating access token", e))?;
        Ok(token.access_token)
    }
}
