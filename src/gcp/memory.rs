//! In-process `IamBackend` for tests and local runs without a cloud project.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;

use super::iam::{AccessToken, IamBackend, IamError, IamResult, Policy, ServiceAccount, ServiceAccountKey};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, ServiceAccount>,
    policies: HashMap<String, Policy>,
    fail_lookup: Option<u16>,
}

#[derive(Debug, Default)]
pub struct InMemoryIam {
    state: Mutex<State>,
    creates: AtomicUsize,
    policy_writes: AtomicUsize,
    keys: AtomicUsize,
    tokens: AtomicUsize,
}

impl InMemoryIam {
    pub fn new() -> Self { Self::default() }

    /// Seed the policy of `project` with an empty binding for each role.
    pub fn with_roles<I: IntoIterator<Item = S>, S: Into<String>>(self, project: &str, roles: I) -> Self {
        let bindings = roles
            .into_iter()
            .map(|role| super::iam::Binding { role: role.into(), members: Vec::new() })
            .collect();
        self.set_policy(project, Policy { version: Some(1), etag: None, bindings });
        self
    }

    pub fn set_policy(&self, project: &str, policy: Policy) { self.state.lock().policies.insert(project.to_string(), policy); }

    pub fn policy(&self, project: &str) -> Option<Policy> { self.state.lock().policies.get(project).cloned() }

    /// Make every account lookup fail with the given HTTP status.
    pub fn fail_lookups(&self, status: u16) { self.state.lock().fail_lookup = Some(status); }

    pub fn account_count(&self) -> usize { self.state.lock().accounts.len() }

    pub fn creates(&self) -> usize { self.creates.load(Ordering::SeqCst) }
    pub fn policy_writes(&self) -> usize { self.policy_writes.load(Ordering::SeqCst) }
    pub fn keys_issued(&self) -> usize { self.keys.load(Ordering::SeqCst) }
    pub fn tokens_issued(&self) -> usize { self.tokens.load(Ordering::SeqCst) }

    fn require_account(&self, name: &str) -> IamResult<ServiceAccount> {
        // Key and token calls address accounts as projects/-/serviceAccounts/<email>.
        let email = name.rsplit('/').next().unwrap_or(name);
        self.state
            .lock()
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned()
            .ok_or_else(|| IamError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl IamBackend for InMemoryIam {
    async fn get_service_account(&self, name: &str) -> IamResult<ServiceAccount> {
        let st = self.state.lock();
        if let Some(status) = st.fail_lookup {
            return Err(IamError::Api { status, message: "injected lookup failure".into() });
        }
        st.accounts.get(name).cloned().ok_or_else(|| IamError::NotFound(name.to_string()))
    }

    async fn create_service_account(&self, project: &str, account_id: &str, display_name: &str) -> IamResult<ServiceAccount> {
        let email = format!("{}@{}.iam.gserviceaccount.com", account_id, project);
        let name = format!("projects/{}/serviceAccounts/{}", project, email);
        let mut st = self.state.lock();
        if st.accounts.contains_key(&name) {
            return Err(IamError::AlreadyExists(name));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        let account = ServiceAccount {
            name: name.clone(),
            email,
            display_name: display_name.to_string(),
            unique_id: st.accounts.len().to_string(),
        };
        st.accounts.insert(name, account.clone());
        Ok(account)
    }

    async fn get_iam_policy(&self, project: &str) -> IamResult<Policy> {
        Ok(self.state.lock().policies.get(project).cloned().unwrap_or_default())
    }

    async fn set_iam_policy(&self, project: &str, policy: Policy) -> IamResult<Policy> {
        self.policy_writes.fetch_add(1, Ordering::SeqCst);
        self.state.lock().policies.insert(project.to_string(), policy.clone());
        Ok(policy)
    }

    async fn create_key(&self, account: &str) -> IamResult<ServiceAccountKey> {
        let sa = self.require_account(account)?;
        let n = self.keys.fetch_add(1, Ordering::SeqCst);
        let file = serde_json::json!({
            "type": "service_account",
            "client_email": sa.email,
            "private_key_id": format!("key-{}", n),
        });
        Ok(ServiceAccountKey {
            name: format!("{}/keys/key-{}", sa.name, n),
            private_key_data: base64::engine::general_purpose::STANDARD.encode(file.to_string()),
        })
    }

    async fn generate_access_token(&self, account: &str, scopes: &[String]) -> IamResult<AccessToken> {
        let sa = self.require_account(account)?;
        let n = self.tokens.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken {
            access_token: format!("mem.{}.{}.{}", sa.email, scopes.join(","), n),
            expire_time: (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
        })
    }
}
