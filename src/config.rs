//! Environment configuration for the daemons.
//!
//! Both binaries read their settings from the environment. Loaders take a
//! lookup function so they can be driven from a map in tests; `from_env`
//! wires them to the process environment.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use axum::http::Uri;
use tracing::info;

use crate::builder::{self, EvaluatorConfig};
use crate::evaluator::Evaluator;
use crate::gcp::{role_project, AccountWarehouse, AccountWarehouseOptions, CredentialSource, GoogleIam, IamBackend, InMemoryIam};

pub const IAM_BACKEND_VAR: &str = "GA4GH_IAM_BACKEND";
pub const ACCESS_TOKEN_VAR: &str = "GA4GH_GCP_ACCESS_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Google,
    Memory,
}

#[derive(Debug, Clone)]
pub struct WarehouseSettings {
    pub options: AccountWarehouseOptions,
    pub backend: BackendKind,
    pub static_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub target: Uri,
    pub evaluator: EvaluatorConfig,
    pub warehouse: WarehouseSettings,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct KeyVendorSettings {
    pub evaluator: EvaluatorConfig,
    pub warehouse: WarehouseSettings,
    pub port: u16,
}

fn env_lookup(name: &str) -> Option<String> { env::var(name).ok() }

/// A set, non-empty variable.
pub fn require<F: Fn(&str) -> Option<String>>(get: &F, name: &str) -> Result<String> {
    match get(name) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("environment variable {:?} must be set", name),
    }
}

pub fn parse_port(name: &str, value: &str) -> Result<u16> {
    value.trim().parse::<u16>().with_context(|| format!("{} must be a port number, got {:?}", name, value))
}

/// Comma separated scopes; blanks are dropped.
pub fn parse_scopes(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

pub fn parse_backend(value: Option<&str>) -> Result<BackendKind> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("google") => Ok(BackendKind::Google),
        Some("memory") => Ok(BackendKind::Memory),
        Some(other) => Err(anyhow!("{} must be \"google\" or \"memory\", got {:?}", IAM_BACKEND_VAR, other)),
    }
}

fn evaluator_config<F: Fn(&str) -> Option<String>>(get: &F, name: &str) -> Result<EvaluatorConfig> {
    let text = require(get, name)?;
    builder::parse_config(&text).with_context(|| format!("parsing {}", name))
}

impl WarehouseSettings {
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: &F) -> Result<Self> {
        let options = AccountWarehouseOptions {
            project: require(get, "PROJECT")?,
            default_role: require(get, "ROLE")?,
            scopes: parse_scopes(&require(get, "SCOPES")?),
        };
        Ok(Self {
            options,
            backend: parse_backend(get(IAM_BACKEND_VAR).as_deref())?,
            static_token: get(ACCESS_TOKEN_VAR).filter(|t| !t.is_empty()),
        })
    }
}

impl ProxySettings {
    pub fn from_env() -> Result<Self> { Self::from_lookup(&env_lookup) }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: &F) -> Result<Self> {
        let target = require(get, "TARGET")?;
        let target: Uri = target.parse().with_context(|| format!("parsing TARGET={:?}", target))?;
        if target.scheme().is_none() || target.authority().is_none() {
            bail!("TARGET must be an absolute URL, got {:?}", target.to_string());
        }
        Ok(Self {
            target,
            evaluator: evaluator_config(get, "CONFIG")?,
            warehouse: WarehouseSettings::from_lookup(get)?,
            port: parse_port("PORT", &require(get, "PORT")?)?,
        })
    }
}

impl KeyVendorSettings {
    pub fn from_env() -> Result<Self> { Self::from_lookup(&env_lookup) }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: &F) -> Result<Self> {
        Ok(Self {
            evaluator: evaluator_config(get, "EVALUATOR")?,
            warehouse: WarehouseSettings::from_lookup(get)?,
            port: parse_port("PORT", &require(get, "PORT")?)?,
        })
    }
}

/// The IAM backend the settings ask for. The memory backend comes with the
/// configured role's binding already present so local runs can provision.
pub fn iam_backend(client: &reqwest::Client, settings: &WarehouseSettings) -> Arc<dyn IamBackend> {
    match settings.backend {
        BackendKind::Memory => {
            let opts = &settings.options;
            let project = role_project(&opts.project, &opts.default_role);
            Arc::new(InMemoryIam::new().with_roles(project, [opts.default_role.clone()]))
        }
        BackendKind::Google => {
            let credentials = match &settings.static_token {
                Some(token) => CredentialSource::Static(token.clone()),
                None => CredentialSource::metadata(client.clone()),
            };
            Arc::new(GoogleIam::new(client.clone(), credentials))
        }
    }
}

pub fn warehouse(client: &reqwest::Client, settings: &WarehouseSettings) -> Arc<AccountWarehouse> {
    info!(
        target: "startup",
        project = %settings.options.project,
        role = %settings.options.default_role,
        backend = ?settings.backend,
        "account warehouse configured"
    );
    Arc::new(AccountWarehouse::new(iam_backend(client, settings), settings.options.clone()))
}

pub async fn evaluator(client: &reqwest::Client, cfg: &EvaluatorConfig) -> Result<Arc<Evaluator>> {
    let ev = builder::build(client, cfg).await.context("building evaluator")?;
    Ok(Arc::new(ev))
}
