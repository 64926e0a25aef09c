//! Google Cloud IAM: backing service accounts and the credentials minted for them.

pub mod auth;
pub mod iam;
pub mod memory;
pub mod rest;
pub mod warehouse;

pub use auth::{CredentialSource, MetadataServer};
pub use iam::{AccessToken, Binding, IamBackend, IamError, IamResult, Policy, ServiceAccount, ServiceAccountKey};
pub use memory::InMemoryIam;
pub use rest::{Endpoints, GoogleIam};
pub use warehouse::{hash_id, role_project, AccountWarehouse, AccountWarehouseOptions};
