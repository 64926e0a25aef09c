//! GA4GH researcher identities: parse bearer tokens into identities, decide
//! access with claim validators, and exchange accepted identities for Google
//! Cloud credentials.

pub mod builder;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod gcp;
pub mod handler;
pub mod identity;
pub mod oidc;
pub mod parser;
pub mod proxy;
pub mod shim;
pub mod validator;

pub use error::{Error, Result};
pub use evaluator::Evaluator;
pub use identity::{AuthenticatedIdentity, BoolValue, Claim, ClaimValue, Identity, StringValue};
pub use parser::Parser;
pub use validator::Validator;
