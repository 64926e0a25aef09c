//! Boolean policy evaluation over identity claims.
//!
//! A validator is a plain tree of values built once at configuration time and
//! shared read-only by every request. Evaluation never mutates the identity
//! and keeps no state between calls.

mod boolean;
mod constant;
mod simple;

pub use constant::Constant;
pub use simple::Simple;

use crate::error::Result;
use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    Constant(Constant),
    Simple(Simple),
    And(Vec<Validator>),
    Or(Vec<Validator>),
}

impl Validator {
    /// Evaluate against `identity`. `Ok(false)` is a policy rejection; `Err`
    /// is reserved for structural problems in the validator itself.
    pub fn validate(&self, identity: Option<&Identity>) -> Result<bool> {
        match self {
            Validator::Constant(c) => c.validate(),
            Validator::Simple(s) => Ok(s.validate(identity)),
            Validator::And(children) => boolean::all(children, identity),
            Validator::Or(children) => boolean::any(children, identity),
        }
    }

    pub fn constant(ok: bool) -> Self { Validator::Constant(Constant::new(ok)) }
}

impl From<Simple> for Validator {
    fn from(s: Simple) -> Self { Validator::Simple(s) }
}

impl From<Constant> for Validator {
    fn from(c: Constant) -> Self { Validator::Constant(c) }
}
