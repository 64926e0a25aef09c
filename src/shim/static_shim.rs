use crate::identity::Identity;

/// Returns one fixed identity for every input. Used for fixed-identity
/// deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticShim {
    identity: Identity,
}

impl StaticShim {
    pub fn new(identity: Identity) -> Self { Self { identity } }

    pub fn shim(&self, _auth: &str) -> Identity { self.identity.clone() }
}
