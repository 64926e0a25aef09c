//! Shims convert bearer strings that are _not_ GA4GH identity tokens into an
//! `Identity`. This is how the parser interoperates with providers that do not
//! issue GA4GH claims yet.
//!
//! The set of shims is closed; configuration picks one of these variants.

mod elixir;
mod static_shim;

pub use elixir::{ElixirShim, ELIXIR_ISSUER};
pub use static_shim::StaticShim;

use crate::error::Result;
use crate::identity::Identity;

#[derive(Debug, Clone)]
pub enum Shim {
    Elixir(ElixirShim),
    Static(StaticShim),
}

impl Shim {
    /// Convert `auth` into an identity. Any error simply means "not this
    /// shim": unrecognized format and failed verification look the same.
    pub async fn shim(&self, auth: &str) -> Result<Identity> {
        match self {
            Shim::Elixir(s) => s.shim(auth),
            Shim::Static(s) => Ok(s.shim(auth)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Shim::Elixir(_) => "elixir",
            Shim::Static(_) => "static",
        }
    }
}

impl From<ElixirShim> for Shim {
    fn from(s: ElixirShim) -> Self { Shim::Elixir(s) }
}

impl From<StaticShim> for Shim {
    fn from(s: StaticShim) -> Self { Shim::Static(s) }
}
