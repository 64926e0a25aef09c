use crate::error::{Error, Result};

/// Always returns the same answer. With `err` set it always fails instead,
/// which is how configurations and tests express a validator that must never
/// be reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constant {
    pub ok: bool,
    pub err: Option<String>,
}

impl Constant {
    pub fn new(ok: bool) -> Self { Self { ok, err: None } }

    pub fn failing(msg: impl Into<String>) -> Self { Self { ok: false, err: Some(msg.into()) } }

    pub fn validate(&self) -> Result<bool> {
        match &self.err {
            Some(msg) => Err(Error::Validation(msg.clone())),
            None => Ok(self.ok),
        }
    }
}
