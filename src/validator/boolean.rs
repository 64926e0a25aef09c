//! And/Or combinators. Both evaluate children in order and stop at the first
//! deciding answer or the first error. An empty list is a configuration error
//! rather than a vacuous answer.

use super::Validator;
use crate::error::{Error, Result};
use crate::identity::Identity;

pub(super) fn all(children: &[Validator], identity: Option<&Identity>) -> Result<bool> {
    if children.is_empty() {
        return Err(Error::config("'and' validator requires at least one child"));
    }
    for child in children {
        if !child.validate(identity)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(super) fn any(children: &[Validator], identity: Option<&Identity>) -> Result<bool> {
    if children.is_empty() {
        return Err(Error::config("'or' validator requires at least one child"));
    }
    for child in children {
        if child.validate(identity)? {
            return Ok(true);
        }
    }
    Ok(false)
}
