//! GA4GH identity claims shared by every component: the claim record itself,
//! the closed set of claim names validators may refer to, and the request
//! extractor that hands an authenticated identity to HTTP handlers.

mod model;
mod claim;
mod request_context;

pub use model::{Identity, StringValue, BoolValue, ClaimValue};
pub use claim::Claim;
pub use request_context::AuthenticatedIdentity;
