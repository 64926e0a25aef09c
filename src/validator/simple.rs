use crate::error::Result;
use crate::identity::{Claim, ClaimValue, Identity};

/// Compares identity claims against expected values. `Simple` built from
/// `[("Role", "human")]` accepts every identity holding at least one Role
/// assertion with the value "human". Claim sources are not inspected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Simple {
    claims: Vec<(Claim, ClaimValue)>,
}

impl Simple {
    /// Resolve claim names up front; an unknown name is a configuration error.
    pub fn new<I, K, V>(claims: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ClaimValue>,
    {
        let claims = claims
            .into_iter()
            .map(|(name, value)| Ok((name.as_ref().parse::<Claim>()?, value.into())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { claims })
    }

    pub fn claims(&self) -> &[(Claim, ClaimValue)] { &self.claims }

    /// True iff every (claim, expected) pair matches. An absent identity only
    /// satisfies the empty validator.
    pub fn validate(&self, identity: Option<&Identity>) -> bool {
        let Some(id) = identity else { return self.claims.is_empty() };
        self.claims.iter().all(|(claim, expected)| claim.matches(id, expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::identity::StringValue;

    struct Case {
        name: &'static str,
        id: Identity,
        claims: Vec<(&'static str, ClaimValue)>,
        ok: bool,
    }

    #[test]
    fn simple_cases() {
        let cases = vec![
            Case { name: "empty identity", id: Identity::default(), claims: vec![], ok: true },
            Case {
                name: "simple success",
                id: Identity { role: vec![StringValue::new("person", "")], ..Default::default() },
                claims: vec![("Role", "person".into())],
                ok: true,
            },
            Case { name: "simple failure", id: Identity::default(), claims: vec![("Role", "researcher".into())], ok: false },
            Case {
                name: "scalar field",
                id: Identity { issuer: "https://very-real.idp".into(), ..Default::default() },
                claims: vec![("Issuer", "https://very-real.idp".into())],
                ok: true,
            },
            Case {
                name: "every pair must match",
                id: Identity { issuer: "https://very-real.idp".into(), role: vec![StringValue::new("human", "")], ..Default::default() },
                claims: vec![("Issuer", "https://very-real.idp".into()), ("Role", "robot".into())],
                ok: false,
            },
        ];
        for case in cases {
            let v = Simple::new(case.claims).unwrap();
            assert_eq!(v.validate(Some(&case.id)), case.ok, "{}", case.name);
        }
    }

    #[test]
    fn unknown_claim_fails_construction() {
        let err = Simple::new([("FavoriteColor", "blue")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("FavoriteColor"));
    }

    #[test]
    fn absent_identity() {
        assert!(Simple::default().validate(None));
        assert!(!Simple::new([("Role", "human")]).unwrap().validate(None));
    }
}
