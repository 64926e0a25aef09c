//! Closed mapping from claim names to typed accessors on `Identity`.
//! Validators resolve names once at construction so an unknown name is a
//! configuration error rather than a per-request surprise.

use std::str::FromStr;

use super::model::{ClaimValue, Identity};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Claim {
    Subject,
    Issuer,
    OriginOrganization,
    AcademicInstitutionAffiliations,
    Role,
    HasAcknowledgedEthicsTerms,
    BonaFide,
}

impl Claim {
    pub const ALL: [Claim; 7] = [
        Claim::Subject,
        Claim::Issuer,
        Claim::OriginOrganization,
        Claim::AcademicInstitutionAffiliations,
        Claim::Role,
        Claim::HasAcknowledgedEthicsTerms,
        Claim::BonaFide,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Claim::Subject => "Subject",
            Claim::Issuer => "Issuer",
            Claim::OriginOrganization => "OriginOrganization",
            Claim::AcademicInstitutionAffiliations => "AcademicInstitutionAffiliations",
            Claim::Role => "Role",
            Claim::HasAcknowledgedEthicsTerms => "HasAcknowledgedEthicsTerms",
            Claim::BonaFide => "BonaFide",
        }
    }

    /// Scalar claims compare directly; slot claims match when any assertion
    /// carries the expected value, whatever its source.
    pub fn matches(self, id: &Identity, expected: &ClaimValue) -> bool {
        let strings = match self {
            Claim::Subject => return matches!(expected, ClaimValue::String(s) if *s == id.subject),
            Claim::Issuer => return matches!(expected, ClaimValue::String(s) if *s == id.issuer),
            Claim::BonaFide => {
                return match expected {
                    ClaimValue::Bool(b) => id.bona_fide.iter().any(|v| v.value == *b),
                    ClaimValue::String(_) => false,
                };
            }
            Claim::OriginOrganization => &id.origin_organization,
            Claim::AcademicInstitutionAffiliations => &id.academic_institution_affiliations,
            Claim::Role => &id.role,
            Claim::HasAcknowledgedEthicsTerms => &id.has_acknowledged_ethics_terms,
        };
        match expected {
            ClaimValue::String(s) => strings.iter().any(|v| v.value == *s),
            ClaimValue::Bool(_) => false,
        }
    }
}

impl FromStr for Claim {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Claim::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| Error::config(format!("no field named {:?} on Identity", s)))
    }
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.name()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{BoolValue, StringValue};

    #[test]
    fn names_round_trip() {
        for c in Claim::ALL {
            assert_eq!(c.name().parse::<Claim>().unwrap(), c);
        }
        assert!(matches!("Nope".parse::<Claim>(), Err(Error::Config(_))));
        // names are case sensitive
        assert!("role".parse::<Claim>().is_err());
    }

    #[test]
    fn slot_and_scalar_matching() {
        let id = Identity {
            issuer: "https://very-real.idp".into(),
            role: vec![StringValue::new("human", "a"), StringValue::new("person", "b")],
            bona_fide: vec![BoolValue::new(true, "elixir")],
            ..Default::default()
        };
        assert!(Claim::Role.matches(&id, &"person".into()));
        assert!(!Claim::Role.matches(&id, &"robot".into()));
        assert!(Claim::Issuer.matches(&id, &"https://very-real.idp".into()));
        assert!(!Claim::Subject.matches(&id, &"https://very-real.idp".into()));
        assert!(Claim::Subject.matches(&id, &"".into()));
        assert!(Claim::BonaFide.matches(&id, &true.into()));
        assert!(!Claim::BonaFide.matches(&id, &"true".into()));
        assert!(!Claim::Role.matches(&id, &true.into()));
    }
}
