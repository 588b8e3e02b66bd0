//! Platform facts and platform filters.
//!
//! Facts describe the executing host; filters describe which hosts a
//! provider descriptor applies to. A filter term may be negated with a
//! leading `!` ("every platform except this one"), and a clause with
//! multiple terms has OR semantics across its positive terms.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Read-only description of the executing host.
///
/// Supplied by the caller; the core only consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFacts {
    /// OS family (e.g. "debian", "rhel", "darwin", "windows")
    pub family: String,
    /// OS name (e.g. "ubuntu", "fedora", "macos")
    pub name: String,
    /// OS version as a comparable string (e.g. "24.04")
    pub version: String,
}

impl PlatformFacts {
    pub fn new(
        family: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            family: family.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Human-readable one-liner, used in resolution errors.
    pub fn describe(&self) -> String {
        format!("{}/{} {}", self.family, self.name, self.version)
    }
}

impl fmt::Display for PlatformFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterTerm {
    value: String,
    negated: bool,
}

impl FilterTerm {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('!') {
            Some(value) => Self {
                value: value.to_string(),
                negated: true,
            },
            None => Self {
                value: raw.to_string(),
                negated: false,
            },
        }
    }
}

/// One filter dimension: a list of terms with OR semantics.
///
/// Negated terms form a blocklist that always rejects; positive terms
/// form an allowlist. An all-negated clause accepts anything its
/// blocklist doesn't reject (`"!aix"` matches every platform but aix).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterClause {
    terms: Vec<FilterTerm>,
}

impl FilterClause {
    /// Whether a fact value satisfies this clause.
    pub fn matches(&self, fact: &str) -> bool {
        if self
            .terms
            .iter()
            .any(|t| t.negated && t.value == fact)
        {
            return false;
        }
        let mut positives = self.terms.iter().filter(|t| !t.negated).peekable();
        positives.peek().is_none() || positives.any(|t| t.value == fact)
    }

    fn purely_negated(&self) -> bool {
        !self.terms.is_empty() && self.terms.iter().all(|t| t.negated)
    }

    // None = 0, all-negated = 1, has a positive term = 2. Negated-only
    // clauses rank below positive ones at the same dimension.
    fn rank(&self) -> u8 {
        if self.purely_negated() { 1 } else { 2 }
    }
}

impl From<&str> for FilterClause {
    fn from(raw: &str) -> Self {
        Self {
            terms: vec![FilterTerm::parse(raw)],
        }
    }
}

impl From<&[&str]> for FilterClause {
    fn from(raws: &[&str]) -> Self {
        Self {
            terms: raws.iter().map(|r| FilterTerm::parse(r)).collect(),
        }
    }
}

impl<const N: usize> From<[&str; N]> for FilterClause {
    fn from(raws: [&str; N]) -> Self {
        Self::from(&raws[..])
    }
}

/// Static platform-applicability constraints for a provider descriptor.
///
/// A filter with no clauses at all matches every platform (catch-all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformFilter {
    family: Option<FilterClause>,
    name: Option<FilterClause>,
    version: Option<FilterClause>,
}

impl PlatformFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain by OS family, e.g. `"debian"` or `["rhel", "fedora"]` or `"!aix"`.
    pub fn family(mut self, clause: impl Into<FilterClause>) -> Self {
        self.family = Some(clause.into());
        self
    }

    /// Constrain by OS name.
    pub fn name(mut self, clause: impl Into<FilterClause>) -> Self {
        self.name = Some(clause.into());
        self
    }

    /// Constrain by OS version (exact string comparison).
    pub fn version(mut self, clause: impl Into<FilterClause>) -> Self {
        self.version = Some(clause.into());
        self
    }

    /// Whether the given facts satisfy every clause present.
    pub fn matches(&self, facts: &PlatformFacts) -> bool {
        let clause_ok = |clause: &Option<FilterClause>, fact: &str| {
            clause.as_ref().is_none_or(|c| c.matches(fact))
        };
        clause_ok(&self.family, &facts.family)
            && clause_ok(&self.name, &facts.name)
            && clause_ok(&self.version, &facts.version)
    }

    // Specificity key: version outranks name outranks family, and within
    // a dimension a positive clause outranks a negated-only one.
    pub(crate) fn rank(&self) -> (u8, u8, u8) {
        let dim = |clause: &Option<FilterClause>| clause.as_ref().map_or(0, FilterClause::rank);
        (dim(&self.version), dim(&self.name), dim(&self.family))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debian() -> PlatformFacts {
        PlatformFacts::new("debian", "ubuntu", "24.04")
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(PlatformFilter::new().matches(&debian()));
        assert!(PlatformFilter::new().matches(&PlatformFacts::new("aix", "aix", "7.2")));
    }

    #[test]
    fn single_value_matches_equality() {
        let filter = PlatformFilter::new().family("debian");
        assert!(filter.matches(&debian()));
        assert!(!filter.matches(&PlatformFacts::new("rhel", "fedora", "41")));
    }

    #[test]
    fn negated_value_matches_everything_else() {
        let filter = PlatformFilter::new().family("!aix");
        assert!(filter.matches(&debian()));
        assert!(!filter.matches(&PlatformFacts::new("aix", "aix", "7.2")));
    }

    #[test]
    fn list_has_or_semantics_honoring_negation() {
        let filter = PlatformFilter::new().family(["rhel", "fedora"]);
        assert!(filter.matches(&PlatformFacts::new("rhel", "centos", "9")));
        assert!(filter.matches(&PlatformFacts::new("fedora", "fedora", "41")));
        assert!(!filter.matches(&debian()));

        // A negated term in a list always rejects its value, even when a
        // positive term would otherwise allow everything.
        let filter = PlatformFilter::new().name(["!aix", "ubuntu"]);
        assert!(filter.matches(&debian()));
        assert!(!filter.matches(&PlatformFacts::new("aix", "aix", "7.2")));
        assert!(!filter.matches(&PlatformFacts::new("debian", "debian", "12")));
    }

    #[test]
    fn all_dimensions_must_match() {
        let filter = PlatformFilter::new().family("debian").name("ubuntu");
        assert!(filter.matches(&debian()));
        assert!(!filter.matches(&PlatformFacts::new("debian", "debian", "12")));
    }

    #[test]
    fn name_filter_outranks_family_filter() {
        let by_name = PlatformFilter::new().name("ubuntu");
        let by_family = PlatformFilter::new().family("debian");
        let catch_all = PlatformFilter::new();
        assert!(by_name.rank() > by_family.rank());
        assert!(by_family.rank() > catch_all.rank());
    }

    #[test]
    fn negated_clause_ranks_below_positive_at_same_dimension() {
        let positive = PlatformFilter::new().family("debian");
        let negated = PlatformFilter::new().family("!aix");
        assert!(positive.rank() > negated.rank());
    }
}
