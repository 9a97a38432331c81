//! Grant patterns and wildcard expansion.
//!
//! Wildcards are only ever resolved against the known permission catalogue.
//! A prefix grant can therefore never reach a permission string nobody has
//! declared, and `"teams.*"` never matches `"teamsx.read"`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// A permission grant owned by a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrantPattern {
    /// Exact permission; trusted verbatim even when absent from the catalogue.
    Exact(Permission),
    /// `"<prefix>.*"`: every known permission starting with `"<prefix>."`.
    Prefix(String),
    /// `"*"`: every known permission.
    Any,
}

impl GrantPattern {
    pub fn parse(raw: &str) -> Self {
        if raw == "*" {
            return Self::Any;
        }
        match raw.strip_suffix(".*") {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(Permission::new(raw.to_string())),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }

    /// Whether this grant covers `permission`, given the known catalogue.
    ///
    /// Always agrees with `expand([self], known).contains(permission)`.
    pub fn grants(&self, permission: &str, known: &BTreeSet<Permission>) -> bool {
        match self {
            Self::Exact(p) => p.as_str() == permission,
            Self::Prefix(prefix) => {
                known.contains(permission) && matches_prefix(prefix, permission)
            }
            Self::Any => known.contains(permission),
        }
    }
}

fn matches_prefix(prefix: &str, permission: &str) -> bool {
    permission
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('.'))
}

impl core::fmt::Display for GrantPattern {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Exact(p) => f.write_str(p.as_str()),
            Self::Prefix(prefix) => write!(f, "{prefix}.*"),
            Self::Any => f.write_str("*"),
        }
    }
}

impl From<String> for GrantPattern {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for GrantPattern {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<GrantPattern> for String {
    fn from(value: GrantPattern) -> Self {
        value.to_string()
    }
}

/// Expand grant patterns into a concrete permission set.
///
/// - exact grants pass through unchanged
/// - `"p.*"` adds every known permission beginning with `"p."`
/// - `"*"` adds every known permission
pub fn expand<'a, I>(grants: I, known: &BTreeSet<Permission>) -> BTreeSet<Permission>
where
    I: IntoIterator<Item = &'a GrantPattern>,
{
    let mut out = BTreeSet::new();
    for grant in grants {
        match grant {
            GrantPattern::Exact(p) => {
                out.insert(p.clone());
            }
            GrantPattern::Prefix(prefix) => {
                out.extend(
                    known
                        .iter()
                        .filter(|p| matches_prefix(prefix, p.as_str()))
                        .cloned(),
                );
            }
            GrantPattern::Any => out.extend(known.iter().cloned()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn catalogue(perms: &[&'static str]) -> BTreeSet<Permission> {
        perms.iter().map(|p| Permission::from(*p)).collect()
    }

    #[test]
    fn parse_recognises_all_three_forms() {
        assert_eq!(GrantPattern::parse("*"), GrantPattern::Any);
        assert_eq!(GrantPattern::parse("teams.*"), GrantPattern::Prefix("teams".into()));
        assert_eq!(
            GrantPattern::parse("teams.view"),
            GrantPattern::Exact(Permission::from("teams.view"))
        );
        // Only a trailing ".*" is a wildcard.
        assert_eq!(
            GrantPattern::parse("teams*"),
            GrantPattern::Exact(Permission::from("teams*"))
        );
    }

    #[test]
    fn display_round_trips_the_configured_string() {
        for raw in ["*", "a.b.*", "a.b"] {
            assert_eq!(GrantPattern::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn prefix_requires_a_dot_boundary() {
        let known = catalogue(&["a.b.c", "ab.c", "a"]);
        let out = expand(&[GrantPattern::parse("a.*")], &known);
        assert!(out.contains("a.b.c"));
        assert!(!out.contains("ab.c"));
        assert!(!out.contains("a"));
    }

    #[test]
    fn exact_grants_pass_through_even_when_unknown() {
        let known = catalogue(&["teams.view"]);
        let out = expand(&[GrantPattern::parse("custom.secret")], &known);
        assert_eq!(out, catalogue(&["custom.secret"]));
    }

    #[test]
    fn wildcards_never_reach_unknown_permissions() {
        let known = catalogue(&["teams.view"]);
        assert!(!GrantPattern::parse("teams.*").grants("teams.delete", &known));
        assert!(!GrantPattern::Any.grants("teams.delete", &known));
        assert!(GrantPattern::parse("teams.*").grants("teams.view", &known));
    }

    #[test]
    fn duplicate_grants_collapse() {
        let known = catalogue(&["teams.view", "teams.create"]);
        let grants = [
            GrantPattern::parse("teams.*"),
            GrantPattern::parse("teams.view"),
            GrantPattern::Any,
        ];
        assert_eq!(expand(&grants, &known), known);
    }

    #[test]
    fn serde_uses_plain_strings() {
        let grants: Vec<GrantPattern> = serde_json::from_str(r#"["*", "x.*", "x.y"]"#).unwrap();
        assert_eq!(
            grants,
            vec![
                GrantPattern::Any,
                GrantPattern::Prefix("x".into()),
                GrantPattern::Exact(Permission::from("x.y")),
            ]
        );
        assert_eq!(serde_json::to_string(&grants).unwrap(), r#"["*","x.*","x.y"]"#);
    }

    fn permission_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-c]{1,2}", 1..4).prop_map(|parts| parts.join("."))
    }

    fn grant_strategy() -> impl Strategy<Value = GrantPattern> {
        prop_oneof![
            Just(GrantPattern::Any),
            permission_strategy().prop_map(GrantPattern::Prefix),
            permission_strategy().prop_map(|p| GrantPattern::Exact(Permission::from(p))),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a universal grant expands to exactly the catalogue.
        #[test]
        fn universal_grant_expands_to_catalogue(
            perms in prop::collection::btree_set(permission_strategy(), 0..20),
            extra in prop::collection::vec(grant_strategy(), 0..4),
        ) {
            let known: BTreeSet<Permission> = perms.into_iter().map(Permission::from).collect();
            let mut grants: Vec<GrantPattern> = extra
                .into_iter()
                .filter(|g| g.is_wildcard())
                .collect();
            grants.push(GrantPattern::Any);

            prop_assert_eq!(expand(&grants, &known), known);
        }

        /// Property: wildcard expansion never leaves the catalogue.
        #[test]
        fn wildcard_expansion_is_a_subset_of_catalogue(
            perms in prop::collection::btree_set(permission_strategy(), 0..20),
            grants in prop::collection::vec(grant_strategy(), 0..6),
        ) {
            let known: BTreeSet<Permission> = perms.into_iter().map(Permission::from).collect();
            let wildcards: Vec<GrantPattern> = grants.into_iter().filter(|g| g.is_wildcard()).collect();

            prop_assert!(expand(&wildcards, &known).is_subset(&known));
        }

        /// Property: the single-permission check agrees with expansion.
        #[test]
        fn grants_agrees_with_expand(
            perms in prop::collection::btree_set(permission_strategy(), 0..20),
            grant in grant_strategy(),
            probe in permission_strategy(),
        ) {
            let known: BTreeSet<Permission> = perms.into_iter().map(Permission::from).collect();
            let expanded = expand(std::iter::once(&grant), &known);

            prop_assert_eq!(grant.grants(&probe, &known), expanded.contains(probe.as_str()));
        }
    }
}
