//! Route access rules.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use super::Role;

/// Rule of accessing a single route.
#[derive(Clone, Debug)]
pub struct RouteRule {
    /// Path this [`RouteRule`] applies to.
    pub path: String,

    /// [`Role`]s allowed to access the path.
    ///
    /// An empty set grants access to any authenticated session.
    pub required_roles: HashSet<Role>,
}

/// Set of [`RouteRule`]s, read-only at runtime.
#[derive(Clone, Debug, Default)]
pub struct RuleSet(HashMap<String, HashSet<Role>>);

impl RuleSet {
    /// Creates a new [`RuleSet`] out of the provided [`RouteRule`]s.
    ///
    /// A duplicated path keeps the last [`RouteRule`] mentioning it.
    #[must_use]
    pub fn new(rules: impl IntoIterator<Item = RouteRule>) -> Self {
        Self(
            rules
                .into_iter()
                .map(|r| (r.path, r.required_roles))
                .collect(),
        )
    }

    /// Looks up the [`Role`]s required to access the provided `path`.
    ///
    /// [`None`] means no [`RouteRule`] is configured for the `path`.
    #[must_use]
    pub fn required_roles(&self, path: &str) -> Option<&HashSet<Role>> {
        self.0.get(path)
    }
}

/// Policy applied to paths having no [`RouteRule`] configured.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RoutePolicy {
    /// Unconfigured paths are accessible to any authenticated session.
    #[default]
    Allow,

    /// Unconfigured paths are denied to everyone.
    Deny,
}
