//! Access control [`Gate`].

use crate::domain::{RoutePolicy, RuleSet, Session};

/// Access control gate deciding every navigation.
///
/// Holds the static route configuration only: the [`Session`] (if any) is
/// read per-request by the caller, which is expected to collapse any token
/// verification failure into [`None`] before asking for a [`Decision`].
#[derive(Clone, Debug)]
pub struct Gate {
    /// Path of the login page.
    login_path: String,

    /// [`PublicPaths`] requiring no session.
    public: PublicPaths,

    /// [`RuleSet`] of role-gated paths.
    rules: RuleSet,

    /// [`RoutePolicy`] applied to paths absent from the [`RuleSet`].
    fallback: RoutePolicy,
}

impl Gate {
    /// Creates a new [`Gate`] with the provided route configuration.
    #[must_use]
    pub fn new(
        login_path: impl Into<String>,
        public: PublicPaths,
        rules: RuleSet,
        fallback: RoutePolicy,
    ) -> Self {
        Self {
            login_path: login_path.into(),
            public,
            rules,
            fallback,
        }
    }

    /// Decides whether a navigation to the provided `path` may proceed.
    ///
    /// Never errors and mutates nothing: an invalid or expired token must
    /// reach this method as `session: None`, so that verification failures
    /// fail closed toward [`Decision::ToLogin`], never toward
    /// [`Decision::Allow`].
    #[must_use]
    pub fn decide(
        &self,
        path: &str,
        session: Option<&Session>,
    ) -> Decision {
        if path == self.login_path {
            // Re-login of an already authenticated session is pointless.
            return if session.is_some() {
                Decision::ToHome
            } else {
                Decision::Allow
            };
        }

        if self.public.contains(path) {
            return Decision::Allow;
        }

        let Some(session) = session else {
            return Decision::ToLogin;
        };

        match self.rules.required_roles(path) {
            Some(required) => {
                if required.is_empty() || !required.is_disjoint(&session.roles)
                {
                    Decision::Allow
                } else {
                    Decision::ToDenied
                }
            }
            None => match self.fallback {
                RoutePolicy::Allow => Decision::Allow,
                RoutePolicy::Deny => Decision::ToDenied,
            },
        }
    }
}

/// [`Gate`] decision for a single navigation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Navigation proceeds to the requested path.
    Allow,

    /// Navigation redirects to the login page.
    ToLogin,

    /// Navigation redirects to the access denied page.
    ToDenied,

    /// Navigation redirects to the home page.
    ToHome,
}

/// Set of public paths requiring no session.
///
/// An entry ending with `/*` matches the whole subtree under its prefix
/// (static-asset-like paths), any other entry matches exactly.
#[derive(Clone, Debug, Default)]
pub struct PublicPaths(Vec<String>);

impl PublicPaths {
    /// Creates a new [`PublicPaths`] set out of the provided entries.
    #[must_use]
    pub fn new(paths: impl IntoIterator<Item = String>) -> Self {
        Self(paths.into_iter().collect())
    }

    /// Checks whether the provided `path` is public.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|entry| match entry.strip_suffix("/*") {
            Some(prefix) => path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            None => entry == path,
        })
    }
}
