//! [`Session`] definitions.

use std::collections::HashSet;

#[cfg(doc)]
use common::DateTime;
use common::DateTimeOf;
use derive_more::{AsRef, Display, FromStr};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

use super::Role;

/// Claims of a server-issued user session.
///
/// The client never constructs these itself: they're decoded out of a
/// [`Token`] and verified against the signing key shared with the identity
/// service.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Session {
    /// [`Subject`] this [`Session`] belongs to.
    #[serde(rename = "sub")]
    pub subject: Subject,

    /// [`Role`]s assigned to the [`Subject`].
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: HashSet<Role>,

    /// [`DateTime`] when this [`Session`] was issued.
    #[serde(rename = "iat", with = "common::datetime::serde::unix_timestamp")]
    pub issued_at: IssueDateTime,

    /// [`DateTime`] when this [`Session`] expires.
    #[serde(rename = "exp", with = "common::datetime::serde::unix_timestamp")]
    pub expires_at: ExpirationDateTime,

    /// [`DateTime`] past which this [`Session`] cannot be renewed anymore,
    /// no matter how many renewals extended [`Session::expires_at`].
    #[serde(
        rename = "max_exp",
        with = "common::datetime::serde::unix_timestamp"
    )]
    pub renewable_until: RenewalDeadlineDateTime,
}

/// Identity of the user a [`Session`] was issued for.
#[derive(
    AsRef,
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    Hash,
    PartialEq,
    Serialize,
)]
#[as_ref(str, String)]
pub struct Subject(String);

/// Access token of a [`Session`].
#[derive(AsRef, Clone, Debug, Display, Eq, FromStr, Hash, PartialEq)]
#[as_ref(str, String)]
pub struct Token(String);

impl Token {
    /// Creates a new [`Token`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The provided `token` must be a valid [`Token`] representation.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(token: String) -> Self {
        Self(token)
    }
}

/// Marker of a [`Session`] issue.
#[derive(Clone, Copy, Debug)]
pub enum Issue {}

/// Marker of a [`Session`] expiration.
#[derive(Clone, Copy, Debug)]
pub enum Expiration {}

/// Marker of a [`Session`] renewal deadline.
#[derive(Clone, Copy, Debug)]
pub enum RenewalDeadline {}

/// [`DateTime`] of a [`Session`] issue.
pub type IssueDateTime = DateTimeOf<(Session, Issue)>;

/// [`DateTime`] of a [`Session`] expiration.
pub type ExpirationDateTime = DateTimeOf<(Session, Expiration)>;

/// [`DateTime`] of a [`Session`] renewal deadline.
pub type RenewalDeadlineDateTime = DateTimeOf<(Session, RenewalDeadline)>;

/// Deserializes a [`Role`]s claim.
///
/// The upstream identity claim may carry either a single value or a sequence
/// of them: both shapes normalize into the same set. Values that are not
/// recognized [`Role`] tags are silently dropped, not rejected.
fn deserialize_roles<'de, D>(
    deserializer: D,
) -> Result<HashSet<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    /// Either a recognized [`Role`] tag, or anything else.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tag {
        /// Recognized [`Role`] tag.
        Known(Role),

        /// Unrecognized value, to be dropped.
        Unknown(IgnoredAny),
    }

    /// [`Role`]s claim shape: a sequence or a single scalar.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Claim {
        /// Sequence of values.
        Many(Vec<Tag>),

        /// Single scalar value.
        One(Tag),
    }

    let tags = match Claim::deserialize(deserializer)? {
        Claim::Many(tags) => tags,
        Claim::One(tag) => vec![tag],
    };

    Ok(tags
        .into_iter()
        .filter_map(|tag| match tag {
            Tag::Known(role) => Some(role),
            Tag::Unknown(_) => None,
        })
        .collect())
}
