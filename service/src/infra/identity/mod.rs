//! Remote identity service client definitions.

pub mod http;

use common::DateTime;
#[cfg(doc)]
use common::operations::Perform;
use derive_more::{Display, Error as StdError, From};
use secrecy::SecretString;

#[cfg(doc)]
use crate::domain::Session;
use crate::domain::session;

pub use self::http::Http;

/// Remote identity service operation.
pub use common::Handler as Identity;

/// [`Perform`]able operation of logging a user in.
#[derive(Debug)]
pub struct Login {
    /// Login name of the user.
    pub username: session::Subject,

    /// Password of the user, if the identity service requires one.
    pub password: Option<SecretString>,
}

/// [`Perform`]able operation of renewing a [`Session`].
#[derive(Clone, Debug, From)]
pub struct Renew {
    /// [`session::Token`] of the [`Session`] to renew.
    pub token: session::Token,
}

/// [`Perform`]able operation of discarding a [`Session`] server-side.
#[derive(Clone, Debug, From)]
pub struct Logout {
    /// [`session::Token`] of the [`Session`] to discard.
    pub token: session::Token,
}

/// Outcome of a single [`Renew`] attempt.
///
/// Transient: consumed immediately to compute the next scheduling delay,
/// never persisted.
#[derive(Clone, Debug)]
pub struct RenewalOutcome {
    /// Indicator whether the [`Session`] has been renewed.
    pub renewed: bool,

    /// [`DateTime`] when the next renewal is allowed, as decided by the
    /// identity service declining this attempt.
    pub next_allowed_at: Option<DateTime>,

    /// Rotated [`session::Token`], if the identity service issued one.
    pub token: Option<session::Token>,
}

/// Identity service error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Identity service rejected the transported credential.
    ///
    /// On a [`Renew`] this signals the [`Session`] is likely no longer
    /// renewable.
    #[display("`Identity` service rejected the credential")]
    Unauthorized,

    /// Identity service responded with an unexpected status.
    #[display("`Identity` service responded with status {_0}")]
    #[from(ignore)]
    UnexpectedStatus(#[error(not(source))] reqwest::StatusCode),

    /// Transport failure while reaching the identity service.
    #[display("Failed to reach `Identity` service: {_0}")]
    Transport(reqwest::Error),

    /// Identity service response misses the expected session cookie.
    #[display("`Identity` service response misses the session cookie")]
    MissingSessionCookie,
}
