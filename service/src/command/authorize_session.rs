//! [`Command`] for authorizing a [`Session`] token.

use common::DateTime;
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{session, Session},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`Session`] token.
///
/// Verification is fully local: the token signature and expiry are checked
/// against the signing key shared with the identity service, without any
/// remote call. Every failure mode (malformed token, bad signature, expired
/// claims, exceeded maximum lifetime) is an [`ExecutionError`] the caller is
/// expected to collapse into "no session".
#[derive(Clone, Debug, From)]
pub struct AuthorizeSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

impl<I: Sync> Command<AuthorizeSession> for Service<I> {
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeSession { token } = cmd;

        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config().jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        if DateTime::now().coerce() > session.renewable_until {
            return Err(tracerr::new!(E::MaxLifetimeExceeded));
        }

        Ok(session)
    }
}

/// Error of [`AuthorizeSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// Maximum [`Session`] lifetime has been exceeded.
    #[display("Maximum `Session` lifetime exceeded")]
    MaxLifetimeExceeded,
}

#[cfg(test)]
mod spec {
    use std::{collections::HashSet, time::Duration};

    use common::DateTime;
    use jsonwebtoken::{DecodingKey, EncodingKey};

    use crate::{
        domain::{session, Role, RoutePolicy, RuleSet, Session},
        gate::{Gate, PublicPaths},
        task, Command as _, Config, Service,
    };

    use super::AuthorizeSession;

    const SECRET: &[u8] = b"test-secret";

    fn service() -> Service<()> {
        Service::new(
            Config {
                jwt_decoding_key: DecodingKey::from_secret(SECRET),
                gate: Gate::new(
                    "/login",
                    PublicPaths::default(),
                    RuleSet::default(),
                    RoutePolicy::Allow,
                ),
                renew_session: task::renew_session::Config::default(),
            },
            (),
        )
    }

    fn token(expires_in: Duration, renewable_for: Duration) -> session::Token {
        let now = DateTime::now();
        let claims = Session {
            subject: "admin_user".parse().unwrap(),
            roles: HashSet::from([Role::Admin, Role::User]),
            issued_at: now.coerce(),
            expires_at: (now + expires_in).coerce(),
            renewable_until: (now + renewable_for).coerce(),
        };
        let encoded = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        // SAFETY: `jsonwebtoken::encode` always returns a valid
        //         `session::Token`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        unsafe {
            session::Token::new_unchecked(encoded)
        }
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let hour = Duration::from_secs(3600);
        let week = Duration::from_secs(604_800);

        let session = service()
            .execute(AuthorizeSession {
                token: token(hour, week),
            })
            .await
            .unwrap();

        assert_eq!(session.subject.to_string(), "admin_user");
        assert!(session.roles.contains(&Role::Admin));
    }

    #[tokio::test]
    async fn rejects_tampered_token() {
        let hour = Duration::from_secs(3600);
        let mut tampered = token(hour, hour).to_string();
        tampered.pop();
        tampered.push('A');

        let result = service()
            .execute(AuthorizeSession {
                token: tampered.parse().unwrap(),
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let result = service()
            .execute(AuthorizeSession {
                token: "not-a-jwt".parse().unwrap(),
            })
            .await;

        assert!(result.is_err());
    }
}
