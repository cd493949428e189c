//! [`Command`] for creating a [`Session`] via the identity service.

use common::operations::Perform;
use derive_more::{Display, Error, From};
use secrecy::SecretString;
use tracerr::Traced;

use crate::{
    domain::{session, Session},
    infra::{identity, Identity},
    Service,
};

use super::{authorize_session, AuthorizeSession, Command};

/// [`Command`] for creating a [`Session`] by user credentials.
///
/// The identity service issues the actual credential; the returned token is
/// verified locally before being handed out, so a broken upstream can never
/// install an unverifiable [`Session`].
#[derive(Debug)]
pub struct CreateSession {
    /// Login name of the user.
    pub username: session::Subject,

    /// Password of the user, if the identity service requires one.
    pub password: Option<SecretString>,
}

/// Output of [`CreateSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`session::Token`] of the created [`Session`].
    pub token: session::Token,

    /// Claims of the created [`Session`].
    pub session: Session,
}

impl<I> Command<CreateSession> for Service<I>
where
    I: Identity<
            Perform<identity::Login>,
            Ok = session::Token,
            Err = Traced<identity::Error>,
        > + Sync,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateSession { username, password } = cmd;

        let token = self
            .identity()
            .execute(Perform(identity::Login { username, password }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let session = self
            .execute(AuthorizeSession {
                token: token.clone(),
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(Output { token, session })
    }
}

/// Error of [`CreateSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Identity service error.
    ///
    /// [`identity::Error::Unauthorized`] here means wrong credentials.
    #[display("`Identity` operation failed: {_0}")]
    Identity(identity::Error),

    /// Issued token failed local verification.
    #[display("Failed to verify the issued token: {_0}")]
    Verify(authorize_session::ExecutionError),
}
