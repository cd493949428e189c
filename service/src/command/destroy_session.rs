//! [`Command`] for destroying a [`Session`].

use std::convert::Infallible;

use common::operations::Perform;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Session;
use crate::{
    domain::session,
    infra::{identity, Identity},
    Service,
};

use super::Command;

/// [`Command`] for destroying a [`Session`] on logout.
///
/// The server-side discard is best-effort: local teardown proceeds whatever
/// the identity service answers, so this [`Command`] never fails.
#[derive(Clone, Debug)]
pub struct DestroySession {
    /// [`session::Token`] of the [`Session`] to destroy.
    pub token: session::Token,
}

impl<I> Command<DestroySession> for Service<I>
where
    I: Identity<Perform<identity::Logout>, Ok = (), Err = Traced<identity::Error>>
        + Sync,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        cmd: DestroySession,
    ) -> Result<Self::Ok, Self::Err> {
        let DestroySession { token } = cmd;

        _ = self
            .identity()
            .execute(Perform(identity::Logout { token }))
            .await
            .map_err(|e| log::warn!("server-side `Session` discard failed: {e}"));

        Ok(())
    }
}
