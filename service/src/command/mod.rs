//! [`Command`] definition.

pub mod authorize_session;
pub mod create_session;
pub mod destroy_session;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_session::AuthorizeSession, create_session::CreateSession,
    destroy_session::DestroySession,
};
