//! Background [`Task`]s definitions.

pub mod renew_session;

pub use common::Handler as Task;

pub use self::renew_session::RenewSession;
