//! Service contains the session and access-control logic of the application.
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod gate;
pub mod infra;
pub mod task;

use derive_more::Debug;

#[cfg(doc)]
use self::infra::Identity;
pub use self::{command::Command, gate::Gate, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] decoding key verifying [`domain::Session`] tokens.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// [`Gate`] deciding route access.
    pub gate: Gate,

    /// [`task::RenewSession`] configuration.
    pub renew_session: task::renew_session::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<I> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Identity`] infrastructure of this [`Service`].
    identity: I,
}

impl<I> Service<I> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(config: Config, identity: I) -> Self {
        Self { config, identity }
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the [`Gate`] of this [`Service`].
    #[must_use]
    pub fn gate(&self) -> &Gate {
        &self.config.gate
    }

    /// Returns the [`Identity`] infrastructure of this [`Service`].
    #[must_use]
    pub fn identity(&self) -> &I {
        &self.identity
    }
}
