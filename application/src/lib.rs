//! Application serving the role-gated pages behind the login flow.

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

pub mod args;
pub mod config;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod sessions;

use std::sync::Arc;

// Used in binary.
use axum_client_ip as _;
use tower_http as _;
use tracing_subscriber as _;

pub use self::{
    args::Args,
    config::Config,
    error::{AsError, Error},
    sessions::Sessions,
};

/// [`service::Service`] with filled infrastructure dependencies.
pub type Service = service::Service<service::infra::Http>;

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// [`Service`] instance.
    pub service: Service,

    /// Registry of running session renewal schedulers.
    pub sessions: Arc<Sessions>,

    /// Application [`Config`].
    pub config: Arc<Config>,
}
