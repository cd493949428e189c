//! Domain definitions.

pub mod route;
pub mod session;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use self::{
    route::{RoutePolicy, RouteRule, RuleSet},
    session::Session,
};

/// Role granting access to role-gated routes.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumString,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Administrator of the application.
    Admin,

    /// Regular authenticated user.
    User,
}
