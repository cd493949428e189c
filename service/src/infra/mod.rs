//! Infrastructure layer.

pub mod identity;

pub use self::identity::{Http, Identity};
