//! [`Error`]-related definitions.

use std::fmt;

use derive_more::Error as StdError;
use itertools::Itertools as _;
use service::command::{authorize_session, create_session};
use tracerr::{Trace, Traced};

/// Defines a new error type.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[status = $status_code:ident]
                #[message = $message:literal]
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Error type.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        #[repr(u16)]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl $name {
            /// Looks up the error by its code.
            #[must_use]
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Returns the user-facing message of this error.
            #[must_use]
            pub const fn message(&self) -> &'static str {
                match self {
                    $(Self::$variant => $message,)*
                }
            }
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                match err {
                    $(
                        $name::$variant => Self {
                            code: $code,
                            status_code: ::http::StatusCode::$status_code,
                            message: $message.to_string(),
                            backtrace: None,
                        },
                    )*
                }
            }
        }
    };
}

/// Login flow [`Error`].
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// [`http::StatusCode`] of this [`Error`].
    pub status_code: http::StatusCode,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,

    /// [`Error`] message.
    pub message: String,
}

impl Error {
    /// Create a new [`Error`] representing an internal server error.
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self {
            code: "INTERNAL_SERVER_ERROR",
            status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            backtrace: None,
        }
    }

    /// Looks up the user-facing message of the provided [`Error`] [`Code`].
    ///
    /// Unknown codes fall back to a generic message, so that an arbitrary
    /// query string never echoes back onto a page.
    #[must_use]
    pub fn message_of(code: &str) -> &'static str {
        LoginError::from_code(code)
            .map_or("Login failed, try again later", |e| e.message())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            status_code: _,
            backtrace,
            message,
        } = self;

        write!(
            f,
            "[{code}]: {message}{}",
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("{trace}"))),
        )
    }
}

/// [`Error`] code.
pub type Code = &'static str;

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

define_error! {
    enum LoginError {
        #[code = "INVALID_CREDENTIALS"]
        #[status = UNAUTHORIZED]
        #[message = "Invalid username or password"]
        InvalidCredentials,

        #[code = "IDENTITY_UNAVAILABLE"]
        #[status = SERVICE_UNAVAILABLE]
        #[message = "Authentication service is unavailable, try again later"]
        IdentityUnavailable,
    }
}

impl AsError for create_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use service::infra::identity::Error as E;

        match self {
            Self::Identity(E::Unauthorized) => {
                Some(LoginError::InvalidCredentials.into())
            }
            Self::Identity(
                E::UnexpectedStatus(_)
                | E::Transport(_)
                | E::MissingSessionCookie,
            ) => Some(LoginError::IdentityUnavailable.into()),
            Self::Verify(_) => None,
        }
    }
}

impl AsError for authorize_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

#[cfg(test)]
mod spec {
    use super::{AsError as _, Error, LoginError};

    #[test]
    fn unknown_code_never_echoes_back() {
        assert_eq!(
            Error::message_of("<script>alert(1)</script>"),
            "Login failed, try again later",
        );
    }

    #[test]
    fn known_code_messages_come_from_the_declarations() {
        for error in
            [LoginError::InvalidCredentials, LoginError::IdentityUnavailable]
        {
            let Error { code, message, .. } = error.into();

            assert_eq!(Error::message_of(code), error.message());
            assert_eq!(message, error.message());
        }
    }

    #[test]
    fn wrong_credentials_map_to_unauthorized() {
        let error: Error = LoginError::InvalidCredentials.into();

        assert_eq!(error.code, "INVALID_CREDENTIALS");
        assert_eq!(error.status_code, http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unavailable_identity_is_not_an_internal_error() {
        let traced = tracerr::new!(
            service::command::create_session::ExecutionError::Identity(
                service::infra::identity::Error::MissingSessionCookie,
            )
        );

        let error = traced.try_as_error().unwrap();

        assert_eq!(error.code, "IDENTITY_UNAVAILABLE");
        assert!(error.backtrace.is_some());
    }
}
