//! HTTP implementation of the [`Identity`] client.

use common::{operations::Perform, DateTime};
use secrecy::ExposeSecret;
use serde::{Deserialize, Deserializer};
use tracerr::Traced;

use crate::domain::session;

use super::{Error, Identity, Login, Logout, Renew, RenewalOutcome};

/// Configuration of the [`Http`] client.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the identity service.
    pub base_url: String,

    /// Name of the session cookie the identity service issues.
    pub cookie_name: String,
}

/// [`Identity`] client over HTTP.
///
/// The session credential is transported the way a browser would do it: as
/// the configured cookie on requests, and out of `Set-Cookie` response
/// headers on rotations.
#[derive(Clone, Debug)]
pub struct Http {
    /// Configuration of this client.
    config: Config,

    /// Underlying HTTP client.
    client: reqwest::Client,
}

impl Http {
    /// Creates a new [`Http`] client.
    ///
    /// # Errors
    ///
    /// Errors if the underlying HTTP client cannot be constructed.
    pub fn new(config: Config) -> Result<Self, Traced<Error>> {
        Ok(Self {
            client: reqwest::Client::builder()
                .build()
                .map_err(tracerr::from_and_wrap!())?,
            config,
        })
    }

    /// Returns the identity service URL of the provided `path`.
    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Returns the `Cookie` header value transporting the provided `token`.
    fn cookie(&self, token: &session::Token) -> String {
        format!("{}={token}", self.config.cookie_name)
    }

    /// Extracts a session [`session::Token`] out of the `Set-Cookie` headers
    /// of the provided `response`, if any.
    fn session_cookie(
        &self,
        response: &reqwest::Response,
    ) -> Option<session::Token> {
        response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .find_map(|header| {
                let value = header
                    .strip_prefix(&self.config.cookie_name)?
                    .strip_prefix('=')?
                    .split(';')
                    .next()?
                    .trim();
                if value.is_empty() {
                    None
                } else {
                    value.parse().ok()
                }
            })
    }
}

impl Identity<Perform<Login>> for Http {
    type Ok = session::Token;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(login): Perform<Login>,
    ) -> Result<Self::Ok, Self::Err> {
        let Login { username, password } = login;

        let response = self
            .client
            .post(self.endpoint("/login"))
            .json(&serde_json::json!({
                "username": username,
                "password": password.as_ref().map(ExposeSecret::expose_secret),
            }))
            .send()
            .await
            .map_err(tracerr::from_and_wrap!())?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(tracerr::new!(Error::Unauthorized));
        }
        if !status.is_success() {
            return Err(tracerr::new!(Error::UnexpectedStatus(status)));
        }

        self.session_cookie(&response)
            .ok_or_else(|| tracerr::new!(Error::MissingSessionCookie))
    }
}

impl Identity<Perform<Renew>> for Http {
    type Ok = RenewalOutcome;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(renew): Perform<Renew>,
    ) -> Result<Self::Ok, Self::Err> {
        let Renew { token } = renew;

        let response = self
            .client
            .post(self.endpoint("/refresh"))
            .header(reqwest::header::COOKIE, self.cookie(&token))
            .send()
            .await
            .map_err(tracerr::from_and_wrap!())?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(tracerr::new!(Error::Unauthorized));
        }
        if !status.is_success() {
            return Err(tracerr::new!(Error::UnexpectedStatus(status)));
        }

        let rotated = self.session_cookie(&response);
        let body: RefreshResponse = response
            .json()
            .await
            .map_err(tracerr::from_and_wrap!())?;

        Ok(RenewalOutcome {
            renewed: body.refresh_success,
            next_allowed_at: body.next_refresh_allowed_at,
            token: rotated,
        })
    }
}

impl Identity<Perform<Logout>> for Http {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(logout): Perform<Logout>,
    ) -> Result<Self::Ok, Self::Err> {
        let Logout { token } = logout;

        let response = self
            .client
            .post(self.endpoint("/logout"))
            .header(reqwest::header::COOKIE, self.cookie(&token))
            .send()
            .await
            .map_err(tracerr::from_and_wrap!())?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(tracerr::new!(Error::Unauthorized));
        }
        if !status.is_success() {
            return Err(tracerr::new!(Error::UnexpectedStatus(status)));
        }

        Ok(())
    }
}

/// Body of the identity service `POST /refresh` response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    /// Indicator whether a new token has been issued.
    refresh_success: bool,

    /// Unix timestamp when the next renewal will be allowed.
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    next_refresh_allowed_at: Option<DateTime>,
}

/// Deserializes an optional Unix timestamp, tolerating the float seconds the
/// identity service reports.
fn deserialize_opt_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(secs) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    #[expect(
        clippy::cast_possible_truncation,
        reason = "sub-second precision is not significant here"
    )]
    let secs = secs as i64;
    Ok(DateTime::from_unix_timestamp(secs))
}
