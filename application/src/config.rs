//! [`Config`]-related definitions.

use std::time::Duration;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use service::{
    domain::{Role, RoutePolicy, RouteRule, RuleSet},
    gate::PublicPaths,
    task::renew_session,
};
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Identity service configuration.
    pub identity: Identity,

    /// Service configuration.
    pub service: Service,

    /// Session cookie configuration.
    pub cookie: Cookie,

    /// Route access configuration.
    pub gate: Gate,

    /// Session renewal configuration.
    pub renew: Renew,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

impl From<&Config> for service::Config {
    fn from(value: &Config) -> Self {
        Self {
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                value.service.jwt_secret.as_bytes(),
            ),
            gate: service::Gate::new(
                value.gate.login_path.clone(),
                PublicPaths::new(value.gate.public.iter().cloned()),
                RuleSet::new(value.gate.routes.iter().map(|r| RouteRule {
                    path: r.path.clone(),
                    required_roles: r.roles.iter().copied().collect(),
                })),
                value.gate.fallback,
            ),
            renew_session: renew_session::Config {
                initial_delay: value.renew.initial_delay,
                interval: value.renew.interval,
                min_retry_delay: value.renew.min_retry_delay,
                failure_backoff: value.renew.failure_backoff,
            },
        }
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Identity service configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Identity {
    /// Base URL of the identity service.
    ///
    /// Required: an empty value is a fatal startup error.
    pub base_url: String,
}

/// Service configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    /// [JWT] signing secret shared with the identity service, verifying
    /// session tokens locally.
    ///
    /// Required: an empty value is a fatal startup error.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    pub jwt_secret: String,
}

/// Session cookie configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cookie {
    /// Name of the session cookie.
    #[default("access_token".to_owned())]
    pub name: String,

    /// Indicator whether the `Secure` flag is set on the cookie.
    ///
    /// Should only be disabled for local plain-HTTP development.
    #[default(true)]
    pub secure: bool,

    /// Expiry window of the cookie, aligned to the session validity window.
    #[default(Duration::from_secs(7 * 24 * 60 * 60))]
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

/// Route access configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Gate {
    /// Path of the login page.
    #[default("/login".to_owned())]
    pub login_path: String,

    /// Path of the home page.
    #[default("/".to_owned())]
    pub home_path: String,

    /// Path of the access denied page.
    #[default("/denied".to_owned())]
    pub denied_path: String,

    /// Public paths requiring no session.
    ///
    /// An entry ending with `/*` matches the whole subtree under its prefix.
    #[default(_code = "[\"/login\", \"/assets/*\", \"/favicon.ico\"]\
                       .map(str::to_owned).into()")]
    pub public: Vec<String>,

    /// Role-gated routes.
    #[default(Route::defaults())]
    pub routes: Vec<Route>,

    /// Policy applied to paths having no configured [`Route`].
    pub fallback: RoutePolicy,
}

/// Single role-gated route.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Route {
    /// Path of the route.
    pub path: String,

    /// [`Role`]s allowed on the path.
    ///
    /// An empty list admits any authenticated session.
    pub roles: Vec<Role>,
}

impl Route {
    /// Returns the default set of [`Route`]s.
    fn defaults() -> Vec<Self> {
        let open = |path: &str| Self {
            path: path.to_owned(),
            roles: vec![],
        };
        vec![
            open("/"),
            open("/logout"),
            open("/denied"),
            open("/page1"),
            Self {
                path: "/page2".to_owned(),
                roles: vec![Role::Admin],
            },
        ]
    }
}

/// Session renewal configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Renew {
    /// Grace period before the first renewal attempt.
    #[default(Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Interval until the next attempt once a renewal succeeds.
    #[default(Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Lower bound of the delay until a server-scheduled retry.
    #[default(Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub min_retry_delay: Duration,

    /// Delay until the next attempt after a failed one.
    #[default(Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub failure_backoff: Duration,
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
