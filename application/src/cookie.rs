//! Session cookie handling.

use http::{header, HeaderMap, HeaderValue};
use service::domain::session;
use tracing as log;

use crate::config;

/// Extracts the [`session::Token`] out of the `Cookie` request header, if
/// it's present there.
#[must_use]
pub fn extract(
    headers: &HeaderMap,
    config: &config::Cookie,
) -> Option<session::Token> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == config.name).then(|| value.to_owned())
        })
        .next()
        .and_then(|raw| raw.parse().ok())
}

/// Appends a `Set-Cookie` response header carrying the provided
/// [`session::Token`].
pub fn attach(
    headers: &mut HeaderMap,
    token: &session::Token,
    config: &config::Cookie,
) {
    set(
        headers,
        &format!(
            "{}={}; Max-Age={}; {}HttpOnly; SameSite=Lax; Path=/",
            config.name,
            token,
            config.ttl.as_secs(),
            if config.secure { "Secure; " } else { "" },
        ),
    );
}

/// Appends a `Set-Cookie` response header expiring the session cookie
/// immediately.
pub fn clear(headers: &mut HeaderMap, config: &config::Cookie) {
    set(
        headers,
        &format!(
            "{}=; Max-Age=0; {}HttpOnly; SameSite=Lax; Path=/",
            config.name,
            if config.secure { "Secure; " } else { "" },
        ),
    );
}

fn set(headers: &mut HeaderMap, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            _ = headers.append(header::SET_COOKIE, value);
        }
        Err(e) => {
            // Token bytes came out of a validated header, so this is
            // unreachable in practice.
            log::error!("failed to encode `Set-Cookie` header: {e}");
        }
    }
}

#[cfg(test)]
mod spec {
    use http::{header, HeaderMap, HeaderValue};

    use crate::config;

    use super::{attach, clear, extract};

    fn config() -> config::Cookie {
        config::Cookie::default()
    }

    #[test]
    fn extracts_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        _ = headers.insert(
            header::COOKIE,
            HeaderValue::from_static(
                "theme=dark; access_token=abc.def.ghi; lang=en",
            ),
        );

        let token = extract(&headers, &config()).unwrap();

        assert_eq!(token.to_string(), "abc.def.ghi");
    }

    #[test]
    fn ignores_missing_and_foreign_cookies() {
        let mut headers = HeaderMap::new();
        assert!(extract(&headers, &config()).is_none());

        _ = headers.insert(
            header::COOKIE,
            HeaderValue::from_static("refresh_token=abc"),
        );
        assert!(extract(&headers, &config()).is_none());
    }

    #[test]
    fn attached_cookie_carries_security_attributes() {
        let mut headers = HeaderMap::new();

        attach(&mut headers, &"abc".parse().unwrap(), &config());

        let cookie =
            headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("access_token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let mut headers = HeaderMap::new();

        clear(&mut headers, &config());

        let cookie =
            headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("access_token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
