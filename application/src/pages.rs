//! Page handlers.

use axum::{
    extract::{Extension, Query, State},
    response::{Html, IntoResponse as _, Redirect, Response},
    Form,
};
use itertools::Itertools as _;
use secrecy::SecretString;
use serde::Deserialize;
use service::{
    command::CreateSession,
    domain::{session, Session},
    task::RenewSession,
    Command as _,
};
use tracing as log;

use crate::{cookie, AppState, AsError as _, Error};

/// Home page of an authenticated user.
pub async fn home(Extension(session): Extension<Session>) -> Html<String> {
    page(
        "Home",
        &format!(
            "<p>Welcome, {}.</p>\
             <p><a href=\"/page1\">Page 1</a> \
                <a href=\"/page2\">Page 2</a> \
                <a href=\"/logout\">Log out</a></p>",
            escape(session.subject.as_ref()),
        ),
    )
}

/// Query parameters of the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// [`Error`] code of the failed login attempt, if any.
    error: Option<String>,
}

/// Login page.
pub async fn login_form(Query(query): Query<LoginQuery>) -> Html<String> {
    let notice = query.error.as_deref().map_or_else(String::new, |code| {
        format!("<p>{}</p>", escape(Error::message_of(code)))
    });
    page(
        "Login",
        &format!(
            "{notice}\
             <form method=\"post\" action=\"/login\">\
             <input name=\"username\" placeholder=\"Username\" required>\
             <input name=\"password\" type=\"password\" \
                    placeholder=\"Password\">\
             <button type=\"submit\">Log in</button>\
             </form>",
        ),
    )
}

/// Credentials submitted by the login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    /// Submitted login name.
    username: session::Subject,

    /// Submitted password, if any.
    password: Option<String>,
}

/// Performs a login attempt out of the submitted [`LoginForm`].
///
/// A successful one installs the session cookie and starts the renewal
/// scheduler of the created session. A failed one redirects back to the
/// login page carrying the [`Error`] code of the failure.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let LoginForm { username, password } = form;

    let created = state
        .service
        .execute(CreateSession {
            username,
            password: password
                .filter(|p| !p.is_empty())
                .map(SecretString::from),
        })
        .await;

    let output = match created {
        Ok(output) => output,
        Err(e) => {
            let error = e.as_error();
            log::warn!("login attempt failed: {error}");
            return Redirect::to(&format!(
                "{}?error={}",
                state.config.gate.login_path, error.code,
            ))
            .into_response();
        }
    };

    let task = RenewSession::new(
        state.service.config().renew_session,
        state.service.identity().clone(),
        output.token.clone(),
        output.session.renewable_until,
    );
    let rotations = task.subscribe();
    state.sessions.insert(
        output.session.subject.clone(),
        output.token.clone(),
        task.start(),
        rotations,
    );

    log::info!(subject = %output.session.subject, "session created");

    let mut response =
        Redirect::to(&state.config.gate.home_path).into_response();
    cookie::attach(
        response.headers_mut(),
        &output.token,
        &state.config.cookie,
    );
    response
}

/// Logs the authenticated user out.
///
/// Stops the renewal scheduler, discards the session server-side
/// (best-effort) and expires the session cookie.
pub async fn logout(
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
    token: Option<Extension<session::Token>>,
) -> Response {
    if let Some(Extension(session)) = &session {
        state.sessions.remove(&session.subject);
        log::info!(subject = %session.subject, "session destroyed");
    }
    if let Some(Extension(token)) = token {
        _ = state
            .service
            .execute(service::command::DestroySession { token })
            .await;
    }

    let mut response =
        Redirect::to(&state.config.gate.login_path).into_response();
    cookie::clear(response.headers_mut(), &state.config.cookie);
    response
}

/// Access denied page.
pub async fn denied() -> Html<String> {
    page(
        "Access denied",
        "<p>You have no permission to view this page.</p>\
         <p><a href=\"/\">Home</a></p>",
    )
}

/// First role-gated page.
pub async fn page1(Extension(session): Extension<Session>) -> Html<String> {
    gated_page("Page 1", &session)
}

/// Second role-gated page.
pub async fn page2(Extension(session): Extension<Session>) -> Html<String> {
    gated_page("Page 2", &session)
}

/// Renders a role-gated page of an authenticated [`Session`].
fn gated_page(title: &str, session: &Session) -> Html<String> {
    page(
        title,
        &format!(
            "<p>Visible to {} with roles: {}.</p>\
             <p><a href=\"/\">Home</a></p>",
            escape(session.subject.as_ref()),
            session.roles.iter().map(ToString::to_string).sorted().join(", "),
        ),
    )
}

/// Renders a minimal HTML page.
fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\
         <html><head><title>{title}</title></head>\
         <body><h1>{title}</h1>{body}</body></html>",
    ))
}

/// Escapes the provided text for embedding into HTML.
fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '&' => "&amp;".to_owned(),
            '<' => "&lt;".to_owned(),
            '>' => "&gt;".to_owned(),
            '"' => "&quot;".to_owned(),
            '\'' => "&#39;".to_owned(),
            _ => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod spec {
    use super::escape;

    #[test]
    fn escapes_html_significant_characters() {
        assert_eq!(
            escape("<script>&\"'"),
            "&lt;script&gt;&amp;&quot;&#39;",
        );
    }
}
