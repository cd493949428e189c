//! [`axum`] middleware gating every navigation.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse as _, Redirect, Response},
};
use service::{
    command::AuthorizeSession, domain::Session, gate::Decision, Command as _,
};
use tracing as log;

use crate::{cookie, AppState};

/// Decides every navigation before it reaches its page handler.
///
/// The session cookie is verified on each request: any verification failure
/// collapses into an anonymous navigation, so a stale or tampered token fails
/// toward the login page, never toward an allowed one. An allowed navigation
/// additionally re-attaches the latest token rotated by the renewal
/// scheduler, keeping the browser's cookie current.
pub async fn gate_navigation(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();

    let token = cookie::extract(request.headers(), &state.config.cookie);
    let session = match &token {
        Some(token) => state
            .service
            .execute(AuthorizeSession {
                token: token.clone(),
            })
            .await
            .inspect_err(|e| {
                log::debug!(%path, "rejected session token: {e}");
            })
            .ok(),
        None => None,
    };

    match state.service.gate().decide(&path, session.as_ref()) {
        Decision::Allow => {
            proceed(state, request, next, session, token).await
        }
        Decision::ToLogin => {
            Redirect::to(&state.config.gate.login_path).into_response()
        }
        Decision::ToDenied => {
            Redirect::to(&state.config.gate.denied_path).into_response()
        }
        Decision::ToHome => {
            Redirect::to(&state.config.gate.home_path).into_response()
        }
    }
}

/// Runs the allowed navigation, exposing the verified [`Session`] (if any) to
/// its page handler.
async fn proceed(
    state: AppState,
    mut request: Request,
    next: Next,
    session: Option<Session>,
    token: Option<service::domain::session::Token>,
) -> Response {
    if let Some(session) = &session {
        _ = request.extensions_mut().insert(session.clone());
    }
    if let Some(token) = &token {
        _ = request.extensions_mut().insert(token.clone());
    }

    let mut response = next.run(request).await;

    if let (Some(session), Some(token)) = (session, token) {
        if let Some(rotated) =
            state.sessions.rotated_token(&session.subject, &token)
        {
            cookie::attach(
                response.headers_mut(),
                &rotated,
                &state.config.cookie,
            );
        }
    }

    response
}
