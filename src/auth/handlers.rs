use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use futures::stream::Stream;
use serde_json::json;
use tokio_stream::StreamExt as _;

use crate::auth::accounts::{self, SignInRequest, SignUpOutcome, SignUpRequest};
use crate::auth::events::SessionEvent;
use crate::auth::{session, Identity};
use crate::config::AuthConfig;
use crate::error::AppResult;
use crate::extractors::{session_token, CurrentUser, MaybeUser};
use crate::state::AppState;

// -- Cookie helpers --

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let max_age_secs = auth.session_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        auth.cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

/// Opens a session for `identity` and answers with its cookie.
fn signed_in(state: &AppState, identity: Identity, status: &str) -> AppResult<Response> {
    let token = {
        let conn = state.db.get()?;
        session::create_session(&conn, &identity.user_id, state.config.auth.session_hours)?
    };

    state.sessions.publish(SessionEvent::SignedIn {
        user_id: identity.user_id.clone(),
    });
    tracing::info!(user_id = %identity.user_id, "Signed in");

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(&state.config.auth, &token),
        )]),
        Json(json!({ "status": status, "user": identity })),
    )
        .into_response())
}

/// POST /auth/signup
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> AppResult<Response> {
    let outcome = {
        let conn = state.db.get()?;
        accounts::sign_up(&conn, &req, &state.config.auth)?
    };

    match outcome {
        SignUpOutcome::SignedIn(identity) => signed_in(&state, identity, "signed_in"),
        SignUpOutcome::PendingConfirmation { .. } => {
            Ok(Json(json!({ "status": "pending_confirmation" })).into_response())
        }
    }
}

/// POST /auth/signin
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> AppResult<Response> {
    let identity = {
        let conn = state.db.get()?;
        accounts::sign_in(&conn, &req)?
    };
    signed_in(&state, identity, "signed_in")
}

/// GET /auth/confirm/{token}
pub async fn confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Response> {
    let identity = {
        let conn = state.db.get()?;
        accounts::confirm(&conn, &token)?
    };
    signed_in(&state, identity, "confirmed")
}

/// POST /auth/signout
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session_token(&headers, &state.config.auth.cookie_name) {
        let conn = state.db.get()?;
        if let Some(user_id) = session::delete_session(&conn, token)? {
            tracing::info!(user_id = %user_id, "Signed out");
            state.sessions.publish(SessionEvent::SignedOut { user_id });
        }
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(&state.config.auth))]),
        Json(json!({ "status": "signed_out" })),
    )
        .into_response())
}

/// GET /auth/me
pub async fn me(user: MaybeUser) -> Json<Option<Identity>> {
    Json(user.0)
}

/// GET /auth/events: the caller's session changes as server-sent events.
pub async fn events(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = state.sessions.subscribe(user.user_id).filter_map(|event| {
        match Event::default().event(event.name()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::warn!("Could not encode session event: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
