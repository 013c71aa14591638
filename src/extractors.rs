use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use crate::auth::{session, Identity};
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller. Rejects with 401 when there is no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(identity)) => Ok(CurrentUser(identity)),
            MaybeUser(None) => Err(AppError::Unauthorized),
        }
    }
}

/// Optional user extractor: `None` instead of 401 when not authenticated.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

impl MaybeUser {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers, &state.config.auth.cookie_name) else {
            return Ok(MaybeUser(None));
        };

        let conn = state.db.get()?;
        Ok(MaybeUser(session::lookup(&conn, token)?))
    }
}

/// The value of the session cookie named `cookie_name`, if present.
pub fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (key, val) = cookie.split_once('=')?;
            if key.trim() == cookie_name {
                Some(val.trim())
            } else {
                None
            }
        })
        .filter(|val| !val.is_empty())
}
