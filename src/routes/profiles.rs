use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::auth::events::SessionEvent;
use crate::cache::QueryKey;
use crate::db::models::{PostWithAuthor, Profile};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::feed;
use crate::profiles::{self, ProfileUpdate};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/profiles/{id}", get(profile))
        .route("/api/profiles/{id}/posts", get(profile_posts))
        .route("/api/profile", put(update_profile))
}

async fn profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Profile>> {
    let profile = state
        .cache
        .get_or_try_insert_with(&QueryKey::Profile(id.clone()), || {
            let conn = state.db.get()?;
            profiles::get_profile(&conn, &id)
        })?;
    Ok(Json(profile))
}

async fn profile_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<PostWithAuthor>>> {
    let posts = state
        .cache
        .get_or_try_insert_with(&QueryKey::ProfilePosts(id.clone()), || {
            let conn = state.db.get()?;
            profiles::get_profile(&conn, &id)?;
            feed::posts_by_author(&conn, &id)
        })?;
    Ok(Json(posts))
}

async fn update_profile(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<Profile>> {
    let profile = {
        let conn = state.db.get()?;
        profiles::update_profile(&conn, user.identity(), &update)?
    };

    // The author projection is embedded in every cached listing.
    state.cache.clear();
    state.sessions.publish(SessionEvent::ProfileUpdated {
        user_id: profile.id.clone(),
        username: profile.username.clone(),
    });

    Ok(Json(profile))
}
