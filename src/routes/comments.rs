use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::comments;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::likes::{self, LikeTarget};
use crate::routes::posts::LikeStatus;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/comments/{id}/upvote", post(upvote))
        .route("/api/comments/{id}/downvote", post(downvote))
        .route("/api/comments/{id}/like", get(comment_liked))
}

async fn upvote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<LikeStatus>> {
    let conn = state.db.get()?;
    likes::upvote_comment(&conn, Some(&user), &id)?;

    let post_id = comments::post_id_of(&conn, &id)?;
    let target = LikeTarget::Comment(id);
    state
        .cache
        .invalidate_like(&user.user_id, &target, post_id.as_deref());

    Ok(Json(LikeStatus::read(&conn, Some(&user.user_id), &target)?))
}

async fn downvote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<LikeStatus>> {
    let conn = state.db.get()?;
    likes::downvote_comment(&conn, Some(&user), &id)?;

    let post_id = comments::post_id_of(&conn, &id)?;
    let target = LikeTarget::Comment(id);
    state
        .cache
        .invalidate_like(&user.user_id, &target, post_id.as_deref());

    Ok(Json(LikeStatus::read(&conn, Some(&user.user_id), &target)?))
}

async fn comment_liked(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<LikeStatus>> {
    let conn = state.db.get()?;
    comments::get_comment(&conn, &id)?;

    let user_id = user.identity().map(|u| u.user_id.as_str());
    Ok(Json(LikeStatus::read(&conn, user_id, &LikeTarget::Comment(id))?))
}
