use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::cache::QueryKey;
use crate::comments;
use crate::composer::{self, ImageUpload, PostDraft};
use crate::db::models::{CommentWithAuthor, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::feed::{self, FeedFilter, FeedPage, FeedRequest};
use crate::likes::{self, LikeState, LikeTarget};
use crate::posts::{self, PostDetail};
use crate::state::AppState;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/posts",
            get(feed_page)
                .post(create_post)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/tags", get(tags))
        .route("/api/posts/{id}", get(post_detail))
        .route(
            "/api/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/api/posts/{id}/like",
            get(post_liked)
                .post(toggle_like)
                .put(like_post)
                .delete(unlike_post),
        )
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub q: Option<String>,
    pub tag: Option<String>,
    /// Parsed by the handler so a malformed value gets the JSON error body.
    pub offset: Option<String>,
}

impl FeedQuery {
    pub fn offset(&self) -> AppResult<u64> {
        let raw = match self.offset.as_deref().map(str::trim) {
            None | Some("") => return Ok(0),
            Some(raw) => raw,
        };
        let offset = raw.parse::<u64>().map_err(|_| {
            AppError::Validation("offset must be a non-negative integer".to_string())
        })?;
        feed::validate_offset(offset)?;
        Ok(offset)
    }
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub text: String,
}

/// Answer to every like, unlike, vote, and liked-flag request.
#[derive(Debug, Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes_count: i64,
}

impl LikeStatus {
    pub fn read(conn: &Connection, user_id: Option<&str>, target: &LikeTarget) -> AppResult<Self> {
        let liked = match user_id {
            Some(user_id) => likes::is_liked(conn, user_id, target)?,
            None => false,
        };
        Ok(Self {
            liked,
            likes_count: likes::count(conn, target)?,
        })
    }
}

// --- Handlers ---

async fn feed_page(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<FeedPage>> {
    let request = FeedRequest {
        filter: FeedFilter::new(query.q.as_deref(), query.tag.as_deref()),
        offset: query.offset()?,
    };
    let page_size = state.config.feed.page_size;

    let page = state
        .cache
        .get_or_try_insert_with(&QueryKey::Feed(request.clone()), || {
            let conn = state.db.get()?;
            feed::fetch_page(&conn, &request.filter, request.offset, page_size)
        })?;
    Ok(Json(page))
}

async fn tags(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let tags = state.cache.get_or_try_insert_with(&QueryKey::Tags, || {
        let conn = state.db.get()?;
        feed::all_tags(&conn)
    })?;
    Ok(Json(tags))
}

async fn read_image(field: axum::extract::multipart::Field<'_>) -> AppResult<Option<ImageUpload>> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?;

    // Browsers submit an empty part for an untouched file input.
    if file_name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }
    let file_name = if file_name.is_empty() {
        "image".to_string()
    } else {
        file_name
    };

    Ok(Some(ImageUpload {
        file_name,
        content_type,
        bytes,
    }))
}

async fn create_post(
    State(state): State<AppState>,
    user: MaybeUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Post>)> {
    let author = user.identity().ok_or(AppError::Unauthorized)?;

    let mut draft = PostDraft::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => draft.title = field.text().await?,
            "content" => draft.content = field.text().await?,
            "tags" => draft.tags_input = field.text().await?,
            "cover" => draft.cover = read_image(field).await?,
            "images" => {
                if let Some(image) = read_image(field).await? {
                    draft.images.push(image);
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let post = composer::publish(&state.db, state.objects.as_ref(), Some(author), draft).await?;
    state.cache.invalidate_listings(&post.author_id);

    Ok((StatusCode::CREATED, Json(post)))
}

async fn post_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PostDetail>> {
    let detail = state
        .cache
        .get_or_try_insert_with(&QueryKey::Post(id.clone()), || {
            let conn = state.db.get()?;
            posts::get_post(&conn, &id)
        })?;
    Ok(Json(detail))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<CommentWithAuthor>>> {
    let comments = state
        .cache
        .get_or_try_insert_with(&QueryKey::Comments(id.clone()), || {
            let conn = state.db.get()?;
            comments::list_comments(&conn, &id)
        })?;
    Ok(Json(comments))
}

async fn create_comment(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
    Json(body): Json<NewComment>,
) -> AppResult<(StatusCode, Json<CommentWithAuthor>)> {
    let comment = {
        let conn = state.db.get()?;
        comments::create_comment(&conn, user.identity(), &id, &body.text)?
    };
    state.cache.invalidate(&QueryKey::Comments(id));

    Ok((StatusCode::CREATED, Json(comment)))
}

async fn post_liked(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<LikeStatus>> {
    let target = LikeTarget::Post(id);
    let Some(identity) = user.identity() else {
        let conn = state.db.get()?;
        return Ok(Json(LikeStatus::read(&conn, None, &target)?));
    };

    let liked = state.cache.get_or_try_insert_with(
        &QueryKey::Liked {
            user_id: identity.user_id.clone(),
            target: target.clone(),
        },
        || {
            let conn = state.db.get()?;
            likes::is_liked(&conn, &identity.user_id, &target)
        },
    )?;
    let conn = state.db.get()?;
    Ok(Json(LikeStatus {
        liked,
        likes_count: likes::count(&conn, &target)?,
    }))
}

/// Applies one like mutation to a post, invalidates what it changed, and
/// reports the resulting state.
fn mutate_post_like(
    state: &AppState,
    user: &Identity,
    id: String,
    op: fn(&Connection, Option<&Identity>, &LikeTarget) -> AppResult<LikeState>,
) -> AppResult<Json<LikeStatus>> {
    let target = LikeTarget::Post(id);
    let conn = state.db.get()?;
    op(&conn, Some(user), &target)?;
    state.cache.invalidate_like(&user.user_id, &target, None);

    Ok(Json(LikeStatus::read(&conn, Some(&user.user_id), &target)?))
}

async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<LikeStatus>> {
    mutate_post_like(&state, &user, id, likes::toggle)
}

async fn like_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<LikeStatus>> {
    mutate_post_like(&state, &user, id, likes::like)
}

async fn unlike_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<LikeStatus>> {
    mutate_post_like(&state, &user, id, likes::unlike)
}
