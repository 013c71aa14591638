use askama::Template;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::comments;
use crate::error::{AppError, AppResult};
use crate::feed;
use crate::posts;
use crate::profiles;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}", get(post_page))
        .route("/profile/{id}", get(profile_page))
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate {
    pub what: &'static str,
}

pub struct CommentView {
    pub author: String,
    pub text: String,
    pub published: String,
    pub likes_count: i64,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub title: String,
    pub author: String,
    pub author_id: String,
    pub published: String,
    pub cover_image: Option<String>,
    pub content_html: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub comments: Vec<CommentView>,
}

pub struct PostCard {
    pub id: String,
    pub title: String,
    pub published: String,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub username: String,
    pub avatar_url: Option<String>,
    pub posts: Vec<PostCard>,
}

fn not_found(what: &'static str) -> Response {
    (StatusCode::NOT_FOUND, Html(NotFoundTemplate { what })).into_response()
}

const UNKNOWN_AUTHOR: &str = "Unknown author";

// --- Handlers ---

async fn post_page(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let detail = match posts::get_post(&conn, &id) {
        Ok(detail) => detail,
        Err(AppError::NotFound) => return Ok(not_found("post")),
        Err(e) => return Err(e),
    };

    let comments = comments::list_comments(&conn, &id)?
        .into_iter()
        .map(|c| CommentView {
            author: c
                .author
                .map(|a| a.username)
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            text: c.comment.text,
            published: format_timestamp(&c.comment.created_at),
            likes_count: c.comment.likes_count,
        })
        .collect();

    let post = detail.post.post;
    let author = detail
        .post
        .author
        .map(|a| a.username)
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    Ok(Html(PostTemplate {
        title: post.title,
        author,
        author_id: post.author_id,
        published: format_timestamp(&post.created_at),
        cover_image: post.cover_image,
        content_html: detail.content_html,
        images: post.images_urls,
        tags: post.tags,
        likes_count: detail.likes_count,
        comments,
    })
    .into_response())
}

async fn profile_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let profile = match profiles::get_profile(&conn, &id) {
        Ok(profile) => profile,
        Err(AppError::NotFound) => return Ok(not_found("profile")),
        Err(e) => return Err(e),
    };

    let posts = feed::posts_by_author(&conn, &id)?
        .into_iter()
        .map(|p| PostCard {
            published: format_timestamp(&p.post.created_at),
            id: p.post.id,
            title: p.post.title,
        })
        .collect();

    Ok(Html(ProfileTemplate {
        username: profile.username,
        avatar_url: profile.avatar_url,
        posts,
    })
    .into_response())
}

/// Formats a stored timestamp relative to now; unparseable input is shown as is.
fn format_timestamp(stored: &str) -> String {
    DateTime::parse_from_rfc3339(stored)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(stored, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| stored.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn format_relative_time_recent() {
        let now = Utc::now().naive_utc();
        assert_eq!(format_relative_time(&now), "just now");

        let dt = now - chrono::Duration::minutes(5);
        assert_eq!(format_relative_time(&dt), "5m ago");

        let dt = now - chrono::Duration::hours(3);
        assert_eq!(format_relative_time(&dt), "3h ago");

        let dt = now - chrono::Duration::days(2);
        assert_eq!(format_relative_time(&dt), "2d ago");
    }

    #[test]
    fn format_relative_time_old_date() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(format_relative_time(&dt), "Jan 15, 2025");
    }

    #[test]
    fn format_timestamp_reads_stored_formats() {
        assert_eq!(format_timestamp("2025-01-15T12:00:00.000Z"), "Jan 15, 2025");
        assert_eq!(format_timestamp("2025-01-15 12:00:00"), "Jan 15, 2025");
        assert_eq!(format_timestamp("not-a-date"), "not-a-date");
    }

    #[test]
    fn not_found_page_renders_with_404() {
        let response = not_found("post");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = NotFoundTemplate { what: "post" }.render().unwrap();
        assert!(body.contains("This post does not exist"));
    }

    #[test]
    fn post_page_escapes_text_but_not_rendered_markdown() {
        let page = PostTemplate {
            title: "<b>Hi</b>".into(),
            author: "alice".into(),
            author_id: "u1".into(),
            published: "just now".into(),
            cover_image: None,
            content_html: "<p>World</p>".into(),
            images: vec![],
            tags: vec!["travel".into()],
            likes_count: 2,
            comments: vec![],
        }
        .render()
        .unwrap();

        assert!(page.contains("&lt;b&gt;Hi"));
        assert!(!page.contains("<b>Hi"));
        assert!(page.contains("<p>World</p>"));
        assert!(page.contains("#travel"));
        assert!(page.contains("2 likes"));
    }
}
