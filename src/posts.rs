use pulldown_cmark::{html, Event, Options, Parser};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::models::{PostWithAuthor, POST_WITH_AUTHOR_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::likes::{self, LikeTarget};

/// A post as shown on its own page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostWithAuthor,
    pub likes_count: i64,
    pub content_html: String,
}

pub fn get_post(conn: &Connection, post_id: &str) -> AppResult<PostDetail> {
    let sql = format!(
        "SELECT {POST_WITH_AUTHOR_COLUMNS}
         FROM posts p
         LEFT JOIN profiles pr ON pr.id = p.user_id
         WHERE p.id = ?1"
    );
    let post = conn
        .query_row(&sql, params![post_id], PostWithAuthor::from_row)
        .optional()?
        .ok_or(AppError::NotFound)?;

    let likes_count = likes::count(conn, &LikeTarget::Post(post_id.to_string()))?;
    let content_html = render_markdown(&post.post.content);

    Ok(PostDetail {
        post,
        likes_count,
        content_html,
    })
}

/// Markdown to HTML. Raw HTML in the source is escaped, not passed through.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
