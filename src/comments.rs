use rusqlite::{params, Connection, OptionalExtension};

use crate::auth::Identity;
use crate::db::models::{author_at, Comment, CommentWithAuthor};
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};

pub const MAX_COMMENT_LEN: usize = 2000;

const COMMENT_COLUMNS: &str = "c.id, c.post_id, c.user_id, c.text, c.created_at,
     (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id) AS likes_count,
     pr.id, pr.username, pr.avatar_url";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentWithAuthor> {
    Ok(CommentWithAuthor {
        comment: Comment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            author_id: row.get(2)?,
            text: row.get(3)?,
            created_at: row.get(4)?,
            likes_count: row.get(5)?,
        },
        author: author_at(row, 6)?,
    })
}

pub fn create_comment(
    conn: &Connection,
    identity: Option<&Identity>,
    post_id: &str,
    text: &str,
) -> AppResult<CommentWithAuthor> {
    let user = identity.ok_or(AppError::Unauthorized)?;

    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".into()));
    }
    if text.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::Validation(format!(
            "Comment must be {} characters or less",
            MAX_COMMENT_LEN
        )));
    }

    // Verify post exists
    conn.query_row("SELECT 1 FROM posts WHERE id = ?1", params![post_id], |_| Ok(()))
        .optional()?
        .ok_or(AppError::NotFound)?;

    let comment_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![comment_id, post_id, user.user_id, text, now_timestamp()],
    )
    .map_err(|e| AppError::from_constraint(e, "Could not add the comment"))?;

    tracing::info!(comment_id = %comment_id, post_id, "Comment created");
    get_comment(conn, &comment_id)
}

pub fn get_comment(conn: &Connection, comment_id: &str) -> AppResult<CommentWithAuthor> {
    let sql = format!(
        "SELECT {COMMENT_COLUMNS}
         FROM comments c
         LEFT JOIN profiles pr ON pr.id = c.user_id
         WHERE c.id = ?1"
    );
    conn.query_row(&sql, params![comment_id], from_row)
        .optional()?
        .ok_or(AppError::NotFound)
}

/// Comments on a post, most liked first, then oldest first.
pub fn list_comments(conn: &Connection, post_id: &str) -> AppResult<Vec<CommentWithAuthor>> {
    let sql = format!(
        "SELECT {COMMENT_COLUMNS}
         FROM comments c
         LEFT JOIN profiles pr ON pr.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY likes_count DESC, c.created_at ASC, c.rowid ASC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let comments = stmt
        .query_map(params![post_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// The post a comment belongs to, if the comment exists.
pub fn post_id_of(conn: &Connection, comment_id: &str) -> AppResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT post_id FROM comments WHERE id = ?1",
            params![comment_id],
            |r| r.get(0),
        )
        .optional()?)
}
