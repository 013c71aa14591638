//! Likes on posts and comments.
//!
//! A like is a boolean per (user, target). `like` and `unlike` are idempotent:
//! liking twice leaves one row, unliking a target the caller never liked is a
//! no-op. Both require an identity.
//!
//! Comment votes reuse the same rows: an upvote is a like, a downvote deletes
//! the caller's like whether or not one exists. There is no dislike state.
//! A comment's `likes_count` is always the number of rows, counted on read.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LikeTarget {
    Post(String),
    Comment(String),
}

impl LikeTarget {
    fn column(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "post_id",
            LikeTarget::Comment(_) => "comment_id",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "posts",
            LikeTarget::Comment(_) => "comments",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            LikeTarget::Post(id) | LikeTarget::Comment(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeState {
    NotLiked,
    Liked,
}

impl LikeState {
    pub fn is_liked(self) -> bool {
        self == LikeState::Liked
    }
}

impl From<bool> for LikeState {
    fn from(liked: bool) -> Self {
        if liked {
            LikeState::Liked
        } else {
            LikeState::NotLiked
        }
    }
}

fn require(identity: Option<&Identity>) -> AppResult<&Identity> {
    identity.ok_or(AppError::Unauthorized)
}

fn ensure_exists(conn: &Connection, target: &LikeTarget) -> AppResult<()> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", target.table());
    conn.query_row(&sql, params![target.id()], |_| Ok(()))
        .optional()?
        .ok_or(AppError::NotFound)
}

/// `not-liked → liked`. Already liked is a no-op.
pub fn like(
    conn: &Connection,
    identity: Option<&Identity>,
    target: &LikeTarget,
) -> AppResult<LikeState> {
    let user = require(identity)?;
    ensure_exists(conn, target)?;

    let sql = format!(
        "INSERT OR IGNORE INTO likes (user_id, {}) VALUES (?1, ?2)",
        target.column()
    );
    let inserted = conn.execute(&sql, params![user.user_id, target.id()])?;
    tracing::debug!(user_id = %user.user_id, ?target, inserted, "Like");

    Ok(LikeState::Liked)
}

/// `liked → not-liked`. Not liked is a no-op.
pub fn unlike(
    conn: &Connection,
    identity: Option<&Identity>,
    target: &LikeTarget,
) -> AppResult<LikeState> {
    let user = require(identity)?;

    let sql = format!(
        "DELETE FROM likes WHERE user_id = ?1 AND {} = ?2",
        target.column()
    );
    let removed = conn.execute(&sql, params![user.user_id, target.id()])?;
    tracing::debug!(user_id = %user.user_id, ?target, removed, "Unlike");

    Ok(LikeState::NotLiked)
}

/// Flips the caller's current state: the like button on a post.
pub fn toggle(
    conn: &Connection,
    identity: Option<&Identity>,
    target: &LikeTarget,
) -> AppResult<LikeState> {
    let user = require(identity)?;
    if is_liked(conn, &user.user_id, target)? {
        unlike(conn, identity, target)
    } else {
        like(conn, identity, target)
    }
}

pub fn upvote_comment(
    conn: &Connection,
    identity: Option<&Identity>,
    comment_id: &str,
) -> AppResult<LikeState> {
    like(conn, identity, &LikeTarget::Comment(comment_id.to_string()))
}

/// Removes the caller's like on the comment, if any.
pub fn downvote_comment(
    conn: &Connection,
    identity: Option<&Identity>,
    comment_id: &str,
) -> AppResult<LikeState> {
    unlike(conn, identity, &LikeTarget::Comment(comment_id.to_string()))
}

pub fn is_liked(conn: &Connection, user_id: &str, target: &LikeTarget) -> AppResult<bool> {
    let sql = format!(
        "SELECT COUNT(*) > 0 FROM likes WHERE user_id = ?1 AND {} = ?2",
        target.column()
    );
    Ok(conn.query_row(&sql, params![user_id, target.id()], |r| r.get(0))?)
}

pub fn count(conn: &Connection, target: &LikeTarget) -> AppResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM likes WHERE {} = ?1", target.column());
    Ok(conn.query_row(&sql, params![target.id()], |r| r.get(0))?)
}
