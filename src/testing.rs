//! Fixtures shared by the unit tests.

use rusqlite::{params, Connection};

use crate::auth::Identity;
use crate::db::models::{Post, PostWithAuthor};
use crate::db;
use crate::state::DbPool;

pub fn test_pool() -> DbPool {
    let pool = db::create_memory_pool().unwrap();
    db::run_migrations(&pool).unwrap();
    pool
}

/// Inserts an account and its profile, returning the identity.
pub fn seed_user(conn: &Connection, id: &str, username: &str) -> Identity {
    conn.execute(
        "INSERT INTO accounts (id, email, password_hash, confirmed) VALUES (?1, ?2, 'x', 1)",
        params![id, format!("{}@example.com", id)],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO profiles (id, username) VALUES (?1, ?2)",
        params![id, username],
    )
    .unwrap();
    Identity {
        user_id: id.to_string(),
        username: username.to_string(),
    }
}

pub fn insert_post(
    conn: &Connection,
    id: &str,
    user_id: &str,
    title: &str,
    content: &str,
    tags: &[&str],
    created_at: &str,
) {
    conn.execute(
        "INSERT INTO posts (id, user_id, title, content, tags, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            user_id,
            title,
            content,
            serde_json::to_string(tags).unwrap(),
            created_at
        ],
    )
    .unwrap();
}

pub fn insert_comment(conn: &Connection, id: &str, post_id: &str, user_id: &str, text: &str) {
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, post_id, user_id, text, db::now_timestamp()],
    )
    .unwrap();
}

pub fn sample_post(id: &str) -> PostWithAuthor {
    PostWithAuthor {
        post: Post {
            id: id.to_string(),
            author_id: "u1".to_string(),
            title: "title".to_string(),
            content: "content".to_string(),
            cover_image: None,
            images_urls: Vec::new(),
            tags: Vec::new(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        },
        author: None,
    }
}
