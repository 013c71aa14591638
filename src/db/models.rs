use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// The minimal author projection joined onto posts and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub images_urls: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<AuthorSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub text: String,
    pub likes_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<AuthorSummary>,
}

/// Column list matching [`PostWithAuthor::from_row`].
pub const POST_WITH_AUTHOR_COLUMNS: &str =
    "p.id, p.user_id, p.title, p.content, p.cover_image, p.images_urls, p.tags, p.created_at,
     pr.id, pr.username, pr.avatar_url";

impl PostWithAuthor {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PostWithAuthor {
            post: Post {
                id: row.get(0)?,
                author_id: row.get(1)?,
                title: row.get(2)?,
                content: row.get(3)?,
                cover_image: row.get(4)?,
                images_urls: json_list(row, 5)?,
                tags: json_list(row, 6)?,
                created_at: row.get(7)?,
            },
            author: author_at(row, 8)?,
        })
    }
}

/// Reads an author projection starting at `idx` (id, username, avatar_url).
/// A LEFT JOIN miss yields `None`.
pub fn author_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<AuthorSummary>> {
    let id: Option<String> = row.get(idx)?;
    match id {
        Some(id) => Ok(Some(AuthorSummary {
            id,
            username: row.get(idx + 1)?,
            avatar_url: row.get(idx + 2)?,
        })),
        None => Ok(None),
    }
}

/// Decodes a JSON string array column. NULL reads as an empty list.
pub fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_with_author_serializes_flat() {
        let post = PostWithAuthor {
            post: Post {
                id: "p1".into(),
                author_id: "u1".into(),
                title: "Hello".into(),
                content: "World".into(),
                cover_image: None,
                images_urls: vec![],
                tags: vec!["travel".into()],
                created_at: "2026-01-01T00:00:00.000Z".into(),
            },
            author: Some(AuthorSummary {
                id: "u1".into(),
                username: "alice".into(),
                avatar_url: None,
            }),
        };

        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["title"], "Hello");
        assert_eq!(json["cover_image"], serde_json::Value::Null);
        assert_eq!(json["author"]["username"], "alice");

        let back: PostWithAuthor = serde_json::from_value(json).unwrap();
        assert_eq!(back, post);
    }

    #[test]
    fn json_list_reads_null_as_empty() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let list = conn
            .query_row("SELECT NULL", [], |row| json_list(row, 0))
            .unwrap();
        assert!(list.is_empty());

        let list = conn
            .query_row(r#"SELECT '["a","b"]'"#, [], |row| json_list(row, 0))
            .unwrap();
        assert_eq!(list, vec!["a", "b"]);
    }
}
