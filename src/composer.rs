//! Post composer: validates a draft, uploads its images, inserts the post.
//!
//! Uploads run one at a time (cover first, then body images in attachment
//! order) and all of them finish before the insert. The first failed upload
//! aborts the submission, so a post never references only some of its
//! images. Objects uploaded before the failure stay in the object store.

use bytes::Bytes;
use chrono::Utc;
use rusqlite::params;

use crate::auth::Identity;
use crate::db::models::Post;
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};
use crate::feed::normalize_tag;
use crate::state::DbPool;
use crate::storage::{sanitize_file_name, ObjectStore, UploadOptions};

pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    /// Markdown source.
    pub content: String,
    /// Raw tag input, e.g. `"#Travel, tech life"`.
    pub tags_input: String,
    pub cover: Option<ImageUpload>,
    pub images: Vec<ImageUpload>,
}

impl PostDraft {
    pub fn validate(&self) -> AppResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "Title must be {} characters or less",
                MAX_TITLE_LEN
            )));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::Validation("Content is required".into()));
        }
        for image in self.cover.iter().chain(&self.images) {
            if let Some(content_type) = &image.content_type {
                if !content_type.starts_with("image/") {
                    return Err(AppError::Validation(format!(
                        "{} is not an image",
                        image.file_name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Splits raw tag input on whitespace and commas and normalizes each token
/// with [`normalize_tag`], dropping empties. Order is kept; duplicates are
/// harmless.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(normalize_tag)
        .collect()
}

async fn upload_image(
    objects: &dyn ObjectStore,
    path: String,
    image: ImageUpload,
) -> AppResult<String> {
    let stored = objects
        .upload(&path, image.bytes, UploadOptions { overwrite: true })
        .await
        .map_err(|e| {
            tracing::warn!(path = %path, "Image upload failed: {}", e);
            AppError::from(e)
        })?;
    Ok(objects.public_url(&stored))
}

pub async fn publish(
    db: &DbPool,
    objects: &dyn ObjectStore,
    author: Option<&Identity>,
    draft: PostDraft,
) -> AppResult<Post> {
    let author = author.ok_or(AppError::Unauthorized)?;
    draft.validate()?;

    let PostDraft {
        title,
        content,
        tags_input,
        cover,
        images,
    } = draft;

    let cover_image = match cover {
        Some(image) => {
            let path = format!(
                "{}/{}-cover-{}",
                author.user_id,
                Utc::now().timestamp_millis(),
                sanitize_file_name(&image.file_name)
            );
            Some(upload_image(objects, path, image).await?)
        }
        None => None,
    };

    let mut images_urls = Vec::with_capacity(images.len());
    for (index, image) in images.into_iter().enumerate() {
        let path = format!(
            "{}/{}-{}-{}",
            author.user_id,
            Utc::now().timestamp_millis(),
            index,
            sanitize_file_name(&image.file_name)
        );
        images_urls.push(upload_image(objects, path, image).await?);
    }

    let post = Post {
        id: uuid::Uuid::now_v7().to_string(),
        author_id: author.user_id.clone(),
        title: title.trim().to_string(),
        content: content.trim().to_string(),
        cover_image,
        images_urls,
        tags: parse_tags(&tags_input),
        created_at: now_timestamp(),
    };

    let conn = db.get()?;
    conn.execute(
        "INSERT INTO posts (id, user_id, title, content, cover_image, images_urls, tags, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            post.id,
            post.author_id,
            post.title,
            post.content,
            post.cover_image,
            serde_json::to_string(&post.images_urls)?,
            serde_json::to_string(&post.tags)?,
            post.created_at,
        ],
    )
    .map_err(|e| AppError::from_constraint(e, "The post could not be saved"))?;

    tracing::info!(
        post_id = %post.id,
        author_id = %post.author_id,
        images = post.images_urls.len(),
        "Post published"
    );
    Ok(post)
}
