//! Feed query engine: turns (search text, selected tag, offset) into one
//! page of posts, newest first.
//!
//! Pagination is offset based. A page shorter than the page size is the last
//! one; the total number of matches is never computed. Every page of every
//! filter is ordered by the same key (`created_at DESC`, then row order), so
//! walking the pages of a fixed filter with no intervening writes visits each
//! matching post exactly once.

use std::collections::BTreeSet;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::db::models::{PostWithAuthor, POST_WITH_AUTHOR_COLUMNS};
use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: u32 = 9;

/// Canonical form of one tag: trimmed, a single leading `#` removed,
/// lowercased. Tags are stored and filtered in this form, so every tag in the
/// tag universe selects the posts that carry it.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let tag = trimmed.strip_prefix('#').unwrap_or(trimmed).trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

/// Checks a requested offset fits SQLite's signed 64-bit `OFFSET`.
pub fn validate_offset(offset: u64) -> AppResult<i64> {
    i64::try_from(offset)
        .map_err(|_| AppError::Validation("offset must be a non-negative integer".to_string()))
}

/// Normalized filter state. Two filters that differ only in surrounding
/// whitespace, a leading `#`, or tag case are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
}

impl FeedFilter {
    pub fn new(search: Option<&str>, tag: Option<&str>) -> Self {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let tag = tag.and_then(normalize_tag);
        Self { search, tag }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.search.is_none() && self.tag.is_none()
    }
}

/// A page request: one filter state plus an offset into its result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedRequest {
    pub filter: FeedFilter,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<PostWithAuthor>,
    /// Offset of the following page; `None` when this page is the last.
    pub next_offset: Option<u64>,
}

pub fn fetch_page(
    conn: &Connection,
    filter: &FeedFilter,
    offset: u64,
    page_size: u32,
) -> AppResult<FeedPage> {
    let page_size = page_size.max(1);
    let sql_offset = validate_offset(offset)?;
    let sql = format!(
        "SELECT {POST_WITH_AUTHOR_COLUMNS}
         FROM posts p
         LEFT JOIN profiles pr ON pr.id = p.user_id
         WHERE (?1 IS NULL OR contains_ci(p.title, ?1) OR contains_ci(p.content, ?1))
           AND (?2 IS NULL OR EXISTS (SELECT 1 FROM json_each(p.tags) t WHERE t.value = ?2))
         ORDER BY p.created_at DESC, p.rowid DESC
         LIMIT ?3 OFFSET ?4"
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let posts = stmt
        .query_map(
            params![filter.search, filter.tag, page_size as i64, sql_offset],
            PostWithAuthor::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    // No row can sit past i64::MAX, so a next offset beyond it means this
    // page was the last.
    let next_offset = if posts.len() == page_size as usize {
        offset
            .checked_add(u64::from(page_size))
            .filter(|next| validate_offset(*next).is_ok())
    } else {
        None
    };

    tracing::debug!(
        search = ?filter.search,
        tag = ?filter.tag,
        offset,
        rows = posts.len(),
        "Fetched feed page"
    );

    Ok(FeedPage { posts, next_offset })
}

/// Posts by one author, newest first. Unpaginated, like a profile page.
pub fn posts_by_author(conn: &Connection, author_id: &str) -> AppResult<Vec<PostWithAuthor>> {
    let sql = format!(
        "SELECT {POST_WITH_AUTHOR_COLUMNS}
         FROM posts p
         LEFT JOIN profiles pr ON pr.id = p.user_id
         WHERE p.user_id = ?1
         ORDER BY p.created_at DESC, p.rowid DESC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let posts = stmt
        .query_map(params![author_id], PostWithAuthor::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Sorted distinct tags across all posts, independent of any filter. Posts
/// with a missing or unreadable tag list contribute nothing.
pub fn all_tags(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT id, tags FROM posts")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;

    let mut tags = BTreeSet::new();
    for row in rows {
        let (post_id, raw) = row?;
        let Some(raw) = raw else { continue };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(list) => tags.extend(list.into_iter().filter(|t| !t.is_empty())),
            Err(e) => tracing::warn!(post_id = %post_id, "Skipping unreadable tag list: {}", e),
        }
    }

    Ok(tags.into_iter().collect())
}

/// Client-side state of an infinite-scrolling feed.
///
/// Holds the pages fetched so far for exactly one filter state. Changing the
/// filter discards them and restarts at offset 0, so pages of different
/// filters are never stitched together.
#[derive(Debug, Clone)]
pub struct FeedSession {
    filter: FeedFilter,
    pages: Vec<Vec<PostWithAuthor>>,
    next_offset: Option<u64>,
}

impl Default for FeedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedSession {
    pub fn new() -> Self {
        Self {
            filter: FeedFilter::default(),
            pages: Vec::new(),
            next_offset: Some(0),
        }
    }

    pub fn filter(&self) -> &FeedFilter {
        &self.filter
    }

    /// Switches filter state. Returns `true` when the filter actually changed
    /// and the session was reset.
    pub fn set_filter(&mut self, filter: FeedFilter) -> bool {
        if filter == self.filter {
            return false;
        }
        self.filter = filter;
        self.reset();
        true
    }

    /// Drops fetched pages and restarts from offset 0 with the same filter,
    /// e.g. after the cache was invalidated by a new post.
    pub fn reset(&mut self) {
        self.pages.clear();
        self.next_offset = Some(0);
    }

    /// The next page to fetch, or `None` once the last page was applied.
    pub fn next_request(&self) -> Option<FeedRequest> {
        self.next_offset.map(|offset| FeedRequest {
            filter: self.filter.clone(),
            offset,
        })
    }

    /// Appends a fetched page. A page for another filter or offset (a
    /// response that raced a filter change) is ignored and `false` returned.
    pub fn apply(&mut self, request: &FeedRequest, page: FeedPage) -> bool {
        if request.filter != self.filter || Some(request.offset) != self.next_offset {
            tracing::debug!(?request, "Discarding stale feed page");
            return false;
        }
        self.next_offset = page.next_offset;
        self.pages.push(page.posts);
        true
    }

    pub fn posts(&self) -> impl Iterator<Item = &PostWithAuthor> {
        self.pages.iter().flatten()
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_offset.is_none()
    }

    /// Terminal "no posts found" state: the first page came back empty.
    pub fn found_nothing(&self) -> bool {
        self.is_exhausted() && self.posts().next().is_none()
    }
}
