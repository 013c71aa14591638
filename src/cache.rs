//! Request-result cache keyed by query parameters.
//!
//! Entries never expire on their own. Every mutating operation invalidates the
//! keys whose results it changes, so content created or liked by a request is
//! visible to the very next read.
//!
//! Feed keys come from user input, so the map is bounded: once it holds
//! [`MAX_ENTRIES`] values, every feed page is dropped before the next insert.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppResult;
use crate::feed::FeedRequest;
use crate::likes::LikeTarget;

pub const MAX_ENTRIES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// One feed page for one filter state.
    Feed(FeedRequest),
    /// The distinct tag universe.
    Tags,
    /// Post detail, including its like count.
    Post(String),
    /// Comment list of a post.
    Comments(String),
    /// Whether `user_id` currently likes `target`.
    Liked { user_id: String, target: LikeTarget },
    Profile(String),
    ProfilePosts(String),
}

#[derive(Default)]
struct Entries {
    values: HashMap<QueryKey, serde_json::Value>,
    /// Bumped on every invalidation so a read computed before a write cannot
    /// be stored after it.
    generation: u64,
}

impl Entries {
    /// Makes room for one more value. Eviction only forgets results, so the
    /// generation is left alone.
    fn make_room(&mut self) {
        if self.values.len() < MAX_ENTRIES {
            return;
        }
        self.values.retain(|key, _| !matches!(key, QueryKey::Feed(_)));
        if self.values.len() >= MAX_ENTRIES {
            self.values.clear();
        }
        tracing::debug!(remaining = self.values.len(), "Query cache evicted");
    }
}

#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<Entries>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let entries = self.lock();
        let value = entries.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(?key, "Discarding unreadable cache entry: {}", e);
                None
            }
        }
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().values.contains_key(key)
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result. Errors are returned and never cached.
    pub fn get_or_try_insert_with<T, F>(&self, key: &QueryKey, fetch: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> AppResult<T>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let generation = self.lock().generation;
        let value = fetch()?;
        let json = serde_json::to_value(&value)?;

        let mut entries = self.lock();
        if entries.generation == generation {
            if !entries.values.contains_key(key) {
                entries.make_room();
            }
            entries.values.insert(key.clone(), json);
        }
        Ok(value)
    }

    pub fn invalidate(&self, key: &QueryKey) {
        let mut entries = self.lock();
        entries.values.remove(key);
        entries.generation += 1;
    }

    pub fn invalidate_where(&self, predicate: impl Fn(&QueryKey) -> bool) {
        let mut entries = self.lock();
        entries.values.retain(|key, _| !predicate(key));
        entries.generation += 1;
    }

    /// Everything a newly published post can appear in.
    pub fn invalidate_listings(&self, author_id: &str) {
        self.invalidate_where(|key| match key {
            QueryKey::Feed(_) | QueryKey::Tags => true,
            QueryKey::ProfilePosts(id) => id == author_id,
            _ => false,
        });
    }

    /// Invalidates the view keyed by `target` and the caller's liked flag.
    /// `comment_post_id` is the owning post when `target` is a comment.
    pub fn invalidate_like(
        &self,
        user_id: &str,
        target: &LikeTarget,
        comment_post_id: Option<&str>,
    ) {
        let view = match target {
            LikeTarget::Post(id) => Some(QueryKey::Post(id.clone())),
            LikeTarget::Comment(_) => comment_post_id.map(|id| QueryKey::Comments(id.to_string())),
        };
        let liked = QueryKey::Liked {
            user_id: user_id.to_string(),
            target: target.clone(),
        };
        self.invalidate_where(|key| *key == liked || Some(key) == view.as_ref());
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.values.clear();
        entries.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
