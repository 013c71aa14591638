use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::events::SessionEvents;
use crate::cache::QueryCache;
use crate::config::Config;
use crate::storage::ObjectStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub objects: Arc<dyn ObjectStore>,
    pub cache: Arc<QueryCache>,
    pub sessions: SessionEvents,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            db,
            config,
            objects,
            cache: Arc::new(QueryCache::new()),
            sessions: SessionEvents::new(),
        }
    }
}
