pub mod models;

use chrono::{SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Per-connection setup: pragmas that SQLite scopes to a connection, plus the
/// scalar functions the feed queries rely on.
fn init_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;
    register_functions(conn)
}

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(init_connection);
    let pool = Pool::builder().max_size(8).build(manager)?;

    // WAL is persistent in the database file, set it once
    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// A single-connection in-memory pool. Every checkout sees the same database.
pub fn create_memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(init_connection);
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Registers `contains_ci(haystack, needle)`: a Unicode-aware,
/// case-insensitive substring test. SQLite's own LIKE only folds ASCII.
pub fn register_functions(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: Option<String> = ctx.get(0)?;
            let needle: Option<String> = ctx.get(1)?;
            Ok(match (haystack, needle) {
                (Some(haystack), Some(needle)) => contains_ci(&haystack, &needle),
                _ => false,
            })
        },
    )
}

pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Timestamp format for every `created_at` this crate writes. Lexical order
/// matches chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> DbPool {
        let pool = create_memory_pool().unwrap();
        run_migrations(&pool).unwrap();
        pool
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        // Verify we can get a connection
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_create_content_tables() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in ["accounts", "sessions", "profiles", "posts", "comments", "likes"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = test_pool();
        run_migrations(&pool).unwrap(); // Should not error on second run

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        // Inserting a post for a non-existent profile should fail
        let result = conn.execute(
            "INSERT INTO posts (id, user_id, title, content) VALUES (?1, ?2, ?3, ?4)",
            params!["post-1", "nonexistent-user", "t", "c"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn like_must_target_exactly_one_record() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO accounts (id, email, password_hash) VALUES ('u1', 'a@b.c', 'x');
             INSERT INTO profiles (id, username) VALUES ('u1', 'alice');
             INSERT INTO posts (id, user_id, title, content) VALUES ('p1', 'u1', 't', 'c');
             INSERT INTO comments (id, post_id, user_id, text) VALUES ('c1', 'p1', 'u1', 'hi');",
        )
        .unwrap();

        let neither = conn.execute("INSERT INTO likes (user_id) VALUES ('u1')", []);
        assert!(neither.is_err());

        let both = conn.execute(
            "INSERT INTO likes (user_id, post_id, comment_id) VALUES ('u1', 'p1', 'c1')",
            [],
        );
        assert!(both.is_err());

        conn.execute("INSERT INTO likes (user_id, post_id) VALUES ('u1', 'p1')", [])
            .unwrap();
        let duplicate = conn.execute("INSERT INTO likes (user_id, post_id) VALUES ('u1', 'p1')", []);
        assert!(duplicate.is_err());
    }

    #[test]
    fn contains_ci_folds_unicode() {
        assert!(contains_ci("Привет, Мир", "мир"));
        assert!(contains_ci("Hello World", "WORLD"));
        assert!(!contains_ci("Hello", "bye"));
    }

    #[test]
    fn contains_ci_is_callable_from_sql() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let hit: bool = conn
            .query_row("SELECT contains_ci('Путешествие', 'ПУТЬ')", [], |r| r.get(0))
            .unwrap();
        assert!(!hit);
        let hit: bool = conn
            .query_row("SELECT contains_ci('Путешествие', 'ПУТЕ')", [], |r| r.get(0))
            .unwrap();
        assert!(hit);
        let null: bool = conn
            .query_row("SELECT contains_ci(NULL, 'x')", [], |r| r.get(0))
            .unwrap();
        assert!(!null);
    }

    #[test]
    fn now_timestamp_sorts_lexically() {
        let a = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_timestamp();
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }
}
