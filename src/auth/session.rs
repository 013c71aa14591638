use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::auth::Identity;

/// Create a new session for a user. Returns the session token.
pub fn create_session(
    conn: &Connection,
    user_id: &str,
    hours: u64,
) -> Result<String, rusqlite::Error> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token. Returns the user it belonged to, if any.
pub fn delete_session(conn: &Connection, token: &str) -> Result<Option<String>, rusqlite::Error> {
    let user_id: Option<String> = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1",
            params![token],
            |r| r.get(0),
        )
        .optional()?;

    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(user_id)
}

/// Resolve an unexpired session token to the identity behind it.
pub fn lookup(conn: &Connection, token: &str) -> Result<Option<Identity>, rusqlite::Error> {
    conn.query_row(
        "SELECT p.id, p.username FROM sessions s
         JOIN profiles p ON p.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        |row| {
            Ok(Identity {
                user_id: row.get(0)?,
                username: row.get(1)?,
            })
        },
    )
    .optional()
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
