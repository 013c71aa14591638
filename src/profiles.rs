use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::auth::Identity;
use crate::db::models::Profile;
use crate::error::{AppError, AppResult};

pub const MAX_USERNAME_LEN: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    /// An empty string clears the avatar.
    pub avatar_url: Option<String>,
}

pub fn get_profile(conn: &Connection, id: &str) -> AppResult<Profile> {
    conn.query_row(
        "SELECT id, username, avatar_url FROM profiles WHERE id = ?1",
        params![id],
        |row| {
            Ok(Profile {
                id: row.get(0)?,
                username: row.get(1)?,
                avatar_url: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn validate_username(username: &str) -> AppResult<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be {} characters or less",
            MAX_USERNAME_LEN
        )));
    }
    Ok(username.to_string())
}

/// Updates the caller's own profile. There is no way to address another
/// user's profile.
pub fn update_profile(
    conn: &Connection,
    identity: Option<&Identity>,
    update: &ProfileUpdate,
) -> AppResult<Profile> {
    let user = identity.ok_or(AppError::Unauthorized)?;
    let mut profile = get_profile(conn, &user.user_id)?;

    if let Some(username) = &update.username {
        profile.username = validate_username(username)?;
    }
    if let Some(avatar_url) = &update.avatar_url {
        let avatar_url = avatar_url.trim();
        profile.avatar_url = (!avatar_url.is_empty()).then(|| avatar_url.to_string());
    }

    conn.execute(
        "UPDATE profiles SET username = ?1, avatar_url = ?2 WHERE id = ?3",
        params![profile.username, profile.avatar_url, profile.id],
    )?;
    tracing::info!(user_id = %profile.id, "Profile updated");

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_user, test_pool};

    #[test]
    fn get_profile_by_id() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn, "u1", "alice");

        let profile = get_profile(&conn, "u1").unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.avatar_url, None);
        assert!(matches!(get_profile(&conn, "nope"), Err(AppError::NotFound)));
    }

    #[test]
    fn update_changes_only_given_fields() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = seed_user(&conn, "u1", "alice");

        let profile = update_profile(
            &conn,
            Some(&alice),
            &ProfileUpdate {
                username: None,
                avatar_url: Some("https://img/a.png".into()),
            },
        )
        .unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img/a.png"));

        let profile = update_profile(
            &conn,
            Some(&alice),
            &ProfileUpdate {
                username: Some("  Alice B ".into()),
                avatar_url: Some(String::new()),
            },
        )
        .unwrap();
        assert_eq!(profile.username, "Alice B");
        assert_eq!(profile.avatar_url, None);
        assert_eq!(get_profile(&conn, "u1").unwrap(), profile);
    }

    #[test]
    fn update_requires_identity_and_valid_username() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = seed_user(&conn, "u1", "alice");

        assert!(matches!(
            update_profile(&conn, None, &ProfileUpdate::default()),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            update_profile(
                &conn,
                Some(&alice),
                &ProfileUpdate {
                    username: Some("   ".into()),
                    avatar_url: None
                }
            ),
            Err(AppError::Validation(_))
        ));
    }
}
