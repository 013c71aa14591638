//! Accounts: sign-up, sign-in, and email confirmation.
//!
//! A profile is created in the same transaction as its account and shares its
//! id.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::auth::{session, Identity};
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::profiles::validate_username;

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Display name; defaults to the local part of the email.
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The account is usable right away.
    SignedIn(Identity),
    /// The account exists but must be confirmed with this token first.
    PendingConfirmation { confirmation_token: String },
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation("Invalid email address".into())),
    }
}

pub fn sign_up(
    conn: &Connection,
    request: &SignUpRequest,
    policy: &AuthConfig,
) -> AppResult<SignUpOutcome> {
    let email = normalize_email(&request.email)?;
    if request.password.chars().count() < policy.min_password_len {
        return Err(AppError::Validation(format!(
            "Password should be at least {} characters",
            policy.min_password_len
        )));
    }

    let username = match request.username.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => validate_username(name)?,
        _ => email.split('@').next().unwrap_or_default().to_string(),
    };

    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM accounts WHERE email = ?1",
        params![email],
        |r| r.get(0),
    )?;
    if taken {
        return Err(AppError::Rejected("User already registered".into()));
    }

    let password_hash = bcrypt::hash(&request.password, policy.password_cost)?;
    let user_id = uuid::Uuid::now_v7().to_string();
    let confirmation_token = policy
        .require_confirmation
        .then(session::generate_token);

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO accounts (id, email, password_hash, confirmed, confirmation_token)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            email,
            password_hash,
            confirmation_token.is_none(),
            confirmation_token
        ],
    )
    .map_err(|e| AppError::from_constraint(e, "User already registered"))?;
    tx.execute(
        "INSERT INTO profiles (id, username) VALUES (?1, ?2)",
        params![user_id, username],
    )?;
    tx.commit()?;

    tracing::info!(user_id = %user_id, "Account created");

    match confirmation_token {
        Some(token) => {
            tracing::info!(
                user_id = %user_id,
                "Confirmation pending, confirm at /auth/confirm/{}",
                token
            );
            Ok(SignUpOutcome::PendingConfirmation {
                confirmation_token: token,
            })
        }
        None => Ok(SignUpOutcome::SignedIn(Identity { user_id, username })),
    }
}

pub fn sign_in(conn: &Connection, request: &SignInRequest) -> AppResult<Identity> {
    let email = request.email.trim().to_lowercase();

    let account: Option<(String, String, bool, String)> = conn
        .query_row(
            "SELECT a.id, a.password_hash, a.confirmed, p.username
             FROM accounts a JOIN profiles p ON p.id = a.id
             WHERE a.email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((user_id, password_hash, confirmed, username)) = account else {
        return Err(AppError::InvalidCredentials);
    };

    if !bcrypt::verify(&request.password, &password_hash)? {
        return Err(AppError::InvalidCredentials);
    }
    if !confirmed {
        return Err(AppError::Unconfirmed);
    }

    Ok(Identity { user_id, username })
}

/// Marks the account holding `token` as confirmed. Tokens are single use.
pub fn confirm(conn: &Connection, token: &str) -> AppResult<Identity> {
    let user_id: String = conn
        .query_row(
            "UPDATE accounts SET confirmed = 1, confirmation_token = NULL
             WHERE confirmation_token = ?1
             RETURNING id",
            params![token],
            |r| r.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    let username: String = conn.query_row(
        "SELECT username FROM profiles WHERE id = ?1",
        params![user_id],
        |r| r.get(0),
    )?;

    tracing::info!(user_id = %user_id, "Account confirmed");
    Ok(Identity { user_id, username })
}
