pub mod accounts;
pub mod events;
pub mod handlers;
pub mod session;

use serde::{Deserialize, Serialize};

/// The signed-in user an operation acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}
