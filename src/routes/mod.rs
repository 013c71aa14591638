pub mod auth;
pub mod comments;
pub mod pages;
pub mod posts;
pub mod profiles;
pub mod storage;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application router.
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes();

    Router::new()
        .merge(auth::router())
        .merge(posts::router(max_upload_bytes))
        .merge(comments::router())
        .merge(profiles::router())
        .merge(pages::router())
        .merge(storage::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
