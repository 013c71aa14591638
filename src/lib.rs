pub mod auth;
pub mod cache;
pub mod comments;
pub mod composer;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod likes;
pub mod posts;
pub mod profiles;
pub mod routes;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;
