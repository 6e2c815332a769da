use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use crate::helper::snippet_helpers::SnippetHooks;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Process-wide state built once at startup and shared by every worker.
#[derive(Default)]
pub struct AppState {
    pub hooks: SnippetHooks,
}

pub mod config;
pub mod helper;
pub mod models;
pub mod routes;
pub mod setup;
