use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rusqlite::Connection;
use serde::Deserialize;

use crate::session::SessionRegistry;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// The one registry instance for the process, shared with the sweeper.
    pub sessions: Arc<SessionRegistry>,
    pub started_at: Instant,
}
