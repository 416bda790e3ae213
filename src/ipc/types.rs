use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::schedule::ScheduleEntry;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Explicit caller capability, set once per session. Write-path handlers
/// take this as a value instead of querying role state ambiently, which
/// keeps the conflict engine free of any auth dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capability {
    pub can_write: bool,
}

/// Client-side snapshot of all schedule rows for one school-year+term.
/// Refreshed after each successful mutation, invalidated on delete and on
/// constraint failures; never transactionally consistent with concurrent
/// sessions (the store's unique indexes are the final guard).
pub struct WorkingSet {
    pub school_year_id: String,
    pub term_id: String,
    pub entries: Vec<ScheduleEntry>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub capability: Capability,
    pub working_set: Option<WorkingSet>,
}
