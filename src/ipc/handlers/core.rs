use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Capability, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "canWrite": state.capability.can_write
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            // A fresh workspace means any cached schedule snapshot is stale.
            state.working_set = None;
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_capability_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(can_write) = req.params.get("canWrite").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "missing canWrite", None);
    };
    state.capability = Capability { can_write };
    ok(&req.id, json!({ "canWrite": can_write }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "session.capability.set" => Some(handle_capability_set(state, req)),
        _ => None,
    }
}
