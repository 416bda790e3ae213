use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };
    let include_archived = req
        .params
        .get("includeArchived")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let sql = if include_archived {
        "SELECT id, code, name, is_archived FROM subjects ORDER BY code"
    } else {
        "SELECT id, code, name, is_archived FROM subjects WHERE is_archived = 0 ORDER BY code"
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let code: String = row.get(1)?;
            let name: String = row.get(2)?;
            let is_archived: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "code": code,
                "name": name,
                "isArchived": is_archived != 0
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let code = match req.params.get("code").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_uppercase(),
        None => return err(&req.id, "bad_params", "missing code", None),
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if code.is_empty() || name.is_empty() {
        return err(&req.id, "bad_params", "code and name must not be empty", None);
    }

    let subject_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, code, name, is_archived) VALUES(?, ?, ?, 0)",
        (&subject_id, &code, &name),
    ) {
        let msg = e.to_string();
        if msg.contains("UNIQUE") && msg.contains("subjects.code") {
            return err(
                &req.id,
                "duplicate_code",
                format!("subject code already exists: {}", code),
                None,
            );
        }
        return err(
            &req.id,
            "db_insert_failed",
            msg,
            Some(json!({ "table": "subjects" })),
        );
    }

    ok(&req.id, json!({ "subjectId": subject_id, "code": code }))
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    match conn.execute(
        "UPDATE subjects SET name = ? WHERE id = ?",
        (&name, &subject_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "subject not found", None),
        Ok(_) => ok(&req.id, json!({ "subjectId": subject_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_subjects_archive(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let archived = req
        .params
        .get("archived")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    match conn.execute(
        "UPDATE subjects SET is_archived = ? WHERE id = ?",
        (archived as i64, &subject_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "subject not found", None),
        Ok(_) => ok(&req.id, json!({ "subjectId": subject_id, "isArchived": archived })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.archive" => Some(handle_subjects_archive(state, req)),
        _ => None,
    }
}
