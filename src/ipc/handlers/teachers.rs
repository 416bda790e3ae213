use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "teachers": [] }));
    };
    let include_archived = req
        .params
        .get("includeArchived")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let sql = if include_archived {
        "SELECT id, last_name, first_name, email, is_archived
         FROM teachers ORDER BY last_name, first_name"
    } else {
        "SELECT id, last_name, first_name, email, is_archived
         FROM teachers WHERE is_archived = 0 ORDER BY last_name, first_name"
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let last: String = row.get(1)?;
            let first: String = row.get(2)?;
            let email: Option<String> = row.get(3)?;
            let is_archived: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "displayName": format!("{}, {}", last, first),
                "lastName": last,
                "firstName": first,
                "email": email,
                "isArchived": is_archived != 0
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(teachers) => ok(&req.id, json!({ "teachers": teachers })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let last_name = match req.params.get("lastName").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing lastName", None),
    };
    let first_name = match req.params.get("firstName").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing firstName", None),
    };
    if last_name.is_empty() || first_name.is_empty() {
        return err(&req.id, "bad_params", "lastName and firstName must not be empty", None);
    }
    let email = req
        .params
        .get("email")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());

    let teacher_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO teachers(id, last_name, first_name, email, is_archived)
         VALUES(?, ?, ?, ?, 0)",
        (&teacher_id, &last_name, &first_name, &email),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "teachers" })),
        );
    }

    ok(&req.id, json!({ "teacherId": teacher_id }))
}

fn handle_teachers_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_id = match req.params.get("teacherId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing teacherId", None),
    };
    let last_name = match req.params.get("lastName").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing lastName", None),
    };
    let first_name = match req.params.get("firstName").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing firstName", None),
    };
    if last_name.is_empty() || first_name.is_empty() {
        return err(&req.id, "bad_params", "lastName and firstName must not be empty", None);
    }
    let email = req
        .params
        .get("email")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());

    match conn.execute(
        "UPDATE teachers SET last_name = ?, first_name = ?, email = ? WHERE id = ?",
        (&last_name, &first_name, &email, &teacher_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "teacher not found", None),
        Ok(_) => ok(&req.id, json!({ "teacherId": teacher_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_teachers_archive(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_id = match req.params.get("teacherId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing teacherId", None),
    };
    let archived = req
        .params
        .get("archived")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    match conn.execute(
        "UPDATE teachers SET is_archived = ? WHERE id = ?",
        (archived as i64, &teacher_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "teacher not found", None),
        Ok(_) => ok(&req.id, json!({ "teacherId": teacher_id, "isArchived": archived })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "teachers.update" => Some(handle_teachers_update(state, req)),
        "teachers.archive" => Some(handle_teachers_archive(state, req)),
        _ => None,
    }
}
