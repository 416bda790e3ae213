use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_sections_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "sections": [] }));
    };
    let year_id = match req.params.get("schoolYearId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing schoolYearId", None),
    };
    let include_archived = req
        .params
        .get("includeArchived")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    // Include a slot count so the timetable dashboard can show fill level.
    let sql = if include_archived {
        "SELECT s.id, s.name, s.grade_level, s.adviser, s.is_archived,
                (SELECT COUNT(*) FROM schedule_entries se WHERE se.section_id = s.id) AS slot_count
         FROM sections s
         WHERE s.school_year_id = ?
         ORDER BY s.name"
    } else {
        "SELECT s.id, s.name, s.grade_level, s.adviser, s.is_archived,
                (SELECT COUNT(*) FROM schedule_entries se WHERE se.section_id = s.id) AS slot_count
         FROM sections s
         WHERE s.school_year_id = ? AND s.is_archived = 0
         ORDER BY s.name"
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&year_id], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let grade_level: Option<String> = row.get(2)?;
            let adviser: Option<String> = row.get(3)?;
            let is_archived: i64 = row.get(4)?;
            let slot_count: i64 = row.get(5)?;
            Ok(json!({
                "id": id,
                "name": name,
                "gradeLevel": grade_level,
                "adviser": adviser,
                "isArchived": is_archived != 0,
                "slotCount": slot_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(sections) => ok(&req.id, json!({ "sections": sections })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_sections_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let year_id = match req.params.get("schoolYearId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing schoolYearId", None),
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let grade_level = req
        .params
        .get("gradeLevel")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());
    let adviser = req
        .params
        .get("adviser")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());

    let section_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO sections(id, school_year_id, name, grade_level, adviser, is_archived)
         VALUES(?, ?, ?, ?, ?, 0)",
        (&section_id, &year_id, &name, &grade_level, &adviser),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "sections" })),
        );
    }

    ok(&req.id, json!({ "sectionId": section_id, "name": name }))
}

fn handle_sections_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section_id = match req.params.get("sectionId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing sectionId", None),
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let grade_level = req
        .params
        .get("gradeLevel")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());
    let adviser = req
        .params
        .get("adviser")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());

    match conn.execute(
        "UPDATE sections SET name = ?, grade_level = ?, adviser = ? WHERE id = ?",
        (&name, &grade_level, &adviser, &section_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "section not found", None),
        Ok(_) => ok(&req.id, json!({ "sectionId": section_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_sections_archive(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section_id = match req.params.get("sectionId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing sectionId", None),
    };
    let archived = req
        .params
        .get("archived")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    match conn.execute(
        "UPDATE sections SET is_archived = ? WHERE id = ?",
        (archived as i64, &section_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "section not found", None),
        Ok(_) => ok(&req.id, json!({ "sectionId": section_id, "isArchived": archived })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sections.list" => Some(handle_sections_list(state, req)),
        "sections.create" => Some(handle_sections_create(state, req)),
        "sections.update" => Some(handle_sections_update(state, req)),
        "sections.archive" => Some(handle_sections_archive(state, req)),
        _ => None,
    }
}
