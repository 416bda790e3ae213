use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_school_years_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "schoolYears": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT id, label, starts_on, ends_on, is_active
         FROM school_years
         ORDER BY label",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let label: String = row.get(1)?;
            let starts_on: Option<String> = row.get(2)?;
            let ends_on: Option<String> = row.get(3)?;
            let is_active: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "label": label,
                "startsOn": starts_on,
                "endsOn": ends_on,
                "isActive": is_active != 0
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(years) => ok(&req.id, json!({ "schoolYears": years })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_school_years_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let label = match req.params.get("label").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing label", None),
    };
    if label.is_empty() {
        return err(&req.id, "bad_params", "label must not be empty", None);
    }
    let starts_on = req
        .params
        .get("startsOn")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let ends_on = req
        .params
        .get("endsOn")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let year_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO school_years(id, label, starts_on, ends_on, is_active)
         VALUES(?, ?, ?, ?, 0)",
        (&year_id, &label, &starts_on, &ends_on),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "school_years" })),
        );
    }

    ok(&req.id, json!({ "schoolYearId": year_id, "label": label }))
}

fn handle_school_years_set_active(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    // Exactly one active year at a time.
    if let Err(e) = conn.execute("UPDATE school_years SET is_active = 0", []) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match conn.execute(
        "UPDATE school_years SET is_active = 1 WHERE id = ?",
        [&year_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "school year not found", None),
        Ok(_) => ok(&req.id, json!({ "schoolYearId": year_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_terms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "terms": [] }));
    };
    let year_id = match req.params.get("schoolYearId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing schoolYearId", None),
    };

    let mut stmt = match conn.prepare(
        "SELECT id, label, sort_order FROM terms
         WHERE school_year_id = ?
         ORDER BY sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&year_id], |row| {
            let id: String = row.get(0)?;
            let label: String = row.get(1)?;
            let sort_order: i64 = row.get(2)?;
            Ok(json!({ "id": id, "label": label, "sortOrder": sort_order }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(terms) => ok(&req.id, json!({ "terms": terms })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_terms_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let label = match req.params.get("label").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing label", None),
    };
    if label.is_empty() {
        return err(&req.id, "bad_params", "label must not be empty", None);
    }
    let sort_order = req
        .params
        .get("sortOrder")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    let term_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO terms(id, school_year_id, label, sort_order)
         VALUES(?, ?, ?, ?)",
        (&term_id, &year_id, &label, sort_order),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "terms" })),
        );
    }

    ok(&req.id, json!({ "termId": term_id, "label": label }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schoolYears.list" => Some(handle_school_years_list(state, req)),
        "schoolYears.create" => Some(handle_school_years_create(state, req)),
        "schoolYears.setActive" => Some(handle_school_years_set_active(state, req)),
        "terms.list" => Some(handle_terms_list(state, req)),
        "terms.create" => Some(handle_terms_create(state, req)),
        _ => None,
    }
}
