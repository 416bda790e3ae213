use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

fn parse_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, String> {
    let Some(raw) = params.get(key).and_then(|v| v.as_str()) else {
        return Err(format!("missing {}", key));
    };
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{} must be YYYY-MM-DD", key))
}

fn handle_events_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "events": [] }));
    };
    let year_id = match req.params.get("schoolYearId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing schoolYearId", None),
    };

    let mut stmt = match conn.prepare(
        "SELECT id, title, starts_on, ends_on, category, notes
         FROM calendar_events
         WHERE school_year_id = ?
         ORDER BY starts_on, title",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&year_id], |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let starts_on: String = row.get(2)?;
            let ends_on: String = row.get(3)?;
            let category: Option<String> = row.get(4)?;
            let notes: Option<String> = row.get(5)?;
            Ok(json!({
                "id": id,
                "title": title,
                "startsOn": starts_on,
                "endsOn": ends_on,
                "category": category,
                "notes": notes
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(events) => ok(&req.id, json!({ "events": events })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_events_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let title = match req.params.get("title").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing title", None),
    };
    if title.is_empty() {
        return err(&req.id, "bad_params", "title must not be empty", None);
    }
    let starts_on = match parse_date(&req.params, "startsOn") {
        Ok(d) => d,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let ends_on = match parse_date(&req.params, "endsOn") {
        Ok(d) => d,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    if ends_on < starts_on {
        return err(&req.id, "bad_params", "endsOn must not precede startsOn", None);
    }
    let category = req
        .params
        .get("category")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());
    let notes = req
        .params
        .get("notes")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let event_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO calendar_events(id, school_year_id, title, starts_on, ends_on, category, notes)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &event_id,
            &year_id,
            &title,
            starts_on.to_string(),
            ends_on.to_string(),
            &category,
            &notes,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "calendar_events" })),
        );
    }

    ok(&req.id, json!({ "eventId": event_id }))
}

fn handle_events_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let event_id = match req.params.get("eventId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing eventId", None),
    };
    let title = match req.params.get("title").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing title", None),
    };
    if title.is_empty() {
        return err(&req.id, "bad_params", "title must not be empty", None);
    }
    let starts_on = match parse_date(&req.params, "startsOn") {
        Ok(d) => d,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let ends_on = match parse_date(&req.params, "endsOn") {
        Ok(d) => d,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    if ends_on < starts_on {
        return err(&req.id, "bad_params", "endsOn must not precede startsOn", None);
    }
    let category = req
        .params
        .get("category")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());
    let notes = req
        .params
        .get("notes")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    match conn.execute(
        "UPDATE calendar_events
         SET title = ?, starts_on = ?, ends_on = ?, category = ?, notes = ?
         WHERE id = ?",
        (
            &title,
            starts_on.to_string(),
            ends_on.to_string(),
            &category,
            &notes,
            &event_id,
        ),
    ) {
        Ok(0) => err(&req.id, "not_found", "event not found", None),
        Ok(_) => ok(&req.id, json!({ "eventId": event_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_events_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.capability.can_write {
        return err(&req.id, "forbidden", "caller cannot write", None);
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let event_id = match req.params.get("eventId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing eventId", None),
    };

    match conn.execute("DELETE FROM calendar_events WHERE id = ?", [&event_id]) {
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.events.list" => Some(handle_events_list(state, req)),
        "calendar.events.create" => Some(handle_events_create(state, req)),
        "calendar.events.update" => Some(handle_events_update(state, req)),
        "calendar.events.delete" => Some(handle_events_delete(state, req)),
        _ => None,
    }
}
