use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, WorkingSet};
use crate::schedule::{
    check_slot, preview_slot, room_key, ConflictKind, DayOfWeek, ScheduleEntry, SlotCandidate,
    SlotConflict,
};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    fn db(code: &'static str, e: impl ToString) -> Self {
        HandlerErr {
            code,
            message: e.to_string(),
            details: None,
        }
    }
}

fn conflict_response(conflict: &SlotConflict) -> HandlerErr {
    HandlerErr {
        code: "schedule_conflict",
        message: conflict.message.clone(),
        details: Some(json!({
            "kind": conflict.kind.as_str(),
            "conflictingEntries": serde_json::to_value(&conflict.conflicting)
                .unwrap_or(serde_json::Value::Null),
        })),
    }
}

/// The store enforces the three exclusivity invariants as unique indexes;
/// a write that slips past a stale client snapshot fails there and is
/// translated back into the matching conflict category. SQLite names the
/// violated columns (or, for some index forms, the index itself), so the
/// match keys on whichever distinguishing token appears.
fn conflict_kind_for_constraint(message: &str) -> Option<ConflictKind> {
    if !message.contains("UNIQUE constraint failed") {
        return None;
    }
    if message.contains("teacher_id") || message.contains("uniq_sched_teacher_slot") {
        Some(ConflictKind::Teacher)
    } else if message.contains("room_key") || message.contains("uniq_sched_room_slot") {
        Some(ConflictKind::Room)
    } else if message.contains("section_id") || message.contains("uniq_sched_section_slot") {
        Some(ConflictKind::Section)
    } else {
        None
    }
}

fn write_failure(op: &'static str, e: rusqlite::Error) -> HandlerErr {
    let msg = e.to_string();
    if let Some(kind) = conflict_kind_for_constraint(&msg) {
        return HandlerErr {
            code: "schedule_conflict",
            message: format!("slot was booked by another session ({} conflict)", kind.as_str()),
            details: Some(json!({ "kind": kind.as_str(), "conflictingEntries": [] })),
        };
    }
    HandlerErr {
        code: op,
        message: msg,
        details: None,
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn get_optional_trimmed(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_day(params: &serde_json::Value) -> Result<DayOfWeek, HandlerErr> {
    let raw = get_required_str(params, "dayOfWeek")?;
    DayOfWeek::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params("dayOfWeek must be one of Mon..Sat"))
}

fn parse_period(conn: &Connection, params: &serde_json::Value) -> Result<i64, HandlerErr> {
    let number = params
        .get("periodNumber")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("missing periodNumber"))?;
    let known: Option<i64> = conn
        .query_row("SELECT number FROM periods WHERE number = ?", [number], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    if known.is_none() {
        return Err(HandlerErr::bad_params(format!(
            "periodNumber {} is not in the period table",
            number
        )));
    }
    Ok(number)
}

fn row_exists(conn: &Connection, table: &str, id: &str) -> Result<bool, HandlerErr> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    conn.query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
        .map_err(|e| HandlerErr::db("db_query_failed", e))
}

fn require_row(conn: &Connection, table: &str, id: &str, what: &str) -> Result<(), HandlerErr> {
    if !row_exists(conn, table, id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: format!("{} not found", what),
            details: None,
        });
    }
    Ok(())
}

fn fetch_working_set(
    conn: &Connection,
    school_year_id: &str,
    term_id: &str,
) -> Result<Vec<ScheduleEntry>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, school_year_id, term_id, section_id, day_of_week, period_number,
                    subject_id, teacher_id, room, notes
             FROM schedule_entries
             WHERE school_year_id = ? AND term_id = ?",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let rows = stmt
        .query_map((school_year_id, term_id), |r| {
            let day_raw: String = r.get(4)?;
            Ok((
                ScheduleEntry {
                    id: r.get(0)?,
                    school_year_id: r.get(1)?,
                    term_id: r.get(2)?,
                    section_id: r.get(3)?,
                    day_of_week: DayOfWeek::Mon,
                    period_number: r.get(5)?,
                    subject_id: r.get(6)?,
                    teacher_id: r.get(7)?,
                    room: r.get(8)?,
                    notes: r.get(9)?,
                },
                day_raw,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let mut entries = Vec::with_capacity(rows.len());
    for (mut entry, day_raw) in rows {
        let Some(day) = DayOfWeek::parse(&day_raw) else {
            return Err(HandlerErr {
                code: "db_corrupt",
                message: format!("schedule row {} has unknown day: {}", entry.id, day_raw),
                details: None,
            });
        };
        entry.day_of_week = day;
        entries.push(entry);
    }
    Ok(entries)
}

/// Conflict checks run against the cached snapshot when one is loaded for
/// the same school-year+term; otherwise the set is fetched on demand.
/// The snapshot is optimistic by design: another session can commit
/// between our check and our write, and the store's unique indexes catch
/// what the snapshot missed.
fn working_set_for(
    conn: &Connection,
    cache: &Option<WorkingSet>,
    school_year_id: &str,
    term_id: &str,
) -> Result<Vec<ScheduleEntry>, HandlerErr> {
    if let Some(ws) = cache {
        if ws.school_year_id == school_year_id && ws.term_id == term_id {
            return Ok(ws.entries.clone());
        }
    }
    fetch_working_set(conn, school_year_id, term_id)
}

fn refresh_cache(
    conn: &Connection,
    cache: &mut Option<WorkingSet>,
    school_year_id: &str,
    term_id: &str,
) -> Result<(), HandlerErr> {
    let entries = fetch_working_set(conn, school_year_id, term_id)?;
    *cache = Some(WorkingSet {
        school_year_id: school_year_id.to_string(),
        term_id: term_id.to_string(),
        entries,
    });
    Ok(())
}

fn require_write(state: &AppState) -> Result<(), HandlerErr> {
    if !state.capability.can_write {
        return Err(HandlerErr {
            code: "forbidden",
            message: "caller cannot write".to_string(),
            details: None,
        });
    }
    Ok(())
}

fn entry_json(e: &ScheduleEntry) -> serde_json::Value {
    serde_json::to_value(e).unwrap_or(serde_json::Value::Null)
}

fn schedule_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "entries": [] }));
    };
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let term_id = get_required_str(&req.params, "termId")?;

    let mut stmt = conn
        .prepare(
            "SELECT se.id, se.school_year_id, se.term_id, se.section_id, se.day_of_week,
                    se.period_number, se.subject_id, se.teacher_id, se.room, se.notes,
                    sec.name, subj.name,
                    t.last_name, t.first_name,
                    p.label, p.starts_at, p.ends_at
             FROM schedule_entries se
             JOIN sections sec ON sec.id = se.section_id
             JOIN subjects subj ON subj.id = se.subject_id
             JOIN periods p ON p.number = se.period_number
             LEFT JOIN teachers t ON t.id = se.teacher_id
             WHERE se.school_year_id = ? AND se.term_id = ?",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    struct ListRow {
        entry: ScheduleEntry,
        day_raw: String,
        section_name: String,
        subject_name: String,
        teacher_name: Option<String>,
        period_label: String,
        starts_at: String,
        ends_at: String,
    }

    let raw_rows = stmt
        .query_map((&school_year_id, &term_id), |r| {
            let last: Option<String> = r.get(12)?;
            let first: Option<String> = r.get(13)?;
            Ok(ListRow {
                entry: ScheduleEntry {
                    id: r.get(0)?,
                    school_year_id: r.get(1)?,
                    term_id: r.get(2)?,
                    section_id: r.get(3)?,
                    day_of_week: DayOfWeek::Mon,
                    period_number: r.get(5)?,
                    subject_id: r.get(6)?,
                    teacher_id: r.get(7)?,
                    room: r.get(8)?,
                    notes: r.get(9)?,
                },
                day_raw: r.get(4)?,
                section_name: r.get(10)?,
                subject_name: r.get(11)?,
                teacher_name: last.map(|l| match first {
                    Some(f) => format!("{}, {}", l, f),
                    None => l,
                }),
                period_label: r.get(14)?,
                starts_at: r.get(15)?,
                ends_at: r.get(16)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let mut rows = Vec::with_capacity(raw_rows.len());
    for mut row in raw_rows {
        let Some(day) = DayOfWeek::parse(&row.day_raw) else {
            return Err(HandlerErr {
                code: "db_corrupt",
                message: format!("schedule row {} has unknown day: {}", row.entry.id, row.day_raw),
                details: None,
            });
        };
        row.entry.day_of_week = day;
        rows.push(row);
    }
    // day_of_week is TEXT in the store; sort by weekday order, not lexically.
    rows.sort_by(|a, b| {
        (a.section_name.as_str(), a.entry.day_of_week, a.entry.period_number).cmp(&(
            b.section_name.as_str(),
            b.entry.day_of_week,
            b.entry.period_number,
        ))
    });

    let entries: Vec<ScheduleEntry> = rows.iter().map(|r| r.entry.clone()).collect();
    let out: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            let mut v = entry_json(&r.entry);
            v["sectionName"] = json!(r.section_name);
            v["subjectName"] = json!(r.subject_name);
            v["teacherName"] = json!(r.teacher_name);
            v["periodLabel"] = json!(r.period_label);
            v["startsAt"] = json!(r.starts_at);
            v["endsAt"] = json!(r.ends_at);
            v
        })
        .collect();

    state.working_set = Some(WorkingSet {
        school_year_id,
        term_id,
        entries,
    });
    Ok(json!({ "entries": out }))
}

fn schedule_preview(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::db("no_workspace", "select a workspace first"));
    };
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let term_id = get_required_str(&req.params, "termId")?;
    let candidate = SlotCandidate {
        schedule_id: req
            .params
            .get("scheduleId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        section_id: get_required_str(&req.params, "sectionId")?,
        day_of_week: parse_day(&req.params)?,
        period_number: parse_period(conn, &req.params)?,
        teacher_id: get_optional_trimmed(&req.params, "teacherId"),
        room: req
            .params
            .get("room")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    };

    let ws = working_set_for(conn, &state.working_set, &school_year_id, &term_id)?;
    let conflicts = preview_slot(&candidate, &ws);
    let out: Vec<serde_json::Value> = conflicts
        .iter()
        .map(|c| {
            json!({
                "kind": c.kind.as_str(),
                "message": c.message,
                "conflictingEntries": serde_json::to_value(&c.conflicting)
                    .unwrap_or(serde_json::Value::Null),
            })
        })
        .collect();
    Ok(json!({ "conflicts": out }))
}

fn schedule_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_write(state)?;
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::db("no_workspace", "select a workspace first"));
    };
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let term_id = get_required_str(&req.params, "termId")?;
    let section_id = get_required_str(&req.params, "sectionId")?;
    let subject_id = get_required_str(&req.params, "subjectId")?;
    let day = parse_day(&req.params)?;
    let period_number = parse_period(conn, &req.params)?;
    let teacher_id = get_optional_trimmed(&req.params, "teacherId");
    let room = req
        .params
        .get("room")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let notes = req
        .params
        .get("notes")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    require_row(conn, "school_years", &school_year_id, "school year")?;
    require_row(conn, "terms", &term_id, "term")?;
    require_row(conn, "sections", &section_id, "section")?;
    require_row(conn, "subjects", &subject_id, "subject")?;
    if let Some(tid) = teacher_id.as_deref() {
        require_row(conn, "teachers", tid, "teacher")?;
    }

    let candidate = SlotCandidate {
        schedule_id: None,
        section_id: section_id.clone(),
        day_of_week: day,
        period_number,
        teacher_id: teacher_id.clone(),
        room: room.clone(),
    };
    let ws = working_set_for(conn, &state.working_set, &school_year_id, &term_id)?;
    if let Err(conflict) = check_slot(&candidate, &ws) {
        return Err(conflict_response(&conflict));
    }

    let schedule_id = Uuid::new_v4().to_string();
    let key = room_key(room.as_deref());
    if let Err(e) = conn.execute(
        "INSERT INTO schedule_entries(
            id, school_year_id, term_id, section_id, day_of_week, period_number,
            subject_id, teacher_id, room, room_key, notes)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &schedule_id,
            &school_year_id,
            &term_id,
            &section_id,
            day.as_str(),
            period_number,
            &subject_id,
            &teacher_id,
            &room,
            &key,
            &notes,
        ),
    ) {
        state.working_set = None;
        return Err(write_failure("db_insert_failed", e));
    }

    refresh_cache(conn, &mut state.working_set, &school_year_id, &term_id)?;
    Ok(json!({ "scheduleId": schedule_id }))
}

fn schedule_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_write(state)?;
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::db("no_workspace", "select a workspace first"));
    };
    let schedule_id = get_required_str(&req.params, "scheduleId")?;

    // Year, term and section are fixed at create time; edits move the slot
    // or change what is taught in it.
    let existing = conn
        .query_row(
            "SELECT school_year_id, term_id, section_id FROM schedule_entries WHERE id = ?",
            [&schedule_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            },
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let Some((school_year_id, term_id, section_id)) = existing else {
        return Err(HandlerErr {
            code: "not_found",
            message: "schedule entry not found".to_string(),
            details: None,
        });
    };

    let subject_id = get_required_str(&req.params, "subjectId")?;
    let day = parse_day(&req.params)?;
    let period_number = parse_period(conn, &req.params)?;
    let teacher_id = get_optional_trimmed(&req.params, "teacherId");
    let room = req
        .params
        .get("room")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let notes = req
        .params
        .get("notes")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    require_row(conn, "subjects", &subject_id, "subject")?;
    if let Some(tid) = teacher_id.as_deref() {
        require_row(conn, "teachers", tid, "teacher")?;
    }

    let candidate = SlotCandidate {
        schedule_id: Some(schedule_id.clone()),
        section_id,
        day_of_week: day,
        period_number,
        teacher_id: teacher_id.clone(),
        room: room.clone(),
    };
    let ws = working_set_for(conn, &state.working_set, &school_year_id, &term_id)?;
    if let Err(conflict) = check_slot(&candidate, &ws) {
        return Err(conflict_response(&conflict));
    }

    let key = room_key(room.as_deref());
    if let Err(e) = conn.execute(
        "UPDATE schedule_entries
         SET day_of_week = ?, period_number = ?, subject_id = ?,
             teacher_id = ?, room = ?, room_key = ?, notes = ?
         WHERE id = ?",
        (
            day.as_str(),
            period_number,
            &subject_id,
            &teacher_id,
            &room,
            &key,
            &notes,
            &schedule_id,
        ),
    ) {
        state.working_set = None;
        return Err(write_failure("db_update_failed", e));
    }

    refresh_cache(conn, &mut state.working_set, &school_year_id, &term_id)?;
    Ok(json!({ "scheduleId": schedule_id }))
}

fn schedule_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_write(state)?;
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::db("no_workspace", "select a workspace first"));
    };
    let schedule_id = get_required_str(&req.params, "scheduleId")?;

    // Removal never creates a collision, so no conflict check. Deleting an
    // id that is already gone is a no-op.
    let deleted = conn
        .execute("DELETE FROM schedule_entries WHERE id = ?", [&schedule_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;

    if let Some(ws) = state.working_set.take() {
        refresh_cache(conn, &mut state.working_set, &ws.school_year_id, &ws.term_id)?;
    }
    Ok(json!({ "deleted": deleted }))
}

fn schedule_clear_section(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    require_write(state)?;
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::db("no_workspace", "select a workspace first"));
    };
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let term_id = get_required_str(&req.params, "termId")?;
    let section_id = get_required_str(&req.params, "sectionId")?;

    let deleted = conn
        .execute(
            "DELETE FROM schedule_entries
             WHERE school_year_id = ? AND term_id = ? AND section_id = ?",
            (&school_year_id, &term_id, &section_id),
        )
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;

    refresh_cache(conn, &mut state.working_set, &school_year_id, &term_id)?;
    Ok(json!({ "deleted": deleted }))
}

fn schedule_bulk_copy(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_write(state)?;
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::db("no_workspace", "select a workspace first"));
    };
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let term_id = get_required_str(&req.params, "termId")?;
    let source_section_id = get_required_str(&req.params, "sourceSectionId")?;
    let overwrite = req
        .params
        .get("overwrite")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let target_ids: Vec<String> = req
        .params
        .get("targetSectionIds")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .ok_or_else(|| HandlerErr::bad_params("targetSectionIds must be an array of ids"))?;
    if target_ids.is_empty() {
        return Err(HandlerErr::bad_params("targetSectionIds must not be empty"));
    }

    require_row(conn, "sections", &source_section_id, "source section")?;
    for tid in &target_ids {
        require_row(conn, "sections", tid, "target section")?;
    }

    let source = fetch_working_set(conn, &school_year_id, &term_id)?
        .into_iter()
        .filter(|e| e.section_id == source_section_id)
        .collect::<Vec<_>>();

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    let mut results = Vec::new();
    for target_id in &target_ids {
        // Copying a section onto itself would first clear it in overwrite
        // mode; always skip.
        if *target_id == source_section_id {
            results.push(json!({ "sectionId": target_id, "skipped": true }));
            continue;
        }

        if overwrite {
            if let Err(e) = tx.execute(
                "DELETE FROM schedule_entries
                 WHERE school_year_id = ? AND term_id = ? AND section_id = ?",
                (&school_year_id, &term_id, target_id),
            ) {
                let _ = tx.rollback();
                state.working_set = None;
                return Err(HandlerErr::db("db_delete_failed", e));
            }
        }

        let occupied: HashSet<(String, i64)> = if overwrite {
            HashSet::new()
        } else {
            let mut stmt = tx
                .prepare(
                    "SELECT day_of_week, period_number FROM schedule_entries
                     WHERE school_year_id = ? AND term_id = ? AND section_id = ?",
                )
                .map_err(|e| HandlerErr::db("db_query_failed", e))?;
            stmt.query_map((&school_year_id, &term_id, target_id), |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
            })
            .and_then(|it| it.collect::<Result<HashSet<_>, _>>())
            .map_err(|e| HandlerErr::db("db_query_failed", e))?
        };

        let mut copied = 0usize;
        let mut skipped = 0usize;
        for entry in &source {
            // No-overwrite mode only avoids the target's own occupied
            // slots; it does not re-run the teacher/room checks against
            // other sections. The store's unique indexes still apply.
            let slot = (entry.day_of_week.as_str().to_string(), entry.period_number);
            if occupied.contains(&slot) {
                skipped += 1;
                continue;
            }
            let new_id = Uuid::new_v4().to_string();
            let key = room_key(entry.room.as_deref());
            if let Err(e) = tx.execute(
                "INSERT INTO schedule_entries(
                    id, school_year_id, term_id, section_id, day_of_week, period_number,
                    subject_id, teacher_id, room, room_key, notes)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &new_id,
                    &school_year_id,
                    &term_id,
                    target_id,
                    entry.day_of_week.as_str(),
                    entry.period_number,
                    &entry.subject_id,
                    &entry.teacher_id,
                    &entry.room,
                    &key,
                    &entry.notes,
                ),
            ) {
                let _ = tx.rollback();
                state.working_set = None;
                return Err(write_failure("db_insert_failed", e));
            }
            copied += 1;
        }
        results.push(json!({
            "sectionId": target_id,
            "skipped": false,
            "copied": copied,
            "slotsSkipped": skipped
        }));
    }

    if let Err(e) = tx.commit() {
        state.working_set = None;
        return Err(HandlerErr::db("db_commit_failed", e));
    }

    refresh_cache(conn, &mut state.working_set, &school_year_id, &term_id)?;
    Ok(json!({ "targets": results }))
}

fn schedule_bulk_clear(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    require_write(state)?;
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::db("no_workspace", "select a workspace first"));
    };
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let term_id = get_required_str(&req.params, "termId")?;
    let section_ids: Vec<String> = req
        .params
        .get("sectionIds")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .ok_or_else(|| HandlerErr::bad_params("sectionIds must be an array of ids"))?;
    if section_ids.is_empty() {
        return Err(HandlerErr::bad_params("sectionIds must not be empty"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    let mut results = Vec::new();
    for section_id in &section_ids {
        match tx.execute(
            "DELETE FROM schedule_entries
             WHERE school_year_id = ? AND term_id = ? AND section_id = ?",
            (&school_year_id, &term_id, section_id),
        ) {
            Ok(n) => results.push(json!({ "sectionId": section_id, "deleted": n })),
            Err(e) => {
                let _ = tx.rollback();
                state.working_set = None;
                return Err(HandlerErr::db("db_delete_failed", e));
            }
        }
    }

    if let Err(e) = tx.commit() {
        state.working_set = None;
        return Err(HandlerErr::db("db_commit_failed", e));
    }

    refresh_cache(conn, &mut state.working_set, &school_year_id, &term_id)?;
    Ok(json!({ "sections": results }))
}

fn periods_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "periods": [] }));
    };
    let mut stmt = conn
        .prepare("SELECT number, label, starts_at, ends_at FROM periods ORDER BY number")
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let rows = stmt
        .query_map([], |r| {
            let number: i64 = r.get(0)?;
            let label: String = r.get(1)?;
            let starts_at: String = r.get(2)?;
            let ends_at: String = r.get(3)?;
            Ok(json!({
                "number": number,
                "label": label,
                "startsAt": starts_at,
                "endsAt": ends_at
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "periods": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let out = match req.method.as_str() {
        "schedule.list" => schedule_list(state, req),
        "schedule.preview" => schedule_preview(state, req),
        "schedule.create" => schedule_create(state, req),
        "schedule.update" => schedule_update(state, req),
        "schedule.delete" => schedule_delete(state, req),
        "schedule.clearSection" => schedule_clear_section(state, req),
        "schedule.bulkCopy" => schedule_bulk_copy(state, req),
        "schedule.bulkClear" => schedule_bulk_clear(state, req),
        "periods.list" => periods_list(state, req),
        _ => return None,
    };
    Some(match out {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    })
}
