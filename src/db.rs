use rusqlite::Connection;
use std::path::Path;

/// Default daily period table. Static lookup: seeded once, not editable
/// at runtime.
const DEFAULT_PERIODS: [(i64, &str, &str, &str); 8] = [
    (1, "First Period", "07:30", "08:30"),
    (2, "Second Period", "08:30", "09:30"),
    (3, "Third Period", "09:50", "10:50"),
    (4, "Fourth Period", "10:50", "11:50"),
    (5, "Fifth Period", "13:00", "14:00"),
    (6, "Sixth Period", "14:00", "15:00"),
    (7, "Seventh Period", "15:20", "16:20"),
    (8, "Eighth Period", "16:20", "17:20"),
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("timetable.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_years(
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL UNIQUE,
            starts_on TEXT,
            ends_on TEXT,
            is_active INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS terms(
            id TEXT PRIMARY KEY,
            school_year_id TEXT NOT NULL,
            label TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(school_year_id) REFERENCES school_years(id),
            UNIQUE(school_year_id, label)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_terms_school_year ON terms(school_year_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            school_year_id TEXT NOT NULL,
            name TEXT NOT NULL,
            grade_level TEXT,
            adviser TEXT,
            is_archived INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(school_year_id) REFERENCES school_years(id),
            UNIQUE(school_year_id, name)
        )",
        [],
    )?;
    ensure_sections_adviser(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sections_school_year ON sections(school_year_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_archived INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            email TEXT,
            is_archived INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS periods(
            number INTEGER PRIMARY KEY,
            label TEXT NOT NULL,
            starts_at TEXT NOT NULL,
            ends_at TEXT NOT NULL
        )",
        [],
    )?;
    seed_periods(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_entries(
            id TEXT PRIMARY KEY,
            school_year_id TEXT NOT NULL,
            term_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            day_of_week TEXT NOT NULL,
            period_number INTEGER NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT,
            room TEXT,
            room_key TEXT,
            notes TEXT,
            FOREIGN KEY(school_year_id) REFERENCES school_years(id),
            FOREIGN KEY(term_id) REFERENCES terms(id),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(period_number) REFERENCES periods(number)
        )",
        [],
    )?;
    ensure_schedule_entries_notes(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_entries_year_term
         ON schedule_entries(school_year_id, term_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_entries_section
         ON schedule_entries(section_id)",
        [],
    )?;

    // The three exclusivity invariants as hard constraints. The client-side
    // engine checks against a snapshot, so two sessions can race each other
    // past it; these indexes are the authoritative final guard. Constraint
    // failures are mapped back to conflict categories by the distinguishing
    // column (section_id / teacher_id / room_key) in the error message.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uniq_sched_section_slot
         ON schedule_entries(school_year_id, term_id, section_id, day_of_week, period_number)",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uniq_sched_teacher_slot
         ON schedule_entries(school_year_id, term_id, day_of_week, period_number, teacher_id)
         WHERE teacher_id IS NOT NULL",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS uniq_sched_room_slot
         ON schedule_entries(school_year_id, term_id, day_of_week, period_number, room_key)
         WHERE room_key IS NOT NULL",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS calendar_events(
            id TEXT PRIMARY KEY,
            school_year_id TEXT NOT NULL,
            title TEXT NOT NULL,
            starts_on TEXT NOT NULL,
            ends_on TEXT NOT NULL,
            category TEXT,
            notes TEXT,
            FOREIGN KEY(school_year_id) REFERENCES school_years(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_calendar_events_school_year
         ON calendar_events(school_year_id)",
        [],
    )?;

    Ok(conn)
}

fn seed_periods(conn: &Connection) -> anyhow::Result<()> {
    for (number, label, starts_at, ends_at) in DEFAULT_PERIODS {
        conn.execute(
            "INSERT OR IGNORE INTO periods(number, label, starts_at, ends_at)
             VALUES(?, ?, ?, ?)",
            (number, label, starts_at, ends_at),
        )?;
    }
    Ok(())
}

fn ensure_sections_adviser(conn: &Connection) -> anyhow::Result<()> {
    // Early workspaces were created before the adviser column existed.
    if table_has_column(conn, "sections", "adviser")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE sections ADD COLUMN adviser TEXT", [])?;
    Ok(())
}

fn ensure_schedule_entries_notes(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "schedule_entries", "notes")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE schedule_entries ADD COLUMN notes TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
