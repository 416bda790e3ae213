use serde::{Deserialize, Serialize};

/// Days a weekly timetable can schedule. Saturday is included because some
/// schools run half-day Saturday classes; Sunday never appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl DayOfWeek {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Mon" => Some(Self::Mon),
            "Tue" => Some(Self::Tue),
            "Wed" => Some(Self::Wed),
            "Thu" => Some(Self::Thu),
            "Fri" => Some(Self::Fri),
            "Sat" => Some(Self::Sat),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mon => "Mon",
            Self::Tue => "Tue",
            Self::Wed => "Wed",
            Self::Thu => "Thu",
            Self::Fri => "Fri",
            Self::Sat => "Sat",
        }
    }

    pub const ALL: [DayOfWeek; 6] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
    ];
}

/// One weekly recurring slot. The conflict engine only keys on
/// `section_id`, `day_of_week`, `period_number`, `teacher_id` and `room`;
/// the rest is carried through for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub school_year_id: String,
    pub term_id: String,
    pub section_id: String,
    #[serde(serialize_with = "serialize_day")]
    pub day_of_week: DayOfWeek,
    pub period_number: i64,
    pub subject_id: String,
    pub teacher_id: Option<String>,
    pub room: Option<String>,
    pub notes: Option<String>,
}

fn serialize_day<S>(day: &DayOfWeek, ser: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    ser.serialize_str(day.as_str())
}

/// A proposed slot. `schedule_id` is `None` on create; on edit it carries
/// the id of the row being edited so the row never collides with itself.
#[derive(Debug, Clone)]
pub struct SlotCandidate {
    pub schedule_id: Option<String>,
    pub section_id: String,
    pub day_of_week: DayOfWeek,
    pub period_number: i64,
    pub teacher_id: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Section,
    Teacher,
    Room,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Teacher => "teacher",
            Self::Room => "room",
        }
    }
}

/// An expected validation outcome, not a failure: the caller branches on
/// it and asks the user to pick another slot. `conflicting` is non-empty
/// and names the rows (and therefore sections) involved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConflict {
    pub kind: ConflictKind,
    pub message: String,
    pub conflicting: Vec<ScheduleEntry>,
}

/// Normalized room label used for room exclusivity: trimmed and
/// case-folded, `None` when the label is empty or absent.
pub fn room_key(raw: Option<&str>) -> Option<String> {
    let t = raw?.trim();
    if t.is_empty() {
        return None;
    }
    Some(t.to_lowercase())
}

fn same_slot(entry: &ScheduleEntry, candidate: &SlotCandidate) -> bool {
    entry.day_of_week == candidate.day_of_week && entry.period_number == candidate.period_number
}

fn is_self(entry: &ScheduleEntry, candidate: &SlotCandidate) -> bool {
    candidate
        .schedule_id
        .as_deref()
        .map(|id| id == entry.id)
        .unwrap_or(false)
}

fn section_collisions<'a>(
    candidate: &SlotCandidate,
    working_set: &'a [ScheduleEntry],
) -> Vec<&'a ScheduleEntry> {
    working_set
        .iter()
        .filter(|e| {
            e.section_id == candidate.section_id && !is_self(e, candidate) && same_slot(e, candidate)
        })
        .collect()
}

fn teacher_collisions<'a>(
    candidate: &SlotCandidate,
    working_set: &'a [ScheduleEntry],
) -> Vec<&'a ScheduleEntry> {
    let Some(teacher_id) = candidate.teacher_id.as_deref() else {
        return Vec::new();
    };
    working_set
        .iter()
        .filter(|e| {
            e.section_id != candidate.section_id
                && same_slot(e, candidate)
                && e.teacher_id.as_deref() == Some(teacher_id)
        })
        .collect()
}

fn room_collisions<'a>(
    candidate: &SlotCandidate,
    working_set: &'a [ScheduleEntry],
) -> Vec<&'a ScheduleEntry> {
    let Some(key) = room_key(candidate.room.as_deref()) else {
        return Vec::new();
    };
    working_set
        .iter()
        .filter(|e| {
            e.section_id != candidate.section_id
                && same_slot(e, candidate)
                && room_key(e.room.as_deref()).as_deref() == Some(key.as_str())
        })
        .collect()
}

fn conflict(kind: ConflictKind, candidate: &SlotCandidate, rows: Vec<&ScheduleEntry>) -> SlotConflict {
    let slot = format!("{} period {}", candidate.day_of_week.as_str(), candidate.period_number);
    let message = match kind {
        ConflictKind::Section => format!("section already has a subject at {}", slot),
        ConflictKind::Teacher => format!("teacher is already assigned elsewhere at {}", slot),
        ConflictKind::Room => format!("room is already occupied at {}", slot),
    };
    SlotConflict {
        kind,
        message,
        conflicting: rows.into_iter().cloned().collect(),
    }
}

/// Fail-fast pre-write check. Purely a predicate over the in-memory
/// working set; never touches the store. Check order fixes which single
/// conflict surfaces when a slot violates more than one rule:
/// section, then teacher, then room.
pub fn check_slot(
    candidate: &SlotCandidate,
    working_set: &[ScheduleEntry],
) -> Result<(), SlotConflict> {
    let rows = section_collisions(candidate, working_set);
    if !rows.is_empty() {
        return Err(conflict(ConflictKind::Section, candidate, rows));
    }
    let rows = teacher_collisions(candidate, working_set);
    if !rows.is_empty() {
        return Err(conflict(ConflictKind::Teacher, candidate, rows));
    }
    let rows = room_collisions(candidate, working_set);
    if !rows.is_empty() {
        return Err(conflict(ConflictKind::Room, candidate, rows));
    }
    Ok(())
}

/// Non-short-circuiting variant for live form feedback: the UI shows
/// teacher and room conflicts independently, so every category that
/// fires is reported.
pub fn preview_slot(candidate: &SlotCandidate, working_set: &[ScheduleEntry]) -> Vec<SlotConflict> {
    let mut out = Vec::new();
    let rows = section_collisions(candidate, working_set);
    if !rows.is_empty() {
        out.push(conflict(ConflictKind::Section, candidate, rows));
    }
    let rows = teacher_collisions(candidate, working_set);
    if !rows.is_empty() {
        out.push(conflict(ConflictKind::Teacher, candidate, rows));
    }
    let rows = room_collisions(candidate, working_set);
    if !rows.is_empty() {
        out.push(conflict(ConflictKind::Room, candidate, rows));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        id: &str,
        section: &str,
        day: DayOfWeek,
        period: i64,
        teacher: Option<&str>,
        room: Option<&str>,
    ) -> ScheduleEntry {
        ScheduleEntry {
            id: id.to_string(),
            school_year_id: "sy1".to_string(),
            term_id: "t1".to_string(),
            section_id: section.to_string(),
            day_of_week: day,
            period_number: period,
            subject_id: "subj".to_string(),
            teacher_id: teacher.map(|s| s.to_string()),
            room: room.map(|s| s.to_string()),
            notes: None,
        }
    }

    fn candidate(
        schedule_id: Option<&str>,
        section: &str,
        day: DayOfWeek,
        period: i64,
        teacher: Option<&str>,
        room: Option<&str>,
    ) -> SlotCandidate {
        SlotCandidate {
            schedule_id: schedule_id.map(|s| s.to_string()),
            section_id: section.to_string(),
            day_of_week: day,
            period_number: period,
            teacher_id: teacher.map(|s| s.to_string()),
            room: room.map(|s| s.to_string()),
        }
    }

    #[test]
    fn same_section_same_slot_is_section_conflict() {
        let ws = vec![entry("e1", "s1", DayOfWeek::Mon, 3, None, None)];
        let c = candidate(None, "s1", DayOfWeek::Mon, 3, None, None);
        let err = check_slot(&c, &ws).expect_err("section conflict");
        assert_eq!(err.kind, ConflictKind::Section);
        assert_eq!(err.conflicting.len(), 1);
        assert_eq!(err.conflicting[0].id, "e1");
    }

    #[test]
    fn shared_teacher_across_sections_is_teacher_conflict() {
        let ws = vec![entry("e1", "s1", DayOfWeek::Mon, 3, Some("garcia"), None)];
        let c = candidate(None, "s2", DayOfWeek::Mon, 3, Some("garcia"), None);
        let err = check_slot(&c, &ws).expect_err("teacher conflict");
        assert_eq!(err.kind, ConflictKind::Teacher);
        assert_eq!(err.conflicting[0].section_id, "s1");
    }

    #[test]
    fn room_match_is_trimmed_and_case_folded() {
        let ws = vec![entry("e1", "s1", DayOfWeek::Mon, 3, None, Some("R-101"))];
        let c = candidate(None, "s2", DayOfWeek::Mon, 3, None, Some("  r-101 "));
        let err = check_slot(&c, &ws).expect_err("room conflict");
        assert_eq!(err.kind, ConflictKind::Room);
    }

    #[test]
    fn blank_rooms_never_collide() {
        let ws = vec![entry("e1", "s1", DayOfWeek::Mon, 3, None, Some("   "))];
        let c = candidate(None, "s2", DayOfWeek::Mon, 3, None, Some(""));
        assert!(check_slot(&c, &ws).is_ok());
    }

    #[test]
    fn unassigned_teachers_never_collide() {
        let ws = vec![entry("e1", "s1", DayOfWeek::Mon, 3, None, None)];
        let c = candidate(None, "s2", DayOfWeek::Mon, 3, None, None);
        assert!(check_slot(&c, &ws).is_ok());
    }

    #[test]
    fn different_day_or_period_never_conflicts() {
        let ws = vec![entry("e1", "s1", DayOfWeek::Mon, 3, Some("garcia"), Some("R-101"))];
        let other_day = candidate(None, "s1", DayOfWeek::Tue, 3, Some("garcia"), Some("R-101"));
        assert!(check_slot(&other_day, &ws).is_ok());
        let other_period = candidate(None, "s2", DayOfWeek::Mon, 4, Some("garcia"), Some("R-101"));
        assert!(check_slot(&other_period, &ws).is_ok());
    }

    #[test]
    fn editing_a_row_does_not_collide_with_itself() {
        let ws = vec![entry("e1", "s1", DayOfWeek::Mon, 3, Some("garcia"), Some("R-101"))];
        let c = candidate(Some("e1"), "s1", DayOfWeek::Mon, 3, Some("garcia"), Some("R-101"));
        assert!(check_slot(&c, &ws).is_ok());
    }

    #[test]
    fn check_order_surfaces_section_before_teacher_and_room() {
        let ws = vec![
            entry("e1", "s1", DayOfWeek::Mon, 3, None, None),
            entry("e2", "s2", DayOfWeek::Mon, 3, Some("garcia"), Some("R-101")),
        ];
        let c = candidate(None, "s1", DayOfWeek::Mon, 3, Some("garcia"), Some("R-101"));
        let err = check_slot(&c, &ws).expect_err("conflict");
        assert_eq!(err.kind, ConflictKind::Section);
    }

    #[test]
    fn preview_reports_every_category_at_once() {
        let ws = vec![
            entry("e1", "s1", DayOfWeek::Mon, 3, None, None),
            entry("e2", "s2", DayOfWeek::Mon, 3, Some("garcia"), None),
            entry("e3", "s3", DayOfWeek::Mon, 3, None, Some("r-101")),
        ];
        let c = candidate(None, "s1", DayOfWeek::Mon, 3, Some("garcia"), Some("R-101"));
        let conflicts = preview_slot(&c, &ws);
        let kinds: Vec<ConflictKind> = conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ConflictKind::Section, ConflictKind::Teacher, ConflictKind::Room]
        );
    }

    #[test]
    fn teacher_collision_collects_every_row() {
        // Two stale rows sharing the teacher at the same slot can exist if
        // the store predates the unique index; both must be named.
        let ws = vec![
            entry("e1", "s1", DayOfWeek::Fri, 1, Some("cruz"), None),
            entry("e2", "s2", DayOfWeek::Fri, 1, Some("cruz"), None),
        ];
        let c = candidate(None, "s3", DayOfWeek::Fri, 1, Some("cruz"), None);
        let err = check_slot(&c, &ws).expect_err("teacher conflict");
        assert_eq!(err.conflicting.len(), 2);
    }

    #[test]
    fn day_of_week_parse_round_trips() {
        for day in DayOfWeek::ALL {
            assert_eq!(DayOfWeek::parse(day.as_str()), Some(day));
        }
        assert_eq!(DayOfWeek::parse("Sun"), None);
        assert_eq!(DayOfWeek::parse("monday"), None);
    }
}
