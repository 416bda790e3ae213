mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, spawn_sidecar, temp_dir};

fn seed_three_sections(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> (String, String, Vec<String>, String, String) {
    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "s2",
        "session.capability.set",
        json!({ "canWrite": true }),
    );
    let year = request_ok(stdin, reader, "s3", "schoolYears.create", json!({ "label": "2025" }));
    let school_year_id = year["schoolYearId"].as_str().expect("schoolYearId").to_string();
    let term = request_ok(
        stdin,
        reader,
        "s4",
        "terms.create",
        json!({ "schoolYearId": school_year_id, "label": "T1", "sortOrder": 0 }),
    );
    let term_id = term["termId"].as_str().expect("termId").to_string();

    let mut sections = Vec::new();
    for (i, name) in ["S1", "S2", "S3"].iter().enumerate() {
        let resp = request_ok(
            stdin,
            reader,
            &format!("sec{}", i),
            "sections.create",
            json!({ "schoolYearId": school_year_id, "name": name }),
        );
        sections.push(resp["sectionId"].as_str().expect("sectionId").to_string());
    }
    let subject_id = request_ok(
        stdin,
        reader,
        "s5",
        "subjects.create",
        json!({ "code": "ENG7", "name": "English 7" }),
    )["subjectId"]
        .as_str()
        .expect("subjectId")
        .to_string();
    let teacher_id = request_ok(
        stdin,
        reader,
        "s6",
        "teachers.create",
        json!({ "lastName": "Santos", "firstName": "Maria" }),
    )["teacherId"]
        .as_str()
        .expect("teacherId")
        .to_string();
    (school_year_id, term_id, sections, subject_id, teacher_id)
}

#[test]
fn preview_reports_teacher_and_room_conflicts_together() {
    let workspace = temp_dir("timetabled-preview-multi");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (year, term, sections, subject, teacher) =
        seed_three_sections(&mut stdin, &mut reader, &workspace);

    // S2 books the teacher, S3 books the room, both at Tue period 2.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schedule.create",
        json!({
            "schoolYearId": year,
            "termId": term,
            "sectionId": sections[1],
            "dayOfWeek": "Tue",
            "periodNumber": 2,
            "subjectId": subject,
            "teacherId": teacher
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedule.create",
        json!({
            "schoolYearId": year,
            "termId": term,
            "sectionId": sections[2],
            "dayOfWeek": "Tue",
            "periodNumber": 2,
            "subjectId": subject,
            "room": "Lab A"
        }),
    );

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.preview",
        json!({
            "schoolYearId": year,
            "termId": term,
            "sectionId": sections[0],
            "dayOfWeek": "Tue",
            "periodNumber": 2,
            "teacherId": teacher,
            "room": "  LAB a"
        }),
    );
    let kinds: Vec<&str> = preview["conflicts"]
        .as_array()
        .expect("conflicts array")
        .iter()
        .filter_map(|c| c["kind"].as_str())
        .collect();
    assert_eq!(kinds, vec!["teacher", "room"]);

    // Preview never writes.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.list",
        json!({ "schoolYearId": year, "termId": term }),
    );
    assert_eq!(listed["entries"].as_array().map(|a| a.len()), Some(2));
}

#[test]
fn preview_excludes_the_row_being_edited() {
    let workspace = temp_dir("timetabled-preview-self");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (year, term, sections, subject, teacher) =
        seed_three_sections(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schedule.create",
        json!({
            "schoolYearId": year,
            "termId": term,
            "sectionId": sections[0],
            "dayOfWeek": "Wed",
            "periodNumber": 1,
            "subjectId": subject,
            "teacherId": teacher
        }),
    );
    let schedule_id = created["scheduleId"].as_str().expect("scheduleId");

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedule.preview",
        json!({
            "schoolYearId": year,
            "termId": term,
            "scheduleId": schedule_id,
            "sectionId": sections[0],
            "dayOfWeek": "Wed",
            "periodNumber": 1,
            "teacherId": teacher
        }),
    );
    assert_eq!(preview["conflicts"].as_array().map(|a| a.len()), Some(0));

    // Without the id the same slot reads as a section conflict.
    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.preview",
        json!({
            "schoolYearId": year,
            "termId": term,
            "sectionId": sections[0],
            "dayOfWeek": "Wed",
            "periodNumber": 1,
            "teacherId": teacher
        }),
    );
    let kinds: Vec<&str> = preview["conflicts"]
        .as_array()
        .expect("conflicts array")
        .iter()
        .filter_map(|c| c["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"section"));
}
