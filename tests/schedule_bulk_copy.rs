mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, spawn_sidecar, temp_dir};

struct Seed {
    year: String,
    term: String,
    s1: String,
    s2: String,
    s3: String,
    math: String,
    english: String,
}

fn seed(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &std::path::Path) -> Seed {
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
    let year = request_ok(stdin, reader, "s3", "schoolYears.create", json!({ "label": "2025" }))
        ["schoolYearId"]
        .as_str()
        .expect("schoolYearId")
        .to_string();
    let term = request_ok(
        stdin,
        reader,
        "s4",
        "terms.create",
        json!({ "schoolYearId": year, "label": "T1", "sortOrder": 0 }),
    )["termId"]
        .as_str()
        .expect("termId")
        .to_string();
    let mut sections = Vec::new();
    for (i, name) in ["S1", "S2", "S3"].iter().enumerate() {
        let resp = request_ok(
            stdin,
            reader,
            &format!("sec{}", i),
            "sections.create",
            json!({ "schoolYearId": year, "name": name }),
        );
        sections.push(resp["sectionId"].as_str().expect("sectionId").to_string());
    }
    let math = request_ok(
        stdin,
        reader,
        "s5",
        "subjects.create",
        json!({ "code": "MATH7", "name": "Mathematics 7" }),
    )["subjectId"]
        .as_str()
        .expect("subjectId")
        .to_string();
    let english = request_ok(
        stdin,
        reader,
        "s6",
        "subjects.create",
        json!({ "code": "ENG7", "name": "English 7" }),
    )["subjectId"]
        .as_str()
        .expect("subjectId")
        .to_string();
    let s3 = sections.pop().expect("s3");
    let s2 = sections.pop().expect("s2");
    let s1 = sections.pop().expect("s1");
    Seed {
        year,
        term,
        s1,
        s2,
        s3,
        math,
        english,
    }
}

fn create_slot(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    seed: &Seed,
    section: &str,
    day: &str,
    period: i64,
    subject: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "schedule.create",
        json!({
            "schoolYearId": seed.year,
            "termId": seed.term,
            "sectionId": section,
            "dayOfWeek": day,
            "periodNumber": period,
            "subjectId": subject
        }),
    );
}

fn section_slots(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    seed: &Seed,
    section: &str,
) -> Vec<(String, i64)> {
    let listed = request_ok(
        stdin,
        reader,
        id,
        "schedule.list",
        json!({ "schoolYearId": seed.year, "termId": seed.term }),
    );
    listed["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter(|e| e["sectionId"].as_str() == Some(section))
        .map(|e| {
            (
                e["dayOfWeek"].as_str().expect("dayOfWeek").to_string(),
                e["periodNumber"].as_i64().expect("periodNumber"),
            )
        })
        .collect()
}

#[test]
fn no_overwrite_copy_skips_occupied_slots_only() {
    let workspace = temp_dir("timetabled-bulk-copy-fill");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seed = seed(&mut stdin, &mut reader, &workspace);

    // Source S1: Mon p3 and Tue p1. Target S2 already occupies Mon p3.
    create_slot(&mut stdin, &mut reader, "1", &seed, &seed.s1, "Mon", 3, &seed.math);
    create_slot(&mut stdin, &mut reader, "2", &seed, &seed.s1, "Tue", 1, &seed.math);
    create_slot(&mut stdin, &mut reader, "3", &seed, &seed.s2, "Mon", 3, &seed.english);

    let copied = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.bulkCopy",
        json!({
            "schoolYearId": seed.year,
            "termId": seed.term,
            "sourceSectionId": seed.s1,
            "targetSectionIds": [seed.s2, seed.s3],
            "overwrite": false
        }),
    );
    let targets = copied["targets"].as_array().expect("targets");
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0]["copied"].as_i64(), Some(1));
    assert_eq!(targets[0]["slotsSkipped"].as_i64(), Some(1));
    assert_eq!(targets[1]["copied"].as_i64(), Some(2));

    // S2 keeps its own Mon p3 and gains only Tue p1; S3 gains both.
    let s2_slots = section_slots(&mut stdin, &mut reader, "5", &seed, &seed.s2);
    assert_eq!(s2_slots.len(), 2);
    assert!(s2_slots.contains(&("Mon".to_string(), 3)));
    assert!(s2_slots.contains(&("Tue".to_string(), 1)));
    let s3_slots = section_slots(&mut stdin, &mut reader, "6", &seed, &seed.s3);
    assert_eq!(s3_slots.len(), 2);
}

#[test]
fn overwrite_copy_replaces_target_entirely() {
    let workspace = temp_dir("timetabled-bulk-copy-overwrite");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seed = seed(&mut stdin, &mut reader, &workspace);

    create_slot(&mut stdin, &mut reader, "1", &seed, &seed.s1, "Mon", 3, &seed.math);
    create_slot(&mut stdin, &mut reader, "2", &seed, &seed.s2, "Fri", 5, &seed.english);

    let copied = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.bulkCopy",
        json!({
            "schoolYearId": seed.year,
            "termId": seed.term,
            "sourceSectionId": seed.s1,
            "targetSectionIds": [seed.s2],
            "overwrite": true
        }),
    );
    let targets = copied["targets"].as_array().expect("targets");
    assert_eq!(targets[0]["copied"].as_i64(), Some(1));

    // The target's previous Fri p5 slot is gone.
    let s2_slots = section_slots(&mut stdin, &mut reader, "4", &seed, &seed.s2);
    assert_eq!(s2_slots, vec![("Mon".to_string(), 3)]);
}

#[test]
fn self_copy_target_is_skipped() {
    let workspace = temp_dir("timetabled-bulk-copy-self");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seed = seed(&mut stdin, &mut reader, &workspace);

    create_slot(&mut stdin, &mut reader, "1", &seed, &seed.s1, "Mon", 3, &seed.math);

    let copied = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedule.bulkCopy",
        json!({
            "schoolYearId": seed.year,
            "termId": seed.term,
            "sourceSectionId": seed.s1,
            "targetSectionIds": [seed.s1, seed.s2],
            "overwrite": true
        }),
    );
    let targets = copied["targets"].as_array().expect("targets");
    assert_eq!(targets[0]["skipped"].as_bool(), Some(true));
    assert_eq!(targets[1]["copied"].as_i64(), Some(1));

    // Source untouched even though overwrite was requested.
    let s1_slots = section_slots(&mut stdin, &mut reader, "3", &seed, &seed.s1);
    assert_eq!(s1_slots, vec![("Mon".to_string(), 3)]);
}

#[test]
fn bulk_clear_reports_per_section_counts() {
    let workspace = temp_dir("timetabled-bulk-clear");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seed = seed(&mut stdin, &mut reader, &workspace);

    create_slot(&mut stdin, &mut reader, "1", &seed, &seed.s1, "Mon", 1, &seed.math);
    create_slot(&mut stdin, &mut reader, "2", &seed, &seed.s1, "Mon", 2, &seed.english);
    create_slot(&mut stdin, &mut reader, "3", &seed, &seed.s2, "Tue", 1, &seed.math);

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.bulkClear",
        json!({
            "schoolYearId": seed.year,
            "termId": seed.term,
            "sectionIds": [seed.s1, seed.s2, seed.s3]
        }),
    );
    let sections = cleared["sections"].as_array().expect("sections");
    assert_eq!(sections[0]["deleted"].as_i64(), Some(2));
    assert_eq!(sections[1]["deleted"].as_i64(), Some(1));
    assert_eq!(sections[2]["deleted"].as_i64(), Some(0));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.list",
        json!({ "schoolYearId": seed.year, "termId": seed.term }),
    );
    assert_eq!(listed["entries"].as_array().map(|a| a.len()), Some(0));
}
