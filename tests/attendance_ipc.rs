mod test_support;

use serde_json::{json, Value};
use test_support::{
    error_code, request_err, request_ok, spawn_sidecar_with_env, temp_dir, write_file,
};

fn ids_by_roll(students: &Value) -> Vec<(String, String)> {
    students
        .as_array()
        .expect("students array")
        .iter()
        .map(|s| {
            (
                s["rollNo"].as_str().unwrap_or_default().to_string(),
                s["id"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[test]
fn marking_replaces_the_days_register_and_deletes_cascade() {
    let workspace = temp_dir("attendd-attendance");
    let roster = write_file(
        &workspace,
        "roster.csv",
        "Roll No,Student Name,Class,Section\nJNV001,Asha,8,A\nJNV002,Ravi,8,A\n",
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar_with_env(&[]);

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": roster.to_string_lossy() }),
    );
    let ids = ids_by_roll(&imported["accepted"]);
    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "teachers.create",
        json!({ "fullName": "Iyer", "username": "iyer", "password": "pw" }),
    );
    let teacher_id = teacher["teacher"]["id"].as_str().expect("teacher id").to_string();

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({
            "date": "2026-10-16",
            "className": "8",
            "teacherId": teacher_id,
            "marks": [
                { "studentId": ids[0].1, "present": true },
                { "studentId": ids[1].1, "present": false }
            ]
        }),
    );
    assert_eq!(marked["presentCount"], 1);
    assert_eq!(marked["totalCount"], 2);

    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.mark",
        json!({
            "date": "2026-10-16",
            "className": "8",
            "teacherId": teacher_id,
            "marks": [
                { "studentId": ids[0].1, "present": true },
                { "studentId": ids[1].1, "present": true }
            ]
        }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.list",
        json!({ "date": "2026-10-16" }),
    );
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["present"] == true));

    let csv = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "export.csv",
        json!({ "kind": "attendance" }),
    );
    assert!(csv["content"]
        .as_str()
        .expect("content")
        .contains("2026-10-16,JNV001,Asha,8,Yes,Iyer"));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.delete",
        json!({ "id": ids[1].1 }),
    );
    assert_eq!(deleted["attendanceRemoved"], 1);
    let listed = request_ok(&mut stdin, &mut reader, "9", "attendance.list", json!({}));
    assert_eq!(listed["records"].as_array().map(|a| a.len()), Some(1));
    let stats = request_ok(&mut stdin, &mut reader, "10", "stats.get", json!({}));
    assert_eq!(stats["totalAttendanceRecords"], 1);
    assert_eq!(stats["totalStudents"], 1);
}

#[test]
fn bad_marks_are_rejected() {
    let workspace = temp_dir("attendd-attendance-bad");
    let (_child, mut stdin, mut reader) = spawn_sidecar_with_env(&[]);

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "fullName": "Iyer", "username": "iyer", "password": "pw" }),
    );
    let teacher_id = teacher["teacher"]["id"].as_str().expect("teacher id").to_string();

    let err = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.mark",
        json!({ "date": "16/10/2026", "className": "8", "teacherId": teacher_id, "marks": [] }),
    );
    assert_eq!(error_code(&err), "bad_params");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({
            "date": "2026-10-16",
            "className": "8",
            "teacherId": teacher_id,
            "marks": [{ "studentId": "nobody", "present": true }]
        }),
    );
    assert_eq!(error_code(&err), "bad_params");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.mark",
        json!({ "date": "2026-10-16", "className": "8", "teacherId": "ghost", "marks": [] }),
    );
    assert_eq!(error_code(&err), "not_found");
}
