mod test_support;

use serde_json::json;
use std::fs::File;
use std::io::Read;
use test_support::{
    error_code, request_err, request_ok, spawn_sidecar_with_env, temp_dir, write_file,
};

const ROSTER: &str = "Roll No,Student Name,Class,Section\nJNV001,Asha,8,A\nJNV002,\"Rao, Kiran\",8,B\nJNV003,Meera,9,A\n";

#[test]
fn exported_students_reimport_into_a_fresh_workspace() {
    let source = temp_dir("attendd-export-src");
    let target = temp_dir("attendd-export-dst");
    let roster = write_file(&source, "roster.csv", ROSTER);
    let out = source.join("exports").join("students.csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar_with_env(&[]);

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": source.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": roster.to_string_lossy() }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "export.csv",
        json!({ "kind": "students", "outPath": out.to_string_lossy() }),
    );
    assert!(exported["fileName"]
        .as_str()
        .expect("fileName")
        .starts_with("students_"));
    let text = std::fs::read_to_string(&out).expect("read export");
    assert!(text.starts_with("Roll No,Student Name,Class,Section,Date Added\n"));
    assert!(text.contains("JNV002,\"Rao, Kiran\",8,B,"));

    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "workspace.select",
        json!({ "path": target.to_string_lossy() }),
    );
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.import",
        json!({ "inPath": out.to_string_lossy() }),
    );
    assert_eq!(res["acceptedCount"], 3);
    let names = res["accepted"]
        .as_array()
        .expect("accepted")
        .iter()
        .map(|s| s["fullName"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Asha", "Rao, Kiran", "Meera"]);
}

#[test]
fn all_export_is_titled_and_recorded() {
    let workspace = temp_dir("attendd-export-all");
    let roster = write_file(&workspace, "roster.csv", ROSTER);
    let (_child, mut stdin, mut reader) =
        spawn_sidecar_with_env(&[("ATTENDD_SCHOOL_NAME", "Test School")]);

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": roster.to_string_lossy() }),
    );
    let before = request_ok(&mut stdin, &mut reader, "3", "stats.get", json!({}));
    assert_eq!(before["lastExport"], json!(null));
    assert_eq!(before["totalStudents"], 3);
    assert_eq!(before["totalClasses"], 3);

    let res = request_ok(&mut stdin, &mut reader, "4", "export.csv", json!({ "kind": "all" }));
    let content = res["content"].as_str().expect("inline content");
    assert!(content.starts_with("Test School - Complete System Export - "));
    assert!(content.contains("\n\nRoll No,Student Name,Class,Section,Date Added\n"));
    assert!(content.contains("\n\nName,Username,Role,Subject,Classes,Approved,Date Added"));
    assert!(content.contains("\n\nDate,Roll No,Student Name,Class,Present,Teacher"));

    let after = request_ok(&mut stdin, &mut reader, "5", "stats.get", json!({}));
    assert!(after["lastExport"].as_str().is_some());

    let err = request_err(&mut stdin, &mut reader, "6", "export.csv", json!({ "kind": "grades" }));
    assert_eq!(error_code(&err), "bad_params");
}

#[test]
fn bundle_zips_manifest_and_csv_files() {
    let workspace = temp_dir("attendd-export-bundle");
    let roster = write_file(&workspace, "roster.csv", ROSTER);
    let out = workspace.join("bundle").join("export.zip");
    let (_child, mut stdin, mut reader) = spawn_sidecar_with_env(&[]);

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": roster.to_string_lossy() }),
    );
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "export.bundle",
        json!({ "outPath": out.to_string_lossy() }),
    );
    assert_eq!(res["bundleFormat"], "attendd-export-v1");
    assert_eq!(res["entryCount"], 4);

    let mut archive = zip::ZipArchive::new(File::open(&out).expect("open bundle")).expect("zip");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["counts"]["students"], 3);
    archive.by_name("students.csv").expect("students entry");
    archive.by_name("teachers.csv").expect("teachers entry");
    archive.by_name("attendance.csv").expect("attendance entry");
}
