mod test_support;

use serde_json::json;
use test_support::{
    error_code, request_err, request_ok, spawn_sidecar, spawn_sidecar_with_env, temp_dir,
    write_file,
};

const MIXED_ROSTER: &str = "Roll No,Student Name,Class,Section\nS1,Alice,8,A\nS1,Alice Dup,8,A\n,Bob,9,B\n";

#[test]
fn import_sorts_rows_into_accepted_duplicates_and_errors() {
    let workspace = temp_dir("attendd-import-mixed");
    let file = write_file(&workspace, "roster.csv", MIXED_ROSTER);
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": file.to_string_lossy() }),
    );
    assert_eq!(res["fileKind"], "csv");
    assert_eq!(res["acceptedCount"], 1);
    assert_eq!(res["accepted"][0]["rollNo"], "S1");
    assert_eq!(res["accepted"][0]["fullName"], "Alice");
    assert!(res["accepted"][0]["id"].as_str().is_some());

    let dups = res["duplicates"].as_array().expect("duplicates");
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0]["row"], 3);
    assert_eq!(dups[0]["rollNo"], "S1");
    assert_eq!(dups[0]["reason"], "batch");

    let errors = res["errors"].as_array().expect("errors");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["row"], 4);
    assert_eq!(errors[0]["message"], "missing roll number");

    let listed = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({}));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(1));
}

#[test]
fn missing_columns_abort_before_any_row_is_stored() {
    let workspace = temp_dir("attendd-import-missing-cols");
    let file = write_file(&workspace, "short.csv", "RNo,Name\nS9,Zed\nS10,Yan\n");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let err = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": file.to_string_lossy() }),
    );
    assert_eq!(error_code(&err), "missing_columns");
    assert_eq!(err["details"]["missing"], json!(["class", "section"]));
    assert_eq!(err["details"]["accepted"], 0);

    let listed = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({}));
    assert_eq!(listed["students"], json!([]));
}

#[test]
fn file_boundary_checks_reject_bad_uploads() {
    let workspace = temp_dir("attendd-import-boundary");
    let txt = write_file(&workspace, "roster.txt", MIXED_ROSTER);
    let header_only = write_file(&workspace, "empty.csv", "Roll No,Student Name,Class,Section\n");
    let big = write_file(&workspace, "big.CSV", MIXED_ROSTER);
    let (_child, mut stdin, mut reader) =
        spawn_sidecar_with_env(&[("ATTENDD_MAX_UPLOAD_BYTES", "64")]);

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let err = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": txt.to_string_lossy() }),
    );
    assert_eq!(error_code(&err), "unsupported_file");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.import",
        json!({ "inPath": header_only.to_string_lossy() }),
    );
    assert_eq!(error_code(&err), "empty_file");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "students.import",
        json!({ "inPath": big.to_string_lossy() }),
    );
    assert_eq!(error_code(&err), "file_too_large");
    assert_eq!(err["details"]["limit"], 64);

    let err = request_err(&mut stdin, &mut reader, "5", "students.import", json!({}));
    assert_eq!(error_code(&err), "bad_params");
}

#[test]
fn reimporting_the_same_file_adds_nothing() {
    let workspace = temp_dir("attendd-import-idempotent");
    let file = write_file(
        &workspace,
        "roster.csv",
        "roll_no, NAME ,class,SECTION\nJNV001,Asha,8,A\nJNV002,\"Rao, Kiran\",8,B\n",
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": file.to_string_lossy() }),
    );
    assert_eq!(first["acceptedCount"], 2);
    assert_eq!(first["accepted"][1]["fullName"], "Rao, Kiran");

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.import",
        json!({ "inPath": file.to_string_lossy() }),
    );
    assert_eq!(second["acceptedCount"], 0);
    let dups = second["duplicates"].as_array().expect("duplicates");
    assert_eq!(dups.len(), 2);
    assert!(dups.iter().all(|d| d["reason"] == "existing"));

    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(2));
}

#[test]
fn preview_reports_without_persisting() {
    let workspace = temp_dir("attendd-import-preview");
    let file = write_file(&workspace, "roster.csv", MIXED_ROSTER);
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let detached = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.previewImport",
        json!({ "inPath": file.to_string_lossy() }),
    );
    assert_eq!(detached["acceptedCount"], 1);
    assert_eq!(detached["rowsRead"], 3);

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.previewImport",
        json!({ "inPath": file.to_string_lossy() }),
    );
    let stats = request_ok(&mut stdin, &mut reader, "4", "stats.get", json!({}));
    assert_eq!(stats["totalStudents"], 0);
}

#[test]
fn template_is_importable() {
    let workspace = temp_dir("attendd-import-template");
    let out = workspace.join("out").join("template.csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let inline = request_ok(&mut stdin, &mut reader, "1", "students.template", json!({}));
    assert_eq!(inline["fileName"], "student_list_template.csv");
    assert!(inline["content"]
        .as_str()
        .expect("content")
        .starts_with("Roll No,Student Name,Class,Section"));

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.template",
        json!({ "outPath": out.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.import",
        json!({ "inPath": out.to_string_lossy() }),
    );
    assert_eq!(res["acceptedCount"], 3);
    assert_eq!(res["errors"], json!([]));
}

#[test]
fn spreadsheet_upload_reports_sheet_row_numbers() {
    let workspace = temp_dir("attendd-import-xlsx");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, h) in ["Roll No", "Student Name", "Class", "Section"].iter().enumerate() {
        sheet.write_string(0, col as u16, *h).expect("header cell");
    }
    sheet.write_number(1, 0, 1001.0).expect("roll");
    sheet.write_string(1, 1, "Asha").expect("name");
    sheet.write_number(1, 2, 8.0).expect("class");
    sheet.write_string(1, 3, "A").expect("section");
    sheet.write_string(3, 1, "Bob").expect("name");
    sheet.write_number(3, 2, 9.0).expect("class");
    sheet.write_string(3, 3, "B").expect("section");
    let file = workspace.join("roster.xlsx");
    workbook.save(&file).expect("save xlsx");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "inPath": file.to_string_lossy() }),
    );
    assert_eq!(res["fileKind"], "xlsx");
    assert_eq!(res["acceptedCount"], 1);
    assert_eq!(res["accepted"][0]["rollNo"], "1001");
    assert_eq!(res["accepted"][0]["className"], "8");
    assert_eq!(res["errors"][0]["row"], 4);
    assert_eq!(res["errors"][0]["message"], "missing roll number");
}

#[test]
fn blank_lines_do_not_shift_reported_rows() {
    let workspace = temp_dir("attendd-import-blank-lines");
    let file = write_file(
        &workspace,
        "roster.csv",
        "Roll No,Student Name,Class,Section\nS1,Alice,8,A\n\n,Bob,9,B\n",
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.previewImport",
        json!({ "inPath": file.to_string_lossy() }),
    );
    assert_eq!(res["errors"][0]["row"], 4);
}
