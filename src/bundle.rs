use crate::roster::export::{attendance_csv, students_csv, teachers_csv, ExportData};
use anyhow::Context;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const STUDENTS_ENTRY: &str = "students.csv";
const TEACHERS_ENTRY: &str = "teachers.csv";
const ATTENDANCE_ENTRY: &str = "attendance.csv";
pub const BUNDLE_FORMAT_V1: &str = "attendd-export-v1";

#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

/// Zip the three export blocks with a manifest describing their row counts.
pub fn write_export_bundle(
    out_path: &Path,
    school_name: &str,
    exported_at: &str,
    data: &ExportData<'_>,
) -> anyhow::Result<BundleSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "schoolName": school_name,
        "exportedAt": exported_at,
        "counts": {
            "students": data.students.len(),
            "teachers": data.teachers.len(),
            "attendance": data.attendance.len(),
        },
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    let entries = [
        (STUDENTS_ENTRY, students_csv(data.students)),
        (TEACHERS_ENTRY, teachers_csv(data.teachers)),
        (
            ATTENDANCE_ENTRY,
            attendance_csv(data.attendance, data.students, data.teachers),
        ),
    ];
    for (name, body) in &entries {
        zip.start_file(*name, opts)
            .with_context(|| format!("failed to start {name} entry"))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write {name} entry"))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(BundleSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 1 + entries.len(),
    })
}
