use super::columns::{ColumnPlan, Field};
use super::error::ImportError;
use super::tabular::Grid;
use crate::model::{roll_key, StudentRecord};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateReason {
    /// An earlier row of the same file already used the roll number.
    Batch,
    /// The roll number is already stored.
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRow {
    pub row: usize,
    pub roll_no: String,
    pub full_name: String,
    pub reason: DuplicateReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub accepted: Vec<StudentRecord>,
    /// Source row number (header = 1) for each accepted record.
    #[serde(skip)]
    pub accepted_rows: Vec<usize>,
    pub duplicates: Vec<DuplicateRow>,
    pub errors: Vec<RowError>,
}

impl ImportResult {
    /// Move rows the store rejected as already present into the duplicates
    /// bucket. Returns how many records were moved.
    pub fn reclassify_existing(&mut self, roll_nos: &[String]) -> usize {
        let keys = roll_nos.iter().map(|r| roll_key(r)).collect::<HashSet<_>>();
        let mut kept = Vec::with_capacity(self.accepted.len());
        let mut kept_rows = Vec::with_capacity(self.accepted.len());
        let mut moved = 0usize;
        for (rec, row) in self.accepted.drain(..).zip(self.accepted_rows.drain(..)) {
            if keys.contains(&roll_key(&rec.roll_no)) {
                moved += 1;
                self.duplicates.push(DuplicateRow {
                    row,
                    roll_no: rec.roll_no,
                    full_name: rec.full_name,
                    reason: DuplicateReason::Existing,
                });
            } else {
                kept.push(rec);
                kept_rows.push(row);
            }
        }
        self.accepted = kept;
        self.accepted_rows = kept_rows;
        self.duplicates.sort_by_key(|d| d.row);
        moved
    }
}

/// Resolve the header and validate every data row against the keys already
/// stored. `existing` holds lowercased roll numbers (see `model::roll_key`).
///
/// Only header problems fail the whole call. Bad rows land in `errors`,
/// repeated roll numbers in `duplicates`, and processing continues.
pub fn validate_grid(existing: &HashSet<String>, grid: &Grid) -> Result<ImportResult, ImportError> {
    let Some((header, rows)) = grid.rows.split_first() else {
        return Err(ImportError::EmptyFile { rows: 0 });
    };
    let plan = ColumnPlan::resolve(header)?;

    let mut out = ImportResult::default();
    let mut seen = HashSet::<String>::new();
    for (i, raw) in rows.iter().enumerate() {
        let row_no = grid.line(i + 1);
        let cell = |f: Field| {
            raw.get(plan.column(f))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let record = StudentRecord {
            roll_no: cell(Field::RollNo),
            full_name: cell(Field::FullName),
            class_name: cell(Field::ClassName),
            section: cell(Field::Section),
        };

        let missing = record.missing_fields();
        if missing.len() == Field::ALL.len() {
            continue;
        }
        if !missing.is_empty() {
            out.errors.push(RowError {
                row: row_no,
                message: format!("missing {}", missing.join(", ")),
            });
            continue;
        }

        let key = roll_key(&record.roll_no);
        let reason = if existing.contains(&key) {
            Some(DuplicateReason::Existing)
        } else if seen.contains(&key) {
            Some(DuplicateReason::Batch)
        } else {
            None
        };
        if let Some(reason) = reason {
            out.duplicates.push(DuplicateRow {
                row: row_no,
                roll_no: record.roll_no,
                full_name: record.full_name,
                reason,
            });
            continue;
        }

        seen.insert(key);
        out.accepted.push(record);
        out.accepted_rows.push(row_no);
    }
    Ok(out)
}
