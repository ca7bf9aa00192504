use super::columns::Field;

/// Batch-fatal import failures. Any of these aborts the import before the
/// store is touched; per-row problems are collected in `ImportResult` instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("unsupported file type {name:?}; accepted extensions: .csv, .xls, .xlsx")]
    UnsupportedFile { name: String },

    #[error("file is {size} bytes; the upload limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("could not read file as {kind}: {message}")]
    Parse { kind: &'static str, message: String },

    #[error("file has no data rows (found {rows} row(s), need a header and at least one data row)")]
    EmptyFile { rows: usize },

    #[error("missing required columns: {}", labels(.missing))]
    MissingColumns { missing: Vec<Field> },
}

impl ImportError {
    pub fn parse(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            kind,
            message: message.into(),
        }
    }

    /// Error code used in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::UnsupportedFile { .. } => "unsupported_file",
            ImportError::FileTooLarge { .. } => "file_too_large",
            ImportError::Parse { .. } => "parse_failed",
            ImportError::EmptyFile { .. } => "empty_file",
            ImportError::MissingColumns { .. } => "missing_columns",
        }
    }
}

fn labels(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}
