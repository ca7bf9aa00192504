//! Roster import and export: uploaded file → grid → column plan → validated
//! records, and records → delimited text. Nothing here touches the store.

pub mod columns;
pub mod error;
pub mod export;
pub mod tabular;
pub mod validate;

pub use error::ImportError;
pub use tabular::{FileKind, Grid};
pub use validate::{validate_grid, ImportResult};

use std::path::Path;

/// Read an upload from disk, enforcing the extension and size checks that
/// happen at the file boundary, and parse it into a grid.
pub fn read_upload(path: &Path, max_bytes: u64) -> Result<(FileKind, Grid), ImportError> {
    let kind = FileKind::from_path(path)?;
    let meta = std::fs::metadata(path).map_err(|e| ImportError::parse(kind.as_str(), e.to_string()))?;
    if meta.len() > max_bytes {
        return Err(ImportError::FileTooLarge {
            size: meta.len(),
            limit: max_bytes,
        });
    }
    let bytes = std::fs::read(path).map_err(|e| ImportError::parse(kind.as_str(), e.to_string()))?;
    let grid = tabular::parse_grid(&bytes, kind)?;
    Ok((kind, grid))
}
