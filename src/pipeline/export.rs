//! Output writers.
//!
//! Everything is written to a temporary file next to the destination and
//! moved into place only once fully flushed, so a failed run never leaves a
//! partial export behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{ExportError, Result};
use crate::table::Frame;

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    debug!(tmp = %tmp.path().display(), "Writing to temporary file");
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ExportError::Io(e.error))?;
    Ok(())
}

/// Write `frame` as comma-separated UTF-8 with a header row, index column first.
pub fn write_csv_atomic(frame: &Frame, path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(frame.header())?;
        for row in frame.rows() {
            let record = std::iter::once(row.id.as_str())
                .chain(row.cells.iter().map(|c| c.as_deref().unwrap_or("")));
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    })?;
    info!("💾 Saved {} rows to {}", frame.len(), path.display());
    Ok(())
}

/// Write any serializable value as pretty JSON.
pub fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        serde_json::to_writer_pretty(&mut *file, value)?;
        file.write_all(b"\n")?;
        Ok(())
    })
}

/// Write raw text, e.g. a metrics snapshot.
pub fn write_text_atomic(text: &str, path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        file.write_all(text.as_bytes())?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_has_index_first_and_empty_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        let mut frame = Frame::new("classification_id", vec!["a".into(), "b".into()]);
        frame
            .push_row("1", vec![Some("x, y".into()), None])
            .unwrap();
        write_csv_atomic(&frame, &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "classification_id,a,b\n1,\"x, y\",\n");
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let result = write_atomic(&path, |_| Err(ExportError::Integrity("boom".into())));
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_json_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json_atomic(&serde_json::json!({"rows": 3}), &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["rows"], 3);
    }
}
