//! JSONL audit log writer with daily file rotation.

use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{NaiveDate, Utc};

use super::{AuditEntry, AuditLogger};
use crate::{AppError, Result};

struct OpenFile {
    date: NaiveDate,
    writer: BufWriter<fs::File>,
}

/// A daily-rotating JSONL audit log writer.
///
/// Appends one JSON object per line to `<log_dir>/audit-YYYY-MM-DD.jsonl`.
/// A new file is opened on the first write after the calendar date changes.
pub struct JsonlAuditWriter {
    log_dir: PathBuf,
    current: Mutex<Option<OpenFile>>,
}

impl JsonlAuditWriter {
    /// Construct a writer that stores logs in `log_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the directory cannot be created.
    pub fn new(log_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&log_dir).map_err(|e| {
            AppError::Io(format!(
                "failed to create audit log directory {}: {e}",
                log_dir.display()
            ))
        })?;
        Ok(Self {
            log_dir,
            current: Mutex::new(None),
        })
    }

    /// Path of the file that holds entries for `date`.
    #[must_use]
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        file_path(&self.log_dir, date)
    }
}

fn file_path(log_dir: &Path, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("audit-{date}.jsonl"))
}

fn open_for_date(log_dir: &Path, date: NaiveDate) -> Result<BufWriter<fs::File>> {
    let path = file_path(log_dir, date);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| AppError::Io(format!("failed to open audit log {}: {e}", path.display())))?;
    Ok(BufWriter::new(file))
}

impl AuditLogger for JsonlAuditWriter {
    fn log_entry(&self, entry: AuditEntry) -> Result<()> {
        let today = Utc::now().date_naive();
        let line = serde_json::to_string(&entry)
            .map_err(|e| AppError::Io(format!("failed to serialize audit entry: {e}")))?;

        let mut guard = self
            .current
            .lock()
            .map_err(|_| AppError::Io("audit writer mutex poisoned".to_owned()))?;

        let open = match guard.take() {
            Some(open) if open.date == today => open,
            _ => OpenFile {
                date: today,
                writer: open_for_date(&self.log_dir, today)?,
            },
        };
        let open = guard.insert(open);

        writeln!(open.writer, "{line}")
            .and_then(|()| open.writer.flush())
            .map_err(|e| AppError::Io(format!("audit write failed: {e}")))
    }
}
