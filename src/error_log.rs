//! Append-only error log (`errors.txt`)
//!
//! Every line is `[YYYY-mm-dd HH:MM:SS] message`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn record(&self, message: &str) -> Result<()> {
        self.record_at(Local::now(), message)
    }

    fn record_at(&self, at: DateTime<Local>, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", format_line(at, message))?;
        Ok(())
    }
}

/// Render one log line. Newlines inside the message are flattened.
pub fn format_line(at: DateTime<Local>, message: &str) -> String {
    format!(
        "[{}] {}",
        at.format("%Y-%m-%d %H:%M:%S"),
        message.replace(['\r', '\n'], " ")
    )
}
