//! Emotion journal (one JSON line per scored face) and its summary report.

use chrono::{DateTime, Local};
use moodcam_core::{Assessment, Emotion};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Local>,
    pub emotion: Emotion,
    pub confidence: f32,
}

/// Append-only writer. The file is opened on first use.
pub struct Journal {
    path: PathBuf,
    file: Option<File>,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    fn open(&self) -> Result<File, JournalError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        tracing::debug!(path = %self.path.display(), "journal opened");
        Ok(file)
    }

    pub fn append(&mut self, assessment: &Assessment) -> Result<(), JournalError> {
        let entry = JournalEntry {
            timestamp: Local::now(),
            emotion: assessment.emotion,
            confidence: assessment.confidence,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if self.file.is_none() {
            self.file = Some(self.open()?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes())?;
        }
        Ok(())
    }
}

/// Read every entry. Malformed lines are skipped with a warning.
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>, JournalError> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(line = lineno + 1, error = %e, "skipping malformed journal line"),
        }
    }
    Ok(entries)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub emotion: Emotion,
    pub count: u64,
    /// Fraction of all entries, in [0, 1].
    pub share: f32,
    pub mean_confidence: f32,
}

/// Per-emotion summary of a journal, most frequent first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total: u64,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn from_entries(entries: &[JournalEntry]) -> Self {
        let mut counts = [0u64; Emotion::COUNT];
        let mut sums = [0f64; Emotion::COUNT];
        for entry in entries {
            counts[entry.emotion.index()] += 1;
            sums[entry.emotion.index()] += entry.confidence as f64;
        }

        let total = entries.len() as u64;
        let mut rows: Vec<ReportRow> = Emotion::ALL
            .into_iter()
            .filter(|e| counts[e.index()] > 0)
            .map(|e| {
                let count = counts[e.index()];
                ReportRow {
                    emotion: e,
                    count,
                    share: count as f32 / total as f32,
                    mean_confidence: (sums[e.index()] / count as f64) as f32,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count));

        Self { total, rows }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return writeln!(f, "journal is empty");
        }
        writeln!(f, "{:<10} {:>7} {:>7} {:>10}", "EMOTION", "COUNT", "SHARE", "MEAN CONF")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<10} {:>7} {:>6.1}% {:>9.0}%",
                row.emotion.as_str(),
                row.count,
                row.share * 100.0,
                row.mean_confidence * 100.0
            )?;
        }
        writeln!(f, "{:<10} {:>7}", "total", self.total)
    }
}
