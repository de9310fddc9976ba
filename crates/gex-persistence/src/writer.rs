//! JSON Lines writer for gamma exposure snapshots.
//!
//! Each line is one complete snapshot, so an interrupted write damages at
//! most the last line. Files are opened in append mode and rotate on the
//! snapshot's UTC date: `gex_{TICKER}_{YYYY-MM-DD}.jsonl`.

use crate::error::PersistenceResult;
use chrono::{DateTime, TimeZone, Utc};
use gex_core::GammaSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One strike level as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub strike: f64,
    pub call_gex: f64,
    pub put_gex: f64,
    pub total_gex: f64,
}

/// One snapshot as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub ticker: String,
    pub timestamp_ms: i64,
    pub spot_price: f64,
    /// Ascending by strike.
    pub levels: Vec<LevelRecord>,
}

impl SnapshotRecord {
    pub fn from_snapshot(snapshot: &GammaSnapshot) -> Self {
        Self {
            ticker: snapshot.ticker.clone(),
            timestamp_ms: snapshot.timestamp.timestamp_millis(),
            spot_price: snapshot.spot_price,
            levels: snapshot
                .iter()
                .map(|level| LevelRecord {
                    strike: level.strike().value(),
                    call_gex: level.call_gex(),
                    put_gex: level.put_gex(),
                    total_gex: level.total_gex(),
                })
                .collect(),
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }

    /// UTC date used for file rotation.
    fn date_key(&self) -> String {
        self.timestamp()
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d")
            .to_string()
    }
}

struct ActiveFile {
    writer: BufWriter<File>,
    ticker: String,
    date: String,
    records_written: usize,
}

/// Buffered, append-only snapshot writer.
pub struct SnapshotWriter {
    base_dir: PathBuf,
    buffer: Vec<SnapshotRecord>,
    max_buffer_size: usize,
    active: Option<ActiveFile>,
}

impl SnapshotWriter {
    /// Create a writer rooted at `base_dir`, creating the directory if needed.
    /// A `max_buffer_size` of 0 or 1 writes every record immediately.
    pub fn new(base_dir: impl Into<PathBuf>, max_buffer_size: usize) -> PersistenceResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        let max_buffer_size = max_buffer_size.max(1);

        Ok(Self {
            base_dir,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
            active: None,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file a snapshot for `ticker` on `date` lands in.
    pub fn file_path(&self, ticker: &str, date: &str) -> PathBuf {
        self.base_dir.join(format!("gex_{ticker}_{date}.jsonl"))
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Queue a snapshot; flushes once the buffer is full.
    pub fn save(&mut self, snapshot: &GammaSnapshot) -> PersistenceResult<()> {
        self.buffer.push(SnapshotRecord::from_snapshot(snapshot));
        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    fn close_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush writer on close");
            }
            info!(
                ticker = %active.ticker,
                date = %active.date,
                records = active.records_written,
                "Closed snapshot file"
            );
        }
    }

    fn open(&mut self, ticker: &str, date: &str) -> PersistenceResult<&mut ActiveFile> {
        let stale = self
            .active
            .as_ref()
            .is_some_and(|a| a.ticker != ticker || a.date != date);
        if stale {
            self.close_active();
        }

        let active = match self.active.take() {
            Some(active) => active,
            None => {
                let path = self.file_path(ticker, date);
                info!(path = %path.display(), "Opening snapshot file (append mode)");
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                ActiveFile {
                    writer: BufWriter::new(file),
                    ticker: ticker.to_string(),
                    date: date.to_string(),
                    records_written: 0,
                }
            }
        };
        Ok(self.active.insert(active))
    }

    fn write_record(&mut self, record: &SnapshotRecord) -> PersistenceResult<()> {
        let line = serde_json::to_string(record)?;
        let active = self.open(&record.ticker, &record.date_key())?;
        writeln!(active.writer, "{line}")?;
        active.records_written += 1;
        Ok(())
    }

    /// Write buffered snapshots to disk.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut records = std::mem::take(&mut self.buffer).into_iter();
        let mut written = 0usize;
        while let Some(record) = records.next() {
            if let Err(e) = self.write_record(&record) {
                // Keep what was not written for the next attempt.
                self.buffer.push(record);
                self.buffer.extend(records);
                return Err(e);
            }
            written += 1;
        }

        if let Some(active) = self.active.as_mut() {
            active.writer.flush()?;
        }
        debug!(records = written, "Flushed snapshots");
        Ok(())
    }

    /// Flush pending data and close the current file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active();
        Ok(())
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, "Failed to flush buffer on drop");
        }
        self.close_active();
    }
}

/// Read every snapshot from a JSON Lines file, skipping damaged lines.
pub fn read_snapshots(path: &Path) -> PersistenceResult<Vec<SnapshotRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(line = lineno + 1, error = %e, "Skipping damaged snapshot line"),
        }
    }
    Ok(records)
}
