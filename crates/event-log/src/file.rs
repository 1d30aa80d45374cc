//! File-backed log adapter for durable single-node operation.
//!
//! One JSON document per line, flushed and synced on every append so an
//! acked offset survives process death. An fs2 advisory lock on the log
//! directory keeps the append path single-process.
//!
//! Offsets are not reused after a retention trim, so reads locate records
//! by binary search on offset rather than by vector index.

use crate::errors::LogError;
use crate::ports::EventLog;
use crate::record::{filter_history, HistoryPage, HistoryQuery, LogRecord};
use crate::DEFAULT_HISTORY_LIMIT;
use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use shared_types::Event;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const LOG_FILE: &str = "events.jsonl";
const LOCK_FILE: &str = "log.lock";

struct FileLogInner {
    writer: BufWriter<File>,
    records: Vec<LogRecord>,
    next_offset: u64,
}

/// Durable JSON-lines event log.
pub struct FileEventLog {
    inner: Mutex<FileLogInner>,
    log_path: PathBuf,
    // Held for the lifetime of the log; dropping releases the lock.
    _lock_file: File,
}

impl FileEventLog {
    /// Open (or create) the log in `dir`, acquiring the directory lock.
    ///
    /// # Errors
    ///
    /// - `LogError::Locked` if another process owns the directory.
    /// - `LogError::Io` on filesystem failures.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, LogError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let lock_file = File::create(dir.join(LOCK_FILE))?;
        lock_file.try_lock_exclusive().map_err(|e| LogError::Locked {
            message: format!("{}: {}", dir.display(), e),
        })?;

        let log_path = dir.join(LOG_FILE);
        let (records, valid_len) = Self::load(&log_path)?;
        Self::truncate_to(&log_path, valid_len)?;
        let next_offset = records.last().map_or(0, |r| r.offset + 1);

        info!(
            path = %log_path.display(),
            records = records.len(),
            next_offset,
            "Opened durable event log"
        );

        let writer = BufWriter::new(
            OpenOptions::new().create(true).append(true).open(&log_path)?,
        );

        Ok(Self {
            inner: Mutex::new(FileLogInner {
                writer,
                records,
                next_offset,
            }),
            log_path,
            _lock_file: lock_file,
        })
    }

    fn load(path: &Path) -> Result<(Vec<LogRecord>, u64), LogError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut valid_len: u64 = 0;
        let mut line = String::new();
        let mut line_no: usize = 0;

        loop {
            line.clear();
            let consumed = reader.read_line(&mut line)?;
            if consumed == 0 {
                break;
            }
            line_no += 1;
            if line.trim().is_empty() {
                valid_len += consumed as u64;
                continue;
            }
            match serde_json::from_str::<LogRecord>(line.trim_end()) {
                Ok(record) => {
                    records.push(record);
                    valid_len += consumed as u64;
                }
                Err(e) => {
                    // A torn trailing line from a crash mid-write; everything
                    // before it is intact and an acked offset is never torn.
                    warn!(line = line_no, error = %e, "Stopping load at unparsable log line");
                    break;
                }
            }
        }
        Ok((records, valid_len))
    }

    /// Drop any torn tail so the append handle starts on a clean line.
    fn truncate_to(path: &Path, valid_len: u64) -> Result<(), LogError> {
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if file.metadata()?.len() > valid_len {
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(())
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Whether the log holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Explicit, audited retention trim: drop records with offsets below
    /// `before_offset` and compact the file.
    ///
    /// Offsets of surviving records are unchanged and trimmed offsets are
    /// never reassigned. Returns the number of records removed.
    pub fn trim_before(&self, before_offset: u64) -> Result<usize, LogError> {
        let mut inner = self.inner.lock();

        let keep_from = inner.records.partition_point(|r| r.offset < before_offset);
        if keep_from == 0 {
            return Ok(0);
        }
        let removed: Vec<u64> = inner.records.drain(..keep_from).map(|r| r.offset).collect();

        // Rewrite atomically via temp file, then swap the append handle.
        let temp_path = self.log_path.with_extension("tmp");
        {
            let mut temp = BufWriter::new(File::create(&temp_path)?);
            for record in &inner.records {
                serde_json::to_writer(&mut temp, record)?;
                temp.write_all(b"\n")?;
            }
            temp.flush()?;
            temp.get_ref().sync_all()?;
        }
        std::fs::rename(&temp_path, &self.log_path)?;
        inner.writer = BufWriter::new(
            OpenOptions::new().create(true).append(true).open(&self.log_path)?,
        );

        warn!(
            removed = removed.len(),
            first = removed.first().copied(),
            last = removed.last().copied(),
            before_offset,
            "Retention trim removed log records"
        );
        Ok(removed.len())
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn append(&self, event: Event) -> Result<u64, LogError> {
        let mut inner = self.inner.lock();
        let offset = inner.next_offset;
        let record = LogRecord { offset, event };

        let line = serde_json::to_string(&record)?;
        inner.writer.write_all(line.as_bytes())?;
        inner.writer.write_all(b"\n")?;
        inner.writer.flush()?;
        inner.writer.get_ref().sync_data()?;

        inner.records.push(record);
        inner.next_offset = offset + 1;
        Ok(offset)
    }

    async fn read(&self, from_offset: u64, limit: usize) -> Result<Vec<LogRecord>, LogError> {
        let inner = self.inner.lock();
        let start = inner.records.partition_point(|r| r.offset < from_offset);
        if start >= inner.records.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(limit).min(inner.records.len());
        Ok(inner.records[start..end].to_vec())
    }

    async fn history(&self, query: HistoryQuery) -> Result<HistoryPage, LogError> {
        let inner = self.inner.lock();
        Ok(filter_history(&inner.records, &query, DEFAULT_HISTORY_LIMIT))
    }

    async fn latest_offset(&self) -> Result<Option<u64>, LogError> {
        let inner = self.inner.lock();
        Ok(inner.records.last().map(|r| r.offset))
    }
}
