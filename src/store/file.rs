//! Keyed line-file store with copy-and-splice upsert
//!
//! Updates never rewrite a line in place. Instead the whole store is copied
//! into a scratch file, the target file is truncated, and the bytes are
//! copied back with the matched line replaced (or the new line appended).
//! That sidesteps variable-length in-place edits entirely, at O(file size)
//! cost per update, which is fine for a file that holds a handful of lines.
//!
//! Callers must hold the single-writer role; the coordinator is the only
//! task that mutates the store or its scratch companion.

use super::record::SlotRecord;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Byte span of one matched line: `start` is the line's first byte,
/// `end` is one past its terminating newline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: u64,
    pub end: u64,
}

/// The persistent record store and its scratch file
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    temp_path: PathBuf,
}

impl RecordStore {
    /// Open (creating if absent) the store at `path`; the scratch file lives
    /// alongside it with a `.tmp` suffix and is reused across upserts.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");
        let store = Self {
            path,
            temp_path: PathBuf::from(temp_path),
        };
        if !store.path.exists() {
            File::create(&store.path)
                .map_err(|e| Error::Store(format!("create {}: {}", store.path.display(), e)))?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locate the first line containing `key` as a substring.
    ///
    /// Returns the line's byte span, or `None` when end-of-file is reached
    /// without a match.
    pub fn find(&self, key: &str) -> Result<Option<LineSpan>> {
        let file = File::open(&self.path)
            .map_err(|e| Error::Store(format!("open {}: {}", self.path.display(), e)))?;
        find_line(BufReader::new(file), key)
    }

    /// Insert-or-replace the line for `key`.
    ///
    /// The current file is snapshotted byte-for-byte into the scratch file,
    /// the store is truncated, and the scratch contents are spliced back
    /// with `line` substituted at the matched position (or appended).
    pub fn upsert(&self, key: &str, line: &str) -> Result<()> {
        if !line.ends_with('\n') {
            return Err(Error::Store(format!(
                "record line for {:?} is not newline-terminated",
                key
            )));
        }

        self.snapshot_to_temp()?;

        let span = {
            let temp = File::open(&self.temp_path)
                .map_err(|e| Error::Store(format!("open {}: {}", self.temp_path.display(), e)))?;
            find_line(BufReader::new(temp), key)?
        };

        let mut temp = File::open(&self.temp_path)
            .map_err(|e| Error::Store(format!("open {}: {}", self.temp_path.display(), e)))?;
        let mut target = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| Error::Store(format!("truncate {}: {}", self.path.display(), e)))?;

        match span {
            None => {
                // New key: replay the snapshot, then append
                copy_all(&mut temp, &mut target)?;
                target
                    .write_all(line.as_bytes())
                    .map_err(|e| Error::Store(format!("append: {}", e)))?;
                debug!("Appended record for {:?}", key);
            }
            Some(span) => {
                // Existing key: splice the new line over [start, end)
                copy_exact(&mut temp, &mut target, span.start)?;
                target
                    .write_all(line.as_bytes())
                    .map_err(|e| Error::Store(format!("splice: {}", e)))?;
                temp.seek(SeekFrom::Start(span.end))
                    .map_err(|e| Error::Store(format!("seek {}: {}", self.temp_path.display(), e)))?;
                copy_all(&mut temp, &mut target)?;
                debug!("Replaced record for {:?} at offset {}", key, span.start);
            }
        }

        target
            .flush()
            .map_err(|e| Error::Store(format!("flush {}: {}", self.path.display(), e)))?;
        Ok(())
    }

    /// Re-parse every persisted record, skipping malformed lines
    pub fn load_records(&self) -> Result<Vec<SlotRecord>> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Store(format!("read {}: {}", self.path.display(), e)))?;
        let mut records = Vec::new();
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            match SlotRecord::parse_line(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed record line: {}", e),
            }
        }
        Ok(records)
    }

    /// Fetch one record by key, if present and well-formed
    pub fn get(&self, key: &str) -> Result<Option<SlotRecord>> {
        Ok(self
            .load_records()?
            .into_iter()
            .find(|r| r.location.contains(key)))
    }

    /// Copy the current store byte-for-byte into the scratch file
    fn snapshot_to_temp(&self) -> Result<()> {
        let mut source = File::open(&self.path)
            .map_err(|e| Error::Store(format!("open {}: {}", self.path.display(), e)))?;
        let mut temp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| Error::Store(format!("create {}: {}", self.temp_path.display(), e)))?;
        copy_all(&mut source, &mut temp)?;
        temp.flush()
            .map_err(|e| Error::Store(format!("flush {}: {}", self.temp_path.display(), e)))?;
        Ok(())
    }
}

/// Scan for the first line containing `key`, tracking byte offsets
fn find_line(mut reader: impl BufRead, key: &str) -> Result<Option<LineSpan>> {
    let mut offset: u64 = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| Error::Store(format!("scan: {}", e)))?;
        if n == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        if line.contains(key) {
            return Ok(Some(LineSpan {
                start: offset,
                end: offset + n as u64,
            }));
        }
        offset += n as u64;
    }
}

/// Copy exactly `len` bytes, treating a short copy as fatal.
///
/// `io::copy` retries interrupted reads and writes internally.
fn copy_exact(source: &mut impl Read, target: &mut impl Write, len: u64) -> Result<()> {
    let copied = io::copy(&mut source.take(len), target)
        .map_err(|e| Error::Store(format!("copy: {}", e)))?;
    if copied != len {
        return Err(Error::Store(format!(
            "short copy: expected {} bytes, copied {}",
            len, copied
        )));
    }
    Ok(())
}

/// Copy from the source's current position to end-of-file
fn copy_all(source: &mut impl Read, target: &mut impl Write) -> Result<()> {
    io::copy(source, target).map_err(|e| Error::Store(format!("copy: {}", e)))?;
    Ok(())
}
