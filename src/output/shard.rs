//! Rotating shard files
//!
//! A shard is a pseudo JSON array: `[` when opened, `,` between records, `]`
//! when finalized. Only finalized shards are valid JSON documents.

use crate::{HarvestError, Result};
use chrono::{Local, NaiveDate};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const INITIATOR: &[u8] = b"[";
const SEPARATOR: &[u8] = b",";
const TERMINATOR: &[u8] = b"]";

type Clock = Box<dyn Fn() -> NaiveDate + Send>;

/// The shard currently accepting appends
#[derive(Debug)]
struct OpenShard {
    path: PathBuf,
    file: File,
    bytes: u64,
    records: u64,
}

/// Owns the current shard of one data directory
///
/// Not thread-safe by itself; the output store confines it to a single
/// worker so appends and finalization never interleave.
pub struct ShardWriter {
    dir: PathBuf,
    max_bytes: u64,
    max_daily: u32,
    today: Clock,
    current: Option<OpenShard>,
}

impl ShardWriter {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64, max_daily: u32) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
            max_daily,
            today: Box::new(|| Local::now().date_naive()),
            current: None,
        }
    }

    /// Replaces the date source used to name shards
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    /// Path of the open shard, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|shard| shard.path.as_path())
    }

    /// Returns the shard to write to, rotating or opening one as needed
    ///
    /// A shard whose size has grown past the byte cap is finalized and
    /// replaced by the next free name for today.
    pub fn current_shard(&mut self) -> Result<&Path> {
        let needs_rotation = self
            .current
            .as_ref()
            .map_or(true, |shard| shard.bytes > self.max_bytes);

        if needs_rotation {
            if let Some(path) = self.finalize()? {
                tracing::info!("Rotated shard {}", path.display());
            }
            let shard = self.open_next()?;
            tracing::info!("Opened shard {}", shard.path.display());
            self.current = Some(shard);
        }

        match self.current.as_ref() {
            Some(shard) => Ok(shard.path.as_path()),
            None => Err(HarvestError::WorkerClosed),
        }
    }

    /// Appends one serialized record and returns the shard it landed in
    ///
    /// A failed write leaves the shard in an unknown state, so it is
    /// abandoned unterminated and the next append opens a fresh one.
    pub fn append(&mut self, record_json: &str) -> Result<PathBuf> {
        self.current_shard()?;

        let shard = self.current.as_mut().ok_or(HarvestError::WorkerClosed)?;
        let mut buf = Vec::with_capacity(SEPARATOR.len() + record_json.len());
        if shard.records > 0 {
            buf.extend_from_slice(SEPARATOR);
        }
        buf.extend_from_slice(record_json.as_bytes());

        if let Err(e) = shard.file.write_all(&buf) {
            tracing::error!("Abandoning shard {} after failed write: {}", shard.path.display(), e);
            self.current = None;
            return Err(e.into());
        }

        shard.bytes += buf.len() as u64;
        shard.records += 1;
        Ok(shard.path.clone())
    }

    /// Terminates the open shard, if any, making it a complete document
    pub fn finalize(&mut self) -> Result<Option<PathBuf>> {
        let Some(mut shard) = self.current.take() else {
            return Ok(None);
        };

        shard.file.write_all(TERMINATOR)?;
        shard.file.sync_all()?;
        tracing::debug!(
            "Finalized shard {} ({} records, {} bytes)",
            shard.path.display(),
            shard.records,
            shard.bytes + TERMINATOR.len() as u64
        );
        Ok(Some(shard.path))
    }

    /// Creates the first free `YYYY_MM_DD_<n>.json` for today
    fn open_next(&self) -> Result<OpenShard> {
        let date = (self.today)();
        let stem = date.format("%Y_%m_%d").to_string();

        for n in 1..=self.max_daily {
            let path = self.dir.join(format!("{}_{}.json", stem, n));
            let mut file = match OpenOptions::new().append(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(INITIATOR)?;
            return Ok(OpenShard {
                path,
                file,
                bytes: INITIATOR.len() as u64,
                records: 0,
            });
        }

        tracing::error!(
            "No free output shard left for {} (limit {})",
            date,
            self.max_daily
        );
        Err(HarvestError::ShardCapacity {
            date: date.to_string(),
            max: self.max_daily,
        })
    }
}

impl Drop for ShardWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::error!("Failed to finalize shard on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn fixed_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip_in_append_order() {
        let dir = tempdir().unwrap();
        let mut writer = ShardWriter::new(dir.path(), 1024 * 1024, 5).with_clock(fixed_date);

        for i in 0..3 {
            writer.append(&json!({ "n": i }).to_string()).unwrap();
        }
        let path = writer.finalize().unwrap().unwrap();

        assert_eq!(path, dir.path().join("2024_03_09_1.json"));
        assert_eq!(read_json(&path), json!([{ "n": 0 }, { "n": 1 }, { "n": 2 }]));
    }

    #[test]
    fn test_in_progress_shard_is_not_a_document() {
        let dir = tempdir().unwrap();
        let mut writer = ShardWriter::new(dir.path(), 1024, 5).with_clock(fixed_date);
        let path = writer.append(r#"{"a":1}"#).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"[{"a":1}"#);
        assert!(serde_json::from_str::<Value>(&raw).is_err());
    }

    #[test]
    fn test_rotation_after_size_cap_exceeded() {
        let dir = tempdir().unwrap();
        let mut writer = ShardWriter::new(dir.path(), 10, 5).with_clock(fixed_date);

        // "[" + 8 bytes = 9, still under the cap
        let first = writer.append(r#"{"a":12}"#).unwrap();
        // 9 + "," + 8 = 18 > 10
        let second = writer.append(r#"{"b":34}"#).unwrap();
        assert_eq!(first, second);

        let third = writer.append(r#"{"c":56}"#).unwrap();
        assert_ne!(second, third);
        assert_eq!(third, dir.path().join("2024_03_09_2.json"));

        // The rotated shard was terminated exactly once
        let old = std::fs::read_to_string(&first).unwrap();
        assert_eq!(old.matches(']').count(), 1);
        assert_eq!(read_json(&first), json!([{ "a": 12 }, { "b": 34 }]));

        writer.finalize().unwrap();
        assert_eq!(read_json(&third), json!([{ "c": 56 }]));
    }

    #[test]
    fn test_existing_shards_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("2024_03_09_1.json"), "[]").unwrap();

        let mut writer = ShardWriter::new(dir.path(), 1024, 5).with_clock(fixed_date);
        let path = writer.append("{}").unwrap();
        assert_eq!(path, dir.path().join("2024_03_09_2.json"));

        // The pre-existing shard is untouched
        let untouched = std::fs::read_to_string(dir.path().join("2024_03_09_1.json")).unwrap();
        assert_eq!(untouched, "[]");
    }

    #[test]
    fn test_daily_capacity_is_fatal() {
        let dir = tempdir().unwrap();
        for n in 1..=2 {
            std::fs::write(dir.path().join(format!("2024_03_09_{}.json", n)), "[]").unwrap();
        }

        let mut writer = ShardWriter::new(dir.path(), 1024, 2).with_clock(fixed_date);
        let result = writer.append("{}");
        assert!(matches!(
            result,
            Err(HarvestError::ShardCapacity { max: 2, .. })
        ));
    }

    #[test]
    fn test_finalize_without_open_shard_is_noop() {
        let dir = tempdir().unwrap();
        let mut writer = ShardWriter::new(dir.path(), 1024, 2);
        assert!(writer.finalize().unwrap().is_none());
        assert!(writer.current_path().is_none());
    }

    #[test]
    fn test_drop_finalizes() {
        let dir = tempdir().unwrap();
        let path = {
            let mut writer = ShardWriter::new(dir.path(), 1024, 2).with_clock(fixed_date);
            writer.append(r#"{"x":1}"#).unwrap()
        };
        assert_eq!(read_json(&path), json!([{ "x": 1 }]));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_abandons_shard() {
        let dir = tempdir().unwrap();
        let mut writer = ShardWriter::new(dir.path(), 1024, 5).with_clock(fixed_date);
        let broken = dir.path().join("2024_03_09_1.json");
        std::fs::write(&broken, r#"[{"a":1}"#).unwrap();

        // Every write to /dev/full fails with ENOSPC
        writer.current = Some(OpenShard {
            path: broken.clone(),
            file: OpenOptions::new().write(true).open("/dev/full").unwrap(),
            bytes: 8,
            records: 1,
        });

        assert!(writer.append(r#"{"b":2}"#).is_err());
        assert!(writer.current_path().is_none());

        let next = writer.append(r#"{"c":3}"#).unwrap();
        assert_eq!(next, dir.path().join("2024_03_09_2.json"));
        let path = writer.finalize().unwrap().unwrap();
        assert_eq!(read_json(&path), json!([{ "c": 3 }]));
        assert_eq!(std::fs::read_to_string(&broken).unwrap(), r#"[{"a":1}"#);
    }
}
