//! JSON Lines sink and event store.
//!
//! Snapshot files are written to a temporary sibling and renamed into place,
//! so a reader never sees a half-written `entities.jsonl`. The event log is
//! append-only; `seq` is per run and recovered from the file on open.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use ingest_core::{CoreResult, EventStore, GraphSink, GraphSnapshot, RunEvent, RunEventKind};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::config::SinkConfig;
use crate::error::PersistenceError;

pub const ENTITIES_FILE: &str = "entities.jsonl";
pub const RELATIONSHIPS_FILE: &str = "relationships.jsonl";
pub const MAPPED_RELATIONSHIPS_FILE: &str = "mapped_relationships.jsonl";

fn is_retryable(e: &PersistenceError) -> bool {
    matches!(e, PersistenceError::TransientIo(_))
}

/// Retries `f` on transient IO errors, up to `retries` extra attempts with a
/// 15ms, 30ms, 45ms... backoff.
fn with_retry<F, T>(retries: u32, mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < retries => {
                let delay_ms = 15 * u64::from(attempts + 1);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Writes one JSON document per line to `path`, replacing it atomically.
fn write_lines<'a, T, I>(path: &Path, records: I) -> Result<usize, PersistenceError>
    where T: Serialize + 'a,
          I: IntoIterator<Item = &'a T>
{
    let tmp = path.with_extension("jsonl.tmp");
    let mut writer = BufWriter::new(File::create(&tmp)?);
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
        count += 1;
    }
    writer.flush()?;
    fs::rename(&tmp, path)?;
    Ok(count)
}

/// Reads a JSON Lines file back. Blank lines are ignored; a line that does
/// not decode is reported with its position.
pub fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| PersistenceError::Corrupt { path: path.display()
                                                                                                     .to_string(),
                                                                                          line: idx + 1,
                                                                                          reason: e.to_string() })?;
        out.push(record);
    }
    Ok(out)
}

/// Publishes each snapshot under `<output_dir>/<run_id>/`.
#[derive(Debug, Clone)]
pub struct JsonlGraphSink {
    config: SinkConfig,
}

impl JsonlGraphSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }

    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.config.output_dir.join(run_id.to_string())
    }

    fn write_snapshot(&self, snapshot: &GraphSnapshot) -> Result<(), PersistenceError> {
        let dir = self.run_dir(snapshot.run_id);
        let retries = self.config.write_retries;
        with_retry(retries, || fs::create_dir_all(&dir).map_err(PersistenceError::from))?;

        let entities = with_retry(retries, || {
                           write_lines(&dir.join(ENTITIES_FILE),
                                       snapshot.entities.iter().chain(snapshot.mapped_targets.iter()))
                       })?;
        let relationships =
            with_retry(retries, || write_lines(&dir.join(RELATIONSHIPS_FILE), snapshot.all_relationships()))?;
        let mapped = with_retry(retries, || {
                         write_lines(&dir.join(MAPPED_RELATIONSHIPS_FILE), snapshot.mapped_relationships.iter())
                     })?;
        info!("publish:done run_id={} dir={} entities={entities} relationships={relationships} mapped={mapped}",
              snapshot.run_id,
              dir.display());
        Ok(())
    }
}

impl GraphSink for JsonlGraphSink {
    fn publish(&mut self, snapshot: &GraphSnapshot) -> CoreResult<()> {
        debug!("publish:start run_id={}", snapshot.run_id);
        self.write_snapshot(snapshot).map_err(|e| {
                                         error!("publish:error run_id={} err={:?}", snapshot.run_id, e);
                                         e.into()
                                     })
    }
}

/// Append-only event log shared by every run, one `RunEvent` per line.
#[derive(Debug)]
pub struct JsonlEventStore {
    path: PathBuf,
    retries: u32,
    next_seq: HashMap<Uuid, u64>,
}

impl JsonlEventStore {
    /// Opens (or creates) the log at `path`, recovering the next `seq` of
    /// every run already recorded.
    pub fn open(path: impl Into<PathBuf>, retries: u32) -> Result<Self, PersistenceError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut next_seq = HashMap::new();
        if path.exists() {
            for ev in read_lines::<RunEvent>(&path)? {
                let next = next_seq.entry(ev.run_id).or_insert(0);
                *next = (*next).max(ev.seq + 1);
            }
        }
        debug!("event_log:open path={} runs={}", path.display(), next_seq.len());
        Ok(Self { path, retries, next_seq })
    }

    pub fn from_config(config: &SinkConfig) -> Result<Self, PersistenceError> {
        Self::open(config.event_log_path(), config.write_retries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_line(&self, event: &RunEvent) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        with_retry(self.retries, || {
            let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            file.write_all(&line)?;
            Ok(())
        })
    }
}

impl EventStore for JsonlEventStore {
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> CoreResult<RunEvent> {
        let seq = self.next_seq.get(&run_id).copied().unwrap_or(0);
        let event = RunEvent { seq,
                               run_id,
                               kind,
                               ts: Utc::now() };
        self.append_line(&event).map_err(|e| {
                                    error!("append_kind:error run_id={run_id} seq={seq} err={:?}", e);
                                    e
                                })?;
        self.next_seq.insert(run_id, seq + 1);
        Ok(event)
    }

    fn list(&self, run_id: Uuid) -> CoreResult<Vec<RunEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut events: Vec<RunEvent> =
            read_lines::<RunEvent>(&self.path)?.into_iter().filter(|e| e.run_id == run_id).collect();
        events.sort_by_key(|e| e.seq);
        debug!("list:done run_id={run_id} count={}", events.len());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io;

    use super::*;

    #[test]
    fn retry_stops_after_transient_errors_clear() {
        let calls = Cell::new(0);
        let result = with_retry(3, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(io::Error::new(io::ErrorKind::Interrupted, "eintr").into())
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn retry_gives_up_on_permanent_errors() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(3, || {
            calls.set(calls.get() + 1);
            Err(io::Error::new(io::ErrorKind::NotFound, "gone").into())
        });
        assert!(matches!(result, Err(PersistenceError::Io(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(2, || {
            calls.set(calls.get() + 1);
            Err(io::Error::new(io::ErrorKind::WouldBlock, "busy").into())
        });
        assert!(matches!(result, Err(PersistenceError::TransientIo(_))));
        assert_eq!(calls.get(), 3);
    }
}
