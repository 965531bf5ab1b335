use crate::api::Prediction;
use crate::lesion::LesionClass;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Slot file holding the whole history blob, kept apart from any other
/// app-local state.
pub const HISTORY_SLOT: &str = "scan_history.json";

/// Retained record cap; the oldest record is evicted past this.
pub const MAX_HISTORY: usize = 50;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to prepare storage directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write history: {0}")]
    Write(std::io::Error),
    #[error("failed to remove history: {0}")]
    Remove(std::io::Error),
}

/// One completed analysis, immutable once saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: String,
    pub timestamp: String,
    pub image_uri: String,
    pub predicted_class: LesionClass,
    pub confidence: f64,
    pub all_probabilities: BTreeMap<LesionClass, f64>,
}

/// Caller-supplied portion of a record; `id` and `timestamp` are assigned
/// at save time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScan {
    pub image_uri: String,
    pub predicted_class: LesionClass,
    pub confidence: f64,
    pub all_probabilities: BTreeMap<LesionClass, f64>,
}

impl NewScan {
    pub fn from_prediction(image_uri: impl Into<String>, prediction: &Prediction) -> Self {
        Self {
            image_uri: image_uri.into(),
            predicted_class: prediction.predicted_class,
            confidence: prediction.confidence,
            all_probabilities: prediction.all_probabilities.clone(),
        }
    }
}

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

// Millisecond timestamps alone collide for rapid saves; the counter keeps
// ids unique within a process.
fn next_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{millis}-{seq}")
}

/// Durable scan history rooted at a directory, one JSON slot file, newest
/// record first. Reads fail soft; writes propagate.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    slot: PathBuf,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            slot: dir.join(HISTORY_SLOT),
        })
    }

    /// Assign id and timestamp, prepend, truncate to [`MAX_HISTORY`] and
    /// persist the whole sequence. Returns the stored record.
    pub fn save_scan(&self, scan: NewScan) -> Result<ScanRecord, StoreError> {
        let mut history = self.get_history();

        let record = ScanRecord {
            id: next_id(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            image_uri: scan.image_uri,
            predicted_class: scan.predicted_class,
            confidence: scan.confidence,
            all_probabilities: scan.all_probabilities,
        };

        history.insert(0, record.clone());
        history.truncate(MAX_HISTORY);
        self.persist(&history)?;

        Ok(record)
    }

    /// Stored order, newest first. Missing or unreadable slot degrades to
    /// empty; history is best-effort data.
    pub fn get_history(&self) -> Vec<ScanRecord> {
        let data = match fs::read(&self.slot) {
            Ok(data) => data,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_slice(&data) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("unreadable history slot, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Remove the record with the given id; silently a no-op when absent.
    pub fn delete_scan(&self, id: &str) -> Result<(), StoreError> {
        let mut history = self.get_history();
        let before = history.len();
        history.retain(|record| record.id != id);
        if history.len() == before {
            return Ok(());
        }
        self.persist(&history)
    }

    /// Drop the slot entirely.
    pub fn clear_history(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.slot) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Remove(e)),
        }
    }

    // Whole-blob write through a temp file so a failed write never leaves a
    // truncated slot behind.
    fn persist(&self, history: &[ScanRecord]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(history)?;
        let tmp = self.slot.with_extension("json.tmp");
        fs::write(&tmp, &data).map_err(StoreError::Write)?;
        fs::rename(&tmp, &self.slot).map_err(StoreError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_for_rapid_calls() {
        let mut ids: Vec<String> = (0..1000).map(|_| next_id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let record = ScanRecord {
            id: "1-0".into(),
            timestamp: "2026-08-30T12:00:00.000Z".into(),
            image_uri: "file:///tmp/lesion.jpg".into(),
            predicted_class: LesionClass::Normal,
            confidence: 0.95,
            all_probabilities: BTreeMap::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        for field in [
            "id",
            "timestamp",
            "image_uri",
            "predicted_class",
            "confidence",
            "all_probabilities",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }
}
