//! File-backed progress records.
//!
//! Each app has its own `progress_<app>.json`; the global slot is
//! `progress.json`. Writers are serialized by one mutex and land through an
//! atomic rename. Readers take no lock and may see a slightly stale record.

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::AppId;
use crate::errors::StoreError;
use crate::layout::{ArtifactLayout, remove_if_exists, write_atomic};

pub const READY_DESCRIPTION: &str = "Siap untuk training";
pub const READ_ERROR_DESCRIPTION: &str = "Error reading progress";
pub const GLOBAL_SLOT: &str = "global";

/// Last reported state of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub percent: f64,
    #[serde(default)]
    pub description: String,
    /// Kept as written; see [`ProgressRecord::parsed_timestamp`].
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
}

impl ProgressRecord {
    pub fn new(
        app: Option<&AppId>,
        percent: f64,
        description: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            percent,
            description: description.into(),
            timestamp: Some(at.to_rfc3339()),
            app_name: Some(slot_name(app)),
        }
    }

    /// Parse the timestamp. RFC 3339 is what this crate writes; naive ISO
    /// timestamps (no offset) are read as local time.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|ts| ts.with_timezone(&Utc))
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

fn slot_name(app: Option<&AppId>) -> String {
    app.map(|a| a.to_string())
        .unwrap_or_else(|| GLOBAL_SLOT.to_string())
}

/// Reads and writes progress records for all apps.
pub struct ProgressStore {
    layout: ArtifactLayout,
    write_lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self {
            layout,
            write_lock: Mutex::new(()),
        }
    }

    /// Record `percent` / `description` stamped with the current time.
    ///
    /// Failures are logged and swallowed: a job must never die because its
    /// progress could not be written.
    pub fn write(&self, app: Option<&AppId>, percent: f64, description: &str) {
        let record = ProgressRecord::new(app, percent, description, Utc::now());
        match self.write_record(app, &record) {
            Ok(()) => debug!(app = %slot_name(app), percent, description, "progress"),
            Err(e) => warn!(app = %slot_name(app), error = %e, "failed to write progress"),
        }
    }

    /// Persist an explicit record.
    pub fn write_record(
        &self,
        app: Option<&AppId>,
        record: &ProgressRecord,
    ) -> Result<(), StoreError> {
        let path = self.layout.progress_file(app);
        let bytes = serde_json::to_vec(record).map_err(|source| StoreError::Malformed {
            path: path.clone(),
            source,
        })?;
        // A poisoned lock only means another writer panicked mid-write; the
        // rename keeps the file consistent either way.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        write_atomic(&path, &bytes)
    }

    /// Last written record; `Ok(None)` when the slot has never been written.
    pub fn try_read(&self, app: Option<&AppId>) -> Result<Option<ProgressRecord>, StoreError> {
        let path = self.layout.progress_file(app);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        let record = serde_json::from_str(&content)
            .map_err(|source| StoreError::Malformed { path, source })?;
        Ok(Some(record))
    }

    /// Last written record, or a placeholder. Never fails.
    pub fn read(&self, app: Option<&AppId>) -> ProgressRecord {
        match self.try_read(app) {
            Ok(Some(mut record)) => {
                if record.timestamp.is_none() {
                    record.timestamp = Some(Utc::now().to_rfc3339());
                }
                if record.app_name.is_none() {
                    record.app_name = Some(slot_name(app));
                }
                record
            }
            Ok(None) => ProgressRecord::new(app, 0.0, READY_DESCRIPTION, Utc::now()),
            Err(e) => {
                warn!(app = %slot_name(app), error = %e, "failed to read progress");
                ProgressRecord::new(app, 0.0, READ_ERROR_DESCRIPTION, Utc::now())
            }
        }
    }

    /// Reset the slot to the ready state.
    pub fn reset(&self, app: Option<&AppId>) -> Result<(), StoreError> {
        let record = ProgressRecord::new(app, 0.0, READY_DESCRIPTION, Utc::now());
        self.write_record(app, &record)
    }

    pub fn exists(&self, app: Option<&AppId>) -> bool {
        self.layout.progress_file(app).exists()
    }

    pub fn remove(&self, app: Option<&AppId>) -> Result<bool, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        remove_if_exists(&self.layout.progress_file(app))
    }
}
