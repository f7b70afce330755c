//! Typed error hierarchy for the studio.
//!
//! Three top-level enums cover the three subsystems:
//! - `StoreError`: progress, cancel-marker and artifact file I/O
//! - `TrainingError`: failures inside a background training job
//! - `StudioError`: admission, lookup and orchestration failures

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the file-backed stores (progress records, cancel markers, artifacts).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised inside a training job. They never leave the job's task: the
/// job turns them into a failed progress record.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Data untuk {app} tidak tersedia: {reason}")]
    DataUnavailable { app: String, reason: String },

    #[error("Scraping gagal: {0}")]
    Scrape(String),

    #[error("Preprocessing gagal: {0}")]
    Preprocessing(String),

    #[error("Tidak ada model yang berhasil ditraining")]
    NoModelTrained,

    #[error("Gagal menyimpan model: {0}")]
    Persist(#[source] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the coordinator and the request surface.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Invalid app id '{0}': only lowercase letters, digits and '-' are allowed")]
    InvalidAppId(String),

    #[error("Aplikasi '{0}' tidak ditemukan.")]
    UnknownApp(String),

    #[error("Training registry lock poisoned")]
    LockPoisoned,

    #[error("Training gagal dimulai: {0}")]
    StartFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
