//! On-disk layout of every per-app artifact.
//!
//! ```text
//! <state_dir>/
//!   progress.json                  global progress record
//!   progress_<app>.json            per-app progress record
//!   cancel.flag / cancel_<app>.flag
//!   data/data_per_app/<app>.csv    scraped reviews
//!   models/<app>_lda.json          best fitted model
//!   charts/<app>/chart_data.json
//!   charts/<app>/chart_analysis.json
//!   charts/<app>/metadata.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::catalog::AppId;
use crate::errors::StoreError;

pub const CHART_DATA_FILE: &str = "chart_data.json";
pub const CHART_ANALYSIS_FILE: &str = "chart_analysis.json";
pub const CHART_METADATA_FILE: &str = "metadata.json";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Resolves artifact paths under one state directory.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Progress record for `app`, or the global record.
    pub fn progress_file(&self, app: Option<&AppId>) -> PathBuf {
        match app {
            Some(app) => self.root.join(format!("progress_{}.json", app)),
            None => self.root.join("progress.json"),
        }
    }

    /// Cancellation marker for `app`, or the global marker.
    pub fn cancel_file(&self, app: Option<&AppId>) -> PathBuf {
        match app {
            Some(app) => self.root.join(format!("cancel_{}.flag", app)),
            None => self.root.join("cancel.flag"),
        }
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join("data").join("data_per_app")
    }

    pub fn dataset_file(&self, app: &AppId) -> PathBuf {
        self.dataset_dir().join(format!("{}.csv", app))
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn model_file(&self, app: &AppId) -> PathBuf {
        self.models_dir().join(format!("{}_lda.json", app))
    }

    pub fn chart_dir(&self, app: &AppId) -> PathBuf {
        self.root.join("charts").join(app.as_str())
    }

    /// Delete every artifact of `app` so the next run starts clean.
    ///
    /// Returns the paths that were actually removed, relative to the state
    /// directory. Missing files are not an error, so a second call returns an
    /// empty list.
    pub fn purge(&self, app: &AppId) -> Result<Vec<String>, StoreError> {
        let chart_dir = self.chart_dir(app);
        let candidates = [
            self.dataset_file(app),
            self.model_file(app),
            self.progress_file(Some(app)),
            self.cancel_file(Some(app)),
            chart_dir.join(CHART_DATA_FILE),
            chart_dir.join(CHART_ANALYSIS_FILE),
            chart_dir.join(CHART_METADATA_FILE),
        ];

        let mut deleted = Vec::new();
        for path in candidates {
            if remove_if_exists(&path)? {
                debug!(app = %app, path = %path.display(), "deleted artifact");
                deleted.push(self.display_path(&path));
            }
        }

        // Only an empty chart directory is removed; anything else stays.
        if chart_dir.is_dir()
            && let Err(e) = std::fs::remove_dir(&chart_dir)
        {
            warn!(app = %app, error = %e, "chart directory not removed");
        }

        Ok(deleted)
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Remove `path`; `Ok(false)` when it did not exist.
pub fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StoreError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write `contents` to a sibling temp file and rename it into place, so
/// readers see either the old or the new file, never a partial one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.{}.tmp", std::process::id(), seq));
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn app(slug: &str) -> AppId {
        AppId::parse(slug).unwrap()
    }

    #[test]
    fn test_paths_are_keyed_by_app() {
        let layout = ArtifactLayout::new("/state");
        let demo = app("demo");
        assert_eq!(
            layout.progress_file(Some(&demo)),
            PathBuf::from("/state/progress_demo.json")
        );
        assert_eq!(layout.progress_file(None), PathBuf::from("/state/progress.json"));
        assert_eq!(layout.cancel_file(Some(&demo)), PathBuf::from("/state/cancel_demo.flag"));
        assert_eq!(layout.cancel_file(None), PathBuf::from("/state/cancel.flag"));
        assert_eq!(
            layout.model_file(&demo),
            PathBuf::from("/state/models/demo_lda.json")
        );
        assert_eq!(
            layout.dataset_file(&demo),
            PathBuf::from("/state/data/data_per_app/demo.csv")
        );
        assert_eq!(layout.chart_dir(&demo), PathBuf::from("/state/charts/demo"));
    }

    #[test]
    fn test_purge_removes_everything_for_app_only() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let demo = app("demo");
        let other = app("other");

        for path in [
            layout.dataset_file(&demo),
            layout.model_file(&demo),
            layout.progress_file(Some(&demo)),
            layout.cancel_file(Some(&demo)),
            layout.chart_dir(&demo).join(CHART_DATA_FILE),
            layout.model_file(&other),
        ] {
            write_atomic(&path, b"{}").unwrap();
        }

        let deleted = layout.purge(&demo).unwrap();
        assert_eq!(deleted.len(), 5);
        assert!(deleted.contains(&"models/demo_lda.json".to_string()));
        assert!(!layout.chart_dir(&demo).exists());
        assert!(layout.model_file(&other).exists());
    }

    #[test]
    fn test_purge_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let demo = app("demo");
        write_atomic(&layout.progress_file(Some(&demo)), b"{}").unwrap();

        assert_eq!(layout.purge(&demo).unwrap().len(), 1);
        assert!(layout.purge(&demo).unwrap().is_empty());
        assert!(layout.purge(&demo).unwrap().is_empty());
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("record.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers = std::fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
