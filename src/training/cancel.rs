//! Cooperative cancellation markers.
//!
//! A cancel request only drops a `cancel_<app>.flag` file; the running job
//! notices it at its next checkpoint.

use crate::catalog::AppId;
use crate::errors::StoreError;
use crate::layout::{ArtifactLayout, remove_if_exists, write_atomic};

#[derive(Debug, Clone)]
pub struct CancelSignal {
    layout: ArtifactLayout,
}

impl CancelSignal {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    /// Raise the marker. Raising it twice is harmless.
    pub fn request_cancel(&self, app: Option<&AppId>) -> Result<(), StoreError> {
        write_atomic(&self.layout.cancel_file(app), b"cancelled")
    }

    pub fn is_cancelled(&self, app: Option<&AppId>) -> bool {
        self.layout.cancel_file(app).exists()
    }

    /// Drop the marker; `Ok(false)` if there was none.
    pub fn clear(&self, app: Option<&AppId>) -> Result<bool, StoreError> {
        remove_if_exists(&self.layout.cancel_file(app))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_request_is_idempotent_and_scoped_per_app() {
        let dir = tempdir().unwrap();
        let signal = CancelSignal::new(ArtifactLayout::new(dir.path()));
        let demo = AppId::parse("demo").unwrap();
        let other = AppId::parse("other").unwrap();

        assert!(!signal.is_cancelled(Some(&demo)));
        signal.request_cancel(Some(&demo)).unwrap();
        signal.request_cancel(Some(&demo)).unwrap();
        assert!(signal.is_cancelled(Some(&demo)));
        assert!(!signal.is_cancelled(Some(&other)));
        assert!(!signal.is_cancelled(None));
    }

    #[test]
    fn test_clear_reports_whether_marker_existed() {
        let dir = tempdir().unwrap();
        let signal = CancelSignal::new(ArtifactLayout::new(dir.path()));

        signal.request_cancel(None).unwrap();
        assert!(signal.is_cancelled(None));
        assert!(signal.clear(None).unwrap());
        assert!(!signal.clear(None).unwrap());
        assert!(!signal.is_cancelled(None));
    }
}
