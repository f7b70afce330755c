//! Per-app chart cache under `charts/<app>/`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::AppId;
use crate::charts::{ChartAnalysis, ChartData};
use crate::errors::StoreError;
use crate::layout::{
    ArtifactLayout, CHART_ANALYSIS_FILE, CHART_DATA_FILE, CHART_METADATA_FILE, remove_if_exists,
    write_atomic,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartMetadata {
    pub app_name: String,
    pub created_at: DateTime<Utc>,
    pub chart_data_size: usize,
    pub analysis_sections: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChartStore {
    layout: ArtifactLayout,
}

impl ChartStore {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    pub fn exists(&self, app: &AppId) -> bool {
        let dir = self.layout.chart_dir(app);
        dir.join(CHART_DATA_FILE).exists() && dir.join(CHART_ANALYSIS_FILE).exists()
    }

    pub fn save(
        &self,
        app: &AppId,
        data: &ChartData,
        analysis: &ChartAnalysis,
    ) -> Result<(), StoreError> {
        let dir = self.layout.chart_dir(app);
        let data_bytes = to_pretty(&dir.join(CHART_DATA_FILE), data)?;
        let chart_data_size = data_bytes.len();
        write_atomic(&dir.join(CHART_DATA_FILE), &data_bytes)?;
        write_atomic(
            &dir.join(CHART_ANALYSIS_FILE),
            &to_pretty(&dir.join(CHART_ANALYSIS_FILE), analysis)?,
        )?;

        let metadata = ChartMetadata {
            app_name: app.to_string(),
            created_at: Utc::now(),
            chart_data_size,
            analysis_sections: ChartAnalysis::section_names(),
        };
        write_atomic(
            &dir.join(CHART_METADATA_FILE),
            &to_pretty(&dir.join(CHART_METADATA_FILE), &metadata)?,
        )?;
        info!(app = %app, "chart data saved");
        Ok(())
    }

    /// Cached charts, or `None` when either file is missing or unreadable.
    pub fn load(&self, app: &AppId) -> Option<(ChartData, ChartAnalysis)> {
        if !self.exists(app) {
            return None;
        }
        let dir = self.layout.chart_dir(app);
        let loaded = read_json::<ChartData>(&dir.join(CHART_DATA_FILE)).and_then(|data| {
            read_json::<ChartAnalysis>(&dir.join(CHART_ANALYSIS_FILE)).map(|a| (data, a))
        });
        match loaded {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!(app = %app, error = %e, "ignoring unreadable chart cache");
                None
            }
        }
    }

    pub fn metadata(&self, app: &AppId) -> Option<ChartMetadata> {
        let path = self.layout.chart_dir(app).join(CHART_METADATA_FILE);
        if !path.exists() {
            return None;
        }
        read_json(&path).ok()
    }

    /// Delete the cached files; returns the names of those removed.
    pub fn delete(&self, app: &AppId) -> Result<Vec<String>, StoreError> {
        let dir = self.layout.chart_dir(app);
        let mut deleted = Vec::new();
        for name in [CHART_DATA_FILE, CHART_ANALYSIS_FILE, CHART_METADATA_FILE] {
            if remove_if_exists(&dir.join(name))? {
                deleted.push(name.to_string());
            }
        }
        if dir.is_dir() {
            let _ = std::fs::remove_dir(&dir);
        }
        Ok(deleted)
    }
}

fn to_pretty<T: Serialize>(path: &std::path::Path, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &std::path::Path) -> Result<T, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
