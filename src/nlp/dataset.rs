//! Review datasets cached as CSV under `data/data_per_app/`.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::{AppEntry, AppId};
use crate::errors::TrainingError;
use crate::layout::{ArtifactLayout, write_atomic};
use crate::nlp::ReviewSource;
use crate::training::progress::ProgressStore;

/// One scraped review. Extra CSV columns are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub at: String,
}

pub fn read_reviews(path: &Path) -> anyhow::Result<Vec<Review>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reviews = Vec::new();
    for row in reader.deserialize() {
        let review: Review =
            row.with_context(|| format!("Malformed row in {}", path.display()))?;
        reviews.push(review);
    }
    Ok(reviews)
}

pub fn write_reviews(path: &Path, reviews: &[Review]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for review in reviews {
        writer.serialize(review)?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV buffer")?;
    write_atomic(path, &bytes)?;
    Ok(())
}

/// Loads the cached dataset, scraping it first when absent.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    layout: ArtifactLayout,
}

impl DatasetLoader {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    /// Cached reviews for `app`, if the CSV exists.
    pub fn cached(&self, app: &AppId) -> anyhow::Result<Option<Vec<Review>>> {
        let path = self.layout.dataset_file(app);
        if !path.exists() {
            return Ok(None);
        }
        read_reviews(&path).map(Some)
    }

    /// Reviews for `app`, reporting progress between 2 % and 10 %.
    pub async fn load(
        &self,
        app: &AppId,
        entry: &AppEntry,
        source: &dyn ReviewSource,
        limit: usize,
        progress: &ProgressStore,
    ) -> Result<Vec<Review>, TrainingError> {
        let path = self.layout.dataset_file(app);
        if path.exists() {
            progress.write(Some(app), 2.0, &format!("Memuat data {} dari file...", app));
            progress.write(Some(app), 5.0, &format!("Membaca file {}...", app));
            let reviews = read_reviews(&path).map_err(|e| TrainingError::DataUnavailable {
                app: app.to_string(),
                reason: format!("gagal membaca {}.csv: {:#}", app, e),
            })?;
            if reviews.is_empty() {
                return Err(TrainingError::DataUnavailable {
                    app: app.to_string(),
                    reason: format!("file {}.csv kosong", app),
                });
            }
            progress.write(
                Some(app),
                10.0,
                &format!("Data {} berhasil dimuat ({} reviews)", app, reviews.len()),
            );
            return Ok(reviews);
        }

        progress.write(
            Some(app),
            2.0,
            &format!("Data tidak ditemukan, mulai scraping {}...", app),
        );
        let report = |fetched: usize, total: usize| {
            if total > 0 {
                let percent = scrape_percent(fetched, total);
                progress.write(
                    Some(app),
                    percent,
                    &format!("Scraping {}: {}/{} reviews", app, fetched, total),
                );
            }
        };
        let reviews = source.fetch(entry, limit, &report).await?;
        if reviews.is_empty() {
            return Err(TrainingError::DataUnavailable {
                app: app.to_string(),
                reason: "scraping tidak menghasilkan review".to_string(),
            });
        }

        progress.write(
            Some(app),
            SCRAPE_DONE_PERCENT,
            &format!("Scraping selesai, menyimpan data {}...", app),
        );
        if let Err(e) = write_reviews(&path, &reviews) {
            // Training can go on from memory; the next run scrapes again.
            warn!(app = %app, error = %e, "failed to cache scraped reviews");
        }
        info!(app = %app, reviews = reviews.len(), "scraped dataset");
        progress.write(Some(app), 10.0, &format!("Data {} berhasil disimpan", app));
        Ok(reviews)
    }
}

/// Fetch progress maps onto 2 %..=8 %, leaving room for the save step.
const SCRAPE_DONE_PERCENT: f64 = 8.0;

fn scrape_percent(fetched: usize, total: usize) -> f64 {
    2.0 + (SCRAPE_DONE_PERCENT - 2.0) * (fetched.min(total) as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::FetchProgress;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct CannedSource {
        reviews: Vec<Review>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ReviewSource for CannedSource {
        async fn fetch(
            &self,
            _app: &AppEntry,
            limit: usize,
            on_progress: FetchProgress<'_>,
        ) -> Result<Vec<Review>, TrainingError> {
            *self.calls.lock().unwrap() += 1;
            on_progress(self.reviews.len(), limit);
            Ok(self.reviews.clone())
        }
    }

    fn review(content: &str) -> Review {
        Review {
            content: content.to_string(),
            score: Some(4),
            at: "2024-05-01 10:00:00".to_string(),
        }
    }

    fn entry() -> AppEntry {
        crate::catalog::default_apps().remove(0)
    }

    #[test]
    fn test_reads_csv_with_extra_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spotify.csv");
        std::fs::write(
            &path,
            "reviewId,content,score,at\nr1,great music,5,2024-01-01\nr2,,1,2024-01-02\n",
        )
        .unwrap();
        let reviews = read_reviews(&path).unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].content, "great music");
        assert_eq!(reviews[1].content, "");
        assert_eq!(reviews[1].score, Some(1));
    }

    #[tokio::test]
    async fn test_scrapes_once_then_uses_cache() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let loader = DatasetLoader::new(layout.clone());
        let progress = ProgressStore::new(layout.clone());
        let app = AppId::parse("spotify").unwrap();
        let source = CannedSource {
            reviews: vec![review("love the playlists"), review("too many ads")],
            calls: Mutex::new(0),
        };

        let first = loader
            .load(&app, &entry(), &source, 10, &progress)
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert!(layout.dataset_file(&app).exists());
        assert_eq!(progress.read(Some(&app)).percent, 10.0);

        let second = loader
            .load(&app, &entry(), &source, 10, &progress)
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(*source.calls.lock().unwrap(), 1);
        assert_eq!(loader.cached(&app).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_scrape_progress_stays_below_save_step() {
        assert_eq!(scrape_percent(0, 200), 2.0);
        assert_eq!(scrape_percent(100, 200), 5.0);
        assert_eq!(scrape_percent(200, 200), SCRAPE_DONE_PERCENT);
        assert_eq!(scrape_percent(500, 200), SCRAPE_DONE_PERCENT);
    }

    #[tokio::test]
    async fn test_empty_scrape_is_data_unavailable() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let loader = DatasetLoader::new(layout.clone());
        let progress = ProgressStore::new(layout);
        let app = AppId::parse("spotify").unwrap();
        let source = CannedSource {
            reviews: Vec::new(),
            calls: Mutex::new(0),
        };

        let err = loader
            .load(&app, &entry(), &source, 10, &progress)
            .await
            .unwrap_err();
        assert!(matches!(err, TrainingError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_csv_is_data_unavailable() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let app = AppId::parse("spotify").unwrap();
        write_atomic(&layout.dataset_file(&app), b"content,score,at\n").unwrap();
        let loader = DatasetLoader::new(layout.clone());
        let progress = ProgressStore::new(layout);
        let source = CannedSource {
            reviews: vec![review("unused")],
            calls: Mutex::new(0),
        };

        let err = loader
            .load(&app, &entry(), &source, 10, &progress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("kosong"));
        assert_eq!(*source.calls.lock().unwrap(), 0);
    }
}
