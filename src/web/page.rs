//! Data behind the per-app LDA page: dataset preview, topic summary and the
//! cached charts.

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{AppEntry, AppId};
use crate::charts::{ChartAnalysis, ChartData, analyze, build_chart_data};
use crate::errors::StudioError;
use crate::nlp::{DatasetLoader, ModelArtifact, Review};
use crate::training::JobCoordinator;

/// Rows shown at each end of the dataset preview.
pub const PREVIEW_ROWS: usize = 5;
/// Words listed per topic in the summary table.
pub const SUMMARY_WORDS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetPreview {
    pub total: usize,
    pub head: Vec<Review>,
    pub tail: Vec<Review>,
}

impl DatasetPreview {
    fn new(reviews: &[Review]) -> Self {
        let tail_start = reviews.len().saturating_sub(PREVIEW_ROWS);
        Self {
            total: reviews.len(),
            head: reviews.iter().take(PREVIEW_ROWS).cloned().collect(),
            tail: reviews[tail_start..].to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    pub topic: usize,
    /// Share of the corpus, in percent.
    pub proportion: f64,
    pub keywords: Vec<String>,
    pub weights: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LdaPage {
    pub app: AppEntry,
    pub training: bool,
    pub dataset: Option<DatasetPreview>,
    pub model_available: bool,
    pub num_topics: Option<usize>,
    pub coherence_score: Option<f64>,
    pub topic_summary: Vec<TopicSummary>,
    pub chart_data: Option<ChartData>,
    pub chart_analysis: Option<ChartAnalysis>,
}

/// Assemble the page, generating and caching charts on first view.
///
/// Blocking: reads the dataset and the model from disk.
pub fn build_lda_page(coordinator: &JobCoordinator, app: &AppId) -> Result<LdaPage, StudioError> {
    let entry = coordinator.catalog().require(app)?.clone();
    let training = coordinator.is_training(app)?;

    let dataset = match DatasetLoader::new(coordinator.layout().clone()).cached(app) {
        Ok(reviews) => reviews.map(|r| DatasetPreview::new(&r)),
        Err(e) => {
            warn!(app = %app, error = %e, "unreadable dataset");
            None
        }
    };

    let mut page = LdaPage {
        app: entry,
        training,
        dataset,
        model_available: false,
        num_topics: None,
        coherence_score: None,
        topic_summary: Vec::new(),
        chart_data: None,
        chart_analysis: None,
    };

    let model_path = coordinator.layout().model_file(app);
    // A job still writing would show a half-finished run.
    if training || !model_path.exists() {
        return Ok(page);
    }
    let artifact = match ModelArtifact::load(&model_path) {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(app = %app, error = %e, "model file unreadable");
            return Ok(page);
        }
    };

    let (data, analysis) = match coordinator.charts().load(app) {
        Some(cached) => cached,
        None => {
            info!(app = %app, "generating chart data");
            let data = build_chart_data(&artifact);
            let analysis = analyze(&data, app.as_str());
            if let Err(e) = coordinator.charts().save(app, &data, &analysis) {
                warn!(app = %app, error = %e, "failed to cache chart data");
            }
            (data, analysis)
        }
    };

    page.topic_summary = (0..artifact.num_topics)
        .map(|topic| {
            let (keywords, weights) = artifact
                .model
                .top_words(&artifact.dictionary, topic, SUMMARY_WORDS)
                .into_iter()
                .unzip();
            TopicSummary {
                topic: topic + 1,
                proportion: data
                    .topic_distribution
                    .data
                    .get(topic)
                    .map_or(0.0, |share| share * 100.0),
                keywords,
                weights,
            }
        })
        .collect();
    page.model_available = true;
    page.num_topics = Some(artifact.num_topics);
    page.coherence_score = Some(artifact.coherence);
    page.chart_data = Some(data);
    page.chart_analysis = Some(analysis);
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<Review> {
        (0..n)
            .map(|i| Review {
                content: format!("review {}", i),
                score: Some(5),
                at: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_preview_takes_both_ends() {
        let preview = DatasetPreview::new(&rows(12));
        assert_eq!(preview.total, 12);
        assert_eq!(preview.head[0].content, "review 0");
        assert_eq!(preview.tail.len(), PREVIEW_ROWS);
        assert_eq!(preview.tail[0].content, "review 7");
    }

    #[test]
    fn test_preview_of_short_dataset_overlaps() {
        let preview = DatasetPreview::new(&rows(3));
        assert_eq!(preview.head.len(), 3);
        assert_eq!(preview.tail.len(), 3);
    }
}
