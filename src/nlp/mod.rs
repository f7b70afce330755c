//! Collaborators of a training job: review data, preprocessing and topic
//! model fitting.
//!
//! The job only talks to these through [`ReviewSource`] and
//! [`TopicTrainer`], so tests can swap in doubles.

pub mod dataset;
pub mod lda;
pub mod preprocess;
pub mod scraper;

use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::AppEntry;
use crate::errors::TrainingError;

pub use dataset::{DatasetLoader, Review};
pub use lda::{FittedModel, GibbsTrainer, LdaModel, ModelArtifact};
pub use preprocess::{Corpus, Dictionary, Preprocessor};
pub use scraper::HttpReviewSource;

/// Called with `(fetched, total)` while reviews are being fetched.
pub type FetchProgress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Fetches reviews for an app from a remote store.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch up to `limit` reviews, newest first.
    async fn fetch(
        &self,
        app: &AppEntry,
        limit: usize,
        on_progress: FetchProgress<'_>,
    ) -> Result<Vec<Review>, TrainingError>;
}

/// Fits one topic model with a fixed number of topics.
///
/// Runs on the blocking pool, so implementations may be CPU heavy.
pub trait TopicTrainer: Send + Sync {
    fn fit(&self, corpus: &Corpus, num_topics: usize) -> Result<FittedModel, TrainingError>;
}

/// Everything a job needs besides the stores.
#[derive(Clone)]
pub struct TopicPipeline {
    pub source: Arc<dyn ReviewSource>,
    pub trainer: Arc<dyn TopicTrainer>,
    pub preprocessor: Arc<Preprocessor>,
    pub review_limit: usize,
}
