//! Test doubles for the training collaborators.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::catalog::AppEntry;
use crate::errors::TrainingError;
use crate::nlp::{
    Corpus, FetchProgress, FittedModel, LdaModel, Preprocessor, Review, ReviewSource,
    TopicPipeline, TopicTrainer,
};

pub(crate) fn reviews(n: usize) -> Vec<Review> {
    (0..n)
        .map(|i| Review {
            content: match i % 3 {
                0 => "music playlist song shuffle offline",
                1 => "crash login error freeze update",
                _ => "price subscription premium refund family",
            }
            .to_string(),
            score: Some((i % 5) as i64 + 1),
            at: "2024-05-01 10:00:00".to_string(),
        })
        .collect()
}

pub(crate) struct StaticSource {
    pub reviews: Vec<Review>,
    pub calls: Mutex<usize>,
}

impl StaticSource {
    pub(crate) fn new(reviews: Vec<Review>) -> Self {
        Self {
            reviews,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ReviewSource for StaticSource {
    async fn fetch(
        &self,
        _app: &AppEntry,
        limit: usize,
        on_progress: FetchProgress<'_>,
    ) -> Result<Vec<Review>, TrainingError> {
        *self.calls.lock().unwrap() += 1;
        let reviews: Vec<Review> = self.reviews.iter().take(limit).cloned().collect();
        on_progress(reviews.len(), limit);
        Ok(reviews)
    }
}

type FitHook = Box<dyn Fn(usize) + Send + Sync>;

/// Returns flat models whose coherence peaks at `best` topics.
pub(crate) struct ScriptedTrainer {
    pub best: usize,
    pub failing: HashSet<usize>,
    pub calls: Mutex<Vec<usize>>,
    on_fit: Option<FitHook>,
}

impl ScriptedTrainer {
    pub(crate) fn new(best: usize) -> Self {
        Self {
            best,
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            on_fit: None,
        }
    }

    pub(crate) fn failing(mut self, topics: &[usize]) -> Self {
        self.failing = topics.iter().copied().collect();
        self
    }

    /// Run `hook` with the topic count at the start of every fit.
    pub(crate) fn on_fit(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_fit = Some(Box::new(hook));
        self
    }

    pub(crate) fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl TopicTrainer for ScriptedTrainer {
    fn fit(&self, corpus: &Corpus, num_topics: usize) -> Result<FittedModel, TrainingError> {
        self.calls.lock().unwrap().push(num_topics);
        if let Some(hook) = &self.on_fit {
            hook(num_topics);
        }
        if self.failing.contains(&num_topics) {
            return Err(anyhow::anyhow!("scripted failure for {} topics", num_topics).into());
        }
        let vocab = corpus.dictionary.len();
        let model = LdaModel {
            num_topics,
            alpha: 0.01,
            eta: 0.01,
            topic_word: vec![vec![1.0 / vocab as f64; vocab]; num_topics],
            doc_topic: vec![vec![1.0 / num_topics as f64; num_topics]; corpus.num_docs()],
        };
        Ok(FittedModel {
            model,
            coherence: -((num_topics as f64) - (self.best as f64)).abs(),
            topic_coherence: vec![-1.0; num_topics],
        })
    }
}

pub(crate) fn pipeline(
    source: Arc<dyn ReviewSource>,
    trainer: Arc<dyn TopicTrainer>,
) -> TopicPipeline {
    TopicPipeline {
        source,
        trainer,
        preprocessor: Arc::new(Preprocessor::default()),
        review_limit: 100,
    }
}
