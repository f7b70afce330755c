//! Body of one background training run.
//!
//! The job reports through the progress store and polls the cancel marker at
//! fixed checkpoints. Errors never leave [`TrainingJob::run`]; they end up as
//! a 0 % progress record.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::catalog::{AppEntry, AppId};
use crate::config::ModelPolicy;
use crate::errors::TrainingError;
use crate::layout::{ArtifactLayout, remove_if_exists};
use crate::nlp::{Corpus, DatasetLoader, FittedModel, ModelArtifact, TopicPipeline};
use crate::training::cancel::CancelSignal;
use crate::training::progress::ProgressStore;

pub const CANCELLED_DESCRIPTION: &str = "Dibatalkan.";

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { num_topics: usize, coherence: f64 },
    Cancelled,
    Failed(String),
}

/// Why the run stopped early.
#[derive(Debug)]
enum Stop {
    Cancelled,
    Failed(TrainingError),
}

impl From<TrainingError> for Stop {
    fn from(e: TrainingError) -> Self {
        Stop::Failed(e)
    }
}

pub struct TrainingJob {
    pub app: AppId,
    pub entry: AppEntry,
    pub layout: ArtifactLayout,
    pub progress: Arc<ProgressStore>,
    pub cancel: CancelSignal,
    pub pipeline: TopicPipeline,
    pub policy: ModelPolicy,
}

impl TrainingJob {
    pub async fn run(self) -> JobOutcome {
        let app = self.app.clone();
        let outcome = match self.execute().await {
            Ok((num_topics, coherence)) => {
                self.report(
                    100.0,
                    &format!(
                        "Training {} selesai! Model tersimpan dengan {} topik",
                        app, num_topics
                    ),
                );
                JobOutcome::Completed {
                    num_topics,
                    coherence,
                }
            }
            Err(Stop::Cancelled) => {
                self.report(0.0, CANCELLED_DESCRIPTION);
                if let Err(e) = self.cancel.clear(Some(&app)) {
                    warn!(app = %app, error = %e, "failed to clear cancel marker");
                }
                JobOutcome::Cancelled
            }
            Err(Stop::Failed(e)) => {
                let message = format!("Training {} gagal: {}", app, e);
                error!(app = %app, error = %e, "training failed");
                self.report(0.0, &message);
                JobOutcome::Failed(message)
            }
        };
        info!(app = %app, outcome = ?outcome, "training job finished");
        outcome
    }

    fn report(&self, percent: f64, description: &str) {
        self.progress.write(Some(&self.app), percent, description);
    }

    fn checkpoint(&self, stage: &str) -> Result<(), Stop> {
        if self.cancel.is_cancelled(Some(&self.app)) {
            info!(app = %self.app, stage, "training cancelled");
            return Err(Stop::Cancelled);
        }
        Ok(())
    }

    async fn execute(&self) -> Result<(usize, f64), Stop> {
        self.report(0.0, "Memulai proses training...");
        self.checkpoint("start")?;

        let loader = DatasetLoader::new(self.layout.clone());
        let reviews = loader
            .load(
                &self.app,
                &self.entry,
                self.pipeline.source.as_ref(),
                self.pipeline.review_limit,
                &self.progress,
            )
            .await?;
        self.checkpoint("data loaded")?;

        self.report(15.0, "Preprocessing data...");
        let preprocessor = Arc::clone(&self.pipeline.preprocessor);
        let corpus = tokio::task::spawn_blocking(move || preprocessor.run(&reviews))
            .await
            .map_err(|e| TrainingError::Preprocessing(e.to_string()))??;
        let corpus = Arc::new(corpus);
        self.checkpoint("preprocessed")?;

        self.report(30.0, "Training LDA dan menghitung coherence...");
        let best = self.select_model(&corpus).await?;
        self.checkpoint("trained")?;

        let num_topics = best.model.num_topics;
        let coherence = best.coherence;
        self.report(
            90.0,
            &format!(
                "Menyimpan model terbaik: {} topik (coherence: {:.4})",
                num_topics, coherence
            ),
        );
        let path = self.layout.model_file(&self.app);
        ModelArtifact::new(self.app.as_str(), best, &corpus)
            .save(&path)
            .map_err(TrainingError::Persist)?;

        self.discard_if_cancelled(&path)?;
        Ok((num_topics, coherence))
    }

    /// A cancel that raced the save must not leave a model behind.
    fn discard_if_cancelled(&self, model: &Path) -> Result<(), Stop> {
        if self.cancel.is_cancelled(Some(&self.app)) {
            if let Err(e) = remove_if_exists(model) {
                warn!(app = %self.app, error = %e, "failed to remove cancelled model");
            }
            return Err(Stop::Cancelled);
        }
        Ok(())
    }

    /// Fit every candidate topic count and keep the most coherent model.
    async fn select_model(&self, corpus: &Arc<Corpus>) -> Result<FittedModel, Stop> {
        let candidates: Vec<usize> = self.policy.candidates().collect();
        let total = candidates.len();
        let mut best: Option<FittedModel> = None;

        for (i, num_topics) in candidates.into_iter().enumerate() {
            self.checkpoint("candidate")?;
            let percent = 30.0 + (i as f64 * 60.0 / total as f64);
            self.report(
                percent,
                &format!("Training model {} topik ({}/{})...", num_topics, i + 1, total),
            );

            let trainer = Arc::clone(&self.pipeline.trainer);
            let corpus = Arc::clone(corpus);
            let fitted =
                match tokio::task::spawn_blocking(move || trainer.fit(&corpus, num_topics)).await {
                    Ok(Ok(fitted)) => fitted,
                    Ok(Err(e)) => {
                        warn!(
                            app = %self.app,
                            num_topics,
                            error = %e,
                            "candidate failed, skipping"
                        );
                        continue;
                    }
                    Err(e) => {
                        warn!(
                            app = %self.app,
                            num_topics,
                            error = %e,
                            "candidate panicked, skipping"
                        );
                        continue;
                    }
                };

            self.report(
                percent + 5.0,
                &format!(
                    "Model {} topik: coherence={:.4}",
                    num_topics, fitted.coherence
                ),
            );
            if best
                .as_ref()
                .is_none_or(|current| fitted.coherence > current.coherence)
            {
                best = Some(fitted);
            }
        }

        best.ok_or(Stop::Failed(TrainingError::NoModelTrained))
    }
}
