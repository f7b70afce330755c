//! Chart data derived from a fitted model, plus its cached copy on disk.

pub mod analysis;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::nlp::ModelArtifact;

pub use analysis::{ChartAnalysis, TopicTheme, analyze};
pub use store::{ChartMetadata, ChartStore};

/// Documents shown in the document-topic matrix.
pub const MATRIX_DOCS: usize = 50;
/// Words shown per topic.
pub const TOP_WORDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSeries {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicWords {
    pub topic_id: usize,
    pub words: Vec<String>,
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub topic_distribution: LabeledSeries,
    pub topics_words: Vec<TopicWords>,
    pub topic_coherence: LabeledSeries,
    pub doc_topic_matrix: Vec<Vec<f64>>,
}

impl ChartData {
    pub fn num_topics(&self) -> usize {
        self.topics_words.len()
    }
}

/// Build chart data from a persisted model.
pub fn build_chart_data(artifact: &ModelArtifact) -> ChartData {
    let model = &artifact.model;
    let k = model.num_topics;
    let labels: Vec<String> = (1..=k).map(|i| format!("Topic {}", i)).collect();

    // Mean document weight per topic over non-empty documents, renormalized.
    let mut sums = vec![0.0f64; k];
    let mut counted = 0usize;
    for (weights, bow) in model.doc_topic.iter().zip(&artifact.corpus) {
        if bow.is_empty() {
            continue;
        }
        for (sum, w) in sums.iter_mut().zip(weights) {
            *sum += w;
        }
        counted += 1;
    }
    let total: f64 = sums.iter().sum();
    let distribution = if counted == 0 || total <= 0.0 {
        vec![1.0 / k as f64; k]
    } else {
        sums.iter().map(|s| s / total).collect()
    };

    let topics_words = (0..k)
        .map(|topic| {
            let (words, probabilities) = model
                .top_words(&artifact.dictionary, topic, TOP_WORDS)
                .into_iter()
                .unzip();
            TopicWords {
                topic_id: topic,
                words,
                probabilities,
            }
        })
        .collect();

    let doc_topic_matrix = model
        .doc_topic
        .iter()
        .take(MATRIX_DOCS)
        .map(|row| {
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter().map(|p| p / sum).collect()
            } else {
                row.clone()
            }
        })
        .collect();

    ChartData {
        topic_distribution: LabeledSeries {
            labels: labels.clone(),
            data: distribution,
        },
        topics_words,
        topic_coherence: LabeledSeries {
            labels,
            data: artifact.topic_coherence.clone(),
        },
        doc_topic_matrix,
    }
}
