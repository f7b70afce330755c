//! Collapsed Gibbs sampling LDA and UMass coherence.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{StoreError, TrainingError};
use crate::layout::write_atomic;
use crate::nlp::{Corpus, Dictionary, TopicTrainer};

/// Words per topic used for coherence.
pub const COHERENCE_TOP_N: usize = 10;

/// Fitted topic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdaModel {
    pub num_topics: usize,
    pub alpha: f64,
    pub eta: f64,
    /// `[topic][word]` probabilities.
    pub topic_word: Vec<Vec<f64>>,
    /// `[document][topic]` weights of the training documents.
    pub doc_topic: Vec<Vec<f64>>,
}

impl LdaModel {
    /// Ids of the `n` most probable words of `topic`.
    pub fn top_word_ids(&self, topic: usize, n: usize) -> Vec<usize> {
        let Some(row) = self.topic_word.get(topic) else {
            return Vec::new();
        };
        let mut ids: Vec<usize> = (0..row.len()).collect();
        ids.sort_by(|a, b| row[*b].total_cmp(&row[*a]).then(a.cmp(b)));
        ids.truncate(n);
        ids
    }

    /// `(word, probability)` for the `n` most probable words of `topic`.
    pub fn top_words(&self, dictionary: &Dictionary, topic: usize, n: usize) -> Vec<(String, f64)> {
        self.top_word_ids(topic, n)
            .into_iter()
            .filter_map(|id| {
                let word = dictionary.token(id)?;
                Some((word.to_string(), self.topic_word[topic][id]))
            })
            .collect()
    }
}

/// A model together with its scores.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub model: LdaModel,
    pub coherence: f64,
    pub topic_coherence: Vec<f64>,
}

/// UMass coherence of every topic, computed over the top words.
pub fn umass_coherence(model: &LdaModel, corpus: &Corpus, top_n: usize) -> Vec<f64> {
    let doc_sets: Vec<HashSet<usize>> = corpus
        .bow
        .iter()
        .map(|doc| doc.iter().map(|(id, _)| *id).collect())
        .collect();
    let doc_freq = |a: usize| doc_sets.iter().filter(|d| d.contains(&a)).count();
    let co_freq = |a: usize, b: usize| {
        doc_sets
            .iter()
            .filter(|d| d.contains(&a) && d.contains(&b))
            .count()
    };

    (0..model.num_topics)
        .map(|topic| {
            let top = model.top_word_ids(topic, top_n);
            let mut total = 0.0;
            let mut pairs = 0usize;
            for i in 1..top.len() {
                for j in 0..i {
                    let dj = doc_freq(top[j]);
                    if dj == 0 {
                        continue;
                    }
                    total += ((co_freq(top[i], top[j]) as f64 + 1.0) / dj as f64).ln();
                    pairs += 1;
                }
            }
            if pairs == 0 { 0.0 } else { total / pairs as f64 }
        })
        .collect()
}

/// Gibbs sampler with symmetric priors.
#[derive(Debug, Clone)]
pub struct GibbsTrainer {
    pub alpha: f64,
    pub eta: f64,
    pub iterations: usize,
    pub seed: u64,
}

impl GibbsTrainer {
    pub fn new(iterations: usize, seed: u64) -> Self {
        Self {
            alpha: 0.01,
            eta: 0.01,
            iterations,
            seed,
        }
    }
}

struct GibbsState {
    k: usize,
    vocab: usize,
    docs: Vec<Vec<usize>>,
    z: Vec<Vec<usize>>,
    ndk: Vec<Vec<usize>>,
    nkw: Vec<Vec<usize>>,
    nk: Vec<usize>,
    rng: StdRng,
}

impl GibbsState {
    fn new(corpus: &Corpus, k: usize, seed: u64) -> Self {
        let vocab = corpus.dictionary.len();
        let docs: Vec<Vec<usize>> = corpus
            .bow
            .iter()
            .map(|doc| {
                doc.iter()
                    .flat_map(|(id, count)| std::iter::repeat_n(*id, *count as usize))
                    .collect()
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ndk = vec![vec![0usize; k]; docs.len()];
        let mut nkw = vec![vec![0usize; vocab]; k];
        let mut nk = vec![0usize; k];
        let z = docs
            .iter()
            .enumerate()
            .map(|(d, doc)| {
                doc.iter()
                    .map(|&w| {
                        let topic = rng.random_range(0..k);
                        ndk[d][topic] += 1;
                        nkw[topic][w] += 1;
                        nk[topic] += 1;
                        topic
                    })
                    .collect()
            })
            .collect();
        Self {
            k,
            vocab,
            docs,
            z,
            ndk,
            nkw,
            nk,
            rng,
        }
    }

    fn sweep(&mut self, alpha: f64, eta: f64) {
        let v_eta = self.vocab as f64 * eta;
        let mut weights = vec![0.0f64; self.k];
        for d in 0..self.docs.len() {
            for i in 0..self.docs[d].len() {
                let w = self.docs[d][i];
                let old = self.z[d][i];
                self.ndk[d][old] -= 1;
                self.nkw[old][w] -= 1;
                self.nk[old] -= 1;

                let mut total = 0.0;
                for (t, weight) in weights.iter_mut().enumerate() {
                    *weight = (self.ndk[d][t] as f64 + alpha) * (self.nkw[t][w] as f64 + eta)
                        / (self.nk[t] as f64 + v_eta);
                    total += *weight;
                }
                let mut target = self.rng.random::<f64>() * total;
                let mut new = self.k - 1;
                for (t, weight) in weights.iter().enumerate() {
                    if target < *weight {
                        new = t;
                        break;
                    }
                    target -= weight;
                }

                self.z[d][i] = new;
                self.ndk[d][new] += 1;
                self.nkw[new][w] += 1;
                self.nk[new] += 1;
            }
        }
    }

    fn into_model(self, alpha: f64, eta: f64) -> LdaModel {
        let v_eta = self.vocab as f64 * eta;
        let topic_word = (0..self.k)
            .map(|t| {
                let denom = self.nk[t] as f64 + v_eta;
                (0..self.vocab)
                    .map(|w| (self.nkw[t][w] as f64 + eta) / denom)
                    .collect()
            })
            .collect();
        let k_alpha = self.k as f64 * alpha;
        let doc_topic = self
            .ndk
            .iter()
            .zip(&self.docs)
            .map(|(counts, doc)| {
                let denom = doc.len() as f64 + k_alpha;
                counts.iter().map(|&c| (c as f64 + alpha) / denom).collect()
            })
            .collect();
        LdaModel {
            num_topics: self.k,
            alpha,
            eta,
            topic_word,
            doc_topic,
        }
    }
}

impl TopicTrainer for GibbsTrainer {
    fn fit(&self, corpus: &Corpus, num_topics: usize) -> Result<FittedModel, TrainingError> {
        if num_topics == 0 {
            return Err(anyhow::anyhow!("jumlah topik harus lebih dari 0").into());
        }
        if corpus.dictionary.is_empty() || corpus.bow.iter().all(Vec::is_empty) {
            return Err(anyhow::anyhow!("corpus kosong").into());
        }

        let mut state = GibbsState::new(corpus, num_topics, self.seed);
        for iteration in 0..self.iterations {
            state.sweep(self.alpha, self.eta);
            if (iteration + 1) % 50 == 0 {
                debug!(num_topics, iteration = iteration + 1, "gibbs sampling");
            }
        }
        let model = state.into_model(self.alpha, self.eta);
        let topic_coherence = umass_coherence(&model, corpus, COHERENCE_TOP_N);
        let coherence = topic_coherence.iter().sum::<f64>() / topic_coherence.len() as f64;
        Ok(FittedModel {
            model,
            coherence,
            topic_coherence,
        })
    }
}

/// What gets written to `models/<app>_lda.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub app_name: String,
    pub num_topics: usize,
    pub coherence: f64,
    pub topic_coherence: Vec<f64>,
    pub trained_at: DateTime<Utc>,
    pub model: LdaModel,
    pub dictionary: Dictionary,
    pub corpus: Vec<Vec<(usize, u32)>>,
}

impl ModelArtifact {
    pub fn new(app_name: &str, fitted: FittedModel, corpus: &Corpus) -> Self {
        Self {
            app_name: app_name.to_string(),
            num_topics: fitted.model.num_topics,
            coherence: fitted.coherence,
            topic_coherence: fitted.topic_coherence,
            trained_at: Utc::now(),
            model: fitted.model,
            dictionary: corpus.dictionary.clone(),
            corpus: corpus.bow.clone(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(self).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, &bytes)
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut artifact: Self =
            serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.dictionary.rebuild_index();
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::{Preprocessor, Review};

    fn corpus() -> Corpus {
        let mut texts = Vec::new();
        for _ in 0..6 {
            texts.push("music playlist song music playlist");
            texts.push("crash login error crash bug");
            texts.push("price subscription premium price refund");
        }
        let reviews: Vec<Review> = texts
            .into_iter()
            .map(|t| Review {
                content: t.to_string(),
                score: None,
                at: String::new(),
            })
            .collect();
        Preprocessor::default().run(&reviews).unwrap()
    }

    #[test]
    fn test_fit_produces_normalized_distributions() {
        let corpus = corpus();
        let fitted = GibbsTrainer::new(50, 42).fit(&corpus, 3).unwrap();
        let model = &fitted.model;
        assert_eq!(model.topic_word.len(), 3);
        assert_eq!(model.doc_topic.len(), corpus.num_docs());
        for row in model.topic_word.iter().chain(&model.doc_topic) {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "row sums to {}", sum);
        }
        assert_eq!(fitted.topic_coherence.len(), 3);
        assert!(fitted.coherence.is_finite());
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let corpus = corpus();
        let a = GibbsTrainer::new(20, 42).fit(&corpus, 2).unwrap();
        let b = GibbsTrainer::new(20, 42).fit(&corpus, 2).unwrap();
        assert_eq!(a.model, b.model);
        assert_eq!(a.coherence, b.coherence);
    }

    #[test]
    fn test_separable_corpus_groups_words() {
        let corpus = corpus();
        let fitted = GibbsTrainer::new(100, 42).fit(&corpus, 3).unwrap();
        let crash = corpus.dictionary.id("crash").unwrap();
        let error = corpus.dictionary.id("error").unwrap();
        let topic_of = |w: usize| {
            (0..3)
                .max_by(|a, b| {
                    fitted.model.topic_word[*a][w].total_cmp(&fitted.model.topic_word[*b][w])
                })
                .unwrap()
        };
        assert_eq!(topic_of(crash), topic_of(error));
    }

    #[test]
    fn test_zero_topics_is_an_error() {
        assert!(GibbsTrainer::new(10, 42).fit(&corpus(), 0).is_err());
    }

    #[test]
    fn test_artifact_round_trip_restores_dictionary_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("demo_lda.json");
        let corpus = corpus();
        let fitted = GibbsTrainer::new(10, 42).fit(&corpus, 2).unwrap();
        ModelArtifact::new("demo", fitted, &corpus).save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.num_topics, 2);
        assert_eq!(loaded.dictionary.id("crash"), corpus.dictionary.id("crash"));
        assert_eq!(loaded.model.top_words(&loaded.dictionary, 0, 3).len(), 3);
    }
}
