//! Review text to bag-of-words corpus.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::TrainingError;
use crate::nlp::Review;

static NON_LETTERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z\s]").unwrap());

const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "youre", "youve",
    "youll", "youd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "shes", "her", "hers", "herself", "it", "its", "itself", "they", "them", "their",
    "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "thatll", "these",
    "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "dont", "should", "shouldve", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "arent", "couldn", "couldnt", "didn",
    "didnt", "doesn", "doesnt", "hadn", "hadnt", "hasn", "hasnt", "haven", "havent", "isn",
    "isnt", "ma", "mightn", "mightnt", "mustn", "mustnt", "needn", "neednt", "shan", "shant",
    "shouldn", "shouldnt", "wasn", "wasnt", "weren", "werent", "won", "wont", "wouldn",
    "wouldnt",
];

const REVIEW_STOPWORDS: &[&str] = &["like", "ok", "im", "get", "one", "really", "app"];

/// Token ids plus document frequencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    id2token: Vec<String>,
    #[serde(skip)]
    token2id: HashMap<String, usize>,
    dfs: Vec<usize>,
    num_docs: usize,
}

impl Dictionary {
    pub fn from_documents(texts: &[Vec<String>]) -> Self {
        let mut dictionary = Self::default();
        for text in texts {
            dictionary.num_docs += 1;
            let mut seen: HashSet<&String> = HashSet::new();
            // First-seen order keeps ids stable across runs.
            for token in text.iter().filter(|t| seen.insert(*t)) {
                let id = match dictionary.token2id.get(token) {
                    Some(&id) => id,
                    None => {
                        let id = dictionary.id2token.len();
                        dictionary.id2token.push(token.clone());
                        dictionary.token2id.insert(token.clone(), id);
                        dictionary.dfs.push(0);
                        id
                    }
                };
                dictionary.dfs[id] += 1;
            }
        }
        dictionary
    }

    /// Keep tokens seen in at least `no_below` documents and in no more
    /// than `no_above` (a fraction) of them. Ids are reassigned.
    pub fn filter_extremes(&mut self, no_below: usize, no_above: f64) {
        let no_above_abs = (no_above * self.num_docs as f64) as usize;
        let kept: Vec<(String, usize)> = self
            .id2token
            .iter()
            .zip(&self.dfs)
            .filter(|(_, df)| **df >= no_below && **df <= no_above_abs)
            .map(|(token, df)| (token.clone(), *df))
            .collect();
        self.id2token = kept.iter().map(|(t, _)| t.clone()).collect();
        self.dfs = kept.iter().map(|(_, df)| *df).collect();
        self.rebuild_index();
    }

    /// Restore the lookup table after deserializing.
    pub fn rebuild_index(&mut self) {
        self.token2id = self
            .id2token
            .iter()
            .enumerate()
            .map(|(id, token)| (token.clone(), id))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.id2token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2token.is_empty()
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.id2token.get(id).map(String::as_str)
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.token2id.get(token).copied()
    }

    pub fn tokens(&self) -> &[String] {
        &self.id2token
    }

    /// Sparse `(id, count)` pairs sorted by id; unknown tokens are dropped.
    pub fn doc2bow(&self, text: &[String]) -> Vec<(usize, u32)> {
        let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
        for token in text {
            if let Some(id) = self.id(token) {
                *counts.entry(id).or_default() += 1;
            }
        }
        counts.into_iter().collect()
    }
}

/// Preprocessed documents ready for the trainer.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub texts: Vec<Vec<String>>,
    pub dictionary: Dictionary,
    pub bow: Vec<Vec<(usize, u32)>>,
}

impl Corpus {
    pub fn num_docs(&self) -> usize {
        self.bow.len()
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    stopwords: HashSet<String>,
    min_token_len: usize,
    no_below: usize,
    no_above: f64,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            stopwords: ENGLISH_STOPWORDS
                .iter()
                .chain(REVIEW_STOPWORDS)
                .map(|w| w.to_string())
                .collect(),
            min_token_len: 3,
            no_below: 5,
            no_above: 0.5,
        }
    }
}

impl Preprocessor {
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        NON_LETTERS
            .replace_all(&lowered, "")
            .split_whitespace()
            .filter(|t| t.len() >= self.min_token_len && !self.stopwords.contains(*t))
            .map(str::to_string)
            .collect()
    }

    /// Tokenize every review, drop empty documents and build the corpus.
    ///
    /// When the frequency filter would leave nothing (tiny datasets), the
    /// unfiltered dictionary is used instead.
    pub fn run(&self, reviews: &[Review]) -> Result<Corpus, TrainingError> {
        let texts: Vec<Vec<String>> = reviews
            .iter()
            .map(|r| self.tokenize(&r.content))
            .filter(|tokens| !tokens.is_empty())
            .collect();
        if texts.is_empty() {
            return Err(TrainingError::Preprocessing(
                "tidak ada dokumen dengan token valid".to_string(),
            ));
        }

        let full = Dictionary::from_documents(&texts);
        let mut dictionary = full.clone();
        dictionary.filter_extremes(self.no_below, self.no_above);
        if dictionary.is_empty() {
            warn!(
                docs = texts.len(),
                "frequency filter removed every token, keeping unfiltered dictionary"
            );
            dictionary = full;
        }

        let bow: Vec<Vec<(usize, u32)>> = texts.iter().map(|t| dictionary.doc2bow(t)).collect();
        debug!(
            docs = texts.len(),
            vocabulary = dictionary.len(),
            "preprocessing complete"
        );
        Ok(Corpus {
            texts,
            dictionary,
            bow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviews(texts: &[&str]) -> Vec<Review> {
        texts
            .iter()
            .map(|t| Review {
                content: t.to_string(),
                score: None,
                at: String::new(),
            })
            .collect()
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tokenize_strips_noise_and_stopwords() {
        let p = Preprocessor::default();
        assert_eq!(
            p.tokenize("I really LOVE this app!!! 10/10, great playlists :)"),
            tokens(&["love", "great", "playlists"])
        );
        assert!(p.tokenize("ok ok im so a").is_empty());
    }

    #[test]
    fn test_filter_extremes_matches_frequency_bounds() {
        let texts = vec![
            tokens(&["music", "ads"]),
            tokens(&["music", "ads"]),
            tokens(&["music", "crash"]),
            tokens(&["music", "crash"]),
        ];
        let mut dictionary = Dictionary::from_documents(&texts);
        dictionary.filter_extremes(2, 0.5);
        // "music" is in every document, above the 50 % ceiling.
        assert_eq!(dictionary.id("music"), None);
        assert!(dictionary.id("ads").is_some());
        assert!(dictionary.id("crash").is_some());
        assert_eq!(dictionary.len(), 2);
    }

    #[test]
    fn test_doc2bow_counts_and_sorts() {
        let texts = vec![tokens(&["ads", "crash", "ads"])];
        let dictionary = Dictionary::from_documents(&texts);
        let bow = dictionary.doc2bow(&tokens(&["crash", "ads", "ads", "unknown"]));
        let total: u32 = bow.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 3);
        assert!(bow.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_run_drops_empty_documents_and_relaxes_filter() {
        let p = Preprocessor::default();
        let corpus = p
            .run(&reviews(&["great music", "!!!", "great playlists", "the"]))
            .unwrap();
        assert_eq!(corpus.num_docs(), 2);
        assert!(!corpus.dictionary.is_empty());
    }

    #[test]
    fn test_run_without_tokens_fails() {
        let err = Preprocessor::default()
            .run(&reviews(&["ok", "", "123"]))
            .unwrap_err();
        assert!(matches!(err, TrainingError::Preprocessing(_)));
    }

    #[test]
    fn test_dictionary_index_survives_serde() {
        let dictionary = Dictionary::from_documents(&[tokens(&["ads", "crash"])]);
        let json = serde_json::to_string(&dictionary).unwrap();
        let mut back: Dictionary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id("ads"), None);
        back.rebuild_index();
        assert_eq!(back.id("ads"), dictionary.id("ads"));
    }
}
