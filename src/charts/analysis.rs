//! Written interpretation of the charts, in Indonesian.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::charts::ChartData;

/// Keyword patterns per theme, with the label shown to users.
#[rustfmt::skip]
const THEMES: &[(&str, &[&str])] = &[
    ("Performa dan Kecepatan Aplikasi", &["lag", "slow", "fast", "speed", "performance", "loading", "crash", "bug", "glitch"]),
    ("Antarmuka dan Pengalaman Pengguna", &["interface", "design", "layout", "screen", "button", "menu", "navigation"]),
    ("Fitur dan Fungsionalitas", &["feature", "function", "tool", "option", "setting", "mode", "update", "new"]),
    ("Mekanisme dan Pengalaman Bermain", &["game", "play", "level", "character", "battle", "win", "lose", "difficulty"]),
    ("Sistem Pembayaran dan Harga", &["pay", "price", "cost", "money", "purchase", "buy", "expensive", "cheap", "free", "subscription", "premium"]),
    ("Fitur Sosial dan Komunitas", &["friend", "chat", "social", "share", "community", "multiplayer", "team"]),
    ("Kualitas Konten dan Media", &["music", "song", "video", "content", "quality", "sound", "audio"]),
    ("Aspek Teknis dan Kompatibilitas", &["install", "download", "version", "compatibility", "system", "device"]),
    ("Layanan Pelanggan dan Dukungan", &["support", "help", "service", "customer", "response", "contact", "issue"]),
    ("Kepuasan dan Pengalaman Positif", &["good", "great", "excellent", "amazing", "love", "enjoy", "satisfied"]),
    ("Ketidakpuasan dan Masalah", &["bad", "terrible", "hate", "dislike", "awful", "worst", "disappointed"]),
    ("Pengiriman dan Logistik", &["delivery", "shipping", "package", "arrived", "late", "courier"]),
    ("Kualitas Produk", &["original", "fake", "genuine", "damaged", "broken", "perfect"]),
    ("Pengalaman Berbelanja", &["shopping", "cart", "checkout", "order", "browse"]),
    ("Sistem Gacha dan Monetisasi", &["gacha", "summon", "pull", "rates", "pity", "currency", "gems", "crystals"]),
    ("Cerita dan Narasi", &["story", "plot", "dialogue", "quest", "mission", "campaign"]),
    ("Grafis dan Visual", &["graphics", "visual", "art", "animation", "effect", "beautiful", "stunning"]),
    ("Playlist dan Koleksi Musik", &["playlist", "library", "collection", "organize", "favorite", "saved"]),
    ("Penemuan Konten Baru", &["discover", "recommendation", "suggest", "artist", "genre", "explore"]),
];

const GENERAL_THEME: &str = "Tema Umum";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTheme {
    pub topic_id: usize,
    pub theme: String,
    pub confidence: f64,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartAnalysis {
    pub topic_distribution: String,
    pub topic_coherence: String,
    pub topic_words: String,
    pub doc_topic_matrix: String,
    pub overall_summary: String,
    pub themes: Vec<TopicTheme>,
}

impl ChartAnalysis {
    pub fn section_names() -> Vec<String> {
        [
            "topic_distribution",
            "topic_coherence",
            "topic_words",
            "doc_topic_matrix",
            "overall_summary",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Best matching theme for a topic's words and the share of words that
/// matched it. A word matches a keyword when either contains the other.
pub fn interpret_theme(words: &[String]) -> (String, f64) {
    if words.is_empty() {
        return (GENERAL_THEME.to_string(), 0.0);
    }
    let mut best: Option<(&str, usize)> = None;
    for (label, keywords) in THEMES {
        let score = words
            .iter()
            .filter(|w| {
                keywords
                    .iter()
                    .any(|k| w.contains(k) || k.contains(w.as_str()))
            })
            .count();
        if score > 0 && best.is_none_or(|(_, s)| score > s) {
            best = Some((label, score));
        }
    }
    match best {
        Some((label, score)) => (label.to_string(), score as f64 / words.len() as f64),
        None => (GENERAL_THEME.to_string(), 0.0),
    }
}

fn display_name(app_name: &str) -> String {
    app_name
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if *v > best.1 { (i, *v) } else { best })
        .0
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, v)| if *v < best.1 { (i, *v) } else { best })
        .0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    mean(&values.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>()).sqrt()
}

/// Quality band for a mean UMass coherence (higher is better, at most 0).
fn coherence_quality(avg: f64) -> &'static str {
    if avg > -1.0 {
        "sangat baik"
    } else if avg > -2.0 {
        "baik"
    } else if avg > -4.0 {
        "cukup"
    } else {
        "kurang"
    }
}

pub fn analyze(data: &ChartData, app_name: &str) -> ChartAnalysis {
    let k = data.num_topics();

    let total: f64 = data.topic_distribution.data.iter().sum();
    let percentages: Vec<f64> = data
        .topic_distribution
        .data
        .iter()
        .map(|v| if total > 0.0 { v / total * 100.0 } else { 0.0 })
        .collect();
    let spread = std_dev(&percentages);
    let balanced = spread < 10.0;
    let balance = if balanced { "seimbang" } else { "tidak seimbang" };
    let topic_distribution = if percentages.is_empty() {
        String::new()
    } else {
        let (hi, lo) = (argmax(&percentages), argmin(&percentages));
        format!(
            "Pada aplikasi {}, Topik {} paling dominan ({:.1}%), Topik {} paling kecil ({:.1}%). \
             Distribusi relatif {} (standar deviasi {:.1}%) dengan {} topik utama.",
            display_name(app_name),
            hi + 1,
            percentages[hi],
            lo + 1,
            percentages[lo],
            balance,
            spread,
            k
        )
    };

    let coherence = &data.topic_coherence.data;
    let avg_coherence = mean(coherence);
    let quality = coherence_quality(avg_coherence);
    let topic_coherence = if coherence.is_empty() {
        String::new()
    } else {
        let (hi, lo) = (argmax(coherence), argmin(coherence));
        format!(
            "Koherensi rata-rata {:.3} (kualitas {}). Topik {} tertinggi ({:.3}), Topik {} terendah ({:.3}).",
            avg_coherence,
            quality,
            hi + 1,
            coherence[hi],
            lo + 1,
            coherence[lo]
        )
    };

    let themes: Vec<TopicTheme> = data
        .topics_words
        .iter()
        .map(|topic| {
            let (theme, confidence) = interpret_theme(&topic.words);
            TopicTheme {
                topic_id: topic.topic_id + 1,
                theme,
                confidence,
                keywords: topic.words.iter().take(5).cloned().collect(),
            }
        })
        .collect();
    let unique_words: HashSet<&String> = data.topics_words.iter().flat_map(|t| &t.words).collect();
    let avg_words = mean(
        &data
            .topics_words
            .iter()
            .map(|t| t.words.len() as f64)
            .collect::<Vec<_>>(),
    );
    let topic_words = format!(
        "{} topik dengan rata-rata {:.0} kata kunci per topik; {} kata unik teridentifikasi.",
        k,
        avg_words,
        unique_words.len()
    );

    let matrix = &data.doc_topic_matrix;
    let doc_topic_matrix = if matrix.is_empty() || k == 0 {
        String::new()
    } else {
        let mut dominance = vec![0usize; k];
        let mut max_probs = Vec::with_capacity(matrix.len());
        for row in matrix {
            let top = argmax(row);
            if top < k {
                dominance[top] += 1;
            }
            max_probs.push(row.get(top).copied().unwrap_or(0.0));
        }
        let winner = dominance
            .iter()
            .enumerate()
            .max_by_key(|(i, count)| (**count, std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        format!(
            "{} dokumen pertama ditampilkan. Topik {} dominan di {} dokumen ({:.1}%). \
             Probabilitas topik tertinggi rata-rata per dokumen {:.3}.",
            matrix.len(),
            winner + 1,
            dominance[winner],
            dominance[winner] as f64 / matrix.len() as f64 * 100.0,
            mean(&max_probs)
        )
    };

    let main_themes: Vec<String> = themes
        .iter()
        .filter(|t| t.confidence > 0.2)
        .take(3)
        .map(|t| format!("Topik {}: {}", t.topic_id, t.theme))
        .collect();
    let mut overall_summary = format!(
        "Model LDA mengidentifikasi {} topik utama dengan koherensi {}. Topik terdistribusi secara {}, {}.",
        k,
        quality,
        balance,
        if balanced {
            "menunjukkan keragaman tema yang baik dalam review"
        } else {
            "menunjukkan adanya tema dominan tertentu"
        }
    );
    if !main_themes.is_empty() {
        overall_summary.push_str(&format!(" Tema utama: {}.", main_themes.join("; ")));
    }

    ChartAnalysis {
        topic_distribution,
        topic_coherence,
        topic_words,
        doc_topic_matrix,
        overall_summary,
        themes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::build_chart_data;
    use crate::charts::tests::sample_artifact;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_interpret_theme_picks_best_pattern() {
        let (theme, confidence) = interpret_theme(&words(&["crash", "lag", "slow", "login"]));
        assert_eq!(theme, "Performa dan Kecepatan Aplikasi");
        assert!((confidence - 0.75).abs() < 1e-9);

        let (theme, confidence) = interpret_theme(&words(&["zzz", "qqq"]));
        assert_eq!(theme, GENERAL_THEME);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_display_name_title_cases_slug() {
        assert_eq!(display_name("honkai-star-rail"), "Honkai Star Rail");
    }

    #[test]
    fn test_analysis_covers_every_section() {
        let artifact = sample_artifact();
        let data = build_chart_data(&artifact);
        let analysis = analyze(&data, "spotify");

        assert!(analysis.topic_distribution.contains("Spotify"));
        assert!(analysis.topic_coherence.contains("Koherensi rata-rata"));
        assert!(analysis.topic_words.starts_with("3 topik"));
        assert!(analysis.doc_topic_matrix.starts_with("50 dokumen"));
        assert!(analysis.overall_summary.contains("3 topik utama"));
        assert_eq!(analysis.themes.len(), 3);
    }
}
