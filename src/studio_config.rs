//! File configuration for the studio.
//!
//! Reads `studio.toml` from the state directory. Every section is optional and
//! falls back to the defaults below; layering is file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 5000
//!
//! [training]
//! max_concurrent = 2
//! training_timeout_secs = 120
//! stale_progress_secs = 120
//! no_progress_grace_secs = 60
//! min_topics = 2
//! max_topics = 10
//! iterations = 100
//!
//! [scraper]
//! endpoint = "http://127.0.0.1:8088/reviews"
//! review_limit = 20000
//! page_size = 200
//! lang = "en"
//! country = "us"
//!
//! [logging]
//! json = false
//! file = "logs/studio.log"
//!
//! [[apps]]
//! slug = "spotify"
//! package = "com.spotify.music"
//! name = "Spotify"
//! developer = "Spotify Ltd."
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::AppEntry;

pub const CONFIG_FILE_NAME: &str = "studio.toml";

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for a front-end served from another origin.
    #[serde(default)]
    pub dev_mode: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

fn default_max_concurrent() -> usize {
    2
}

fn default_training_timeout_secs() -> u64 {
    120
}

fn default_stale_progress_secs() -> u64 {
    120
}

fn default_no_progress_grace_secs() -> u64 {
    60
}

fn default_min_topics() -> usize {
    2
}

fn default_max_topics() -> usize {
    10
}

fn default_iterations() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSection {
    /// Upper bound on simultaneously admitted sessions.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Age after which a session becomes eligible for the stale-progress check.
    #[serde(default = "default_training_timeout_secs")]
    pub training_timeout_secs: u64,
    /// Progress older than this counts as stuck.
    #[serde(default = "default_stale_progress_secs")]
    pub stale_progress_secs: u64,
    /// A session with no progress record after this long is abandoned.
    #[serde(default = "default_no_progress_grace_secs")]
    pub no_progress_grace_secs: u64,
    #[serde(default = "default_min_topics")]
    pub min_topics: usize,
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,
    /// Gibbs sweeps per candidate fit.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            training_timeout_secs: default_training_timeout_secs(),
            stale_progress_secs: default_stale_progress_secs(),
            no_progress_grace_secs: default_no_progress_grace_secs(),
            min_topics: default_min_topics(),
            max_topics: default_max_topics(),
            iterations: default_iterations(),
            seed: default_seed(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8088/reviews".to_string()
}

fn default_review_limit() -> usize {
    20_000
}

fn default_page_size() -> usize {
    200
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_country() -> String {
    "us".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_review_limit")]
    pub review_limit: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl Default for ScraperSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            review_limit: default_review_limit(),
            page_size: default_page_size(),
            lang: default_lang(),
            country: default_country(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub json: bool,
    /// Optional log file, relative to the state directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// The complete studio.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub training: TrainingSection,
    #[serde(default)]
    pub scraper: ScraperSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Application catalog; empty means the built-in catalog.
    #[serde(default)]
    pub apps: Vec<AppEntry>,
}

impl StudioToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse studio.toml")
    }

    /// Load `studio.toml` from `state_dir`, or defaults when the file is absent.
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize studio.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `STUDIO_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("STUDIO_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("STUDIO_PORT") {
            self.server.port = port;
        }
        if let Some(max) = env_parse("STUDIO_MAX_CONCURRENT_TRAINING") {
            self.training.max_concurrent = max;
        }
        if let Some(secs) = env_parse("STUDIO_TRAINING_TIMEOUT_SECS") {
            self.training.training_timeout_secs = secs;
        }
        if let Ok(endpoint) = std::env::var("STUDIO_SCRAPER_ENDPOINT") {
            self.scraper.endpoint = endpoint;
        }
    }

    /// Return human-readable warnings for suspicious values.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.training.max_concurrent == 0 {
            warnings.push("training.max_concurrent is 0: no training can ever start".to_string());
        }
        if self.training.min_topics < 2 {
            warnings.push("training.min_topics below 2 produces a degenerate model".to_string());
        }
        if self.training.min_topics > self.training.max_topics {
            warnings.push(format!(
                "training.min_topics ({}) is greater than max_topics ({})",
                self.training.min_topics, self.training.max_topics
            ));
        }
        if self.training.iterations == 0 {
            warnings.push("training.iterations is 0: topics will be random".to_string());
        }
        if self.scraper.page_size == 0 {
            warnings.push("scraper.page_size is 0: scraping will fetch nothing".to_string());
        }
        for app in &self.apps {
            if crate::catalog::AppId::parse(&app.slug).is_err() {
                warnings.push(format!("apps: invalid slug '{}'", app.slug));
            }
        }
        warnings
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = StudioToml::parse("").unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.training.max_concurrent, 2);
        assert_eq!(cfg.training.training_timeout_secs, 120);
        assert_eq!(cfg.training.no_progress_grace_secs, 60);
        assert_eq!(cfg.training.min_topics, 2);
        assert_eq!(cfg.training.max_topics, 10);
        assert_eq!(cfg.scraper.review_limit, 20_000);
        assert!(cfg.apps.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let cfg = StudioToml::parse(
            r#"
            [training]
            max_concurrent = 4

            [[apps]]
            slug = "demo"
            package = "com.example.demo"
            name = "Demo"
            developer = "Example"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.training.max_concurrent, 4);
        assert_eq!(cfg.training.stale_progress_secs, 120);
        assert_eq!(cfg.apps.len(), 1);
        assert_eq!(cfg.apps[0].slug, "demo");
    }

    #[test]
    fn test_invalid_toml_errors() {
        let err = StudioToml::parse("[training\nmax = ").unwrap_err();
        assert!(err.to_string().contains("studio.toml"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut cfg = StudioToml::default();
        cfg.server.port = 8123;
        let path = dir.path().join(CONFIG_FILE_NAME);
        cfg.save(&path).unwrap();

        let loaded = StudioToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.server.port, 8123);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let cfg = StudioToml::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let mut cfg = StudioToml::default();
        assert!(cfg.validate().is_empty());

        cfg.training.max_concurrent = 0;
        cfg.training.min_topics = 12;
        cfg.apps.push(AppEntry {
            slug: "Bad Slug".into(),
            package: "x".into(),
            name: "x".into(),
            developer: "x".into(),
        });
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("max_concurrent")));
        assert!(warnings.iter().any(|w| w.contains("Bad Slug")));
    }
}
