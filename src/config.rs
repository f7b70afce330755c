use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::TimeDelta;

use crate::catalog::Catalog;
use crate::studio_config::{ScraperSection, StudioToml};

/// Thresholds used by admission control and the expiry sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingLimits {
    pub max_concurrent: usize,
    pub training_timeout: TimeDelta,
    pub stale_progress: TimeDelta,
    pub no_progress_grace: TimeDelta,
}

impl Default for TrainingLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            training_timeout: TimeDelta::seconds(120),
            stale_progress: TimeDelta::seconds(120),
            no_progress_grace: TimeDelta::seconds(60),
        }
    }
}

/// Candidate range and sampler settings for model selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPolicy {
    pub min_topics: usize,
    pub max_topics: usize,
    pub iterations: usize,
    pub seed: u64,
}

impl ModelPolicy {
    pub fn candidates(&self) -> std::ops::RangeInclusive<usize> {
        self.min_topics..=self.max_topics
    }
}

impl Default for ModelPolicy {
    fn default() -> Self {
        Self {
            min_topics: 2,
            max_topics: 10,
            iterations: 100,
            seed: 42,
        }
    }
}

/// Runtime configuration for the studio.
///
/// Bridges `StudioToml` with what the server and the coordinator need:
/// resolved paths, typed durations and the app catalog.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
    pub limits: TrainingLimits,
    pub policy: ModelPolicy,
    pub scraper: ScraperSection,
    pub log_json: bool,
    pub log_file: Option<PathBuf>,
    pub catalog: Catalog,
    /// The underlying file configuration
    toml: StudioToml,
}

impl Config {
    /// Resolve configuration for `state_dir`: studio.toml, then `STUDIO_*`
    /// environment variables (a `.env` file is honoured).
    pub fn load(state_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&state_dir).with_context(|| {
            format!("Failed to create state directory {}", state_dir.display())
        })?;
        let state_dir = state_dir
            .canonicalize()
            .context("Failed to resolve state directory")?;

        let _ = dotenvy::dotenv();
        let mut toml = StudioToml::load_or_default(&state_dir)?;
        toml.apply_env();
        Ok(Self::from_toml(state_dir, toml))
    }

    pub fn from_toml(state_dir: PathBuf, toml: StudioToml) -> Self {
        let training = &toml.training;
        let limits = TrainingLimits {
            max_concurrent: training.max_concurrent,
            training_timeout: seconds(training.training_timeout_secs),
            stale_progress: seconds(training.stale_progress_secs),
            no_progress_grace: seconds(training.no_progress_grace_secs),
        };
        let policy = ModelPolicy {
            min_topics: training.min_topics,
            max_topics: training.max_topics,
            iterations: training.iterations,
            seed: training.seed,
        };
        let catalog = if toml.apps.is_empty() {
            Catalog::default()
        } else {
            Catalog::new(toml.apps.clone())
        };
        let log_file = toml.logging.file.as_ref().map(|f| state_dir.join(f));

        Self {
            host: toml.server.host.clone(),
            port: toml.server.port,
            dev_mode: toml.server.dev_mode,
            limits,
            policy,
            scraper: toml.scraper.clone(),
            log_json: toml.logging.json,
            log_file,
            catalog,
            state_dir,
            toml,
        }
    }

    /// Get the underlying file configuration.
    pub fn studio_toml(&self) -> &StudioToml {
        &self.toml
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn seconds(secs: u64) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults_match_documented_thresholds() {
        let dir = tempdir().unwrap();
        let config = Config::from_toml(dir.path().to_path_buf(), StudioToml::default());
        assert_eq!(config.limits, TrainingLimits::default());
        assert_eq!(config.limits.max_concurrent, 2);
        assert_eq!(config.limits.training_timeout, TimeDelta::seconds(120));
        assert_eq!(config.limits.no_progress_grace, TimeDelta::seconds(60));
        assert_eq!(config.policy.candidates().count(), 9);
        assert_eq!(config.catalog.apps().len(), 5);
    }

    #[test]
    fn test_config_load_reads_state_dir_toml() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("studio.toml"),
            "[server]\nport = 9100\n[logging]\nfile = \"logs/studio.log\"\n",
        )
        .unwrap();
        let config = Config::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.studio_toml().server.port, 9100);
        assert_eq!(
            config.log_file,
            Some(dir.path().canonicalize().unwrap().join("logs/studio.log"))
        );
    }

    #[test]
    fn test_custom_catalog_replaces_builtin() {
        let dir = tempdir().unwrap();
        let toml = StudioToml::parse(
            "[[apps]]\nslug = \"demo\"\npackage = \"p\"\nname = \"Demo\"\ndeveloper = \"d\"\n",
        )
        .unwrap();
        let config = Config::from_toml(dir.path().to_path_buf(), toml);
        assert_eq!(config.catalog.apps().len(), 1);
        assert_eq!(config.bind_addr(), "127.0.0.1:5000");
    }
}
