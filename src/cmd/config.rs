//! Configuration view and validation commands: `studio config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(state_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use review_studio::config::Config;
    use review_studio::studio_config::{CONFIG_FILE_NAME, StudioToml};

    let config_path = state_dir.join(CONFIG_FILE_NAME);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Studio Configuration");
            println!("====================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                StudioToml::load(&config_path)?
            } else {
                println!("No {} found at {}", CONFIG_FILE_NAME, config_path.display());
                println!("Using default configuration:");
                StudioToml::default()
            };
            println!();

            println!("[server]");
            println!("  host = \"{}\"", toml.server.host);
            println!("  port = {}", toml.server.port);
            println!("  dev_mode = {}", toml.server.dev_mode);
            println!();

            println!("[training]");
            println!("  max_concurrent = {}", toml.training.max_concurrent);
            println!(
                "  training_timeout_secs = {}",
                toml.training.training_timeout_secs
            );
            println!(
                "  stale_progress_secs = {}",
                toml.training.stale_progress_secs
            );
            println!(
                "  no_progress_grace_secs = {}",
                toml.training.no_progress_grace_secs
            );
            println!(
                "  topics = {}..={}",
                toml.training.min_topics, toml.training.max_topics
            );
            println!("  iterations = {}", toml.training.iterations);
            println!();

            println!("[scraper]");
            println!("  endpoint = \"{}\"", toml.scraper.endpoint);
            println!("  review_limit = {}", toml.scraper.review_limit);
            println!("  page_size = {}", toml.scraper.page_size);
            println!();

            if config_path.exists() {
                // Effective values include STUDIO_* overrides.
                let config = Config::load(state_dir.to_path_buf())?;
                println!("Effective values (with env overrides):");
                println!("  bind = {}", config.bind_addr());
                println!("  max_concurrent = {}", config.limits.max_concurrent);
                println!("  apps = {}", config.catalog.apps().len());
                println!();
            } else {
                println!("Run 'studio config init' to create a {} file.", CONFIG_FILE_NAME);
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let toml = StudioToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!(
                    "{} already exists at {}",
                    CONFIG_FILE_NAME,
                    config_path.display()
                );
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !state_dir.exists() {
                std::fs::create_dir_all(state_dir)?;
            }

            StudioToml::default().save(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE_NAME, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, dev_mode");
            println!("  - [training] max_concurrent, timeouts, topic range");
            println!("  - [scraper] endpoint, review_limit, page_size");
            println!("  - [[apps]] to replace the built-in catalog");
            println!();
        }
    }

    Ok(())
}
