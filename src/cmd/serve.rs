//! HTTP server command: `studio serve`.

use std::path::PathBuf;

use anyhow::Result;
use review_studio::config::Config;
use review_studio::logging::init_logging;
use review_studio::web::start_server;

/// Flags that override studio.toml for this run.
pub struct ServeOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub open: bool,
    pub dev: bool,
}

pub async fn cmd_serve(state_dir: PathBuf, verbose: bool, overrides: ServeOverrides) -> Result<()> {
    let mut config = Config::load(state_dir)?;
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(host) = overrides.host {
        config.host = host;
    }
    config.dev_mode |= overrides.dev;

    let _guard = init_logging(verbose, config.log_json, config.log_file.as_deref())?;

    // No browser inside a dev container.
    let open_browser = overrides.open && !config.dev_mode;
    start_server(config, move |addr| {
        let url = format!("http://{}", addr);
        println!("Review Studio running at {}", url);
        if open_browser && let Err(e) = open::that(&url) {
            eprintln!("Failed to open browser: {}", e);
        }
    })
    .await?;

    println!("Server shut down gracefully.");
    Ok(())
}
