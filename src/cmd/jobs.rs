//! Offline job commands: `studio status | progress | cancel | purge`.
//!
//! These work on the state directory directly, so they also reach a server
//! running in another process.

use std::path::PathBuf;

use anyhow::Result;
use console::style;
use review_studio::catalog::AppId;
use review_studio::config::Config;
use review_studio::layout::ArtifactLayout;
use review_studio::training::{CancelSignal, ProgressRecord, ProgressStore};

fn label(record: &ProgressRecord) -> String {
    let slot = record.app_name.as_deref().unwrap_or("global");
    format!("{}: {:.1}% - {}", slot, record.percent, record.description)
}

pub fn cmd_status(state_dir: PathBuf) -> Result<()> {
    let config = Config::load(state_dir)?;
    let layout = ArtifactLayout::new(&config.state_dir);
    let progress = ProgressStore::new(layout.clone());

    println!();
    println!("Review Studio Status");
    println!("====================");
    println!();
    println!("State dir: {}", config.state_dir.display());
    println!(
        "Max concurrent training: {}",
        config.limits.max_concurrent
    );
    println!();

    let mut in_flight = 0usize;
    for entry in config.catalog.apps() {
        let Ok(app) = AppId::parse(&entry.slug) else {
            println!("  {} (invalid slug)", style(&entry.slug).red());
            continue;
        };
        let model = if layout.model_file(&app).exists() {
            style("model").green().to_string()
        } else {
            style("no model").dim().to_string()
        };
        match progress.try_read(Some(&app)) {
            Ok(Some(record)) => {
                let running = record.percent > 0.0 && !record.is_complete();
                if running {
                    in_flight += 1;
                }
                let state = if record.is_complete() {
                    style("done").green()
                } else if running {
                    style("running").yellow()
                } else {
                    style("idle").dim()
                };
                println!(
                    "  {:<18} {:<8} {:>5.1}%  {}  [{}]",
                    app, state, record.percent, record.description, model
                );
            }
            Ok(None) => println!("  {:<18} {:<8}         [{}]", app, style("idle").dim(), model),
            Err(e) => println!("  {:<18} {}", app, style(format!("unreadable: {}", e)).red()),
        }
    }
    println!();
    println!("In flight: {}", in_flight);
    println!();
    Ok(())
}

pub fn cmd_progress(state_dir: PathBuf, app: Option<&str>) -> Result<()> {
    let config = Config::load(state_dir)?;
    let app = app.map(AppId::parse).transpose()?;
    let progress = ProgressStore::new(ArtifactLayout::new(&config.state_dir));
    println!("{}", label(&progress.read(app.as_ref())));
    Ok(())
}

/// Without an app, a marker is written for every app whose last record shows
/// an unfinished run; the global marker does not outlive the fan-out.
pub fn cmd_cancel(state_dir: PathBuf, app: Option<&str>) -> Result<()> {
    let config = Config::load(state_dir)?;
    let app = app.map(AppId::parse).transpose()?;
    let layout = ArtifactLayout::new(&config.state_dir);
    let cancel = CancelSignal::new(layout.clone());

    cancel.request_cancel(app.as_ref())?;
    let targets: Vec<AppId> = match app {
        Some(app) => vec![app],
        None => {
            let progress = ProgressStore::new(layout);
            let mut unfinished = Vec::new();
            for entry in config.catalog.apps() {
                let Ok(app) = AppId::parse(&entry.slug) else {
                    continue;
                };
                if let Ok(Some(record)) = progress.try_read(Some(&app))
                    && !record.is_complete()
                {
                    cancel.request_cancel(Some(&app))?;
                    unfinished.push(app);
                }
            }
            cancel.clear(None)?;
            unfinished
        }
    };

    if targets.is_empty() {
        println!("No unfinished runs found.");
    } else {
        let names: Vec<String> = targets.iter().map(|a| a.to_string()).collect();
        println!("Cancellation requested for: {}", names.join(", "));
    }
    Ok(())
}

pub fn cmd_purge(state_dir: PathBuf, app: &str) -> Result<()> {
    let config = Config::load(state_dir)?;
    let app = AppId::parse(app)?;
    let deleted = ArtifactLayout::new(&config.state_dir).purge(&app)?;
    if deleted.is_empty() {
        println!("Nothing to delete for {}.", app);
    } else {
        println!("Deleted {} file(s) for {}:", deleted.len(), app);
        for file in deleted {
            println!("  - {}", file);
        }
    }
    Ok(())
}
