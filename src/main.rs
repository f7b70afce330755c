use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "studio")]
#[command(version, about = "Topic-model training studio for app reviews")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding progress files, models, datasets and studio.toml.
    /// Defaults to the current directory.
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to serve on (overrides studio.toml)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides studio.toml)
        #[arg(long)]
        host: Option<String>,

        /// Open the browser once the server is listening
        #[arg(long)]
        open: bool,

        /// Enable dev mode (permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Show the last recorded progress of every app
    Status,
    /// Print the progress record of one app, or the global record
    Progress { app: Option<String> },
    /// Ask a running training job to stop
    Cancel { app: Option<String> },
    /// Delete every artifact of an app
    Purge { app: String },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default studio.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let state_dir = match cli.state_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Serve {
            port,
            host,
            open,
            dev,
        } => {
            cmd::cmd_serve(
                state_dir,
                cli.verbose,
                cmd::ServeOverrides {
                    port: *port,
                    host: host.clone(),
                    open: *open,
                    dev: *dev,
                },
            )
            .await?;
        }
        Commands::Status => cmd::cmd_status(state_dir)?,
        Commands::Progress { app } => cmd::cmd_progress(state_dir, app.as_deref())?,
        Commands::Cancel { app } => cmd::cmd_cancel(state_dir, app.as_deref())?,
        Commands::Purge { app } => cmd::cmd_purge(state_dir, app)?,
        Commands::Config { command } => cmd::cmd_config(&state_dir, command.clone())?,
    }

    Ok(())
}
