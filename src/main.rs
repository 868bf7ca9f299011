//! # qBittorrent Operator
//!
//! ```bash
//! # Run the controllers (default)
//! qbittorrent-operator
//!
//! # Seed qBittorrent.conf from mounted credentials (init container)
//! qbittorrent-operator config-init --config-dir /config --credentials-dir /credentials
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use qbittorrent_operator::configinit::{self, Outcome};
use qbittorrent_operator::constants::{CONFIG_MOUNT_PATH, CREDENTIALS_MOUNT_PATH};
use qbittorrent_operator::runtime::{init_tracing, initialize, run_watch_loop};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qbittorrent-operator")]
#[command(about = "Kubernetes operator for qBittorrent servers and torrents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controllers
    Run,
    /// Write qBittorrent.conf with the WebUI credentials unless it exists
    ConfigInit {
        /// qBittorrent config volume
        #[arg(long, default_value = CONFIG_MOUNT_PATH)]
        config_dir: PathBuf,

        /// Directory holding `username` and `password` files
        #[arg(long, default_value = CREDENTIALS_MOUNT_PATH)]
        credentials_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let init_result = initialize().await?;
            run_watch_loop(init_result).await;
        }
        Commands::ConfigInit {
            config_dir,
            credentials_dir,
        } => {
            init_tracing();
            match configinit::run(&config_dir, &credentials_dir)? {
                Outcome::Skipped(path) => println!("config-init: {} already exists, skipping", path.display()),
                Outcome::Written(path) => println!("config-init: wrote {}", path.display()),
            }
        }
    }

    Ok(())
}
