//! rekrake - selectively re-compress images through a remote optimizer.
//!
//! Thin wrapper around `rekrake-core`: resolves configuration, validates
//! credentials, enumerates candidate files and renders the final report.

mod enumerate;
mod report;
mod settings;

use anyhow::Result;
use clap::Parser;
use rekrake_core::{JsonFileBackend, KrakenClient, MetadataStore, RunCoordinator, SafeReplacer};
use settings::{ConfigFile, Overrides, Settings};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rekrake")]
#[command(about = "Selective image re-compression via a remote optimization service")]
struct Args {
    /// Directories (or single files) to scan for candidate images
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    /// API key for the optimization service
    #[arg(long)]
    api_key: Option<String>,

    /// API secret for the optimization service
    #[arg(long)]
    api_secret: Option<String>,

    /// Comparison mode: none, hash or timestamp
    #[arg(short, long)]
    mode: Option<String>,

    /// Use the service's lossy compression strategy
    #[arg(long)]
    lossy: bool,

    /// Detect only; no uploads, no file changes
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many files have been sent for optimization
    #[arg(long)]
    max_files: Option<u64>,

    /// Directory for the fingerprint store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Config file path (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config_path = args.config.clone().unwrap_or_else(ConfigFile::default_path);
    let config_file = ConfigFile::load(&config_path)?;
    let settings = Settings::resolve(
        Overrides {
            api_key: args.api_key,
            api_secret: args.api_secret,
            mode: args.mode,
            lossy: args.lossy,
            dry_run: args.dry_run,
            data_dir: args.data_dir,
            max_files: args.max_files,
        },
        config_file,
    )?;

    let candidates = enumerate::collect_candidates(&args.roots)?;
    if candidates.is_empty() {
        println!("No candidate images found");
        return Ok(());
    }
    info!("Found {} candidate file(s)", candidates.len());

    let client = KrakenClient::new(settings.api_key.as_str(), settings.api_secret.as_str())?;

    // Credentials are the one fatal check; it runs before any file is
    // touched and is skipped entirely in dry-run mode.
    if !settings.options.dry_run {
        let account = client.validate_credentials().await?;
        match (account.quota_used, account.quota_total) {
            (Some(used), Some(total)) => {
                info!("Credentials valid (quota {}/{} bytes used)", used, total)
            }
            _ => info!("Credentials valid"),
        }
    }

    let replacer = SafeReplacer::with_client(client.inner().clone());
    let mut store = MetadataStore::new(Box::new(JsonFileBackend::new(&settings.data_dir)));

    let options = settings.options.clone();
    let stats = RunCoordinator::new(&client, &replacer, &mut store, settings.options)
        .run(&candidates)
        .await;

    print!("{}", report::render(&stats, &options));
    Ok(())
}
