//! cookiesync - Firefox cookie exception synchronization
//!
//! Synchronizes the cookie permission exceptions of a Firefox profile with a
//! state file on a WebDAV server, so several machines converge on the same
//! exception list.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use cookiesync_config::{Config, ConfigLoader};
use cookiesync_store::{discover_profile, FirefoxRecordStore, WebDavClient};
use cookiesync_sync::{BackupScheduler, SnapshotStore, SyncEngine, SyncReport, SyncSettings};
use cookiesync_types::{RecordSet, RecordStore};
use std::path::PathBuf;
use tracing::info;

/// cookiesync - Firefox cookie exception synchronization
#[derive(Parser)]
#[command(
    name = "cookiesync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Synchronize Firefox cookie exceptions over WebDAV",
    long_about = "cookiesync keeps the cookie permission exceptions of a Firefox profile\n\
                  in sync with a shared state file on a WebDAV server. Changes made on\n\
                  any machine are merged three-way against the last synchronized state."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the profile with the remote state
    Sync {
        /// Show what would change without writing anything
        #[arg(short = 'n', long)]
        simulate: bool,
    },
    /// Import exception records from a JSON file into the profile
    Import {
        /// JSON file holding an array of exception records
        file: PathBuf,
        /// Replace records that already exist in the profile
        #[arg(long)]
        update_existing: bool,
    },
    /// Export the profile's exception records as JSON
    Export {
        /// Write to this file instead of stdout
        file: Option<PathBuf>,
    },
    /// Delete every cookie exception from the profile
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the configuration
    Config {
        /// Show the default configuration instead of the loaded one
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::new().context("Failed to locate the config directory")?;
    let config = loader
        .load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    init_logging(&config, cli.debug, cli.quiet)?;
    info!("cookiesync v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync { simulate } => sync_command(&loader, &config, simulate, cli.quiet).await?,
        Commands::Import {
            file,
            update_existing,
        } => import_command(&config, &file, update_existing).await?,
        Commands::Export { file } => export_command(&config, file.as_deref()).await?,
        Commands::Clear { yes } => clear_command(&config, yes).await?,
        Commands::Config { default } => config_command(&config, default)?,
    }

    Ok(())
}

fn init_logging(config: &Config, debug: bool, quiet: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        config.logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log level")?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn open_local_store(config: &Config) -> Result<FirefoxRecordStore> {
    let profile_dir = discover_profile(
        config.profile.name.as_deref(),
        config.profile.path.as_deref(),
    )
    .context("Failed to locate the Firefox profile")?;
    info!("Using profile at {}", profile_dir.display());
    Ok(FirefoxRecordStore::new(&profile_dir)?)
}

async fn open_remote_store(config: &Config) -> Result<WebDavClient> {
    let client = WebDavClient::new(
        &config.webdav.url,
        &config.webdav.username,
        &config.webdav.password,
    )?;
    client
        .self_check()
        .await
        .context("WebDAV server check failed")?;
    Ok(client)
}

async fn sync_command(
    loader: &ConfigLoader,
    config: &Config,
    simulate: bool,
    quiet: bool,
) -> Result<()> {
    let local = open_local_store(config)?;
    let remote = open_remote_store(config).await?;

    let settings = SyncSettings {
        panic: config.sync.panic,
        merge_strategy: config.sync.merge_strategy,
        simulate,
        remote_dir: config.webdav.directory.clone(),
    };
    let engine = SyncEngine::new(
        local,
        remote,
        SnapshotStore::new(loader.state_path()),
        BackupScheduler::new(
            loader.backup_dir(),
            config.backup.enabled,
            config.backup.interval,
        ),
        settings,
    );

    let report = engine.run().await?;
    if !quiet {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    let marker = if report.simulated {
        style("∅").yellow().bold()
    } else {
        style("✓").green().bold()
    };
    let verb = if report.simulated {
        "Would synchronize"
    } else {
        "Synchronized"
    };
    println!(
        "{} {} {} record(s) in {:.2?}",
        marker,
        verb,
        style(report.records).cyan(),
        report.duration
    );
    if report.summary.has_changes() {
        println!("  {}", report.summary);
    } else {
        println!("  No changes");
    }
}

async fn import_command(config: &Config, file: &std::path::Path, update_existing: bool) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let imported: RecordSet = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    for record in imported.records() {
        anyhow::ensure!(record.verify(), "Invalid record {} in import file", record.key());
    }

    let store = open_local_store(config)?;
    let mut records = store.read_all().await?;
    let mut added = 0usize;
    let mut updated = 0usize;
    let mut skipped = 0usize;
    for record in imported.records() {
        if !records.contains_key(&record.key()) {
            records.insert(record.clone());
            added += 1;
        } else if update_existing {
            records.insert(record.clone());
            updated += 1;
        } else {
            skipped += 1;
        }
    }
    store.write_all(&records).await?;

    println!(
        "{} Imported {} record(s) ({} added, {} updated, {} skipped)",
        style("✓").green().bold(),
        imported.len(),
        added,
        updated,
        skipped
    );
    Ok(())
}

async fn export_command(config: &Config, file: Option<&std::path::Path>) -> Result<()> {
    let store = open_local_store(config)?;
    let records = store.read_all().await?;
    let json = serde_json::to_string_pretty(&records)?;

    match file {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Exported {} record(s) to {}",
                style("✓").green().bold(),
                records.len(),
                style(path.display()).cyan()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn clear_command(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Delete every cookie exception from the profile?")
            .default(false)
            .interact()
            .context("Confirmation prompt failed")?;
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }

    let store = open_local_store(config)?;
    store.clear_all().await?;
    println!("{} Cleared all cookie exceptions", style("✓").green().bold());
    Ok(())
}

fn config_command(config: &Config, default: bool) -> Result<()> {
    let shown = if default { Config::default() } else { config.clone() };
    let toml = toml::to_string_pretty(&redacted(shown)).context("Failed to render configuration")?;
    print!("{toml}");
    Ok(())
}

/// Blank out the WebDAV credential so it never reaches terminals or shell logs
fn redacted(mut config: Config) -> Config {
    if !config.webdav.password.is_empty() {
        config.webdav.password = "***".to_string();
    }
    config
}
