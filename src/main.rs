//! w3modkit command line entry point.
//!
//! Classifies mod folders and archives into Mod records and, when a game
//! path is configured, installs them.
//!
//! Configuration is read from `<config-dir>/w3modkit.yaml` with `W3MM_*`
//! environment overrides. Logs go to the configured `log_dir`.

use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use w3modkit::{APP_NAME, ConfigManager, Installer, ModBuilder, ModRegistry, VERSION};

#[derive(Debug, Parser)]
#[command(name = "w3modkit", version = VERSION, about, long_about = None)]
struct Cli {
    /// Directory holding w3modkit.yaml
    #[arg(long, default_value = "w3modkit")]
    config_dir: Utf8PathBuf,

    /// Log at debug level regardless of the config file
    #[arg(long)]
    debug: bool,

    /// Mirror log output to stderr
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify paths and print the resulting Mod records as JSON
    Scan {
        #[arg(required = true)]
        paths: Vec<Utf8PathBuf>,
    },
    /// Classify paths and install them into the configured game
    Install {
        #[arg(required = true)]
        paths: Vec<Utf8PathBuf>,
    },
    /// List the mods installed in the configured game
    Installed,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let config = config_manager.load_config()?;

    let _log_guard = w3modkit::logging::setup_logging_with_console(
        &config.log_dir,
        "w3modkit",
        cli.debug || config.debug_mode,
        cli.verbose,
    )?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("w3modkit-worker")
        .build()?;

    let builder = Arc::new(ModBuilder::new(&config));
    let metrics = Arc::clone(builder.metrics());

    let outcome = match cli.cmd {
        Command::Scan { paths } => runtime.block_on(scan(Arc::clone(&builder), paths)),
        Command::Install { paths } => {
            let Some(installer) = Installer::from_config(&config) else {
                bail!("No game_path configured in {}", config_manager.config_path());
            };
            let installer = installer.with_metrics(Arc::clone(&metrics));
            runtime.block_on(install(&installer, Arc::clone(&builder), paths))
        }
        Command::Installed => {
            let Some(game) = config.game_path.as_deref() else {
                bail!("No game_path configured in {}", config_manager.config_path());
            };
            let registry = ModRegistry::new();
            registry.load_installed(game)?;
            println!("{}", serde_json::to_string_pretty(&registry.snapshot())?);
            Ok(())
        }
    };

    metrics.log_summary();
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");
    outcome
}

async fn scan(builder: Arc<ModBuilder>, paths: Vec<Utf8PathBuf>) -> Result<()> {
    let registry = ModRegistry::new();
    let mut failed = 0;

    for path in paths {
        // Failures are logged by the registry, one line per path
        if registry.scan(Arc::clone(&builder), &path).await.is_err() {
            failed += 1;
        }
    }

    println!("{}", serde_json::to_string_pretty(&registry.snapshot())?);
    if failed > 0 {
        bail!("{} path(s) could not be classified", failed);
    }
    Ok(())
}

async fn install(installer: &Installer, builder: Arc<ModBuilder>, paths: Vec<Utf8PathBuf>) -> Result<()> {
    let outcomes = installer.install_batch(builder, paths).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(mods) => {
                for record in mods {
                    println!("{}\t{}\t{}", record.datatype, record.filename, outcome.path);
                }
            }
            Err(_) => failed += 1,
        }
    }

    if failed > 0 {
        bail!("{} of {} path(s) failed to install", failed, outcomes.len());
    }
    Ok(())
}
